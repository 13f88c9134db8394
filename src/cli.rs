use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Parser)]
#[command(
    name = "tekdash",
    version,
    about = "A terminal dashboard for Tekton Pipelines and Triggers."
)]
pub struct CliArgs {
    /// Refresh interval in milliseconds
    #[arg(long, default_value_t = 2_000)]
    pub refresh_ms: u64,

    /// Start in a specific namespace
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Start with all namespaces selected
    #[arg(short = 'A', long)]
    pub all_namespaces: bool,

    /// Location to open first (for example: /namespaces/ci/pipelineruns)
    #[arg(long, default_value = "/")]
    pub path: String,

    /// Settings file (overrides discovery)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Language tag for dashboard messages
    #[arg(long)]
    pub locale: Option<String>,

    /// Directory holding <locale>.json message catalogs
    #[arg(long)]
    pub locales_dir: Option<PathBuf>,

    /// Wrap every message in visible markers
    #[arg(long)]
    pub pseudo_localize: bool,

    /// Restrict the dashboard to a single namespace
    #[arg(long)]
    pub tenant_namespace: Option<String>,

    /// Disable create and import views
    #[arg(long)]
    pub read_only: bool,

    /// Namespace the dashboard and its extensions are installed in
    #[arg(long)]
    pub dashboard_namespace: Option<String>,

    /// tracing filter (for example: info,debug,trace)
    #[arg(long, default_value = "info")]
    pub log_filter: String,

    /// Write logs to this file instead of discarding them
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}
