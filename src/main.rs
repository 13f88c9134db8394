mod app;
mod cli;
mod config;
mod dropdown;
mod i18n;
mod input;
mod k8s;
mod model;
mod namespace;
mod query;
mod routes;
mod ui;

use anyhow::{Context, Result};
use app::{App, AppCommand, Fetch, FetchOutcome, ListKey, ShellEvent, TableSource};
use clap::Parser;
use cli::CliArgs;
use config::{ConfigLoadError, RuntimeConfigSnapshot, RuntimeConfigWatcher, Settings};
use crossterm::event::{
    Event, EventStream, KeyEventKind, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
    PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
    supports_keyboard_enhancement,
};
use futures::{StreamExt, TryStreamExt};
use i18n::{CatalogSource, LoaderOptions, MessageLoader};
use k8s::{KubeGateway, api_resource};
use kube::api::DynamicObject;
use kube::runtime::watcher::{Config as WatchConfig, watcher};
use kube::{Api, Client};
use model::ResourceKind;
use namespace::NamespaceSelection;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::collections::{HashMap, HashSet};
use std::fs::OpenOptions;
use std::future::Future;
use std::io::{self, Stdout};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior, interval, timeout};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

type TuiTerminal = Terminal<CrosstermBackend<Stdout>>;
type ShellSender = mpsc::UnboundedSender<ShellEvent>;

const FETCH_TIMEOUT: Duration = Duration::from_secs(6);
const CONFIG_TIMEOUT: Duration = Duration::from_secs(8);
const WATCH_THROTTLE: Duration = Duration::from_millis(350);
const WATCH_RETRY_BASE: Duration = Duration::from_millis(900);
const WATCH_RETRY_MAX: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum WatchSignal {
    Changed(ResourceKind),
    Reconnected(ResourceKind),
}

struct Shell {
    gateway: KubeGateway,
    loader: Arc<MessageLoader>,
    config: RuntimeConfigWatcher,
    args: CliArgs,
    events: ShellSender,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(&args.log_filter, args.log_file.as_deref())?;

    let mut config = match &args.config {
        Some(path) => RuntimeConfigWatcher::with_path(path.clone()),
        None => RuntimeConfigWatcher::discover(),
    };
    let snapshot = config.load_current().unwrap_or_else(|error| {
        warn!("ignoring settings file: {error:#}");
        RuntimeConfigSnapshot::default()
    });
    let settings = Settings::resolve(&snapshot, &args);
    info!(
        "starting tekdash (settings: {})",
        settings.source.as_deref().unwrap_or("defaults")
    );

    let gateway = KubeGateway::new().await?;
    if args.all_namespaces && args.namespace.is_some() {
        warn!("both --all-namespaces and --namespace were provided, using all namespaces");
    }
    let selection = resolve_namespace_selection(&args, &gateway);
    let loader = Arc::new(MessageLoader::new(loader_options(&settings)));

    let mut app = App::new(settings, selection, &args.path);
    app.set_kube_target(gateway.cluster(), gateway.context());

    let refresh_ms = args.refresh_ms.max(500);
    let (events, events_rx) = mpsc::unbounded_channel();
    let mut shell = Shell {
        gateway,
        loader,
        config,
        args,
        events,
    };
    run(&mut app, &mut shell, events_rx, refresh_ms).await
}

fn init_tracing(level_filter: &str, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_new(level_filter)
        .or_else(|_| EnvFilter::try_new("info"))
        .context("failed to initialize tracing filter")?;

    // The terminal belongs to the UI; logs go to a file or nowhere.
    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_ansi(false)
                .compact()
                .with_writer(Mutex::new(file))
                .try_init();
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .compact()
                .with_writer(std::io::sink)
                .try_init();
        }
    }

    Ok(())
}

fn loader_options(settings: &Settings) -> LoaderOptions {
    LoaderOptions {
        supported: settings.supported_locales.clone(),
        default_locale: settings.default_locale.clone(),
        pseudo_localize: settings.pseudo_localize,
        source: match &settings.locales_dir {
            Some(dir) => CatalogSource::Directory(dir.clone()),
            None => CatalogSource::Embedded,
        },
    }
}

fn resolve_namespace_selection(args: &CliArgs, gateway: &KubeGateway) -> NamespaceSelection {
    if args.all_namespaces {
        return NamespaceSelection::All;
    }
    args.namespace
        .as_deref()
        .and_then(NamespaceSelection::parse)
        .unwrap_or_else(|| NamespaceSelection::Named(gateway.default_namespace().to_string()))
}

async fn run(
    app: &mut App,
    shell: &mut Shell,
    events_rx: mpsc::UnboundedReceiver<ShellEvent>,
    refresh_ms: u64,
) -> Result<()> {
    let (mut terminal, keyboard_enhanced) = init_terminal()?;
    let run_result = run_loop(&mut terminal, app, shell, events_rx, refresh_ms).await;
    let restore_result = restore_terminal(&mut terminal, keyboard_enhanced);

    match (run_result, restore_result) {
        (Err(run_error), Err(restore_error)) => Err(anyhow::anyhow!(
            "{run_error:#}\nterminal restore error: {restore_error:#}"
        )),
        (Err(error), _) => Err(error),
        (_, Err(error)) => Err(error),
        (Ok(()), Ok(())) => Ok(()),
    }
}

fn init_terminal() -> Result<(TuiTerminal, bool)> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    let keyboard_enhanced = matches!(supports_keyboard_enhancement(), Ok(true));
    if keyboard_enhanced {
        execute!(
            stdout,
            EnterAlternateScreen,
            PushKeyboardEnhancementFlags(
                KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                    | KeyboardEnhancementFlags::REPORT_EVENT_TYPES
            )
        )
        .context("failed to enter alternate screen with keyboard enhancement")?;
    } else {
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    }
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal backend")?;
    terminal.clear().context("failed to clear terminal")?;
    Ok((terminal, keyboard_enhanced))
}

fn restore_terminal(terminal: &mut TuiTerminal, keyboard_enhanced: bool) -> Result<()> {
    if keyboard_enhanced {
        execute!(terminal.backend_mut(), PopKeyboardEnhancementFlags)
            .context("failed to pop keyboard enhancement flags")?;
    }
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;
    Ok(())
}

async fn run_loop(
    terminal: &mut TuiTerminal,
    app: &mut App,
    shell: &mut Shell,
    mut events_rx: mpsc::UnboundedReceiver<ShellEvent>,
    refresh_ms: u64,
) -> Result<()> {
    spawn_properties_load(shell.gateway.clone(), app.settings().clone(), shell.events.clone());
    spawn_messages_load(
        Arc::clone(&shell.loader),
        app.requested_locale().to_string(),
        app.settings().pseudo_localize,
        shell.events.clone(),
    );

    let mut reader = EventStream::new();
    let mut ticker = interval(Duration::from_millis(refresh_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let (watch_tx, mut watch_rx) = mpsc::unbounded_channel::<WatchSignal>();
    let watch_tasks = start_resource_watchers(shell.gateway.client(), watch_tx);
    let mut watch_throttle = WatchThrottle::default();
    let mut watch_flush = interval(WATCH_THROTTLE);
    watch_flush.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let result = loop {
        if let Err(error) = terminal
            .draw(|frame| ui::render(frame, app))
            .context("failed to render terminal frame")
        {
            break Err(error);
        }

        if !app.running() {
            break Ok(());
        }

        tokio::select! {
            maybe_event = reader.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        if let Some(action) = input::map_key(app.mode(), key) {
                            debug!("action={action:?}");
                            let command = app.apply_action(action);
                            execute_app_command(app, shell, command);
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        app.set_status(format!("terminal event error: {error}"));
                    }
                    None => {
                        app.set_status("terminal event stream closed");
                        break Ok(());
                    }
                }
            }
            _ = ticker.tick() => {
                app.on_tick();
                reload_settings(app, shell);
            }
            maybe_event = events_rx.recv() => {
                if let Some(event) = maybe_event {
                    app.apply_shell_event(event);
                }
            }
            maybe_signal = watch_rx.recv() => {
                match maybe_signal {
                    Some(WatchSignal::Reconnected(kind)) => {
                        info!("watch for {} reconnected", kind.title());
                        app.handle_reconnect();
                    }
                    Some(WatchSignal::Changed(kind))
                        if watch_throttle.admit(kind, Instant::now()) =>
                    {
                        app.handle_resource_changed(kind);
                    }
                    _ => {}
                }
            }
            _ = watch_flush.tick(), if watch_throttle.has_pending() => {
                for kind in watch_throttle.take_due(Instant::now()) {
                    app.handle_resource_changed(kind);
                }
            }
        }

        dispatch_fetches(app, shell);
    };

    for task in watch_tasks {
        task.abort();
    }
    result
}

fn reload_settings(app: &mut App, shell: &mut Shell) {
    match shell.config.reload_if_changed() {
        Ok(Some(snapshot)) => {
            let settings = Settings::resolve(&snapshot, &shell.args);
            if settings.catalogs_changed(app.settings()) {
                info!("message catalog settings changed, rebuilding loader");
                shell.loader = Arc::new(MessageLoader::new(loader_options(&settings)));
            }
            let command = app.apply_settings(settings);
            execute_app_command(app, shell, command);
        }
        Ok(None) => {}
        Err(error) => {
            warn!("settings reload failed: {error:#}");
            app.set_status(format!("Settings reload failed: {}", compact_error(&error)));
        }
    }
}

fn execute_app_command(app: &mut App, shell: &Shell, command: AppCommand) {
    match command {
        AppCommand::None => {}
        AppCommand::LoadMessages { locale, pseudo } => {
            spawn_messages_load(Arc::clone(&shell.loader), locale, pseudo, shell.events.clone());
        }
        AppCommand::CreateRun(request) => {
            let gateway = shell.gateway.clone();
            let events = shell.events.clone();
            tokio::spawn(async move {
                let result = bounded(gateway.create_run(&request)).await;
                let _ = events.send(ShellEvent::RunCreated {
                    kind: request.kind,
                    namespace: request.namespace,
                    result,
                });
            });
        }
        AppCommand::ImportResources(request) => {
            let gateway = shell.gateway.clone();
            let events = shell.events.clone();
            let dashboard_namespace = app.properties().dashboard_namespace.clone();
            tokio::spawn(async move {
                let result = bounded(gateway.import_resources(&request, &dashboard_namespace)).await;
                let _ = events.send(ShellEvent::Imported(result));
            });
        }
    }
}

fn spawn_properties_load(gateway: KubeGateway, settings: Settings, events: ShellSender) {
    tokio::spawn(async move {
        let result = match timeout(CONFIG_TIMEOUT, gateway.fetch_properties(&settings)).await {
            Ok(Ok(properties)) => Ok(properties),
            Ok(Err(error)) => Err(ConfigLoadError::Properties(compact_error(&error))),
            Err(_) => Err(ConfigLoadError::Properties(format!(
                "timed out after {}s",
                CONFIG_TIMEOUT.as_secs()
            ))),
        };
        let _ = events.send(ShellEvent::Properties(result));
    });
}

fn spawn_messages_load(loader: Arc<MessageLoader>, locale: String, pseudo: bool, events: ShellSender) {
    loader.set_pseudo_localize(pseudo);
    tokio::spawn(async move {
        let result = match timeout(CONFIG_TIMEOUT, loader.load(&locale)).await {
            Ok(result) => result,
            Err(_) => Err(ConfigLoadError::Messages {
                locale: locale.clone(),
                reason: format!("timed out after {}s", CONFIG_TIMEOUT.as_secs()),
            }),
        };
        let _ = events.send(ShellEvent::Messages { locale, result });
    });
}

fn dispatch_fetches(app: &mut App, shell: &Shell) {
    for fetch in app.take_fetches() {
        debug!("fetch {fetch:?}");
        let gateway = shell.gateway.clone();
        let events = shell.events.clone();
        tokio::spawn(async move {
            let outcome = run_fetch(&gateway, fetch).await;
            let _ = events.send(ShellEvent::Fetched(outcome));
        });
    }
}

async fn run_fetch(gateway: &KubeGateway, fetch: Fetch) -> FetchOutcome {
    match fetch {
        Fetch::Extensions { namespace } => {
            let result = bounded(gateway.fetch_extensions(&namespace)).await;
            FetchOutcome::Extensions { namespace, result }
        }
        Fetch::List(key) => {
            let result = match &key {
                ListKey::Namespaces => bounded(gateway.fetch_namespaces()).await,
                ListKey::RunTargets { kind, namespace } => {
                    bounded(gateway.fetch_run_targets(*kind, namespace)).await
                }
            };
            FetchOutcome::List { key, result }
        }
        Fetch::Table(source) => {
            let result = match &source {
                TableSource::Kind { kind, scope } => {
                    bounded(gateway.fetch_kind_table(*kind, scope)).await
                }
                TableSource::Resource {
                    resource,
                    namespace,
                } => bounded(gateway.fetch_resource_table(resource, namespace.as_deref())).await,
                TableSource::CustomResourceDefinitions => bounded(gateway.fetch_crd_table()).await,
                TableSource::Extensions => Err("extensions are not fetched as a table".to_string()),
            };
            FetchOutcome::Table { source, result }
        }
        Fetch::Resource(target) => {
            let result = bounded(gateway.fetch_resource(&target)).await;
            FetchOutcome::Resource { target, result }
        }
        Fetch::PipelineResources(scope) => {
            let result = bounded(gateway.fetch_pipeline_resources(&scope)).await;
            FetchOutcome::PipelineResources { scope, result }
        }
        Fetch::DeclaredResources(key) => {
            let result =
                bounded(gateway.fetch_declared_resources(key.kind, &key.namespace, &key.name))
                    .await;
            FetchOutcome::DeclaredResources { key, result }
        }
        Fetch::Properties(settings) => {
            let result = bounded(gateway.fetch_properties(&settings)).await;
            FetchOutcome::Properties { result }
        }
    }
}

async fn bounded<T>(future: impl Future<Output = Result<T>>) -> std::result::Result<T, String> {
    match timeout(FETCH_TIMEOUT, future).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(compact_error(&error)),
        Err(_) => Err(format!("timed out after {}s", FETCH_TIMEOUT.as_secs())),
    }
}

/// Per-kind rate limit for watch events. A change dropped inside the window
/// is kept pending and delivered once the window has passed.
#[derive(Debug, Default)]
struct WatchThrottle {
    last: HashMap<ResourceKind, Instant>,
    pending: HashSet<ResourceKind>,
}

impl WatchThrottle {
    fn admit(&mut self, kind: ResourceKind, now: Instant) -> bool {
        match self.last.get(&kind) {
            Some(last) if now.duration_since(*last) < WATCH_THROTTLE => {
                self.pending.insert(kind);
                false
            }
            _ => {
                self.last.insert(kind, now);
                self.pending.remove(&kind);
                true
            }
        }
    }

    fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    fn take_due(&mut self, now: Instant) -> Vec<ResourceKind> {
        let due = self
            .pending
            .iter()
            .copied()
            .filter(|kind| {
                self.last
                    .get(kind)
                    .is_none_or(|last| now.duration_since(*last) >= WATCH_THROTTLE)
            })
            .collect::<Vec<_>>();
        for kind in &due {
            self.pending.remove(kind);
            self.last.insert(*kind, now);
        }
        due
    }
}

fn start_resource_watchers(
    client: Client,
    tx: mpsc::UnboundedSender<WatchSignal>,
) -> Vec<JoinHandle<()>> {
    ResourceKind::ALL
        .into_iter()
        .filter(|kind| kind.is_run())
        .map(|kind| spawn_watch_task(client.clone(), kind, tx.clone()))
        .collect()
}

fn spawn_watch_task(
    client: Client,
    kind: ResourceKind,
    tx: mpsc::UnboundedSender<WatchSignal>,
) -> JoinHandle<()> {
    let resource = api_resource(&kind.resource_type());
    tokio::spawn(async move {
        let mut failures = 0u32;
        loop {
            let api: Api<DynamicObject> = Api::all_with(client.clone(), &resource);
            let mut events = watcher(api, WatchConfig::default()).boxed();
            loop {
                match events.try_next().await {
                    Ok(Some(_)) => {
                        let signal = if failures > 0 {
                            WatchSignal::Reconnected(kind)
                        } else {
                            WatchSignal::Changed(kind)
                        };
                        failures = 0;
                        if tx.send(signal).is_err() {
                            return;
                        }
                    }
                    Ok(None) => break,
                    Err(error) => {
                        failures = failures.saturating_add(1);
                        if failures == 1 {
                            warn!("watch stream error for {}: {error}", kind.title());
                        } else {
                            debug!("watch stream error for {} ({failures}): {error}", kind.title());
                        }
                        break;
                    }
                }
            }
            let delay = WATCH_RETRY_BASE
                .saturating_mul(failures.max(1))
                .min(WATCH_RETRY_MAX);
            tokio::time::sleep(delay).await;
        }
    })
}

fn compact_error(error: &anyhow::Error) -> String {
    let mut out = Vec::new();
    for (index, cause) in error.chain().enumerate() {
        if index == 0 {
            out.push(cause.to_string());
        } else if index <= 2 {
            out.push(format!("caused by: {cause}"));
        } else {
            break;
        }
    }

    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::{WATCH_THROTTLE, WatchThrottle, compact_error};
    use crate::model::ResourceKind;
    use std::time::{Duration, Instant};

    #[test]
    fn watch_events_are_throttled_per_kind() {
        let start = Instant::now();
        let mut throttle = WatchThrottle::default();
        assert!(throttle.admit(ResourceKind::PipelineRuns, start));
        assert!(!throttle.admit(ResourceKind::PipelineRuns, start));
        assert!(throttle.admit(ResourceKind::TaskRuns, start));
        assert!(throttle.admit(ResourceKind::PipelineRuns, start + WATCH_THROTTLE * 2));
    }

    #[test]
    fn dropped_watch_event_is_delivered_after_window() {
        let start = Instant::now();
        let mut throttle = WatchThrottle::default();
        assert!(throttle.admit(ResourceKind::TaskRuns, start));
        assert!(!throttle.admit(ResourceKind::TaskRuns, start + Duration::from_millis(100)));
        assert!(throttle.has_pending());

        assert!(throttle.take_due(start + Duration::from_millis(200)).is_empty());
        assert_eq!(
            throttle.take_due(start + WATCH_THROTTLE),
            vec![ResourceKind::TaskRuns]
        );
        assert!(!throttle.has_pending());
        assert!(throttle.take_due(start + WATCH_THROTTLE * 3).is_empty());
    }

    #[test]
    fn admitted_event_clears_pending_refresh() {
        let start = Instant::now();
        let mut throttle = WatchThrottle::default();
        assert!(throttle.admit(ResourceKind::CustomRuns, start));
        assert!(!throttle.admit(ResourceKind::CustomRuns, start));
        assert!(throttle.admit(ResourceKind::CustomRuns, start + WATCH_THROTTLE));
        assert!(!throttle.has_pending());
    }

    #[test]
    fn compact_error_keeps_two_causes() {
        let error = anyhow::anyhow!("root")
            .context("middle")
            .context("outer")
            .context("top");
        let text = compact_error(&error);
        assert_eq!(text, "top\ncaused by: outer\ncaused by: middle");
    }
}
