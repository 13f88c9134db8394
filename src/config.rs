use crate::cli::CliArgs;
use crate::model::Properties;
use crate::routes::RedirectPolicy;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;
use std::time::SystemTime;
use thiserror::Error;

const DEFAULT_TEKTON_NAMESPACE: &str = "tekton-pipelines";

/// Failures while loading the configuration the shell needs before it is
/// ready. Non-fatal: they are shown in a dismissable banner.
#[derive(Debug, Clone, Error, Eq, PartialEq)]
pub enum ConfigLoadError {
    #[error("failed to load dashboard properties: {0}")]
    Properties(String),
    #[error("failed to load messages for '{locale}': {reason}")]
    Messages { locale: String, reason: String },
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Settings {
    pub source: Option<String>,
    pub locale: String,
    pub default_locale: String,
    pub supported_locales: Vec<String>,
    pub pseudo_localize: bool,
    pub locales_dir: Option<PathBuf>,
    pub tenant_namespace: Option<String>,
    pub read_only: bool,
    pub dashboard_namespace: String,
    pub pipelines_namespace: String,
    pub triggers_namespace: String,
    pub logout_url: Option<String>,
    pub redirect_policy: RedirectPolicy,
    pub aliases: HashMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            source: None,
            locale: "en".to_string(),
            default_locale: "en".to_string(),
            supported_locales: vec!["en".to_string(), "es".to_string()],
            pseudo_localize: false,
            locales_dir: None,
            tenant_namespace: None,
            read_only: false,
            dashboard_namespace: DEFAULT_TEKTON_NAMESPACE.to_string(),
            pipelines_namespace: DEFAULT_TEKTON_NAMESPACE.to_string(),
            triggers_namespace: DEFAULT_TEKTON_NAMESPACE.to_string(),
            logout_url: None,
            redirect_policy: RedirectPolicy::default(),
            aliases: HashMap::new(),
        }
    }
}

impl Settings {
    pub fn resolve(snapshot: &RuntimeConfigSnapshot, args: &CliArgs) -> Self {
        let file = &snapshot.file;
        let defaults = Self::default();

        let mut settings = Self {
            source: snapshot.source.clone(),
            locale: file.locale.clone().unwrap_or(defaults.locale),
            default_locale: file.default_locale.clone().unwrap_or(defaults.default_locale),
            supported_locales: file
                .supported_locales
                .clone()
                .filter(|locales| !locales.is_empty())
                .unwrap_or(defaults.supported_locales),
            pseudo_localize: file.pseudo_localize.unwrap_or(defaults.pseudo_localize),
            locales_dir: file.locales_dir.clone(),
            tenant_namespace: non_blank(file.tenant_namespace.clone()),
            read_only: file.read_only.unwrap_or(defaults.read_only),
            dashboard_namespace: non_blank(file.dashboard_namespace.clone())
                .unwrap_or(defaults.dashboard_namespace),
            pipelines_namespace: non_blank(file.pipelines_namespace.clone())
                .unwrap_or(defaults.pipelines_namespace),
            triggers_namespace: non_blank(file.triggers_namespace.clone())
                .unwrap_or(defaults.triggers_namespace),
            logout_url: non_blank(file.logout_url.clone()),
            redirect_policy: file.redirect_policy.unwrap_or_default(),
            aliases: file.aliases.clone().into_iter().collect(),
        };

        if let Some(locale) = non_blank(args.locale.clone()) {
            settings.locale = locale;
        }
        if let Some(dir) = &args.locales_dir {
            settings.locales_dir = Some(dir.clone());
        }
        if args.pseudo_localize {
            settings.pseudo_localize = true;
        }
        if let Some(tenant) = non_blank(args.tenant_namespace.clone()) {
            settings.tenant_namespace = Some(tenant);
        }
        if args.read_only {
            settings.read_only = true;
        }
        if let Some(namespace) = non_blank(args.dashboard_namespace.clone()) {
            settings.dashboard_namespace = namespace;
        }

        settings
    }

    pub fn catalogs_changed(&self, other: &Settings) -> bool {
        self.supported_locales != other.supported_locales
            || self.default_locale != other.default_locale
            || self.locales_dir != other.locales_dir
    }

    pub fn placeholder_properties(&self) -> Properties {
        Properties {
            dashboard_namespace: self.dashboard_namespace.clone(),
            dashboard_version: None,
            pipelines_namespace: self.pipelines_namespace.clone(),
            pipelines_version: None,
            triggers_namespace: self.triggers_namespace.clone(),
            triggers_version: None,
            is_read_only: self.read_only,
            logout_url: self.logout_url.clone(),
            tenant_namespace: self.tenant_namespace.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RuntimeConfigSnapshot {
    pub source: Option<String>,
    pub file: DashboardConfigFile,
}

#[derive(Debug, Clone)]
pub struct RuntimeConfigWatcher {
    path: Option<PathBuf>,
    pinned: bool,
    modified: Option<SystemTime>,
}

#[derive(Debug, Clone, Deserialize, Default, Eq, PartialEq)]
pub struct DashboardConfigFile {
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub default_locale: Option<String>,
    #[serde(default)]
    pub supported_locales: Option<Vec<String>>,
    #[serde(default)]
    pub pseudo_localize: Option<bool>,
    #[serde(default)]
    pub locales_dir: Option<PathBuf>,
    #[serde(default, alias = "tenant")]
    pub tenant_namespace: Option<String>,
    #[serde(default)]
    pub read_only: Option<bool>,
    #[serde(default)]
    pub dashboard_namespace: Option<String>,
    #[serde(default)]
    pub pipelines_namespace: Option<String>,
    #[serde(default)]
    pub triggers_namespace: Option<String>,
    #[serde(default, alias = "logout_url_path")]
    pub logout_url: Option<String>,
    #[serde(default)]
    pub redirect_policy: Option<RedirectPolicy>,
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

impl RuntimeConfigWatcher {
    pub fn discover() -> Self {
        Self {
            path: discover_config_path(),
            pinned: false,
            modified: None,
        }
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path: Some(path),
            pinned: true,
            modified: None,
        }
    }

    pub fn load_current(&mut self) -> Result<RuntimeConfigSnapshot> {
        let Some(path) = self.path.clone() else {
            return Ok(RuntimeConfigSnapshot::default());
        };

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read settings {}", path.display()))?;
        let file: DashboardConfigFile = if raw.trim().is_empty() {
            DashboardConfigFile::default()
        } else {
            serde_yaml::from_str(&raw)
                .with_context(|| format!("failed to parse settings {}", path.display()))?
        };
        self.modified = fs::metadata(&path)
            .ok()
            .and_then(|meta| meta.modified().ok());

        Ok(RuntimeConfigSnapshot {
            source: Some(path.display().to_string()),
            file,
        })
    }

    pub fn reload_if_changed(&mut self) -> Result<Option<RuntimeConfigSnapshot>> {
        if self.path.is_none() {
            if self.pinned {
                return Ok(None);
            }
            self.path = discover_config_path();
            if self.path.is_some() {
                return self.load_current().map(Some);
            }
            return Ok(None);
        }

        let current_path = self.path.clone().unwrap_or_default();
        if !current_path.exists() {
            if self.pinned {
                return Ok(None);
            }
            self.path = discover_config_path();
            self.modified = None;
            if self.path.is_some() {
                return self.load_current().map(Some);
            }
            return Ok(Some(RuntimeConfigSnapshot::default()));
        }

        let modified = fs::metadata(&current_path)
            .ok()
            .and_then(|meta| meta.modified().ok());
        if modified != self.modified {
            return self.load_current().map(Some);
        }

        Ok(None)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn discover_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("TEKDASH_CONFIG")
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }

    let cwd_candidates = [
        PathBuf::from("tekdash.yaml"),
        PathBuf::from("tekdash.yml"),
        PathBuf::from(".tekdash.yaml"),
    ];
    for candidate in cwd_candidates {
        if candidate.exists() {
            return Some(candidate);
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        let user_candidates = [
            PathBuf::from(&home).join(".config/tekdash/config.yaml"),
            PathBuf::from(&home).join(".config/tekdash/config.yml"),
            PathBuf::from(&home).join(".tekdash.yaml"),
        ];
        for candidate in user_candidates {
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::{RuntimeConfigSnapshot, RuntimeConfigWatcher, Settings};
    use crate::cli::CliArgs;
    use crate::routes::RedirectPolicy;
    use std::io::Write;

    #[test]
    fn catalog_keys_are_compared_for_loader_rebuild() {
        let base = Settings::default();
        assert!(!base.catalogs_changed(&base.clone()));
        let locale_only = Settings {
            locale: "es".to_string(),
            pseudo_localize: true,
            ..Settings::default()
        };
        assert!(!locale_only.catalogs_changed(&base));

        let directory = Settings {
            locales_dir: Some("/srv/locales".into()),
            ..Settings::default()
        };
        assert!(directory.catalogs_changed(&base));
        let fallback = Settings {
            default_locale: "es".to_string(),
            ..Settings::default()
        };
        assert!(fallback.catalogs_changed(&base));
    }

    #[test]
    fn settings_file_overrides_defaults_and_cli_overrides_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tekdash.yaml");
        let mut file = std::fs::File::create(&path).expect("create");
        writeln!(
            file,
            "locale: es\ntenant_namespace: team-a\nredirect_policy: never\naliases:\n  runs: pr\n"
        )
        .expect("write");

        let mut watcher = RuntimeConfigWatcher::with_path(path);
        let snapshot = watcher.load_current().expect("load");

        let settings = Settings::resolve(&snapshot, &CliArgs::default());
        assert_eq!(settings.locale, "es");
        assert_eq!(settings.tenant_namespace.as_deref(), Some("team-a"));
        assert_eq!(settings.redirect_policy, RedirectPolicy::Never);
        assert_eq!(settings.aliases.get("runs").map(String::as_str), Some("pr"));
        assert_eq!(settings.dashboard_namespace, "tekton-pipelines");

        let args = CliArgs {
            locale: Some("en".to_string()),
            read_only: true,
            ..CliArgs::default()
        };
        let settings = Settings::resolve(&snapshot, &args);
        assert_eq!(settings.locale, "en");
        assert!(settings.read_only);
    }

    #[test]
    fn empty_snapshot_yields_defaults() {
        let settings = Settings::resolve(&RuntimeConfigSnapshot::default(), &CliArgs::default());
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn reload_reports_nothing_when_unchanged() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tekdash.yaml");
        std::fs::write(&path, "pseudo_localize: true\n").expect("write");

        let mut watcher = RuntimeConfigWatcher::with_path(path);
        let first = watcher.reload_if_changed().expect("reload");
        assert_eq!(
            first.map(|snapshot| snapshot.file.pseudo_localize),
            Some(Some(true))
        );
        assert!(watcher.reload_if_changed().expect("reload").is_none());
    }

    #[test]
    fn malformed_settings_are_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tekdash.yaml");
        std::fs::write(&path, "read_only: [").expect("write");
        let mut watcher = RuntimeConfigWatcher::with_path(path);
        let error = watcher.load_current().expect_err("parse error");
        assert!(format!("{error:#}").contains("failed to parse settings"));
    }
}
