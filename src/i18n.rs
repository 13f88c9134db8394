use crate::config::ConfigLoadError;
use crate::query::QueryCache;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

pub const PSEUDO_START: &str = "[[";
pub const PSEUDO_END: &str = "]]";

const EMBEDDED_EN: &str = include_str!("../locales/en.json");
const EMBEDDED_ES: &str = include_str!("../locales/es.json");

/// Wraps a message in the pseudo-localisation markers. Already wrapped
/// messages are returned unchanged.
pub fn pseudo_localize(message: &str) -> String {
    if message.starts_with(PSEUDO_START) && message.ends_with(PSEUDO_END) {
        return message.to_string();
    }
    format!("{PSEUDO_START}{message}{PSEUDO_END}")
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Messages {
    locale: String,
    entries: BTreeMap<String, String>,
    pseudo: bool,
}

impl Messages {
    pub fn empty(locale: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            entries: BTreeMap::new(),
            pseudo: false,
        }
    }

    pub fn new(locale: impl Into<String>, entries: BTreeMap<String, String>) -> Self {
        Self {
            locale: locale.into(),
            entries,
            pseudo: false,
        }
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.entries.get(id).map(String::as_str)
    }

    pub fn pseudo_localized(&self) -> bool {
        self.pseudo
    }

    pub fn pseudo_localize(&self) -> Self {
        Self {
            locale: self.locale.clone(),
            entries: self
                .entries
                .iter()
                .map(|(id, message)| (id.clone(), pseudo_localize(message)))
                .collect(),
            pseudo: true,
        }
    }

    pub fn text(&self, id: &str, default: &str) -> String {
        self.format(id, default, &[])
    }

    pub fn format(&self, id: &str, default: &str, args: &[(&str, &str)]) -> String {
        let template = match self.get(id) {
            Some(message) => message.to_string(),
            None if self.pseudo => pseudo_localize(default),
            None => default.to_string(),
        };
        args.iter().fold(template, |out, (name, value)| {
            out.replace(&format!("{{{name}}}"), value)
        })
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum CatalogSource {
    Embedded,
    Directory(PathBuf),
}

#[derive(Debug, Clone)]
pub struct LoaderOptions {
    pub supported: Vec<String>,
    pub default_locale: String,
    pub pseudo_localize: bool,
    pub source: CatalogSource,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            supported: vec!["en".to_string(), "es".to_string()],
            default_locale: "en".to_string(),
            pseudo_localize: false,
            source: CatalogSource::Embedded,
        }
    }
}

#[derive(Debug)]
pub struct MessageLoader {
    supported: Vec<String>,
    default_locale: String,
    source: CatalogSource,
    pseudo: AtomicBool,
    cache: Mutex<QueryCache<String, Arc<BTreeMap<String, String>>>>,
}

impl MessageLoader {
    pub fn new(options: LoaderOptions) -> Self {
        let mut supported = options
            .supported
            .into_iter()
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect::<Vec<_>>();
        if !supported
            .iter()
            .any(|tag| tag.eq_ignore_ascii_case(&options.default_locale))
        {
            supported.push(options.default_locale.clone());
        }

        Self {
            supported,
            default_locale: options.default_locale,
            source: options.source,
            pseudo: AtomicBool::new(options.pseudo_localize),
            cache: Mutex::new(QueryCache::new()),
        }
    }

    pub fn supported(&self) -> &[String] {
        &self.supported
    }

    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    pub fn pseudo_localize(&self) -> bool {
        self.pseudo.load(Ordering::Relaxed)
    }

    pub fn set_pseudo_localize(&self, enabled: bool) {
        self.pseudo.store(enabled, Ordering::Relaxed);
    }

    /// Maps a requested tag onto a supported locale. `es-MX` resolves to `es`
    /// when only the primary language is supported; anything else resolves to
    /// the default locale.
    pub fn resolve_locale(&self, tag: &str) -> String {
        let tag = tag.trim();
        if let Some(exact) = self
            .supported
            .iter()
            .find(|supported| supported.eq_ignore_ascii_case(tag))
        {
            return exact.clone();
        }

        let primary = tag.split(['-', '_']).next().unwrap_or_default();
        if let Some(language) = self
            .supported
            .iter()
            .find(|supported| supported.eq_ignore_ascii_case(primary))
        {
            return language.clone();
        }

        self.default_locale.clone()
    }

    #[cfg(test)]
    pub fn cached_locales(&self) -> Vec<String> {
        let mut locales = self.lock_cache().keys().cloned().collect::<Vec<_>>();
        locales.sort();
        locales
    }

    pub async fn load(&self, tag: &str) -> Result<Messages, ConfigLoadError> {
        let locale = self.resolve_locale(tag);
        let cached = self.lock_cache().get(&locale).cloned();
        let entries = match cached {
            Some(entries) => entries,
            None => {
                debug!("fetching message catalog for '{locale}' (requested '{tag}')");
                let entries = Arc::new(self.fetch(&locale).await?);
                self.lock_cache().insert(locale.clone(), Arc::clone(&entries));
                entries
            }
        };

        let messages = Messages::new(locale, entries.as_ref().clone());
        if self.pseudo_localize() {
            Ok(messages.pseudo_localize())
        } else {
            Ok(messages)
        }
    }

    async fn fetch(&self, locale: &str) -> Result<BTreeMap<String, String>, ConfigLoadError> {
        let raw = match &self.source {
            CatalogSource::Embedded => match locale {
                "en" => EMBEDDED_EN.to_string(),
                "es" => EMBEDDED_ES.to_string(),
                other => {
                    return Err(ConfigLoadError::Messages {
                        locale: other.to_string(),
                        reason: "no embedded catalog for this locale".to_string(),
                    });
                }
            },
            CatalogSource::Directory(dir) => {
                let path = dir.join(format!("{locale}.json"));
                tokio::fs::read_to_string(&path).await.map_err(|error| {
                    ConfigLoadError::Messages {
                        locale: locale.to_string(),
                        reason: format!("failed to read {}: {error}", path.display()),
                    }
                })?
            }
        };

        serde_json::from_str::<BTreeMap<String, String>>(&raw).map_err(|error| {
            ConfigLoadError::Messages {
                locale: locale.to_string(),
                reason: format!("invalid catalog: {error}"),
            }
        })
    }

    fn lock_cache(&self) -> MutexGuard<'_, QueryCache<String, Arc<BTreeMap<String, String>>>> {
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::{
        CatalogSource, LoaderOptions, MessageLoader, Messages, PSEUDO_END, PSEUDO_START,
        pseudo_localize,
    };
    use crate::config::ConfigLoadError;
    use std::collections::BTreeMap;

    fn loader() -> MessageLoader {
        MessageLoader::new(LoaderOptions::default())
    }

    #[test]
    fn pseudo_localization_is_idempotent() {
        let once = pseudo_localize("Pipelines");
        assert_eq!(once, format!("{PSEUDO_START}Pipelines{PSEUDO_END}"));
        assert_eq!(pseudo_localize(&once), once);
    }

    #[test]
    fn catalog_pseudo_localization_is_idempotent() {
        let mut entries = BTreeMap::new();
        entries.insert("a".to_string(), "Hello".to_string());
        let messages = Messages::new("en", entries);
        let once = messages.pseudo_localize();
        let twice = once.pseudo_localize();
        assert_eq!(once, twice);
        assert_eq!(twice.get("a"), Some("[[Hello]]"));
    }

    #[test]
    fn format_substitutes_placeholders_and_falls_back_to_default() {
        let mut entries = BTreeMap::new();
        entries.insert(
            "greeting".to_string(),
            "Hola {name}, {name}".to_string(),
        );
        let messages = Messages::new("es", entries);
        assert_eq!(
            messages.format("greeting", "Hello {name}", &[("name", "ana")]),
            "Hola ana, ana"
        );
        assert_eq!(
            messages.format("missing", "Hello {name}", &[("name", "ana")]),
            "Hello ana"
        );
        assert_eq!(
            messages.pseudo_localize().text("missing", "Hello"),
            "[[Hello]]"
        );
    }

    #[test]
    fn resolve_locale_matches_primary_subtag_and_defaults() {
        let loader = loader();
        assert_eq!(loader.resolve_locale("es"), "es");
        assert_eq!(loader.resolve_locale("ES-mx"), "es");
        assert_eq!(loader.resolve_locale("fr"), "en");
        assert_eq!(loader.resolve_locale(""), "en");
    }

    #[test]
    fn default_locale_is_always_supported() {
        let loader = MessageLoader::new(LoaderOptions {
            supported: vec!["es".to_string()],
            default_locale: "en".to_string(),
            ..LoaderOptions::default()
        });
        assert_eq!(loader.supported(), ["es".to_string(), "en".to_string()]);
    }

    #[tokio::test]
    async fn every_supported_tag_loads_its_own_catalog() {
        let loader = loader();
        for tag in ["en", "es"] {
            let messages = loader.load(tag).await.expect("catalog loads");
            assert_eq!(messages.locale(), tag);
            assert!(!messages.is_empty());
        }
        let en = loader.load("en").await.expect("en");
        let es = loader.load("es").await.expect("es");
        assert_ne!(
            en.get("dashboard.sideNav.settings"),
            es.get("dashboard.sideNav.settings")
        );
    }

    #[tokio::test]
    async fn unsupported_tag_loads_default_catalog() {
        let loader = loader();
        let fr = loader.load("fr").await.expect("fallback");
        let en = loader.load("en").await.expect("en");
        assert_eq!(fr.locale(), "en");
        assert_eq!(fr, en);
        assert_eq!(loader.cached_locales(), vec!["en".to_string()]);
    }

    #[tokio::test]
    async fn repeated_loads_are_served_from_cache() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("en.json");
        std::fs::write(&path, r#"{"a": "first"}"#).expect("write catalog");
        let loader = MessageLoader::new(LoaderOptions {
            supported: vec!["en".to_string()],
            source: CatalogSource::Directory(dir.path().to_path_buf()),
            ..LoaderOptions::default()
        });

        assert_eq!(loader.load("en").await.expect("load").get("a"), Some("first"));
        std::fs::write(&path, r#"{"a": "second"}"#).expect("rewrite catalog");
        assert_eq!(loader.load("en").await.expect("load").get("a"), Some("first"));
    }

    #[tokio::test]
    async fn pseudo_mode_wraps_loaded_messages() {
        let loader = loader();
        loader.set_pseudo_localize(true);
        let messages = loader.load("en").await.expect("load");
        assert!(messages.pseudo_localized());
        let label = messages.get("dashboard.sideNav.settings").expect("label");
        assert!(label.starts_with(PSEUDO_START) && label.ends_with(PSEUDO_END));
    }

    #[tokio::test]
    async fn missing_catalog_is_a_configuration_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let loader = MessageLoader::new(LoaderOptions {
            source: CatalogSource::Directory(dir.path().to_path_buf()),
            ..LoaderOptions::default()
        });
        let error = loader.load("es").await.expect_err("no catalog on disk");
        assert!(matches!(error, ConfigLoadError::Messages { ref locale, .. } if locale == "es"));
    }
}
