use std::fmt::{Display, Formatter};
use thiserror::Error;

pub const ALL_NAMESPACES: &str = "*";

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum NamespaceSelection {
    All,
    Named(String),
}

impl NamespaceSelection {
    /// Parses a user supplied selector. Empty input is rejected so a selection
    /// is never an empty string.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        match value.to_ascii_lowercase().as_str() {
            ALL_NAMESPACES | "all" | "all-namespaces" | "all_namespaces" => Some(Self::All),
            _ => Some(Self::Named(value.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::All => ALL_NAMESPACES,
            Self::Named(namespace) => namespace.as_str(),
        }
    }

    pub fn named(&self) -> Option<&str> {
        match self {
            Self::All => None,
            Self::Named(namespace) => Some(namespace.as_str()),
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::All => "all".to_string(),
            Self::Named(namespace) => namespace.clone(),
        }
    }
}

impl Display for NamespaceSelection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Named(namespace) => write!(f, "{namespace}"),
        }
    }
}

#[derive(Debug, Clone, Error, Eq, PartialEq)]
#[error("namespace is locked to tenant namespace '{0}'")]
pub struct NamespaceLocked(pub String);

#[derive(Debug, Clone)]
pub struct NamespaceContext {
    selected: NamespaceSelection,
    tenant: Option<String>,
}

impl NamespaceContext {
    pub fn new(selected: NamespaceSelection) -> Self {
        Self {
            selected,
            tenant: None,
        }
    }

    pub fn selected(&self) -> &NamespaceSelection {
        &self.selected
    }

    pub fn tenant(&self) -> Option<&str> {
        self.tenant.as_deref()
    }

    pub fn is_locked(&self) -> bool {
        self.tenant.is_some()
    }

    pub fn select(&mut self, selection: NamespaceSelection) -> Result<bool, NamespaceLocked> {
        if let Some(tenant) = &self.tenant
            && selection.named() != Some(tenant.as_str())
        {
            return Err(NamespaceLocked(tenant.clone()));
        }
        if self.selected == selection {
            return Ok(false);
        }
        self.selected = selection;
        Ok(true)
    }

    pub fn enforce_tenant(&mut self, tenant: Option<String>) -> bool {
        let tenant = tenant.filter(|value| !value.trim().is_empty());
        self.tenant = tenant.clone();
        let Some(tenant) = tenant else {
            return false;
        };
        let forced = NamespaceSelection::Named(tenant);
        if self.selected == forced {
            return false;
        }
        self.selected = forced;
        true
    }

    pub fn resolve(&self, explicit: Option<&str>) -> NamespaceSelection {
        explicit
            .and_then(NamespaceSelection::parse)
            .unwrap_or_else(|| self.selected.clone())
    }

    pub fn permits(&self, namespace: &str) -> bool {
        match &self.tenant {
            Some(tenant) => tenant == namespace,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{NamespaceContext, NamespaceLocked, NamespaceSelection};

    fn named(value: &str) -> NamespaceSelection {
        NamespaceSelection::Named(value.to_string())
    }

    #[test]
    fn parse_rejects_empty_and_maps_sentinels() {
        assert_eq!(NamespaceSelection::parse("  "), None);
        assert_eq!(NamespaceSelection::parse("*"), Some(NamespaceSelection::All));
        assert_eq!(
            NamespaceSelection::parse("all-namespaces"),
            Some(NamespaceSelection::All)
        );
        assert_eq!(NamespaceSelection::parse(" ci "), Some(named("ci")));
    }

    #[test]
    fn select_reports_changes() {
        let mut ctx = NamespaceContext::new(named("default"));
        assert_eq!(ctx.select(named("default")), Ok(false));
        assert_eq!(ctx.select(NamespaceSelection::All), Ok(true));
        assert_eq!(ctx.selected(), &NamespaceSelection::All);
    }

    #[test]
    fn tenant_overrides_previous_selection() {
        let mut ctx = NamespaceContext::new(NamespaceSelection::All);
        assert!(ctx.enforce_tenant(Some("team-a".to_string())));
        assert_eq!(ctx.selected(), &named("team-a"));
        assert!(!ctx.enforce_tenant(Some("team-a".to_string())));
    }

    #[test]
    fn tenant_lock_rejects_other_namespaces() {
        let mut ctx = NamespaceContext::new(named("default"));
        ctx.enforce_tenant(Some("team-a".to_string()));
        assert_eq!(
            ctx.select(NamespaceSelection::All),
            Err(NamespaceLocked("team-a".to_string()))
        );
        assert_eq!(ctx.select(named("team-a")), Ok(false));
        assert!(ctx.permits("team-a"));
        assert!(!ctx.permits("team-b"));
    }

    #[test]
    fn blank_tenant_does_not_lock() {
        let mut ctx = NamespaceContext::new(named("default"));
        assert!(!ctx.enforce_tenant(Some(" ".to_string())));
        assert!(!ctx.is_locked());
    }

    #[test]
    fn resolve_prefers_explicit_namespace() {
        let ctx = NamespaceContext::new(named("default"));
        assert_eq!(ctx.resolve(Some("ci")), named("ci"));
        assert_eq!(ctx.resolve(None), named("default"));
    }
}
