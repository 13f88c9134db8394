use crate::i18n::Messages;
use crate::model::PipelineResource;
use crate::namespace::{NamespaceContext, NamespaceSelection};
use crate::query::QueryCache;

pub type PipelineResourceCache = QueryCache<NamespaceSelection, Vec<PipelineResource>>;

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct PipelineResourcesDropdown {
    pub label: String,
    pub type_filter: Option<String>,
    pub namespace: Option<String>,
    pub selected: Option<String>,
    pub cursor: usize,
}

impl PipelineResourcesDropdown {
    pub fn new(label: impl Into<String>, type_filter: Option<String>, namespace: Option<String>) -> Self {
        Self {
            label: label.into(),
            type_filter: type_filter.filter(|value| !value.trim().is_empty()),
            namespace: namespace.filter(|value| !value.trim().is_empty()),
            selected: None,
            cursor: 0,
        }
    }

    pub fn scope(&self, namespaces: &NamespaceContext) -> NamespaceSelection {
        namespaces.resolve(self.namespace.as_deref())
    }

    pub fn is_loading(&self, cache: &PipelineResourceCache, namespaces: &NamespaceContext) -> bool {
        cache.is_loading(&self.scope(namespaces))
    }

    pub fn error<'a>(
        &self,
        cache: &'a PipelineResourceCache,
        namespaces: &NamespaceContext,
    ) -> Option<&'a str> {
        cache.error(&self.scope(namespaces))
    }

    pub fn items(&self, cache: &PipelineResourceCache, namespaces: &NamespaceContext) -> Vec<String> {
        let Some(resources) = cache.get(&self.scope(namespaces)) else {
            return Vec::new();
        };
        filter_names(resources, self.type_filter.as_deref())
    }

    pub fn empty_text(&self, namespaces: &NamespaceContext, messages: &Messages) -> String {
        let scope = self.scope(namespaces);
        empty_text(&scope, self.type_filter.as_deref(), messages)
    }

    pub fn move_cursor(&mut self, delta: isize, len: usize) {
        if len == 0 {
            self.cursor = 0;
            return;
        }
        let last = len as isize - 1;
        self.cursor = (self.cursor as isize + delta).clamp(0, last) as usize;
    }

    pub fn choose(&mut self, items: &[String]) -> Option<&str> {
        self.selected = items.get(self.cursor).cloned();
        self.selected.as_deref()
    }
}

pub fn filter_names(resources: &[PipelineResource], type_filter: Option<&str>) -> Vec<String> {
    let mut names = resources
        .iter()
        .filter(|resource| type_filter.is_none_or(|wanted| resource.resource_type == wanted))
        .map(|resource| resource.name.clone())
        .collect::<Vec<_>>();
    names.sort();
    names.dedup();
    names
}

/// Empty-state message. Depends only on whether the scope is all namespaces
/// and whether a type filter is set.
pub fn empty_text(scope: &NamespaceSelection, type_filter: Option<&str>, messages: &Messages) -> String {
    match (scope.named(), type_filter) {
        (None, None) => messages.text(
            "dashboard.pipelineResourcesDropdown.empty.allNamespaces",
            "No PipelineResources found",
        ),
        (None, Some(resource_type)) => messages.format(
            "dashboard.pipelineResourcesDropdown.empty.allNamespaces.type",
            "No PipelineResources of type '{type}' found",
            &[("type", resource_type)],
        ),
        (Some(namespace), None) => messages.format(
            "dashboard.pipelineResourcesDropdown.empty.selectedNamespace",
            "No PipelineResources found in the '{namespace}' namespace",
            &[("namespace", namespace)],
        ),
        (Some(namespace), Some(resource_type)) => messages.format(
            "dashboard.pipelineResourcesDropdown.empty.selectedNamespace.type",
            "No PipelineResources of type '{type}' found in the '{namespace}' namespace",
            &[("type", resource_type), ("namespace", namespace)],
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::{PipelineResourceCache, PipelineResourcesDropdown, empty_text};
    use crate::i18n::Messages;
    use crate::model::PipelineResource;
    use crate::namespace::{NamespaceContext, NamespaceSelection};
    use std::collections::HashSet;

    fn resource(name: &str, namespace: &str, resource_type: &str) -> PipelineResource {
        PipelineResource {
            name: name.to_string(),
            namespace: namespace.to_string(),
            resource_type: resource_type.to_string(),
        }
    }

    fn named(value: &str) -> NamespaceSelection {
        NamespaceSelection::Named(value.to_string())
    }

    #[test]
    fn git_filter_across_all_namespaces_uses_unqualified_type_message() {
        let ctx = NamespaceContext::new(NamespaceSelection::All);
        let mut cache = PipelineResourceCache::new();
        cache.insert(
            NamespaceSelection::All,
            vec![resource("image-a", "ci", "image")],
        );
        let dropdown = PipelineResourcesDropdown::new("source", Some("git".to_string()), None);

        assert!(dropdown.items(&cache, &ctx).is_empty());
        assert_eq!(
            dropdown.empty_text(&ctx, &Messages::empty("en")),
            "No PipelineResources of type 'git' found"
        );
    }

    #[test]
    fn empty_text_has_four_distinct_variants() {
        let messages = Messages::empty("en");
        let variants = [
            empty_text(&NamespaceSelection::All, None, &messages),
            empty_text(&NamespaceSelection::All, Some("git"), &messages),
            empty_text(&named("ci"), None, &messages),
            empty_text(&named("ci"), Some("git"), &messages),
        ];
        let distinct = variants.iter().collect::<HashSet<_>>();
        assert_eq!(distinct.len(), 4);
        assert_eq!(variants[1], "No PipelineResources of type 'git' found");
        assert_eq!(
            variants[3],
            "No PipelineResources of type 'git' found in the 'ci' namespace"
        );
    }

    #[test]
    fn explicit_namespace_wins_over_selected_namespace() {
        let ctx = NamespaceContext::new(named("default"));
        let mut cache = PipelineResourceCache::new();
        cache.insert(named("ci"), vec![resource("repo", "ci", "git")]);
        cache.insert(named("default"), vec![resource("other", "default", "git")]);

        let explicit = PipelineResourcesDropdown::new("source", None, Some("ci".to_string()));
        assert_eq!(explicit.items(&cache, &ctx), vec!["repo".to_string()]);
        let fallback = PipelineResourcesDropdown::new("source", None, None);
        assert_eq!(fallback.items(&cache, &ctx), vec!["other".to_string()]);
    }

    #[test]
    fn items_are_filtered_by_type() {
        let ctx = NamespaceContext::new(named("ci"));
        let mut cache = PipelineResourceCache::new();
        cache.insert(
            named("ci"),
            vec![
                resource("repo-b", "ci", "git"),
                resource("image", "ci", "image"),
                resource("repo-a", "ci", "git"),
            ],
        );
        let dropdown = PipelineResourcesDropdown::new("source", Some("git".to_string()), None);
        assert_eq!(
            dropdown.items(&cache, &ctx),
            vec!["repo-a".to_string(), "repo-b".to_string()]
        );
    }

    #[test]
    fn loading_flag_mirrors_cache_state() {
        let ctx = NamespaceContext::new(named("ci"));
        let mut cache = PipelineResourceCache::new();
        let dropdown = PipelineResourcesDropdown::new("source", None, None);
        assert!(!dropdown.is_loading(&cache, &ctx));

        cache.begin(named("ci"));
        assert!(dropdown.is_loading(&cache, &ctx));
        cache.resolve(named("ci"), Err("forbidden".to_string()));
        assert!(!dropdown.is_loading(&cache, &ctx));
        assert_eq!(dropdown.error(&cache, &ctx), Some("forbidden"));
    }

    #[test]
    fn choose_selects_item_under_cursor() {
        let mut dropdown = PipelineResourcesDropdown::new("source", None, None);
        let items = vec!["a".to_string(), "b".to_string()];
        dropdown.move_cursor(5, items.len());
        assert_eq!(dropdown.choose(&items), Some("b"));
        dropdown.move_cursor(-3, items.len());
        assert_eq!(dropdown.cursor, 0);
    }
}
