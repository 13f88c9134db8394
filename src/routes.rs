use crate::model::{Extension, ResourceKind, ResourceType};
use crate::namespace::{NamespaceContext, NamespaceSelection};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};

pub type Params = BTreeMap<String, String>;

pub mod paths {
    use crate::model::{ResourceKind, ResourceType};
    use crate::namespace::NamespaceSelection;

    pub const ROOT: &str = "/";
    pub const ABOUT: &str = "/about";
    pub const SETTINGS: &str = "/settings";
    pub const IMPORT_RESOURCES: &str = "/importresources";
    pub const EXTENSIONS: &str = "/extensions";
    pub const CUSTOM_RESOURCE_DEFINITIONS: &str = "/customresourcedefinitions";

    pub fn all(kind: ResourceKind) -> String {
        format!("/{}", kind.path_segment())
    }

    pub fn by_namespace(kind: ResourceKind, namespace: &str) -> String {
        format!("/namespaces/{namespace}/{}", kind.path_segment())
    }

    pub fn by_name(kind: ResourceKind, namespace: Option<&str>, name: &str) -> String {
        match namespace {
            Some(namespace) if kind.namespaced() => {
                format!("/namespaces/{namespace}/{}/{name}", kind.path_segment())
            }
            _ => format!("/{}/{name}", kind.path_segment()),
        }
    }

    pub fn create(kind: ResourceKind) -> String {
        format!("/{}/create", kind.path_segment())
    }

    pub fn list(kind: ResourceKind, selection: &NamespaceSelection) -> String {
        match selection.named() {
            Some(namespace) if kind.namespaced() => by_namespace(kind, namespace),
            _ => all(kind),
        }
    }

    pub fn custom_resource_definition(name: &str) -> String {
        format!("{CUSTOM_RESOURCE_DEFINITIONS}/{name}")
    }

    pub fn extension(name: &str) -> String {
        format!("{EXTENSIONS}/{name}")
    }

    pub fn kubernetes_list(resource: &ResourceType, selection: &NamespaceSelection) -> String {
        match selection.named() {
            Some(namespace) => format!(
                "/{}/{}/namespaces/{namespace}/{}",
                resource.group, resource.version, resource.plural
            ),
            None => format!(
                "/{}/{}/{}",
                resource.group, resource.version, resource.plural
            ),
        }
    }

    pub fn kubernetes_by_name(resource: &ResourceType, namespace: Option<&str>, name: &str) -> String {
        match namespace {
            Some(namespace) => format!(
                "/{}/{}/namespaces/{namespace}/{}/{name}",
                resource.group, resource.version, resource.plural
            ),
            None => format!(
                "/{}/{}/{}/{name}",
                resource.group, resource.version, resource.plural
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RedirectPolicy {
    Never,
    #[default]
    WhenNotFound,
}

impl RedirectPolicy {
    pub fn redirect_for(self, resolution: &Resolution, found: bool) -> Option<String> {
        if found || self == Self::Never {
            return None;
        }
        resolution.all_namespaces_path()
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Wrapper {
    Plain,
    /// `all_namespaces` is the pattern of the all-namespaces variant used by
    /// the redirect policy.
    Namespaced { all_namespaces: Option<String> },
    ReadWrite,
    ClusterScoped,
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum View {
    Redirect(String),
    About,
    Settings,
    ImportResources,
    ResourceList(ResourceKind),
    ResourceDetail(ResourceKind),
    CreateRun(ResourceKind),
    CustomResourceDefinitions,
    CustomResourceDefinition,
    KubernetesList,
    KubernetesDetail,
    Extensions,
    Extension(String),
    NotFound,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RouteEntry {
    pub pattern: String,
    pub exact: bool,
    pub wrapper: Wrapper,
    pub view: View,
}

impl RouteEntry {
    fn new(pattern: impl Into<String>, exact: bool, wrapper: Wrapper, view: View) -> Self {
        Self {
            pattern: pattern.into(),
            exact,
            wrapper,
            view,
        }
    }

    pub fn matches(&self, path: &str) -> Option<Params> {
        let pattern = segments(&self.pattern);
        let path = segments(path);
        if path.len() < pattern.len() || (self.exact && path.len() != pattern.len()) {
            return None;
        }

        let mut params = Params::new();
        for (expected, actual) in pattern.iter().zip(path.iter()) {
            if let Some(name) = expected.strip_prefix(':') {
                if !param_accepts(name, actual) {
                    return None;
                }
                params.insert(name.to_string(), (*actual).to_string());
            } else if expected != actual {
                return None;
            }
        }
        Some(params)
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Restriction {
    ReadOnly,
    Tenant(String),
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Outcome {
    Render,
    Restricted(Restriction),
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct NamespacedMatch {
    pub pattern: String,
    pub path: String,
    pub params: Params,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Resolution {
    pub path: String,
    pub pattern: String,
    pub params: Params,
    pub view: View,
    pub wrapper: Wrapper,
    pub namespace: Option<NamespaceSelection>,
    pub outcome: Outcome,
}

impl Resolution {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn is_rendered(&self) -> bool {
        self.outcome == Outcome::Render
    }

    pub fn namespaced_match(&self) -> Option<NamespacedMatch> {
        if !matches!(self.wrapper, Wrapper::Namespaced { .. }) || !self.is_rendered() {
            return None;
        }
        Some(NamespacedMatch {
            pattern: self.pattern.clone(),
            path: self.path.clone(),
            params: self.params.clone(),
        })
    }

    pub fn all_namespaces_path(&self) -> Option<String> {
        match &self.wrapper {
            Wrapper::Namespaced {
                all_namespaces: Some(pattern),
            } => fill(pattern, &self.params),
            _ => None,
        }
    }

    pub fn resource_type(&self) -> Option<ResourceType> {
        Some(ResourceType::new(
            self.param("group")?,
            self.param("version")?,
            self.param("type")?,
        ))
    }

    pub fn relocate(&self, selection: &NamespaceSelection) -> Option<String> {
        if !matches!(self.wrapper, Wrapper::Namespaced { .. }) {
            return None;
        }
        match &self.view {
            View::ResourceList(kind) | View::ResourceDetail(kind) => {
                Some(paths::list(*kind, selection))
            }
            View::KubernetesList | View::KubernetesDetail => self
                .resource_type()
                .map(|resource| paths::kubernetes_list(&resource, selection)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
    static_len: usize,
}

impl RouteTable {
    pub fn new(extensions: &[Extension]) -> Self {
        let mut entries = static_routes();
        let static_len = entries.len();

        let mut seen = HashSet::new();
        for extension in extensions.iter().filter(|extension| extension.is_page()) {
            if !seen.insert(extension.name.as_str()) {
                continue;
            }
            entries.push(RouteEntry::new(
                paths::extension(&extension.name),
                false,
                Wrapper::Plain,
                View::Extension(extension.name.clone()),
            ));
        }

        entries.push(RouteEntry::new(
            paths::ROOT,
            false,
            Wrapper::Plain,
            View::NotFound,
        ));

        Self {
            entries,
            static_len,
        }
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub fn extension_routes(&self) -> &[RouteEntry] {
        &self.entries[self.static_len..self.entries.len() - 1]
    }

    pub fn match_path(&self, path: &str) -> (&RouteEntry, Params) {
        let path = normalize_path(path);
        for entry in &self.entries {
            if let Some(params) = entry.matches(&path) {
                return (entry, params);
            }
        }
        let fallback = &self.entries[self.entries.len() - 1];
        (fallback, Params::new())
    }

    pub fn resolve(&self, path: &str, namespaces: &NamespaceContext, read_only: bool) -> Resolution {
        let mut path = normalize_path(path);
        let (mut entry, mut params) = self.match_path(&path);
        if let View::Redirect(target) = &entry.view {
            path = normalize_path(target);
            (entry, params) = self.match_path(&path);
        }

        let (namespace, outcome) = match &entry.wrapper {
            Wrapper::Plain => (None, Outcome::Render),
            Wrapper::ClusterScoped => (None, Outcome::Render),
            Wrapper::ReadWrite => {
                let outcome = if read_only {
                    Outcome::Restricted(Restriction::ReadOnly)
                } else {
                    Outcome::Render
                };
                (Some(namespaces.selected().clone()), outcome)
            }
            Wrapper::Namespaced { .. } => {
                let explicit = params.get("namespace").map(String::as_str);
                let outcome = match explicit {
                    Some(namespace) if !namespaces.permits(namespace) => {
                        Outcome::Restricted(Restriction::Tenant(namespace.to_string()))
                    }
                    _ => Outcome::Render,
                };
                (Some(namespaces.resolve(explicit)), outcome)
            }
        };

        Resolution {
            path,
            pattern: entry.pattern.clone(),
            params,
            view: entry.view.clone(),
            wrapper: entry.wrapper.clone(),
            namespace,
            outcome,
        }
    }
}

fn static_routes() -> Vec<RouteEntry> {
    let mut routes = vec![
        RouteEntry::new(
            paths::ROOT,
            true,
            Wrapper::Plain,
            View::Redirect(paths::all(ResourceKind::PipelineRuns)),
        ),
        RouteEntry::new(paths::ABOUT, true, Wrapper::Plain, View::About),
        RouteEntry::new(paths::SETTINGS, true, Wrapper::Plain, View::Settings),
        RouteEntry::new(
            paths::IMPORT_RESOURCES,
            true,
            Wrapper::ReadWrite,
            View::ImportResources,
        ),
        RouteEntry::new(
            paths::create(ResourceKind::PipelineRuns),
            true,
            Wrapper::ReadWrite,
            View::CreateRun(ResourceKind::PipelineRuns),
        ),
        RouteEntry::new(
            paths::create(ResourceKind::TaskRuns),
            true,
            Wrapper::ReadWrite,
            View::CreateRun(ResourceKind::TaskRuns),
        ),
    ];

    for kind in ResourceKind::ALL {
        let segment = kind.path_segment();
        if kind.namespaced() {
            routes.push(RouteEntry::new(
                format!("/{segment}"),
                true,
                Wrapper::Namespaced {
                    all_namespaces: None,
                },
                View::ResourceList(kind),
            ));
            routes.push(RouteEntry::new(
                format!("/namespaces/:namespace/{segment}"),
                true,
                Wrapper::Namespaced {
                    all_namespaces: None,
                },
                View::ResourceList(kind),
            ));
            routes.push(RouteEntry::new(
                format!("/namespaces/:namespace/{segment}/:name"),
                true,
                Wrapper::Namespaced {
                    all_namespaces: Some(format!("/{segment}")),
                },
                View::ResourceDetail(kind),
            ));
        } else {
            routes.push(RouteEntry::new(
                format!("/{segment}"),
                true,
                Wrapper::ClusterScoped,
                View::ResourceList(kind),
            ));
            routes.push(RouteEntry::new(
                format!("/{segment}/:name"),
                true,
                Wrapper::ClusterScoped,
                View::ResourceDetail(kind),
            ));
        }
    }

    routes.extend([
        RouteEntry::new(
            paths::CUSTOM_RESOURCE_DEFINITIONS,
            true,
            Wrapper::ClusterScoped,
            View::CustomResourceDefinitions,
        ),
        RouteEntry::new(
            format!("{}/:name", paths::CUSTOM_RESOURCE_DEFINITIONS),
            true,
            Wrapper::ClusterScoped,
            View::CustomResourceDefinition,
        ),
        RouteEntry::new(paths::EXTENSIONS, true, Wrapper::Plain, View::Extensions),
        RouteEntry::new(
            "/:group/:version/namespaces/:namespace/:type",
            true,
            Wrapper::Namespaced {
                all_namespaces: None,
            },
            View::KubernetesList,
        ),
        RouteEntry::new(
            "/:group/:version/namespaces/:namespace/:type/:name",
            true,
            Wrapper::Namespaced {
                all_namespaces: Some("/:group/:version/:type".to_string()),
            },
            View::KubernetesDetail,
        ),
        RouteEntry::new(
            "/:group/:version/:type",
            true,
            Wrapper::Namespaced {
                all_namespaces: None,
            },
            View::KubernetesList,
        ),
        RouteEntry::new(
            "/:group/:version/:type/:name",
            true,
            Wrapper::ClusterScoped,
            View::KubernetesDetail,
        ),
    ]);

    routes
}

pub fn normalize_path(path: &str) -> String {
    let path = path
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim();
    let joined = segments(path).join("/");
    format!("/{joined}")
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .collect()
}

fn param_accepts(name: &str, value: &str) -> bool {
    match name {
        "version" => is_api_version(value),
        _ => !value.is_empty(),
    }
}

fn is_api_version(value: &str) -> bool {
    let Some(rest) = value.strip_prefix('v') else {
        return false;
    };
    let major_len = rest.chars().take_while(char::is_ascii_digit).count();
    if major_len == 0 {
        return false;
    }
    let rest = &rest[major_len..];
    if rest.is_empty() {
        return true;
    }
    let Some(level) = rest
        .strip_prefix("alpha")
        .or_else(|| rest.strip_prefix("beta"))
    else {
        return false;
    };
    !level.is_empty() && level.chars().all(|c| c.is_ascii_digit())
}

/// Substitutes `:param` segments of `pattern`. `None` if a param is missing.
pub fn fill(pattern: &str, params: &Params) -> Option<String> {
    let filled = segments(pattern)
        .into_iter()
        .map(|segment| match segment.strip_prefix(':') {
            Some(name) => params.get(name).cloned(),
            None => Some(segment.to_string()),
        })
        .collect::<Option<Vec<_>>>()?;
    Some(format!("/{}", filled.join("/")))
}

#[cfg(test)]
mod tests {
    use super::{
        Outcome, RedirectPolicy, Restriction, RouteTable, View, Wrapper, fill, normalize_path,
        paths,
    };
    use crate::model::{Extension, ResourceKind, ResourceType};
    use crate::namespace::{NamespaceContext, NamespaceSelection};

    fn named(value: &str) -> NamespaceSelection {
        NamespaceSelection::Named(value.to_string())
    }

    fn context() -> NamespaceContext {
        NamespaceContext::new(named("default"))
    }

    fn extension(name: &str, kind: Option<&str>) -> Extension {
        Extension {
            name: name.to_string(),
            display_name: name.to_uppercase(),
            source: format!("http://{name}.svc/bundle.js"),
            kind: kind.map(str::to_string),
            resource: None,
        }
    }

    #[test]
    fn normalize_collapses_slashes_and_strips_query() {
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("//pipelineruns/"), "/pipelineruns");
        assert_eq!(normalize_path("/tasks?x=1#frag"), "/tasks");
    }

    #[test]
    fn root_redirects_to_pipeline_runs() {
        let table = RouteTable::new(&[]);
        let resolution = table.resolve("/", &context(), false);
        assert_eq!(resolution.path, "/pipelineruns");
        assert_eq!(
            resolution.view,
            View::ResourceList(ResourceKind::PipelineRuns)
        );
    }

    #[test]
    fn unmatched_path_renders_not_found() {
        let table = RouteTable::new(&[]);
        for path in ["/does-not-exist", "/namespaces/ci/unknown", "/pipelineruns/a/b/c/d/e/f"] {
            let resolution = table.resolve(path, &context(), false);
            assert_eq!(resolution.view, View::NotFound, "{path}");
            assert!(resolution.is_rendered());
        }
    }

    #[test]
    fn namespaced_route_without_segment_uses_selected_namespace() {
        let table = RouteTable::new(&[]);
        let resolution = table.resolve("/taskruns", &context(), false);
        assert_eq!(resolution.view, View::ResourceList(ResourceKind::TaskRuns));
        assert_eq!(resolution.namespace, Some(named("default")));
    }

    #[test]
    fn namespaced_route_with_segment_uses_location_namespace() {
        let table = RouteTable::new(&[]);
        let resolution = table.resolve("/namespaces/ci/pipelines/build", &context(), false);
        assert_eq!(
            resolution.view,
            View::ResourceDetail(ResourceKind::Pipelines)
        );
        assert_eq!(resolution.namespace, Some(named("ci")));
        assert_eq!(resolution.param("name"), Some("build"));
        assert_eq!(
            resolution.namespaced_match().map(|m| m.pattern),
            Some("/namespaces/:namespace/pipelines/:name".to_string())
        );
    }

    #[test]
    fn cluster_scoped_routes_have_no_namespace() {
        let table = RouteTable::new(&[]);
        let resolution = table.resolve("/clustertasks/git-clone", &context(), false);
        assert_eq!(
            resolution.view,
            View::ResourceDetail(ResourceKind::ClusterTasks)
        );
        assert_eq!(resolution.wrapper, Wrapper::ClusterScoped);
        assert_eq!(resolution.namespace, None);
        assert_eq!(resolution.namespaced_match(), None);
    }

    #[test]
    fn read_write_routes_are_restricted_in_read_only_mode() {
        let table = RouteTable::new(&[]);
        for path in ["/pipelineruns/create", "/taskruns/create", "/importresources"] {
            let writable = table.resolve(path, &context(), false);
            assert_eq!(writable.outcome, Outcome::Render, "{path}");
            let read_only = table.resolve(path, &context(), true);
            assert_eq!(
                read_only.outcome,
                Outcome::Restricted(Restriction::ReadOnly),
                "{path}"
            );
        }
    }

    #[test]
    fn create_route_wins_over_other_patterns() {
        let table = RouteTable::new(&[]);
        let resolution = table.resolve("/pipelineruns/create", &context(), false);
        assert_eq!(
            resolution.view,
            View::CreateRun(ResourceKind::PipelineRuns)
        );
    }

    #[test]
    fn tenant_restricts_foreign_namespaces() {
        let table = RouteTable::new(&[]);
        let mut ctx = context();
        ctx.enforce_tenant(Some("team-a".to_string()));

        let own = table.resolve("/namespaces/team-a/pipelineruns", &ctx, false);
        assert!(own.is_rendered());
        let foreign = table.resolve("/namespaces/team-b/pipelineruns", &ctx, false);
        assert_eq!(
            foreign.outcome,
            Outcome::Restricted(Restriction::Tenant("team-b".to_string()))
        );
        let listing = table.resolve("/pipelineruns", &ctx, false);
        assert_eq!(listing.namespace, Some(named("team-a")));
    }

    #[test]
    fn extension_routes_follow_static_routes_and_precede_not_found() {
        let extensions = vec![
            extension("hello", None),
            extension("typed", Some(Extension::KUBERNETES_RESOURCE)),
            extension("world", None),
            extension("hello", None),
        ];
        let table = RouteTable::new(&extensions);
        let dynamic = table
            .extension_routes()
            .iter()
            .map(|entry| entry.pattern.as_str())
            .collect::<Vec<_>>();
        assert_eq!(dynamic, vec!["/extensions/hello", "/extensions/world"]);
        assert_eq!(
            table.entries().last().map(|entry| &entry.view),
            Some(&View::NotFound)
        );

        let resolution = table.resolve("/extensions/world/sub/page", &context(), false);
        assert_eq!(resolution.view, View::Extension("world".to_string()));
        let typed = table.resolve("/extensions/typed", &context(), false);
        assert_eq!(typed.view, View::NotFound);
        let listing = table.resolve("/extensions", &context(), false);
        assert_eq!(listing.view, View::Extensions);
    }

    #[test]
    fn static_routes_take_precedence_over_extension_routes() {
        let table = RouteTable::new(&[extension("x", None)]);
        let (entry, _) = table.match_path("/extensions");
        assert_eq!(entry.view, View::Extensions);
    }

    #[test]
    fn generic_kubernetes_routes_require_api_versions() {
        let table = RouteTable::new(&[]);
        let list = table.resolve("/apps/v1/namespaces/ci/deployments", &context(), false);
        assert_eq!(list.view, View::KubernetesList);
        assert_eq!(
            list.resource_type(),
            Some(ResourceType::new("apps", "v1", "deployments"))
        );
        assert_eq!(list.namespace, Some(named("ci")));

        let cluster = table.resolve("/core/v1/namespaces/default", &context(), false);
        assert_eq!(cluster.view, View::KubernetesDetail);
        assert_eq!(cluster.wrapper, Wrapper::ClusterScoped);

        let beta = table.resolve("/dashboard.tekton.dev/v1alpha1/extensions", &context(), false);
        assert_eq!(beta.view, View::KubernetesList);

        let bogus = table.resolve("/apps/version1/deployments", &context(), false);
        assert_eq!(bogus.view, View::NotFound);
    }

    #[test]
    fn redirect_policy_targets_all_namespaces_variant() {
        let table = RouteTable::new(&[]);
        let detail = table.resolve("/namespaces/ci/pipelineruns/run-1", &context(), false);
        assert_eq!(
            RedirectPolicy::WhenNotFound.redirect_for(&detail, false),
            Some("/pipelineruns".to_string())
        );
        assert_eq!(RedirectPolicy::WhenNotFound.redirect_for(&detail, true), None);
        assert_eq!(RedirectPolicy::Never.redirect_for(&detail, false), None);

        let kube = table.resolve("/apps/v1/namespaces/ci/deployments/web", &context(), false);
        assert_eq!(
            RedirectPolicy::WhenNotFound.redirect_for(&kube, false),
            Some("/apps/v1/deployments".to_string())
        );

        let list = table.resolve("/namespaces/ci/pipelineruns", &context(), false);
        assert_eq!(RedirectPolicy::WhenNotFound.redirect_for(&list, false), None);
    }

    #[test]
    fn relocate_rewrites_namespace_in_location() {
        let table = RouteTable::new(&[]);
        let detail = table.resolve("/namespaces/ci/tasks/lint", &context(), false);
        assert_eq!(
            detail.relocate(&named("prod")),
            Some("/namespaces/prod/tasks".to_string())
        );
        assert_eq!(
            detail.relocate(&NamespaceSelection::All),
            Some("/tasks".to_string())
        );

        let about = table.resolve("/about", &context(), false);
        assert_eq!(about.relocate(&named("prod")), None);
    }

    #[test]
    fn path_builders_round_trip_through_the_table() {
        let table = RouteTable::new(&[]);
        let path = paths::by_name(ResourceKind::TaskRuns, Some("ci"), "unit-1");
        let resolution = table.resolve(&path, &context(), false);
        assert_eq!(resolution.view, View::ResourceDetail(ResourceKind::TaskRuns));

        let path = paths::by_name(ResourceKind::ClusterInterceptors, Some("ci"), "cel");
        assert_eq!(path, "/clusterinterceptors/cel");

        assert_eq!(
            paths::list(ResourceKind::CustomRuns, &named("ci")),
            "/namespaces/ci/runs"
        );
    }

    #[test]
    fn fill_requires_every_param() {
        let mut params = super::Params::new();
        params.insert("type".to_string(), "pods".to_string());
        assert_eq!(fill("/x/:type", &params), Some("/x/pods".to_string()));
        assert_eq!(fill("/x/:group/:type", &params), None);
    }
}
