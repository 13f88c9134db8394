use chrono::{DateTime, Local};
use std::fmt::{Display, Formatter};

pub const TEKTON_GROUP: &str = "tekton.dev";
pub const TRIGGERS_GROUP: &str = "triggers.tekton.dev";

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ResourceKind {
    Pipelines,
    PipelineRuns,
    PipelineResources,
    Tasks,
    TaskRuns,
    ClusterTasks,
    CustomRuns,
    EventListeners,
    Triggers,
    TriggerBindings,
    ClusterTriggerBindings,
    TriggerTemplates,
    Interceptors,
    ClusterInterceptors,
}

impl ResourceKind {
    pub const ALL: [Self; 14] = [
        Self::Pipelines,
        Self::PipelineRuns,
        Self::PipelineResources,
        Self::Tasks,
        Self::TaskRuns,
        Self::ClusterTasks,
        Self::CustomRuns,
        Self::EventListeners,
        Self::Triggers,
        Self::TriggerBindings,
        Self::ClusterTriggerBindings,
        Self::TriggerTemplates,
        Self::Interceptors,
        Self::ClusterInterceptors,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Self::Pipelines => "Pipelines",
            Self::PipelineRuns => "PipelineRuns",
            Self::PipelineResources => "PipelineResources",
            Self::Tasks => "Tasks",
            Self::TaskRuns => "TaskRuns",
            Self::ClusterTasks => "ClusterTasks",
            Self::CustomRuns => "CustomRuns",
            Self::EventListeners => "EventListeners",
            Self::Triggers => "Triggers",
            Self::TriggerBindings => "TriggerBindings",
            Self::ClusterTriggerBindings => "ClusterTriggerBindings",
            Self::TriggerTemplates => "TriggerTemplates",
            Self::Interceptors => "Interceptors",
            Self::ClusterInterceptors => "ClusterInterceptors",
        }
    }

    pub fn kind(self) -> &'static str {
        match self {
            Self::Pipelines => "Pipeline",
            Self::PipelineRuns => "PipelineRun",
            Self::PipelineResources => "PipelineResource",
            Self::Tasks => "Task",
            Self::TaskRuns => "TaskRun",
            Self::ClusterTasks => "ClusterTask",
            Self::CustomRuns => "CustomRun",
            Self::EventListeners => "EventListener",
            Self::Triggers => "Trigger",
            Self::TriggerBindings => "TriggerBinding",
            Self::ClusterTriggerBindings => "ClusterTriggerBinding",
            Self::TriggerTemplates => "TriggerTemplate",
            Self::Interceptors => "Interceptor",
            Self::ClusterInterceptors => "ClusterInterceptor",
        }
    }

    pub fn group(self) -> &'static str {
        match self {
            Self::Pipelines
            | Self::PipelineRuns
            | Self::PipelineResources
            | Self::Tasks
            | Self::TaskRuns
            | Self::ClusterTasks
            | Self::CustomRuns => TEKTON_GROUP,
            Self::EventListeners
            | Self::Triggers
            | Self::TriggerBindings
            | Self::ClusterTriggerBindings
            | Self::TriggerTemplates
            | Self::Interceptors
            | Self::ClusterInterceptors => TRIGGERS_GROUP,
        }
    }

    pub fn version(self) -> &'static str {
        match self {
            Self::Pipelines | Self::PipelineRuns | Self::Tasks | Self::TaskRuns => "v1",
            Self::PipelineResources | Self::Interceptors | Self::ClusterInterceptors => "v1alpha1",
            Self::ClusterTasks
            | Self::CustomRuns
            | Self::EventListeners
            | Self::Triggers
            | Self::TriggerBindings
            | Self::ClusterTriggerBindings
            | Self::TriggerTemplates => "v1beta1",
        }
    }

    pub fn plural(self) -> &'static str {
        match self {
            Self::Pipelines => "pipelines",
            Self::PipelineRuns => "pipelineruns",
            Self::PipelineResources => "pipelineresources",
            Self::Tasks => "tasks",
            Self::TaskRuns => "taskruns",
            Self::ClusterTasks => "clustertasks",
            Self::CustomRuns => "customruns",
            Self::EventListeners => "eventlisteners",
            Self::Triggers => "triggers",
            Self::TriggerBindings => "triggerbindings",
            Self::ClusterTriggerBindings => "clustertriggerbindings",
            Self::TriggerTemplates => "triggertemplates",
            Self::Interceptors => "interceptors",
            Self::ClusterInterceptors => "clusterinterceptors",
        }
    }

    pub fn path_segment(self) -> &'static str {
        match self {
            Self::CustomRuns => "runs",
            other => other.plural(),
        }
    }

    pub fn namespaced(self) -> bool {
        !matches!(
            self,
            Self::ClusterTasks | Self::ClusterTriggerBindings | Self::ClusterInterceptors
        )
    }

    pub fn is_triggers(self) -> bool {
        self.group() == TRIGGERS_GROUP
    }

    pub fn is_run(self) -> bool {
        matches!(self, Self::PipelineRuns | Self::TaskRuns | Self::CustomRuns)
    }

    pub fn nav_message_id(self) -> &'static str {
        match self {
            Self::Pipelines => "dashboard.sideNav.pipelines",
            Self::PipelineRuns => "dashboard.sideNav.pipelineRuns",
            Self::PipelineResources => "dashboard.sideNav.pipelineResources",
            Self::Tasks => "dashboard.sideNav.tasks",
            Self::TaskRuns => "dashboard.sideNav.taskRuns",
            Self::ClusterTasks => "dashboard.sideNav.clusterTasks",
            Self::CustomRuns => "dashboard.sideNav.customRuns",
            Self::EventListeners => "dashboard.sideNav.eventListeners",
            Self::Triggers => "dashboard.sideNav.triggers",
            Self::TriggerBindings => "dashboard.sideNav.triggerBindings",
            Self::ClusterTriggerBindings => "dashboard.sideNav.clusterTriggerBindings",
            Self::TriggerTemplates => "dashboard.sideNav.triggerTemplates",
            Self::Interceptors => "dashboard.sideNav.interceptors",
            Self::ClusterInterceptors => "dashboard.sideNav.clusterInterceptors",
        }
    }

    pub fn resource_type(self) -> ResourceType {
        ResourceType::new(self.group(), self.version(), self.plural())
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "p" | "pipeline" | "pipelines" => Some(Self::Pipelines),
            "pr" | "pipelinerun" | "pipelineruns" | "pipeline-run" | "pipeline-runs" => {
                Some(Self::PipelineRuns)
            }
            "res"
            | "pipelineresource"
            | "pipelineresources"
            | "pipeline-resource"
            | "pipeline-resources" => Some(Self::PipelineResources),
            "t" | "task" | "tasks" => Some(Self::Tasks),
            "tr" | "taskrun" | "taskruns" | "task-run" | "task-runs" => Some(Self::TaskRuns),
            "ct" | "clustertask" | "clustertasks" | "cluster-task" | "cluster-tasks" => {
                Some(Self::ClusterTasks)
            }
            "run" | "runs" | "cr" | "customrun" | "customruns" | "custom-run" | "custom-runs" => {
                Some(Self::CustomRuns)
            }
            "el" | "eventlistener" | "eventlisteners" | "event-listener" | "event-listeners" => {
                Some(Self::EventListeners)
            }
            "trigger" | "triggers" => Some(Self::Triggers),
            "tb" | "triggerbinding" | "triggerbindings" | "trigger-binding"
            | "trigger-bindings" => Some(Self::TriggerBindings),
            "ctb"
            | "clustertriggerbinding"
            | "clustertriggerbindings"
            | "cluster-trigger-binding"
            | "cluster-trigger-bindings" => Some(Self::ClusterTriggerBindings),
            "tt" | "triggertemplate" | "triggertemplates" | "trigger-template"
            | "trigger-templates" => Some(Self::TriggerTemplates),
            "ic" | "interceptor" | "interceptors" => Some(Self::Interceptors),
            "ci"
            | "clusterinterceptor"
            | "clusterinterceptors"
            | "cluster-interceptor"
            | "cluster-interceptors" => Some(Self::ClusterInterceptors),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct ResourceType {
    /// `core` stands for the legacy core group.
    pub group: String,
    pub version: String,
    pub plural: String,
}

impl ResourceType {
    pub fn new(group: &str, version: &str, plural: &str) -> Self {
        Self {
            group: group.to_string(),
            version: version.to_string(),
            plural: plural.to_string(),
        }
    }

    pub fn api_group(&self) -> &str {
        if self.group == "core" { "" } else { self.group.as_str() }
    }

    pub fn api_version(&self) -> String {
        if self.api_group().is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    pub fn from_api_version(api_version: &str, plural: &str) -> Self {
        match api_version.split_once('/') {
            Some((group, version)) => Self::new(group, version, plural),
            None => Self::new("core", api_version, plural),
        }
    }
}

impl ResourceType {
    pub fn custom_resource_definitions() -> Self {
        Self::new("apiextensions.k8s.io", "v1", "customresourcedefinitions")
    }
}

impl Display for ResourceType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.group, self.version, self.plural)
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ExtensionResource {
    pub resource: ResourceType,
    pub namespaced: bool,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Extension {
    pub name: String,
    pub display_name: String,
    pub source: String,
    pub kind: Option<String>,
    pub resource: Option<ExtensionResource>,
}

impl Extension {
    pub const KUBERNETES_RESOURCE: &'static str = "kubernetes-resource";

    pub fn is_page(&self) -> bool {
        self.kind.is_none()
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PipelineResource {
    pub name: String,
    pub namespace: String,
    pub resource_type: String,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DeclaredResource {
    pub name: String,
    pub resource_type: String,
    pub output: bool,
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct ResourceRef {
    pub resource: ResourceType,
    pub namespace: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ImportRequest {
    pub repository_url: String,
    pub path: String,
    pub target_namespace: String,
    pub service_account: Option<String>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RunRequest {
    pub kind: ResourceKind,
    pub namespace: String,
    pub target: String,
    pub bindings: Vec<(DeclaredResource, String)>,
}

#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct Properties {
    pub dashboard_namespace: String,
    pub dashboard_version: Option<String>,
    pub pipelines_namespace: String,
    pub pipelines_version: Option<String>,
    pub triggers_namespace: String,
    pub triggers_version: Option<String>,
    pub is_read_only: bool,
    pub logout_url: Option<String>,
    pub tenant_namespace: Option<String>,
}

impl Properties {
    pub fn triggers_installed(&self) -> bool {
        self.triggers_version.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RowData {
    pub name: String,
    pub namespace: Option<String>,
    pub columns: Vec<String>,
    pub detail: String,
}

impl RowData {
    pub fn matches_filter(&self, query: &str) -> bool {
        let query = query.trim();
        if query.is_empty() {
            return true;
        }

        let query_lower = query.to_ascii_lowercase();

        if self.name.to_ascii_lowercase().contains(&query_lower) {
            return true;
        }

        if let Some(namespace) = &self.namespace
            && namespace.to_ascii_lowercase().contains(&query_lower)
        {
            return true;
        }

        self.columns
            .iter()
            .any(|column| column.to_ascii_lowercase().contains(&query_lower))
    }
}

#[derive(Debug, Clone, Default)]
pub struct TableData {
    pub headers: Vec<String>,
    pub rows: Vec<RowData>,
    pub selected: usize,
    pub last_refreshed: Option<DateTime<Local>>,
}

impl TableData {
    pub fn new(headers: Vec<String>, rows: Vec<RowData>, refreshed_at: DateTime<Local>) -> Self {
        let mut table = Self::default();
        table.set_rows(headers, rows, refreshed_at);
        table
    }

    pub fn set_rows(
        &mut self,
        headers: Vec<String>,
        rows: Vec<RowData>,
        refreshed_at: DateTime<Local>,
    ) {
        self.headers = headers;
        self.rows = rows;
        self.last_refreshed = Some(refreshed_at);
        self.selected = self.selected.min(self.rows.len().saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::{Extension, ResourceKind, ResourceType, RowData};

    #[test]
    fn resource_aliases_map_to_expected_kinds() {
        assert_eq!(
            ResourceKind::from_token("pr"),
            Some(ResourceKind::PipelineRuns)
        );
        assert_eq!(ResourceKind::from_token("tr"), Some(ResourceKind::TaskRuns));
        assert_eq!(
            ResourceKind::from_token("cluster-tasks"),
            Some(ResourceKind::ClusterTasks)
        );
        assert_eq!(
            ResourceKind::from_token("runs"),
            Some(ResourceKind::CustomRuns)
        );
        assert_eq!(
            ResourceKind::from_token("EventListeners"),
            Some(ResourceKind::EventListeners)
        );
        assert_eq!(
            ResourceKind::from_token("ctb"),
            Some(ResourceKind::ClusterTriggerBindings)
        );
        assert_eq!(ResourceKind::from_token("pods"), None);
    }

    #[test]
    fn cluster_kinds_are_not_namespaced() {
        let cluster = ResourceKind::ALL
            .iter()
            .filter(|kind| !kind.namespaced())
            .copied()
            .collect::<Vec<_>>();
        assert_eq!(
            cluster,
            vec![
                ResourceKind::ClusterTasks,
                ResourceKind::ClusterTriggerBindings,
                ResourceKind::ClusterInterceptors,
            ]
        );
    }

    #[test]
    fn custom_runs_route_under_runs() {
        assert_eq!(ResourceKind::CustomRuns.path_segment(), "runs");
        assert_eq!(ResourceKind::CustomRuns.plural(), "customruns");
    }

    #[test]
    fn core_group_has_bare_api_version() {
        let pods = ResourceType::new("core", "v1", "pods");
        assert_eq!(pods.api_group(), "");
        assert_eq!(pods.api_version(), "v1");
        assert_eq!(
            ResourceType::from_api_version("apps/v1", "deployments").api_version(),
            "apps/v1"
        );
        assert_eq!(ResourceType::from_api_version("v1", "pods"), pods);
    }

    #[test]
    fn only_untyped_extensions_are_pages() {
        let page = Extension {
            name: "hello".to_string(),
            display_name: "Hello".to_string(),
            source: "http://hello/bundle.js".to_string(),
            kind: None,
            resource: None,
        };
        let typed = Extension {
            kind: Some(Extension::KUBERNETES_RESOURCE.to_string()),
            ..page.clone()
        };
        assert!(page.is_page());
        assert!(!typed.is_page());
    }

    #[test]
    fn row_filter_matches_columns() {
        let row = RowData {
            name: "build-abc".to_string(),
            namespace: Some("ci".to_string()),
            columns: vec!["build-abc".to_string(), "Succeeded".to_string()],
            detail: String::new(),
        };
        assert!(row.matches_filter("succ"));
        assert!(row.matches_filter("CI"));
        assert!(!row.matches_filter("failed"));
    }
}
