use anyhow::{Context, Result};
use chrono::Local;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Service};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::api::{ListParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use kube::{Api, Client, Config, ResourceExt};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::config::Settings;
use crate::model::{
    DeclaredResource, Extension, ExtensionResource, ImportRequest, PipelineResource, Properties,
    ResourceKind, ResourceRef, ResourceType, RowData, RunRequest, TableData,
};
use crate::namespace::NamespaceSelection;

pub const EXTENSION_LABEL: &str = "tekton-dashboard-extension=true";
pub const EXTENSION_DISPLAY_NAME: &str = "tekton-dashboard-display-name";
pub const EXTENSION_BUNDLE_LOCATION: &str = "tekton-dashboard-bundle-location";
pub const IMPORT_LABEL: &str = "dashboard.tekton.dev/import";

const EXTENSION_GROUP: &str = "dashboard.tekton.dev";
const EXTENSION_VERSION: &str = "v1alpha1";

#[derive(Clone)]
pub struct KubeGateway {
    client: Client,
    context: String,
    cluster: String,
    default_namespace: String,
}

impl KubeGateway {
    pub async fn new() -> Result<Self> {
        Self::from_kube_selection(None).await
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn default_namespace(&self) -> &str {
        &self.default_namespace
    }

    pub fn client(&self) -> Client {
        self.client.clone()
    }

    async fn from_kube_selection(context: Option<String>) -> Result<Self> {
        let kubeconfig = Kubeconfig::read().ok();

        let config = if let Some(kubeconfig_value) = kubeconfig.clone() {
            let options = KubeConfigOptions {
                context: context.clone(),
                cluster: None,
                user: None,
            };
            Config::from_custom_kubeconfig(kubeconfig_value, &options)
                .await
                .context("failed to infer Kubernetes configuration")?
        } else {
            Config::infer()
                .await
                .context("failed to infer Kubernetes configuration")?
        };

        let cluster_url = config.cluster_url.to_string();
        let default_namespace = config.default_namespace.clone();
        let client = Client::try_from(config).context("failed to initialize Kubernetes client")?;

        let active_context = context
            .or_else(|| {
                kubeconfig
                    .as_ref()
                    .and_then(|cfg| cfg.current_context.clone())
            })
            .unwrap_or_else(|| "in-cluster".to_string());

        Ok(Self {
            client,
            context: active_context,
            cluster: cluster_url,
            default_namespace,
        })
    }

    /// Installation facts merged over the deployment settings. Versions come
    /// from the `*-info` ConfigMaps; a missing ConfigMap means not installed.
    pub async fn fetch_properties(&self, settings: &Settings) -> Result<Properties> {
        let pipelines_version = self
            .info_version(&settings.pipelines_namespace, "pipelines-info")
            .await?;
        let triggers_version = self
            .info_version(&settings.triggers_namespace, "triggers-info")
            .await?;
        let dashboard_version = self
            .info_version(&settings.dashboard_namespace, "dashboard-info")
            .await?;

        Ok(Properties {
            dashboard_version,
            pipelines_version,
            triggers_version,
            ..settings.placeholder_properties()
        })
    }

    async fn info_version(&self, namespace: &str, name: &str) -> Result<Option<String>> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        let config_map = api
            .get_opt(name)
            .await
            .with_context(|| format!("failed to read ConfigMap {namespace}/{name}"))?;
        Ok(config_map.and_then(|config_map| {
            config_map
                .data
                .and_then(|data| data.get("version").cloned())
        }))
    }

    pub async fn fetch_extensions(&self, dashboard_namespace: &str) -> Result<Vec<Extension>> {
        let services: Api<Service> = Api::namespaced(self.client.clone(), dashboard_namespace);
        let list = services
            .list(&list_params().labels(EXTENSION_LABEL))
            .await
            .with_context(|| format!("failed to list extension services in {dashboard_namespace}"))?;
        let mut extensions = list
            .into_iter()
            .map(|service| service_extension(&service))
            .collect::<Vec<_>>();

        match self.fetch_resource_extensions(dashboard_namespace).await {
            Ok(mut typed) => extensions.append(&mut typed),
            Err(error) => debug!("resource extensions unavailable: {error:#}"),
        }

        Ok(extensions)
    }

    async fn fetch_resource_extensions(&self, dashboard_namespace: &str) -> Result<Vec<Extension>> {
        let resource = ResourceType::new(EXTENSION_GROUP, EXTENSION_VERSION, "extensions");
        let api = self.dynamic_api(&resource, Some(dashboard_namespace));
        let list = api.list(&list_params()).await?;
        Ok(list
            .into_iter()
            .filter_map(|object| resource_extension(&object))
            .collect())
    }

    pub async fn fetch_namespaces(&self) -> Result<Vec<String>> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        let list = namespaces
            .list(&list_params())
            .await
            .context("failed to list namespaces")?;
        let mut names = list
            .into_iter()
            .map(|namespace| namespace.name_any())
            .collect::<Vec<_>>();
        names.sort();
        Ok(names)
    }

    pub async fn fetch_pipeline_resources(
        &self,
        scope: &NamespaceSelection,
    ) -> Result<Vec<PipelineResource>> {
        let resource = ResourceKind::PipelineResources.resource_type();
        let api = self.dynamic_api(&resource, scope.named());
        let list = api
            .list(&list_params())
            .await
            .with_context(|| format!("failed to list PipelineResources in {scope}"))?;
        Ok(list
            .into_iter()
            .map(|object| PipelineResource {
                name: object.name_any(),
                namespace: object.namespace().unwrap_or_default(),
                resource_type: string_at(&object.data, &["spec", "type"]).unwrap_or_default(),
            })
            .collect())
    }

    pub async fn fetch_kind_table(
        &self,
        kind: ResourceKind,
        scope: &NamespaceSelection,
    ) -> Result<TableData> {
        let refreshed_at = Local::now();
        let resource = kind.resource_type();
        let namespace = if kind.namespaced() { scope.named() } else { None };
        let list = self
            .dynamic_api(&resource, namespace)
            .list(&list_params())
            .await
            .with_context(|| format!("failed to list {}", kind.title()))?;

        let mut rows = list
            .into_iter()
            .map(|object| kind_row(kind, &object))
            .collect::<Vec<_>>();
        sort_rows(&mut rows);
        Ok(TableData::new(kind_headers(kind), rows, refreshed_at))
    }

    pub async fn fetch_resource_table(
        &self,
        resource: &ResourceType,
        namespace: Option<&str>,
    ) -> Result<TableData> {
        let refreshed_at = Local::now();
        let list = self
            .dynamic_api(resource, namespace)
            .list(&list_params())
            .await
            .with_context(|| format!("failed to list {resource}"))?;

        let mut rows = list
            .into_iter()
            .map(|object| {
                let name = object.name_any();
                let namespace = object.namespace();
                let age = human_age(object.metadata.creation_timestamp.as_ref());
                RowData {
                    name: name.clone(),
                    namespace: namespace.clone(),
                    columns: vec![name, namespace.unwrap_or_else(|| "-".to_string()), age],
                    detail: yaml_detail(&object),
                }
            })
            .collect::<Vec<_>>();
        sort_rows(&mut rows);
        Ok(TableData::new(
            vec![
                "Name".to_string(),
                "Namespace".to_string(),
                "Age".to_string(),
            ],
            rows,
            refreshed_at,
        ))
    }

    pub async fn fetch_crd_table(&self) -> Result<TableData> {
        let refreshed_at = Local::now();
        let crd_api: Api<CustomResourceDefinition> = Api::all(self.client.clone());
        let list = crd_api
            .list(&list_params())
            .await
            .context("failed to list CustomResourceDefinitions")?;
        let mut rows = list
            .into_iter()
            .map(|crd| {
                let name = crd.name_any();
                let kind = crd.spec.names.kind.clone();
                let group = crd.spec.group.clone();
                let scope = crd.spec.scope.clone();
                let versions = crd
                    .spec
                    .versions
                    .iter()
                    .map(|version| version.name.clone())
                    .collect::<Vec<_>>()
                    .join(",");
                let age = human_age(crd.metadata.creation_timestamp.as_ref());

                RowData {
                    name: name.clone(),
                    namespace: None,
                    columns: vec![name, kind, group, scope, versions, age],
                    detail: yaml_detail(&crd),
                }
            })
            .collect::<Vec<_>>();
        sort_rows(&mut rows);

        Ok(TableData::new(
            vec![
                "Name".to_string(),
                "Kind".to_string(),
                "Group".to_string(),
                "Scope".to_string(),
                "Versions".to_string(),
                "Age".to_string(),
            ],
            rows,
            refreshed_at,
        ))
    }

    pub async fn fetch_resource(&self, target: &ResourceRef) -> Result<Option<String>> {
        let object = self
            .dynamic_api(&target.resource, target.namespace.as_deref())
            .get_opt(&target.name)
            .await
            .with_context(|| format!("failed to get {} {}", target.resource, target.name))?;
        Ok(object.map(|object| yaml_detail(&object)))
    }

    pub async fn fetch_run_targets(&self, run_kind: ResourceKind, namespace: &str) -> Result<Vec<String>> {
        let target_kind = run_target_kind(run_kind)?;
        let list = self
            .dynamic_api(&target_kind.resource_type(), Some(namespace))
            .list(&list_params())
            .await
            .with_context(|| format!("failed to list {} in {namespace}", target_kind.title()))?;
        let mut names = list
            .into_iter()
            .map(|object| object.name_any())
            .collect::<Vec<_>>();
        names.sort();
        Ok(names)
    }

    pub async fn fetch_declared_resources(
        &self,
        run_kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<Vec<DeclaredResource>> {
        let target_kind = run_target_kind(run_kind)?;
        let resource = ResourceType::new(target_kind.group(), "v1beta1", target_kind.plural());
        let object = self
            .dynamic_api(&resource, Some(namespace))
            .get(name)
            .await
            .with_context(|| format!("failed to get {} {namespace}/{name}", target_kind.kind()))?;
        Ok(declared_resources(target_kind, &object.data))
    }

    pub async fn create_run(&self, request: &RunRequest) -> Result<String> {
        let body = run_manifest(request)?;
        let resource = ResourceType::new(request.kind.group(), "v1beta1", request.kind.plural());
        let object: DynamicObject =
            serde_json::from_value(body).context("failed to build run manifest")?;
        let created = self
            .dynamic_api(&resource, Some(&request.namespace))
            .create(&PostParams::default(), &object)
            .await
            .with_context(|| {
                format!(
                    "failed to create {} for {}",
                    request.kind.kind(),
                    request.target
                )
            })?;
        Ok(created.name_any())
    }

    pub async fn import_resources(
        &self,
        request: &ImportRequest,
        dashboard_namespace: &str,
    ) -> Result<String> {
        let object: DynamicObject = serde_json::from_value(import_manifest(request, dashboard_namespace))
            .context("failed to build import manifest")?;
        let created = self
            .dynamic_api(&ResourceKind::PipelineRuns.resource_type(), Some(dashboard_namespace))
            .create(&PostParams::default(), &object)
            .await
            .with_context(|| format!("failed to import {}", request.repository_url))?;
        Ok(created.name_any())
    }

    fn dynamic_api(&self, resource: &ResourceType, namespace: Option<&str>) -> Api<DynamicObject> {
        let api_resource = api_resource(resource);
        match namespace {
            Some(namespace) => Api::namespaced_with(self.client.clone(), namespace, &api_resource),
            None => Api::all_with(self.client.clone(), &api_resource),
        }
    }
}

pub fn api_resource(resource: &ResourceType) -> ApiResource {
    let gvk = GroupVersionKind::gvk(resource.api_group(), &resource.version, "");
    ApiResource::from_gvk_with_plural(&gvk, &resource.plural)
}

fn run_target_kind(run_kind: ResourceKind) -> Result<ResourceKind> {
    match run_kind {
        ResourceKind::PipelineRuns => Ok(ResourceKind::Pipelines),
        ResourceKind::TaskRuns => Ok(ResourceKind::Tasks),
        other => anyhow::bail!("{} cannot be created from the dashboard", other.title()),
    }
}

fn service_extension(service: &Service) -> Extension {
    let name = service.name_any();
    let annotations = service.annotations();
    let display_name = annotations
        .get(EXTENSION_DISPLAY_NAME)
        .cloned()
        .unwrap_or_else(|| name.clone());
    let bundle = annotations
        .get(EXTENSION_BUNDLE_LOCATION)
        .cloned()
        .unwrap_or_default();
    let port = service
        .spec
        .as_ref()
        .and_then(|spec| spec.ports.as_ref())
        .and_then(|ports| ports.first())
        .map(|port| port.port);
    let host = match (service.namespace(), port) {
        (Some(namespace), Some(port)) => format!("{name}.{namespace}.svc:{port}"),
        (Some(namespace), None) => format!("{name}.{namespace}.svc"),
        _ => name.clone(),
    };

    Extension {
        name,
        display_name,
        source: format!("http://{host}/{}", bundle.trim_start_matches('/')),
        kind: None,
        resource: None,
    }
}

fn resource_extension(object: &DynamicObject) -> Option<Extension> {
    let api_version = string_at(&object.data, &["spec", "apiVersion"])?;
    let plural = string_at(&object.data, &["spec", "name"])?;
    let display_name = string_at(&object.data, &["spec", "displayname"]).unwrap_or_else(|| plural.clone());
    let namespaced = object
        .data
        .pointer("/spec/namespaced")
        .and_then(Value::as_bool)
        .unwrap_or(true);
    let resource = ResourceType::from_api_version(&api_version, &plural);

    Some(Extension {
        name: object.name_any(),
        display_name,
        source: resource.to_string(),
        kind: Some(Extension::KUBERNETES_RESOURCE.to_string()),
        resource: Some(ExtensionResource {
            resource,
            namespaced,
        }),
    })
}

fn kind_headers(kind: ResourceKind) -> Vec<String> {
    let headers: &[&str] = match kind {
        ResourceKind::PipelineRuns | ResourceKind::TaskRuns | ResourceKind::CustomRuns => {
            &["Name", "Namespace", "Status", "Reason", "Age"]
        }
        ResourceKind::PipelineResources => &["Name", "Namespace", "Type", "Age"],
        ResourceKind::EventListeners => &["Name", "Namespace", "Address", "Age"],
        kind if !kind.namespaced() => &["Name", "Age"],
        _ => &["Name", "Namespace", "Age"],
    };
    headers.iter().map(|header| header.to_string()).collect()
}

fn kind_row(kind: ResourceKind, object: &DynamicObject) -> RowData {
    let name = object.name_any();
    let namespace = object.namespace();
    let namespace_column = namespace.clone().unwrap_or_else(|| "-".to_string());
    let age = human_age(object.metadata.creation_timestamp.as_ref());

    let columns = match kind {
        ResourceKind::PipelineRuns | ResourceKind::TaskRuns | ResourceKind::CustomRuns => {
            let (status, reason) = run_status(&object.data);
            vec![name.clone(), namespace_column, status, reason, age]
        }
        ResourceKind::PipelineResources => vec![
            name.clone(),
            namespace_column,
            string_at(&object.data, &["spec", "type"]).unwrap_or_else(|| "-".to_string()),
            age,
        ],
        ResourceKind::EventListeners => vec![
            name.clone(),
            namespace_column,
            string_at(&object.data, &["status", "address", "url"])
                .unwrap_or_else(|| "-".to_string()),
            age,
        ],
        kind if !kind.namespaced() => vec![name.clone(), age],
        _ => vec![name.clone(), namespace_column, age],
    };

    RowData {
        name,
        namespace,
        columns,
        detail: yaml_detail(object),
    }
}

fn run_status(data: &Value) -> (String, String) {
    let condition = data
        .pointer("/status/conditions")
        .and_then(Value::as_array)
        .and_then(|conditions| {
            conditions
                .iter()
                .find(|condition| condition.get("type").and_then(Value::as_str) == Some("Succeeded"))
        });
    let Some(condition) = condition else {
        return ("Pending".to_string(), "-".to_string());
    };

    let status = match condition.get("status").and_then(Value::as_str) {
        Some("True") => "Succeeded",
        Some("False") => "Failed",
        _ => "Running",
    };
    let reason = condition
        .get("reason")
        .and_then(Value::as_str)
        .unwrap_or("-");
    (status.to_string(), reason.to_string())
}

fn declared_resources(target_kind: ResourceKind, data: &Value) -> Vec<DeclaredResource> {
    let parse = |value: Option<&Value>, output: bool| {
        value
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        Some(DeclaredResource {
                            name: item.get("name")?.as_str()?.to_string(),
                            resource_type: item
                                .get("type")
                                .and_then(Value::as_str)
                                .unwrap_or_default()
                                .to_string(),
                            output,
                        })
                    })
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default()
    };

    match target_kind {
        ResourceKind::Pipelines => parse(data.pointer("/spec/resources"), false),
        _ => {
            let mut declared = parse(data.pointer("/spec/resources/inputs"), false);
            declared.extend(parse(data.pointer("/spec/resources/outputs"), true));
            declared
        }
    }
}

fn run_manifest(request: &RunRequest) -> Result<Value> {
    let binding = |declared: &DeclaredResource, resource: &str| {
        json!({ "name": declared.name, "resourceRef": { "name": resource } })
    };
    let api_version = format!("{}/v1beta1", request.kind.group());
    let metadata = json!({
        "generateName": format!("{}-run-", request.target),
        "namespace": request.namespace,
    });

    let manifest = match request.kind {
        ResourceKind::PipelineRuns => json!({
            "apiVersion": api_version,
            "kind": request.kind.kind(),
            "metadata": metadata,
            "spec": {
                "pipelineRef": { "name": request.target },
                "resources": request
                    .bindings
                    .iter()
                    .map(|(declared, resource)| binding(declared, resource))
                    .collect::<Vec<_>>(),
            },
        }),
        ResourceKind::TaskRuns => {
            let (outputs, inputs): (Vec<_>, Vec<_>) =
                request.bindings.iter().partition(|(declared, _)| declared.output);
            json!({
                "apiVersion": api_version,
                "kind": request.kind.kind(),
                "metadata": metadata,
                "spec": {
                    "taskRef": { "name": request.target },
                    "resources": {
                        "inputs": inputs
                            .iter()
                            .map(|(declared, resource)| binding(declared, resource))
                            .collect::<Vec<_>>(),
                        "outputs": outputs
                            .iter()
                            .map(|(declared, resource)| binding(declared, resource))
                            .collect::<Vec<_>>(),
                    },
                },
            })
        }
        other => anyhow::bail!("{} cannot be created from the dashboard", other.title()),
    };
    Ok(manifest)
}

fn import_manifest(request: &ImportRequest, dashboard_namespace: &str) -> Value {
    let params = json!([
        { "name": "repositoryURL" },
        { "name": "path" },
        { "name": "target-namespace" },
    ]);
    let mut manifest = json!({
        "apiVersion": ResourceKind::PipelineRuns.resource_type().api_version(),
        "kind": "PipelineRun",
        "metadata": {
            "generateName": "import-resources-",
            "namespace": dashboard_namespace,
            "labels": { IMPORT_LABEL: "true" },
        },
        "spec": {
            "params": [
                { "name": "repositoryURL", "value": request.repository_url },
                { "name": "path", "value": request.path },
                { "name": "target-namespace", "value": request.target_namespace },
            ],
            "pipelineSpec": {
                "params": params.clone(),
                "workspaces": [{ "name": "source" }],
                "tasks": [{
                    "name": "import",
                    "workspaces": [{ "name": "source", "workspace": "source" }],
                    "params": [
                        { "name": "repositoryURL", "value": "$(params.repositoryURL)" },
                        { "name": "path", "value": "$(params.path)" },
                        { "name": "target-namespace", "value": "$(params.target-namespace)" },
                    ],
                    "taskSpec": {
                        "params": params,
                        "workspaces": [{ "name": "source" }],
                        "steps": [
                            {
                                "name": "clone",
                                "image": "alpine/git",
                                "script": "git clone \"$(params.repositoryURL)\" \"$(workspaces.source.path)/repo\"",
                            },
                            {
                                "name": "apply",
                                "image": "bitnami/kubectl",
                                "script": "kubectl apply -f \"$(workspaces.source.path)/repo/$(params.path)\" -n \"$(params.target-namespace)\"",
                            },
                        ],
                    },
                }],
            },
            "workspaces": [{ "name": "source", "emptyDir": {} }],
        },
    });

    if let Some(service_account) = &request.service_account
        && let Some(spec) = manifest.get_mut("spec").and_then(Value::as_object_mut)
    {
        spec.insert(
            "taskRunTemplate".to_string(),
            json!({ "serviceAccountName": service_account }),
        );
    }
    manifest
}

fn string_at(data: &Value, path: &[&str]) -> Option<String> {
    let mut current = data;
    for key in path {
        current = current.get(key)?;
    }
    current.as_str().map(str::to_string)
}

fn sort_rows(rows: &mut [RowData]) {
    rows.sort_by(|left, right| {
        left.namespace
            .cmp(&right.namespace)
            .then_with(|| left.name.cmp(&right.name))
    });
}

fn list_params() -> ListParams {
    ListParams::default().limit(500)
}

fn human_age(timestamp: Option<&Time>) -> String {
    let Some(timestamp) = timestamp else {
        return "-".to_string();
    };

    human_age_timestamp(timestamp.0)
}

fn human_age_timestamp(ts: k8s_openapi::jiff::Timestamp) -> String {
    let elapsed_seconds = (k8s_openapi::jiff::Timestamp::now().as_second() - ts.as_second()).max(0);
    format_elapsed_seconds(elapsed_seconds)
}

fn format_elapsed_seconds(seconds: i64) -> String {
    if seconds >= 86_400 {
        return format!("{}d", seconds / 86_400);
    }

    if seconds >= 3_600 {
        return format!("{}h", seconds / 3_600);
    }

    if seconds >= 60 {
        return format!("{}m", seconds / 60);
    }

    format!("{seconds}s")
}

fn yaml_detail<T>(value: &T) -> String
where
    T: Serialize,
{
    serde_yaml::to_string(value).unwrap_or_else(|error| {
        warn!("failed to format detail: {error}");
        format!("failed to format detail: {error}")
    })
}

#[cfg(test)]
mod tests {
    use super::{
        declared_resources, format_elapsed_seconds, import_manifest, kind_headers, kind_row,
        resource_extension, run_manifest, run_status,
    };
    use crate::model::{DeclaredResource, ImportRequest, ResourceKind, RunRequest};
    use kube::core::DynamicObject;
    use serde_json::json;

    fn object(value: serde_json::Value) -> DynamicObject {
        serde_json::from_value(value).expect("valid object")
    }

    #[test]
    fn run_status_reads_succeeded_condition() {
        let running = json!({"status": {"conditions": [
            {"type": "Succeeded", "status": "Unknown", "reason": "Running"}
        ]}});
        assert_eq!(
            run_status(&running),
            ("Running".to_string(), "Running".to_string())
        );
        let failed = json!({"status": {"conditions": [
            {"type": "Succeeded", "status": "False", "reason": "TaskRunTimeout"}
        ]}});
        assert_eq!(run_status(&failed).0, "Failed");
        assert_eq!(run_status(&json!({})).0, "Pending");
    }

    #[test]
    fn pipeline_run_rows_match_headers() {
        let run = object(json!({
            "apiVersion": "tekton.dev/v1",
            "kind": "PipelineRun",
            "metadata": {"name": "build-x1", "namespace": "ci"},
            "status": {"conditions": [{"type": "Succeeded", "status": "True", "reason": "Succeeded"}]}
        }));
        let row = kind_row(ResourceKind::PipelineRuns, &run);
        assert_eq!(row.columns.len(), kind_headers(ResourceKind::PipelineRuns).len());
        assert_eq!(row.columns[2], "Succeeded");
        assert_eq!(row.namespace.as_deref(), Some("ci"));
    }

    #[test]
    fn cluster_kinds_omit_namespace_column() {
        assert_eq!(kind_headers(ResourceKind::ClusterTasks), vec!["Name", "Age"]);
        let task = object(json!({
            "apiVersion": "tekton.dev/v1beta1",
            "kind": "ClusterTask",
            "metadata": {"name": "git-clone"}
        }));
        assert_eq!(kind_row(ResourceKind::ClusterTasks, &task).columns.len(), 2);
    }

    #[test]
    fn task_declares_inputs_and_outputs() {
        let spec = json!({"spec": {"resources": {
            "inputs": [{"name": "source", "type": "git"}],
            "outputs": [{"name": "image", "type": "image"}]
        }}});
        let declared = declared_resources(ResourceKind::Tasks, &spec);
        assert_eq!(declared.len(), 2);
        assert!(!declared[0].output);
        assert!(declared[1].output);
        assert_eq!(declared[1].resource_type, "image");
    }

    #[test]
    fn run_manifest_binds_resources_and_generates_name() {
        let request = RunRequest {
            kind: ResourceKind::TaskRuns,
            namespace: "ci".to_string(),
            target: "build".to_string(),
            bindings: vec![
                (
                    DeclaredResource {
                        name: "source".to_string(),
                        resource_type: "git".to_string(),
                        output: false,
                    },
                    "repo".to_string(),
                ),
                (
                    DeclaredResource {
                        name: "image".to_string(),
                        resource_type: "image".to_string(),
                        output: true,
                    },
                    "registry".to_string(),
                ),
            ],
        };
        let manifest = run_manifest(&request).expect("manifest");
        assert_eq!(manifest["metadata"]["generateName"], "build-run-");
        assert_eq!(manifest["spec"]["taskRef"]["name"], "build");
        assert_eq!(
            manifest["spec"]["resources"]["inputs"][0]["resourceRef"]["name"],
            "repo"
        );
        assert_eq!(
            manifest["spec"]["resources"]["outputs"][0]["name"],
            "image"
        );

        let invalid = RunRequest {
            kind: ResourceKind::Tasks,
            ..request
        };
        assert!(run_manifest(&invalid).is_err());
    }

    #[test]
    fn import_manifest_targets_dashboard_namespace() {
        let request = ImportRequest {
            repository_url: "https://github.com/org/repo".to_string(),
            path: "tekton".to_string(),
            target_namespace: "ci".to_string(),
            service_account: Some("importer".to_string()),
        };
        let manifest = import_manifest(&request, "tekton-pipelines");
        assert_eq!(manifest["metadata"]["namespace"], "tekton-pipelines");
        assert_eq!(manifest["spec"]["params"][2]["value"], "ci");
        assert_eq!(
            manifest["spec"]["taskRunTemplate"]["serviceAccountName"],
            "importer"
        );
        let parsed: DynamicObject = serde_json::from_value(manifest).expect("dynamic object");
        assert_eq!(parsed.metadata.generate_name.as_deref(), Some("import-resources-"));
    }

    #[test]
    fn resource_extensions_are_typed() {
        let extension = object(json!({
            "apiVersion": "dashboard.tekton.dev/v1alpha1",
            "kind": "Extension",
            "metadata": {"name": "deployments", "namespace": "tekton-pipelines"},
            "spec": {"apiVersion": "apps/v1", "name": "deployments", "displayname": "Deployments"}
        }));
        let parsed = resource_extension(&extension).expect("extension");
        assert!(!parsed.is_page());
        assert_eq!(parsed.display_name, "Deployments");
        let resource = parsed.resource.expect("resource");
        assert!(resource.namespaced);
        assert_eq!(resource.resource.api_version(), "apps/v1");
    }

    #[test]
    fn elapsed_seconds_use_largest_unit() {
        assert_eq!(format_elapsed_seconds(42), "42s");
        assert_eq!(format_elapsed_seconds(3_700), "1h");
        assert_eq!(format_elapsed_seconds(200_000), "2d");
    }
}
