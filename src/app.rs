use crate::config::{ConfigLoadError, Settings};
use crate::dropdown::{PipelineResourceCache, PipelineResourcesDropdown};
use crate::i18n::Messages;
use crate::input::Action;
use crate::model::{
    DeclaredResource, Extension, ImportRequest, PipelineResource, Properties, ResourceKind,
    ResourceRef, ResourceType, RowData, RunRequest, TableData,
};
use crate::namespace::{NamespaceContext, NamespaceSelection};
use crate::query::{QueryCache, QueryEntry};
use crate::routes::{NamespacedMatch, Resolution, RouteTable, View, normalize_path, paths};
use chrono::Local;
use tracing::{debug, info, warn};

const HISTORY_LIMIT: usize = 64;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum InputMode {
    Normal,
    Command,
    Filter,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FocusPane {
    SideNav,
    Content,
}

/// Routes are mounted only in `Ready`. The loading state tracks which of the
/// two configuration fetches have settled, successfully or not.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ShellPhase {
    LoadingConfig {
        properties_settled: bool,
        messages_settled: bool,
    },
    Ready,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    None,
    LoadMessages { locale: String, pseudo: bool },
    CreateRun(RunRequest),
    ImportResources(ImportRequest),
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum TableSource {
    Kind {
        kind: ResourceKind,
        scope: NamespaceSelection,
    },
    Resource {
        resource: ResourceType,
        namespace: Option<String>,
    },
    CustomResourceDefinitions,
    Extensions,
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum ListKey {
    Namespaces,
    RunTargets {
        kind: ResourceKind,
        namespace: String,
    },
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct DeclaredKey {
    pub kind: ResourceKind,
    pub namespace: String,
    pub name: String,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Fetch {
    Extensions { namespace: String },
    List(ListKey),
    Table(TableSource),
    Resource(ResourceRef),
    PipelineResources(NamespaceSelection),
    DeclaredResources(DeclaredKey),
    Properties(Settings),
}

#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Extensions {
        namespace: String,
        result: Result<Vec<Extension>, String>,
    },
    List {
        key: ListKey,
        result: Result<Vec<String>, String>,
    },
    Table {
        source: TableSource,
        result: Result<TableData, String>,
    },
    Resource {
        target: ResourceRef,
        result: Result<Option<String>, String>,
    },
    PipelineResources {
        scope: NamespaceSelection,
        result: Result<Vec<PipelineResource>, String>,
    },
    DeclaredResources {
        key: DeclaredKey,
        result: Result<Vec<DeclaredResource>, String>,
    },
    Properties {
        result: Result<Properties, String>,
    },
}

#[derive(Debug, Clone)]
pub enum ShellEvent {
    Properties(Result<Properties, ConfigLoadError>),
    Messages {
        locale: String,
        result: Result<Messages, ConfigLoadError>,
    },
    Fetched(FetchOutcome),
    RunCreated {
        kind: ResourceKind,
        namespace: String,
        result: Result<String, String>,
    },
    Imported(Result<String, String>),
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct NavItem {
    pub label: String,
    pub path: String,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CreateRunForm {
    pub kind: ResourceKind,
    pub namespace: Option<String>,
    pub target_cursor: usize,
    pub target: Option<String>,
    pub declared: Vec<DeclaredResource>,
    pub dropdowns: Vec<PipelineResourcesDropdown>,
    pub field: usize,
    pub picking: bool,
}

impl CreateRunForm {
    fn new(kind: ResourceKind, namespace: Option<String>) -> Self {
        Self {
            kind,
            namespace,
            target_cursor: 0,
            target: None,
            declared: Vec::new(),
            dropdowns: Vec::new(),
            field: 0,
            picking: false,
        }
    }

    fn clear_target(&mut self) {
        self.target = None;
        self.declared.clear();
        self.dropdowns.clear();
        self.field = 0;
        self.picking = false;
    }

    fn targets_key(&self) -> Option<ListKey> {
        Some(ListKey::RunTargets {
            kind: self.kind,
            namespace: self.namespace.clone()?,
        })
    }

    fn declared_key(&self) -> Option<DeclaredKey> {
        Some(DeclaredKey {
            kind: self.kind,
            namespace: self.namespace.clone()?,
            name: self.target.clone()?,
        })
    }
}

pub struct App {
    running: bool,
    mode: InputMode,
    focus: FocusPane,
    input: String,
    filter: String,
    status: String,
    show_help: bool,
    cluster: String,
    context: String,
    phase: ShellPhase,
    settings: Settings,
    properties: Properties,
    properties_stale: bool,
    messages: Messages,
    requested_locale: String,
    banner: Vec<ConfigLoadError>,
    namespaces: NamespaceContext,
    namespace_picker: Option<usize>,
    routes: RouteTable,
    location: String,
    history: Vec<String>,
    resolution: Resolution,
    last_namespaced_match: Option<NamespacedMatch>,
    side_nav_expanded: bool,
    nav_cursor: usize,
    detail_scroll: u16,
    extensions: QueryCache<String, Vec<Extension>>,
    lists: QueryCache<ListKey, Vec<String>>,
    tables: QueryCache<TableSource, TableData>,
    resources: QueryCache<ResourceRef, Option<String>>,
    pipeline_resources: PipelineResourceCache,
    declared: QueryCache<DeclaredKey, Vec<DeclaredResource>>,
    create_form: Option<CreateRunForm>,
    last_import: Option<String>,
}

impl App {
    pub fn new(settings: Settings, selection: NamespaceSelection, initial_path: &str) -> Self {
        let properties = settings.placeholder_properties();
        let namespaces = NamespaceContext::new(selection);
        let routes = RouteTable::new(&[]);
        let resolution = routes.resolve(initial_path, &namespaces, properties.is_read_only);

        Self {
            running: true,
            mode: InputMode::Normal,
            focus: FocusPane::Content,
            input: String::new(),
            filter: String::new(),
            status: "Loading configuration".to_string(),
            show_help: false,
            cluster: String::new(),
            context: String::new(),
            phase: ShellPhase::LoadingConfig {
                properties_settled: false,
                messages_settled: false,
            },
            messages: Messages::empty(settings.locale.clone()),
            requested_locale: settings.locale.clone(),
            settings,
            properties,
            properties_stale: false,
            banner: Vec::new(),
            namespaces,
            namespace_picker: None,
            routes,
            location: resolution.path.clone(),
            history: Vec::new(),
            resolution,
            last_namespaced_match: None,
            side_nav_expanded: true,
            nav_cursor: 0,
            detail_scroll: 0,
            extensions: QueryCache::new(),
            lists: QueryCache::new(),
            tables: QueryCache::new(),
            resources: QueryCache::new(),
            pipeline_resources: PipelineResourceCache::new(),
            declared: QueryCache::new(),
            create_form: None,
            last_import: None,
        }
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn focus(&self) -> FocusPane {
        self.focus
    }

    pub fn phase(&self) -> ShellPhase {
        self.phase
    }

    pub fn is_ready(&self) -> bool {
        self.phase == ShellPhase::Ready
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn show_help(&self) -> bool {
        self.show_help
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn set_kube_target(&mut self, cluster: impl Into<String>, context: impl Into<String>) {
        self.cluster = cluster.into();
        self.context = context.into();
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn messages(&self) -> &Messages {
        &self.messages
    }

    pub fn requested_locale(&self) -> &str {
        &self.requested_locale
    }

    pub fn banner(&self) -> &[ConfigLoadError] {
        &self.banner
    }

    pub fn namespaces(&self) -> &NamespaceContext {
        &self.namespaces
    }

    pub fn namespace_picker(&self) -> Option<usize> {
        self.namespace_picker
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn resolution(&self) -> &Resolution {
        &self.resolution
    }

    pub fn last_namespaced_match(&self) -> Option<&NamespacedMatch> {
        self.last_namespaced_match.as_ref()
    }

    pub fn side_nav_expanded(&self) -> bool {
        self.side_nav_expanded
    }

    pub fn nav_cursor(&self) -> usize {
        self.nav_cursor
    }

    pub fn detail_scroll(&self) -> u16 {
        self.detail_scroll
    }

    pub fn create_form(&self) -> Option<&CreateRunForm> {
        self.create_form.as_ref()
    }

    pub fn last_import(&self) -> Option<&str> {
        self.last_import.as_deref()
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = normalize_status_text(status.into());
    }

    pub fn extension_list(&self) -> &[Extension] {
        self.extensions
            .get(&self.properties.dashboard_namespace)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn extension(&self, name: &str) -> Option<&Extension> {
        self.extension_list()
            .iter()
            .find(|extension| extension.name == name)
    }

    pub fn namespace_options(&self) -> Vec<NamespaceSelection> {
        let mut options = vec![NamespaceSelection::All];
        if let Some(names) = self.lists.get(&ListKey::Namespaces) {
            options.extend(names.iter().cloned().map(NamespaceSelection::Named));
        }
        options
    }

    pub fn namespaces_loading(&self) -> bool {
        self.lists.is_loading(&ListKey::Namespaces)
    }

    pub fn nav_items(&self) -> Vec<NavItem> {
        let selected = self.namespaces.selected();
        let mut items = ResourceKind::ALL
            .into_iter()
            .filter(|kind| !kind.is_triggers() || self.properties.triggers_installed())
            .map(|kind| NavItem {
                label: self.messages.text(kind.nav_message_id(), kind.title()),
                path: paths::list(kind, selected),
            })
            .collect::<Vec<_>>();

        for extension in self.extension_list() {
            let path = match &extension.resource {
                Some(typed) if typed.namespaced => paths::kubernetes_list(&typed.resource, selected),
                Some(typed) => paths::kubernetes_list(&typed.resource, &NamespaceSelection::All),
                None => paths::extension(&extension.name),
            };
            items.push(NavItem {
                label: extension.display_name.clone(),
                path,
            });
        }

        items.push(NavItem {
            label: self
                .messages
                .text("dashboard.sideNav.extensions", "Extensions"),
            path: paths::EXTENSIONS.to_string(),
        });
        if !self.properties.is_read_only {
            items.push(NavItem {
                label: self
                    .messages
                    .text("dashboard.sideNav.importResources", "Import resources"),
                path: paths::IMPORT_RESOURCES.to_string(),
            });
        }
        items.push(NavItem {
            label: self.messages.text("dashboard.sideNav.about", "About"),
            path: paths::ABOUT.to_string(),
        });
        items.push(NavItem {
            label: self.messages.text("dashboard.sideNav.settings", "Settings"),
            path: paths::SETTINGS.to_string(),
        });
        items
    }

    pub fn nav_active_index(&self) -> Option<usize> {
        let current = match &self.resolution.view {
            View::ResourceDetail(kind) | View::CreateRun(kind) => View::ResourceList(*kind),
            View::KubernetesDetail => View::KubernetesList,
            View::CustomResourceDefinition => View::CustomResourceDefinitions,
            other => other.clone(),
        };
        self.nav_items().iter().position(|item| {
            let (entry, params) = self.routes.match_path(&item.path);
            entry.view == current
                && (current != View::KubernetesList
                    || params.get("type").map(String::as_str) == self.resolution.param("type"))
        })
    }

    pub fn active_table_source(&self) -> Option<TableSource> {
        match &self.resolution.view {
            View::ResourceList(kind) => {
                let scope = if kind.namespaced() {
                    self.resolution
                        .namespace
                        .clone()
                        .unwrap_or(NamespaceSelection::All)
                } else {
                    NamespaceSelection::All
                };
                Some(TableSource::Kind { kind: *kind, scope })
            }
            View::KubernetesList => {
                let resource = self.resolution.resource_type()?;
                let namespace = if self.is_namespaced_type(&resource) {
                    self.resolution
                        .namespace
                        .as_ref()
                        .and_then(NamespaceSelection::named)
                        .map(str::to_string)
                } else {
                    None
                };
                Some(TableSource::Resource {
                    resource,
                    namespace,
                })
            }
            View::CustomResourceDefinitions => Some(TableSource::CustomResourceDefinitions),
            View::Extensions => Some(TableSource::Extensions),
            _ => None,
        }
    }

    pub fn active_resource_ref(&self) -> Option<ResourceRef> {
        let name = self.resolution.param("name")?.to_string();
        let namespace = self.resolution.param("namespace").map(str::to_string);
        let resource = match &self.resolution.view {
            View::ResourceDetail(kind) => kind.resource_type(),
            View::KubernetesDetail => self.resolution.resource_type()?,
            View::CustomResourceDefinition => ResourceType::custom_resource_definitions(),
            _ => return None,
        };
        Some(ResourceRef {
            resource,
            namespace,
            name,
        })
    }

    pub fn active_table_entry(&self) -> Option<&QueryEntry<TableData>> {
        self.tables.entry(&self.active_table_source()?)
    }

    pub fn active_table(&self) -> Option<&TableData> {
        self.tables.get(&self.active_table_source()?)
    }

    pub fn active_visible_rows(&self) -> Vec<&RowData> {
        self.active_table()
            .map(|table| visible_rows(table, &self.filter))
            .unwrap_or_default()
    }

    pub fn active_selected_index(&self) -> Option<usize> {
        let table = self.active_table()?;
        let len = visible_rows(table, &self.filter).len();
        (len > 0).then(|| table.selected.min(len - 1))
    }

    pub fn active_selected_row(&self) -> Option<&RowData> {
        let index = self.active_selected_index()?;
        self.active_visible_rows().get(index).copied()
    }

    pub fn active_resource_entry(&self) -> Option<&QueryEntry<Option<String>>> {
        self.resources.entry(&self.active_resource_ref()?)
    }

    pub fn run_targets_entry(&self) -> Option<&QueryEntry<Vec<String>>> {
        self.lists.entry(&self.create_form.as_ref()?.targets_key()?)
    }

    pub fn declared_entry(&self) -> Option<&QueryEntry<Vec<DeclaredResource>>> {
        self.declared
            .entry(&self.create_form.as_ref()?.declared_key()?)
    }

    pub fn dropdown_items(&self, dropdown: &PipelineResourcesDropdown) -> Vec<String> {
        dropdown.items(&self.pipeline_resources, &self.namespaces)
    }

    pub fn dropdown_loading(&self, dropdown: &PipelineResourcesDropdown) -> bool {
        dropdown.is_loading(&self.pipeline_resources, &self.namespaces)
    }

    pub fn dropdown_error(&self, dropdown: &PipelineResourcesDropdown) -> Option<&str> {
        dropdown.error(&self.pipeline_resources, &self.namespaces)
    }

    pub fn apply_shell_event(&mut self, event: ShellEvent) {
        match event {
            ShellEvent::Properties(result) => self.apply_properties(result),
            ShellEvent::Messages { locale, result } => self.apply_messages(&locale, result),
            ShellEvent::Fetched(outcome) => self.apply_fetch(outcome),
            ShellEvent::RunCreated {
                kind,
                namespace,
                result,
            } => match result {
                Ok(name) => {
                    info!("created {} {namespace}/{name}", kind.kind());
                    self.set_status(format!("Created {} {namespace}/{name}", kind.kind()));
                    self.tables.invalidate_where(|source| {
                        matches!(source, TableSource::Kind { kind: listed, .. } if *listed == kind)
                    });
                    self.navigate(&paths::by_name(kind, Some(&namespace), &name));
                }
                Err(error) => {
                    self.set_status(format!(
                        "Failed creating {}: {}",
                        kind.kind(),
                        summarize_error_line(&error)
                    ));
                }
            },
            ShellEvent::Imported(result) => match result {
                Ok(name) => {
                    info!("import started as PipelineRun {name}");
                    self.set_status(format!("Import started: PipelineRun {name}"));
                    self.last_import = Some(name);
                }
                Err(error) => {
                    self.set_status(format!("Import failed: {}", summarize_error_line(&error)));
                }
            },
        }
    }

    fn apply_properties(&mut self, result: Result<Properties, ConfigLoadError>) {
        match result {
            Ok(properties) => {
                debug!("dashboard properties loaded: {properties:?}");
                self.properties = properties;
            }
            Err(error) => {
                warn!("{error}");
                self.push_banner(error);
            }
        }

        if let ShellPhase::LoadingConfig {
            properties_settled, ..
        } = &mut self.phase
        {
            *properties_settled = true;
        }
        self.settle_phase();
    }

    fn apply_messages(&mut self, locale: &str, result: Result<Messages, ConfigLoadError>) {
        if locale != self.requested_locale {
            debug!(
                "ignoring messages for superseded locale '{locale}' (requested '{}')",
                self.requested_locale
            );
            return;
        }

        match result {
            Ok(messages) => {
                debug!(
                    "loaded {} messages for '{}' (requested '{locale}')",
                    messages.len(),
                    messages.locale()
                );
                self.messages = messages;
            }
            Err(error) => {
                warn!("{error}");
                self.push_banner(error);
            }
        }

        if let ShellPhase::LoadingConfig {
            messages_settled, ..
        } = &mut self.phase
        {
            *messages_settled = true;
        }
        self.settle_phase();
    }

    fn settle_phase(&mut self) {
        if let ShellPhase::LoadingConfig {
            properties_settled: true,
            messages_settled: true,
        } = self.phase
        {
            self.phase = ShellPhase::Ready;
            info!("configuration loaded, mounting routes");
            self.apply_tenant();
            self.refresh_resolution();
            self.set_status(format!("Ready: {}", self.location));
        }
    }

    fn apply_tenant(&mut self) {
        let tenant = self.properties.tenant_namespace.clone();
        if self.namespaces.enforce_tenant(tenant) {
            info!(
                "namespace locked to tenant namespace '{}'",
                self.namespaces.selected()
            );
        }
    }

    fn push_banner(&mut self, error: ConfigLoadError) {
        if !self.banner.contains(&error) {
            self.banner.push(error);
        }
    }

    pub fn dismiss_banner(&mut self) {
        self.banner.clear();
    }

    /// Queries the mounted views need and that are neither fresh nor in
    /// flight. Each returned fetch is marked in flight.
    pub fn take_fetches(&mut self) -> Vec<Fetch> {
        if !self.is_ready() {
            return Vec::new();
        }

        let mut fetches = Vec::new();
        if self.properties_stale {
            self.properties_stale = false;
            fetches.push(Fetch::Properties(self.settings.clone()));
        }
        let dashboard_namespace = self.properties.dashboard_namespace.clone();
        if start_fetch(&mut self.extensions, dashboard_namespace.clone()) {
            fetches.push(Fetch::Extensions {
                namespace: dashboard_namespace,
            });
        }
        if !self.namespaces.is_locked() && start_fetch(&mut self.lists, ListKey::Namespaces) {
            fetches.push(Fetch::List(ListKey::Namespaces));
        }

        if !self.resolution.is_rendered() {
            return fetches;
        }

        if let Some(source) = self.active_table_source()
            && source != TableSource::Extensions
            && start_fetch(&mut self.tables, source.clone())
        {
            fetches.push(Fetch::Table(source));
        }
        if let Some(target) = self.active_resource_ref()
            && start_fetch(&mut self.resources, target.clone())
        {
            fetches.push(Fetch::Resource(target));
        }

        if let Some(form) = &self.create_form {
            if let Some(key) = form.targets_key()
                && start_fetch(&mut self.lists, key.clone())
            {
                fetches.push(Fetch::List(key));
            }
            if let Some(key) = form.declared_key()
                && start_fetch(&mut self.declared, key.clone())
            {
                fetches.push(Fetch::DeclaredResources(key));
            }
            for dropdown in &form.dropdowns {
                let scope = dropdown.scope(&self.namespaces);
                if start_fetch(&mut self.pipeline_resources, scope.clone()) {
                    fetches.push(Fetch::PipelineResources(scope));
                }
            }
        }

        fetches
    }

    fn apply_fetch(&mut self, outcome: FetchOutcome) {
        match outcome {
            FetchOutcome::Extensions { namespace, result } => {
                if let Err(error) = &result {
                    self.set_status(format!(
                        "Failed loading extensions: {}",
                        summarize_error_line(error)
                    ));
                }
                self.extensions.resolve(namespace, result);
                self.rebuild_routes();
            }
            FetchOutcome::List { key, result } => {
                if let Err(error) = &result {
                    warn!("list {key:?} failed: {error}");
                }
                self.lists.resolve(key, result);
            }
            FetchOutcome::Table { source, result } => {
                let selected = self
                    .tables
                    .get(&source)
                    .map(|table| table.selected)
                    .unwrap_or(0);
                let result = result.map(|mut table| {
                    table.selected = selected.min(table.rows.len().saturating_sub(1));
                    table
                });
                self.tables.resolve(source, result);
            }
            FetchOutcome::Resource { target, result } => {
                let missing = matches!(result, Ok(None));
                self.resources.resolve(target.clone(), result);
                if missing && self.active_resource_ref().as_ref() == Some(&target) {
                    self.redirect_missing(&target);
                }
            }
            FetchOutcome::PipelineResources { scope, result } => {
                self.pipeline_resources.resolve(scope, result);
            }
            FetchOutcome::DeclaredResources { key, result } => {
                self.declared.resolve(key, result);
                self.sync_form_dropdowns();
            }
            FetchOutcome::Properties { result } => self.refresh_properties(result),
        }
    }

    // Properties re-read while ready: no return to the loading phase.
    fn refresh_properties(&mut self, result: Result<Properties, String>) {
        match result {
            Ok(properties) => {
                if properties != self.properties {
                    info!("dashboard properties changed: {properties:?}");
                }
                self.properties = properties;
                self.apply_tenant();
                self.refresh_resolution();
            }
            Err(error) => {
                warn!("properties refresh failed: {error}");
                self.push_banner(ConfigLoadError::Properties(error));
            }
        }
    }

    fn redirect_missing(&mut self, target: &ResourceRef) {
        let Some(redirect) = self
            .settings
            .redirect_policy
            .redirect_for(&self.resolution, false)
        else {
            return;
        };
        // The variant has no namespace segment, so the context must say all.
        if let Err(locked) = self.namespaces.select(NamespaceSelection::All) {
            debug!("not redirecting {}: {locked}", target.name);
            return;
        }
        info!(
            "{} {} not found, redirecting to {redirect}",
            target.resource, target.name
        );
        self.replace_location(&redirect);
        self.set_status(format!(
            "{} not found in namespace {}, showing {redirect}",
            target.name,
            target.namespace.as_deref().unwrap_or("-")
        ));
    }

    fn rebuild_routes(&mut self) {
        let extensions = self.extension_list().to_vec();
        self.routes = RouteTable::new(&extensions);
        debug!(
            "route table rebuilt with {} extension routes",
            self.routes.extension_routes().len()
        );
        self.tables
            .insert(TableSource::Extensions, extensions_table(&extensions));
        self.refresh_resolution();
    }

    pub fn handle_reconnect(&mut self) -> usize {
        let count = self.extensions.invalidate_all()
            + self.lists.invalidate_all()
            + self.tables.invalidate_all()
            + self.resources.invalidate_all()
            + self.pipeline_resources.invalidate_all()
            + self.declared.invalidate_all()
            + 1;
        self.properties_stale = true;
        info!("realtime channel reconnected, invalidated {count} queries");
        self.set_status(format!("Reconnected, refreshing {count} queries"));
        count
    }

    pub fn handle_resource_changed(&mut self, kind: ResourceKind) {
        self.tables.invalidate_where(
            |source| matches!(source, TableSource::Kind { kind: changed, .. } if *changed == kind),
        );
        let resource = kind.resource_type();
        self.resources
            .invalidate_where(|target| target.resource == resource);
    }

    pub fn on_tick(&mut self) {
        if let Some(source) = self.active_table_source() {
            self.tables.invalidate(&source);
        }
        if let Some(target) = self.active_resource_ref() {
            self.resources.invalidate(&target);
        }
    }

    /// Applies hot-reloaded settings. Namespace and read-only facts come from
    /// the properties loaded at startup and are not re-applied here.
    pub fn apply_settings(&mut self, settings: Settings) -> AppCommand {
        let locale_changed = settings.locale != self.settings.locale;
        let pseudo_changed = settings.pseudo_localize != self.settings.pseudo_localize;
        let catalogs_changed = settings.catalogs_changed(&self.settings);
        if settings.tenant_namespace != self.settings.tenant_namespace
            || settings.read_only != self.settings.read_only
        {
            warn!("tenant_namespace and read_only changes apply after a restart");
        }
        info!(
            "settings reloaded from {}",
            settings.source.as_deref().unwrap_or("defaults")
        );
        self.settings = settings;

        if locale_changed {
            self.requested_locale = self.settings.locale.clone();
        }
        if locale_changed || pseudo_changed || catalogs_changed {
            return self.load_messages_command();
        }
        AppCommand::None
    }

    fn load_messages_command(&self) -> AppCommand {
        AppCommand::LoadMessages {
            locale: self.requested_locale.clone(),
            pseudo: self.settings.pseudo_localize,
        }
    }

    pub fn navigate(&mut self, path: &str) {
        let path = normalize_path(path);
        if path != self.location {
            self.history.push(self.location.clone());
            if self.history.len() > HISTORY_LIMIT {
                self.history.remove(0);
            }
        }
        self.location = path;
        self.after_location_change();
    }

    fn replace_location(&mut self, path: &str) {
        self.location = normalize_path(path);
        self.after_location_change();
    }

    fn go_back(&mut self) -> bool {
        let Some(previous) = self.history.pop() else {
            return false;
        };
        self.location = previous;
        self.after_location_change();
        true
    }

    fn after_location_change(&mut self) {
        self.filter.clear();
        self.detail_scroll = 0;
        self.refresh_resolution();
        debug!("location={} view={:?}", self.location, self.resolution.view);
    }

    fn refresh_resolution(&mut self) {
        self.resolution =
            self.routes
                .resolve(&self.location, &self.namespaces, self.properties.is_read_only);
        self.location = self.resolution.path.clone();
        if let Some(matched) = self.resolution.namespaced_match() {
            self.last_namespaced_match = Some(matched);
        }

        match (&self.resolution.view, self.resolution.is_rendered()) {
            (View::CreateRun(kind), true) => {
                let namespace = self.namespaces.selected().named().map(str::to_string);
                let stale = self
                    .create_form
                    .as_ref()
                    .is_none_or(|form| form.kind != *kind || form.namespace != namespace);
                if stale {
                    self.create_form = Some(CreateRunForm::new(*kind, namespace));
                }
            }
            _ => self.create_form = None,
        }
    }

    fn select_namespace(&mut self, selection: NamespaceSelection) {
        match self.namespaces.select(selection.clone()) {
            Err(locked) => self.set_status(locked.to_string()),
            Ok(false) => self.set_status(format!("Namespace already {selection}")),
            Ok(true) => {
                info!("selected namespace {selection}");
                let relocated = self
                    .resolution
                    .param("namespace")
                    .and_then(|_| self.resolution.relocate(&selection));
                match relocated {
                    Some(path) => self.navigate(&path),
                    None => self.refresh_resolution(),
                }
                self.set_status(format!("Namespace: {selection}"));
            }
        }
    }

    fn is_namespaced_type(&self, resource: &ResourceType) -> bool {
        self.extension_list()
            .iter()
            .filter_map(|extension| extension.resource.as_ref())
            .find(|typed| &typed.resource == resource)
            .is_none_or(|typed| typed.namespaced)
    }

    fn sync_form_dropdowns(&mut self) {
        let Some(key) = self.create_form.as_ref().and_then(CreateRunForm::declared_key) else {
            return;
        };
        let Some(declared) = self.declared.get(&key).cloned() else {
            return;
        };
        if let Some(form) = &mut self.create_form
            && form.declared != declared
        {
            form.dropdowns = declared
                .iter()
                .map(|resource| {
                    PipelineResourcesDropdown::new(
                        resource.name.clone(),
                        Some(resource.resource_type.clone()),
                        form.namespace.clone(),
                    )
                })
                .collect();
            form.declared = declared;
            form.field = 0;
        }
    }

    pub fn apply_action(&mut self, action: Action) -> AppCommand {
        if self.show_help && !matches!(action, Action::ToggleHelp) {
            self.show_help = false;
        }

        if !self.is_ready() {
            return match action {
                Action::Quit => {
                    self.running = false;
                    AppCommand::None
                }
                Action::DismissBanner => {
                    self.dismiss_banner();
                    AppCommand::None
                }
                _ => {
                    self.set_status("Loading configuration");
                    AppCommand::None
                }
            };
        }

        match action {
            Action::Quit => {
                self.running = false;
                self.status = "Exit requested".to_string();
                AppCommand::None
            }
            Action::Down => self.move_cursor(1),
            Action::Up => self.move_cursor(-1),
            Action::PageDown => self.move_cursor(10),
            Action::PageUp => self.move_cursor(-10),
            Action::Top => self.move_cursor(isize::MIN / 2),
            Action::Bottom => self.move_cursor(isize::MAX / 2),
            Action::ToggleHelp => {
                self.show_help = !self.show_help;
                AppCommand::None
            }
            Action::ToggleFocus => {
                self.focus = match self.focus {
                    FocusPane::Content if self.side_nav_expanded => FocusPane::SideNav,
                    _ => FocusPane::Content,
                };
                if self.focus == FocusPane::SideNav {
                    self.nav_cursor = self.nav_active_index().unwrap_or(self.nav_cursor);
                }
                AppCommand::None
            }
            Action::ToggleSideNav => {
                self.side_nav_expanded = !self.side_nav_expanded;
                if !self.side_nav_expanded {
                    self.focus = FocusPane::Content;
                }
                AppCommand::None
            }
            Action::Enter => self.enter(),
            Action::Back => {
                self.back();
                AppCommand::None
            }
            Action::StartCommand => {
                self.mode = InputMode::Command;
                self.input.clear();
                self.status = "Command mode (:help for commands)".to_string();
                AppCommand::None
            }
            Action::StartFilter => {
                self.mode = InputMode::Filter;
                self.input = self.filter.clone();
                self.status = "Filter mode".to_string();
                AppCommand::None
            }
            Action::Refresh => {
                self.on_tick();
                self.set_status(format!("Refreshing {}", self.location));
                AppCommand::None
            }
            Action::DismissBanner => {
                self.dismiss_banner();
                AppCommand::None
            }
            Action::PickNamespace => {
                self.open_namespace_picker();
                AppCommand::None
            }
            Action::CreateRun => {
                let kind = match self.resolution.view {
                    View::ResourceList(ResourceKind::TaskRuns)
                    | View::ResourceList(ResourceKind::Tasks) => ResourceKind::TaskRuns,
                    _ => ResourceKind::PipelineRuns,
                };
                self.navigate(&paths::create(kind));
                AppCommand::None
            }
            Action::SubmitInput => self.submit_input(),
            Action::CancelInput => {
                self.mode = InputMode::Normal;
                self.input.clear();
                self.status = "Input cancelled".to_string();
                AppCommand::None
            }
            Action::Backspace => {
                self.input.pop();
                if self.mode == InputMode::Filter {
                    self.set_filter(self.input.clone());
                }
                AppCommand::None
            }
            Action::InputChar(c) => {
                self.input.push(c);
                if self.mode == InputMode::Filter {
                    self.set_filter(self.input.clone());
                }
                AppCommand::None
            }
        }
    }

    fn set_filter(&mut self, filter: String) {
        self.filter = filter;
        if let Some(source) = self.active_table_source()
            && let Some(table) = self.tables.get_mut(&source)
        {
            table.selected = 0;
        }
    }

    fn open_namespace_picker(&mut self) {
        if let Some(tenant) = self.namespaces.tenant() {
            self.set_status(format!("Namespace is locked to '{tenant}'"));
            return;
        }
        let current = self.namespaces.selected().clone();
        let cursor = self
            .namespace_options()
            .iter()
            .position(|option| *option == current)
            .unwrap_or(0);
        self.namespace_picker = Some(cursor);
    }

    fn move_cursor(&mut self, delta: isize) -> AppCommand {
        if let Some(cursor) = self.namespace_picker {
            let len = self.namespace_options().len();
            self.namespace_picker = Some(step(cursor, delta, len));
            return AppCommand::None;
        }

        if self.create_form.is_some() && self.focus == FocusPane::Content {
            self.move_form_cursor(delta);
            return AppCommand::None;
        }

        if self.focus == FocusPane::SideNav {
            let len = self.nav_items().len();
            self.nav_cursor = step(self.nav_cursor, delta, len);
            return AppCommand::None;
        }

        if let Some(source) = self.active_table_source() {
            let len = self.active_visible_rows().len();
            if let Some(table) = self.tables.get_mut(&source) {
                table.selected = step(table.selected, delta, len);
            }
            return AppCommand::None;
        }

        self.detail_scroll = if delta < 0 {
            self.detail_scroll
                .saturating_sub(delta.unsigned_abs().min(u16::MAX as usize) as u16)
        } else {
            self.detail_scroll
                .saturating_add(delta.min(u16::MAX as isize) as u16)
        };
        AppCommand::None
    }

    fn move_form_cursor(&mut self, delta: isize) {
        let target_count = self
            .run_targets_entry()
            .and_then(QueryEntry::data)
            .map(Vec::len)
            .unwrap_or(0);
        let picking_len = self
            .create_form
            .as_ref()
            .filter(|form| form.picking)
            .and_then(|form| form.dropdowns.get(form.field))
            .map(|dropdown| self.dropdown_items(dropdown).len());

        let Some(form) = &mut self.create_form else {
            return;
        };
        if let Some(len) = picking_len {
            if let Some(dropdown) = form.dropdowns.get_mut(form.field) {
                dropdown.move_cursor(delta, len);
            }
        } else if form.target.is_none() {
            form.target_cursor = step(form.target_cursor, delta, target_count);
        } else {
            form.field = step(form.field, delta, form.dropdowns.len() + 1);
        }
    }

    fn enter(&mut self) -> AppCommand {
        if let Some(cursor) = self.namespace_picker.take() {
            if let Some(selection) = self.namespace_options().get(cursor).cloned() {
                self.select_namespace(selection);
            }
            return AppCommand::None;
        }

        if self.focus == FocusPane::SideNav {
            if let Some(item) = self.nav_items().get(self.nav_cursor).cloned() {
                self.focus = FocusPane::Content;
                self.navigate(&item.path);
            }
            return AppCommand::None;
        }

        if self.create_form.is_some() {
            return self.enter_form();
        }

        let Some(row) = self.active_selected_row().cloned() else {
            return AppCommand::None;
        };
        let target = match &self.resolution.view {
            View::ResourceList(kind) => Some(paths::by_name(*kind, row.namespace.as_deref(), &row.name)),
            View::KubernetesList => self
                .resolution
                .resource_type()
                .map(|resource| paths::kubernetes_by_name(&resource, row.namespace.as_deref(), &row.name)),
            View::CustomResourceDefinitions => Some(paths::custom_resource_definition(&row.name)),
            View::Extensions => self.extension(&row.name).map(|extension| match &extension.resource {
                Some(typed) => paths::kubernetes_list(
                    &typed.resource,
                    if typed.namespaced {
                        self.namespaces.selected()
                    } else {
                        &NamespaceSelection::All
                    },
                ),
                None => paths::extension(&extension.name),
            }),
            _ => None,
        };
        if let Some(target) = target {
            self.navigate(&target);
        }
        AppCommand::None
    }

    fn enter_form(&mut self) -> AppCommand {
        let targets = self
            .run_targets_entry()
            .and_then(QueryEntry::data)
            .cloned()
            .unwrap_or_default();
        let picked_items = self
            .create_form
            .as_ref()
            .filter(|form| form.picking)
            .and_then(|form| form.dropdowns.get(form.field))
            .map(|dropdown| self.dropdown_items(dropdown));

        let Some(form) = &mut self.create_form else {
            return AppCommand::None;
        };
        let Some(namespace) = form.namespace.clone() else {
            self.status = "Select a namespace before creating a run".to_string();
            return AppCommand::None;
        };

        if let Some(items) = picked_items {
            if let Some(dropdown) = form.dropdowns.get_mut(form.field) {
                dropdown.choose(&items);
            }
            form.picking = false;
            return AppCommand::None;
        }

        if form.target.is_none() {
            let Some(target) = targets.get(form.target_cursor).cloned() else {
                return AppCommand::None;
            };
            form.target = Some(target);
            form.field = 0;
            self.sync_form_dropdowns();
            return AppCommand::None;
        }

        if form.field < form.dropdowns.len() {
            form.picking = true;
            return AppCommand::None;
        }

        let unbound = form
            .dropdowns
            .iter()
            .filter(|dropdown| dropdown.selected.is_none())
            .map(|dropdown| dropdown.label.clone())
            .collect::<Vec<_>>();
        if !unbound.is_empty() {
            let message = format!("Select resources for: {}", unbound.join(", "));
            self.set_status(message);
            return AppCommand::None;
        }

        let bindings = form
            .declared
            .iter()
            .cloned()
            .zip(
                form.dropdowns
                    .iter()
                    .map(|dropdown| dropdown.selected.clone().unwrap_or_default()),
            )
            .collect();
        let request = RunRequest {
            kind: form.kind,
            namespace,
            target: form.target.clone().unwrap_or_default(),
            bindings,
        };
        self.set_status(format!(
            "Creating {} for {}",
            request.kind.kind(),
            request.target
        ));
        AppCommand::CreateRun(request)
    }

    fn back(&mut self) {
        if self.namespace_picker.take().is_some() {
            return;
        }
        if self.focus == FocusPane::SideNav {
            self.focus = FocusPane::Content;
            return;
        }
        if let Some(form) = &mut self.create_form {
            if form.picking {
                form.picking = false;
                return;
            }
            if form.target.is_some() {
                form.clear_target();
                return;
            }
        }
        if !self.filter.is_empty() {
            self.set_filter(String::new());
            return;
        }
        if self.go_back() {
            self.status = format!("Back to {}", self.location);
        } else {
            self.status = "At first location".to_string();
        }
    }

    fn submit_input(&mut self) -> AppCommand {
        let input = self.input.trim().to_string();
        let mode = self.mode;
        self.mode = InputMode::Normal;
        self.input.clear();

        match mode {
            InputMode::Filter => {
                self.set_filter(input);
                AppCommand::None
            }
            InputMode::Command => self.run_command(&input, true),
            InputMode::Normal => AppCommand::None,
        }
    }

    fn run_command(&mut self, line: &str, expand_aliases: bool) -> AppCommand {
        let line = line.trim().trim_start_matches(':').trim();
        let mut parts = line.split_whitespace();
        let Some(head) = parts.next() else {
            return AppCommand::None;
        };
        let args = parts.collect::<Vec<_>>();

        if expand_aliases && let Some(expansion) = self.settings.aliases.get(head).cloned() {
            let expanded = std::iter::once(expansion.as_str())
                .chain(args.iter().copied())
                .collect::<Vec<_>>()
                .join(" ");
            debug!("alias '{head}' -> '{expanded}'");
            return self.run_command(&expanded, false);
        }

        if head.starts_with('/') {
            self.navigate(head);
            return AppCommand::None;
        }

        match head.to_ascii_lowercase().as_str() {
            "q" | "quit" | "exit" => {
                self.running = false;
                AppCommand::None
            }
            "help" | "?" => {
                self.show_help = true;
                AppCommand::None
            }
            "back" => {
                self.back();
                AppCommand::None
            }
            "ns" | "namespace" | "namespaces" => {
                match args.first().and_then(|arg| NamespaceSelection::parse(arg)) {
                    Some(selection) => self.select_namespace(selection),
                    None => self.open_namespace_picker(),
                }
                AppCommand::None
            }
            "lang" | "locale" | "language" => {
                let Some(tag) = args.first() else {
                    self.set_status(format!("Current locale: {}", self.messages.locale()));
                    return AppCommand::None;
                };
                self.requested_locale = (*tag).to_string();
                self.set_status(format!("Loading messages for '{tag}'"));
                self.load_messages_command()
            }
            "pseudo" => {
                let enabled = match args.first().map(|arg| arg.to_ascii_lowercase()) {
                    Some(value) if value == "on" || value == "true" => true,
                    Some(value) if value == "off" || value == "false" => false,
                    _ => !self.settings.pseudo_localize,
                };
                self.settings.pseudo_localize = enabled;
                self.set_status(format!(
                    "Pseudo localization {}",
                    if enabled { "on" } else { "off" }
                ));
                self.load_messages_command()
            }
            "import" => self.import_command(&args),
            "create" => {
                let kind = match args.first().and_then(|arg| ResourceKind::from_token(arg)) {
                    Some(ResourceKind::TaskRuns | ResourceKind::Tasks) => ResourceKind::TaskRuns,
                    _ => ResourceKind::PipelineRuns,
                };
                self.navigate(&paths::create(kind));
                AppCommand::None
            }
            "about" => {
                self.navigate(paths::ABOUT);
                AppCommand::None
            }
            "settings" => {
                self.navigate(paths::SETTINGS);
                AppCommand::None
            }
            "crd" | "crds" | "customresourcedefinitions" => {
                match args.first() {
                    Some(name) => self.navigate(&paths::custom_resource_definition(name)),
                    None => self.navigate(paths::CUSTOM_RESOURCE_DEFINITIONS),
                }
                AppCommand::None
            }
            "ext" | "extension" | "extensions" => {
                match args.first() {
                    Some(name) => self.navigate(&paths::extension(name)),
                    None => self.navigate(paths::EXTENSIONS),
                }
                AppCommand::None
            }
            "filter" => {
                self.set_filter(args.join(" "));
                AppCommand::None
            }
            "refresh" => {
                self.on_tick();
                AppCommand::None
            }
            "nav" => {
                self.side_nav_expanded = !self.side_nav_expanded;
                AppCommand::None
            }
            token => {
                if let Some(kind) = ResourceKind::from_token(token) {
                    let path = match args.first() {
                        Some(name) => paths::by_name(
                            kind,
                            self.namespaces.selected().named(),
                            name,
                        ),
                        None => paths::list(kind, self.namespaces.selected()),
                    };
                    self.navigate(&path);
                } else {
                    self.set_status(format!("Unknown command: {line}"));
                }
                AppCommand::None
            }
        }
    }

    fn import_command(&mut self, args: &[&str]) -> AppCommand {
        if self.properties.is_read_only {
            self.set_status("Import is not available in read-only mode");
            return AppCommand::None;
        }
        let Some(repository_url) = args.first() else {
            self.set_status("Usage: :import <repository-url> [path] [target-namespace]");
            return AppCommand::None;
        };
        let target_namespace = args
            .get(2)
            .map(|value| (*value).to_string())
            .or_else(|| self.namespaces.selected().named().map(str::to_string));
        let Some(target_namespace) = target_namespace else {
            self.set_status("Import needs a target namespace while all namespaces are selected");
            return AppCommand::None;
        };
        if !self.namespaces.permits(&target_namespace) {
            self.set_status(format!(
                "Namespace is locked to '{}'",
                self.namespaces.tenant().unwrap_or_default()
            ));
            return AppCommand::None;
        }

        let request = ImportRequest {
            repository_url: (*repository_url).to_string(),
            path: args.get(1).copied().unwrap_or(".").to_string(),
            target_namespace,
            service_account: None,
        };
        self.set_status(format!("Importing {}", request.repository_url));
        AppCommand::ImportResources(request)
    }
}

fn start_fetch<K, V>(cache: &mut QueryCache<K, V>, key: K) -> bool
where
    K: Eq + std::hash::Hash + Clone,
{
    cache.needs_fetch(&key) && cache.begin(key)
}

fn step(current: usize, delta: isize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let last = (len - 1) as isize;
    (current as isize).saturating_add(delta).clamp(0, last) as usize
}

fn visible_rows<'a>(table: &'a TableData, filter: &str) -> Vec<&'a RowData> {
    table
        .rows
        .iter()
        .filter(|row| row.matches_filter(filter))
        .collect()
}

fn extensions_table(extensions: &[Extension]) -> TableData {
    let rows = extensions
        .iter()
        .map(|extension| {
            let kind = extension.kind.clone().unwrap_or_else(|| "page".to_string());
            RowData {
                name: extension.name.clone(),
                namespace: None,
                columns: vec![
                    extension.name.clone(),
                    extension.display_name.clone(),
                    kind,
                    extension.source.clone(),
                ],
                detail: extension.source.clone(),
            }
        })
        .collect();
    TableData::new(
        vec![
            "Name".to_string(),
            "Display name".to_string(),
            "Type".to_string(),
            "Source".to_string(),
        ],
        rows,
        Local::now(),
    )
}

fn summarize_error_line(error: &str) -> String {
    error
        .lines()
        .find(|line| !line.trim().is_empty())
        .map(|line| line.trim().to_string())
        .unwrap_or_else(|| "unknown error".to_string())
}

fn normalize_status_text(status: String) -> String {
    const MAX_STATUS_LEN: usize = 180;
    if status.chars().count() <= MAX_STATUS_LEN {
        return status;
    }

    let mut shortened = status
        .chars()
        .take(MAX_STATUS_LEN.saturating_sub(1))
        .collect::<String>();
    shortened.push('…');
    shortened
}
