use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{
    Block, Borders, Cell, Clear, List, ListItem, ListState, Paragraph, Row, Table, TableState,
    Wrap,
};

use crate::app::{App, CreateRunForm, FocusPane, InputMode, ShellPhase};
use crate::i18n::Messages;
use crate::model::ResourceKind;
use crate::namespace::NamespaceSelection;
use crate::routes::{Outcome, Restriction, View};

const BG: Color = Color::Rgb(9, 15, 25);
const PANEL: Color = Color::Rgb(16, 27, 44);
const ACCENT: Color = Color::Rgb(52, 211, 153);
const MUTED: Color = Color::Rgb(140, 156, 178);
const WARN: Color = Color::Rgb(251, 191, 36);
const ERROR: Color = Color::Rgb(248, 113, 113);
const PL_A: Color = Color::Rgb(17, 94, 89);
const PL_B: Color = Color::Rgb(30, 64, 175);
const PL_C: Color = Color::Rgb(55, 48, 163);
const PL_D: Color = Color::Rgb(82, 24, 124);

const SIDE_NAV_WIDTH: u16 = 30;

pub fn render(frame: &mut Frame, app: &App) {
    let banner_height = app.banner().len().min(3) as u16;
    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(banner_height),
            Constraint::Min(6),
            Constraint::Length(1),
        ])
        .split(frame.area());

    render_header(frame, root[0], app);
    if banner_height > 0 {
        render_banner(frame, root[1], app);
    }
    if app.is_ready() {
        render_body(frame, root[2], app);
    } else {
        render_loading(frame, root[2], app);
    }
    render_footer(frame, root[3], app);

    if app.namespace_picker().is_some() {
        render_namespace_picker(frame, app);
    }
    if let Some(form) = app.create_form()
        && form.picking
    {
        render_dropdown_popup(frame, app, form);
    }
    if app.show_help() {
        render_help_modal(frame, app);
    }
}

fn render_header(frame: &mut Frame, area: Rect, app: &App) {
    let messages = app.messages();
    let mut spans = Vec::new();
    push_powerline_segment(&mut spans, " 󱃾 tekdash ", Color::White, PL_A, PL_B);

    let namespace = match app.namespaces().selected() {
        NamespaceSelection::All => messages.text(
            "dashboard.namespacePicker.allNamespaces",
            "All namespaces",
        ),
        NamespaceSelection::Named(namespace) => namespace.clone(),
    };
    let lock = if app.namespaces().is_locked() { "󰌾 " } else { "" };
    push_powerline_segment(
        &mut spans,
        format!(" 󰉖 {lock}{} ", compact_text(&namespace, 24)),
        Color::White,
        PL_B,
        PL_C,
    );
    push_powerline_segment(
        &mut spans,
        format!(" {} ", compact_text(app.location(), 60)),
        Color::White,
        PL_C,
        BG,
    );

    let left = Line::from(spans);
    let right = build_right_header_line(app);
    let right_width = spans_width(&right.spans) as u16;
    if area.width < 42 || right_width == 0 || right_width >= area.width {
        frame.render_widget(
            Paragraph::new(left).style(Style::default().bg(BG).fg(Color::White)),
            area,
        );
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(1), Constraint::Length(right_width)])
        .split(area);
    frame.render_widget(
        Paragraph::new(left).style(Style::default().bg(BG).fg(Color::White)),
        chunks[0],
    );
    frame.render_widget(Paragraph::new(right).style(Style::default().bg(BG)), chunks[1]);
}

fn build_right_header_line(app: &App) -> Line<'static> {
    let mut spans = Vec::new();
    let mut next_bg = BG;
    if app.properties().is_read_only {
        push_powerline_segment_rtl(&mut spans, " 󰌾 ro ", Color::Black, WARN, next_bg);
        next_bg = WARN;
    }
    let marker = if app.messages().pseudo_localized() { "*" } else { "" };
    push_powerline_segment_rtl(
        &mut spans,
        format!(" 󰗊 {}{marker} ", app.messages().locale()),
        Color::White,
        PL_C,
        next_bg,
    );
    next_bg = PL_C;
    if !app.context().is_empty() {
        push_powerline_segment_rtl(
            &mut spans,
            format!(" 󱃾 {} ", compact_text(app.context(), 24)),
            Color::White,
            PL_D,
            next_bg,
        );
        next_bg = PL_D;
    }
    spans.push(Span::styled(" ", Style::default().bg(next_bg)));
    Line::from(spans)
}

fn render_banner(frame: &mut Frame, area: Rect, app: &App) {
    let hint = app
        .messages()
        .text("dashboard.banner.dismiss", "press x to dismiss");
    let lines = app
        .banner()
        .iter()
        .take(area.height as usize)
        .map(|error| {
            Line::from(vec![
                Span::styled(" 󰅚 ", Style::default().fg(Color::Black).bg(ERROR)),
                Span::styled(
                    format!(" {error} "),
                    Style::default().fg(ERROR).add_modifier(Modifier::BOLD),
                ),
                Span::styled(format!("({hint})"), Style::default().fg(MUTED)),
            ])
        })
        .collect::<Vec<_>>();
    frame.render_widget(Paragraph::new(lines).style(Style::default().bg(BG)), area);
}

fn render_loading(frame: &mut Frame, area: Rect, app: &App) {
    let mut lines = vec![Line::from(Span::styled(
        app.messages()
            .text("dashboard.loading", "Loading configuration…"),
        Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
    ))];
    if let ShellPhase::LoadingConfig {
        properties_settled,
        messages_settled,
    } = app.phase()
    {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("{} properties", settled_icon(properties_settled)),
            Style::default().fg(MUTED),
        )));
        lines.push(Line::from(Span::styled(
            format!("{} messages", settled_icon(messages_settled)),
            Style::default().fg(MUTED),
        )));
    }
    let panel = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(MUTED))
            .style(Style::default().bg(PANEL)),
    );
    frame.render_widget(panel, centered_rect(50, 30, area));
}

fn settled_icon(settled: bool) -> &'static str {
    if settled { "󰄬" } else { "󰔟" }
}

fn render_body(frame: &mut Frame, area: Rect, app: &App) {
    if !app.side_nav_expanded() || area.width < SIDE_NAV_WIDTH * 2 {
        render_content(frame, area, app, true);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(SIDE_NAV_WIDTH), Constraint::Min(1)])
        .split(area);
    render_side_nav(frame, chunks[0], app);
    render_content(frame, chunks[1], app, app.focus() == FocusPane::Content);
}

fn render_side_nav(frame: &mut Frame, area: Rect, app: &App) {
    let focused = app.focus() == FocusPane::SideNav;
    let active = app.nav_active_index();
    let items = app
        .nav_items()
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let style = if Some(index) == active {
                Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            ListItem::new(Line::from(Span::styled(item.label, style)))
        })
        .collect::<Vec<_>>();

    let list = List::new(items)
        .block(panel_block(String::new(), focused))
        .highlight_style(Style::default().bg(Color::Rgb(24, 36, 58)))
        .highlight_symbol("󰜴 ");
    let mut state = ListState::default();
    state.select(if focused { Some(app.nav_cursor()) } else { active });
    frame.render_stateful_widget(list, area, &mut state);
}

fn render_content(frame: &mut Frame, area: Rect, app: &App, focused: bool) {
    let messages = app.messages();
    let resolution = app.resolution();
    if let Outcome::Restricted(restriction) = &resolution.outcome {
        let text = match restriction {
            Restriction::ReadOnly => messages.text(
                "dashboard.restricted.readOnly",
                "This page is not available in read-only mode",
            ),
            Restriction::Tenant(namespace) => messages.format(
                "dashboard.restricted.tenant",
                "Namespace '{namespace}' is outside the tenant namespace '{tenant}'",
                &[
                    ("namespace", namespace),
                    ("tenant", app.namespaces().tenant().unwrap_or_default()),
                ],
            ),
        };
        render_message(frame, area, &text, WARN, focused);
        return;
    }

    match &resolution.view {
        View::ResourceList(_)
        | View::KubernetesList
        | View::CustomResourceDefinitions
        | View::Extensions => render_table(frame, area, app, focused),
        View::ResourceDetail(_) | View::KubernetesDetail | View::CustomResourceDefinition => {
            render_detail(frame, area, app, focused)
        }
        View::CreateRun(kind) => render_create_run(frame, area, app, *kind, focused),
        View::About => render_lines(
            frame,
            area,
            about_lines(app),
            &title(messages, "dashboard.about.title", "About"),
            focused,
        ),
        View::Settings => render_lines(
            frame,
            area,
            settings_lines(app),
            &title(messages, "dashboard.settings.title", "Settings"),
            focused,
        ),
        View::ImportResources => render_lines(
            frame,
            area,
            import_lines(app),
            &title(messages, "dashboard.importResources.title", "Import resources"),
            focused,
        ),
        View::Extension(name) => render_lines(
            frame,
            area,
            extension_lines(app, name),
            &title(messages, "dashboard.extension.title", "Extension"),
            focused,
        ),
        View::NotFound | View::Redirect(_) => {
            let text = format!(
                "{}\n\n{}",
                messages.text("dashboard.notFound.title", "Page not found"),
                messages.format(
                    "dashboard.notFound.description",
                    "Nothing is routed at {path}",
                    &[("path", app.location())],
                )
            );
            render_message(frame, area, &text, MUTED, focused);
        }
    }
}

fn title(messages: &Messages, id: &str, default: &str) -> String {
    messages.text(id, default)
}

fn content_title(app: &App) -> String {
    let messages = app.messages();
    let resolution = app.resolution();
    let name = match &resolution.view {
        View::ResourceList(kind) | View::ResourceDetail(kind) => {
            messages.text(kind.nav_message_id(), kind.title())
        }
        View::KubernetesList | View::KubernetesDetail => resolution
            .param("type")
            .map(str::to_string)
            .unwrap_or_default(),
        View::CustomResourceDefinitions | View::CustomResourceDefinition => {
            "CustomResourceDefinitions".to_string()
        }
        View::Extensions => messages.text("dashboard.sideNav.extensions", "Extensions"),
        _ => String::new(),
    };
    match resolution.param("name") {
        Some(object) => format!("{name} 󰁔 {object}"),
        None => name,
    }
}

fn render_table(frame: &mut Frame, area: Rect, app: &App, focused: bool) {
    let messages = app.messages();
    let resource = content_title(app);
    let entry = app.active_table_entry();

    let table = match entry.and_then(|entry| entry.data()) {
        Some(table) => table,
        None => {
            match entry.and_then(|entry| entry.error()) {
                Some(error) => {
                    let text = format!(
                        "{}\n\n{error}",
                        messages.format(
                            "dashboard.errorLoading",
                            "Error loading {resource}",
                            &[("resource", &resource)],
                        )
                    );
                    render_message(frame, area, &text, ERROR, focused);
                }
                None => {
                    let text = messages.format(
                        "dashboard.loadingResource",
                        "Loading {resource}…",
                        &[("resource", &resource)],
                    );
                    render_message(frame, area, &text, MUTED, focused);
                }
            }
            return;
        }
    };

    let visible_rows = app.active_visible_rows();
    let mut title = format!("{resource} ({})", visible_rows.len());
    if !app.filter().is_empty() {
        title.push_str(&format!(" 󰈲 {}", app.filter()));
    }
    if let Some(refreshed_at) = table.last_refreshed {
        title.push_str(&format!(" 󰥔 {}", refreshed_at.format("%H:%M:%S")));
    }
    if entry.is_some_and(|entry| entry.is_fetching()) {
        title.push_str(" 󰑓");
    }
    if let Some(error) = entry.and_then(|entry| entry.error()) {
        title.push_str(&format!(" 󰅚 {}", compact_text(error, 40)));
    }

    if visible_rows.is_empty() {
        let text = messages.format(
            "dashboard.table.empty",
            "No {resource} found",
            &[("resource", &resource)],
        );
        render_lines(
            frame,
            area,
            vec![Line::from(Span::styled(text, Style::default().fg(MUTED)))],
            &title,
            focused,
        );
        return;
    }

    let header_row = Row::new(table.headers.iter().map(|header| {
        Cell::from(header.clone()).style(Style::default().add_modifier(Modifier::BOLD))
    }))
    .height(1)
    .style(Style::default().fg(ACCENT));

    let rows = visible_rows.iter().map(|row| {
        Row::new(
            row.columns
                .iter()
                .map(|column| Cell::from(column.clone()).style(cell_style(column))),
        )
    });

    let widget = Table::new(rows, column_constraints(table.headers.len()))
        .header(header_row)
        .block(panel_block(title, focused))
        .column_spacing(1)
        .row_highlight_style(
            Style::default()
                .bg(Color::Rgb(24, 36, 58))
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("󰜴 ");

    let mut state = TableState::default();
    state.select(app.active_selected_index());
    frame.render_stateful_widget(widget, area, &mut state);
}

fn cell_style(value: &str) -> Style {
    match value {
        "Succeeded" | "True" => Style::default().fg(ACCENT),
        "Failed" | "False" | "Cancelled" => Style::default().fg(ERROR),
        "Running" | "Pending" | "Unknown" => Style::default().fg(WARN),
        _ => Style::default().fg(Color::White),
    }
}

fn render_detail(frame: &mut Frame, area: Rect, app: &App, focused: bool) {
    let messages = app.messages();
    let resource = content_title(app);
    let Some(entry) = app.active_resource_entry() else {
        let text = messages.format(
            "dashboard.loadingResource",
            "Loading {resource}…",
            &[("resource", &resource)],
        );
        render_message(frame, area, &text, MUTED, focused);
        return;
    };

    let text = match (entry.data(), entry.error()) {
        (Some(Some(yaml)), _) => highlight_yaml_text(yaml),
        (Some(None), _) => Text::from(messages.format(
            "dashboard.resourceNotFound",
            "{resource} not found",
            &[("resource", &resource)],
        )),
        (None, Some(error)) => Text::from(vec![
            Line::from(Span::styled(
                messages.format(
                    "dashboard.errorLoading",
                    "Error loading {resource}",
                    &[("resource", &resource)],
                ),
                Style::default().fg(ERROR).add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(error.to_string()),
        ]),
        (None, None) => Text::from(messages.format(
            "dashboard.loadingResource",
            "Loading {resource}…",
            &[("resource", &resource)],
        )),
    };

    let paragraph = Paragraph::new(text)
        .block(panel_block(resource, focused))
        .style(Style::default().fg(Color::White))
        .wrap(Wrap { trim: false })
        .scroll((app.detail_scroll(), 0));
    frame.render_widget(paragraph, area);
}

fn render_create_run(frame: &mut Frame, area: Rect, app: &App, kind: ResourceKind, focused: bool) {
    let messages = app.messages();
    let heading = messages.format(
        "dashboard.createRun.title",
        "Create {kind}",
        &[("kind", kind.kind())],
    );
    let Some(form) = app.create_form() else {
        render_message(frame, area, &heading, MUTED, focused);
        return;
    };
    let target_kind = match kind {
        ResourceKind::TaskRuns => "Task",
        _ => "Pipeline",
    };

    let mut lines = Vec::new();
    let Some(namespace) = &form.namespace else {
        lines.push(Line::from(Span::styled(
            messages.text(
                "dashboard.createRun.noNamespace",
                "Select a namespace to create a run",
            ),
            Style::default().fg(WARN),
        )));
        render_lines(frame, area, lines, &heading, focused);
        return;
    };
    lines.push(Line::from(vec![
        Span::styled("Namespace: ", Style::default().fg(MUTED)),
        Span::raw(namespace.clone()),
    ]));
    lines.push(Line::from(""));

    match &form.target {
        None => {
            lines.push(Line::from(Span::styled(
                messages.format(
                    "dashboard.createRun.selectTarget",
                    "Select a {kind}",
                    &[("kind", target_kind)],
                ),
                Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
            )));
            let targets = app.run_targets_entry();
            match targets.and_then(|entry| entry.data()) {
                Some(names) if !names.is_empty() => {
                    for (index, name) in names.iter().enumerate() {
                        lines.push(choice_line(name, index == form.target_cursor));
                    }
                }
                Some(_) => lines.push(Line::from(Span::styled(
                    messages.format(
                        "dashboard.table.empty",
                        "No {resource} found",
                        &[("resource", target_kind)],
                    ),
                    Style::default().fg(MUTED),
                ))),
                None => {
                    let text = match targets.and_then(|entry| entry.error()) {
                        Some(error) => error.to_string(),
                        None => messages.format(
                            "dashboard.loadingResource",
                            "Loading {resource}…",
                            &[("resource", target_kind)],
                        ),
                    };
                    lines.push(Line::from(Span::styled(text, Style::default().fg(MUTED))));
                }
            }
        }
        Some(target) => {
            lines.push(Line::from(vec![
                Span::styled(format!("{target_kind}: "), Style::default().fg(MUTED)),
                Span::styled(target.clone(), Style::default().add_modifier(Modifier::BOLD)),
            ]));
            lines.push(Line::from(""));
            lines.extend(form_field_lines(app, form));
        }
    }

    render_lines(frame, area, lines, &heading, focused);
}

fn form_field_lines(app: &App, form: &CreateRunForm) -> Vec<Line<'static>> {
    let messages = app.messages();
    let mut lines = Vec::new();
    if app.declared_entry().is_some_and(|entry| entry.is_loading()) {
        lines.push(Line::from(Span::styled(
            messages.text("dashboard.createRun.loadingResources", "Loading declared resources…"),
            Style::default().fg(MUTED),
        )));
    } else if form.dropdowns.is_empty() {
        lines.push(Line::from(Span::styled(
            messages.text(
                "dashboard.createRun.noResources",
                "No PipelineResources declared",
            ),
            Style::default().fg(MUTED),
        )));
    }

    for (index, (dropdown, declared)) in form.dropdowns.iter().zip(&form.declared).enumerate() {
        let value = match &dropdown.selected {
            Some(name) => name.clone(),
            None if app.dropdown_loading(dropdown) => "…".to_string(),
            None => messages.text(
                "dashboard.pipelineResourcesDropdown.placeholder",
                "Select PipelineResource",
            ),
        };
        let direction = if declared.output { "out" } else { "in" };
        lines.push(choice_line(
            &format!(
                "{} ({}, {direction}): {value}",
                dropdown.label, declared.resource_type
            ),
            index == form.field,
        ));
    }

    lines.push(Line::from(""));
    lines.push(choice_line(
        &format!(
            "[ {} ]",
            messages.text("dashboard.createRun.submit", "Create")
        ),
        form.field == form.dropdowns.len(),
    ));
    lines
}

fn choice_line(label: &str, selected: bool) -> Line<'static> {
    if selected {
        Line::from(Span::styled(
            format!("󰜴 {label}"),
            Style::default()
                .fg(Color::Black)
                .bg(ACCENT)
                .add_modifier(Modifier::BOLD),
        ))
    } else {
        Line::from(Span::styled(
            format!("  {label}"),
            Style::default().fg(Color::White),
        ))
    }
}

fn about_lines(app: &App) -> Vec<Line<'static>> {
    let messages = app.messages();
    let properties = app.properties();
    let unknown = "-".to_string();
    let mut pairs = vec![
        (
            messages.text("dashboard.about.dashboardNamespace", "Dashboard namespace"),
            properties.dashboard_namespace.clone(),
        ),
        (
            messages.text("dashboard.about.dashboardVersion", "Dashboard version"),
            properties.dashboard_version.clone().unwrap_or(unknown.clone()),
        ),
        (
            messages.text("dashboard.about.pipelinesNamespace", "Pipelines namespace"),
            properties.pipelines_namespace.clone(),
        ),
        (
            messages.text("dashboard.about.pipelinesVersion", "Pipelines version"),
            properties.pipelines_version.clone().unwrap_or(unknown.clone()),
        ),
    ];
    if properties.triggers_installed() {
        pairs.push((
            messages.text("dashboard.about.triggersNamespace", "Triggers namespace"),
            properties.triggers_namespace.clone(),
        ));
        pairs.push((
            messages.text("dashboard.about.triggersVersion", "Triggers version"),
            properties.triggers_version.clone().unwrap_or(unknown.clone()),
        ));
    }
    pairs.push((
        messages.text("dashboard.about.readOnly", "Read-only"),
        properties.is_read_only.to_string(),
    ));
    if let Some(tenant) = &properties.tenant_namespace {
        pairs.push((
            messages.text("dashboard.about.tenantNamespace", "Tenant namespace"),
            tenant.clone(),
        ));
    }
    if let Some(url) = &properties.logout_url {
        pairs.push((
            messages.text("dashboard.about.logoutURL", "Logout URL"),
            url.clone(),
        ));
    }
    if !app.cluster().is_empty() {
        pairs.push(("Cluster".to_string(), display_cluster_endpoint(app.cluster())));
    }
    key_value_lines(pairs)
}

fn settings_lines(app: &App) -> Vec<Line<'static>> {
    let messages = app.messages();
    let settings = app.settings();
    let mut pairs = vec![
        (
            messages.text("dashboard.settings.locale", "Language"),
            format!(
                "{} (requested {})",
                messages.locale(),
                app.requested_locale()
            ),
        ),
        (
            messages.text("dashboard.settings.supportedLocales", "Supported languages"),
            settings.supported_locales.join(", "),
        ),
        (
            messages.text("dashboard.settings.pseudoLocalize", "Pseudo localization"),
            settings.pseudo_localize.to_string(),
        ),
        (
            messages.text("dashboard.settings.redirectPolicy", "Redirect when not found"),
            format!("{:?}", settings.redirect_policy),
        ),
        (
            messages.text("dashboard.settings.source", "Settings file"),
            settings.source.clone().unwrap_or_else(|| "-".to_string()),
        ),
    ];
    let mut aliases = settings.aliases.iter().collect::<Vec<_>>();
    aliases.sort();
    for (alias, expansion) in aliases {
        pairs.push((format!(":{alias}"), expansion.clone()));
    }
    let mut lines = key_value_lines(pairs);
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        messages.text(
            "dashboard.settings.hint",
            "Change with :lang <tag> and :pseudo on|off",
        ),
        Style::default().fg(MUTED),
    )));
    lines
}

fn import_lines(app: &App) -> Vec<Line<'static>> {
    let messages = app.messages();
    let mut lines = vec![
        Line::from(messages.text(
            "dashboard.importResources.description",
            "Apply Tekton resources from a git repository to a namespace",
        )),
        Line::from(""),
        Line::from(Span::styled(
            ":import <repository-url> [path] [target-namespace]",
            Style::default().fg(ACCENT),
        )),
    ];
    if let Some(run) = app.last_import() {
        lines.push(Line::from(""));
        lines.push(Line::from(messages.format(
            "dashboard.importResources.lastRun",
            "Last import: PipelineRun {name}",
            &[("name", run)],
        )));
    }
    lines
}

fn extension_lines(app: &App, name: &str) -> Vec<Line<'static>> {
    let Some(extension) = app.extension(name) else {
        return vec![Line::from(name.to_string())];
    };
    key_value_lines(vec![
        ("Name".to_string(), extension.name.clone()),
        ("Display name".to_string(), extension.display_name.clone()),
        (
            app.messages().text("dashboard.extension.source", "Source"),
            extension.source.clone(),
        ),
    ])
}

fn key_value_lines(pairs: Vec<(String, String)>) -> Vec<Line<'static>> {
    let width = pairs
        .iter()
        .map(|(key, _)| key.chars().count())
        .max()
        .unwrap_or(0);
    pairs
        .into_iter()
        .map(|(key, value)| {
            Line::from(vec![
                Span::styled(
                    format!("{key:<width$}  "),
                    Style::default().fg(Color::Rgb(103, 232, 249)),
                ),
                Span::styled(value, Style::default().fg(Color::White)),
            ])
        })
        .collect()
}

fn render_lines(frame: &mut Frame, area: Rect, lines: Vec<Line<'static>>, title: &str, focused: bool) {
    let paragraph = Paragraph::new(lines)
        .block(panel_block(title.to_string(), focused))
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn render_message(frame: &mut Frame, area: Rect, text: &str, color: Color, focused: bool) {
    let paragraph = Paragraph::new(Text::from(text.to_string()))
        .wrap(Wrap { trim: false })
        .block(panel_block(content_label(color), focused))
        .style(Style::default().fg(color));
    frame.render_widget(paragraph, area);
}

fn content_label(color: Color) -> String {
    if color == ERROR {
        "Error".to_string()
    } else {
        String::new()
    }
}

fn panel_block(title: String, focused: bool) -> Block<'static> {
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(if focused {
            Style::default().fg(ACCENT)
        } else {
            Style::default().fg(MUTED)
        })
        .style(Style::default().bg(PANEL))
}

fn render_namespace_picker(frame: &mut Frame, app: &App) {
    let area = centered_rect(40, 60, frame.area());
    frame.render_widget(Clear, area);
    let messages = app.messages();
    let selected = app.namespaces().selected();

    let mut items = app
        .namespace_options()
        .into_iter()
        .map(|option| {
            let label = match &option {
                NamespaceSelection::All => messages.text(
                    "dashboard.namespacePicker.allNamespaces",
                    "All namespaces",
                ),
                NamespaceSelection::Named(name) => name.clone(),
            };
            let style = if &option == selected {
                Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            ListItem::new(Line::from(Span::styled(label, style)))
        })
        .collect::<Vec<_>>();
    if app.namespaces_loading() {
        items.push(ListItem::new(Line::from(Span::styled(
            "…",
            Style::default().fg(MUTED),
        ))));
    }

    let list = List::new(items)
        .block(panel_block(
            messages.text("dashboard.namespacePicker.title", "Namespaces"),
            true,
        ))
        .highlight_style(Style::default().bg(Color::Rgb(24, 36, 58)))
        .highlight_symbol("󰜴 ");
    let mut state = ListState::default();
    state.select(app.namespace_picker());
    frame.render_stateful_widget(list, area, &mut state);
}

fn render_dropdown_popup(frame: &mut Frame, app: &App, form: &CreateRunForm) {
    let Some(dropdown) = form.dropdowns.get(form.field) else {
        return;
    };
    let area = centered_rect(50, 50, frame.area());
    frame.render_widget(Clear, area);
    let messages = app.messages();
    let title = format!(
        "{} ({})",
        dropdown.label,
        dropdown.type_filter.as_deref().unwrap_or("*")
    );

    if let Some(error) = app.dropdown_error(dropdown) {
        render_message(frame, area, error, ERROR, true);
        return;
    }
    if app.dropdown_loading(dropdown) {
        let text = messages.format(
            "dashboard.loadingResource",
            "Loading {resource}…",
            &[("resource", "PipelineResources")],
        );
        render_lines(
            frame,
            area,
            vec![Line::from(Span::styled(text, Style::default().fg(MUTED)))],
            &title,
            true,
        );
        return;
    }

    let names = app.dropdown_items(dropdown);
    if names.is_empty() {
        let text = dropdown.empty_text(app.namespaces(), messages);
        render_lines(
            frame,
            area,
            vec![Line::from(Span::styled(text, Style::default().fg(MUTED)))],
            &title,
            true,
        );
        return;
    }

    let items = names
        .into_iter()
        .map(|name| {
            let style = if dropdown.selected.as_deref() == Some(name.as_str()) {
                Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            ListItem::new(Line::from(Span::styled(name, style)))
        })
        .collect::<Vec<_>>();
    let list = List::new(items)
        .block(panel_block(title, true))
        .highlight_style(Style::default().bg(Color::Rgb(24, 36, 58)))
        .highlight_symbol("󰜴 ");
    let mut state = ListState::default();
    state.select(Some(dropdown.cursor));
    frame.render_stateful_widget(list, area, &mut state);
}

fn render_footer(frame: &mut Frame, area: Rect, app: &App) {
    if matches!(app.mode(), InputMode::Normal) {
        let status_text = app.status().to_string();
        let mut spans = Vec::new();
        let (mode_label, mode_fg, mode_bg) = if app.properties().is_read_only {
            (" 󰌾 ro ", Color::Black, WARN)
        } else {
            (" 󰘳 nrm ", Color::White, PL_A)
        };
        push_powerline_segment(&mut spans, mode_label, mode_fg, mode_bg, PL_B);
        let status_width_hint = area.width.saturating_sub(24).min(120) as usize;
        push_powerline_segment(
            &mut spans,
            format!(
                " {} {} ",
                footer_status_icon(&status_text),
                compact_text(&status_text, status_width_hint.max(24))
            ),
            Color::White,
            PL_B,
            BG,
        );

        let hints = Span::styled(
            " ? help  : cmd  n ns  [ nav ",
            Style::default().fg(MUTED),
        );
        let hint_width = hints.content.chars().count() as u16;
        if area.width <= hint_width + 28 {
            frame.render_widget(
                Paragraph::new(Line::from(spans)).style(Style::default().bg(BG)),
                area,
            );
            return;
        }
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(1), Constraint::Length(hint_width)])
            .split(area);
        frame.render_widget(
            Paragraph::new(Line::from(spans)).style(Style::default().bg(BG)),
            chunks[0],
        );
        frame.render_widget(
            Paragraph::new(Line::from(hints))
                .style(Style::default().bg(BG))
                .alignment(Alignment::Right),
            chunks[1],
        );
        return;
    }

    let (label, prompt, prompt_bg) = match app.mode() {
        InputMode::Filter => (" 󰈲 flt ", format!("/{}", app.input()), WARN),
        _ => (" 󰘳 cmd ", format!(":{}", app.input()), ACCENT),
    };
    let mut spans = Vec::new();
    push_powerline_segment(&mut spans, label, Color::Black, prompt_bg, PL_B);
    push_powerline_segment(&mut spans, format!(" {prompt} "), Color::White, PL_B, BG);
    frame.render_widget(
        Paragraph::new(Line::from(spans)).style(Style::default().bg(BG)),
        area,
    );
}

fn footer_status_icon(status_text: &str) -> &'static str {
    let status = status_text.to_ascii_lowercase();
    let has_failure = [
        "failed",
        "error",
        "timed out",
        "refused",
        "forbidden",
        "denied",
        "locked",
        "not available",
    ]
    .iter()
    .any(|needle| status.contains(needle));
    if has_failure { "󰅚" } else { "󰄬" }
}

fn highlight_yaml_text(input: &str) -> Text<'static> {
    let lines = input
        .lines()
        .map(highlight_yaml_line)
        .collect::<Vec<Line<'static>>>();
    Text::from(lines)
}

fn highlight_yaml_line(line: &str) -> Line<'static> {
    let indent_len = line
        .as_bytes()
        .iter()
        .take_while(|byte| **byte == b' ' || **byte == b'\t')
        .count();
    let indent = &line[..indent_len];
    let trimmed = &line[indent_len..];

    let mut spans = vec![Span::raw(indent.to_string())];
    if trimmed.is_empty() {
        return Line::from(spans);
    }

    if let Some(comment) = trimmed.strip_prefix('#') {
        spans.push(Span::styled(
            format!("#{comment}"),
            Style::default().fg(MUTED),
        ));
        return Line::from(spans);
    }

    if let Some(rest) = trimmed.strip_prefix("- ") {
        spans.push(Span::styled("- ", Style::default().fg(ACCENT)));
        spans.extend(highlight_yaml_content(rest));
        return Line::from(spans);
    }

    spans.extend(highlight_yaml_content(trimmed));
    Line::from(spans)
}

fn highlight_yaml_content(content: &str) -> Vec<Span<'static>> {
    let Some((key, value)) = split_yaml_key_value(content) else {
        return vec![Span::styled(
            content.to_string(),
            Style::default().fg(Color::White),
        )];
    };

    let mut spans = vec![
        Span::styled(
            key.to_string(),
            Style::default().fg(Color::Rgb(103, 232, 249)),
        ),
        Span::styled(":", Style::default().fg(MUTED)),
    ];
    if value.trim().is_empty() {
        return spans;
    }
    spans.push(Span::raw(" "));
    spans.push(Span::styled(
        value.trim_start().to_string(),
        Style::default().fg(yaml_value_color(value.trim())),
    ));
    spans
}

fn split_yaml_key_value(content: &str) -> Option<(&str, &str)> {
    let (key, value) = content.split_once(':')?;
    let key = key.trim_end();
    if key.is_empty() || key.contains(' ') {
        return None;
    }
    Some((key, value))
}

fn yaml_value_color(value: &str) -> Color {
    if value.starts_with('"') || value.starts_with('\'') {
        Color::Rgb(125, 211, 252)
    } else if matches!(value, "true" | "false" | "null" | "~") {
        WARN
    } else if value.parse::<f64>().is_ok() {
        Color::Rgb(251, 146, 60)
    } else {
        Color::Rgb(147, 197, 253)
    }
}

fn push_powerline_segment(
    spans: &mut Vec<Span<'static>>,
    content: impl Into<String>,
    fg: Color,
    bg: Color,
    next_bg: Color,
) {
    spans.push(Span::styled(
        content.into(),
        Style::default().fg(fg).bg(bg).add_modifier(Modifier::BOLD),
    ));
    spans.push(Span::styled("", Style::default().fg(bg).bg(next_bg)));
}

fn push_powerline_segment_rtl(
    spans: &mut Vec<Span<'static>>,
    content: impl Into<String>,
    fg: Color,
    bg: Color,
    next_bg: Color,
) {
    spans.push(Span::styled("", Style::default().fg(bg).bg(next_bg)));
    spans.push(Span::styled(
        content.into(),
        Style::default().fg(fg).bg(bg).add_modifier(Modifier::BOLD),
    ));
}

fn spans_width(spans: &[Span<'_>]) -> usize {
    spans.iter().map(|span| span.content.chars().count()).sum()
}

fn render_help_modal(frame: &mut Frame, app: &App) {
    let area = centered_rect(72, 70, frame.area());
    frame.render_widget(Clear, area);

    let mut lines = vec![
        Line::from(format!(
            "tekdash help  mode:{}  namespace:{}  location:{}",
            help_mode_label(app.mode()),
            app.namespaces().selected(),
            app.location()
        )),
        Line::from(""),
    ];
    lines.extend(HELP_LINES.iter().map(|line| Line::from(*line)));

    let modal = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .title("Help")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(ACCENT))
                .style(Style::default().bg(PANEL)),
        )
        .style(Style::default().fg(Color::White));
    frame.render_widget(modal, area);
}

const HELP_LINES: &[&str] = &[
    "Move: j/k  g/G  PgUp/PgDn  Enter open  Esc back",
    "Shell: Tab focus nav  [ collapse nav  n namespace  x dismiss banner  r refresh",
    "Runs: c create run  Enter pick resource  Esc clear target",
    "Filter: / type to narrow rows, Esc cancels",
    "",
    "Commands:",
    "  :<kind> [name]        pr, tr, p, t, ct, runs, el, tb, tt ...",
    "  :/<location>          go to any dashboard location",
    "  :ns [name|all]        select namespace or open picker",
    "  :lang <tag>           switch message catalog",
    "  :pseudo on|off        wrap messages in [[ ]] markers",
    "  :create [pr|tr]       create a PipelineRun or TaskRun",
    "  :import <url> [path] [ns]",
    "  :crds [name]  :ext [name]  :about  :settings  :back  :q",
];

fn help_mode_label(mode: InputMode) -> &'static str {
    match mode {
        InputMode::Normal => "normal",
        InputMode::Filter => "filter",
        InputMode::Command => "command",
    }
}

fn compact_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }

    if max_chars <= 1 {
        return "…".to_string();
    }

    let mut out = value
        .chars()
        .take(max_chars.saturating_sub(1))
        .collect::<String>();
    out.push('…');
    out
}

fn display_cluster_endpoint(cluster: &str) -> String {
    let trimmed = cluster.trim().trim_end_matches('/');
    trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed)
        .to_string()
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

fn column_constraints(columns: usize) -> Vec<Constraint> {
    if columns == 0 {
        return vec![Constraint::Percentage(100)];
    }

    let width = (100 / columns as u16).max(1);
    (0..columns)
        .map(|_| Constraint::Percentage(width))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{compact_text, display_cluster_endpoint, render, split_yaml_key_value};
    use crate::app::{App, ShellEvent};
    use crate::config::Settings;
    use crate::i18n::Messages;
    use crate::namespace::NamespaceSelection;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    fn screen_text(app: &App) -> String {
        let backend = TestBackend::new(120, 30);
        let mut terminal = Terminal::new(backend).expect("terminal");
        terminal
            .draw(|frame| render(frame, app))
            .expect("draw");
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn compact_text_truncates_with_ellipsis() {
        assert_eq!(compact_text("pipelineruns", 5), "pipe…");
        assert_eq!(compact_text("tasks", 5), "tasks");
    }

    #[test]
    fn cluster_endpoint_strips_scheme() {
        assert_eq!(
            display_cluster_endpoint("https://10.0.0.1:6443/"),
            "10.0.0.1:6443"
        );
    }

    #[test]
    fn yaml_keys_with_spaces_are_not_split() {
        assert_eq!(split_yaml_key_value("kind: Task"), Some(("kind", " Task")));
        assert_eq!(split_yaml_key_value("a b: c"), None);
    }

    #[test]
    fn loading_screen_is_shown_before_config_settles() {
        let app = App::new(
            Settings::default(),
            NamespaceSelection::Named("default".to_string()),
            "/",
        );
        assert!(screen_text(&app).contains("Loading configuration"));
    }

    #[test]
    fn ready_shell_renders_side_nav_and_not_found() {
        let mut app = App::new(
            Settings::default(),
            NamespaceSelection::Named("default".to_string()),
            "/no/such/page/here/at/all",
        );
        let properties = app.settings().placeholder_properties();
        app.apply_shell_event(ShellEvent::Properties(Ok(properties)));
        app.apply_shell_event(ShellEvent::Messages {
            locale: "en".to_string(),
            result: Ok(Messages::empty("en")),
        });

        let text = screen_text(&app);
        assert!(text.contains("PipelineRuns"));
        assert!(text.contains("Page not found"));
    }
}
