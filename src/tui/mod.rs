mod export;
mod help;
mod state;

use crate::config::Settings;
use crate::engine::Facades;
use crate::model::{Project, ProjectStatus};
use crate::orchestrator::{self, ConnectionReport, StoreHealth, UiCommand, UiEvent};
use crate::report::{clean_brief_text, format_date, format_date_time, preview, ReportFormat};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Terminal,
};
use state::{Prompt, UiState, View};
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

const HEADER_ROWS: u16 = 3;
const FOOTER_ROWS: u16 = 4;
const PAGE_PREVIEW_CHARS: usize = 300;

pub async fn run(settings: Settings) -> Result<()> {
    let facades = Facades::from_settings(&settings).map_err(|e| anyhow::anyhow!(e.user_message()))?;

    // Unbounded channels keep the UI thread from ever waiting on the controller.
    let (ui_tx, ui_rx) = mpsc::unbounded_channel::<UiEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let ui_handle = std::thread::spawn(move || run_threaded(ui_rx, cmd_tx));

    let res = orchestrator::run_controller(facades, settings, ui_tx, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// Run the TUI loop on a dedicated thread.
fn run_threaded(
    mut event_rx: UnboundedReceiver<UiEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    // UiState is owned by the UI thread only; no cross-thread mutation.
    let mut state = UiState::default();

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        // Drain events without blocking to keep UI responsive.
        while let Ok(ev) = event_rx.try_recv() {
            state.apply(ev);
        }

        if last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                let list_rows = terminal
                    .size()
                    .map(|s| s.height.saturating_sub(HEADER_ROWS + FOOTER_ROWS + 2) as usize)
                    .unwrap_or(20);
                if handle_key(&mut state, k, &cmd_tx, list_rows) {
                    let _ = cmd_tx.send(UiCommand::Quit);
                    break Ok(());
                }
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

/// Project the next action applies to: the open detail view, else the list cursor.
fn target_project(state: &UiState) -> Option<&Project> {
    match state.detail_project_id() {
        Some(id) => state.board.get(id),
        None if state.view == View::Projects => state.selected_project(),
        None => None,
    }
}

fn request_export(state: &mut UiState, cmd_tx: &UnboundedSender<UiCommand>, format: ReportFormat) {
    let Some(project) = target_project(state) else {
        state.info = "Select a project to export first".into();
        return;
    };
    let project_id = project.id.clone();
    state.info = format!("Exporting {} report…", format.extension());
    let _ = cmd_tx.send(UiCommand::Export { project_id, format });
}

fn request_brief(state: &mut UiState, cmd_tx: &UnboundedSender<UiCommand>, regenerate: bool) {
    let Some(project) = target_project(state) else {
        state.info = "Select a project first".into();
        return;
    };
    let id = project.id.clone();
    if state.brief_pending.contains(&id) {
        state.info = "Already generating a brief for this project".into();
        return;
    }
    state.info = format!("Generating executive brief for {}…", project.display_name());
    state.brief_pending.insert(id.clone());
    let _ = cmd_tx.send(UiCommand::GenerateBrief {
        project_id: id,
        regenerate,
    });
}

/// Apply one key press. Returns true when the UI should quit.
fn handle_key(
    state: &mut UiState,
    k: KeyEvent,
    cmd_tx: &UnboundedSender<UiCommand>,
    list_rows: usize,
) -> bool {
    if k.modifiers.contains(KeyModifiers::CONTROL) && k.code == KeyCode::Char('c') {
        return true;
    }

    match std::mem::replace(&mut state.prompt, Prompt::None) {
        Prompt::None => {}
        Prompt::NewUrl(mut input) => {
            match k.code {
                KeyCode::Esc => state.info = "Cancelled".into(),
                KeyCode::Enter => {
                    state.info = format!("Submitting {}…", input.trim());
                    let _ = cmd_tx.send(UiCommand::Submit(input));
                }
                KeyCode::Backspace => {
                    input.pop();
                    state.prompt = Prompt::NewUrl(input);
                }
                KeyCode::Char(c) => {
                    input.push(c);
                    state.prompt = Prompt::NewUrl(input);
                }
                _ => state.prompt = Prompt::NewUrl(input),
            }
            return false;
        }
        Prompt::ConfirmDelete { id, name } => {
            match k.code {
                KeyCode::Char('y') | KeyCode::Enter => {
                    state.info = format!("Deleting {name}…");
                    let _ = cmd_tx.send(UiCommand::Delete(id));
                }
                _ => state.info = "Delete cancelled".into(),
            }
            return false;
        }
    }

    match k.code {
        KeyCode::Char('q') => return true,
        KeyCode::Char('?') => state.view = View::Help,
        KeyCode::Esc => state.view = View::Projects,
        KeyCode::Up | KeyCode::Char('k') => match state.view {
            View::Projects => state.select_prev(),
            _ => state.detail_scroll = state.detail_scroll.saturating_sub(1),
        },
        KeyCode::Down | KeyCode::Char('j') => match state.view {
            View::Projects => state.select_next(list_rows),
            _ => state.detail_scroll = state.detail_scroll.saturating_add(1),
        },
        KeyCode::Char('n') => {
            state.view = View::Projects;
            state.prompt = Prompt::NewUrl(String::new());
        }
        KeyCode::Enter | KeyCode::Char('p') => {
            if let Some(id) = state.selected_project().map(|p| p.id.clone()) {
                state.open_pages(&id);
                let _ = cmd_tx.send(UiCommand::LoadPages(id));
            }
        }
        KeyCode::Char('b') => {
            if let Some(id) = target_project(state).map(|p| p.id.clone()) {
                state.open_brief(&id);
                let _ = cmd_tx.send(UiCommand::LoadBrief(id));
            }
        }
        KeyCode::Char('g') => request_brief(state, cmd_tx, false),
        KeyCode::Char('G') => request_brief(state, cmd_tx, true),
        KeyCode::Char('e') => request_export(state, cmd_tx, ReportFormat::Markdown),
        KeyCode::Char('E') => request_export(state, cmd_tx, ReportFormat::Html),
        KeyCode::Char('J') => request_export(state, cmd_tx, ReportFormat::Json),
        KeyCode::Char('c') => request_export(state, cmd_tx, ReportFormat::Csv),
        KeyCode::Char('y') => match state.last_exported_path.clone() {
            Some(path) => match export::copy_to_clipboard(&path) {
                Ok(()) => {
                    state.info = format!("✓ Copied to clipboard: {}", export::display_path(&path, 60));
                }
                Err(e) => state.info = format!("Clipboard copy failed: {e:#}"),
            },
            None => state.info = "No exported file path to copy. Export a report first (e/E)".into(),
        },
        KeyCode::Char('d') => {
            if state.view == View::Projects {
                if let Some(p) = state.selected_project() {
                    state.prompt = Prompt::ConfirmDelete {
                        id: p.id.clone(),
                        name: p.display_name().to_string(),
                    };
                }
            }
        }
        KeyCode::Char('r') => {
            state.info = "Refreshing…".into();
            let _ = cmd_tx.send(UiCommand::Refresh);
            match (state.view, state.detail_project_id().map(str::to_string)) {
                (View::Pages, Some(id)) => {
                    let _ = cmd_tx.send(UiCommand::LoadPages(id));
                }
                (View::Brief, Some(id)) => {
                    let _ = cmd_tx.send(UiCommand::LoadBrief(id));
                }
                _ => {}
            }
        }
        KeyCode::Char('s') => {
            state.connections = None;
            let _ = cmd_tx.send(UiCommand::CheckConnections);
        }
        _ => {}
    }
    false
}

fn status_color(status: ProjectStatus) -> Color {
    match status {
        ProjectStatus::Queued => Color::Gray,
        ProjectStatus::Processing => Color::Yellow,
        ProjectStatus::Completed => Color::Green,
        ProjectStatus::Failed => Color::Red,
    }
}

fn progress_bar(progress: Option<u8>, width: usize) -> String {
    let filled = progress.map_or(0, |p| (p.min(100) as usize * width) / 100);
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

fn connection_spans(report: Option<&ConnectionReport>) -> Vec<Span<'static>> {
    let Some(report) = report else {
        return vec![Span::styled(
            "Checking connections…",
            Style::default().fg(Color::Gray),
        )];
    };
    let dot = |ok: bool| {
        if ok {
            Span::styled("● ", Style::default().fg(Color::Green))
        } else {
            Span::styled("○ ", Style::default().fg(Color::Red))
        }
    };
    let store = match &report.store {
        StoreHealth::Connected => "connected".to_string(),
        StoreHealth::Misconfigured => "not configured".to_string(),
        StoreHealth::Error(_) => "error".to_string(),
    };
    let flag = |ok: bool| if ok { "ready" } else { "no key" };
    vec![
        Span::styled("Supabase ", Style::default().fg(Color::Gray)),
        dot(report.store == StoreHealth::Connected),
        Span::raw(store),
        Span::raw("   "),
        Span::styled("Firecrawl ", Style::default().fg(Color::Gray)),
        dot(report.crawl_configured),
        Span::raw(flag(report.crawl_configured)),
        Span::raw("   "),
        Span::styled("OpenAI ", Style::default().fg(Color::Gray)),
        dot(report.synthesis_configured),
        Span::raw(flag(report.synthesis_configured)),
    ]
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(HEADER_ROWS),
                Constraint::Min(0),
                Constraint::Length(FOOTER_ROWS),
            ]
            .as_ref(),
        )
        .split(area);

    let header = Paragraph::new(Line::from(connection_spans(state.connections.as_ref()))).block(
        Block::default()
            .borders(Borders::ALL)
            .title("scrapemate"),
    );
    f.render_widget(header, chunks[0]);

    match state.view {
        View::Projects => draw_projects(chunks[1], f, state),
        View::Pages => draw_pages(chunks[1], f, state),
        View::Brief => draw_brief(chunks[1], f, state),
        View::Help => help::draw_help(chunks[1], f),
    }

    draw_footer(chunks[2], f, state);
}

fn key_hint(key: &'static str, action: &'static str) -> [Span<'static>; 2] {
    [
        Span::styled(key, Style::default().fg(Color::Magenta)),
        Span::raw(action),
    ]
}

fn draw_footer(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let first = match &state.prompt {
        Prompt::NewUrl(input) => Line::from(vec![
            Span::styled("Website URL: ", Style::default().fg(Color::Yellow)),
            Span::raw(input.clone()),
            Span::styled("█", Style::default().fg(Color::Yellow)),
        ]),
        Prompt::ConfirmDelete { name, .. } => Line::from(vec![Span::styled(
            format!("Delete {name} with its pages and brief? (y/N)"),
            Style::default().fg(Color::Red),
        )]),
        Prompt::None => Line::from(vec![
            Span::styled("Info: ", Style::default().fg(Color::Gray)),
            Span::raw(state.info.clone()),
        ]),
    };
    let hints: Vec<Span> = match (&state.prompt, state.view) {
        (Prompt::NewUrl(_), _) => [key_hint("Enter", " analyze  "), key_hint("Esc", " cancel")]
            .into_iter()
            .flatten()
            .collect(),
        (Prompt::ConfirmDelete { .. }, _) => Vec::new(),
        (Prompt::None, View::Projects) => [
            key_hint("n", " new  "),
            key_hint("Enter", " pages  "),
            key_hint("b", " brief  "),
            key_hint("g", " generate  "),
            key_hint("e/E", " export  "),
            key_hint("d", " delete  "),
            key_hint("?", " help  "),
            key_hint("q", " quit"),
        ]
        .into_iter()
        .flatten()
        .collect(),
        (Prompt::None, _) => [
            key_hint("Esc", " back  "),
            key_hint("↑/↓", " scroll  "),
            key_hint("g", " generate  "),
            key_hint("e/E", " export  "),
            key_hint("r", " reload  "),
            key_hint("q", " quit"),
        ]
        .into_iter()
        .flatten()
        .collect(),
    };
    let p = Paragraph::new(vec![first, Line::from(hints)])
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(p, area);
}

fn draw_projects(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let projects = state.projects();
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!("Projects ({})", projects.len()));

    if projects.is_empty() {
        let msg = if state.loaded {
            "No projects yet. Press 'n' to analyze a website."
        } else {
            "Loading projects…"
        };
        f.render_widget(Paragraph::new(msg).block(block), area);
        return;
    }

    let max_items = (area.height as usize).saturating_sub(2).max(1);
    let mut offset = state.scroll_offset.min(projects.len().saturating_sub(1));
    if state.selected >= offset + max_items {
        offset = state.selected + 1 - max_items;
    }

    let lines: Vec<Line> = projects
        .iter()
        .enumerate()
        .skip(offset)
        .take(max_items)
        .map(|(idx, p)| {
            let is_selected = idx == state.selected;
            let base = if is_selected {
                Style::default().add_modifier(Modifier::REVERSED)
            } else {
                Style::default()
            };
            let progress = match p.progress {
                Some(pct) => format!("{} {pct:>3}%", progress_bar(Some(pct), 10)),
                None => format!("{}    -", progress_bar(None, 10)),
            };
            let mut spans = vec![
                Span::styled(format!("{:>2}. ", idx + 1), base),
                Span::styled(format!("{:<28}", p.display_name()), base.fg(Color::White)),
                Span::styled(format!("{:<11}", p.status.as_str()), base.fg(status_color(p.status))),
                Span::styled(progress, base.fg(status_color(p.status))),
                Span::styled(format!("  {}", format_date(p.created_at)), base.fg(Color::Gray)),
            ];
            if state.brief_pending.contains(&p.id) {
                spans.push(Span::styled("  [brief…]", base.fg(Color::Cyan)));
            }
            if let Some(msg) = p.progress_message.as_deref().filter(|m| !m.is_empty()) {
                spans.push(Span::styled(format!("  {msg}"), base.fg(Color::Gray)));
            }
            Line::from(spans)
        })
        .collect();

    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_pages(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let name = target_project(state)
        .map(|p| p.display_name().to_string())
        .unwrap_or_default();
    let mut lines: Vec<Line> = Vec::new();
    match &state.pages {
        None => lines.push(Line::from("Loading pages…")),
        Some((_, pages)) if pages.is_empty() => {
            lines.push(Line::from("No pages were scraped for this project."))
        }
        Some((_, pages)) => {
            for (i, page) in pages.iter().enumerate() {
                let title = page
                    .title
                    .as_deref()
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or("Untitled Page");
                lines.push(Line::from(Span::styled(
                    format!("{}. {}", i + 1, title),
                    Style::default().add_modifier(Modifier::BOLD),
                )));
                lines.push(Line::from(Span::styled(
                    page.url.clone(),
                    Style::default().fg(Color::Blue),
                )));
                match page.content() {
                    Some(content) => {
                        let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
                        lines.push(Line::from(preview(&flat, PAGE_PREVIEW_CHARS)));
                    }
                    None => lines.push(Line::from(Span::styled(
                        "(no content)",
                        Style::default().fg(Color::Gray),
                    ))),
                }
                lines.push(Line::from(""));
            }
        }
    }
    let title = match &state.pages {
        Some((_, pages)) => format!("Pages: {name} ({})", pages.len()),
        None => format!("Pages: {name}"),
    };
    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .scroll((state.detail_scroll.min(u16::MAX as usize) as u16, 0))
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(p, area);
}

fn draw_brief(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let project = target_project(state);
    let name = project
        .map(|p| p.display_name().to_string())
        .unwrap_or_default();
    let pending = project.is_some_and(|p| state.brief_pending.contains(&p.id));

    let mut lines: Vec<Line> = Vec::new();
    match &state.brief {
        None => lines.push(Line::from("Loading brief…")),
        Some((_, None)) if pending => lines.push(Line::from("Generating executive brief…")),
        Some((_, None)) => {
            lines.push(Line::from("No executive brief yet. Press 'g' to generate one."))
        }
        Some((_, Some(brief))) => {
            lines.push(Line::from(Span::styled(
                format!("Generated {}", format_date_time(brief.generated_at)),
                Style::default().fg(Color::Gray),
            )));
            for (title, text) in brief.sections.titled() {
                lines.push(Line::from(""));
                lines.push(Line::from(Span::styled(
                    title,
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                )));
                lines.extend(
                    clean_brief_text(text)
                        .lines()
                        .map(|l| Line::from(l.to_string())),
                );
            }
        }
    }
    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .scroll((state.detail_scroll.min(u16::MAX as usize) as u16, 0))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Executive Brief: {name}")),
        );
    f.render_widget(p, area);
}
