use crate::model::{AppEvent, ExecutiveBrief, Page, Project};
use crate::orchestrator::{ConnectionReport, ProjectBoard, UiEvent};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Projects,
    Pages,
    Brief,
    Help,
}

/// Modal input on top of the current view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    None,
    NewUrl(String),
    ConfirmDelete { id: String, name: String },
}

pub struct UiState {
    pub view: View,
    pub prompt: Prompt,
    pub board: ProjectBoard,
    pub selected: usize,
    pub scroll_offset: usize,
    /// Scroll position inside the pages and brief views.
    pub detail_scroll: usize,
    pub pages: Option<(String, Vec<Page>)>,
    pub brief: Option<(String, Option<ExecutiveBrief>)>,
    pub brief_pending: HashSet<String>,
    pub connections: Option<ConnectionReport>,
    /// Set once the first project fetch (or its failure) has arrived.
    pub loaded: bool,
    pub info: String,
    pub last_exported_path: Option<String>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            view: View::Projects,
            prompt: Prompt::None,
            board: ProjectBoard::default(),
            selected: 0,
            scroll_offset: 0,
            detail_scroll: 0,
            pages: None,
            brief: None,
            brief_pending: HashSet::new(),
            connections: None,
            loaded: false,
            info: String::new(),
            last_exported_path: None,
        }
    }
}

impl UiState {
    pub fn projects(&self) -> &[Project] {
        self.board.projects()
    }

    pub fn selected_project(&self) -> Option<&Project> {
        self.projects().get(self.selected)
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
        if self.selected < self.scroll_offset {
            self.scroll_offset = self.selected;
        }
    }

    pub fn select_next(&mut self, visible_rows: usize) {
        let len = self.projects().len();
        if len > 0 && self.selected < len - 1 {
            self.selected += 1;
        }
        let visible_rows = visible_rows.max(1);
        if self.selected >= self.scroll_offset + visible_rows {
            self.scroll_offset = self.selected + 1 - visible_rows;
        }
    }

    /// Keep the cursor on the same project across list changes when possible.
    fn reselect(&mut self, previous_id: Option<String>) {
        let len = self.projects().len();
        if let Some(idx) = previous_id.and_then(|id| self.projects().iter().position(|p| p.id == id))
        {
            self.selected = idx;
        } else if len == 0 {
            self.selected = 0;
        } else if self.selected >= len {
            self.selected = len - 1;
        }
        if self.scroll_offset > self.selected {
            self.scroll_offset = self.selected;
        }
    }

    /// Id of the project whose detail view is open, if any.
    pub fn detail_project_id(&self) -> Option<&str> {
        match self.view {
            View::Pages => self.pages.as_ref().map(|(id, _)| id.as_str()),
            View::Brief => self.brief.as_ref().map(|(id, _)| id.as_str()),
            _ => None,
        }
    }

    pub fn open_pages(&mut self, project_id: &str) {
        self.view = View::Pages;
        self.detail_scroll = 0;
        if self.pages.as_ref().map(|(id, _)| id.as_str()) != Some(project_id) {
            self.pages = None;
        }
    }

    pub fn open_brief(&mut self, project_id: &str) {
        self.view = View::Brief;
        self.detail_scroll = 0;
        if self.brief.as_ref().map(|(id, _)| id.as_str()) != Some(project_id) {
            self.brief = None;
        }
    }

    pub fn apply(&mut self, ev: UiEvent) {
        match ev {
            UiEvent::App(app) => self.apply_app(app),
            UiEvent::Connections(report) => self.connections = Some(report),
            UiEvent::ProjectCreated(project) => {
                self.info = format!("Created project for {}", project.seed_url);
                self.board.insert_local(project);
                self.selected = 0;
                self.scroll_offset = 0;
            }
            UiEvent::PagesLoaded { project_id, pages } => {
                self.pages = Some((project_id, pages));
            }
            UiEvent::BriefLoaded { project_id, brief } => {
                self.brief = Some((project_id, brief));
            }
            UiEvent::BriefGenerated { project_id, result } => {
                self.brief_pending.remove(&project_id);
                match result {
                    Ok(brief) => {
                        self.info = "Executive brief generated".into();
                        self.brief = Some((project_id, Some(brief)));
                    }
                    Err(msg) => self.info = format!("Brief generation failed: {msg}"),
                }
            }
            UiEvent::Exported(Ok(path)) => {
                self.info = format!("Exported: {} (press 'y' to copy path)", path.display());
                self.last_exported_path = Some(path.to_string_lossy().to_string());
            }
            UiEvent::Exported(Err(msg)) => self.info = format!("Export failed: {msg}"),
            UiEvent::Deleted(id) => {
                let keep = self.selected_project().map(|p| p.id.clone());
                self.board.remove(&id);
                self.reselect(keep);
                if self.detail_project_id() == Some(id.as_str()) {
                    self.view = View::Projects;
                }
                self.info = "Deleted".into();
            }
            UiEvent::Notice(msg) => self.info = msg,
        }
    }

    fn apply_app(&mut self, ev: AppEvent) {
        match ev {
            AppEvent::ProjectsRefreshed { projects } => {
                let keep = self.selected_project().map(|p| p.id.clone());
                self.board.apply_fetch(projects);
                self.reselect(keep);
                self.loaded = true;
            }
            AppEvent::Progress { project_id, update } => {
                self.board.apply_update(&project_id, &update);
            }
            AppEvent::RefreshFailed { message } => {
                self.loaded = true;
                self.info = format!("Refresh failed: {message}");
            }
            AppEvent::Info(msg) => self.info = msg,
        }
    }
}
