//! In-process fakes for the three remote collaborators.

use crate::engine::facade::{CrawlFacade, ProjectStore, SynthesisFacade};
use crate::error::{AppError, AppResult, Service};
use crate::model::{
    BriefSections, CrawlOutcome, ExecutiveBrief, NewPage, Page, Project, ProjectStatus,
    StatusUpdate,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use time::macros::datetime;
use time::{Duration, OffsetDateTime};

pub fn sample_sections() -> BriefSections {
    BriefSections {
        company_overview: "Acme builds rockets.".into(),
        products_services: "Rockets and anvils.".into(),
        business_model: "Direct sales.".into(),
        target_market: "Coyotes.".into(),
        key_insights: "Strong brand.".into(),
        competitive_positioning: "Market leader.".into(),
    }
}

#[derive(Default)]
struct StoreState {
    projects: Vec<Project>,
    pages: Vec<Page>,
    briefs: Vec<ExecutiveBrief>,
    status_writes: Vec<(String, StatusUpdate)>,
    next_id: usize,
}

/// Store backed by vectors. Rows get sequential ids and increasing timestamps.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
    unconfigured: AtomicBool,
    fail_pages: AtomicBool,
    fail_lists: AtomicBool,
    list_calls: AtomicUsize,
    page_inserts: AtomicUsize,
}

impl MemoryStore {
    pub fn unconfigured() -> Self {
        let store = Self::default();
        store.unconfigured.store(true, Ordering::SeqCst);
        store
    }

    pub fn fail_page_inserts(&self) {
        self.fail_pages.store(true, Ordering::SeqCst);
    }

    pub fn fail_listing(&self, fail: bool) {
        self.fail_lists.store(fail, Ordering::SeqCst);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn page_insert_calls(&self) -> usize {
        self.page_inserts.load(Ordering::SeqCst)
    }

    pub fn project(&self, id: &str) -> Project {
        self.state
            .lock()
            .unwrap()
            .projects
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .expect("project exists")
    }

    pub fn pages_for(&self, project_id: &str) -> Vec<Page> {
        self.state
            .lock()
            .unwrap()
            .pages
            .iter()
            .filter(|p| p.project_id == project_id)
            .cloned()
            .collect()
    }

    pub fn brief(&self, project_id: &str) -> Option<ExecutiveBrief> {
        self.state
            .lock()
            .unwrap()
            .briefs
            .iter()
            .find(|b| b.project_id == project_id)
            .cloned()
    }

    pub fn status_writes(&self, project_id: &str) -> Vec<StatusUpdate> {
        self.state
            .lock()
            .unwrap()
            .status_writes
            .iter()
            .filter(|(id, _)| id == project_id)
            .map(|(_, u)| u.clone())
            .collect()
    }

    /// Overwrite a project's status directly, bypassing the transition rules.
    pub fn force_status(&self, id: &str, status: ProjectStatus) {
        let mut state = self.state.lock().unwrap();
        if let Some(p) = state.projects.iter_mut().find(|p| p.id == id) {
            p.status = status;
        }
    }

    pub fn add_page(&self, project_id: &str, title: &str, content: Option<&str>) {
        let mut state = self.state.lock().unwrap();
        let n = state.next_id;
        state.next_id += 1;
        state.pages.push(Page {
            id: format!("pg{n}"),
            project_id: project_id.to_string(),
            url: format!("https://example.com/{n}"),
            title: Some(title.to_string()),
            content_md: content.map(str::to_string),
            status: Some("done".into()),
            created_at: stamp(n),
        });
    }

    fn guard(&self) -> AppResult<()> {
        if self.unconfigured.load(Ordering::SeqCst) {
            return Err(AppError::Config {
                service: Service::Store,
            });
        }
        Ok(())
    }
}

fn stamp(n: usize) -> OffsetDateTime {
    datetime!(2024-05-01 10:00 UTC) + Duration::seconds(n as i64)
}

#[async_trait]
impl ProjectStore for MemoryStore {
    fn is_configured(&self) -> bool {
        !self.unconfigured.load(Ordering::SeqCst)
    }

    async fn ping(&self) -> AppResult<()> {
        self.guard()
    }

    async fn list_projects(&self) -> AppResult<Vec<Project>> {
        self.guard()?;
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_lists.load(Ordering::SeqCst) {
            return Err(AppError::Store("connection reset".into()));
        }
        let mut projects = self.state.lock().unwrap().projects.clone();
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(projects)
    }

    async fn get_project(&self, id: &str) -> AppResult<Option<Project>> {
        self.guard()?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .projects
            .iter()
            .find(|p| p.id == id)
            .cloned())
    }

    async fn insert_project(&self, seed_url: &str, name: &str) -> AppResult<Project> {
        self.guard()?;
        let mut state = self.state.lock().unwrap();
        let n = state.next_id;
        state.next_id += 1;
        let project = Project {
            id: format!("p{n}"),
            seed_url: seed_url.to_string(),
            name: Some(name.to_string()),
            status: ProjectStatus::Queued,
            progress: None,
            progress_message: None,
            created_at: stamp(n),
        };
        state.projects.push(project.clone());
        Ok(project)
    }

    async fn update_project_status(&self, id: &str, update: &StatusUpdate) -> AppResult<()> {
        self.guard()?;
        let mut state = self.state.lock().unwrap();
        state.status_writes.push((id.to_string(), update.clone()));
        let project = state
            .projects
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| AppError::NotFound(id.to_string()))?;
        if let Some(status) = update.status {
            project.status = status;
        }
        if let Some(progress) = update.progress {
            project.progress = Some(progress);
        }
        if let Some(msg) = &update.progress_message {
            project.progress_message = Some(msg.clone());
        }
        Ok(())
    }

    async fn insert_pages(&self, rows: &[NewPage]) -> AppResult<()> {
        self.guard()?;
        self.page_inserts.fetch_add(1, Ordering::SeqCst);
        if self.fail_pages.load(Ordering::SeqCst) {
            return Err(AppError::Store("value too long for type".into()));
        }
        let mut state = self.state.lock().unwrap();
        for row in rows {
            let n = state.next_id;
            state.next_id += 1;
            state.pages.push(Page {
                id: format!("pg{n}"),
                project_id: row.project_id.clone(),
                url: row.url.clone(),
                title: Some(row.title.clone()),
                content_md: Some(row.content_md.clone()),
                status: Some(row.status.clone()),
                created_at: stamp(n),
            });
        }
        Ok(())
    }

    async fn list_pages(&self, project_id: &str) -> AppResult<Vec<Page>> {
        self.guard()?;
        let mut pages = self.pages_for(project_id);
        pages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(pages)
    }

    async fn upsert_brief(
        &self,
        project_id: &str,
        sections: &BriefSections,
        generated_at: OffsetDateTime,
    ) -> AppResult<ExecutiveBrief> {
        self.guard()?;
        let mut state = self.state.lock().unwrap();
        let brief = ExecutiveBrief {
            id: Some(format!("b-{project_id}")),
            project_id: project_id.to_string(),
            sections: sections.clone(),
            generated_at,
        };
        state.briefs.retain(|b| b.project_id != project_id);
        state.briefs.push(brief.clone());
        Ok(brief)
    }

    async fn get_brief(&self, project_id: &str) -> AppResult<Option<ExecutiveBrief>> {
        self.guard()?;
        Ok(self.brief(project_id))
    }

    async fn delete_project(&self, id: &str) -> AppResult<()> {
        self.guard()?;
        let mut state = self.state.lock().unwrap();
        state.projects.retain(|p| p.id != id);
        state.pages.retain(|p| p.project_id != id);
        state.briefs.retain(|b| b.project_id != id);
        Ok(())
    }
}

/// What a [`FakeCrawler`] answers with.
pub enum CrawlScript {
    Outcome(CrawlOutcome),
    /// Simulates a network failure reaching the service.
    Transport,
}

pub struct FakeCrawler {
    configured: bool,
    script: CrawlScript,
    calls: AtomicUsize,
    last_cap: Mutex<Option<usize>>,
}

impl FakeCrawler {
    pub fn returning(script: CrawlScript) -> Self {
        Self {
            configured: true,
            script,
            calls: AtomicUsize::new(0),
            last_cap: Mutex::new(None),
        }
    }

    /// Configured, returns an empty successful crawl.
    pub fn idle() -> Self {
        Self::returning(CrawlScript::Outcome(CrawlOutcome::succeeded(vec![])))
    }

    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::idle()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_cap(&self) -> Option<usize> {
        *self.last_cap.lock().unwrap()
    }
}

#[async_trait]
impl CrawlFacade for FakeCrawler {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn crawl(&self, _seed_url: &str, page_cap: usize) -> AppResult<CrawlOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_cap.lock().unwrap() = Some(page_cap);
        if !self.configured {
            return Err(AppError::Config {
                service: Service::Crawl,
            });
        }
        match &self.script {
            CrawlScript::Outcome(outcome) => Ok(outcome.clone()),
            CrawlScript::Transport => Err(AppError::Transport {
                service: Service::Crawl,
                detail: "connection refused".into(),
                connectivity: true,
            }),
        }
    }
}

/// Synthesizer returning fixed sections, or a malformed-output error when `None`.
pub struct FakeSynth {
    configured: bool,
    sections: Option<BriefSections>,
    calls: AtomicUsize,
    last_input: Mutex<Option<(String, String)>>,
}

impl FakeSynth {
    pub fn returning(sections: Option<BriefSections>) -> Self {
        Self {
            configured: true,
            sections,
            calls: AtomicUsize::new(0),
            last_input: Mutex::new(None),
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::returning(None)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_input(&self) -> Option<String> {
        self.last_input.lock().unwrap().as_ref().map(|(c, _)| c.clone())
    }

    pub fn last_company(&self) -> Option<String> {
        self.last_input.lock().unwrap().as_ref().map(|(_, n)| n.clone())
    }
}

#[async_trait]
impl SynthesisFacade for FakeSynth {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn synthesize(&self, content: &str, company_name: &str) -> AppResult<BriefSections> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_input.lock().unwrap() = Some((content.to_string(), company_name.to_string()));
        if !self.configured {
            return Err(AppError::Config {
                service: Service::Synthesis,
            });
        }
        self.sections
            .clone()
            .ok_or_else(|| AppError::MalformedSynthesis("not json".into()))
    }
}
