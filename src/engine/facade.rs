//! Contracts for the three remote collaborators.
//!
//! The engine and orchestrator only ever talk to these traits, so the HTTP clients
//! can be swapped for in-process fakes in tests.

use crate::error::AppResult;
use crate::model::{
    BriefSections, CrawlOutcome, ExecutiveBrief, NewPage, Page, Project, StatusUpdate,
};
use async_trait::async_trait;
use time::OffsetDateTime;

/// Hosted relational store holding projects, pages and briefs.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    fn is_configured(&self) -> bool;

    /// Reachability probe; fails when any of the tables is missing.
    async fn ping(&self) -> AppResult<()>;

    /// All projects, newest first.
    async fn list_projects(&self) -> AppResult<Vec<Project>>;

    async fn get_project(&self, id: &str) -> AppResult<Option<Project>>;

    /// Create a project row with status `queued`.
    async fn insert_project(&self, seed_url: &str, name: &str) -> AppResult<Project>;

    async fn update_project_status(&self, id: &str, update: &StatusUpdate) -> AppResult<()>;

    /// Batch insert, all-or-nothing.
    async fn insert_pages(&self, rows: &[NewPage]) -> AppResult<()>;

    async fn list_pages(&self, project_id: &str) -> AppResult<Vec<Page>>;

    /// Create or replace the brief for a project.
    async fn upsert_brief(
        &self,
        project_id: &str,
        sections: &BriefSections,
        generated_at: OffsetDateTime,
    ) -> AppResult<ExecutiveBrief>;

    async fn get_brief(&self, project_id: &str) -> AppResult<Option<ExecutiveBrief>>;

    /// Delete a project; pages and brief cascade.
    async fn delete_project(&self, id: &str) -> AppResult<()>;
}

/// External scraping service.
#[async_trait]
pub trait CrawlFacade: Send + Sync {
    fn is_configured(&self) -> bool;

    async fn crawl(&self, seed_url: &str, page_cap: usize) -> AppResult<CrawlOutcome>;
}

/// External LLM producing the six-section brief.
#[async_trait]
pub trait SynthesisFacade: Send + Sync {
    fn is_configured(&self) -> bool;

    async fn synthesize(&self, content: &str, company_name: &str) -> AppResult<BriefSections>;
}
