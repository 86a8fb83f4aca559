//! On-demand executive brief generation for an existing project.

use crate::engine::{company_name, compose_corpus, Facades};
use crate::error::{AppError, AppResult, Service};
use crate::model::{ExecutiveBrief, Project};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

/// Return the project's brief, synthesizing and storing one if it has none.
///
/// With `regenerate` set, an existing brief is replaced. Synthesis is refused
/// locally, with no remote call, when no page has content. On any failure nothing
/// is written.
pub async fn generate_brief(
    facades: &Facades,
    project: &Project,
    char_cap: usize,
    regenerate: bool,
) -> AppResult<ExecutiveBrief> {
    if !regenerate {
        if let Some(existing) = facades.store.get_brief(&project.id).await? {
            debug!(project_id = %project.id, "brief already exists");
            return Ok(existing);
        }
    }

    let pages = facades.store.list_pages(&project.id).await?;
    if !pages.iter().any(|p| p.content().is_some()) {
        return Err(AppError::NoPageContent);
    }
    if !facades.synthesizer.is_configured() {
        return Err(AppError::Config {
            service: Service::Synthesis,
        });
    }

    let corpus = compose_corpus(pages.iter().filter_map(|p| p.content()), Some(char_cap));
    let company = project
        .name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| company_name(&project.seed_url));
    info!(project_id = %project.id, chars = corpus.chars().count(), regenerate, "generating brief");

    let sections = facades
        .synthesizer
        .synthesize(&corpus, &company)
        .await
        .inspect_err(|e| warn!(project_id = %project.id, error = %e, "synthesis failed"))?;
    facades
        .store
        .upsert_brief(&project.id, &sections, OffsetDateTime::now_utc())
        .await
}
