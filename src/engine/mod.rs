pub mod facade;
mod firecrawl;
mod http;
mod openai;
mod supabase;

use crate::config::Settings;
use crate::error::AppResult;
use crate::model::{
    truncate_chars, AppEvent, CrawledPage, NewPage, ProjectStatus, StatusUpdate,
};
use facade::{CrawlFacade, ProjectStore, SynthesisFacade};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, warn};

pub use firecrawl::FirecrawlClient;
pub use openai::OpenAiClient;
pub use supabase::SupabaseStore;

pub const MSG_CRAWL_UNCONFIGURED: &str = "Firecrawl API key not configured";
pub const MSG_STARTING: &str = "Starting website analysis…";
pub const MSG_COMPLETED: &str = "Analysis completed successfully!";
pub const MSG_STORE_FAILED: &str = "Failed to store scraped pages";
pub const MSG_CRAWL_FAILED: &str = "Failed to crawl website";

/// The three remote collaborators, shared by the engine and the orchestration layer.
#[derive(Clone)]
pub struct Facades {
    pub store: Arc<dyn ProjectStore>,
    pub crawler: Arc<dyn CrawlFacade>,
    pub synthesizer: Arc<dyn SynthesisFacade>,
}

impl Facades {
    pub fn from_settings(settings: &Settings) -> AppResult<Self> {
        Ok(Self {
            store: Arc::new(SupabaseStore::new(settings)?),
            crawler: Arc::new(FirecrawlClient::new(settings)?),
            synthesizer: Arc::new(OpenAiClient::new(settings)?),
        })
    }
}

/// What happened to the optional brief step of a run.
#[derive(Debug, Clone, PartialEq)]
pub enum BriefOutcome {
    Skipped,
    Generated,
    Failed(String),
}

/// Summary of one `process_project` run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub status: ProjectStatus,
    pub message: String,
    pub pages_stored: usize,
    pub brief: BriefOutcome,
}

/// Writes status rows for one project, refusing any transition that would regress.
struct StatusWriter<'a> {
    store: &'a dyn ProjectStore,
    project_id: &'a str,
    current: ProjectStatus,
    events: &'a UnboundedSender<AppEvent>,
}

impl StatusWriter<'_> {
    async fn write(&mut self, update: StatusUpdate) {
        let Some(next) = update.status else {
            return;
        };
        if !self.current.can_transition_to(next) {
            warn!(
                project_id = self.project_id,
                from = %self.current,
                to = %next,
                "refusing status regression"
            );
            return;
        }
        if let Err(e) = self
            .store
            .update_project_status(self.project_id, &update)
            .await
        {
            // A lost status write is logged; the run itself carries on.
            error!(project_id = self.project_id, error = %e, "failed to update project status");
        }
        self.current = next;
        let _ = self.events.send(AppEvent::Progress {
            project_id: self.project_id.to_string(),
            update,
        });
    }

    async fn fail(&mut self, message: impl Into<String>) -> RunSummary {
        let message = message.into();
        warn!(project_id = self.project_id, %message, "project failed");
        self.write(StatusUpdate::failed(message.clone())).await;
        RunSummary {
            status: ProjectStatus::Failed,
            message,
            pages_stored: 0,
            brief: BriefOutcome::Skipped,
        }
    }
}

/// Drives one project from `queued` to a terminal state.
pub struct AnalysisEngine {
    facades: Facades,
    page_limit: usize,
}

impl AnalysisEngine {
    pub fn new(facades: Facades, page_limit: usize) -> Self {
        Self {
            facades,
            page_limit,
        }
    }

    /// Crawl, store, complete, then optionally synthesize a brief.
    ///
    /// Never returns an error: every failure is written to the project's status row.
    /// Nothing is retried and earlier writes are never rolled back.
    pub async fn process_project(
        &self,
        project_id: &str,
        seed_url: &str,
        events: &UnboundedSender<AppEvent>,
    ) -> RunSummary {
        let store = self.facades.store.as_ref();
        let mut writer = StatusWriter {
            store,
            project_id,
            current: ProjectStatus::Queued,
            events,
        };

        if !self.facades.crawler.is_configured() {
            return writer.fail(MSG_CRAWL_UNCONFIGURED).await;
        }

        writer
            .write(StatusUpdate::progress(
                ProjectStatus::Processing,
                0,
                MSG_STARTING,
            ))
            .await;

        info!(project_id, seed_url, page_limit = self.page_limit, "crawling");
        let pages = match self.facades.crawler.crawl(seed_url, self.page_limit).await {
            Ok(outcome) if outcome.success => outcome.pages,
            Ok(outcome) => {
                let message = outcome.error.unwrap_or_else(|| MSG_CRAWL_FAILED.into());
                return writer.fail(message).await;
            }
            Err(e) => return writer.fail(e.user_message()).await,
        };

        let n = pages.len();
        let rows = page_rows(project_id, pages);
        if n > 0 {
            writer
                .write(StatusUpdate::progress(
                    ProjectStatus::Processing,
                    30,
                    format!("Found {n} pages, preparing content…"),
                ))
                .await;
            writer
                .write(StatusUpdate::progress(
                    ProjectStatus::Processing,
                    60,
                    format!("Storing {n} pages…"),
                ))
                .await;
            if let Err(e) = store.insert_pages(&rows).await {
                error!(project_id, error = %e, "error storing pages");
                return writer.fail(MSG_STORE_FAILED).await;
            }
            writer
                .write(StatusUpdate::progress(
                    ProjectStatus::Processing,
                    90,
                    format!("Stored {n} pages, finalizing analysis…"),
                ))
                .await;
        } else {
            info!(project_id, "crawl returned no pages");
        }

        writer
            .write(StatusUpdate::progress(
                ProjectStatus::Completed,
                100,
                MSG_COMPLETED,
            ))
            .await;

        let brief = if n > 0 && self.facades.synthesizer.is_configured() {
            self.generate_brief(project_id, seed_url, &rows, events).await
        } else {
            BriefOutcome::Skipped
        };

        RunSummary {
            status: ProjectStatus::Completed,
            message: MSG_COMPLETED.to_string(),
            pages_stored: n,
            brief,
        }
    }

    /// Brief failures are logged and reported, never fatal to the project.
    async fn generate_brief(
        &self,
        project_id: &str,
        seed_url: &str,
        rows: &[NewPage],
        events: &UnboundedSender<AppEvent>,
    ) -> BriefOutcome {
        let corpus = compose_corpus(rows.iter().map(|r| r.content_md.as_str()), None);
        let company = company_name(seed_url);
        let result = async {
            let sections = self
                .facades
                .synthesizer
                .synthesize(&corpus, &company)
                .await?;
            self.facades
                .store
                .upsert_brief(project_id, &sections, OffsetDateTime::now_utc())
                .await
        }
        .await;

        match result {
            Ok(_) => {
                let _ = events.send(AppEvent::Info(format!(
                    "Executive brief generated for {company}"
                )));
                BriefOutcome::Generated
            }
            Err(e) => {
                warn!(project_id, error = %e, "brief generation failed");
                let message = e.user_message();
                let _ = events.send(AppEvent::Info(format!(
                    "Executive brief not generated: {message}"
                )));
                BriefOutcome::Failed(message)
            }
        }
    }
}

fn page_rows(project_id: &str, pages: Vec<CrawledPage>) -> Vec<NewPage> {
    pages
        .into_iter()
        .map(|p| NewPage {
            project_id: project_id.to_string(),
            url: p.url,
            title: p.title.unwrap_or_else(|| "Untitled".to_string()),
            content_md: p.markdown,
            status: "done".to_string(),
        })
        .collect()
}

/// Join page contents into one synthesis input, optionally capped to `cap` characters.
///
/// Contents are trimmed, blank ones skipped, and the rest separated by a `---` rule.
pub(crate) fn compose_corpus<'a>(
    contents: impl Iterator<Item = &'a str>,
    cap: Option<usize>,
) -> String {
    let corpus = contents
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");
    match cap {
        Some(cap) => truncate_chars(&corpus, cap).to_string(),
        None => corpus,
    }
}

/// Company name for prompts: the seed URL's hostname without a leading `www.`.
pub(crate) fn company_name(seed_url: &str) -> String {
    reqwest::Url::parse(seed_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .map(|h| h.strip_prefix("www.").map(str::to_string).unwrap_or(h))
        .unwrap_or_else(|| seed_url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CrawlOutcome;
    use crate::testing::{sample_sections, CrawlScript, FakeCrawler, FakeSynth, MemoryStore};
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc;

    fn page(url: &str, title: Option<&str>) -> CrawledPage {
        CrawledPage {
            url: url.into(),
            title: title.map(str::to_string),
            markdown: format!("content of {url}"),
        }
    }

    struct Rig {
        store: Arc<MemoryStore>,
        crawler: Arc<FakeCrawler>,
        synth: Arc<FakeSynth>,
        engine: AnalysisEngine,
    }

    fn rig(crawler: FakeCrawler, synth: FakeSynth) -> Rig {
        let store = Arc::new(MemoryStore::default());
        let crawler = Arc::new(crawler);
        let synth = Arc::new(synth);
        let engine = AnalysisEngine::new(
            Facades {
                store: store.clone(),
                crawler: crawler.clone(),
                synthesizer: synth.clone(),
            },
            8,
        );
        Rig {
            store,
            crawler,
            synth,
            engine,
        }
    }

    async fn run(rig: &Rig) -> (String, RunSummary) {
        let project = rig
            .store
            .insert_project("https://example.com/", "example.com")
            .await
            .unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let summary = rig
            .engine
            .process_project(&project.id, &project.seed_url, &tx)
            .await;
        (project.id, summary)
    }

    #[tokio::test]
    async fn two_pages_are_stored_and_project_completes() {
        let rig = rig(
            FakeCrawler::returning(CrawlScript::Outcome(CrawlOutcome::succeeded(vec![
                page("https://example.com/", Some("Home")),
                page("https://example.com/about", None),
            ]))),
            FakeSynth::unconfigured(),
        );
        let (id, summary) = run(&rig).await;

        assert_eq!(summary.status, ProjectStatus::Completed);
        assert_eq!(summary.pages_stored, 2);
        let pages = rig.store.pages_for(&id);
        assert_eq!(pages.len(), 2);
        assert!(pages.iter().all(|p| p.status.as_deref() == Some("done")));
        assert!(pages
            .iter()
            .any(|p| p.title.as_deref() == Some("Untitled")));

        let project = rig.store.project(&id);
        assert_eq!(project.status, ProjectStatus::Completed);
        assert_eq!(project.progress, Some(100));
        assert_eq!(project.progress_message.as_deref(), Some(MSG_COMPLETED));

        let progress: Vec<_> = rig
            .store
            .status_writes(&id)
            .iter()
            .filter_map(|u| u.progress)
            .collect();
        assert_eq!(progress, vec![0, 30, 60, 90, 100]);
        assert_eq!(rig.crawler.calls(), 1);
        assert_eq!(rig.crawler.last_cap(), Some(8));
    }

    #[tokio::test]
    async fn zero_pages_still_completes() {
        let rig = rig(
            FakeCrawler::returning(CrawlScript::Outcome(CrawlOutcome::succeeded(vec![]))),
            FakeSynth::returning(Some(sample_sections())),
        );
        let (id, summary) = run(&rig).await;

        assert_eq!(summary.status, ProjectStatus::Completed);
        assert!(rig.store.pages_for(&id).is_empty());
        assert_eq!(rig.store.project(&id).progress, Some(100));
        assert_eq!(rig.store.page_insert_calls(), 0);
        assert_eq!(rig.synth.calls(), 0);
        assert_eq!(summary.brief, BriefOutcome::Skipped);
    }

    #[tokio::test]
    async fn explicit_crawl_failure_keeps_the_facade_message() {
        let rig = rig(
            FakeCrawler::returning(CrawlScript::Outcome(CrawlOutcome::failed("timeout"))),
            FakeSynth::unconfigured(),
        );
        let (id, summary) = run(&rig).await;

        let project = rig.store.project(&id);
        assert_eq!(project.status, ProjectStatus::Failed);
        assert_eq!(project.progress_message.as_deref(), Some("timeout"));
        assert_ne!(project.progress, Some(100));
        assert_eq!(summary.message, "timeout");
        assert_eq!(rig.store.page_insert_calls(), 0);
    }

    #[tokio::test]
    async fn crawl_failure_without_message_uses_fallback() {
        let rig = rig(
            FakeCrawler::returning(CrawlScript::Outcome(CrawlOutcome {
                success: false,
                pages: vec![],
                error: None,
            })),
            FakeSynth::unconfigured(),
        );
        let (id, _) = run(&rig).await;
        assert_eq!(
            rig.store.project(&id).progress_message.as_deref(),
            Some(MSG_CRAWL_FAILED)
        );
    }

    #[tokio::test]
    async fn thrown_crawl_fault_is_converted_to_a_message() {
        let rig = rig(
            FakeCrawler::returning(CrawlScript::Transport),
            FakeSynth::unconfigured(),
        );
        let (id, _) = run(&rig).await;
        let project = rig.store.project(&id);
        assert_eq!(project.status, ProjectStatus::Failed);
        assert!(project
            .progress_message
            .unwrap_or_default()
            .starts_with("Unable to connect to Firecrawl"));
    }

    #[tokio::test]
    async fn unconfigured_crawler_fails_without_calling_it() {
        let rig = rig(FakeCrawler::unconfigured(), FakeSynth::unconfigured());
        let (id, summary) = run(&rig).await;

        assert_eq!(rig.crawler.calls(), 0);
        assert_eq!(summary.status, ProjectStatus::Failed);
        let project = rig.store.project(&id);
        assert_eq!(project.status, ProjectStatus::Failed);
        assert_eq!(
            project.progress_message.as_deref(),
            Some(MSG_CRAWL_UNCONFIGURED)
        );
    }

    #[tokio::test]
    async fn page_insert_failure_marks_project_failed() {
        let rig = rig(
            FakeCrawler::returning(CrawlScript::Outcome(CrawlOutcome::succeeded(vec![page(
                "https://example.com/",
                Some("Home"),
            )]))),
            FakeSynth::returning(Some(sample_sections())),
        );
        rig.store.fail_page_inserts();
        let (id, summary) = run(&rig).await;

        let project = rig.store.project(&id);
        assert_eq!(project.status, ProjectStatus::Failed);
        assert_eq!(project.progress_message.as_deref(), Some(MSG_STORE_FAILED));
        assert_eq!(summary.brief, BriefOutcome::Skipped);
        assert_eq!(rig.synth.calls(), 0);
    }

    #[tokio::test]
    async fn brief_is_written_after_completion_when_configured() {
        let rig = rig(
            FakeCrawler::returning(CrawlScript::Outcome(CrawlOutcome::succeeded(vec![page(
                "https://www.example.com/",
                Some("Home"),
            )]))),
            FakeSynth::returning(Some(sample_sections())),
        );
        let project = rig
            .store
            .insert_project("https://www.example.com/", "www.example.com")
            .await
            .unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let summary = rig
            .engine
            .process_project(&project.id, &project.seed_url, &tx)
            .await;

        assert_eq!(summary.brief, BriefOutcome::Generated);
        let brief = rig.store.brief(&project.id).expect("brief stored");
        assert_eq!(brief.sections, sample_sections());
        assert_eq!(rig.synth.last_company().as_deref(), Some("example.com"));
        assert_eq!(
            rig.synth.last_input().as_deref(),
            Some("content of https://www.example.com/")
        );
    }

    #[tokio::test]
    async fn brief_failure_is_not_fatal() {
        let rig = rig(
            FakeCrawler::returning(CrawlScript::Outcome(CrawlOutcome::succeeded(vec![page(
                "https://example.com/",
                Some("Home"),
            )]))),
            FakeSynth::returning(None),
        );
        let (id, summary) = run(&rig).await;

        assert_eq!(rig.store.project(&id).status, ProjectStatus::Completed);
        assert_eq!(rig.store.pages_for(&id).len(), 1);
        assert!(matches!(summary.brief, BriefOutcome::Failed(_)));
        assert!(rig.store.brief(&id).is_none());
    }

    #[tokio::test]
    async fn status_writes_never_regress() {
        let rig = rig(
            FakeCrawler::returning(CrawlScript::Outcome(CrawlOutcome::succeeded(vec![page(
                "https://example.com/",
                None,
            )]))),
            FakeSynth::unconfigured(),
        );
        let (id, _) = run(&rig).await;
        let writes = rig.store.status_writes(&id);
        let mut seen_terminal = false;
        for w in writes {
            let status = w.status.unwrap();
            assert!(!(seen_terminal && !status.is_terminal()));
            seen_terminal |= status.is_terminal();
        }
    }

    #[test]
    fn company_name_strips_www() {
        assert_eq!(company_name("https://www.acme.io/pricing"), "acme.io");
        assert_eq!(company_name("https://docs.acme.io"), "docs.acme.io");
        assert_eq!(company_name("not a url"), "not a url");
    }

    #[test]
    fn corpus_is_capped_by_characters() {
        let contents = ["x".repeat(50), "  ".to_string(), "y".repeat(50)];
        let full = compose_corpus(contents.iter().map(String::as_str), None);
        assert_eq!(full, format!("{}\n\n---\n\n{}", "x".repeat(50), "y".repeat(50)));
        let capped = compose_corpus(contents.iter().map(String::as_str), Some(20));
        assert_eq!(capped, "x".repeat(20));
    }
}
