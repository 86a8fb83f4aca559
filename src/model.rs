use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

/// Lifecycle of a single analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl ProjectStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ProjectStatus::Completed | ProjectStatus::Failed)
    }

    fn rank(self) -> u8 {
        match self {
            ProjectStatus::Queued => 0,
            ProjectStatus::Processing => 1,
            ProjectStatus::Completed | ProjectStatus::Failed => 2,
        }
    }

    /// Transitions only move forward: queued -> processing -> {completed | failed}.
    /// Re-writing the same non-terminal status (progress ticks) is allowed.
    pub fn can_transition_to(self, next: ProjectStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next.rank() >= self.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProjectStatus::Queued => "queued",
            ProjectStatus::Processing => "processing",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub seed_url: String,
    #[serde(default)]
    pub name: Option<String>,
    pub status: ProjectStatus,
    #[serde(default)]
    pub progress: Option<u8>,
    #[serde(default)]
    pub progress_message: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Project {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or("Untitled Project")
    }
}

/// Row shape for `insert_project`.
#[derive(Debug, Clone, Serialize)]
pub struct NewProject {
    pub seed_url: String,
    pub name: String,
    pub status: ProjectStatus,
}

/// Partial update of the three mutable status fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ProjectStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_message: Option<String>,
}

impl StatusUpdate {
    pub fn progress(status: ProjectStatus, progress: u8, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            progress: Some(progress.min(100)),
            progress_message: Some(message.into()),
        }
    }

    /// Failure leaves the progress column untouched.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Some(ProjectStatus::Failed),
            progress: None,
            progress_message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: String,
    pub project_id: String,
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content_md: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Page {
    /// Content with surrounding whitespace removed, `None` when blank.
    pub fn content(&self) -> Option<&str> {
        self.content_md
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}

/// Row shape for the batch page insert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewPage {
    pub project_id: String,
    pub url: String,
    pub title: String,
    pub content_md: String,
    pub status: String,
}

/// The six narrative sections of an executive brief.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BriefSections {
    pub company_overview: String,
    pub products_services: String,
    pub business_model: String,
    pub target_market: String,
    pub key_insights: String,
    pub competitive_positioning: String,
}

impl BriefSections {
    /// Section headings paired with their text, in report order.
    pub fn titled(&self) -> [(&'static str, &str); 6] {
        [
            ("Company Overview", &self.company_overview),
            ("Products & Services", &self.products_services),
            ("Business Model", &self.business_model),
            ("Target Market", &self.target_market),
            ("Key Insights", &self.key_insights),
            ("Competitive Positioning", &self.competitive_positioning),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutiveBrief {
    #[serde(default)]
    pub id: Option<String>,
    pub project_id: String,
    #[serde(flatten)]
    pub sections: BriefSections,
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
}

/// Page as returned by the crawl facade.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawledPage {
    pub url: String,
    pub title: Option<String>,
    pub markdown: String,
}

/// Result of one crawl call. A facade may report failure explicitly instead of erroring.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlOutcome {
    pub success: bool,
    pub pages: Vec<CrawledPage>,
    pub error: Option<String>,
}

impl CrawlOutcome {
    pub fn succeeded(pages: Vec<CrawledPage>) -> Self {
        Self {
            success: true,
            pages,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            pages: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// Longest prefix of `s` holding at most `max` characters.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Events emitted by the engine and poller, consumed by UI/CLI layers.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// A status row was written for a project.
    Progress {
        project_id: String,
        update: StatusUpdate,
    },
    /// Fresh snapshot of the project list.
    ProjectsRefreshed { projects: Vec<Project> },
    /// A refresh attempt failed; the previous snapshot stays on screen.
    RefreshFailed { message: String },
    Info(String),
}

impl AppEvent {
    /// Render a human-readable line for text mode.
    pub fn to_message(&self) -> Option<String> {
        match self {
            AppEvent::Progress { update, .. } => {
                let status = update.status.map(|s| s.to_string()).unwrap_or_default();
                let msg = update.progress_message.as_deref().unwrap_or("");
                match update.progress {
                    Some(p) => Some(format!("[{status} {p:>3}%] {msg}")),
                    None => Some(format!("[{status}] {msg}")),
                }
            }
            AppEvent::RefreshFailed { message } => Some(format!("Refresh failed: {message}")),
            AppEvent::Info(msg) => Some(msg.clone()),
            AppEvent::ProjectsRefreshed { .. } => None,
        }
    }
}
