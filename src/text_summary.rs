//! Text summary builders for CLI output.
//!
//! Each builder formats human-readable lines for text mode; JSON mode serializes the
//! underlying values instead.

use crate::engine::{BriefOutcome, RunSummary};
use crate::model::{ExecutiveBrief, Page, Project};
use crate::orchestrator::{ConnectionReport, StoreHealth};
use crate::report::clean_brief_text;

const PREVIEW_CHARS: usize = 120;

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

fn progress_label(project: &Project) -> String {
    match project.progress {
        Some(p) => format!("{p:>3}%"),
        None => "   -".to_string(),
    }
}

pub(crate) fn build_project_list(projects: &[Project]) -> TextSummary {
    if projects.is_empty() {
        return TextSummary {
            lines: vec!["No projects yet. Run `scrapemate analyze <url>` to start one.".into()],
        };
    }
    let mut lines = Vec::with_capacity(projects.len() * 2);
    for p in projects {
        lines.push(format!(
            "{}  {:<10} {}  {}  {}",
            p.id,
            p.status.as_str(),
            progress_label(p),
            p.display_name(),
            p.seed_url
        ));
        if let Some(msg) = p.progress_message.as_deref().filter(|m| !m.is_empty()) {
            lines.push(format!("    {msg}"));
        }
    }
    TextSummary { lines }
}

/// Single-line, whitespace-collapsed preview of page content.
fn one_line_preview(content: &str) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    crate::report::preview(&flat, PREVIEW_CHARS)
}

pub(crate) fn build_page_list(pages: &[Page]) -> TextSummary {
    if pages.is_empty() {
        return TextSummary {
            lines: vec!["No pages stored for this project.".into()],
        };
    }
    let mut lines = vec![format!("{} pages", pages.len())];
    for (i, page) in pages.iter().enumerate() {
        let title = page.title.as_deref().unwrap_or("Untitled");
        lines.push(format!("{:>3}. {}  <{}>", i + 1, title, page.url));
        match page.content() {
            Some(content) => lines.push(format!(
                "     {} chars: {}",
                content.chars().count(),
                one_line_preview(content)
            )),
            None => lines.push("     (no content)".into()),
        }
    }
    TextSummary { lines }
}

pub(crate) fn build_brief(brief: &ExecutiveBrief) -> TextSummary {
    let mut lines = vec![format!(
        "Executive brief (generated {})",
        crate::report::format_date_time(brief.generated_at)
    )];
    for (title, text) in brief.sections.titled() {
        lines.push(String::new());
        lines.push(format!("== {title} =="));
        lines.extend(clean_brief_text(text).lines().map(str::to_string));
    }
    TextSummary { lines }
}

pub(crate) fn build_connection_report(report: &ConnectionReport) -> TextSummary {
    let store = match &report.store {
        StoreHealth::Connected => "connected".to_string(),
        StoreHealth::Misconfigured => "not configured".to_string(),
        StoreHealth::Error(msg) => format!("error: {msg}"),
    };
    let flag = |configured: bool| if configured { "configured" } else { "not configured" };
    TextSummary {
        lines: vec![
            format!("Supabase:  {store}"),
            format!("Firecrawl: {}", flag(report.crawl_configured)),
            format!("OpenAI:    {}", flag(report.synthesis_configured)),
        ],
    }
}

pub(crate) fn build_run_summary(project: &Project, summary: &RunSummary) -> TextSummary {
    let mut lines = vec![
        format!("Project:  {} ({})", project.display_name(), project.id),
        format!("URL:      {}", project.seed_url),
        format!("Status:   {}", summary.status),
        format!("Message:  {}", summary.message),
        format!("Pages:    {}", summary.pages_stored),
    ];
    match &summary.brief {
        BriefOutcome::Generated => lines.push("Brief:    generated".into()),
        BriefOutcome::Failed(msg) => lines.push(format!("Brief:    failed ({msg})")),
        BriefOutcome::Skipped => {}
    }
    TextSummary { lines }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ProjectStatus, StatusUpdate};
    use pretty_assertions::assert_eq;
    use time::macros::datetime;

    fn project() -> Project {
        Project {
            id: "p1".into(),
            seed_url: "https://acme.io/".into(),
            name: Some("acme.io".into()),
            status: ProjectStatus::Failed,
            progress: Some(30),
            progress_message: StatusUpdate::failed("timeout").progress_message,
            created_at: datetime!(2024-05-01 10:00 UTC),
        }
    }

    #[test]
    fn project_list_shows_status_and_message() {
        let lines = build_project_list(&[project()]).lines;
        assert_eq!(
            lines,
            vec![
                "p1  failed      30%  acme.io  https://acme.io/".to_string(),
                "    timeout".to_string(),
            ]
        );
    }

    #[test]
    fn page_previews_are_flattened() {
        let page = Page {
            id: "pg".into(),
            project_id: "p1".into(),
            url: "https://acme.io/".into(),
            title: None,
            content_md: Some("# Acme\n\n  Rockets".into()),
            status: None,
            created_at: datetime!(2024-05-01 10:00 UTC),
        };
        let lines = build_page_list(&[page]).lines;
        assert_eq!(lines[1], "  1. Untitled  <https://acme.io/>");
        assert_eq!(lines[2], "     17 chars: # Acme Rockets");
    }

    #[test]
    fn connection_report_lines() {
        let lines = build_connection_report(&ConnectionReport {
            store: StoreHealth::Error("Database error: boom".into()),
            crawl_configured: true,
            synthesis_configured: false,
        })
        .lines;
        assert_eq!(lines[0], "Supabase:  error: Database error: boom");
        assert_eq!(lines[2], "OpenAI:    not configured");
    }
}
