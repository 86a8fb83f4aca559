//! Report export: a project, its pages and its brief rendered to a single document.

mod clean;
mod csv;
mod html;
mod markdown;

pub use clean::clean_brief_text;

use crate::engine::facade::ProjectStore;
use crate::error::{AppError, AppResult};
use crate::model::{truncate_chars, ExecutiveBrief, Page, Project};
use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;
use std::path::{Path, PathBuf};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::OffsetDateTime;

const DATE: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");
const DATE_TIME: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute] UTC");

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    #[value(alias = "md")]
    Markdown,
    Json,
    Csv,
    Html,
}

impl ReportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ReportFormat::Markdown => "md",
            ReportFormat::Json => "json",
            ReportFormat::Csv => "csv",
            ReportFormat::Html => "html",
        }
    }
}

/// Everything a report shows, captured at export time.
#[derive(Debug, Clone)]
pub struct ReportData {
    pub project: Project,
    pub pages: Vec<Page>,
    pub brief: Option<ExecutiveBrief>,
    pub generated_at: OffsetDateTime,
}

impl ReportData {
    pub fn new(project: Project, pages: Vec<Page>, brief: Option<ExecutiveBrief>) -> Self {
        Self {
            project,
            pages,
            brief,
            generated_at: OffsetDateTime::now_utc(),
        }
    }

    /// Load the project with its pages and brief; the three reads run concurrently.
    pub async fn fetch(store: &dyn ProjectStore, project_id: &str) -> AppResult<Self> {
        let (project, pages, brief) = futures::try_join!(
            store.get_project(project_id),
            store.list_pages(project_id),
            store.get_brief(project_id),
        )?;
        let project = project.ok_or_else(|| AppError::NotFound(project_id.to_string()))?;
        Ok(Self::new(project, pages, brief))
    }

    /// Brief sections with their cleaned text, skipping sections that are blank.
    pub(crate) fn brief_sections(&self) -> Vec<(&'static str, String)> {
        let Some(brief) = &self.brief else {
            return Vec::new();
        };
        brief
            .sections
            .titled()
            .into_iter()
            .filter(|(_, text)| !text.trim().is_empty())
            .map(|(title, text)| (title, clean_brief_text(text)))
            .collect()
    }
}

pub(crate) fn format_date(t: OffsetDateTime) -> String {
    t.format(DATE).unwrap_or_else(|_| t.to_string())
}

pub(crate) fn format_date_time(t: OffsetDateTime) -> String {
    t.to_offset(time::UtcOffset::UTC)
        .format(DATE_TIME)
        .unwrap_or_else(|_| t.to_string())
}

/// First `max` characters of page content, with an ellipsis when cut.
pub(crate) fn preview(content: &str, max: usize) -> String {
    let cut = truncate_chars(content, max);
    if cut.len() < content.len() {
        format!("{cut}...")
    } else {
        cut.to_string()
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    project: &'a Project,
    pages: &'a [Page],
    executive_brief: Option<JsonBrief>,
    #[serde(with = "time::serde::rfc3339")]
    generated_at: OffsetDateTime,
}

#[derive(Serialize)]
struct JsonBrief {
    #[serde(with = "time::serde::rfc3339")]
    generated_at: OffsetDateTime,
    sections: serde_json::Map<String, serde_json::Value>,
}

fn render_json(data: &ReportData) -> Result<String> {
    let executive_brief = data.brief.as_ref().map(|b| JsonBrief {
        generated_at: b.generated_at,
        sections: data
            .brief_sections()
            .into_iter()
            .map(|(title, text)| (title.to_string(), serde_json::Value::String(text)))
            .collect(),
    });
    let report = JsonReport {
        project: &data.project,
        pages: &data.pages,
        executive_brief,
        generated_at: data.generated_at,
    };
    serde_json::to_string_pretty(&report).context("serialize report")
}

pub fn render(data: &ReportData, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Markdown => Ok(markdown::render(data)),
        ReportFormat::Json => render_json(data),
        ReportFormat::Csv => csv::render(data),
        ReportFormat::Html => Ok(html::render(data)),
    }
}

/// `scrapemate-report-<name>-<YYYY-MM-DD>.<ext>`, with the name made filesystem-safe.
pub fn file_name(data: &ReportData, format: ReportFormat) -> String {
    let name: String = data
        .project
        .name
        .as_deref()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or("project")
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '-'
            }
        })
        .collect();
    format!(
        "scrapemate-report-{}-{}.{}",
        name,
        format_date(data.generated_at),
        format.extension()
    )
}

/// The user's download directory, or the current directory when there is none.
pub fn default_dir() -> Result<PathBuf> {
    match dirs::download_dir() {
        Some(dir) => Ok(dir),
        None => std::env::current_dir().context("get current directory"),
    }
}

/// Render and write the report into `dir`, returning the absolute path written.
pub fn write_report(data: &ReportData, format: ReportFormat, dir: &Path) -> Result<PathBuf> {
    let body = render(data, format)?;
    std::fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    let path = dir.join(file_name(data, format));
    std::fs::write(&path, body).with_context(|| format!("write {}", path.display()))?;
    Ok(path.canonicalize().unwrap_or(path))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::model::{BriefSections, ProjectStatus};
    use time::macros::datetime;

    pub fn report() -> ReportData {
        let project = Project {
            id: "p1".into(),
            seed_url: "https://acme.io/".into(),
            name: Some("acme.io".into()),
            status: ProjectStatus::Completed,
            progress: Some(100),
            progress_message: Some("Analysis completed successfully!".into()),
            created_at: datetime!(2024-05-01 10:00 UTC),
        };
        let pages = vec![
            Page {
                id: "pg1".into(),
                project_id: "p1".into(),
                url: "https://acme.io/".into(),
                title: Some("Home <Acme>".into()),
                content_md: Some("# Acme\n\nRockets, \"fast\" ones.".into()),
                status: Some("done".into()),
                created_at: datetime!(2024-05-01 10:01 UTC),
            },
            Page {
                id: "pg2".into(),
                project_id: "p1".into(),
                url: "https://acme.io/about".into(),
                title: None,
                content_md: None,
                status: Some("done".into()),
                created_at: datetime!(2024-05-01 10:02 UTC),
            },
        ];
        let brief = ExecutiveBrief {
            id: Some("b1".into()),
            project_id: "p1".into(),
            sections: BriefSections {
                company_overview: r#"{"company_overview": "Acme builds rockets."}"#.into(),
                products_services: "Rockets & anvils.".into(),
                business_model: "Direct sales.".into(),
                target_market: "".into(),
                key_insights: "Strong brand.".into(),
                competitive_positioning: "Market leader.".into(),
            },
            generated_at: datetime!(2024-05-02 09:30 UTC),
        };
        ReportData {
            project,
            pages,
            brief: Some(brief),
            generated_at: datetime!(2024-05-03 12:00 UTC),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn file_names_are_dated_and_safe() {
        let mut data = fixtures::report();
        assert_eq!(
            file_name(&data, ReportFormat::Markdown),
            "scrapemate-report-acme.io-2024-05-03.md"
        );
        data.project.name = Some("a/b c".into());
        assert_eq!(
            file_name(&data, ReportFormat::Html),
            "scrapemate-report-a-b-c-2024-05-03.html"
        );
        data.project.name = None;
        assert_eq!(
            file_name(&data, ReportFormat::Csv),
            "scrapemate-report-project-2024-05-03.csv"
        );
    }

    #[test]
    fn brief_sections_are_cleaned_and_blank_ones_skipped() {
        let sections = fixtures::report().brief_sections();
        let titles: Vec<_> = sections.iter().map(|(t, _)| *t).collect();
        assert_eq!(
            titles,
            vec![
                "Company Overview",
                "Products & Services",
                "Business Model",
                "Key Insights",
                "Competitive Positioning"
            ]
        );
        assert_eq!(sections[0].1, "Acme builds rockets.");
    }

    #[test]
    fn json_report_carries_cleaned_brief() {
        let out = render(&fixtures::report(), ReportFormat::Json).unwrap();
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["project"]["id"], "p1");
        assert_eq!(v["pages"].as_array().unwrap().len(), 2);
        assert_eq!(
            v["executive_brief"]["sections"]["Company Overview"],
            "Acme builds rockets."
        );
        assert_eq!(v["generated_at"], "2024-05-03T12:00:00Z");
    }

    #[test]
    fn preview_marks_truncation() {
        assert_eq!(preview("abcdef", 3), "abc...");
        assert_eq!(preview("abc", 3), "abc");
    }

    #[test]
    fn write_report_creates_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("nested");
        let path = write_report(&fixtures::report(), ReportFormat::Markdown, &out_dir).unwrap();
        assert!(path.ends_with("scrapemate-report-acme.io-2024-05-03.md"));
        let body = std::fs::read_to_string(path).unwrap();
        assert!(body.starts_with("# ScrapeMate Analysis Report"));
    }

    #[tokio::test]
    async fn fetch_reports_unknown_projects() {
        let store = crate::testing::MemoryStore::default();
        let err = ReportData::fetch(&store, "nope").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
