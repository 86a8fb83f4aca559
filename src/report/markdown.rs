use super::{format_date, format_date_time, preview, ReportData};
use std::fmt::Write;

const PREVIEW_CHARS: usize = 500;

pub(super) fn render(data: &ReportData) -> String {
    let project = &data.project;
    let mut md = String::new();

    md.push_str("# ScrapeMate Analysis Report\n\n");
    md.push_str("**Professional Website Analysis & Business Intelligence**\n\n---\n\n");
    md.push_str("## Project Information\n\n");
    let _ = writeln!(md, "- **Project:** {}", project.display_name());
    let _ = writeln!(md, "- **URL:** {}", project.seed_url);
    let _ = writeln!(md, "- **Status:** {}", project.status);
    if let Some(msg) = project.progress_message.as_deref().filter(|m| !m.is_empty()) {
        let _ = writeln!(md, "- **Status Message:** {msg}");
    }
    let _ = writeln!(md, "- **Created:** {}", format_date(project.created_at));
    let _ = writeln!(md, "- **Report Generated:** {}", format_date(data.generated_at));
    let _ = writeln!(md, "- **Pages Scraped:** {}\n", data.pages.len());
    md.push_str("---\n\n");

    if data.brief.is_some() {
        md.push_str("## Executive Brief\n\n*AI-Generated Business Intelligence Analysis*\n\n");
        for (title, text) in data.brief_sections() {
            let _ = write!(md, "### {title}\n\n{text}\n\n");
        }
        md.push_str("---\n\n");
    }

    md.push_str("## Scraped Pages Summary\n\n");
    if data.pages.is_empty() {
        md.push_str("*No pages were scraped for this project.*\n\n");
    }
    for (i, page) in data.pages.iter().enumerate() {
        let title = page
            .title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or("Untitled Page");
        let _ = write!(md, "### {}. {}\n\n", i + 1, title);
        let _ = writeln!(md, "- **URL:** {}", page.url);
        let _ = writeln!(md, "- **Scraped:** {}\n", format_date(page.created_at));
        if let Some(content) = page.content() {
            let _ = write!(
                md,
                "**Content Preview:**\n\n{}\n\n",
                preview(content, PREVIEW_CHARS)
            );
        }
        md.push_str("---\n\n");
    }

    let _ = writeln!(
        md,
        "*Report generated by ScrapeMate on {}*",
        format_date_time(data.generated_at)
    );
    md
}

#[cfg(test)]
mod tests {
    use super::super::fixtures;
    use super::*;

    #[test]
    fn includes_project_brief_and_pages() {
        let md = render(&fixtures::report());
        assert!(md.contains("- **Project:** acme.io\n"));
        assert!(md.contains("- **Pages Scraped:** 2\n"));
        assert!(md.contains("### Company Overview\n\nAcme builds rockets.\n\n"));
        assert!(!md.contains("### Target Market"));
        assert!(md.contains("### 1. Home <Acme>"));
        assert!(md.contains("### 2. Untitled Page"));
        assert!(md.contains("**Content Preview:**\n\n# Acme"));
        assert!(md.ends_with("*Report generated by ScrapeMate on 2024-05-03 12:00 UTC*\n"));
    }

    #[test]
    fn reports_without_brief_or_pages_say_so() {
        let mut data = fixtures::report();
        data.brief = None;
        data.pages.clear();
        let md = render(&data);
        assert!(!md.contains("## Executive Brief"));
        assert!(md.contains("*No pages were scraped for this project.*"));
    }
}
