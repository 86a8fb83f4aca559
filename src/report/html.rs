use super::{format_date, format_date_time, preview, ReportData};
use std::fmt::Write;

const PREVIEW_CHARS: usize = 300;

const STYLE: &str = r#"body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; line-height: 1.6; color: #333; max-width: 800px; margin: 0 auto; padding: 40px 20px; }
.header { text-align: center; border-bottom: 3px solid #2563eb; padding-bottom: 30px; margin-bottom: 40px; }
.header h1 { color: #1e40af; margin: 0 0 10px 0; }
.subtitle { color: #6b7280; margin: 0; }
.project-info { background: #f8fafc; padding: 20px; border-radius: 8px; margin-bottom: 40px; }
.info-grid { display: grid; grid-template-columns: 1fr 1fr; gap: 15px; }
.info-label { font-weight: 600; color: #4b5563; }
h2 { color: #1e40af; border-bottom: 2px solid #e5e7eb; padding-bottom: 10px; }
.brief-section { margin-bottom: 30px; padding: 20px; background: #fafafa; border-radius: 8px; }
.brief-section p { margin: 0; white-space: pre-wrap; }
.page-item { margin-bottom: 25px; padding: 15px; border: 1px solid #e5e7eb; border-radius: 6px; }
.page-title { font-weight: 600; }
.page-url { color: #6b7280; font-size: 0.9em; word-break: break-all; }
.page-content { color: #4b5563; font-size: 0.9em; white-space: pre-wrap; }
.footer { text-align: center; margin-top: 50px; padding-top: 30px; border-top: 1px solid #e5e7eb; color: #6b7280; font-size: 0.9em; }
@media print { body { padding: 20px; } .page-item { break-inside: avoid; } }"#;

pub(crate) fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn info_item(html: &mut String, label: &str, value: &str) {
    let _ = writeln!(
        html,
        "<div class=\"info-item\"><span class=\"info-label\">{}:</span> <span>{}</span></div>",
        label,
        escape(value)
    );
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub(super) fn render(data: &ReportData) -> String {
    let project = &data.project;
    let mut html = String::new();

    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n<title>ScrapeMate Analysis Report - {}</title>\n<style>\n{}\n</style>\n</head>\n<body>\n",
        escape(project.display_name()),
        STYLE
    );
    html.push_str("<div class=\"header\">\n<h1>ScrapeMate Analysis Report</h1>\n<p class=\"subtitle\">Professional Website Analysis &amp; Intelligence</p>\n</div>\n");

    html.push_str("<div class=\"project-info\">\n<h2>Project Information</h2>\n<div class=\"info-grid\">\n");
    info_item(&mut html, "Project Name", project.display_name());
    info_item(&mut html, "Website URL", &project.seed_url);
    info_item(&mut html, "Analysis Status", &capitalize(project.status.as_str()));
    info_item(&mut html, "Pages Analyzed", &data.pages.len().to_string());
    info_item(&mut html, "Created", &format_date(project.created_at));
    info_item(&mut html, "Report Generated", &format_date(data.generated_at));
    html.push_str("</div>\n</div>\n");

    if data.brief.is_some() {
        html.push_str("<div class=\"executive-brief\">\n<h2>Executive Brief</h2>\n");
        for (title, text) in data.brief_sections() {
            let _ = write!(
                html,
                "<div class=\"brief-section\">\n<h3>{}</h3>\n<p>{}</p>\n</div>\n",
                escape(title),
                escape(&text)
            );
        }
        html.push_str("</div>\n");
    }

    html.push_str("<div class=\"pages-summary\">\n<h2>Scraped Pages Summary</h2>\n");
    if data.pages.is_empty() {
        html.push_str("<p><em>No pages were scraped for this project.</em></p>\n");
    }
    for (i, page) in data.pages.iter().enumerate() {
        let title = page
            .title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or("Untitled Page");
        let _ = write!(
            html,
            "<div class=\"page-item\">\n<div class=\"page-title\">{}. {}</div>\n<div class=\"page-url\">{}</div>\n",
            i + 1,
            escape(title),
            escape(&page.url)
        );
        if let Some(content) = page.content() {
            let _ = writeln!(
                html,
                "<div class=\"page-content\">{}</div>",
                escape(&preview(content, PREVIEW_CHARS))
            );
        }
        html.push_str("</div>\n");
    }
    html.push_str("</div>\n");

    let _ = write!(
        html,
        "<div class=\"footer\">\n<p>Report generated by ScrapeMate on {}</p>\n</div>\n</body>\n</html>\n",
        format_date_time(data.generated_at)
    );
    html
}

#[cfg(test)]
mod tests {
    use super::super::fixtures;
    use super::*;

    #[test]
    fn escapes_interpolated_text() {
        assert_eq!(
            escape(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn page_titles_and_content_are_escaped() {
        let html = render(&fixtures::report());
        assert!(html.contains("1. Home &lt;Acme&gt;"));
        assert!(!html.contains("Home <Acme>"));
        assert!(html.contains("Rockets, &quot;fast&quot; ones."));
        assert!(html.contains("<h3>Products &amp; Services</h3>\n<p>Rockets &amp; anvils.</p>"));
        assert!(html.contains("<span>Completed</span>"));
        assert!(html.trim_end().ends_with("</html>"));
    }
}
