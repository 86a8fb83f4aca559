use super::{format_date, preview, ReportData};
use anyhow::{Context, Result};
use std::io::{self, Write};

const PREVIEW_CHARS: usize = 500;
const HEADER: [&str; 6] = ["type", "name", "url", "status", "date", "content"];

fn needs_quotes(field: &str) -> bool {
    field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
}

fn write_row<W: Write>(mut w: W, row: &[&str]) -> io::Result<()> {
    let mut first = true;
    for cell in row {
        if !first {
            write!(w, ",")?;
        } else {
            first = false;
        }
        if needs_quotes(cell) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            write!(w, "{cell}")?;
        }
    }
    writeln!(w)
}

/// One row for the project, one per brief section, one per page.
pub(super) fn render(data: &ReportData) -> Result<String> {
    let mut buf = Vec::new();
    let project = &data.project;

    write_row(&mut buf, &HEADER)?;
    write_row(
        &mut buf,
        &[
            "project",
            project.display_name(),
            &project.seed_url,
            project.status.as_str(),
            &format_date(project.created_at),
            project.progress_message.as_deref().unwrap_or(""),
        ],
    )?;
    if let Some(brief) = &data.brief {
        let generated = format_date(brief.generated_at);
        for (title, text) in data.brief_sections() {
            write_row(&mut buf, &["brief", title, "", "", &generated, &text])?;
        }
    }
    for page in &data.pages {
        write_row(
            &mut buf,
            &[
                "page",
                page.title.as_deref().unwrap_or("Untitled Page"),
                &page.url,
                page.status.as_deref().unwrap_or(""),
                &format_date(page.created_at),
                &page
                    .content()
                    .map(|c| preview(c, PREVIEW_CHARS))
                    .unwrap_or_default(),
            ],
        )?;
    }
    String::from_utf8(buf).context("CSV output is not UTF-8")
}
