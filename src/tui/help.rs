use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

const KEYS: &[(&str, &str)] = &[
    ("q / Ctrl-C", "Quit"),
    ("?", "Show this help"),
    ("Esc", "Back to the project list"),
    ("↑/↓ or j/k", "Navigate"),
    ("n", "New analysis (enter a URL)"),
    ("Enter / p", "Show scraped pages"),
    ("b", "Show executive brief"),
    ("g", "Generate executive brief (keeps an existing one)"),
    ("G", "Regenerate executive brief"),
    ("e", "Export report as Markdown"),
    ("E", "Export report as HTML"),
    ("J", "Export report as JSON"),
    ("c", "Export report as CSV"),
    ("y", "Copy exported path to clipboard"),
    ("d", "Delete selected project"),
    ("r", "Refresh projects"),
    ("s", "Re-check connections"),
];

fn key_line(key: &str, action: &str) -> Line<'static> {
    Line::from(vec![
        Span::raw("  "),
        Span::styled(format!("{key:<12}"), Style::default().fg(Color::Magenta)),
        Span::raw(action.to_string()),
    ])
}

pub fn draw_help(area: Rect, f: &mut Frame) {
    let mut lines = vec![Line::from("Keybinds:")];
    lines.extend(KEYS.iter().map(|(k, a)| key_line(k, a)));
    lines.push(Line::from(""));
    lines.push(Line::from(
        "Projects refresh automatically while an analysis is running.",
    ));
    lines.push(Line::from(
        "Reports are written to your download directory.",
    ));

    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(p, area);
}
