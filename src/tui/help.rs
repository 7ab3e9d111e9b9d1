use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

fn keybind(keys: &[&'static str], desc: &'static str) -> Line<'static> {
    let mut spans = vec![Span::raw("  ")];
    let mut width = 0;
    for (i, key) in keys.iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw(" / "));
            width += 3;
        }
        spans.push(Span::styled(*key, Style::default().fg(Color::Magenta)));
        width += key.chars().count();
    }
    spans.push(Span::raw(" ".repeat(14usize.saturating_sub(width))));
    spans.push(Span::raw(desc));
    Line::from(spans)
}

pub fn draw_help(area: Rect, f: &mut Frame, base_url: &str) {
    let p = Paragraph::new(vec![
        Line::from("Keybinds:"),
        keybind(&["q", "Ctrl-C"], "Quit"),
        keybind(&["r"], "Run a speed test"),
        keybind(&["tab"], "Switch tabs"),
        keybind(&["?"], "Show this help"),
        keybind(&["Esc"], "Dismiss notices"),
        Line::from(""),
        Line::from("Results tab:"),
        keybind(&["→", "l", "n"], "Next page"),
        keybind(&["←", "h", "p"], "Previous page"),
        keybind(&["s"], "Cycle rows per page (10/25/50/100)"),
        keybind(&["f"], "Refresh (back to newest page)"),
        Line::from(""),
        Line::from("Backend:"),
        Line::from(vec![
            Span::raw("  "),
            Span::styled(base_url.to_string(), Style::default().fg(Color::Cyan)),
        ]),
    ])
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(p, area);
}
