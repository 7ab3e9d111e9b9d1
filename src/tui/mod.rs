mod help;
mod state;

use crate::api::Backend;
use crate::metrics;
use crate::model::{ClientConfig, DashboardEvent};
use crate::orchestrator::{self, UiCommand};
use crate::pagination::PageView;
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, Tabs},
    Terminal,
};
use state::{UiState, TAB_HELP, TAB_RESULTS};
use std::sync::Arc;
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

pub async fn run(cfg: ClientConfig, backend: Arc<dyn Backend>) -> Result<()> {
    let (event_tx, event_rx) = mpsc::unbounded_channel::<DashboardEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let ui_cfg = cfg.clone();
    let ui_handle = std::thread::spawn(move || run_threaded(ui_cfg, event_rx, cmd_tx));

    let res = orchestrator::run_controller(&cfg, backend, event_tx, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// Run the TUI loop on a dedicated thread.
pub fn run_threaded(
    cfg: ClientConfig,
    mut event_rx: UnboundedReceiver<DashboardEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    let mut state = UiState::new(cfg.base_url.clone(), cfg.rows_per_page);

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        while let Ok(ev) = event_rx.try_recv() {
            state.apply_event(ev);
        }

        if last_tick.elapsed() >= tick_rate {
            if !state.notices.is_empty() {
                state.notices.prune(Instant::now());
            }
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                if handle_key(&mut state, k.modifiers, k.code, &cmd_tx) == KeyAction::Quit {
                    break Ok(());
                }
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyAction {
    Continue,
    Quit,
}

fn handle_key(
    state: &mut UiState,
    modifiers: KeyModifiers,
    code: KeyCode,
    cmd_tx: &UnboundedSender<UiCommand>,
) -> KeyAction {
    match (modifiers, code) {
        (_, KeyCode::Char('q')) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => {
            let _ = cmd_tx.send(UiCommand::Quit);
            return KeyAction::Quit;
        }
        (_, KeyCode::Char('r')) => {
            state.info = "Run requested…".into();
            let _ = cmd_tx.send(UiCommand::RunTest);
        }
        (_, KeyCode::Right) | (_, KeyCode::Char('l')) | (_, KeyCode::Char('n')) => {
            if state.tab == TAB_RESULTS {
                let _ = cmd_tx.send(UiCommand::NextPage);
            }
        }
        (_, KeyCode::Left) | (_, KeyCode::Char('h')) | (_, KeyCode::Char('p')) => {
            if state.tab == TAB_RESULTS {
                let _ = cmd_tx.send(UiCommand::PrevPage);
            }
        }
        (_, KeyCode::Char('s')) => {
            if state.tab == TAB_RESULTS {
                state.rows_per_page = state.rows_per_page.cycle();
                state.info = format!("Rows per page: {}", state.rows_per_page);
                let _ = cmd_tx.send(UiCommand::SetRowsPerPage(state.rows_per_page));
            }
        }
        (_, KeyCode::Char('f')) => {
            state.info = "Refreshing…".into();
            let _ = cmd_tx.send(UiCommand::Refresh);
        }
        (_, KeyCode::Tab) => state.next_tab(),
        (_, KeyCode::Char('?')) => state.tab = TAB_HELP,
        (_, KeyCode::Esc) => state.notices.dismiss_all(),
        _ => {}
    }
    KeyAction::Continue
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)].as_ref())
        .split(area);

    let tabs = Tabs::new(vec![Line::from("Results"), Line::from("Help")])
        .select(state.tab)
        .block(Block::default().borders(Borders::ALL).title("speedy-dash"))
        .highlight_style(Style::default().fg(Color::Yellow));
    f.render_widget(tabs, chunks[0]);

    match state.tab {
        TAB_RESULTS => draw_results(chunks[1], f, state),
        _ => help::draw_help(chunks[1], f, &state.base_url),
    }
}

fn draw_results(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let main = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Min(0),    // Results table
                Constraint::Length(4), // Paging + page averages
                Constraint::Length(4), // Runner status, notices, info
            ]
            .as_ref(),
        )
        .split(area);

    draw_table(main[0], f, state);

    let footer = Paragraph::new(footer_lines(state))
        .block(Block::default().borders(Borders::ALL).title("Page"));
    f.render_widget(footer, main[1]);

    let status = Paragraph::new(status_lines(state))
        .block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(status, main[2]);
}

fn draw_table(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let block = Block::default().borders(Borders::ALL).title("Results");

    let Some(view) = state.view.as_ref() else {
        f.render_widget(Paragraph::new("Loading…").block(block), area);
        return;
    };

    if let Some(err) = view.error.as_deref() {
        let p = Paragraph::new(vec![
            Line::from(Span::styled(
                format!("Failed to load results: {err}"),
                Style::default().fg(Color::Red),
            )),
            Line::from(""),
            Line::from(vec![
                Span::raw("Press "),
                Span::styled("f", Style::default().fg(Color::Magenta)),
                Span::raw(" to retry."),
            ]),
        ])
        .block(block);
        f.render_widget(p, area);
        return;
    }

    let Some(page) = view.page.as_ref() else {
        f.render_widget(Paragraph::new("Loading…").block(block), area);
        return;
    };

    if page.data.is_empty() {
        f.render_widget(Paragraph::new("No results yet.").block(block), area);
        return;
    }

    let header = Row::new(vec![
        Cell::from("Timestamp"),
        Cell::from("Ping (ms)"),
        Cell::from("Download (Mbps)"),
        Cell::from("Upload (Mbps)"),
    ])
    .style(Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD));

    let rows = page.data.iter().map(|r| {
        Row::new(vec![
            Cell::from(metrics::format_timestamp(r.timestamp)),
            Cell::from(format!("{:.2}", metrics::format_ping(r.ping))),
            Cell::from(format!("{:.2}", metrics::format_speed(r.download)))
                .style(Style::default().fg(Color::Green)),
            Cell::from(format!("{:.2}", metrics::format_speed(r.upload)))
                .style(Style::default().fg(Color::Cyan)),
        ])
    });

    let widths = [
        Constraint::Length(21),
        Constraint::Length(11),
        Constraint::Length(17),
        Constraint::Length(15),
    ];
    let title = if view.loading {
        "Results (loading…)"
    } else {
        "Results"
    };
    let table = Table::new(rows, widths)
        .header(header)
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(table, area);
}

/// "Page 2 · rows 26–50 of 120", or just the page number while nothing is shown.
fn page_position(view: &PageView) -> String {
    let page_no = view.page_index + 1;
    match (view.row_range(), view.page.as_ref()) {
        (Some((start, end)), Some(page)) => {
            format!("Page {page_no} · rows {start}–{end} of {}", page.meta.count)
        }
        _ => format!("Page {page_no}"),
    }
}

fn nav_span(label: &'static str, enabled: bool) -> Span<'static> {
    if enabled {
        Span::styled(label, Style::default().fg(Color::Magenta))
    } else {
        Span::styled(label, Style::default().fg(Color::DarkGray))
    }
}

fn footer_lines(state: &UiState) -> Vec<Line<'static>> {
    let (position, can_prev, can_next) = match state.view.as_ref() {
        Some(view) => (page_position(view), view.can_prev(), view.can_next()),
        None => ("Page 1".to_string(), false, false),
    };

    let mut lines = vec![Line::from(vec![
        Span::styled("Rows/page: ", Style::default().fg(Color::Gray)),
        Span::raw(format!("{}  ", state.rows_per_page)),
        Span::raw(position),
        Span::raw("   "),
        nav_span("← prev", can_prev),
        Span::raw("  "),
        nav_span("next →", can_next),
    ])];

    let summary = state
        .view
        .as_ref()
        .and_then(|v| v.page.as_ref())
        .and_then(metrics::summarize_page);
    if let Some(s) = summary {
        lines.push(Line::from(vec![
            Span::styled("Page avg: ", Style::default().fg(Color::Gray)),
            Span::raw(format!(
                "ping {:.2} ms  down {:.2} Mbps  up {:.2} Mbps",
                s.ping_mean_ms, s.download_mean_mbps, s.upload_mean_mbps
            )),
        ]));
    }
    lines
}

fn status_lines(state: &UiState) -> Vec<Line<'static>> {
    let status_color = match state.status_label() {
        "Running" => Color::Green,
        "Idle" => Color::White,
        _ => Color::DarkGray,
    };
    let mut lines = vec![Line::from(vec![
        Span::styled("Runner: ", Style::default().fg(Color::Gray)),
        Span::styled(state.status_label(), Style::default().fg(status_color)),
        Span::styled("   Backend: ", Style::default().fg(Color::Gray)),
        Span::raw(state.base_url.clone()),
    ])];

    if let Some(notice) = state.notices.latest() {
        let mut spans = vec![Span::styled(
            notice.message.clone(),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )];
        let queued = state.notices.len().saturating_sub(1);
        if queued > 0 {
            spans.push(Span::styled(
                format!("  (+{queued} more, Esc to dismiss)"),
                Style::default().fg(Color::Gray),
            ));
        }
        lines.push(Line::from(spans));
    } else {
        lines.push(Line::from(vec![
            Span::styled("Info: ", Style::default().fg(Color::Gray)),
            Span::raw(state.info.clone()),
        ]));
    }
    lines
}
