//! tempest-tui: a ratatui view of a running search.
//!
//! The searcher stays on its own thread and publishes [`SearchStatus`]
//! snapshots; this screen only ever reads copies, never live tree state.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::execute;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color as UiColor, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph};
use ratatui::Terminal;
use tempest_core::{Board, Color, Square};
use tempest_mcts::{ScoreView, SearchStatus};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TuiError {
    #[error("terminal io: {0}")]
    Io(#[from] io::Error),
}

/// Block until the user quits (`q`/`Esc`) or the search finishes.
///
/// `stop` is set on quit so the search thread winds down with us.
pub fn run(
    board: Board,
    status: Arc<Mutex<SearchStatus>>,
    stop: Arc<AtomicBool>,
) -> Result<(), TuiError> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, &board, &status, &stop);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}

fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    board: &Board,
    status: &Arc<Mutex<SearchStatus>>,
    stop: &Arc<AtomicBool>,
) -> Result<(), TuiError> {
    loop {
        let snapshot = status.lock().map(|s| s.clone()).unwrap_or_default();

        terminal.draw(|frame| draw(frame, board, &snapshot))?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press
                    && matches!(key.code, KeyCode::Char('q') | KeyCode::Esc)
                {
                    stop.store(true, Ordering::Relaxed);
                    return Ok(());
                }
            }
        }
        if snapshot.finished {
            // Leave the final frame up until a key arrives.
            if let Event::Key(_) = event::read()? {
                return Ok(());
            }
        }
    }
}

fn draw(frame: &mut ratatui::Frame, board: &Board, status: &SearchStatus) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(12),
            Constraint::Length(3),
            Constraint::Min(6),
        ])
        .split(frame.size());

    frame.render_widget(
        Paragraph::new(board_lines(board))
            .block(Block::default().borders(Borders::ALL).title(" Position ")),
        rows[0],
    );

    let score_ratio = match status.score {
        ScoreView::Cp(cp) => (cp.clamp(-500, 500) + 500) as f64 / 1000.0,
        ScoreView::Mate(n) if n > 0 => 1.0,
        ScoreView::Mate(_) => 0.0,
    };
    let score_label = match status.score {
        ScoreView::Cp(cp) => format!("{:+.2}", cp as f64 / 100.0),
        ScoreView::Mate(n) => format!("M{n}"),
    };
    frame.render_widget(
        Gauge::default()
            .block(Block::default().borders(Borders::ALL).title(" Score "))
            .gauge_style(Style::default().fg(UiColor::Cyan))
            .ratio(score_ratio)
            .label(score_label),
        rows[1],
    );

    let pv: String = status
        .pv
        .iter()
        .take(12)
        .map(|m| m.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    let stats = vec![
        stat_line("best move", status.best_move.to_string()),
        stat_line("depth", format!("{} / {}", status.depth, status.seldepth)),
        stat_line("nodes", group_digits(status.nodes)),
        stat_line("nps", group_digits(status.nps)),
        stat_line("tree use", format!("{:.1}%", status.hashfull as f64 / 10.0)),
        stat_line("cache use", format!("{:.1}%", status.cache_full * 100.0)),
        stat_line("half swaps", group_digits(status.half_switches)),
        stat_line("pv", pv),
        Line::from(Span::styled(
            if status.finished { "finished - any key to exit" } else { "q: stop search and quit" },
            Style::default().add_modifier(Modifier::DIM),
        )),
    ];
    frame.render_widget(
        Paragraph::new(stats).block(Block::default().borders(Borders::ALL).title(" Search ")),
        rows[2],
    );
}

fn group_digits(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn stat_line(label: &str, value: String) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{label:>10}  "), Style::default().add_modifier(Modifier::DIM)),
        Span::raw(value),
    ])
}

fn board_lines(board: &Board) -> Vec<Line<'static>> {
    let mut lines = Vec::with_capacity(9);
    for rank in (0..8).rev() {
        let mut spans = vec![Span::raw(format!(" {} ", rank + 1))];
        for file in 0..8 {
            let sq = Square::new(file, rank);
            let cell = match board.piece_at(sq) {
                Some((color, piece)) => {
                    let glyph = format!("{} ", piece.to_char(color));
                    if color == Color::White {
                        Span::styled(glyph, Style::default().fg(UiColor::White))
                    } else {
                        Span::styled(glyph, Style::default().fg(UiColor::Magenta))
                    }
                }
                None => Span::styled(". ", Style::default().add_modifier(Modifier::DIM)),
            };
            spans.push(cell);
        }
        lines.push(Line::from(spans));
    }
    lines.push(Line::from(Span::styled(
        "   a b c d e f g h",
        Style::default().add_modifier(Modifier::DIM),
    )));
    lines
}

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_lines_render_all_ranks() {
        let lines = board_lines(&Board::startpos());
        assert_eq!(lines.len(), 9);
    }

    #[test]
    fn digit_grouping_matches_expectations() {
        assert_eq!(group_digits(0), "0");
        assert_eq!(group_digits(999), "999");
        assert_eq!(group_digits(1_000), "1,000");
        assert_eq!(group_digits(123_456_789), "123,456,789");
    }

    #[test]
    fn version_is_nonempty() {
        assert!(!VERSION.is_empty());
    }
}
