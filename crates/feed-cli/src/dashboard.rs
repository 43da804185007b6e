//! Dashboard renderers.
//!
//! The render loop builds a [`DashboardView`] once per frame and hands it to a
//! [`Dashboard`]. Renderers never refresh on their own.

use std::io::{self, Stdout, Write};
use std::sync::Once;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph, Row, Table};

use feed_core::{StatsSnapshot, Topic};

/// Everything a renderer needs for one frame.
#[derive(Debug)]
pub struct DashboardView<'a> {
    pub topic: &'a Topic,
    pub snapshot: StatsSnapshot,
    /// Rolling window contents, oldest first.
    pub recent: Vec<&'a str>,
    /// Messages received since the previous frame.
    pub fresh: &'a [String],
}

/// A sink for dashboard frames.
pub trait Dashboard {
    /// Draws one frame.
    fn update(&mut self, view: &DashboardView<'_>) -> Result<()>;

    /// Whether the user asked to quit through this renderer's input.
    fn interrupt_requested(&mut self) -> Result<bool> {
        Ok(false)
    }

    /// Gives the terminal back. Called once on shutdown, before the summary.
    fn restore(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Line-oriented output for non-interactive use: each new message is printed
/// as `>> <message>`.
#[derive(Debug)]
pub struct PlainDashboard<W> {
    out: W,
}

impl<W: Write> PlainDashboard<W> {
    pub const fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Dashboard for PlainDashboard<W> {
    fn update(&mut self, view: &DashboardView<'_>) -> Result<()> {
        if view.fresh.is_empty() {
            return Ok(());
        }
        for line in view.fresh {
            writeln!(self.out, ">> {line}")?;
        }
        self.out.flush()?;
        Ok(())
    }
}

/// Full-screen dashboard on the alternate screen.
pub struct TerminalDashboard {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    active: bool,
}

impl TerminalDashboard {
    /// Switches the terminal to raw mode and the alternate screen.
    pub fn enter() -> Result<Self> {
        enable_raw_mode().context("failed to enable raw mode")?;
        let setup = execute!(io::stdout(), EnterAlternateScreen)
            .and_then(|()| Terminal::new(CrosstermBackend::new(io::stdout())));
        let terminal = match setup {
            Ok(terminal) => terminal,
            Err(err) => {
                let _ = execute!(io::stdout(), LeaveAlternateScreen);
                let _ = disable_raw_mode();
                return Err(err).context("failed to set up terminal");
            }
        };

        install_panic_hook();

        Ok(Self {
            terminal,
            active: true,
        })
    }
}

static PANIC_HOOK: Once = Once::new();

/// Restores the terminal before the previous hook prints the panic.
///
/// Installed at most once per process however many dashboards are entered.
/// Leaving raw mode is harmless when no dashboard is active.
fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let original_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let _ = disable_raw_mode();
            let _ = execute!(io::stdout(), LeaveAlternateScreen);
            original_hook(info);
        }));
    });
}

impl Dashboard for TerminalDashboard {
    fn update(&mut self, view: &DashboardView<'_>) -> Result<()> {
        self.terminal
            .draw(|frame| draw(frame, view))
            .context("failed to draw dashboard")?;
        Ok(())
    }

    fn interrupt_requested(&mut self) -> Result<bool> {
        while event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()? {
                if is_quit_key(&key) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn restore(&mut self) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        disable_raw_mode().context("failed to disable raw mode")?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Drop for TerminalDashboard {
    fn drop(&mut self) {
        let _ = self.restore();
    }
}

/// `q`, `Esc` and `Ctrl-C` end the session. Raw mode delivers `Ctrl-C` as a key.
pub fn is_quit_key(key: &KeyEvent) -> bool {
    if key.kind != KeyEventKind::Press {
        return false;
    }
    match key.code {
        KeyCode::Char('q' | 'Q') | KeyCode::Esc => true,
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

/// Renders the statistics table and the message panel.
pub fn draw(frame: &mut ratatui::Frame, view: &DashboardView<'_>) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // header
            Constraint::Min(8),    // body
            Constraint::Length(1), // footer
        ])
        .split(frame.area());
    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(34), Constraint::Min(20)])
        .split(rows[1]);

    draw_header(frame, view, rows[0]);
    draw_stats(frame, &view.snapshot, body[0]);
    draw_messages(frame, view, body[1]);
    draw_footer(frame, rows[2]);
}

fn draw_header(frame: &mut ratatui::Frame, view: &DashboardView<'_>, area: Rect) {
    let header = Paragraph::new(Line::from(vec![
        Span::styled("Channel: ", Style::default().fg(Color::DarkGray)),
        Span::styled(
            view.topic.as_str(),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
    ]))
    .block(Block::default().borders(Borders::ALL).title(" Live Feed "));
    frame.render_widget(header, area);
}

fn draw_stats(frame: &mut ratatui::Frame, snapshot: &StatsSnapshot, area: Rect) {
    let label = Style::default().fg(Color::DarkGray);
    let mut rows = vec![
        Row::new(vec![
            Span::styled("Messages", label),
            Span::raw(snapshot.total_messages.to_string()),
        ]),
        Row::new(vec![
            Span::styled("Runtime", label),
            Span::raw(format!("{:.0}s", snapshot.runtime_seconds)),
        ]),
        Row::new(vec![
            Span::styled("Rate", label),
            Span::raw(format!("{:.2}/min", snapshot.messages_per_minute)),
        ]),
        Row::new(vec![
            Span::styled("Active users", label),
            Span::raw(snapshot.active_users.to_string()),
        ]),
        Row::new(vec![Span::raw(""), Span::raw("")]),
        Row::new(vec![
            Span::styled(
                "Top users",
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(""),
        ]),
    ];
    rows.extend(snapshot.top_users.iter().map(|user| {
        Row::new(vec![
            Span::raw(user.user.clone()),
            Span::styled(user.messages.to_string(), Style::default().fg(Color::Green)),
        ])
    }));

    let table = Table::new(rows, [Constraint::Length(16), Constraint::Min(8)])
        .block(Block::default().borders(Borders::ALL).title(" Stats "));
    frame.render_widget(table, area);
}

fn draw_messages(frame: &mut ratatui::Frame, view: &DashboardView<'_>, area: Rect) {
    // Keep the newest messages visible when the panel is short
    let visible = usize::from(area.height.saturating_sub(2));
    let skip = view.recent.len().saturating_sub(visible);
    let items: Vec<ListItem> = view
        .recent
        .iter()
        .skip(skip)
        .map(|line| ListItem::new(Line::raw(*line)))
        .collect();

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Recent messages "),
    );
    frame.render_widget(list, area);
}

fn draw_footer(frame: &mut ratatui::Frame, area: Rect) {
    let footer = Paragraph::new(Line::from(vec![
        Span::styled(
            " q",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" quit"),
    ]))
    .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(footer, area);
}
