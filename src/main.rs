use std::io;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::layout::{Constraint, Direction as LayoutDirection, Layout, Rect};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Clear, Gauge, Paragraph};

use f1_report::config::ReportConfig;
use f1_report::provider::{self, ProviderConfig};
use f1_report::report::{self, ReportDocument};
use f1_report::section::{self, Direction, ScrollMetrics, SectionId};
use f1_report::state::{self, AppState, ProviderCommand};

const HEADER_HEIGHT: u16 = 3;
const FOOTER_HEIGHT: u16 = 1;

struct App {
    state: AppState,
    config: ReportConfig,
    should_quit: bool,
    cmd_tx: mpsc::Sender<ProviderCommand>,
    document: ReportDocument,
    body_height: u16,
    width: u16,
    pending_jump: Option<SectionId>,
}

impl App {
    fn new(config: ReportConfig, cmd_tx: mpsc::Sender<ProviderCommand>) -> Self {
        let pending_jump = config.start_section;
        Self {
            state: AppState::new(),
            config,
            should_quit: false,
            cmd_tx,
            document: ReportDocument::default(),
            body_height: 0,
            width: 0,
            pending_jump,
        }
    }

    fn send(&mut self, commands: Vec<ProviderCommand>) {
        for cmd in commands {
            if self.cmd_tx.send(cmd).is_err() {
                self.state.push_log("[WARN] Worker is gone, request dropped");
            }
        }
    }

    fn load(&mut self, force: bool) {
        let commands = self.state.begin_loads(&self.config.data, force);
        self.send(commands);
    }

    fn rebuild(&mut self) {
        self.document = report::build_document(&self.state, self.width);
        let max = self.max_scroll();
        if self.state.scroll > max {
            self.state.scroll = max;
        }
        // Anchors move whenever a chapter changes size.
        self.track();
        if let Some(target) = self.pending_jump {
            self.jump_to(target);
            if !self.state.chapters.iter().any(|c| c.status.is_loading()) {
                self.pending_jump = None;
            }
        }
    }

    fn max_scroll(&self) -> usize {
        self.document
            .lines
            .len()
            .saturating_sub(usize::from(self.body_height))
    }

    /// Feed the section tracker with the current scroll position.
    fn track(&mut self) {
        let metrics = ScrollMetrics {
            offset: self.state.scroll as f64,
            viewport_height: f64::from(self.body_height),
            document_height: self.document.lines.len() as f64,
            nav_height: f64::from(self.config.nav_height),
        };
        let anchors = self.document.anchor_offsets();
        self.state.on_scroll(metrics, &anchors);
    }

    fn scroll_by(&mut self, delta: isize) {
        self.pending_jump = None;
        let max = self.max_scroll();
        let next = self.state.scroll.saturating_add_signed(delta).min(max);
        self.state.scroll = next;
        self.track();
    }

    fn jump_to(&mut self, section: SectionId) {
        if let Some(line) = self.document.anchor(section) {
            self.state.scroll = line.min(self.max_scroll());
            self.track();
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        if self.state.input_focused() {
            match key.code {
                KeyCode::Enter => {
                    self.state.commit_round_input();
                }
                KeyCode::Esc => self.state.cancel_round_input(),
                KeyCode::Backspace => {
                    if let Some(input) = self.state.round_input.as_mut() {
                        input.pop();
                    }
                }
                KeyCode::Char(c) => self.state.push_round_digit(c),
                _ => {}
            }
            return;
        }

        let page = section::page_step(self.body_height);
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('j') | KeyCode::Down => self.scroll_by(1),
            KeyCode::Char('k') | KeyCode::Up => self.scroll_by(-1),
            KeyCode::PageDown | KeyCode::Char(' ') => self.scroll_by(page),
            KeyCode::PageUp => self.scroll_by(-page),
            KeyCode::Home => self.jump_to(SectionId::Intro),
            KeyCode::Char('n') => self.navigate(Direction::Next),
            KeyCode::Char('p') => self.navigate(Direction::Previous),
            KeyCode::Char(']') => {
                self.state.step_round(true);
            }
            KeyCode::Char('[') => {
                self.state.step_round(false);
            }
            KeyCode::Char('m') => {
                self.state.cycle_metric();
            }
            KeyCode::Char('g') => {
                if !self.state.open_round_input() {
                    self.state
                        .push_log("[INFO] This chapter has no round picker");
                }
            }
            KeyCode::Char('r') => self.load(true),
            KeyCode::Char('c') => self.state.console_open = !self.state.console_open,
            KeyCode::Char('?') => self.state.help_overlay = !self.state.help_overlay,
            KeyCode::Esc => self.state.help_overlay = false,
            _ => {}
        }
    }

    fn navigate(&mut self, direction: Direction) {
        self.pending_jump = None;
        let focused = self.state.input_focused();
        if let Some(target) = self.state.tracker.neighbor(direction, focused) {
            self.jump_to(target);
        }
    }
}

fn main() -> Result<()> {
    let config = ReportConfig::load();

    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture).context("enter alternate screen")?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend).context("create terminal")?;

    let (tx, rx) = mpsc::channel();
    let (cmd_tx, cmd_rx) = mpsc::channel();
    provider::spawn_provider(
        ProviderConfig {
            data: config.data.clone(),
            media: config.media.clone(),
            parallelism: config.fetch_parallelism,
            timeout: config.http_timeout,
        },
        tx,
        cmd_rx,
    );

    let mut app = App::new(config, cmd_tx);
    let res = run_app(&mut terminal, &mut app, rx);
    app.state.shutdown();

    disable_raw_mode().context("disable raw mode")?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )
    .context("leave alternate screen")?;
    terminal.show_cursor().context("show cursor")?;

    if let Err(err) = res {
        eprintln!("error: {err:#}");
    }
    Ok(())
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    rx: mpsc::Receiver<state::Delta>,
) -> Result<()> {
    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let size = terminal.size().context("read terminal size")?;
    app.width = size.width;
    app.body_height = body_height(size.height);
    app.load(false);
    // Tracks the initial scroll position (or deep link) before any input.
    app.rebuild();

    loop {
        let mut changed = false;
        while let Ok(delta) = rx.try_recv() {
            state::apply_delta(&mut app.state, delta);
            changed = true;
        }
        let media = app.state.media_commands();
        if !media.is_empty() {
            app.send(media);
        }
        if changed {
            app.rebuild();
        }

        terminal.draw(|f| ui(f, app)).context("draw frame")?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout).context("poll terminal events")? {
            match event::read().context("read terminal event")? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    app.on_key(key);
                    app.rebuild();
                }
                Event::Mouse(mouse) => match mouse.kind {
                    MouseEventKind::ScrollDown => app.scroll_by(3),
                    MouseEventKind::ScrollUp => app.scroll_by(-3),
                    _ => {}
                },
                Event::Resize(width, height) => {
                    app.width = width;
                    app.body_height = body_height(height);
                    app.rebuild();
                }
                _ => {}
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn body_height(total: u16) -> u16 {
    total.saturating_sub(HEADER_HEIGHT + FOOTER_HEIGHT)
}

fn ui(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(LayoutDirection::Vertical)
        .constraints([
            Constraint::Length(HEADER_HEIGHT),
            Constraint::Min(1),
            Constraint::Length(FOOTER_HEIGHT),
        ])
        .split(frame.size());

    render_header(frame, chunks[0], &app.state);

    let scroll = u16::try_from(app.state.scroll).unwrap_or(u16::MAX);
    let body = Paragraph::new(app.document.lines.clone()).scroll((scroll, 0));
    frame.render_widget(body, chunks[1]);

    let footer = Paragraph::new(footer_text(&app.state))
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(footer, chunks[2]);

    if app.state.console_open {
        render_console(frame, chunks[1], &app.state);
    }
    if app.state.help_overlay {
        render_help_overlay(frame, frame.size());
    }
}

fn render_header(frame: &mut Frame, area: Rect, state: &AppState) {
    let rows = Layout::default()
        .direction(LayoutDirection::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1), Constraint::Length(1)])
        .split(area);
    let section = state.tracker.state();
    let title = Line::from(vec![
        Span::styled(
            " F1 2025 DATA REPORT ",
            Style::default()
                .fg(Color::White)
                .bg(Color::Red)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(
            section.active.title(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
    ]);
    frame.render_widget(Paragraph::new(title), rows[0]);

    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(Color::Red).bg(Color::Black))
        .ratio(section.progress.clamp(0.0, 1.0))
        .label(format!("{:.0}%", section.progress * 100.0));
    frame.render_widget(gauge, rows[1]);
    frame.render_widget(Block::default().borders(Borders::BOTTOM), rows[2]);
}

fn footer_text(state: &AppState) -> String {
    match &state.round_input {
        Some(input) => format!("Round: {input}_   Enter select | Esc cancel"),
        None => "j/k Scroll | n/p Chapter | [ ] Round | g Go to round | m Metric | r Reload | c Console | ? Help | q Quit".to_string(),
    }
}

fn render_console(frame: &mut Frame, area: Rect, state: &AppState) {
    let height = area.height.min(10);
    let rect = Rect {
        x: area.x,
        y: area.y + area.height - height,
        width: area.width,
        height,
    };
    let visible = usize::from(height.saturating_sub(2));
    let lines: Vec<Line> = state
        .logs
        .iter()
        .skip(state.logs.len().saturating_sub(visible))
        .map(|l| Line::from(l.as_str()))
        .collect();
    frame.render_widget(Clear, rect);
    let console = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" Console ({} stale dropped) ", state.stale_results)),
    );
    frame.render_widget(console, rect);
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let width = area.width.min(56);
    let height = area.height.min(16);
    let rect = Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    };
    let text = [
        "j/k, ↑/↓      scroll one line",
        "PgDn/PgUp     scroll one page",
        "n / p         next / previous chapter",
        "[ / ]         previous / next round",
        "g             type a round number",
        "m             switch sort metric",
        "r             reload all chapters",
        "c             toggle console",
        "Home          back to the top",
        "q             quit",
    ]
    .join("\n");
    frame.render_widget(Clear, rect);
    let help = Paragraph::new(text).block(Block::default().borders(Borders::ALL).title(" Help "));
    frame.render_widget(help, rect);
}
