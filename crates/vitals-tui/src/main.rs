use std::{
    io::{self, Stdout},
    path::PathBuf,
    thread::JoinHandle,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use env_logger::Env;
use log::{info, warn};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    prelude::CrosstermBackend,
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph, Wrap},
    Frame, Terminal,
};
use vitals_lib::{
    plot::{figures_from_window, Color as PlotColor, Figure, Series},
    Monitor, RandomSource, TickOutput,
};
use vitals_run::{read_config, MonitorConfig, SubjectInfo};

const MAX_CHART_POINTS: usize = 512;

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("off")).init();
    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => read_config(&path)?,
        None => MonitorConfig::default(),
    };
    let monitor = config.build_monitor()?;
    let (update_tx, update_rx) = bounded(16);
    let worker = TickWorker::start(monitor, config.tick_period(), update_tx);

    let mut terminal = setup_terminal()?;
    let mut app = App::new(config, update_rx);
    let redraw = Duration::from_millis(150);

    let result = (|| -> Result<()> {
        while !app.should_quit {
            app.drain_updates();
            terminal.draw(|f| draw(f, &app))?;
            if event::poll(redraw)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        app.on_key(key);
                    }
                }
            }
        }
        Ok(())
    })();

    restore_terminal()?;
    // closing the update channel unblocks a worker waiting on a full queue
    drop(app);
    worker.stop();
    result
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).context("initializing terminal")
}

fn restore_terminal() -> Result<()> {
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen)?;
    Ok(())
}

enum TickUpdate {
    Tick(Box<TickOutput>),
    Skipped(String),
}

/// Owns the monitor on its own thread: the only writer to the history.
/// The render side only ever sees owned snapshots.
struct TickWorker {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl TickWorker {
    fn start(
        mut monitor: Monitor<RandomSource>,
        period: Duration,
        update_tx: Sender<TickUpdate>,
    ) -> Self {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let handle = std::thread::spawn(move || {
            info!("tick worker started, period {:?}", period);
            loop {
                let update = match monitor.tick() {
                    Ok(output) => TickUpdate::Tick(Box::new(output)),
                    Err(err) => TickUpdate::Skipped(err.to_string()),
                };
                if update_tx.send(update).is_err() {
                    break;
                }
                match stop_rx.recv_timeout(period) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    _ => break,
                }
            }
            info!("tick worker stopped after {} ticks", monitor.ticks());
        });
        Self {
            stop_tx,
            handle: Some(handle),
        }
    }

    fn stop(mut self) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("tick worker panicked");
            }
        }
    }
}

struct App {
    config: MonitorConfig,
    update_rx: Receiver<TickUpdate>,
    latest: Option<TickOutput>,
    figures: Vec<Figure>,
    alert_raised_at: Option<Instant>,
    skipped: u64,
    status: String,
    should_quit: bool,
}

impl App {
    fn new(config: MonitorConfig, update_rx: Receiver<TickUpdate>) -> Self {
        Self {
            config,
            update_rx,
            latest: None,
            figures: Vec::new(),
            alert_raised_at: None,
            skipped: 0,
            status: "Waiting for the first reading. Press q to exit.".into(),
            should_quit: false,
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        if matches!(key.code, KeyCode::Char('q') | KeyCode::Esc) {
            self.should_quit = true;
        }
    }

    fn drain_updates(&mut self) {
        while let Ok(update) = self.update_rx.try_recv() {
            match update {
                TickUpdate::Tick(output) => {
                    if output.alert.active {
                        self.alert_raised_at = Some(Instant::now());
                    }
                    self.figures = figures_from_window(&output.window, MAX_CHART_POINTS);
                    self.status = format!(
                        "Tick {} | window {}/{} | skipped {} | q to exit",
                        output.tick + 1,
                        output.window.len(),
                        output.window.capacity,
                        self.skipped
                    );
                    self.latest = Some(*output);
                }
                TickUpdate::Skipped(reason) => {
                    self.skipped += 1;
                    self.status = format!("Tick skipped: {}", reason);
                }
            }
        }
    }

    /// The latest alert, until it has been on screen for the dismiss period.
    fn visible_alert(&self) -> Option<&str> {
        let raised = self.alert_raised_at?;
        if raised.elapsed() > self.config.alert_dismiss() {
            return None;
        }
        self.latest
            .as_ref()
            .filter(|out| out.alert.active)
            .map(|out| out.alert.message.as_str())
    }
}

fn draw(f: &mut Frame, app: &App) {
    let size = f.size();
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(size);
    draw_header(f, layout[0]);
    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(34), Constraint::Min(0)])
        .split(layout[1]);
    draw_subject(f, body[0], &app.config.subject, app.latest.as_ref());
    draw_charts(f, body[1], &app.figures);
    draw_banner(f, layout[2], app);
}

fn draw_header(f: &mut Frame, area: Rect) {
    let title = Paragraph::new(Line::from(Span::styled(
        "Real-time vital signs monitor",
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    )))
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(title, area);
}

fn draw_subject(f: &mut Frame, area: Rect, subject: &SubjectInfo, latest: Option<&TickOutput>) {
    let mut lines = vec![
        Line::from(format!("ID: {}", subject.id)),
        Line::from(format!("Name: {}", subject.name)),
        Line::from(format!("Age: {}", subject.age)),
        Line::from(""),
        Line::from("Cardiovascular history:"),
        Line::from(subject.history.as_str()),
    ];
    if let Some(out) = latest {
        let r = &out.reading;
        lines.push(Line::from(""));
        lines.push(Line::from("Latest reading:"));
        lines.push(Line::from(format!("  HR   {:>6.0} BPM", r.heart_rate)));
        lines.push(Line::from(format!("  SpO2 {:>6.1} %", r.oxygen_level)));
        lines.push(Line::from(format!("  Temp {:>6.2} °C", r.body_temp)));
        lines.push(Line::from(format!("  Acc  {:>6.2} m/s²", r.acceleration)));
    }
    let card = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("Subject"));
    f.render_widget(card, area);
}

fn draw_charts(f: &mut Frame, area: Rect, figures: &[Figure]) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);
    let mut cells = Vec::with_capacity(4);
    for row in rows.iter() {
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(*row);
        cells.extend(cols.iter().copied());
    }
    if figures.is_empty() {
        let waiting = Paragraph::new("No readings yet.")
            .block(Block::default().borders(Borders::ALL).title("Charts"));
        f.render_widget(waiting, area);
        return;
    }
    for (cell, fig) in cells.into_iter().zip(figures) {
        draw_chart(f, cell, fig);
    }
}

fn draw_chart(f: &mut Frame, area: Rect, fig: &Figure) {
    let data: Vec<Vec<(f64, f64)>> = fig
        .series
        .iter()
        .map(|series| series.points().iter().map(|p| (p[0], p[1])).collect())
        .collect();
    let datasets: Vec<Dataset> = fig
        .series
        .iter()
        .zip(&data)
        .map(|(series, points)| match series {
            Series::Line(line) => Dataset::default()
                .name(line.name.clone())
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(term_color(line.style.color)))
                .data(points),
            Series::Markers(markers) => Dataset::default()
                .name(markers.name.clone())
                .marker(symbols::Marker::Dot)
                .graph_type(GraphType::Scatter)
                .style(Style::default().fg(term_color(markers.color)))
                .data(points),
        })
        .collect();
    let [x_min, x_max] = fig.x.bounds;
    let [y_min, y_max] = fig.y.bounds;
    let y_unit = fig.y.label.clone().unwrap_or_default();
    let chart = Chart::new(datasets)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(fig.title.clone().unwrap_or_default()),
        )
        .x_axis(
            Axis::default()
                .bounds([x_min, x_max])
                .labels(vec![
                    Span::raw(format!("{:.0}s", x_min)),
                    Span::raw("now"),
                ]),
        )
        .y_axis(
            Axis::default()
                .title(y_unit)
                .bounds([y_min, y_max])
                .labels(vec![
                    Span::raw(format!("{:.0}", y_min)),
                    Span::raw(format!("{:.0}", (y_min + y_max) / 2.0)),
                    Span::raw(format!("{:.0}", y_max)),
                ]),
        );
    f.render_widget(chart, area);
}

fn draw_banner(f: &mut Frame, area: Rect, app: &App) {
    let paragraph = match app.visible_alert() {
        Some(message) => Paragraph::new(message)
            .style(
                Style::default()
                    .fg(Color::White)
                    .bg(Color::Red)
                    .add_modifier(Modifier::BOLD),
            )
            .block(Block::default().borders(Borders::ALL).title("Alert")),
        None => Paragraph::new(app.status.as_str())
            .block(Block::default().borders(Borders::ALL).title("Status")),
    };
    f.render_widget(paragraph.wrap(Wrap { trim: true }), area);
}

fn term_color(color: PlotColor) -> Color {
    let (r, g, b) = color.rgb();
    Color::Rgb(r, g, b)
}
