use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use env_logger::Env;
use log::info;
use plotters::prelude::*;
use serde::Serialize;
use std::{
    io::{self, Read},
    path::{Path, PathBuf},
};
use vitals_lib::{
    io::csv as csv_io,
    plot::{figures_from_window, Figure, Series},
    AlertState, AnomalyFlags, Monitor, Reading, ScriptedSource, TickOutput, Window,
};
use vitals_run::{read_config, run_session, MonitorConfig, SessionSummary};

const MAX_PLOT_POINTS: usize = 1024;

#[derive(Parser)]
#[command(
    name = "vitals",
    version,
    about = "Vital-signs monitor: synthetic readings, threshold alerts, rolling history"
)]
struct Cli {
    /// Logging verbosity (e.g., debug, info, warn)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    /// Monitor config (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the synthetic monitor headless and print a session summary as JSON
    Simulate {
        #[arg(long, default_value_t = 20)]
        ticks: u64,
        #[arg(long)]
        capacity: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
        /// Also print one JSON line per tick before the summary
        #[arg(long)]
        emit_ticks: bool,
    },
    /// Feed scripted readings (CSV from --input or stdin) through the monitor
    Replay {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        capacity: Option<usize>,
    },
    /// Classify CSV readings and print one JSON line of flags per reading
    Classify {
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Print the active threshold table as JSON
    Thresholds,
    /// Simulate and render the four channel charts to a PNG via plotters
    Plot {
        #[arg(long, default_value_t = 100)]
        ticks: u64,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Serialize)]
struct TickLine<'a> {
    tick: u64,
    reading: &'a Reading,
    flags: &'a AnomalyFlags,
    alert: &'a AlertState,
}

impl<'a> From<&'a TickOutput> for TickLine<'a> {
    fn from(out: &'a TickOutput) -> Self {
        Self {
            tick: out.tick,
            reading: &out.reading,
            flags: &out.flags,
            alert: &out.alert,
        }
    }
}

#[derive(Serialize)]
struct ReplayOutput {
    summary: SessionSummary,
    window: Window,
}

#[derive(Serialize)]
struct ClassifiedLine {
    timestamp: f64,
    flags: AnomalyFlags,
    alert: AlertState,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(&cli.log_level)).init();

    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Simulate {
            ticks,
            capacity,
            seed,
            emit_ticks,
        } => cmd_simulate(config, ticks, capacity, seed, emit_ticks)?,
        Commands::Replay { input, capacity } => cmd_replay(&config, input.as_deref(), capacity)?,
        Commands::Classify { input } => cmd_classify(&config, input.as_deref())?,
        Commands::Thresholds => cmd_thresholds(&config)?,
        Commands::Plot { ticks, seed, out } => cmd_plot(config, ticks, seed, &out)?,
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<MonitorConfig> {
    match path {
        Some(path) => {
            info!("loading config from {}", path.display());
            read_config(path)
        }
        None => Ok(MonitorConfig::default()),
    }
}

fn read_readings(input: Option<&Path>) -> Result<Vec<Reading>> {
    match input {
        Some(path) => csv_io::read_readings(path)
            .with_context(|| format!("reading readings from {}", path.display())),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            csv_io::parse_readings(buf.as_bytes()).context("reading readings from stdin")
        }
    }
}

fn cmd_simulate(
    mut config: MonitorConfig,
    ticks: u64,
    capacity: Option<usize>,
    seed: Option<u64>,
    emit_ticks: bool,
) -> Result<()> {
    if let Some(capacity) = capacity {
        config.monitor.capacity = capacity;
    }
    if seed.is_some() {
        config.monitor.seed = seed;
    }
    let mut monitor = config.build_monitor()?;
    let outcome = run_session(
        &mut monitor,
        ticks,
        &config.subject,
        config.monitor.seed,
        |out| {
            if emit_ticks {
                println!("{}", serde_json::to_string(&TickLine::from(out))?);
            }
            Ok(())
        },
    )?;
    println!("{}", serde_json::to_string(&outcome.summary)?);
    Ok(())
}

fn cmd_replay(config: &MonitorConfig, input: Option<&Path>, capacity: Option<usize>) -> Result<()> {
    let readings = read_readings(input)?;
    let ticks = readings.len() as u64;
    let capacity = capacity.unwrap_or(config.monitor.capacity);
    let mut monitor = Monitor::new(ScriptedSource::new(readings), config.classifier()?, capacity)
        .context("building replay monitor")?;
    let outcome = run_session(&mut monitor, ticks, &config.subject, None, |_| Ok(()))?;
    let output = ReplayOutput {
        summary: outcome.summary,
        window: outcome.window,
    };
    println!("{}", serde_json::to_string(&output)?);
    Ok(())
}

fn cmd_classify(config: &MonitorConfig, input: Option<&Path>) -> Result<()> {
    let classifier = config.classifier()?;
    for reading in read_readings(input)? {
        let flags = classifier.classify(&reading);
        let line = ClassifiedLine {
            timestamp: reading.timestamp,
            alert: AlertState::from_flags(&flags),
            flags,
        };
        println!("{}", serde_json::to_string(&line)?);
    }
    Ok(())
}

fn cmd_thresholds(config: &MonitorConfig) -> Result<()> {
    let classifier = config.classifier()?;
    println!("{}", serde_json::to_string_pretty(classifier.rules())?);
    Ok(())
}

fn cmd_plot(mut config: MonitorConfig, ticks: u64, seed: Option<u64>, out: &Path) -> Result<()> {
    if seed.is_some() {
        config.monitor.seed = seed;
    }
    let mut monitor = config.build_monitor()?;
    let outcome = run_session(
        &mut monitor,
        ticks,
        &config.subject,
        config.monitor.seed,
        |_| Ok(()),
    )?;
    let figures = figures_from_window(&outcome.window, MAX_PLOT_POINTS);
    draw_plotters_figures(out, &figures)
        .with_context(|| format!("rendering {}", out.display()))?;
    info!("wrote {} charts to {}", figures.len(), out.display());
    Ok(())
}

fn draw_plotters_figures(path: &Path, figures: &[Figure]) -> Result<()> {
    let backend = BitMapBackend::new(path, (1200, 800));
    let root = backend.into_drawing_area();
    root.fill(&RGBColor(0x1e, 0x21, 0x30))?;
    let panels = root.split_evenly((2, 2));
    for (panel, fig) in panels.iter().zip(figures) {
        draw_panel(panel, fig)?;
    }
    root.present()?;
    Ok(())
}

fn draw_panel<DB: DrawingBackend>(area: &DrawingArea<DB, plotters::coord::Shift>, fig: &Figure) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let [x_min, x_max] = fig.x.bounds;
    let [y_min, y_max] = fig.y.bounds;
    let mut chart = ChartBuilder::on(area)
        .margin(10)
        .caption(
            fig.title.clone().unwrap_or_else(|| "Plot".into()),
            ("sans-serif", 22).into_font().color(&WHITE),
        )
        .x_label_area_size(30)
        .y_label_area_size(40)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;
    chart
        .configure_mesh()
        .x_desc(fig.x.label.clone().unwrap_or_default())
        .y_desc(fig.y.label.clone().unwrap_or_default())
        .axis_style(&WHITE)
        .label_style(("sans-serif", 12).into_font().color(&WHITE))
        .light_line_style(&RGBColor(0x2e, 0x32, 0x45))
        .draw()?;
    for series in &fig.series {
        match series {
            Series::Line(line) => {
                let (r, g, b) = line.style.color.rgb();
                chart.draw_series(LineSeries::new(
                    line.points.iter().map(|p| (p[0], p[1])),
                    RGBColor(r, g, b).stroke_width(line.style.width.round().max(1.0) as u32),
                ))?;
            }
            Series::Markers(markers) => {
                let (r, g, b) = markers.color.rgb();
                let style = RGBColor(r, g, b).filled();
                chart.draw_series(
                    markers
                        .points
                        .iter()
                        .map(|p| Circle::new((p[0], p[1]), markers.radius, style)),
                )?;
            }
        }
    }
    Ok(())
}
