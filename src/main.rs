use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use tabled::{builder::Builder, settings::Style};
use tracing::{error, warn, Level};

use runningapp::analyser::{Analyser, AnalyserFactory, GroupedTable, Metric, Statistic};
use runningapp::config::AppConfig;
use runningapp::export::{self, ExportFormat};
use runningapp::logging::init_logging;
use runningapp::models::{Column, Kpi, Pace, PACE};
use runningapp::source::{DataSource, DataSourceFactory};
use runningapp::RunningAppError;

/// RunningApp - Running session analysis CLI
///
/// Loads one recorded running session, derives pace and time/distance
/// buckets, and prints summary statistics and per-bucket views.
#[derive(Parser)]
#[command(name = "runningapp")]
#[command(version)]
#[command(about = "Running session analysis CLI", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Session data file (overrides the config)
    #[arg(short, long, value_name = "FILE")]
    file: Option<PathBuf>,

    /// Optional session summary file
    #[arg(long, value_name = "FILE", requires = "file")]
    summary_file: Option<PathBuf>,

    /// Source format tag, e.g. OnMove
    #[arg(short = 't', long)]
    source_type: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Speed and pace statistics of the session
    Summary,

    /// Mean of every column per time or distance bucket
    Compress {
        /// KPI column: Minute, Hour, 1km, 5km, 10km, 20km, "Half Marathon", Marathon
        #[arg(short, long)]
        by: Option<String>,

        /// Also write the grouped table to this CSV file
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Centre, width and default map zoom of the run
    Geometry,

    /// Print the normalized table
    Table {
        /// Number of rows to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Export the session
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Export format (csv, json)
        #[arg(short = 'f', long, default_value = "csv")]
        format: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path)?,
        None => AppConfig::load_or_default(),
    };

    if let Some(file) = &cli.file {
        config.source.files = std::iter::once(file.clone())
            .chain(cli.summary_file.clone())
            .collect();
    }
    if let Some(source_type) = &cli.source_type {
        config.source.source_type = source_type.clone();
    }
    config.logging.level = config.logging.level.raised_by(cli.verbose);

    init_logging(&config.logging)?;

    if let Err(e) = run(&cli.command, &config) {
        if let Some(app_error) = e.downcast_ref::<RunningAppError>() {
            if app_error.severity().to_tracing_level() == Level::WARN {
                warn!(error = %app_error, "Request rejected");
            } else {
                error!(error = %app_error, "Command failed");
            }
            eprintln!("{} {}", "Error:".red().bold(), app_error.user_message());
            std::process::exit(1);
        }
        return Err(e);
    }

    Ok(())
}

fn run(command: &Commands, config: &AppConfig) -> Result<()> {
    config.validate()?;
    if config.source.files.is_empty() {
        anyhow::bail!("No session file given; use --file or set [source] files in the config");
    }

    let factory = DataSourceFactory::new();
    let source = factory.create(&config.source.source_type, &config.source.files)?;
    let analyser = AnalyserFactory::create(source.as_ref());

    match command {
        Commands::Summary => show_summary(&analyser),
        Commands::Compress { by, output } => {
            let column = by.as_deref().unwrap_or(&config.analysis.default_kpi);
            let grouped = analyser.compress_by(column)?;
            show_grouped(&grouped);
            if let Some(output) = output {
                export::csv::export_grouped(&grouped, output)
                    .with_context(|| format!("Failed to export to {}", output.display()))?;
                println!("{} {}", "Exported".green().bold(), output.display());
            }
        }
        Commands::Geometry => show_geometry(source.as_ref(), config.analysis.map_scale_factor)?,
        Commands::Table { limit } => show_table(&analyser, *limit),
        Commands::Export { output, format } => {
            let format = format.parse::<ExportFormat>()?;
            export::export_session(&analyser, format, config.analysis.map_scale_factor, output)
                .with_context(|| format!("Failed to export to {}", output.display()))?;
            println!("{} {}", "Exported".green().bold(), output.display());
        }
    }

    Ok(())
}

fn show_summary(analyser: &Analyser<'_>) {
    println!("{}", "Summary".bold().cyan());

    let mut builder = Builder::default();
    builder.push_record(
        std::iter::once("Metric".to_string())
            .chain(Statistic::ALL.iter().map(|s| s.name().to_string())),
    );
    for metric in Metric::ALL {
        let stats = analyser.summary().metric(metric);
        let cells = Statistic::ALL.iter().map(|s| match stats.get(*s) {
            Some(v) if metric == Metric::Pace => Pace::format_seconds(v),
            Some(v) => format!("{:.2}", v),
            None => "-".to_string(),
        });
        builder.push_record(std::iter::once(metric.name().to_string()).chain(cells));
    }
    println!("{}", builder.build().with(Style::rounded()));

    let unavailable = analyser.summary().pace_unavailable;
    if unavailable > 0 {
        println!(
            "{}",
            format!("{} samples without pace were left out", unavailable).yellow()
        );
    }
}

fn show_grouped(grouped: &GroupedTable) {
    println!("{} {}", "Compressed by".bold().cyan(), grouped.key.name().bold());

    let mut builder = Builder::default();
    builder.push_record(
        std::iter::once(grouped.key.name().to_string()).chain(grouped.columns.iter().cloned()),
    );
    for row in &grouped.rows {
        let cells = grouped.columns.iter().zip(&row.values).map(|(name, value)| {
            match value.as_f64() {
                Some(v) if name == PACE => Pace::format_seconds(v),
                Some(v) => format!("{:.2}", v),
                None => value.to_string(),
            }
        });
        builder.push_record(std::iter::once(row.key.to_string()).chain(cells));
    }
    println!("{}", builder.build().with(Style::rounded()));
}

fn show_geometry(source: &dyn DataSource, scale_factor: f64) -> Result<()> {
    let geometry = source.run_geometry()?;
    println!("{}", "Run geometry".bold().cyan());
    println!("  Centre:   {:.6}, {:.6}", geometry.centre.0, geometry.centre.1);
    println!("  Width:    {:.6}°", geometry.width);
    println!("  Map zoom: {}", geometry.map_zoom(scale_factor));
    Ok(())
}

fn show_table(analyser: &Analyser<'_>, limit: usize) {
    let table = analyser.dataframe();
    let columns = table.columns();

    println!(
        "{} ({} of {} samples)",
        "Session".bold().cyan(),
        limit.min(table.len()),
        table.len()
    );

    let mut builder = Builder::default();
    builder.push_record(columns.iter().map(|c| table.column_name(*c).to_string()));
    for record in table.records().iter().take(limit) {
        builder.push_record(columns.iter().map(|column| match column {
            Column::Pace => record.pace.to_string(),
            other => record.cell(*other).to_string(),
        }));
    }
    println!("{}", builder.build().with(Style::rounded()));
    println!(
        "Group with: {}",
        Kpi::ALL.iter().map(Kpi::name).collect::<Vec<_>>().join(", ")
    );
}
