//! tprt-label - command line driver for TPRT network label printers.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use tprt_label::config::{AppConfig, ConfigLoadResult, LoggingConfig};
use tprt_label::job::{CancelToken, JobOptions, JobSequencer};
use tprt_label::label::{LabelCanvas, qr_label, test_pattern, write_preview};
use tprt_label::raster::{RasterJob, analyze, encode_job, mm_to_dots};
use tprt_label::tprt::{ControlClient, TapeWidth};
use tprt_label::transport::NetTransport;

/// Command line driver for TPRT network label printers.
#[derive(Parser)]
#[command(name = "tprt-label", version)]
struct Cli {
    /// Config file (default: config.toml next to the executable)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Printer IPv4 address, overrides the config file
    #[arg(long, global = true)]
    printer: Option<Ipv4Addr>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show loaded tape and device state
    Status,
    /// Show model and serial number
    Name,
    /// Print a test pattern or QR label
    Print(PrintArgs),
    /// Feed and cut the tape
    Feed,
    /// Decode a raster stream captured to a file
    Analyze { file: PathBuf },
}

#[derive(Args)]
struct PrintArgs {
    /// Test pattern length in millimeters
    #[arg(long, default_value_t = 30.0)]
    length_mm: f64,
    /// Print a QR code of this text, followed by the text
    #[arg(long)]
    qr_text: Option<String>,
    /// Encode and check the stream without contacting the printer
    #[arg(long)]
    dry_run: bool,
    /// Tape width in millimeters assumed by --dry-run
    #[arg(long, default_value_t = 24)]
    tape_mm: u32,
    /// Write the raster stream to this file
    #[arg(long)]
    output: Option<PathBuf>,
    /// PNG preview written by --dry-run and --output
    #[arg(long, default_value = "preview.png")]
    preview: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(AppConfig::default_path);
    let (mut config, missing) = match AppConfig::try_load(&config_path) {
        ConfigLoadResult::Loaded(config) => (config, false),
        ConfigLoadResult::Missing => (AppConfig::default(), true),
        ConfigLoadResult::Invalid(e) => {
            return Err(e).with_context(|| format!("Invalid config {}", config_path.display()));
        }
    };
    if let Some(address) = cli.printer {
        config.printer.address = address;
    }

    let _guard = init_logging(&config.logging);
    if missing {
        info!("No config at {:?}, using defaults", config_path);
    } else {
        info!("Config loaded from {:?}", config_path);
    }

    match cli.command {
        Commands::Status => status(&config).await,
        Commands::Name => name(&config).await,
        Commands::Print(args) if args.dry_run => dry_run(&config, &args),
        Commands::Print(args) => print(&config, &args).await,
        Commands::Feed => feed(&config).await,
        Commands::Analyze { file } => analyze_file(&file),
    }
}

/// Install the stderr subscriber, plus a daily log file when configured.
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let stderr = fmt::layer().with_writer(std::io::stderr);

    match &config.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "tprt-label.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr)
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(filter).with(stderr).init();
            None
        }
    }
}

fn connect(config: &AppConfig) -> ControlClient<NetTransport> {
    let transport = NetTransport::new(config.printer.address, config.printer.port, config.printer.timeout());
    ControlClient::new(transport, config.printer.address, config.job.token)
}

/// Lay out the requested label across the printable band of `tape`.
fn render_label(args: &PrintArgs, tape: TapeWidth) -> anyhow::Result<LabelCanvas> {
    let canvas = match &args.qr_text {
        Some(text) => qr_label(text, tape.printable_dots())?,
        None => {
            if !args.length_mm.is_finite() || args.length_mm <= 0.0 {
                bail!("Invalid label length: {} mm", args.length_mm);
            }
            test_pattern(tape.printable_dots(), mm_to_dots(args.length_mm))?
        }
    };
    info!("Label is {}x{} dots on {tape} tape", canvas.width(), canvas.height());
    Ok(canvas)
}

/// Interrupt the job's waits on Ctrl-C.
fn cancel_on_ctrl_c(token: CancelToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, aborting job");
            token.cancel();
        }
    });
}

async fn status(config: &AppConfig) -> anyhow::Result<()> {
    let mut client = connect(config);
    let status = client.status().await?;
    let state = client.query_state().await?;

    println!("Printer:        {}", config.printer.address);
    println!("Tape:           {} ({} dots printable)", status.tape, status.tape.printable_dots());
    println!("Feeding:        {}", if status.feeding { "yes" } else { "no" });
    println!("Print complete: {}", if status.print_complete { "yes" } else { "no" });
    println!("State byte:     {state:#04x}");
    Ok(())
}

async fn name(config: &AppConfig) -> anyhow::Result<()> {
    let info = connect(config).device_info().await?;
    println!("Model:  {}", info.model);
    println!("Serial: {}", info.serial);
    Ok(())
}

fn write_stream(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    std::fs::write(path, data).with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Raster stream ({} bytes) written to {:?}", data.len(), path);
    Ok(())
}

fn dry_run(config: &AppConfig, args: &PrintArgs) -> anyhow::Result<()> {
    let tape_mm = args.tape_mm;
    let tape = TapeWidth::from_mm(tape_mm).ok_or_else(|| anyhow!("Unsupported tape width: {tape_mm} mm"))?;
    let canvas = render_label(args, tape)?;
    write_preview(&canvas, &args.preview)?;

    let job = RasterJob::from_bitmap(canvas.to_bitmap()?)?;
    let data = encode_job(&job, tape, JobOptions::from(&config.job).line_feed)?;

    let summary = analyze(&data)?;
    print!("{summary}");
    if !summary.is_consistent() {
        bail!("Declared length does not match the {} encoded lines", summary.lines);
    }

    if let Some(path) = &args.output {
        write_stream(path, &data)?;
    }
    Ok(())
}

async fn print(config: &AppConfig, args: &PrintArgs) -> anyhow::Result<()> {
    let options = JobOptions::from(&config.job);
    let mut client = connect(config);
    let tape = client.status().await?.tape;
    let canvas = render_label(args, tape)?;
    let job = RasterJob::from_bitmap(canvas.to_bitmap()?)?;

    if let Some(path) = &args.output {
        write_preview(&canvas, &args.preview)?;
        write_stream(path, &encode_job(&job, tape, options.line_feed)?)?;
    }

    let mut sequencer = JobSequencer::new(client, options);
    cancel_on_ctrl_c(sequencer.cancel_token());
    let report = sequencer.run_print(&job).await?;
    println!("{}", report.summary());
    Ok(())
}

async fn feed(config: &AppConfig) -> anyhow::Result<()> {
    let mut sequencer = JobSequencer::new(connect(config), JobOptions::from(&config.job));
    cancel_on_ctrl_c(sequencer.cancel_token());
    let report = sequencer.run_feed_and_cut().await?;
    println!("{}", report.summary());
    Ok(())
}

fn analyze_file(path: &Path) -> anyhow::Result<()> {
    let data = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let summary = analyze(&data)?;
    print!("{summary}");
    if !summary.is_consistent() {
        warn!("Declared length does not match the {} lines in the stream", summary.lines);
    }
    Ok(())
}
