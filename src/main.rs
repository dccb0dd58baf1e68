use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use multicap::camera::runtime;
use multicap::{CampaignDriver, CaptureSession, MulticapConfig, SimulatedTransport};

#[derive(Parser, Debug)]
#[command(name = "multicap")]
#[command(about = "Synchronized still capture from one or two cameras, saved as JPEG files")]
#[command(version)]
#[command(long_about = "Opens one or two cameras, shoots a fixed number of frames from each \
camera per iteration and writes every frame to <output-dir>/<stem><NNNN>_<camera>_<NN>.jpg. \
Values given on the command line override the configuration file and MULTICAP__* environment variables.")]
struct Args {
    /// Number of cameras to open
    #[arg(short = 'n', value_name = "NCAM", value_parser = clap::value_parser!(u32).range(1..=2))]
    cameras: Option<u32>,

    /// Frames shot from each camera per iteration
    #[arg(short = 'p', value_name = "NPIC", value_parser = clap::value_parser!(u32).range(1..=10))]
    shots_per_camera: Option<u32>,

    /// Number of iterations
    #[arg(
        short = 'i',
        value_name = "NITER",
        value_parser = clap::value_parser!(u32).range(1..=1000)
    )]
    iterations: Option<u32>,

    /// Acquisition mode: 1 for continuous, 0 for one grab per shot
    #[arg(short = 'c', value_name = "CMODE", value_parser = clap::value_parser!(u8).range(0..=1))]
    continuous: Option<u8>,

    /// Delay between shots of one camera in milliseconds
    #[arg(
        short = 'I',
        value_name = "IDELAY",
        value_parser = clap::value_parser!(u64).range(0..=1000)
    )]
    inter_shot_delay_ms: Option<u64>,

    /// Delay before shooting each camera in milliseconds
    #[arg(
        short = 'C',
        value_name = "CDELAY",
        value_parser = clap::value_parser!(u64).range(0..=10000)
    )]
    between_camera_delay_ms: Option<u64>,

    /// Path to configuration file
    #[arg(long, default_value = "multicap.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Directory receiving the JPEG files
    #[arg(short, long, value_name = "DIR", help = "Override the output directory")]
    output_dir: Option<String>,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable verbose logging including per-frame detail")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,
}

fn main() -> Result<()> {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    };

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    init_logging(&args);

    info!("Starting multicap v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let mut config = MulticapConfig::load_from_file(&args.config).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;
    apply_overrides(&mut config, &args);
    let config = config.validated().map_err(|e| {
        error!("Configuration validation failed: {}", e);
        e
    })?;

    log_parameters(&config);

    let result = run_campaign(&config);
    runtime::shutdown();

    result
}

fn run_campaign(config: &MulticapConfig) -> Result<()> {
    let driver = CampaignDriver::from_config(config)?;

    let transport = SimulatedTransport::from(&config.simulator);
    let mut session =
        CaptureSession::with_channel_order(Box::new(transport), config.capture.channel_order);

    session.open(config.campaign.cameras as usize).map_err(|e| {
        error!("Failed to open cameras: {}", e);
        e
    })?;

    let summary = driver.run(&mut session).map_err(|e| {
        error!("Campaign failed: {}", e);
        e
    })?;

    info!(
        "Saved {} frames to {}",
        summary.frames_saved,
        driver.plan().output_dir.display()
    );
    Ok(())
}

fn apply_overrides(config: &mut MulticapConfig, args: &Args) {
    let campaign = &mut config.campaign;

    if let Some(cameras) = args.cameras {
        campaign.cameras = cameras;
    }
    if let Some(shots) = args.shots_per_camera {
        campaign.shots_per_camera = shots;
    }
    if let Some(iterations) = args.iterations {
        campaign.iterations = iterations;
    }
    if let Some(mode) = args.continuous {
        campaign.continuous = mode == 1;
    }
    if let Some(delay) = args.inter_shot_delay_ms {
        campaign.inter_shot_delay_ms = delay;
    }
    if let Some(delay) = args.between_camera_delay_ms {
        campaign.between_camera_delay_ms = delay;
    }
    if let Some(dir) = &args.output_dir {
        config.storage.path = dir.clone();
    }
}

fn log_parameters(config: &MulticapConfig) {
    let campaign = &config.campaign;
    info!("NCAM = {}", campaign.cameras);
    info!("NPIC = {}", campaign.shots_per_camera);
    info!("NITER = {}", campaign.iterations);
    info!("CMODE = {}", u8::from(campaign.continuous));
    info!("IDELAY = {}", campaign.inter_shot_delay_ms);
    info!("CDELAY = {}", campaign.between_camera_delay_ms);
    info!("Output directory: {}", config.storage.path);
}

fn init_logging(args: &Args) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "trace"
    } else if args.quiet {
        "error"
    } else {
        "info"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("multicap={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("pretty") => fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some("compact") | None => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .compact()
                .with_writer(std::io::stderr)
                .with_target(false)
                .boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# multicap configuration file");
    println!("# Every key is optional; MULTICAP__<SECTION>__<KEY> environment variables override it");
    println!();

    let rendered = toml::to_string_pretty(&MulticapConfig::default())?;
    println!("{}", rendered);
    Ok(())
}
