//! Posture Monitor CLI
//!
//! Near real-time posture display for a fall-detection backend.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use posture_monitor::{
    config::Config,
    view::{self, View, TITLE},
    PostureController, VERSION,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "posture-monitor")]
#[command(version = VERSION)]
#[command(about = "Near real-time posture monitor", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the live posture until Ctrl+C
    Watch {
        /// Data source (stream or poll); defaults to POSTURE_MODE
        #[arg(long)]
        mode: Option<String>,

        #[command(flatten)]
        backend: BackendArgs,
    },

    /// Run a single polling cycle and print the result
    Fetch {
        #[command(flatten)]
        backend: BackendArgs,
    },

    /// Show the posture legend
    Legend,

    /// Show the effective configuration
    Config {
        #[command(flatten)]
        backend: BackendArgs,
    },
}

/// Overrides for values otherwise taken from the environment.
#[derive(Args, Default)]
struct BackendArgs {
    /// Backend base URL
    #[arg(long)]
    backend_url: Option<String>,

    /// Polling interval in seconds
    #[arg(long)]
    interval: Option<u64>,

    /// Polling endpoint path
    #[arg(long)]
    endpoint: Option<String>,

    /// Event name on the event stream
    #[arg(long)]
    event: Option<String>,

    /// Time zone for timestamps (e.g. America/Lima)
    #[arg(long)]
    timezone: Option<String>,
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Watch { mode, backend } => cmd_watch(mode, backend).await,
        Commands::Fetch { backend } => cmd_fetch(backend).await,
        Commands::Legend => {
            cmd_legend();
            Ok(())
        }
        Commands::Config { backend } => cmd_config(backend),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

/// Log to stderr so the dashboard on stdout stays readable.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Environment configuration with CLI overrides applied.
fn load_config(mode: Option<String>, args: BackendArgs) -> anyhow::Result<Config> {
    let mut config = Config::from_env().context("Invalid environment configuration")?;

    if let Some(mode) = mode {
        config.mode = mode.parse()?;
    }
    if let Some(url) = args.backend_url {
        config.backend_url = url;
    }
    if let Some(secs) = args.interval {
        config.poll_interval = std::time::Duration::from_secs(secs);
    }
    if let Some(endpoint) = args.endpoint {
        config.poll_endpoint = endpoint;
    }
    if let Some(event) = args.event {
        config.event_name = event;
    }
    if let Some(tz) = args.timezone {
        config.timezone = Some(tz);
    }

    config.validate()?;
    Ok(config)
}

async fn cmd_watch(mode: Option<String>, args: BackendArgs) -> anyhow::Result<()> {
    let config = load_config(mode, args)?;
    let tz = config.display_timezone()?;

    println!("{TITLE} v{VERSION}");
    println!();
    println!("  Backend: {}", config.backend_url);
    println!("  Mode: {}", config.mode);
    match config.mode {
        posture_monitor::SourceMode::Stream => println!("  Event: {}", config.event_name),
        posture_monitor::SourceMode::Poll => println!(
            "  Endpoint: {} (every {}s)",
            config.poll_url(),
            config.poll_interval.as_secs()
        ),
    }
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let mut controller = PostureController::from_config(&config)?;
    controller.connect();

    let mut last_view = controller.view();
    println!("{}", last_view.render(tz));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            state = controller.next_event() => {
                if state.is_none() {
                    eprintln!("Posture source stopped unexpectedly");
                    break;
                }
            }
        }

        let view = controller.view();
        if view != last_view {
            println!("{}", view.render(tz));
            last_view = view;
        }
    }

    println!();
    println!("Stopping...");
    controller.teardown();

    println!();
    println!("{}", controller.stats().summary());
    Ok(())
}

#[cfg(feature = "poll")]
async fn cmd_fetch(args: BackendArgs) -> anyhow::Result<()> {
    use posture_monitor::{reduce, DashboardState, PollSource};

    let config = load_config(None, args)?;
    let tz = config.display_timezone()?;
    let source = PollSource::from_config(&config)?;

    println!("GET {}", source.url());
    let event = source.poll_event().await;
    let state = reduce(&DashboardState::new(), &event, chrono::Utc::now());
    println!("{}", View::from_state(&state).render(tz));

    Ok(())
}

#[cfg(not(feature = "poll"))]
async fn cmd_fetch(_args: BackendArgs) -> anyhow::Result<()> {
    anyhow::bail!("fetch requires the poll feature (not enabled at compile time)")
}

fn cmd_legend() {
    println!("{TITLE}");
    println!();
    print!("{}", view::legend());
}

fn cmd_config(args: BackendArgs) -> anyhow::Result<()> {
    let config = load_config(None, args)?;

    println!("Configuration");
    println!("=============");
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
