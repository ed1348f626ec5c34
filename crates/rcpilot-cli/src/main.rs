//! `rcpilot` – command server for a remote-controlled car.
//!
//! This binary wires the stack together.  It:
//!
//! 1. Loads `~/.rcpilot/config.toml` (or `--config <path>`), falling back to
//!    defaults when the file is absent.
//! 2. Starts the controller and, unless `--no-hardware` / `noArduino` is
//!    given, connects the servo board in the background.  The link comes up
//!    when the board reports ready; until then every command is ignored.
//! 3. Serves the cockpit over HTTP + WebSocket.
//! 4. Intercepts **Ctrl-C** to centre the steering and cut the throttle
//!    before exiting.

mod config;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use tokio::sync::Notify;
use tracing::{error, info, warn};

use rcpilot_cockpit::CockpitServer;
use rcpilot_hal::{Board, SimBoard};
use rcpilot_kernel::{Controller, ControllerHandle};
use rcpilot_middleware::StatusBroadcaster;

/// Legacy positional flag that disables the servo board.
const NO_ARDUINO: &str = "noArduino";

#[derive(Parser, Debug)]
#[command(name = "rcpilot", version, about = "Remote-controlled car command server")]
struct Args {
    /// Never connect the servo board; commands are accepted but ignored.
    #[arg(long)]
    no_hardware: bool,

    /// Config file to load instead of ~/.rcpilot/config.toml.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// HTTP port, overriding the config file and RCPILOT_HTTP_PORT.
    #[arg(long)]
    port: Option<u16>,

    /// Write the effective configuration to the config path and exit.
    #[arg(long)]
    init_config: bool,

    /// Legacy startup flags (`noArduino`).
    #[arg(value_name = "FLAG")]
    legacy: Vec<String>,
}

impl Args {
    fn hardware_disabled(&self) -> bool {
        self.no_hardware || self.legacy.iter().any(|flag| flag == NO_ARDUINO)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // ── Structured logging ────────────────────────────────────────────────
    // RUST_LOG picks the filter (default "info").  RCPILOT_LOG_FORMAT=json
    // switches to newline-delimited JSON.
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    if std::env::var("RCPILOT_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .compact()
            .init();
    }

    let args = Args::parse();
    for flag in args.legacy.iter().filter(|f| *f != NO_ARDUINO) {
        warn!(flag = %flag, "ignoring unknown startup flag");
    }

    print_banner();

    // ── Configuration ─────────────────────────────────────────────────────
    let path = args.config.clone().unwrap_or_else(config::config_path);
    let mut cfg = match config::load_from(&path) {
        Ok(Some(cfg)) => {
            println!("  Config loaded from {}", path.display().to_string().bold());
            cfg
        }
        Ok(None) if args.config.is_some() && !args.init_config => {
            eprintln!("{}: {} does not exist", "Config error".red(), path.display());
            return ExitCode::FAILURE;
        }
        Ok(None) => {
            println!("  No config at {}, using defaults.", path.display().to_string().dimmed());
            config::Config::default()
        }
        Err(e) => {
            eprintln!("{}: {e}", "Config error".red());
            return ExitCode::FAILURE;
        }
    };
    config::apply_env_overrides(&mut cfg);
    if let Some(port) = args.port {
        cfg.http_port = port;
    }

    if args.init_config {
        return match config::save_to(&cfg, &path) {
            Ok(()) => {
                println!(
                    "  {} Config saved to {}",
                    "✓".green().bold(),
                    path.display().to_string().bold()
                );
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}: {e}", "Error saving config".red());
                ExitCode::FAILURE
            }
        };
    }

    // ── Controller & actuator link ────────────────────────────────────────
    let controller = Controller::spawn(cfg.named_values());
    let broadcaster = StatusBroadcaster::new(controller.watch_status());

    if args.hardware_disabled() {
        println!(
            "  {}",
            "Hardware disabled: commands will be accepted and ignored.".yellow()
        );
        info!("servo board link disabled");
    } else {
        spawn_board_link(&controller, &cfg);
    }

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let shutdown = Arc::new(Notify::new());
    let shutdown_signal = Arc::clone(&shutdown);
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping the car …".yellow().bold());
        shutdown_signal.notify_one();
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; the car will not be stopped on Ctrl-C");
    }

    // ── Cockpit ───────────────────────────────────────────────────────────
    println!(
        "  Cockpit on {}\n",
        format!("http://localhost:{}", cfg.http_port).bold().cyan()
    );
    let server = CockpitServer::new(controller.clone(), broadcaster)
        .with_port(cfg.http_port)
        .with_public_dir(cfg.public_dir.clone());

    tokio::select! {
        result = server.run() => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!(error = %e, "cockpit server failed");
                eprintln!("{}: {e}", "Server error".red());
                ExitCode::FAILURE
            }
        },
        _ = shutdown.notified() => {
            match controller.full_stop().await {
                Ok(()) => println!("{}", "  ✓ Steering centred, throttle cut.".green()),
                Err(e) => warn!(error = %e, "full stop on exit failed"),
            }
            println!("{}", "  ✓ Exiting rcpilot.".green());
            ExitCode::SUCCESS
        }
    }
}

/// Connect the servo board in the background and hand its servos to the
/// controller once it reports ready.
fn spawn_board_link(controller: &ControllerHandle, cfg: &config::Config) {
    let board = SimBoard::new(cfg.board_ready_delay());
    let acceleration = cfg.acceleration.clone();
    let steering = cfg.steering.clone();
    let controller = controller.clone();

    tokio::spawn(async move {
        match board.connect(acceleration, steering).await {
            Ok(servos) => match controller.link_ready(servos).await {
                Ok(()) => info!("actuator link ready"),
                Err(e) => warn!(error = %e, "link ready not delivered"),
            },
            Err(e) => error!(error = %e, "servo board connect failed"),
        }
    });
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   ________  ____  _ __      __ "#.bold().cyan());
    println!("{}", r#"  / __/ __/ / __ \(_) /___  / /_"#.bold().cyan());
    println!("{}", r#" / / / /__ / /_/ / / / __ \/ __/"#.bold().cyan());
    println!("{}", r#"/_/  \___// .___/_/_/\____/\__/ "#.bold().cyan());
    println!("{}", r#"         /_/                    "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "rcpilot".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Remote-controlled car command server");
    println!();
}
