//! `ftl-robot` – robot base process.
//!
//! Loads `~/.ftl-robot/config.toml`, initialises logging, then bootstraps the
//! selected hardware profile and link and runs until Ctrl-C.
//!
//! ```text
//! ftl-robot [PROFILE] [-c|--config PROFILE] [-l|--link LINK]
//! ```
//!
//! Both selectors default to `sim`.  Unknown names fall back to `sim` with a
//! warning; unknown arguments are ignored.

mod config;

use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use tracing::info;

use ftl_hal::builtin_profiles;
use ftl_middleware::builtin_links;
use ftl_runtime::{BootstrapOptions, bootstrap, init_tracing};
use ftl_types::RobotError;

use crate::config::Config;

/// Service name reported to tracing and OpenTelemetry.
const SERVICE_NAME: &str = "ftl-robot";

#[derive(Parser, Debug)]
#[command(name = "ftl-robot", version, about = "FTL robot base")]
struct Cli {
    /// Hardware profile to load.
    #[arg(short = 'c', long = "config", value_name = "PROFILE")]
    config: Option<String>,

    /// Hardware profile to load (same as --config).
    #[arg(value_name = "PROFILE")]
    profile: Option<String>,

    /// Link to the message bus (`sim` or `ros`).
    #[arg(short = 'l', long = "link", value_name = "LINK")]
    link: Option<String>,
}

impl Cli {
    /// Command-line selectors win over the config file.
    fn bootstrap_options(&self, cfg: &Config) -> BootstrapOptions {
        BootstrapOptions {
            profile: self
                .config
                .clone()
                .or_else(|| self.profile.clone())
                .or_else(|| cfg.profile.clone()),
            link: self.link.clone().or_else(|| cfg.link.clone()),
        }
    }
}

/// Keep only the arguments [`Cli`] understands, wherever they appear.
///
/// Unknown flags are dropped together with a value that directly follows
/// them; only the first positional is kept; a selector flag without a value
/// is dropped.
fn known_args(args: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut args = args.into_iter().peekable();
    let mut kept: Vec<String> = args.next().into_iter().collect();
    let mut positional_seen = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-c" | "--config" | "-l" | "--link" => {
                if let Some(value) = args.next_if(|v| !v.starts_with('-')) {
                    kept.push(arg.clone());
                    kept.push(value);
                }
            }
            "-h" | "--help" | "-V" | "--version" => kept.push(arg.clone()),
            a if a.starts_with("--config=") || a.starts_with("--link=") => kept.push(arg.clone()),
            a if a.starts_with('-') => {
                args.next_if(|v| !v.starts_with('-'));
            }
            _ if !positional_seen => {
                positional_seen = true;
                kept.push(arg.clone());
            }
            _ => {}
        }
    }
    kept
}

fn main() -> ExitCode {
    let cli = Cli::parse_from(known_args(std::env::args()));

    print_banner();

    let mut cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => Config::default(),
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            Config::default()
        }
    };
    config::apply_env_overrides(&mut cfg);

    // The simple span exporter needs no runtime, so tracing goes first.
    let _guard = init_tracing(SERVICE_NAME, &cfg.log_settings());

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}: {}", "Failed to start Tokio runtime".red(), e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(&cli, &cfg)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Robot stopped with an error");
            eprintln!("{}: {}", "Error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli, cfg: &Config) -> Result<(), RobotError> {
    let options = cli.bootstrap_options(cfg);
    let robot = bootstrap(
        &options,
        &builtin_profiles(),
        &builtin_links(),
        &cfg.link_settings(),
    )?;

    println!(
        "  Robot running: profile {} over link {}. Press {} to stop.",
        robot.profile_key().bold(),
        robot.link_key().bold(),
        "Ctrl-C".bold().cyan()
    );

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| RobotError::Runtime(format!("failed to listen for Ctrl-C: {e}")))?;

    println!();
    println!("{}", "⚠  Ctrl-C received – shutting down.".yellow().bold());
    info!(profile = robot.profile_key(), link = robot.link_key(), "Robot shutting down");
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   ______________ "#.bold().cyan());
    println!("{}", r#"  / ____/_  __/ / "#.bold().cyan());
    println!("{}", r#" / /_    / / / /  "#.bold().cyan());
    println!("{}", r#"/ __/   / / / /___"#.bold().cyan());
    println!("{}", r#"/_/     /_/ /_____/"#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "FTL Robot Base".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!();
}
