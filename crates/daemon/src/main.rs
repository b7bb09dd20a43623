// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Kegbot daemon (`kbd`)
//!
//! `kbd core` runs the flow manager and Kegnet server; `kbd bridge` relays a
//! kegboard on this machine to a core elsewhere.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use kb_daemon::{logging, run_bridge, run_core, Config, Outcome};

#[derive(Parser, Debug)]
#[command(name = "kbd", version, about = "Kegbot beverage dispensing daemon")]
struct Cli {
    /// Config file (default: $KB_CONFIG or ~/.kegbot/kbd.toml)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging (-v for debug, -vv for trace)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Run the core: flow manager, event hub and Kegnet server
    Core {
        /// Kegnet listen address
        #[arg(long)]
        bind: Option<String>,
        /// Read a kegboard attached to this machine
        #[arg(long)]
        device: Option<PathBuf>,
    },
    /// Relay a local kegboard to a remote core
    Bridge {
        /// Kegboard serial device
        #[arg(long)]
        device: Option<PathBuf>,
        /// Core Kegnet address
        #[arg(long)]
        core_addr: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;

    let is_bridge = matches!(cli.mode, Mode::Bridge { .. });
    match cli.mode {
        Mode::Core { bind, device } => {
            if let Some(bind) = bind {
                config.kegnet.bind_addr = bind;
            }
            if let Some(device) = device {
                config.device.enabled = true;
                config.device.path = device;
            }
        }
        Mode::Bridge { device, core_addr } => {
            if let Some(device) = device {
                config.device.path = device;
            }
            if let Some(core_addr) = core_addr {
                config.kegnet.core_addr = core_addr;
            }
        }
    }

    let guard = logging::init(cli.verbose, config.log_file.as_deref())?;
    tracing::info!("kbd v{} starting", env!("CARGO_PKG_VERSION"));

    let outcome = if is_bridge { run_bridge(&config)? } else { run_core(&config)? };
    match outcome {
        Outcome::Clean => {
            tracing::info!("kbd stopped");
            Ok(())
        }
        Outcome::Fault(ref reason) => {
            tracing::error!(%reason, "kbd stopped after a fault");
            // Flush the file appender before exiting.
            drop(guard);
            std::process::exit(outcome.exit_code());
        }
    }
}
