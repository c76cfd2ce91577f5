//! RFB console server entry point.
//!
//! Serves an in-memory display to VNC viewers and feeds their key presses
//! into a scancode queue.
//!
//! # Usage
//!
//! ```text
//! rfb-server [OPTIONS]
//!
//! Options:
//!   --config    <PATH>   TOML configuration file [default: rfb-server.toml]
//!   --bind      <IP>     Override network.bind_address
//!   --port      <PORT>   Override network.port
//!   --log-level <LEVEL>  Override server.log_level
//! ```
//!
//! Every option can also be set through the environment (`RFB_CONFIG`,
//! `RFB_BIND`, `RFB_PORT`, `RFB_LOG`). `RUST_LOG`, when set, wins over both
//! the file and `--log-level`.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config + CLI overrides
//!  └─ start tasks
//!       ├─ run_animation  (repaints the display)
//!       ├─ run_drain      (empties the scancode queue)
//!       └─ RfbServer::run (one session task per viewer)
//! ```

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rfb_core::{Collaborators, MemoryFramebuffer, ScancodeQueue};
use rfb_server::application::animate_display::run_animation;
use rfb_server::application::drain_keyboard::run_drain;
use rfb_server::infrastructure::network::RfbServer;
use rfb_server::infrastructure::storage::config::{load_config, AppConfig};

const DRAIN_INTERVAL: Duration = Duration::from_millis(20);

// ── CLI argument definitions ──────────────────────────────────────────────────

/// RFB (VNC) console server.
#[derive(Debug, Parser)]
#[command(
    name = "rfb-server",
    about = "Serves an in-memory display to VNC viewers over RFB",
    version
)]
struct Cli {
    /// Path of the TOML configuration file. A missing file means defaults.
    #[arg(long, default_value = "rfb-server.toml", env = "RFB_CONFIG")]
    config: PathBuf,

    /// IP address to listen on.
    #[arg(long, env = "RFB_BIND")]
    bind: Option<String>,

    /// TCP port to listen on.
    #[arg(long, env = "RFB_PORT")]
    port: Option<u16>,

    /// Log filter used when `RUST_LOG` is unset (e.g. `debug`, `rfb_core=trace`).
    #[arg(long, env = "RFB_LOG")]
    log_level: Option<String>,
}

impl Cli {
    /// Loads the configuration file and applies command-line overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// merged configuration is invalid.
    fn into_app_config(self) -> anyhow::Result<AppConfig> {
        let mut config = load_config(&self.config)
            .with_context(|| format!("loading config from '{}'", self.config.display()))?;

        if let Some(bind) = self.bind {
            config.network.bind_address = bind;
        }
        if let Some(port) = self.port {
            config.network.port = port;
        }
        if let Some(level) = self.log_level {
            config.server.log_level = level;
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_app_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.server.log_level.as_str())),
        )
        .init();

    info!("RFB server '{}' starting", config.server.name);

    let framebuffer = Arc::new(MemoryFramebuffer::new(
        config.display.width,
        config.display.height,
    ));
    let keyboard = Arc::new(ScancodeQueue::new(config.input.queue_capacity));
    let collaborators = Collaborators {
        framebuffer: Arc::clone(&framebuffer) as _,
        injector: Arc::clone(&keyboard) as _,
    };

    // Shutdown flag shared across all background tasks.
    let running = Arc::new(AtomicBool::new(true));

    if config.display.animate {
        tokio::spawn(run_animation(
            Arc::clone(&framebuffer),
            Duration::from_millis(config.display.animate_interval_ms),
            Arc::clone(&running),
        ));
    }
    tokio::spawn(run_drain(keyboard, DRAIN_INTERVAL, Arc::clone(&running)));

    // ── Ctrl-C handler ────────────────────────────────────────────────────────
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            running_clone.store(false, Ordering::SeqCst);
        }
    });

    let server = RfbServer::bind(&config, collaborators)
        .await
        .context("starting listener")?;
    info!(
        "serving {}x{} display; press Ctrl-C to exit",
        config.display.width, config.display.height
    );
    server.run(running).await;

    info!("RFB server stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
