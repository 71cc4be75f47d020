//! Area Window Manager
//!
//! A reparenting X11 window manager: per-workspace focus rings, three-tier
//! stacking, interactive move/resize and smart placement.

mod config;
mod shared;
mod wm;
mod x11_async;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::signal::unix::{SignalKind, signal};
use tracing::{debug, error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::Config;
use crate::wm::WindowManager;
use crate::wm::display::X11Conn;
use crate::x11_async::X11Readiness;

/// Command line options
#[derive(Debug, Default)]
struct Args {
    /// Take over from a running window manager
    replace: bool,
    /// Config file to use instead of `~/.config/area/wm.toml`
    config: Option<PathBuf>,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self> {
        let mut parsed = Self::default();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--replace" | "-r" => parsed.replace = true,
                "--config" | "-c" => {
                    let path = args.next().context("--config needs a path")?;
                    parsed.config = Some(path.into());
                }
                other => anyhow::bail!("Unknown argument: {other}"),
            }
        }
        Ok(parsed)
    }
}

/// Keep running through races on vanished windows; anything else means our
/// view of the server can no longer be trusted
fn recover(result: wm::error::Result<()>, what: &str) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.is_benign() => {
            debug!("{}: {}", what, e);
            Ok(())
        }
        Err(e) => {
            error!("{}: {}", what, e);
            Err(e).context(format!("{what} failed"))
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        None => std::future::pending().await,
    }
}

/// Main event loop
async fn run(mut wm: WindowManager<X11Conn>, readiness: X11Readiness) -> Result<()> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    loop {
        // replies read while handling can queue events without the socket turning readable
        recover(wm.process_pending(), "event dispatch")?;

        tokio::select! {
            () = readiness.wait_readable() => {}
            () = sleep_until(wm.next_deadline()) => {
                recover(wm.run_timers(Instant::now()), "close timers")?;
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down gracefully");
                break;
            }
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down gracefully");
                break;
            }
        }
    }

    if let Err(e) = wm.release_all() {
        warn!("Failed to release windows on exit: {}", e);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "area_wm=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Area Window Manager");

    let args = Args::parse(std::env::args().skip(1))?;
    if args.replace {
        info!("--replace flag detected: will attempt to replace existing WM");
    }

    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load().context("Failed to load configuration")?,
    };

    let conn = X11Conn::connect(args.replace)?;
    let readiness = X11Readiness::new(&conn.connection())
        .context("Failed to initialize X11 event stream")?;

    let mut wm = WindowManager::new(conn, config).context("Failed to initialize window manager")?;
    wm.start().context("Failed to start window manager")?;
    info!("Window manager running");

    run(wm, readiness).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wm::error::Error;

    fn parse(args: &[&str]) -> Result<Args> {
        Args::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn replace_and_config_flags() {
        let args = parse(&["-r", "--config", "/tmp/wm.toml"]).unwrap();
        assert!(args.replace);
        assert_eq!(args.config, Some(PathBuf::from("/tmp/wm.toml")));

        let args = parse(&[]).unwrap();
        assert!(!args.replace);
        assert_eq!(args.config, None);
    }

    #[test]
    fn bad_arguments_are_rejected() {
        assert!(parse(&["--config"]).is_err());
        assert!(parse(&["--frobnicate"]).is_err());
    }

    #[test]
    fn only_races_keep_the_loop_running() {
        assert!(recover(Ok(()), "test").is_ok());
        assert!(recover(Err(Error::BadWindow(3)), "test").is_ok());
        let protocol = Error::Protocol {
            request: "GrabKey".into(),
            kind: "Access".into(),
        };
        assert!(recover(Err(protocol), "test").is_err());
        assert!(recover(Err(Error::Disconnected), "test").is_err());
    }
}
