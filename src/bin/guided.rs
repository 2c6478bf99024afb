//! guided - assembly guidance daemon
//!
//! This daemon:
//! 1. Loads configuration (file named by --config / GUIDE_CONFIG, then env)
//! 2. Selects a detector backend
//! 3. Serves framed image requests until Ctrl-C

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::mpsc;

use assembly_guide::{build_server, GuidanceSession, GuideConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "Serve step-by-step assembly guidance over framed TCP")]
struct Args {
    /// Config file (JSON, or TOML with a .toml extension).
    #[arg(long, env = "GUIDE_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listen address.
    #[arg(long)]
    addr: Option<String>,

    /// Override the detector backend.
    #[arg(long)]
    backend: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = GuideConfig::load_from(args.config.as_deref())?;
    if let Some(addr) = args.addr {
        cfg.server.addr = addr;
    }
    if let Some(backend) = args.backend {
        cfg.detector.backend = backend.trim().to_lowercase();
    }
    log::info!(
        "detector backend={} confidence={} nms={} max_wh={}",
        cfg.detector.backend,
        cfg.detector.confidence_threshold,
        cfg.detector.nms_threshold,
        cfg.detector.image_max_wh
    );

    let session = GuidanceSession::new().shared();
    let mut server = build_server(&cfg, session.clone())?;
    let addr = server.bind()?;
    let handle = server.spawn()?;
    log::info!("guided listening on {}", addr);

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    let _ = rx.recv();
    log::info!("shutdown signal received, stopping server...");
    let phase = handle.stop()?;
    log::info!("server {:?}", phase);
    if let Ok(session) = session.lock() {
        log::info!("guidance ended in state {}", session.state());
    }
    Ok(())
}
