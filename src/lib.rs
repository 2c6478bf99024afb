//! Assembly guidance engine.
//!
//! This crate walks a person through assembling a disk tray, one spoken and
//! illustrated instruction at a time, by watching live camera frames.
//!
//! # Architecture
//!
//! Frames flow through four layers:
//!
//! 1. **Transport** (`transport`): length-prefixed image frames over TCP, one
//!    polling loop serving every connection.
//! 2. **Detection** (`detect`, `frame`): images larger than the detector budget
//!    are shrunk, handed to a `DetectorBackend`, and the boxes mapped back.
//! 3. **Guidance** (`guidance`, `geometry`): a debounced state machine turns
//!    the box list into the next instruction.
//! 4. **Assets** (`assets`): instruction images and clips are resolved to
//!    references the client can display.
//!
//! There is one `GuidanceSession` per process. Every connection drives the
//! same session through a `SharedSession` lock.

pub mod assets;
pub mod config;
pub mod detect;
pub mod frame;
pub mod geometry;
pub mod guidance;
pub mod pipeline;
pub mod transport;

pub use assets::AssetResolver;
pub use config::GuideConfig;
pub use detect::{
    BackendRegistry, DetectParams, DetectedObject, DetectionAdapter, DetectorBackend, Label,
    ScriptedBackend,
};
pub use guidance::{GuidanceSession, GuidanceState, Instruction, SharedSession, StepOutcome};
pub use pipeline::{FramePipeline, Reply};
pub use transport::{GuidanceServer, ServerHandle, ServerPhase};

use anyhow::Result;

/// Register the backends available in this build and select the configured one.
pub fn build_registry(cfg: &config::DetectorSettings) -> Result<BackendRegistry> {
    let mut registry = BackendRegistry::new();
    let scripted = match &cfg.script_path {
        Some(path) => ScriptedBackend::from_path(path)?,
        None => ScriptedBackend::new(),
    };
    if scripted.is_empty() {
        log::debug!("no detection script loaded, scripted backend sees empty frames");
    } else {
        log::info!("detection script loaded: {} frames", scripted.len());
    }
    registry.register(scripted);

    #[cfg(feature = "backend-tract")]
    {
        if let Some(model_path) = &cfg.model_path {
            registry.register(detect::TractBackend::new(model_path, cfg.model_input_size)?);
        }
    }

    registry.select(&cfg.backend)?;
    Ok(registry)
}

/// Wire a server from configuration around an existing session.
pub fn build_server(cfg: &GuideConfig, session: SharedSession) -> Result<GuidanceServer> {
    let registry = build_registry(&cfg.detector)?;
    let backend = registry.activate()?;
    log::info!(
        "detector backend {} ready (available: {})",
        registry.selected().unwrap_or("none"),
        registry.names().join(", ")
    );
    let adapter = DetectionAdapter::new(
        backend,
        cfg.detector.detect_params(),
        cfg.detector.image_max_wh,
    );
    let pipeline = FramePipeline::new(adapter, session, AssetResolver::new(cfg.assets.clone()));
    Ok(GuidanceServer::new(cfg.server.clone(), pipeline))
}
