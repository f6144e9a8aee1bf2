//! Session wiring — every long-lived resource is acquired here, owned
//! here, and released when the session drops.

use crate::capture::CaptureController;
use crate::config::{Config, DetectorChoice};
use anyhow::{bail, Context, Result};
use emora_core::{
    Annotator, CascadeDetector, DetectorRig, FaceAnalyzer, FaceDetect, NeuralDetector,
};
use emora_hw::Camera;
use emora_store::EventStore;
use std::time::Duration;

pub struct Session {
    pub controller: CaptureController,
    pub store: EventStore,
    /// Preview frame dimensions, as negotiated with the camera.
    pub frame_width: u32,
    pub frame_height: u32,
    pub tick: Duration,
}

impl Session {
    /// Acquire the camera, models, annotator assets and store.
    ///
    /// Camera or store unavailability is fatal here; mid-run failures are
    /// handled (and retried) by the capture controller instead.
    pub fn initialize(config: &Config) -> Result<Self> {
        if let Some(parent) = config.db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating data directory {}", parent.display()))?;
        }
        std::fs::create_dir_all(&config.capture_dir).with_context(|| {
            format!("creating capture directory {}", config.capture_dir.display())
        })?;

        let camera = Camera::open(&config.camera_device)
            .with_context(|| format!("opening camera {}", config.camera_device))?;
        camera.warm_up(config.warmup_frames);
        let (frame_width, frame_height) = (camera.width, camera.height);

        let detectors = build_detectors(config)?;
        tracing::info!(backends = ?detectors.backend_names(), "detectors ready");

        let analyzer = FaceAnalyzer::load(&config.model_dir)
            .with_context(|| format!("loading attribute models from {}", config.model_dir.display()))?;

        let annotator = Annotator::load(&config.asset_dir);

        let store = EventStore::open(&config.db_path)
            .with_context(|| format!("opening event store {}", config.db_path.display()))?;

        let controller = CaptureController::new(
            Box::new(camera),
            detectors,
            Box::new(analyzer),
            annotator,
            config.single_person_mode,
            config.capture_dir.clone(),
        );

        Ok(Self {
            controller,
            store,
            frame_width,
            frame_height,
            tick: Duration::from_millis(config.tick_ms),
        })
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Camera handle and store connection close with their owners.
        tracing::info!("session closed, camera and store released");
    }
}

fn build_detectors(config: &Config) -> Result<DetectorRig> {
    let neural_path = config.neural_model_path();
    let cascade_path = config.cascade_model_path();

    let (neural, cascade): (Option<Box<dyn FaceDetect>>, Option<Box<dyn FaceDetect>>) =
        match config.detector {
            DetectorChoice::Neural => {
                let d = NeuralDetector::load(&neural_path)?;
                (Some(Box::new(d)), None)
            }
            DetectorChoice::Cascade => {
                let d = CascadeDetector::load(&cascade_path)?;
                (None, Some(Box::new(d)))
            }
            DetectorChoice::Auto => {
                let neural: Option<Box<dyn FaceDetect>> = match NeuralDetector::load(&neural_path) {
                    Ok(d) => Some(Box::new(d)),
                    Err(e) => {
                        tracing::warn!(error = %e, "neural detector unavailable");
                        None
                    }
                };
                let cascade: Option<Box<dyn FaceDetect>> =
                    match CascadeDetector::load(&cascade_path) {
                        Ok(d) => Some(Box::new(d)),
                        Err(e) => {
                            tracing::warn!(error = %e, "cascade detector unavailable");
                            None
                        }
                    };
                if neural.is_none() && cascade.is_none() {
                    bail!(
                        "no detector backend available — place model files in {}",
                        config.model_dir.display()
                    );
                }
                (neural, cascade)
            }
        };

    Ok(DetectorRig::new(neural, cascade, config.precedence))
}
