//! The capture state machine.
//!
//! Two states: live preview and a frozen, annotated capture pending the
//! user's decision. Detection and classification run only on the
//! `capture()` transition; `accept()` is the only place detection events
//! are ever written.

use chrono::Local;
use emora_core::{Annotator, DetectorRig, FaceAnalyze, FaceReading};
use emora_hw::privacy;
use emora_hw::{CameraError, Frame};
use emora_store::{EventStore, StoreError};
use image::RgbImage;
use std::path::PathBuf;

/// Source of camera frames. Seam for tests.
pub trait FrameSource {
    fn grab(&mut self) -> Result<Frame, CameraError>;
}

impl FrameSource for emora_hw::Camera {
    fn grab(&mut self) -> Result<Frame, CameraError> {
        self.capture_frame()
    }
}

/// Destination for accepted detections. Seam for tests.
pub trait EventSink {
    fn record(&mut self, reading: &FaceReading) -> Result<i64, StoreError>;
}

impl EventSink for EventStore {
    fn record(&mut self, reading: &FaceReading) -> Result<i64, StoreError> {
        self.insert(reading.emotion.as_str(), reading.age, &reading.gender)
    }
}

/// Everything produced by one capture, held until the user decides.
pub struct CaptureResult {
    /// The frame as it came off the camera (post privacy mask).
    pub raw: Frame,
    /// Per-face classifications that succeeded.
    pub readings: Vec<FaceReading>,
    /// The frame with the review overlay drawn.
    pub annotated: RgbImage,
}

enum State {
    Live,
    Captured(Box<CaptureResult>),
}

pub struct CaptureController {
    source: Box<dyn FrameSource>,
    detectors: DetectorRig,
    analyzer: Box<dyn FaceAnalyze>,
    annotator: Annotator,
    single_person_mode: bool,
    capture_dir: PathBuf,
    state: State,
}

impl CaptureController {
    pub fn new(
        source: Box<dyn FrameSource>,
        detectors: DetectorRig,
        analyzer: Box<dyn FaceAnalyze>,
        annotator: Annotator,
        single_person_mode: bool,
        capture_dir: PathBuf,
    ) -> Self {
        Self {
            source,
            detectors,
            analyzer,
            annotator,
            single_person_mode,
            capture_dir,
            state: State::Live,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self.state, State::Live)
    }

    /// The annotated frame awaiting a decision, if any.
    pub fn annotated(&self) -> Option<&RgbImage> {
        match &self.state {
            State::Captured(result) => Some(&result.annotated),
            State::Live => None,
        }
    }

    /// Number of classified faces in the pending capture.
    pub fn pending_faces(&self) -> usize {
        match &self.state {
            State::Captured(result) => result.readings.len(),
            State::Live => 0,
        }
    }

    /// Pull one preview frame. Only meaningful while live; a miss is
    /// transient and produces nothing but a log line.
    pub fn live_frame(&mut self) -> Option<Frame> {
        if !self.is_live() {
            return None;
        }
        match self.source.grab() {
            Ok(frame) => Some(frame),
            Err(e) => {
                tracing::debug!(error = %e, "preview frame miss");
                None
            }
        }
    }

    /// LIVE → CAPTURED: freeze a frame, detect, classify, annotate.
    ///
    /// Ignored while a capture is already pending — the held result must
    /// not be lost to a double trigger. A failed acquisition keeps the
    /// machine live; a failed classification skips that face only.
    pub fn capture(&mut self) {
        if !self.is_live() {
            tracing::debug!("capture ignored: decision pending");
            return;
        }

        let mut frame = match self.source.grab() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "capture failed, staying live");
                return;
            }
        };

        if self.single_person_mode {
            privacy::apply_single_person_mask(&mut frame);
        }

        let gray = frame.grayscale();
        let faces = self.detectors.detect(&gray, frame.width, frame.height);

        let mut readings = Vec::with_capacity(faces.len());
        for face in &faces {
            match self
                .analyzer
                .analyze(&frame.data, frame.width, frame.height, face)
            {
                Ok(reading) => readings.push(reading),
                Err(e) => {
                    tracing::warn!(error = %e, ?face, "face analysis failed, skipping face");
                }
            }
        }

        let annotated = self
            .annotator
            .annotate(&frame.data, frame.width, frame.height, &readings);

        tracing::info!(
            detected = faces.len(),
            classified = readings.len(),
            "frame captured"
        );

        self.state = State::Captured(Box::new(CaptureResult {
            raw: frame,
            readings,
            annotated,
        }));
    }

    /// CAPTURED → LIVE, committing every classified face as one event.
    ///
    /// Returns the number of events written. Zero classified faces means
    /// zero writes, which is not an error; a failed write is logged and
    /// that detection is lost.
    pub fn accept(&mut self, sink: &mut dyn EventSink) -> usize {
        let State::Captured(result) = std::mem::replace(&mut self.state, State::Live) else {
            tracing::debug!("accept ignored: nothing captured");
            return 0;
        };

        let mut written = 0;
        for reading in &result.readings {
            match sink.record(reading) {
                Ok(id) => {
                    written += 1;
                    tracing::debug!(id, emotion = %reading.emotion, "detection recorded");
                }
                Err(e) => {
                    tracing::error!(error = %e, "event write failed, detection lost");
                }
            }
        }

        if !result.readings.is_empty() {
            self.save_artifact(&result.annotated);
        }

        tracing::info!(
            written,
            frame = result.raw.sequence,
            "capture accepted"
        );
        written
    }

    /// CAPTURED → LIVE, dropping the result without writing anything.
    pub fn discard(&mut self) {
        if !self.is_live() {
            tracing::info!("capture discarded");
        }
        self.state = State::Live;
    }

    /// Same as discard; the next capture is up to the user.
    pub fn retake(&mut self) {
        if !self.is_live() {
            tracing::info!("retake requested");
        }
        self.state = State::Live;
    }

    fn save_artifact(&self, annotated: &RgbImage) {
        let filename = format!("{}.png", Local::now().format("%Y%m%d_%H%M%S"));
        let path = self.capture_dir.join(filename);
        match annotated.save(&path) {
            Ok(()) => tracing::info!(path = %path.display(), "capture saved"),
            Err(e) => tracing::error!(path = %path.display(), error = %e, "failed to save capture"),
        }
    }
}
