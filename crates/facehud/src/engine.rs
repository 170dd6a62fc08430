//! The live annotation loop.
//!
//! A dedicated engine thread owns the camera stream, the analyzer, the
//! matcher, the gallery, and the overlay surface. A tokio interval task
//! delivers tick signals over a bounded channel; each tick captures a
//! frame, runs batch analysis, clears the overlay, and draws every face's
//! annotations. Capture or detection failures abandon only that tick.

use std::thread;

use facehud_core::analyzer::{AnalyzeError, Analyzer, OnnxAnalyzer};
use facehud_core::gallery::Gallery;
use facehud_core::matcher::{MatchOutcome, Matcher, NearestMatcher};
use facehud_core::types::Detection;
use facehud_hw::camera::CameraError;
use facehud_hw::{Camera, MmapStream};
use facehud_overlay::surface::{DETECTION_COLOR, LANDMARK_COLOR, MATCH_COLOR};
use facehud_overlay::{text, OverlaySurface, Viewport};
use image::RgbImage;
use tokio::sync::mpsc;

use crate::sink::SnapshotSink;

/// Vertical offset of the expression text under the face box, clear of the
/// identity label tag.
const EXPRESSION_OFFSET: f32 = 24.0;
/// Queue depth when overlapping ticks are allowed to pile up.
const TICK_QUEUE_DEPTH: usize = 8;

/// What to do when a tick fires while the previous one is still in flight.
///
/// Ticks never run concurrently; the policy only decides how many may wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OverlapPolicy {
    /// Allow at most one pending tick and discard the rest (recommended):
    /// staleness is bounded by a single period.
    Drop,
    /// Queue ticks behind the in-flight one; a slow tick's draws may land
    /// long after later ticks were scheduled.
    Queue,
}

impl std::fmt::Display for OverlapPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverlapPolicy::Drop => write!(f, "drop"),
            OverlapPolicy::Queue => write!(f, "queue"),
        }
    }
}

pub struct EngineSettings {
    pub warmup_frames: usize,
    pub overlap: OverlapPolicy,
    /// Overlay / snapshot resolution.
    pub display: (u32, u32),
    pub snapshot: Option<SnapshotSink>,
}

/// Per-tick result, used for logging and exercised directly by tests.
pub struct TickSummary {
    pub faces: usize,
    pub matches: Vec<MatchOutcome>,
}

/// Handle to the running loop: delivers tick signals and stops the engine.
pub struct EngineHandle {
    tick_tx: mpsc::Sender<()>,
    policy: OverlapPolicy,
    thread: thread::JoinHandle<()>,
}

impl EngineHandle {
    /// Deliver one tick signal according to the overlap policy.
    pub async fn tick(&self) {
        match self.policy {
            OverlapPolicy::Drop => match self.tick_tx.try_send(()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(())) => {
                    tracing::debug!("tick dropped: previous tick still in flight");
                }
                Err(mpsc::error::TrySendError::Closed(())) => {
                    tracing::warn!("tick dropped: engine is gone");
                }
            },
            OverlapPolicy::Queue => {
                if self.tick_tx.send(()).await.is_err() {
                    tracing::warn!("tick dropped: engine is gone");
                }
            }
        }
    }

    /// Stop the loop: no further ticks are delivered, the engine drains its
    /// queue and exits, and the capture device is released with it.
    pub fn stop(self) {
        let EngineHandle { tick_tx, thread, .. } = self;
        drop(tick_tx);
        if thread.join().is_err() {
            tracing::warn!("engine thread panicked during shutdown");
        }
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// Validates the capture stream and discards warmup frames before
/// returning, so capture problems surface as startup errors rather than
/// silent dead ticks.
pub fn spawn_engine(
    camera: Camera,
    mut analyzer: OnnxAnalyzer,
    matcher: NearestMatcher,
    gallery: Gallery,
    mut surface: OverlaySurface,
    settings: EngineSettings,
) -> Result<EngineHandle, CameraError> {
    {
        let mut probe = camera.start_stream()?;
        if settings.warmup_frames > 0 {
            tracing::info!(count = settings.warmup_frames, "discarding warmup frames");
            camera.warmup(&mut probe, settings.warmup_frames);
        }
    }

    let policy = settings.overlap;
    let depth = match policy {
        OverlapPolicy::Drop => 1,
        OverlapPolicy::Queue => TICK_QUEUE_DEPTH,
    };
    let (tick_tx, mut tick_rx) = mpsc::channel::<()>(depth);

    let thread = thread::Builder::new()
        .name("facehud-engine".into())
        .spawn(move || {
            let mut stream = match camera.start_stream() {
                Ok(stream) => stream,
                Err(err) => {
                    tracing::error!(error = %err, "engine could not reopen capture stream");
                    return;
                }
            };

            let viewport = Viewport::new((camera.width, camera.height), settings.display);
            tracing::info!("engine thread started");

            while tick_rx.blocking_recv().is_some() {
                run_tick(
                    &camera,
                    &mut stream,
                    &mut analyzer,
                    &matcher,
                    &gallery,
                    &mut surface,
                    &viewport,
                    settings.display,
                    settings.snapshot.as_ref(),
                );
            }

            tracing::info!("engine thread exiting");
        })
        .expect("failed to spawn engine thread");

    Ok(EngineHandle { tick_tx, policy, thread })
}

/// One tick: capture, analyze, redraw. Failures abandon this tick only.
#[allow(clippy::too_many_arguments)]
fn run_tick(
    camera: &Camera,
    stream: &mut MmapStream<'_>,
    analyzer: &mut OnnxAnalyzer,
    matcher: &NearestMatcher,
    gallery: &Gallery,
    surface: &mut OverlaySurface,
    viewport: &Viewport,
    display: (u32, u32),
    snapshot: Option<&SnapshotSink>,
) {
    let frame = match camera.capture(stream) {
        Ok(frame) => frame,
        Err(err) => {
            tracing::debug!(error = %err, "tick abandoned: capture failed");
            return;
        }
    };

    let summary = match annotate_frame(
        &frame.data,
        frame.width,
        frame.height,
        analyzer,
        matcher,
        gallery,
        surface,
        viewport,
    ) {
        Ok(summary) => summary,
        Err(err) => {
            tracing::debug!(error = %err, "tick abandoned: detection failed");
            return;
        }
    };

    tracing::debug!(
        seq = frame.sequence,
        faces = summary.faces,
        known = summary.matches.iter().filter(|m| m.is_known()).count(),
        "tick complete"
    );

    if let Some(sink) = snapshot {
        let Some(background) = RgbImage::from_raw(frame.width, frame.height, frame.data) else {
            tracing::warn!("frame buffer size mismatch; skipping snapshot");
            return;
        };
        let background = if (background.width(), background.height()) == display {
            background
        } else {
            image::imageops::resize(
                &background,
                display.0,
                display.1,
                image::imageops::FilterType::Triangle,
            )
        };
        sink.write(&surface.composite_over(&background));
    }
}

/// Analyze one frame and redraw the overlay from scratch.
///
/// The overlay is cleared only after analysis succeeds: an abandoned tick
/// leaves the previous annotations in place rather than rendering partially.
#[allow(clippy::too_many_arguments)]
pub fn annotate_frame<A, M>(
    rgb: &[u8],
    width: u32,
    height: u32,
    analyzer: &mut A,
    matcher: &M,
    gallery: &Gallery,
    surface: &mut OverlaySurface,
    viewport: &Viewport,
) -> Result<TickSummary, AnalyzeError>
where
    A: Analyzer + ?Sized,
    M: Matcher + ?Sized,
{
    let detections = analyzer.analyze_frame(rgb, width, height)?;

    surface.clear();

    let mut matches = Vec::with_capacity(detections.len());
    for detection in &detections {
        let scaled = viewport.rescale(detection);
        matches.push(render_face(&scaled, matcher, gallery, surface));
    }

    Ok(TickSummary { faces: detections.len(), matches })
}

/// Draw one face's annotations. Faces are independent: this touches only
/// the shared surface, never the other detections.
fn render_face<M: Matcher + ?Sized>(
    detection: &Detection,
    matcher: &M,
    gallery: &Gallery,
    surface: &mut OverlaySurface,
) -> MatchOutcome {
    surface.draw_box(&detection.face, DETECTION_COLOR);
    surface.draw_landmarks(&detection.landmarks, LANDMARK_COLOR);

    surface.draw_text_block(
        &[
            text::format_gender(&detection.attributes.gender),
            text::format_age(detection.attributes.age),
        ],
        detection.face.top_right(),
    );
    surface.draw_text_block(
        &[text::format_expression(&detection.attributes.expressions)],
        (detection.face.x, detection.face.bottom() + EXPRESSION_OFFSET),
    );

    let outcome = matcher.find_best(&detection.descriptor, gallery);
    surface.draw_labeled_box(&detection.face, &outcome.to_string(), MATCH_COLOR);
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use facehud_core::gallery::Gallery;
    use facehud_core::matcher::{MatchLabel, NearestMatcher};
    use facehud_core::types::{
        Descriptor, ExpressionScores, FaceAttributes, FaceBox, Gender, GenderEstimate, Landmarks,
        ReferenceFace,
    };

    /// Analyzer stub that returns a fixed set of detections for every frame.
    struct FixedAnalyzer {
        detections: Vec<Detection>,
        fail: bool,
    }

    impl Analyzer for FixedAnalyzer {
        fn analyze_reference(
            &mut self,
            _image: &image::RgbImage,
        ) -> Result<Option<ReferenceFace>, AnalyzeError> {
            Ok(None)
        }

        fn analyze_frame(
            &mut self,
            _rgb: &[u8],
            _width: u32,
            _height: u32,
        ) -> Result<Vec<Detection>, AnalyzeError> {
            if self.fail {
                return Err(AnalyzeError::BadFrame("stubbed failure".into()));
            }
            Ok(self.detections.clone())
        }
    }

    fn detection_at(x: f32, descriptor: Vec<f32>) -> Detection {
        Detection {
            face: FaceBox { x, y: 40.0, width: 60.0, height: 60.0, confidence: 0.9 },
            landmarks: Landmarks { points: vec![(x + 10.0, 50.0), (x + 40.0, 50.0)] },
            descriptor: Descriptor { values: descriptor },
            attributes: FaceAttributes {
                age: 33.0,
                gender: GenderEstimate { gender: Gender::Female, probability: 0.9 },
                expressions: ExpressionScores { scores: [0.9, 0.02, 0.02, 0.02, 0.02, 0.01, 0.01] },
            },
        }
    }

    fn gallery_with(label: &str, values: Vec<f32>) -> Gallery {
        let mut gallery = Gallery::default();
        gallery.push_descriptor(label, Descriptor { values });
        gallery
    }

    fn fixture(detections: Vec<Detection>) -> (FixedAnalyzer, OverlaySurface, Viewport) {
        (
            FixedAnalyzer { detections, fail: false },
            OverlaySurface::new(640, 480, None),
            Viewport::new((640, 480), (640, 480)),
        )
    }

    const FRAME: (&[u8], u32, u32) = (&[0u8; 0], 640, 480);

    #[test]
    fn test_zero_faces_yields_cleared_empty_overlay() {
        let (mut analyzer, mut surface, viewport) = fixture(vec![]);
        let gallery = Gallery::default();

        // Leftover drawings from a previous tick must not survive.
        surface.draw_box(
            &FaceBox { x: 5.0, y: 5.0, width: 30.0, height: 30.0, confidence: 1.0 },
            DETECTION_COLOR,
        );

        let summary = annotate_frame(
            FRAME.0,
            FRAME.1,
            FRAME.2,
            &mut analyzer,
            &NearestMatcher::default(),
            &gallery,
            &mut surface,
            &viewport,
        )
        .unwrap();

        assert_eq!(summary.faces, 0);
        assert!(summary.matches.is_empty());
        assert!(surface.is_blank());
    }

    #[test]
    fn test_two_faces_one_known_one_unknown() {
        let known = vec![0.1, 0.2, 0.3];
        let detections = vec![
            detection_at(50.0, known.clone()),
            detection_at(300.0, vec![5.0, 5.0, 5.0]),
        ];
        let (mut analyzer, mut surface, viewport) = fixture(detections);
        let gallery = gallery_with("Y", known);

        let summary = annotate_frame(
            FRAME.0,
            FRAME.1,
            FRAME.2,
            &mut analyzer,
            &NearestMatcher::default(),
            &gallery,
            &mut surface,
            &viewport,
        )
        .unwrap();

        assert_eq!(summary.faces, 2);
        assert_eq!(summary.matches[0].label, MatchLabel::Known("Y".into()));
        assert_eq!(summary.matches[1].label, MatchLabel::Unknown);
        assert!(!surface.is_blank());
    }

    #[test]
    fn test_empty_gallery_renders_all_unknown() {
        let detections = vec![detection_at(50.0, vec![0.0, 0.0])];
        let (mut analyzer, mut surface, viewport) = fixture(detections);
        let gallery = Gallery::default();

        let summary = annotate_frame(
            FRAME.0,
            FRAME.1,
            FRAME.2,
            &mut analyzer,
            &NearestMatcher::default(),
            &gallery,
            &mut surface,
            &viewport,
        )
        .unwrap();

        assert_eq!(summary.matches.len(), 1);
        assert_eq!(summary.matches[0].label, MatchLabel::Unknown);
    }

    #[test]
    fn test_failed_analysis_leaves_previous_overlay() {
        let (_, mut surface, viewport) = fixture(vec![]);
        let mut analyzer = FixedAnalyzer { detections: vec![], fail: true };
        let gallery = Gallery::default();

        surface.draw_box(
            &FaceBox { x: 5.0, y: 5.0, width: 30.0, height: 30.0, confidence: 1.0 },
            DETECTION_COLOR,
        );

        let result = annotate_frame(
            FRAME.0,
            FRAME.1,
            FRAME.2,
            &mut analyzer,
            &NearestMatcher::default(),
            &gallery,
            &mut surface,
            &viewport,
        );

        assert!(result.is_err());
        // No partial render: the previous tick's drawings are still there.
        assert!(!surface.is_blank());
    }

    #[test]
    fn test_rescaling_applies_to_drawn_geometry() {
        let detections = vec![detection_at(100.0, vec![0.0])];
        let mut analyzer = FixedAnalyzer { detections, fail: false };
        let mut surface = OverlaySurface::new(1280, 960, None);
        let viewport = Viewport::new((640, 480), (1280, 960));
        let gallery = Gallery::default();

        annotate_frame(
            FRAME.0,
            FRAME.1,
            FRAME.2,
            &mut analyzer,
            &NearestMatcher::default(),
            &gallery,
            &mut surface,
            &viewport,
        )
        .unwrap();

        // Box top-left doubles from (100, 40) to (200, 80).
        assert_ne!(surface.canvas().get_pixel(200, 80).0[3], 0);
        assert_eq!(surface.canvas().get_pixel(100, 40).0[3], 0);
    }
}
