use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

use lru::LruCache;

use crate::video::black_border::BlackBorderDetector;
use crate::video::error::SampleError;
use crate::video::frame::{crop_frame, scale_to_fit, Frame, RotationState};
use crate::video::sampler::{FrameSampler, SampledFrame, SamplingPolicy};

// Decoded frames are full-resolution; keep the reuse cache small.
const FRAME_CACHE_CAPACITY: usize = 8;

/// Where the pipeline currently is for the one in-flight preview request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewStage {
    Idle,
    Sampling,
    Transforming,
}

/// Outcome of one completed sampling operation, drained via [`PreviewPipeline::poll`].
#[derive(Debug)]
pub enum PreviewEvent {
    /// A new frame was installed; re-render the preview image.
    Updated {
        video_path: PathBuf,
        frame_index: u64,
        /// The content scan found nothing and fell back to the last frame.
        all_frames_black: bool,
    },
    /// Sampling failed; any previous preview stays up.
    Failed {
        video_path: PathBuf,
        error: SampleError,
    },
}

struct SampleCompletion {
    video_path: PathBuf,
    policy: SamplingPolicy,
    result: Result<SampledFrame, SampleError>,
}

/// Drives one preview at a time: Idle -> Sampling (worker thread) ->
/// Transforming (crop, rotate, scale) -> Idle.
///
/// Sampling runs on a short-lived thread per request and reports back over a
/// channel consumed on the interactive thread. The in-flight flag is claimed
/// atomically before a thread is spawned and released only when the
/// completion is consumed, so overlapping requests are rejected (not queued)
/// and a completion is always delivered before the next operation can start.
pub struct PreviewPipeline {
    detector: BlackBorderDetector,
    rotation: RotationState,
    remove_black_borders: bool,
    /// Frame as decoded, before any cropping.
    decoded: Option<Frame>,
    /// Decoded frame with border removal applied; what rotate/scale feed on.
    base_frame: Option<Frame>,
    stage: PreviewStage,
    in_flight: Arc<AtomicBool>,
    completion_tx: mpsc::Sender<SampleCompletion>,
    completion_rx: mpsc::Receiver<SampleCompletion>,
    frame_cache: LruCache<String, SampledFrame>,
}

impl PreviewPipeline {
    pub fn new(remove_black_borders: bool) -> Self {
        let (completion_tx, completion_rx) = mpsc::channel();
        Self {
            detector: BlackBorderDetector::default(),
            rotation: RotationState::default(),
            remove_black_borders,
            decoded: None,
            base_frame: None,
            stage: PreviewStage::Idle,
            in_flight: Arc::new(AtomicBool::new(false)),
            completion_tx,
            completion_rx,
            frame_cache: LruCache::new(NonZeroUsize::new(FRAME_CACHE_CAPACITY).unwrap()),
        }
    }

    pub fn stage(&self) -> PreviewStage {
        self.stage
    }

    pub fn is_sampling(&self) -> bool {
        self.stage == PreviewStage::Sampling
    }

    pub fn has_frame(&self) -> bool {
        self.base_frame.is_some()
    }

    pub fn rotation_degrees(&self) -> u16 {
        self.rotation.degrees()
    }

    /// Start sampling `video_path`. Returns false when another sampling
    /// operation is still in flight; the request is dropped, not queued.
    pub fn request_preview(&mut self, video_path: &Path, policy: SamplingPolicy) -> bool {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log::debug!(
                "Rejected preview request for {}: sampling already in flight",
                video_path.display()
            );
            return false;
        }
        self.stage = PreviewStage::Sampling;

        // Cache hits flow through the same completion channel as worker
        // results, so the ordering rules hold on both paths. Random previews
        // bypass the cache so every click lands somewhere new.
        if policy != SamplingPolicy::RandomFrame {
            if let Some(cached) = self.frame_cache.get(&cache_key(video_path, policy)) {
                log::debug!("Preview cache hit for {}", video_path.display());
                let _ = self.completion_tx.send(SampleCompletion {
                    video_path: video_path.to_path_buf(),
                    policy,
                    result: Ok(cached.clone()),
                });
                return true;
            }
        }

        let sender = self.completion_tx.clone();
        let detector = self.detector;
        let path = video_path.to_path_buf();
        thread::spawn(move || {
            let result = FrameSampler::new(detector).sample(&path, policy);
            let _ = sender.send(SampleCompletion {
                video_path: path,
                policy,
                result,
            });
        });
        true
    }

    /// Drain one completed sampling operation, if any. Call from the
    /// interactive thread every frame.
    pub fn poll(&mut self) -> Option<PreviewEvent> {
        let completion = self.completion_rx.try_recv().ok()?;
        self.in_flight.store(false, Ordering::SeqCst);

        match completion.result {
            Ok(sampled) => {
                if completion.policy != SamplingPolicy::RandomFrame {
                    self.frame_cache
                        .put(cache_key(&completion.video_path, completion.policy), sampled.clone());
                }

                self.stage = PreviewStage::Transforming;
                self.decoded = Some(sampled.frame);
                self.rebuild_base_frame();
                // A replaced preview starts unrotated
                self.rotation.reset();
                self.stage = PreviewStage::Idle;

                log::debug!(
                    "Showing frame {} of {}",
                    sampled.frame_index,
                    completion.video_path.display()
                );
                Some(PreviewEvent::Updated {
                    video_path: completion.video_path,
                    frame_index: sampled.frame_index,
                    all_frames_black: sampled.all_frames_black,
                })
            }
            Err(error) => {
                self.stage = PreviewStage::Idle;
                log::warn!(
                    "Preview sampling failed for {}: {}",
                    completion.video_path.display(),
                    error
                );
                Some(PreviewEvent::Failed {
                    video_path: completion.video_path,
                    error,
                })
            }
        }
    }

    /// Toggle border removal and re-derive the displayed frame from the
    /// retained decode; no resampling needed.
    pub fn set_remove_black_borders(&mut self, enabled: bool) {
        if self.remove_black_borders == enabled {
            return;
        }
        self.remove_black_borders = enabled;
        if self.decoded.is_some() {
            self.stage = PreviewStage::Transforming;
            self.rebuild_base_frame();
            self.stage = PreviewStage::Idle;
        }
    }

    pub fn rotate_clockwise(&mut self) -> bool {
        if self.base_frame.is_none() {
            return false;
        }
        self.rotation.rotate_clockwise();
        log::debug!("Rotated preview clockwise, now at {}°", self.rotation.degrees());
        true
    }

    pub fn rotate_counterclockwise(&mut self) -> bool {
        if self.base_frame.is_none() {
            return false;
        }
        self.rotation.rotate_counterclockwise();
        log::debug!("Rotated preview counterclockwise, now at {}°", self.rotation.degrees());
        true
    }

    pub fn flip_upside_down(&mut self) -> bool {
        if self.base_frame.is_none() {
            return false;
        }
        self.rotation.flip_upside_down();
        log::debug!("Flipped preview, now at {}°", self.rotation.degrees());
        true
    }

    /// The display-ready frame: rotation and scale-to-fit recomputed from the
    /// base frame on every call, a pure function of (frame, angle, viewport).
    pub fn composed(&self, max_width: u32, max_height: u32) -> Option<Frame> {
        let base = self.base_frame.as_ref()?;
        let rotated = self.rotation.apply(base);
        Some(scale_to_fit(&rotated, max_width, max_height))
    }

    fn rebuild_base_frame(&mut self) {
        self.base_frame = self.decoded.as_ref().map(|frame| {
            if self.remove_black_borders {
                let bounds = self.detector.find_content_bounds(frame);
                if bounds.is_full_frame(frame.width(), frame.height()) {
                    frame.clone()
                } else {
                    crop_frame(frame, bounds)
                }
            } else {
                frame.clone()
            }
        });
    }
}

fn cache_key(video_path: &Path, policy: SamplingPolicy) -> String {
    format!("{}|{:?}", video_path.display(), policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    const MISSING: &str = "/definitely/not/a/real/video.mp4";

    fn bordered_frame() -> Frame {
        // 100x100 black frame with content in (10,10)-(90,90)
        let mut frame = Frame::from_pixel(100, 100, image::Rgb([0, 0, 0]));
        for y in 10..90 {
            for x in 10..90 {
                frame.put_pixel(x, y, image::Rgb([200, 200, 200]));
            }
        }
        frame
    }

    fn push_completion(pipeline: &mut PreviewPipeline, path: &str, frame: Frame, all_black: bool) {
        pipeline.in_flight.store(true, Ordering::SeqCst);
        pipeline.stage = PreviewStage::Sampling;
        pipeline
            .completion_tx
            .send(SampleCompletion {
                video_path: PathBuf::from(path),
                policy: SamplingPolicy::FirstFrame,
                result: Ok(SampledFrame {
                    frame,
                    frame_index: 0,
                    all_frames_black: all_black,
                }),
            })
            .expect("completion channel should be open");
    }

    fn poll_until_event(pipeline: &mut PreviewPipeline) -> PreviewEvent {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(event) = pipeline.poll() {
                return event;
            }
            assert!(Instant::now() < deadline, "timed out waiting for completion");
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn test_overlapping_requests_are_rejected_not_queued() {
        let mut pipeline = PreviewPipeline::new(false);

        assert!(pipeline.request_preview(Path::new(MISSING), SamplingPolicy::FirstFrame));
        assert!(pipeline.is_sampling());
        // The flag only clears when the completion is consumed, so this is
        // deterministic no matter how fast the worker finishes.
        assert!(!pipeline.request_preview(Path::new(MISSING), SamplingPolicy::FirstFrame));

        let event = poll_until_event(&mut pipeline);
        assert!(matches!(
            event,
            PreviewEvent::Failed {
                error: SampleError::SourceUnavailable(_),
                ..
            }
        ));
        assert_eq!(pipeline.stage(), PreviewStage::Idle);

        // Consuming the completion re-enables requests
        assert!(pipeline.request_preview(Path::new(MISSING), SamplingPolicy::FirstFrame));
        let _ = poll_until_event(&mut pipeline);
    }

    #[test]
    fn test_failure_keeps_previous_frame() {
        let mut pipeline = PreviewPipeline::new(false);
        push_completion(&mut pipeline, "a.mp4", bordered_frame(), false);
        let _ = poll_until_event(&mut pipeline);
        assert!(pipeline.has_frame());

        assert!(pipeline.request_preview(Path::new(MISSING), SamplingPolicy::FirstFrame));
        let event = poll_until_event(&mut pipeline);
        assert!(matches!(event, PreviewEvent::Failed { .. }));
        assert!(pipeline.has_frame());
    }

    #[test]
    fn test_completion_installs_frame_and_resets_rotation() {
        let mut pipeline = PreviewPipeline::new(false);
        push_completion(&mut pipeline, "a.mp4", bordered_frame(), false);
        let _ = poll_until_event(&mut pipeline);
        assert!(pipeline.rotate_clockwise());
        assert_eq!(pipeline.rotation_degrees(), 90);

        push_completion(&mut pipeline, "b.mp4", bordered_frame(), false);
        let event = poll_until_event(&mut pipeline);
        assert!(matches!(event, PreviewEvent::Updated { .. }));
        assert_eq!(pipeline.rotation_degrees(), 0);
        assert_eq!(pipeline.stage(), PreviewStage::Idle);
    }

    #[test]
    fn test_all_frames_black_flag_flows_through_event() {
        let mut pipeline = PreviewPipeline::new(false);
        push_completion(&mut pipeline, "black.mp4", bordered_frame(), true);
        let event = poll_until_event(&mut pipeline);
        match event {
            PreviewEvent::Updated { all_frames_black, .. } => assert!(all_frames_black),
            other => panic!("expected Updated, got {:?}", other),
        }
    }

    #[test]
    fn test_border_removal_crops_and_toggles_without_resampling() {
        let mut pipeline = PreviewPipeline::new(true);
        push_completion(&mut pipeline, "a.mp4", bordered_frame(), false);
        let _ = poll_until_event(&mut pipeline);

        let composed = pipeline.composed(1000, 1000).expect("frame installed");
        assert_eq!(composed.dimensions(), (1000, 1000)); // 80x80 content scaled up square

        pipeline.set_remove_black_borders(false);
        let composed = pipeline.composed(100, 100).expect("frame installed");
        assert_eq!(composed.dimensions(), (100, 100));

        pipeline.set_remove_black_borders(true);
        let composed = pipeline.composed(80, 80).expect("frame installed");
        assert_eq!(composed.dimensions(), (80, 80));
    }

    #[test]
    fn test_composed_applies_rotation_and_fits_viewport() {
        let mut pipeline = PreviewPipeline::new(false);
        let frame = Frame::from_pixel(40, 20, image::Rgb([128, 128, 128]));
        push_completion(&mut pipeline, "a.mp4", frame, false);
        let _ = poll_until_event(&mut pipeline);

        let composed = pipeline.composed(40, 40).expect("frame installed");
        assert_eq!(composed.dimensions(), (40, 20));

        assert!(pipeline.rotate_clockwise());
        let composed = pipeline.composed(40, 40).expect("frame installed");
        assert_eq!(composed.dimensions(), (20, 40));
    }

    #[test]
    fn test_rotate_without_frame_is_rejected() {
        let mut pipeline = PreviewPipeline::new(false);
        assert!(!pipeline.rotate_clockwise());
        assert!(!pipeline.rotate_counterclockwise());
        assert!(!pipeline.flip_upside_down());
        assert_eq!(pipeline.rotation_degrees(), 0);
    }

    #[test]
    fn test_cache_hit_completes_without_worker() {
        let mut pipeline = PreviewPipeline::new(false);
        push_completion(&mut pipeline, "a.mp4", bordered_frame(), false);
        let _ = poll_until_event(&mut pipeline);

        // Second request for the same path+policy is served from the cache:
        // the completion is already queued before request_preview returns.
        assert!(pipeline.request_preview(Path::new("a.mp4"), SamplingPolicy::FirstFrame));
        let event = pipeline.poll().expect("cached completion should be queued");
        assert!(matches!(event, PreviewEvent::Updated { .. }));
    }
}
