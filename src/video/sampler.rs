use std::path::Path;

use rand::Rng;

use crate::video::black_border::BlackBorderDetector;
use crate::video::error::SampleError;
use crate::video::frame::Frame;
use crate::video::source::{FfmpegVideoSource, VideoSource};

/// Rule for choosing which single frame of a video becomes the preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplingPolicy {
    /// First frame with visible content, scanning forward from frame 0.
    FirstFrame,
    /// The final frame of the stream.
    LastFrame,
    /// A uniformly random frame.
    RandomFrame,
    /// Sequential scan for content, used when files are dropped onto the window.
    FirstNonBlackFrame,
}

/// One decoded preview frame plus how it was obtained.
#[derive(Debug, Clone)]
pub struct SampledFrame {
    pub frame: Frame,
    pub frame_index: u64,
    /// Set when a content scan found nothing and fell back to the last frame
    /// decoded. The preview still shows something; callers may want to warn.
    pub all_frames_black: bool,
}

/// Decodes exactly one frame per request and releases the decoder before
/// returning, whatever the outcome.
pub struct FrameSampler {
    detector: BlackBorderDetector,
}

impl Default for FrameSampler {
    fn default() -> Self {
        Self::new(BlackBorderDetector::default())
    }
}

impl FrameSampler {
    pub fn new(detector: BlackBorderDetector) -> Self {
        Self { detector }
    }

    pub fn sample(&self, video_path: &Path, policy: SamplingPolicy) -> Result<SampledFrame, SampleError> {
        let mut source = FfmpegVideoSource::open(video_path)?;
        let result = self.sample_from(&mut source, policy);
        // source drops here, releasing the decoder regardless of outcome
        result
    }

    pub fn sample_from(
        &self,
        source: &mut dyn VideoSource,
        policy: SamplingPolicy,
    ) -> Result<SampledFrame, SampleError> {
        match policy {
            SamplingPolicy::FirstFrame | SamplingPolicy::FirstNonBlackFrame => {
                self.scan_for_content(source)
            }
            SamplingPolicy::LastFrame => {
                let count = source.frame_count();
                if count == 0 {
                    return Err(SampleError::EmptySource);
                }
                let index = count - 1;
                let frame = source.read_frame(index)?;
                Ok(SampledFrame {
                    frame,
                    frame_index: index,
                    all_frames_black: false,
                })
            }
            SamplingPolicy::RandomFrame => {
                let count = source.frame_count();
                if count == 0 {
                    return Err(SampleError::EmptySource);
                }
                let index = rand::thread_rng().gen_range(0..count);
                let frame = source.read_frame(index)?;
                Ok(SampledFrame {
                    frame,
                    frame_index: index,
                    all_frames_black: false,
                })
            }
        }
    }

    /// Decode forward from frame 0 until something non-black turns up. If the
    /// whole stream is black, the last frame decoded is returned and flagged.
    fn scan_for_content(&self, source: &mut dyn VideoSource) -> Result<SampledFrame, SampleError> {
        let mut last_black: Option<(Frame, u64)> = None;
        let mut index: u64 = 0;

        while let Some(frame) = source.next_frame()? {
            if !self.detector.is_black(&frame) {
                return Ok(SampledFrame {
                    frame,
                    frame_index: index,
                    all_frames_black: false,
                });
            }
            last_black = Some((frame, index));
            index += 1;
        }

        match last_black {
            Some((frame, frame_index)) => {
                log::warn!("All {} decoded frames were black, showing the last one", index);
                Ok(SampledFrame {
                    frame,
                    frame_index,
                    all_frames_black: true,
                })
            }
            None => Err(SampleError::EmptySource),
        }
    }
}
