use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use crate::video::error::SampleError;
use crate::video::ffmpeg::{ffmpeg_binary, ffprobe_binary};
use crate::video::frame::Frame;

/// Decoder-side view of an opened video.
///
/// Implementations own the decoder resource; dropping the source releases it.
/// Opened per sampling request and released as soon as one frame is read.
pub trait VideoSource {
    fn frame_count(&self) -> u64;
    fn dimensions(&self) -> (u32, u32);

    /// Seek to `index` and decode that single frame.
    fn read_frame(&mut self, index: u64) -> Result<Frame, SampleError>;

    /// Decode the next frame in stream order, or `None` at end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>, SampleError>;
}

/// Video source backed by external ffmpeg/ffprobe processes.
///
/// Metadata comes from one ffprobe call at open time. Sequential reads stream
/// raw RGB24 frames from a long-running ffmpeg child; indexed reads run a
/// one-shot ffmpeg invocation per frame.
pub struct FfmpegVideoSource {
    path: PathBuf,
    width: u32,
    height: u32,
    frame_count: u64,
    stream: Option<RawVideoStream>,
}

struct RawVideoStream {
    child: Child,
    stdout: ChildStdout,
}

impl RawVideoStream {
    fn spawn(path: &Path) -> Result<Self, SampleError> {
        let mut child = Command::new(ffmpeg_binary())
            .arg("-v").arg("error")
            .arg("-nostdin")
            .arg("-i").arg(path)
            .arg("-f").arg("rawvideo")
            .arg("-pix_fmt").arg("rgb24")
            .arg("pipe:1")
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| SampleError::DecodeFailed(format!("failed to spawn ffmpeg: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SampleError::DecodeFailed("ffmpeg stdout not captured".to_string()))?;

        Ok(Self { child, stdout })
    }

    /// Read up to `buf.len()` bytes; short only at end of stream.
    fn read_frame_bytes(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.stdout.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    fn finish(mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl FfmpegVideoSource {
    pub fn open(path: &Path) -> Result<Self, SampleError> {
        if !path.is_file() {
            return Err(SampleError::SourceUnavailable(format!(
                "{} does not exist",
                path.display()
            )));
        }

        let (width, height, frame_count) = probe(path)?;
        log::debug!(
            "Opened {} ({}x{}, {} frames)",
            path.display(),
            width,
            height,
            frame_count
        );

        Ok(Self {
            path: path.to_path_buf(),
            width,
            height,
            frame_count,
            stream: None,
        })
    }

    fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    fn frame_from_bytes(&self, bytes: Vec<u8>) -> Result<Frame, SampleError> {
        Frame::from_raw(self.width, self.height, bytes).ok_or_else(|| {
            SampleError::DecodeFailed(format!(
                "buffer does not match {}x{} rgb24 frame",
                self.width, self.height
            ))
        })
    }
}

impl VideoSource for FfmpegVideoSource {
    fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn read_frame(&mut self, index: u64) -> Result<Frame, SampleError> {
        // select decodes from stream start: frame-accurate, linear cost
        let output = Command::new(ffmpeg_binary())
            .arg("-v").arg("error")
            .arg("-nostdin")
            .arg("-i").arg(&self.path)
            .arg("-vf").arg(format!("select=eq(n\\,{})", index))
            .arg("-vsync").arg("0")
            .arg("-vframes").arg("1")
            .arg("-f").arg("rawvideo")
            .arg("-pix_fmt").arg("rgb24")
            .arg("pipe:1")
            .output()
            .map_err(|e| SampleError::DecodeFailed(format!("failed to run ffmpeg: {}", e)))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(SampleError::DecodeFailed(format!(
                "ffmpeg could not decode frame {}: {}",
                index,
                error.trim()
            )));
        }

        if output.stdout.len() != self.frame_len() {
            return Err(SampleError::DecodeFailed(format!(
                "frame {} unreadable (got {} of {} bytes)",
                index,
                output.stdout.len(),
                self.frame_len()
            )));
        }

        self.frame_from_bytes(output.stdout)
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, SampleError> {
        if self.stream.is_none() {
            self.stream = Some(RawVideoStream::spawn(&self.path)?);
        }
        let frame_len = self.frame_len();
        let stream = self.stream.as_mut().expect("stream just spawned");

        let mut buf = vec![0u8; frame_len];
        let filled = stream
            .read_frame_bytes(&mut buf)
            .map_err(|e| SampleError::DecodeFailed(format!("read from ffmpeg failed: {}", e)))?;

        if filled == 0 {
            // Clean end of stream; reap the child
            if let Some(stream) = self.stream.take() {
                stream.finish();
            }
            return Ok(None);
        }
        if filled < buf.len() {
            return Err(SampleError::DecodeFailed(format!(
                "truncated frame at end of stream ({} of {} bytes)",
                filled,
                buf.len()
            )));
        }

        self.frame_from_bytes(buf).map(Some)
    }
}

impl Drop for FfmpegVideoSource {
    fn drop(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.finish();
        }
    }
}

fn probe(path: &Path) -> Result<(u32, u32, u64), SampleError> {
    let output = Command::new(ffprobe_binary())
        .arg("-v").arg("quiet")
        .arg("-print_format").arg("json")
        .arg("-show_format")
        .arg("-show_streams")
        .arg(path)
        .output()
        .map_err(|e| SampleError::SourceUnavailable(format!("failed to run ffprobe: {}", e)))?;

    if !output.status.success() {
        return Err(SampleError::SourceUnavailable(format!(
            "ffprobe could not open {}",
            path.display()
        )));
    }

    let json_str = String::from_utf8_lossy(&output.stdout);
    let info: serde_json::Value = serde_json::from_str(&json_str)
        .map_err(|e| SampleError::SourceUnavailable(format!("unreadable ffprobe output: {}", e)))?;

    let empty_vec = vec![];
    let streams = info["streams"].as_array().unwrap_or(&empty_vec);
    let video = streams
        .iter()
        .find(|s| s["codec_type"].as_str() == Some("video"))
        .ok_or_else(|| {
            SampleError::SourceUnavailable(format!("{} has no video stream", path.display()))
        })?;

    let width = video["width"].as_u64().unwrap_or(0) as u32;
    let height = video["height"].as_u64().unwrap_or(0) as u32;
    if width == 0 || height == 0 {
        return Err(SampleError::SourceUnavailable(format!(
            "{} reports no frame dimensions",
            path.display()
        )));
    }

    Ok((width, height, frame_count_from(video, &info["format"])))
}

/// Some containers carry an exact `nb_frames`; the rest get an estimate from
/// duration and frame rate, the same figure the playback position bar uses.
fn frame_count_from(video: &serde_json::Value, format: &serde_json::Value) -> u64 {
    if let Some(count) = video["nb_frames"].as_str().and_then(|s| s.parse::<u64>().ok()) {
        return count;
    }

    let duration = video["duration"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .or_else(|| format["duration"].as_str().and_then(|s| s.parse::<f64>().ok()))
        .unwrap_or(0.0);
    let fps = parse_frame_rate(video["r_frame_rate"].as_str().unwrap_or(""));

    (duration * fps).floor() as u64
}

fn parse_frame_rate(raw: &str) -> f64 {
    match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().unwrap_or(0.0);
            let den: f64 = den.parse().unwrap_or(0.0);
            if den > 0.0 {
                num / den
            } else {
                0.0
            }
        }
        None => raw.parse().unwrap_or(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_frame_rate_fraction() {
        assert_eq!(parse_frame_rate("30/1"), 30.0);
        assert!((parse_frame_rate("30000/1001") - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("0/0"), 0.0);
        assert_eq!(parse_frame_rate(""), 0.0);
    }

    #[test]
    fn test_frame_count_prefers_nb_frames() {
        let video = json!({
            "nb_frames": "250",
            "duration": "100.0",
            "r_frame_rate": "30/1"
        });
        assert_eq!(frame_count_from(&video, &json!({})), 250);
    }

    #[test]
    fn test_frame_count_falls_back_to_duration_times_fps() {
        let video = json!({
            "duration": "10.0",
            "r_frame_rate": "25/1"
        });
        assert_eq!(frame_count_from(&video, &json!({})), 250);
    }

    #[test]
    fn test_frame_count_uses_container_duration_when_stream_lacks_one() {
        let video = json!({ "r_frame_rate": "24/1" });
        let format = json!({ "duration": "2.5" });
        assert_eq!(frame_count_from(&video, &format), 60);
    }

    #[test]
    fn test_frame_count_zero_when_nothing_known() {
        assert_eq!(frame_count_from(&json!({}), &json!({})), 0);
    }
}
