use std::path::PathBuf;
use std::process::Command;
use std::sync::OnceLock;
use anyhow::Result;

/// Explicitly configured ffmpeg binary, set once at startup.
static FFMPEG_OVERRIDE: OnceLock<PathBuf> = OnceLock::new();

/// Point decoding at a specific ffmpeg binary instead of the PATH lookup.
/// Must be called before any sampling runs; later calls are ignored.
pub fn set_ffmpeg_override(path: PathBuf) {
    let _ = FFMPEG_OVERRIDE.set(path);
}

pub(crate) fn ffmpeg_binary() -> PathBuf {
    FFMPEG_OVERRIDE
        .get()
        .cloned()
        .unwrap_or_else(|| PathBuf::from("ffmpeg"))
}

/// ffprobe is expected next to ffmpeg, under the conventional name.
pub(crate) fn ffprobe_binary() -> PathBuf {
    match FFMPEG_OVERRIDE.get() {
        Some(path) => {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().replace("ffmpeg", "ffprobe"))
                .unwrap_or_else(|| "ffprobe".to_string());
            path.with_file_name(name)
        }
        None => PathBuf::from("ffprobe"),
    }
}

/// Verify that ffmpeg can be spawned at all. Called once at startup so the
/// user learns about a missing binary before clicking anything.
pub fn check_ffmpeg_available() -> Result<()> {
    let binary = ffmpeg_binary();
    let output = Command::new(&binary)
        .arg("-version")
        .output()
        .map_err(|e| anyhow::anyhow!("Could not run {}: {}", binary.display(), e))?;

    if !output.status.success() {
        return Err(anyhow::anyhow!(
            "{} exited with status {}",
            binary.display(),
            output.status
        ));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let version_line = stdout.lines().next().unwrap_or("unknown version");
    log::info!("Found ffmpeg: {}", version_line);
    Ok(())
}
