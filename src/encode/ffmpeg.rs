use anyhow::{Context, Result};
use std::ffi::OsString;
use std::io::{ErrorKind, Read, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStderr, Command, Stdio};
use std::thread::{self, JoinHandle};

/// Bytes of ffmpeg diagnostics kept for error reports.
const STDERR_TAIL: usize = 64 * 1024;

#[derive(Clone, Debug)]
pub struct EncoderSettings {
    pub output: PathBuf,
    /// Muxed as AAC when present; otherwise the video is silent.
    pub audio: Option<PathBuf>,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub codec: String,
    pub pix_fmt: String,
    pub crf: u32,
}

impl EncoderSettings {
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = [
            "-hide_banner",
            "-nostats",
            "-loglevel",
            "error",
            "-y",
            "-f",
            "rawvideo",
            "-pixel_format",
            "rgba",
            "-video_size",
        ]
        .iter()
        .map(OsString::from)
        .collect();
        args.push(format!("{}x{}", self.width, self.height).into());
        args.push("-framerate".into());
        args.push(self.fps.to_string().into());
        args.push("-i".into());
        args.push("pipe:0".into());

        if let Some(audio) = &self.audio {
            args.push("-i".into());
            args.push(audio.as_os_str().to_owned());
        }

        args.push("-c:v".into());
        args.push(self.codec.as_str().into());
        args.push("-pix_fmt".into());
        args.push(self.pix_fmt.as_str().into());
        args.push("-crf".into());
        args.push(self.crf.to_string().into());
        args.push("-preset".into());
        args.push("medium".into());

        if self.audio.is_some() {
            for arg in ["-c:a", "aac", "-b:a", "192k", "-shortest"] {
                args.push(arg.into());
            }
        }

        args.push(self.output.as_os_str().to_owned());
        args
    }
}

/// ffmpeg child process fed raw RGBA frames on stdin.
///
/// stderr is read on a separate thread for the whole run. A full stderr
/// pipe would otherwise stall ffmpeg, and with it every `write_frame`.
pub struct FfmpegEncoder {
    child: Child,
    frame_bytes: usize,
    stderr: Option<JoinHandle<Vec<u8>>>,
}

impl FfmpegEncoder {
    pub fn new(settings: &EncoderSettings) -> Result<Self> {
        let encoder = Self::spawn(
            Command::new("ffmpeg").args(settings.args()),
            (settings.width * settings.height * 4) as usize,
        )
        .context("Failed to spawn ffmpeg. Is ffmpeg installed?")?;

        log::info!(
            "FFmpeg encoder started: {}x{} @ {}fps, codec={} -> {}",
            settings.width,
            settings.height,
            settings.fps,
            settings.codec,
            settings.output.display()
        );

        Ok(encoder)
    }

    fn spawn(command: &mut Command, frame_bytes: usize) -> Result<Self> {
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;
        let stderr = child.stderr.take().map(drain_stderr);

        Ok(Self {
            child,
            frame_bytes,
            stderr,
        })
    }

    pub fn write_frame(&mut self, rgba_pixels: &[u8]) -> Result<()> {
        if rgba_pixels.len() != self.frame_bytes {
            anyhow::bail!(
                "Frame is {} bytes, encoder expects {}",
                rgba_pixels.len(),
                self.frame_bytes
            );
        }
        let stdin = self.child.stdin.as_mut().context("FFmpeg stdin not available")?;
        stdin
            .write_all(rgba_pixels)
            .context("Failed to write frame to ffmpeg")?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        // EOF on stdin ends the stream.
        drop(self.child.stdin.take());

        let status = self.child.wait().context("Failed to wait for ffmpeg")?;
        let stderr = self
            .stderr
            .take()
            .and_then(|reader| reader.join().ok())
            .unwrap_or_default();
        if !status.success() {
            anyhow::bail!(
                "FFmpeg exited with {}:\n{}",
                status,
                String::from_utf8_lossy(&stderr).trim_end()
            );
        }

        log::info!("FFmpeg encoding complete");
        Ok(())
    }
}

/// Read `stderr` until EOF, keeping the last `STDERR_TAIL` bytes.
fn drain_stderr(mut stderr: ChildStderr) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut tail = Vec::new();
        let mut chunk = [0u8; 8192];
        loop {
            match stderr.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    tail.extend_from_slice(&chunk[..n]);
                    if tail.len() > STDERR_TAIL {
                        tail.drain(..tail.len() - STDERR_TAIL);
                    }
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
        tail
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(audio: Option<&str>) -> EncoderSettings {
        EncoderSettings {
            output: PathBuf::from("out.mp4"),
            audio: audio.map(PathBuf::from),
            width: 640,
            height: 360,
            fps: 60,
            codec: "libx264".into(),
            pix_fmt: "yuv420p".into(),
            crf: 18,
        }
    }

    fn strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn muxes_input_audio() {
        let args = strings(settings(Some("song.mp3")).args());
        let inputs: Vec<&String> = args
            .iter()
            .zip(args.iter().skip(1))
            .filter(|(flag, _)| *flag == "-i")
            .map(|(_, value)| value)
            .collect();
        assert_eq!(inputs, ["pipe:0", "song.mp3"]);
        assert!(args.contains(&"-shortest".to_string()));
        assert!(args.contains(&"640x360".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("out.mp4"));
    }

    #[test]
    fn silent_output_has_no_audio_stream() {
        let args = strings(settings(None).args());
        assert_eq!(args.iter().filter(|a| *a == "-i").count(), 1);
        assert!(!args.contains(&"-c:a".to_string()));
        assert!(!args.contains(&"-shortest".to_string()));
    }

    #[test]
    fn progress_output_is_silenced() {
        let args = strings(settings(None).args());
        assert!(args.contains(&"-nostats".to_string()));
        let level = args.iter().position(|a| a == "-loglevel").unwrap();
        assert_eq!(args[level + 1], "error");
    }

    #[cfg(unix)]
    fn stand_in(script: &str, frame_bytes: usize) -> FfmpegEncoder {
        FfmpegEncoder::spawn(Command::new("sh").arg("-c").arg(script), frame_bytes).unwrap()
    }

    #[cfg(unix)]
    #[test]
    fn chatty_encoder_does_not_stall_frame_writes() {
        // Floods stderr well past the pipe capacity before reading any input.
        let mut encoder = stand_in("yes progress | head -c 1000000 >&2; cat >/dev/null", 32 * 32 * 4);
        let frame = vec![0u8; 32 * 32 * 4];
        for _ in 0..64 {
            encoder.write_frame(&frame).unwrap();
        }
        encoder.finish().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn failed_encode_reports_stderr_tail() {
        let mut encoder = stand_in("cat >/dev/null; echo 'boom: bad codec' >&2; exit 1", 16);
        encoder.write_frame(&[0u8; 16]).unwrap();
        let err = encoder.finish().unwrap_err().to_string();
        assert!(err.contains("boom: bad codec"), "{}", err);
    }

    #[cfg(unix)]
    #[test]
    fn rejects_mismatched_frame_size() {
        let mut encoder = stand_in("cat >/dev/null", 16);
        assert!(encoder.write_frame(&[0u8; 15]).is_err());
        encoder.finish().unwrap();
    }
}
