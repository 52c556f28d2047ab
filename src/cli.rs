use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pulseviz", about = "Audio-reactive 3D visualizer rendered to video")]
pub struct Cli {
    /// Input audio file (WAV, MP3, FLAC, OGG)
    pub input: Option<PathBuf>,

    /// Output video file
    #[arg(short, long, default_value = "output.mp4")]
    pub output: PathBuf,

    /// Visualizer shown from the start, or "all" to rotate through every variant
    #[arg(short, long)]
    pub visualizer: Option<String>,

    /// Switch visualizer at a playback time, e.g. --switch "12.5=Frequency Bars" (repeatable)
    #[arg(long = "switch", value_name = "TIME=LABEL")]
    pub switches: Vec<String>,

    /// Video width in pixels
    #[arg(long, default_value_t = 1920)]
    pub width: u32,

    /// Video height in pixels
    #[arg(long, default_value_t = 1080)]
    pub height: u32,

    /// Frames per second
    #[arg(long, default_value_t = 60)]
    pub fps: u32,

    /// H.264 CRF quality (0-51, lower = better)
    #[arg(long, default_value_t = 18)]
    pub crf: u32,

    /// FFmpeg video codec
    #[arg(long, default_value = "libx264")]
    pub codec: String,

    /// FFmpeg pixel format
    #[arg(long, default_value = "yuv420p")]
    pub pix_fmt: String,

    /// Seed for particle randomness; runs with the same seed are identical
    #[arg(long)]
    pub seed: Option<u64>,

    /// Length in seconds when no input is given (silent run)
    #[arg(long)]
    pub duration: Option<f32>,

    /// Pace frames to the wall clock (preview only, requires --dry-run)
    #[arg(long)]
    pub realtime: bool,

    /// Run the animation without GPU rendering or encoding
    #[arg(long)]
    pub dry_run: bool,

    /// List available visualizers and exit
    #[arg(long)]
    pub list_visualizers: bool,

    /// TTF/OTF font used for overlays
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// Overlay the active visualizer name
    #[arg(long)]
    pub show_label: bool,

    /// Show elapsed time overlay
    #[arg(long)]
    pub show_time: bool,

    /// Config file (default: ./pulseviz.toml or the user config dir)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Checks that only make sense once config values are merged in.
    pub fn check(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 || self.fps == 0 {
            anyhow::bail!("Width, height and fps must be greater than zero");
        }
        // Encoded video has a fixed frame rate; wall-clock frame times would
        // drift against the muxed audio.
        if self.realtime && !self.dry_run {
            anyhow::bail!("--realtime is a preview mode and requires --dry-run");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_repeated_switches() {
        let cli = Cli::try_parse_from([
            "pulseviz",
            "song.mp3",
            "-v",
            "all",
            "--switch",
            "5=Waveform",
            "--switch",
            "9=Frequency Bars",
            "--seed",
            "3",
        ])
        .unwrap();

        assert_eq!(cli.input, Some(PathBuf::from("song.mp3")));
        assert_eq!(cli.visualizer.as_deref(), Some("all"));
        assert_eq!(cli.switches, ["5=Waveform", "9=Frequency Bars"]);
        assert_eq!(cli.seed, Some(3));
        assert_eq!(cli.fps, 60);
        assert!(!cli.dry_run);
    }

    #[test]
    fn realtime_is_preview_only() {
        let encode = Cli::try_parse_from(["pulseviz", "--duration", "5", "--realtime"]).unwrap();
        assert!(encode.check().is_err());

        let preview =
            Cli::try_parse_from(["pulseviz", "--duration", "5", "--realtime", "--dry-run"]).unwrap();
        assert!(preview.check().is_ok());
    }

    #[test]
    fn rejects_zero_sized_output() {
        let cli = Cli::try_parse_from(["pulseviz", "--width", "0"]).unwrap();
        assert!(cli.check().is_err());
        assert!(Cli::try_parse_from(["pulseviz"]).unwrap().check().is_ok());
    }
}
