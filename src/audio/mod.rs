pub mod analyser;
pub mod decode;
pub mod source;

pub use analyser::AnalyserSource;
pub use decode::decode_audio;
pub use source::{AudioFrameSource, SilentSource};
