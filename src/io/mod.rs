pub mod ffmpeg_frame;
pub mod hls_in;

pub use ffmpeg_frame::FrameExtractor;
pub use hls_in::{PLAYLIST_NAME, SegmentFetcher};
