pub mod video_splitter;

pub use video_splitter::VideoSplitter;
