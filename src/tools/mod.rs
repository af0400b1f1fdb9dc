mod ffmpeg_command;
mod ffprobe_info;
mod path_validator;
mod process_runner;
mod tool_paths;

pub use ffmpeg_command::{
    CutRequest, FfmpegEncoder, FillerSpec, MediaEncoder, SilentAudio, build_cut_args,
    build_pad_args,
};
pub use ffprobe_info::{FfprobeProber, FrameInfo, MediaProber, VideoMetadata};
pub use path_validator::{ensure_directory_exists, has_content, validate_file_exists};
pub use process_runner::{RunLimits, ToolOutput, run_tool};
pub use tool_paths::ToolPaths;
