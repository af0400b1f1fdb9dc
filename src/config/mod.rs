pub mod load;
pub mod save;
pub mod types;

pub use load::SETTINGS_FILE;
pub use save::save_settings;
pub use types::{
    Config, DEFAULT_MAX_WORKERS, DEFAULT_SEGMENT_DURATION_SECS, RunConfig, UserSettings,
};
