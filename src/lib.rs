pub mod analyzer;
pub mod camelot;
pub mod catalog;
pub mod config;
pub mod db;
pub mod export;
pub mod key;
pub mod mood;
pub mod recommend;

pub use camelot::{camelot_distance, to_camelot, CamelotCode};
pub use catalog::{Analysis, Catalog, SharedCatalog, SongFingerprint};
pub use key::{estimate_key, Key, Mode, PitchClass};
pub use mood::{classify_mood, Mood};
pub use recommend::{recommend, Recommendation};

/// Application name for XDG paths
pub const APP_NAME: &str = "mixbuddy";
