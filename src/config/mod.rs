//! Configuration: `AppConfig` with one section per subsystem, `AppPaths`
//! for the platform settings location, and TOML persistence via
//! `AppConfig::load` / `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{AnalysisConfig, AppConfig, AudioConfig, WorkerConfig};
