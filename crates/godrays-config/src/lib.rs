//! Configuration system for the god rays effect and its demo host.
//!
//! Settings persist to disk as RON files and can be overridden from the
//! command line via clap.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    ColorFormat, Config, DebugConfig, EffectConfig, OutputConfig, RenderConfig, default_config_dir,
};
pub use error::ConfigError;
