//! Command-line argument parsing for the demo host.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug)]
#[command(name = "godrays", about = "Screen-space light shaft renderer")]
pub struct CliArgs {
    /// Render width.
    #[arg(long)]
    pub width: Option<u32>,

    /// Render height.
    #[arg(long)]
    pub height: Option<u32>,

    /// Number of samples marched per pixel.
    #[arg(long)]
    pub samples: Option<i32>,

    /// Exposure multiplier.
    #[arg(long)]
    pub exposure: Option<f32>,

    /// Bright-pass luminance threshold.
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Index of the light the shafts emanate from.
    #[arg(long)]
    pub light: Option<u32>,

    /// Output PNG path.
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Number of frames to render before writing the output.
    #[arg(long)]
    pub frames: Option<u32>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(w) = args.width {
            self.render.width = w;
        }
        if let Some(h) = args.height {
            self.render.height = h;
        }
        if let Some(samples) = args.samples {
            self.effect.sample_count = samples;
        }
        if let Some(exposure) = args.exposure {
            self.effect.exposure = exposure;
        }
        if let Some(threshold) = args.threshold {
            self.effect.threshold = threshold;
        }
        if let Some(light) = args.light {
            self.effect.light_index = light;
        }
        if let Some(ref path) = args.output {
            self.output.path = path.clone();
        }
        if let Some(frames) = args.frames {
            self.output.frames = frames;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_args() -> CliArgs {
        CliArgs {
            width: None,
            height: None,
            samples: None,
            exposure: None,
            threshold: None,
            light: None,
            output: None,
            frames: None,
            log_level: None,
            config: None,
        }
    }

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            width: Some(800),
            samples: Some(128),
            output: Some(PathBuf::from("out.png")),
            ..empty_args()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.render.width, 800);
        assert_eq!(config.effect.sample_count, 128);
        assert_eq!(config.output.path, PathBuf::from("out.png"));
        // Non-overridden fields retain defaults
        assert_eq!(config.render.height, 1080);
        assert_eq!(config.effect.exposure, 1.0);
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&empty_args());
        assert_eq!(config, original);
    }

    #[test]
    fn test_cli_parses_flags() {
        let args = CliArgs::try_parse_from([
            "godrays",
            "--samples",
            "32",
            "--exposure",
            "0.5",
            "-o",
            "shafts.png",
        ])
        .unwrap();
        assert_eq!(args.samples, Some(32));
        assert_eq!(args.exposure, Some(0.5));
        assert_eq!(args.output, Some(PathBuf::from("shafts.png")));
    }
}
