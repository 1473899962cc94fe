//! Command-line flags, the optional settings file, and the merged runtime
//! configuration.
//!
//! Precedence is flag > settings file > built-in default.

pub mod paths;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::activity::ClassifierConfig;
use crate::amp::denon::normalize_addr;
use crate::audio::Backend;
use crate::error::ConfigError;

const DEFAULT_SAMPLE_RATE: u32 = 8 << 10;
const DEFAULT_WINDOW_SECS: u32 = 1;
const DEFAULT_IDLE_SECS: u32 = 5 * 60;
const DEFAULT_MIN_PLAYING_SECS: u32 = 7;
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 3000;
const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 2000;

/// The sample window is allocated up front, so both factors are capped.
const MAX_SAMPLE_RATE: u32 = 192_000;
const MAX_WINDOW_SECS: u32 = 60;

#[derive(Parser, Debug, Default)]
#[command(
    name = "autoamp",
    version,
    about = "Turns Denon amps on when music plays and off after a stretch of silence"
)]
pub struct Cli {
    /// Comma-separated list of amp addresses (host or host:port)
    #[arg(long, value_delimiter = ',')]
    pub amps: Vec<String>,

    /// Capture backend [default: sox, or alsa when --alsa-device is given]
    #[arg(long, value_enum)]
    pub backend: Option<Backend>,

    /// ALSA device for arecord, e.g. plughw:CARD=Audio,DEV=0 (see arecord -L)
    #[arg(long)]
    pub alsa_device: Option<String>,

    /// Capture sample rate in Hz [default: 8192]
    #[arg(long)]
    pub sample_rate: Option<u32>,

    /// Seconds of audio per variance measurement [default: 1]
    #[arg(long)]
    pub window_secs: Option<u32>,

    /// Silence before turning amps off, e.g. 300, 90s, 5m [default: 5m]
    #[arg(long, value_parser = parse_secs)]
    pub idle: Option<u32>,

    /// Sustained music needed before turning amps on, e.g. 7, 7s [default: 7s]
    #[arg(long, value_parser = parse_secs)]
    pub min_playing: Option<u32>,

    /// Variance above which audio counts as playing [default: per backend]
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Connect and log decisions, but never send commands
    #[arg(long)]
    pub dry_run: bool,

    /// Debug-level logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Settings file [default: <config dir>/autoamp/settings.json]
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Also write daily-rotated log files into this directory
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Amp connect timeout in milliseconds [default: 3000]
    #[arg(long)]
    pub connect_timeout_ms: Option<u64>,

    /// Per-command timeout in milliseconds [default: 2000]
    #[arg(long)]
    pub command_timeout_ms: Option<u64>,
}

/// settings.json shape. Every key is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub amps: Option<Vec<String>>,
    #[serde(default)]
    pub backend: Option<Backend>,
    #[serde(default)]
    pub alsa_device: Option<String>,
    #[serde(default)]
    pub sample_rate: Option<u32>,
    #[serde(default)]
    pub window_secs: Option<u32>,
    #[serde(default)]
    pub idle_secs: Option<u32>,
    #[serde(default)]
    pub min_playing_secs: Option<u32>,
    #[serde(default)]
    pub variance_threshold: Option<f64>,
    #[serde(default)]
    pub dry_run: Option<bool>,
    #[serde(default)]
    pub verbose: Option<bool>,
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    #[serde(default)]
    pub connect_timeout_ms: Option<u64>,
    #[serde(default)]
    pub command_timeout_ms: Option<u64>,
}

/// Validated runtime configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub amps: Vec<String>,
    pub backend: Backend,
    pub alsa_device: Option<String>,
    pub sample_rate: u32,
    pub window_secs: u32,
    pub idle_secs: u32,
    pub min_playing_secs: u32,
    pub variance_threshold: f64,
    pub dry_run: bool,
    pub verbose: bool,
    pub log_dir: Option<PathBuf>,
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
}

impl Config {
    /// Read the settings file named by `cli` (or the default one) and merge.
    pub fn load(cli: Cli) -> anyhow::Result<Self> {
        let settings = match &cli.config {
            Some(path) => read_settings(path)?,
            None => {
                let path = paths::get_settings_path();
                if path.exists() {
                    read_settings(&path)?
                } else {
                    Settings::default()
                }
            }
        };
        Ok(Self::merge(cli, settings)?)
    }

    pub fn merge(cli: Cli, settings: Settings) -> Result<Self, ConfigError> {
        let alsa_device = cli.alsa_device.or(settings.alsa_device);
        let backend = cli
            .backend
            .or(settings.backend)
            .unwrap_or(if alsa_device.is_some() {
                Backend::Alsa
            } else {
                Backend::Sox
            });

        let raw_amps = if cli.amps.is_empty() {
            settings.amps.unwrap_or_default()
        } else {
            cli.amps
        };
        let mut amps: Vec<String> = Vec::new();
        for raw in raw_amps {
            let addr = normalize_addr(&raw).ok_or(ConfigError::BadAddress(raw))?;
            if !amps.contains(&addr) {
                amps.push(addr);
            }
        }
        if amps.is_empty() {
            return Err(ConfigError::NoAmps);
        }

        let variance_threshold = cli
            .threshold
            .or(settings.variance_threshold)
            .unwrap_or_else(|| backend.default_threshold());
        if !variance_threshold.is_finite() || variance_threshold < 0.0 {
            return Err(ConfigError::BadThreshold(variance_threshold.to_string()));
        }

        let config = Self {
            amps,
            backend,
            alsa_device,
            sample_rate: cli
                .sample_rate
                .or(settings.sample_rate)
                .unwrap_or(DEFAULT_SAMPLE_RATE),
            window_secs: cli
                .window_secs
                .or(settings.window_secs)
                .unwrap_or(DEFAULT_WINDOW_SECS),
            idle_secs: cli.idle.or(settings.idle_secs).unwrap_or(DEFAULT_IDLE_SECS),
            min_playing_secs: cli
                .min_playing
                .or(settings.min_playing_secs)
                .unwrap_or(DEFAULT_MIN_PLAYING_SECS),
            variance_threshold,
            dry_run: cli.dry_run || settings.dry_run.unwrap_or(false),
            verbose: cli.verbose || settings.verbose.unwrap_or(false),
            log_dir: cli.log_dir.or(settings.log_dir),
            connect_timeout: Duration::from_millis(
                cli.connect_timeout_ms
                    .or(settings.connect_timeout_ms)
                    .unwrap_or(DEFAULT_CONNECT_TIMEOUT_MS),
            ),
            command_timeout: Duration::from_millis(
                cli.command_timeout_ms
                    .or(settings.command_timeout_ms)
                    .unwrap_or(DEFAULT_COMMAND_TIMEOUT_MS),
            ),
        };
        config.check_bounds()?;
        Ok(config)
    }

    fn check_bounds(&self) -> Result<(), ConfigError> {
        let fields = [
            ("sample rate", u64::from(self.sample_rate)),
            ("window seconds", u64::from(self.window_secs)),
            ("idle duration", u64::from(self.idle_secs)),
            ("minimum playing duration", u64::from(self.min_playing_secs)),
            ("connect timeout", self.connect_timeout.as_millis() as u64),
            ("command timeout", self.command_timeout.as_millis() as u64),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, v)| *v == 0) {
            return Err(ConfigError::NotPositive { name: *name });
        }

        let limits = [
            ("sample rate", self.sample_rate, MAX_SAMPLE_RATE),
            ("window seconds", self.window_secs, MAX_WINDOW_SECS),
        ];
        match limits.iter().find(|(_, v, max)| v > max) {
            Some((name, _, max)) => Err(ConfigError::TooLarge {
                name: *name,
                max: u64::from(*max),
            }),
            None => Ok(()),
        }
    }

    /// Samples per variance measurement.
    pub fn window_samples(&self) -> usize {
        self.sample_rate as usize * self.window_secs as usize
    }

    /// Classifier thresholds, converted from seconds to measurement ticks.
    pub fn classifier(&self) -> ClassifierConfig {
        ClassifierConfig {
            variance_threshold: self.variance_threshold,
            playing_ticks: self.min_playing_secs.div_ceil(self.window_secs),
            idle_ticks: self.idle_secs.div_ceil(self.window_secs),
        }
    }
}

fn read_settings(path: &Path) -> anyhow::Result<Settings> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))
}

/// Parse a duration in whole seconds: `300`, `90s`, `5m` or `1h`.
pub fn parse_secs(value: &str) -> Result<u32, String> {
    let value = value.trim();
    let (digits, scale) = match value.char_indices().last() {
        Some((i, 's')) => (&value[..i], 1),
        Some((i, 'm')) => (&value[..i], 60),
        Some((i, 'h')) => (&value[..i], 3600),
        _ => (value, 1),
    };
    digits
        .parse::<u32>()
        .ok()
        .and_then(|n| n.checked_mul(scale))
        .ok_or_else(|| format!("invalid duration {value:?} (expected e.g. 300, 90s, 5m, 1h)"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("autoamp").chain(args.iter().copied()))
    }

    #[test]
    fn test_defaults() {
        let config = Config::merge(cli(&["--amps", "10.0.0.2"]), Settings::default()).unwrap();
        assert_eq!(config.amps, vec!["10.0.0.2:23"]);
        assert_eq!(config.backend, Backend::Sox);
        assert_eq!(config.sample_rate, 8192);
        assert_eq!(config.window_samples(), 8192);
        assert_eq!(config.idle_secs, 300);
        assert_eq!(config.min_playing_secs, 7);
        assert_eq!(config.variance_threshold, 1000.0);
        assert!(!config.dry_run);
    }

    #[test]
    fn test_no_amps_is_fatal() {
        let err = Config::merge(cli(&[]), Settings::default()).unwrap_err();
        assert_eq!(err, ConfigError::NoAmps);
    }

    #[test]
    fn test_bad_address_rejected() {
        let err = Config::merge(cli(&["--amps", "a:23,b:notaport"]), Settings::default())
            .unwrap_err();
        assert_eq!(err, ConfigError::BadAddress("b:notaport".into()));
    }

    #[test]
    fn test_duplicate_amps_collapse() {
        let config =
            Config::merge(cli(&["--amps", "a,a:23,b:2323"]), Settings::default()).unwrap();
        assert_eq!(config.amps, vec!["a:23", "b:2323"]);
    }

    #[test]
    fn test_alsa_device_selects_alsa_threshold() {
        let config = Config::merge(
            cli(&["--amps", "a", "--alsa-device", "plughw:0"]),
            Settings::default(),
        )
        .unwrap();
        assert_eq!(config.backend, Backend::Alsa);
        assert_eq!(config.variance_threshold, Backend::Alsa.default_threshold());

        let config = Config::merge(
            cli(&["--amps", "a", "--alsa-device", "plughw:0", "--threshold", "42"]),
            Settings::default(),
        )
        .unwrap();
        assert_eq!(config.variance_threshold, 42.0);
    }

    #[test]
    fn test_flags_override_settings() {
        let settings: Settings = serde_json::from_str(
            r#"{"amps": ["den1", "den2"], "idleSecs": 600, "minPlayingSecs": 3,
                "backend": "alsa", "dryRun": true}"#,
        )
        .unwrap();
        let config = Config::merge(cli(&["--idle", "2m"]), settings).unwrap();
        assert_eq!(config.amps, vec!["den1:23", "den2:23"]);
        assert_eq!(config.idle_secs, 120);
        assert_eq!(config.min_playing_secs, 3);
        assert_eq!(config.backend, Backend::Alsa);
        assert!(config.dry_run);
    }

    #[test]
    fn test_zero_and_negative_values_rejected() {
        let err = Config::merge(cli(&["--amps", "a", "--idle", "0"]), Settings::default())
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::NotPositive {
                name: "idle duration"
            }
        );

        let err = Config::merge(
            cli(&["--amps", "a", "--threshold=-1"]),
            Settings::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::BadThreshold(_)));
    }

    #[test]
    fn test_oversized_window_rejected() {
        let err = Config::merge(
            cli(&[
                "--amps",
                "a",
                "--sample-rate",
                "4294967295",
                "--window-secs",
                "4294967295",
            ]),
            Settings::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::TooLarge {
                name: "sample rate",
                max: 192_000
            }
        );

        let settings: Settings = serde_json::from_str(r#"{"windowSecs": 61}"#).unwrap();
        let err = Config::merge(cli(&["--amps", "a"]), settings).unwrap_err();
        assert_eq!(
            err,
            ConfigError::TooLarge {
                name: "window seconds",
                max: 60
            }
        );

        let config = Config::merge(
            cli(&["--amps", "a", "--sample-rate", "192000", "--window-secs", "60"]),
            Settings::default(),
        )
        .unwrap();
        assert_eq!(config.window_samples(), 192_000 * 60);
    }

    #[test]
    fn test_classifier_ticks_follow_window() {
        let config = Config::merge(
            cli(&["--amps", "a", "--window-secs", "2", "--min-playing", "7", "--idle", "5m"]),
            Settings::default(),
        )
        .unwrap();
        let c = config.classifier();
        assert_eq!(c.playing_ticks, 4);
        assert_eq!(c.idle_ticks, 150);
        assert_eq!(config.window_samples(), 2 * 8192);
    }

    #[test]
    fn test_parse_secs() {
        assert_eq!(parse_secs("300"), Ok(300));
        assert_eq!(parse_secs("90s"), Ok(90));
        assert_eq!(parse_secs("5m"), Ok(300));
        assert_eq!(parse_secs("1h"), Ok(3600));
        assert!(parse_secs("five").is_err());
        assert!(parse_secs("m").is_err());
    }

    #[test]
    fn test_load_reads_explicit_settings_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"amps": ["10.0.0.9:23"], "sampleRate": 16000}}"#).unwrap();
        let path = file.path().to_string_lossy().into_owned();

        let config = Config::load(cli(&["--config", &path])).unwrap();
        assert_eq!(config.amps, vec!["10.0.0.9:23"]);
        assert_eq!(config.sample_rate, 16000);
    }

    #[test]
    fn test_load_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.json").to_string_lossy().into_owned();
        assert!(Config::load(cli(&["--config", &path, "--amps", "a"])).is_err());
    }

    #[test]
    fn test_load_rejects_malformed_settings() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let path = file.path().to_string_lossy().into_owned();
        assert!(Config::load(cli(&["--config", &path, "--amps", "a"])).is_err());
    }
}
