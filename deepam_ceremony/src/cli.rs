//! Command-line options.

use std::time::Duration;

use clap::{ArgAction, Parser};

use ceremony_core::{CeremonyConfig, HandLossPolicy, ProximityThreshold};

use crate::app::AppConfig;
use crate::chime::TUBULAR_BELLS;

/// Light the deepam by carrying a flame to it with a clenched fist.
#[derive(Parser, Debug)]
#[command(name = "deepam_ceremony")]
#[command(version)]
#[command(about = "Gesture-driven virtual inauguration lamp")]
pub struct Cli {
    /// Lighting radius in pixels around the main lamp
    #[arg(long, value_name = "PX", conflicts_with = "threshold_fraction")]
    pub threshold_px: Option<f32>,

    /// Lighting radius as a fraction of the window's shorter side
    #[arg(long, value_name = "FRACTION")]
    pub threshold_fraction: Option<f32>,

    /// Pause between lighting the lamp and showing the blessing
    #[arg(long, value_name = "MS", default_value_t = 1500)]
    pub delay_ms: u64,

    /// Frames a fist/open change must persist before it counts (1 = off)
    #[arg(long, value_name = "FRAMES", default_value_t = 1)]
    pub debounce: usize,

    /// Treat a hand leaving view as opening it (default: the lamp waits)
    #[arg(long)]
    pub drop_on_loss: bool,

    /// Initial window width
    #[arg(long, default_value_t = 1280)]
    pub width: usize,

    /// Initial window height
    #[arg(long, default_value_t = 720)]
    pub height: usize,

    /// General MIDI program for the bells
    #[arg(long, default_value_t = TUBULAR_BELLS)]
    pub instrument: u8,

    /// Note velocity for the bells
    #[arg(long, default_value_t = 96)]
    pub velocity: u8,

    /// MIDI channel (0–15)
    #[arg(long, default_value_t = 0)]
    pub channel: u8,

    /// Run without opening a MIDI port
    #[arg(long)]
    pub mute: bool,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn app_config(&self) -> AppConfig {
        let proximity_threshold = match (self.threshold_px, self.threshold_fraction) {
            (Some(px), _) => ProximityThreshold::Pixels(px),
            (None, Some(f)) => ProximityThreshold::ViewportFraction(f),
            (None, None) => ProximityThreshold::default(),
        };
        let hand_loss_policy = if self.drop_on_loss { HandLossPolicy::Drop } else { HandLossPolicy::Freeze };

        AppConfig {
            ceremony: CeremonyConfig {
                proximity_threshold,
                blessing_delay: Duration::from_millis(self.delay_ms),
                debounce_frames: self.debounce,
                hand_loss_policy,
                ..CeremonyConfig::default()
            },
            window_width: self.width,
            window_height: self.height,
            instrument: self.instrument,
            velocity: self.velocity,
            channel: self.channel,
            mute: self.mute,
        }
    }

    /// `tracing` filter directive for the `-v` count.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("deepam_ceremony").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_match_app_defaults() {
        assert_eq!(parse(&[]).app_config(), AppConfig::default());
    }

    #[test]
    fn pixel_threshold_and_policy() {
        let cfg = parse(&["--threshold-px", "80", "--drop-on-loss", "--delay-ms", "900"]).app_config();
        assert_eq!(cfg.ceremony.proximity_threshold, ProximityThreshold::Pixels(80.0));
        assert_eq!(cfg.ceremony.hand_loss_policy, HandLossPolicy::Drop);
        assert_eq!(cfg.ceremony.blessing_delay, Duration::from_millis(900));
    }

    #[test]
    fn fraction_threshold() {
        let cfg = parse(&["--threshold-fraction", "0.1"]).app_config();
        assert_eq!(cfg.ceremony.proximity_threshold, ProximityThreshold::ViewportFraction(0.1));
    }

    #[test]
    fn both_thresholds_conflict() {
        let args = ["deepam_ceremony", "--threshold-px", "80", "--threshold-fraction", "0.1"];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn verbosity_levels() {
        assert_eq!(parse(&[]).log_level(), "warn");
        assert_eq!(parse(&["-v"]).log_level(), "info");
        assert_eq!(parse(&["-vv"]).log_level(), "debug");
        assert_eq!(parse(&["-vvvv"]).log_level(), "trace");
    }
}
