use std::{path::PathBuf, time::Duration};

use clap::Parser;

const DEFAULT_COOLDOWN: Duration = Duration::from_secs(1);
const DEFAULT_SEEK_STEP: Duration = Duration::from_millis(5_000);
const DEFAULT_VOLUME_STEP: f64 = 0.1;

#[derive(Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    /// Minimum gap between two gesture events for the second to act.
    pub cooldown: Duration,
    pub seek_step: Duration,
    pub volume_step: f64,
    pub show_depth: bool,
    pub draw_skeletons: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cooldown: DEFAULT_COOLDOWN,
            seek_step: DEFAULT_SEEK_STEP,
            volume_step: DEFAULT_VOLUME_STEP,
            show_depth: true,
            draw_skeletons: true,
        }
    }
}

#[derive(Clone, Debug, Parser)]
#[command(name = "body-gesture-player")]
#[command(about = "Drive a media player with body gestures from a simulated depth sensor")]
pub struct DemoOptions {
    /// Number of sensor ticks to run before shutting down
    #[arg(long, default_value_t = 300)]
    pub frames: u64,

    /// Sensor frame rate
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u32).range(1..))]
    pub fps: u32,

    /// Write the last presented frame to this PNG file
    #[arg(long)]
    pub snapshot: Option<PathBuf>,

    /// Do not render depth frames
    #[arg(long)]
    pub no_depth: bool,

    /// Do not draw body skeletons
    #[arg(long)]
    pub no_skeleton: bool,
}

impl DemoOptions {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.fps.max(1)
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            show_depth: !self.no_depth,
            draw_skeletons: !self.no_skeleton,
            ..PipelineConfig::default()
        }
    }
}
