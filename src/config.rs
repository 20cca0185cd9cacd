use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Engine configuration, loadable from TOML by the host
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub timings: Timings,
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<EngineConfig, toml::de::Error> {
        toml::from_str(text)
    }
}

/// Timing windows for ephemeral state, in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timings {
    /// Spawn flag lifetime after quest creation
    #[serde(default = "default_spawn_ms")]
    pub spawn_ms: u64,
    /// Pulse lifetime after a resolved status write
    #[serde(default = "default_pulse_ms")]
    pub pulse_ms: u64,
    /// Glow lifetime when a quest reaches done
    #[serde(default = "default_glow_ms")]
    pub glow_ms: u64,
    /// Celebrating flag lifetime when a quest reaches done
    #[serde(default = "default_celebrate_ms")]
    pub celebrate_ms: u64,
    /// Delay before a done quest is collapsed and moved to the bottom
    #[serde(default = "default_sink_delay_ms")]
    pub sink_delay_ms: u64,
    /// How long a deleted quest can still be restored
    #[serde(default = "default_undo_window_ms")]
    pub undo_window_ms: u64,
    /// Debounce for the layout refresh signal (one animation frame)
    #[serde(default = "default_refresh_debounce_ms")]
    pub refresh_debounce_ms: u64,
}

fn default_spawn_ms() -> u64 {
    650
}
fn default_pulse_ms() -> u64 {
    700
}
fn default_glow_ms() -> u64 {
    1400
}
fn default_celebrate_ms() -> u64 {
    1400
}
fn default_sink_delay_ms() -> u64 {
    600
}
fn default_undo_window_ms() -> u64 {
    7000
}
fn default_refresh_debounce_ms() -> u64 {
    16
}

impl Default for Timings {
    fn default() -> Self {
        Timings {
            spawn_ms: default_spawn_ms(),
            pulse_ms: default_pulse_ms(),
            glow_ms: default_glow_ms(),
            celebrate_ms: default_celebrate_ms(),
            sink_delay_ms: default_sink_delay_ms(),
            undo_window_ms: default_undo_window_ms(),
            refresh_debounce_ms: default_refresh_debounce_ms(),
        }
    }
}

impl Timings {
    pub fn spawn(&self) -> Duration {
        Duration::from_millis(self.spawn_ms)
    }
    pub fn pulse(&self) -> Duration {
        Duration::from_millis(self.pulse_ms)
    }
    pub fn glow(&self) -> Duration {
        Duration::from_millis(self.glow_ms)
    }
    pub fn celebrate(&self) -> Duration {
        Duration::from_millis(self.celebrate_ms)
    }
    pub fn sink_delay(&self) -> Duration {
        Duration::from_millis(self.sink_delay_ms)
    }
    pub fn undo_window(&self) -> Duration {
        Duration::from_millis(self.undo_window_ms)
    }
    pub fn refresh_debounce(&self) -> Duration {
        Duration::from_millis(self.refresh_debounce_ms)
    }
}
