//! # Configuration Management
//!
//! Loads and manages application configuration from multiple sources:
//! - TOML configuration files (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values (built into the code)
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Environment variables (APP_SERVER_HOST, APP_SERVER_PORT, etc.)
//! 2. Configuration file (config.toml)
//! 3. Default values (defined in the Default impl)
//!
//! The `[audio]` section is the declared container format for rendered
//! output. It is validated at startup and on every runtime update, so the
//! muxer never writes a header from unchecked constants.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

/// Main application configuration that contains all settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub audio: AudioSettings,
    pub performance: PerformanceConfig,
}

/// Server-specific configuration settings.
///
/// ## Common values:
/// - `host = "127.0.0.1"`: Only accept connections from localhost (development)
/// - `host = "0.0.0.0"`: Accept connections from any IP address (production)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Declared audio format and pipeline tuning.
///
/// ## Fields:
/// - `capture_rate`: the producer's nominal sample rate; rendered containers
///   declare half of it as their frame rate (fragments arrive downsampled 2:1
///   from capture)
/// - `channels`: interleaved channel count in producer payloads
/// - `bit_depth`: PCM sample width; the decoder only produces 16-bit samples
/// - `window_size`: how many recent fragments a session retains (`W`)
/// - `fade_len`: fade ramp length in samples at each fragment edge (`F`)
/// - `output_path`: the rendered container artifact, overwritten per render
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioSettings {
    pub capture_rate: u32,
    pub channels: u16,
    pub bit_depth: u16,
    pub window_size: usize,
    pub fade_len: usize,
    pub output_path: String,
}

impl AudioSettings {
    /// Container frame rate derived from the nominal capture rate.
    pub fn frame_rate(&self) -> u32 {
        self.capture_rate / 2
    }
}

/// Performance tuning configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    /// Maximum number of concurrent WebSocket ingestion sessions.
    pub max_concurrent_sessions: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            audio: AudioSettings {
                capture_rate: 48_000,
                channels: 2,
                bit_depth: 16,
                window_size: 3,
                fade_len: 50,
                output_path: "concat_output.wav".to_string(),
            },
            performance: PerformanceConfig {
                max_concurrent_sessions: 10,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources in priority order.
    ///
    /// ## Configuration Loading Process:
    /// 1. Start with built-in defaults
    /// 2. Override with values from config.toml (if it exists)
    /// 3. Override with environment variables prefixed with APP_
    /// 4. Handle the bare HOST and PORT variables used by deployment platforms
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("_"));

        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// ## What this checks:
    /// - Server port is not 0
    /// - The capture rate is non-zero and even (the container frame rate is
    ///   derived by halving it)
    /// - Channel count is mono or stereo
    /// - Sample width is the 16-bit PCM the decoder produces
    /// - The window holds at least one fragment
    /// - At least one concurrent session is allowed
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.audio.capture_rate == 0 || self.audio.capture_rate % 2 != 0 {
            return Err(anyhow::anyhow!(
                "Capture rate must be non-zero and even, got {}",
                self.audio.capture_rate
            ));
        }

        if self.audio.channels == 0 || self.audio.channels > 2 {
            return Err(anyhow::anyhow!(
                "Channel count must be 1 or 2, got {}",
                self.audio.channels
            ));
        }

        if self.audio.bit_depth != 16 {
            return Err(anyhow::anyhow!(
                "Only 16-bit PCM is supported, got {}-bit",
                self.audio.bit_depth
            ));
        }

        if self.audio.window_size == 0 {
            return Err(anyhow::anyhow!("Window size must be greater than 0"));
        }

        if self.audio.output_path.is_empty() {
            return Err(anyhow::anyhow!("Output path cannot be empty"));
        }

        if self.performance.max_concurrent_sessions == 0 {
            return Err(anyhow::anyhow!("Max concurrent sessions must be greater than 0"));
        }

        Ok(())
    }

    /// Update configuration from a JSON string (used for runtime config updates).
    ///
    /// ## Partial updates:
    /// Only the fields present in the JSON are changed; everything else keeps
    /// its current value. The updated configuration is re-validated before
    /// this returns, so an update can never leave an invalid format behind.
    pub fn update_from_json(&mut self, json_str: &str) -> Result<()> {
        let partial_config: serde_json::Value = serde_json::from_str(json_str)?;

        if let Some(server) = partial_config.get("server") {
            if let Some(host) = server.get("host").and_then(|v| v.as_str()) {
                self.server.host = host.to_string();
            }
            if let Some(port) = server.get("port").and_then(|v| v.as_u64()) {
                self.server.port = port as u16;
            }
        }

        if let Some(audio) = partial_config.get("audio") {
            if let Some(rate) = audio.get("capture_rate").and_then(|v| v.as_u64()) {
                self.audio.capture_rate = rate as u32;
            }
            if let Some(channels) = audio.get("channels").and_then(|v| v.as_u64()) {
                self.audio.channels = channels as u16;
            }
            if let Some(depth) = audio.get("bit_depth").and_then(|v| v.as_u64()) {
                self.audio.bit_depth = depth as u16;
            }
            if let Some(window) = audio.get("window_size").and_then(|v| v.as_u64()) {
                self.audio.window_size = window as usize;
            }
            if let Some(fade) = audio.get("fade_len").and_then(|v| v.as_u64()) {
                self.audio.fade_len = fade as usize;
            }
            if let Some(path) = audio.get("output_path").and_then(|v| v.as_str()) {
                self.audio.output_path = path.to_string();
            }
        }

        if let Some(performance) = partial_config.get("performance") {
            if let Some(sessions) = performance.get("max_concurrent_sessions").and_then(|v| v.as_u64()) {
                self.performance.max_concurrent_sessions = sessions as usize;
            }
        }

        self.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.audio.window_size, 3);
        assert_eq!(config.audio.fade_len, 50);
        assert_eq!(config.audio.frame_rate(), 24_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.audio.capture_rate = 44_101; // odd, cannot halve
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.audio.bit_depth = 24;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.audio.window_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_update() {
        let mut config = AppConfig::default();
        let json = r#"{"audio": {"window_size": 5, "fade_len": 100}}"#;
        assert!(config.update_from_json(json).is_ok());
        assert_eq!(config.audio.window_size, 5);
        assert_eq!(config.audio.fade_len, 100);
        // Untouched fields keep their values
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.audio.capture_rate, 48_000);
    }

    #[test]
    fn test_config_update_rejects_invalid() {
        let mut config = AppConfig::default();
        let json = r#"{"audio": {"channels": 6}}"#;
        assert!(config.update_from_json(json).is_err());
    }
}
