//! Media session configuration.
//!
//! Configuration is loaded from environment variables. The access token is
//! redacted in Debug output.

use crate::actors::messages::{JoinRequest, SessionOptions, DEFAULT_MAILBOX_BUFFER};
use crate::transport::{
    LocalTracksConfig, ScreenOptimization, ScreenTrackConfig, DEFAULT_SCREEN_ENCODER_PRESET,
};

use secrecy::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

/// Default publishing eligibility.
pub const DEFAULT_PUBLISH: bool = true;

/// Default for capturing system audio with the screen.
pub const DEFAULT_SCREEN_AUDIO: bool = false;

/// Media session configuration.
#[derive(Clone)]
pub struct Config {
    /// Media service application ID.
    pub app_id: String,

    /// Channel to join.
    pub channel: String,

    /// Channel access token. `None` for unsecured channels.
    /// Protected by `SecretString` to prevent accidental logging.
    pub access_token: Option<SecretString>,

    /// Requested local participant ID. `None` lets the transport assign one.
    pub participant_id: Option<String>,

    /// Whether the local participant publishes audio/video (default: true).
    pub publish: bool,

    /// Screen capture encoder preset (default: "1080p_1").
    pub screen_encoder_preset: String,

    /// Screen content optimization (default: detail).
    pub screen_optimization: ScreenOptimization,

    /// Capture system audio with the screen (default: false).
    pub screen_audio: bool,

    /// Session actor mailbox capacity (default: 64).
    pub mailbox_buffer: usize,
}

/// Custom Debug implementation that redacts the access token.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("app_id", &self.app_id)
            .field("channel", &self.channel)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("participant_id", &self.participant_id)
            .field("publish", &self.publish)
            .field("screen_encoder_preset", &self.screen_encoder_preset)
            .field("screen_optimization", &self.screen_optimization)
            .field("screen_audio", &self.screen_audio)
            .field("mailbox_buffer", &self.mailbox_buffer)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let app_id = required(vars, "MS_APP_ID")?;
        let channel = required(vars, "MS_CHANNEL")?;

        // Empty values mean "not set" for the optional fields.
        let access_token = non_empty(vars, "MS_ACCESS_TOKEN").map(SecretString::from);
        let participant_id = non_empty(vars, "MS_PARTICIPANT_ID");

        let publish = parse_bool(vars, "MS_PUBLISH", DEFAULT_PUBLISH)?;

        let screen_encoder_preset = non_empty(vars, "MS_SCREEN_ENCODER_PRESET")
            .unwrap_or_else(|| DEFAULT_SCREEN_ENCODER_PRESET.to_string());

        let screen_optimization = match vars.get("MS_SCREEN_OPTIMIZATION") {
            Some(value) => ScreenOptimization::parse(value).ok_or_else(|| {
                ConfigError::InvalidValue(format!(
                    "MS_SCREEN_OPTIMIZATION must be detail, motion or balanced, got '{value}'"
                ))
            })?,
            None => ScreenOptimization::default(),
        };

        let screen_audio = parse_bool(vars, "MS_SCREEN_AUDIO", DEFAULT_SCREEN_AUDIO)?;

        let mailbox_buffer = match vars.get("MS_MAILBOX_BUFFER") {
            Some(value) => match value.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::InvalidValue(format!(
                        "MS_MAILBOX_BUFFER must be a positive integer, got '{value}'"
                    )))
                }
            },
            None => DEFAULT_MAILBOX_BUFFER,
        };

        Ok(Config {
            app_id,
            channel,
            access_token,
            participant_id,
            publish,
            screen_encoder_preset,
            screen_optimization,
            screen_audio,
            mailbox_buffer,
        })
    }

    /// Options for `SessionActor::spawn`.
    #[must_use]
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            publish: self.publish,
            local_tracks: LocalTracksConfig::default(),
            screen_track: ScreenTrackConfig {
                encoder_preset: self.screen_encoder_preset.clone(),
                optimization: self.screen_optimization,
                capture_audio: self.screen_audio,
            },
            mailbox_buffer: self.mailbox_buffer,
        }
    }

    /// Join intent for the configured channel.
    #[must_use]
    pub fn join_request(&self) -> JoinRequest {
        JoinRequest {
            app_id: self.app_id.clone(),
            channel: self.channel.clone(),
            token: self.access_token.clone(),
            participant_id: self.participant_id.clone(),
        }
    }
}

fn required(vars: &HashMap<String, String>, key: &str) -> Result<String, ConfigError> {
    non_empty(vars, key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

fn non_empty(vars: &HashMap<String, String>, key: &str) -> Option<String> {
    vars.get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_bool(
    vars: &HashMap<String, String>,
    key: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    let Some(value) = vars.get(key) else {
        return Ok(default);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue(format!(
            "{key} must be a boolean, got '{value}'"
        ))),
    }
}
