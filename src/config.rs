//! Bridge configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// How the trigger character is treated when building the forwarded body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerMode {
    /// Forward the trimmed body verbatim, trigger included.
    Keep,
    /// Remove exactly the leading trigger character before forwarding.
    Strip,
}

/// Reply-forwarding policy for the Discord → WhatsApp leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyMode {
    /// Relay each Discord reply to WhatsApp as it arrives.
    Immediate,
    /// Accumulate replies on the record and flush once at window expiry.
    Batch,
}

/// Bridge engine configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Character a WhatsApp message must start with to be bridged.
    pub trigger: char,
    /// Whether the trigger character is kept or stripped from the forward.
    pub trigger_mode: TriggerMode,
    /// Duration after record creation during which replies are accepted.
    pub active_window: Duration,
    /// Discord channel id the bridge forwards to and listens on.
    pub bridge_channel_id: String,
    /// Prefix forwards with a `[context] sender:` label, and decorate
    /// relayed replies with the Discord author name.
    pub context_label: bool,
    /// Reply-forwarding policy.
    pub reply_mode: ReplyMode,
    /// Period of the retention sweeper.
    pub sweep_interval: Duration,
    /// Hard cleanup deadline: records older than this are reaped by the
    /// sweeper regardless of their window.
    pub retention_ceiling: Duration,
    /// Pause between consecutive sends during a batch flush (rate limits).
    pub send_spacing: Duration,
    /// How long a scratch file lingers before forced deletion when its
    /// send path could not clean it up promptly.
    pub scratch_linger: Duration,
    /// Directory for transient attachment files.
    pub scratch_dir: PathBuf,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            trigger: '.',
            trigger_mode: TriggerMode::Keep,
            active_window: Duration::from_secs(120),
            bridge_channel_id: String::new(),
            context_label: true,
            reply_mode: ReplyMode::Immediate,
            sweep_interval: Duration::from_secs(60),
            retention_ceiling: Duration::from_secs(3600),
            send_spacing: Duration::from_millis(1000),
            scratch_linger: Duration::from_secs(30),
            scratch_dir: std::env::temp_dir().join("wa-discord-bridge"),
        }
    }
}

impl BridgeConfig {
    /// Build a config from environment variables.
    ///
    /// Returns `Ok(None)` when `BRIDGE_CHANNEL_ID` is unset — the bridge
    /// cannot run without a target channel. Unset optional variables fall
    /// back to defaults; set-but-invalid values are errors, never silently
    /// replaced.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let bridge_channel_id = match std::env::var("BRIDGE_CHANNEL_ID") {
            Ok(id) if id.trim().is_empty() => {
                return Err(ConfigError::MissingEnvVar("BRIDGE_CHANNEL_ID".into()));
            }
            Ok(id) => id,
            Err(_) => return Ok(None),
        };

        let defaults = Self::default();

        let trigger = match std::env::var("BRIDGE_TRIGGER") {
            Ok(s) => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => c,
                    _ => {
                        return Err(ConfigError::InvalidValue {
                            key: "BRIDGE_TRIGGER".into(),
                            message: format!("expected a single character, got {s:?}"),
                        });
                    }
                }
            }
            Err(_) => defaults.trigger,
        };

        let trigger_mode = match std::env::var("BRIDGE_TRIGGER_MODE") {
            Ok(v) => match v.as_str() {
                "keep" => TriggerMode::Keep,
                "strip" => TriggerMode::Strip,
                other => {
                    return Err(ConfigError::InvalidValue {
                        key: "BRIDGE_TRIGGER_MODE".into(),
                        message: format!("expected \"keep\" or \"strip\", got {other:?}"),
                    });
                }
            },
            Err(_) => defaults.trigger_mode,
        };

        let reply_mode = match std::env::var("BRIDGE_REPLY_MODE") {
            Ok(v) => match v.as_str() {
                "immediate" => ReplyMode::Immediate,
                "batch" => ReplyMode::Batch,
                other => {
                    return Err(ConfigError::InvalidValue {
                        key: "BRIDGE_REPLY_MODE".into(),
                        message: format!("expected \"immediate\" or \"batch\", got {other:?}"),
                    });
                }
            },
            Err(_) => defaults.reply_mode,
        };

        let active_window = env_u64("BRIDGE_ACTIVE_WINDOW_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.active_window);

        let context_label = std::env::var("BRIDGE_CONTEXT_LABEL")
            .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
            .unwrap_or(defaults.context_label);

        let sweep_interval = env_u64("BRIDGE_SWEEP_INTERVAL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.sweep_interval);

        let retention_ceiling = env_u64("BRIDGE_RETENTION_CEILING_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.retention_ceiling);

        let send_spacing = env_u64("BRIDGE_SEND_SPACING_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.send_spacing);

        let scratch_linger = env_u64("BRIDGE_SCRATCH_LINGER_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.scratch_linger);

        let scratch_dir = std::env::var("BRIDGE_SCRATCH_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.scratch_dir);

        Ok(Some(Self {
            trigger,
            trigger_mode,
            active_window,
            bridge_channel_id,
            context_label,
            reply_mode,
            sweep_interval,
            retention_ceiling,
            send_spacing,
            scratch_linger,
            scratch_dir,
        }))
    }
}

/// Read an optional numeric variable; a set-but-unparsable value is an error.
fn env_u64(key: &str) -> Result<Option<u64>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.into(),
                message: format!("expected an integer, got {raw:?}"),
            }),
        Err(_) => Ok(None),
    }
}
