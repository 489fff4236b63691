use crate::error::ConfigError;
use serde::Serialize;
use serde_json::{Map, Value};

/// Keys understood by the playback core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    CrossfadeEnabled,
    CrossfadeDuration,
    SkipSilence,
    NormalizeAudio,
    PlayerVolume,
    PresenceToken,
    PresenceEnabled,
    PersistentQueue,
    ShowLyrics,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 9] = [
        ConfigKey::CrossfadeEnabled,
        ConfigKey::CrossfadeDuration,
        ConfigKey::SkipSilence,
        ConfigKey::NormalizeAudio,
        ConfigKey::PlayerVolume,
        ConfigKey::PresenceToken,
        ConfigKey::PresenceEnabled,
        ConfigKey::PersistentQueue,
        ConfigKey::ShowLyrics,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ConfigKey::CrossfadeEnabled => "crossfade_enabled",
            ConfigKey::CrossfadeDuration => "crossfade_duration",
            ConfigKey::SkipSilence => "skip_silence",
            ConfigKey::NormalizeAudio => "normalize_audio",
            ConfigKey::PlayerVolume => "player_volume",
            ConfigKey::PresenceToken => "presence_token",
            ConfigKey::PresenceEnabled => "presence_enabled",
            ConfigKey::PersistentQueue => "persistent_queue",
            ConfigKey::ShowLyrics => "show_lyrics",
        }
    }

    pub fn parse(s: &str) -> Option<ConfigKey> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

/// Typed view over the configuration feed.
///
/// Every field has a documented default; a missing or ill-typed key in
/// the backing store reads as that default.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Preferences {
    pub crossfade_enabled: bool,
    #[serde(rename = "crossfade_duration")]
    pub crossfade_duration_secs: u32,
    pub skip_silence: bool,
    pub normalize_audio: bool,
    pub player_volume: f32,
    pub presence_token: Option<String>,
    pub presence_enabled: bool,
    pub persistent_queue: bool,
    pub show_lyrics: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            crossfade_enabled: false,
            crossfade_duration_secs: 3,
            skip_silence: false,
            normalize_audio: true,
            player_volume: 1.0,
            presence_token: None,
            presence_enabled: true,
            persistent_queue: true,
            show_lyrics: false,
        }
    }
}

impl Preferences {
    /// Reads each key independently from a JSON object.
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let d = Self::default();
        Self {
            crossfade_enabled: read_bool(map, ConfigKey::CrossfadeEnabled, d.crossfade_enabled),
            crossfade_duration_secs: map
                .get(ConfigKey::CrossfadeDuration.as_str())
                .and_then(Value::as_u64)
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(d.crossfade_duration_secs),
            skip_silence: read_bool(map, ConfigKey::SkipSilence, d.skip_silence),
            normalize_audio: read_bool(map, ConfigKey::NormalizeAudio, d.normalize_audio),
            player_volume: map
                .get(ConfigKey::PlayerVolume.as_str())
                .and_then(Value::as_f64)
                .map(|v| (v as f32).clamp(0.0, 1.0))
                .unwrap_or(d.player_volume),
            presence_token: map
                .get(ConfigKey::PresenceToken.as_str())
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .map(str::to_owned),
            presence_enabled: read_bool(map, ConfigKey::PresenceEnabled, d.presence_enabled),
            persistent_queue: read_bool(map, ConfigKey::PersistentQueue, d.persistent_queue),
            show_lyrics: read_bool(map, ConfigKey::ShowLyrics, d.show_lyrics),
        }
    }

    pub fn from_value(value: &Value) -> Self {
        match value.as_object() {
            Some(map) => Self::from_map(map),
            None => Self::default(),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Map::new()))
    }

    /// Renders one key the way `set` accepts it.
    pub fn get_str(&self, key: ConfigKey) -> String {
        match key {
            ConfigKey::CrossfadeEnabled => self.crossfade_enabled.to_string(),
            ConfigKey::CrossfadeDuration => self.crossfade_duration_secs.to_string(),
            ConfigKey::SkipSilence => self.skip_silence.to_string(),
            ConfigKey::NormalizeAudio => self.normalize_audio.to_string(),
            ConfigKey::PlayerVolume => format!("{:.2}", self.player_volume),
            ConfigKey::PresenceToken => self.presence_token.clone().unwrap_or_default(),
            ConfigKey::PresenceEnabled => self.presence_enabled.to_string(),
            ConfigKey::PersistentQueue => self.persistent_queue.to_string(),
            ConfigKey::ShowLyrics => self.show_lyrics.to_string(),
        }
    }

    /// Parses and applies a textual value for `key`.
    pub fn set_str(&mut self, key: ConfigKey, value: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            key: key.as_str().to_owned(),
            value: value.to_owned(),
        };
        match key {
            ConfigKey::CrossfadeEnabled => self.crossfade_enabled = parse_bool(value).ok_or_else(invalid)?,
            ConfigKey::CrossfadeDuration => {
                self.crossfade_duration_secs = value.trim().parse().map_err(|_| invalid())?
            }
            ConfigKey::SkipSilence => self.skip_silence = parse_bool(value).ok_or_else(invalid)?,
            ConfigKey::NormalizeAudio => self.normalize_audio = parse_bool(value).ok_or_else(invalid)?,
            ConfigKey::PlayerVolume => {
                let v: f32 = value.trim().parse().map_err(|_| invalid())?;
                if !(0.0..=1.0).contains(&v) {
                    return Err(invalid());
                }
                self.player_volume = v;
            }
            ConfigKey::PresenceToken => {
                let v = value.trim();
                self.presence_token = (!v.is_empty()).then(|| v.to_owned());
            }
            ConfigKey::PresenceEnabled => self.presence_enabled = parse_bool(value).ok_or_else(invalid)?,
            ConfigKey::PersistentQueue => self.persistent_queue = parse_bool(value).ok_or_else(invalid)?,
            ConfigKey::ShowLyrics => self.show_lyrics = parse_bool(value).ok_or_else(invalid)?,
        }
        Ok(())
    }
}

fn read_bool(map: &Map<String, Value>, key: ConfigKey, default: bool) -> bool {
    map.get(key.as_str())
        .and_then(Value::as_bool)
        .unwrap_or(default)
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
