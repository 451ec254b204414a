use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use rsvp_core::ConfigurationError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceResponse {
    #[default]
    Keyboard,
    Gamepad,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    English,
    Spanish,
    French,
}

/// Run parameters, read once before presentation and never mutated after.
///
/// Durations are seconds unless the key carries a unit suffix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub device_response: DeviceResponse,
    pub withpulses: bool,
    pub language: Language,
    pub pictures_path: PathBuf,
    pub window_resolution: [u32; 2],
    pub fullscreen: bool,
    /// Candidate inter-stimulus intervals; each sequence draws one.
    pub isi: Vec<f64>,
    pub seq_length: usize,
    pub n_sequences: usize,
    pub min_blank_duration: f64,
    /// Upper bound of the uniform jitter added to the lead blank.
    pub max_rand_blank: f64,
    pub daq_device: String,
    pub daq_port: String,
    pub enable_screening: bool,
    pub poll_interval_ms: u64,
    pub pulse_settle_ms: u64,
    pub gamepad_buttons: Vec<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_response: DeviceResponse::Keyboard,
            withpulses: false,
            language: Language::English,
            pictures_path: PathBuf::from("pictures"),
            window_resolution: [1024, 768],
            fullscreen: false,
            isi: vec![1.0],
            seq_length: 10,
            n_sequences: 1,
            min_blank_duration: 1.25,
            max_rand_blank: 0.5,
            daq_device: "Dev1".to_string(),
            daq_port: "port0".to_string(),
            enable_screening: false,
            poll_interval_ms: 1,
            pulse_settle_ms: 40,
            gamepad_buttons: vec![0, 1],
        }
    }
}

impl Config {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigurationError> {
        let config: Config =
            serde_json::from_str(json).map_err(|e| ConfigurationError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::Parse(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.write_all(b"\n")?;
        writer.flush()
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.isi.is_empty() {
            return Err(ConfigurationError::invalid("isi", "no candidate values"));
        }
        if let Some(bad) = self.isi.iter().find(|v| !(v.is_finite() && **v > 0.0)) {
            return Err(ConfigurationError::invalid(
                "isi",
                format!("{bad} is not a positive duration"),
            ));
        }
        if self.seq_length == 0 {
            return Err(ConfigurationError::invalid("seq_length", "must be at least 1"));
        }
        if self.n_sequences == 0 {
            return Err(ConfigurationError::invalid("n_sequences", "must be at least 1"));
        }
        if !(self.min_blank_duration.is_finite() && self.min_blank_duration >= 0.0) {
            return Err(ConfigurationError::invalid(
                "min_blank_duration",
                "must be a non-negative duration",
            ));
        }
        if !(self.max_rand_blank.is_finite() && self.max_rand_blank >= 0.0) {
            return Err(ConfigurationError::invalid(
                "max_rand_blank",
                "must be a non-negative duration",
            ));
        }
        if self.window_resolution.contains(&0) {
            return Err(ConfigurationError::invalid(
                "window_resolution",
                "width and height must be non-zero",
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigurationError::invalid("poll_interval_ms", "must be at least 1"));
        }
        // The reset write has to land before the next onset pulse.
        let shortest_isi = self.isi.iter().copied().fold(f64::INFINITY, f64::min);
        if self.withpulses && self.pulse_settle().as_secs_f64() >= shortest_isi {
            return Err(ConfigurationError::invalid(
                "pulse_settle_ms",
                format!("must be shorter than the shortest isi ({shortest_isi} s)"),
            ));
        }
        if self.withpulses {
            rsvp_hardware::daq::port_type(&self.daq_port)
                .map_err(|e| ConfigurationError::invalid("daq_port", e.to_string()))?;
        }
        if self.device_response == DeviceResponse::Gamepad && self.gamepad_buttons.is_empty() {
            return Err(ConfigurationError::invalid(
                "gamepad_buttons",
                "at least one button must be tracked",
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn pulse_settle(&self) -> Duration {
        Duration::from_millis(self.pulse_settle_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn partial_file_fills_defaults() {
        let config = Config::from_json_str(
            r#"{ "device_response": "gamepad", "isi": [0.8, 1.2], "language": "french" }"#,
        )
        .unwrap();
        assert_eq!(config.device_response, DeviceResponse::Gamepad);
        assert_eq!(config.language, Language::French);
        assert_eq!(config.isi, vec![0.8, 1.2]);
        assert_eq!(config.seq_length, 10);
        assert_eq!(config.gamepad_buttons, vec![0, 1]);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Config::from_json_str(r#"{ "seq_lenght": 5 }"#).unwrap_err();
        assert!(matches!(err, ConfigurationError::Parse(msg) if msg.contains("seq_lenght")));
    }

    #[test]
    fn bad_values_name_their_key() {
        let cases = [
            (r#"{ "isi": [] }"#, "isi"),
            (r#"{ "isi": [1.0, -0.5] }"#, "isi"),
            (r#"{ "seq_length": 0 }"#, "seq_length"),
            (r#"{ "n_sequences": 0 }"#, "n_sequences"),
            (r#"{ "max_rand_blank": -1.0 }"#, "max_rand_blank"),
            (r#"{ "window_resolution": [0, 768] }"#, "window_resolution"),
            (r#"{ "withpulses": true, "isi": [0.03] }"#, "pulse_settle_ms"),
            (r#"{ "withpulses": true, "daq_port": "portZ" }"#, "daq_port"),
        ];
        for (json, expected) in cases {
            match Config::from_json_str(json) {
                Err(ConfigurationError::InvalidValue { key, .. }) => assert_eq!(key, expected),
                other => panic!("{json}: unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn unknown_language_fails_to_parse() {
        assert!(matches!(
            Config::from_json_str(r#"{ "language": "german" }"#),
            Err(ConfigurationError::Parse(_))
        ));
    }

    #[test]
    fn save_then_load() {
        let path = std::env::temp_dir().join(format!("rsvp-config-{}.json", std::process::id()));
        let config = Config {
            n_sequences: 4,
            withpulses: true,
            ..Config::default()
        };
        config.save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, config);
    }
}
