use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

const ENABLE_LOGS: bool = true;
use crate::log_warn;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub recognition: RecognitionConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub commands: CommandsConfig,
    /// URL prefixes of privileged pages the extension may not touch
    #[serde(default = "default_restricted_prefixes")]
    pub restricted_prefixes: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: default_name(),
            speech: SpeechConfig::default(),
            recognition: RecognitionConfig::default(),
            polling: PollingConfig::default(),
            commands: CommandsConfig::default(),
            restricted_prefixes: default_restricted_prefixes(),
        }
    }
}

fn default_name() -> String {
    "Voice Navigator".into()
}

fn default_restricted_prefixes() -> Vec<String> {
    vec!["chrome://".into(), "edge://".into(), "about:".into()]
}

// ============================================================================
// Speech output
// ============================================================================

#[derive(Debug, Deserialize, Clone)]
pub struct SpeechConfig {
    #[serde(default = "default_lang")]
    pub lang: String,
    /// Speaking rate, 1.0 is the voice's normal speed
    #[serde(default = "default_rate")]
    pub rate: f32,
    #[serde(default = "default_unit")]
    pub pitch: f32,
    #[serde(default = "default_unit")]
    pub volume: f32,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            lang: default_lang(),
            rate: default_rate(),
            pitch: default_unit(),
            volume: default_unit(),
        }
    }
}

fn default_lang() -> String {
    "en-US".into()
}

fn default_rate() -> f32 {
    0.9
}

fn default_unit() -> f32 {
    1.0
}

// ============================================================================
// Speech recognition
// ============================================================================

#[derive(Debug, Deserialize, Clone)]
pub struct RecognitionConfig {
    /// Keep listening after each final result
    #[serde(default = "default_true")]
    pub continuous: bool,
    /// Deliver interim (preview) transcripts
    #[serde(default = "default_true")]
    pub interim: bool,
    #[serde(default = "default_lang")]
    pub lang: String,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            continuous: true,
            interim: true,
            lang: default_lang(),
        }
    }
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Polling
// ============================================================================

#[derive(Debug, Deserialize, Clone)]
pub struct PollingConfig {
    #[serde(default = "default_selection_interval")]
    pub selection_interval_ms: u64,
    #[serde(default = "default_cursor_interval")]
    pub cursor_interval_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            selection_interval_ms: default_selection_interval(),
            cursor_interval_ms: default_cursor_interval(),
        }
    }
}

impl PollingConfig {
    pub fn selection_interval(&self) -> Duration {
        Duration::from_millis(self.selection_interval_ms.max(1))
    }

    pub fn cursor_interval(&self) -> Duration {
        Duration::from_millis(self.cursor_interval_ms.max(1))
    }
}

fn default_selection_interval() -> u64 {
    1000
}

fn default_cursor_interval() -> u64 {
    300
}

// ============================================================================
// Commands
// ============================================================================

#[derive(Debug, Deserialize, Clone)]
pub struct CommandsConfig {
    /// Pixels moved per scroll command
    #[serde(default = "default_scroll_amount")]
    pub scroll_amount: f64,

    /// Extra or overriding entries for the "open <site>" table
    #[serde(default)]
    pub sites: BTreeMap<String, String>,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            scroll_amount: default_scroll_amount(),
            sites: BTreeMap::new(),
        }
    }
}

impl CommandsConfig {
    /// Built-in site table with configured entries merged over it
    pub fn site_table(&self) -> BTreeMap<String, String> {
        let mut sites: BTreeMap<String, String> = DEFAULT_SITES
            .iter()
            .map(|(name, url)| (name.to_string(), url.to_string()))
            .collect();
        for (name, url) in &self.sites {
            sites.insert(name.to_lowercase(), url.clone());
        }
        sites
    }
}

fn default_scroll_amount() -> f64 {
    200.0
}

const DEFAULT_SITES: [(&str, &str); 7] = [
    ("google", "https://www.google.com"),
    ("youtube", "https://www.youtube.com"),
    ("facebook", "https://www.facebook.com"),
    ("twitter", "https://www.twitter.com"),
    ("amazon", "https://www.amazon.com"),
    ("github", "https://www.github.com"),
    ("linkedin", "https://www.linkedin.com"),
];

impl Config {
    /// Load `config.toml` from the working directory, defaults if absent
    pub fn load() -> Self {
        Self::load_from(Path::new(DEFAULT_CONFIG_PATH))
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Config::default();
        }
        match fs::read_to_string(path) {
            Ok(s) => Self::parse(&s).unwrap_or_else(|e| {
                log_warn!("ignoring malformed {}: {}", path.display(), e);
                Config::default()
            }),
            Err(e) => {
                log_warn!("cannot read {}: {}", path.display(), e);
                Config::default()
            }
        }
    }

    pub fn parse(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// The privileged prefix `url` starts with, if any
    pub fn restricted_prefix(&self, url: &str) -> Option<&str> {
        self.restricted_prefixes
            .iter()
            .map(String::as_str)
            .find(|prefix| url.starts_with(prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.speech.lang, "en-US");
        assert_eq!(config.speech.rate, 0.9);
        assert_eq!(config.polling.selection_interval(), Duration::from_millis(1000));
        assert_eq!(config.polling.cursor_interval(), Duration::from_millis(300));
        assert_eq!(config.commands.scroll_amount, 200.0);
        assert!(config.recognition.continuous);
    }

    #[test]
    fn test_partial_file() {
        let config = Config::parse(
            r#"
            [polling]
            cursor_interval_ms = 150

            [commands.sites]
            Wikipedia = "https://www.wikipedia.org"
            github = "https://github.com"
            "#,
        )
        .unwrap();
        assert_eq!(config.polling.cursor_interval_ms, 150);
        assert_eq!(config.polling.selection_interval_ms, 1000);
        let sites = config.commands.site_table();
        assert_eq!(sites["wikipedia"], "https://www.wikipedia.org");
        assert_eq!(sites["github"], "https://github.com");
        assert_eq!(sites["google"], "https://www.google.com");
    }

    #[test]
    fn test_restricted_prefix() {
        let config = Config::default();
        assert_eq!(config.restricted_prefix("chrome://settings"), Some("chrome://"));
        assert_eq!(config.restricted_prefix("https://example.com"), None);
    }

    #[test]
    fn test_missing_file_defaults() {
        let config = Config::load_from(Path::new("/nonexistent/voice-navigator.toml"));
        assert_eq!(config.name, "Voice Navigator");
    }
}
