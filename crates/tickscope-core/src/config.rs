use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::capture::CaptureOptions;
use crate::dedup::{DedupScope, DedupeOptions};
use crate::error::{CoreError, Result};
use crate::rules::CaptureRules;

/// Root application configuration, loaded from `~/.config/tickscope/config.toml`.
/// Command-line flags take precedence over every value here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub digest: DigestConfig,
    pub dedupe: DedupeConfig,
    pub capture: CaptureConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// TickTickSync `data.json`; discovered automatically when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// IANA zone name; `TZ` and then `Asia/Shanghai` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DigestConfig {
    pub days: u32,
    pub limit: usize,
    pub thought_keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupeConfig {
    pub scope: DedupScope,
    pub window_hours: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub window_seconds: f64,
    /// Overrides the built-in rule table fields it sets; the rest keep their defaults.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<CaptureRules>,
}

// ─── Defaults ──────────────────────────────────────────────

pub const DEFAULT_TIMEZONE: &str = "Asia/Shanghai";

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            days: 7,
            limit: 20,
            thought_keywords: ["思考", "复盘", "反思", "总结", "回顾", "感谢"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl Default for DedupeConfig {
    fn default() -> Self {
        let opts = DedupeOptions::default();
        Self {
            scope: opts.scope,
            window_hours: opts.window_hours,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            window_seconds: CaptureOptions::default().window_seconds,
            rules: None,
        }
    }
}

// ─── Load / Save ───────────────────────────────────────────

impl AppConfig {
    /// Standard config file path: `~/.config/tickscope/config.toml`
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("TICKSCOPE_CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("tickscope")
            .join("config.toml")
    }

    /// Load config from disk, falling back to defaults if file doesn't exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let toml_str = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.digest.days == 0 {
            return Err(CoreError::ConfigError("digest.days must be positive".to_string()));
        }
        if self.digest.limit == 0 {
            return Err(CoreError::ConfigError("digest.limit must be positive".to_string()));
        }
        if !(self.dedupe.window_hours > 0.0) {
            return Err(CoreError::ConfigError(
                "dedupe.window_hours must be positive".to_string(),
            ));
        }
        if !(self.capture.window_seconds > 0.0) {
            return Err(CoreError::ConfigError(
                "capture.window_seconds must be positive".to_string(),
            ));
        }
        if let Some(rules) = &self.capture.rules {
            rules.validate()?;
        }
        Ok(())
    }

    // ─── Derived options ───────────────────────────────────

    /// Configured zone name, then `TZ`, then the built-in default.
    pub fn timezone_name(&self) -> String {
        self.source
            .timezone
            .clone()
            .or_else(|| std::env::var("TZ").ok().filter(|tz| !tz.is_empty()))
            .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string())
    }

    pub fn dedupe_options(&self) -> DedupeOptions {
        DedupeOptions {
            scope: self.dedupe.scope,
            window_hours: self.dedupe.window_hours,
        }
    }

    pub fn capture_options(&self) -> CaptureOptions {
        CaptureOptions {
            window_seconds: self.capture.window_seconds,
        }
    }

    pub fn capture_rules(&self) -> CaptureRules {
        self.capture.rules.clone().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::TaskClass;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.digest.days, 7);
        assert_eq!(cfg.digest.limit, 20);
        assert_eq!(cfg.dedupe.scope, DedupScope::Inbox);
        assert_eq!(cfg.dedupe.window_hours, 12.0);
        assert_eq!(cfg.capture.window_seconds, 180.0);
        assert_eq!(cfg.capture_rules(), CaptureRules::default());
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = AppConfig::default();
        cfg.source.timezone = Some("Europe/Berlin".to_string());
        cfg.dedupe.scope = DedupScope::All;
        cfg.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.source.timezone.as_deref(), Some("Europe/Berlin"));
        assert_eq!(loaded.dedupe.scope, DedupScope::All);
        assert_eq!(loaded.digest.thought_keywords, cfg.digest.thought_keywords);
        assert!(loaded.capture.rules.is_none());
    }

    #[test]
    fn test_load_nonexistent_returns_default() {
        let dir = TempDir::new().unwrap();
        let cfg = AppConfig::load_from(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(cfg.digest.days, 7);
    }

    #[test]
    fn test_partial_file_and_custom_rules() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[dedupe]
window_hours = 6

[capture.rules]
capture_tag = "clip"
action_tag = "todo"
material_tag = "reading"

[[capture.rules.markers]]
label = "later"
class = "material"
"#,
        )
        .unwrap();

        let cfg = AppConfig::load_from(&path).unwrap();
        assert_eq!(cfg.dedupe_options().window_hours, 6.0);
        assert_eq!(cfg.dedupe.scope, DedupScope::Inbox);

        let rules = cfg.capture_rules();
        assert_eq!(rules.capture_tag, "clip");
        assert_eq!(rules.class_for_marker("later"), Some(TaskClass::Material));
        assert_eq!(rules.marker_max_chars, 8);
    }

    #[test]
    fn test_rejects_non_positive_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[capture]\nwindow_seconds = 0\n").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(CoreError::ConfigError(_))
        ));
    }
}
