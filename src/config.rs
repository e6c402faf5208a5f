use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::metrics::{AggregateOptions, CloseRateBasis};
use crate::normalize::RowSchema;
use crate::record::{normalize_member, XpWeights};

/// One team member's sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemberConfig {
    pub key: String,
    #[serde(default)]
    pub display_name: Option<String>,
    /// JSON or CSV export of the member's activity rows.
    pub rows: PathBuf,
    /// Forces a layout instead of detecting it.
    #[serde(default)]
    pub schema: Option<RowSchema>,
}

impl MemberConfig {
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.key)
    }
}

/// Dashboard configuration, read from `~/.dashmetrics/config.json` unless a
/// path is given. Relative paths resolve against the config file's directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub members: Vec<MemberConfig>,
    pub projections: Option<PathBuf>,
    pub marketing_projections: Option<PathBuf>,
    pub xp_weights: XpWeights,
    pub close_rate_basis: CloseRateBasis,
    pub level_step_xp: f64,
    pub milestone_xp: f64,
    #[serde(skip)]
    base_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let options = AggregateOptions::default();
        Self {
            members: Vec::new(),
            projections: None,
            marketing_projections: None,
            xp_weights: XpWeights::default(),
            close_rate_basis: options.close_rate_basis,
            level_step_xp: options.level_step_xp,
            milestone_xp: options.milestone_xp,
            base_dir: PathBuf::new(),
        }
    }
}

impl Config {
    /// `~/.dashmetrics/config.json`.
    pub fn default_path() -> Result<PathBuf> {
        let dir = dirs::home_dir()
            .ok_or_else(|| Error::Config("cannot determine home directory".into()))?
            .join(".dashmetrics");
        Ok(dir.join("config.json"))
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        let mut config = Self::from_json(&text)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        config.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        log::debug!(
            "Loaded config from {} with {} members",
            path.display(),
            config.members.len()
        );
        Ok(config)
    }

    /// Like [`Config::load`], but a missing file yields the defaults. A file
    /// that exists and fails to parse is still an error.
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let exists = tokio::fs::try_exists(path)
            .await
            .map_err(|e| Error::Config(format!("cannot stat {}: {e}", path.display())))?;
        if !exists {
            log::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path).await
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for m in &self.members {
            let key = normalize_member(&m.key);
            if key.is_empty() || key == "ALL" {
                return Err(Error::Config(format!("invalid member key '{}'", m.key)));
            }
            if !seen.insert(key) {
                return Err(Error::Config(format!("duplicate member key '{}'", m.key)));
            }
        }
        Ok(())
    }

    pub fn aggregate_options(&self) -> AggregateOptions {
        AggregateOptions {
            close_rate_basis: self.close_rate_basis,
            level_step_xp: self.level_step_xp,
            milestone_xp: self.milestone_xp,
        }
    }

    pub fn member(&self, key: &str) -> Option<&MemberConfig> {
        self.members
            .iter()
            .find(|m| m.key.eq_ignore_ascii_case(key.trim()))
    }

    /// Member keys in configured order, normalized.
    pub fn member_keys(&self) -> Vec<String> {
        self.members.iter().map(|m| normalize_member(&m.key)).collect()
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "members": [
            {"key": "chris", "display_name": "Chris", "rows": "chris.json"},
            {"key": "israel", "rows": "/data/israel.csv", "schema": "raw_data"}
        ],
        "projections": "projections.json",
        "close_rate_basis": "shows",
        "xp_weights": {"outbound": 2}
    }"#;

    #[test]
    fn test_from_json_defaults() {
        let config = Config::from_json(SAMPLE).unwrap();
        assert_eq!(config.members.len(), 2);
        assert_eq!(config.members[1].display_name(), "israel");
        assert_eq!(config.members[1].schema, Some(RowSchema::RawData));
        assert_eq!(config.close_rate_basis, CloseRateBasis::Shows);
        assert_eq!(config.level_step_xp, 2000.0);
        assert_eq!(config.xp_weights.outbound, 2.0);
        assert_eq!(config.xp_weights.closes, 50.0);
        assert_eq!(config.member_keys(), vec!["CHRIS", "ISRAEL"]);
        assert!(config.member("Chris").is_some());
    }

    #[test]
    fn test_unknown_fields_rejected() {
        assert!(Config::from_json(r#"{"membres": []}"#).is_err());
        assert!(Config::from_json(r#"{"xp_weights": {"dials": 1}}"#).is_err());
    }

    #[test]
    fn test_member_keys_validated() {
        let dup = r#"{"members": [
            {"key": "a", "rows": "a.json"},
            {"key": "A", "rows": "b.json"}
        ]}"#;
        assert!(matches!(Config::from_json(dup), Err(Error::Config(_))));
        let all = r#"{"members": [{"key": "all", "rows": "a.json"}]}"#;
        assert!(matches!(Config::from_json(all), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_load_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = Config::load(&path).await.unwrap();
        assert_eq!(
            config.resolve(&config.members[0].rows),
            dir.path().join("chris.json")
        );
        assert_eq!(
            config.resolve(&config.members[1].rows),
            PathBuf::from("/data/israel.csv")
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(dir.path().join("nope.json")).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_load_or_default_only_forgives_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = Config::load_or_default(dir.path().join("nope.json"))
            .await
            .unwrap();
        assert_eq!(missing, Config::default());

        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = Config::load_or_default(&path).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
