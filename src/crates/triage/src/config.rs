//! Pipeline configuration.
//!
//! Loaded from a TOML file, with `TRIAGE_*` environment variables
//! taking precedence so deployments can override secrets and
//! endpoints without editing the file.

use crate::retry::RetryConfig;
use crate::sinks::GithubConfig;
use crate::{Result, TriageError};
use llm::LlmConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

/// Audit ledger target: a CSV file plus the range label written into
/// each append call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Path of the CSV ledger file.
    pub path: String,

    /// Range/sheet label, informational for the CSV backend.
    #[serde(default = "default_range")]
    pub range: String,
}

fn default_range() -> String {
    "reports".to_string()
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageConfig {
    /// Sqlite connection string, e.g. "sqlite://triage.db".
    pub database_url: String,

    /// Completion backend configuration.
    pub llm: LlmConfig,

    /// Issue tracker configuration.
    pub github: GithubConfig,

    /// Audit ledger target. Optional; processing runs without one.
    #[serde(default)]
    pub ledger: Option<LedgerConfig>,

    /// Retry strategy for issue creation.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Enrichment backend call timeout, in seconds.
    #[serde(default = "default_enrichment_timeout_secs")]
    pub enrichment_timeout_secs: u64,
}

fn default_enrichment_timeout_secs() -> u64 {
    60
}

impl TriageConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TriageError::Config(format!("failed to read config file {}: {e}", path.display()))
        })?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| TriageError::Config(format!("failed to parse TOML config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file with environment overrides.
    pub fn from_file_with_env(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// Supported variables:
    /// - TRIAGE_DATABASE_URL
    /// - TRIAGE_LLM_BASE_URL, TRIAGE_LLM_MODEL, TRIAGE_LLM_TEMPERATURE
    /// - TRIAGE_GITHUB_OWNER, TRIAGE_GITHUB_REPO, TRIAGE_GITHUB_TOKEN,
    ///   TRIAGE_GITHUB_ASSIGNEE
    /// - TRIAGE_LEDGER_PATH
    /// - TRIAGE_MAX_ATTEMPTS
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = env::var("TRIAGE_DATABASE_URL") {
            self.database_url = url;
        }

        if let Ok(base_url) = env::var("TRIAGE_LLM_BASE_URL") {
            self.llm.base_url = base_url;
        }
        if let Ok(model) = env::var("TRIAGE_LLM_MODEL") {
            self.llm.model = model;
        }
        if let Ok(temp) = env::var("TRIAGE_LLM_TEMPERATURE") {
            if let Ok(value) = temp.parse::<f32>() {
                self.llm.temperature = value.clamp(0.0, 1.0);
            }
        }

        if let Ok(owner) = env::var("TRIAGE_GITHUB_OWNER") {
            self.github.owner = owner;
        }
        if let Ok(repo) = env::var("TRIAGE_GITHUB_REPO") {
            self.github.repo = repo;
        }
        if let Ok(token) = env::var("TRIAGE_GITHUB_TOKEN") {
            self.github.token = token;
        }
        if let Ok(assignee) = env::var("TRIAGE_GITHUB_ASSIGNEE") {
            self.github.assignee = Some(assignee);
        }

        if let Ok(path) = env::var("TRIAGE_LEDGER_PATH") {
            match &mut self.ledger {
                Some(ledger) => ledger.path = path,
                None => {
                    self.ledger = Some(LedgerConfig {
                        path,
                        range: default_range(),
                    })
                }
            }
        }

        if let Ok(attempts) = env::var("TRIAGE_MAX_ATTEMPTS") {
            if let Ok(value) = attempts.parse::<u32>() {
                self.retry.max_attempts = value;
            }
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.database_url.is_empty() {
            return Err(TriageError::Config(
                "database_url cannot be empty".to_string(),
            ));
        }
        if self.llm.base_url.is_empty() {
            return Err(TriageError::Config(
                "llm.base_url cannot be empty".to_string(),
            ));
        }
        if self.llm.model.is_empty() {
            return Err(TriageError::Config("llm.model cannot be empty".to_string()));
        }
        if self.github.owner.is_empty() || self.github.repo.is_empty() {
            return Err(TriageError::Config(
                "github.owner and github.repo are required".to_string(),
            ));
        }
        if self.github.token.is_empty() {
            return Err(TriageError::Config(
                "github.token cannot be empty".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(TriageError::Config(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.enrichment_timeout_secs == 0 {
            return Err(TriageError::Config(
                "enrichment_timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn sample_toml() -> &'static str {
        r#"
database_url = "sqlite://triage.db"
enrichment_timeout_secs = 45

[llm]
base_url = "http://localhost:11434"
model = "llama3.1"

[github]
owner = "acme"
repo = "platform"
token = "ghp_test"

[ledger]
path = "/var/log/triage/ledger.csv"

[retry]
max_attempts = 3
"#
    }

    fn write_config(toml: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(toml.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_from_toml() {
        let file = write_config(sample_toml());
        let config = TriageConfig::from_file(file.path()).unwrap();

        assert_eq!(config.database_url, "sqlite://triage.db");
        assert_eq!(config.llm.model, "llama3.1");
        assert_eq!(config.llm.temperature, 0.2);
        assert_eq!(config.github.owner, "acme");
        assert!(config.github.assignee.is_none());
        assert_eq!(config.ledger.as_ref().unwrap().range, "reports");
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.enrichment_timeout_secs, 45);
    }

    #[test]
    fn test_ledger_section_optional() {
        let toml = r#"
database_url = "sqlite://triage.db"

[llm]
base_url = "http://localhost:11434"
model = "llama3.1"

[github]
owner = "acme"
repo = "platform"
token = "ghp_test"
"#;
        let file = write_config(toml);
        let config = TriageConfig::from_file(file.path()).unwrap();

        assert!(config.ledger.is_none());
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.enrichment_timeout_secs, 60);
    }

    #[test]
    fn test_validation_rejects_missing_token() {
        let toml = sample_toml().replace("ghp_test", "");
        let file = write_config(&toml);
        assert!(TriageConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn test_validation_rejects_zero_attempts() {
        let toml = sample_toml().replace("max_attempts = 3", "max_attempts = 0");
        let file = write_config(&toml);
        assert!(TriageConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let file = write_config(sample_toml());

        env::set_var("TRIAGE_GITHUB_TOKEN", "ghp_live");
        env::set_var("TRIAGE_LLM_MODEL", "mistral");
        env::set_var("TRIAGE_MAX_ATTEMPTS", "5");

        let config = TriageConfig::from_file_with_env(file.path()).unwrap();
        assert_eq!(config.github.token, "ghp_live");
        assert_eq!(config.llm.model, "mistral");
        assert_eq!(config.retry.max_attempts, 5);

        env::remove_var("TRIAGE_GITHUB_TOKEN");
        env::remove_var("TRIAGE_LLM_MODEL");
        env::remove_var("TRIAGE_MAX_ATTEMPTS");
    }

    #[test]
    fn test_env_can_introduce_ledger() {
        let file = write_config(sample_toml());
        let mut config = TriageConfig::from_file(file.path()).unwrap();
        config.ledger = None;

        env::set_var("TRIAGE_LEDGER_PATH", "/tmp/ledger.csv");
        config.apply_env_overrides();
        env::remove_var("TRIAGE_LEDGER_PATH");

        let ledger = config.ledger.unwrap();
        assert_eq!(ledger.path, "/tmp/ledger.csv");
        assert_eq!(ledger.range, "reports");
    }
}
