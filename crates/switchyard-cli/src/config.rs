use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use switchyard_core::{ExecutorConfig, GoogleProvider, InstructionMap, RouterConfig};

const DEFAULT_CONFIG: &str = include_str!("../../../config/default.toml");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchyardConfig {
    pub oracle: OracleConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub startup: StartupConfig,
    #[serde(default)]
    pub instructions: InstructionsConfig,
    /// Directory of the file this config was read from
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_standard_model")]
    pub standard_model: String,
    #[serde(default = "default_creative_model")]
    pub creative_model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
}

impl std::fmt::Debug for OracleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleConfig")
            .field("api_key", &mask_secret(&self.api_key))
            .field("base_url", &self.base_url)
            .field("standard_model", &self.standard_model)
            .field("creative_model", &self.creative_model)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_output_tokens", &self.max_output_tokens)
            .finish()
    }
}

fn default_base_url() -> String {
    switchyard_core::providers::google::DEFAULT_BASE_URL.to_string()
}
fn default_standard_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_creative_model() -> String {
    "gemini-2.5-pro".to_string()
}
fn default_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    #[serde(default = "default_fallback_key")]
    pub fallback_key: String,
    #[serde(default = "default_creative_key")]
    pub creative_key: String,
    #[serde(default)]
    pub router_temperature: f32,
}

fn default_fallback_key() -> String {
    "PlannerAgent".to_string()
}
fn default_creative_key() -> String {
    "CreativeAgent".to_string()
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            fallback_key: default_fallback_key(),
            creative_key: default_creative_key(),
            router_temperature: 0.0,
        }
    }
}

/// What to do when no API key is available at startup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingCredentialPolicy {
    /// Log a warning and keep going; every call will fail and degrade
    #[default]
    Warn,
    /// Refuse to start
    FailFast,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartupConfig {
    #[serde(default)]
    pub on_missing_credential: MissingCredentialPolicy,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstructionsConfig {
    /// Custom instruction map; the built-in set is used when unset
    #[serde(default)]
    pub file: Option<String>,
}

fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "(empty)".to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    if chars.len() > 7 {
        let prefix: String = chars[..3].iter().collect();
        let suffix: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", prefix, suffix)
    } else {
        "***".to_string()
    }
}

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".switchyard")
}

impl SwitchyardConfig {
    /// Load from `custom_path`, else `~/.switchyard/config.toml`, else the
    /// built-in defaults
    pub fn load(custom_path: &Option<PathBuf>) -> Result<Self> {
        let path = custom_path
            .clone()
            .unwrap_or_else(|| config_dir().join("config.toml"));

        if custom_path.is_none() && !path.exists() {
            debug!("No config at {}, using built-in defaults", path.display());
            return Self::from_toml_str(DEFAULT_CONFIG);
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Ok(metadata) = std::fs::metadata(&path) {
                let mode = metadata.permissions().mode();
                if mode & 0o077 != 0 {
                    warn!(
                        "Config file {} is readable by other users ({:o}). \
                         If it holds an API key, fix with: chmod 600 {}",
                        path.display(),
                        mode & 0o777,
                        path.display()
                    );
                }
            }
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config at {}", path.display()))?;

        let mut config = Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config at {}", path.display()))?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    /// Expand allowlisted `${VAR}`s from the process environment and parse
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Self::from_toml_str_with(content, |name| std::env::var(name).ok())
    }

    fn from_toml_str_with(
        content: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let expanded = expand_env_vars(content, lookup);
        let config: Self = toml::from_str(&expanded)?;

        if config.oracle.api_key.starts_with("AIza") && !content.contains("${") {
            warn!(
                "API key is hardcoded in config file. For security, use environment variables: api_key = \"${{GEMINI_API_KEY}}\""
            );
        }

        Ok(config)
    }

    /// The API key, if one was actually provided
    pub fn credential(&self) -> Option<&str> {
        let key = self.oracle.api_key.trim();
        if key.is_empty() || key.contains("${") {
            None
        } else {
            Some(key)
        }
    }

    /// Apply `on_missing_credential`
    pub fn check_credential(&self) -> Result<()> {
        if self.credential().is_some() {
            return Ok(());
        }
        match self.startup.on_missing_credential {
            MissingCredentialPolicy::Warn => {
                warn!(
                    "No API key found. Set GEMINI_API_KEY; every request will fail until then."
                );
                Ok(())
            }
            MissingCredentialPolicy::FailFast => Err(anyhow!(
                "No API key found. Set GEMINI_API_KEY or oracle.api_key in the config."
            )),
        }
    }

    /// Built-in instructions, or the configured file resolved against the
    /// config's directory
    pub fn instruction_map(&self) -> Result<InstructionMap> {
        let Some(file) = &self.instructions.file else {
            return InstructionMap::builtin().context("Built-in instruction map is invalid");
        };

        let path = self.resolve_path(file);
        InstructionMap::load(&path)
            .with_context(|| format!("Failed to load instructions from {}", path.display()))
    }

    fn resolve_path(&self, file: &str) -> PathBuf {
        let path = match (file.strip_prefix("~/"), dirs::home_dir()) {
            (Some(rest), Some(home)) => home.join(rest),
            _ => PathBuf::from(file),
        };
        match &self.base_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path,
        }
    }

    pub fn provider(&self) -> Result<GoogleProvider> {
        let provider = GoogleProvider::new(
            self.credential().unwrap_or_default().to_string(),
            &self.oracle.base_url,
            Duration::from_secs(self.oracle.timeout_secs),
        )
        .context("Failed to create Gemini client")?;
        Ok(provider.with_max_output_tokens(self.oracle.max_output_tokens))
    }

    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            model: self.oracle.standard_model.clone(),
            fallback_key: self.routing.fallback_key.clone(),
            temperature: self.routing.router_temperature,
        }
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            standard_model: self.oracle.standard_model.clone(),
            creative_model: self.oracle.creative_model.clone(),
            creative_key: self.routing.creative_key.clone(),
        }
    }

    /// TOML rendering with the API key masked
    pub fn to_masked_toml(&self) -> Result<String> {
        let mut masked = self.clone();
        masked.oracle.api_key = mask_secret(&self.oracle.api_key);
        Ok(toml::to_string_pretty(&masked)?)
    }
}

/// Allowlist of environment variable names that may be expanded in config files
const ALLOWED_ENV_VARS: &[&str] = &[
    "GEMINI_API_KEY",
    "GOOGLE_AI_API_KEY",
    "GOOGLE_API_KEY",
    "HOME",
    "USER",
];

fn expand_env_vars(s: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut result = s.to_string();
    let mut pos = 0;
    while pos < result.len() {
        let Some(start) = result[pos..].find("${") else {
            break;
        };
        let abs_start = pos + start;
        let Some(end) = result[abs_start..].find('}') else {
            break;
        };
        let var_name = result[abs_start + 2..abs_start + end].to_string();

        if !ALLOWED_ENV_VARS.contains(&var_name.as_str()) {
            warn!(
                "Skipping expansion of unrecognized env var '{}' in config (not in allowlist)",
                var_name
            );
            pos = abs_start + end + 1;
            continue;
        }

        let value = lookup(&var_name).unwrap_or_default();
        let value_len = value.len();
        result = format!(
            "{}{}{}",
            &result[..abs_start],
            value,
            &result[abs_start + end + 1..]
        );
        pos = abs_start + value_len;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |name| {
            pairs
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_default_config_parses() {
        let config =
            SwitchyardConfig::from_toml_str_with(DEFAULT_CONFIG, env(&[("GEMINI_API_KEY", "k")]))
                .unwrap();
        assert_eq!(config.oracle.standard_model, "gemini-2.5-flash");
        assert_eq!(config.oracle.creative_model, "gemini-2.5-pro");
        assert_eq!(config.oracle.timeout_secs, 120);
        assert_eq!(config.oracle.max_output_tokens, None);
        assert_eq!(config.routing.fallback_key, "PlannerAgent");
        assert_eq!(config.routing.creative_key, "CreativeAgent");
        assert_eq!(config.routing.router_temperature, 0.0);
        assert_eq!(
            config.startup.on_missing_credential,
            MissingCredentialPolicy::Warn
        );
        assert_eq!(config.credential(), Some("k"));
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config =
            SwitchyardConfig::from_toml_str_with("[oracle]\napi_key = \"abc\"\n", env(&[]))
                .unwrap();
        assert_eq!(config.oracle.base_url, default_base_url());
        assert_eq!(config.routing.fallback_key, "PlannerAgent");
        assert!(config.instructions.file.is_none());
    }

    #[test]
    fn test_policy_parsing() {
        let config = SwitchyardConfig::from_toml_str_with(
            "[oracle]\n[startup]\non_missing_credential = \"fail_fast\"\n",
            env(&[]),
        )
        .unwrap();
        assert_eq!(
            config.startup.on_missing_credential,
            MissingCredentialPolicy::FailFast
        );

        let bad = SwitchyardConfig::from_toml_str_with(
            "[oracle]\n[startup]\non_missing_credential = \"panic\"\n",
            env(&[]),
        );
        assert!(bad.is_err());
    }

    #[test]
    fn test_missing_credential_warn_continues() {
        let config = SwitchyardConfig::from_toml_str_with(DEFAULT_CONFIG, env(&[])).unwrap();
        assert_eq!(config.credential(), None);
        assert!(config.check_credential().is_ok());
    }

    #[test]
    fn test_missing_credential_fail_fast() {
        let mut config = SwitchyardConfig::from_toml_str_with(DEFAULT_CONFIG, env(&[])).unwrap();
        config.startup.on_missing_credential = MissingCredentialPolicy::FailFast;
        assert!(config.check_credential().is_err());

        config.oracle.api_key = "AIza-present".to_string();
        assert!(config.check_credential().is_ok());
    }

    #[test]
    fn test_unexpanded_placeholder_is_not_a_credential() {
        let config = SwitchyardConfig::from_toml_str_with(
            "[oracle]\napi_key = \"${SOME_OTHER_SECRET}\"\n",
            env(&[("SOME_OTHER_SECRET", "leak")]),
        )
        .unwrap();
        assert_eq!(config.oracle.api_key, "${SOME_OTHER_SECRET}");
        assert_eq!(config.credential(), None);
    }

    #[test]
    fn test_expand_env_vars() {
        let out = expand_env_vars(
            "a=${GEMINI_API_KEY} b=${USER} c=${PATH}",
            env(&[("GEMINI_API_KEY", "key"), ("USER", "nomi"), ("PATH", "/bin")]),
        );
        assert_eq!(out, "a=key b=nomi c=${PATH}");
    }

    #[test]
    fn test_expand_env_vars_unset_and_unterminated() {
        assert_eq!(expand_env_vars("x=${HOME}", env(&[])), "x=");
        assert_eq!(expand_env_vars("x=${HOME", env(&[])), "x=${HOME");
    }

    #[test]
    fn test_model_settings_flow_into_core_configs() {
        let config = SwitchyardConfig::from_toml_str_with(
            "[oracle]\nstandard_model = \"fast\"\ncreative_model = \"slow\"\n\
             [routing]\nfallback_key = \"UrlContextAgent\"\ncreative_key = \"PolyAgent\"\nrouter_temperature = 0.2\n",
            env(&[]),
        )
        .unwrap();

        let router = config.router_config();
        assert_eq!(router.model, "fast");
        assert_eq!(router.fallback_key, "UrlContextAgent");
        assert!((router.temperature - 0.2).abs() < f32::EPSILON);

        let executor = config.executor_config();
        assert_eq!(executor.select_model("PolyAgent"), "slow");
        assert_eq!(executor.select_model("CreativeAgent"), "fast");
    }

    #[test]
    fn test_instruction_file_relative_to_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("agents.toml"),
            "[[agent]]\nkey = \"PlannerAgent\"\ninstruction = \"Plan.\"\n",
        )
        .unwrap();
        let config_path = dir.path().join("config.toml");
        std::fs::write(
            &config_path,
            "[oracle]\napi_key = \"k\"\n[instructions]\nfile = \"agents.toml\"\n",
        )
        .unwrap();

        let config = SwitchyardConfig::load(&Some(config_path)).unwrap();
        let map = config.instruction_map().unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("PlannerAgent"), Some("Plan."));
    }

    #[test]
    fn test_builtin_instructions_when_unset() {
        let config = SwitchyardConfig::from_toml_str_with(DEFAULT_CONFIG, env(&[])).unwrap();
        assert_eq!(config.instruction_map().unwrap().len(), 13);
    }

    #[test]
    fn test_load_missing_custom_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = SwitchyardConfig::load(&Some(dir.path().join("missing.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_debug_and_display_mask_key() {
        let mut config = SwitchyardConfig::from_toml_str_with(DEFAULT_CONFIG, env(&[])).unwrap();
        config.oracle.api_key = "AIzaSyVerySecretValue1234".to_string();

        let debug = format!("{:?}", config);
        assert!(!debug.contains("VerySecret"));

        let rendered = config.to_masked_toml().unwrap();
        assert!(!rendered.contains("VerySecret"));
        assert!(rendered.contains("AIz...1234"));
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret(""), "(empty)");
        assert_eq!(mask_secret("short"), "***");
        assert_eq!(mask_secret("AIzaSy123456"), "AIz...3456");
    }
}
