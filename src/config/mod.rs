use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Default OpenAI chat-completions endpoint.
pub const DEFAULT_MODEL_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
/// Default OpenWeatherMap current-weather endpoint.
pub const DEFAULT_WEATHER_ENDPOINT: &str = "https://api.openweathermap.org/data/2.5/weather";
/// Default SerpAPI search endpoint.
pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://serpapi.com/search.json";

/// Top-level configuration.
///
/// Every component receives the pieces it needs from this value at
/// construction time; nothing below `main` reads the process environment
/// or the working directory on its own.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Directory notes are written to (`agent_notes` by default).
    #[serde(default = "default_notes_dir")]
    pub notes_dir: PathBuf,
    /// Directory rendered charts are written to (`visualizations` by default).
    #[serde(default = "default_visualizations_dir")]
    pub visualizations_dir: PathBuf,
    /// Directory `list_directory` falls back to when called without a path.
    /// Filled with the process working directory when absent.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    /// Language model settings.
    #[serde(default)]
    pub model: ModelConfig,
    /// Weather API settings.
    #[serde(default)]
    pub weather: WeatherConfig,
    /// Web search settings.
    #[serde(default)]
    pub search: SearchConfig,
    /// Chat gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// Maximum tool-call round trips per turn.
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: usize,
}

fn default_notes_dir() -> PathBuf {
    PathBuf::from("agent_notes")
}

fn default_visualizations_dir() -> PathBuf {
    PathBuf::from("visualizations")
}

fn default_max_tool_iterations() -> usize {
    5
}

/// Hosted language model settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    /// Chat-completions endpoint.
    #[serde(default = "default_model_endpoint")]
    pub endpoint: String,
    /// Model name sent in the request body.
    #[serde(default = "default_model_name")]
    pub model: String,
    /// API key (plain text or `$ENV_VAR` reference). Falls back to `OPENAI_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_model_endpoint() -> String {
    DEFAULT_MODEL_ENDPOINT.to_string()
}

fn default_model_name() -> String {
    "gpt-4-turbo".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: default_model_endpoint(),
            model: default_model_name(),
            api_key: None,
            temperature: default_temperature(),
        }
    }
}

/// Weather API settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WeatherConfig {
    #[serde(default = "default_weather_endpoint")]
    pub endpoint: String,
    /// Falls back to `WEATHER_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_weather_endpoint() -> String {
    DEFAULT_WEATHER_ENDPOINT.to_string()
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            endpoint: default_weather_endpoint(),
            api_key: None,
        }
    }
}

/// Web search settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SearchConfig {
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,
    /// SerpAPI engine parameter.
    #[serde(default = "default_search_engine")]
    pub engine: String,
    /// Falls back to `SERPAPI_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_search_endpoint() -> String {
    DEFAULT_SEARCH_ENDPOINT.to_string()
}

fn default_search_engine() -> String {
    "google".to_string()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_search_endpoint(),
            engine: default_search_engine(),
            api_key: None,
        }
    }
}

/// Chat gateway settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Listen address.
    #[serde(default = "default_gateway_addr")]
    pub addr: String,
    /// Directory holding the chat page.
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

fn default_gateway_addr() -> String {
    "127.0.0.1:8501".to_string()
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            addr: default_gateway_addr(),
            static_dir: default_static_dir(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            notes_dir: default_notes_dir(),
            visualizations_dir: default_visualizations_dir(),
            working_dir: None,
            model: ModelConfig::default(),
            weather: WeatherConfig::default(),
            search: SearchConfig::default(),
            gateway: GatewayConfig::default(),
            max_tool_iterations: default_max_tool_iterations(),
        }
    }
}

/// Resolve a configured secret.
///
/// * `Some("$VAR")` / `Some("${VAR}")` reads `VAR` through `lookup`.
/// * `Some("literal")` is used as-is.
/// * `None` (or an empty value) falls back to `fallback_var`.
///
/// Empty results are treated as absent.
pub fn resolve_secret(
    configured: Option<&str>,
    fallback_var: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Option<String> {
    let value = match configured.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => match v.strip_prefix('$') {
            Some(var) => {
                let var = var.trim_start_matches('{').trim_end_matches('}');
                lookup(var)
            }
            None => Some(v.to_string()),
        },
        None => lookup(fallback_var),
    };
    value.filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Read and parse a YAML configuration file.
    pub async fn load(path: &Path) -> anyhow::Result<Config> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config = Self::from_yaml(&contents)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Load `path` when given, otherwise start from defaults.
    pub async fn load_or_default(path: Option<&Path>) -> anyhow::Result<Config> {
        match path {
            Some(p) => Self::load(p).await,
            None => Ok(Config::default()),
        }
    }

    /// Parse and validate YAML text.
    pub fn from_yaml(contents: &str) -> anyhow::Result<Config> {
        let config: Config =
            serde_yaml_ng::from_str(contents).context("failed to parse config YAML")?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve secrets and the working directory against the process
    /// environment.  Called once at startup.
    pub fn resolve_from_env(self) -> anyhow::Result<Config> {
        let cwd = std::env::current_dir().context("cannot determine working directory")?;
        Ok(self.resolve_with(|var| std::env::var(var).ok(), cwd))
    }

    /// Like [`resolve_from_env`](Config::resolve_from_env) with an explicit
    /// variable lookup and working directory.
    pub fn resolve_with(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
        cwd: PathBuf,
    ) -> Config {
        self.model.api_key = resolve_secret(self.model.api_key.as_deref(), "OPENAI_API_KEY", &lookup);
        self.weather.api_key =
            resolve_secret(self.weather.api_key.as_deref(), "WEATHER_API_KEY", &lookup);
        self.search.api_key =
            resolve_secret(self.search.api_key.as_deref(), "SERPAPI_API_KEY", &lookup);
        if self.working_dir.is_none() {
            self.working_dir = Some(cwd);
        }
        self
    }

    /// Directory used by `list_directory` when no path is given.
    pub fn working_dir(&self) -> PathBuf {
        self.working_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Validate semantic constraints that serde cannot enforce.
    fn validate(&self) -> anyhow::Result<()> {
        if self.notes_dir.as_os_str().is_empty() {
            anyhow::bail!("config: notes_dir must not be empty");
        }
        if self.visualizations_dir.as_os_str().is_empty() {
            anyhow::bail!("config: visualizations_dir must not be empty");
        }
        if self.max_tool_iterations == 0 {
            anyhow::bail!("config: max_tool_iterations must be at least 1");
        }
        if self.model.model.trim().is_empty() {
            anyhow::bail!("config: model.model must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn resolve_secret_plain_value() {
        assert_eq!(
            resolve_secret(Some("sk-123"), "X", env(&[])),
            Some("sk-123".into())
        );
    }

    #[test]
    fn resolve_secret_env_reference() {
        let lookup = env(&[("MY_KEY", "abc")]);
        assert_eq!(resolve_secret(Some("$MY_KEY"), "X", &lookup), Some("abc".into()));
        assert_eq!(resolve_secret(Some("${MY_KEY}"), "X", &lookup), Some("abc".into()));
    }

    #[test]
    fn resolve_secret_falls_back_to_standard_var() {
        let lookup = env(&[("WEATHER_API_KEY", "w")]);
        assert_eq!(resolve_secret(None, "WEATHER_API_KEY", &lookup), Some("w".into()));
    }

    #[test]
    fn resolve_secret_empty_is_absent() {
        let lookup = env(&[("EMPTY", "  ")]);
        assert_eq!(resolve_secret(Some("$EMPTY"), "X", &lookup), None);
        assert_eq!(resolve_secret(Some(""), "X", &lookup), None);
        assert_eq!(resolve_secret(None, "MISSING", &lookup), None);
    }

    #[test]
    fn yaml_defaults_fill_in() {
        let cfg = Config::from_yaml("notes_dir: my_notes\n").unwrap();
        assert_eq!(cfg.notes_dir, PathBuf::from("my_notes"));
        assert_eq!(cfg.visualizations_dir, PathBuf::from("visualizations"));
        assert_eq!(cfg.model.model, "gpt-4-turbo");
        assert_eq!(cfg.max_tool_iterations, 5);
    }

    #[test]
    fn yaml_rejects_unknown_fields() {
        assert!(Config::from_yaml("bogus: 1\n").is_err());
    }

    #[test]
    fn yaml_rejects_zero_iterations() {
        let err = Config::from_yaml("max_tool_iterations: 0\n").unwrap_err();
        assert!(err.to_string().contains("max_tool_iterations"));
    }

    #[test]
    fn resolve_with_fills_keys_and_cwd() {
        let cfg = Config::default().resolve_with(
            env(&[("OPENAI_API_KEY", "o"), ("SERPAPI_API_KEY", "s")]),
            PathBuf::from("/tmp/work"),
        );
        assert_eq!(cfg.model.api_key.as_deref(), Some("o"));
        assert_eq!(cfg.search.api_key.as_deref(), Some("s"));
        assert_eq!(cfg.weather.api_key, None);
        assert_eq!(cfg.working_dir(), PathBuf::from("/tmp/work"));
    }
}
