use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const ENV_PROVIDER: &str = "FORMGEN_PROVIDER";
pub const ENV_MODEL: &str = "FORMGEN_MODEL";
pub const ENV_BASE_URL: &str = "FORMGEN_BASE_URL";
pub const ENV_TEMPERATURE: &str = "FORMGEN_TEMPERATURE";
pub const ENV_MAX_OUTPUT_TOKENS: &str = "FORMGEN_MAX_OUTPUT_TOKENS";
pub const ENV_TIMEOUT_SECS: &str = "FORMGEN_TIMEOUT_SECS";
pub const ENV_STORE_DIR: &str = "FORMGEN_STORE_DIR";
pub const ENV_DEBUG: &str = "FORMGEN_DEBUG";
pub const ENV_DEBUG_DIR: &str = "FORMGEN_DEBUG_DIR";

const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 1000;
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_STORE_DIR: &str = "documents";
const DEFAULT_DEBUG_DIR: &str = "debug_out";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} is not set; it is required to call the {provider} generation model")]
    MissingCredential { var: &'static str, provider: Provider },

    #[error("{var}=`{value}` is invalid: {reason}")]
    InvalidValue {
        var: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    OpenAi,
}

impl Provider {
    pub fn credential_var(self) -> &'static str {
        match self {
            Provider::Gemini => "GEMINI_API_KEY",
            Provider::OpenAi => "OPENAI_API_KEY",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Provider::Gemini => "gemini-2.0-flash",
            Provider::OpenAi => "gpt-4o-mini",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Provider::Gemini => "gemini",
            Provider::OpenAi => "openai",
        })
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(Provider::Gemini),
            "openai" => Ok(Provider::OpenAi),
            _ => Err("expected `gemini` or `openai`".to_string()),
        }
    }
}

/// Options forwarded to the generation model on every call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl GenerationParams {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(invalid(ENV_MODEL, &self.model, "model id must not be empty"));
        }
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(invalid(
                ENV_TEMPERATURE,
                &self.temperature.to_string(),
                "temperature must be within [0, 1]",
            ));
        }
        if self.max_output_tokens == 0 {
            return Err(invalid(ENV_MAX_OUTPUT_TOKENS, "0", "must be a positive integer"));
        }
        Ok(())
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self::new(Provider::Gemini.default_model())
    }
}

#[derive(Clone)]
pub struct Config {
    pub provider: Provider,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub params: GenerationParams,
    pub timeout: Duration,
    pub store_dir: PathBuf,
    pub debug_dir: Option<PathBuf>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("params", &self.params)
            .field("timeout", &self.timeout)
            .field("store_dir", &self.store_dir)
            .field("debug_dir", &self.debug_dir)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let provider = match get(ENV_PROVIDER) {
            Some(raw) => raw
                .parse::<Provider>()
                .map_err(|reason| invalid(ENV_PROVIDER, &raw, &reason))?,
            None => Provider::Gemini,
        };

        let mut params = GenerationParams::new(
            get(ENV_MODEL).unwrap_or_else(|| provider.default_model().to_string()),
        );
        if let Some(raw) = get(ENV_TEMPERATURE) {
            params.temperature = parse_var(ENV_TEMPERATURE, &raw)?;
        }
        if let Some(raw) = get(ENV_MAX_OUTPUT_TOKENS) {
            params.max_output_tokens = parse_var(ENV_MAX_OUTPUT_TOKENS, &raw)?;
        }
        params.validate()?;

        let timeout_secs = match get(ENV_TIMEOUT_SECS) {
            Some(raw) => parse_var::<u64>(ENV_TIMEOUT_SECS, &raw)?,
            None => DEFAULT_TIMEOUT_SECS,
        };
        if timeout_secs == 0 {
            return Err(invalid(ENV_TIMEOUT_SECS, "0", "must be a positive number of seconds"));
        }

        let debug = get(ENV_DEBUG).map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);

        Ok(Self {
            provider,
            api_key: get(provider.credential_var()),
            base_url: get(ENV_BASE_URL),
            params,
            timeout: Duration::from_secs(timeout_secs),
            store_dir: PathBuf::from(get(ENV_STORE_DIR).unwrap_or_else(|| DEFAULT_STORE_DIR.to_string())),
            debug_dir: debug.then(|| {
                PathBuf::from(get(ENV_DEBUG_DIR).unwrap_or_else(|| DEFAULT_DEBUG_DIR.to_string()))
            }),
        })
    }

    /// The model credential; generation must not start without it.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key.as_deref().ok_or(ConfigError::MissingCredential {
            var: self.provider.credential_var(),
            provider: self.provider,
        })
    }
}

fn parse_var<T: FromStr>(var: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: fmt::Display,
{
    raw.parse::<T>().map_err(|err| invalid(var, raw, &err.to_string()))
}

fn invalid(var: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        var: var.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
