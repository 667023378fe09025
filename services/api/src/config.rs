use relay_core::SessionDefaults;
use secrecy::SecretString;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// PEM certificate and key used to serve HTTPS.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// Missing keys are tolerated at startup; session creation reports them.
    pub api_key: Option<SecretString>,
    pub provider_base_url: String,
    pub model: String,
    pub voice: String,
    pub temperature: f32,
    pub instructions_path: PathBuf,
    pub max_sessions: usize,
    pub tls: Option<TlsConfig>,
    pub public_dir: PathBuf,
    /// `None` disables the rolling log file.
    pub log_dir: Option<PathBuf>,
    pub log_level: Level,
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T>(name: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = var_or(name, default);
    raw.parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("'{}': {}", raw, e)))
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let host: IpAddr = parse_var("OPENAI_HOST", "0.0.0.0")?;
        let port: u16 = parse_var("OPENAI_PORT", "3000")?;
        let bind_address = SocketAddr::new(host, port);

        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|key| !key.is_empty())
            .map(SecretString::from);

        let provider_base_url = var_or("OPENAI_BASE_URL", relay_core::credential::DEFAULT_BASE_URL);
        let model = var_or("OPENAI_MODEL", "gpt-4o-mini-realtime-preview-2024-12-17");
        let voice = var_or("OPENAI_VOICE", "verse");
        let temperature: f32 = parse_var("OPENAI_TEMPERATURE", "0.9")?;
        let instructions_path = PathBuf::from(var_or("OPENAI_INSTRUCTIONS_PATH", "./instruction.txt"));
        let max_sessions: usize = parse_var("OPENAI_MAX_SESSIONS", "5")?;

        let tls = match (
            std::env::var("OPENAI_TLS_CERT").ok(),
            std::env::var("OPENAI_TLS_KEY").ok(),
        ) {
            (Some(cert), Some(key)) => Some(TlsConfig {
                cert_path: PathBuf::from(cert),
                key_path: PathBuf::from(key),
            }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(ConfigError::MissingVar(
                    "OPENAI_TLS_KEY must be set when OPENAI_TLS_CERT is".to_string(),
                ));
            }
            (None, Some(_)) => {
                return Err(ConfigError::MissingVar(
                    "OPENAI_TLS_CERT must be set when OPENAI_TLS_KEY is".to_string(),
                ));
            }
        };

        let public_dir = PathBuf::from(var_or("OPENAI_PUBLIC_DIR", "./public"));
        let log_dir = match var_or("OPENAI_LOG_DIR", "./logs").as_str() {
            "" | "none" => None,
            dir => Some(PathBuf::from(dir)),
        };

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            api_key,
            provider_base_url,
            model,
            voice,
            temperature,
            instructions_path,
            max_sessions,
            tls,
            public_dir,
            log_dir,
            log_level,
        })
    }

    /// The provider parameters applied to every new session.
    pub fn session_defaults(&self) -> SessionDefaults {
        SessionDefaults {
            model: self.model.clone(),
            voice: self.voice.clone(),
            temperature: self.temperature,
            instructions_path: self.instructions_path.clone(),
            max_sessions: self.max_sessions,
        }
    }
}
