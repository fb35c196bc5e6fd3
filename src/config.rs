use std::env;
use std::path::PathBuf;

use thiserror::Error;

pub const DEFAULT_MODEL_PATH: &str = "brain_tumor_vgg16.onnx";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_BODY_LIMIT_MB: usize = 10;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{key} must be {expected} (got {value:?})")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub expected: &'static str,
}

/// Process settings read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub model_path: PathBuf,
    pub labels_path: Option<PathBuf>,
    pub host: String,
    pub port: u16,
    /// `None` keeps actix's default of one worker per core.
    pub workers: Option<usize>,
    pub body_limit_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            labels_path: None,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            workers: None,
            body_limit_bytes: DEFAULT_BODY_LIMIT_MB * 1024 * 1024,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let port = match lookup("PORT") {
            Some(v) => parse(&v, "PORT", "a port number between 0 and 65535")?,
            None => defaults.port,
        };

        let workers = match lookup("WORKERS") {
            Some(v) => {
                let n: usize = parse(&v, "WORKERS", "a positive integer")?;
                if n == 0 {
                    return Err(ConfigError {
                        key: "WORKERS",
                        value: v,
                        expected: "a positive integer",
                    });
                }
                Some(n)
            }
            None => None,
        };

        let body_limit_bytes = match lookup("BODY_LIMIT_MB") {
            Some(v) => {
                let expected = "a whole number of megabytes";
                let mb: usize = parse(&v, "BODY_LIMIT_MB", expected)?;
                mb.checked_mul(1024 * 1024).ok_or(ConfigError {
                    key: "BODY_LIMIT_MB",
                    value: v,
                    expected,
                })?
            }
            None => defaults.body_limit_bytes,
        };

        Ok(Self {
            model_path: lookup("MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_path),
            labels_path: lookup("LABELS_PATH")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            host: lookup("HOST").unwrap_or(defaults.host),
            port,
            workers,
            body_limit_bytes,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse<T: std::str::FromStr>(
    value: &str,
    key: &'static str,
    expected: &'static str,
) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError {
        key,
        value: value.to_string(),
        expected,
    })
}
