//! Relay configuration: defaults, optional TOML file, then environment.

use reqwest::Url;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";
pub const DEFAULT_SLACK_API_BASE: &str = "https://slack.com/api";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_OPEN_FORM_TIMEOUT_MS: u64 = 2500;

/// Environment variable naming the optional TOML file
pub const CONFIG_PATH_VAR: &str = "RELAY_CONFIG";

/// Shape of the optional TOML file. Every key may also come from the environment.
#[derive(Debug, Default, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub slack_bot_token: Option<String>,
    pub slack_api_base: Option<String>,
    pub slack_signing_secret: Option<String>,
    pub jenkins_url: Option<String>,
    pub jenkins_job: Option<String>,
    pub jenkins_user: Option<String>,
    pub jenkins_token: Option<String>,
    pub bind_address: Option<String>,
    pub http_timeout_secs: Option<u64>,
    pub open_form_timeout_ms: Option<u64>,
    pub log_dir: Option<String>,
}

#[derive(Clone)]
pub struct SlackSettings {
    pub bot_token: String,
    pub api_base: Url,
    pub signing_secret: Option<String>,
}

#[derive(Clone)]
pub struct JenkinsSettings {
    /// Full parameterized-build endpoint
    pub trigger_url: Url,
    pub user: String,
    pub token: String,
}

#[derive(Clone)]
pub struct RelayConfig {
    pub slack: SlackSettings,
    pub jenkins: JenkinsSettings,
    pub bind_address: String,
    pub http_timeout: Duration,
    pub open_form_timeout: Duration,
    pub log_dir: Option<String>,
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("slack_api_base", &self.slack.api_base.as_str())
            .field("slack_bot_token", &"<redacted>")
            .field(
                "slack_signing_secret",
                &self.slack.signing_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("jenkins_trigger_url", &self.jenkins.trigger_url.as_str())
            .field("jenkins_user", &self.jenkins.user)
            .field("jenkins_token", &"<redacted>")
            .field("bind_address", &self.bind_address)
            .field("http_timeout", &self.http_timeout)
            .field("open_form_timeout", &self.open_form_timeout)
            .field("log_dir", &self.log_dir)
            .finish()
    }
}

/// Read and parse the TOML config file
pub fn load_config_file(path: &str) -> Result<FileConfig, ConfigError> {
    let config_str = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_string(),
        source,
    })?;

    toml::from_str(&config_str).map_err(|source| ConfigError::Parse {
        path: path.to_string(),
        source,
    })
}

impl RelayConfig {
    /// Load from the process environment (and the file named by `RELAY_CONFIG`, if any).
    /// Call `dotenv::dotenv()` beforehand to pick up a local `.env`.
    pub fn load() -> Result<Self, ConfigError> {
        let file = match std::env::var(CONFIG_PATH_VAR) {
            Ok(path) if !path.trim().is_empty() => load_config_file(path.trim())?,
            _ => FileConfig::default(),
        };
        Self::from_sources(file, |key| std::env::var(key).ok())
    }

    /// Merge file values with environment lookups (environment wins) and validate.
    /// All problems are collected so a misconfigured deployment is fixed in one pass.
    pub fn from_sources<F>(file: FileConfig, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |key: &str, from_file: Option<String>| -> Option<String> {
            env(key)
                .or(from_file)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut errors = Vec::new();
        let mut missing = Vec::new();

        let mut required = |key: &str, from_file: Option<String>| -> String {
            pick(key, from_file).unwrap_or_else(|| {
                missing.push(key.to_string());
                String::new()
            })
        };

        let bot_token = required("SLACK_BOT_TOKEN", file.slack_bot_token.clone());
        let jenkins_url = required("JENKINS_URL", file.jenkins_url.clone());
        let jenkins_user = required("JENKINS_USER", file.jenkins_user.clone());
        let jenkins_token = required("JENKINS_TOKEN", file.jenkins_token.clone());

        if !missing.is_empty() {
            errors.push(ConfigError::Missing(missing));
        }

        let api_base = pick("SLACK_API_BASE", file.slack_api_base.clone())
            .unwrap_or_else(|| DEFAULT_SLACK_API_BASE.to_string());
        let api_base = match parse_http_url("SLACK_API_BASE", &api_base) {
            Ok(url) => Some(url),
            Err(e) => {
                errors.push(e);
                None
            }
        };

        let jenkins_job = pick("JENKINS_JOB", file.jenkins_job.clone());
        let trigger_url = if jenkins_url.is_empty() {
            None
        } else {
            match build_trigger_url(&jenkins_url, jenkins_job.as_deref()) {
                Ok(url) => Some(url),
                Err(e) => {
                    errors.push(e);
                    None
                }
            }
        };

        let http_timeout_secs = match parse_number(
            "HTTP_TIMEOUT_SECS",
            env("HTTP_TIMEOUT_SECS"),
            file.http_timeout_secs,
            DEFAULT_HTTP_TIMEOUT_SECS,
        ) {
            Ok(v) => v,
            Err(e) => {
                errors.push(e);
                DEFAULT_HTTP_TIMEOUT_SECS
            }
        };
        let open_form_timeout_ms = match parse_number(
            "OPEN_FORM_TIMEOUT_MS",
            env("OPEN_FORM_TIMEOUT_MS"),
            file.open_form_timeout_ms,
            DEFAULT_OPEN_FORM_TIMEOUT_MS,
        ) {
            Ok(v) => v,
            Err(e) => {
                errors.push(e);
                DEFAULT_OPEN_FORM_TIMEOUT_MS
            }
        };

        match (errors.len(), api_base, trigger_url) {
            (0, Some(api_base), Some(trigger_url)) => Ok(Self {
                slack: SlackSettings {
                    bot_token,
                    api_base,
                    signing_secret: pick("SLACK_SIGNING_SECRET", file.slack_signing_secret),
                },
                jenkins: JenkinsSettings {
                    trigger_url,
                    user: jenkins_user,
                    token: jenkins_token,
                },
                bind_address: pick("BIND_ADDRESS", file.bind_address)
                    .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string()),
                http_timeout: Duration::from_secs(http_timeout_secs),
                open_form_timeout: Duration::from_millis(open_form_timeout_ms),
                log_dir: pick("LOG_DIR", file.log_dir),
            }),
            _ if errors.len() == 1 => Err(errors.remove(0)),
            _ => Err(ConfigError::Multiple(errors)),
        }
    }

    pub fn signature_verification_enabled(&self) -> bool {
        self.slack.signing_secret.is_some()
    }
}

fn parse_http_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::Invalid {
        key: key.to_string(),
        message: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::Invalid {
            key: key.to_string(),
            message: format!("unsupported scheme '{}'", other),
        }),
    }
}

/// `JENKINS_URL` is used verbatim unless a job name is given, in which case it is the server base.
fn build_trigger_url(base: &str, job: Option<&str>) -> Result<Url, ConfigError> {
    match job {
        Some(job) => parse_http_url(
            "JENKINS_URL",
            &format!(
                "{}/job/{}/buildWithParameters",
                base.trim_end_matches('/'),
                job.trim_matches('/')
            ),
        ),
        None => parse_http_url("JENKINS_URL", base),
    }
}

fn parse_number(
    key: &str,
    from_env: Option<String>,
    from_file: Option<u64>,
    default: u64,
) -> Result<u64, ConfigError> {
    let value = match from_env.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(raw) => raw.parse::<u64>().map_err(|e| ConfigError::Invalid {
            key: key.to_string(),
            message: format!("'{}': {}", raw, e),
        })?,
        None => from_file.unwrap_or(default),
    };
    if value == 0 {
        return Err(ConfigError::Invalid {
            key: key.to_string(),
            message: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}
