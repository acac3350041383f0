use anyhow::{Context, Result, anyhow, bail};
use reqwest::Url;

/// Environment variable holding the persistence service base URL.
pub const API_URL_ENV: &str = "TASKBOARD_API_URL";

/// Base URL used when neither a flag nor the environment provides one.
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:3141/api/tasks";

/// Client-side configuration. The service base URL is the only setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    api_url: String,
}

impl ClientConfig {
    /// Validate and normalize a base URL (http/https, no trailing slash).
    pub fn new(api_url: &str) -> Result<Self> {
        let parsed = Url::parse(api_url.trim())
            .with_context(|| format!("Invalid API URL: {}", api_url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!(
                "Invalid API URL '{}': scheme must be http or https",
                api_url
            );
        }
        let api_url = parsed.as_str().trim_end_matches('/').to_string();
        Ok(Self { api_url })
    }

    /// Resolve the base URL: explicit value first, then environment, then default.
    pub fn resolve(flag: Option<&str>, env: Option<String>) -> Result<Self> {
        match (flag, env) {
            (Some(url), _) => Self::new(url),
            (None, Some(url)) if !url.trim().is_empty() => {
                Self::new(&url).with_context(|| format!("{} is invalid", API_URL_ENV))
            }
            _ => Self::new(DEFAULT_API_URL),
        }
    }

    /// Resolve using the process environment.
    pub fn from_env(flag: Option<&str>) -> Result<Self> {
        Self::resolve(flag, std::env::var(API_URL_ENV).ok())
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Full URL of an endpoint below the base path.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path.trim_start_matches('/'))
    }

    /// URL of a per-task endpoint. The id becomes a single percent-encoded
    /// path segment, so ids containing `/`, `?`, `#` or `%` stay intact.
    pub fn task_endpoint(&self, action: &str, id: &str) -> Result<Url> {
        let mut url = Url::parse(&self.api_url)
            .with_context(|| format!("Invalid API URL: {}", self.api_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("API URL '{}' cannot carry a path", self.api_url))?
            .pop_if_empty()
            .push(action)
            .push(id);
        Ok(url)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
        }
    }
}
