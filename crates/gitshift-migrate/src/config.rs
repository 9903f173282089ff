//! Run configuration loaded from the environment and an optional `.env` file.
//!
//! The configuration is built once, validated, and then passed by reference
//! into the provider registry. Nothing deeper in the crate reads the
//! environment on its own.

use std::path::{Path, PathBuf};

use gitshift_types::SecretString;
use tracing::debug;

use crate::client::ClientOptions;
use crate::error::{MigrationError, Result};
use crate::registry::Role;

/// Default number of tasks transferred concurrently.
pub const DEFAULT_WORKERS: usize = 4;

/// Default requests per second allowed against a single provider.
pub const DEFAULT_RATE_LIMIT: u32 = 10;

/// Default migration log path.
pub const DEFAULT_LOG_FILE: &str = "migration.log";

/// Environment keys that configure one provider in one role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvKeys {
    /// Base URL key.
    pub url: &'static str,
    /// Access token key.
    pub token: &'static str,
    /// Username key.
    pub username: &'static str,
}

/// Returns the environment keys for a provider in a role, if it is known.
pub fn env_keys(role: Role, provider: &str) -> Option<EnvKeys> {
    let keys = match (role, provider) {
        (Role::Source, "gitea") => ("GITEA_URL", "GITEA_TOKEN", "GITEA_USERNAME"),
        (Role::Source, "gitlab") => ("GITLAB_URL", "GITLAB_TOKEN", "GITLAB_USERNAME"),
        (Role::Source, "github") => (
            "GITHUB_SOURCE_API_URL",
            "GITHUB_SOURCE_TOKEN",
            "GITHUB_SOURCE_USERNAME",
        ),
        (Role::Destination, "github") => ("GITHUB_API_URL", "GITHUB_TOKEN", "GITHUB_USERNAME"),
        (Role::Destination, "gitlab") => (
            "GITLAB_DEST_URL",
            "GITLAB_DEST_TOKEN",
            "GITLAB_DEST_USERNAME",
        ),
        (Role::Destination, "gitea") => {
            ("GITEA_DEST_URL", "GITEA_DEST_TOKEN", "GITEA_DEST_USERNAME")
        }
        _ => return None,
    };
    Some(EnvKeys {
        url: keys.0,
        token: keys.1,
        username: keys.2,
    })
}

/// Returns the base URL used when none is configured.
pub fn default_base_url(provider: &str) -> Option<&'static str> {
    match provider {
        "gitlab" => Some("https://gitlab.com"),
        "github" => Some("https://api.github.com"),
        _ => None,
    }
}

/// Settings for one provider in one role.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    /// Role the provider will play.
    pub role: Role,
    /// Registry name, lowercase.
    pub provider: String,
    /// Base URL of the instance or API.
    pub base_url: Option<String>,
    /// Access token.
    pub token: Option<SecretString>,
    /// Authenticated username.
    pub username: Option<String>,
    /// HTTP client tuning.
    pub client: ClientOptions,
}

/// Credentials resolved from [`ProviderSettings`], all present.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Base URL without trailing slash.
    pub base_url: String,
    /// Access token.
    pub token: SecretString,
    /// Authenticated username.
    pub username: String,
}

impl ProviderSettings {
    /// Creates empty settings for a provider.
    pub fn new(role: Role, provider: impl Into<String>) -> Self {
        Self {
            role,
            provider: provider.into().trim().to_lowercase(),
            base_url: None,
            token: None,
            username: None,
            client: ClientOptions::default(),
        }
    }

    /// Reads the provider's keys through `lookup`.
    pub fn from_lookup<F>(role: Role, provider: &str, lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::new(role, provider);
        if let Some(keys) = env_keys(role, &settings.provider) {
            settings.base_url = non_empty(lookup(keys.url));
            settings.token = non_empty(lookup(keys.token)).map(SecretString::new);
            settings.username = non_empty(lookup(keys.username));
        }
        settings
    }

    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the access token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(SecretString::new(token));
        self
    }

    /// Sets the username.
    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Sets the HTTP client options.
    #[must_use]
    pub fn with_client(mut self, client: ClientOptions) -> Self {
        self.client = client;
        self
    }

    /// Returns whether every required value is present.
    pub fn is_configured(&self) -> bool {
        self.credentials().is_ok()
    }

    /// Resolves the base URL, applying the provider default.
    pub fn resolved_base_url(&self) -> Option<String> {
        self.base_url
            .as_deref()
            .or_else(|| default_base_url(&self.provider))
            .map(|url| url.trim_end_matches('/').to_string())
    }

    /// Resolves all credentials or names what is missing.
    pub fn credentials(&self) -> Result<Credentials> {
        let base_url = self.resolved_base_url();
        let mut missing = Vec::new();
        if base_url.is_none() {
            missing.push(("url", env_keys(self.role, &self.provider).map(|k| k.url)));
        }
        if self.token.is_none() {
            missing.push(("token", env_keys(self.role, &self.provider).map(|k| k.token)));
        }
        if self.username.is_none() {
            missing.push((
                "username",
                env_keys(self.role, &self.provider).map(|k| k.username),
            ));
        }

        match (base_url, self.token.clone(), self.username.clone()) {
            (Some(base_url), Some(token), Some(username)) => Ok(Credentials {
                base_url,
                token,
                username,
            }),
            _ => {
                let fields: Vec<&str> = missing.iter().map(|(field, _)| *field).collect();
                let keys: Vec<&str> = missing.iter().filter_map(|(_, key)| *key).collect();
                let mut message = format!(
                    "missing {} {} configuration: {}",
                    self.provider,
                    self.role,
                    fields.join(", ")
                );
                if !keys.is_empty() {
                    message.push_str(&format!(" (set {})", keys.join(", ")));
                }
                Err(MigrationError::Configuration(message))
            }
        }
    }
}

/// Complete configuration for one run.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Source provider settings.
    pub source: ProviderSettings,
    /// Destination provider settings.
    pub destination: ProviderSettings,
    /// Concurrent transfer tasks.
    pub workers: usize,
    /// Migration log path.
    pub log_file: PathBuf,
}

impl MigrationConfig {
    /// Loads `.env` (or `env_file` when given) into the process environment
    /// and builds the configuration from it.
    pub fn load(env_file: Option<&Path>) -> Result<Self> {
        load_env_file(env_file)?;
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let source_name =
            non_empty(lookup("SOURCE_PROVIDER")).unwrap_or_else(|| "gitea".to_string());
        let destination_name =
            non_empty(lookup("DESTINATION_PROVIDER")).unwrap_or_else(|| "github".to_string());

        let rate_limit = parse_number(&lookup, "MIGRATION_RATE_LIMIT", DEFAULT_RATE_LIMIT)?;
        let client = ClientOptions::default().with_requests_per_second(rate_limit);

        let source = ProviderSettings::from_lookup(Role::Source, &source_name, &lookup)
            .with_client(client.clone());
        let destination =
            ProviderSettings::from_lookup(Role::Destination, &destination_name, &lookup)
                .with_client(client);

        let workers = parse_number(&lookup, "MIGRATION_WORKERS", DEFAULT_WORKERS)?.max(1);
        let log_file = non_empty(lookup("MIGRATION_LOG_FILE"))
            .map_or_else(|| PathBuf::from(DEFAULT_LOG_FILE), PathBuf::from);

        let config = Self {
            source,
            destination,
            workers,
            log_file,
        };
        config.validate()?;

        debug!(
            source = %config.source.provider,
            destination = %config.destination.provider,
            workers = config.workers,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Rejects a source and destination that point at the same account.
    pub fn validate(&self) -> Result<()> {
        if self.source.provider != self.destination.provider {
            return Ok(());
        }
        let same_host = match (
            self.source.resolved_base_url(),
            self.destination.resolved_base_url(),
        ) {
            (Some(a), Some(b)) => host_of(&a) == host_of(&b),
            _ => false,
        };
        let same_user = match (&self.source.username, &self.destination.username) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            _ => false,
        };
        if same_host && same_user {
            return Err(MigrationError::Configuration(format!(
                "source and destination are the same {} account",
                self.source.provider
            )));
        }
        Ok(())
    }
}

/// Loads an env file into the process environment.
///
/// A missing default `.env` is not an error; a missing explicit file is.
pub fn load_env_file(env_file: Option<&Path>) -> Result<()> {
    match env_file {
        Some(path) => {
            dotenvy::from_path(path).map_err(|e| {
                MigrationError::Configuration(format!("cannot read {}: {e}", path.display()))
            })?;
            debug!(path = %path.display(), "Loaded env file");
        }
        None => {
            if let Ok(path) = dotenvy::dotenv() {
                debug!(path = %path.display(), "Loaded env file");
            }
        }
    }
    Ok(())
}

/// Template written by `gitshift setup`.
pub const ENV_TEMPLATE: &str = "\
# Source provider: gitea, gitlab or github
SOURCE_PROVIDER=gitea
GITEA_URL=https://gitea.example.com
GITEA_TOKEN=your_gitea_personal_access_token
GITEA_USERNAME=your_gitea_username

# SOURCE_PROVIDER=gitlab
# GITLAB_URL=https://gitlab.com
# GITLAB_TOKEN=your_gitlab_token
# GITLAB_USERNAME=your_gitlab_username

# SOURCE_PROVIDER=github
# GITHUB_SOURCE_TOKEN=your_github_token
# GITHUB_SOURCE_USERNAME=your_github_username

# Destination provider: github, gitlab or gitea
DESTINATION_PROVIDER=github
GITHUB_TOKEN=your_github_personal_access_token
GITHUB_USERNAME=your_github_username

# DESTINATION_PROVIDER=gitlab
# GITLAB_DEST_URL=https://gitlab.com
# GITLAB_DEST_TOKEN=your_gitlab_dest_token
# GITLAB_DEST_USERNAME=your_gitlab_dest_username

# DESTINATION_PROVIDER=gitea
# GITEA_DEST_URL=https://gitea.example.com
# GITEA_DEST_TOKEN=your_gitea_dest_token
# GITEA_DEST_USERNAME=your_gitea_dest_username

# Tuning
# MIGRATION_WORKERS=4
# MIGRATION_RATE_LIMIT=10
# MIGRATION_LOG_FILE=migration.log
";

/// Writes [`ENV_TEMPLATE`] to `path` unless a file already exists there.
///
/// Returns `true` when the template was written.
pub fn write_env_template(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    std::fs::write(path, ENV_TEMPLATE)?;
    Ok(true)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_number<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match non_empty(lookup(key)) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| {
            MigrationError::Configuration(format!("{key} must be a positive number, got '{raw}'"))
        }),
    }
}

fn host_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
        .unwrap_or_else(|| url.to_lowercase())
}
