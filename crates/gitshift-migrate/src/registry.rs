//! Name-to-constructor registry for source and destination providers.
//!
//! Adding a hosting service means writing its provider types and one
//! `register_*` call; the engine and selector only see the traits.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ProviderSettings;
use crate::error::{MigrationError, Result};
use crate::providers::{
    DestinationProvider, GitHubDestination, GitHubSource, GitLabDestination, GitLabSource,
    GiteaDestination, GiteaSource, SourceProvider,
};

/// Role a provider plays in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Repositories are read from it.
    Source,
    /// Repositories are written to it.
    Destination,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Destination => write!(f, "destination"),
        }
    }
}

/// Builds a source provider from validated settings.
pub type SourceConstructor = fn(&ProviderSettings) -> Result<Arc<dyn SourceProvider>>;

/// Builds a destination provider from validated settings.
pub type DestinationConstructor = fn(&ProviderSettings) -> Result<Arc<dyn DestinationProvider>>;

/// A constructed provider of either role.
#[derive(Clone)]
pub enum Provider {
    /// Source role.
    Source(Arc<dyn SourceProvider>),
    /// Destination role.
    Destination(Arc<dyn DestinationProvider>),
}

/// Provider constructors keyed by role and name.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    sources: BTreeMap<&'static str, SourceConstructor>,
    destinations: BTreeMap<&'static str, DestinationConstructor>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with Gitea, GitLab and GitHub in both roles.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_source("gitea", |s| Ok(Arc::new(GiteaSource::new(s)?)));
        registry.register_source("gitlab", |s| Ok(Arc::new(GitLabSource::new(s)?)));
        registry.register_source("github", |s| Ok(Arc::new(GitHubSource::new(s)?)));
        registry.register_destination("github", |s| Ok(Arc::new(GitHubDestination::new(s)?)));
        registry.register_destination("gitlab", |s| Ok(Arc::new(GitLabDestination::new(s)?)));
        registry.register_destination("gitea", |s| Ok(Arc::new(GiteaDestination::new(s)?)));
        registry
    }

    /// Registers or replaces a source constructor.
    pub fn register_source(&mut self, name: &'static str, constructor: SourceConstructor) {
        self.sources.insert(name, constructor);
    }

    /// Registers or replaces a destination constructor.
    pub fn register_destination(&mut self, name: &'static str, constructor: DestinationConstructor) {
        self.destinations.insert(name, constructor);
    }

    /// Registered names for a role, sorted.
    pub fn names(&self, role: Role) -> Vec<&'static str> {
        match role {
            Role::Source => self.sources.keys().copied().collect(),
            Role::Destination => self.destinations.keys().copied().collect(),
        }
    }

    /// Constructs the provider `name` for `role`.
    ///
    /// Fails with [`MigrationError::UnsupportedProvider`] for unknown names
    /// and with [`MigrationError::Configuration`] when credentials are
    /// missing. No network call is made.
    pub fn create(&self, role: Role, name: &str, settings: &ProviderSettings) -> Result<Provider> {
        let key = name.trim().to_lowercase();
        let provider = match role {
            Role::Source => {
                let constructor = self
                    .sources
                    .get(key.as_str())
                    .ok_or_else(|| self.unsupported(role, name))?;
                Provider::Source(constructor(settings)?)
            }
            Role::Destination => {
                let constructor = self
                    .destinations
                    .get(key.as_str())
                    .ok_or_else(|| self.unsupported(role, name))?;
                Provider::Destination(constructor(settings)?)
            }
        };
        info!(%role, provider = %key, "Provider selected");
        Ok(provider)
    }

    /// Constructs the source named in `settings`.
    pub fn create_source(&self, settings: &ProviderSettings) -> Result<Arc<dyn SourceProvider>> {
        match self.create(Role::Source, &settings.provider, settings)? {
            Provider::Source(source) => Ok(source),
            Provider::Destination(_) => Err(self.unsupported(Role::Source, &settings.provider)),
        }
    }

    /// Constructs the destination named in `settings`.
    pub fn create_destination(
        &self,
        settings: &ProviderSettings,
    ) -> Result<Arc<dyn DestinationProvider>> {
        match self.create(Role::Destination, &settings.provider, settings)? {
            Provider::Destination(destination) => Ok(destination),
            Provider::Source(_) => Err(self.unsupported(Role::Destination, &settings.provider)),
        }
    }

    fn unsupported(&self, role: Role, name: &str) -> MigrationError {
        MigrationError::UnsupportedProvider {
            role,
            name: name.to_string(),
            available: self.names(role).join(", "),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gitea_settings() -> ProviderSettings {
        ProviderSettings::new(Role::Source, "gitea")
            .with_base_url("https://git.example.com")
            .with_token("tok")
            .with_username("alice")
    }

    #[test]
    fn test_default_names() {
        let registry = ProviderRegistry::with_defaults();
        assert_eq!(registry.names(Role::Source), vec!["gitea", "github", "gitlab"]);
        assert_eq!(
            registry.names(Role::Destination),
            vec!["gitea", "github", "gitlab"]
        );
    }

    #[test]
    fn test_creates_configured_source() {
        let registry = ProviderRegistry::with_defaults();
        let source = registry.create_source(&gitea_settings()).unwrap();
        assert_eq!(source.name(), "gitea");
        assert_eq!(source.username(), "alice");
    }

    #[test]
    fn test_unknown_provider_lists_available() {
        let registry = ProviderRegistry::with_defaults();
        let settings = ProviderSettings::new(Role::Destination, "bitbucket");
        let Err(err) = registry.create(Role::Destination, "bitbucket", &settings) else {
            panic!("bitbucket should not be registered");
        };
        assert!(matches!(err, MigrationError::UnsupportedProvider { .. }));
        assert!(err.to_string().contains("gitea, github, gitlab"));
    }

    #[test]
    fn test_missing_credentials_fail_at_construction() {
        let registry = ProviderRegistry::with_defaults();
        let settings = ProviderSettings::new(Role::Destination, "github").with_username("bob");
        let Err(err) = registry.create_destination(&settings) else {
            panic!("missing token must be rejected");
        };
        assert!(matches!(err, MigrationError::Configuration(_)));
        assert!(err.to_string().contains("GITHUB_TOKEN"));
    }

    #[test]
    fn test_custom_registration() {
        let mut registry = ProviderRegistry::new();
        registry.register_source("forgejo", |s| Ok(Arc::new(GiteaSource::new(s)?)));
        assert_eq!(registry.names(Role::Source), vec!["forgejo"]);
        assert!(registry.names(Role::Destination).is_empty());

        let settings = ProviderSettings {
            provider: "forgejo".into(),
            ..gitea_settings()
        };
        let Ok(Provider::Source(source)) = registry.create(Role::Source, "Forgejo", &settings)
        else {
            panic!("forgejo should build a source");
        };
        assert_eq!(source.username(), "alice");
    }
}
