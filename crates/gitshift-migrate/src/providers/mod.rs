//! Source and destination capability contracts and their implementations.
//!
//! A source lists repositories and hands out authenticated clone URLs; a
//! destination checks for, creates, and accepts pushes to repositories.
//! Each hosting service implements whichever roles it supports and is made
//! available through the [`crate::registry::ProviderRegistry`].

use std::collections::HashSet;

use async_trait::async_trait;
use gitshift_types::{Repository, SecretString};

use crate::error::{MigrationError, Result};
use crate::validate::NameRules;

pub mod gitea;
pub mod github;
pub mod gitlab;

pub use gitea::{GiteaDestination, GiteaSource};
pub use github::{GitHubDestination, GitHubSource};
pub use gitlab::{GitLabDestination, GitLabSource};

/// A hosting service repositories are read from.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Registry name of the provider.
    fn name(&self) -> &'static str;

    /// Authenticated username.
    fn username(&self) -> &str;

    /// Every repository the token can read, owned or via organisations,
    /// without duplicates.
    async fn get_accessible_repositories(&self) -> Result<Vec<Repository>>;

    /// Only the repositories owned by the authenticated identity.
    async fn get_user_repositories(&self) -> Result<Vec<Repository>> {
        let repos = self.get_accessible_repositories().await?;
        Ok(repos.into_iter().filter(|r| r.is_mine).collect())
    }

    /// A single repository, or `None` if it does not exist or is hidden.
    async fn get_repository_info(&self, owner: &str, name: &str) -> Result<Option<Repository>>;

    /// Clone URL with credentials embedded. Never log the result.
    fn get_authenticated_clone_url(&self, repository: &Repository) -> Result<SecretString>;
}

/// A hosting service repositories are written to.
#[async_trait]
pub trait DestinationProvider: Send + Sync {
    /// Registry name of the provider.
    fn name(&self) -> &'static str;

    /// Owner under which repositories are created.
    fn owner(&self) -> &str;

    /// Naming limits enforced by the service.
    fn name_rules(&self) -> NameRules;

    /// Whether `full_name` (owner/name) already exists.
    async fn repository_exists(&self, full_name: &str) -> Result<bool>;

    /// Creates an empty repository under [`DestinationProvider::owner`].
    async fn create_repository(
        &self,
        name: &str,
        is_private: bool,
        description: Option<&str>,
    ) -> Result<Repository>;

    /// Push URL with credentials embedded. Never log the result.
    fn get_authenticated_push_url(&self, repository: &Repository) -> Result<SecretString>;
}

/// Concatenates listings, keeping the first occurrence of each full name.
pub fn merge_unique<I>(listings: I) -> Vec<Repository>
where
    I: IntoIterator<Item = Vec<Repository>>,
{
    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for repo in listings.into_iter().flatten() {
        if seen.insert(repo.full_name().to_lowercase()) {
            merged.push(repo);
        }
    }
    merged
}

/// Inserts credentials into a clone URL.
///
/// `password` is optional because some services accept the token as the
/// username alone.
pub(crate) fn with_credentials(
    provider: &'static str,
    clone_url: &str,
    username: &str,
    password: Option<&str>,
) -> Result<SecretString> {
    let mut url = url::Url::parse(clone_url).map_err(|e| {
        MigrationError::Configuration(format!("{provider} returned an invalid clone URL: {e}"))
    })?;
    let invalid = || {
        MigrationError::Configuration(format!(
            "{provider} clone URL cannot carry credentials"
        ))
    };
    url.set_username(username).map_err(|()| invalid())?;
    url.set_password(password).map_err(|()| invalid())?;
    Ok(SecretString::new(String::from(url)))
}

/// Case-insensitive owner comparison used for `is_mine`.
pub(crate) fn same_owner(owner: &str, username: &str) -> bool {
    owner.eq_ignore_ascii_case(username)
}
