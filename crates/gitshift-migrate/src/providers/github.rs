//! GitHub source and destination.

use async_trait::async_trait;
use gitshift_types::{Repository, SecretString, DEFAULT_BRANCH};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{merge_unique, same_owner, with_credentials, DestinationProvider, SourceProvider};
use crate::client::{ApiClient, AuthScheme, Pagination};
use crate::config::ProviderSettings;
use crate::error::{MigrationError, Result};
use crate::validate::NameRules;

const PROVIDER: &str = "github";

/// GitHub API response types
#[derive(Debug, Deserialize)]
struct GitHubRepo {
    name: String,
    owner: GitHubUser,
    description: Option<String>,
    private: bool,
    clone_url: String,
    default_branch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubUser {
    login: String,
}

#[derive(Debug, Serialize)]
struct CreateRepoRequest<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    private: bool,
    auto_init: bool,
}

impl GitHubRepo {
    fn into_repository(self, username: &str) -> Repository {
        let is_mine = same_owner(&self.owner.login, username);
        Repository {
            owner: self.owner.login,
            name: self.name,
            description: self.description.filter(|d| !d.is_empty()),
            is_private: self.private,
            is_mine,
            default_branch: self
                .default_branch
                .unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
            clone_url: self.clone_url,
        }
    }
}

fn api_client(settings: &ProviderSettings) -> Result<(ApiClient, String, SecretString)> {
    let creds = settings.credentials()?;
    let api = ApiClient::new(
        PROVIDER,
        &creds.base_url,
        creds.token.clone(),
        AuthScheme::Bearer,
        &settings.client,
    )
    .map_err(|e| MigrationError::provider(PROVIDER, e))?;
    Ok((api, creds.username, creds.token))
}

/// Reads repositories from GitHub.
#[derive(Debug)]
pub struct GitHubSource {
    api: ApiClient,
    username: String,
    token: SecretString,
}

impl GitHubSource {
    /// Creates the provider; fails if the token or username is missing.
    pub fn new(settings: &ProviderSettings) -> Result<Self> {
        let (api, username, token) = api_client(settings)?;
        Ok(Self {
            api,
            username,
            token,
        })
    }

    async fn list(&self, path: &str) -> Result<Vec<Repository>> {
        let repos: Vec<GitHubRepo> = self
            .api
            .get_paginated(path, &[], Pagination::UntilShort("per_page"))
            .await
            .map_err(|e| MigrationError::provider(PROVIDER, e))?;
        Ok(repos
            .into_iter()
            .map(|r| r.into_repository(&self.username))
            .collect())
    }
}

#[async_trait]
impl SourceProvider for GitHubSource {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn username(&self) -> &str {
        &self.username
    }

    async fn get_accessible_repositories(&self) -> Result<Vec<Repository>> {
        let mut listings = vec![self.list("/user/repos").await?];

        let orgs: Vec<GitHubUser> = self
            .api
            .get_paginated("/user/orgs", &[], Pagination::UntilShort("per_page"))
            .await
            .map_err(|e| MigrationError::provider(PROVIDER, e))?;

        for org in orgs {
            match self.list(&format!("/orgs/{}/repos", org.login)).await {
                Ok(repos) => listings.push(repos),
                Err(e) => {
                    warn!(org = %org.login, "Could not list organisation repositories: {e}");
                }
            }
        }

        let merged = merge_unique(listings);
        info!(count = merged.len(), "Listed GitHub repositories");
        Ok(merged)
    }

    async fn get_repository_info(&self, owner: &str, name: &str) -> Result<Option<Repository>> {
        let repo: Option<GitHubRepo> = self
            .api
            .get_optional(&format!("/repos/{owner}/{name}"))
            .await
            .map_err(|e| MigrationError::provider(PROVIDER, e))?;
        Ok(repo.map(|r| r.into_repository(&self.username)))
    }

    fn get_authenticated_clone_url(&self, repository: &Repository) -> Result<SecretString> {
        with_credentials(PROVIDER, &repository.clone_url, self.token.expose(), None)
    }
}

/// Creates repositories on GitHub under the authenticated user.
#[derive(Debug)]
pub struct GitHubDestination {
    api: ApiClient,
    username: String,
    token: SecretString,
}

impl GitHubDestination {
    /// Creates the provider; fails if the token or username is missing.
    pub fn new(settings: &ProviderSettings) -> Result<Self> {
        let (api, username, token) = api_client(settings)?;
        Ok(Self {
            api,
            username,
            token,
        })
    }
}

#[async_trait]
impl DestinationProvider for GitHubDestination {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn owner(&self) -> &str {
        &self.username
    }

    fn name_rules(&self) -> NameRules {
        NameRules::GITHUB
    }

    async fn repository_exists(&self, full_name: &str) -> Result<bool> {
        self.api
            .exists(&format!("/repos/{full_name}"))
            .await
            .map_err(|e| MigrationError::provider(PROVIDER, e))
    }

    async fn create_repository(
        &self,
        name: &str,
        is_private: bool,
        description: Option<&str>,
    ) -> Result<Repository> {
        let created: GitHubRepo = self
            .api
            .post(
                "/user/repos",
                &CreateRepoRequest {
                    name,
                    description,
                    private: is_private,
                    auto_init: false,
                },
            )
            .await
            .map_err(|e| MigrationError::provider(PROVIDER, e))?;
        info!(repo = %name, "Created GitHub repository");
        Ok(created.into_repository(&self.username))
    }

    fn get_authenticated_push_url(&self, repository: &Repository) -> Result<SecretString> {
        with_credentials(PROVIDER, &repository.clone_url, self.token.expose(), None)
    }
}
