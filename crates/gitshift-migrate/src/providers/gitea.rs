//! Gitea source and destination.

use async_trait::async_trait;
use gitshift_types::{Repository, SecretString, DEFAULT_BRANCH};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{merge_unique, same_owner, with_credentials, DestinationProvider, SourceProvider};
use crate::client::{ApiClient, AuthScheme, Pagination};
use crate::config::ProviderSettings;
use crate::error::{MigrationError, Result};
use crate::validate::NameRules;

const PROVIDER: &str = "gitea";

#[derive(Debug, Deserialize)]
struct GiteaRepo {
    name: String,
    owner: GiteaUser,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    private: bool,
    clone_url: String,
    #[serde(default)]
    default_branch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GiteaUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct GiteaOrg {
    username: String,
}

#[derive(Debug, Serialize)]
struct CreateRepoRequest<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    private: bool,
    auto_init: bool,
}

impl GiteaRepo {
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
                .filter(|b| !b.is_empty())
                .unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
            clone_url: self.clone_url,
        }
    }
}

fn api_client(settings: &ProviderSettings) -> Result<(ApiClient, String, SecretString)> {
    let creds = settings.credentials()?;
    let api = ApiClient::new(
        PROVIDER,
        &format!("{}/api/v1", creds.base_url),
        creds.token.clone(),
        AuthScheme::Token,
        &settings.client,
    )
    .map_err(|e| MigrationError::provider(PROVIDER, e))?;
    Ok((api, creds.username, creds.token))
}

/// Reads repositories from a Gitea instance.
#[derive(Debug)]
pub struct GiteaSource {
    api: ApiClient,
    username: String,
    token: SecretString,
}

impl GiteaSource {
    /// Creates the provider; fails if URL, token or username is missing.
    pub fn new(settings: &ProviderSettings) -> Result<Self> {
        let (api, username, token) = api_client(settings)?;
        Ok(Self {
            api,
            username,
            token,
        })
    }

    async fn organisation_repositories(&self) -> Result<Vec<Repository>> {
        let orgs: Vec<GiteaOrg> = self
            .api
            .get_paginated("/user/orgs", &[], Pagination::UntilShort("limit"))
            .await
            .map_err(|e| MigrationError::provider(PROVIDER, e))?;

        let mut repos = Vec::new();
        for org in orgs {
            let path = format!("/orgs/{}/repos", org.username);
            match self
                .api
                .get_paginated::<GiteaRepo>(&path, &[], Pagination::UntilShort("limit"))
                .await
            {
                Ok(listed) => repos.extend(
                    listed
                        .into_iter()
                        .map(|r| r.into_repository(&self.username)),
                ),
                Err(e) => warn!(org = %org.username, "Could not list organisation repositories: {e}"),
            }
        }
        Ok(repos)
    }
}

#[async_trait]
impl SourceProvider for GiteaSource {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn username(&self) -> &str {
        &self.username
    }

    async fn get_accessible_repositories(&self) -> Result<Vec<Repository>> {
        let own: Vec<GiteaRepo> = self
            .api
            .get_paginated("/user/repos", &[], Pagination::UntilShort("limit"))
            .await
            .map_err(|e| MigrationError::provider(PROVIDER, e))?;
        let own: Vec<Repository> = own
            .into_iter()
            .map(|r| r.into_repository(&self.username))
            .collect();

        let orgs = self.organisation_repositories().await?;
        let merged = merge_unique([own, orgs]);
        info!(count = merged.len(), "Listed Gitea repositories");
        Ok(merged)
    }

    async fn get_repository_info(&self, owner: &str, name: &str) -> Result<Option<Repository>> {
        let repo: Option<GiteaRepo> = self
            .api
            .get_optional(&format!("/repos/{owner}/{name}"))
            .await
            .map_err(|e| MigrationError::provider(PROVIDER, e))?;
        Ok(repo.map(|r| r.into_repository(&self.username)))
    }

    fn get_authenticated_clone_url(&self, repository: &Repository) -> Result<SecretString> {
        with_credentials(
            PROVIDER,
            &repository.clone_url,
            &self.username,
            Some(self.token.expose()),
        )
    }
}

/// Creates repositories on a Gitea instance.
#[derive(Debug)]
pub struct GiteaDestination {
    api: ApiClient,
    username: String,
    token: SecretString,
}

impl GiteaDestination {
    /// Creates the provider; fails if URL, token or username is missing.
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
impl DestinationProvider for GiteaDestination {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn owner(&self) -> &str {
        &self.username
    }

    fn name_rules(&self) -> NameRules {
        NameRules::GITEA
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
        let created: GiteaRepo = self
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
        info!(repo = %name, "Created Gitea repository");
        Ok(created.into_repository(&self.username))
    }

    fn get_authenticated_push_url(&self, repository: &Repository) -> Result<SecretString> {
        with_credentials(
            PROVIDER,
            &repository.clone_url,
            &self.username,
            Some(self.token.expose()),
        )
    }
}
