//! GitLab source and destination.
//!
//! Projects are addressed by their URL path (`namespace/path`), which is
//! what git remotes use. Display names may contain spaces and are ignored.

use async_trait::async_trait;
use gitshift_types::{Repository, SecretString, DEFAULT_BRANCH};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{merge_unique, same_owner, with_credentials, DestinationProvider, SourceProvider};
use crate::client::{ApiClient, AuthScheme, Pagination};
use crate::config::ProviderSettings;
use crate::error::{MigrationError, Result};
use crate::validate::NameRules;

const PROVIDER: &str = "gitlab";

/// Prefix of GitLab personal access tokens.
const PAT_PREFIX: &str = "glpat-";

#[derive(Debug, Deserialize)]
struct GitLabProject {
    path: String,
    #[serde(default)]
    description: Option<String>,
    visibility: String,
    http_url_to_repo: String,
    #[serde(default)]
    default_branch: Option<String>,
    namespace: GitLabNamespace,
}

#[derive(Debug, Deserialize)]
struct GitLabNamespace {
    full_path: String,
}

#[derive(Debug, Serialize)]
struct CreateProjectRequest<'a> {
    name: &'a str,
    path: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    visibility: &'static str,
    initialize_with_readme: bool,
}

impl GitLabProject {
    fn into_repository(self, username: &str) -> Repository {
        let is_mine = same_owner(&self.namespace.full_path, username);
        Repository {
            owner: self.namespace.full_path,
            name: self.path,
            description: self.description.filter(|d| !d.is_empty()),
            is_private: self.visibility == "private",
            is_mine,
            default_branch: self
                .default_branch
                .filter(|b| !b.is_empty())
                .unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
            clone_url: self.http_url_to_repo,
        }
    }
}

/// `owner/name` as a single URL-encoded path segment.
fn project_id(full_name: &str) -> String {
    url::form_urlencoded::byte_serialize(full_name.as_bytes()).collect()
}

fn auth_scheme(token: &SecretString) -> AuthScheme {
    if token.expose().starts_with(PAT_PREFIX) {
        AuthScheme::PrivateToken
    } else {
        AuthScheme::Bearer
    }
}

fn api_client(settings: &ProviderSettings) -> Result<(ApiClient, String, SecretString)> {
    let creds = settings.credentials()?;
    let api = ApiClient::new(
        PROVIDER,
        &format!("{}/api/v4", creds.base_url),
        creds.token.clone(),
        auth_scheme(&creds.token),
        &settings.client,
    )
    .map_err(|e| MigrationError::provider(PROVIDER, e))?;
    Ok((api, creds.username, creds.token))
}

fn oauth_url(clone_url: &str, token: &SecretString) -> Result<SecretString> {
    with_credentials(PROVIDER, clone_url, "oauth2", Some(token.expose()))
}

/// Reads projects from a GitLab instance.
#[derive(Debug)]
pub struct GitLabSource {
    api: ApiClient,
    username: String,
    token: SecretString,
}

impl GitLabSource {
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
impl SourceProvider for GitLabSource {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn username(&self) -> &str {
        &self.username
    }

    async fn get_accessible_repositories(&self) -> Result<Vec<Repository>> {
        // Membership covers personal projects and every group the user
        // belongs to.
        let projects: Vec<GitLabProject> = self
            .api
            .get_paginated(
                "/projects",
                &[("membership", "true")],
                Pagination::NextPageHeader,
            )
            .await
            .map_err(|e| MigrationError::provider(PROVIDER, e))?;

        let repos: Vec<Repository> = projects
            .into_iter()
            .map(|p| p.into_repository(&self.username))
            .collect();
        let merged = merge_unique([repos]);
        info!(count = merged.len(), "Listed GitLab projects");
        Ok(merged)
    }

    async fn get_repository_info(&self, owner: &str, name: &str) -> Result<Option<Repository>> {
        let project: Option<GitLabProject> = self
            .api
            .get_optional(&format!("/projects/{}", project_id(&format!("{owner}/{name}"))))
            .await
            .map_err(|e| MigrationError::provider(PROVIDER, e))?;
        Ok(project.map(|p| p.into_repository(&self.username)))
    }

    fn get_authenticated_clone_url(&self, repository: &Repository) -> Result<SecretString> {
        oauth_url(&repository.clone_url, &self.token)
    }
}

/// Creates projects on a GitLab instance.
#[derive(Debug)]
pub struct GitLabDestination {
    api: ApiClient,
    username: String,
    token: SecretString,
}

impl GitLabDestination {
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
impl DestinationProvider for GitLabDestination {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn owner(&self) -> &str {
        &self.username
    }

    fn name_rules(&self) -> NameRules {
        NameRules::GITLAB
    }

    async fn repository_exists(&self, full_name: &str) -> Result<bool> {
        self.api
            .exists(&format!("/projects/{}", project_id(full_name)))
            .await
            .map_err(|e| MigrationError::provider(PROVIDER, e))
    }

    async fn create_repository(
        &self,
        name: &str,
        is_private: bool,
        description: Option<&str>,
    ) -> Result<Repository> {
        let created: GitLabProject = self
            .api
            .post(
                "/projects",
                &CreateProjectRequest {
                    name,
                    path: name,
                    description,
                    visibility: if is_private { "private" } else { "public" },
                    initialize_with_readme: false,
                },
            )
            .await
            .map_err(|e| MigrationError::provider(PROVIDER, e))?;
        info!(repo = %name, "Created GitLab project");
        Ok(created.into_repository(&self.username))
    }

    fn get_authenticated_push_url(&self, repository: &Repository) -> Result<SecretString> {
        oauth_url(&repository.clone_url, &self.token)
    }
}
