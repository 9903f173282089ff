//! Repository types for gitshift.

use serde::{Deserialize, Serialize};

use crate::DEFAULT_BRANCH;

/// A remote repository, independent of the hosting service that reported it.
///
/// Values are produced once by a source provider and treated as read-only
/// afterwards. All lookups are keyed by [`Repository::full_name`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    /// Owning user, organisation or group path.
    pub owner: String,
    /// Repository name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Whether the repository is private on its host.
    pub is_private: bool,
    /// Whether the owner is the authenticated identity.
    pub is_mine: bool,
    /// Default branch name.
    pub default_branch: String,
    /// HTTPS clone URL without embedded credentials.
    pub clone_url: String,
}

impl Repository {
    /// Creates a new public repository owned by someone else.
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            description: None,
            is_private: false,
            is_mine: false,
            default_branch: DEFAULT_BRANCH.to_string(),
            clone_url: String::new(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Marks the repository as private or public.
    #[must_use]
    pub fn with_private(mut self, is_private: bool) -> Self {
        self.is_private = is_private;
        self
    }

    /// Marks whether the repository belongs to the authenticated identity.
    #[must_use]
    pub fn with_mine(mut self, is_mine: bool) -> Self {
        self.is_mine = is_mine;
        self
    }

    /// Sets the credential-free clone URL.
    #[must_use]
    pub fn with_clone_url(mut self, clone_url: impl Into<String>) -> Self {
        self.clone_url = clone_url.into();
        self
    }

    /// Sets the default branch.
    #[must_use]
    pub fn with_default_branch(mut self, branch: impl Into<String>) -> Self {
        self.default_branch = branch.into();
        self
    }

    /// Returns the full name (owner/name).
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Returns the description cut to `max` characters, with an ellipsis
    /// appended when something was removed.
    pub fn short_description(&self, max: usize) -> Option<String> {
        let description = self.description.as_deref()?.trim();
        if description.is_empty() {
            return None;
        }
        if description.chars().count() <= max {
            return Some(description.to_string());
        }
        let cut: String = description.chars().take(max).collect();
        Some(format!("{cut}..."))
    }
}

impl std::fmt::Display for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_creation() {
        let repo = Repository::new("alice", "app");
        assert_eq!(repo.name, "app");
        assert_eq!(repo.owner, "alice");
        assert_eq!(repo.default_branch, "main");
        assert_eq!(repo.full_name(), "alice/app");
        assert!(!repo.is_mine);
        assert!(!repo.is_private);
    }

    #[test]
    fn test_short_description() {
        let repo = Repository::new("alice", "app").with_description("a".repeat(50));
        let short = repo.short_description(45).unwrap();
        assert_eq!(short.len(), 48);
        assert!(short.ends_with("..."));

        let repo = Repository::new("alice", "app").with_description("tiny");
        assert_eq!(repo.short_description(45).as_deref(), Some("tiny"));

        let repo = Repository::new("alice", "app").with_description("   ");
        assert_eq!(repo.short_description(45), None);
    }

    #[test]
    fn test_serde_roundtrip_keeps_ownership() {
        let repo = Repository::new("alice", "app").with_mine(true).with_private(true);
        let json = serde_json::to_string(&repo).unwrap();
        let back: Repository = serde_json::from_str(&json).unwrap();
        assert_eq!(repo, back);
    }
}
