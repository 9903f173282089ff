//! Destination repository name validation.
//!
//! The same checks run in the selector's rename step, for immediate
//! feedback, and in the engine before any task starts.

use std::collections::HashSet;

use crate::error::ValidationError;

/// Naming limits of one destination service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameRules {
    /// Provider the rules belong to.
    pub provider: &'static str,
    /// Maximum length in characters.
    pub max_len: usize,
    /// Suffixes the service refuses, compared case-insensitively.
    pub forbidden_suffixes: &'static [&'static str],
}

impl NameRules {
    /// GitHub repository names.
    pub const GITHUB: Self = Self {
        provider: "github",
        max_len: 100,
        forbidden_suffixes: &[".git"],
    };

    /// GitLab project paths.
    pub const GITLAB: Self = Self {
        provider: "gitlab",
        max_len: 255,
        forbidden_suffixes: &[".git", ".atom"],
    };

    /// Gitea repository names.
    pub const GITEA: Self = Self {
        provider: "gitea",
        max_len: 100,
        forbidden_suffixes: &[".git", ".wiki"],
    };
}

/// Checks `candidate` against `rules` and returns the trimmed name.
pub fn validate_name(candidate: &str, rules: &NameRules) -> Result<String, ValidationError> {
    let name = candidate.trim();
    if name.is_empty() {
        return Err(ValidationError::Empty);
    }

    let len = name.chars().count();
    if len > rules.max_len {
        return Err(ValidationError::TooLong {
            len,
            max: rules.max_len,
            provider: rules.provider,
        });
    }

    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(ValidationError::InvalidCharacter(bad));
    }

    if name == "." || name == ".." {
        return Err(ValidationError::Reserved(name.to_string()));
    }

    if name.starts_with('.') || name.starts_with('-') || name.ends_with('.') {
        return Err(ValidationError::BadBoundary);
    }

    let lower = name.to_ascii_lowercase();
    if let Some(suffix) = rules
        .forbidden_suffixes
        .iter()
        .find(|suffix| lower.ends_with(*suffix))
    {
        return Err(ValidationError::Reserved((*suffix).to_string()));
    }

    Ok(name.to_string())
}

/// Name rules plus the set of names already claimed.
#[derive(Debug, Clone)]
pub struct Validator {
    rules: NameRules,
    taken: HashSet<String>,
}

impl Validator {
    /// Creates a validator with nothing claimed.
    pub fn new(rules: NameRules) -> Self {
        Self {
            rules,
            taken: HashSet::new(),
        }
    }

    /// Marks names as claimed. Comparison is case-insensitive, as on every
    /// supported service.
    #[must_use]
    pub fn with_taken<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.taken
            .extend(names.into_iter().map(|n| n.as_ref().to_lowercase()));
        self
    }

    /// Returns the rules in use.
    pub fn rules(&self) -> &NameRules {
        &self.rules
    }

    /// Validates the format, then reports a collision with a claimed name.
    pub fn validate(&self, candidate: &str) -> Result<String, ValidationError> {
        let name = validate_name(candidate, &self.rules)?;
        if self.taken.contains(&name.to_lowercase()) {
            return Err(ValidationError::Collision(name));
        }
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_validate_name() {
        let github = NameRules::GITHUB;

        assert_eq!(validate_name("my-repo_2", &github).unwrap(), "my-repo_2");
        assert_eq!(validate_name("  spaced  ", &github).unwrap(), "spaced");
        assert!(validate_name("v1.0", &github).is_ok());

        assert_eq!(
            validate_name("My Repo!", &github),
            Err(ValidationError::InvalidCharacter(' '))
        );
        assert_eq!(validate_name("", &github), Err(ValidationError::Empty));
        assert_eq!(validate_name("   ", &github), Err(ValidationError::Empty));
        assert_eq!(validate_name(".hidden", &github), Err(ValidationError::BadBoundary));
        assert_eq!(validate_name("-dash", &github), Err(ValidationError::BadBoundary));
        assert_eq!(validate_name("trailing.", &github), Err(ValidationError::BadBoundary));
        assert_eq!(
            validate_name("..", &github),
            Err(ValidationError::Reserved("..".into()))
        );
        assert_eq!(
            validate_name("mirror.GIT", &github),
            Err(ValidationError::Reserved(".git".into()))
        );
        assert!(validate_name("café", &github).is_err());
    }

    #[test]
    fn test_length_limits_differ_by_provider() {
        let long = "a".repeat(150);
        assert!(matches!(
            validate_name(&long, &NameRules::GITHUB),
            Err(ValidationError::TooLong { len: 150, max: 100, .. })
        ));
        assert!(validate_name(&long, &NameRules::GITLAB).is_ok());
        assert!(validate_name("feed.atom", &NameRules::GITLAB).is_err());
        assert!(validate_name("feed.atom", &NameRules::GITHUB).is_ok());
    }

    #[test]
    fn test_validator_reports_collision() {
        let validator = Validator::new(NameRules::GITHUB).with_taken(["App"]);
        assert_eq!(
            validator.validate("app"),
            Err(ValidationError::Collision("app".into()))
        );
        assert!(validator.validate("app2").is_ok());
    }

    proptest! {
        #[test]
        fn prop_valid_alphabet_accepted(name in "[a-zA-Z0-9][a-zA-Z0-9_-]{0,60}[a-zA-Z0-9_]") {
            prop_assert!(validate_name(&name, &NameRules::GITHUB).is_ok());
        }

        #[test]
        fn prop_accepted_names_stay_in_alphabet(name in "\\PC{0,120}") {
            if let Ok(valid) = validate_name(&name, &NameRules::GITHUB) {
                prop_assert!(!valid.is_empty());
                prop_assert!(valid.chars().count() <= 100);
                prop_assert!(valid
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')));
            }
        }
    }
}
