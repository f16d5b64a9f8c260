//! Repository references.

use std::fmt;
use std::str::FromStr;

use ticketbuddy_core::{Error, Result};

const URL_PREFIXES: &[&str] = &[
    "https://github.com/",
    "http://github.com/",
    "https://www.github.com/",
    "github.com/",
];

/// An `owner/name` pair identifying a GitHub repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    /// Build a reference from path segments, validating both.
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Result<Self> {
        let owner = owner.into();
        let name = name.into();
        if !is_valid_segment(&owner) || !is_valid_segment(&name) {
            return Err(invalid(&format!("{}/{}", owner, name)));
        }
        Ok(Self { owner, name })
    }

    /// Parse `owner/name` or `https://github.com/owner/name`, with an
    /// optional `.git` suffix or trailing slash. Pasted URLs may point deeper
    /// into the repository (`/tree/main`, `/pulls`, `?tab=...`); only the
    /// first two path segments count.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let (path, from_url) = match URL_PREFIXES
            .iter()
            .find_map(|prefix| trimmed.strip_prefix(prefix))
        {
            Some(rest) => (rest.split(['?', '#']).next().unwrap_or(rest), true),
            None => (trimmed, false),
        };

        let mut parts = path.trim_end_matches('/').split('/');
        let (owner, name) = match (parts.next(), parts.next(), parts.next()) {
            (Some(owner), Some(name), None) => (owner, name),
            (Some(owner), Some(name), Some(_)) if from_url => (owner, name),
            _ => return Err(invalid(input)),
        };
        let name = name.strip_suffix(".git").unwrap_or(name);

        if !is_valid_segment(owner) || !is_valid_segment(name) {
            return Err(invalid(input));
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    /// `owner/name`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Browser URL of the repository.
    pub fn html_url(&self) -> String {
        format!("https://github.com/{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        RepoRef::parse(s)
    }
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

fn invalid(input: &str) -> Error {
    Error::InvalidData(format!(
        "Invalid repository '{}'. Expected owner/name or https://github.com/owner/name",
        input
    ))
}
