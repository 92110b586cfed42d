//! Build target labels: `[@repo]//pkg[:name]`.
//!
//! A label is the canonical identity of a build target. Labels parse from and
//! print to the usual short forms: `//foo/bar` means `//foo/bar:bar`, and a
//! target in the current package prints as `:name`.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Error produced when a label string does not parse.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LabelError {
    #[error("label is empty")]
    Empty,
    #[error("invalid label {0:?}")]
    Invalid(String),
}

/// A build target identifier.
///
/// `relative` labels carry only a name (and optionally a package) and must be
/// resolved against a base package before they identify anything.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Label {
    pub repo: String,
    pub pkg: String,
    pub name: String,
    pub relative: bool,
}

impl Label {
    /// Absolute label in the main repository.
    pub fn new(pkg: &str, name: &str) -> Label {
        Label {
            repo: String::new(),
            pkg: pkg.to_string(),
            name: name.to_string(),
            relative: false,
        }
    }

    /// Absolute label in an external repository.
    pub fn external(repo: &str, pkg: &str, name: &str) -> Label {
        Label {
            repo: repo.to_string(),
            pkg: pkg.to_string(),
            name: name.to_string(),
            relative: false,
        }
    }

    /// Parse a label string. Accepts absolute (`//pkg:name`, `@repo//pkg`)
    /// and relative (`:name`, `name`) forms.
    pub fn parse(s: &str) -> Result<Label, LabelError> {
        let original = s;
        if s.is_empty() {
            return Err(LabelError::Empty);
        }

        let mut repo = String::new();
        let mut rest = s;
        if let Some(tail) = rest.strip_prefix('@') {
            let slashes = tail
                .find("//")
                .ok_or_else(|| LabelError::Invalid(original.to_string()))?;
            repo = tail[..slashes].to_string();
            if !valid_repo(&repo) {
                return Err(LabelError::Invalid(original.to_string()));
            }
            rest = &tail[slashes..];
        }

        if let Some(tail) = rest.strip_prefix("//") {
            let (pkg, name) = match tail.split_once(':') {
                Some((_, "")) => return Err(LabelError::Invalid(original.to_string())),
                Some((pkg, name)) => (pkg.to_string(), name.to_string()),
                None => {
                    let name = tail.rsplit('/').next().unwrap_or(tail).to_string();
                    (tail.to_string(), name)
                }
            };
            if !valid_pkg(&pkg) || !valid_name(&name) || (pkg.is_empty() && name.is_empty()) {
                return Err(LabelError::Invalid(original.to_string()));
            }
            return Ok(Label {
                repo,
                pkg,
                name,
                relative: false,
            });
        }

        // Relative forms never carry a repository.
        if !repo.is_empty() {
            return Err(LabelError::Invalid(original.to_string()));
        }
        let name = rest.strip_prefix(':').unwrap_or(rest);
        if name.is_empty() || !valid_name(name) || name.contains('/') {
            return Err(LabelError::Invalid(original.to_string()));
        }
        Ok(Label {
            repo: String::new(),
            pkg: String::new(),
            name: name.to_string(),
            relative: true,
        })
    }

    /// Resolve a relative label against a base repository and package.
    /// Absolute labels are returned unchanged.
    pub fn abs(&self, repo: &str, pkg: &str) -> Label {
        if !self.relative {
            return self.clone();
        }
        Label {
            repo: repo.to_string(),
            pkg: pkg.to_string(),
            name: self.name.clone(),
            relative: false,
        }
    }

    /// Shortest equivalent form as seen from `(repo, pkg)`: same-package
    /// labels collapse to `:name`, everything else stays absolute.
    pub fn rel(&self, repo: &str, pkg: &str) -> Label {
        if self.relative {
            return self.clone();
        }
        if self.repo == repo && self.pkg == pkg {
            return Label {
                repo: String::new(),
                pkg: String::new(),
                name: self.name.clone(),
                relative: true,
            };
        }
        self.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.pkg.is_empty()
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.relative {
            return write!(f, ":{}", self.name);
        }
        if !self.repo.is_empty() {
            write!(f, "@{}", self.repo)?;
        }
        write!(f, "//{}", self.pkg)?;
        // Collapse ":name" when it repeats the last package segment.
        let last = self.pkg.rsplit('/').next().unwrap_or("");
        if self.pkg.is_empty() || last != self.name {
            write!(f, ":{}", self.name)?;
        }
        Ok(())
    }
}

fn valid_repo(repo: &str) -> bool {
    !repo.is_empty()
        && repo
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
}

fn valid_pkg(pkg: &str) -> bool {
    if pkg.contains(':') || pkg.starts_with('/') || pkg.ends_with('/') || pkg.contains("//") {
        return false;
    }
    pkg.chars()
        .all(|c| c.is_ascii_alphanumeric() || "/-._+~ ".contains(c))
}

fn valid_name(name: &str) -> bool {
    if name.contains(':') || name.starts_with('/') || name.contains("//") {
        return false;
    }
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || "/-._+~ %".contains(c))
}
