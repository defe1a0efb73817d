use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::PluginError;

pub const NAMESPACE_SEP: char = '.';

/// Dotted logical path naming a plugin directory tree, e.g. `team.plugins`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Namespace(String);

impl Namespace {
    pub fn new(name: impl Into<String>) -> Result<Self, PluginError> {
        let name = name.into();
        validate(&name)?;
        Ok(Self(name))
    }

    /// Appends one segment, e.g. `team.plugins` + `audio` -> `team.plugins.audio`.
    pub fn child(&self, segment: &str) -> Result<Self, PluginError> {
        let name = format!("{}{}{}", self.0, NAMESPACE_SEP, segment);
        if let Some(reason) = segment_error(segment) {
            return Err(PluginError::InvalidNamespace {
                namespace: name,
                reason: reason.into(),
            });
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(NAMESPACE_SEP)
    }

    pub fn last_segment(&self) -> &str {
        self.0.rsplit(NAMESPACE_SEP).next().unwrap_or(&self.0)
    }

    /// Directory of this namespace relative to a search root.
    pub fn to_relative_path(&self) -> PathBuf {
        self.segments().collect()
    }
}

fn validate(name: &str) -> Result<(), PluginError> {
    let reason = if name.is_empty() {
        Some("must not be empty")
    } else {
        name.split(NAMESPACE_SEP).find_map(segment_error)
    };
    match reason {
        Some(reason) => Err(PluginError::InvalidNamespace {
            namespace: name.to_string(),
            reason: reason.into(),
        }),
        None => Ok(()),
    }
}

fn segment_error(segment: &str) -> Option<&'static str> {
    if segment.is_empty() {
        Some("contains an empty segment")
    } else if segment.contains(NAMESPACE_SEP) {
        Some("segment contains the namespace separator")
    } else if segment.contains(['/', '\\']) {
        Some("segment contains a path separator")
    } else {
        None
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Namespace {
    type Err = PluginError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Namespace {
    type Error = PluginError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Namespace {
    type Error = PluginError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Namespace> for String {
    fn from(ns: Namespace) -> Self {
        ns.0
    }
}

impl AsRef<str> for Namespace {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_new_valid() {
        let ns = Namespace::new("team.plugins").unwrap();
        assert_eq!(ns.as_str(), "team.plugins");
        assert_eq!(ns.segments().collect::<Vec<_>>(), vec!["team", "plugins"]);
        assert_eq!(ns.last_segment(), "plugins");
    }

    #[test]
    fn test_new_invalid() {
        assert!(Namespace::new("").is_err());
        assert!(Namespace::new("a..b").is_err());
        assert!(Namespace::new("trailing.").is_err());
        assert!(Namespace::new(".leading").is_err());
        assert!(Namespace::new("a/b").is_err());
    }

    #[test]
    fn test_child() {
        let ns = Namespace::new("team").unwrap();
        let child = ns.child("plugins").unwrap();
        assert_eq!(child.as_str(), "team.plugins");
        assert!(ns.child("").is_err());
        assert!(ns.child("a.b").is_err());
    }

    #[test]
    fn test_relative_path() {
        let ns = Namespace::new("team.plugins.audio").unwrap();
        assert_eq!(
            ns.to_relative_path(),
            Path::new("team").join("plugins").join("audio")
        );
    }

    #[test]
    fn test_serde_as_string() {
        let ns: Namespace = serde_json::from_str(r#""a.b""#).unwrap();
        assert_eq!(ns.as_str(), "a.b");
        assert_eq!(serde_json::to_string(&ns).unwrap(), r#""a.b""#);
        assert!(serde_json::from_str::<Namespace>(r#""a..b""#).is_err());
    }
}
