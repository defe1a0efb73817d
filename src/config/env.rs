//! Environment variable overrides.
//!
//! Variables are read once into an [`EnvOverrides`] value; the process
//! environment is never written.

use std::ffi::OsString;

use super::{ConfigError, ConfigResult, Settings};
use crate::plugins::{ImportPolicy, SEARCH_PATH_VAR, SearchPath};

pub const RECURSE_VAR: &str = "PLUGSPACE_RECURSE";
pub const IMPORT_POLICY_VAR: &str = "PLUGSPACE_IMPORT_POLICY";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvOverrides {
    pub search_path: Option<SearchPath>,
    pub recurse: Option<bool>,
    pub import_policy: Option<ImportPolicy>,
}

impl EnvOverrides {
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var_os(key))
    }

    /// Reads overrides through `lookup` instead of the process environment.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let search_path =
            lookup(SEARCH_PATH_VAR).and_then(|value| SearchPath::from_path_list(&value));

        let recurse = text(&lookup, RECURSE_VAR)?
            .map(|value| parse_bool(RECURSE_VAR, &value))
            .transpose()?;

        let import_policy = text(&lookup, IMPORT_POLICY_VAR)?
            .map(|value| {
                value.parse::<ImportPolicy>().map_err(|message| ConfigError::InvalidValue {
                    key: IMPORT_POLICY_VAR.to_string(),
                    message,
                })
            })
            .transpose()?;

        Ok(Self {
            search_path,
            recurse,
            import_policy,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.search_path.is_none() && self.recurse.is_none() && self.import_policy.is_none()
    }

    pub fn apply(self, settings: &mut Settings) {
        if let Some(search_path) = self.search_path {
            settings.search_path = search_path;
        }
        if let Some(recurse) = self.recurse {
            settings.recurse = recurse;
        }
        if let Some(import_policy) = self.import_policy {
            settings.import_policy = import_policy;
        }
    }
}

fn text<F>(lookup: &F, key: &str) -> ConfigResult<Option<String>>
where
    F: Fn(&str) -> Option<OsString>,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .into_string()
            .map(Some)
            .map_err(|raw| ConfigError::Env(std::env::VarError::NotUnicode(raw))),
    }
}

fn parse_bool(key: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got '{other}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<OsString> {
        let vars: HashMap<String, OsString> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), OsString::from(v)))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_no_variables() {
        let overrides = EnvOverrides::from_lookup(lookup(&[])).unwrap();
        assert!(overrides.is_empty());
    }

    #[test]
    fn test_all_variables() {
        let joined = std::env::join_paths(["/one", "/two"]).unwrap();
        let joined = joined.to_str().unwrap().to_string();
        let overrides = EnvOverrides::from_lookup(lookup(&[
            (SEARCH_PATH_VAR, joined.as_str()),
            (RECURSE_VAR, "yes"),
            (IMPORT_POLICY_VAR, "fail"),
        ]))
        .unwrap();

        let mut settings = Settings::default();
        overrides.apply(&mut settings);
        assert_eq!(
            settings.search_path.roots(),
            [PathBuf::from("/one"), PathBuf::from("/two")]
        );
        assert!(settings.recurse);
        assert_eq!(settings.import_policy, ImportPolicy::Fail);
    }

    #[test]
    fn test_empty_search_path_is_unset() {
        let overrides = EnvOverrides::from_lookup(lookup(&[(SEARCH_PATH_VAR, "")])).unwrap();
        assert!(overrides.search_path.is_none());

        let mut settings = Settings {
            search_path: SearchPath::new(["/from/file"]),
            ..Default::default()
        };
        overrides.apply(&mut settings);
        assert_eq!(settings.search_path.roots(), [PathBuf::from("/from/file")]);
    }

    #[test]
    fn test_invalid_values() {
        let err = EnvOverrides::from_lookup(lookup(&[(RECURSE_VAR, "sometimes")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == RECURSE_VAR));

        let err =
            EnvOverrides::from_lookup(lookup(&[(IMPORT_POLICY_VAR, "retry")])).unwrap_err();
        assert!(err.to_string().contains(IMPORT_POLICY_VAR));
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("k", "TRUE").unwrap());
        assert!(!parse_bool("k", "0").unwrap());
        assert!(parse_bool("k", "2").is_err());
    }
}
