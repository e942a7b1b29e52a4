//! TOML profile configuration.
//!
//! ```toml
//! name = "general"
//! weighting = "per_target"
//!
//! [[strategies]]
//! strategy = "url_encoding"
//!
//! [[strategies]]
//! strategy = "chunked_encoding"
//! enabled = false
//! ```
//!
//! A configuration either builds a new [`Profile`] against a [`Catalogue`] or is applied to
//! an existing profile as an enable/disable override.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::catalogue::Catalogue;
use crate::error::ConfigurationError;
use crate::profile::{Profile, Weighting};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileConfig {
    pub name: String,
    #[serde(default)]
    pub weighting: Weighting,
    #[serde(default)]
    pub strategies: Vec<EntryConfig>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntryConfig {
    pub strategy: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl ProfileConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigurationError> {
        Ok(toml::from_str(source)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigurationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// A new profile holding exactly the configured strategies, in file order.
    pub fn build(&self, catalogue: &Catalogue) -> Result<Profile, ConfigurationError> {
        let mut profile = Profile::new(self.name.clone()).with_weighting(self.weighting);
        for entry in &self.strategies {
            let strategy = catalogue.resolve(&self.name, &entry.strategy)?;
            profile.register(strategy, entry.enabled)?;
        }
        Ok(profile)
    }

    /// Overrides the weighting and enabled flags of `profile`.
    ///
    /// Every entry is validated before anything is changed, so a failed reload leaves
    /// `profile` untouched.
    pub fn apply_to(&self, profile: &mut Profile) -> Result<(), ConfigurationError> {
        let mut seen = HashSet::new();
        for entry in &self.strategies {
            if !seen.insert(entry.strategy.as_str()) {
                return Err(ConfigurationError::DuplicateStrategy {
                    profile: profile.name().to_owned(),
                    name: entry.strategy.clone(),
                });
            }
            if profile.get(&entry.strategy).is_none() {
                return Err(ConfigurationError::UnknownStrategy {
                    profile: profile.name().to_owned(),
                    name: entry.strategy.clone(),
                });
            }
        }

        profile.set_weighting(self.weighting);
        for entry in &self.strategies {
            profile.set_enabled(&entry.strategy, entry.enabled)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::catalogue::{ProfileKind, builtin_profile};

    const CONFIG: &str = r#"
name = "custom"
weighting = "per_target"

[[strategies]]
strategy = "url_encoding"

[[strategies]]
strategy = "chunked_encoding"
enabled = false
"#;

    #[test]
    fn builds_profiles_from_toml() {
        let config = ProfileConfig::from_toml_str(CONFIG).unwrap();
        let profile = config.build(&Catalogue::builtin()).unwrap();
        assert_eq!(profile.name(), "custom");
        assert_eq!(profile.weighting(), Weighting::PerTarget);
        assert_eq!(profile.len(), 2);
        assert!(profile.is_enabled("url_encoding"));
        assert!(!profile.is_enabled("chunked_encoding"));
    }

    #[test]
    fn rejects_unknown_fields_and_strategies() {
        assert_matches!(
            ProfileConfig::from_toml_str("name = \"x\"\ncolour = \"blue\"\n"),
            Err(ConfigurationError::Parse(_))
        );
        let config = ProfileConfig::from_toml_str(
            "name = \"x\"\n[[strategies]]\nstrategy = \"does_not_exist\"\n",
        )
        .unwrap();
        assert_matches!(
            config.build(&Catalogue::builtin()),
            Err(ConfigurationError::UnknownStrategy { .. })
        );
    }

    #[test]
    fn failed_reload_leaves_profile_untouched() {
        let mut profile = builtin_profile(ProfileKind::General).unwrap();
        let config = ProfileConfig::from_toml_str(
            "name = \"general\"\nweighting = \"per_target\"\n[[strategies]]\nstrategy = \"url_encoding\"\nenabled = false\n[[strategies]]\nstrategy = \"method_conversion\"\n",
        )
        .unwrap();
        assert_matches!(
            config.apply_to(&mut profile),
            Err(ConfigurationError::UnknownStrategy { name, .. }) if name == "method_conversion"
        );
        assert!(profile.is_enabled("url_encoding"));
        assert_eq!(profile.weighting(), Weighting::Global);
    }

    #[test]
    fn reload_toggles_entries() {
        let mut profile = builtin_profile(ProfileKind::General).unwrap();
        let config = ProfileConfig::from_toml_str(
            "name = \"general\"\n[[strategies]]\nstrategy = \"sql_comment\"\n[[strategies]]\nstrategy = \"url_encoding\"\nenabled = false\n",
        )
        .unwrap();
        config.apply_to(&mut profile).unwrap();
        assert!(profile.is_enabled("sql_comment"));
        assert!(!profile.is_enabled("url_encoding"));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert_matches!(
            ProfileConfig::from_file("/definitely/not/here.toml"),
            Err(ConfigurationError::Io { .. })
        );
    }
}
