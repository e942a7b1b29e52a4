//! Strategy registries.
//!
//! A [`Profile`] is an ordered list of strategies, each with an enabled flag. The order
//! in which strategies are registered is the tie-break order used by the
//! [`Scheduler`](crate::scheduler::Scheduler), so it is preserved exactly.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::strategy::SharedStrategy;

/// Which successes count towards a strategy's weight.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weighting {
    /// Successes against every target count.
    #[default]
    Global,
    /// Only successes against the base request's own target count.
    PerTarget,
}

/// One registered strategy and whether it is active.
#[derive(Clone)]
pub struct ProfileEntry {
    pub strategy: SharedStrategy,
    pub enabled: bool,
}

impl ProfileEntry {
    pub fn name(&self) -> &str {
        self.strategy.name()
    }
}

impl fmt::Debug for ProfileEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfileEntry")
            .field("strategy", &self.name())
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// A named, ordered strategy registry.
#[derive(Clone, Debug)]
pub struct Profile {
    name: Cow<'static, str>,
    weighting: Weighting,
    entries: Vec<ProfileEntry>,
}

impl Profile {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            weighting: Weighting::default(),
            entries: Vec::new(),
        }
    }

    pub fn with_weighting(mut self, weighting: Weighting) -> Self {
        self.weighting = weighting;
        self
    }

    /// Builder form of [`Profile::register`].
    pub fn with_strategy(
        mut self,
        strategy: SharedStrategy,
        enabled: bool,
    ) -> Result<Self, ConfigurationError> {
        self.register(strategy, enabled)?;
        Ok(self)
    }

    /// Appends `strategy` to the registry.
    ///
    /// Fails with [`ConfigurationError::DuplicateStrategy`] if a strategy with the same name
    /// is already registered, enabled or not.
    pub fn register(
        &mut self,
        strategy: SharedStrategy,
        enabled: bool,
    ) -> Result<(), ConfigurationError> {
        if self.get(strategy.name()).is_some() {
            return Err(ConfigurationError::DuplicateStrategy {
                profile: self.name.to_string(),
                name: strategy.name().to_owned(),
            });
        }
        self.entries.push(ProfileEntry { strategy, enabled });
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn weighting(&self) -> Weighting {
        self.weighting
    }

    pub fn set_weighting(&mut self, weighting: Weighting) {
        self.weighting = weighting;
    }

    /// Every entry, disabled ones included, in declaration order.
    pub fn entries(&self) -> &[ProfileEntry] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<&ProfileEntry> {
        self.entries.iter().find(|entry| entry.name() == name)
    }

    /// Whether `name` is registered and enabled.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.get(name).is_some_and(|entry| entry.enabled)
    }

    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> Result<(), ConfigurationError> {
        match self.entries.iter_mut().find(|entry| entry.name() == name) {
            Some(entry) => {
                entry.enabled = enabled;
                Ok(())
            }
            None => Err(ConfigurationError::UnknownStrategy {
                profile: self.name.to_string(),
                name: name.to_owned(),
            }),
        }
    }

    /// The enabled strategies, in declaration order.
    pub fn active_strategies(&self) -> impl Iterator<Item = &SharedStrategy> + '_ {
        self.entries
            .iter()
            .filter(|entry| entry.enabled)
            .map(|entry| &entry.strategy)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
