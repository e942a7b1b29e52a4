//! The mutation strategy contract.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use rand::RngCore;

use crate::error::StrategyError;
use crate::request::Request;

/// A named, pure transform from one request to zero or more variants.
///
/// Implementations must:
///
/// * never panic or fail for a request they simply do not apply to; they return `Ok(vec![])`,
/// * return [`StrategyError`] only when the request is malformed for them,
/// * draw all randomness from `rng`, so that a seeded run is reproducible.
///
/// The input is borrowed, so a strategy cannot change the caller's request; every variant
/// it returns is a new value.
pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    fn mutate(
        &self,
        request: &Request,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Request>, StrategyError>;
}

/// Strategies are shared between profiles and schedules.
pub type SharedStrategy = Arc<dyn Strategy>;

/// Plain function signature used by the built-in catalogue.
pub type MutateFn = fn(&Request, &mut dyn RngCore) -> Result<Vec<Request>, StrategyError>;

/// Adapts a function or closure to [`Strategy`].
pub struct FnStrategy<F> {
    name: Cow<'static, str>,
    mutate: F,
}

impl<F> FnStrategy<F>
where
    F: Fn(&Request, &mut dyn RngCore) -> Result<Vec<Request>, StrategyError> + Send + Sync,
{
    pub fn new(name: impl Into<Cow<'static, str>>, mutate: F) -> Self {
        Self {
            name: name.into(),
            mutate,
        }
    }
}

impl<F> Strategy for FnStrategy<F>
where
    F: Fn(&Request, &mut dyn RngCore) -> Result<Vec<Request>, StrategyError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn mutate(
        &self,
        request: &Request,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Request>, StrategyError> {
        (self.mutate)(request, rng)
    }
}

impl<F> fmt::Debug for FnStrategy<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnStrategy").field("name", &self.name).finish()
    }
}

/// Wraps `mutate` into a [`SharedStrategy`] called `name`.
pub fn from_fn<F>(name: impl Into<Cow<'static, str>>, mutate: F) -> SharedStrategy
where
    F: Fn(&Request, &mut dyn RngCore) -> Result<Vec<Request>, StrategyError>
        + Send
        + Sync
        + 'static,
{
    Arc::new(FnStrategy::new(name, mutate))
}
