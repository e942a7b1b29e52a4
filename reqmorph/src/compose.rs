//! Single and pairwise strategy composition.
//!
//! Given a [`Schedule`] `[s0, s1, .., sn]` and a base request, the engine yields
//!
//! * at [`CompositionLevel::Single`], every variant of `si(base)`, for each `i` in order;
//! * at [`CompositionLevel::Pairwise`], for every `i < j` in schedule order (outer `i`,
//!   inner `j`), every variant of `sj(v)` for each `v` in `si(base)`;
//! * at [`CompositionLevel::Both`], the single variants followed by the pairwise ones.
//!
//! Generation is lazy: strategies run one application (or one pair) at a time, as the
//! [`Variants`] iterator is pulled. Dropping the iterator stops all work.

use std::iter::FusedIterator;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use slog::{Discard, Logger, debug, o, warn};

use crate::error::StrategyError;
use crate::request::Request;
use crate::scheduler::Schedule;
use crate::strategy::SharedStrategy;

/// Which compositions to produce.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositionLevel {
    Single,
    Pairwise,
    #[default]
    Both,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub level: CompositionLevel,
    /// Stop after this many variants.
    pub limit: Option<usize>,
    /// Seed for [`CompositionEngine::rng`]; runs with the same seed, schedule and base
    /// request produce the same variants.
    pub seed: Option<u64>,
}

/// A generated request and the strategies that produced it, in application order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Variant {
    pub request: Request,
    pub chain: Vec<String>,
}

pub struct CompositionEngine {
    config: EngineConfig,
    log: Logger,
}

impl Default for CompositionEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl CompositionEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            log: Logger::root(Discard, o!()),
        }
    }

    pub fn with_logger(mut self, log: Logger) -> Self {
        self.log = log.new(o!("component" => "compose"));
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// A random source for [`CompositionEngine::variants`]: seeded from the configuration
    /// if a seed is set, from the operating system otherwise.
    pub fn rng(&self) -> StdRng {
        match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }

    /// Lazily composes the strategies of `schedule` against `base`.
    pub fn variants<'a>(
        &'a self,
        base: &'a Request,
        schedule: &'a Schedule,
        rng: &'a mut dyn RngCore,
    ) -> Variants<'a> {
        let stage = match self.config.level {
            CompositionLevel::Single | CompositionLevel::Both => Stage::Single { next: 0 },
            CompositionLevel::Pairwise => Stage::Pairwise { outer: 0, inner: 1 },
        };
        debug!(self.log, "composing variants";
            "level" => ?self.config.level,
            "strategies" => schedule.len(),
            "pairs" => schedule.pairs(),
            "limit" => ?self.config.limit);
        Variants {
            base,
            schedule,
            rng,
            log: &self.log,
            level: self.config.level,
            stage,
            intermediates: None,
            pending: Vec::new().into_iter(),
            chain: Vec::new(),
            remaining: self.config.limit,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    Single { next: usize },
    Pairwise { outer: usize, inner: usize },
    Done,
}

/// Iterator over composed [`Variant`]s; see [`CompositionEngine::variants`].
pub struct Variants<'a> {
    base: &'a Request,
    schedule: &'a Schedule,
    rng: &'a mut dyn RngCore,
    log: &'a Logger,
    level: CompositionLevel,
    stage: Stage,
    /// `s_outer(base)`, computed once per outer strategy of the pairwise stage.
    intermediates: Option<Vec<Request>>,
    pending: std::vec::IntoIter<Request>,
    chain: Vec<String>,
    remaining: Option<usize>,
}

impl Variants<'_> {
    fn strategy(&self, index: usize) -> Option<&'_ SharedStrategy> {
        self.schedule.get(index).map(|entry| &entry.strategy)
    }

    /// Runs the next unit of work, refilling `pending`. Returns `false` once exhausted.
    fn advance(&mut self) -> bool {
        match self.stage {
            Stage::Done => false,
            Stage::Single { next } => {
                let Some(strategy) = self.strategy(next).cloned() else {
                    self.stage = match self.level {
                        CompositionLevel::Both => Stage::Pairwise { outer: 0, inner: 1 },
                        _ => Stage::Done,
                    };
                    return true;
                };
                self.stage = Stage::Single { next: next + 1 };
                match strategy.mutate(self.base, &mut *self.rng) {
                    Ok(variants) => self.load(variants, &[&strategy]),
                    Err(err) => self.skip_strategy(&strategy, &err),
                }
                true
            }
            Stage::Pairwise { outer, inner } => {
                if outer + 1 >= self.schedule.len() {
                    self.stage = Stage::Done;
                    return false;
                }
                if inner >= self.schedule.len() {
                    self.next_outer(outer);
                    return true;
                }
                let (Some(first), Some(second)) =
                    (self.strategy(outer).cloned(), self.strategy(inner).cloned())
                else {
                    self.stage = Stage::Done;
                    return false;
                };

                if self.intermediates.is_none() {
                    match first.mutate(self.base, &mut *self.rng) {
                        Ok(intermediates) => self.intermediates = Some(intermediates),
                        Err(err) => {
                            self.skip_strategy(&first, &err);
                            self.next_outer(outer);
                            return true;
                        }
                    }
                }
                let intermediates = self.intermediates.as_deref().unwrap_or_default();
                if intermediates.is_empty() {
                    // Every pair led by an inapplicable strategy is empty.
                    self.next_outer(outer);
                    return true;
                }

                let mut composed = Vec::new();
                let mut failure = None;
                for intermediate in intermediates {
                    match second.mutate(intermediate, &mut *self.rng) {
                        Ok(variants) => composed.extend(variants),
                        Err(err) => {
                            failure = Some(err);
                            break;
                        }
                    }
                }
                self.stage = Stage::Pairwise {
                    outer,
                    inner: inner + 1,
                };
                match failure {
                    None => self.load(composed, &[&first, &second]),
                    Some(err) => {
                        warn!(self.log, "pair failed, skipping it";
                            "pair" => format!("{}+{}", first.name(), second.name()),
                            "error" => %err);
                    }
                }
                true
            }
        }
    }

    fn next_outer(&mut self, outer: usize) {
        self.intermediates = None;
        self.stage = Stage::Pairwise {
            outer: outer + 1,
            inner: outer + 2,
        };
    }

    fn load(&mut self, variants: Vec<Request>, chain: &[&SharedStrategy]) {
        self.chain = chain.iter().map(|s| s.name().to_owned()).collect();
        self.pending = variants.into_iter();
    }

    fn skip_strategy(&self, strategy: &SharedStrategy, err: &StrategyError) {
        warn!(self.log, "strategy failed, skipping it";
            "strategy" => strategy.name(),
            "stage" => ?self.stage,
            "error" => %err);
    }
}

impl Iterator for Variants<'_> {
    type Item = Variant;

    fn next(&mut self) -> Option<Variant> {
        loop {
            if self.remaining == Some(0) {
                self.stage = Stage::Done;
                self.pending = Vec::new().into_iter();
                return None;
            }
            if let Some(request) = self.pending.next() {
                if let Some(remaining) = self.remaining.as_mut() {
                    *remaining -= 1;
                }
                return Some(Variant {
                    request,
                    chain: self.chain.clone(),
                });
            }
            if !self.advance() {
                return None;
            }
        }
    }
}

impl FusedIterator for Variants<'_> {}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::strategy::from_fn;

    fn header(name: &'static str, copies: usize) -> SharedStrategy {
        from_fn(name, move |request: &Request, _rng: &mut dyn RngCore| {
            Ok((0..copies)
                .map(|i| request.clone().with_header(name, i.to_string()))
                .collect())
        })
    }

    fn failing(name: &'static str) -> SharedStrategy {
        from_fn(name, |_request: &Request, _rng: &mut dyn RngCore| {
            Err(StrategyError::Malformed("boom".into()))
        })
    }

    fn collect(level: CompositionLevel, schedule: &Schedule) -> Vec<Variant> {
        let engine = CompositionEngine::new(EngineConfig {
            level,
            limit: None,
            seed: Some(1),
        });
        let base = Request::get("http://x/get");
        let mut rng = engine.rng();
        engine.variants(&base, schedule, &mut rng).collect()
    }

    fn chains(variants: &[Variant]) -> Vec<String> {
        variants.iter().map(|v| v.chain.join("+")).collect()
    }

    #[test]
    fn single_then_pairwise_in_schedule_order() {
        let schedule = Schedule::from_strategies([header("a", 1), header("b", 1), header("c", 1)]);
        let variants = collect(CompositionLevel::Both, &schedule);
        assert_eq!(chains(&variants), ["a", "b", "c", "a+b", "a+c", "b+c"]);

        let pair = &variants[3].request;
        assert_eq!(pair.headers().get("a"), Some("0"));
        assert_eq!(pair.headers().get("b"), Some("0"));
    }

    #[test]
    fn pairwise_output_is_the_product_of_both_fan_outs() {
        let schedule = Schedule::from_strategies([header("a", 2), header("b", 3)]);
        assert_eq!(collect(CompositionLevel::Pairwise, &schedule).len(), 6);
        assert_eq!(collect(CompositionLevel::Single, &schedule).len(), 5);
    }

    #[test]
    fn inapplicable_first_strategy_empties_its_pairs() {
        let schedule = Schedule::from_strategies([header("a", 0), header("b", 1), header("c", 1)]);
        let variants = collect(CompositionLevel::Pairwise, &schedule);
        assert_eq!(chains(&variants), ["b+c"]);
    }

    #[test]
    fn failures_are_isolated() {
        let schedule = Schedule::from_strategies([header("a", 1), failing("x"), header("b", 1)]);
        let variants = collect(CompositionLevel::Both, &schedule);
        assert_eq!(chains(&variants), ["a", "b", "a+b"]);
    }

    #[test]
    fn nothing_runs_before_it_is_pulled() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = |name: &'static str| {
            let calls = Arc::clone(&calls);
            from_fn(name, move |request: &Request, _rng: &mut dyn RngCore| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(vec![request.clone(), request.clone()])
            })
        };
        let schedule = Schedule::from_strategies([counted("a"), counted("b"), counted("c")]);
        let engine = CompositionEngine::default();
        let base = Request::get("http://x/");
        let mut rng = engine.rng();

        let mut variants = engine.variants(&base, &schedule, &mut rng);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        variants.next();
        variants.next();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        variants.next();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        drop(variants);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn intermediates_are_computed_once_per_outer_strategy() {
        let calls = Arc::new(AtomicUsize::new(0));
        let first = {
            let calls = Arc::clone(&calls);
            from_fn("first", move |request: &Request, _rng: &mut dyn RngCore| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(vec![request.clone()])
            })
        };
        let schedule = Schedule::from_strategies([first, header("b", 1), header("c", 1), header("d", 1)]);
        let variants = collect(CompositionLevel::Pairwise, &schedule);
        assert_eq!(variants.len(), 6);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn limit_caps_the_stream() {
        let schedule = Schedule::from_strategies([header("a", 3), header("b", 3)]);
        let engine = CompositionEngine::new(EngineConfig {
            limit: Some(4),
            ..EngineConfig::default()
        });
        let base = Request::get("http://x/");
        let mut rng = engine.rng();
        let mut variants = engine.variants(&base, &schedule, &mut rng);
        assert_eq!(variants.by_ref().count(), 4);
        assert!(variants.next().is_none());
    }

    #[test]
    fn short_schedules() {
        assert!(collect(CompositionLevel::Both, &Schedule::default()).is_empty());
        let one = Schedule::from_strategies([header("a", 1)]);
        assert_eq!(chains(&collect(CompositionLevel::Both, &one)), ["a"]);
        assert!(collect(CompositionLevel::Pairwise, &one).is_empty());
    }

    #[test]
    fn base_request_is_untouched() {
        let schedule = Schedule::from_strategies(crate::strategies::builtin());
        let engine = CompositionEngine::new(EngineConfig {
            level: CompositionLevel::Both,
            limit: Some(2_000),
            seed: Some(3),
        });
        let base = Request::get("http://x/get?cmd=cat%20/etc/passwd").with_header("Accept", "*/*");
        let snapshot = base.clone();
        let mut rng = engine.rng();
        let produced = engine.variants(&base, &schedule, &mut rng).count();
        assert!(produced > 0);
        assert_eq!(base, snapshot);
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: EngineConfig = toml::from_str("level = \"single\"\nseed = 7\n").unwrap();
        assert_eq!(config.level, CompositionLevel::Single);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.limit, None);
    }
}
