//! Success-weighted strategy ordering.

use slog::{Discard, Logger, debug, o};

use crate::memory::OutcomeMemory;
use crate::profile::{Profile, Weighting};
use crate::request::Request;
use crate::strategy::SharedStrategy;
use crate::target::TargetKey;

/// A strategy together with the number of successes that placed it.
#[derive(Clone)]
pub struct ScheduledStrategy {
    pub strategy: SharedStrategy,
    pub successes: usize,
}

impl ScheduledStrategy {
    pub fn name(&self) -> &str {
        self.strategy.name()
    }
}

impl std::fmt::Debug for ScheduledStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledStrategy")
            .field("strategy", &self.name())
            .field("successes", &self.successes)
            .finish()
    }
}

/// The enabled strategies of a profile, most successful first.
#[derive(Clone, Debug, Default)]
pub struct Schedule {
    entries: Vec<ScheduledStrategy>,
}

impl Schedule {
    /// A schedule in exactly the given order, e.g. for callers that rank strategies
    /// themselves.
    pub fn from_strategies(strategies: impl IntoIterator<Item = SharedStrategy>) -> Self {
        Self {
            entries: strategies
                .into_iter()
                .map(|strategy| ScheduledStrategy {
                    strategy,
                    successes: 0,
                })
                .collect(),
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ScheduledStrategy> {
        self.entries.iter()
    }

    pub fn get(&self, index: usize) -> Option<&ScheduledStrategy> {
        self.entries.get(index)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(ScheduledStrategy::name).collect()
    }

    /// Number of ordered pairs `(i, j)` with `i < j`, i.e. pairwise chains to try.
    pub fn pairs(&self) -> usize {
        let n = self.entries.len();
        n * n.saturating_sub(1) / 2
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a Schedule {
    type Item = &'a ScheduledStrategy;
    type IntoIter = std::slice::Iter<'a, ScheduledStrategy>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Orders a profile's active strategies by historical success.
#[derive(Clone)]
pub struct Scheduler {
    log: Logger,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(Logger::root(Discard, o!()))
    }
}

impl Scheduler {
    pub fn new(log: Logger) -> Self {
        Self {
            log: log.new(o!("component" => "scheduler")),
        }
    }

    /// Orders the active strategies of `profile` by descending success count.
    ///
    /// Counts come from every target under [`Weighting::Global`] and from `target` only
    /// under [`Weighting::PerTarget`]; with no target, every count is zero. The sort is
    /// stable, so strategies with equal counts keep their declaration order, and no
    /// strategy is ever dropped.
    pub fn schedule(
        &self,
        profile: &Profile,
        memory: &OutcomeMemory,
        target: Option<&TargetKey>,
    ) -> Schedule {
        let counts = match (profile.weighting(), target) {
            (Weighting::Global, _) => memory.global_counts(),
            (Weighting::PerTarget, Some(target)) => memory.counts_for(target.as_str()),
            (Weighting::PerTarget, None) => Default::default(),
        };

        let mut entries: Vec<ScheduledStrategy> = profile
            .active_strategies()
            .map(|strategy| ScheduledStrategy {
                successes: counts.get(strategy.name()).copied().unwrap_or(0),
                strategy: strategy.clone(),
            })
            .collect();
        entries.sort_by(|a, b| b.successes.cmp(&a.successes));

        let schedule = Schedule { entries };
        debug!(self.log, "schedule computed";
            "profile" => profile.name(),
            "weighting" => ?profile.weighting(),
            "target" => target.map(TargetKey::as_str),
            "order" => ?schedule.names());
        schedule
    }

    /// [`Scheduler::schedule`] for the target of `base`. A base URL that yields no target
    /// key is scheduled without one.
    pub fn schedule_for(
        &self,
        profile: &Profile,
        memory: &OutcomeMemory,
        base: &Request,
    ) -> Schedule {
        let target = TargetKey::from_request(base).ok();
        self.schedule(profile, memory, target.as_ref())
    }
}
