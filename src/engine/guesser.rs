use crate::engine::metric::Metric;
use crate::journey::Journey;
use crate::model::StopId;
use crate::time::Timestamp;
use std::collections::HashMap;

/// An optimistic oracle used to prune stop fronts during a profiled scan.
///
/// A guesser that is not a true lower bound makes the scan drop optimal
/// journeys ; that is a correctness bug of the guesser, not a runtime error
/// the scan can detect.
pub trait MetricGuesser<M: Metric> {
    /// An optimistic completion of `journey` : the best any continuation
    /// from the current scan position could possibly achieve.
    fn least_theoretical_continuation(
        &self,
        journey: &Journey<M>,
        origin: StopId,
        clock: Timestamp,
    ) -> Journey<M>;

    /// Whether the front is worth re-checking. Returns `true` at most once
    /// per clock tick per front ; the tick is the enumerator's current time.
    fn should_be_checked(&mut self, front_stop: StopId, clock: Timestamp) -> bool;
}

/// Completes a journey by teleporting it to the origin at the current clock
/// time, leaving the metric untouched.
///
/// Sound because the backward scan clock only decreases : any real
/// continuation departs the origin no later than the clock and can only add
/// cost, so the teleported journey dominates or equals every real
/// completion.
#[derive(Debug, Default)]
pub struct TeleportGuesser {
    last_checked: HashMap<StopId, Timestamp>,
}

impl TeleportGuesser {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<M: Metric> MetricGuesser<M> for TeleportGuesser {
    fn least_theoretical_continuation(
        &self,
        journey: &Journey<M>,
        origin: StopId,
        clock: Timestamp,
    ) -> Journey<M> {
        journey.chain_teleport(clock, origin)
    }

    fn should_be_checked(&mut self, front_stop: StopId, clock: Timestamp) -> bool {
        match self.last_checked.insert(front_stop, clock) {
            Some(last) if last == clock => false,
            _ => true,
        }
    }
}
