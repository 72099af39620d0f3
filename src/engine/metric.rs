use crate::journey::{Journey, Link};
use crate::model::TripId;
use crate::request::ScanParams;
use crate::time::Timestamp;
use std::fmt::Debug;

/// Outcome of comparing two journeys under a multi-criterion comparator.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Dominance {
    FirstDominates,
    SecondDominates,
    Equivalent,
    /// The Pareto case : neither is better in every criterion.
    Incomparable,
}

/// A value tracked along a journey, updated at every chained segment.
pub trait Metric: Copy + Clone + Debug + PartialEq + 'static {
    fn zero() -> Self;

    /// The metric obtained by extending `previous` with a new head segment.
    ///
    /// `teleport` is set when the segment was synthesized by a metric
    /// guesser : implementations must not treat it as a new vehicle
    /// boarding (the canonical metric leaves the value untouched).
    fn add(
        previous: &Journey<Self>,
        link: &Link,
        time: Timestamp,
        trip: Option<TripId>,
        teleport: bool,
    ) -> Self;

    /// `false` eliminates the journey outright (too many transfers, ...).
    /// The more journeys eliminated here, the less work for the scan.
    fn is_valid(&self, params: &ScanParams) -> bool {
        let _ = params;
        true
    }
}

/// The canonical metric : vehicles boarded, seconds spent, meters walked.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub struct TransferMetric {
    pub vehicles: u8,
    pub travel_time: u32,
    pub walking_distance: u32,
}

impl Metric for TransferMetric {
    fn zero() -> Self {
        Self::default()
    }

    fn add(
        previous: &Journey<Self>,
        link: &Link,
        time: Timestamp,
        trip: Option<TripId>,
        teleport: bool,
    ) -> Self {
        let mut metric = *previous.metric();
        if teleport {
            return metric;
        }
        metric.travel_time = metric
            .travel_time
            .saturating_add(previous.time().abs_diff(&time) as u32);
        match link {
            Link::Connection(_) => {
                if trip.is_none() || previous.trip() != trip {
                    metric.vehicles = metric.vehicles.saturating_add(1);
                }
            }
            Link::Walk { distance, .. } => {
                metric.walking_distance = metric.walking_distance.saturating_add(*distance);
            }
            Link::Genesis | Link::Joined => {}
        }
        metric
    }

    fn is_valid(&self, params: &ScanParams) -> bool {
        match params.max_transfers {
            Some(max_transfers) => self.vehicles <= max_transfers.saturating_add(1),
            None => true,
        }
    }
}

/// Compares two journeys built in the same direction.
pub trait JourneyComparator<M: Metric>: Clone {
    fn compare(&self, first: &Journey<M>, second: &Journey<M>) -> Dominance;
}

/// Strict Pareto domination on (vehicles, travel time).
#[derive(Debug, Clone, Copy, Default)]
pub struct ParetoComparator;

impl JourneyComparator<TransferMetric> for ParetoComparator {
    fn compare(&self, first: &Journey<TransferMetric>, second: &Journey<TransferMetric>) -> Dominance {
        let a = first.metric();
        let b = second.metric();
        let a_no_worse = a.vehicles <= b.vehicles && a.travel_time <= b.travel_time;
        let b_no_worse = b.vehicles <= a.vehicles && b.travel_time <= a.travel_time;
        match (a_no_worse, b_no_worse) {
            (true, true) => Dominance::Equivalent,
            (true, false) => Dominance::FirstDominates,
            (false, true) => Dominance::SecondDominates,
            (false, false) => Dominance::Incomparable,
        }
    }
}

/// Profile domination on (vehicles, departure time, arrival time), for
/// destination-rooted (backward-built) journeys : later departures and
/// earlier arrivals are better.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProfileComparator;

fn profile_better_in_one(a: &Journey<TransferMetric>, b: &Journey<TransferMetric>) -> bool {
    a.metric().vehicles < b.metric().vehicles
        || a.backward_departure_time() > b.backward_departure_time()
        || a.backward_arrival_time() < b.backward_arrival_time()
}

impl JourneyComparator<TransferMetric> for ProfileComparator {
    fn compare(&self, first: &Journey<TransferMetric>, second: &Journey<TransferMetric>) -> Dominance {
        match (
            profile_better_in_one(first, second),
            profile_better_in_one(second, first),
        ) {
            (true, true) => Dominance::Incomparable,
            (true, false) => Dominance::FirstDominates,
            (false, true) => Dominance::SecondDominates,
            (false, false) => Dominance::Equivalent,
        }
    }
}

/// Applies `first` and falls back on `second` when it reports equivalence.
/// Builds lexicographic orders such as "fewest transfers, then time".
#[derive(Debug, Clone, Copy, Default)]
pub struct ChainedComparator<A, B> {
    pub first: A,
    pub second: B,
}

impl<M, A, B> JourneyComparator<M> for ChainedComparator<A, B>
where
    M: Metric,
    A: JourneyComparator<M>,
    B: JourneyComparator<M>,
{
    fn compare(&self, first: &Journey<M>, second: &Journey<M>) -> Dominance {
        match self.first.compare(first, second) {
            Dominance::Equivalent => self.second.compare(first, second),
            dominance => dominance,
        }
    }
}

/// Single dimension : the earlier head time wins. The degenerate comparator
/// of the earliest-arrival scan (forward-built journeys).
#[derive(Debug, Clone, Copy, Default)]
pub struct ArrivalComparator;

impl<M: Metric> JourneyComparator<M> for ArrivalComparator {
    fn compare(&self, first: &Journey<M>, second: &Journey<M>) -> Dominance {
        match first.time().cmp(&second.time()) {
            std::cmp::Ordering::Less => Dominance::FirstDominates,
            std::cmp::Ordering::Equal => Dominance::Equivalent,
            std::cmp::Ordering::Greater => Dominance::SecondDominates,
        }
    }
}

/// Single dimension : the later head time wins. The degenerate comparator of
/// the latest-departure scan (backward-built journeys).
#[derive(Debug, Clone, Copy, Default)]
pub struct DepartureComparator;

impl<M: Metric> JourneyComparator<M> for DepartureComparator {
    fn compare(&self, first: &Journey<M>, second: &Journey<M>) -> Dominance {
        match first.time().cmp(&second.time()) {
            std::cmp::Ordering::Greater => Dominance::FirstDominates,
            std::cmp::Ordering::Equal => Dominance::Equivalent,
            std::cmp::Ordering::Less => Dominance::SecondDominates,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DatabaseId, StopId};

    fn stop() -> StopId {
        StopId::new(DatabaseId::new(0), 0, 0)
    }

    fn journey_with(
        vehicles: u8,
        departure: u64,
        arrival: u64,
    ) -> Journey<TransferMetric> {
        // backward build : genesis at arrival, walk head at departure, then
        // force the vehicles count through chained connection segments
        let mut journey = Journey::genesis(stop(), Timestamp::from_unix_seconds(arrival));
        for i in 0..vehicles {
            let time = departure + u64::from(vehicles - i) - 1;
            journey = journey.chain(
                Link::Connection(crate::model::ConnectionId::new(
                    DatabaseId::new(0),
                    crate::model::InternalId::new(u32::from(i)),
                )),
                Timestamp::from_unix_seconds(time),
                stop(),
                None,
            );
        }
        if vehicles == 0 {
            journey = journey.chain(
                Link::Walk {
                    duration: 0,
                    distance: 0,
                },
                Timestamp::from_unix_seconds(departure),
                stop(),
                None,
            );
        }
        journey
    }

    #[test]
    fn profile_comparator_prefers_later_departure_and_earlier_arrival() {
        let comparator = ProfileComparator;
        let a = journey_with(1, 100, 200);
        let b = journey_with(1, 90, 200);
        assert_eq!(comparator.compare(&a, &b), Dominance::FirstDominates);
        let c = journey_with(1, 100, 190);
        assert_eq!(comparator.compare(&c, &a), Dominance::FirstDominates);
    }

    #[test]
    fn profile_comparator_reports_pareto_tradeoffs() {
        let comparator = ProfileComparator;
        // a departs later, b uses fewer vehicles
        let a = journey_with(2, 110, 200);
        let b = journey_with(1, 100, 200);
        assert_eq!(comparator.compare(&a, &b), Dominance::Incomparable);
    }

    #[test]
    fn chained_comparator_breaks_ties() {
        let chained = ChainedComparator {
            first: ProfileComparator,
            second: DepartureComparator,
        };
        let a = journey_with(1, 100, 200);
        let b = journey_with(1, 100, 200);
        assert_eq!(chained.compare(&a, &b), Dominance::Equivalent);
    }

    #[test]
    fn transfer_metric_counts_boardings_per_trip_change() {
        let journey = journey_with(3, 100, 200);
        assert_eq!(journey.metric().vehicles, 3);
    }
}
