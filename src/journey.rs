use crate::engine::metric::Metric;
use crate::model::{ConnectionId, StopId, TripId};
use crate::time::Timestamp;
use std::sync::Arc;

/// What connects a journey segment to the previous one.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Link {
    /// A ride on a stored connection.
    Connection(ConnectionId),
    /// The root of the chain. Time is the anchor of the search
    /// (window end for a backward build, window start for a forward one).
    Genesis,
    /// A non-vehicle movement (foot transfer, first/last mile).
    Walk { duration: u32, distance: u32 },
    /// A fan-out over two equivalent tails, reachable through
    /// `previous` and `alternative`.
    Joined,
}

#[derive(Debug)]
struct Segment<M: Metric> {
    location: StopId,
    time: Timestamp,
    trip: Option<TripId>,
    link: Link,
    metric: M,
    /// Time of the chain root, copied down so that comparing departure and
    /// arrival of a journey never walks the chain.
    genesis_time: Timestamp,
    previous: Option<Journey<M>>,
    alternative: Option<Journey<M>>,
}

/// A persistent, singly-linked chain of journey segments.
///
/// A journey is immutable once built ; extending it allocates a new head
/// segment and shares the tail. The handle is a cheap reference-counted
/// pointer, cloning it does not copy the chain.
///
/// A backward-built journey (the profiled scan's shape) has its genesis at
/// the destination and its head at the boarding of the first vehicle : the
/// head time is the journey departure, the genesis time its arrival. A
/// forward-built journey is the mirror image.
#[derive(Debug)]
pub struct Journey<M: Metric> {
    segment: Arc<Segment<M>>,
}

impl<M: Metric> Clone for Journey<M> {
    fn clone(&self) -> Self {
        Journey {
            segment: Arc::clone(&self.segment),
        }
    }
}

impl<M: Metric> Journey<M> {
    pub fn genesis(location: StopId, time: Timestamp) -> Self {
        Journey {
            segment: Arc::new(Segment {
                location,
                time,
                trip: None,
                link: Link::Genesis,
                metric: M::zero(),
                genesis_time: time,
                previous: None,
                alternative: None,
            }),
        }
    }

    /// Extends the chain with a new head segment.
    pub fn chain(&self, link: Link, time: Timestamp, location: StopId, trip: Option<TripId>) -> Self {
        debug_assert!(!matches!(link, Link::Genesis | Link::Joined));
        let metric = M::add(self, &link, time, trip, false);
        Journey {
            segment: Arc::new(Segment {
                location,
                time,
                trip,
                link,
                metric,
                genesis_time: self.segment.genesis_time,
                previous: Some(self.clone()),
                alternative: None,
            }),
        }
    }

    /// A synthetic continuation used by metric guessers : jumps to `location`
    /// at `time` without affecting the metric.
    pub fn chain_teleport(&self, time: Timestamp, location: StopId) -> Self {
        let link = Link::Walk {
            duration: 0,
            distance: 0,
        };
        let metric = M::add(self, &link, time, None, true);
        Journey {
            segment: Arc::new(Segment {
                location,
                time,
                trip: None,
                link,
                metric,
                genesis_time: self.segment.genesis_time,
                previous: Some(self.clone()),
                alternative: None,
            }),
        }
    }

    /// Fans out two equivalent journeys under one head. Both must stand at
    /// the same location and time.
    pub fn join(&self, other: &Journey<M>) -> Self {
        debug_assert!(self.location() == other.location());
        debug_assert!(self.time() == other.time());
        Journey {
            segment: Arc::new(Segment {
                location: self.location(),
                time: self.time(),
                trip: None,
                link: Link::Joined,
                metric: *self.metric(),
                genesis_time: self.segment.genesis_time,
                previous: Some(self.clone()),
                alternative: Some(other.clone()),
            }),
        }
    }

    pub fn location(&self) -> StopId {
        self.segment.location
    }

    /// Time at the head of the chain.
    pub fn time(&self) -> Timestamp {
        self.segment.time
    }

    /// Time at the root of the chain.
    pub fn genesis_time(&self) -> Timestamp {
        self.segment.genesis_time
    }

    pub fn trip(&self) -> Option<TripId> {
        self.segment.trip
    }

    pub fn link(&self) -> &Link {
        &self.segment.link
    }

    pub fn metric(&self) -> &M {
        &self.segment.metric
    }

    pub fn previous(&self) -> Option<&Journey<M>> {
        self.segment.previous.as_ref()
    }

    pub fn alternative(&self) -> Option<&Journey<M>> {
        self.segment.alternative.as_ref()
    }

    pub fn is_genesis(&self) -> bool {
        matches!(self.segment.link, Link::Genesis)
    }

    /// Structural equality of the whole chain, used to deduplicate
    /// equivalent journeys before joining them.
    pub fn same_path(&self, other: &Journey<M>) -> bool {
        if Arc::ptr_eq(&self.segment, &other.segment) {
            return true;
        }
        if self.segment.location != other.segment.location
            || self.segment.time != other.segment.time
            || self.segment.trip != other.segment.trip
            || self.segment.link != other.segment.link
        {
            return false;
        }
        let previous_match = match (self.previous(), other.previous()) {
            (None, None) => true,
            (Some(a), Some(b)) => a.same_path(b),
            _ => false,
        };
        if !previous_match {
            return false;
        }
        match (self.alternative(), other.alternative()) {
            (None, None) => true,
            (Some(a), Some(b)) => a.same_path(b),
            _ => false,
        }
    }

    /// Rebuilds the itinerary with the opposite chain direction.
    ///
    /// Joined segments fan out : each branch yields its own single-chain
    /// journey, so the result is a list.
    pub fn reverse(&self) -> Vec<Journey<M>> {
        let mut reversed = Vec::new();
        let root = Journey::genesis(self.location(), self.time());
        self.reverse_onto(root, &mut reversed);
        reversed
    }

    fn reverse_onto(&self, partial: Journey<M>, reversed: &mut Vec<Journey<M>>) {
        match &self.segment.link {
            Link::Genesis => reversed.push(partial),
            Link::Joined => {
                let previous = self
                    .previous()
                    .expect("joined segment without a previous tail");
                let alternative = self
                    .alternative()
                    .expect("joined segment without an alternative tail");
                previous.reverse_onto(partial.clone(), reversed);
                alternative.reverse_onto(partial, reversed);
            }
            link => {
                let previous = self.previous().expect("chained segment without a previous");
                let next = partial.chain(
                    link.clone(),
                    previous.time(),
                    previous.location(),
                    self.trip(),
                );
                previous.reverse_onto(next, reversed);
            }
        }
    }

    /// Flattens a single-chain journey, genesis first. Joined segments
    /// follow their main (`previous`) branch.
    pub fn to_vec(&self) -> Vec<Journey<M>> {
        let mut segments = Vec::new();
        let mut current = self.clone();
        loop {
            segments.push(current.clone());
            match current.previous() {
                Some(previous) => current = previous.clone(),
                None => break,
            }
        }
        segments.reverse();
        segments
    }

    /// Replays the chain under another metric, preserving structure.
    pub fn measure_with<N: Metric>(&self) -> Journey<N> {
        match &self.segment.link {
            Link::Genesis => Journey::<N>::genesis(self.location(), self.time()),
            Link::Joined => {
                let previous = self
                    .previous()
                    .expect("joined segment without a previous tail")
                    .measure_with::<N>();
                let alternative = self
                    .alternative()
                    .expect("joined segment without an alternative tail")
                    .measure_with::<N>();
                previous.join(&alternative)
            }
            link => {
                let previous = self
                    .previous()
                    .expect("chained segment without a previous")
                    .measure_with::<N>();
                previous.chain(link.clone(), self.time(), self.location(), self.trip())
            }
        }
    }

    /// Departure time of a backward-built journey (head side).
    pub fn backward_departure_time(&self) -> Timestamp {
        self.time()
    }

    /// Arrival bound of a backward-built journey (genesis side).
    pub fn backward_arrival_time(&self) -> Timestamp {
        self.genesis_time()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::metric::TransferMetric;
    use crate::model::{ConnectionId, DatabaseId, InternalId};

    fn stop(local: u32) -> StopId {
        StopId::new(DatabaseId::new(0), 0, local)
    }

    fn connection_link(id: u32) -> Link {
        Link::Connection(ConnectionId::new(DatabaseId::new(0), InternalId::new(id)))
    }

    fn seconds(seconds: u64) -> Timestamp {
        Timestamp::from_unix_seconds(seconds)
    }

    /// destination-rooted : genesis at stop 2, ride back to stop 0
    fn backward_two_leg_journey() -> Journey<TransferMetric> {
        Journey::genesis(stop(2), seconds(1000))
            .chain(connection_link(1), seconds(700), stop(1), None)
            .chain(
                Link::Walk {
                    duration: 60,
                    distance: 50,
                },
                seconds(640),
                stop(1),
                None,
            )
            .chain(connection_link(0), seconds(500), stop(0), None)
    }

    #[test]
    fn to_vec_runs_genesis_first() {
        let journey = backward_two_leg_journey();
        let segments = journey.to_vec();
        assert_eq!(segments.len(), 4);
        assert!(segments[0].is_genesis());
        assert_eq!(segments[0].location(), stop(2));
        assert_eq!(segments[3].location(), stop(0));
        for segment in &segments {
            assert_eq!(segment.genesis_time(), seconds(1000));
        }
    }

    #[test]
    fn reverse_flips_the_chain_and_keeps_the_metric() {
        let journey = backward_two_leg_journey();
        let reversed = journey.reverse();
        assert_eq!(reversed.len(), 1);
        let forward = &reversed[0];
        assert_eq!(forward.genesis_time(), seconds(500));
        assert_eq!(forward.location(), stop(2));
        assert_eq!(forward.metric(), journey.metric());
        let segments = forward.to_vec();
        assert_eq!(segments[0].location(), stop(0));
        assert_eq!(segments.last().unwrap().location(), stop(2));
    }

    #[test]
    fn reverse_fans_out_joined_tails() {
        let left = Journey::<TransferMetric>::genesis(stop(2), seconds(1000)).chain(
            connection_link(0),
            seconds(500),
            stop(0),
            None,
        );
        let right = Journey::<TransferMetric>::genesis(stop(2), seconds(1000)).chain(
            connection_link(1),
            seconds(500),
            stop(0),
            None,
        );
        let joined = left.join(&right);
        let reversed = joined.reverse();
        assert_eq!(reversed.len(), 2);
        assert!(!reversed[0].same_path(&reversed[1]));
    }

    #[test]
    fn measure_with_replays_the_structure() {
        let journey = backward_two_leg_journey();
        let remeasured: Journey<TransferMetric> = journey.measure_with();
        assert!(remeasured.same_path(&journey));
        assert_eq!(remeasured.metric(), journey.metric());
    }

    #[test]
    fn same_path_distinguishes_links() {
        let a = Journey::<TransferMetric>::genesis(stop(1), seconds(1000)).chain(
            connection_link(0),
            seconds(500),
            stop(0),
            None,
        );
        let b = Journey::<TransferMetric>::genesis(stop(1), seconds(1000)).chain(
            connection_link(1),
            seconds(500),
            stop(0),
            None,
        );
        assert!(a.same_path(&a.clone()));
        assert!(!a.same_path(&b));
    }
}
