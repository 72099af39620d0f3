use crate::connections_db::ConnectionsDb;
use crate::engine::guesser::MetricGuesser;
use crate::engine::metric::{Dominance, JourneyComparator, Metric};
use crate::engine::pareto_front::ParetoFront;
use crate::journey::{Journey, Link};
use crate::model::{Connection, InternalId, StopId, TripId};
use crate::request::ScanParams;
use crate::time::Timestamp;
use crate::transfers::TransferGenerator;
use std::collections::HashMap;
use tracing::{debug, trace};

/// Result of a profiled scan.
#[derive(Debug)]
pub struct ScanOutcome<M: Metric> {
    /// Origin-rooted journeys, none dominating another under the scan's
    /// profile comparator. Empty when nothing is reachable.
    pub journeys: Vec<Journey<M>>,
    /// `true` when the deadline expired and the set is only partial.
    pub truncated: bool,
}

/// Profiled connection scan : the backward-in-time solver producing every
/// Pareto-optimal journey of a time window.
///
/// Connections are consumed in non-increasing departure-time order from the
/// window end. For every stop the scan maintains a front of
/// destination-rooted partial journeys keyed by their departure time at that
/// stop ; for every trip, a front of the best known continuations from the
/// trip to the destination.
pub struct ProfiledConnectionScan<'a, M, Profile, Pareto>
where
    M: Metric,
    Profile: JourneyComparator<M>,
    Pareto: JourneyComparator<M>,
{
    db: &'a ConnectionsDb,
    origin: StopId,
    destination: StopId,
    window_start: Timestamp,
    window_end: Timestamp,
    profile_comparator: Profile,
    pareto_comparator: Pareto,
    transfers: &'a dyn TransferGenerator,
    params: ScanParams,
    guesser: Option<Box<dyn MetricGuesser<M> + 'a>>,
    connection_filter: Option<Box<dyn Fn(&Connection) -> bool + 'a>>,
    /// Checked once per cursor advance ; `true` means the deadline expired.
    deadline: Option<Box<dyn Fn() -> bool + 'a>>,
    /// Stops the scan as soon as the origin front holds an entry. The
    /// latest-departure reduction uses this : scanning backward, no later
    /// origin departure can appear after the first one.
    stop_at_first_origin_entry: bool,
    stop_fronts: HashMap<StopId, ParetoFront<M, Profile>>,
    trip_fronts: HashMap<TripId, ParetoFront<M, Pareto>>,
}

impl<'a, M, Profile, Pareto> ProfiledConnectionScan<'a, M, Profile, Pareto>
where
    M: Metric,
    Profile: JourneyComparator<M>,
    Pareto: JourneyComparator<M>,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: &'a ConnectionsDb,
        origin: StopId,
        destination: StopId,
        window_start: Timestamp,
        window_end: Timestamp,
        profile_comparator: Profile,
        pareto_comparator: Pareto,
        transfers: &'a dyn TransferGenerator,
        params: ScanParams,
    ) -> Self {
        Self {
            db,
            origin,
            destination,
            window_start,
            window_end,
            profile_comparator,
            pareto_comparator,
            transfers,
            params,
            guesser: None,
            connection_filter: None,
            deadline: None,
            stop_at_first_origin_entry: false,
            stop_fronts: HashMap::new(),
            trip_fronts: HashMap::new(),
        }
    }

    pub fn with_guesser(mut self, guesser: Box<dyn MetricGuesser<M> + 'a>) -> Self {
        self.guesser = Some(guesser);
        self
    }

    pub fn with_connection_filter(
        mut self,
        filter: Box<dyn Fn(&Connection) -> bool + 'a>,
    ) -> Self {
        self.connection_filter = Some(filter);
        self
    }

    pub fn with_deadline(mut self, expired: Box<dyn Fn() -> bool + 'a>) -> Self {
        self.deadline = Some(expired);
        self
    }

    pub(crate) fn stopping_at_first_origin_entry(mut self) -> Self {
        self.stop_at_first_origin_entry = true;
        self
    }

    /// Runs the scan to completion and emits the origin front.
    pub fn compute(mut self) -> ScanOutcome<M> {
        debug!(
            origin = %self.origin,
            destination = %self.destination,
            "profiled connection scan"
        );
        let seed = Journey::genesis(self.destination, self.window_end);
        self.stop_fronts
            .entry(self.destination)
            .or_insert_with(|| ParetoFront::new(self.profile_comparator.clone()))
            .try_add(seed);

        let mut truncated = false;
        let mut cursor = self.db.departure_cursor();
        cursor.move_to(self.window_end);
        loop {
            if let Some(expired) = &self.deadline {
                if expired() {
                    truncated = true;
                    break;
                }
            }
            let Some(internal_id) = cursor.move_previous() else {
                break;
            };
            let Some(connection) = self.db.get_by_internal_id(internal_id) else {
                continue;
            };
            if connection.departure_time < self.window_start {
                break;
            }
            self.handle_connection(&connection, internal_id, cursor.current_time());
            if self.stop_at_first_origin_entry
                && self.stop_fronts.get(&self.origin).is_some_and(|front| !front.is_empty())
            {
                break;
            }
        }

        let journeys = match self.stop_fronts.remove(&self.origin) {
            Some(front) => front
                .iter()
                // the genesis seed itself is not a journey (origin == destination)
                .filter(|journey| !journey.is_genesis())
                .filter(|journey| journey.time() >= self.window_start)
                .flat_map(|journey| journey.reverse())
                .collect(),
            None => Vec::new(),
        };
        debug!(nb_of_journeys = journeys.len(), truncated, "scan done");
        ScanOutcome { journeys, truncated }
    }

    fn handle_connection(
        &mut self,
        connection: &Connection,
        internal_id: InternalId,
        clock: Timestamp,
    ) {
        if connection.mode.is_cancelled() {
            return;
        }
        if let Some(filter) = &self.connection_filter {
            if !filter(connection) {
                return;
            }
        }
        let connection_id = self.db.connection_id(internal_id);
        let trip = connection.trip;
        let arrival_time = connection.arrival_time();

        // every candidate starts by riding this connection from its
        // departure stop ; they differ in what happens at the arrival stop
        let mut candidates: ParetoFront<M, Profile> =
            ParetoFront::new(self.profile_comparator.clone());

        // stay aboard and follow a known continuation of the trip
        if let Some(continuations) = self.trip_fronts.get(&trip) {
            for continuation in continuations.iter() {
                if continuation.time() < arrival_time {
                    continue;
                }
                let candidate = continuation.chain(
                    Link::Connection(connection_id),
                    connection.departure_time,
                    connection.departure_stop,
                    Some(trip),
                );
                if candidate.metric().is_valid(&self.params) {
                    candidates.try_add(candidate);
                }
            }
        }

        if connection.mode.can_alight() {
            // alight at the destination itself
            if connection.arrival_stop == self.destination && arrival_time <= self.window_end {
                let candidate: Journey<M> = Journey::genesis(self.destination, arrival_time).chain(
                    Link::Connection(connection_id),
                    connection.departure_time,
                    connection.departure_stop,
                    Some(trip),
                );
                if candidate.metric().is_valid(&self.params) {
                    candidates.try_add(candidate);
                }
            }
            // alight and walk straight to the destination
            if connection.arrival_stop != self.destination {
                if let Some(walk) = self
                    .transfers
                    .time_between(&connection.arrival_stop, &self.destination)
                {
                    let walked_arrival = arrival_time + walk.duration;
                    if walked_arrival <= self.window_end {
                        let candidate: Journey<M> = Journey::genesis(self.destination, walked_arrival)
                            .chain(
                                Link::Walk {
                                    duration: walk.duration.total_seconds() as u32,
                                    distance: walk.distance_meters,
                                },
                                arrival_time,
                                connection.arrival_stop,
                                None,
                            )
                            .chain(
                                Link::Connection(connection_id),
                                connection.departure_time,
                                connection.departure_stop,
                                Some(trip),
                            );
                        if candidate.metric().is_valid(&self.params) {
                            candidates.try_add(candidate);
                        }
                    }
                }
            }
            // alight and reach a stop that already has onward journeys
            let targets: Vec<StopId> = self.stop_fronts.keys().copied().collect();
            for (stop, walk) in self
                .transfers
                .times_between(&connection.arrival_stop, &targets)
            {
                let Some(onward_front) = self.stop_fronts.get(&stop) else {
                    continue;
                };
                for onward in onward_front.iter() {
                    let Some(walk_departure) = onward.time().checked_sub(walk.duration) else {
                        continue;
                    };
                    if walk_departure < arrival_time {
                        continue;
                    }
                    let candidate = onward
                        .chain(
                            Link::Walk {
                                duration: walk.duration.total_seconds() as u32,
                                distance: walk.distance_meters,
                            },
                            walk_departure,
                            connection.arrival_stop,
                            None,
                        )
                        .chain(
                            Link::Connection(connection_id),
                            connection.departure_time,
                            connection.departure_stop,
                            Some(trip),
                        );
                    if candidate.metric().is_valid(&self.params) {
                        candidates.try_add(candidate);
                    }
                }
            }
        }

        if candidates.is_empty() {
            return;
        }
        trace!(
            global_id = %connection.global_id,
            nb_of_candidates = candidates.len(),
            "connection usable"
        );

        // all surviving candidates ride this connection, so each is a valid
        // continuation for anyone already aboard the trip upstream
        let trip_front = self
            .trip_fronts
            .entry(trip)
            .or_insert_with(|| ParetoFront::new(self.pareto_comparator.clone()));
        for candidate in candidates.iter() {
            trip_front.try_add(candidate.clone());
        }

        // boarding at the departure stop publishes the candidates to its front
        if !connection.mode.can_board() {
            return;
        }
        let mut mutated = false;
        {
            let departure_front = self
                .stop_fronts
                .entry(connection.departure_stop)
                .or_insert_with(|| ParetoFront::new(self.profile_comparator.clone()));
            for candidate in candidates.iter() {
                mutated |= departure_front.try_add(candidate.clone()).mutated();
            }
        }
        if mutated {
            self.clean_front_with_guesser(connection.departure_stop, clock);
        }
    }

    /// Asks the guesser whether the front deserves a cleaning pass, then
    /// drops every entry whose best possible completion is already dominated
    /// by a known journey to the origin.
    fn clean_front_with_guesser(&mut self, front_stop: StopId, clock: Timestamp) {
        let Some(guesser) = self.guesser.as_mut() else {
            return;
        };
        let known_to_origin: Vec<Journey<M>> = match self.stop_fronts.get(&self.origin) {
            Some(front) if !front.is_empty() => front.iter().cloned().collect(),
            _ => return,
        };
        if !guesser.should_be_checked(front_stop, clock) {
            return;
        }
        let comparator = self.profile_comparator.clone();
        let origin = self.origin;
        let guesser = &*guesser;
        if let Some(front) = self.stop_fronts.get_mut(&front_stop) {
            let before = front.len();
            front.retain(|entry| {
                let optimistic = guesser.least_theoretical_continuation(entry, origin, clock);
                !known_to_origin.iter().any(|known| {
                    comparator.compare(known, &optimistic) == Dominance::FirstDominates
                })
            });
            if front.len() < before {
                trace!(
                    stop = %front_stop,
                    removed = before - front.len(),
                    "guesser pruned a stop front"
                );
            }
        }
    }
}
