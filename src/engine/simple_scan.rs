use crate::connections_db::ConnectionsDb;
use crate::engine::metric::{ArrivalComparator, DepartureComparator, Metric};
use crate::engine::pareto_front::ParetoFront;
use crate::engine::profile_scan::ProfiledConnectionScan;
use crate::journey::{Journey, Link};
use crate::model::{Connection, StopId, TripId};
use crate::request::ScanParams;
use crate::time::Timestamp;
use crate::transfers::{TransferGenerator, Walk};
use std::collections::HashMap;
use tracing::debug;

/// Earliest-arrival reduction : the degenerate scan under a single-dimension
/// comparator, run forward from the window start.
///
/// Per stop the front collapses to the one journey arriving first ; per trip
/// the state is the journey with which the trip was first boarded. The scan
/// stops once every remaining connection departs after the destination's
/// settled arrival.
pub struct EarliestArrivalScan<'a, M: Metric> {
    db: &'a ConnectionsDb,
    origin: StopId,
    destination: StopId,
    window_start: Timestamp,
    window_end: Timestamp,
    transfers: &'a dyn TransferGenerator,
    params: ScanParams,
    connection_filter: Option<Box<dyn Fn(&Connection) -> bool + 'a>>,
    arrivals: HashMap<StopId, ParetoFront<M, ArrivalComparator>>,
    boarded_trips: HashMap<TripId, Journey<M>>,
}

impl<'a, M: Metric> EarliestArrivalScan<'a, M> {
    pub fn new(
        db: &'a ConnectionsDb,
        origin: StopId,
        destination: StopId,
        window_start: Timestamp,
        window_end: Timestamp,
        transfers: &'a dyn TransferGenerator,
        params: ScanParams,
    ) -> Self {
        Self {
            db,
            origin,
            destination,
            window_start,
            window_end,
            transfers,
            params,
            connection_filter: None,
            arrivals: HashMap::new(),
            boarded_trips: HashMap::new(),
        }
    }

    pub fn with_connection_filter(
        mut self,
        filter: Box<dyn Fn(&Connection) -> bool + 'a>,
    ) -> Self {
        self.connection_filter = Some(filter);
        self
    }

    /// The first-arriving journey departing the origin at or after the
    /// window start, built origin-forward. `None` when unreachable.
    pub fn compute(mut self) -> Option<Journey<M>> {
        debug!(origin = %self.origin, destination = %self.destination, "earliest arrival scan");
        let all_stops: Vec<StopId> = self.db.stops().copied().collect();

        let seed = Journey::genesis(self.origin, self.window_start);
        self.improve(self.origin, seed.clone());
        for (stop, walk) in self.transfers.times_between(&self.origin, &all_stops) {
            self.relax_walk(&seed, stop, walk);
        }

        let mut cursor = self.db.departure_cursor();
        cursor.move_to(self.window_start);
        while let Some(internal_id) = cursor.move_next() {
            let Some(connection) = self.db.get_by_internal_id(internal_id) else {
                continue;
            };
            if connection.departure_time > self.window_end {
                break;
            }
            if let Some(settled) = self.settled_destination_arrival() {
                // nothing departing later can arrive before the settled time
                if connection.departure_time > settled {
                    break;
                }
            }
            if connection.mode.is_cancelled() {
                continue;
            }
            if let Some(filter) = &self.connection_filter {
                if !filter(&connection) {
                    continue;
                }
            }

            let trip = connection.trip;
            let aboard = match self.boarded_trips.get(&trip) {
                Some(aboard) => Some(aboard.clone()),
                None if connection.mode.can_board() => self
                    .arrivals
                    .get(&connection.departure_stop)
                    .and_then(|front| front.iter().next())
                    .filter(|reached| reached.time() <= connection.departure_time)
                    .cloned(),
                None => None,
            };
            let Some(aboard) = aboard else {
                continue;
            };
            let ridden = aboard.chain(
                Link::Connection(self.db.connection_id(internal_id)),
                connection.arrival_time(),
                connection.arrival_stop,
                Some(trip),
            );
            // the journey stays aboard : later connections of the trip
            // extend this chain
            self.boarded_trips.insert(trip, ridden.clone());

            if !connection.mode.can_alight() {
                continue;
            }
            if !ridden.metric().is_valid(&self.params) {
                continue;
            }
            // the destination ends the journey : no vehicle-change time needed
            if connection.arrival_stop == self.destination {
                self.improve(self.destination, ridden.clone());
            }
            for (stop, walk) in self
                .transfers
                .times_between(&connection.arrival_stop, &all_stops)
            {
                self.relax_walk(&ridden, stop, walk);
            }
        }

        self.arrivals
            .remove(&self.destination)
            .and_then(|front| front.iter().next().cloned())
            .filter(|journey| !journey.is_genesis())
    }

    fn settled_destination_arrival(&self) -> Option<Timestamp> {
        self.arrivals
            .get(&self.destination)
            .and_then(|front| front.iter().next())
            .map(|journey| journey.time())
    }

    fn improve(&mut self, stop: StopId, journey: Journey<M>) {
        self.arrivals
            .entry(stop)
            .or_insert_with(|| ParetoFront::new(ArrivalComparator))
            .try_add(journey);
    }

    fn relax_walk(&mut self, from_journey: &Journey<M>, stop: StopId, walk: Walk) {
        let walked = from_journey.chain(
            Link::Walk {
                duration: walk.duration.total_seconds() as u32,
                distance: walk.distance_meters,
            },
            from_journey.time() + walk.duration,
            stop,
            None,
        );
        if walked.metric().is_valid(&self.params) {
            self.improve(stop, walked);
        }
    }
}

/// Latest-departure reduction : the profiled scan run with the
/// single-dimension departure comparator, stopped at the first origin entry.
/// Scanning backward, no later origin departure can appear afterwards.
pub struct LatestDepartureScan<'a, M: Metric> {
    inner: ProfiledConnectionScan<'a, M, DepartureComparator, DepartureComparator>,
}

impl<'a, M: Metric> LatestDepartureScan<'a, M> {
    pub fn new(
        db: &'a ConnectionsDb,
        origin: StopId,
        destination: StopId,
        window_start: Timestamp,
        window_end: Timestamp,
        transfers: &'a dyn TransferGenerator,
        params: ScanParams,
    ) -> Self {
        let inner = ProfiledConnectionScan::new(
            db,
            origin,
            destination,
            window_start,
            window_end,
            DepartureComparator,
            DepartureComparator,
            transfers,
            params,
        )
        .stopping_at_first_origin_entry();
        Self { inner }
    }

    pub fn with_connection_filter(
        mut self,
        filter: Box<dyn Fn(&Connection) -> bool + 'a>,
    ) -> Self {
        self.inner = self.inner.with_connection_filter(filter);
        self
    }

    /// The last journey still reaching the destination by the window end,
    /// built origin-forward. `None` when unreachable.
    pub fn compute(self) -> Option<Journey<M>> {
        self.inner.compute().journeys.into_iter().next()
    }
}
