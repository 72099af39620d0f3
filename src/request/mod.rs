// Copyright  (C) 2021, Kisio Digital and/or its affiliates. All rights reserved.
//
// LICENCE: This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <http://www.gnu.org/licenses/>.

use crate::connections_db::ConnectionsDb;
use crate::engine::guesser::TeleportGuesser;
use crate::engine::metric::{
    JourneyComparator, Metric, ParetoComparator, ProfileComparator, TransferMetric,
};
use crate::engine::profile_scan::{ProfiledConnectionScan, ScanOutcome};
use crate::engine::simple_scan::{EarliestArrivalScan, LatestDepartureScan};
use crate::journey::Journey;
use crate::model::{Connection, StopId};
use crate::time::Timestamp;
use crate::transfers::TransferGenerator;
use serde::Deserialize;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Tunable limits of a scan, deserializable from configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScanParams {
    /// Maximum number of vehicle changes (boardings minus one).
    pub max_transfers: Option<u8>,
}

/// A reusable bundle of everything a query needs besides stops and times :
/// the metric, its comparators, the transfer policy and the scan limits.
pub struct Profile<M, ProfileCmp, ParetoCmp>
where
    M: Metric,
    ProfileCmp: JourneyComparator<M>,
    ParetoCmp: JourneyComparator<M>,
{
    pub transfer_generator: Arc<dyn TransferGenerator>,
    pub profile_comparator: ProfileCmp,
    pub pareto_comparator: ParetoCmp,
    pub params: ScanParams,
    /// Enables the teleporting metric guesser during profiled scans.
    pub use_guesser: bool,
    _metric: PhantomData<M>,
}

/// The canonical profile : transfer metric, profile comparator over
/// (vehicles, departure, arrival), Pareto comparator over (vehicles,
/// travel time).
pub type TransferProfile = Profile<TransferMetric, ProfileComparator, ParetoComparator>;

impl TransferProfile {
    pub fn transfer_profile(transfer_generator: Arc<dyn TransferGenerator>) -> Self {
        Self {
            transfer_generator,
            profile_comparator: ProfileComparator,
            pareto_comparator: ParetoComparator,
            params: ScanParams::default(),
            use_guesser: false,
            _metric: PhantomData,
        }
    }

    pub fn with_params(mut self, params: ScanParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_guesser(mut self) -> Self {
        self.use_guesser = true;
        self
    }
}

/// Rejected before any scan starts : the settings make no sense.
#[derive(Debug)]
pub enum BadRequest {
    MissingStops,
    MissingTimeFrame,
    TimeFrameReversed { start: Timestamp, end: Timestamp },
    /// The time frame does not intersect the stored departure dates.
    WindowOutOfRange { start: Timestamp, end: Timestamp },
    IdenticalStops(StopId),
    UnknownStop(StopId),
}

impl fmt::Display for BadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BadRequest::MissingStops => {
                write!(f, "No stops were selected for this query.")
            }
            BadRequest::MissingTimeFrame => {
                write!(f, "No time frame was selected for this query.")
            }
            BadRequest::TimeFrameReversed { start, end } => write!(
                f,
                "The requested time frame ends ({}) before it starts ({}).",
                end, start
            ),
            BadRequest::WindowOutOfRange { start, end } => write!(
                f,
                "The requested time frame ({} - {}) is out of the validity period of the data.",
                start, end
            ),
            BadRequest::IdenticalStops(stop) => {
                write!(f, "The origin and the destination are both the stop {}.", stop)
            }
            BadRequest::UnknownStop(stop) => {
                write!(f, "The stop {} is not known to the database.", stop)
            }
        }
    }
}

impl std::error::Error for BadRequest {}

/// Fluent query surface over one database and one profile.
///
/// ```ignore
/// let journeys = JourneyQuery::new(&db, &profile)
///     .select_stops(from, to)
///     .select_time_frame(t0, t1)
///     .calculate_all_journeys()?;
/// ```
pub struct JourneyQuery<'a, M, ProfileCmp, ParetoCmp>
where
    M: Metric,
    ProfileCmp: JourneyComparator<M>,
    ParetoCmp: JourneyComparator<M>,
{
    db: &'a ConnectionsDb,
    profile: &'a Profile<M, ProfileCmp, ParetoCmp>,
    stops: Option<(StopId, StopId)>,
    time_frame: Option<(Timestamp, Timestamp)>,
}

impl<'a, M, ProfileCmp, ParetoCmp> JourneyQuery<'a, M, ProfileCmp, ParetoCmp>
where
    M: Metric,
    ProfileCmp: JourneyComparator<M>,
    ParetoCmp: JourneyComparator<M>,
{
    pub fn new(db: &'a ConnectionsDb, profile: &'a Profile<M, ProfileCmp, ParetoCmp>) -> Self {
        Self {
            db,
            profile,
            stops: None,
            time_frame: None,
        }
    }

    pub fn select_stops(mut self, from: StopId, to: StopId) -> Self {
        self.stops = Some((from, to));
        self
    }

    pub fn select_time_frame(mut self, start: Timestamp, end: Timestamp) -> Self {
        self.time_frame = Some((start, end));
        self
    }

    fn validate(&self) -> Result<(StopId, StopId, Timestamp, Timestamp), BadRequest> {
        let (from, to) = self.stops.ok_or(BadRequest::MissingStops)?;
        let (start, end) = self.time_frame.ok_or(BadRequest::MissingTimeFrame)?;
        if end < start {
            return Err(BadRequest::TimeFrameReversed { start, end });
        }
        if from == to {
            return Err(BadRequest::IdenticalStops(from));
        }
        if !self.db.has_stop(&from) {
            return Err(BadRequest::UnknownStop(from));
        }
        if !self.db.has_stop(&to) {
            return Err(BadRequest::UnknownStop(to));
        }
        let intersects_data = match (self.db.earliest_date(), self.db.latest_date()) {
            (Some(earliest), Some(latest)) => end >= earliest && start <= latest,
            _ => false,
        };
        if !intersects_data {
            return Err(BadRequest::WindowOutOfRange { start, end });
        }
        Ok((from, to, start, end))
    }

    /// All Pareto-optimal journeys of the time frame, origin-rooted.
    /// An empty list when nothing is reachable.
    pub fn calculate_all_journeys(&self) -> Result<Vec<Journey<M>>, BadRequest> {
        self.calculate_all_journeys_with(None, None)
            .map(|outcome| outcome.journeys)
    }

    /// Same as [`JourneyQuery::calculate_all_journeys`] with an optional
    /// connection filter and an optional deadline predicate ; the outcome
    /// says whether the deadline truncated the result.
    pub fn calculate_all_journeys_with(
        &self,
        connection_filter: Option<Box<dyn Fn(&Connection) -> bool + 'a>>,
        deadline: Option<Box<dyn Fn() -> bool + 'a>>,
    ) -> Result<ScanOutcome<M>, BadRequest> {
        let (from, to, start, end) = self.validate()?;
        let mut scan = ProfiledConnectionScan::new(
            self.db,
            from,
            to,
            start,
            end,
            self.profile.profile_comparator.clone(),
            self.profile.pareto_comparator.clone(),
            self.profile.transfer_generator.as_ref(),
            self.profile.params.clone(),
        );
        if self.profile.use_guesser {
            scan = scan.with_guesser(Box::new(TeleportGuesser::new()));
        }
        if let Some(filter) = connection_filter {
            scan = scan.with_connection_filter(filter);
        }
        if let Some(deadline) = deadline {
            scan = scan.with_deadline(deadline);
        }
        Ok(scan.compute())
    }

    /// The first journey reaching the destination when departing at or after
    /// the frame start. `None` when unreachable.
    pub fn calculate_earliest_arrival(&self) -> Result<Option<Journey<M>>, BadRequest> {
        let (from, to, start, end) = self.validate()?;
        let scan = EarliestArrivalScan::new(
            self.db,
            from,
            to,
            start,
            end,
            self.profile.transfer_generator.as_ref(),
            self.profile.params.clone(),
        );
        Ok(scan.compute())
    }

    /// The last journey still reaching the destination by the frame end.
    /// `None` when unreachable.
    pub fn calculate_latest_departure(&self) -> Result<Option<Journey<M>>, BadRequest> {
        let (from, to, start, end) = self.validate()?;
        let scan = LatestDepartureScan::new(
            self.db,
            from,
            to,
            start,
            end,
            self.profile.transfer_generator.as_ref(),
            self.profile.params.clone(),
        );
        Ok(scan.compute())
    }
}
