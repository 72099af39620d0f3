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

use crate::model::StopId;
use crate::time::PositiveDuration;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// Cost of moving between two stops without a vehicle.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Walk {
    pub duration: PositiveDuration,
    pub distance_meters: u32,
}

/// Supplies the scanner with non-vehicle movements between stops.
///
/// Implementations are pure lookups : any caching is layered on explicitly
/// with [`TransferCache`], keyed by [`TransferGenerator::identifier`]. There
/// is no process-wide cache.
pub trait TransferGenerator {
    /// Cost from `from` to `to`, `None` when unreachable. `from == to`
    /// models the minimum time needed to change vehicles in place.
    fn time_between(&self, from: &StopId, to: &StopId) -> Option<Walk>;

    /// Costs from `from` towards every reachable stop of `targets`.
    fn times_between(&self, from: &StopId, targets: &[StopId]) -> Vec<(StopId, Walk)> {
        targets
            .iter()
            .filter_map(|to| self.time_between(from, to).map(|walk| (*to, walk)))
            .collect()
    }

    /// Upper bound on the distance this generator can cover, in meters.
    /// Spatial prefilters may skip stop pairs further apart.
    fn range(&self) -> u32;

    /// Stable key identifying this generator's policy, used by caches.
    fn identifier(&self) -> String;
}

/// No transfers at all, not even in-place vehicle changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTransfers;

impl TransferGenerator for NoTransfers {
    fn time_between(&self, _from: &StopId, _to: &StopId) -> Option<Walk> {
        None
    }

    fn range(&self) -> u32 {
        0
    }

    fn identifier(&self) -> String {
        "none".to_string()
    }
}

/// An explicit adjacency of foot transfers, the way a feed would provide
/// them, plus an optional in-place vehicle-change time.
#[derive(Debug, Clone, Default)]
pub struct FixedTransfers {
    walks: HashMap<(StopId, StopId), Walk>,
    same_stop_change: Option<PositiveDuration>,
    range_meters: u32,
}

impl FixedTransfers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_same_stop_change(mut self, duration: PositiveDuration) -> Self {
        self.same_stop_change = Some(duration);
        self
    }

    pub fn add(&mut self, from: StopId, to: StopId, walk: Walk) {
        self.range_meters = self.range_meters.max(walk.distance_meters);
        self.walks.insert((from, to), walk);
    }

    pub fn add_bidirectional(&mut self, a: StopId, b: StopId, walk: Walk) {
        self.add(a, b, walk);
        self.add(b, a, walk);
    }
}

impl TransferGenerator for FixedTransfers {
    fn time_between(&self, from: &StopId, to: &StopId) -> Option<Walk> {
        if from == to {
            return self.same_stop_change.map(|duration| Walk {
                duration,
                distance_meters: 0,
            });
        }
        self.walks.get(&(*from, *to)).copied()
    }

    fn range(&self) -> u32 {
        self.range_meters
    }

    fn identifier(&self) -> String {
        format!(
            "fixed({},{})",
            self.walks.len(),
            self.same_stop_change
                .map_or_else(|| "-".to_string(), |d| d.total_seconds().to_string())
        )
    }
}

/// Dispatches to three generators so that the start and the end of a journey
/// may use different walking policies than mid-journey transfers.
///
/// A movement leaving a first-mile stop uses the first-mile generator, a
/// movement entering a last-mile stop uses the last-mile one, anything else
/// the middle generator.
pub struct FirstLastMile {
    first_mile_stops: HashSet<StopId>,
    last_mile_stops: HashSet<StopId>,
    first: Arc<dyn TransferGenerator>,
    middle: Arc<dyn TransferGenerator>,
    last: Arc<dyn TransferGenerator>,
}

impl FirstLastMile {
    pub fn new(
        first_mile_stops: HashSet<StopId>,
        last_mile_stops: HashSet<StopId>,
        first: Arc<dyn TransferGenerator>,
        middle: Arc<dyn TransferGenerator>,
        last: Arc<dyn TransferGenerator>,
    ) -> Self {
        Self {
            first_mile_stops,
            last_mile_stops,
            first,
            middle,
            last,
        }
    }
}

impl TransferGenerator for FirstLastMile {
    fn time_between(&self, from: &StopId, to: &StopId) -> Option<Walk> {
        if self.first_mile_stops.contains(from) {
            self.first.time_between(from, to)
        } else if self.last_mile_stops.contains(to) {
            self.last.time_between(from, to)
        } else {
            self.middle.time_between(from, to)
        }
    }

    fn range(&self) -> u32 {
        self.first
            .range()
            .max(self.middle.range())
            .max(self.last.range())
    }

    fn identifier(&self) -> String {
        format!(
            "firstlast({};{};{})",
            self.first.identifier(),
            self.middle.identifier(),
            self.last.identifier()
        )
    }
}

/// A caller-provided memoization layer over another generator.
///
/// Lookup results (including unreachability) are kept for the lifetime of
/// the cache. Inject the same cache into every query that shares the
/// underlying policy ; [`TransferGenerator::identifier`] is the key to tell
/// policies apart.
pub struct TransferCache {
    inner: Arc<dyn TransferGenerator>,
    cache: Mutex<HashMap<(StopId, StopId), Option<Walk>>>,
}

impl TransferCache {
    pub fn new(inner: Arc<dyn TransferGenerator>) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }
}

impl TransferGenerator for TransferCache {
    fn time_between(&self, from: &StopId, to: &StopId) -> Option<Walk> {
        let mut cache = self.cache.lock().expect("poisoned transfer cache");
        *cache
            .entry((*from, *to))
            .or_insert_with(|| self.inner.time_between(from, to))
    }

    fn range(&self) -> u32 {
        self.inner.range()
    }

    fn identifier(&self) -> String {
        format!("cache({})", self.inner.identifier())
    }
}
