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

mod cursor;
mod departure_index;
mod global_id_index;
mod packed_store;
mod serialize;

pub use cursor::DepartureCursor;
pub use serialize::LoadError;

use crate::model::{Connection, ConnectionId, DatabaseId, InternalId, Mode, StopId, TripId};
use crate::time::Timestamp;
use departure_index::{DepartureIndex, DEFAULT_NB_OF_WINDOWS, DEFAULT_WINDOW_SECONDS};
use global_id_index::GlobalIdIndex;
use packed_store::{PackedConnection, PackedStore};
use std::collections::HashSet;
use tracing::debug;

/// Append/update-friendly store of connections.
///
/// Connections are created by [`ConnectionsDb::add_or_update`], mutated only
/// by calling it again with the same global id, and never deleted. Enumeration
/// by departure time goes through [`ConnectionsDb::departure_cursor`].
///
/// One writer and any reader must not overlap : either let the borrow checker
/// enforce it (a live cursor borrows the database) or give each reader its
/// own snapshot via [`Clone::clone`], which is a deep copy.
#[derive(Debug, Clone)]
pub struct ConnectionsDb {
    pub(crate) database_id: DatabaseId,
    pub(crate) store: PackedStore,
    /// Parallel to internal ids.
    pub(crate) global_ids: Vec<String>,
    /// Parallel to internal ids.
    pub(crate) trip_ids: Vec<u32>,
    pub(crate) global_id_index: GlobalIdIndex,
    pub(crate) departures: DepartureIndex,
    pub(crate) next_internal_id: u32,
    /// Lower bound on every stored departure time. u64::MAX when empty.
    pub(crate) earliest_date: u64,
    /// Upper bound on every stored departure time. 0 when empty.
    pub(crate) latest_date: u64,
    /// Every stop mentioned by a stored connection. Derived data, rebuilt on
    /// load, may keep stops whose connections were all re-routed elsewhere.
    pub(crate) stops: HashSet<StopId>,
}

impl ConnectionsDb {
    pub fn new(database_id: DatabaseId) -> Self {
        Self::with_windows(database_id, DEFAULT_WINDOW_SECONDS, DEFAULT_NB_OF_WINDOWS)
    }

    pub fn with_windows(database_id: DatabaseId, window_seconds: u32, nb_of_windows: u32) -> Self {
        Self {
            database_id,
            store: PackedStore::new(),
            global_ids: Vec::new(),
            trip_ids: Vec::new(),
            global_id_index: GlobalIdIndex::new(),
            departures: DepartureIndex::new(window_seconds, nb_of_windows),
            next_internal_id: 0,
            earliest_date: u64::MAX,
            latest_date: 0,
            stops: HashSet::new(),
        }
    }

    pub fn database_id(&self) -> DatabaseId {
        self.database_id
    }

    pub fn nb_of_connections(&self) -> usize {
        self.next_internal_id as usize
    }

    pub fn is_empty(&self) -> bool {
        self.next_internal_id == 0
    }

    /// Lower bound on every stored departure time. `None` when empty.
    pub fn earliest_date(&self) -> Option<Timestamp> {
        (!self.is_empty()).then(|| Timestamp::from_unix_seconds(self.earliest_date))
    }

    /// Upper bound on every stored departure time. `None` when empty.
    pub fn latest_date(&self) -> Option<Timestamp> {
        (!self.is_empty()).then(|| Timestamp::from_unix_seconds(self.latest_date))
    }

    /// Every stop mentioned by a stored connection (a superset after updates
    /// that moved connections away from a stop).
    pub fn stops(&self) -> impl Iterator<Item = &StopId> {
        self.stops.iter()
    }

    pub fn has_stop(&self, stop: &StopId) -> bool {
        self.stops.contains(stop)
    }

    /// Inserts `connection` under its global id, or updates the stored fields
    /// when the global id is already known. Returns the stable internal id.
    pub fn add_or_update(&mut self, connection: &Connection) -> InternalId {
        let packed = self.pack(connection);
        let departure_seconds = u64::from(packed.departure_time);

        let internal_id = match self
            .global_id_index
            .find(&connection.global_id, &self.global_ids)
        {
            Some(internal_id) => {
                let old = self
                    .store
                    .get(internal_id.id)
                    .expect("indexed global id without a stored record");
                self.store.put(internal_id.id, &packed);
                if old.departure_time != packed.departure_time {
                    let old_window = self.departures.window_of(u64::from(old.departure_time));
                    let new_window = self.departures.window_of(departure_seconds);
                    if old_window != new_window {
                        self.departures.remove(internal_id.id, old_window);
                        self.departures.add(internal_id.id, &self.store);
                    } else {
                        self.departures.sort(old_window, &self.store);
                    }
                }
                if self.trip_ids[internal_id.id as usize] != connection.trip.internal.id {
                    self.trip_ids[internal_id.id as usize] = connection.trip.internal.id;
                }
                internal_id
            }
            None => {
                let internal_id = InternalId {
                    id: self.next_internal_id,
                };
                self.next_internal_id += 1;
                self.global_ids.push(connection.global_id.clone());
                self.global_id_index.add(&connection.global_id, internal_id);
                self.trip_ids.push(connection.trip.internal.id);
                self.store.put(internal_id.id, &packed);
                self.departures.add(internal_id.id, &self.store);
                debug!(
                    global_id = %connection.global_id,
                    internal_id = internal_id.id,
                    "new connection"
                );
                internal_id
            }
        };

        self.earliest_date = self.earliest_date.min(departure_seconds);
        self.latest_date = self.latest_date.max(departure_seconds);
        self.stops.insert(connection.departure_stop);
        self.stops.insert(connection.arrival_stop);
        internal_id
    }

    /// Reads the connection stored under `id`. `None` when `id` belongs to
    /// another database or its slot was never written.
    pub fn get(&self, id: ConnectionId) -> Option<Connection> {
        if id.database != self.database_id {
            return None;
        }
        self.get_by_internal_id(id.internal)
    }

    pub fn get_by_internal_id(&self, internal_id: InternalId) -> Option<Connection> {
        if internal_id.id >= self.next_internal_id {
            return None;
        }
        let packed = self.store.get(internal_id.id)?;
        Some(self.unpack(internal_id, &packed))
    }

    pub fn get_by_global_id(&self, global_id: &str) -> Option<(InternalId, Connection)> {
        let internal_id = self.global_id_index.find(global_id, &self.global_ids)?;
        let connection = self.get_by_internal_id(internal_id)?;
        Some((internal_id, connection))
    }

    pub fn global_id(&self, internal_id: InternalId) -> Option<&str> {
        self.global_ids
            .get(internal_id.id as usize)
            .map(String::as_str)
    }

    pub fn trip_id(&self, internal_id: InternalId) -> Option<TripId> {
        self.trip_ids.get(internal_id.id as usize).map(|&id| TripId {
            database: self.database_id,
            internal: InternalId { id },
        })
    }

    pub fn connection_id(&self, internal_id: InternalId) -> ConnectionId {
        ConnectionId {
            database: self.database_id,
            internal: internal_id,
        }
    }

    /// A cursor for monotonic enumeration by departure time.
    ///
    /// The cursor borrows the database : no mutation can happen while one is
    /// alive.
    pub fn departure_cursor(&self) -> DepartureCursor<'_> {
        DepartureCursor::new(self)
    }

    fn pack(&self, connection: &Connection) -> PackedConnection {
        let departure_seconds = connection.departure_time.unix_seconds();
        debug_assert!(
            u32::try_from(departure_seconds).is_ok(),
            "departure time does not fit the packed layout"
        );
        PackedConnection {
            departure_tile: connection.departure_stop.tile,
            departure_local: connection.departure_stop.local,
            arrival_tile: connection.arrival_stop.tile,
            arrival_local: connection.arrival_stop.local,
            departure_time: departure_seconds as u32,
            travel_time: connection.travel_time,
            departure_delay: connection.departure_delay,
            arrival_delay: connection.arrival_delay,
            mode: connection.mode.bits(),
        }
    }

    fn unpack(&self, internal_id: InternalId, packed: &PackedConnection) -> Connection {
        Connection {
            global_id: self.global_ids[internal_id.id as usize].clone(),
            departure_stop: StopId {
                database: self.database_id,
                tile: packed.departure_tile,
                local: packed.departure_local,
            },
            arrival_stop: StopId {
                database: self.database_id,
                tile: packed.arrival_tile,
                local: packed.arrival_local,
            },
            departure_time: Timestamp::from_unix_seconds(u64::from(packed.departure_time)),
            travel_time: packed.travel_time,
            departure_delay: packed.departure_delay,
            arrival_delay: packed.arrival_delay,
            mode: Mode::from_bits(packed.mode),
            trip: TripId {
                database: self.database_id,
                internal: InternalId {
                    id: self.trip_ids[internal_id.id as usize],
                },
            },
        }
    }

    pub(crate) fn rebuild_stops(&mut self) {
        self.stops.clear();
        for id in 0..self.next_internal_id {
            if let Some(packed) = self.store.get(id) {
                self.stops.insert(StopId {
                    database: self.database_id,
                    tile: packed.departure_tile,
                    local: packed.departure_local,
                });
                self.stops.insert(StopId {
                    database: self.database_id,
                    tile: packed.arrival_tile,
                    local: packed.arrival_local,
                });
            }
        }
    }
}
