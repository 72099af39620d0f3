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

#![allow(dead_code)]

use std::sync::Arc;
use tangara::{
    Connection, ConnectionsDb, DatabaseId, FixedTransfers, InternalId, Mode, PositiveDuration,
    StopId, Timestamp, TransferProfile, TripId, Walk,
};

pub fn init_logger() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

pub const DB: DatabaseId = DatabaseId::new(0);

pub fn stop(local: u32) -> StopId {
    StopId::new(DB, 0, local)
}

pub fn trip(id: u32) -> TripId {
    TripId::new(DB, InternalId::new(id))
}

/// "09:30:00" on 2018-12-04 UTC.
pub fn at(hms: &str) -> Timestamp {
    let datetime = chrono::NaiveDateTime::parse_from_str(
        &format!("2018-12-04 {}", hms),
        "%Y-%m-%d %H:%M:%S",
    )
    .expect("bad test time literal");
    Timestamp::from_datetime(&datetime).expect("test time before the epoch")
}

/// Builds a small timetable, one connection at a time.
pub struct TimetableBuilder {
    db: ConnectionsDb,
    next_global_id: u32,
}

impl TimetableBuilder {
    pub fn new() -> Self {
        Self {
            db: ConnectionsDb::new(DB),
            next_global_id: 0,
        }
    }

    pub fn connection(
        &mut self,
        trip_id: u32,
        from: u32,
        to: u32,
        departure: Timestamp,
        travel_seconds: u16,
    ) -> &mut Self {
        self.connection_with_mode(trip_id, from, to, departure, travel_seconds, Mode::normal())
    }

    pub fn connection_with_mode(
        &mut self,
        trip_id: u32,
        from: u32,
        to: u32,
        departure: Timestamp,
        travel_seconds: u16,
        mode: Mode,
    ) -> &mut Self {
        let global_id = format!("connection:{}", self.next_global_id);
        self.next_global_id += 1;
        self.db.add_or_update(&Connection {
            global_id,
            departure_stop: stop(from),
            arrival_stop: stop(to),
            departure_time: departure,
            travel_time: travel_seconds,
            departure_delay: 0,
            arrival_delay: 0,
            mode,
            trip: trip(trip_id),
        });
        self
    }

    pub fn build(self) -> ConnectionsDb {
        self.db
    }
}

/// The canonical profile over explicit foot transfers, with a 60 s in-place
/// vehicle change.
pub fn transfer_profile(walks: &[(u32, u32, u32, u32)]) -> TransferProfile {
    let mut transfers =
        FixedTransfers::new().with_same_stop_change(PositiveDuration::from_seconds(60));
    for &(from, to, seconds, meters) in walks {
        transfers.add_bidirectional(
            stop(from),
            stop(to),
            Walk {
                duration: PositiveDuration::from_seconds(seconds),
                distance_meters: meters,
            },
        );
    }
    TransferProfile::transfer_profile(Arc::new(transfers))
}
