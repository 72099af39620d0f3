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

/// Size of one packed connection record.
pub(crate) const RECORD_SIZE: usize = 28;

/// Growth quantum of the backing array, in bytes.
const CHUNK_SIZE: usize = 1024;

/// Departure tile value marking a slot that was never written.
const SENTINEL_TILE: u32 = 0xFFFF_FFFF;

/// The raw fields of one record, exactly as they are packed.
///
/// The store does not interpret these bytes, callers do ; in particular the
/// departure/arrival stops are stored tile+local only, the database tag is
/// implied by the owning database.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) struct PackedConnection {
    pub departure_tile: u32,
    pub departure_local: u32,
    pub arrival_tile: u32,
    pub arrival_local: u32,
    pub departure_time: u32,
    pub travel_time: u16,
    pub departure_delay: u16,
    pub arrival_delay: u16,
    pub mode: u16,
}

/// Fixed-width record store with resize-on-write.
///
/// Records live at `internal_id * RECORD_SIZE` in one flat little-endian
/// byte array. Uninitialized bytes are `0xFF` so that reading an unwritten
/// slot yields the sentinel departure tile.
#[derive(Debug, Clone)]
pub(crate) struct PackedStore {
    data: Vec<u8>,
}

impl PackedStore {
    pub(crate) fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub(crate) fn from_bytes(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        &self.data
    }

    fn ensure_capacity(&mut self, internal_id: u32) {
        let needed = (internal_id as usize + 1) * RECORD_SIZE;
        while self.data.len() < needed {
            let new_len = self.data.len() + CHUNK_SIZE;
            self.data.resize(new_len, 0xFF);
        }
    }

    pub(crate) fn put(&mut self, internal_id: u32, record: &PackedConnection) {
        self.ensure_capacity(internal_id);
        let offset = internal_id as usize * RECORD_SIZE;
        let slot = &mut self.data[offset..offset + RECORD_SIZE];
        slot[0..4].copy_from_slice(&record.departure_tile.to_le_bytes());
        slot[4..8].copy_from_slice(&record.departure_local.to_le_bytes());
        slot[8..12].copy_from_slice(&record.arrival_tile.to_le_bytes());
        slot[12..16].copy_from_slice(&record.arrival_local.to_le_bytes());
        slot[16..20].copy_from_slice(&record.departure_time.to_le_bytes());
        slot[20..22].copy_from_slice(&record.travel_time.to_le_bytes());
        slot[22..24].copy_from_slice(&record.departure_delay.to_le_bytes());
        slot[24..26].copy_from_slice(&record.arrival_delay.to_le_bytes());
        slot[26..28].copy_from_slice(&record.mode.to_le_bytes());
    }

    /// Returns `None` for a slot that is out of bounds or was never written.
    pub(crate) fn get(&self, internal_id: u32) -> Option<PackedConnection> {
        let offset = internal_id as usize * RECORD_SIZE;
        if offset + RECORD_SIZE > self.data.len() {
            return None;
        }
        let slot = &self.data[offset..offset + RECORD_SIZE];
        let departure_tile = read_u32(slot, 0);
        if departure_tile == SENTINEL_TILE {
            return None;
        }
        Some(PackedConnection {
            departure_tile,
            departure_local: read_u32(slot, 4),
            arrival_tile: read_u32(slot, 8),
            arrival_local: read_u32(slot, 12),
            departure_time: read_u32(slot, 16),
            travel_time: read_u16(slot, 20),
            departure_delay: read_u16(slot, 22),
            arrival_delay: read_u16(slot, 24),
            mode: read_u16(slot, 26),
        })
    }

    /// Departure time of a written record, without decoding the whole slot.
    ///
    /// Panics in debug builds when the slot was never written ; the departure
    /// index only ever holds ids of written records.
    pub(crate) fn departure_seconds(&self, internal_id: u32) -> u32 {
        let offset = internal_id as usize * RECORD_SIZE;
        debug_assert!(offset + RECORD_SIZE <= self.data.len());
        debug_assert!(read_u32(&self.data[offset..], 0) != SENTINEL_TILE);
        read_u32(&self.data[offset..], 16)
    }
}

fn read_u32(slice: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([slice[at], slice[at + 1], slice[at + 2], slice[at + 3]])
}

fn read_u16(slice: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([slice[at], slice[at + 1]])
}
