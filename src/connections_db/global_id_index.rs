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

use crate::model::InternalId;

pub(crate) const NB_OF_BUCKETS: u32 = 65_535;

const EMPTY: u32 = 0xFFFF_FFFF;

/// String -> internal id index over a fixed set of hash buckets.
///
/// Each bucket head points into a flat pool of (internal_id, next) pairs.
/// The pool is append-only : updating a connection under an existing global
/// id leaves the chains untouched, and nothing is ever removed.
#[derive(Debug, Clone)]
pub(crate) struct GlobalIdIndex {
    bucket_heads: Vec<u32>,
    /// Flat pool of pairs : `linked_list[2k]` is an internal id,
    /// `linked_list[2k + 1]` the pool index of the next pair (or EMPTY).
    linked_list: Vec<u32>,
    next_pointer: u32,
}

/// The classical 23/31 rolling polynomial, modulo the bucket count.
pub(crate) fn hash(global_id: &str) -> u32 {
    let mut hash: u32 = 23;
    for byte in global_id.bytes() {
        hash = hash.wrapping_mul(31).wrapping_add(u32::from(byte));
    }
    hash % NB_OF_BUCKETS
}

impl GlobalIdIndex {
    pub(crate) fn new() -> Self {
        Self {
            bucket_heads: vec![EMPTY; NB_OF_BUCKETS as usize],
            linked_list: Vec::new(),
            next_pointer: 0,
        }
    }

    pub(crate) fn from_parts(bucket_heads: Vec<u32>, linked_list: Vec<u32>, next_pointer: u32) -> Self {
        Self {
            bucket_heads,
            linked_list,
            next_pointer,
        }
    }

    pub(crate) fn bucket_heads(&self) -> &[u32] {
        &self.bucket_heads
    }

    pub(crate) fn linked_list(&self) -> &[u32] {
        &self.linked_list
    }

    pub(crate) fn next_pointer(&self) -> u32 {
        self.next_pointer
    }

    /// Appends `internal_id` to the bucket chain of `global_id`.
    ///
    /// The caller guarantees `global_id` is not already indexed.
    pub(crate) fn add(&mut self, global_id: &str, internal_id: InternalId) {
        let bucket = hash(global_id) as usize;
        let pair = self.next_pointer;
        self.linked_list.push(internal_id.id);
        self.linked_list.push(self.bucket_heads[bucket]);
        self.next_pointer += 2;
        self.bucket_heads[bucket] = pair;
    }

    /// Walks the bucket chain of `global_id`, verifying each candidate
    /// against the parallel `global_ids` array.
    pub(crate) fn find(&self, global_id: &str, global_ids: &[String]) -> Option<InternalId> {
        let bucket = hash(global_id) as usize;
        let mut pair = self.bucket_heads[bucket];
        while pair != EMPTY {
            let internal_id = self.linked_list[pair as usize];
            if global_ids[internal_id as usize] == global_id {
                return Some(InternalId { id: internal_id });
            }
            pair = self.linked_list[pair as usize + 1];
        }
        None
    }
}
