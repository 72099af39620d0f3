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

use super::ConnectionsDb;
use crate::model::InternalId;
use crate::time::Timestamp;
use tracing::trace;

/// `index_in_window` needs (re)initialization for the current window.
const UNINIT: u32 = u32::MAX;
/// The current window has been fully consumed (backward direction only :
/// going forward, exhaustion is `index >= size`).
const EXHAUSTED: u32 = u32::MAX - 1;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum Direction {
    Forward,
    Backward,
}

/// Stateful cursor enumerating connections in departure-time order.
///
/// After [`DepartureCursor::move_to`], either [`DepartureCursor::move_next`]
/// yields connections by non-decreasing departure time, or
/// [`DepartureCursor::move_previous`] by non-increasing departure time.
/// The order among equal departure times is the (unstable) window sort order.
///
/// The per-window resume indices are only meaningful for the direction
/// travelled since the last `move_to` : switching direction requires
/// re-anchoring.
pub struct DepartureCursor<'db> {
    db: &'db ConnectionsDb,
    current_time: u64,
    index_in_window: u32,
    /// For each window, how far it has been consumed already. A window can
    /// hold departures from several modular cycles, so this is the index to
    /// resume from when the scan wraps back onto the window.
    already_used: Vec<u32>,
    direction: Option<Direction>,
}

impl<'db> DepartureCursor<'db> {
    pub(super) fn new(db: &'db ConnectionsDb) -> Self {
        Self {
            db,
            current_time: 0,
            index_in_window: UNINIT,
            already_used: vec![UNINIT; db.departures.nb_of_windows() as usize],
            direction: None,
        }
    }

    /// Resets the cursor and anchors it at `time`.
    pub fn move_to(&mut self, time: Timestamp) {
        self.current_time = time.unix_seconds();
        self.index_in_window = UNINIT;
        self.already_used.fill(UNINIT);
        self.direction = None;
    }

    /// The departure time of the last returned connection (or the anchor).
    pub fn current_time(&self) -> Timestamp {
        Timestamp::from_unix_seconds(self.current_time)
    }

    /// Advances to the connection with the smallest departure time at or
    /// after the current one. `None` once past the latest stored departure.
    pub fn move_next(&mut self) -> Option<InternalId> {
        if self.db.is_empty() {
            return None;
        }
        debug_assert!(self.direction != Some(Direction::Backward));
        self.direction = Some(Direction::Forward);

        let window_seconds = u64::from(self.db.departures.window_seconds());
        if self.current_time < self.db.earliest_date {
            self.current_time = self.db.earliest_date;
            self.index_in_window = UNINIT;
        }
        loop {
            if self.current_time > self.db.latest_date {
                return None;
            }
            let window = self.db.departures.window_of(self.current_time);
            let meta = self.db.departures.meta(window);
            if meta.size == 0 {
                self.advance_window(window_seconds);
                continue;
            }
            if self.index_in_window == UNINIT {
                let index = match self.already_used[window as usize] {
                    UNINIT => self.leftmost_at_or_after(window, self.current_time),
                    resume => resume,
                };
                self.index_in_window = index;
                self.already_used[window as usize] = index;
            }
            if self.index_in_window >= meta.size {
                self.already_used[window as usize] = meta.size;
                self.advance_window(window_seconds);
                continue;
            }
            let id = self.db.departures.entry(window, self.index_in_window);
            let departure = u64::from(self.db.store.departure_seconds(id));
            if departure < self.current_time {
                // leftover of an earlier cycle, permanently behind the cursor
                self.index_in_window += 1;
                self.already_used[window as usize] = self.index_in_window;
                continue;
            }
            if departure - self.current_time > window_seconds {
                // the entry belongs to a later cycle, later windows come first
                self.already_used[window as usize] = self.index_in_window;
                self.advance_window(window_seconds);
                continue;
            }
            self.index_in_window += 1;
            self.already_used[window as usize] = self.index_in_window;
            self.current_time = departure;
            trace!(internal_id = id, departure, "cursor forward");
            return Some(InternalId { id });
        }
    }

    /// Retreats to the connection with the greatest departure time at or
    /// before the current one. `None` once before the earliest stored
    /// departure.
    pub fn move_previous(&mut self) -> Option<InternalId> {
        if self.db.is_empty() {
            return None;
        }
        debug_assert!(self.direction != Some(Direction::Forward));
        self.direction = Some(Direction::Backward);

        let window_seconds = u64::from(self.db.departures.window_seconds());
        if self.current_time > self.db.latest_date {
            self.current_time = self.db.latest_date;
            self.index_in_window = UNINIT;
        }
        loop {
            if self.current_time < self.db.earliest_date {
                return None;
            }
            let window = self.db.departures.window_of(self.current_time);
            let meta = self.db.departures.meta(window);
            if meta.size == 0 {
                if !self.retreat_window(window_seconds) {
                    return None;
                }
                continue;
            }
            if self.index_in_window == UNINIT {
                let index = match self.already_used[window as usize] {
                    UNINIT => match self.rightmost_at_or_before(window, self.current_time) {
                        Some(index) => index,
                        None => EXHAUSTED,
                    },
                    resume => resume,
                };
                self.index_in_window = index;
                self.already_used[window as usize] = index;
            }
            if self.index_in_window == EXHAUSTED {
                if !self.retreat_window(window_seconds) {
                    return None;
                }
                continue;
            }
            let id = self.db.departures.entry(window, self.index_in_window);
            let departure = u64::from(self.db.store.departure_seconds(id));
            if departure > self.current_time {
                // belongs to a later cycle, permanently ahead of the cursor
                self.step_down(window);
                continue;
            }
            if self.current_time - departure > window_seconds {
                // the entry belongs to an earlier cycle, earlier windows first
                self.already_used[window as usize] = self.index_in_window;
                if !self.retreat_window(window_seconds) {
                    return None;
                }
                continue;
            }
            self.step_down(window);
            self.current_time = departure;
            trace!(internal_id = id, departure, "cursor backward");
            return Some(InternalId { id });
        }
    }

    fn advance_window(&mut self, window_seconds: u64) {
        self.current_time = (self.current_time / window_seconds + 1) * window_seconds;
        self.index_in_window = UNINIT;
    }

    /// Moves onto the previous window ; `false` on epoch underflow.
    fn retreat_window(&mut self, window_seconds: u64) -> bool {
        let window_start = (self.current_time / window_seconds) * window_seconds;
        if window_start == 0 {
            return false;
        }
        self.current_time = window_start - 1;
        self.index_in_window = UNINIT;
        true
    }

    fn step_down(&mut self, window: u32) {
        if self.index_in_window == 0 {
            self.index_in_window = EXHAUSTED;
        } else {
            self.index_in_window -= 1;
        }
        self.already_used[window as usize] = self.index_in_window;
    }

    /// Index of the leftmost entry of `window` departing at or after `time`,
    /// or the window size when there is none.
    fn leftmost_at_or_after(&self, window: u32, time: u64) -> u32 {
        let meta = self.db.departures.meta(window);
        let (mut low, mut high) = (0u32, meta.size);
        while low < high {
            let mid = low + (high - low) / 2;
            let id = self.db.departures.entry(window, mid);
            if u64::from(self.db.store.departure_seconds(id)) < time {
                low = mid + 1;
            } else {
                high = mid;
            }
        }
        low
    }

    /// Index of the rightmost entry of `window` departing at or before
    /// `time`, or `None` when there is none.
    fn rightmost_at_or_before(&self, window: u32, time: u64) -> Option<u32> {
        let meta = self.db.departures.meta(window);
        let (mut low, mut high) = (0u32, meta.size);
        while low < high {
            let mid = low + (high - low) / 2;
            let id = self.db.departures.entry(window, mid);
            if u64::from(self.db.store.departure_seconds(id)) <= time {
                low = mid + 1;
            } else {
                high = mid;
            }
        }
        low.checked_sub(1)
    }
}
