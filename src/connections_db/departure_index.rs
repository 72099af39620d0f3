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

use super::packed_store::PackedStore;

/// Slot value for allocated but never written body-store entries.
const UNWRITTEN: u32 = 0xFFFF_FFFF;

/// One window of the modular departure index.
///
/// `pointer` locates the window body inside the shared body store, `size` is
/// the number of live entries. The capacity of the body region is the
/// smallest power of two >= the largest size the window ever reached.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) struct WindowMeta {
    pub pointer: u32,
    pub size: u32,
}

/// Windowed departure index.
///
/// Time is folded onto a modular axis of `nb_of_windows` windows of
/// `window_seconds` each ; `window(t) = (t / window_seconds) % nb_of_windows`.
/// Every window body holds internal ids sorted ascending by their absolute
/// departure time, so one window may interleave several modular cycles.
///
/// The body store only ever grows : when a window outgrows its region, the
/// body is copied to a fresh region at the tail and the old region becomes
/// garbage. Nothing is ever reclaimed.
#[derive(Debug, Clone)]
pub(crate) struct DepartureIndex {
    window_seconds: u32,
    nb_of_windows: u32,
    windows: Vec<WindowMeta>,
    body_store: Vec<u32>,
    next_pointer: u32,
}

pub(crate) const DEFAULT_WINDOW_SECONDS: u32 = 60;
pub(crate) const DEFAULT_NB_OF_WINDOWS: u32 = 24 * 60;

impl DepartureIndex {
    pub(crate) fn new(window_seconds: u32, nb_of_windows: u32) -> Self {
        assert!(window_seconds > 0 && nb_of_windows > 0);
        Self {
            window_seconds,
            nb_of_windows,
            windows: vec![WindowMeta { pointer: 0, size: 0 }; nb_of_windows as usize],
            body_store: Vec::new(),
            next_pointer: 0,
        }
    }

    pub(crate) fn from_parts(
        window_seconds: u32,
        nb_of_windows: u32,
        windows: Vec<WindowMeta>,
        body_store: Vec<u32>,
        next_pointer: u32,
    ) -> Self {
        Self {
            window_seconds,
            nb_of_windows,
            windows,
            body_store,
            next_pointer,
        }
    }

    pub(crate) fn window_seconds(&self) -> u32 {
        self.window_seconds
    }

    pub(crate) fn nb_of_windows(&self) -> u32 {
        self.nb_of_windows
    }

    pub(crate) fn windows(&self) -> &[WindowMeta] {
        &self.windows
    }

    pub(crate) fn body_store(&self) -> &[u32] {
        &self.body_store
    }

    pub(crate) fn next_pointer(&self) -> u32 {
        self.next_pointer
    }

    pub(crate) fn window_of(&self, departure_seconds: u64) -> u32 {
        ((departure_seconds / u64::from(self.window_seconds)) % u64::from(self.nb_of_windows))
            as u32
    }

    pub(crate) fn meta(&self, window: u32) -> WindowMeta {
        self.windows[window as usize]
    }

    pub(crate) fn entry(&self, window: u32, index_in_window: u32) -> u32 {
        let meta = self.windows[window as usize];
        debug_assert!(index_in_window < meta.size);
        self.body_store[(meta.pointer + index_in_window) as usize]
    }

    fn allocate(&mut self, size: u32) -> u32 {
        let pointer = self.next_pointer;
        self.body_store
            .resize(self.body_store.len() + size as usize, UNWRITTEN);
        self.next_pointer += size;
        pointer
    }

    /// Registers `internal_id` (whose record must already be written) into
    /// the window of its departure time, keeping the window sorted.
    pub(crate) fn add(&mut self, internal_id: u32, store: &PackedStore) {
        let departure = u64::from(store.departure_seconds(internal_id));
        let window = self.window_of(departure);
        let meta = self.windows[window as usize];
        if meta.size == 0 {
            let pointer = self.allocate(1);
            self.body_store[pointer as usize] = internal_id;
            self.windows[window as usize] = WindowMeta { pointer, size: 1 };
            return;
        }
        let mut pointer = meta.pointer;
        if meta.size.is_power_of_two() {
            // the region is full, copy the body to a fresh tail region
            let new_pointer = self.allocate(2 * meta.size);
            for i in 0..meta.size {
                self.body_store[(new_pointer + i) as usize] =
                    self.body_store[(meta.pointer + i) as usize];
            }
            pointer = new_pointer;
        }
        self.body_store[(pointer + meta.size) as usize] = internal_id;
        self.windows[window as usize] = WindowMeta {
            pointer,
            size: meta.size + 1,
        };
        self.sort(window, store);
    }

    /// Removes `internal_id` from `window`, closing the gap. No-op when the
    /// id is not there.
    pub(crate) fn remove(&mut self, internal_id: u32, window: u32) {
        let meta = self.windows[window as usize];
        let from = meta.pointer as usize;
        let to = from + meta.size as usize;
        let Some(found) = self.body_store[from..to]
            .iter()
            .position(|&id| id == internal_id)
        else {
            return;
        };
        self.body_store.copy_within(from + found + 1..to, from + found);
        self.windows[window as usize] = WindowMeta {
            pointer: meta.pointer,
            size: meta.size - 1,
        };
    }

    /// In-place quicksort of a window body, keyed by departure time.
    ///
    /// Not stable : the order among equal departure times is unspecified.
    pub(crate) fn sort(&mut self, window: u32, store: &PackedStore) {
        let meta = self.windows[window as usize];
        if meta.size < 2 {
            return;
        }
        let from = meta.pointer as usize;
        let to = from + meta.size as usize;
        quicksort(&mut self.body_store[from..to], &|id| {
            store.departure_seconds(id)
        });
    }
}

fn quicksort(slice: &mut [u32], key: &impl Fn(u32) -> u32) {
    let len = slice.len();
    if len < 2 {
        return;
    }
    slice.swap(len / 2, len - 1);
    let pivot = key(slice[len - 1]);
    let mut split = 0;
    for i in 0..len - 1 {
        if key(slice[i]) < pivot {
            slice.swap(i, split);
            split += 1;
        }
    }
    slice.swap(split, len - 1);
    quicksort(&mut slice[..split], key);
    quicksort(&mut slice[split + 1..], key);
}
