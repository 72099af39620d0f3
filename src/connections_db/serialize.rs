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

use super::departure_index::{DepartureIndex, WindowMeta};
use super::global_id_index::{GlobalIdIndex, NB_OF_BUCKETS};
use super::packed_store::PackedStore;
use super::ConnectionsDb;
use crate::model::DatabaseId;
use std::io::{self, Read, Write};
use tracing::debug;

const VERSION: u8 = 2;

#[derive(Debug)]
pub enum LoadError {
    /// The version byte is not the one this build understands.
    IncompatibleVersion { found: u8 },
    /// The byte stream is structurally broken.
    Malformed(&'static str),
    Io(io::Error),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::IncompatibleVersion { found } => write!(
                f,
                "cannot load a connections database of version {}, expected version {}",
                found, VERSION
            ),
            LoadError::Malformed(what) => write!(f, "malformed connections database : {}", what),
            LoadError::Io(err) => write!(f, "io error while loading a connections database : {}", err),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<io::Error> for LoadError {
    fn from(err: io::Error) -> Self {
        LoadError::Io(err)
    }
}

impl ConnectionsDb {
    /// Serializes the database. Writing, reading the bytes back and writing
    /// again produces the exact same bytes.
    ///
    /// The database id is not serialized, it is assigned again on load.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&[VERSION])?;
        write_blob(writer, self.store.bytes())?;

        let mut global_id_bytes = Vec::new();
        for global_id in &self.global_ids {
            let bytes = global_id.as_bytes();
            global_id_bytes.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
            global_id_bytes.extend_from_slice(bytes);
        }
        write_blob(writer, &global_id_bytes)?;

        write_blob(writer, &u32s_to_bytes(&self.trip_ids))?;
        write_blob(writer, &u32s_to_bytes(self.global_id_index.bucket_heads()))?;
        write_blob(writer, &u32s_to_bytes(self.global_id_index.linked_list()))?;
        writer.write_all(&self.global_id_index.next_pointer().to_le_bytes())?;

        let mut window_meta = Vec::with_capacity(self.departures.windows().len() * 2);
        for meta in self.departures.windows() {
            window_meta.push(meta.pointer);
            window_meta.push(meta.size);
        }
        write_blob(writer, &u32s_to_bytes(&window_meta))?;
        write_blob(writer, &u32s_to_bytes(self.departures.body_store()))?;
        writer.write_all(&self.departures.next_pointer().to_le_bytes())?;
        writer.write_all(&self.departures.window_seconds().to_le_bytes())?;
        writer.write_all(&self.departures.nb_of_windows().to_le_bytes())?;

        writer.write_all(&self.next_internal_id.to_le_bytes())?;
        writer.write_all(&self.earliest_date.to_le_bytes())?;
        writer.write_all(&self.latest_date.to_le_bytes())?;
        Ok(())
    }

    /// Loads a database serialized by [`ConnectionsDb::write_to`], tagging it
    /// with `database_id`.
    pub fn read_from<R: Read>(reader: &mut R, database_id: DatabaseId) -> Result<Self, LoadError> {
        let mut version = [0u8; 1];
        reader.read_exact(&mut version)?;
        if version[0] != VERSION {
            return Err(LoadError::IncompatibleVersion { found: version[0] });
        }

        let data = read_blob(reader)?;
        let global_id_bytes = read_blob(reader)?;
        let mut global_ids = Vec::new();
        let mut at = 0usize;
        while at < global_id_bytes.len() {
            if at + 4 > global_id_bytes.len() {
                return Err(LoadError::Malformed("truncated global id length"));
            }
            let len = u32::from_le_bytes(global_id_bytes[at..at + 4].try_into().unwrap()) as usize;
            at += 4;
            if at + len > global_id_bytes.len() {
                return Err(LoadError::Malformed("truncated global id"));
            }
            let global_id = std::str::from_utf8(&global_id_bytes[at..at + len])
                .map_err(|_| LoadError::Malformed("global id is not utf-8"))?;
            global_ids.push(global_id.to_string());
            at += len;
        }

        let trip_ids = bytes_to_u32s(&read_blob(reader)?)?;
        let bucket_heads = bytes_to_u32s(&read_blob(reader)?)?;
        if bucket_heads.len() != NB_OF_BUCKETS as usize {
            return Err(LoadError::Malformed("wrong global id bucket count"));
        }
        let linked_list = bytes_to_u32s(&read_blob(reader)?)?;
        let linked_list_pointer = read_u32(reader)?;
        if linked_list_pointer as usize != linked_list.len() {
            return Err(LoadError::Malformed("global id pool pointer out of range"));
        }

        let window_meta_flat = bytes_to_u32s(&read_blob(reader)?)?;
        let body_store = bytes_to_u32s(&read_blob(reader)?)?;
        let next_departure_pointer = read_u32(reader)?;
        let window_seconds = read_u32(reader)?;
        let nb_of_windows = read_u32(reader)?;
        if window_meta_flat.len() != nb_of_windows as usize * 2 {
            return Err(LoadError::Malformed("wrong departure window count"));
        }
        if next_departure_pointer as usize != body_store.len() {
            return Err(LoadError::Malformed("departure pointer out of range"));
        }
        let windows = window_meta_flat
            .chunks_exact(2)
            .map(|pair| WindowMeta {
                pointer: pair[0],
                size: pair[1],
            })
            .collect();

        let next_internal_id = read_u32(reader)?;
        let earliest_date = read_u64(reader)?;
        let latest_date = read_u64(reader)?;
        if global_ids.len() != next_internal_id as usize
            || trip_ids.len() != next_internal_id as usize
        {
            return Err(LoadError::Malformed("parallel arrays disagree on length"));
        }

        let mut db = ConnectionsDb {
            database_id,
            store: PackedStore::from_bytes(data),
            global_ids,
            trip_ids,
            global_id_index: GlobalIdIndex::from_parts(
                bucket_heads,
                linked_list,
                linked_list_pointer,
            ),
            departures: DepartureIndex::from_parts(
                window_seconds,
                nb_of_windows,
                windows,
                body_store,
                next_departure_pointer,
            ),
            next_internal_id,
            earliest_date,
            latest_date,
            stops: Default::default(),
        };
        db.rebuild_stops();
        debug!(
            nb_of_connections = db.next_internal_id,
            "loaded connections database"
        );
        Ok(db)
    }
}

fn write_blob<W: Write>(writer: &mut W, bytes: &[u8]) -> io::Result<()> {
    writer.write_all(&(bytes.len() as u64).to_le_bytes())?;
    writer.write_all(bytes)
}

fn read_blob<R: Read>(reader: &mut R) -> Result<Vec<u8>, LoadError> {
    let len = read_u64(reader)?;
    let len = usize::try_from(len).map_err(|_| LoadError::Malformed("blob too large"))?;
    let mut bytes = vec![0u8; len];
    reader.read_exact(&mut bytes)?;
    Ok(bytes)
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32, LoadError> {
    let mut bytes = [0u8; 4];
    reader.read_exact(&mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}

fn read_u64<R: Read>(reader: &mut R) -> Result<u64, LoadError> {
    let mut bytes = [0u8; 8];
    reader.read_exact(&mut bytes)?;
    Ok(u64::from_le_bytes(bytes))
}

fn u32s_to_bytes(values: &[u32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(values.len() * 4);
    for value in values {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

fn bytes_to_u32s(bytes: &[u8]) -> Result<Vec<u32>, LoadError> {
    if bytes.len() % 4 != 0 {
        return Err(LoadError::Malformed("u32 array with a ragged length"));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes(chunk.try_into().unwrap()))
        .collect())
}
