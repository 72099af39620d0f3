use crate::connections_db::ConnectionsDb;
use crate::engine::metric::Metric;
use crate::journey::{Journey, Link};
use crate::model::{ConnectionId, StopId, TripId};
use crate::time::{PositiveDuration, Timestamp};

/// One rendered leg of a journey.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Leg {
    /// A ride spanning one or more consecutive connections of one trip.
    Vehicle {
        trip: TripId,
        from: StopId,
        to: StopId,
        departure: Timestamp,
        arrival: Timestamp,
        first_connection: ConnectionId,
        last_connection: ConnectionId,
        nb_of_connections: usize,
    },
    Walk {
        from: StopId,
        to: StopId,
        departure: Timestamp,
        arrival: Timestamp,
        distance_meters: u32,
    },
}

impl Leg {
    pub fn departure(&self) -> Timestamp {
        match self {
            Leg::Vehicle { departure, .. } | Leg::Walk { departure, .. } => *departure,
        }
    }

    pub fn arrival(&self) -> Timestamp {
        match self {
            Leg::Vehicle { arrival, .. } | Leg::Walk { arrival, .. } => *arrival,
        }
    }
}

/// Renders an origin-rooted (forward) journey as a list of legs, collapsing
/// consecutive connections of the same trip into one vehicle leg spanning
/// first departure to last arrival.
///
/// Times come from the stored connection records, so the journey must have
/// been computed against `db` (or a snapshot of it). Joined journeys are
/// rendered along their main branch ; fan them out first with
/// [`Journey::reverse`] if every alternative is wanted.
pub fn summarize<M: Metric>(journey: &Journey<M>, db: &ConnectionsDb) -> Vec<Leg> {
    let mut legs: Vec<Leg> = Vec::new();
    let mut pending_walk: Option<(StopId, StopId, u32, u32)> = None;

    for segment in journey.to_vec() {
        match segment.link() {
            Link::Genesis | Link::Joined => {}
            Link::Walk { duration, distance } => {
                let from = segment
                    .previous()
                    .map(|previous| previous.location())
                    .unwrap_or_else(|| segment.location());
                pending_walk = Some((from, segment.location(), *duration, *distance));
            }
            Link::Connection(connection_id) => {
                let Some(connection) = db.get(*connection_id) else {
                    continue;
                };
                // flush the walk that led to this boarding
                if let Some((from, to, duration, distance)) = pending_walk.take() {
                    let arrival = connection.departure_time;
                    legs.push(Leg::Walk {
                        from,
                        to,
                        departure: arrival - PositiveDuration::from_seconds(duration),
                        arrival,
                        distance_meters: distance,
                    });
                }
                let same_trip = matches!(
                    legs.last(),
                    Some(Leg::Vehicle { trip, .. }) if *trip == connection.trip
                );
                if same_trip {
                    if let Some(Leg::Vehicle {
                        to,
                        arrival,
                        last_connection,
                        nb_of_connections,
                        ..
                    }) = legs.last_mut()
                    {
                        *to = connection.arrival_stop;
                        *arrival = connection.arrival_time();
                        *last_connection = *connection_id;
                        *nb_of_connections += 1;
                    }
                } else {
                    legs.push(Leg::Vehicle {
                        trip: connection.trip,
                        from: connection.departure_stop,
                        to: connection.arrival_stop,
                        departure: connection.departure_time,
                        arrival: connection.arrival_time(),
                        first_connection: *connection_id,
                        last_connection: *connection_id,
                        nb_of_connections: 1,
                    });
                }
            }
        }
    }

    // a trailing walk ends the journey : anchor it on the last arrival
    if let Some((from, to, duration, distance)) = pending_walk {
        let departure = legs
            .last()
            .map(|leg| leg.arrival())
            .unwrap_or_else(|| journey.genesis_time());
        legs.push(Leg::Walk {
            from,
            to,
            departure,
            arrival: departure + PositiveDuration::from_seconds(duration),
            distance_meters: distance,
        });
    }
    legs
}
