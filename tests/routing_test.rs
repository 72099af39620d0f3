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

mod utils;

use anyhow::Error;
use tangara::{summarize, BadRequest, JourneyQuery, Leg, Mode, TransferMetric};
use utils::{at, init_logger, stop, transfer_profile, TimetableBuilder};

#[test]
fn one_connection_yields_one_journey() -> Result<(), Error> {
    init_logger();
    let mut builder = TimetableBuilder::new();
    builder.connection(0, 0, 1, at("09:30:00"), 600);
    let db = builder.build();

    let profile = transfer_profile(&[]);
    let journeys = JourneyQuery::new(&db, &profile)
        .select_stops(stop(0), stop(1))
        .select_time_frame(at("09:00:00"), at("11:00:00"))
        .calculate_all_journeys()?;

    assert_eq!(journeys.len(), 1);
    let journey = &journeys[0];
    assert_eq!(
        journey.metric(),
        &TransferMetric {
            vehicles: 1,
            travel_time: 600,
            walking_distance: 0,
        }
    );

    let legs = summarize(journey, &db);
    assert_eq!(legs.len(), 1);
    match &legs[0] {
        Leg::Vehicle {
            from,
            to,
            departure,
            arrival,
            nb_of_connections,
            ..
        } => {
            assert_eq!(*from, stop(0));
            assert_eq!(*to, stop(1));
            assert_eq!(*departure, at("09:30:00"));
            assert_eq!(*arrival, at("09:40:00"));
            assert_eq!(*nb_of_connections, 1);
        }
        other => panic!("expected a vehicle leg, got {:?}", other),
    }
    Ok(())
}

#[test]
fn trip_change_costs_a_second_vehicle() -> Result<(), Error> {
    init_logger();
    let mut builder = TimetableBuilder::new();
    builder
        .connection(0, 0, 1, at("09:30:00"), 600)
        .connection(1, 1, 2, at("10:30:00"), 600);
    let db = builder.build();

    let profile = transfer_profile(&[]);
    let journeys = JourneyQuery::new(&db, &profile)
        .select_stops(stop(0), stop(2))
        .select_time_frame(at("09:00:00"), at("11:00:00"))
        .calculate_all_journeys()?;

    assert_eq!(journeys.len(), 1);
    assert_eq!(journeys[0].metric().vehicles, 2);

    let legs = summarize(&journeys[0], &db);
    assert_eq!(legs.len(), 3);
    assert!(matches!(legs[0], Leg::Vehicle { .. }));
    assert!(matches!(legs[1], Leg::Walk { .. }));
    assert!(matches!(legs[2], Leg::Vehicle { .. }));
    Ok(())
}

#[test]
fn same_trip_continuation_stays_aboard() -> Result<(), Error> {
    init_logger();
    let mut builder = TimetableBuilder::new();
    builder
        .connection(0, 0, 1, at("09:30:00"), 600)
        .connection(0, 1, 2, at("10:30:00"), 600);
    let db = builder.build();

    let profile = transfer_profile(&[]);
    let journeys = JourneyQuery::new(&db, &profile)
        .select_stops(stop(0), stop(2))
        .select_time_frame(at("09:00:00"), at("11:00:00"))
        .calculate_all_journeys()?;

    assert_eq!(journeys.len(), 1);
    assert_eq!(journeys[0].metric().vehicles, 1);

    // consecutive connections of one trip collapse into a single leg
    let legs = summarize(&journeys[0], &db);
    assert_eq!(legs.len(), 1);
    match &legs[0] {
        Leg::Vehicle {
            departure,
            arrival,
            nb_of_connections,
            ..
        } => {
            assert_eq!(*departure, at("09:30:00"));
            assert_eq!(*arrival, at("10:40:00"));
            assert_eq!(*nb_of_connections, 2);
        }
        other => panic!("expected a vehicle leg, got {:?}", other),
    }
    Ok(())
}

#[test]
fn pareto_equivalent_duplicates_both_survive() -> Result<(), Error> {
    init_logger();
    let mut builder = TimetableBuilder::new();
    // two distinct trips covering the same leg at the same second
    builder
        .connection(0, 0, 1, at("09:30:00"), 600)
        .connection(1, 0, 1, at("09:30:00"), 600);
    let db = builder.build();

    let profile = transfer_profile(&[]);
    let journeys = JourneyQuery::new(&db, &profile)
        .select_stops(stop(0), stop(1))
        .select_time_frame(at("09:00:00"), at("11:00:00"))
        .calculate_all_journeys()?;

    assert_eq!(journeys.len(), 2);
    for journey in &journeys {
        assert_eq!(journey.metric().vehicles, 1);
        assert_eq!(journey.metric().travel_time, 600);
    }
    Ok(())
}

#[test]
fn profile_keeps_every_tradeoff() -> Result<(), Error> {
    init_logger();
    let mut builder = TimetableBuilder::new();
    // direct slow ride against a faster two-legged alternative
    builder
        .connection(0, 0, 2, at("09:00:00"), 7200)
        .connection(1, 0, 1, at("09:05:00"), 600)
        .connection(2, 1, 2, at("09:20:00"), 600);
    let db = builder.build();

    let profile = transfer_profile(&[]);
    let journeys = JourneyQuery::new(&db, &profile)
        .select_stops(stop(0), stop(2))
        .select_time_frame(at("08:30:00"), at("12:00:00"))
        .calculate_all_journeys()?;

    // one vehicle arriving 11:00 against two vehicles arriving 09:30 :
    // incomparable under the profile comparator, both stay
    assert_eq!(journeys.len(), 2);
    let mut vehicle_counts: Vec<u8> = journeys.iter().map(|j| j.metric().vehicles).collect();
    vehicle_counts.sort_unstable();
    assert_eq!(vehicle_counts, vec![1, 2]);

    // no journey dominates another on (vehicles, departure, arrival)
    for a in &journeys {
        for b in &journeys {
            if a.same_path(b) {
                continue;
            }
            let a_dominates = a.metric().vehicles <= b.metric().vehicles
                && a.genesis_time() >= b.genesis_time()
                && a.time() <= b.time()
                && (a.metric().vehicles < b.metric().vehicles
                    || a.genesis_time() > b.genesis_time()
                    || a.time() < b.time());
            assert!(!a_dominates, "{:?} dominates {:?}", a.metric(), b.metric());
        }
    }
    Ok(())
}

#[test]
fn walks_can_bridge_distinct_stops() -> Result<(), Error> {
    init_logger();
    let mut builder = TimetableBuilder::new();
    // ride to stop 1, walk to stop 2, ride on to stop 3
    builder
        .connection(0, 0, 1, at("09:00:00"), 600)
        .connection(1, 2, 3, at("09:30:00"), 600);
    let db = builder.build();

    let profile = transfer_profile(&[(1, 2, 300, 250)]);
    let journeys = JourneyQuery::new(&db, &profile)
        .select_stops(stop(0), stop(3))
        .select_time_frame(at("08:30:00"), at("11:00:00"))
        .calculate_all_journeys()?;

    assert_eq!(journeys.len(), 1);
    let metric = journeys[0].metric();
    assert_eq!(metric.vehicles, 2);
    assert_eq!(metric.walking_distance, 250);
    Ok(())
}

#[test]
fn a_trailing_walk_reaches_the_destination() -> Result<(), Error> {
    init_logger();
    let mut builder = TimetableBuilder::new();
    builder.connection(0, 0, 1, at("09:00:00"), 600);
    let db = builder.build();

    let profile = transfer_profile(&[(1, 2, 300, 250)]);
    let journeys = JourneyQuery::new(&db, &profile)
        .select_stops(stop(0), stop(2))
        .select_time_frame(at("08:30:00"), at("11:00:00"))
        .calculate_all_journeys()?;

    assert_eq!(journeys.len(), 1);
    let legs = summarize(&journeys[0], &db);
    assert_eq!(legs.len(), 2);
    match &legs[1] {
        Leg::Walk {
            from,
            to,
            departure,
            arrival,
            distance_meters,
        } => {
            assert_eq!(*from, stop(1));
            assert_eq!(*to, stop(2));
            assert_eq!(*departure, at("09:10:00"));
            assert_eq!(*arrival, at("09:15:00"));
            assert_eq!(*distance_meters, 250);
        }
        other => panic!("expected a walk leg, got {:?}", other),
    }
    Ok(())
}

#[test]
fn cancelled_connections_are_stored_but_never_used() -> Result<(), Error> {
    init_logger();
    let mut builder = TimetableBuilder::new();
    builder.connection_with_mode(0, 0, 1, at("09:30:00"), 600, Mode::normal().cancelled());
    let db = builder.build();

    // still stored and readable
    assert_eq!(db.nb_of_connections(), 1);
    let (_, stored) = db.get_by_global_id("connection:0").expect("stored");
    assert!(stored.mode.is_cancelled());

    let profile = transfer_profile(&[]);
    let journeys = JourneyQuery::new(&db, &profile)
        .select_stops(stop(0), stop(1))
        .select_time_frame(at("09:00:00"), at("11:00:00"))
        .calculate_all_journeys()?;
    assert!(journeys.is_empty());
    Ok(())
}

#[test]
fn boarding_policy_is_enforced_at_the_scan_boundary() -> Result<(), Error> {
    init_logger();
    // the first leg cannot be boarded : the journey is impossible, but a
    // rider already aboard could still alight downstream
    let mut builder = TimetableBuilder::new();
    builder
        .connection_with_mode(0, 0, 1, at("09:30:00"), 600, Mode::alight_only())
        .connection(0, 1, 2, at("10:00:00"), 600);
    let db = builder.build();

    let profile = transfer_profile(&[]);
    let journeys = JourneyQuery::new(&db, &profile)
        .select_stops(stop(0), stop(2))
        .select_time_frame(at("09:00:00"), at("11:00:00"))
        .calculate_all_journeys()?;
    assert!(journeys.is_empty());

    // boarding the second leg works
    let journeys = JourneyQuery::new(&db, &profile)
        .select_stops(stop(1), stop(2))
        .select_time_frame(at("09:00:00"), at("11:00:00"))
        .calculate_all_journeys()?;
    assert_eq!(journeys.len(), 1);
    Ok(())
}

#[test]
fn connection_filter_prunes_rides() -> Result<(), Error> {
    init_logger();
    let mut builder = TimetableBuilder::new();
    builder
        .connection(0, 0, 1, at("09:30:00"), 600)
        .connection(1, 0, 1, at("10:00:00"), 600);
    let db = builder.build();

    let profile = transfer_profile(&[]);
    let outcome = JourneyQuery::new(&db, &profile)
        .select_stops(stop(0), stop(1))
        .select_time_frame(at("09:00:00"), at("11:00:00"))
        .calculate_all_journeys_with(
            Some(Box::new(|connection| {
                connection.trip.internal.value() != 1
            })),
            None,
        )?;
    assert_eq!(outcome.journeys.len(), 1);
    assert!(!outcome.truncated);
    Ok(())
}

#[test]
fn an_expired_deadline_truncates() -> Result<(), Error> {
    init_logger();
    let mut builder = TimetableBuilder::new();
    builder.connection(0, 0, 1, at("09:30:00"), 600);
    let db = builder.build();

    let profile = transfer_profile(&[]);
    let outcome = JourneyQuery::new(&db, &profile)
        .select_stops(stop(0), stop(1))
        .select_time_frame(at("09:00:00"), at("11:00:00"))
        .calculate_all_journeys_with(None, Some(Box::new(|| true)))?;
    assert!(outcome.truncated);
    assert!(outcome.journeys.is_empty());
    Ok(())
}

#[test]
fn max_transfers_bounds_the_search() -> Result<(), Error> {
    init_logger();
    let mut builder = TimetableBuilder::new();
    builder
        .connection(0, 0, 1, at("09:00:00"), 600)
        .connection(1, 1, 2, at("09:30:00"), 600)
        .connection(2, 2, 3, at("10:00:00"), 600);
    let db = builder.build();

    let mut profile = transfer_profile(&[]);
    profile.params.max_transfers = Some(1);
    let journeys = JourneyQuery::new(&db, &profile)
        .select_stops(stop(0), stop(3))
        .select_time_frame(at("08:30:00"), at("11:00:00"))
        .calculate_all_journeys()?;
    // three vehicles would need two transfers
    assert!(journeys.is_empty());

    profile.params.max_transfers = Some(2);
    let journeys = JourneyQuery::new(&db, &profile)
        .select_stops(stop(0), stop(3))
        .select_time_frame(at("08:30:00"), at("11:00:00"))
        .calculate_all_journeys()?;
    assert_eq!(journeys.len(), 1);
    Ok(())
}

#[test]
fn nonsense_settings_fail_before_the_scan() {
    init_logger();
    let mut builder = TimetableBuilder::new();
    builder.connection(0, 0, 1, at("09:30:00"), 600);
    let db = builder.build();
    let profile = transfer_profile(&[]);

    let query = JourneyQuery::new(&db, &profile)
        .select_stops(stop(0), stop(1))
        .select_time_frame(at("11:00:00"), at("09:00:00"));
    assert!(matches!(
        query.calculate_all_journeys(),
        Err(BadRequest::TimeFrameReversed { .. })
    ));

    let query = JourneyQuery::new(&db, &profile)
        .select_stops(stop(0), stop(42))
        .select_time_frame(at("09:00:00"), at("11:00:00"));
    assert!(matches!(
        query.calculate_all_journeys(),
        Err(BadRequest::UnknownStop(_))
    ));

    let query = JourneyQuery::new(&db, &profile)
        .select_stops(stop(0), stop(0))
        .select_time_frame(at("09:00:00"), at("11:00:00"));
    assert!(matches!(
        query.calculate_all_journeys(),
        Err(BadRequest::IdenticalStops(_))
    ));

    // the only stored departure is at 09:30 : a frame entirely before or
    // entirely after it never intersects the data
    let query = JourneyQuery::new(&db, &profile)
        .select_stops(stop(0), stop(1))
        .select_time_frame(at("06:00:00"), at("07:00:00"));
    assert!(matches!(
        query.calculate_all_journeys(),
        Err(BadRequest::WindowOutOfRange { .. })
    ));
    let query = JourneyQuery::new(&db, &profile)
        .select_stops(stop(0), stop(1))
        .select_time_frame(at("12:00:00"), at("13:00:00"));
    assert!(matches!(
        query.calculate_earliest_arrival(),
        Err(BadRequest::WindowOutOfRange { .. })
    ));

    let query = JourneyQuery::new(&db, &profile).select_stops(stop(0), stop(1));
    assert!(matches!(
        query.calculate_all_journeys(),
        Err(BadRequest::MissingTimeFrame)
    ));

    let unreachable = JourneyQuery::new(&db, &profile)
        .select_stops(stop(1), stop(0))
        .select_time_frame(at("09:00:00"), at("11:00:00"))
        .calculate_all_journeys()
        .expect("valid settings");
    assert!(unreachable.is_empty());
}
