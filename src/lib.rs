pub use chrono;
pub use chrono::NaiveDateTime;
pub use tracing;

pub mod connections_db;
pub mod engine;
pub mod journey;
pub mod model;
pub mod request;
pub mod response;
pub mod time;
pub mod transfers;

pub use connections_db::{ConnectionsDb, DepartureCursor, LoadError};
pub use engine::guesser::{MetricGuesser, TeleportGuesser};
pub use engine::metric::{
    ArrivalComparator, ChainedComparator, DepartureComparator, Dominance, JourneyComparator,
    Metric, ParetoComparator, ProfileComparator, TransferMetric,
};
pub use engine::pareto_front::{FrontInsertion, ParetoFront};
pub use engine::profile_scan::{ProfiledConnectionScan, ScanOutcome};
pub use engine::simple_scan::{EarliestArrivalScan, LatestDepartureScan};
pub use journey::{Journey, Link};
pub use model::{Connection, ConnectionId, DatabaseId, InternalId, Mode, StopId, TripId};
pub use request::{BadRequest, JourneyQuery, Profile, ScanParams, TransferProfile};
pub use response::{summarize, Leg};
pub use time::{PositiveDuration, Timestamp};
pub use transfers::{
    FirstLastMile, FixedTransfers, NoTransfers, TransferCache, TransferGenerator, Walk,
};
