pub mod dynamics;
pub mod error;
pub mod events;
pub mod geojson_area;
pub mod lifecycle;
pub mod models;
pub mod path_generator;
pub mod rules;
pub mod simulation;
pub mod spatial;

pub use dynamics::{BatteryModel, DroneProfile, DynamicsState, FlightDynamics};
pub use error::{SimError, SimResult};
pub use events::{
    MissionProgressEvent, MissionStatus, MissionStatusEvent, SimEvent, TelemetryEvent,
};
pub use geojson_area::{area_from_geojson, area_from_geojson_str, area_from_geojson_value, AreaError};
pub use lifecycle::LifecycleState;
pub use models::{
    BoundingBox, FlightPath, FlightPattern, GeoPoint, MissionDescriptor, MissionOutcome,
    OutcomeStatus, ParsePatternError, SurveyArea, Waypoint,
};
pub use path_generator::{generate, PathParams};
pub use rules::SimRules;
pub use simulation::{MissionSim, SimSnapshot};
pub use spatial::haversine_distance;
