use serde::{Deserialize, Serialize};
use strum::AsRefStr;

/// Staging commands dispatched by the mission timeline. Each variant maps
/// 1:1 onto a handler on `Rocket`; the enum exists only as the sequencer's
/// wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, AsRefStr)]
#[serde(tag = "type")]
pub enum FlightEvent {
    IgnitionEngine { countup_time_init_s: f64 },
    CutoffEngine,
    DeSpin,
    JettisonFairing { mass_kg: f64 },
    SeparateUpperStage { mass_kg: f64 },
    OpenParachute,
}
