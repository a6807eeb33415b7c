use std::{fs, path::Path};

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{events::FlightEvent, rocket::Rocket};
use crate::core::time::sec_to_td;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Not monotonic time sequence at index {index}, time {time}")]
    TimeNotMonotonic { index: usize, time: f64 },

    #[error("Error deserializing sequence json")]
    Deserialization(#[from] serde_json::Error),

    #[error("Error reading from file")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceEntry {
    pub time_s: f64,
    pub event: FlightEvent,
}

/// A mission sequence of events: the ordered staging timeline of one
/// flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sequence {
    pub name: String,
    pub seq: Vec<SequenceEntry>,
}

/// Dispatches staging events onto a `Rocket` as mission time passes each
/// entry. Every entry fires exactly once, in order.
pub struct FlightSequencer {
    epoch_utc: DateTime<Utc>,
    sequence: Sequence,
    next_entry: usize,
}

impl FlightSequencer {
    /// Entry times must be non-decreasing; `epoch_utc` is mission time
    /// zero, used to anchor the burn clock at ignition.
    pub fn new(epoch_utc: DateTime<Utc>, sequence: Sequence) -> Result<Self, Error> {
        let mut last_time = f64::NEG_INFINITY;
        for (i, entry) in sequence.seq.iter().enumerate() {
            if entry.time_s < last_time {
                return Err(Error::TimeNotMonotonic {
                    index: i,
                    time: entry.time_s,
                });
            }
            last_time = entry.time_s;
        }

        Ok(FlightSequencer {
            epoch_utc,
            sequence,
            next_entry: 0,
        })
    }

    pub fn from_json(epoch_utc: DateTime<Utc>, json_str: &str) -> Result<Self, Error> {
        Self::new(epoch_utc, serde_json::from_str::<Sequence>(json_str)?)
    }

    pub fn from_json_file(epoch_utc: DateTime<Utc>, json_file: &Path) -> Result<Self, Error> {
        Self::from_json(epoch_utc, &fs::read_to_string(json_file)?)
    }

    pub fn pending(&self) -> usize {
        self.sequence.seq.len() - self.next_entry
    }

    /// Dispatch every not-yet-dispatched entry whose time has come, given
    /// mission time `t_s` seconds past the epoch.
    pub fn step(&mut self, t_s: f64, rocket: &mut Rocket) {
        while self.next_entry < self.sequence.seq.len()
            && self.sequence.seq[self.next_entry].time_s <= t_s
        {
            let entry = &self.sequence.seq[self.next_entry];

            info!(
                "[{}] t={:.3} s: {}",
                self.sequence.name,
                entry.time_s,
                entry.event.as_ref()
            );
            Self::execute(self.epoch_utc, entry, rocket);

            self.next_entry += 1;
        }
    }

    fn execute(epoch_utc: DateTime<Utc>, entry: &SequenceEntry, rocket: &mut Rocket) {
        match &entry.event {
            FlightEvent::IgnitionEngine { countup_time_init_s } => {
                rocket.ignition_engine(epoch_utc + sec_to_td(entry.time_s), *countup_time_init_s);
            }
            FlightEvent::CutoffEngine => rocket.cutoff_engine(),
            FlightEvent::DeSpin => rocket.de_spin(),
            FlightEvent::JettisonFairing { mass_kg } => rocket.jettison_fairing(*mass_kg),
            FlightEvent::SeparateUpperStage { mass_kg } => rocket.separate_upper_stage(*mass_kg),
            FlightEvent::OpenParachute => rocket.open_parachute(),
        }
    }
}
