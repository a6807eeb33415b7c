use std::{fs, path::Path};

use log::debug;
use serde_json::Value;
use thiserror::Error;

use crate::math::interp::{InterpMode, Table1d};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Error deserializing engine json")]
    Deserialization(#[from] serde_json::Error),

    #[error("Error reading engine file")]
    Io(#[from] std::io::Error),

    #[error("Engine table '{0}' is missing or malformed")]
    MissingTable(&'static str),
}

/// Combustion state machine driven once per integration step.
///
/// `update` re-evaluates burning status, thrust, mass flow and gimbal
/// deflections for the given countup time. It mutates internal combustion
/// state: callers must invoke it at most once per simulated timestep.
pub trait RocketEngine {
    fn update(&mut self, countup_time_s: f64, ambient_pressure_pa: f64, propellant_mass_kg: f64);

    fn ignite(&mut self);

    fn cutoff(&mut self);

    fn burning(&self) -> bool;

    fn thrust_n(&self) -> f64;

    fn mass_flow_kg_s(&self) -> f64;

    fn gimbal_angle_y_rad(&self) -> f64;

    fn gimbal_angle_z_rad(&self) -> f64;
}

/// Constant-thrust engine with a fixed burn duration. No gimbal program,
/// no propellant accounting.
pub struct ConstantThrustEngine {
    duration_s: f64,
    thrust_setpoint_n: f64,

    ignited: bool,
    cut_off: bool,
    burning: bool,
    thrust_n: f64,
}

impl ConstantThrustEngine {
    pub fn from_impulse(total_impulse_ns: f64, duration_s: f64) -> Self {
        Self::from_thrust(total_impulse_ns / duration_s, duration_s)
    }

    pub fn from_thrust(thrust_n: f64, duration_s: f64) -> Self {
        ConstantThrustEngine {
            duration_s,
            thrust_setpoint_n: thrust_n,
            ignited: false,
            cut_off: false,
            burning: false,
            thrust_n: 0.0,
        }
    }
}

impl RocketEngine for ConstantThrustEngine {
    fn update(&mut self, countup_time_s: f64, _ambient_pressure_pa: f64, _propellant_mass_kg: f64) {
        self.burning = self.ignited
            && !self.cut_off
            && countup_time_s >= 0.0
            && countup_time_s <= self.duration_s;

        self.thrust_n = if self.burning {
            self.thrust_setpoint_n
        } else {
            0.0
        };
    }

    fn ignite(&mut self) {
        debug!("Constant thrust engine ignited");
        self.ignited = true;
    }

    fn cutoff(&mut self) {
        debug!("Constant thrust engine cut off");
        self.cut_off = true;
        self.burning = false;
        self.thrust_n = 0.0;
    }

    fn burning(&self) -> bool {
        self.burning
    }

    fn thrust_n(&self) -> f64 {
        self.thrust_n
    }

    fn mass_flow_kg_s(&self) -> f64 {
        0.0
    }

    fn gimbal_angle_y_rad(&self) -> f64 {
        0.0
    }

    fn gimbal_angle_z_rad(&self) -> f64 {
        0.0
    }
}

/// Engine defined by time tables for thrust, mass flow and the two gimbal
/// deflections, with ambient-pressure thrust compensation through the
/// nozzle exit area.
pub struct TabulatedEngine {
    thrust_src: Table1d,
    mass_flow_src: Table1d,
    gimbal_y_src: Table1d,
    gimbal_z_src: Table1d,

    burn_duration_s: f64,
    nozzle_exit_area_m2: f64,
    reference_pressure_pa: f64,

    ignited: bool,
    cut_off: bool,
    burning: bool,
    thrust_n: f64,
    mass_flow_kg_s: f64,
    gimbal_angle_y_rad: f64,
    gimbal_angle_z_rad: f64,
}

impl TabulatedEngine {
    pub fn new(
        thrust_src: Table1d,
        mass_flow_src: Table1d,
        gimbal_y_src: Table1d,
        gimbal_z_src: Table1d,
        burn_duration_s: f64,
        nozzle_exit_area_m2: f64,
        reference_pressure_pa: f64,
    ) -> Self {
        TabulatedEngine {
            thrust_src,
            mass_flow_src,
            gimbal_y_src,
            gimbal_z_src,
            burn_duration_s,
            nozzle_exit_area_m2,
            reference_pressure_pa,
            ignited: false,
            cut_off: false,
            burning: false,
            thrust_n: 0.0,
            mass_flow_kg_s: 0.0,
            gimbal_angle_y_rad: 0.0,
            gimbal_angle_z_rad: 0.0,
        }
    }

    /// Parse the pair-array table format:
    ///
    /// ```json
    /// {
    ///     "burn_duration": 12.0,
    ///     "nozzle_exit_area": 0.02,
    ///     "reference_pressure": 101325.0,
    ///     "thrust": [[0.0, 0.0], [0.1, 1200.0], [12.0, 1100.0]],
    ///     "mass_flow": [[0.0, 0.0], [0.1, 0.55], [12.0, 0.50]],
    ///     "gimbal_y": [[0.0, 0.0]],
    ///     "gimbal_z": [[0.0, 0.0]]
    /// }
    /// ```
    ///
    /// `thrust` and `mass_flow` are required. Gimbal programs default to
    /// zero deflection, `burn_duration` to the last thrust breakpoint,
    /// `nozzle_exit_area` to 0 and `reference_pressure` to sea level.
    pub fn from_json(json_str: &str) -> Result<Self, EngineError> {
        let data: Value = serde_json::from_str(json_str)?;

        let pair_table = |key: &'static str| -> Option<(Vec<f64>, Vec<f64>)> {
            let entries = data[key].as_array()?;

            let mut time = Vec::new();
            let mut value = Vec::new();
            for entry in entries {
                if let Value::Array(pair) = entry {
                    if pair.len() == 2 {
                        if let (Some(t_f64), Some(v_f64)) = (pair[0].as_f64(), pair[1].as_f64()) {
                            time.push(t_f64);
                            value.push(v_f64);
                        }
                    }
                }
            }

            if time.is_empty() {
                None
            } else {
                Some((time, value))
            }
        };

        let table = |key: &'static str| -> Result<Table1d, EngineError> {
            let (time, value) = pair_table(key).ok_or(EngineError::MissingTable(key))?;
            Ok(Table1d::new(key, time, value, InterpMode::FirstLast))
        };

        let optional_table = |key: &'static str| -> Table1d {
            match pair_table(key) {
                Some((time, value)) => Table1d::new(key, time, value, InterpMode::FirstLast),
                None => Table1d::constant(key, 0.0),
            }
        };

        let thrust_src = table("thrust")?;
        let mass_flow_src = table("mass_flow")?;
        let gimbal_y_src = optional_table("gimbal_y");
        let gimbal_z_src = optional_table("gimbal_z");

        let last_thrust_time = data["thrust"]
            .as_array()
            .and_then(|a| a.last())
            .and_then(|p| p.get(0))
            .and_then(|t| t.as_f64())
            .unwrap_or(0.0);

        let burn_duration_s = data["burn_duration"].as_f64().unwrap_or(last_thrust_time);
        let nozzle_exit_area_m2 = data["nozzle_exit_area"].as_f64().unwrap_or(0.0);
        let reference_pressure_pa = data["reference_pressure"].as_f64().unwrap_or(101325.0);

        Ok(Self::new(
            thrust_src,
            mass_flow_src,
            gimbal_y_src,
            gimbal_z_src,
            burn_duration_s,
            nozzle_exit_area_m2,
            reference_pressure_pa,
        ))
    }

    pub fn from_json_file(path: &Path) -> Result<Self, EngineError> {
        Self::from_json(&fs::read_to_string(path)?)
    }
}

impl RocketEngine for TabulatedEngine {
    fn update(&mut self, countup_time_s: f64, ambient_pressure_pa: f64, propellant_mass_kg: f64) {
        self.burning = self.ignited
            && !self.cut_off
            && countup_time_s >= 0.0
            && countup_time_s <= self.burn_duration_s
            && propellant_mass_kg > 0.0;

        if self.burning {
            let compensation =
                (self.reference_pressure_pa - ambient_pressure_pa) * self.nozzle_exit_area_m2;
            self.thrust_n = (self.thrust_src.evaluate(countup_time_s) + compensation).max(0.0);
            self.mass_flow_kg_s = self.mass_flow_src.evaluate(countup_time_s);
            self.gimbal_angle_y_rad = self.gimbal_y_src.evaluate(countup_time_s);
            self.gimbal_angle_z_rad = self.gimbal_z_src.evaluate(countup_time_s);
        } else {
            self.thrust_n = 0.0;
            self.mass_flow_kg_s = 0.0;
            self.gimbal_angle_y_rad = 0.0;
            self.gimbal_angle_z_rad = 0.0;
        }
    }

    fn ignite(&mut self) {
        debug!("Tabulated engine ignited");
        self.ignited = true;
    }

    fn cutoff(&mut self) {
        debug!("Tabulated engine cut off");
        self.cut_off = true;
        self.burning = false;
        self.thrust_n = 0.0;
        self.mass_flow_kg_s = 0.0;
    }

    fn burning(&self) -> bool {
        self.burning
    }

    fn thrust_n(&self) -> f64 {
        self.thrust_n
    }

    fn mass_flow_kg_s(&self) -> f64 {
        self.mass_flow_kg_s
    }

    fn gimbal_angle_y_rad(&self) -> f64 {
        self.gimbal_angle_y_rad
    }

    fn gimbal_angle_z_rad(&self) -> f64 {
        self.gimbal_angle_z_rad
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const P0: f64 = 101325.0;

    #[test]
    fn test_constant_engine_burn_window() {
        let mut engine = ConstantThrustEngine::from_impulse(1000.0, 10.0);

        engine.update(0.0, P0, 1.0);
        assert!(!engine.burning());
        assert_eq!(engine.thrust_n(), 0.0);

        engine.ignite();
        engine.update(0.0, P0, 1.0);
        assert!(engine.burning());
        assert_relative_eq!(engine.thrust_n(), 100.0);

        engine.update(10.0, P0, 1.0);
        assert!(engine.burning());

        engine.update(10.1, P0, 1.0);
        assert!(!engine.burning());
        assert_eq!(engine.thrust_n(), 0.0);
    }

    #[test]
    fn test_constant_engine_cutoff_is_permanent() {
        let mut engine = ConstantThrustEngine::from_thrust(50.0, 10.0);

        engine.ignite();
        engine.update(1.0, P0, 1.0);
        assert!(engine.burning());

        engine.cutoff();
        assert!(!engine.burning());

        engine.update(2.0, P0, 1.0);
        assert!(!engine.burning());
        assert_eq!(engine.thrust_n(), 0.0);
    }

    #[test]
    fn test_from_json_pair_arrays() {
        let json_str = r#"{
            "burn_duration": 12.0,
            "nozzle_exit_area": 0.02,
            "reference_pressure": 101325.0,
            "thrust": [[0.0, 0.0], [0.1, 1200.0], [12.0, 1100.0]],
            "mass_flow": [[0.0, 0.0], [0.1, 0.55], [12.0, 0.50]],
            "gimbal_y": [[0.0, 0.0], [12.0, 0.1]]
        }"#;

        let mut engine = TabulatedEngine::from_json(json_str).unwrap();

        engine.ignite();
        engine.update(0.1, P0, 5.0);
        assert!(engine.burning());
        assert_relative_eq!(engine.thrust_n(), 1200.0);
        assert_relative_eq!(engine.mass_flow_kg_s(), 0.55);
        // Missing gimbal_z table defaults to zero deflection
        assert_eq!(engine.gimbal_angle_z_rad(), 0.0);
    }

    #[test]
    fn test_from_json_requires_thrust() {
        let json_str = r#"{ "mass_flow": [[0.0, 0.5]] }"#;

        assert!(matches!(
            TabulatedEngine::from_json(json_str),
            Err(EngineError::MissingTable("thrust"))
        ));
    }

    #[test]
    fn test_pressure_compensation_raises_thrust_in_vacuum() {
        let json_str = r#"{
            "thrust": [[0.0, 1000.0], [10.0, 1000.0]],
            "mass_flow": [[0.0, 0.5]],
            "nozzle_exit_area": 0.05,
            "reference_pressure": 101325.0
        }"#;

        let mut engine = TabulatedEngine::from_json(json_str).unwrap();
        engine.ignite();

        engine.update(1.0, P0, 5.0);
        let thrust_sea_level = engine.thrust_n();

        engine.update(1.0, 0.0, 5.0);
        let thrust_vacuum = engine.thrust_n();

        assert_relative_eq!(thrust_sea_level, 1000.0);
        assert_relative_eq!(thrust_vacuum, 1000.0 + 101325.0 * 0.05);
    }

    #[test]
    fn test_burnout_on_propellant_exhaustion() {
        let json_str = r#"{
            "thrust": [[0.0, 1000.0], [10.0, 1000.0]],
            "mass_flow": [[0.0, 0.5]]
        }"#;

        let mut engine = TabulatedEngine::from_json(json_str).unwrap();
        engine.ignite();

        engine.update(1.0, P0, 1.0);
        assert!(engine.burning());

        engine.update(2.0, P0, 0.0);
        assert!(!engine.burning());
        assert_eq!(engine.thrust_n(), 0.0);
        assert_eq!(engine.mass_flow_kg_s(), 0.0);
    }
}
