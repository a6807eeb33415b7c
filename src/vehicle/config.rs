use std::{fs, path::Path};

use anyhow::Context;
use log::{debug, info};
use num_traits::Pow;
use serde::Deserialize;
use thiserror::Error;

use super::{
    engine::{ConstantThrustEngine, EngineError, RocketEngine, TabulatedEngine},
    rocket::{Rocket, RocketParams},
};
use crate::math::interp::{InterpMode, Table1d};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Error deserializing rocket config")]
    Deserialize(#[from] toml::de::Error),

    #[error("Error reading config file")]
    Io(#[from] std::io::Error),

    #[error("Table '{name}' has {x_len} breakpoints but {y_len} values")]
    LengthMismatch {
        name: String,
        x_len: usize,
        y_len: usize,
    },

    #[error("Table '{name}' is empty")]
    EmptyTable { name: String },

    #[error("Unknown engine type: {0}")]
    UnknownEngineType(String),

    #[error("Missing [engine.{0}] section for engine type '{0}'")]
    MissingEngineSection(&'static str),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}

/// A physical property in the config file: either a single constant or a
/// breakpoint table.
///
/// ```toml
/// ca = 0.3
/// cna = { x = [0.0, 0.8, 1.2], y = [7.0, 7.5, 9.0] }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TableSpec {
    Constant(f64),
    Breakpoints { x: Vec<f64>, y: Vec<f64> },
}

impl TableSpec {
    fn into_table(self, name: &str) -> Result<Table1d, Error> {
        match self {
            TableSpec::Constant(value) => Ok(Table1d::constant(name, value)),
            TableSpec::Breakpoints { x, y } => {
                if x.is_empty() || y.is_empty() {
                    return Err(Error::EmptyTable {
                        name: name.to_string(),
                    });
                }
                if x.len() != y.len() {
                    return Err(Error::LengthMismatch {
                        name: name.to_string(),
                        x_len: x.len(),
                        y_len: y.len(),
                    });
                }

                Ok(Table1d::new(name, x, y, InterpMode::FirstLast))
            }
        }
    }

    /// For angular quantities configured in degrees.
    fn into_table_rad(self, name: &str) -> Result<Table1d, Error> {
        let deg = match self {
            TableSpec::Constant(value) => TableSpec::Constant(value.to_radians()),
            TableSpec::Breakpoints { x, y } => TableSpec::Breakpoints {
                x,
                y: y.into_iter().map(f64::to_radians).collect(),
            },
        };

        deg.into_table(name)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeometryConfig {
    pub diameter_m: f64,
    pub length_m: f64,
    pub length_thrust_m: f64,
    #[serde(default)]
    pub fin_cant_deg: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MassConfig {
    pub inert_kg: f64,
    pub propellant_kg: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AeroConfig {
    pub length_cp: TableSpec,
    pub ca: TableSpec,
    /// Defaults to the powered CA table when absent.
    pub ca_burnout: Option<TableSpec>,
    pub cna: TableSpec,
    pub cld: TableSpec,
    pub clp: TableSpec,
    pub cmq: TableSpec,
    pub cnr: TableSpec,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InertiaConfig {
    pub moi_xx: TableSpec,
    pub moi_yy: TableSpec,
    pub moi_zz: TableSpec,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttitudeProgramConfig {
    pub azimuth_deg: TableSpec,
    pub elevation_deg: TableSpec,
    pub roll_deg: TableSpec,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ParachuteConfig {
    #[serde(default)]
    pub cds_m2: Vec<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConstantEngineConfig {
    pub total_impulse_ns: f64,
    pub thrust_duration_s: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TabulatedEngineConfig {
    pub json_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub engine_type: String,
    pub constant: Option<ConstantEngineConfig>,
    pub tabulated: Option<TabulatedEngineConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RocketConfig {
    pub geometry: GeometryConfig,
    pub mass: MassConfig,
    pub length_cg: TableSpec,
    pub inertia: InertiaConfig,
    pub aero: AeroConfig,
    pub attitude_program: AttitudeProgramConfig,
    #[serde(default)]
    pub parachute: ParachuteConfig,
    pub engine: EngineConfig,
}

impl RocketConfig {
    pub fn from_toml(toml_str: &str) -> Result<Self, Error> {
        Ok(toml::from_str(toml_str)?)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, Error> {
        Self::from_toml(&fs::read_to_string(path)?)
    }

    /// Wire up a `Rocket` from this configuration.
    pub fn build(self) -> Result<Rocket, Error> {
        let engine: Box<dyn RocketEngine + Send> = match self.engine.engine_type.as_str() {
            "constant" => {
                let config = self
                    .engine
                    .constant
                    .ok_or(Error::MissingEngineSection("constant"))?;

                Box::new(ConstantThrustEngine::from_impulse(
                    config.total_impulse_ns,
                    config.thrust_duration_s,
                ))
            }
            "tabulated" => {
                let config = self
                    .engine
                    .tabulated
                    .ok_or(Error::MissingEngineSection("tabulated"))?;

                Box::new(TabulatedEngine::from_json_file(Path::new(
                    &config.json_path,
                ))?)
            }
            unknown => return Err(Error::UnknownEngineType(unknown.to_string())),
        };

        debug!("Selected '{}' engine", self.engine.engine_type);

        let diameter_m = self.geometry.diameter_m;
        let area_m2 = core::f64::consts::PI * (diameter_m / 2.0).pow(2.0);

        let ca_src = self.aero.ca.clone().into_table("ca")?;
        let ca_burnout_src = match self.aero.ca_burnout {
            Some(spec) => spec.into_table("ca_burnout")?,
            None => self.aero.ca.into_table("ca_burnout")?,
        };

        let params = RocketParams {
            length_thrust_m: self.geometry.length_thrust_m,
            diameter_m,
            area_m2,
            length_m: self.geometry.length_m,
            fin_cant_rad: self.geometry.fin_cant_deg.to_radians(),
            inert_mass_kg: self.mass.inert_kg,
            propellant_mass_kg: self.mass.propellant_kg,
            length_cg_src: self.length_cg.into_table("length_cg")?,
            length_cp_src: self.aero.length_cp.into_table("length_cp")?,
            ca_src,
            ca_burnout_src,
            cna_src: self.aero.cna.into_table("cna")?,
            cld_src: self.aero.cld.into_table("cld")?,
            clp_src: self.aero.clp.into_table("clp")?,
            cmq_src: self.aero.cmq.into_table("cmq")?,
            cnr_src: self.aero.cnr.into_table("cnr")?,
            moi_xx_src: self.inertia.moi_xx.into_table("moi_xx")?,
            moi_yy_src: self.inertia.moi_yy.into_table("moi_yy")?,
            moi_zz_src: self.inertia.moi_zz.into_table("moi_zz")?,
            azimuth_src: self.attitude_program.azimuth_deg.into_table_rad("azimuth")?,
            elevation_src: self
                .attitude_program
                .elevation_deg
                .into_table_rad("elevation")?,
            roll_src: self.attitude_program.roll_deg.into_table_rad("roll")?,
            cds_parachute_m2: self.parachute.cds_m2,
        };

        Ok(Rocket::new(params, engine))
    }
}

/// Read a TOML vehicle configuration and assemble the rocket it describes.
pub fn load_rocket(path: &Path) -> anyhow::Result<Rocket> {
    info!("Reading rocket config from '{}'", path.display());

    RocketConfig::from_toml_file(path)
        .and_then(RocketConfig::build)
        .with_context(|| format!("Building rocket from '{}'", path.display()))
}
