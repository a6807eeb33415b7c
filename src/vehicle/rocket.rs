use chrono::{DateTime, TimeDelta, Utc};
use nalgebra::{Matrix3, Vector3, Vector4, matrix, vector};

use super::{engine::RocketEngine, mass::MassProperties};
use crate::{core::time::SequenceClock, math::interp::Table1d};

/// Immutable physical description of the vehicle: geometry, launch masses
/// and every interpolation source. Set once at configuration time and
/// treated as read-only for the rest of the flight.
///
/// Sources indexed by countup time: center of gravity, the three moments
/// of inertia, the attitude program. Sources indexed by Mach number: center
/// of pressure and all aerodynamic coefficients. Axial force is the one
/// property with two mutually exclusive tables, `ca_src` for the powered
/// phase and `ca_burnout_src` for coast.
#[derive(Debug, Clone)]
pub struct RocketParams {
    pub length_thrust_m: f64,
    pub diameter_m: f64,
    pub area_m2: f64,
    pub length_m: f64,
    pub fin_cant_rad: f64,

    pub inert_mass_kg: f64,
    pub propellant_mass_kg: f64,

    pub length_cg_src: Table1d,
    pub length_cp_src: Table1d,

    pub ca_src: Table1d,
    pub ca_burnout_src: Table1d,
    pub cna_src: Table1d,
    pub cld_src: Table1d,
    pub clp_src: Table1d,
    pub cmq_src: Table1d,
    pub cnr_src: Table1d,

    pub moi_xx_src: Table1d,
    pub moi_yy_src: Table1d,
    pub moi_zz_src: Table1d,

    pub azimuth_src: Table1d,
    pub elevation_src: Table1d,
    pub roll_src: Table1d,

    pub cds_parachute_m2: Vec<f64>,
}

/// Canonical mutable physical state of one vehicle, plus the property
/// getters the integrator queries every step and the one-way staging
/// handlers the mission sequencer triggers.
///
/// Single-threaded by contract: getters must not race staging handlers,
/// and `thrust_b_n` must be called at most once per integration step.
pub struct Rocket {
    params: RocketParams,
    engine: Box<dyn RocketEngine + Send>,

    pub mass: MassProperties,
    burn_clock: Option<SequenceClock>,

    // Values frozen at burnout: refreshed from their sources only while
    // the engine reports burning.
    length_cg_m: f64,
    inertia_tensor_kgm2: Matrix3<f64>,

    // Current-state slots written by the integrator / attitude dynamics.
    pub quaternion_dot: Vector4<f64>,
    pub angular_velocity_rad_s: Vector3<f64>,
    pub angular_acceleration_rad_s2: Vector3<f64>,
    pub angle_of_attack_rad: f64,
    pub sideslip_angle_rad: f64,
    pub dynamic_pressure_pa: f64,

    cds_parachute_m2: f64,
    count_open_parachute: usize,
}

impl Rocket {
    pub fn new(params: RocketParams, engine: Box<dyn RocketEngine + Send>) -> Self {
        let length_cg_m = params.length_cg_src.evaluate(0.0);
        let inertia_tensor_kgm2 = Self::diagonal_inertia(&params, 0.0);
        let mass = MassProperties::new(params.inert_mass_kg, params.propellant_mass_kg);

        Rocket {
            params,
            engine,
            mass,
            burn_clock: None,
            length_cg_m,
            inertia_tensor_kgm2,
            quaternion_dot: Vector4::zeros(),
            angular_velocity_rad_s: Vector3::zeros(),
            angular_acceleration_rad_s2: Vector3::zeros(),
            angle_of_attack_rad: 0.0,
            sideslip_angle_rad: 0.0,
            dynamic_pressure_pa: 0.0,
            cds_parachute_m2: 0.0,
            count_open_parachute: 0,
        }
    }

    pub fn params(&self) -> &RocketParams {
        &self.params
    }

    pub fn burning(&self) -> bool {
        self.engine.burning()
    }

    /// Propellant consumption rate reported by the engine at the last
    /// `thrust_b_n` update, for the integrator's mass bookkeeping.
    pub fn mass_flow_kg_s(&self) -> f64 {
        self.engine.mass_flow_kg_s()
    }

    /// Elapsed time since ignition; 0.0 until the engine has been ignited.
    pub fn countup_time_s(&self) -> f64 {
        self.burn_clock
            .as_ref()
            .map_or(0.0, |clock| clock.countup_time_s())
    }

    pub fn burn_clock(&self) -> Option<&SequenceClock> {
        self.burn_clock.as_ref()
    }

    /// Advance the burn clock by the master clock's step. No-op before
    /// ignition.
    pub fn advance_clock(&mut self, dt: TimeDelta) {
        if let Some(clock) = &mut self.burn_clock {
            clock.advance(dt);
        }
    }

    fn diagonal_inertia(params: &RocketParams, t: f64) -> Matrix3<f64> {
        matrix![
            params.moi_xx_src.evaluate(t), 0.0, 0.0;
            0.0, params.moi_yy_src.evaluate(t), 0.0;
            0.0, 0.0, params.moi_zz_src.evaluate(t)
        ]
    }

    /// Center of gravity from the nose. Tracks the time source while the
    /// engine burns; frozen at its last powered value after burnout.
    pub fn length_cg_m(&mut self) -> f64 {
        if self.engine.burning() {
            self.length_cg_m = self.params.length_cg_src.evaluate(self.countup_time_s());
        }

        self.length_cg_m
    }

    /// Center of pressure from the nose. No burn-phase dependency.
    pub fn length_cp_m(&self, mach_number: f64) -> f64 {
        self.params.length_cp_src.evaluate(mach_number)
    }

    /// Axial force coefficient, dispatched between the powered and the
    /// burnout correlation on the engine's burning flag.
    pub fn ca(&self, mach_number: f64) -> f64 {
        if self.engine.burning() {
            self.params.ca_src.evaluate(mach_number)
        } else {
            self.params.ca_burnout_src.evaluate(mach_number)
        }
    }

    /// Normal force coefficient slope.
    pub fn cna(&self, mach_number: f64) -> f64 {
        self.params.cna_src.evaluate(mach_number)
    }

    /// Roll moment coefficient from fin cant / control deflection.
    pub fn cld(&self, mach_number: f64) -> f64 {
        self.params.cld_src.evaluate(mach_number)
    }

    /// Roll damping derivative. Damping opposes rotation, so the value is
    /// non-positive by convention: a positive table value is negated.
    pub fn clp(&self, mach_number: f64) -> f64 {
        let mut clp = self.params.clp_src.evaluate(mach_number);
        if clp > 0.0 {
            clp *= -1.0;
        }

        clp
    }

    /// Pitch damping derivative, non-positive by the same convention.
    pub fn cmq(&self, mach_number: f64) -> f64 {
        let mut cmq = self.params.cmq_src.evaluate(mach_number);
        if cmq > 0.0 {
            cmq *= -1.0;
        }

        cmq
    }

    /// Yaw damping derivative, non-positive by the same convention.
    pub fn cnr(&self, mach_number: f64) -> f64 {
        let mut cnr = self.params.cnr_src.evaluate(mach_number);
        if cnr > 0.0 {
            cnr *= -1.0;
        }

        cnr
    }

    /// Inertia tensor about the body axes. Rebuilt from the per-axis time
    /// sources while burning, frozen afterwards. Off-diagonal terms stay
    /// zero.
    pub fn inertia_tensor_kgm2(&mut self) -> Matrix3<f64> {
        if self.engine.burning() {
            self.inertia_tensor_kgm2 = Self::diagonal_inertia(&self.params, self.countup_time_s());
        }

        self.inertia_tensor_kgm2
    }

    /// Commanded open-loop attitude (azimuth, elevation, roll) at the
    /// current countup time.
    pub fn attitude_program_rad(&self) -> Vector3<f64> {
        let t = self.countup_time_s();

        vector![
            self.params.azimuth_src.evaluate(t),
            self.params.elevation_src.evaluate(t),
            self.params.roll_src.evaluate(t)
        ]
    }

    /// Body-frame thrust vector for the current instant.
    ///
    /// Delegates to the engine's `update`, which mutates combustion state:
    /// call at most once per integration step. Returns the zero vector
    /// when not burning.
    pub fn thrust_b_n(&mut self, ambient_pressure_pa: f64) -> Vector3<f64> {
        self.engine.update(
            self.countup_time_s(),
            ambient_pressure_pa,
            self.mass.propellant_kg,
        );

        if self.engine.burning() {
            let gimbal_y = self.engine.gimbal_angle_y_rad();
            let gimbal_z = self.engine.gimbal_angle_z_rad();

            self.engine.thrust_n()
                * vector![
                    gimbal_y.cos() * gimbal_y.cos(),
                    gimbal_z.sin(),
                    -gimbal_y.sin()
                ]
        } else {
            Vector3::zeros()
        }
    }

    /// Total effective drag area contributed by deployed parachute stages.
    pub fn cds_parachute_m2(&self) -> f64 {
        self.cds_parachute_m2
    }

    pub fn parachute_deployments(&self) -> usize {
        self.count_open_parachute
    }

    /// (Re)create the burn clock anchored at the given UTC epoch and start
    /// combustion. Expected once per flight; a repeated call resets the
    /// clock.
    pub fn ignition_engine(&mut self, utc_ignition: DateTime<Utc>, countup_time_init_s: f64) {
        self.burn_clock = Some(SequenceClock::new(utc_ignition, countup_time_init_s));
        self.engine.ignite();
    }

    /// Stop combustion. CG and inertia freeze implicitly: their getters
    /// observe `burning == false` and stop re-evaluating.
    pub fn cutoff_engine(&mut self) {
        self.engine.cutoff();
    }

    /// Zero the roll-axis angular velocity and acceleration; pitch and yaw
    /// are untouched.
    pub fn de_spin(&mut self) {
        self.angular_acceleration_rad_s2[0] = 0.0;
        self.angular_velocity_rad_s[0] = 0.0;
    }

    pub fn jettison_fairing(&mut self, fairing_mass_kg: f64) {
        self.mass.drop_inert(fairing_mass_kg);
    }

    pub fn separate_upper_stage(&mut self, upper_stage_mass_kg: f64) {
        self.mass.drop_inert(upper_stage_mass_kg);
    }

    /// Add the next configured CdS increment to the total drag area. The
    /// deployment counter advances unconditionally: calls beyond the
    /// configured stages are silent no-ops on the total.
    pub fn open_parachute(&mut self) {
        if self.count_open_parachute < self.params.cds_parachute_m2.len() {
            self.cds_parachute_m2 += self.params.cds_parachute_m2[self.count_open_parachute];
        }
        self.count_open_parachute += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::interp::InterpMode;
    use crate::vehicle::engine::{ConstantThrustEngine, TabulatedEngine};
    use crate::vehicle::mass::INERT_MASS_FLOOR_KG;
    use approx::assert_relative_eq;

    const P0: f64 = 101325.0;

    fn table(name: &str, x: Vec<f64>, y: Vec<f64>) -> Table1d {
        Table1d::new(name, x, y, InterpMode::FirstLast)
    }

    fn test_params() -> RocketParams {
        RocketParams {
            length_thrust_m: 8.0,
            diameter_m: 0.5,
            area_m2: core::f64::consts::PI * 0.25 * 0.25,
            length_m: 9.0,
            fin_cant_rad: 0.0,
            inert_mass_kg: 100.0,
            propellant_mass_kg: 50.0,
            length_cg_src: table("length_cg", vec![0.0, 10.0], vec![5.0, 4.0]),
            length_cp_src: table("length_cp", vec![0.0, 2.0], vec![6.0, 6.4]),
            ca_src: Table1d::constant("ca", 0.3),
            ca_burnout_src: Table1d::constant("ca_burnout", 0.5),
            cna_src: Table1d::constant("cna", 8.0),
            cld_src: Table1d::constant("cld", 0.02),
            clp_src: Table1d::constant("clp", 0.8),
            cmq_src: table("cmq", vec![0.0, 2.0], vec![-4.0, -6.0]),
            cnr_src: table("cnr", vec![0.0, 2.0], vec![4.0, 6.0]),
            moi_xx_src: table("moi_xx", vec![0.0, 10.0], vec![12.0, 10.0]),
            moi_yy_src: table("moi_yy", vec![0.0, 10.0], vec![900.0, 800.0]),
            moi_zz_src: table("moi_zz", vec![0.0, 10.0], vec![900.0, 800.0]),
            azimuth_src: table("azimuth", vec![0.0, 10.0], vec![0.0, 0.5]),
            elevation_src: table("elevation", vec![0.0, 10.0], vec![1.5, 1.0]),
            roll_src: Table1d::constant("roll", 0.0),
            cds_parachute_m2: vec![5.0, 3.0],
        }
    }

    /// A rocket with a 10 s constant-thrust burn.
    fn test_rocket() -> Rocket {
        Rocket::new(
            test_params(),
            Box::new(ConstantThrustEngine::from_thrust(1000.0, 10.0)),
        )
    }

    fn epoch() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH
    }

    /// Step the rocket to countup time `t`, refreshing engine state the way
    /// the integrator does.
    fn step_to(rocket: &mut Rocket, t: f64) {
        let dt = t - rocket.countup_time_s();
        rocket.advance_clock(crate::core::time::sec_to_td(dt));
        rocket.thrust_b_n(P0);
    }

    #[test]
    fn test_cg_tracks_source_while_burning_then_freezes() {
        let mut rocket = test_rocket();

        rocket.ignition_engine(epoch(), 0.0);
        step_to(&mut rocket, 0.0);
        assert_relative_eq!(rocket.length_cg_m(), 5.0);

        step_to(&mut rocket, 5.0);
        assert_relative_eq!(rocket.length_cg_m(), 4.5);

        rocket.cutoff_engine();
        step_to(&mut rocket, 8.0);
        assert_relative_eq!(rocket.length_cg_m(), 4.5);

        step_to(&mut rocket, 50.0);
        assert_relative_eq!(rocket.length_cg_m(), 4.5);
    }

    #[test]
    fn test_cp_has_no_burn_phase_dependency() {
        let mut rocket = test_rocket();

        assert_relative_eq!(rocket.length_cp_m(1.0), 6.2);

        rocket.ignition_engine(epoch(), 0.0);
        step_to(&mut rocket, 1.0);
        assert_relative_eq!(rocket.length_cp_m(1.0), 6.2);
    }

    #[test]
    fn test_ca_dispatches_on_burn_state() {
        let mut rocket = test_rocket();

        // Not yet ignited: burnout correlation
        assert_relative_eq!(rocket.ca(0.9), 0.5);

        rocket.ignition_engine(epoch(), 0.0);
        for t in [0.0, 3.0, 9.9] {
            step_to(&mut rocket, t);
            assert_relative_eq!(rocket.ca(0.9), 0.3);
        }

        // Burn duration exceeded: the flag flips at the 10 s update and the
        // discontinuity is reproduced at the same Mach number
        step_to(&mut rocket, 10.1);
        assert_relative_eq!(rocket.ca(0.9), 0.5);
    }

    #[test]
    fn test_damping_derivatives_are_non_positive() {
        let rocket = test_rocket();

        // Positive source values are negated
        assert_relative_eq!(rocket.clp(1.0), -0.8);
        assert_relative_eq!(rocket.cnr(1.0), -5.0);

        // Non-positive source values pass through unchanged
        assert_relative_eq!(rocket.cmq(1.0), -5.0);
    }

    #[test]
    fn test_plain_coefficients_have_no_sign_clamp() {
        let rocket = test_rocket();

        assert_relative_eq!(rocket.cna(1.0), 8.0);
        assert_relative_eq!(rocket.cld(1.0), 0.02);
    }

    #[test]
    fn test_inertia_rebuilds_while_burning_and_freezes_after() {
        let mut rocket = test_rocket();

        rocket.ignition_engine(epoch(), 0.0);
        step_to(&mut rocket, 5.0);
        let mid_burn = rocket.inertia_tensor_kgm2();
        assert_relative_eq!(mid_burn[(0, 0)], 11.0);
        assert_relative_eq!(mid_burn[(1, 1)], 850.0);
        assert_eq!(mid_burn[(0, 1)], 0.0);

        rocket.cutoff_engine();
        step_to(&mut rocket, 20.0);
        let frozen_a = rocket.inertia_tensor_kgm2();
        step_to(&mut rocket, 30.0);
        let frozen_b = rocket.inertia_tensor_kgm2();

        assert_eq!(frozen_a, mid_burn);
        assert_eq!(frozen_a, frozen_b);
    }

    #[test]
    fn test_attitude_program_follows_countup_time() {
        let mut rocket = test_rocket();

        // Clock not yet created: program reads its t=0 values
        let attitude = rocket.attitude_program_rad();
        assert_relative_eq!(attitude[0], 0.0);
        assert_relative_eq!(attitude[1], 1.5);

        rocket.ignition_engine(epoch(), 0.0);
        step_to(&mut rocket, 5.0);
        let attitude = rocket.attitude_program_rad();
        assert_relative_eq!(attitude[0], 0.25);
        assert_relative_eq!(attitude[1], 1.25);
        assert_relative_eq!(attitude[2], 0.0);
    }

    #[test]
    fn test_thrust_is_zero_when_not_burning() {
        let mut rocket = test_rocket();

        for pressure in [0.0, P0, 5.0 * P0] {
            assert_eq!(rocket.thrust_b_n(pressure), Vector3::zeros());
        }

        rocket.ignition_engine(epoch(), 0.0);
        rocket.cutoff_engine();
        assert_eq!(rocket.thrust_b_n(P0), Vector3::zeros());
    }

    #[test]
    fn test_thrust_vector_gimbal_components() {
        let json_str = r#"{
            "thrust": [[0.0, 1000.0], [10.0, 1000.0]],
            "mass_flow": [[0.0, 0.5]],
            "gimbal_y": [[0.0, 0.2]],
            "gimbal_z": [[0.0, 0.1]]
        }"#;
        let engine = TabulatedEngine::from_json(json_str).unwrap();
        let mut rocket = Rocket::new(test_params(), Box::new(engine));

        rocket.ignition_engine(epoch(), 0.0);
        rocket.advance_clock(crate::core::time::sec_to_td(1.0));
        let thrust = rocket.thrust_b_n(P0);

        let (gy, gz) = (0.2_f64, 0.1_f64);
        assert_relative_eq!(thrust[0], 1000.0 * gy.cos() * gy.cos());
        assert_relative_eq!(thrust[1], 1000.0 * gz.sin());
        assert_relative_eq!(thrust[2], -1000.0 * gy.sin());
    }

    #[test]
    fn test_mass_shedding_clamps_inert_mass() {
        let mut rocket = test_rocket();

        rocket.jettison_fairing(40.0);
        assert_relative_eq!(rocket.mass.inert_kg, 60.0);

        rocket.separate_upper_stage(80.0);
        assert_relative_eq!(rocket.mass.inert_kg, INERT_MASS_FLOOR_KG);

        rocket.jettison_fairing(10.0);
        assert_relative_eq!(rocket.mass.inert_kg, INERT_MASS_FLOOR_KG);
    }

    #[test]
    fn test_parachute_deployment_sequence() {
        let mut rocket = test_rocket();

        rocket.open_parachute();
        assert_relative_eq!(rocket.cds_parachute_m2(), 5.0);
        assert_eq!(rocket.parachute_deployments(), 1);

        rocket.open_parachute();
        assert_relative_eq!(rocket.cds_parachute_m2(), 8.0);
        assert_eq!(rocket.parachute_deployments(), 2);

        // Exhausted configuration: counter keeps advancing, total holds
        rocket.open_parachute();
        assert_relative_eq!(rocket.cds_parachute_m2(), 8.0);
        assert_eq!(rocket.parachute_deployments(), 3);

        rocket.open_parachute();
        assert_relative_eq!(rocket.cds_parachute_m2(), 8.0);
        assert_eq!(rocket.parachute_deployments(), 4);
    }

    #[test]
    fn test_de_spin_zeroes_roll_axis_only() {
        let mut rocket = test_rocket();
        rocket.angular_velocity_rad_s = vector![2.0, 0.3, -0.4];
        rocket.angular_acceleration_rad_s2 = vector![0.5, 0.1, 0.2];

        rocket.de_spin();

        assert_eq!(rocket.angular_velocity_rad_s, vector![0.0, 0.3, -0.4]);
        assert_eq!(rocket.angular_acceleration_rad_s2, vector![0.0, 0.1, 0.2]);
    }
}
