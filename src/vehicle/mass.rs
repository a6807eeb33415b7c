/// Floor applied to inert mass by mass-shedding staging events. A
/// non-positive mass is invalid for the downstream force and inertia
/// calculations.
pub const INERT_MASS_FLOOR_KG: f64 = 1.0;

#[derive(Debug, Clone, PartialEq)]
pub struct MassProperties {
    pub propellant_kg: f64,
    pub inert_kg: f64,
}

impl MassProperties {
    pub fn new(inert_kg: f64, propellant_kg: f64) -> Self {
        MassProperties {
            propellant_kg,
            inert_kg,
        }
    }

    pub fn total_kg(&self) -> f64 {
        self.propellant_kg + self.inert_kg
    }

    /// Deplete propellant, saturating at empty.
    pub fn consume_propellant(&mut self, delta_kg: f64) {
        self.propellant_kg = (self.propellant_kg - delta_kg).max(0.0);
    }

    pub(crate) fn drop_inert(&mut self, delta_kg: f64) {
        self.inert_kg -= delta_kg;
        if self.inert_kg <= 0.0 {
            self.inert_kg = INERT_MASS_FLOOR_KG;
        }
    }
}
