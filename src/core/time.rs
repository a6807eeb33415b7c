use chrono::{DateTime, TimeDelta, Utc};

pub fn td_seconds(td: TimeDelta) -> f64 {
    td.num_seconds() as f64 + (td.subsec_nanos() as f64) / 1_000_000_000.0
}

pub fn sec_to_td(seconds: f64) -> TimeDelta {
    TimeDelta::nanoseconds((seconds * 1_000_000_000.0).round() as i64)
}

/// Countup clock anchored at a UTC epoch, created at engine ignition.
///
/// Countup time is the independent variable for every burn-phase-dependent
/// lookup. The clock only moves forward, through `advance`, driven by the
/// owning simulation's master clock.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceClock {
    utc_epoch: DateTime<Utc>,
    countup_init_s: f64,
    countup_s: f64,
}

impl SequenceClock {
    pub fn new(utc_epoch: DateTime<Utc>, countup_init_s: f64) -> Self {
        SequenceClock {
            utc_epoch,
            countup_init_s,
            countup_s: countup_init_s,
        }
    }

    pub fn advance(&mut self, dt: TimeDelta) {
        self.countup_s += td_seconds(dt);
    }

    pub fn countup_time_s(&self) -> f64 {
        self.countup_s
    }

    pub fn utc(&self) -> DateTime<Utc> {
        self.utc_epoch + sec_to_td(self.countup_s - self.countup_init_s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_td_roundtrip() {
        assert_relative_eq!(td_seconds(sec_to_td(1.25)), 1.25);
        assert_relative_eq!(td_seconds(sec_to_td(0.0)), 0.0);
        assert_relative_eq!(td_seconds(TimeDelta::milliseconds(2500)), 2.5);
    }

    #[test]
    fn test_clock_advances_from_initial_countup() {
        let epoch = DateTime::<Utc>::UNIX_EPOCH;
        let mut clock = SequenceClock::new(epoch, -5.0);

        assert_relative_eq!(clock.countup_time_s(), -5.0);
        assert_eq!(clock.utc(), epoch);

        clock.advance(TimeDelta::seconds(5));
        assert_relative_eq!(clock.countup_time_s(), 0.0);

        clock.advance(TimeDelta::milliseconds(1500));
        assert_relative_eq!(clock.countup_time_s(), 1.5);
        assert_eq!(clock.utc(), epoch + TimeDelta::milliseconds(6500));
    }
}
