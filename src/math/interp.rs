use itertools::{Itertools, izip};
use num_traits::Num;

/// Policy applied when the lookup point falls outside the breakpoint domain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InterpMode<T: PartialOrd + Copy> {
    /// Continue the first/last segment beyond the domain.
    Extrapolate,

    /// Clamp to the first/last dependent value.
    FirstLast,

    /// Return a fixed value outside the domain.
    Constant(T),
}

#[inline]
fn deltas<T>(p: &[T]) -> Vec<T>
where
    T: Num + Copy,
{
    p.iter().tuple_windows().map(|(&p1, &p2)| p2 - p1).collect()
}

#[inline]
fn prev_index<T>(x: &[T], xp: T) -> usize
where
    T: Num + PartialOrd + Copy,
{
    x.partition_point(|&x| x < xp).saturating_sub(1)
}

/// An immutable, named 1-D lookup table mapping an independent scalar to a
/// dependent scalar by linear interpolation between breakpoints.
///
/// Segment slopes and intercepts are computed once at construction; tables
/// are evaluated every integration step.
#[derive(Debug, Clone, PartialEq)]
pub struct Table1d {
    name: String,
    x: Vec<f64>,
    y: Vec<f64>,
    m: Vec<f64>,
    c: Vec<f64>,
    mode: InterpMode<f64>,
}

impl Table1d {
    /// Breakpoints must be sorted ascending in `x`. Surplus entries in the
    /// longer of the two slices are ignored.
    pub fn new(name: &str, x: Vec<f64>, y: Vec<f64>, mode: InterpMode<f64>) -> Self {
        let min_len = std::cmp::min(x.len(), y.len());
        let x = x[..min_len].to_vec();
        let y = y[..min_len].to_vec();

        let dx = deltas(&x);
        let dy = deltas(&y);

        let m: Vec<f64> = izip!(&dx, &dy).map(|(&dx, &dy)| dy / dx).collect();
        let c: Vec<f64> = izip!(&x, &y, &m).map(|(&x, &y, &m)| y - x * m).collect();

        Table1d {
            name: name.to_string(),
            x,
            y,
            m,
            c,
            mode,
        }
    }

    /// A single-breakpoint table that evaluates to `value` everywhere.
    pub fn constant(name: &str, value: f64) -> Self {
        Table1d::new(name, vec![0.0], vec![value], InterpMode::FirstLast)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Evaluate the table at `xp`. Deterministic and total: an empty table
    /// yields 0.0, a single-point table yields its sole value, and
    /// out-of-domain lookups follow the table's `InterpMode`.
    pub fn evaluate(&self, xp: f64) -> f64 {
        let n = self.x.len();

        if n == 0 {
            0.0
        } else if n == 1 {
            self.y[0]
        } else {
            let i = prev_index(&self.x, xp).min(n - 2);
            let point = self.m[i] * xp + self.c[i];

            if xp < self.x[0] {
                match self.mode {
                    InterpMode::Extrapolate => point,
                    InterpMode::FirstLast => self.y[0],
                    InterpMode::Constant(val) => val,
                }
            } else if xp > self.x[n - 1] {
                match self.mode {
                    InterpMode::Extrapolate => point,
                    InterpMode::FirstLast => self.y[n - 1],
                    InterpMode::Constant(val) => val,
                }
            } else {
                point
            }
        }
    }
}
