//! Per-variable box bounds.

/// Closed interval `[lower, upper]`. Either end may be infinite.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bounds {
    pub lower: f64,
    pub upper: f64,
}

impl Bounds {
    /// `[0, 1]`, the box of an ordinary atom.
    pub const UNIT: Self = Self {
        lower: 0.0,
        upper: 1.0,
    };

    /// `(−∞, ∞)`
    pub const UNBOUNDED: Self = Self {
        lower: f64::NEG_INFINITY,
        upper: f64::INFINITY,
    };

    #[inline]
    pub const fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    /// Nearest point of the interval.
    ///
    /// Unlike `f64::clamp` this never panics; a NaN input stays NaN.
    #[inline]
    pub fn clamp(&self, value: f64) -> f64 {
        if value < self.lower {
            self.lower
        } else if value > self.upper {
            self.upper
        } else {
            value
        }
    }

    /// Whether `value` lies in the interval.
    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }

    /// Image of the interval under `x ↦ −x`.
    #[inline]
    pub fn negated(&self) -> Self {
        Self {
            lower: -self.upper,
            upper: -self.lower,
        }
    }

    /// Whether both ends are infinite.
    #[inline]
    pub fn is_unbounded(&self) -> bool {
        self.lower == f64::NEG_INFINITY && self.upper == f64::INFINITY
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::UNIT
    }
}

impl From<(f64, f64)> for Bounds {
    fn from((lower, upper): (f64, f64)) -> Self {
        Self { lower, upper }
    }
}
