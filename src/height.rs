//! Fixed-point heights for layer accumulation.
//!
//! Layer heights are summed hundreds of times per print, so they are stored
//! as an integer count of nanometres instead of `f64` millimetres. Every value
//! a slicer exposes (0.12, 0.2, 0.28 ...) is exact at this resolution, which
//! keeps section boundary comparisons free of binary rounding drift.

use std::fmt;
use std::ops::{Add, AddAssign, Mul};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

const UNITS_PER_MM: i64 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Height(i64);

impl Height {
    pub const ZERO: Height = Height(0);

    /// Convert millimetres to a fixed-point height, rounding to the nearest nanometre.
    pub fn from_mm(mm: f64) -> Self {
        Height((mm * UNITS_PER_MM as f64).round() as i64)
    }

    pub fn as_mm(self) -> f64 {
        self.0 as f64 / UNITS_PER_MM as f64
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }
}

impl Add for Height {
    type Output = Height;

    fn add(self, rhs: Height) -> Height {
        Height(self.0 + rhs.0)
    }
}

impl AddAssign for Height {
    fn add_assign(&mut self, rhs: Height) {
        self.0 += rhs.0;
    }
}

impl Mul<u32> for Height {
    type Output = Height;

    fn mul(self, rhs: u32) -> Height {
        Height(self.0 * rhs as i64)
    }
}

impl fmt::Display for Height {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_mm())
    }
}

impl Serialize for Height {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_mm())
    }
}

impl<'de> Deserialize<'de> for Height {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mm = f64::deserialize(deserializer)?;
        Ok(Height::from_mm(mm))
    }
}
