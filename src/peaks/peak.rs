use std::cmp;
use std::fmt;

use crate::utils::{mass_charge_ratio, neutral_mass};

/// Two peak coordinates closer than this are considered equal
pub const PEAK_TOLERANCE: f64 = 1e-6;

/// A centroided peak, an m/z and an intensity, with a charge state when
/// the source format records one.
///
/// Peaks are ordered by m/z.
#[derive(Default, Clone, Copy, Debug)]
pub struct Peak {
    pub mz: f64,
    pub intensity: f64,
    pub charge: Option<i32>,
}

impl Peak {
    pub fn new(mz: f64, intensity: f64) -> Self {
        Self {
            mz,
            intensity,
            charge: None,
        }
    }

    pub fn with_charge(mz: f64, intensity: f64, charge: i32) -> Self {
        Self {
            mz,
            intensity,
            charge: Some(charge),
        }
    }

    /// Build a peak from a neutral mass, placing it at the m/z it would be observed at
    pub fn from_neutral_mass(mass: f64, intensity: f64, charge: i32) -> Self {
        Self::with_charge(mass_charge_ratio(mass, charge), intensity, charge)
    }

    /// The neutral mass of the peak, if its charge is known
    pub fn neutral_mass(&self) -> Option<f64> {
        self.charge.map(|z| neutral_mass(self.mz, z))
    }
}

impl fmt::Display for Peak {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.charge {
            Some(z) => write!(f, "Peak({}, {}, {})", self.mz, self.intensity, z),
            None => write!(f, "Peak({}, {})", self.mz, self.intensity),
        }
    }
}

impl From<(f64, f64)> for Peak {
    fn from((mz, intensity): (f64, f64)) -> Self {
        Self::new(mz, intensity)
    }
}

impl cmp::PartialOrd<Peak> for Peak {
    fn partial_cmp(&self, other: &Peak) -> Option<cmp::Ordering> {
        self.mz.partial_cmp(&other.mz)
    }
}

impl cmp::PartialEq<Peak> for Peak {
    fn eq(&self, other: &Peak) -> bool {
        if (self.mz - other.mz).abs() > PEAK_TOLERANCE
            || (self.intensity - other.intensity).abs() > PEAK_TOLERANCE
            || self.charge != other.charge
        {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_ordering() {
        let a = Peak::new(100.1, 50.0);
        let b = Peak::new(200.2, 5.0);
        assert!(a < b);
        assert_eq!(a, Peak::new(100.1 + 1e-9, 50.0));
        assert_ne!(a, Peak::with_charge(100.1, 50.0, 1));
    }

    #[test]
    fn test_neutral_mass() {
        let peak = Peak::from_neutral_mass(1000.0, 10.0, 2);
        assert!((peak.neutral_mass().unwrap() - 1000.0).abs() < 1e-9);
        assert!(Peak::new(500.0, 1.0).neutral_mass().is_none());
        assert_eq!(Peak::from((1.0, 2.0)).to_string(), "Peak(1, 2)");
    }
}
