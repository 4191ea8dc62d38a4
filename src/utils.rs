//! Mass arithmetic shared by the format grammars.
pub const PROTON: f64 = 1.00727646677;

#[inline]
pub fn mass_charge_ratio(mass: f64, z: i32) -> f64 {
    (mass / (z.unsigned_abs() as f64)) + z as f64 * PROTON
}

#[inline]
pub fn neutral_mass(mz: f64, z: i32) -> f64 {
    (mz * z.unsigned_abs() as f64) - z as f64 * PROTON
}

/// The singly protonated (MH+) mass of an ion observed at `mz` with charge `z`,
/// `mz * z - (z - 1) * PROTON`. A charge of zero is treated as 1.
#[inline]
pub fn singly_protonated_mass(mz: f64, z: i32) -> f64 {
    let z = if z != 0 { z as f64 } else { 1.0 };
    mz * z - (z - 1.0) * PROTON
}

/// The inverse of [`singly_protonated_mass`].
#[inline]
pub fn mz_from_singly_protonated(mh: f64, z: i32) -> f64 {
    let z = if z != 0 { z as f64 } else { 1.0 };
    (mh + (z - 1.0) * PROTON) / z
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_singly_protonated_exact() {
        let mh = singly_protonated_mass(500.25, 2);
        assert_eq!(mh, 500.25 * 2.0 - PROTON);
        assert_eq!(singly_protonated_mass(600.10, 1), 600.10);
        assert!((mz_from_singly_protonated(mh, 2) - 500.25).abs() < 1e-9);
        assert_eq!(
            singly_protonated_mass(300.0, 0),
            singly_protonated_mass(300.0, 1)
        );
    }

    #[test]
    fn test_extreme_charge_does_not_overflow() {
        assert!(singly_protonated_mass(500.0, i32::MIN).is_finite());
        assert!(mz_from_singly_protonated(500.0, i32::MIN).is_finite());
        assert!(neutral_mass(500.0, i32::MIN).is_finite());
    }

    #[test]
    fn test_neutral_mass() {
        let mz = mass_charge_ratio(1000.0, 2);
        assert!((neutral_mass(mz, 2) - 1000.0).abs() < 1e-9);
    }
}
