use std::fs;
use std::path::Path;

use mzpeaklist::prelude::*;
use mzpeaklist::{FormatRegistry, Peak, PeakList, PeakListDescription, PeakListError, Result};

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

fn sample(name: &str, parent_mz: f64, charge: i32, peaks: &[(f64, f64)]) -> PeakList {
    let description = PeakListDescription {
        name: Some(name.to_string()),
        parent_mz: Some(parent_mz),
        parent_charge: Some(charge),
        ..Default::default()
    };
    PeakList::new(description, peaks.iter().copied().map(Peak::from).collect())
}

fn write_all(registry: &FormatRegistry, path: &Path, lists: &[PeakList]) -> Result<()> {
    let mut writer = registry.create_writer(path)?;
    for peak_list in lists {
        writer.write_peak_list(peak_list)?;
    }
    writer.close()
}

fn read_all(registry: &FormatRegistry, path: &Path) -> Result<Vec<PeakList>> {
    let mut reader = registry.open_reader(path)?;
    let mut lists = Vec::new();
    while let Some(peak_list) = reader.get_peak_list(false, false)? {
        lists.push(peak_list);
    }
    reader.close()?;
    Ok(lists)
}

fn assert_same_peaks(left: &PeakList, right: &PeakList) {
    assert_eq!(left.len(), right.len());
    for (a, b) in left.iter().zip(right.iter()) {
        assert!(approx(a.mz, b.mz), "{a} != {b}");
        assert!(approx(a.intensity, b.intensity), "{a} != {b}");
    }
}

#[cfg(feature = "mgf")]
#[test_log::test]
fn mgf_round_trip() -> Result<()> {
    let registry = FormatRegistry::default();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("spectra.mgf");
    let lists = vec![
        sample("first", 500.25, 2, &[(100.5, 10.0), (200.25, 20.0)]),
        sample("second", 600.10, 1, &[(150.0, 5.0)]),
    ];
    write_all(&registry, &path, &lists)?;
    let read = read_all(&registry, &path)?;
    assert_eq!(read.len(), 2);
    for (written, read) in lists.iter().zip(read.iter()) {
        assert_same_peaks(written, read);
        assert_eq!(written.name(), read.name());
        assert_eq!(written.description.parent_charge, read.description.parent_charge);
        assert!(approx(
            written.description.parent_mz.unwrap(),
            read.description.parent_mz.unwrap()
        ));
    }
    Ok(())
}

#[test_log::test]
fn pkl_round_trip() -> Result<()> {
    let registry = FormatRegistry::default();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("spectra.pkl");
    let lists = vec![
        sample("first", 500.25, 2, &[(100.5, 10.0), (200.25, 20.0)]),
        sample("second", 600.10, 1, &[(150.0, 5.0)]),
        sample("third", 700.3, 3, &[(175.0, 2.5), (275.0, 7.5)]),
    ];
    write_all(&registry, &path, &lists)?;
    let read = read_all(&registry, &path)?;
    assert_eq!(read.len(), 3);
    for (written, read) in lists.iter().zip(read.iter()) {
        assert_same_peaks(written, read);
        assert_eq!(written.description.parent_charge, read.description.parent_charge);
        assert!(approx(
            written.description.parent_mz.unwrap(),
            read.description.parent_mz.unwrap()
        ));
        // PKL does not carry names
        assert_eq!(read.name(), None);
    }
    Ok(())
}

#[test_log::test]
fn dta_round_trip_keeps_parent_mass() -> Result<()> {
    let registry = FormatRegistry::default();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("scan.dta");
    let list = sample("scan", 445.1209, 3, &[(101.5, 10.0), (202.25, 20.0)]);
    write_all(&registry, &path, std::slice::from_ref(&list))?;
    let read = read_all(&registry, &path)?;
    assert_eq!(read.len(), 1);
    assert_same_peaks(&list, &read[0]);
    assert_eq!(read[0].description.parent_charge, Some(3));
    assert!(approx(read[0].description.parent_mz.unwrap(), 445.1209));
    Ok(())
}

#[test_log::test]
fn xy_round_trip() -> Result<()> {
    let registry = FormatRegistry::default();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("peaks.txt");
    let list = sample("ignored", 445.12, 2, &[(101.5, 10.0), (202.25, 20.0), (303.0, 1.0)]);
    write_all(&registry, &path, std::slice::from_ref(&list))?;
    let read = read_all(&registry, &path)?;
    assert_eq!(read.len(), 1);
    assert_same_peaks(&list, &read[0]);
    assert!(!read[0].description.has_parent());
    Ok(())
}

#[test_log::test]
fn single_use_writer_keeps_first_list() -> Result<()> {
    let registry = FormatRegistry::default();
    let dir = tempfile::tempdir()?;
    for name in ["one.dta", "one.xy"] {
        let path = dir.path().join(name);
        let first = sample("first", 500.25, 2, &[(100.0, 1.0)]);
        let second = sample("second", 600.5, 1, &[(200.0, 2.0)]);
        let mut writer = registry.create_writer(&path)?;
        writer.write_peak_list(&first)?;
        assert!(matches!(
            writer.write_peak_list(&second),
            Err(PeakListError::CanOnlyContainOneSpectrum(_))
        ));
        writer.close()?;
        let read = read_all(&registry, &path)?;
        assert_eq!(read.len(), 1, "{name}");
        assert_same_peaks(&first, &read[0]);
    }
    Ok(())
}

#[cfg(feature = "mgf")]
#[test_log::test]
fn two_entry_mgf() -> Result<()> {
    let registry = FormatRegistry::default();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("two.mgf");
    fs::write(
        &path,
        "BEGIN IONS
TITLE=first
PEPMASS=500.25
CHARGE=2+
300.0 30.0
100.0 10.0
END IONS

BEGIN IONS
TITLE=second
PEPMASS=600.10 1500.0
CHARGE=1+
250.0 25.0
150.0 15.0
END IONS
",
    )?;
    let mut reader = registry.open_reader(&path)?;
    let first = reader.get_peak_list(true, false)?.unwrap();
    let second = reader.get_peak_list(true, false)?.unwrap();
    assert!(reader.get_peak_list(true, false)?.is_none());
    reader.close()?;

    assert_eq!(first.parent_peak().unwrap().mz, 500.25);
    assert_eq!(first.description.parent_charge, Some(2));
    assert_eq!(second.parent_peak().unwrap().mz, 600.10);
    assert_eq!(second.description.parent_charge, Some(1));
    assert_eq!(second.description.parent_intensity, Some(1500.0));
    let mzs: Vec<_> = first.iter().map(|p| p.mz).collect();
    assert_eq!(mzs, vec![100.0, 300.0]);
    let mzs: Vec<_> = second.iter().map(|p| p.mz).collect();
    assert_eq!(mzs, vec![150.0, 250.0]);
    Ok(())
}

#[test_log::test]
fn convert_between_formats() -> Result<()> {
    let registry = FormatRegistry::default();
    let dir = tempfile::tempdir()?;
    let source = dir.path().join("source.pkl");
    fs::write(&source, "500.25 0 2\n100.0 1.0\n200.0 3.0\n\n600.5 0 1\n150.0 2.0\n")?;
    let target = dir.path().join("target.pkl");

    let mut reader = registry.open_reader(&source)?;
    let mut writer = registry.create_writer(&target)?;
    for peak_list in reader.peak_lists() {
        writer.write_peak_list(&peak_list?)?;
    }
    writer.close()?;
    reader.close()?;

    let read = read_all(&registry, &target)?;
    assert_eq!(read.len(), 2);
    assert_eq!(read[1].description.parent_charge, Some(1));
    let normalized = {
        let mut list = read[0].clone();
        list.normalize()?;
        list
    };
    assert!(approx(normalized.total_intensity(), 1.0));
    Ok(())
}
