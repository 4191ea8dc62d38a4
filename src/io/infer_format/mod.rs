//! Working out which format a file or stream holds, and opening it.
//!
//! The [`FormatRegistry`] maps file name patterns, and optionally content
//! patterns, to reader and writer factories.
mod dispatch;
mod inference;
mod registry;

pub use inference::file_name_of;
pub use registry::{
    default_readers, default_writers, name_pattern, FormatDescriptor, FormatRegistry,
    ReaderFactory, RegistryBuilder, RegistryConfig, TranscoderFactory, WriterFactory,
};

#[cfg(test)]
mod test {
    use std::fs;
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::error::Result;
    use crate::io::traits::PeakListReader;

    #[cfg(feature = "mgf")]
    #[test_log::test]
    fn infer_mgf_without_suffix() -> Result<()> {
        let registry = FormatRegistry::default();
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("spectra");
        fs::write(
            &path,
            "COM=made by hand\nBEGIN IONS\nTITLE=a\nPEPMASS=500.25\n100.0 1.0\nEND IONS\n",
        )?;
        assert_eq!(registry.lookup_reader(&path)?.name, "MGF");
        let mut reader = registry.open_reader(&path)?;
        let peak_list = reader.get_peak_list(false, false)?.unwrap();
        assert_eq!(peak_list.name(), Some("a"));
        reader.close()?;

        let lower = dir.path().join("lower");
        fs::write(&lower, "begin ions\n100.0 1.0\nend ions\n")?;
        let mut reader = registry.open_reader(&lower)?;
        assert_eq!(reader.format_name(), "MGF");
        assert_eq!(reader.get_peak_list(false, false)?.map(|p| p.len()), Some(1));
        reader.close()?;
        Ok(())
    }

    #[test]
    fn test_shared_between_threads() -> Result<()> {
        let registry = Arc::new(FormatRegistry::default());
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("peaks.xy");
        fs::write(&path, "100.0 1.0\n200.0 2.0\n")?;

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let path = path.clone();
                thread::spawn(move || -> Result<usize> {
                    let mut reader = registry.open_reader(&path)?;
                    let n = reader.get_peak_list(false, false)?.map(|p| p.len()).unwrap_or(0);
                    reader.close()?;
                    Ok(n)
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap()?, 2);
        }
        Ok(())
    }
}
