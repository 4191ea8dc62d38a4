//! Compression envelopes around peak list files, and the decorators that unwrap
//! them for readers and apply them for writers.
//!
//! Gzip is always available. bzip2, xz/LZMA and zip envelopes require the `bzip2`,
//! `lzma` and `zip` features respectively, all enabled by default.
use std::fs;
use std::io::{self, prelude::*, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::error::Result;

mod decorators;
mod scratch;

pub use decorators::{CompressedPeakListReader, CompressedPeakListWriter, Envelope};
pub(crate) use decorators::open_compressed_reader;
pub use scratch::{deferred_deletions, retry_deferred_deletions, ScratchSpace};

/// A compression envelope recognized by file name suffix or magic bytes
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compression {
    Gzip,
    #[cfg(feature = "bzip2")]
    Bzip2,
    #[cfg(feature = "lzma")]
    Xz,
    #[cfg(feature = "lzma")]
    Lzma,
    #[cfg(feature = "zip")]
    Zip,
}

pub fn is_gzipped(header: &[u8]) -> bool {
    header.starts_with(b"\x1f\x8b")
}

impl Compression {
    /// Every envelope compiled into this build
    pub fn all() -> &'static [Compression] {
        &[
            Compression::Gzip,
            #[cfg(feature = "bzip2")]
            Compression::Bzip2,
            #[cfg(feature = "lzma")]
            Compression::Xz,
            #[cfg(feature = "lzma")]
            Compression::Lzma,
            #[cfg(feature = "zip")]
            Compression::Zip,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Compression::Gzip => "gzip",
            #[cfg(feature = "bzip2")]
            Compression::Bzip2 => "bzip2",
            #[cfg(feature = "lzma")]
            Compression::Xz => "xz",
            #[cfg(feature = "lzma")]
            Compression::Lzma => "lzma",
            #[cfg(feature = "zip")]
            Compression::Zip => "zip",
        }
    }

    /// The file name suffixes of this envelope, the canonical one first
    pub fn suffixes(&self) -> &'static [&'static str] {
        match self {
            Compression::Gzip => &[".gz", ".gzip"],
            #[cfg(feature = "bzip2")]
            Compression::Bzip2 => &[".bz2", ".bzip2"],
            #[cfg(feature = "lzma")]
            Compression::Xz => &[".xz"],
            #[cfg(feature = "lzma")]
            Compression::Lzma => &[".lzma"],
            #[cfg(feature = "zip")]
            Compression::Zip => &[".zip"],
        }
    }

    pub fn suffix(&self) -> &'static str {
        self.suffixes()[0]
    }

    /// Whether the envelope may hold more than one file
    pub fn is_archive(&self) -> bool {
        #[cfg(feature = "zip")]
        if matches!(self, Compression::Zip) {
            return true;
        }
        false
    }

    /// Recognize a compressed file name, returning the envelope and the name of
    /// the file inside it
    pub fn from_file_name(name: &str) -> Option<(Compression, String)> {
        let name = Path::new(name)
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.to_string());
        let lowered = name.to_ascii_lowercase();
        for compression in Self::all() {
            for suffix in compression.suffixes() {
                if lowered.ends_with(suffix) && lowered.len() > suffix.len() {
                    let inner = name[..name.len() - suffix.len()].to_string();
                    return Some((*compression, inner));
                }
            }
        }
        None
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<(Compression, String)> {
        Self::from_file_name(&path.as_ref().to_string_lossy())
    }

    /// Recognize an envelope from the first bytes of a stream
    pub fn from_magic(buf: &[u8]) -> Option<Compression> {
        if is_gzipped(buf) {
            return Some(Compression::Gzip);
        }
        #[cfg(feature = "bzip2")]
        if buf.starts_with(b"BZh") {
            return Some(Compression::Bzip2);
        }
        #[cfg(feature = "lzma")]
        if buf.starts_with(b"\xfd7zXZ\x00") {
            return Some(Compression::Xz);
        }
        #[cfg(feature = "lzma")]
        if buf.starts_with(b"\x5d\x00\x00") {
            return Some(Compression::Lzma);
        }
        #[cfg(feature = "zip")]
        if buf.starts_with(b"PK\x03\x04") {
            return Some(Compression::Zip);
        }
        None
    }

    /// Decompress all of `source` into `destination`, returning the number of
    /// bytes written. Archives are unpacked with [`extract_archive`] instead.
    pub fn decompress_file(&self, source: &Path, destination: &Path) -> io::Result<u64> {
        let handle = BufReader::new(fs::File::open(source)?);
        let mut out = BufWriter::new(fs::File::create(destination)?);
        let n = match self {
            Compression::Gzip => io::copy(&mut flate2::bufread::MultiGzDecoder::new(handle), &mut out)?,
            #[cfg(feature = "bzip2")]
            Compression::Bzip2 => io::copy(&mut bzip2::read::BzDecoder::new(handle), &mut out)?,
            #[cfg(feature = "lzma")]
            Compression::Xz => io::copy(&mut xz2::read::XzDecoder::new(handle), &mut out)?,
            #[cfg(feature = "lzma")]
            Compression::Lzma => {
                let stream = xz2::stream::Stream::new_lzma_decoder(u64::MAX)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                io::copy(&mut xz2::read::XzDecoder::new_stream(handle, stream), &mut out)?
            }
            #[cfg(feature = "zip")]
            Compression::Zip => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "zip archives must be extracted, not decompressed",
                ))
            }
        };
        out.flush()?;
        Ok(n)
    }

    /// Compress `source` into `destination` at `level` (clamped to 0-9). Zip
    /// archives get a single entry called `entry_name`.
    pub fn compress_file(
        &self,
        source: &Path,
        destination: &Path,
        entry_name: &str,
        level: u32,
    ) -> Result<()> {
        let level = level.min(9);
        let mut handle = BufReader::new(fs::File::open(source)?);
        let out = BufWriter::new(fs::File::create(destination)?);
        match self {
            Compression::Gzip => {
                let mut encoder = flate2::write::GzEncoder::new(out, flate2::Compression::new(level));
                io::copy(&mut handle, &mut encoder)?;
                encoder.finish()?.flush()?;
            }
            #[cfg(feature = "bzip2")]
            Compression::Bzip2 => {
                let mut encoder =
                    bzip2::write::BzEncoder::new(out, bzip2::Compression::new(level.max(1)));
                io::copy(&mut handle, &mut encoder)?;
                encoder.finish()?.flush()?;
            }
            #[cfg(feature = "lzma")]
            Compression::Xz => {
                let mut encoder = xz2::write::XzEncoder::new(out, level);
                io::copy(&mut handle, &mut encoder)?;
                encoder.finish()?.flush()?;
            }
            #[cfg(feature = "lzma")]
            Compression::Lzma => {
                let options = xz2::stream::LzmaOptions::new_preset(level)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
                let stream = xz2::stream::Stream::new_lzma_encoder(&options)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
                let mut encoder = xz2::write::XzEncoder::new_stream(out, stream);
                io::copy(&mut handle, &mut encoder)?;
                encoder.finish()?.flush()?;
            }
            #[cfg(feature = "zip")]
            Compression::Zip => {
                use zip::write::SimpleFileOptions;

                let mut writer = zip::ZipWriter::new(out.into_inner().map_err(|e| e.into_error())?);
                let options =
                    SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
                writer.start_file(entry_name, options)?;
                io::copy(&mut handle, &mut writer)?;
                writer.finish()?;
            }
        }
        debug!(
            "Compressed {} into {} with {}",
            source.display(),
            destination.display(),
            self.name()
        );
        #[cfg(not(feature = "zip"))]
        let _ = entry_name;
        Ok(())
    }
}

/// Unpack every file entry of the zip archive at `source` under `directory`, in
/// archive order. Entries whose names would escape `directory` are skipped.
#[cfg(feature = "zip")]
pub fn extract_archive(source: &Path, directory: &Path) -> Result<Vec<PathBuf>> {
    let handle = BufReader::new(fs::File::open(source)?);
    let mut archive = zip::ZipArchive::new(handle)?;
    let mut extracted = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        let relative = match entry.enclosed_name() {
            Some(name) => name,
            None => {
                warn!("Skipping unsafe zip entry name {}", entry.name());
                continue;
            }
        };
        let target = directory.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = fs::File::create(&target)?;
        io::copy(&mut entry, &mut out)?;
        extracted.push(target);
    }
    Ok(extracted)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_from_file_name() {
        assert_eq!(
            Compression::from_file_name("spectra.mgf.gz"),
            Some((Compression::Gzip, "spectra.mgf".to_string()))
        );
        assert_eq!(
            Compression::from_path("data/Spectra.MGF.GZIP"),
            Some((Compression::Gzip, "Spectra.MGF".to_string()))
        );
        #[cfg(feature = "bzip2")]
        assert_eq!(
            Compression::from_file_name("x.pkl.bz2"),
            Some((Compression::Bzip2, "x.pkl".to_string()))
        );
        #[cfg(feature = "zip")]
        assert_eq!(
            Compression::from_file_name("x.zip"),
            Some((Compression::Zip, "x".to_string()))
        );
        assert_eq!(Compression::from_file_name("spectra.mgf"), None);
        assert_eq!(Compression::from_file_name(".gz"), None);
    }

    #[test]
    fn test_magic() {
        assert_eq!(Compression::from_magic(b"\x1f\x8b\x08\x00"), Some(Compression::Gzip));
        #[cfg(feature = "bzip2")]
        assert_eq!(Compression::from_magic(b"BZh91AY"), Some(Compression::Bzip2));
        assert_eq!(Compression::from_magic(b"BEGIN IONS"), None);
    }

    #[test]
    fn test_round_trip_streams() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let source = dir.path().join("peaks.xy");
        let content = "100.1 50\n200.2 75\n".repeat(50);
        fs::write(&source, &content)?;
        for compression in Compression::all().iter().filter(|c| !c.is_archive()) {
            let packed = dir.path().join(format!("peaks.xy{}", compression.suffix()));
            compression.compress_file(&source, &packed, "peaks.xy", 6)?;
            let unpacked = dir.path().join(format!("peaks.{}.xy", compression.name()));
            compression.decompress_file(&packed, &unpacked)?;
            assert_eq!(fs::read_to_string(unpacked)?, content, "{compression:?}");
        }
        Ok(())
    }

    #[cfg(feature = "zip")]
    #[test]
    fn test_round_trip_archive() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let source = dir.path().join("peaks.xy");
        fs::write(&source, "100.1 50\n")?;
        let packed = dir.path().join("peaks.xy.zip");
        Compression::Zip.compress_file(&source, &packed, "inner.xy", 6)?;
        let out = dir.path().join("entries");
        fs::create_dir_all(&out)?;
        let entries = extract_archive(&packed, &out)?;
        assert_eq!(entries, vec![out.join("inner.xy")]);
        assert_eq!(fs::read_to_string(&entries[0])?, "100.1 50\n");
        assert!(Compression::Zip.decompress_file(&packed, &out.join("x")).is_err());
        Ok(())
    }
}
