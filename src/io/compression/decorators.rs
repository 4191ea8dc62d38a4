use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use super::{Compression, ScratchSpace};
use crate::error::{PeakListError, Result};
use crate::io::infer_format::FormatRegistry;
use crate::io::traits::{BoxedPeakListReader, BoxedPeakListWriter, PeakListReader, PeakListWriter};
use crate::peaks::{Peak, PeakList, PeakListDescription, TandemPeakList};

/// What was unwrapped to get at the inner peak list file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    Compressed(Compression),
    /// Converted by the named external transcoder
    Transcoded(String),
}

/// A reader over a file unpacked into scratch space.
///
/// Closing it closes the inner reader first, then deletes the scratch space.
pub struct CompressedPeakListReader {
    inner: BoxedPeakListReader,
    envelope: Envelope,
    scratch: ScratchSpace,
    closed: bool,
}

impl CompressedPeakListReader {
    pub fn new(inner: BoxedPeakListReader, envelope: Envelope, scratch: ScratchSpace) -> Self {
        Self {
            inner,
            envelope,
            scratch,
            closed: false,
        }
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// The temporary paths that will be deleted on close
    pub fn scratch_paths(&self) -> Vec<PathBuf> {
        self.scratch.paths()
    }
}

impl PeakListReader for CompressedPeakListReader {
    fn format_name(&self) -> &str {
        self.inner.format_name()
    }

    fn has_next(&mut self) -> Result<bool> {
        self.inner.has_next()
    }

    fn next_peak(&mut self) -> Result<Option<Peak>> {
        self.inner.next_peak()
    }

    fn is_start_of_peak_list(&self) -> bool {
        self.inner.is_start_of_peak_list()
    }

    fn description(&self) -> &PeakListDescription {
        self.inner.description()
    }

    fn last_anomaly(&self) -> Option<&PeakListError> {
        self.inner.last_anomaly()
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let result = self.inner.close();
        self.scratch.cleanup();
        result
    }
}

/// Unpack the compressed file at `path` into `scratch` and open the inner file
/// through the registry's plain readers.
///
/// Zip archives are fully extracted and the first entry, in archive order, whose
/// name matches a registered reader is opened.
pub(crate) fn open_compressed_reader(
    registry: &FormatRegistry,
    path: &Path,
    compression: Compression,
    inner_name: &str,
    mut scratch: ScratchSpace,
) -> Result<BoxedPeakListReader> {
    let dir = scratch.create_dir()?;
    let inner_path = match compression {
        #[cfg(feature = "zip")]
        Compression::Zip => {
            let entries = super::extract_archive(path, &dir)?;
            debug!("Extracted {} entries from {}", entries.len(), path.display());
            entries
                .into_iter()
                .find(|entry| registry.find_reader_by_name(entry).is_some())
                .ok_or_else(|| PeakListError::UnknownFormat(path.display().to_string()))?
        }
        _ => {
            if inner_name.is_empty() {
                return Err(PeakListError::UnknownFormat(path.display().to_string()));
            }
            let target = dir.join(inner_name);
            let n = compression.decompress_file(path, &target)?;
            debug!(
                "Decompressed {} bytes of {} from {}",
                n,
                compression.name(),
                path.display()
            );
            target
        }
    };
    let inner = registry.open_plain_reader(&inner_path)?;
    Ok(Box::new(CompressedPeakListReader::new(
        inner,
        Envelope::Compressed(compression),
        scratch,
    )))
}

/// A writer that builds its output in scratch space and compresses it into the
/// destination when closed.
///
/// Nothing is written to the destination unless [`PeakListWriter::close`] is
/// called, dropping the writer discards the scratch output.
pub struct CompressedPeakListWriter {
    inner: BoxedPeakListWriter,
    compression: Compression,
    scratch_file: PathBuf,
    destination: PathBuf,
    entry_name: String,
    level: u32,
    scratch: ScratchSpace,
    closed: bool,
}

impl CompressedPeakListWriter {
    /// Create a writer for `inner_name` against a scratch file, to be compressed
    /// into `destination`
    pub fn create(
        registry: &FormatRegistry,
        destination: &Path,
        compression: Compression,
        inner_name: &str,
    ) -> Result<Self> {
        if inner_name.is_empty() {
            return Err(PeakListError::UnknownFormat(destination.display().to_string()));
        }
        let descriptor = registry.lookup_writer(inner_name)?;
        let mut scratch = registry.scratch_space();
        let dir = scratch.create_dir()?;
        let scratch_file = dir.join(inner_name);
        let handle = fs::File::create(&scratch_file)?;
        let inner = (descriptor.factory)(Box::new(handle))?;
        debug!(
            "Writing {} through {} into {}",
            descriptor.name,
            compression.name(),
            destination.display()
        );
        Ok(Self {
            inner,
            compression,
            scratch_file,
            destination: destination.to_path_buf(),
            entry_name: inner_name.to_string(),
            level: registry.config().compression_level,
            scratch,
            closed: false,
        })
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// The temporary paths that will be deleted on close
    pub fn scratch_paths(&self) -> Vec<PathBuf> {
        self.scratch.paths()
    }
}

impl PeakListWriter for CompressedPeakListWriter {
    fn format_name(&self) -> &str {
        self.inner.format_name()
    }

    fn start_peak_list(&mut self) -> Result<()> {
        self.inner.start_peak_list()
    }

    fn set_name(&mut self, name: &str) -> Result<()> {
        self.inner.set_name(name)
    }

    fn set_param(&mut self, key: &str, value: &str) -> Result<()> {
        self.inner.set_param(key, value)
    }

    fn set_parent(&mut self, parent: &Peak) -> Result<()> {
        self.inner.set_parent(parent)
    }

    fn set_parent_peak_list(&mut self, parent: &PeakList) -> Result<()> {
        self.inner.set_parent_peak_list(parent)
    }

    fn set_tandem_count(&mut self, tandem_count: u32) -> Result<()> {
        self.inner.set_tandem_count(tandem_count)
    }

    fn write_peak(&mut self, peak: &Peak) -> Result<()> {
        self.inner.write_peak(peak)
    }

    fn write_peak_list(&mut self, peak_list: &PeakList) -> Result<()> {
        self.inner.write_peak_list(peak_list)
    }

    fn write_tandem_peak_list(&mut self, peak_list: &TandemPeakList) -> Result<()> {
        self.inner.write_tandem_peak_list(peak_list)
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let result = self.inner.close().and_then(|_| {
            self.compression.compress_file(
                &self.scratch_file,
                &self.destination,
                &self.entry_name,
                self.level,
            )
        });
        self.scratch.cleanup();
        result
    }
}
