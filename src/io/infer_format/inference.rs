use std::fs;
use std::io::{self, BufReader};
use std::path::Path;

use log::{debug, trace};

use super::registry::{FormatDescriptor, FormatRegistry, ReaderFactory, TranscoderFactory, WriterFactory};
use crate::error::{PeakListError, Result};
use crate::io::utils::{sniff_lines, PreBufferedStream};

/// The file name component of `path`, or all of it when there is none
pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

fn name_candidates<'a, F>(
    descriptors: &'a [FormatDescriptor<F>],
    file_name: &str,
) -> Vec<&'a FormatDescriptor<F>> {
    descriptors
        .iter()
        .filter(|d| d.matches_name(file_name))
        .collect()
}

/// Test each line against each sniffing candidate in turn, stopping at the first hit
fn select_by_content<'a, F>(
    candidates: &[&'a FormatDescriptor<F>],
    lines: &[String],
) -> Option<&'a FormatDescriptor<F>> {
    for line in lines {
        for candidate in candidates {
            if candidate.matches_content(line) {
                trace!("{} matched content line {line:?}", candidate.name);
                return Some(*candidate);
            }
        }
    }
    None
}

/// How a reader lookup is going to be settled
enum Resolution<'a> {
    Found(&'a FormatDescriptor<ReaderFactory>),
    /// Read the first lines of content and test them against these candidates,
    /// falling back to the descriptor given
    Sniff(
        Vec<&'a FormatDescriptor<ReaderFactory>>,
        Option<&'a FormatDescriptor<ReaderFactory>>,
    ),
    Unknown,
}

impl FormatRegistry {
    fn resolve_reader_name(&self, file_name: &str) -> Resolution<'_> {
        let candidates = name_candidates(&self.readers, file_name);
        match candidates.len() {
            0 => {
                let sniffers: Vec<_> = self.readers.iter().filter(|d| d.sniffs_content()).collect();
                if sniffers.is_empty() {
                    Resolution::Unknown
                } else {
                    Resolution::Sniff(sniffers, None)
                }
            }
            1 => Resolution::Found(candidates[0]),
            _ => {
                let fallback = candidates.iter().find(|d| !d.sniffs_content()).copied();
                let sniffers: Vec<_> = candidates.into_iter().filter(|d| d.sniffs_content()).collect();
                match (sniffers.is_empty(), fallback) {
                    (true, Some(fallback)) => Resolution::Found(fallback),
                    (true, None) => Resolution::Unknown,
                    (false, fallback) => Resolution::Sniff(sniffers, fallback),
                }
            }
        }
    }

    fn settle<'a>(
        &'a self,
        display_name: &str,
        candidates: &[&'a FormatDescriptor<ReaderFactory>],
        fallback: Option<&'a FormatDescriptor<ReaderFactory>>,
        lines: &[String],
    ) -> Result<&'a FormatDescriptor<ReaderFactory>> {
        match select_by_content(candidates, lines).or(fallback) {
            Some(descriptor) => {
                debug!("Resolved {display_name} to {}", descriptor.name);
                Ok(descriptor)
            }
            None => Err(PeakListError::UnknownFormat(display_name.to_string())),
        }
    }

    /// Find the reader for the file at `path`.
    ///
    /// A file name matching exactly one reader settles the lookup. Otherwise the
    /// first lines of the file are read, and closed again, to test against the
    /// content patterns of the candidates.
    pub fn lookup_reader<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> Result<&FormatDescriptor<ReaderFactory>> {
        let path = path.as_ref();
        let file_name = file_name_of(path);
        match self.resolve_reader_name(&file_name) {
            Resolution::Found(descriptor) => {
                debug!("Resolved {} to {} by name", path.display(), descriptor.name);
                Ok(descriptor)
            }
            Resolution::Unknown => Err(PeakListError::UnknownFormat(path.display().to_string())),
            Resolution::Sniff(candidates, fallback) => {
                let lines = {
                    let mut handle = BufReader::new(fs::File::open(path)?);
                    sniff_lines(
                        &mut handle,
                        self.config.sniff_line_limit,
                        self.config.buffer_size,
                    )?
                };
                self.settle(&path.display().to_string(), &candidates, fallback, &lines)
            }
        }
    }

    /// Find the reader for a stream called `name`, sniffing the bytes `stream`
    /// has already buffered when the name is not enough
    pub fn lookup_reader_for_stream<R: io::Read>(
        &self,
        name: &str,
        stream: &PreBufferedStream<R>,
    ) -> Result<&FormatDescriptor<ReaderFactory>> {
        let file_name = file_name_of(Path::new(name));
        match self.resolve_reader_name(&file_name) {
            Resolution::Found(descriptor) => Ok(descriptor),
            Resolution::Unknown => Err(PeakListError::UnknownFormat(name.to_string())),
            Resolution::Sniff(candidates, fallback) => {
                let lines = sniff_lines(
                    &mut io::Cursor::new(stream.prefix()),
                    self.config.sniff_line_limit,
                    self.config.buffer_size,
                )?;
                self.settle(name, &candidates, fallback, &lines)
            }
        }
    }

    /// The first reader whose name pattern matches, without looking at content
    pub fn find_reader_by_name<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> Option<&FormatDescriptor<ReaderFactory>> {
        let file_name = file_name_of(path.as_ref());
        self.readers.iter().find(|d| d.matches_name(&file_name))
    }

    /// Find the writer for `path` by name. Writers are never chosen by content.
    pub fn lookup_writer<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> Result<&FormatDescriptor<WriterFactory>> {
        let path = path.as_ref();
        let file_name = file_name_of(path);
        match self.writers.iter().find(|d| d.matches_name(&file_name)) {
            Some(descriptor) => {
                debug!("Resolved {} to {} writer", path.display(), descriptor.name);
                Ok(descriptor)
            }
            None => Err(PeakListError::UnknownFormat(path.display().to_string())),
        }
    }

    pub fn lookup_transcoder<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> Option<&FormatDescriptor<TranscoderFactory>> {
        let file_name = file_name_of(path.as_ref());
        self.transcoders.iter().find(|d| d.matches_name(&file_name))
    }
}
