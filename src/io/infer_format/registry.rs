use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Arc;

use log::debug;
use regex::{Regex, RegexBuilder};

use crate::error::Result;
use crate::io::compression::ScratchSpace;
use crate::io::dta::{DTAReader, DTAWriter};
use crate::io::pkl::{PKLReader, PKLWriter};
use crate::io::traits::{BoxedPeakListReader, BoxedPeakListWriter, BoxedRead, BoxedWrite};
use crate::io::transcode::Transcoder;
use crate::io::xy::{XyReader, XyWriter};

#[cfg(feature = "mgf")]
use crate::io::mgf::{MGFReader, MGFWriter};

/// Builds a reader over an already opened, buffered stream
pub type ReaderFactory = Arc<dyn Fn(BoxedRead) -> Result<BoxedPeakListReader> + Send + Sync>;

/// Builds a writer over an already opened stream
pub type WriterFactory = Arc<dyn Fn(BoxedWrite) -> Result<BoxedPeakListWriter> + Send + Sync>;

pub type TranscoderFactory = Arc<dyn Transcoder>;

/// Compile a case-insensitive file name or content pattern
pub fn name_pattern(expr: &str) -> Result<Regex> {
    Ok(RegexBuilder::new(expr).case_insensitive(true).build()?)
}

fn builtin_pattern(expr: &'static str) -> Regex {
    RegexBuilder::new(expr).case_insensitive(true).build().unwrap()
}

/// A format the [`FormatRegistry`] can dispatch to.
///
/// `pattern` is tested against the file name only. When `content_pattern` is set,
/// it is tested line by line against the first lines of the content to settle
/// ambiguous or unrecognized file names.
#[derive(Clone)]
pub struct FormatDescriptor<F> {
    pub name: String,
    pub pattern: Regex,
    pub content_pattern: Option<Regex>,
    pub factory: F,
}

impl<F> Debug for FormatDescriptor<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatDescriptor")
            .field("name", &self.name)
            .field("pattern", &self.pattern.as_str())
            .field(
                "content_pattern",
                &self.content_pattern.as_ref().map(|p| p.as_str()),
            )
            .finish()
    }
}

impl<F> FormatDescriptor<F> {
    pub fn new(name: impl Into<String>, pattern: Regex, factory: F) -> Self {
        Self {
            name: name.into(),
            pattern,
            content_pattern: None,
            factory,
        }
    }

    pub fn with_content_pattern(mut self, expr: &str) -> Result<Self> {
        self.content_pattern = Some(name_pattern(expr)?);
        Ok(self)
    }

    pub fn matches_name(&self, file_name: &str) -> bool {
        self.pattern.is_match(file_name)
    }

    /// Whether this descriptor can be chosen by looking at file content
    pub fn sniffs_content(&self) -> bool {
        self.content_pattern.is_some()
    }

    pub fn matches_content(&self, line: &str) -> bool {
        self.content_pattern
            .as_ref()
            .is_some_and(|p| p.is_match(line))
    }
}

impl FormatDescriptor<ReaderFactory> {
    pub fn reader<F>(name: impl Into<String>, pattern: &str, factory: F) -> Result<Self>
    where
        F: Fn(BoxedRead) -> Result<BoxedPeakListReader> + Send + Sync + 'static,
    {
        Ok(Self::new(name, name_pattern(pattern)?, Arc::new(factory)))
    }
}

impl FormatDescriptor<WriterFactory> {
    pub fn writer<F>(name: impl Into<String>, pattern: &str, factory: F) -> Result<Self>
    where
        F: Fn(BoxedWrite) -> Result<BoxedPeakListWriter> + Send + Sync + 'static,
    {
        Ok(Self::new(name, name_pattern(pattern)?, Arc::new(factory)))
    }
}

impl FormatDescriptor<TranscoderFactory> {
    pub fn transcoder<T: Transcoder + 'static>(
        name: impl Into<String>,
        pattern: &str,
        transcoder: T,
    ) -> Result<Self> {
        Ok(Self::new(name, name_pattern(pattern)?, Arc::new(transcoder)))
    }
}

#[cfg(feature = "mgf")]
fn mgf_reader(handle: BoxedRead) -> Result<BoxedPeakListReader> {
    Ok(Box::new(MGFReader::new(handle)))
}

#[cfg(feature = "mgf")]
fn mgf_writer(handle: BoxedWrite) -> Result<BoxedPeakListWriter> {
    Ok(Box::new(MGFWriter::new(handle)))
}

fn pkl_reader(handle: BoxedRead) -> Result<BoxedPeakListReader> {
    Ok(Box::new(PKLReader::new(handle)))
}

fn pkl_writer(handle: BoxedWrite) -> Result<BoxedPeakListWriter> {
    Ok(Box::new(PKLWriter::new(handle)))
}

fn dta_reader(handle: BoxedRead) -> Result<BoxedPeakListReader> {
    Ok(Box::new(DTAReader::new(handle)))
}

fn dta_writer(handle: BoxedWrite) -> Result<BoxedPeakListWriter> {
    Ok(Box::new(DTAWriter::new(handle)))
}

fn xy_reader(handle: BoxedRead) -> Result<BoxedPeakListReader> {
    Ok(Box::new(XyReader::new(handle)))
}

fn xy_writer(handle: BoxedWrite) -> Result<BoxedPeakListWriter> {
    Ok(Box::new(XyWriter::new(handle)))
}

/// The readers for every format compiled into this build, in lookup order
pub fn default_readers() -> Vec<FormatDescriptor<ReaderFactory>> {
    let mut readers = Vec::new();
    #[cfg(feature = "mgf")]
    readers.push(FormatDescriptor {
        name: "MGF".to_string(),
        pattern: builtin_pattern(r"\.mgf$"),
        content_pattern: Some(builtin_pattern(r"^\s*BEGIN IONS")),
        factory: Arc::new(mgf_reader) as ReaderFactory,
    });
    readers.push(FormatDescriptor::new(
        "PKL",
        builtin_pattern(r"\.pkl$"),
        Arc::new(pkl_reader) as ReaderFactory,
    ));
    readers.push(FormatDescriptor::new(
        "DTA",
        builtin_pattern(r"\.dta$"),
        Arc::new(dta_reader) as ReaderFactory,
    ));
    readers.push(FormatDescriptor::new(
        "XY",
        builtin_pattern(r"\.(xy|txt)$"),
        Arc::new(xy_reader) as ReaderFactory,
    ));
    readers
}

/// The writers for every format compiled into this build, in lookup order
pub fn default_writers() -> Vec<FormatDescriptor<WriterFactory>> {
    let mut writers = Vec::new();
    #[cfg(feature = "mgf")]
    writers.push(FormatDescriptor::new(
        "MGF",
        builtin_pattern(r"\.mgf$"),
        Arc::new(mgf_writer) as WriterFactory,
    ));
    writers.push(FormatDescriptor::new(
        "PKL",
        builtin_pattern(r"\.pkl$"),
        Arc::new(pkl_writer) as WriterFactory,
    ));
    writers.push(FormatDescriptor::new(
        "DTA",
        builtin_pattern(r"\.dta$"),
        Arc::new(dta_writer) as WriterFactory,
    ));
    writers.push(FormatDescriptor::new(
        "XY",
        builtin_pattern(r"\.(xy|txt)$"),
        Arc::new(xy_writer) as WriterFactory,
    ));
    writers
}

/// Runtime settings of a [`FormatRegistry`]
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryConfig {
    /// The most lines read when sniffing content
    pub sniff_line_limit: usize,
    /// The buffer capacity of opened files, also the most bytes read when sniffing
    pub buffer_size: usize,
    /// Where scratch directories go, the system temporary directory if unset
    pub scratch_dir: Option<PathBuf>,
    /// The level used when writing compressed files, from 0 to 9
    pub compression_level: u32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            sniff_line_limit: 20,
            buffer_size: 8192,
            scratch_dir: None,
            compression_level: 6,
        }
    }
}

/// Configure and populate a [`FormatRegistry`]
#[derive(Default)]
pub struct RegistryBuilder {
    config: RegistryConfig,
    readers: Vec<FormatDescriptor<ReaderFactory>>,
    writers: Vec<FormatDescriptor<WriterFactory>>,
    transcoders: Vec<FormatDescriptor<TranscoderFactory>>,
}

impl RegistryBuilder {
    /// Register every built-in reader and writer, ahead of anything registered
    /// later
    pub fn with_default_formats(mut self) -> Self {
        self.readers.extend(default_readers());
        self.writers.extend(default_writers());
        self
    }

    pub fn sniff_line_limit(mut self, lines: usize) -> Self {
        self.config.sniff_line_limit = lines;
        self
    }

    /// Set the buffer capacity for opened files and streams
    pub fn buffer_size(mut self, capacity: usize) -> Self {
        self.config.buffer_size = capacity.max(1);
        self
    }

    pub fn scratch_dir(mut self, directory: impl Into<PathBuf>) -> Self {
        self.config.scratch_dir = Some(directory.into());
        self
    }

    pub fn compression_level(mut self, level: u32) -> Self {
        self.config.compression_level = level.min(9);
        self
    }

    pub fn register_reader(mut self, descriptor: FormatDescriptor<ReaderFactory>) -> Self {
        self.readers.push(descriptor);
        self
    }

    pub fn register_writer(mut self, descriptor: FormatDescriptor<WriterFactory>) -> Self {
        self.writers.push(descriptor);
        self
    }

    pub fn register_transcoder(mut self, descriptor: FormatDescriptor<TranscoderFactory>) -> Self {
        self.transcoders.push(descriptor);
        self
    }

    pub fn build(self) -> FormatRegistry {
        FormatRegistry {
            config: self.config,
            readers: self.readers,
            writers: self.writers,
            transcoders: self.transcoders,
        }
    }
}

/// The table of known peak list formats, and the entry point for opening readers
/// and creating writers by file name or stream.
///
/// Descriptors are consulted in registration order and the first match wins.
/// Lookups only need `&self`, so a registry can be shared between threads once
/// it is populated.
pub struct FormatRegistry {
    pub(crate) config: RegistryConfig,
    pub(crate) readers: Vec<FormatDescriptor<ReaderFactory>>,
    pub(crate) writers: Vec<FormatDescriptor<WriterFactory>>,
    pub(crate) transcoders: Vec<FormatDescriptor<TranscoderFactory>>,
}

impl Default for FormatRegistry {
    /// A registry of every built-in format with the default configuration
    fn default() -> Self {
        Self::builder().with_default_formats().build()
    }
}

impl FormatRegistry {
    /// An empty registry
    pub fn new() -> Self {
        RegistryBuilder::default().build()
    }

    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn register_reader(&mut self, descriptor: FormatDescriptor<ReaderFactory>) {
        debug!("Registering {} reader", descriptor.name);
        self.readers.push(descriptor);
    }

    pub fn register_writer(&mut self, descriptor: FormatDescriptor<WriterFactory>) {
        debug!("Registering {} writer", descriptor.name);
        self.writers.push(descriptor);
    }

    pub fn register_transcoder(&mut self, descriptor: FormatDescriptor<TranscoderFactory>) {
        debug!("Registering {} transcoder", descriptor.name);
        self.transcoders.push(descriptor);
    }

    /// Remove every reader called `name`, returning whether any was registered
    pub fn remove_reader(&mut self, name: &str) -> bool {
        let n = self.readers.len();
        self.readers.retain(|d| d.name != name);
        n != self.readers.len()
    }

    pub fn remove_writer(&mut self, name: &str) -> bool {
        let n = self.writers.len();
        self.writers.retain(|d| d.name != name);
        n != self.writers.len()
    }

    pub fn remove_transcoder(&mut self, name: &str) -> bool {
        let n = self.transcoders.len();
        self.transcoders.retain(|d| d.name != name);
        n != self.transcoders.len()
    }

    pub fn reader_formats(&self) -> impl Iterator<Item = &FormatDescriptor<ReaderFactory>> {
        self.readers.iter()
    }

    pub fn writer_formats(&self) -> impl Iterator<Item = &FormatDescriptor<WriterFactory>> {
        self.writers.iter()
    }

    pub fn transcoder_formats(
        &self,
    ) -> impl Iterator<Item = &FormatDescriptor<TranscoderFactory>> {
        self.transcoders.iter()
    }

    /// A fresh scratch space under the configured scratch directory
    pub fn scratch_space(&self) -> ScratchSpace {
        ScratchSpace::new(self.config.scratch_dir.clone())
    }
}
