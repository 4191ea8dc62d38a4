//! Reading and writing peak list file formats, and dispatching between them.
//!
//! Readers implement [`PeakListReader`], writers implement [`PeakListWriter`].
//! The [`FormatRegistry`] picks the right one from a file name or the first lines
//! of content, unwrapping compression envelopes on the way.

pub mod compression;
mod infer_format;
#[cfg(feature = "mgf")]
pub mod mgf;
pub mod dta;
pub mod pkl;
pub mod reader;
pub mod transcode;
pub(crate) mod traits;
pub mod writer;
pub mod xy;
mod utils;

pub use crate::io::infer_format::{
    default_readers, default_writers, file_name_of, name_pattern, FormatDescriptor,
    FormatRegistry, ReaderFactory, RegistryBuilder, RegistryConfig, TranscoderFactory,
    WriterFactory,
};

pub use crate::io::compression::{
    retry_deferred_deletions, CompressedPeakListReader, CompressedPeakListWriter, Compression,
    Envelope, ScratchSpace,
};

#[cfg(feature = "mgf")]
pub use crate::io::mgf::{MGFReader, MGFWriter};

pub use crate::io::dta::{DTAReader, DTAWriter};
pub use crate::io::pkl::{PKLReader, PKLWriter};
pub use crate::io::xy::{XyReader, XyWriter};

pub use crate::io::reader::{ParseEvent, PeakListGrammar, StreamingPeakListReader};
pub use crate::io::writer::{
    FormatCapabilities, PeakListEmitter, PeakListHeader, StreamingPeakListWriter,
};

pub use crate::io::traits::{
    BoxedPeakListReader, BoxedPeakListWriter, BoxedRead, BoxedWrite, PeakListIterator,
    PeakListReader, PeakListWriter,
};

pub use crate::io::transcode::{CommandTranscoder, Transcoder};

pub use crate::io::utils::{sniff_lines, PreBufferedStream};
