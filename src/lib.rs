//! `mzpeaklist` reads and writes mono-isotopic centroided mass spectrometry peak
//! lists across the common text formats, MGF, PKL, DTA and two column XY.
//!
//! A [`FormatRegistry`] works out the format of a file from its name, or its first
//! lines when the name is not enough, and transparently unwraps gzip, bzip2, xz,
//! LZMA and zip envelopes.
//!
//! ```no_run
//! use mzpeaklist::prelude::*;
//! use mzpeaklist::FormatRegistry;
//!
//! # fn main() -> mzpeaklist::Result<()> {
//! let registry = FormatRegistry::default();
//! let mut reader = registry.open_reader("spectra.mgf.gz")?;
//! let mut writer = registry.create_writer("spectra.pkl")?;
//! while let Some(peak_list) = reader.get_peak_list(true, false)? {
//!     writer.write_peak_list(&peak_list)?;
//! }
//! writer.close()?;
//! reader.close()?;
//! # Ok(())
//! # }
//! ```
pub mod error;
pub mod io;
pub mod peaks;
pub mod prelude;
pub mod utils;

pub use crate::error::{PeakListError, Result};

pub use crate::peaks::{Peak, PeakList, PeakListDescription, TandemPeakList};

pub use crate::io::{FormatDescriptor, FormatRegistry, RegistryBuilder};

#[cfg(feature = "mgf")]
pub use crate::io::{MGFReader, MGFWriter};

pub use crate::io::{DTAReader, DTAWriter, PKLReader, PKLWriter, XyReader, XyWriter};
