//! A set of traits that are frequently needed to make full use of readers and writers.
pub use crate::io::traits::{PeakListReader, PeakListWriter};
pub use crate::io::reader::PeakListGrammar;
pub use crate::io::writer::PeakListEmitter;
pub use crate::io::transcode::Transcoder;
pub use std::io::prelude::*;
