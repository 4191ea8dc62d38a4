//! Read and write [MGF](https://www.matrixscience.com/help/data_file_help.html#GEN) files.
//!
//! **Requires the `mgf` feature, enabled by default**
#![cfg(feature = "mgf")]
mod reader;
mod writer;

pub use reader::{MGFGrammar, MGFParserState, MGFReader};
pub use writer::{format_charge, MGFEmitter, MGFWriter};
