//! Read and write bare `mz intensity` peak lists.
mod reader;
mod writer;

pub use reader::{XyGrammar, XyParserState, XyReader};
pub use writer::{XyEmitter, XyWriter};
