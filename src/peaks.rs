//! The peak and peak list types every reader produces and every writer consumes.
pub mod peak;
pub mod peak_list;

pub use crate::peaks::peak::{Peak, PEAK_TOLERANCE};
pub use crate::peaks::peak_list::{PeakList, PeakListDescription, TandemPeakList};
