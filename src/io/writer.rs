//! The lifecycle shared by every format writer.
//!
//! A format only describes how to lay out a peak list through a [`PeakListEmitter`];
//! [`StreamingPeakListWriter`] decides when a list begins and ends, enforces what the
//! format requires, and owns the flush and close discipline.
use std::io::{self, prelude::*, BufWriter};

use bitflags::bitflags;
use log::{debug, trace, warn};

use crate::error::{PeakListError, Result};
use crate::io::traits::PeakListWriter;
use crate::peaks::{Peak, PeakList, PeakListDescription};

bitflags! {
    /// What a format can express, and what it insists on
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FormatCapabilities: u8 {
        /// At most one peak list per destination
        const SINGLE_SPECTRUM = 1;
        /// A parent m/z must be set before the first peak of a list
        const REQUIRES_PARENT_MZ = 1 << 1;
        /// A parent charge must be set before the first peak of a list
        const REQUIRES_PARENT_CHARGE = 1 << 2;
        const MODELS_PARENT = 1 << 3;
        const MODELS_NAME = 1 << 4;
        const MODELS_TANDEM = 1 << 5;
        /// Arbitrary key/value header entries
        const MODELS_PARAMS = 1 << 6;
    }
}

/// The meta-information collected for the peak list being written
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PeakListHeader {
    pub description: PeakListDescription,
    pub tandem_count: Option<u32>,
    pub parent_peak_list: Option<PeakListDescription>,
}

impl PeakListHeader {
    pub fn is_empty(&self) -> bool {
        self.description.is_empty() && self.tandem_count.is_none() && self.parent_peak_list.is_none()
    }
}

/// The format specific part of a writer.
pub trait PeakListEmitter {
    fn format_name(&self) -> &str;

    fn capabilities(&self) -> FormatCapabilities;

    fn begin_peak_list<W: io::Write>(&mut self, out: &mut W, header: &PeakListHeader) -> io::Result<()>;

    fn write_peak<W: io::Write>(&mut self, out: &mut W, peak: &Peak) -> io::Result<()>;

    fn end_peak_list<W: io::Write>(&mut self, out: &mut W) -> io::Result<()>;

    /// Written between two consecutive peak lists
    fn separator<W: io::Write>(&mut self, _out: &mut W) -> io::Result<()> {
        Ok(())
    }

    /// Written once after the last peak list
    fn finish<W: io::Write>(&mut self, _out: &mut W) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    Fresh,
    ParentSet,
    Writing,
    Closed,
}

/// A [`PeakListWriter`] driving a [`PeakListEmitter`].
///
/// The meta-information of a peak list is held back until its first peak or its
/// end, so setters may be called in any order before peaks are written. Nothing
/// of a list is emitted when the format's requirements are not met.
///
/// [`PeakListWriter::start_peak_list`] only finishes the current list once it
/// exists, that is once a peak was written or meta-information was set after an
/// explicit start. Meta-information set before the first start carries over into
/// the list that start begins.
///
/// A second peak list on a single-spectrum format is rejected with
/// [`PeakListError::CanOnlyContainOneSpectrum`], whether it is started through
/// [`PeakListWriter::start_peak_list`] or [`PeakListWriter::write_peak_list`].
/// The first peak list is kept and committed on close.
pub struct StreamingPeakListWriter<W: io::Write, E: PeakListEmitter> {
    handle: Option<BufWriter<W>>,
    emitter: E,
    state: WriterState,
    header: PeakListHeader,
    list_started: bool,
    lists_written: usize,
    list_open: bool,
}

impl<W: io::Write, E: PeakListEmitter> StreamingPeakListWriter<W, E> {
    pub fn from_emitter(handle: W, emitter: E) -> Self {
        Self {
            handle: Some(BufWriter::new(handle)),
            emitter,
            state: WriterState::Fresh,
            header: PeakListHeader::default(),
            list_started: false,
            lists_written: 0,
            list_open: false,
        }
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    pub fn capabilities(&self) -> FormatCapabilities {
        self.emitter.capabilities()
    }

    /// The number of peak lists emitted so far, including one still open
    pub fn lists_written(&self) -> usize {
        self.lists_written + self.list_open as usize
    }

    /// Close the writer and recover the destination
    pub fn into_inner(mut self) -> Result<W> {
        self.close()?;
        match self.handle.take() {
            Some(handle) => handle.into_inner().map_err(|e| e.into_error().into()),
            None => Err(PeakListError::Closed),
        }
    }

    fn check_open(&self) -> Result<()> {
        if self.state == WriterState::Closed {
            Err(PeakListError::Closed)
        } else {
            Ok(())
        }
    }

    fn models(&self, capability: FormatCapabilities) -> bool {
        self.emitter.capabilities().contains(capability)
    }

    /// The header of the current list, unless its peaks are already being written
    fn header_mut(&mut self, field: &str) -> Result<&mut PeakListHeader> {
        self.check_open()?;
        if self.list_open {
            return Err(PeakListError::incompatible(
                self.emitter.format_name(),
                format!("the {field} must be set before the first peak of a peak list"),
            ));
        }
        Ok(&mut self.header)
    }

    /// Whether any part of the current peak list exists yet
    fn list_pending(&self) -> bool {
        self.list_open || (self.list_started && !self.header.is_empty())
    }

    fn check_requirements(&self) -> Result<()> {
        let caps = self.emitter.capabilities();
        let description = &self.header.description;
        if caps.contains(FormatCapabilities::REQUIRES_PARENT_MZ) && description.parent_mz.is_none() {
            return Err(PeakListError::incompatible(
                self.emitter.format_name(),
                "the parent ion m/z must be set before writing peaks",
            ));
        }
        if caps.contains(FormatCapabilities::REQUIRES_PARENT_CHARGE)
            && description.parent_charge.is_none()
        {
            return Err(PeakListError::incompatible(
                self.emitter.format_name(),
                "the parent ion charge must be set before writing peaks",
            ));
        }
        Ok(())
    }

    fn open_list(&mut self) -> Result<()> {
        self.check_requirements()?;
        let handle = self.handle.as_mut().ok_or(PeakListError::Closed)?;
        if self.lists_written > 0 {
            self.emitter.separator(handle)?;
        }
        self.emitter.begin_peak_list(handle, &self.header)?;
        self.list_open = true;
        self.state = WriterState::Writing;
        trace!(
            "Began {} peak list {}",
            self.emitter.format_name(),
            self.lists_written + 1
        );
        Ok(())
    }

    /// Emit the trailing end of the current list. A list without peaks is only
    /// written when it carries meta-information.
    fn finish_list(&mut self) -> Result<()> {
        if !self.list_open && !self.header.is_empty() {
            self.open_list()?;
        }
        if self.list_open {
            let handle = self.handle.as_mut().ok_or(PeakListError::Closed)?;
            self.emitter.end_peak_list(handle)?;
            self.list_open = false;
            self.lists_written += 1;
        }
        self.header = PeakListHeader::default();
        self.state = WriterState::Fresh;
        Ok(())
    }
}

impl<W: io::Write, E: PeakListEmitter> PeakListWriter for StreamingPeakListWriter<W, E> {
    fn format_name(&self) -> &str {
        self.emitter.format_name()
    }

    fn start_peak_list(&mut self) -> Result<()> {
        self.check_open()?;
        let pending = self.list_pending();
        if self.models(FormatCapabilities::SINGLE_SPECTRUM) && (pending || self.lists_written > 0) {
            return Err(PeakListError::CanOnlyContainOneSpectrum(
                self.emitter.format_name().to_string(),
            ));
        }
        if pending {
            self.finish_list()?;
        }
        self.list_started = true;
        Ok(())
    }

    fn set_name(&mut self, name: &str) -> Result<()> {
        self.check_open()?;
        if self.models(FormatCapabilities::MODELS_NAME) {
            self.header_mut("name")?.description.name = Some(name.to_string());
        }
        Ok(())
    }

    fn set_param(&mut self, key: &str, value: &str) -> Result<()> {
        self.check_open()?;
        if self.models(FormatCapabilities::MODELS_PARAMS) {
            self.header_mut(key)?.description.add_param(key, value);
        }
        Ok(())
    }

    fn set_parent(&mut self, parent: &Peak) -> Result<()> {
        self.check_open()?;
        if !self.models(FormatCapabilities::MODELS_PARENT) {
            return Ok(());
        }
        let header = self.header_mut("parent ion")?;
        header.description.parent_mz = Some(parent.mz);
        // An intensity of zero carries no information
        header.description.parent_intensity = (parent.intensity != 0.0).then_some(parent.intensity);
        if parent.charge.is_some() {
            header.description.parent_charge = parent.charge;
        }
        self.state = WriterState::ParentSet;
        Ok(())
    }

    fn set_parent_peak_list(&mut self, parent: &PeakList) -> Result<()> {
        self.check_open()?;
        if self.models(FormatCapabilities::MODELS_TANDEM) {
            self.header_mut("parent peak list")?.parent_peak_list = Some(parent.description.clone());
        }
        Ok(())
    }

    fn set_tandem_count(&mut self, tandem_count: u32) -> Result<()> {
        self.check_open()?;
        if self.models(FormatCapabilities::MODELS_TANDEM) {
            self.header_mut("tandem count")?.tandem_count = Some(tandem_count);
        }
        Ok(())
    }

    fn write_peak(&mut self, peak: &Peak) -> Result<()> {
        self.check_open()?;
        self.list_started = true;
        if !self.list_open {
            self.open_list()?;
        }
        let handle = self.handle.as_mut().ok_or(PeakListError::Closed)?;
        self.emitter.write_peak(handle, peak)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.check_open()?;
        if let Some(handle) = self.handle.as_mut() {
            handle.flush()?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.state == WriterState::Closed {
            return Ok(());
        }
        if !self.list_open && !self.header.is_empty() && self.check_requirements().is_err() {
            warn!(
                "Dropping {} peak list meta-information lacking a required parent ion",
                self.emitter.format_name()
            );
            self.header = PeakListHeader::default();
        }
        let result = self.finish_list().and_then(|_| {
            let handle = self.handle.as_mut().ok_or(PeakListError::Closed)?;
            self.emitter.finish(handle)?;
            handle.flush()?;
            Ok(())
        });
        self.state = WriterState::Closed;
        debug!(
            "Closed {} writer after {} peak lists",
            self.emitter.format_name(),
            self.lists_written
        );
        result
    }
}
