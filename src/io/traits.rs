//! The contracts every peak list reader and writer honors, independent of format.
use std::io;

use crate::error::{PeakListError, Result};
use crate::peaks::{Peak, PeakList, PeakListDescription, TandemPeakList};

/// A pull-based, peak-at-a-time source of peak lists.
///
/// [`PeakListReader::next_peak`] returns `Ok(None)` both at the end of a peak
/// list and at the end of the stream. Check [`PeakListReader::is_start_of_peak_list`]
/// immediately afterwards to tell the two apart.
pub trait PeakListReader {
    /// The display name of the format being read
    fn format_name(&self) -> &str;

    /// Whether another peak is available in the current peak list. Calling this
    /// never changes what [`PeakListReader::next_peak`] returns.
    fn has_next(&mut self) -> Result<bool>;

    fn next_peak(&mut self) -> Result<Option<Peak>>;

    /// True from the moment a peak list's meta-information has been read until
    /// its first peak is consumed
    fn is_start_of_peak_list(&self) -> bool;

    /// The meta-information of the current, or upcoming, peak list
    fn description(&self) -> &PeakListDescription;

    /// The most recent malformed record that was skipped
    fn last_anomaly(&self) -> Option<&PeakListError>;

    /// Release the underlying stream. Closing twice is fine, reading after
    /// closing fails with [`PeakListError::Closed`].
    fn close(&mut self) -> Result<()>;

    /// Read the remainder of the next peak list, or `None` at the end of the stream.
    ///
    /// If `normalize` is requested on a peak list with no intensity,
    /// [`PeakListError::ZeroTotalIntensity`] is returned after the list has been consumed.
    fn get_peak_list(&mut self, sort: bool, normalize: bool) -> Result<Option<PeakList>> {
        if !self.has_next()? && !self.is_start_of_peak_list() {
            // Either the stream is exhausted or the previous list still has its end pending
            self.next_peak()?;
            if !self.is_start_of_peak_list() {
                return Ok(None);
            }
        }
        let mut description = self.description().clone();
        if description.source_format.is_none() {
            description.source_format = Some(self.format_name().to_string());
        }
        let mut peak_list = PeakList::new(description, Vec::new());
        while let Some(peak) = self.next_peak()? {
            peak_list.push(peak);
        }
        if sort {
            peak_list.sort();
        }
        if normalize {
            peak_list.normalize()?;
        }
        Ok(Some(peak_list))
    }

    /// Iterate over the remaining peak lists
    fn peak_lists(&mut self) -> PeakListIterator<'_, Self>
    where
        Self: Sized,
    {
        PeakListIterator::new(self)
    }
}

impl<R: PeakListReader + ?Sized> PeakListReader for Box<R> {
    fn format_name(&self) -> &str {
        (**self).format_name()
    }

    fn has_next(&mut self) -> Result<bool> {
        (**self).has_next()
    }

    fn next_peak(&mut self) -> Result<Option<Peak>> {
        (**self).next_peak()
    }

    fn is_start_of_peak_list(&self) -> bool {
        (**self).is_start_of_peak_list()
    }

    fn description(&self) -> &PeakListDescription {
        (**self).description()
    }

    fn last_anomaly(&self) -> Option<&PeakListError> {
        (**self).last_anomaly()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn get_peak_list(&mut self, sort: bool, normalize: bool) -> Result<Option<PeakList>> {
        (**self).get_peak_list(sort, normalize)
    }
}

/// An [`Iterator`] over the peak lists of a [`PeakListReader`], as produced by
/// [`PeakListReader::peak_lists`]. Stops after the first error.
pub struct PeakListIterator<'a, R: PeakListReader> {
    reader: &'a mut R,
    sort: bool,
    failed: bool,
}

impl<'a, R: PeakListReader> PeakListIterator<'a, R> {
    pub fn new(reader: &'a mut R) -> Self {
        Self {
            reader,
            sort: false,
            failed: false,
        }
    }

    /// Sort each peak list by m/z as it is read
    pub fn sorted(mut self) -> Self {
        self.sort = true;
        self
    }
}

impl<R: PeakListReader> Iterator for PeakListIterator<'_, R> {
    type Item = Result<PeakList>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.reader.get_peak_list(self.sort, false) {
            Ok(peak_list) => peak_list.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// A sink of peak lists with explicit boundaries.
///
/// Setters for concepts the target format does not model are silent no-ops, so
/// the same calling code works for every format.
pub trait PeakListWriter {
    fn format_name(&self) -> &str;

    /// Begin a new peak list. The first call is a no-op, later calls finish the
    /// previous peak list once anything of it has been written or set.
    fn start_peak_list(&mut self) -> Result<()>;

    fn set_name(&mut self, name: &str) -> Result<()>;

    /// Attach an additional header entry to the current peak list
    fn set_param(&mut self, key: &str, value: &str) -> Result<()>;

    /// Set the parent ion of the current peak list. Must happen before its first peak.
    fn set_parent(&mut self, parent: &Peak) -> Result<()>;

    fn set_parent_peak_list(&mut self, parent: &PeakList) -> Result<()>;

    fn set_tandem_count(&mut self, tandem_count: u32) -> Result<()>;

    fn write_peak(&mut self, peak: &Peak) -> Result<()>;

    /// Write a complete peak list and its meta-information
    fn write_peak_list(&mut self, peak_list: &PeakList) -> Result<()> {
        self.start_peak_list()?;
        write_description(self, peak_list.description())?;
        for peak in peak_list.iter() {
            self.write_peak(peak)?;
        }
        Ok(())
    }

    fn write_tandem_peak_list(&mut self, peak_list: &TandemPeakList) -> Result<()> {
        self.start_peak_list()?;
        write_description(self, peak_list.description())?;
        self.set_parent(&peak_list.parent)?;
        self.set_tandem_count(peak_list.tandem_level)?;
        if let Some(parent_peak_list) = peak_list.parent_peak_list.as_deref() {
            self.set_parent_peak_list(parent_peak_list)?;
        }
        for peak in peak_list.iter() {
            self.write_peak(peak)?;
        }
        Ok(())
    }

    /// As [`std::io::Write::flush`]
    fn flush(&mut self) -> Result<()>;

    /// Finish the trailing peak list and release the destination. Closing twice
    /// is fine, writing after closing fails with [`PeakListError::Closed`].
    fn close(&mut self) -> Result<()>;
}

fn write_description<W: PeakListWriter + ?Sized>(
    writer: &mut W,
    description: &PeakListDescription,
) -> Result<()> {
    if let Some(name) = description.name.as_deref() {
        writer.set_name(name)?;
    }
    for (key, value) in description.params.iter() {
        writer.set_param(key, value)?;
    }
    if let Some(parent) = description.parent_peak() {
        writer.set_parent(&parent)?;
    }
    Ok(())
}

impl<W: PeakListWriter + ?Sized> PeakListWriter for Box<W> {
    fn format_name(&self) -> &str {
        (**self).format_name()
    }

    fn start_peak_list(&mut self) -> Result<()> {
        (**self).start_peak_list()
    }

    fn set_name(&mut self, name: &str) -> Result<()> {
        (**self).set_name(name)
    }

    fn set_param(&mut self, key: &str, value: &str) -> Result<()> {
        (**self).set_param(key, value)
    }

    fn set_parent(&mut self, parent: &Peak) -> Result<()> {
        (**self).set_parent(parent)
    }

    fn set_parent_peak_list(&mut self, parent: &PeakList) -> Result<()> {
        (**self).set_parent_peak_list(parent)
    }

    fn set_tandem_count(&mut self, tandem_count: u32) -> Result<()> {
        (**self).set_tandem_count(tandem_count)
    }

    fn write_peak(&mut self, peak: &Peak) -> Result<()> {
        (**self).write_peak(peak)
    }

    fn write_peak_list(&mut self, peak_list: &PeakList) -> Result<()> {
        (**self).write_peak_list(peak_list)
    }

    fn write_tandem_peak_list(&mut self, peak_list: &TandemPeakList) -> Result<()> {
        (**self).write_tandem_peak_list(peak_list)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

/// A type-erased reader, as produced by the format registry
pub type BoxedPeakListReader = Box<dyn PeakListReader + Send>;

/// A type-erased writer, as produced by the format registry
pub type BoxedPeakListWriter = Box<dyn PeakListWriter + Send>;

/// The stream a reader factory consumes
pub type BoxedRead = Box<dyn io::BufRead + Send>;

/// The stream a writer factory produces into
pub type BoxedWrite = Box<dyn io::Write + Send>;
