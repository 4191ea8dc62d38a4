use std::ops::{Deref, DerefMut, Index};
use std::slice;

use indexmap::IndexMap;

use super::peak::Peak;
use crate::error::{PeakListError, Result};

/// The meta-information of a peak list.
///
/// Each parent ion field is optional so that a value a format never recorded
/// stays distinct from a recorded zero.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PeakListDescription {
    pub name: Option<String>,
    pub parent_mz: Option<f64>,
    pub parent_charge: Option<i32>,
    pub parent_intensity: Option<f64>,
    /// Header entries the source grammar carried but does not interpret, in the
    /// order they were read
    pub params: IndexMap<String, String>,
    /// The display name of the format whose reader produced this description
    pub source_format: Option<String>,
}

impl PeakListDescription {
    pub fn has_parent(&self) -> bool {
        self.parent_mz.is_some()
    }

    /// The parent ion as a [`Peak`], when its m/z is known. An unknown parent
    /// intensity is reported as zero.
    pub fn parent_peak(&self) -> Option<Peak> {
        self.parent_mz.map(|mz| Peak {
            mz,
            intensity: self.parent_intensity.unwrap_or(0.0),
            charge: self.parent_charge,
        })
    }

    pub fn set_parent(&mut self, parent: &Peak) {
        self.parent_mz = Some(parent.mz);
        self.parent_intensity = Some(parent.intensity);
        self.parent_charge = parent.charge;
    }

    pub fn get_param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(|s| s.as_str())
    }

    pub fn add_param(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.insert(key.into(), value.into());
    }

    /// Whether there is anything in this description worth writing out
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.parent_mz.is_none()
            && self.parent_charge.is_none()
            && self.params.is_empty()
    }
}

/// A mono-isotopic centroided spectrum, a sequence of [`Peak`]s and the
/// [`PeakListDescription`] read alongside them.
///
/// An empty peak list is a valid value and distinct from having reached the
/// end of a stream.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PeakList {
    pub description: PeakListDescription,
    pub peaks: Vec<Peak>,
}

impl PeakList {
    pub fn new(description: PeakListDescription, peaks: Vec<Peak>) -> Self {
        Self { description, peaks }
    }

    pub fn description(&self) -> &PeakListDescription {
        &self.description
    }

    pub fn description_mut(&mut self) -> &mut PeakListDescription {
        &mut self.description
    }

    pub fn name(&self) -> Option<&str> {
        self.description.name.as_deref()
    }

    pub fn parent_peak(&self) -> Option<Peak> {
        self.description.parent_peak()
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, Peak> {
        self.peaks.iter()
    }

    pub fn push(&mut self, peak: Peak) {
        self.peaks.push(peak)
    }

    /// Sort the peaks by ascending m/z
    pub fn sort(&mut self) {
        self.peaks.sort_by(|a, b| a.mz.total_cmp(&b.mz))
    }

    pub fn total_intensity(&self) -> f64 {
        self.peaks.iter().map(|p| p.intensity).sum()
    }

    /// Rescale the intensities so that they sum to 1.
    ///
    /// A peak list whose total intensity is zero or not finite cannot be
    /// normalized and is left untouched.
    pub fn normalize(&mut self) -> Result<()> {
        let total = self.total_intensity();
        if total == 0.0 || !total.is_finite() {
            return Err(PeakListError::ZeroTotalIntensity(total));
        }
        for peak in self.peaks.iter_mut() {
            peak.intensity /= total;
        }
        Ok(())
    }

    /// Convert this peak list into a [`TandemPeakList`] at `tandem_level`, if
    /// its parent m/z is known.
    pub fn into_tandem(self, tandem_level: u32) -> Option<TandemPeakList> {
        let parent = self.parent_peak()?;
        Some(TandemPeakList::new(self, parent, tandem_level))
    }
}

impl Index<usize> for PeakList {
    type Output = Peak;

    fn index(&self, index: usize) -> &Self::Output {
        &self.peaks[index]
    }
}

impl IntoIterator for PeakList {
    type Item = Peak;
    type IntoIter = std::vec::IntoIter<Peak>;

    fn into_iter(self) -> Self::IntoIter {
        self.peaks.into_iter()
    }
}

impl<'a> IntoIterator for &'a PeakList {
    type Item = &'a Peak;
    type IntoIter = slice::Iter<'a, Peak>;

    fn into_iter(self) -> Self::IntoIter {
        self.peaks.iter()
    }
}

impl FromIterator<Peak> for PeakList {
    fn from_iter<T: IntoIterator<Item = Peak>>(iter: T) -> Self {
        Self {
            description: PeakListDescription::default(),
            peaks: iter.into_iter().collect(),
        }
    }
}

impl Extend<Peak> for PeakList {
    fn extend<T: IntoIterator<Item = Peak>>(&mut self, iter: T) {
        self.peaks.extend(iter)
    }
}

/// A peak list produced by fragmenting a parent ion, optionally carrying the
/// peak list the parent was selected from.
#[derive(Debug, Clone, PartialEq)]
pub struct TandemPeakList {
    pub peak_list: PeakList,
    pub parent: Peak,
    pub parent_peak_list: Option<Box<PeakList>>,
    pub tandem_level: u32,
}

impl TandemPeakList {
    /// Create a new tandem peak list. The parent peak is copied into the
    /// description's parent fields.
    pub fn new(mut peak_list: PeakList, parent: Peak, tandem_level: u32) -> Self {
        peak_list.description.set_parent(&parent);
        Self {
            peak_list,
            parent,
            parent_peak_list: None,
            tandem_level,
        }
    }

    pub fn with_parent_peak_list(mut self, parent_peak_list: PeakList) -> Self {
        self.parent_peak_list = Some(Box::new(parent_peak_list));
        self
    }

    pub fn into_inner(self) -> PeakList {
        self.peak_list
    }
}

impl Deref for TandemPeakList {
    type Target = PeakList;

    fn deref(&self) -> &Self::Target {
        &self.peak_list
    }
}

impl DerefMut for TandemPeakList {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.peak_list
    }
}
