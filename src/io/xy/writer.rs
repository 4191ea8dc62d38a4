use std::io;

use crate::io::writer::{FormatCapabilities, PeakListEmitter, PeakListHeader, StreamingPeakListWriter};
use crate::peaks::Peak;

/// Writes one `mz intensity` line per peak and nothing else
#[derive(Debug, Default, Clone, Copy)]
pub struct XyEmitter;

impl PeakListEmitter for XyEmitter {
    fn format_name(&self) -> &str {
        "XY"
    }

    fn capabilities(&self) -> FormatCapabilities {
        FormatCapabilities::SINGLE_SPECTRUM
    }

    fn begin_peak_list<W: io::Write>(&mut self, _out: &mut W, _header: &PeakListHeader) -> io::Result<()> {
        Ok(())
    }

    fn write_peak<W: io::Write>(&mut self, out: &mut W, peak: &Peak) -> io::Result<()> {
        writeln!(out, "{} {}", peak.mz, peak.intensity)
    }

    fn end_peak_list<W: io::Write>(&mut self, _out: &mut W) -> io::Result<()> {
        Ok(())
    }
}

pub type XyWriter<W> = StreamingPeakListWriter<W, XyEmitter>;

impl<W: io::Write> StreamingPeakListWriter<W, XyEmitter> {
    pub fn new(handle: W) -> Self {
        Self::from_emitter(handle, XyEmitter)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::{PeakListError, Result};
    use crate::io::xy::XyReader;
    use crate::io::{PeakListReader, PeakListWriter};
    use crate::peaks::PeakList;

    #[test]
    fn test_round_trip_single_use() -> Result<()> {
        let mut source: PeakList = vec![Peak::new(100.1, 50.0), Peak::new(200.2, 75.0)]
            .into_iter()
            .collect();
        source.description.name = Some("dropped".into());
        source.description.parent_mz = Some(500.0);

        let mut writer = XyWriter::new(Vec::new());
        writer.write_peak_list(&source)?;
        let err = writer.write_peak_list(&source).unwrap_err();
        assert!(matches!(err, PeakListError::CanOnlyContainOneSpectrum(_)));
        let buffer = writer.into_inner()?;
        assert_eq!(String::from_utf8(buffer.clone()).unwrap(), "100.1 50\n200.2 75\n");

        let mut reader = XyReader::new(io::Cursor::new(buffer));
        let peaks = reader.get_peak_list(false, false)?.unwrap();
        assert_eq!(peaks.peaks, source.peaks);
        Ok(())
    }
}
