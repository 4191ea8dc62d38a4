use std::io;

use crate::io::writer::{FormatCapabilities, PeakListEmitter, PeakListHeader, StreamingPeakListWriter};
use crate::peaks::Peak;

/// Render a charge the way MGF headers do, `2+` or `1-`
pub fn format_charge(z: i32) -> String {
    if z < 0 {
        format!("{}-", z.unsigned_abs())
    } else {
        format!("{z}+")
    }
}

/// Lays out peak lists as `BEGIN IONS` ... `END IONS` blocks.
///
/// The tandem level is written as `MSLEVEL` unless the params already carry one,
/// and the parent peak list's name as `PRECURSORSCAN`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MGFEmitter;

impl MGFEmitter {
    fn write_kv<W: io::Write>(out: &mut W, key: &str, value: &str) -> io::Result<()> {
        out.write_all(key.as_bytes())?;
        out.write_all(b"=")?;
        out.write_all(value.as_bytes())?;
        out.write_all(b"\n")?;
        Ok(())
    }
}

impl PeakListEmitter for MGFEmitter {
    fn format_name(&self) -> &str {
        "MGF"
    }

    fn capabilities(&self) -> FormatCapabilities {
        FormatCapabilities::MODELS_PARENT
            | FormatCapabilities::MODELS_NAME
            | FormatCapabilities::MODELS_TANDEM
            | FormatCapabilities::MODELS_PARAMS
    }

    fn begin_peak_list<W: io::Write>(&mut self, out: &mut W, header: &PeakListHeader) -> io::Result<()> {
        let desc = &header.description;
        out.write_all(b"BEGIN IONS\n")?;
        if let Some(name) = desc.name.as_deref() {
            Self::write_kv(out, "TITLE", name)?;
        }
        if let Some(mz) = desc.parent_mz {
            out.write_all(b"PEPMASS=")?;
            out.write_all(mz.to_string().as_bytes())?;
            if let Some(intensity) = desc.parent_intensity {
                out.write_all(b" ")?;
                out.write_all(intensity.to_string().as_bytes())?;
            }
            out.write_all(b"\n")?;
        }
        if let Some(z) = desc.parent_charge {
            Self::write_kv(out, "CHARGE", &format_charge(z))?;
        }
        for (key, value) in desc.params.iter() {
            Self::write_kv(out, key, value)?;
        }
        if let Some(level) = header.tandem_count {
            if !desc.params.contains_key("MSLEVEL") {
                Self::write_kv(out, "MSLEVEL", &level.to_string())?;
            }
        }
        if let Some(name) = header.parent_peak_list.as_ref().and_then(|d| d.name.as_deref()) {
            Self::write_kv(out, "PRECURSORSCAN", name)?;
        }
        Ok(())
    }

    fn write_peak<W: io::Write>(&mut self, out: &mut W, peak: &Peak) -> io::Result<()> {
        out.write_all(peak.mz.to_string().as_bytes())?;
        out.write_all(b" ")?;
        out.write_all(peak.intensity.to_string().as_bytes())?;
        if let Some(z) = peak.charge {
            out.write_all(b" ")?;
            out.write_all(z.to_string().as_bytes())?;
        }
        out.write_all(b"\n")?;
        Ok(())
    }

    fn end_peak_list<W: io::Write>(&mut self, out: &mut W) -> io::Result<()> {
        out.write_all(b"END IONS\n")
    }

    fn separator<W: io::Write>(&mut self, out: &mut W) -> io::Result<()> {
        out.write_all(b"\n")
    }
}

/// A streaming MGF writer
pub type MGFWriter<W> = StreamingPeakListWriter<W, MGFEmitter>;

impl<W: io::Write> StreamingPeakListWriter<W, MGFEmitter> {
    pub fn new(handle: W) -> Self {
        Self::from_emitter(handle, MGFEmitter)
    }
}
