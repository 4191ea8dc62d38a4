//! Read and write PKL peak lists.
//!
//! A PKL file holds any number of peak lists separated by blank lines. The first
//! line of each list is `parent_mz parent_intensity parent_charge`, followed by
//! one `mz intensity` line per peak. A parent charge of `0` means unknown.
use std::io::{self, prelude::*};

use crate::error::{PeakListError, Result};
use crate::io::reader::{
    parse_charge, parse_peak_line, EventQueue, LineCursor, ParseEvent, PeakListGrammar,
    StreamingPeakListReader,
};
use crate::io::writer::{FormatCapabilities, PeakListEmitter, PeakListHeader, StreamingPeakListWriter};
use crate::peaks::{Peak, PeakListDescription};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PKLParserState {
    Header,
    Peaks,
    /// Skipping the rest of a record until the next blank line
    Skipping,
    Done,
}

pub struct PKLGrammar<R: BufRead> {
    cursor: LineCursor<R>,
    pub state: PKLParserState,
    queue: EventQueue,
    anomaly: Option<PeakListError>,
}

fn parse_header(line: &str) -> std::result::Result<PeakListDescription, String> {
    let mut tokens = line.split_ascii_whitespace();
    let mz: f64 = match tokens.next() {
        Some(tok) => tok
            .parse()
            .map_err(|e| format!("Malformed parent m/z {tok}: {e}"))?,
        None => return Err("Empty header line".into()),
    };
    let intensity: Option<f64> = match tokens.next() {
        Some(tok) => Some(
            tok.parse()
                .map_err(|e| format!("Malformed parent intensity {tok}: {e}"))?,
        ),
        None => None,
    };
    let charge = match tokens.next() {
        Some(tok) => Some(parse_charge(tok)?).filter(|z| *z != 0),
        None => None,
    };
    Ok(PeakListDescription {
        parent_mz: Some(mz),
        parent_intensity: intensity,
        parent_charge: charge,
        ..Default::default()
    })
}

impl<R: BufRead> PKLGrammar<R> {
    pub fn new(handle: R) -> Self {
        Self {
            cursor: LineCursor::new(handle),
            state: PKLParserState::Header,
            queue: EventQueue::default(),
            anomaly: None,
        }
    }

    fn malformed(&mut self, line: &str, reason: String) {
        let reason = format!("line {}: {reason}", self.cursor.line_number());
        self.anomaly = Some(PeakListError::malformed(line, reason));
    }

    fn handle_line(&mut self, line: &str) {
        let blank = line.is_empty();
        match self.state {
            PKLParserState::Header if blank => {}
            PKLParserState::Header => match parse_header(line) {
                Ok(description) => {
                    self.queue.push(ParseEvent::Start(description));
                    self.state = PKLParserState::Peaks;
                }
                Err(reason) => {
                    self.malformed(line, reason);
                    self.state = PKLParserState::Skipping;
                }
            },
            PKLParserState::Peaks if blank => {
                self.queue.push(ParseEvent::End);
                self.state = PKLParserState::Header;
            }
            PKLParserState::Peaks => match parse_peak_line(line) {
                Ok(peak) => self.queue.push(ParseEvent::Peak(peak)),
                Err(reason) => {
                    self.malformed(line, reason);
                    self.queue.push(ParseEvent::End);
                    self.state = PKLParserState::Skipping;
                }
            },
            PKLParserState::Skipping if blank => self.state = PKLParserState::Header,
            PKLParserState::Skipping | PKLParserState::Done => {}
        }
    }
}

impl<R: BufRead> PeakListGrammar for PKLGrammar<R> {
    fn format_name(&self) -> &str {
        "PKL"
    }

    fn parse_next(&mut self) -> Result<ParseEvent> {
        loop {
            if let Some(event) = self.queue.pop() {
                return Ok(event);
            }
            if self.state == PKLParserState::Done {
                return Ok(ParseEvent::Eof);
            }
            match self.cursor.next_line()? {
                Some(line) => self.handle_line(line.trim()),
                None => {
                    if self.state == PKLParserState::Peaks {
                        self.queue.push(ParseEvent::End);
                    }
                    self.state = PKLParserState::Done;
                }
            }
        }
    }

    fn take_anomaly(&mut self) -> Option<PeakListError> {
        self.anomaly.take()
    }
}

/// Writes the parent ion header line and bare `mz intensity` peak lines
#[derive(Debug, Default, Clone, Copy)]
pub struct PKLEmitter;

impl PeakListEmitter for PKLEmitter {
    fn format_name(&self) -> &str {
        "PKL"
    }

    fn capabilities(&self) -> FormatCapabilities {
        FormatCapabilities::MODELS_PARENT | FormatCapabilities::REQUIRES_PARENT_MZ
    }

    fn begin_peak_list<W: io::Write>(&mut self, out: &mut W, header: &PeakListHeader) -> io::Result<()> {
        let desc = &header.description;
        writeln!(
            out,
            "{} {} {}",
            desc.parent_mz.unwrap_or_default(),
            desc.parent_intensity.unwrap_or_default(),
            desc.parent_charge.unwrap_or_default()
        )
    }

    fn write_peak<W: io::Write>(&mut self, out: &mut W, peak: &Peak) -> io::Result<()> {
        writeln!(out, "{} {}", peak.mz, peak.intensity)
    }

    fn end_peak_list<W: io::Write>(&mut self, _out: &mut W) -> io::Result<()> {
        Ok(())
    }

    fn separator<W: io::Write>(&mut self, out: &mut W) -> io::Result<()> {
        writeln!(out)
    }
}

pub type PKLReader<R> = StreamingPeakListReader<PKLGrammar<R>>;
pub type PKLWriter<W> = StreamingPeakListWriter<W, PKLEmitter>;

impl<R: BufRead> StreamingPeakListReader<PKLGrammar<R>> {
    pub fn new(handle: R) -> Self {
        Self::from_grammar(PKLGrammar::new(handle))
    }
}

impl<W: io::Write> StreamingPeakListWriter<W, PKLEmitter> {
    pub fn new(handle: W) -> Self {
        Self::from_emitter(handle, PKLEmitter)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::io::{PeakListReader, PeakListWriter};
    use crate::peaks::PeakList;

    const TEXT: &str = "500.25 1000.0 2
100.1 50.0
200.2 75.0

600.1 0 0
150.0 10.0


700.5 20.0 3
";

    #[test]
    fn test_reader() -> Result<()> {
        let mut reader = PKLReader::new(io::Cursor::new(TEXT));
        let lists: Vec<_> = reader.peak_lists().collect::<Result<_>>()?;
        assert_eq!(lists.len(), 3);
        assert_eq!(lists[0].len(), 2);
        assert_eq!(lists[0].parent_peak(), Some(Peak::with_charge(500.25, 1000.0, 2)));
        assert_eq!(lists[1].description.parent_charge, None);
        assert_eq!(lists[1].description.parent_intensity, Some(0.0));
        assert!(lists[2].is_empty());
        assert_eq!(lists[2].description.parent_charge, Some(3));
        Ok(())
    }

    #[test_log::test]
    fn test_malformed() -> Result<()> {
        let text = "500.25 1000.0 2
100.1 50.0
oops
300.0 1.0

not a header
1.0 1.0

600.1 0 1
150.0 10.0
";
        let mut reader = PKLReader::new(io::Cursor::new(text));
        let lists: Vec<_> = reader.peak_lists().collect::<Result<_>>()?;
        assert_eq!(lists.len(), 2);
        assert_eq!(lists[0].len(), 1);
        assert_eq!(lists[1].description.parent_mz, Some(600.1));
        assert_eq!(lists[1].len(), 1);
        assert!(reader.last_anomaly().is_some());
        Ok(())
    }

    #[test]
    fn test_round_trip() -> Result<()> {
        let mut first: PeakList = vec![Peak::new(100.1, 50.0), Peak::new(200.2, 75.0)]
            .into_iter()
            .collect();
        first.description.parent_mz = Some(500.25);
        first.description.parent_charge = Some(2);
        first.description.parent_intensity = Some(12.5);
        let mut second: PeakList = vec![Peak::new(150.0, 10.0)].into_iter().collect();
        second.description.parent_mz = Some(600.1);

        let mut writer = PKLWriter::new(Vec::new());
        writer.write_peak_list(&first)?;
        writer.write_peak_list(&second)?;
        let buffer = writer.into_inner()?;

        let mut reader = PKLReader::new(io::Cursor::new(buffer));
        let lists: Vec<_> = reader.peak_lists().collect::<Result<_>>()?;
        assert_eq!(lists.len(), 2);
        assert_eq!(lists[0].peaks, first.peaks);
        assert_eq!(lists[0].parent_peak(), first.parent_peak());
        assert_eq!(lists[1].peaks, second.peaks);
        assert_eq!(lists[1].description.parent_mz, Some(600.1));
        assert_eq!(lists[1].description.parent_charge, None);
        Ok(())
    }

    #[test]
    fn test_requires_parent() {
        let mut writer = PKLWriter::new(Vec::new());
        let peaks: PeakList = vec![Peak::new(100.0, 1.0)].into_iter().collect();
        let err = writer.write_peak_list(&peaks).unwrap_err();
        assert!(matches!(err, PeakListError::IncompatibleFormat { .. }));
    }
}
