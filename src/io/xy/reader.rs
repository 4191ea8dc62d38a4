use std::io::{self, prelude::*};

use crate::error::{PeakListError, Result};
use crate::io::reader::{
    parse_peak_line, EventQueue, LineCursor, ParseEvent, PeakListGrammar, StreamingPeakListReader,
};
use crate::peaks::PeakListDescription;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum XyParserState {
    #[default]
    Initial,
    Peaks,
    Done,
}

/**
A grammar for .xy files. These files solely contain a single spectrum, with no
metadata whatsoever, so reading one yields at most one peak list. An empty file
yields none.

The format assumes `<mz> <intensity>` separated by any amount of spaces or tabs.
Blank lines are ignored. The first line that is not a peak ends the spectrum.
*/
pub struct XyGrammar<R: BufRead> {
    cursor: LineCursor<R>,
    pub state: XyParserState,
    queue: EventQueue,
    anomaly: Option<PeakListError>,
}

impl<R: BufRead> XyGrammar<R> {
    pub fn new(handle: R) -> Self {
        Self {
            cursor: LineCursor::new(handle),
            state: XyParserState::Initial,
            queue: EventQueue::default(),
            anomaly: None,
        }
    }

    fn handle_line(&mut self, line: &str) {
        if line.is_empty() {
            return;
        }
        match parse_peak_line(line) {
            Ok(peak) => {
                if self.state == XyParserState::Initial {
                    self.queue.push(ParseEvent::Start(PeakListDescription::default()));
                    self.state = XyParserState::Peaks;
                }
                self.queue.push(ParseEvent::Peak(peak));
            }
            Err(reason) => {
                let reason = format!("line {}: {reason}", self.cursor.line_number());
                self.anomaly = Some(PeakListError::malformed(line, reason));
                if self.state == XyParserState::Peaks {
                    self.queue.push(ParseEvent::End);
                }
                self.state = XyParserState::Done;
            }
        }
    }
}

impl<R: BufRead> PeakListGrammar for XyGrammar<R> {
    fn format_name(&self) -> &str {
        "XY"
    }

    fn parse_next(&mut self) -> Result<ParseEvent> {
        loop {
            if let Some(event) = self.queue.pop() {
                return Ok(event);
            }
            if self.state == XyParserState::Done {
                return Ok(ParseEvent::Eof);
            }
            match self.cursor.next_line()? {
                Some(line) => self.handle_line(line.trim()),
                None => {
                    if self.state == XyParserState::Peaks {
                        self.queue.push(ParseEvent::End);
                    }
                    self.state = XyParserState::Done;
                }
            }
        }
    }

    fn take_anomaly(&mut self) -> Option<PeakListError> {
        self.anomaly.take()
    }
}

pub type XyReader<R> = StreamingPeakListReader<XyGrammar<R>>;

impl<R: BufRead> StreamingPeakListReader<XyGrammar<R>> {
    pub fn new(handle: R) -> Self {
        Self::from_grammar(XyGrammar::new(handle))
    }
}

impl<R: io::Read> StreamingPeakListReader<XyGrammar<io::BufReader<R>>> {
    pub fn from_read(handle: R) -> Self {
        Self::from_grammar(XyGrammar::new(io::BufReader::new(handle)))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::io::PeakListReader;
    use crate::peaks::Peak;

    #[test]
    fn test_reader() -> Result<()> {
        let text = "  100.1 \t 50.0\n\n200.2 75.0  \r\n";
        let mut reader = XyReader::new(io::Cursor::new(text));
        let peaks = reader.get_peak_list(false, false)?.unwrap();
        assert_eq!(peaks.peaks, vec![Peak::new(100.1, 50.0), Peak::new(200.2, 75.0)]);
        assert!(peaks.description.name.is_none());
        assert!(!peaks.description.has_parent());
        assert!(reader.get_peak_list(false, false)?.is_none());
        Ok(())
    }

    #[test]
    fn test_empty_and_malformed() -> Result<()> {
        let mut reader = XyReader::new(io::Cursor::new("\n\n"));
        assert!(reader.get_peak_list(false, false)?.is_none());

        let mut reader = XyReader::from_read(io::Cursor::new("100.0 1.0\n200.0\n300.0 2.0\n"));
        let peaks = reader.get_peak_list(false, false)?.unwrap();
        assert_eq!(peaks.len(), 1);
        assert!(reader.last_anomaly().is_some());
        assert!(reader.get_peak_list(false, false)?.is_none());
        Ok(())
    }
}
