use std::io::{self, prelude::*};

use log::debug;

use crate::error::{PeakListError, Result};
use crate::io::reader::{
    parse_charge, parse_peak_line, EventQueue, LineCursor, ParseEvent, PeakListGrammar,
    StreamingPeakListReader,
};
use crate::peaks::PeakListDescription;

/// Block markers are matched without regard to case, the same way the MGF
/// content pattern sniffs them
fn is_marker(line: &str, marker: &str) -> bool {
    line.eq_ignore_ascii_case(marker)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MGFParserState {
    Start,
    FileHeader,
    ScanHeaders,
    Peaks,
    Between,
    Done,
}

/// The MGF (Mascot Generic Format) grammar.
///
/// Each `BEGIN IONS` ... `END IONS` block is one peak list. `TITLE`, `PEPMASS`
/// and `CHARGE` populate the description, every other `KEY=VALUE` header is kept
/// in its params. A line that is neither a peak nor `END IONS` inside the peak
/// block ends the peak list, and the rest of the block is skipped.
pub struct MGFGrammar<R: BufRead> {
    cursor: LineCursor<R>,
    pub state: MGFParserState,
    description: PeakListDescription,
    precursor_charge: Option<i32>,
    /// `KEY=VALUE` lines before the first `BEGIN IONS`
    file_params: Vec<(String, String)>,
    queue: EventQueue,
    anomaly: Option<PeakListError>,
}

impl<R: BufRead> MGFGrammar<R> {
    pub fn new(handle: R) -> Self {
        Self {
            cursor: LineCursor::new(handle),
            state: MGFParserState::Start,
            description: PeakListDescription::default(),
            precursor_charge: None,
            file_params: Vec::new(),
            queue: EventQueue::default(),
            anomaly: None,
        }
    }

    /// The `KEY=VALUE` entries found before the first peak list
    pub fn file_params(&self) -> &[(String, String)] {
        &self.file_params
    }

    fn malformed(&mut self, line: &str, reason: impl Into<String>) {
        let reason = format!("line {}: {}", self.cursor.line_number(), reason.into());
        self.anomaly = Some(PeakListError::malformed(line, reason));
    }

    fn take_description(&mut self) -> PeakListDescription {
        self.precursor_charge = None;
        std::mem::take(&mut self.description)
    }

    fn handle_start(&mut self, line: &str) {
        if is_marker(line, "BEGIN IONS") {
            self.state = MGFParserState::ScanHeaders;
        } else if let Some((key, value)) = line.split_once('=') {
            self.state = MGFParserState::FileHeader;
            self.file_params
                .push((key.trim().to_string(), value.trim().to_string()));
        } else {
            debug!("Skipping MGF line outside of a spectrum: {line}");
        }
    }

    fn handle_scan_header(&mut self, line: &str) {
        if is_marker(line, "END IONS") {
            let description = self.take_description();
            self.queue.push(ParseEvent::Start(description));
            self.queue.push(ParseEvent::End);
            self.state = MGFParserState::Between;
        } else if line.starts_with(|c: char| c.is_ascii_digit() || c == '.' || c == '-') {
            let description = self.take_description();
            self.queue.push(ParseEvent::Start(description));
            self.state = MGFParserState::Peaks;
            self.handle_peak(line);
        } else if let Some((key, value)) = line.split_once('=') {
            self.handle_header_entry(line, key.trim(), value.trim());
        } else {
            self.malformed(line, "No '=' in header line");
        }
    }

    fn handle_header_entry(&mut self, line: &str, key: &str, value: &str) {
        match key {
            "TITLE" => self.description.name = Some(value.to_string()),
            "PEPMASS" => {
                let mut parts = value.split_ascii_whitespace();
                let mz = match parts.next().map(|s| s.parse::<f64>()) {
                    Some(Ok(mz)) => mz,
                    Some(Err(e)) => {
                        self.malformed(line, format!("Malformed m/z value in PEPMASS header: {e}"));
                        return;
                    }
                    None => {
                        self.malformed(line, "No m/z value in PEPMASS header");
                        return;
                    }
                };
                self.description.parent_mz = Some(mz);
                self.description.parent_intensity = match parts.next().map(|s| s.parse::<f64>()) {
                    Some(Ok(intensity)) => Some(intensity),
                    Some(Err(e)) => {
                        self.malformed(line, format!("Malformed PEPMASS intensity: {e}"));
                        None
                    }
                    None => None,
                };
                match parts.next().map(parse_charge) {
                    Some(Ok(z)) => self.description.parent_charge = Some(z),
                    Some(Err(e)) => self.malformed(line, e),
                    None => self.description.parent_charge = self.precursor_charge,
                }
            }
            "CHARGE" => match parse_charge(value) {
                Ok(z) => {
                    self.precursor_charge = Some(z);
                    if self.description.parent_charge.is_none() {
                        self.description.parent_charge = Some(z);
                    }
                }
                Err(e) => self.malformed(line, e),
            },
            _ => self.description.add_param(key, value),
        }
    }

    fn handle_peak(&mut self, line: &str) {
        if is_marker(line, "END IONS") {
            self.queue.push(ParseEvent::End);
            self.state = MGFParserState::Between;
            return;
        }
        match parse_peak_line(line) {
            Ok(peak) => self.queue.push(ParseEvent::Peak(peak)),
            Err(reason) => {
                self.malformed(line, reason);
                self.queue.push(ParseEvent::End);
                self.state = MGFParserState::Between;
            }
        }
    }

    fn handle_between(&mut self, line: &str) {
        if is_marker(line, "BEGIN IONS") {
            self.state = MGFParserState::ScanHeaders;
        }
    }

    fn handle_eof(&mut self) {
        match self.state {
            MGFParserState::ScanHeaders => {
                let description = self.take_description();
                self.queue.push(ParseEvent::Start(description));
                self.queue.push(ParseEvent::End);
            }
            MGFParserState::Peaks => self.queue.push(ParseEvent::End),
            _ => {}
        }
        self.state = MGFParserState::Done;
        self.queue.push(ParseEvent::Eof);
    }
}

impl<R: BufRead> PeakListGrammar for MGFGrammar<R> {
    fn format_name(&self) -> &str {
        "MGF"
    }

    fn parse_next(&mut self) -> Result<ParseEvent> {
        loop {
            if let Some(event) = self.queue.pop() {
                return Ok(event);
            }
            if self.state == MGFParserState::Done {
                return Ok(ParseEvent::Eof);
            }
            let line = match self.cursor.next_line()? {
                Some(line) => line,
                None => {
                    self.handle_eof();
                    continue;
                }
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match self.state {
                MGFParserState::Start | MGFParserState::FileHeader => self.handle_start(line),
                MGFParserState::ScanHeaders => self.handle_scan_header(line),
                MGFParserState::Peaks => self.handle_peak(line),
                MGFParserState::Between => self.handle_between(line),
                MGFParserState::Done => {}
            }
        }
    }

    fn take_anomaly(&mut self) -> Option<PeakListError> {
        self.anomaly.take()
    }
}

/// A streaming MGF reader
pub type MGFReader<R> = StreamingPeakListReader<MGFGrammar<R>>;

impl<R: BufRead> StreamingPeakListReader<MGFGrammar<R>> {
    pub fn new(handle: R) -> Self {
        Self::from_grammar(MGFGrammar::new(handle))
    }
}

impl<R: io::Read> StreamingPeakListReader<MGFGrammar<io::BufReader<R>>> {
    pub fn from_read(handle: R) -> Self {
        Self::from_grammar(MGFGrammar::new(io::BufReader::new(handle)))
    }
}
