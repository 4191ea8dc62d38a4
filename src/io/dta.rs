//! Read and write DTA files, one charge-deconvoluted spectrum per file.
//!
//! The first line holds the singly protonated parent mass (MH+) and the parent
//! charge. Readers convert it back to the observed parent m/z.
use std::io::{self, prelude::*};

use crate::error::{PeakListError, Result};
use crate::io::reader::{
    parse_charge, parse_peak_line, EventQueue, LineCursor, ParseEvent, PeakListGrammar,
    StreamingPeakListReader,
};
use crate::io::writer::{FormatCapabilities, PeakListEmitter, PeakListHeader, StreamingPeakListWriter};
use crate::peaks::{Peak, PeakListDescription};
use crate::utils::{mz_from_singly_protonated, singly_protonated_mass};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DTAParserState {
    Header,
    Peaks,
    Done,
}

pub struct DTAGrammar<R: BufRead> {
    cursor: LineCursor<R>,
    pub state: DTAParserState,
    queue: EventQueue,
    anomaly: Option<PeakListError>,
}

fn parse_header(line: &str) -> std::result::Result<PeakListDescription, String> {
    let mut tokens = line.split_ascii_whitespace();
    let (mh, z) = match (tokens.next(), tokens.next()) {
        (Some(mh), Some(z)) => (mh, z),
        _ => return Err("Expected a parent mass and charge".into()),
    };
    let mh: f64 = mh
        .parse()
        .map_err(|e| format!("Malformed parent mass {mh}: {e}"))?;
    let z = parse_charge(z)?;
    Ok(PeakListDescription {
        parent_mz: Some(mz_from_singly_protonated(mh, z)),
        parent_charge: (z != 0).then_some(z),
        ..Default::default()
    })
}

impl<R: BufRead> DTAGrammar<R> {
    pub fn new(handle: R) -> Self {
        Self {
            cursor: LineCursor::new(handle),
            state: DTAParserState::Header,
            queue: EventQueue::default(),
            anomaly: None,
        }
    }

    fn malformed(&mut self, line: &str, reason: String) {
        let reason = format!("line {}: {reason}", self.cursor.line_number());
        self.anomaly = Some(PeakListError::malformed(line, reason));
    }

    fn handle_line(&mut self, line: &str) {
        if line.is_empty() {
            return;
        }
        match self.state {
            DTAParserState::Header => match parse_header(line) {
                Ok(description) => {
                    self.queue.push(ParseEvent::Start(description));
                    self.state = DTAParserState::Peaks;
                }
                Err(reason) => {
                    self.malformed(line, reason);
                    self.state = DTAParserState::Done;
                }
            },
            DTAParserState::Peaks => match parse_peak_line(line) {
                Ok(peak) => self.queue.push(ParseEvent::Peak(peak)),
                Err(reason) => {
                    self.malformed(line, reason);
                    self.queue.push(ParseEvent::End);
                    self.state = DTAParserState::Done;
                }
            },
            DTAParserState::Done => {}
        }
    }
}

impl<R: BufRead> PeakListGrammar for DTAGrammar<R> {
    fn format_name(&self) -> &str {
        "DTA"
    }

    fn parse_next(&mut self) -> Result<ParseEvent> {
        loop {
            if let Some(event) = self.queue.pop() {
                return Ok(event);
            }
            if self.state == DTAParserState::Done {
                return Ok(ParseEvent::Eof);
            }
            match self.cursor.next_line()? {
                Some(line) => self.handle_line(line.trim()),
                None => {
                    if self.state == DTAParserState::Peaks {
                        self.queue.push(ParseEvent::End);
                    }
                    self.state = DTAParserState::Done;
                }
            }
        }
    }

    fn take_anomaly(&mut self) -> Option<PeakListError> {
        self.anomaly.take()
    }
}

/// Writes the declared MH+ parent mass and charge, then `mz intensity` peak lines
#[derive(Debug, Default, Clone, Copy)]
pub struct DTAEmitter;

impl PeakListEmitter for DTAEmitter {
    fn format_name(&self) -> &str {
        "DTA"
    }

    fn capabilities(&self) -> FormatCapabilities {
        FormatCapabilities::SINGLE_SPECTRUM
            | FormatCapabilities::MODELS_PARENT
            | FormatCapabilities::REQUIRES_PARENT_MZ
            | FormatCapabilities::REQUIRES_PARENT_CHARGE
    }

    fn begin_peak_list<W: io::Write>(&mut self, out: &mut W, header: &PeakListHeader) -> io::Result<()> {
        let desc = &header.description;
        let z = desc.parent_charge.unwrap_or(1);
        let mh = singly_protonated_mass(desc.parent_mz.unwrap_or_default(), z);
        writeln!(out, "{mh} {z}")
    }

    fn write_peak<W: io::Write>(&mut self, out: &mut W, peak: &Peak) -> io::Result<()> {
        writeln!(out, "{} {}", peak.mz, peak.intensity)
    }

    fn end_peak_list<W: io::Write>(&mut self, _out: &mut W) -> io::Result<()> {
        Ok(())
    }
}

pub type DTAReader<R> = StreamingPeakListReader<DTAGrammar<R>>;
pub type DTAWriter<W> = StreamingPeakListWriter<W, DTAEmitter>;

impl<R: BufRead> StreamingPeakListReader<DTAGrammar<R>> {
    pub fn new(handle: R) -> Self {
        Self::from_grammar(DTAGrammar::new(handle))
    }
}

impl<W: io::Write> StreamingPeakListWriter<W, DTAEmitter> {
    pub fn new(handle: W) -> Self {
        Self::from_emitter(handle, DTAEmitter)
    }
}
