//! The pull-based reader state machine shared by every format grammar.
//!
//! A grammar only has to turn lines into [`ParseEvent`]s. [`StreamingPeakListReader`]
//! owns the lookahead slot, the peak list boundary flag and the close discipline,
//! so all formats iterate the same way.
use std::collections::VecDeque;
use std::io::{self, prelude::*};
use std::mem;

use log::{trace, warn};

use crate::error::{PeakListError, Result};
use crate::io::traits::PeakListReader;
use crate::peaks::{Peak, PeakListDescription};

/// A unit of parsed input produced by a [`PeakListGrammar`].
#[derive(Debug, Clone, PartialEq)]
pub enum ParseEvent {
    /// The meta-information of a new peak list has been read
    Start(PeakListDescription),
    Peak(Peak),
    /// The current peak list has ended
    End,
    /// The underlying stream is exhausted. Grammars keep returning this once reached.
    Eof,
}

/// The format specific part of a reader.
///
/// Malformed input must not be returned as an error. A grammar turns it into an
/// [`ParseEvent::End`] and makes the problem available through [`PeakListGrammar::take_anomaly`].
/// Errors are reserved for failures of the underlying stream.
pub trait PeakListGrammar {
    fn format_name(&self) -> &str;

    fn parse_next(&mut self) -> Result<ParseEvent>;

    /// Take the most recent malformed record the grammar skipped over, if any
    fn take_anomaly(&mut self) -> Option<PeakListError>;
}

/// A forward-only line cursor over a buffered stream. Line terminators are
/// stripped.
#[derive(Debug)]
pub struct LineCursor<R: BufRead> {
    handle: R,
    buffer: String,
    line_number: usize,
}

impl<R: BufRead> LineCursor<R> {
    pub fn new(handle: R) -> Self {
        Self {
            handle,
            buffer: String::new(),
            line_number: 0,
        }
    }

    /// Read the next line, or `None` at the end of the stream
    pub fn next_line(&mut self) -> io::Result<Option<String>> {
        self.buffer.clear();
        let z = self.handle.read_line(&mut self.buffer)?;
        if z == 0 {
            return Ok(None);
        }
        self.line_number += 1;
        let line = self.buffer.trim_end_matches(['\n', '\r']);
        Ok(Some(line.to_string()))
    }

    /// The number of lines read so far
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    pub fn into_inner(self) -> R {
        self.handle
    }
}

/// Charges beyond this magnitude are treated as malformed
pub const MAX_CHARGE: i32 = 10_000;

/// Parse a charge token like `2`, `2+`, `+2` or `3-`.
pub fn parse_charge(value: &str) -> std::result::Result<i32, String> {
    let value = value.trim();
    let (sign, value, tail_sign) = if let Some(stripped) = value.strip_suffix('+') {
        (1, stripped, true)
    } else if let Some(stripped) = value.strip_suffix('-') {
        (-1, stripped, true)
    } else {
        (1, value, false)
    };

    if tail_sign && (value.starts_with('-') || value.starts_with('+')) {
        return Err(format!("Could not parse charge value {value}"));
    }

    match value.parse::<i32>() {
        Ok(z) if z.unsigned_abs() > MAX_CHARGE as u32 => {
            Err(format!("Charge value {value} is out of range"))
        }
        Ok(z) => Ok(sign * z),
        Err(e) => Err(format!("Could not parse charge value {value}: {e}")),
    }
}

/// Parse a whitespace separated `mz intensity [charge]` peak line.
pub fn parse_peak_line(line: &str) -> std::result::Result<Peak, String> {
    let mut tokens = line.split_ascii_whitespace();
    let (mz, intensity) = match (tokens.next(), tokens.next()) {
        (Some(mz), Some(intensity)) => (mz, intensity),
        _ => return Err("Not enough columns for a peak line".into()),
    };
    let mz: f64 = mz
        .parse()
        .map_err(|e| format!("Malformed m/z value {mz}: {e}"))?;
    let intensity: f64 = intensity
        .parse()
        .map_err(|e| format!("Malformed intensity value {intensity}: {e}"))?;
    if !mz.is_finite() || !intensity.is_finite() {
        return Err("Peak coordinates must be finite".into());
    }
    let charge = match tokens.next() {
        Some(z) => Some(parse_charge(z)?),
        None => None,
    };
    Ok(Peak {
        mz,
        intensity,
        charge,
    })
}

/// A queue of events a grammar has decided on but not yet handed out. Parsing
/// one line may complete more than one event, e.g. the header of a list and
/// its first peak.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<ParseEvent>,
}

impl EventQueue {
    pub fn push(&mut self, event: ParseEvent) {
        self.events.push_back(event)
    }

    pub fn pop(&mut self) -> Option<ParseEvent> {
        self.events.pop_front()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    BeforeFirstPeakList,
    WithinPeakList,
    BetweenPeakLists,
    Exhausted,
}

/// The one-element buffer between the grammar and the caller
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Lookahead {
    #[default]
    Empty,
    Peak(Peak),
    EndOfPeakList,
}

/// A [`PeakListReader`] driving a [`PeakListGrammar`].
///
/// The reader reads up to the first peak list when it is built, so
/// [`PeakListReader::is_start_of_peak_list`] already holds for the first list
/// before anything has been pulled. [`PeakListReader::has_next`] only ever fills the lookahead slot, so it may be
/// called any number of times without changing what [`PeakListReader::next_peak`]
/// returns. When `next_peak` reports the end of a peak list, the reader reads
/// ahead past the boundary so [`PeakListReader::is_start_of_peak_list`] tells
/// whether another list follows.
pub struct StreamingPeakListReader<G: PeakListGrammar> {
    grammar: Option<G>,
    format_name: String,
    state: ReaderState,
    lookahead: Lookahead,
    start_of_peak_list: bool,
    description: PeakListDescription,
    pending_start: Option<PeakListDescription>,
    last_anomaly: Option<PeakListError>,
    /// A stream failure hit while priming, reported by the first read call
    deferred_error: Option<PeakListError>,
}

impl<G: PeakListGrammar> StreamingPeakListReader<G> {
    pub fn from_grammar(grammar: G) -> Self {
        let format_name = grammar.format_name().to_string();
        let mut reader = Self {
            grammar: Some(grammar),
            format_name,
            state: ReaderState::BeforeFirstPeakList,
            lookahead: Lookahead::Empty,
            start_of_peak_list: false,
            description: PeakListDescription::default(),
            pending_start: None,
            last_anomaly: None,
            deferred_error: None,
        };
        if let Err(e) = reader.fill() {
            warn!("Failed to read ahead to the first {} peak list: {e}", reader.format_name);
            reader.deferred_error = Some(e);
        }
        reader
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    pub fn lookahead(&self) -> &Lookahead {
        &self.lookahead
    }

    pub fn grammar(&self) -> Option<&G> {
        self.grammar.as_ref()
    }

    fn pull(&mut self) -> Result<ParseEvent> {
        let grammar = self.grammar.as_mut().ok_or(PeakListError::Closed)?;
        let event = grammar.parse_next()?;
        if let Some(anomaly) = grammar.take_anomaly() {
            warn!("Skipped malformed {} input: {anomaly}", self.format_name);
            self.last_anomaly = Some(anomaly);
        }
        trace!("{} grammar produced {event:?}", self.format_name);
        Ok(event)
    }

    fn begin(&mut self, mut description: PeakListDescription) {
        description.source_format = Some(self.format_name.clone());
        self.description = description;
        self.start_of_peak_list = true;
        self.state = ReaderState::WithinPeakList;
    }

    fn fill(&mut self) -> Result<()> {
        if self.grammar.is_none() {
            return Err(PeakListError::Closed);
        }
        if let Some(e) = self.deferred_error.take() {
            return Err(e);
        }
        while matches!(self.lookahead, Lookahead::Empty) {
            match self.state {
                ReaderState::Exhausted => return Ok(()),
                ReaderState::BeforeFirstPeakList | ReaderState::BetweenPeakLists => {
                    if let Some(description) = self.pending_start.take() {
                        self.begin(description);
                        continue;
                    }
                    match self.pull()? {
                        ParseEvent::Start(description) => self.begin(description),
                        ParseEvent::Peak(peak) => {
                            // A grammar without headers starts its list with the first peak
                            self.begin(PeakListDescription::default());
                            self.lookahead = Lookahead::Peak(peak);
                        }
                        ParseEvent::End => {}
                        ParseEvent::Eof => self.state = ReaderState::Exhausted,
                    }
                }
                ReaderState::WithinPeakList => match self.pull()? {
                    ParseEvent::Start(description) => {
                        self.pending_start = Some(description);
                        self.lookahead = Lookahead::EndOfPeakList;
                        self.state = ReaderState::BetweenPeakLists;
                    }
                    ParseEvent::Peak(peak) => self.lookahead = Lookahead::Peak(peak),
                    ParseEvent::End => {
                        self.lookahead = Lookahead::EndOfPeakList;
                        self.state = ReaderState::BetweenPeakLists;
                    }
                    ParseEvent::Eof => {
                        self.lookahead = Lookahead::EndOfPeakList;
                        self.state = ReaderState::Exhausted;
                    }
                },
            }
        }
        Ok(())
    }

    fn cross_boundary(&mut self) -> Result<()> {
        self.start_of_peak_list = false;
        self.fill()
    }
}

impl<G: PeakListGrammar> PeakListReader for StreamingPeakListReader<G> {
    fn format_name(&self) -> &str {
        &self.format_name
    }

    fn has_next(&mut self) -> Result<bool> {
        self.fill()?;
        Ok(matches!(self.lookahead, Lookahead::Peak(_)))
    }

    fn next_peak(&mut self) -> Result<Option<Peak>> {
        self.fill()?;
        match mem::take(&mut self.lookahead) {
            Lookahead::Peak(peak) => {
                self.start_of_peak_list = false;
                Ok(Some(peak))
            }
            Lookahead::EndOfPeakList => {
                self.cross_boundary()?;
                Ok(None)
            }
            Lookahead::Empty => Ok(None),
        }
    }

    fn is_start_of_peak_list(&self) -> bool {
        self.start_of_peak_list
    }

    fn description(&self) -> &PeakListDescription {
        &self.description
    }

    fn last_anomaly(&self) -> Option<&PeakListError> {
        self.last_anomaly.as_ref()
    }

    fn close(&mut self) -> Result<()> {
        if self.grammar.take().is_some() {
            trace!("Closed {} reader", self.format_name);
        }
        self.lookahead = Lookahead::Empty;
        self.pending_start = None;
        self.deferred_error = None;
        self.start_of_peak_list = false;
        self.state = ReaderState::Exhausted;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// Replays a fixed list of events
    struct ScriptedGrammar {
        events: VecDeque<ParseEvent>,
        anomaly: Option<PeakListError>,
    }

    impl ScriptedGrammar {
        fn new(events: Vec<ParseEvent>) -> Self {
            Self {
                events: events.into(),
                anomaly: None,
            }
        }
    }

    impl PeakListGrammar for ScriptedGrammar {
        fn format_name(&self) -> &str {
            "scripted"
        }

        fn parse_next(&mut self) -> Result<ParseEvent> {
            Ok(self.events.pop_front().unwrap_or(ParseEvent::Eof))
        }

        fn take_anomaly(&mut self) -> Option<PeakListError> {
            self.anomaly.take()
        }
    }

    fn named(name: &str) -> PeakListDescription {
        PeakListDescription {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_peak_line() {
        assert_eq!(parse_peak_line("100.1\t50.0").unwrap(), Peak::new(100.1, 50.0));
        assert_eq!(
            parse_peak_line("  100.1 50.0 2+ ").unwrap(),
            Peak::with_charge(100.1, 50.0, 2)
        );
        assert!(parse_peak_line("100.1").is_err());
        assert!(parse_peak_line("END").is_err());
        assert!(parse_peak_line("100.1 abc").is_err());
        assert!(parse_peak_line("NaN 1.0").is_err());
        assert_eq!(parse_charge("3-").unwrap(), -3);
        assert!(parse_charge("+2+").is_err());
        assert!(parse_charge("-2147483648").is_err());
        assert!(parse_charge("10001+").is_err());
        assert_eq!(parse_charge("-10000").unwrap(), -10_000);
    }

    #[test]
    fn test_line_cursor() -> io::Result<()> {
        let mut cursor = LineCursor::new(io::Cursor::new("a\r\nb\n\nc"));
        assert_eq!(cursor.next_line()?.as_deref(), Some("a"));
        assert_eq!(cursor.next_line()?.as_deref(), Some("b"));
        assert_eq!(cursor.next_line()?.as_deref(), Some(""));
        assert_eq!(cursor.next_line()?.as_deref(), Some("c"));
        assert_eq!(cursor.next_line()?, None);
        assert_eq!(cursor.line_number(), 4);
        Ok(())
    }

    #[test]
    fn test_state_transitions() -> Result<()> {
        let mut reader = StreamingPeakListReader::from_grammar(ScriptedGrammar::new(vec![
            ParseEvent::Start(named("a")),
            ParseEvent::Peak(Peak::new(1.0, 1.0)),
            ParseEvent::End,
            ParseEvent::Start(named("b")),
            ParseEvent::Peak(Peak::new(2.0, 1.0)),
        ]));
        assert_eq!(reader.state(), ReaderState::WithinPeakList);
        assert!(reader.is_start_of_peak_list());
        assert!(reader.has_next()?);
        assert!(reader.is_start_of_peak_list());
        assert_eq!(reader.description().name.as_deref(), Some("a"));
        assert_eq!(reader.description().source_format.as_deref(), Some("scripted"));

        assert_eq!(reader.next_peak()?, Some(Peak::new(1.0, 1.0)));
        assert!(!reader.is_start_of_peak_list());
        assert!(!reader.has_next()?);
        assert_eq!(reader.lookahead(), &Lookahead::EndOfPeakList);
        assert_eq!(reader.state(), ReaderState::BetweenPeakLists);

        assert_eq!(reader.next_peak()?, None);
        assert!(reader.is_start_of_peak_list());
        assert_eq!(reader.description().name.as_deref(), Some("b"));
        assert_eq!(reader.next_peak()?, Some(Peak::new(2.0, 1.0)));

        // End of stream without an explicit end of the list
        assert_eq!(reader.next_peak()?, None);
        assert!(!reader.is_start_of_peak_list());
        assert_eq!(reader.state(), ReaderState::Exhausted);
        assert_eq!(reader.next_peak()?, None);
        assert!(!reader.has_next()?);
        Ok(())
    }

    #[test]
    fn test_first_boundary_without_has_next() -> Result<()> {
        let mut reader = StreamingPeakListReader::from_grammar(ScriptedGrammar::new(vec![
            ParseEvent::Start(named("a")),
            ParseEvent::Peak(Peak::new(1.0, 1.0)),
            ParseEvent::End,
            ParseEvent::Start(named("b")),
            ParseEvent::Peak(Peak::new(2.0, 1.0)),
            ParseEvent::End,
        ]));
        assert!(reader.is_start_of_peak_list());
        assert_eq!(reader.description().name.as_deref(), Some("a"));

        let empty = StreamingPeakListReader::from_grammar(ScriptedGrammar::new(Vec::new()));
        assert!(!empty.is_start_of_peak_list());
        assert_eq!(empty.state(), ReaderState::Exhausted);
        Ok(())
    }

    /// Fails on its first read
    struct BrokenGrammar;

    impl PeakListGrammar for BrokenGrammar {
        fn format_name(&self) -> &str {
            "broken"
        }

        fn parse_next(&mut self) -> Result<ParseEvent> {
            Err(io::Error::new(io::ErrorKind::UnexpectedEof, "stream went away").into())
        }

        fn take_anomaly(&mut self) -> Option<PeakListError> {
            None
        }
    }

    #[test_log::test]
    fn test_read_ahead_failure_is_reported() {
        let mut reader = StreamingPeakListReader::from_grammar(BrokenGrammar);
        assert!(!reader.is_start_of_peak_list());
        assert!(matches!(reader.next_peak(), Err(PeakListError::IOError(_))));
    }

    #[test]
    fn test_start_without_end() -> Result<()> {
        let mut reader = StreamingPeakListReader::from_grammar(ScriptedGrammar::new(vec![
            ParseEvent::Start(named("a")),
            ParseEvent::Peak(Peak::new(1.0, 1.0)),
            ParseEvent::Start(named("b")),
            ParseEvent::End,
        ]));
        assert_eq!(reader.next_peak()?, Some(Peak::new(1.0, 1.0)));
        assert_eq!(reader.next_peak()?, None);
        assert!(reader.is_start_of_peak_list());
        assert_eq!(reader.description().name.as_deref(), Some("b"));
        // The second list is empty
        assert_eq!(reader.next_peak()?, None);
        assert!(!reader.is_start_of_peak_list());
        Ok(())
    }

    #[test]
    fn test_headerless_peaks() -> Result<()> {
        let mut reader = StreamingPeakListReader::from_grammar(ScriptedGrammar::new(vec![
            ParseEvent::Peak(Peak::new(1.0, 1.0)),
            ParseEvent::Peak(Peak::new(2.0, 1.0)),
        ]));
        let lists: Vec<_> = reader.peak_lists().collect::<Result<_>>()?;
        assert_eq!(lists.len(), 1);
        assert_eq!(lists[0].len(), 2);
        Ok(())
    }

    #[test]
    fn test_anomaly_is_recorded() -> Result<()> {
        let mut grammar = ScriptedGrammar::new(vec![ParseEvent::Start(named("a")), ParseEvent::End]);
        grammar.anomaly = Some(PeakListError::malformed("abc", "not a peak"));
        let mut reader = StreamingPeakListReader::from_grammar(grammar);
        assert!(!reader.has_next()?);
        assert!(matches!(
            reader.last_anomaly(),
            Some(PeakListError::MalformedRecord { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_close() -> Result<()> {
        let mut reader = StreamingPeakListReader::from_grammar(ScriptedGrammar::new(vec![
            ParseEvent::Start(named("a")),
            ParseEvent::Peak(Peak::new(1.0, 1.0)),
        ]));
        assert!(reader.has_next()?);
        reader.close()?;
        reader.close()?;
        assert!(matches!(reader.has_next(), Err(PeakListError::Closed)));
        assert!(matches!(reader.next_peak(), Err(PeakListError::Closed)));
        assert!(matches!(
            reader.get_peak_list(false, false),
            Err(PeakListError::Closed)
        ));
        Ok(())
    }
}
