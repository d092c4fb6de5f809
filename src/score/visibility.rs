//! Rewrites score XML so that everything past a reveal point is invisible.
//!
//! The document is streamed once. Hideable elements in hidden measures, and in
//! voice entries of a partially revealed measure that start after the reveal
//! offset, get a `<visible>0</visible>` child. Elements already invisible in the
//! source stay invisible.
//!
//! The two chords of a two-chord tremolo share one written length. While the
//! reveal point is inside a tremolo no faster than `max_tremolo`, only one of
//! the two chords is drawn, alternating every tremolo interval.

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use super::mscx::{ends_with, parse_fraction, tag_name, Score};
use super::note::Note;
use super::plan::{MeasureState, Reveal};
use crate::error::{AmusingError, AmusingResult};

pub const HIDEABLE: &[&str] = &[
    "Accidental",
    "Articulation",
    "BarLine",
    "Beam",
    "Clef",
    "Dynamic",
    "Fermata",
    "Fingering",
    "HairPin",
    "Hook",
    "KeySig",
    "Note",
    "Ottava",
    "Pedal",
    "Rest",
    "Segment",
    "Slur",
    "SlurSegment",
    "StaffText",
    "Stem",
    "StemSlash",
    "SystemText",
    "Tempo",
    "TextLine",
    "Tie",
    "TieSegment",
    "TimeSig",
    "Tremolo",
    "Trill",
];

const GRACE: &[&str] = &[
    "acciaccatura",
    "appoggiatura",
    "grace4",
    "grace8after",
    "grace16",
    "grace16after",
    "grace32",
    "grace32after",
];

/// Parts MuseScore draws for a chord even when the file omits them.
const IMPLIED_CHORD_PARTS: &[&str] = &["Stem", "Beam", "Hook"];

/// Parts a two-chord tremolo shows or hides as a unit.
const CHORD_PARTS: &[&str] = &["Accidental", "Stem", "NoteDot", "Note", "Hook"];

const VOICE_PATH: &[&str] = &["Score", "Staff", "Measure", "voice"];

/// A quarter of a hundredth of a whole note.
const TOLERANCE: f64 = 0.0025;

pub fn apply_reveal(score: &Score, reveal: &Reveal, max_tremolo: Note) -> AmusingResult<String> {
    let fail = |e: String| AmusingError::score(&score.path, e);
    let lengths = score.measure_lengths();
    let tremolos = scan_tremolos(&score.source).map_err(fail)?;
    Rewriter::new(&lengths, *reveal, tremolos, max_tremolo.value())
        .run(&score.source)
        .map_err(fail)
}

/// A chord that starts a two-chord tremolo. Both values in whole notes.
#[derive(Clone, Copy, Debug)]
struct TremoloStart {
    length: f64,
    interval: f64,
}

#[derive(Default)]
struct ChordScan {
    depth: usize,
    duration_type: Option<String>,
    dots: u32,
    subtype: Option<String>,
}

impl ChordScan {
    fn tremolo(&self) -> Option<TremoloStart> {
        let speed: u32 = self.subtype.as_deref()?.strip_prefix('c')?.parse().ok()?;
        let base = Note::from_duration_type(self.duration_type.as_deref()?)?.value();
        Some(TremoloStart {
            length: Note::from_whole_notes(base).n_dotted(self.dots).value(),
            interval: 1.0 / (speed.max(1) as f64 * (0.25 / base).max(1.0)),
        })
    }
}

/// One entry per chord directly inside a staff voice, in document order.
fn scan_tremolos(source: &str) -> Result<Vec<Option<TremoloStart>>, String> {
    let mut reader = Reader::from_str(source);
    let mut stack: Vec<String> = Vec::new();
    let mut chord: Option<ChordScan> = None;
    let mut found = Vec::new();
    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("XML error at byte {}: {}", reader.buffer_position(), e))?;
        match event {
            Event::Eof => break,
            Event::Start(e) => {
                let name = tag_name(&e);
                if name == "Chord" && chord.is_none() && ends_with(&stack, VOICE_PATH) {
                    chord = Some(ChordScan {
                        depth: stack.len(),
                        ..ChordScan::default()
                    });
                }
                stack.push(name);
            }
            Event::Empty(e) => {
                if tag_name(&e) == "Chord" && chord.is_none() && ends_with(&stack, VOICE_PATH) {
                    found.push(None);
                }
            }
            Event::Text(t) => {
                if let Some(scan) = chord.as_mut() {
                    let text = t.unescape().map_err(|e| e.to_string())?.trim().to_string();
                    let inner: Vec<&str> = stack[scan.depth..].iter().map(String::as_str).collect();
                    match inner.as_slice() {
                        ["Chord", "durationType"] => scan.duration_type = Some(text),
                        ["Chord", "dots"] => scan.dots = text.parse().unwrap_or(0),
                        ["Chord", "Tremolo", "subtype"] => scan.subtype = Some(text),
                        _ => {}
                    }
                }
            }
            Event::End(_) => {
                stack.pop();
                if chord.as_ref().map_or(false, |c| c.depth == stack.len()) {
                    found.push(chord.take().and_then(|c| c.tremolo()));
                }
            }
            _ => {}
        }
    }
    Ok(found)
}

/// Visibility of one chord of a two-chord tremolo.
#[derive(Clone, Copy, Debug, PartialEq)]
struct PairView {
    parts_hidden: bool,
    /// Everything in the chord that is not one of `CHORD_PARTS`.
    rest_hidden: bool,
}

impl PairView {
    fn whole(hidden: bool) -> Self {
        Self {
            parts_hidden: hidden,
            rest_hidden: hidden,
        }
    }

    fn hides(&self, name: &str) -> bool {
        if CHORD_PARTS.contains(&name) {
            self.parts_hidden
        } else {
            self.rest_hidden
        }
    }
}

/// Views of a tremolo pair starting at `position` and lasting `length`.
fn pair_views(
    hidden: bool,
    offset: Option<f64>,
    position: f64,
    length: f64,
    tremolo: &TremoloStart,
    max_tremolo: f64,
) -> (PairView, PairView) {
    let alternating = match offset {
        Some(offset) => {
            !hidden
                && offset < position + length - TOLERANCE
                && tremolo.interval >= max_tremolo - 1e-9
        }
        None => false,
    };
    if !alternating {
        return (PairView::whole(hidden), PairView::whole(hidden));
    }

    let elapsed = (offset.unwrap_or(position) - position).max(0.0);
    let first_shown = (elapsed % (2.0 * tremolo.interval)) / tremolo.interval < 1.0;
    (
        PairView {
            parts_hidden: !first_shown,
            rest_hidden: false,
        },
        PairView {
            parts_hidden: first_shown,
            rest_hidden: true,
        },
    )
}

struct Node {
    name: String,
    hidden: bool,
    injected: bool,
    children: Vec<String>,
}

struct MeasureCtx {
    state: MeasureState,
    length: f64,
    last: bool,
    voices: usize,
}

struct VoiceCtx {
    first: bool,
    depth: usize,
    position: f64,
    tuplet: f64,
    /// View of the next chord, which closes a tremolo pair.
    partner: Option<PairView>,
}

/// Timing facts of the voice entry currently open.
#[derive(Default)]
struct Entry {
    depth: usize,
    duration_type: Option<String>,
    dots: u32,
    normal: Option<f64>,
    actual: Option<f64>,
    fractions: Option<f64>,
    grace: bool,
    view: Option<PairView>,
    /// Second chord of a tremolo pair; takes no time of its own.
    partner: bool,
}

struct Rewriter<'a> {
    lengths: &'a [f64],
    reveal: Reveal,
    writer: Writer<Vec<u8>>,
    stack: Vec<Node>,
    skip_until: Option<usize>,
    staff_measures: usize,
    measure: Option<MeasureCtx>,
    voice: Option<VoiceCtx>,
    entry: Option<Entry>,
    tremolos: Vec<Option<TremoloStart>>,
    chords: usize,
    max_tremolo: f64,
}

fn write_hidden(writer: &mut Writer<Vec<u8>>, name: &str) -> Result<(), quick_xml::Error> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    write_visible_zero(writer)?;
    writer.write_event(Event::End(BytesEnd::new(name)))
}

fn write_visible_zero(writer: &mut Writer<Vec<u8>>) -> Result<(), quick_xml::Error> {
    writer.write_event(Event::Start(BytesStart::new("visible")))?;
    writer.write_event(Event::Text(BytesText::new("0")))?;
    writer.write_event(Event::End(BytesEnd::new("visible")))
}

impl<'a> Rewriter<'a> {
    fn new(
        lengths: &'a [f64],
        reveal: Reveal,
        tremolos: Vec<Option<TremoloStart>>,
        max_tremolo: f64,
    ) -> Self {
        Self {
            lengths,
            reveal,
            writer: Writer::new(Vec::new()),
            stack: Vec::new(),
            skip_until: None,
            staff_measures: 0,
            measure: None,
            voice: None,
            entry: None,
            tremolos,
            chords: 0,
            max_tremolo,
        }
    }

    fn run(mut self, source: &str) -> Result<String, String> {
        let mut reader = Reader::from_str(source);
        loop {
            let event = reader
                .read_event()
                .map_err(|e| format!("XML error at byte {}: {}", reader.buffer_position(), e))?;
            match event {
                Event::Eof => break,
                event => self.handle(event).map_err(|e| e.to_string())?,
            }
        }
        String::from_utf8(self.writer.into_inner()).map_err(|e| e.to_string())
    }

    fn parent(&self, up: usize) -> Option<&str> {
        self.stack
            .len()
            .checked_sub(up + 1)
            .map(|i| self.stack[i].name.as_str())
    }

    fn handle(&mut self, event: Event) -> Result<(), quick_xml::Error> {
        if let Some(depth) = self.skip_until {
            match event {
                Event::Start(_) => self.stack.push(Node {
                    name: String::new(),
                    hidden: false,
                    injected: false,
                    children: Vec::new(),
                }),
                Event::End(_) => {
                    self.stack.pop();
                    if self.stack.len() == depth {
                        self.skip_until = None;
                    }
                }
                _ => {}
            }
            return Ok(());
        }

        match event {
            Event::Start(e) => self.open(e, false),
            Event::Empty(e) => self.open(e, true),
            Event::End(e) => self.close(e),
            Event::Text(t) => {
                self.record_text(&t)?;
                self.writer.write_event(Event::Text(t))
            }
            other => self.writer.write_event(other),
        }
    }

    fn open(&mut self, e: BytesStart, empty: bool) -> Result<(), quick_xml::Error> {
        let name = tag_name(&e);
        if let Some(parent) = self.stack.last_mut() {
            parent.children.push(name.clone());
        }
        let parent_hidden = self.stack.last().map_or(false, |n| n.hidden);
        let parent_injected = self.stack.last().map_or(false, |n| n.injected);

        // Replaced by the injected flag.
        if name == "visible" && parent_injected {
            if !empty {
                self.stack.push(Node {
                    name,
                    hidden: false,
                    injected: false,
                    children: Vec::new(),
                });
                self.skip_until = Some(self.stack.len() - 1);
            }
            return Ok(());
        }

        let mut hidden = parent_hidden;
        let under_score = self.parent(0) == Some("Score");
        let under_staff = self.parent(0) == Some("Staff") && self.parent(1) == Some("Score");
        let under_measure = self.parent(0) == Some("Measure");
        match name.as_str() {
            "Staff" if under_score => self.staff_measures = 0,
            "Measure" if under_staff => {
                let index = self.staff_measures;
                let state = self.reveal.measure_state(index);
                hidden = state == MeasureState::Hidden;
                self.measure = Some(MeasureCtx {
                    state,
                    length: self.lengths.get(index).copied().unwrap_or(1.0),
                    last: index + 1 >= self.lengths.len(),
                    voices: 0,
                });
            }
            "voice" if under_measure && !empty => {
                if let Some(m) = self.measure.as_mut() {
                    self.voice = Some(VoiceCtx {
                        first: m.voices == 0,
                        depth: self.stack.len() + 1,
                        position: 0.0,
                        tuplet: 1.0,
                        partner: None,
                    });
                    m.voices += 1;
                }
            }
            _ => {}
        }

        let depth = self.stack.len();
        if let Some(voice) = self.voice.as_mut().filter(|v| v.depth == depth) {
            let offset = match self.measure.as_ref().map(|m| m.state) {
                Some(MeasureState::Partial(offset)) => Some(offset),
                _ => None,
            };
            if let Some(offset) = offset {
                hidden = voice.position > offset + TOLERANCE;
            }
            if name == "endTuplet" {
                voice.tuplet = 1.0;
            } else {
                let mut view = None;
                let mut partner = false;
                if name == "Chord" {
                    let tremolo = self.tremolos.get(self.chords).copied().flatten();
                    self.chords += 1;
                    if let Some(pair) = voice.partner.take() {
                        partner = true;
                        view = Some(pair);
                    } else if let Some(tremolo) = tremolo {
                        let length = tremolo.length * voice.tuplet;
                        let (first, second) = pair_views(
                            hidden,
                            offset,
                            voice.position,
                            length,
                            &tremolo,
                            self.max_tremolo,
                        );
                        view = Some(first);
                        voice.partner = Some(second);
                    }
                }
                if let Some(view) = view {
                    hidden = view.rest_hidden;
                }
                if !empty {
                    self.entry = Some(Entry {
                        depth: depth + 1,
                        view,
                        partner,
                        ..Entry::default()
                    });
                }
            }
        }

        let mut hideable = HIDEABLE.contains(&name.as_str());
        if let Some(entry) = self.entry.as_mut() {
            if self.stack.len() == entry.depth && GRACE.contains(&name.as_str()) {
                entry.grace = true;
            }
            if let Some(view) = entry.view.filter(|_| self.stack.len() >= entry.depth) {
                hidden = view.hides(&name);
                hideable |= CHORD_PARTS.contains(&name.as_str());
            }
        }

        let hide_this = hidden && hideable;
        if empty {
            if hide_this {
                self.writer.write_event(Event::Start(e.clone()))?;
                write_visible_zero(&mut self.writer)?;
                if name == "Tie" {
                    write_hidden(&mut self.writer, "TieSegment")?;
                }
                self.writer.write_event(Event::End(e.to_end().into_owned()))?;
            } else {
                self.writer.write_event(Event::Empty(e))?;
            }
            return Ok(());
        }

        self.writer.write_event(Event::Start(e))?;
        if hide_this {
            write_visible_zero(&mut self.writer)?;
        }
        self.stack.push(Node {
            name,
            hidden,
            injected: hide_this,
            children: Vec::new(),
        });
        Ok(())
    }

    fn record_text(&mut self, t: &BytesText) -> Result<(), quick_xml::Error> {
        let Some(entry) = self.entry.as_mut() else {
            return Ok(());
        };
        if self.stack.len() != entry.depth + 1 {
            return Ok(());
        }
        let text = t.unescape()?;
        let text = text.trim();
        match self.stack.last().map(|n| n.name.as_str()) {
            Some("durationType") => entry.duration_type = Some(text.to_string()),
            Some("dots") => entry.dots = text.parse().unwrap_or(0),
            Some("normalNotes") => entry.normal = text.parse().ok(),
            Some("actualNotes") => entry.actual = text.parse().ok(),
            Some("fractions") => entry.fractions = parse_fraction(text),
            _ => {}
        }
        Ok(())
    }

    fn close(&mut self, e: BytesEnd) -> Result<(), quick_xml::Error> {
        let Some(node) = self.stack.pop() else {
            return self.writer.write_event(Event::End(e));
        };

        let depth = self.stack.len();
        let has = |child: &str| node.children.iter().any(|c| c == child);

        if node.name == "Chord" {
            let view = self
                .entry
                .as_ref()
                .filter(|en| en.depth == depth + 1)
                .and_then(|en| en.view);
            let hides = |part: &str| view.map_or(node.hidden, |v| v.hides(part));
            for part in IMPLIED_CHORD_PARTS {
                if hides(part) && !has(part) {
                    write_hidden(&mut self.writer, part)?;
                }
            }
            if hides("StemSlash") && has("acciaccatura") && !has("StemSlash") {
                write_hidden(&mut self.writer, "StemSlash")?;
            }
        }
        if node.name == "Tie" && node.hidden && !has("TieSegment") {
            write_hidden(&mut self.writer, "TieSegment")?;
        }

        if self.entry.as_ref().map_or(false, |en| en.depth == depth + 1) {
            self.finish_entry(&node.name);
        }

        if node.name == "voice" && self.voice.as_ref().map_or(false, |v| v.depth == depth + 1) {
            if let (Some(voice), Some(measure)) = (self.voice.take(), &self.measure) {
                let implied_barline = voice.first
                    && !measure.last
                    && measure.state != MeasureState::Visible
                    && !node.children.iter().any(|c| c == "BarLine");
                if implied_barline {
                    write_hidden(&mut self.writer, "BarLine")?;
                }
            }
        }

        if node.name == "Measure" && self.measure.is_some() && self.parent(0) == Some("Staff") {
            self.measure = None;
            self.staff_measures += 1;
        }

        self.writer.write_event(Event::End(e))
    }

    /// Advances the voice position past the entry that just closed.
    fn finish_entry(&mut self, name: &str) {
        let Some(entry) = self.entry.take() else {
            return;
        };
        let measure_length = self.measure.as_ref().map_or(1.0, |m| m.length);
        let Some(voice) = self.voice.as_mut() else {
            return;
        };

        match name {
            "location" => voice.position += entry.fractions.unwrap_or(0.0),
            "Tuplet" => {
                if let (Some(normal), Some(actual)) = (entry.normal, entry.actual) {
                    if actual > 0.0 {
                        voice.tuplet = normal / actual;
                    }
                }
            }
            "Chord" | "Rest" if !entry.grace && !entry.partner => {
                let base = match entry.duration_type.as_deref() {
                    Some("measure") => Some(measure_length),
                    Some(other) => Note::from_duration_type(other).map(|n| n.value()),
                    None => None,
                };
                match base {
                    Some(base) => {
                        let dotted = Note::from_whole_notes(base).n_dotted(entry.dots).value();
                        voice.position += dotted * voice.tuplet;
                    }
                    None => log::warn!("{} without a readable durationType", name),
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::mscx::tests::triplet_score;

    /// Pitches of notes not marked invisible, in document order.
    fn visible_pitches(xml: &str) -> Vec<u32> {
        let mut reader = Reader::from_str(xml);
        let mut stack: Vec<(String, bool)> = Vec::new();
        let mut pitches = Vec::new();
        let mut pitch: Option<u32> = None;
        loop {
            match reader.read_event().unwrap() {
                Event::Start(e) => stack.push((tag_name(&e), false)),
                Event::Text(t) => {
                    let text = t.unescape().unwrap().trim().to_string();
                    let names: Vec<&str> = stack.iter().map(|(n, _)| n.as_str()).collect();
                    if names.ends_with(&["Note", "pitch"]) {
                        pitch = text.parse().ok();
                    } else if names.ends_with(&["Note", "visible"]) && text == "0" {
                        let n = stack.len();
                        stack[n - 2].1 = true;
                    }
                }
                Event::End(_) => {
                    let (name, hidden) = stack.pop().unwrap();
                    if name == "Note" {
                        if !hidden {
                            pitches.push(pitch.take().unwrap());
                        }
                        pitch = None;
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }
        pitches
    }

    fn count(xml: &str, needle: &str) -> usize {
        xml.matches(needle).count()
    }

    #[test]
    fn full_reveal_keeps_every_note() {
        let score = triplet_score();
        let xml = apply_reveal(&score, &Reveal::Full, Note::new(32)).unwrap();
        assert_eq!(visible_pitches(&xml), vec![60, 60, 62, 64, 65, 67, 69]);
        assert_eq!(count(&xml, "<visible>0</visible>"), 0);
    }

    #[test]
    fn blank_hides_every_note() {
        let score = triplet_score();
        let xml = apply_reveal(&score, &Reveal::Blank, Note::new(32)).unwrap();
        assert!(visible_pitches(&xml).is_empty());
        // Stems and beams MuseScore would draw on its own are hidden too.
        assert!(xml.contains("<Stem><visible>0</visible></Stem>"));
        // One implied barline per non-final measure in the first staff and the second.
        assert!(count(&xml, "<BarLine><visible>0</visible></BarLine>") >= 6);
        // The written final barline is hidden in place.
        assert!(xml.contains("<BarLine><visible>0</visible>"));
        Score::parse(&score.path, xml).unwrap();
    }

    #[test]
    fn partial_reveal_follows_triplet_positions() {
        let score = triplet_score();
        let cases = [
            (0.0, vec![60, 60]),
            (1.0 / 6.0, vec![60, 60, 62]),
            (2.0 / 6.0, vec![60, 60, 62, 64]),
        ];
        for (offset, expected) in cases {
            let xml = apply_reveal(&score, &Reveal::Partial { measure: 1, offset }, Note::new(32)).unwrap();
            assert_eq!(visible_pitches(&xml), expected, "offset {}", offset);
        }
    }

    #[test]
    fn through_reveals_up_to_measure() {
        let score = triplet_score();
        let xml = apply_reveal(&score, &Reveal::Through { measure: 1 }, Note::new(32)).unwrap();
        assert_eq!(visible_pitches(&xml), vec![60, 60, 62, 64]);
    }

    #[test]
    fn existing_visibility_is_not_duplicated() {
        let src = r#"<museScore><Score><Staff id="1">
            <Measure><voice>
              <Dynamic><subtype>p</subtype><visible>0</visible></Dynamic>
              <Rest><durationType>measure</durationType></Rest>
            </voice></Measure>
            <Measure><voice>
              <Chord><durationType>whole</durationType><Note><pitch>70</pitch><visible>0</visible></Note></Chord>
            </voice></Measure>
        </Staff></Score></museScore>"#;
        let score = Score::parse(std::path::Path::new("hidden.mscx"), src.to_string()).unwrap();

        let blank = apply_reveal(&score, &Reveal::Blank, Note::new(32)).unwrap();
        assert_eq!(count(&blank, "<Dynamic><visible>0</visible><subtype>"), 1);
        assert_eq!(count(&blank, "<visible>0</visible></Dynamic>"), 0);

        // Invisible in the source stays invisible when revealed.
        let full = apply_reveal(&score, &Reveal::Full, Note::new(32)).unwrap();
        assert!(visible_pitches(&full).is_empty());
        assert_eq!(full, src);
    }

    #[test]
    fn grace_notes_and_locations_shift_positions() {
        let src = r#"<museScore><Score><Staff id="1">
            <Measure><voice>
              <Chord><acciaccatura/><durationType>eighth</durationType><Note><pitch>59</pitch></Note></Chord>
              <Chord><durationType>quarter</durationType><Note><pitch>60</pitch></Note></Chord>
              <location><fractions>1/4</fractions></location>
              <Chord><durationType>quarter</durationType><dots>1</dots><Note><pitch>62</pitch></Note></Chord>
              <Chord><durationType>eighth</durationType><Note><pitch>64</pitch></Note></Chord>
            </voice></Measure>
        </Staff></Score></museScore>"#;
        let score = Score::parse(std::path::Path::new("grace.mscx"), src.to_string()).unwrap();
        let at = |offset: f64| {
            let xml = apply_reveal(&score, &Reveal::Partial { measure: 0, offset }, Note::new(32)).unwrap();
            visible_pitches(&xml)
        };
        assert_eq!(at(0.0), vec![59, 60]);
        assert_eq!(at(0.25), vec![59, 60]);
        assert_eq!(at(0.5), vec![59, 60, 62]);
        assert_eq!(at(0.875), vec![59, 60, 62, 64]);

        let blank = apply_reveal(&score, &Reveal::Blank, Note::new(32)).unwrap();
        assert!(blank.contains("<StemSlash><visible>0</visible></StemSlash>"));
    }

    #[test]
    fn hidden_ties_get_hidden_segments() {
        let src = r#"<museScore><Score><Staff id="1">
            <Measure><voice>
              <Chord><durationType>whole</durationType><Note>
                <Spanner type="Tie"><Tie></Tie><next><location><measures>1</measures></location></next></Spanner>
                <pitch>60</pitch></Note></Chord>
            </voice></Measure>
            <Measure><voice>
              <Chord><durationType>whole</durationType><Note>
                <Spanner type="Tie"><Tie/><next><location><measures>1</measures></location></next></Spanner>
                <Spanner type="Tie"><prev><location><measures>-1</measures></location></prev></Spanner>
                <pitch>60</pitch></Note></Chord>
            </voice></Measure>
            <Measure><voice>
              <Chord><durationType>whole</durationType><Note>
                <Spanner type="Tie"><prev><location><measures>-1</measures></location></prev></Spanner>
                <pitch>60</pitch></Note></Chord>
            </voice></Measure>
        </Staff></Score></museScore>"#;
        let score = Score::parse(std::path::Path::new("tie.mscx"), src.to_string()).unwrap();

        let blank = apply_reveal(&score, &Reveal::Blank, Note::new(32)).unwrap();
        assert_eq!(count(&blank, "<TieSegment><visible>0</visible></TieSegment>"), 2);
        assert_eq!(
            count(&blank, "<Tie><visible>0</visible><TieSegment><visible>0</visible></TieSegment></Tie>"),
            2
        );

        // The first tie is revealed with its measure, the second is not.
        let through = apply_reveal(&score, &Reveal::Through { measure: 0 }, Note::new(32)).unwrap();
        assert_eq!(count(&through, "<TieSegment>"), 1);

        let full = apply_reveal(&score, &Reveal::Full, Note::new(32)).unwrap();
        assert_eq!(count(&full, "TieSegment"), 0);
    }

    const TREMOLO_SCORE: &str = r#"<museScore><Score><Staff id="1">
        <Measure><voice>
          <TimeSig><sigN>4</sigN><sigD>4</sigD></TimeSig>
          <Chord><durationType>whole</durationType><Note><pitch>55</pitch></Note></Chord>
        </voice></Measure>
        <Measure><voice>
          <Chord><durationType>half</durationType><Note><pitch>60</pitch></Note><Tremolo><subtype>c32</subtype></Tremolo></Chord>
          <Chord><durationType>half</durationType><Note><pitch>64</pitch></Note></Chord>
          <Chord><durationType>half</durationType><Note><pitch>67</pitch></Note></Chord>
        </voice></Measure>
    </Staff></Score></museScore>"#;

    #[test]
    fn tremolo_pair_takes_one_chord_length() {
        let score = Score::parse(std::path::Path::new("tremolo.mscx"), TREMOLO_SCORE.to_string()).unwrap();
        assert!((score.measures[1].length - 1.0).abs() < 1e-9);
        // Sixteenth interval is slower than the limit, so both chords show at once.
        let at = |offset: f64| {
            let reveal = Reveal::Partial { measure: 1, offset };
            visible_pitches(&apply_reveal(&score, &reveal, Note::new(16)).unwrap())
        };
        assert_eq!(at(0.0), vec![55, 60, 64]);
        assert_eq!(at(0.25), vec![55, 60, 64]);
        assert_eq!(at(0.5), vec![55, 60, 64, 67]);
        assert_eq!(at(0.75), vec![55, 60, 64, 67]);

        let blank = apply_reveal(&score, &Reveal::Blank, Note::new(16)).unwrap();
        assert!(visible_pitches(&blank).is_empty());
    }

    #[test]
    fn tremolo_alternates_inside_the_pair() {
        let score = Score::parse(std::path::Path::new("tremolo.mscx"), TREMOLO_SCORE.to_string()).unwrap();
        let at = |offset: f64| {
            let reveal = Reveal::Partial { measure: 1, offset };
            apply_reveal(&score, &reveal, Note::new(32)).unwrap()
        };

        assert_eq!(visible_pitches(&at(0.0)), vec![55, 60]);
        let second = at(1.0 / 32.0);
        assert_eq!(visible_pitches(&second), vec![55, 64]);
        // The tremolo stroke stays on the first chord while its notes are hidden.
        assert!(!second.contains("<Tremolo><visible>0</visible>"));
        // Hidden stems: the first chord's and the unrevealed third chord's.
        assert_eq!(count(&second, "<Stem><visible>0</visible></Stem>"), 2);
        assert_eq!(visible_pitches(&at(2.0 / 32.0)), vec![55, 60]);
        assert_eq!(visible_pitches(&at(0.5)), vec![55, 60, 64, 67]);

        let full = apply_reveal(&score, &Reveal::Full, Note::new(32)).unwrap();
        assert_eq!(visible_pitches(&full), vec![55, 60, 64, 67]);
    }
}
