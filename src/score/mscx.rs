use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::{AmusingError, AmusingResult};

const DEFAULT_PAGE_WIDTH: f64 = 8.27;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MeasureInfo {
    pub index: usize,
    /// Start time from the beginning of the score, in whole notes.
    pub start: f64,
    /// Actual length in whole notes (time signature, or the `len` override of pickups).
    pub length: f64,
    pub page: u32,
    /// A page break follows this measure.
    pub page_break: bool,
}

/// A MuseScore score: the raw XML plus the timing facts read from the first staff.
#[derive(Clone, Debug)]
pub struct Score {
    pub path: PathBuf,
    pub source: String,
    /// Page width in inches.
    pub page_width: f64,
    pub measures: Vec<MeasureInfo>,
    pub page_count: u32,
}

impl Score {
    /// Reads `.mscx` directly or the score inside a `.mscz` archive.
    pub fn open(path: &Path) -> AmusingResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        let source = match ext.as_deref() {
            Some("mscx") => std::fs::read_to_string(path).map_err(|e| AmusingError::score(path, e))?,
            Some("mscz") => read_mscz(path)?,
            _ => {
                return Err(AmusingError::score(
                    path,
                    "unsupported score format (expected .mscx or .mscz)",
                ))
            }
        };
        Self::parse(path, source)
    }

    pub fn parse(path: &Path, source: String) -> AmusingResult<Self> {
        let facts = read_facts(&source).map_err(|e| AmusingError::score(path, e))?;
        if facts.measures.is_empty() {
            return Err(AmusingError::score(path, "score has no measures"));
        }

        let page_width = match facts.page_width {
            Some(w) if w > 0.0 => w,
            _ => {
                log::warn!(
                    "{}: no Style/pageWidth, assuming {} in",
                    path.display(),
                    DEFAULT_PAGE_WIDTH
                );
                DEFAULT_PAGE_WIDTH
            }
        };
        let page_count = facts.measures.last().map_or(1, |m| m.page)
            + facts.measures.last().map_or(0, |m| m.page_break as u32);

        log::info!(
            "Score {}: {} measures, {} page(s), page width {:.2}in",
            path.display(),
            facts.measures.len(),
            page_count,
            page_width
        );

        Ok(Self {
            path: path.to_path_buf(),
            source,
            page_width,
            measures: facts.measures,
            page_count,
        })
    }

    pub fn measure_lengths(&self) -> Vec<f64> {
        self.measures.iter().map(|m| m.length).collect()
    }
}

fn read_mscz(path: &Path) -> AmusingResult<String> {
    let file = std::fs::File::open(path).map_err(|e| AmusingError::score(path, e))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| AmusingError::score(path, e))?;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| AmusingError::score(path, e))?;
        if entry.name().ends_with(".mscx") {
            let mut source = String::new();
            entry
                .read_to_string(&mut source)
                .map_err(|e| AmusingError::score(path, e))?;
            log::debug!("Read {} from {}", entry.name(), path.display());
            return Ok(source);
        }
    }
    Err(AmusingError::score(path, "archive contains no .mscx file"))
}

struct Facts {
    page_width: Option<f64>,
    measures: Vec<MeasureInfo>,
}

pub(crate) fn tag_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

/// Parses `"3/8"` (or a plain number) into a float.
pub(crate) fn parse_fraction(text: &str) -> Option<f64> {
    match text.trim().split_once('/') {
        Some((n, d)) => {
            let n: f64 = n.trim().parse().ok()?;
            let d: f64 = d.trim().parse().ok()?;
            (d != 0.0).then(|| n / d)
        }
        None => text.trim().parse().ok(),
    }
}

pub(crate) fn ends_with(stack: &[String], suffix: &[&str]) -> bool {
    stack.len() >= suffix.len()
        && stack[stack.len() - suffix.len()..]
            .iter()
            .zip(suffix)
            .all(|(a, b)| a == b)
}

fn read_facts(source: &str) -> Result<Facts, String> {
    let mut reader = Reader::from_str(source);
    let mut stack: Vec<String> = Vec::new();

    let mut page_width = None;
    let mut measures = Vec::new();
    let mut staff: Option<usize> = None;
    let mut staves = 0usize;

    let mut timesig = 1.0f64;
    let mut sig_n: Option<f64> = None;
    let mut sig_d: Option<f64> = None;
    let mut len_override: Option<f64> = None;
    let mut page_break = false;
    let mut page = 1u32;
    let mut start = 0.0f64;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("XML error at byte {}: {}", reader.buffer_position(), e))?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let name = tag_name(e);
                let parent = stack.last().map(String::as_str);
                match (name.as_str(), parent) {
                    ("Staff", Some("Score")) => {
                        staff = Some(staves);
                        staves += 1;
                    }
                    ("Measure", Some("Staff")) if staff == Some(0) => {
                        len_override = e
                            .try_get_attribute("len")
                            .map_err(|e| e.to_string())?
                            .and_then(|a| a.unescape_value().ok().and_then(|v| parse_fraction(&v)));
                        page_break = false;
                    }
                    ("TimeSig", _) => {
                        sig_n = None;
                        sig_d = None;
                    }
                    _ => {}
                }
                if matches!(event, Event::Start(_)) {
                    stack.push(name);
                }
            }
            Event::Text(ref t) => {
                let text = t.unescape().map_err(|e| e.to_string())?;
                if ends_with(&stack, &["Style", "pageWidth"]) {
                    page_width = text.trim().parse().ok();
                } else if staff == Some(0) && ends_with(&stack, &["TimeSig", "sigN"]) {
                    sig_n = text.trim().parse().ok();
                } else if staff == Some(0) && ends_with(&stack, &["TimeSig", "sigD"]) {
                    sig_d = text.trim().parse().ok();
                } else if staff == Some(0)
                    && ends_with(&stack, &["LayoutBreak", "subtype"])
                    && text.trim() == "page"
                {
                    page_break = true;
                }
            }
            Event::End(_) => {
                let name = stack.pop().unwrap_or_default();
                let parent = stack.last().map(String::as_str);
                match (name.as_str(), parent) {
                    ("TimeSig", _) if staff == Some(0) => {
                        if let (Some(n), Some(d)) = (sig_n, sig_d) {
                            if d > 0.0 {
                                timesig = n / d;
                            }
                        }
                    }
                    ("Measure", Some("Staff")) if staff == Some(0) => {
                        let length = len_override.unwrap_or(timesig);
                        measures.push(MeasureInfo {
                            index: measures.len(),
                            start,
                            length,
                            page,
                            page_break,
                        });
                        start += length;
                        if page_break {
                            page += 1;
                        }
                    }
                    ("Staff", Some("Score")) => staff = None,
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(Facts {
        page_width,
        measures,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Two staves of 2/4 with a page break after measure 2 and a quarter triplet
    /// in measures 2 and 3.
    pub(crate) const TRIPLET_SCORE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<museScore version="3.02">
  <Score>
    <Style>
      <pageWidth>8.5</pageWidth>
    </Style>
    <Part>
      <Staff id="1"><StaffType group="pitched"/></Staff>
    </Part>
    <Staff id="1">
      <Measure>
        <voice>
          <Clef><concertClefType>G</concertClefType></Clef>
          <TimeSig><sigN>2</sigN><sigD>4</sigD></TimeSig>
          <Chord><durationType>half</durationType><Note><pitch>60</pitch></Note></Chord>
        </voice>
      </Measure>
      <Measure>
        <voice>
          <Tuplet><normalNotes>2</normalNotes><actualNotes>3</actualNotes></Tuplet>
          <Chord><durationType>quarter</durationType><Note><pitch>60</pitch></Note></Chord>
          <Chord><durationType>quarter</durationType><Note><pitch>62</pitch></Note></Chord>
          <Chord><durationType>quarter</durationType><Note><pitch>64</pitch></Note></Chord>
          <endTuplet/>
        </voice>
        <LayoutBreak><subtype>page</subtype></LayoutBreak>
      </Measure>
      <Measure>
        <voice>
          <Tuplet><normalNotes>2</normalNotes><actualNotes>3</actualNotes></Tuplet>
          <Chord><durationType>quarter</durationType><Note><pitch>65</pitch></Note></Chord>
          <Chord><durationType>quarter</durationType><Note><pitch>67</pitch></Note></Chord>
          <Chord><durationType>quarter</durationType><Note><pitch>69</pitch></Note></Chord>
          <endTuplet/>
        </voice>
      </Measure>
      <Measure>
        <voice>
          <Rest><durationType>measure</durationType><duration>2/4</duration></Rest>
          <BarLine><subtype>end</subtype></BarLine>
        </voice>
      </Measure>
    </Staff>
    <Staff id="2">
      <Measure><voice><Rest><durationType>measure</durationType></Rest></voice></Measure>
      <Measure><voice><Rest><durationType>measure</durationType></Rest></voice></Measure>
      <Measure><voice><Rest><durationType>measure</durationType></Rest></voice></Measure>
      <Measure><voice><Rest><durationType>measure</durationType></Rest></voice></Measure>
    </Staff>
  </Score>
</museScore>
"#;

    pub(crate) fn triplet_score() -> Score {
        Score::parse(Path::new("triplets.mscx"), TRIPLET_SCORE.to_string()).unwrap()
    }

    #[test]
    fn reads_measures_pages_and_width() {
        let score = triplet_score();
        assert_eq!(score.page_width, 8.5);
        assert_eq!(score.page_count, 2);
        assert_eq!(score.measures.len(), 4);
        let starts: Vec<f64> = score.measures.iter().map(|m| m.start).collect();
        assert_eq!(starts, vec![0.0, 0.5, 1.0, 1.5]);
        assert!(score.measures.iter().all(|m| m.length == 0.5));
        let pages: Vec<u32> = score.measures.iter().map(|m| m.page).collect();
        assert_eq!(pages, vec![1, 1, 2, 2]);
        assert!(score.measures[1].page_break);
    }

    #[test]
    fn len_attribute_overrides_timesig() {
        let src = r#"<museScore><Score><Staff id="1">
            <Measure len="1/4"><voice><TimeSig><sigN>3</sigN><sigD>4</sigD></TimeSig></voice></Measure>
            <Measure><voice/></Measure>
            <Measure><voice><TimeSig><sigN>6</sigN><sigD>8</sigD></TimeSig></voice></Measure>
        </Staff></Score></museScore>"#;
        let score = Score::parse(Path::new("pickup.mscx"), src.to_string()).unwrap();
        let lengths = score.measure_lengths();
        assert_eq!(lengths, vec![0.25, 0.75, 0.75]);
        assert_eq!(score.measures[2].start, 1.0);
        assert_eq!(score.page_width, DEFAULT_PAGE_WIDTH);
        assert_eq!(score.page_count, 1);
    }

    #[test]
    fn empty_or_malformed_scores_fail() {
        let err = Score::parse(Path::new("empty.mscx"), "<museScore><Score/></museScore>".into())
            .unwrap_err();
        assert!(matches!(err, AmusingError::ScoreParse { .. }));

        let err = Score::parse(
            Path::new("broken.mscx"),
            "<museScore><Score><Staff></Measure></Score>".into(),
        )
        .unwrap_err();
        assert!(matches!(err, AmusingError::ScoreParse { .. }));

        let err = Score::open(Path::new("song.mid")).unwrap_err();
        assert!(err.to_string().contains("unsupported score format"));
    }

    #[test]
    fn opens_mscz_archives() {
        use std::io::Write;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("packed.mscz");
        let file = std::fs::File::create(&path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::FileOptions::default();
        zip.start_file("META-INF/container.xml", options).unwrap();
        zip.write_all(b"<container/>").unwrap();
        zip.start_file("packed.mscx", options).unwrap();
        zip.write_all(TRIPLET_SCORE.as_bytes()).unwrap();
        zip.finish().unwrap();

        let score = Score::open(&path).unwrap();
        assert_eq!(score.measures.len(), 4);
    }

    #[test]
    fn fractions() {
        assert_eq!(parse_fraction("3/8"), Some(0.375));
        assert_eq!(parse_fraction(" 1 "), Some(1.0));
        assert_eq!(parse_fraction("1/0"), None);
        assert_eq!(parse_fraction("x"), None);
    }
}
