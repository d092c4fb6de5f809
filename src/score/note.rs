use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// A rhythmic value, measured in whole notes (quarter = 0.25).
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Note {
    value: f64,
}

impl Note {
    /// `Note::new(4)` is a quarter, `Note::new(8)` an eighth.
    pub fn new(note_type: u32) -> Self {
        Self {
            value: 1.0 / note_type as f64,
        }
    }

    pub fn breve() -> Self {
        Self { value: 2.0 }
    }

    pub fn from_whole_notes(value: f64) -> Self {
        Self { value }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn n_dotted(self, dots: u32) -> Self {
        let factor: f64 = (0..=dots).map(|i| 0.5f64.powi(i as i32)).sum();
        Self {
            value: self.value * factor,
        }
    }

    pub fn triplet(self) -> Self {
        self.tuplet(3, 2)
    }

    /// `actual` notes in the time of `normal`.
    pub fn tuplet(self, actual: u32, normal: u32) -> Self {
        Self {
            value: self.value * normal as f64 / actual as f64,
        }
    }

    /// Duration names as written in MuseScore's `durationType`.
    pub fn from_duration_type(text: &str) -> Option<Self> {
        match text {
            "breve" => Some(Self::breve()),
            "whole" => Some(Self::new(1)),
            "half" => Some(Self::new(2)),
            "quarter" => Some(Self::new(4)),
            "eighth" => Some(Self::new(8)),
            other => {
                // "16th", "32nd", "64th", "128th", ...
                let digits = other.trim_end_matches(|c: char| c.is_ascii_alphabetic());
                digits.parse::<u32>().ok().filter(|&n| n > 0).map(Self::new)
            }
        }
    }
}

/// Note type (1, 2, 4, ...) whose plain value is `value`, if any.
fn plain_type(value: f64) -> Option<u32> {
    let n = 1.0 / value;
    let rounded = n.round();
    let exact = rounded >= 1.0 && rounded <= 1024.0 && (n - rounded).abs() < 1e-9;
    (exact && (rounded as u32).is_power_of_two()).then_some(rounded as u32)
}

/// Writes the value the way it is typed on the command line.
impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if (self.value - 2.0).abs() < 1e-9 {
            return write!(f, "breve");
        }
        for dots in 0..=3u32 {
            let undotted = self.value / Note::new(1).n_dotted(dots).value;
            if let Some(t) = plain_type(undotted) {
                return write!(f, "{}{}", t, ".".repeat(dots as usize));
            }
        }
        if let Some(t) = plain_type(self.value * 1.5) {
            return write!(f, "{}t", t);
        }
        for actual in 2..=16u32 {
            // Nearest normal count first: 5 in the time of 4, not of 1.
            let mut normals: Vec<u32> = (1..=16).filter(|&n| n != actual).collect();
            normals.sort_by_key(|&n| n.abs_diff(actual));
            for normal in normals {
                if let Some(t) = plain_type(self.value * actual as f64 / normal as f64) {
                    return write!(f, "{}:{}/{}", t, actual, normal);
                }
            }
        }
        write!(f, "{:.4} whole", self.value)
    }
}

/// Parses `4`, `8.`, `16..`, `4t`, `4:5/4` (five in the time of four).
impl FromStr for Note {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (base, tuplet) = match s.split_once(':') {
            Some((base, tuplet)) => (base, Some(tuplet)),
            None => (s, None),
        };

        let (base, triplet) = match base.strip_suffix('t') {
            Some(b) => (b, true),
            None => (base, false),
        };
        let dots = base.len() - base.trim_end_matches('.').len();
        let digits = base.trim_end_matches('.');
        let note_type: u32 = digits
            .parse()
            .map_err(|_| format!("invalid note value '{}'", s))?;
        if note_type == 0 {
            return Err(format!("invalid note value '{}'", s));
        }

        let mut note = Note::new(note_type).n_dotted(dots as u32);
        if triplet {
            note = note.triplet();
        }
        if let Some(t) = tuplet {
            let (actual, normal) = t
                .split_once('/')
                .ok_or_else(|| format!("tuplet must look like 5/4, got '{}'", t))?;
            let actual: u32 = actual.parse().map_err(|_| format!("invalid tuplet '{}'", t))?;
            let normal: u32 = normal.parse().map_err(|_| format!("invalid tuplet '{}'", t))?;
            if actual == 0 || normal == 0 {
                return Err(format!("invalid tuplet '{}'", t));
            }
            note = note.tuplet(actual, normal);
        }
        Ok(note)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn modifiers_scale_value() {
        assert!(close(Note::new(4).value(), 0.25));
        assert!(close(Note::new(4).n_dotted(1).value(), 0.375));
        assert!(close(Note::new(4).n_dotted(2).value(), 0.4375));
        assert!(close(Note::new(4).triplet().value(), 1.0 / 6.0));
        assert!(close(Note::new(8).tuplet(5, 4).value(), 0.1));
    }

    #[test]
    fn duration_type_names() {
        assert!(close(Note::from_duration_type("breve").unwrap().value(), 2.0));
        assert!(close(Note::from_duration_type("eighth").unwrap().value(), 0.125));
        assert!(close(Note::from_duration_type("16th").unwrap().value(), 1.0 / 16.0));
        assert!(close(Note::from_duration_type("32nd").unwrap().value(), 1.0 / 32.0));
        assert!(Note::from_duration_type("measure").is_none());
        assert!(Note::from_duration_type("nonsense").is_none());
    }

    #[test]
    fn parses_cli_syntax() {
        assert!(close("4".parse::<Note>().unwrap().value(), 0.25));
        assert!(close("8.".parse::<Note>().unwrap().value(), 0.1875));
        assert!(close("4t".parse::<Note>().unwrap().value(), 1.0 / 6.0));
        assert!(close("4:5/4".parse::<Note>().unwrap().value(), 0.2));
        assert!("0".parse::<Note>().is_err());
        assert!("x".parse::<Note>().is_err());
        assert!("4:5".parse::<Note>().is_err());
    }

    #[test]
    fn displays_as_typed() {
        for typed in ["1", "4", "8.", "16..", "4t", "8t", "4:5/4"] {
            assert_eq!(typed.parse::<Note>().unwrap().to_string(), typed);
        }
        assert_eq!(Note::breve().to_string(), "breve");
        assert_eq!(Note::from_whole_notes(0.123).to_string(), "0.1230 whole");
    }
}
