use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::mscx::Score;
use super::note::Note;
use crate::error::{AmusingError, AmusingResult};

/// Measures addressed by a job. Numbers are 1-based, as printed in the score.
#[derive(Clone, Debug, PartialEq)]
pub enum MeasureSelector {
    Single(usize),
    List(Vec<usize>),
    /// Inclusive; an open end runs to the last measure.
    Range { start: usize, end: Option<usize> },
    All,
}

impl MeasureSelector {
    /// Zero-based measure indices, validated against `measure_count`.
    pub fn resolve(&self, measure_count: usize) -> Result<Vec<usize>, String> {
        let numbers: Vec<usize> = match self {
            Self::Single(n) => vec![*n],
            Self::List(ns) => ns.clone(),
            Self::Range { start, end } => {
                let end = end.unwrap_or(measure_count);
                if end < *start {
                    return Err(format!("empty measure range {}-{}", start, end));
                }
                (*start..=end).collect()
            }
            Self::All => (1..=measure_count).collect(),
        };

        numbers
            .into_iter()
            .map(|n| {
                if n == 0 || n > measure_count {
                    Err(format!(
                        "measure {} out of range (score has {} measures)",
                        n, measure_count
                    ))
                } else {
                    Ok(n - 1)
                }
            })
            .collect()
    }
}

impl fmt::Display for MeasureSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(n) => write!(f, "{}", n),
            Self::List(ns) => {
                let parts: Vec<String> = ns.iter().map(ToString::to_string).collect();
                write!(f, "{}", parts.join(","))
            }
            Self::Range { start, end: Some(end) } => write!(f, "{}-{}", start, end),
            Self::Range { start, end: None } => write!(f, "{}-", start),
            Self::All => write!(f, "all"),
        }
    }
}

impl FromStr for MeasureSelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let number = |t: &str| -> Result<usize, String> {
            t.trim()
                .parse()
                .map_err(|_| format!("invalid measure number '{}'", t))
        };

        if s.eq_ignore_ascii_case("all") {
            Ok(Self::All)
        } else if s.contains(',') {
            s.split(',').map(number).collect::<Result<_, _>>().map(Self::List)
        } else if let Some((start, end)) = s.split_once('-') {
            let end = if end.trim().is_empty() {
                None
            } else {
                Some(number(end)?)
            };
            Ok(Self::Range {
                start: number(start)?,
                end,
            })
        } else {
            number(s).map(Self::Single)
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Job {
    pub measures: MeasureSelector,
    pub subdivision: Note,
}

/// `<measures>=<note>`, e.g. `2-4=8.` or `all=4t`.
impl FromStr for Job {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (measures, note) = s
            .split_once('=')
            .ok_or_else(|| format!("job must look like <measures>=<note>, got '{}'", s))?;
        Ok(Self {
            measures: measures.parse()?,
            subdivision: note.parse()?,
        })
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.measures, self.subdivision)
    }
}

/// Ordered jobs. Later jobs override earlier ones for the same measure.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JobList {
    jobs: Vec<Job>,
}

impl JobList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(&self, job: Job) -> Self {
        let mut jobs = self.jobs.clone();
        jobs.push(job);
        Self { jobs }
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Subdivision per zero-based measure index.
    pub fn resolve(&self, score: &Score) -> AmusingResult<BTreeMap<usize, Note>> {
        let mut by_measure = BTreeMap::new();
        for job in &self.jobs {
            let indices = job
                .measures
                .resolve(score.measures.len())
                .map_err(|e| AmusingError::score(&score.path, format!("job '{}': {}", job, e)))?;
            for index in indices {
                by_measure.insert(index, job.subdivision);
            }
        }
        Ok(by_measure)
    }
}

impl FromIterator<Job> for JobList {
    fn from_iter<I: IntoIterator<Item = Job>>(iter: I) -> Self {
        Self {
            jobs: iter.into_iter().collect(),
        }
    }
}
