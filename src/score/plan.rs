use serde::Serialize;

use super::jobs::JobList;
use super::mscx::Score;
use crate::error::AmusingResult;

/// How much of the score one exported image shows. Measure indices are zero-based.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reveal {
    Blank,
    /// Measures before `measure` in full, `measure` up to `offset` whole notes.
    Partial { measure: usize, offset: f64 },
    /// Every measure up to and including `measure`.
    Through { measure: usize },
    Full,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MeasureState {
    Visible,
    Hidden,
    Partial(f64),
}

impl Reveal {
    pub fn measure_state(&self, index: usize) -> MeasureState {
        match *self {
            Self::Blank => MeasureState::Hidden,
            Self::Full => MeasureState::Visible,
            Self::Through { measure } if index <= measure => MeasureState::Visible,
            Self::Through { .. } => MeasureState::Hidden,
            Self::Partial { measure, .. } if index < measure => MeasureState::Visible,
            Self::Partial { measure, offset } if index == measure => MeasureState::Partial(offset),
            Self::Partial { .. } => MeasureState::Hidden,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExportStep {
    /// Output frame number, used for the image file name.
    pub frame: u32,
    /// 1-based page of the rendered score kept for this frame.
    pub page: u32,
    pub reveal: Reveal,
    /// Score time of the reveal point in whole notes, when it has one.
    pub timestamp: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ExportPlan {
    pub steps: Vec<ExportStep>,
}

impl ExportPlan {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct PlanOptions {
    pub frame0: u32,
    pub first_empty_frame: bool,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            frame0: 0,
            first_empty_frame: true,
        }
    }
}

/// Expands jobs into the ordered list of images to export.
///
/// Measures without a job are revealed whole together with the next step.
/// Every page break adds a step showing the new page with everything up to
/// the break, and the plan ends with the complete score.
pub fn expand_jobs(score: &Score, jobs: &JobList, options: &PlanOptions) -> AmusingResult<ExportPlan> {
    if jobs.is_empty() {
        return Ok(ExportPlan::default());
    }
    let subdivisions = jobs.resolve(score)?;

    let mut steps = Vec::new();
    let mut push = |page: u32, reveal: Reveal, timestamp: Option<f64>| {
        steps.push(ExportStep {
            frame: options.frame0 + steps.len() as u32,
            page,
            reveal,
            timestamp,
        });
    };

    if options.first_empty_frame {
        push(1, Reveal::Blank, None);
    }

    for measure in &score.measures {
        if let Some(subdivision) = subdivisions.get(&measure.index) {
            let count = ((measure.length / subdivision.value()).round() as usize).max(1);
            for k in 0..count {
                let offset = measure.length * k as f64 / count as f64;
                push(
                    measure.page,
                    Reveal::Partial {
                        measure: measure.index,
                        offset,
                    },
                    Some(measure.start + offset),
                );
            }
        }
        if measure.page_break {
            push(
                measure.page + 1,
                Reveal::Through {
                    measure: measure.index,
                },
                Some(measure.start + measure.length),
            );
        }
    }

    push(score.page_count, Reveal::Full, None);

    log::info!(
        "Expanded {} job(s) over {} measure(s) into {} export step(s)",
        jobs.len(),
        subdivisions.len(),
        steps.len()
    );
    Ok(ExportPlan { steps })
}
