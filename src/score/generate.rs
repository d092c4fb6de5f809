use indicatif::ProgressBar;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

use super::jobs::{Job, JobList, MeasureSelector};
use super::mscx::Score;
use super::musescore::NotationRenderer;
use super::note::Note;
use super::plan::{expand_jobs, ExportPlan, PlanOptions};
use crate::error::{AmusingError, AmusingResult};

pub fn frame_file_name(frame: u32) -> String {
    format!("frm{:04}.png", frame)
}

/// Score animation settings and jobs. Every change returns a new value.
#[derive(Clone, Debug)]
pub struct Amusing {
    pub width: u32,
    pub outdir: PathBuf,
    pub workers: usize,
    pub frame0: u32,
    pub first_empty_frame: bool,
    pub alpha_only: bool,
    jobs: JobList,
}

impl Amusing {
    pub fn new(width: u32, outdir: impl Into<PathBuf>) -> Self {
        Self {
            width,
            outdir: outdir.into(),
            workers: 8,
            frame0: 0,
            first_empty_frame: true,
            alpha_only: true,
            jobs: JobList::new(),
        }
    }

    pub fn with_workers(self, workers: usize) -> Self {
        Self { workers, ..self }
    }

    pub fn with_frame0(self, frame0: u32) -> Self {
        Self { frame0, ..self }
    }

    pub fn with_first_empty_frame(self, first_empty_frame: bool) -> Self {
        Self {
            first_empty_frame,
            ..self
        }
    }

    pub fn with_alpha_only(self, alpha_only: bool) -> Self {
        Self { alpha_only, ..self }
    }

    pub fn add_job(self, measures: MeasureSelector, subdivision: Note) -> Self {
        let jobs = self.jobs.with(Job {
            measures,
            subdivision,
        });
        Self { jobs, ..self }
    }

    #[allow(dead_code)]
    pub fn delete_jobs(self) -> Self {
        Self {
            jobs: JobList::new(),
            ..self
        }
    }

    pub fn jobs(&self) -> &JobList {
        &self.jobs
    }

    pub fn plan(&self, score: &Score) -> AmusingResult<ExportPlan> {
        expand_jobs(
            score,
            &self.jobs,
            &PlanOptions {
                frame0: self.frame0,
                first_empty_frame: self.first_empty_frame,
            },
        )
    }

    /// Exports one image per plan step into `outdir`. Returns the number written.
    pub fn generate_frames(
        &self,
        score: &Score,
        renderer: &dyn NotationRenderer,
        progress: &ProgressBar,
    ) -> AmusingResult<usize> {
        let plan = self.plan(score)?;
        self.export_plan(score, &plan, renderer, progress)
    }

    pub fn export_plan(
        &self,
        score: &Score,
        plan: &ExportPlan,
        renderer: &dyn NotationRenderer,
        progress: &ProgressBar,
    ) -> AmusingResult<usize> {
        if plan.is_empty() {
            log::info!("No jobs, nothing to export");
            return Ok(0);
        }

        std::fs::create_dir_all(&self.outdir).map_err(|e| {
            AmusingError::io(format!("failed to create '{}'", self.outdir.display()), e)
        })?;

        let workers = self.workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("amusing-export-{}", i))
            .build()
            .map_err(|e| AmusingError::external("rayon", e))?;

        log::info!(
            "Exporting {} frame(s) to {} with {} workers",
            plan.len(),
            self.outdir.display(),
            workers
        );
        progress.set_length(plan.len() as u64);

        pool.install(|| {
            plan.steps.par_iter().try_for_each(|step| {
                let out = self.outdir.join(frame_file_name(step.frame));
                renderer.export(score, step, &out)?;
                if self.alpha_only {
                    reduce_to_alpha(&out)?;
                }
                progress.inc(1);
                Ok(())
            })
        })?;

        Ok(plan.len())
    }
}

/// Rewrites a PNG as an 8-bit grayscale image of its alpha channel.
pub fn reduce_to_alpha(path: &Path) -> AmusingResult<()> {
    let fail = |e: image::ImageError| {
        AmusingError::encode(format!("alpha reduction of '{}': {}", path.display(), e))
    };
    let rgba = image::open(path).map_err(fail)?.to_rgba8();
    let (width, height) = rgba.dimensions();
    let alpha: Vec<u8> = rgba.pixels().map(|p| p.0[3]).collect();
    image::save_buffer_with_format(
        path,
        &alpha,
        width,
        height,
        image::ColorType::L8,
        image::ImageFormat::Png,
    )
    .map_err(fail)
}
