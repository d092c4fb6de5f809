use indicatif::ProgressBar;
use rayon::prelude::*;
use std::path::Path;
use std::sync::mpsc;

use crate::encode::reorder::ReorderBuffer;
use crate::encode::{write_frame_png, VideoSink};
use crate::error::{AmusingError, AmusingResult};
use crate::render::{Frame, FrameOverlay, FrameRenderer};
use crate::transform::Transform;

pub struct PipelineOptions<'a> {
    pub workers: usize,
    pub overlay: Option<&'a FrameOverlay>,
    /// Also write every frame as a PNG into this directory.
    pub frames_dir: Option<&'a Path>,
}

/// Computes and renders every frame on a worker pool and feeds them to `sink`
/// in index order. Returns the number of frames delivered.
pub fn render_video(
    transform: &dyn Transform,
    renderer: &FrameRenderer,
    mut sink: Box<dyn VideoSink>,
    options: &PipelineOptions,
    progress: &ProgressBar,
) -> AmusingResult<usize> {
    let workers = options.workers.max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("amusing-frame-{}", i))
        .build()
        .map_err(|e| AmusingError::transform(format!("failed to build worker pool: {}", e)))?;

    if let Some(dir) = options.frames_dir {
        std::fs::create_dir_all(dir).map_err(|e| {
            AmusingError::io(format!("failed to create frames dir '{}'", dir.display()), e)
        })?;
    }

    let total = transform.spec().frame_count;
    // Bounds the number of rendered frames held in memory at once.
    let batch = workers * 4;
    let mut reorder: ReorderBuffer<Frame> = ReorderBuffer::new(0);

    let produce = |index: usize| -> AmusingResult<Frame> {
        let data = transform.compute_frame(index as i64)?;
        let mut frame = renderer.render(&data, index);
        if let Some(overlay) = options.overlay {
            overlay.apply(&mut frame);
        }
        if let Some(dir) = options.frames_dir {
            write_frame_png(dir, &frame)?;
        }
        Ok(frame)
    };

    log::info!("Rendering {} frames with {} workers", total, workers);

    let mut start = 0;
    while start < total {
        let end = (start + batch).min(total);
        let (tx, rx) = mpsc::channel::<Frame>();

        std::thread::scope(|s| -> AmusingResult<()> {
            let producer = s.spawn(|| {
                pool.install(|| {
                    (start..end).into_par_iter().try_for_each_with(tx, |tx, index| {
                        let frame = produce(index)?;
                        tx.send(frame)
                            .map_err(|_| AmusingError::encode("frame consumer stopped"))
                    })
                })
            });

            for frame in rx {
                let index = frame.index;
                reorder
                    .push(index, frame)
                    .map_err(|_| AmusingError::encode(format!("frame {} produced twice", index)))?;
                for ready in reorder.drain_ready() {
                    sink.write_frame(&ready)?;
                    progress.inc(1);
                }
            }

            match producer.join() {
                Ok(result) => result,
                Err(panic) => std::panic::resume_unwind(panic),
            }
        })?;

        if reorder.next_index() != end {
            return Err(AmusingError::encode(format!(
                "frames {}..{} incomplete, next expected {}",
                start,
                end,
                reorder.next_index()
            )));
        }
        start = end;
    }

    sink.finish()?;
    Ok(total)
}
