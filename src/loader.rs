//! Parallel frame decoding.
//!
//! Decoding every still up front is what makes playback and seeking free of
//! disk stalls later, so the load is spread across a pool of scoped threads.
//! The pool aborts on the first decode failure and reports that frame alone.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;

use image::DynamicImage;

use crate::error::PlayerError;

pub const DECODE_WORKERS: usize = 24;

/// Decodes `paths` into rasters, preserving order. `progress` fires once per
/// decoded frame, from worker threads, in completion order rather than path
/// order. Flipping `cancel` stops the pool early with `Cancelled`.
pub fn load_frames<F>(
    paths: &[PathBuf],
    cancel: &AtomicBool,
    progress: F,
) -> Result<Vec<DynamicImage>, PlayerError>
where
    F: Fn(usize) + Send + Sync,
{
    if paths.is_empty() {
        return Ok(Vec::new());
    }

    let mut decoded: Vec<Option<DynamicImage>> = Vec::new();
    decoded.resize_with(paths.len(), || None);
    let abort = AtomicBool::new(false);
    let mut first_error = None;

    let workers = DECODE_WORKERS.min(paths.len());
    let chunk_len = paths.len().div_ceil(workers);

    thread::scope(|scope| {
        let (tx, rx) = mpsc::channel();
        let abort = &abort;
        let progress = &progress;

        for (worker, chunk) in paths.chunks(chunk_len).enumerate() {
            let tx = tx.clone();
            scope.spawn(move || {
                let base = worker * chunk_len;
                for (offset, path) in chunk.iter().enumerate() {
                    if abort.load(Ordering::Relaxed) || cancel.load(Ordering::Relaxed) {
                        return;
                    }
                    let index = base + offset;
                    match image::open(path) {
                        Ok(raster) => {
                            if !abort.load(Ordering::Relaxed) {
                                progress(index);
                            }
                            if tx.send((index, Ok(raster))).is_err() {
                                return;
                            }
                        }
                        Err(source) => {
                            abort.store(true, Ordering::Relaxed);
                            let _ = tx.send((
                                index,
                                Err(PlayerError::Decode {
                                    index,
                                    path: path.clone(),
                                    source,
                                }),
                            ));
                            return;
                        }
                    }
                }
            });
        }
        drop(tx);

        // Runs on the calling thread until every worker has hung up.
        for (index, result) in rx {
            match result {
                Ok(raster) => decoded[index] = Some(raster),
                Err(err) => {
                    abort.store(true, Ordering::Relaxed);
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }
    });

    if let Some(err) = first_error {
        return Err(err);
    }
    if cancel.load(Ordering::Relaxed) {
        return Err(PlayerError::Cancelled);
    }

    let mut frames = Vec::with_capacity(decoded.len());
    for slot in decoded {
        match slot {
            Some(raster) => frames.push(raster),
            // A worker stopped early without reporting; treat as cancelled.
            None => return Err(PlayerError::Cancelled),
        }
    }
    Ok(frames)
}
