//! Memoized ASCII rendering.
//!
//! Conversion from raster to text happens at most once per frame per
//! generation. A background walk warms frames ahead of the playhead; bumping
//! the generation counter retires any walk still running so resizes and seeks
//! never race each other's output.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use image::DynamicImage;

use crate::ascii::{fit_within, image_to_ascii_lines};

/// Columns kept clear at the frame edges.
pub const FRAME_INSET_COLS: u16 = 2;
/// Rows below the frame reserved for progress and help.
pub const RESERVED_ROWS: u16 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u16,
    pub height: u16,
}

pub trait FrameConverter: Send + Sync {
    fn convert(&self, raster: &DynamicImage, viewport: Viewport) -> String;
}

pub struct AsciiConverter;

impl FrameConverter for AsciiConverter {
    fn convert(&self, raster: &DynamicImage, viewport: Viewport) -> String {
        render_ascii(raster, viewport)
    }
}

/// Scales `raster` to fit the viewport's drawable region and centers each
/// text row horizontally.
pub fn render_ascii(raster: &DynamicImage, viewport: Viewport) -> String {
    let max_width = u32::from(viewport.width.saturating_sub(FRAME_INSET_COLS));
    let max_height = u32::from(viewport.height.saturating_sub(RESERVED_ROWS));
    let (width, height) = fit_within(raster.width(), raster.height(), max_width, max_height);
    if width == 0 || height == 0 {
        return String::new();
    }

    let pad = " ".repeat(usize::from(viewport.width).saturating_sub(width as usize) / 2);
    let mut text = String::with_capacity((width as usize + pad.len() + 1) * height as usize);
    for line in image_to_ascii_lines(raster, width, height) {
        text.push_str(&pad);
        text.push_str(&line);
        text.push('\n');
    }
    text
}

pub struct RenderCache {
    rasters: Vec<DynamicImage>,
    converter: Box<dyn FrameConverter>,
    slots: Mutex<Vec<Option<String>>>,
    generation: AtomicU64,
}

impl RenderCache {
    pub fn new(rasters: Vec<DynamicImage>) -> Self {
        Self::with_converter(rasters, Box::new(AsciiConverter))
    }

    pub fn with_converter(rasters: Vec<DynamicImage>, converter: Box<dyn FrameConverter>) -> Self {
        let mut slots = Vec::new();
        slots.resize_with(rasters.len(), || None);
        Self {
            rasters,
            converter,
            slots: Mutex::new(slots),
            generation: AtomicU64::new(0),
        }
    }

    pub fn frame_count(&self) -> usize {
        self.rasters.len()
    }

    /// Memoized frame text. Converts on a miss, outside the lock.
    pub fn render(&self, index: usize, viewport: Viewport) -> String {
        {
            let slots = self.lock_slots();
            if let Some(text) = &slots[index] {
                return text.clone();
            }
        }
        let text = self.converter.convert(&self.rasters[index], viewport);
        let mut slots = self.lock_slots();
        slots[index].get_or_insert_with(|| text).clone()
    }

    /// Drops every memoized frame. The generation moves first so an in-flight
    /// walk cannot refill slots with output sized for the old viewport.
    pub fn invalidate_all(&self) {
        self.generation.fetch_add(1, Ordering::Relaxed);
        let mut slots = self.lock_slots();
        for slot in slots.iter_mut() {
            *slot = None;
        }
    }

    /// Retires any running walk without touching memoized frames.
    pub fn cancel_preload(&self) {
        self.generation.fetch_add(1, Ordering::Relaxed);
    }

    /// Retires any running walk and starts a fresh one at `start`. Frames
    /// already memoized stay valid and are skipped.
    pub fn restart_preload(self: Arc<Self>, start: usize, viewport: Viewport) {
        self.generation.fetch_add(1, Ordering::Relaxed);
        self.spawn_preload(start, viewport);
    }

    /// Warms frames from `start` to the end on a background thread.
    pub fn spawn_preload(self: Arc<Self>, start: usize, viewport: Viewport) {
        let generation = self.generation.load(Ordering::Relaxed);
        // Preload is advisory; render() covers any frame the walk missed.
        let _ = thread::Builder::new()
            .name("telecine-preload".to_owned())
            .spawn(move || self.preload_walk(generation, start, viewport));
    }

    fn preload_walk(&self, generation: u64, start: usize, viewport: Viewport) {
        for index in start..self.rasters.len() {
            if self.generation.load(Ordering::Relaxed) != generation {
                return;
            }
            {
                let slots = self.lock_slots();
                if slots[index].is_some() {
                    continue;
                }
            }
            let text = self.converter.convert(&self.rasters[index], viewport);
            let mut slots = self.lock_slots();
            if self.generation.load(Ordering::Relaxed) == generation && slots[index].is_none() {
                slots[index] = Some(text);
            }
        }
    }

    fn lock_slots(&self) -> MutexGuard<'_, Vec<Option<String>>> {
        // A poisoning panic can only come from a converter; the slot
        // vector itself is never left half-written.
        match self.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
