//! Playback engine.
//!
//! One thread owns every piece of mutable state and consumes a single event
//! channel. Stage work (probe, extract, decode) and terminal input run on
//! their own threads and only ever talk back through that channel, so no
//! handler here needs a lock. Timers are single-shot: `next_tick` holds at
//! most one deadline and whoever needs the next tick re-arms it.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use image::DynamicImage;

use crate::cache::{RenderCache, Viewport};
use crate::error::PlayerError;
use crate::session::Workspace;
use crate::{extract, loader, ui};

/// Fraction of a frame interval to wait between ticks. The shortfall absorbs
/// the time spent handling the tick and drawing, keeping effective playback
/// close to the probed rate.
const TICK_SCALE: f64 = 0.98;
const SPINNER_INTERVAL: Duration = Duration::from_millis(100);
/// Seconds jumped per arrow key press.
const SEEK_SECONDS: f64 = 10.0;
/// Longest cleanup waits for an in-flight stage before removing files anyway.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    LoadingMetadata,
    Extracting,
    LoadingFrames,
    Playing,
    Paused,
    CleaningUp,
}

#[derive(Debug)]
pub enum Event {
    Tick,
    Key(KeyEvent),
    Resize(u16, u16),
    Quit,
    Probed(Result<f64, PlayerError>),
    Extracted(Result<Vec<PathBuf>, PlayerError>),
    FrameDecoded(usize),
    Loaded(Result<Vec<DynamicImage>, PlayerError>),
}

#[derive(Debug, Clone)]
pub struct Options {
    pub path: PathBuf,
    pub auto_play: bool,
    pub auto_repeat: bool,
}

pub struct Player {
    path: PathBuf,
    auto_play: bool,
    auto_repeat: bool,
    pub(crate) mode: Mode,
    pub(crate) viewport: Viewport,
    pub(crate) frame_rate: f64,
    pub(crate) frame_paths: Vec<PathBuf>,
    pub(crate) cache: Option<Arc<RenderCache>>,
    workspace: Option<Workspace>,
    pub(crate) current: usize,
    pub(crate) loaded: usize,
    pub(crate) spinner_phase: usize,
    next_tick: Option<Instant>,
    stage_pending: bool,
    drain_deadline: Option<Instant>,
    cancel: Arc<AtomicBool>,
    fatal: Option<PlayerError>,
    tx: Sender<Event>,
    done: bool,
}

/// Plays `options.path` until the user quits or the pipeline fails.
pub fn run(options: Options) -> anyhow::Result<()> {
    let (tx, rx) = mpsc::channel();
    let (width, height) =
        crossterm::terminal::size().context("failed to query terminal size")?;
    let mut player = Player::new(options, Viewport { width, height }, tx.clone());

    let _guard = ui::TerminalGuard::enter()?;
    ui::spawn_input_thread(tx).context("failed to start input thread")?;
    player.begin();
    player.event_loop(&rx)
}

impl Player {
    pub(crate) fn new(options: Options, viewport: Viewport, tx: Sender<Event>) -> Self {
        Self {
            path: options.path,
            auto_play: options.auto_play,
            auto_repeat: options.auto_repeat,
            mode: Mode::LoadingMetadata,
            viewport,
            frame_rate: 0.0,
            frame_paths: Vec::new(),
            cache: None,
            workspace: None,
            current: 0,
            loaded: 0,
            spinner_phase: 0,
            next_tick: None,
            stage_pending: false,
            drain_deadline: None,
            cancel: Arc::new(AtomicBool::new(false)),
            fatal: None,
            tx,
            done: false,
        }
    }

    fn begin(&mut self) {
        self.spawn_probe();
        self.arm_spinner();
    }

    fn event_loop(&mut self, rx: &Receiver<Event>) -> anyhow::Result<()> {
        ui::draw(self).context("failed to draw")?;
        loop {
            let event = self.next_event(rx);
            // Decode progress arrives far faster than the screen needs to
            // move; the spinner tick repaints the loading bar instead.
            let skip_draw = matches!(event, Event::FrameDecoded(_));
            self.handle_event(event);
            if self.done {
                break;
            }
            if !skip_draw {
                ui::draw(self).context("failed to draw")?;
            }
        }
        match self.fatal.take() {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    /// Blocks until the next event, synthesizing `Tick` when the armed
    /// deadline passes first. The deadline is consumed before the tick is
    /// handled, so a handler that wants another tick must re-arm.
    fn next_event(&mut self, rx: &Receiver<Event>) -> Event {
        match self.next_tick {
            Some(deadline) => {
                let wait = deadline.saturating_duration_since(Instant::now());
                match rx.recv_timeout(wait) {
                    Ok(event) => event,
                    Err(RecvTimeoutError::Timeout) => {
                        self.next_tick = None;
                        Event::Tick
                    }
                    Err(RecvTimeoutError::Disconnected) => Event::Quit,
                }
            }
            None => rx.recv().unwrap_or(Event::Quit),
        }
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Tick => self.handle_tick(),
            Event::Key(key) => self.handle_key(key),
            Event::Resize(width, height) => self.handle_resize(width, height),
            Event::Quit => self.begin_cleanup(None),
            Event::Probed(result) => self.handle_probed(result),
            Event::Extracted(result) => self.handle_extracted(result),
            Event::FrameDecoded(_) => self.handle_frame_decoded(),
            Event::Loaded(result) => self.handle_loaded(result),
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if self.mode == Mode::CleaningUp {
            return;
        }
        let ctrl_c =
            key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL);
        if ctrl_c || key.code == KeyCode::Esc {
            self.begin_cleanup(None);
            return;
        }
        match key.code {
            KeyCode::Char(' ') | KeyCode::Enter => self.toggle_playback(),
            KeyCode::Right => self.seek_by_seconds(SEEK_SECONDS),
            KeyCode::Left => self.seek_by_seconds(-SEEK_SECONDS),
            _ => {}
        }
    }

    fn toggle_playback(&mut self) {
        match self.mode {
            Mode::Playing => {
                self.mode = Mode::Paused;
                self.next_tick = None;
            }
            Mode::Paused => {
                // Resuming from the final frame restarts the clip.
                if self.current == self.frame_count().saturating_sub(1) {
                    self.current = 0;
                }
                self.mode = Mode::Playing;
                self.arm_tick();
            }
            _ => {}
        }
    }

    fn seek_by_seconds(&mut self, seconds: f64) {
        if !matches!(self.mode, Mode::Playing | Mode::Paused) {
            return;
        }
        self.seek((seconds * self.frame_rate) as isize);
    }

    /// Moves the playhead by `step` frames, clamped to the clip, and points
    /// the preload walk at the new position. Playing/paused is untouched.
    fn seek(&mut self, step: isize) {
        let last = self.frame_count().saturating_sub(1) as isize;
        let target = (self.current as isize).saturating_add(step).clamp(0, last);
        self.current = target as usize;
        if let Some(cache) = &self.cache {
            Arc::clone(cache).restart_preload(self.current, self.viewport);
        }
    }

    fn handle_resize(&mut self, width: u16, height: u16) {
        if self.mode == Mode::CleaningUp {
            return;
        }
        self.viewport = Viewport { width, height };
        if let Some(cache) = &self.cache {
            cache.invalidate_all();
            Arc::clone(cache).spawn_preload(self.current, self.viewport);
        }
    }

    fn handle_tick(&mut self) {
        match self.mode {
            Mode::Playing => self.advance_frame(),
            Mode::LoadingMetadata | Mode::Extracting | Mode::LoadingFrames => {
                self.spinner_phase = self.spinner_phase.wrapping_add(1);
                self.arm_spinner();
            }
            Mode::CleaningUp => {
                self.spinner_phase = self.spinner_phase.wrapping_add(1);
                self.arm_spinner();
                self.maybe_finish_cleanup();
            }
            Mode::Paused => {}
        }
    }

    fn advance_frame(&mut self) {
        let last = self.frame_count().saturating_sub(1);
        if self.current < last {
            self.current += 1;
            self.arm_tick();
        } else if self.auto_repeat {
            self.current = 0;
            self.arm_tick();
        } else {
            self.mode = Mode::Paused;
            self.next_tick = None;
        }
    }

    fn handle_probed(&mut self, result: Result<f64, PlayerError>) {
        self.stage_pending = false;
        if self.mode == Mode::CleaningUp {
            self.maybe_finish_cleanup();
            return;
        }
        if self.mode != Mode::LoadingMetadata {
            return;
        }
        match result {
            Ok(frame_rate) => {
                self.frame_rate = frame_rate;
                match Workspace::create() {
                    Ok(workspace) => match workspace.path().map(|path| path.to_owned()) {
                        Some(dir) => {
                            self.workspace = Some(workspace);
                            self.mode = Mode::Extracting;
                            self.spawn_extract(dir);
                        }
                        None => self.begin_cleanup(Some(PlayerError::Extraction(
                            "extraction directory closed before use".to_owned(),
                        ))),
                    },
                    Err(err) => self.begin_cleanup(Some(err)),
                }
            }
            Err(err) => self.begin_cleanup(Some(err)),
        }
    }

    fn handle_extracted(&mut self, result: Result<Vec<PathBuf>, PlayerError>) {
        self.stage_pending = false;
        if self.mode == Mode::CleaningUp {
            self.maybe_finish_cleanup();
            return;
        }
        if self.mode != Mode::Extracting {
            return;
        }
        match result {
            Ok(paths) => {
                self.frame_paths = paths;
                self.loaded = 0;
                self.mode = Mode::LoadingFrames;
                self.spawn_load();
            }
            Err(err) => self.begin_cleanup(Some(err)),
        }
    }

    fn handle_frame_decoded(&mut self) {
        if self.mode == Mode::LoadingFrames {
            self.loaded += 1;
        }
    }

    fn handle_loaded(&mut self, result: Result<Vec<DynamicImage>, PlayerError>) {
        self.stage_pending = false;
        if self.mode == Mode::CleaningUp {
            self.maybe_finish_cleanup();
            return;
        }
        if self.mode != Mode::LoadingFrames {
            return;
        }
        match result {
            Ok(rasters) => {
                let cache = Arc::new(RenderCache::new(rasters));
                Arc::clone(&cache).spawn_preload(self.current, self.viewport);
                self.cache = Some(cache);
                if self.auto_play {
                    self.mode = Mode::Playing;
                    self.arm_tick();
                } else {
                    self.mode = Mode::Paused;
                    self.next_tick = None;
                }
            }
            Err(err) => self.begin_cleanup(Some(err)),
        }
    }

    /// Switches to cleanup: cancels stage work and the preload walk, records
    /// `error` as the run's outcome unless one is already set, and tears the
    /// workspace down once no stage result is still in flight.
    fn begin_cleanup(&mut self, error: Option<PlayerError>) {
        if self.mode == Mode::CleaningUp {
            return;
        }
        if self.fatal.is_none() {
            self.fatal = error;
        }
        self.mode = Mode::CleaningUp;
        self.cancel.store(true, Ordering::Relaxed);
        if let Some(cache) = &self.cache {
            cache.cancel_preload();
        }
        self.drain_deadline = Some(Instant::now() + DRAIN_TIMEOUT);
        self.arm_spinner();
        self.maybe_finish_cleanup();
    }

    fn maybe_finish_cleanup(&mut self) {
        if self.mode != Mode::CleaningUp {
            return;
        }
        let drained = !self.stage_pending
            || self
                .drain_deadline
                .is_some_and(|deadline| Instant::now() >= deadline);
        if !drained {
            return;
        }
        if let Some(workspace) = self.workspace.as_mut() {
            if let Err(err) = workspace.teardown() {
                // A pipeline failure is the story; a cleanup failure only
                // surfaces when nothing else went wrong.
                if self.fatal.is_none() {
                    self.fatal = Some(err);
                }
            }
        }
        self.done = true;
    }

    pub(crate) fn frame_count(&self) -> usize {
        self.frame_paths.len()
    }

    fn arm_tick(&mut self) {
        let interval = Duration::from_secs_f64(1.0 / self.frame_rate * TICK_SCALE);
        self.next_tick = Some(Instant::now() + interval);
    }

    fn arm_spinner(&mut self) {
        self.next_tick = Some(Instant::now() + SPINNER_INTERVAL);
    }

    fn spawn_probe(&mut self) {
        self.stage_pending = true;
        let tx = self.tx.clone();
        let path = self.path.clone();
        let spawned = thread::Builder::new()
            .name("telecine-probe".to_owned())
            .spawn(move || {
                let result = extract::probe_frame_rate(&path);
                let _ = tx.send(Event::Probed(result));
            });
        if let Err(err) = spawned {
            self.stage_pending = false;
            self.begin_cleanup(Some(PlayerError::Probe(format!(
                "failed to start probe thread: {err}"
            ))));
        }
    }

    fn spawn_extract(&mut self, dir: PathBuf) {
        self.stage_pending = true;
        let tx = self.tx.clone();
        let path = self.path.clone();
        let frame_rate = self.frame_rate;
        let cancel = Arc::clone(&self.cancel);
        let spawned = thread::Builder::new()
            .name("telecine-extract".to_owned())
            .spawn(move || {
                let result = extract::extract_frames(&path, frame_rate, &dir, &cancel);
                let _ = tx.send(Event::Extracted(result));
            });
        if let Err(err) = spawned {
            self.stage_pending = false;
            self.begin_cleanup(Some(PlayerError::Extraction(format!(
                "failed to start extraction thread: {err}"
            ))));
        }
    }

    fn spawn_load(&mut self) {
        self.stage_pending = true;
        let tx = self.tx.clone();
        let progress_tx = self.tx.clone();
        let paths = self.frame_paths.clone();
        let cancel = Arc::clone(&self.cancel);
        let spawned = thread::Builder::new()
            .name("telecine-loader".to_owned())
            .spawn(move || {
                let result = loader::load_frames(&paths, &cancel, move |index| {
                    let _ = progress_tx.send(Event::FrameDecoded(index));
                });
                let _ = tx.send(Event::Loaded(result));
            });
        if let Err(err) = spawned {
            self.stage_pending = false;
            self.begin_cleanup(Some(PlayerError::Extraction(format!(
                "failed to start frame loading thread: {err}"
            ))));
        }
    }
}
