//! Terminal surface: raw-mode lifecycle, the input reader thread, and
//! drawing each engine mode as a full-screen frame.

use std::io::{self, Write};
use std::sync::mpsc::Sender;
use std::thread;

use anyhow::Context;
use crossterm::cursor::{self, MoveTo};
use crossterm::event::{self, KeyEventKind};
use crossterm::style::{Print, PrintStyledContent, Stylize};
use crossterm::terminal::{self, Clear, ClearType};
use crossterm::{execute, queue};

use crate::cache::RESERVED_ROWS;
use crate::player::{Event, Mode, Player};

const SPINNER_FRAMES: &[&str] = &["⣾", "⣽", "⣻", "⢿", "⡿", "⣟", "⣯", "⣷"];
/// Display width of the help line; its byte length differs because of the
/// arrow glyphs.
const HELP_WIDTH: u16 = 31;

/// Puts the terminal into raw mode on the alternate screen and restores it
/// on drop, so every exit path (including panics) leaves the shell usable.
pub struct TerminalGuard;

impl TerminalGuard {
    pub fn enter() -> anyhow::Result<Self> {
        terminal::enable_raw_mode().context("failed to enable raw mode")?;
        if let Err(err) = execute!(io::stdout(), terminal::EnterAlternateScreen, cursor::Hide) {
            let _ = terminal::disable_raw_mode();
            return Err(err).context("failed to enter alternate screen");
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = execute!(io::stdout(), cursor::Show, terminal::LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}

/// Forwards key presses and resizes to the engine channel. Exits when the
/// engine hangs up or the terminal closes.
pub fn spawn_input_thread(tx: Sender<Event>) -> io::Result<()> {
    thread::Builder::new()
        .name("telecine-input".to_owned())
        .spawn(move || loop {
            match event::read() {
                Ok(event::Event::Key(key)) if key.kind == KeyEventKind::Press => {
                    if tx.send(Event::Key(key)).is_err() {
                        return;
                    }
                }
                Ok(event::Event::Resize(width, height)) => {
                    if tx.send(Event::Resize(width, height)).is_err() {
                        return;
                    }
                }
                Ok(_) => {}
                Err(_) => {
                    let _ = tx.send(Event::Quit);
                    return;
                }
            }
        })?;
    Ok(())
}

pub fn draw(player: &Player) -> io::Result<()> {
    let mut out = io::stdout().lock();
    match player.mode {
        Mode::LoadingMetadata => {
            draw_stage(&mut out, player.spinner_phase, "Loading video metadata...")
        }
        Mode::Extracting => draw_stage(&mut out, player.spinner_phase, "Extracting frames..."),
        Mode::CleaningUp => draw_stage(&mut out, player.spinner_phase, "Cleaning up..."),
        Mode::LoadingFrames => draw_loading(&mut out, player),
        Mode::Playing | Mode::Paused => draw_playback(&mut out, player),
    }?;
    out.flush()
}

fn draw_stage(out: &mut impl Write, phase: usize, text: &str) -> io::Result<()> {
    let glyph = SPINNER_FRAMES[phase % SPINNER_FRAMES.len()];
    queue!(
        out,
        Clear(ClearType::All),
        MoveTo(0, 0),
        PrintStyledContent(glyph.magenta()),
        Print(format!(" {text}")),
    )
}

fn draw_loading(out: &mut impl Write, player: &Player) -> io::Result<()> {
    let glyph = SPINNER_FRAMES[player.spinner_phase % SPINNER_FRAMES.len()];
    let total = player.frame_count();
    let ratio = if total == 0 {
        0.0
    } else {
        player.loaded as f64 / total as f64
    };
    let bar_width = usize::from(player.viewport.width.saturating_sub(4)).min(48);
    queue!(
        out,
        Clear(ClearType::All),
        MoveTo(0, 0),
        PrintStyledContent(glyph.magenta()),
        Print(" Loading frames..."),
        MoveTo(2, 2),
        Print(progress_bar(ratio, bar_width)),
        MoveTo(2, 3),
        Print(format!("{} / {}", player.loaded, total)),
    )
}

/// Frame text on top, then a reserved block at the bottom: progress bar,
/// centered timecode, a blank spacer, and the help line.
fn draw_playback(out: &mut impl Write, player: &Player) -> io::Result<()> {
    let Some(cache) = &player.cache else {
        return Ok(());
    };
    let text = cache.render(player.current, player.viewport);
    let width = player.viewport.width;
    let height = player.viewport.height;
    let frame_rows = height.saturating_sub(RESERVED_ROWS);

    let mut row: u16 = 0;
    for line in text.lines() {
        if row >= frame_rows {
            break;
        }
        queue!(
            out,
            MoveTo(0, row),
            Print(line),
            Clear(ClearType::UntilNewLine)
        )?;
        row += 1;
    }
    while row < height.saturating_sub(4) {
        queue!(out, MoveTo(0, row), Clear(ClearType::UntilNewLine))?;
        row += 1;
    }

    let total = player.frame_count();
    let mut ratio = if total == 0 {
        0.0
    } else {
        player.current as f64 / total as f64
    };
    if total > 0 && player.current + 1 == total {
        ratio = 1.0;
    }
    let bar_row = height.saturating_sub(4);
    queue!(
        out,
        MoveTo(0, bar_row),
        Clear(ClearType::UntilNewLine),
        Print(progress_bar(ratio, usize::from(width))),
    )?;

    let elapsed = seconds_at(player.current, player.frame_rate);
    let length = seconds_at(total, player.frame_rate);
    let clock = format!("{} / {}", format_timestamp(elapsed), format_timestamp(length));
    let clock_row = height.saturating_sub(3);
    queue!(
        out,
        MoveTo(0, clock_row),
        Clear(ClearType::UntilNewLine),
        MoveTo(centered_col(width, clock.len()), clock_row),
        Print(clock),
    )?;

    queue!(
        out,
        MoveTo(0, height.saturating_sub(2)),
        Clear(ClearType::UntilNewLine)
    )?;

    let help_row = height.saturating_sub(1);
    let badge = if player.mode == Mode::Playing {
        " ⏸ ".white().on_red()
    } else {
        " ▶ ".black().on_green()
    };
    queue!(
        out,
        MoveTo(0, help_row),
        Clear(ClearType::UntilNewLine),
        MoveTo(centered_col(width, usize::from(HELP_WIDTH)), help_row),
        Print("← 10s | "),
        PrintStyledContent(badge),
        Print(" Space/Enter | 10s →"),
    )?;
    Ok(())
}

fn progress_bar(ratio: f64, width: usize) -> String {
    let filled = (ratio.clamp(0.0, 1.0) * width as f64).round() as usize;
    let mut bar = String::with_capacity(width * 3);
    for _ in 0..filled {
        bar.push('█');
    }
    for _ in filled..width {
        bar.push('░');
    }
    bar
}

fn format_timestamp(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

fn seconds_at(frames: usize, frame_rate: f64) -> u64 {
    if frame_rate <= 0.0 {
        0
    } else {
        (frames as f64 / frame_rate) as u64
    }
}

fn centered_col(width: u16, len: usize) -> u16 {
    (usize::from(width).saturating_sub(len) / 2) as u16
}
