//! This module paces the simulation at a fixed tick rate, listening to the
//! keyboard in the meantime

use crate::input::{InputEvent, LineEditor};
use crossterm::event::{self, Event};
use std::{
    io,
    time::{Duration, Instant},
};

/// Reason why `Ticker::wait` returned
#[derive(Debug)]
pub enum Wakeup {
    /// A tick is due, with the wall-clock time elapsed since the previous one
    Tick(Duration),

    /// The user did something at the prompt
    Input(InputEvent),
}

/// Fixed-cadence tick source
///
/// Ticks are scheduled at a fixed period. If the program falls behind (slow
/// terminal, suspended process), missed ticks are not replayed: the next one
/// simply measures a longer interval.
#[derive(Debug)]
pub struct Ticker {
    /// Target time between two ticks
    period: Duration,

    /// When the previous tick was delivered
    last_tick: Instant,

    /// When the next tick is due
    next_tick: Instant,
}
//
impl Ticker {
    /// Schedule the first tick one period from `now`
    pub fn new(period: Duration, now: Instant) -> Self {
        assert!(!period.is_zero(), "The tick period must be positive");
        Self {
            period,
            last_tick: now,
            next_tick: now + period,
        }
    }

    /// Wait for the next tick, feeding key presses to the line editor
    ///
    /// Returns early if a key press completes an input event.
    pub fn wait(&mut self, editor: &mut LineEditor) -> io::Result<Wakeup> {
        loop {
            let now = Instant::now();
            if let Some(delta) = self.tick_due(now) {
                return Ok(Wakeup::Tick(delta));
            }
            if event::poll(self.next_tick - now)? {
                if let Event::Key(key) = event::read()? {
                    if let Some(input) = editor.handle_key(key) {
                        return Ok(Wakeup::Input(input));
                    }
                }
            }
        }
    }

    /// Deliver a tick if one is due at `now`
    fn tick_due(&mut self, now: Instant) -> Option<Duration> {
        if now < self.next_tick {
            return None;
        }
        let delta = now - self.last_tick;
        self.last_tick = now;
        self.next_tick += self.period;
        if self.next_tick <= now {
            self.next_tick = now + self.period;
        }
        Some(delta)
    }
}
