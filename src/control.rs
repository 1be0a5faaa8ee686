//! The render-side driver: event pump, hotkeys, frame timing and one
//! presenter cycle per iteration.

use crate::frame::Frame;
use crate::hud;
use crate::presenter::{Presenter, PresenterError};
use crate::ring::FrameReader;
use crate::{log_error, log_info};
use std::time::{Duration, Instant};

/// Default back-off when no frame has been published yet.
pub const IDLE_SLEEP: Duration = Duration::from_millis(1);

const ERROR_LOG_INTERVAL: Duration = Duration::from_secs(1);

/// Flags toggled by the hotkeys and read by the presenter every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlState {
    pub overlay_visible: bool,
    pub vsync_enabled: bool,
    pub running: bool,
}

impl ControlState {
    pub fn new(overlay_visible: bool, vsync_enabled: bool) -> Self {
        Self {
            overlay_visible,
            vsync_enabled,
            running: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    ToggleOverlay,
    ToggleVsync,
    Exit,
}

impl Trigger {
    pub const ALL: [Trigger; 3] = [Trigger::ToggleOverlay, Trigger::ToggleVsync, Trigger::Exit];

    pub fn label(self) -> &'static str {
        match self {
            Trigger::ToggleOverlay => "FPS overlay",
            Trigger::ToggleVsync => "VSync",
            Trigger::Exit => "Exit",
        }
    }
}

/// Turns a sampled level ("is the key held") into a single rising-edge event.
#[derive(Debug, Default, Clone, Copy)]
pub struct EdgeTrigger {
    was_active: bool,
}

impl EdgeTrigger {
    pub fn poll(&mut self, active: bool) -> bool {
        let edge = active && !self.was_active;
        self.was_active = active;
        edge
    }
}

pub trait EventPump {
    /// Drains and dispatches every pending platform event. Returns `true` if
    /// a close request was among them.
    fn pump(&mut self) -> bool;
}

pub trait TriggerInput {
    fn is_active(&mut self, trigger: Trigger) -> bool;
}

/// Instantaneous rate from the delta between consecutive ticks.
#[derive(Debug, Clone, Copy)]
pub struct FrameClock {
    last: Instant,
}

impl FrameClock {
    pub fn starting_at(now: Instant) -> Self {
        Self { last: now }
    }

    pub fn tick(&mut self, now: Instant) -> f64 {
        let delta = now.saturating_duration_since(self.last).as_secs_f64();
        self.last = now;
        if delta > 0.0 {
            1.0 / delta
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Nothing published yet; the loop slept briefly.
    Idle,
    /// A frame went through upload and present.
    Presented,
    /// The frame was dropped by a recoverable presenter error.
    Skipped,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LoopStats {
    pub iterations: u64,
    pub idle: u64,
    pub presented: u64,
    pub skipped: u64,
    pub errors: u64,
    pub last_fps: f64,
}

pub struct ControlLoop<P, E, T> {
    presenter: P,
    events: E,
    input: T,
    state: ControlState,
    codec: String,
    edges: [EdgeTrigger; 3],
    clock: FrameClock,
    idle_sleep: Duration,
    stats: LoopStats,
    last_error_log: Option<Instant>,
}

impl<P, E, T> ControlLoop<P, E, T>
where
    P: Presenter,
    E: EventPump,
    T: TriggerInput,
{
    pub fn new(presenter: P, events: E, input: T, state: ControlState, codec: impl Into<String>) -> Self {
        Self {
            presenter,
            events,
            input,
            state,
            codec: codec.into(),
            edges: [EdgeTrigger::default(); 3],
            clock: FrameClock::starting_at(Instant::now()),
            idle_sleep: IDLE_SLEEP,
            stats: LoopStats::default(),
            last_error_log: None,
        }
    }

    pub fn with_idle_sleep(mut self, idle_sleep: Duration) -> Self {
        self.idle_sleep = idle_sleep;
        self
    }

    pub fn state(&self) -> &ControlState {
        &self.state
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn into_parts(self) -> (P, ControlState, LoopStats) {
        (self.presenter, self.state, self.stats)
    }

    /// Iterates until `running` is cleared by the exit key or a close event.
    pub fn run(&mut self, reader: &mut FrameReader) {
        log_info!(
            "Render loop started (overlay: {}, vsync: {})",
            self.state.overlay_visible,
            self.state.vsync_enabled
        );

        while self.state.running {
            self.step(reader);
        }

        log_info!(
            "Render loop ended ({} presented, {} skipped, {} idle, {} errors)",
            self.stats.presented,
            self.stats.skipped,
            self.stats.idle,
            self.stats.errors
        );
    }

    /// One iteration. Always runs to completion, even after `running` is
    /// cleared part-way through.
    pub fn step(&mut self, reader: &mut FrameReader) -> Step {
        self.stats.iterations += 1;

        if self.events.pump() && self.state.running {
            log_info!("Close requested by window");
            self.state.running = false;
        }

        self.poll_triggers();

        let Some(frame) = reader.try_latest() else {
            self.stats.idle += 1;
            spin_sleep::sleep(self.idle_sleep);
            return Step::Idle;
        };

        let fps = self.clock.tick(Instant::now());
        self.stats.last_fps = fps;

        if self.state.overlay_visible {
            let text = hud::status_line(fps, &self.codec, self.state.vsync_enabled);
            hud::burn_status(frame, &text);
        }

        let step = self.present(frame);
        match step {
            Step::Presented => self.stats.presented += 1,
            Step::Skipped => self.stats.skipped += 1,
            Step::Idle => {}
        }
        step
    }

    fn poll_triggers(&mut self) {
        for (edge, trigger) in self.edges.iter_mut().zip(Trigger::ALL) {
            let active = self.input.is_active(trigger);
            if edge.poll(active) {
                apply_trigger(&mut self.state, trigger);
            }
        }
    }

    fn present(&mut self, frame: &Frame) -> Step {
        if let Err(e) = self.presenter.ensure_upload_texture(frame.width(), frame.height()) {
            self.report(&e);
            return Step::Skipped;
        }

        // A failed upload keeps the previous texture contents on screen.
        if let Err(e) = self.presenter.upload_frame(frame) {
            self.report(&e);
        }

        if let Err(e) = self.presenter.render(&self.state) {
            self.report(&e);
            return Step::Skipped;
        }

        Step::Presented
    }

    fn report(&mut self, error: &PresenterError) {
        self.stats.errors += 1;

        let due = self
            .last_error_log
            .map_or(true, |at| at.elapsed() >= ERROR_LOG_INTERVAL);
        if due {
            log_error!("Render error (count: {}): {}", self.stats.errors, error);
            self.last_error_log = Some(Instant::now());
        }
    }
}

fn apply_trigger(state: &mut ControlState, trigger: Trigger) {
    match trigger {
        Trigger::ToggleOverlay => {
            state.overlay_visible = !state.overlay_visible;
            log_info!("FPS overlay {}", if state.overlay_visible { "ON" } else { "OFF" });
        }
        Trigger::ToggleVsync => {
            state.vsync_enabled = !state.vsync_enabled;
            log_info!("VSync {}", if state.vsync_enabled { "ON" } else { "OFF" });
        }
        Trigger::Exit => {
            log_info!("Exit key pressed");
            state.running = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_fires_on_rising_transitions_only() {
        let mut edge = EdgeTrigger::default();
        let fired: Vec<usize> = [false, true, true, false, true]
            .into_iter()
            .enumerate()
            .filter_map(|(i, active)| edge.poll(active).then_some(i))
            .collect();
        assert_eq!(fired, vec![1, 4]);
    }

    #[test]
    fn frame_clock_reports_rate_from_delta() {
        let start = Instant::now();
        let mut clock = FrameClock::starting_at(start);
        let fps = clock.tick(start + Duration::from_millis(20));
        assert!((fps - 50.0).abs() < 1e-6);
        assert_eq!(clock.tick(start + Duration::from_millis(20)), 0.0);
    }

    #[test]
    fn triggers_toggle_and_stop() {
        let mut state = ControlState::new(false, false);
        apply_trigger(&mut state, Trigger::ToggleOverlay);
        apply_trigger(&mut state, Trigger::ToggleVsync);
        assert!(state.overlay_visible && state.vsync_enabled && state.running);
        apply_trigger(&mut state, Trigger::ToggleVsync);
        assert!(!state.vsync_enabled);
        apply_trigger(&mut state, Trigger::Exit);
        assert!(!state.running);
    }
}
