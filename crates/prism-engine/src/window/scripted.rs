use winit::dpi::PhysicalSize;

use super::WindowHost;

/// A [`WindowHost`] that requests close after a fixed number of polls.
///
/// Time starts at `start` and advances by `step` seconds on every poll.
#[derive(Debug, Clone)]
pub struct ScriptedHost {
    polls_before_close: u64,
    polls: u64,
    start: f64,
    step: f64,
    resizes: Vec<(u64, PhysicalSize<u32>)>,
    pending_resize: Option<PhysicalSize<u32>>,
}

impl ScriptedHost {
    /// Closes on the `frames`-th poll, so a loop renders exactly `frames` frames.
    pub fn closing_after(frames: u64) -> Self {
        Self {
            polls_before_close: frames,
            polls: 0,
            start: 0.0,
            step: 0.0,
            resizes: Vec::new(),
            pending_resize: None,
        }
    }

    /// Reports a constant time.
    pub fn at_time(mut self, seconds: f64) -> Self {
        self.start = seconds;
        self.step = 0.0;
        self
    }

    /// Advances the reported time by `step` seconds per poll.
    pub fn stepping(mut self, start: f64, step: f64) -> Self {
        self.start = start;
        self.step = step;
        self
    }

    /// Reports a resize to `size` during the `poll`-th poll (1-based).
    pub fn resize_at(mut self, poll: u64, size: PhysicalSize<u32>) -> Self {
        self.resizes.push((poll, size));
        self
    }

    pub fn polls(&self) -> u64 {
        self.polls
    }
}

impl WindowHost for ScriptedHost {
    fn poll_events(&mut self) {
        self.polls += 1;
        if let Some(&(_, size)) = self.resizes.iter().find(|(at, _)| *at == self.polls) {
            self.pending_resize = Some(size);
        }
    }

    fn close_requested(&self) -> bool {
        self.polls >= self.polls_before_close
    }

    fn time(&self) -> f64 {
        self.start + self.step * self.polls as f64
    }

    fn take_resize(&mut self) -> Option<PhysicalSize<u32>> {
        self.pending_resize.take()
    }
}
