//! Playback controller for timed frame advancement.

use std::time::Duration;

/// Current state of the animation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PlaybackState {
    /// Animation is stopped
    Stopped,
    /// Animation is playing
    Playing,
}

/// Host-scheduled playback state machine over a decoded frame sequence.
///
/// The controller never spawns threads or arms timers itself. It advances
/// frames over a virtual clock driven by the host in one of two ways:
///
/// - timer style: arm a one-shot timer for [`next_wake_after`] and call
///   [`on_tick`] when it fires (the wait is re-armed per frame because
///   delays vary and the speed multiplier may change between ticks), or
/// - polling style: call [`advance`] with the elapsed wall-clock time.
///
/// Each frame is shown for `max(raw_delay, min_delay_floor) / speed`
/// seconds. The floor guards against pathological near-zero delays.
///
/// ## Example
///
/// ```rust
/// use gif_core_view::AnimationController;
///
/// let mut controller = AnimationController::new(0.02, true);
/// controller.set_frames(vec![0.1, 0.1, 0.1]);
///
/// assert!(controller.start());
/// // Advance frames (call this when your timer fires)
/// controller.on_tick();
/// assert_eq!(controller.current_frame(), 1);
/// ```
#[derive(Clone, Debug)]
pub struct AnimationController {
    /// Raw per-frame delays in seconds
    delays: Vec<f64>,
    /// Current frame index
    current_frame: usize,
    /// Current playback state
    state: PlaybackState,
    /// Playback speed multiplier
    speed: f64,
    /// Lower bound applied to every raw delay, in seconds
    min_delay: f64,
    /// Whether the file's loop count is honored at all
    honor_loop_count: bool,
    /// File-specified number of traversals; None means forever
    loop_count: Option<u32>,
    /// Traversals left before stopping; None means forever
    loops_remaining: Option<u32>,
    /// Time left until the armed tick fires, for `advance`
    pending: f64,
}

impl AnimationController {
    /// Create a controller with the given delay floor and loop policy.
    pub fn new(min_delay: f64, honor_loop_count: bool) -> Self {
        Self {
            delays: Vec::new(),
            current_frame: 0,
            state: PlaybackState::Stopped,
            speed: 1.0,
            min_delay: min_delay.max(0.0),
            honor_loop_count,
            loop_count: None,
            loops_remaining: None,
            pending: 0.0,
        }
    }

    /// Install the per-frame delays of a freshly decoded animation.
    ///
    /// Resets the position to frame 0 and stops playback.
    pub fn set_frames(&mut self, delays: Vec<f64>) {
        self.delays = delays;
        self.current_frame = 0;
        self.state = PlaybackState::Stopped;
        self.pending = 0.0;
        self.loops_remaining = self.initial_loops();
    }

    /// Set the file-specified loop count (total traversals).
    ///
    /// `None` or `Some(0)` both mean "loop forever", matching the
    /// NETSCAPE2.0 convention where 0 is infinite.
    pub fn set_loop_count(&mut self, count: Option<u32>) {
        self.loop_count = match count {
            Some(0) | None => None,
            Some(n) => Some(n),
        };
        self.loops_remaining = self.initial_loops();
    }

    fn initial_loops(&self) -> Option<u32> {
        if self.honor_loop_count {
            self.loop_count
        } else {
            None
        }
    }

    /// Get the total number of frames.
    #[inline]
    pub fn frame_count(&self) -> usize {
        self.delays.len()
    }

    /// Get the current frame index (0 when there are no frames).
    #[inline]
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    /// Get the current playback state.
    #[inline]
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Check if the animation is currently playing.
    #[inline]
    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    /// Get the raw delay of a frame in seconds.
    pub fn delay(&self, frame: usize) -> Option<f64> {
        self.delays.get(frame).copied()
    }

    /// Override the raw delay of a frame in seconds (negative values are
    /// clamped to zero).
    pub fn set_delay(&mut self, frame: usize, delay: f64) {
        if let Some(d) = self.delays.get_mut(frame) {
            *d = delay.max(0.0);
        }
    }

    /// Get the playback speed multiplier.
    #[inline]
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Change the playback speed, e.g. 0.5 for half speed, 2.0 for double.
    ///
    /// Takes effect on the next scheduled tick; an in-flight wait is not
    /// shortened. Non-positive values are ignored.
    pub fn set_speed(&mut self, speed: f64) {
        if speed > 0.0 {
            self.speed = speed;
        }
    }

    /// The time a frame stays on screen: the raw delay raised to the
    /// floor, divided by the speed multiplier.
    pub fn effective_delay(&self, frame: usize) -> Option<f64> {
        self.delays
            .get(frame)
            .map(|d| d.max(self.min_delay) / self.speed)
    }

    /// How long the host should wait before the next [`on_tick`] call.
    ///
    /// None when stopped or without frames; the host arms no timer then.
    pub fn next_wake_after(&self) -> Option<Duration> {
        if !self.is_playing() {
            return None;
        }
        self.effective_delay(self.current_frame)
            .map(Duration::from_secs_f64)
    }

    /// Start (or restart) playback.
    ///
    /// Fails when already playing or when there are no frames. Starting
    /// after the loop count ran out re-arms the file's count.
    pub fn start(&mut self) -> bool {
        if self.is_playing() || self.frame_count() == 0 {
            return false;
        }
        if self.loops_remaining == Some(0) {
            self.loops_remaining = self.initial_loops();
        }
        self.pending = self.effective_delay(self.current_frame).unwrap_or(0.0);
        self.state = PlaybackState::Playing;
        true
    }

    /// Stop playback, keeping the current frame.
    ///
    /// Fails (as a no-op) when already stopped.
    pub fn stop(&mut self) -> bool {
        if !self.is_playing() {
            return false;
        }
        self.state = PlaybackState::Stopped;
        true
    }

    /// Jump to a frame without changing the play/stop state.
    ///
    /// The index is clamped to the valid range; fails only when there are
    /// no frames at all.
    pub fn seek(&mut self, frame: usize) -> bool {
        if self.frame_count() == 0 {
            return false;
        }
        self.current_frame = frame.min(self.frame_count() - 1);
        self.pending = self.effective_delay(self.current_frame).unwrap_or(0.0);
        true
    }

    /// Advance to the next frame; call when the armed per-frame wait fires.
    ///
    /// Wrapping past the last frame consumes one loop; when the loop count
    /// runs out the controller stops on the final frame. Returns the new
    /// frame index, or None if the tick stopped (or wasn't driving)
    /// playback.
    pub fn on_tick(&mut self) -> Option<usize> {
        if !self.is_playing() || self.frame_count() == 0 {
            return None;
        }

        if self.current_frame + 1 < self.frame_count() {
            self.current_frame += 1;
        } else {
            match &mut self.loops_remaining {
                None => self.current_frame = 0,
                Some(n) => {
                    *n -= 1;
                    if *n == 0 {
                        self.state = PlaybackState::Stopped;
                        return None;
                    }
                    self.current_frame = 0;
                }
            }
        }

        self.pending = self.effective_delay(self.current_frame).unwrap_or(0.0);
        Some(self.current_frame)
    }

    /// Advance the virtual clock by `dt`, ticking as many frames as the
    /// elapsed time covers. Returns the current frame index, or None when
    /// there are no frames.
    pub fn advance(&mut self, dt: Duration) -> Option<usize> {
        if self.frame_count() == 0 {
            return None;
        }
        if self.is_playing() {
            self.pending -= dt.as_secs_f64();
            while self.is_playing() && self.pending <= 0.0 {
                let leftover = self.pending;
                if self.on_tick().is_none() {
                    self.pending = 0.0;
                    break;
                }
                self.pending += leftover;
                // A zero effective delay would never drain the clock
                if self.effective_delay(self.current_frame).unwrap_or(0.0) <= 0.0 {
                    break;
                }
            }
        }
        Some(self.current_frame)
    }
}
