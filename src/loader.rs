//! Loading byte buffers into playable animations.
//!
//! [`GifAnimation`] owns the decoded frame store, the compositor and the
//! playback controller, and exposes the host-facing surface: load, query
//! frame geometry and timing, seek, start/stop, and fetch composed images.
//!
//! Loading degrades instead of failing: a malformed tail loses the frames
//! behind it, an unusable block loses only itself, and whatever decoded
//! cleanly stays playable. Only a bad header or a file without a single
//! complete frame leaves the animation invalid.

use std::time::Duration;

use crate::animation::{AnimationController, PlaybackState};
use crate::compose::Compositor;
use crate::data::{ColorTable, ComposedFrame, GraphicControl, RawFrame, ScreenDescriptor};
use crate::parser::{BlockDecoder, BlockEvent, ExtensionKind};

/// Playback policy knobs, fixed at load time.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PlaybackConfig {
    /// Start playing as soon as a load succeeds
    pub autostart: bool,
    /// Stop after the file-specified number of loops
    pub honor_loop_count: bool,
    /// Lower bound applied to every frame delay, in seconds
    pub min_delay_floor: f64,
    /// Keep only the running canvas and recompose on demand
    pub memory_optimized: bool,
    /// Emit per-frame geometry to the log while loading (0 = off)
    pub debug: u8,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            autostart: true,
            honor_loop_count: true,
            min_delay_floor: 0.01,
            memory_optimized: false,
            debug: 0,
        }
    }
}

/// Parse a NETSCAPE2.0 looping extension payload.
///
/// The payload is the application identifier plus the sub-block data: 11
/// bytes of `NETSCAPE2.0`, a sub-block id of 1, and a little-endian loop
/// count. Anything else is some other application's extension.
fn parse_loop_count(payload: &[u8]) -> Option<u32> {
    if payload.len() >= 14 && &payload[..11] == b"NETSCAPE2.0" && payload[11] == 1 {
        Some(u16::from_le_bytes([payload[12], payload[13]]) as u32)
    } else {
        None
    }
}

/// A loaded animated GIF with its playback state.
///
/// Construction never fails; [`valid`](GifAnimation::valid) reports whether
/// the last load produced at least one playable frame. All frame accessors
/// return `None`/`false` on an invalid or empty animation, so a failed load
/// behaves like an animation with zero frames.
///
/// The host drives time: either poll [`advance`](GifAnimation::advance)
/// with elapsed wall-clock time, or arm a timer for
/// [`next_wake_after`](GifAnimation::next_wake_after) and call
/// [`on_tick`](GifAnimation::on_tick) when it fires.
///
/// ## Example
///
/// ```rust,ignore
/// use gif_core_view::{GifAnimation, PlaybackConfig};
///
/// let bytes = std::fs::read("animation.gif")?;
/// let mut anim = GifAnimation::from_bytes(&bytes, PlaybackConfig::default());
/// assert!(anim.valid());
///
/// while anim.playing() {
///     let wait = anim.next_wake_after().unwrap();
///     std::thread::sleep(wait);
///     anim.on_tick();
///     let image = anim.current_image().unwrap();
///     // blit `image.pixels` to the screen
/// }
/// ```
pub struct GifAnimation {
    config: PlaybackConfig,
    screen: ScreenDescriptor,
    frames: Vec<RawFrame>,
    compositor: Compositor,
    controller: AnimationController,
    valid: bool,
}

impl GifAnimation {
    /// Create an empty, invalid animation with the given policy.
    pub fn new(config: PlaybackConfig) -> Self {
        Self {
            config,
            screen: ScreenDescriptor::default(),
            frames: Vec::new(),
            compositor: Compositor::new(0, 0, config.memory_optimized),
            controller: AnimationController::new(config.min_delay_floor, config.honor_loop_count),
            valid: false,
        }
    }

    /// Decode a byte buffer into a ready-to-play animation.
    pub fn from_bytes(data: &[u8], config: PlaybackConfig) -> Self {
        let mut anim = Self::new(config);
        anim.load(data);
        anim
    }

    /// Replace the current animation with one decoded from `data`.
    ///
    /// All previous frames, playback position and composed state are
    /// dropped, whether or not the new load succeeds. Returns the new
    /// validity.
    pub fn load(&mut self, data: &[u8]) -> bool {
        self.screen = ScreenDescriptor::default();
        self.frames.clear();
        self.valid = false;
        self.controller =
            AnimationController::new(self.config.min_delay_floor, self.config.honor_loop_count);

        let mut loop_count: Option<u32> = None;
        let mut pending: Option<GraphicControl> = None;

        for event in BlockDecoder::new(data) {
            match event {
                Ok(BlockEvent::Header(screen)) => {
                    log::debug!(
                        "decoded header: {}x{} canvas, global palette: {}",
                        screen.width,
                        screen.height,
                        screen.global_table.as_ref().map_or(0, |t| t.len()),
                    );
                    self.screen = screen;
                }
                Ok(BlockEvent::GraphicControl(control)) => {
                    pending = Some(control);
                }
                Ok(BlockEvent::Image(image)) => {
                    let control = pending.take().unwrap_or_default();
                    if !image.is_complete() {
                        log::warn!(
                            "dropping frame {}: raster cut off at {} of {} pixels",
                            self.frames.len(),
                            image.indices.len(),
                            image.width as usize * image.height as usize,
                        );
                        continue;
                    }
                    let color_table = image
                        .local_table
                        .or_else(|| self.screen.global_table.clone())
                        .unwrap_or_else(ColorTable::default);
                    if self.config.debug > 0 {
                        log::debug!(
                            "frame {}: {}x{} at ({},{}), delay {}s, disposal {:?}",
                            self.frames.len(),
                            image.width,
                            image.height,
                            image.x,
                            image.y,
                            control.delay,
                            control.disposal,
                        );
                    }
                    self.frames.push(RawFrame {
                        x: image.x,
                        y: image.y,
                        width: image.width,
                        height: image.height,
                        delay: control.delay,
                        disposal: control.disposal,
                        transparent_index: control.transparent_index,
                        interlaced: image.interlaced,
                        indices: image.indices,
                        color_table,
                    });
                }
                Ok(BlockEvent::Extension { kind, payload }) => {
                    if kind == ExtensionKind::Application {
                        if let Some(count) = parse_loop_count(&payload) {
                            log::debug!("loop count: {}", count);
                            loop_count = Some(count);
                        }
                    }
                }
                Ok(BlockEvent::Trailer) => break,
                Err(e) => {
                    // Whatever decoded before the error stays usable
                    log::warn!("decode error after {} frames: {}", self.frames.len(), e);
                }
            }
        }

        self.compositor = Compositor::new(
            self.screen.width,
            self.screen.height,
            self.config.memory_optimized,
        );
        if !self.config.memory_optimized {
            for _ in 0..self.frames.len() {
                self.compositor.push(&self.frames);
            }
        }

        self.controller
            .set_frames(self.frames.iter().map(|f| f.delay).collect());
        self.controller.set_loop_count(loop_count);

        self.valid = !self.frames.is_empty();
        log::debug!(
            "load {}: {} frames, {}x{}",
            if self.valid { "succeeded" } else { "failed" },
            self.frames.len(),
            self.screen.width,
            self.screen.height,
        );

        if self.valid && self.config.autostart {
            self.controller.start();
        }
        self.valid
    }

    /// Whether the last load produced at least one playable frame.
    #[inline]
    pub fn valid(&self) -> bool {
        self.valid
    }

    /// Number of decoded frames.
    #[inline]
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Canvas width in pixels.
    #[inline]
    pub fn canvas_w(&self) -> u16 {
        self.screen.width
    }

    /// Canvas height in pixels.
    #[inline]
    pub fn canvas_h(&self) -> u16 {
        self.screen.height
    }

    /// Index of the currently displayed frame, or None when there are no
    /// frames.
    pub fn current_frame(&self) -> Option<usize> {
        if self.valid {
            Some(self.controller.current_frame())
        } else {
            None
        }
    }

    /// Jump to a frame without changing the play/stop state.
    pub fn set_frame(&mut self, frame: usize) -> bool {
        self.valid && self.controller.seek(frame)
    }

    /// Raw delay of a frame in seconds.
    pub fn delay(&self, frame: usize) -> Option<f64> {
        self.controller.delay(frame)
    }

    /// Override the raw delay of a frame in seconds.
    pub fn set_delay(&mut self, frame: usize, delay: f64) {
        self.controller.set_delay(frame, delay);
    }

    /// Left edge of a frame's stored rectangle.
    ///
    /// With `memory_optimized` frames keep their file-specified
    /// sub-rectangle; otherwise composed frames cover the whole canvas and
    /// the offset is 0.
    pub fn frame_x(&self, frame: usize) -> Option<u16> {
        let f = self.frames.get(frame)?;
        Some(if self.config.memory_optimized { f.x } else { 0 })
    }

    /// Top edge of a frame's stored rectangle.
    pub fn frame_y(&self, frame: usize) -> Option<u16> {
        let f = self.frames.get(frame)?;
        Some(if self.config.memory_optimized { f.y } else { 0 })
    }

    /// Width of a frame's stored rectangle.
    pub fn frame_w(&self, frame: usize) -> Option<u16> {
        let f = self.frames.get(frame)?;
        Some(if self.config.memory_optimized {
            f.width
        } else {
            self.screen.width
        })
    }

    /// Height of a frame's stored rectangle.
    pub fn frame_h(&self, frame: usize) -> Option<u16> {
        let f = self.frames.get(frame)?;
        Some(if self.config.memory_optimized {
            f.height
        } else {
            self.screen.height
        })
    }

    /// The decoded frame store, in file order.
    #[inline]
    pub fn frames(&self) -> &[RawFrame] {
        &self.frames
    }

    /// Composed full-canvas image for a frame index.
    pub fn frame_at(&mut self, frame: usize) -> Option<&ComposedFrame> {
        self.compositor.frame_at(&self.frames, frame)
    }

    /// Composed image of the currently displayed frame.
    pub fn current_image(&mut self) -> Option<&ComposedFrame> {
        let frame = self.current_frame()?;
        self.compositor.frame_at(&self.frames, frame)
    }

    /// Start (or restart) playback. Fails when invalid or already playing.
    pub fn start(&mut self) -> bool {
        self.valid && self.controller.start()
    }

    /// Stop playback, keeping the current frame. Fails when not playing.
    pub fn stop(&mut self) -> bool {
        self.controller.stop()
    }

    /// Whether the animation is valid and currently playing.
    pub fn playing(&self) -> bool {
        self.valid && self.controller.state() == PlaybackState::Playing
    }

    /// Playback speed multiplier.
    #[inline]
    pub fn speed(&self) -> f64 {
        self.controller.speed()
    }

    /// Change the playback speed; non-positive values are ignored.
    pub fn set_speed(&mut self, speed: f64) {
        self.controller.set_speed(speed);
    }

    /// How long the host should wait before calling
    /// [`on_tick`](GifAnimation::on_tick). None when not playing.
    pub fn next_wake_after(&self) -> Option<Duration> {
        self.controller.next_wake_after()
    }

    /// Advance to the next frame; call when the armed wait expires.
    pub fn on_tick(&mut self) -> Option<usize> {
        self.controller.on_tick()
    }

    /// Advance the virtual clock by `dt`, ticking as many frames as the
    /// elapsed time covers. Returns the current frame index.
    pub fn advance(&mut self, dt: Duration) -> Option<usize> {
        self.controller.advance(dt)
    }
}
