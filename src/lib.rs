//! # gif-core-view
//!
//! Core frame decoding and animation library for animated GIF viewers.
//!
//! This crate provides platform-agnostic data structures and logic for:
//! - Decoding GIF byte buffers (header, palettes, LZW rasters, extensions)
//! - Composing sub-rectangle frames into full-canvas RGBA images,
//!   honoring disposal methods and transparency
//! - Controlling animation playback (start/stop, speed, loop count,
//!   stepping) over a host-driven clock
//!
//! Decoding degrades instead of failing: a damaged file plays the frames
//! that decoded cleanly, and only a file without a single usable frame is
//! reported invalid.
//!
//! ## Features
//!
//! - `serde` - Enable serialization/deserialization for data structures
//!
//! ## Example
//!
//! ```rust,ignore
//! use gif_core_view::{GifAnimation, PlaybackConfig};
//!
//! let bytes = std::fs::read("animation.gif")?;
//! let mut anim = GifAnimation::from_bytes(&bytes, PlaybackConfig::default());
//! assert!(anim.valid());
//!
//! // Host-driven playback: wait, tick, blit
//! while anim.playing() {
//!     std::thread::sleep(anim.next_wake_after().unwrap());
//!     anim.on_tick();
//!     let image = anim.current_image().unwrap();
//!     // blit `image.pixels` (RGBA, canvas-sized) to the screen
//! }
//! ```

mod animation;
mod compose;
mod data;
mod loader;
mod lzw;
pub mod parser;

pub use animation::{AnimationController, PlaybackState};
pub use compose::Compositor;
pub use data::{
    ColorTable, ComposedFrame, DisposalMethod, GraphicControl, RawFrame, ScreenDescriptor,
};
pub use loader::{GifAnimation, PlaybackConfig};
pub use lzw::LzwError;
pub use parser::{BlockDecoder, BlockEvent, DecodeError, ExtensionKind, ImageBlock};
