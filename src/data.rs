//! Core data structures for decoded GIF frames.

/// How a frame's region of the canvas is treated before the next frame
/// is drawn.
///
/// Disposal is an instruction about what happens *after* a frame was
/// displayed, not before it: the compositor resolves frame `i`'s disposal
/// when it is about to overlay frame `i + 1`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DisposalMethod {
    /// No disposal specified; the canvas is left as-is
    #[default]
    None,
    /// Keep the frame's pixels on the canvas (same compositing effect as `None`)
    DoNotDispose,
    /// Clear the frame's rectangle to the background before the next frame
    RestoreBackground,
    /// Revert the canvas to its state before this frame was applied
    RestorePrevious,
}

impl DisposalMethod {
    /// Decode the 3-bit disposal field of a graphic control extension.
    ///
    /// Values outside the four defined methods are treated as unspecified.
    pub fn from_bits(bits: u8) -> Self {
        match bits {
            1 => DisposalMethod::DoNotDispose,
            2 => DisposalMethod::RestoreBackground,
            3 => DisposalMethod::RestorePrevious,
            _ => DisposalMethod::None,
        }
    }
}

/// A color palette of up to 256 RGB entries.
///
/// Stored as a flat `[r0, g0, b0, r1, g1, b1, ...]` byte array, the way the
/// table appears in the file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ColorTable {
    rgb: Vec<u8>,
}

impl ColorTable {
    /// Build a table from raw RGB triples. The length must be a multiple of 3.
    pub fn from_rgb(rgb: Vec<u8>) -> Self {
        debug_assert!(rgb.len() % 3 == 0);
        Self { rgb }
    }

    /// Number of color entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.rgb.len() / 3
    }

    /// Whether the table has no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rgb.is_empty()
    }

    /// Get the RGB color at the given palette index.
    ///
    /// Returns None if the index is outside the table.
    #[inline]
    pub fn rgb_at(&self, index: u8) -> Option<(u8, u8, u8)> {
        let i = index as usize * 3;
        if i + 2 < self.rgb.len() {
            Some((self.rgb[i], self.rgb[i + 1], self.rgb[i + 2]))
        } else {
            None
        }
    }
}

/// Logical screen descriptor from the file header.
///
/// Fixed for the lifetime of a loaded animation; every composed frame is
/// exactly `width` x `height` pixels.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScreenDescriptor {
    /// Canvas width in pixels
    pub width: u16,
    /// Canvas height in pixels
    pub height: u16,
    /// Background color index into the global color table
    pub background_index: u8,
    /// Global color table, if the header declares one
    pub global_table: Option<ColorTable>,
}

impl ScreenDescriptor {
    /// Total number of canvas pixels.
    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Parsed graphic control extension.
///
/// Applies to the image block that follows it in the stream.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GraphicControl {
    /// Disposal method for the upcoming frame
    pub disposal: DisposalMethod,
    /// Frame delay in seconds (the file stores hundredths of a second)
    pub delay: f64,
    /// Palette index treated as fully transparent, if any
    pub transparent_index: Option<u8>,
}

/// One decoded frame as it appears in the file: a palette-indexed
/// sub-rectangle of the canvas plus its timing and disposal metadata.
///
/// Immutable once decoded; owned by the frame store.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RawFrame {
    /// Left edge of the frame rectangle on the canvas
    pub x: u16,
    /// Top edge of the frame rectangle on the canvas
    pub y: u16,
    /// Frame rectangle width (may be smaller than the canvas)
    pub width: u16,
    /// Frame rectangle height (may be smaller than the canvas)
    pub height: u16,
    /// Display delay in seconds
    pub delay: f64,
    /// What to do with this frame's rectangle before the next frame
    pub disposal: DisposalMethod,
    /// Palette index treated as "no pixel", if any
    pub transparent_index: Option<u8>,
    /// Whether the raster was stored interlaced (already reordered on decode)
    pub interlaced: bool,
    /// Palette indices, row-major, `width * height` entries
    pub indices: Vec<u8>,
    /// Local color table, or a copy of the global one
    pub color_table: ColorTable,
}

impl RawFrame {
    /// Number of pixels in the frame rectangle.
    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Get the palette index at the given position within the frame rectangle.
    ///
    /// Returns None if the position is out of bounds.
    #[inline]
    pub fn index_at(&self, row: usize, col: usize) -> Option<u8> {
        if row < self.height as usize && col < self.width as usize {
            Some(self.indices[row * self.width as usize + col])
        } else {
            None
        }
    }
}

/// A full-canvas RGBA pixel buffer ready for display.
///
/// Always exactly canvas-sized, regardless of how the frames were stored.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ComposedFrame {
    /// Canvas width in pixels
    pub width: u16,
    /// Canvas height in pixels
    pub height: u16,
    /// RGBA pixel data, `width * height * 4` bytes
    pub pixels: Vec<u8>,
}

impl ComposedFrame {
    /// Create a fully transparent frame of the given size.
    pub fn blank(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
        }
    }

    /// Get the RGBA value at the given position.
    ///
    /// Returns None if the position is out of bounds.
    #[inline]
    pub fn rgba_at(&self, row: usize, col: usize) -> Option<[u8; 4]> {
        if row < self.height as usize && col < self.width as usize {
            let i = (row * self.width as usize + col) * 4;
            Some([
                self.pixels[i],
                self.pixels[i + 1],
                self.pixels[i + 2],
                self.pixels[i + 3],
            ])
        } else {
            None
        }
    }
}
