//! Block-level parsing of the GIF container format.
//!
//! [`BlockDecoder`] walks an in-memory byte buffer and yields typed block
//! events in file order: the header, graphic control extensions, decompressed
//! image rasters, opaque extensions, and the trailer. It is a pull-based
//! iterator; the caller decides how much of the stream to consume and what a
//! per-block error means for the overall load.
//!
//! ## Format
//!
//! A GIF file is (all integers little-endian):
//! - 6-byte signature: `GIF87a` or `GIF89a`
//! - 7-byte logical screen descriptor, optionally followed by a global
//!   color table of `2^(k+1)` RGB triples
//! - a sequence of blocks, each introduced by `0x21` (extension),
//!   `0x2C` (image descriptor) or `0x3B` (trailer)
//! - image raster data is LZW-compressed and chunked into sub-blocks of
//!   up to 255 bytes, terminated by a zero-length sub-block

use crate::data::{ColorTable, DisposalMethod, GraphicControl, ScreenDescriptor};
use crate::lzw;

const BLOCK_EXTENSION: u8 = 0x21;
const BLOCK_IMAGE: u8 = 0x2C;
const BLOCK_TRAILER: u8 = 0x3B;

const EXT_PLAIN_TEXT: u8 = 0x01;
const EXT_GRAPHIC_CONTROL: u8 = 0xF9;
const EXT_COMMENT: u8 = 0xFE;
const EXT_APPLICATION: u8 = 0xFF;

/// Error type for decoding operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Bad signature or unusable screen descriptor; nothing can be decoded
    MalformedHeader { detail: &'static str },
    /// The buffer ended in the middle of a block
    TruncatedStream,
    /// A block the decoder cannot handle; the current block is lost but
    /// later blocks may still decode
    UnsupportedFeature { detail: String },
    /// Decoding finished without a single usable frame
    EmptyAnimation,
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::MalformedHeader { detail } => {
                write!(f, "Malformed header: {}", detail)
            }
            DecodeError::TruncatedStream => write!(f, "Stream ended in the middle of a block"),
            DecodeError::UnsupportedFeature { detail } => {
                write!(f, "Unsupported feature: {}", detail)
            }
            DecodeError::EmptyAnimation => write!(f, "No usable frames decoded"),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Extension label classification. Payloads are opaque to playback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExtensionKind {
    /// Application extension (NETSCAPE2.0 looping lives here)
    Application,
    /// Comment extension
    Comment,
    /// Plain text extension
    PlainText,
    /// Any other label
    Unknown(u8),
}

/// A decoded image block: the sub-rectangle descriptor plus its
/// decompressed, de-interlaced palette indices.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageBlock {
    /// Left edge on the canvas
    pub x: u16,
    /// Top edge on the canvas
    pub y: u16,
    /// Rectangle width
    pub width: u16,
    /// Rectangle height
    pub height: u16,
    /// Whether the raster was stored interlaced
    pub interlaced: bool,
    /// Local color table, if the descriptor declares one
    pub local_table: Option<ColorTable>,
    /// Palette indices in top-to-bottom row order; may be shorter than
    /// `width * height` if the stream was cut off
    pub indices: Vec<u8>,
}

impl ImageBlock {
    /// Whether every pixel of the rectangle was decoded.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.indices.len() == self.width as usize * self.height as usize
    }
}

/// One typed event from the block stream.
#[derive(Clone, Debug, PartialEq)]
pub enum BlockEvent {
    /// Logical screen descriptor; always the first event
    Header(ScreenDescriptor),
    /// Graphic control extension; applies to the next image block
    GraphicControl(GraphicControl),
    /// An image descriptor with its decompressed raster
    Image(ImageBlock),
    /// Application, comment or plain text extension with its raw payload
    Extension { kind: ExtensionKind, payload: Vec<u8> },
    /// End-of-file marker
    Trailer,
}

/// Read-only cursor over the in-memory byte buffer.
struct ByteSource<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteSource<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        let b = *self.data.get(self.pos).ok_or(DecodeError::TruncatedStream)?;
        self.pos += 1;
        Ok(b)
    }

    fn read_u16_le(&mut self) -> Result<u16, DecodeError> {
        let lo = self.read_u8()?;
        let hi = self.read_u8()?;
        Ok(u16::from_le_bytes([lo, hi]))
    }

    fn read_slice(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        if self.pos + len > self.data.len() {
            return Err(DecodeError::TruncatedStream);
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Concatenate data sub-blocks until the zero terminator.
    fn read_sub_blocks(&mut self) -> Result<Vec<u8>, DecodeError> {
        let mut out = Vec::new();
        loop {
            let len = self.read_u8()? as usize;
            if len == 0 {
                return Ok(out);
            }
            out.extend_from_slice(self.read_slice(len)?);
        }
    }

    /// Like `read_sub_blocks`, but a cut-off stream yields the bytes read
    /// so far instead of an error. Returns the data and whether the
    /// terminator was reached.
    fn read_sub_blocks_tolerant(&mut self) -> (Vec<u8>, bool) {
        let mut out = Vec::new();
        loop {
            let len = match self.read_u8() {
                Ok(0) => return (out, true),
                Ok(len) => len as usize,
                Err(_) => return (out, false),
            };
            let available = (self.data.len() - self.pos).min(len);
            out.extend_from_slice(&self.data[self.pos..self.pos + available]);
            self.pos += available;
            if available < len {
                return (out, false);
            }
        }
    }
}

/// Reorder an interlaced raster into normal top-to-bottom row order.
///
/// Interlaced GIFs store rows in four passes: every 8th row from 0, every
/// 8th from 4, every 4th from 2, then every 2nd from 1.
fn deinterlace(indices: &[u8], width: usize, height: usize) -> Vec<u8> {
    let mut out = vec![0u8; indices.len()];
    let mut src_row = 0;
    for (offset, step) in [(0, 8), (4, 8), (2, 4), (1, 2)] {
        let mut row = offset;
        while row < height {
            let src = src_row * width;
            let dst = row * width;
            if src < indices.len() && dst < out.len() {
                let len = width.min(indices.len() - src).min(out.len() - dst);
                out[dst..dst + len].copy_from_slice(&indices[src..src + len]);
            }
            src_row += 1;
            row += step;
        }
    }
    out
}

fn read_color_table(src: &mut ByteSource<'_>, size_bits: u8) -> Result<ColorTable, DecodeError> {
    let entries = 1usize << (size_bits + 1);
    let rgb = src.read_slice(entries * 3)?;
    Ok(ColorTable::from_rgb(rgb.to_vec()))
}

/// Pull-based decoder over the block structure of a GIF byte buffer.
///
/// Yields `Result<BlockEvent, DecodeError>` items in file order. An
/// `UnsupportedFeature` error loses only the offending block; iteration can
/// continue afterwards. Header or truncation errors end the stream.
///
/// ## Example
///
/// ```rust,ignore
/// use gif_core_view::parser::{BlockDecoder, BlockEvent};
///
/// for event in BlockDecoder::new(&bytes) {
///     match event {
///         Ok(BlockEvent::Image(image)) => { /* store the frame */ }
///         Ok(_) => {}
///         Err(e) => { /* degrade, don't abort */ }
///     }
/// }
/// ```
pub struct BlockDecoder<'a> {
    src: ByteSource<'a>,
    header_done: bool,
    done: bool,
}

impl<'a> BlockDecoder<'a> {
    /// Create a decoder over raw file bytes.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            src: ByteSource::new(data),
            header_done: false,
            done: false,
        }
    }

    fn read_header(&mut self) -> Result<ScreenDescriptor, DecodeError> {
        let signature = self.src.read_slice(6).map_err(|_| DecodeError::MalformedHeader {
            detail: "buffer shorter than the signature",
        })?;
        if signature != b"GIF87a" && signature != b"GIF89a" {
            return Err(DecodeError::MalformedHeader {
                detail: "missing GIF87a/GIF89a signature",
            });
        }

        let width = self.src.read_u16_le()?;
        let height = self.src.read_u16_le()?;
        let flags = self.src.read_u8()?;
        let background_index = self.src.read_u8()?;
        let _aspect_ratio = self.src.read_u8()?;

        if width == 0 || height == 0 {
            return Err(DecodeError::MalformedHeader {
                detail: "zero canvas dimension",
            });
        }

        let global_table = if flags & 0x80 != 0 {
            Some(read_color_table(&mut self.src, flags & 0x07)?)
        } else {
            None
        };

        Ok(ScreenDescriptor {
            width,
            height,
            background_index,
            global_table,
        })
    }

    fn read_graphic_control(&mut self) -> Result<GraphicControl, DecodeError> {
        // The one defined sub-block is 4 bytes; be lenient about size and
        // skip whatever follows up to the terminator.
        let block = self.src.read_sub_blocks()?;
        let mut control = GraphicControl::default();
        if block.len() >= 4 {
            let fields = block[0];
            control.disposal = DisposalMethod::from_bits((fields & 0x1C) >> 2);
            control.delay = u16::from_le_bytes([block[1], block[2]]) as f64 / 100.0;
            control.transparent_index = if fields & 0x01 != 0 { Some(block[3]) } else { None };
        }
        Ok(control)
    }

    fn read_extension(&mut self) -> Result<BlockEvent, DecodeError> {
        let label = self.src.read_u8()?;
        if label == EXT_GRAPHIC_CONTROL {
            return Ok(BlockEvent::GraphicControl(self.read_graphic_control()?));
        }
        let kind = match label {
            EXT_APPLICATION => ExtensionKind::Application,
            EXT_COMMENT => ExtensionKind::Comment,
            EXT_PLAIN_TEXT => ExtensionKind::PlainText,
            other => ExtensionKind::Unknown(other),
        };
        let payload = self.src.read_sub_blocks()?;
        Ok(BlockEvent::Extension { kind, payload })
    }

    fn read_image(&mut self) -> Result<BlockEvent, DecodeError> {
        let x = self.src.read_u16_le()?;
        let y = self.src.read_u16_le()?;
        let width = self.src.read_u16_le()?;
        let height = self.src.read_u16_le()?;
        let flags = self.src.read_u8()?;

        let interlaced = flags & 0x40 != 0;
        let local_table = if flags & 0x80 != 0 {
            Some(read_color_table(&mut self.src, flags & 0x07)?)
        } else {
            None
        };

        let min_code_size = self.src.read_u8()?;
        let (data, complete) = self.src.read_sub_blocks_tolerant();
        if !complete {
            self.done = true;
        }

        if width == 0 || height == 0 {
            return Err(DecodeError::UnsupportedFeature {
                detail: "zero frame dimension".to_string(),
            });
        }
        if min_code_size > 8 {
            return Err(DecodeError::UnsupportedFeature {
                detail: format!("LZW minimum code size {}", min_code_size),
            });
        }

        let pixel_count = width as usize * height as usize;
        let mut indices = lzw::decompress(&data, min_code_size, pixel_count)
            .map_err(|e| DecodeError::UnsupportedFeature { detail: e.to_string() })?;
        if interlaced {
            indices = deinterlace(&indices, width as usize, height as usize);
        }

        Ok(BlockEvent::Image(ImageBlock {
            x,
            y,
            width,
            height,
            interlaced,
            local_table,
            indices,
        }))
    }
}

impl Iterator for BlockDecoder<'_> {
    type Item = Result<BlockEvent, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if !self.header_done {
            self.header_done = true;
            return match self.read_header() {
                Ok(screen) => Some(Ok(BlockEvent::Header(screen))),
                Err(e) => {
                    self.done = true;
                    Some(Err(e))
                }
            };
        }

        // A buffer that just stops between blocks is treated like a
        // missing trailer rather than an error.
        if self.src.is_at_end() {
            self.done = true;
            return Some(Ok(BlockEvent::Trailer));
        }

        let introducer = match self.src.read_u8() {
            Ok(b) => b,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };

        let event = match introducer {
            BLOCK_TRAILER => {
                self.done = true;
                Ok(BlockEvent::Trailer)
            }
            BLOCK_EXTENSION => self.read_extension(),
            BLOCK_IMAGE => self.read_image(),
            other => {
                // No way to resync after an unknown introducer
                self.done = true;
                Err(DecodeError::UnsupportedFeature {
                    detail: format!("unknown block introducer 0x{:02X}", other),
                })
            }
        };

        if matches!(event, Err(DecodeError::TruncatedStream)) {
            self.done = true;
        }
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lzw::test_stream;

    fn header(width: u16, height: u16, gct: Option<&[u8]>) -> Vec<u8> {
        let mut bytes = b"GIF89a".to_vec();
        bytes.extend_from_slice(&width.to_le_bytes());
        bytes.extend_from_slice(&height.to_le_bytes());
        match gct {
            Some(rgb) => {
                // Tests use 2-bit tables (4 entries)
                assert_eq!(rgb.len(), 12);
                bytes.push(0x80 | 0x01);
                bytes.push(0); // background index
                bytes.push(0); // aspect ratio
                bytes.extend_from_slice(rgb);
            }
            None => {
                bytes.push(0);
                bytes.push(0);
                bytes.push(0);
            }
        }
        bytes
    }

    const GCT: [u8; 12] = [255, 255, 255, 255, 0, 0, 0, 0, 255, 0, 0, 0];

    fn image_block(x: u16, y: u16, w: u16, h: u16, indices: &[u8]) -> Vec<u8> {
        let mut bytes = vec![0x2C];
        bytes.extend_from_slice(&x.to_le_bytes());
        bytes.extend_from_slice(&y.to_le_bytes());
        bytes.extend_from_slice(&w.to_le_bytes());
        bytes.extend_from_slice(&h.to_le_bytes());
        bytes.push(0); // no local table, not interlaced
        bytes.push(2); // min code size
        bytes.extend_from_slice(&test_stream::to_sub_blocks(&test_stream::encode(indices, 2)));
        bytes
    }

    #[test]
    fn test_bad_signature() {
        let mut decoder = BlockDecoder::new(b"NOTAGIF");
        let first = decoder.next().unwrap();
        assert!(matches!(first, Err(DecodeError::MalformedHeader { .. })));
        assert!(decoder.next().is_none());
    }

    #[test]
    fn test_header_and_trailer_only() {
        let mut bytes = header(4, 4, Some(&GCT));
        bytes.push(0x3B);

        let events: Vec<_> = BlockDecoder::new(&bytes).collect();
        assert_eq!(events.len(), 2);
        match &events[0] {
            Ok(BlockEvent::Header(screen)) => {
                assert_eq!(screen.width, 4);
                assert_eq!(screen.height, 4);
                assert_eq!(screen.global_table.as_ref().unwrap().len(), 4);
            }
            other => panic!("expected header, got {:?}", other),
        }
        assert_eq!(events[1], Ok(BlockEvent::Trailer));
    }

    #[test]
    fn test_zero_canvas_dimension() {
        let mut bytes = header(0, 4, None);
        bytes.push(0x3B);
        let first = BlockDecoder::new(&bytes).next().unwrap();
        assert!(matches!(first, Err(DecodeError::MalformedHeader { .. })));
    }

    #[test]
    fn test_graphic_control_extension() {
        let mut bytes = header(4, 4, Some(&GCT));
        // disposal 2 (restore background), transparency on, index 3, delay 25
        bytes.extend_from_slice(&[0x21, 0xF9, 0x04, 0b0000_1001, 25, 0, 3, 0x00]);
        bytes.push(0x3B);

        let events: Vec<_> = BlockDecoder::new(&bytes).collect();
        match &events[1] {
            Ok(BlockEvent::GraphicControl(control)) => {
                assert_eq!(control.disposal, DisposalMethod::RestoreBackground);
                assert!((control.delay - 0.25).abs() < 1e-9);
                assert_eq!(control.transparent_index, Some(3));
            }
            other => panic!("expected graphic control, got {:?}", other),
        }
    }

    #[test]
    fn test_image_block_round_trip() {
        let indices = [0, 1, 2, 3];
        let mut bytes = header(2, 2, Some(&GCT));
        bytes.extend_from_slice(&image_block(0, 0, 2, 2, &indices));
        bytes.push(0x3B);

        let events: Vec<_> = BlockDecoder::new(&bytes).collect();
        assert_eq!(events.len(), 3);
        match &events[1] {
            Ok(BlockEvent::Image(image)) => {
                assert_eq!((image.x, image.y), (0, 0));
                assert_eq!((image.width, image.height), (2, 2));
                assert!(image.is_complete());
                assert_eq!(image.indices, indices);
            }
            other => panic!("expected image, got {:?}", other),
        }
    }

    #[test]
    fn test_application_extension_payload() {
        let mut bytes = header(2, 2, Some(&GCT));
        bytes.extend_from_slice(&[0x21, 0xFF, 11]);
        bytes.extend_from_slice(b"NETSCAPE2.0");
        bytes.extend_from_slice(&[3, 1, 2, 0, 0x00]);
        bytes.push(0x3B);

        let events: Vec<_> = BlockDecoder::new(&bytes).collect();
        match &events[1] {
            Ok(BlockEvent::Extension { kind, payload }) => {
                assert_eq!(*kind, ExtensionKind::Application);
                assert_eq!(&payload[..11], b"NETSCAPE2.0");
                assert_eq!(&payload[11..], &[1, 2, 0]);
            }
            other => panic!("expected extension, got {:?}", other),
        }
    }

    #[test]
    fn test_truncated_raster_is_partial() {
        let indices = [0, 1, 2, 3];
        let mut bytes = header(2, 2, Some(&GCT));
        let image = image_block(0, 0, 2, 2, &indices);
        // Cut the raster data in half
        bytes.extend_from_slice(&image[..image.len() - 3]);

        let events: Vec<_> = BlockDecoder::new(&bytes).collect();
        assert_eq!(events.len(), 2);
        match &events[1] {
            Ok(BlockEvent::Image(image)) => {
                assert!(!image.is_complete());
                assert!(image.indices.len() < 4);
            }
            other => panic!("expected partial image, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_trailer_is_tolerated() {
        let indices = [0, 1, 2, 3];
        let mut bytes = header(2, 2, Some(&GCT));
        bytes.extend_from_slice(&image_block(0, 0, 2, 2, &indices));
        // No trailer byte at all

        let events: Vec<_> = BlockDecoder::new(&bytes).collect();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[1], Ok(BlockEvent::Image(_))));
        assert_eq!(events[2], Ok(BlockEvent::Trailer));
    }

    #[test]
    fn test_interlaced_image_reordered() {
        // 2x4: interlace passes store rows 0, 2, 1, 3 -> pass order 0, 2, 1, 3?
        // For height 4 the stored order is row 0 (pass 1), row 2 (pass 3),
        // rows 1 and 3 (pass 4).
        let stored = [0, 0, 2, 2, 1, 1, 3, 3];
        let mut bytes = header(2, 4, Some(&GCT));
        let mut block = vec![0x2C, 0, 0, 0, 0, 2, 0, 4, 0];
        block.push(0x40); // interlaced, no local table
        block.push(2);
        block.extend_from_slice(&test_stream::to_sub_blocks(&test_stream::encode(&stored, 2)));
        bytes.extend_from_slice(&block);
        bytes.push(0x3B);

        let events: Vec<_> = BlockDecoder::new(&bytes).collect();
        match &events[1] {
            Ok(BlockEvent::Image(image)) => {
                assert!(image.interlaced);
                assert_eq!(image.indices, vec![0, 0, 1, 1, 2, 2, 3, 3]);
            }
            other => panic!("expected image, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_introducer_stops_with_error() {
        let mut bytes = header(2, 2, Some(&GCT));
        bytes.push(0x42);

        let events: Vec<_> = BlockDecoder::new(&bytes).collect();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], Err(DecodeError::UnsupportedFeature { .. })));
    }
}
