//! Variable-code-width LZW decompression for GIF raster data.

/// Error type for LZW decompression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LzwError {
    /// The stream produced a code beyond the current table capacity
    CodeOutOfRange { code: u16, table_len: usize },
}

impl std::fmt::Display for LzwError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LzwError::CodeOutOfRange { code, table_len } => {
                write!(
                    f,
                    "LZW code {} out of range for table of {} entries",
                    code, table_len
                )
            }
        }
    }
}

impl std::error::Error for LzwError {}

/// Codes never grow beyond 12 bits.
const MAX_CODE_SIZE: u8 = 12;
const MAX_TABLE_LEN: usize = 1 << MAX_CODE_SIZE;

/// Reads little-endian bit-packed codes from a byte stream.
struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
    acc: u32,
    acc_bits: u8,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            acc: 0,
            acc_bits: 0,
        }
    }

    /// Read the next `n` bits (LSB first), or None if the stream ran out.
    fn read_bits(&mut self, n: u8) -> Option<u16> {
        while self.acc_bits < n {
            if self.pos >= self.data.len() {
                return None;
            }
            self.acc |= (self.data[self.pos] as u32) << self.acc_bits;
            self.pos += 1;
            self.acc_bits += 8;
        }
        let value = (self.acc & ((1u32 << n) - 1)) as u16;
        self.acc >>= n;
        self.acc_bits -= n;
        Some(value)
    }
}

fn base_table(clear_code: u16) -> Vec<Vec<u8>> {
    let mut table: Vec<Vec<u8>> = (0..clear_code).map(|i| vec![i as u8]).collect();
    // Placeholders so table indices line up with code values
    table.push(Vec::new()); // clear code
    table.push(Vec::new()); // end-of-information code
    table
}

/// Decompress an LZW-coded pixel-index stream.
///
/// `data` is the concatenated payload of the image's data sub-blocks and
/// `min_code_size` the byte that precedes them in the file. At most
/// `pixel_limit` indices are produced.
///
/// The code table starts at `min_code_size + 1` bits, resets on the clear
/// code, and grows up to 12 bits. A truncated stream is not an error: all
/// indices that could be fully decoded are returned and the caller decides
/// what an incomplete raster means. Only a code beyond the table capacity
/// fails, as no pixels can be derived from it.
pub fn decompress(data: &[u8], min_code_size: u8, pixel_limit: usize) -> Result<Vec<u8>, LzwError> {
    let min_code_size = min_code_size.clamp(2, 8);
    let clear_code: u16 = 1 << min_code_size;
    let end_code: u16 = clear_code + 1;

    let mut table = base_table(clear_code);
    let mut code_size = min_code_size + 1;
    let mut prev: Option<u16> = None;
    let mut out: Vec<u8> = Vec::with_capacity(pixel_limit);
    let mut reader = BitReader::new(data);

    while out.len() < pixel_limit {
        let code = match reader.read_bits(code_size) {
            Some(code) => code,
            // Truncated stream: keep the pixels decoded so far
            None => break,
        };

        if code == clear_code {
            table.truncate(end_code as usize + 1);
            code_size = min_code_size + 1;
            prev = None;
            continue;
        }
        if code == end_code {
            break;
        }

        let code_us = code as usize;
        match prev {
            None => {
                // The first code after a reset must be a literal
                if code >= clear_code {
                    return Err(LzwError::CodeOutOfRange {
                        code,
                        table_len: table.len(),
                    });
                }
                out.push(code as u8);
                prev = Some(code);
            }
            Some(p) => {
                let entry = if code_us < table.len() {
                    table[code_us].clone()
                } else if code_us == table.len() {
                    // Code not yet in the table: previous entry plus its
                    // own first byte
                    let mut e = table[p as usize].clone();
                    e.push(table[p as usize][0]);
                    e
                } else {
                    return Err(LzwError::CodeOutOfRange {
                        code,
                        table_len: table.len(),
                    });
                };

                out.extend_from_slice(&entry);

                if table.len() < MAX_TABLE_LEN {
                    let mut new_entry = table[p as usize].clone();
                    new_entry.push(entry[0]);
                    table.push(new_entry);
                    if table.len() == (1usize << code_size) && code_size < MAX_CODE_SIZE {
                        code_size += 1;
                    }
                }
                prev = Some(code);
            }
        }
    }

    // The last entry may have run past the raster size
    out.truncate(pixel_limit);
    Ok(out)
}
