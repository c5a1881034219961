//! Self-contained DEFLATE decoder (RFC 1951) with zlib (RFC 1950) and
//! gzip (RFC 1952) framing.
//!
//! Output is byte-identical to `flate2` for well-formed input; every
//! malformed or truncated stream is reported as an error instead of
//! producing partial output.

const MAX_BITS: usize = 15;
const MAX_LIT_CODES: usize = 286;
const MAX_DIST_CODES: usize = 30;
const FIXED_LIT_CODES: usize = 288;

const LENGTH_BASE: [u16; 29] = [
    3, 4, 5, 6, 7, 8, 9, 10, 11, 13, 15, 17, 19, 23, 27, 31, 35, 43, 51, 59, 67, 83, 99, 115,
    131, 163, 195, 227, 258,
];
const LENGTH_EXTRA: [u8; 29] = [
    0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 0,
];
const DIST_BASE: [u16; 30] = [
    1, 2, 3, 4, 5, 7, 9, 13, 17, 25, 33, 49, 65, 97, 129, 193, 257, 385, 513, 769, 1025, 1537,
    2049, 3073, 4097, 6145, 8193, 12289, 16385, 24577,
];
const DIST_EXTRA: [u8; 30] = [
    0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 10, 10, 11, 11, 12, 12,
    13, 13,
];
const CODE_LENGTH_ORDER: [usize; 19] = [
    16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
];

const GZIP_FHCRC: u8 = 0x02;
const GZIP_FEXTRA: u8 = 0x04;
const GZIP_FNAME: u8 = 0x08;
const GZIP_FCOMMENT: u8 = 0x10;

pub type InflateResult<T> = std::result::Result<T, &'static str>;

struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
    bit_buf: u64,
    bit_count: u32,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            bit_buf: 0,
            bit_count: 0,
        }
    }

    fn bits(&mut self, need: u32) -> InflateResult<u32> {
        while self.bit_count < need {
            let byte = *self.data.get(self.pos).ok_or("stream ended early")?;
            self.pos += 1;
            self.bit_buf |= (byte as u64) << self.bit_count;
            self.bit_count += 8;
        }
        let value = (self.bit_buf & ((1u64 << need) - 1)) as u32;
        self.bit_buf >>= need;
        self.bit_count -= need;
        Ok(value)
    }

    /// Bytes are only pulled in when needed, so fewer than 8 bits are ever
    /// buffered here and dropping them lands on the next byte boundary.
    fn align_to_byte(&mut self) {
        self.bit_buf = 0;
        self.bit_count = 0;
    }

    fn take_bytes(&mut self, len: usize) -> InflateResult<&'a [u8]> {
        let end = self.pos.checked_add(len).ok_or("length overflow")?;
        let slice = self.data.get(self.pos..end).ok_or("stream ended early")?;
        self.pos = end;
        Ok(slice)
    }
}

/// Canonical Huffman table in count/symbol form.
struct Huffman {
    counts: [u16; MAX_BITS + 1],
    symbols: Vec<u16>,
}

impl Huffman {
    fn new(lengths: &[u8]) -> InflateResult<Self> {
        let mut counts = [0u16; MAX_BITS + 1];
        for &len in lengths {
            counts[len as usize] += 1;
        }

        let mut left: i32 = 1;
        for len in 1..=MAX_BITS {
            left <<= 1;
            left -= counts[len] as i32;
            if left < 0 {
                return Err("over-subscribed code lengths");
            }
        }

        let mut offsets = [0u16; MAX_BITS + 2];
        for len in 1..=MAX_BITS {
            offsets[len + 1] = offsets[len] + counts[len];
        }

        let mut symbols = vec![0u16; lengths.len()];
        for (symbol, &len) in lengths.iter().enumerate() {
            if len != 0 {
                symbols[offsets[len as usize] as usize] = symbol as u16;
                offsets[len as usize] += 1;
            }
        }

        Ok(Self { counts, symbols })
    }

    fn decode(&self, reader: &mut BitReader<'_>) -> InflateResult<u16> {
        let mut code: i32 = 0;
        let mut first: i32 = 0;
        let mut index: i32 = 0;
        for len in 1..=MAX_BITS {
            code |= reader.bits(1)? as i32;
            let count = self.counts[len] as i32;
            if code - count < first {
                return Ok(self.symbols[(index + (code - first)) as usize]);
            }
            index += count;
            first += count;
            first <<= 1;
            code <<= 1;
        }
        Err("invalid Huffman code")
    }
}

fn fixed_tables() -> InflateResult<(Huffman, Huffman)> {
    let mut lengths = [0u8; FIXED_LIT_CODES];
    lengths[..144].fill(8);
    lengths[144..256].fill(9);
    lengths[256..280].fill(7);
    lengths[280..].fill(8);
    let lit = Huffman::new(&lengths)?;
    let dist = Huffman::new(&[5u8; MAX_DIST_CODES])?;
    Ok((lit, dist))
}

fn dynamic_tables(reader: &mut BitReader<'_>) -> InflateResult<(Huffman, Huffman)> {
    let lit_count = reader.bits(5)? as usize + 257;
    let dist_count = reader.bits(5)? as usize + 1;
    let code_count = reader.bits(4)? as usize + 4;
    if lit_count > MAX_LIT_CODES || dist_count > MAX_DIST_CODES {
        return Err("bad code counts");
    }

    let mut code_lengths = [0u8; 19];
    for &slot in CODE_LENGTH_ORDER.iter().take(code_count) {
        code_lengths[slot] = reader.bits(3)? as u8;
    }
    let code_table = Huffman::new(&code_lengths)?;

    let total = lit_count + dist_count;
    let mut lengths = vec![0u8; total];
    let mut index = 0;
    while index < total {
        let symbol = code_table.decode(reader)?;
        if symbol < 16 {
            lengths[index] = symbol as u8;
            index += 1;
            continue;
        }
        let (value, repeat) = match symbol {
            16 => {
                if index == 0 {
                    return Err("repeat with no previous length");
                }
                (lengths[index - 1], 3 + reader.bits(2)? as usize)
            }
            17 => (0, 3 + reader.bits(3)? as usize),
            _ => (0, 11 + reader.bits(7)? as usize),
        };
        if index + repeat > total {
            return Err("too many code lengths");
        }
        lengths[index..index + repeat].fill(value);
        index += repeat;
    }

    if lengths[256] == 0 {
        return Err("missing end-of-block code");
    }

    let lit = Huffman::new(&lengths[..lit_count])?;
    let dist = Huffman::new(&lengths[lit_count..])?;
    Ok((lit, dist))
}

fn inflate_codes(
    reader: &mut BitReader<'_>,
    out: &mut Vec<u8>,
    lit: &Huffman,
    dist: &Huffman,
) -> InflateResult<()> {
    loop {
        let symbol = lit.decode(reader)? as usize;
        if symbol < 256 {
            out.push(symbol as u8);
            continue;
        }
        if symbol == 256 {
            return Ok(());
        }

        let symbol = symbol - 257;
        if symbol >= LENGTH_BASE.len() {
            return Err("invalid length symbol");
        }
        let length =
            LENGTH_BASE[symbol] as usize + reader.bits(LENGTH_EXTRA[symbol] as u32)? as usize;

        let dist_symbol = dist.decode(reader)? as usize;
        if dist_symbol >= DIST_BASE.len() {
            return Err("invalid distance symbol");
        }
        let distance = DIST_BASE[dist_symbol] as usize
            + reader.bits(DIST_EXTRA[dist_symbol] as u32)? as usize;
        if distance > out.len() {
            return Err("distance too far back");
        }

        let start = out.len() - distance;
        for i in 0..length {
            let byte = out[start + i];
            out.push(byte);
        }
    }
}

/// Inflates a raw DEFLATE stream, returning the output and the number of
/// input bytes consumed (up to the end of the final block).
pub fn inflate_raw(data: &[u8]) -> InflateResult<(Vec<u8>, usize)> {
    let mut reader = BitReader::new(data);
    let mut out = Vec::with_capacity(data.len() * 4);

    loop {
        let last = reader.bits(1)? == 1;
        match reader.bits(2)? {
            0 => {
                reader.align_to_byte();
                let header = reader.take_bytes(4)?;
                let len = u16::from_le_bytes([header[0], header[1]]);
                let nlen = u16::from_le_bytes([header[2], header[3]]);
                if len != !nlen {
                    return Err("stored block length mismatch");
                }
                out.extend_from_slice(reader.take_bytes(len as usize)?);
            }
            1 => {
                let (lit, dist) = fixed_tables()?;
                inflate_codes(&mut reader, &mut out, &lit, &dist)?;
            }
            2 => {
                let (lit, dist) = dynamic_tables(&mut reader)?;
                inflate_codes(&mut reader, &mut out, &lit, &dist)?;
            }
            _ => return Err("invalid block type"),
        }
        if last {
            break;
        }
    }

    reader.align_to_byte();
    Ok((out, reader.pos))
}

fn adler32(data: &[u8]) -> u32 {
    const MOD_ADLER: u32 = 65521;
    let mut a: u32 = 1;
    let mut b: u32 = 0;
    for chunk in data.chunks(5552) {
        for &byte in chunk {
            a += byte as u32;
            b += a;
        }
        a %= MOD_ADLER;
        b %= MOD_ADLER;
    }
    (b << 16) | a
}

pub fn zlib_decode(data: &[u8]) -> InflateResult<Vec<u8>> {
    if data.len() < 2 {
        return Err("zlib header truncated");
    }
    let cmf = data[0];
    let flg = data[1];
    if cmf & 0x0f != 8 || cmf >> 4 > 7 {
        return Err("unsupported zlib compression method");
    }
    if ((cmf as u16) << 8 | flg as u16) % 31 != 0 {
        return Err("zlib header checksum mismatch");
    }
    if flg & 0x20 != 0 {
        return Err("zlib preset dictionary not supported");
    }

    let (out, consumed) = inflate_raw(&data[2..])?;
    let trailer = data
        .get(2 + consumed..2 + consumed + 4)
        .ok_or("zlib trailer truncated")?;
    let expected = u32::from_be_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    if adler32(&out) != expected {
        return Err("adler32 mismatch");
    }
    Ok(out)
}

pub fn gzip_decode(data: &[u8]) -> InflateResult<Vec<u8>> {
    if data.len() < 10 || data[0] != 0x1f || data[1] != 0x8b {
        return Err("not a gzip stream");
    }
    if data[2] != 8 {
        return Err("unsupported gzip compression method");
    }
    let flags = data[3];
    let mut pos = 10;

    if flags & GZIP_FEXTRA != 0 {
        let xlen = data.get(pos..pos + 2).ok_or("gzip header truncated")?;
        pos += 2 + u16::from_le_bytes([xlen[0], xlen[1]]) as usize;
    }
    for flag in [GZIP_FNAME, GZIP_FCOMMENT] {
        if flags & flag != 0 {
            let rest = data.get(pos..).ok_or("gzip header truncated")?;
            let end = rest
                .iter()
                .position(|&b| b == 0)
                .ok_or("gzip header truncated")?;
            pos += end + 1;
        }
    }
    if flags & GZIP_FHCRC != 0 {
        pos += 2;
    }
    let body = data.get(pos..).ok_or("gzip header truncated")?;

    let (out, consumed) = inflate_raw(body)?;
    let trailer = body
        .get(consumed..consumed + 8)
        .ok_or("gzip trailer truncated")?;
    let crc = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    let size = u32::from_le_bytes([trailer[4], trailer[5], trailer[6], trailer[7]]);
    if crc32fast::hash(&out) != crc {
        return Err("crc32 mismatch");
    }
    if out.len() as u32 != size {
        return Err("gzip size mismatch");
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adler32_known_value() {
        assert_eq!(adler32(b"Wikipedia"), 0x11E6_0398);
        assert_eq!(adler32(b""), 1);
    }

    #[test]
    fn stored_block_decodes() {
        // final stored block holding "abc"
        let raw = [0x01, 0x03, 0x00, 0xfc, 0xff, b'a', b'b', b'c'];
        let (out, consumed) = inflate_raw(&raw).unwrap();
        assert_eq!(out, b"abc");
        assert_eq!(consumed, raw.len());
    }

    #[test]
    fn stored_length_mismatch_is_rejected() {
        let raw = [0x01, 0x03, 0x00, 0x00, 0x00, b'a', b'b', b'c'];
        assert!(inflate_raw(&raw).is_err());
    }

    #[test]
    fn truncated_stream_is_rejected() {
        assert_eq!(inflate_raw(&[0x01, 0x03]).unwrap_err(), "stream ended early");
    }

    #[test]
    fn reserved_block_type_is_rejected() {
        assert_eq!(inflate_raw(&[0x07]).unwrap_err(), "invalid block type");
    }

    #[test]
    fn bad_zlib_header_is_rejected() {
        assert!(zlib_decode(&[0x78, 0x00, 0x01]).is_err());
        assert!(zlib_decode(&[0x78]).is_err());
    }
}
