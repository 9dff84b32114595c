//! Level 5 MAT-file reader.
//!
//! Handles numeric, logical, char, struct and cell arrays, compressed or
//! not. Sparse and object arrays decode to [`MatValue::Unsupported`].
//! HDF5-based (v7.3) files are rejected.

use std::io::Read;

use flate2::read::ZlibDecoder;
use hsi_core::{Error, Result};

const HEADER_LEN: usize = 128;

const MI_INT8: u32 = 1;
const MI_UINT8: u32 = 2;
const MI_INT16: u32 = 3;
const MI_UINT16: u32 = 4;
const MI_INT32: u32 = 5;
const MI_UINT32: u32 = 6;
const MI_SINGLE: u32 = 7;
const MI_DOUBLE: u32 = 9;
const MI_INT64: u32 = 12;
const MI_UINT64: u32 = 13;
const MI_MATRIX: u32 = 14;
const MI_COMPRESSED: u32 = 15;
const MI_UTF16: u32 = 17;

const MX_CELL: u8 = 1;
const MX_STRUCT: u8 = 2;
const MX_CHAR: u8 = 4;

/// Column-major numeric array.
#[derive(Debug, Clone, PartialEq)]
pub struct MatArray {
    pub dims: Vec<usize>,
    pub data: Vec<f64>,
}

/// Struct array: `elements[k][f]` is field `f` of element `k`.
#[derive(Debug, Clone, PartialEq)]
pub struct MatStruct {
    pub dims: Vec<usize>,
    pub fields: Vec<String>,
    pub elements: Vec<Vec<MatValue>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatValue {
    Numeric(MatArray),
    Text(String),
    Struct(MatStruct),
    Cell { dims: Vec<usize>, items: Vec<MatValue> },
    Empty,
    Unsupported(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endian {
    Little,
    Big,
}

impl Endian {
    fn u16(self, b: &[u8]) -> u16 {
        let b = [b[0], b[1]];
        match self {
            Endian::Little => u16::from_le_bytes(b),
            Endian::Big => u16::from_be_bytes(b),
        }
    }

    fn u32(self, b: &[u8]) -> u32 {
        let b = [b[0], b[1], b[2], b[3]];
        match self {
            Endian::Little => u32::from_le_bytes(b),
            Endian::Big => u32::from_be_bytes(b),
        }
    }

    fn u64(self, b: &[u8]) -> u64 {
        let mut a = [0u8; 8];
        a.copy_from_slice(&b[..8]);
        match self {
            Endian::Little => u64::from_le_bytes(a),
            Endian::Big => u64::from_be_bytes(a),
        }
    }
}

struct Element<'a> {
    ty: u32,
    data: &'a [u8],
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
    endian: Endian,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8], endian: Endian) -> Self {
        Self { buf, pos: 0, endian }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| decode_err("truncated data element"))?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    /// Skip the padding that follows an `n` byte payload.
    fn skip_padding(&mut self, n: usize) {
        let pad = (8 - n % 8) % 8;
        self.pos = (self.pos + pad).min(self.buf.len());
    }

    fn element(&mut self) -> Result<Element<'a>> {
        let head = self.endian.u32(self.take(4)?);
        if head >> 16 != 0 {
            // small element: size and type packed in one word, data in the next
            let n = (head >> 16) as usize;
            let word = self.take(4)?;
            if n > 4 {
                return Err(decode_err("small data element larger than 4 bytes"));
            }
            return Ok(Element {
                ty: head & 0xffff,
                data: &word[..n],
            });
        }

        let n = self.endian.u32(self.take(4)?) as usize;
        let data = self.take(n)?;
        if head != MI_COMPRESSED {
            self.skip_padding(n);
        }
        Ok(Element { ty: head, data })
    }
}

fn decode_err(msg: impl Into<String>) -> Error {
    Error::Decode(format!("MAT: {}", msg.into()))
}

/// Parse every top-level variable of a MAT file.
pub fn parse_mat(bytes: &[u8]) -> Result<Vec<(String, MatValue)>> {
    if bytes.len() < HEADER_LEN {
        return Err(decode_err("file shorter than the 128 byte header"));
    }
    if bytes.starts_with(b"MATLAB 7.3") {
        return Err(decode_err("HDF5-based v7.3 files are not supported"));
    }
    let endian = match &bytes[126..128] {
        b"IM" => Endian::Little,
        b"MI" => Endian::Big,
        _ => return Err(decode_err("missing endian indicator, not a level 5 file")),
    };

    let mut cursor = Cursor::new(&bytes[HEADER_LEN..], endian);
    let mut vars = Vec::new();
    while !cursor.at_end() {
        let element = cursor.element()?;
        match element.ty {
            MI_MATRIX => vars.push(parse_matrix(element.data, endian)?),
            MI_COMPRESSED => {
                let mut inflated = Vec::new();
                ZlibDecoder::new(element.data)
                    .read_to_end(&mut inflated)
                    .map_err(|e| decode_err(format!("inflate failed: {e}")))?;
                let mut inner = Cursor::new(&inflated, endian);
                while !inner.at_end() {
                    let element = inner.element()?;
                    if element.ty == MI_MATRIX {
                        vars.push(parse_matrix(element.data, endian)?);
                    }
                }
            }
            _ => {}
        }
    }
    Ok(vars)
}

fn parse_matrix(data: &[u8], endian: Endian) -> Result<(String, MatValue)> {
    if data.is_empty() {
        return Ok((String::new(), MatValue::Empty));
    }
    let mut cursor = Cursor::new(data, endian);

    let flags = cursor.element()?;
    if flags.data.len() < 4 {
        return Err(decode_err("array flags too short"));
    }
    let flag_word = endian.u32(flags.data);
    let class = (flag_word & 0xff) as u8;
    let complex = flag_word & 0x0800 != 0;

    let dims_el = cursor.element()?;
    let dims: Vec<usize> = numbers(&dims_el, endian)?
        .into_iter()
        .map(|d| d.max(0.0) as usize)
        .collect();
    let count: usize = dims.iter().product();

    let name_el = cursor.element()?;
    let name = String::from_utf8_lossy(name_el.data).into_owned();

    let value = match class {
        6..=15 => {
            let real = cursor.element()?;
            let data = numbers(&real, endian)?;
            if complex && !cursor.at_end() {
                cursor.element()?;
            }
            if data.len() != count {
                return Err(decode_err(format!(
                    "{name}: {} values for dims {dims:?}",
                    data.len()
                )));
            }
            MatValue::Numeric(MatArray { dims, data })
        }
        MX_CHAR => {
            let el = cursor.element()?;
            MatValue::Text(text(&el, endian))
        }
        MX_STRUCT => {
            let len_el = cursor.element()?;
            let field_len = numbers(&len_el, endian)?
                .first()
                .copied()
                .unwrap_or(0.0) as usize;
            let names_el = cursor.element()?;
            let fields: Vec<String> = if field_len == 0 {
                Vec::new()
            } else {
                names_el
                    .data
                    .chunks(field_len)
                    .map(|chunk| {
                        let end = chunk.iter().position(|&b| b == 0).unwrap_or(chunk.len());
                        String::from_utf8_lossy(&chunk[..end]).into_owned()
                    })
                    .collect()
            };

            let mut elements = Vec::with_capacity(count);
            for _ in 0..count {
                let mut values = Vec::with_capacity(fields.len());
                for _ in 0..fields.len() {
                    values.push(sub_matrix(&mut cursor, endian)?);
                }
                elements.push(values);
            }
            MatValue::Struct(MatStruct {
                dims,
                fields,
                elements,
            })
        }
        MX_CELL => {
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(sub_matrix(&mut cursor, endian)?);
            }
            MatValue::Cell { dims, items }
        }
        other => MatValue::Unsupported(other),
    };

    Ok((name, value))
}

fn sub_matrix(cursor: &mut Cursor<'_>, endian: Endian) -> Result<MatValue> {
    let el = cursor.element()?;
    if el.ty != MI_MATRIX {
        return Err(decode_err(format!("expected nested matrix, found type {}", el.ty)));
    }
    Ok(parse_matrix(el.data, endian)?.1)
}

fn numbers(el: &Element<'_>, endian: Endian) -> Result<Vec<f64>> {
    let d = el.data;
    let out = match el.ty {
        MI_INT8 => d.iter().map(|&b| b as i8 as f64).collect(),
        MI_UINT8 => d.iter().map(|&b| b as f64).collect(),
        MI_INT16 => d.chunks_exact(2).map(|c| endian.u16(c) as i16 as f64).collect(),
        MI_UINT16 => d.chunks_exact(2).map(|c| endian.u16(c) as f64).collect(),
        MI_INT32 => d.chunks_exact(4).map(|c| endian.u32(c) as i32 as f64).collect(),
        MI_UINT32 => d.chunks_exact(4).map(|c| endian.u32(c) as f64).collect(),
        MI_SINGLE => d
            .chunks_exact(4)
            .map(|c| f32::from_bits(endian.u32(c)) as f64)
            .collect(),
        MI_DOUBLE => d
            .chunks_exact(8)
            .map(|c| f64::from_bits(endian.u64(c)))
            .collect(),
        MI_INT64 => d.chunks_exact(8).map(|c| endian.u64(c) as i64 as f64).collect(),
        MI_UINT64 => d.chunks_exact(8).map(|c| endian.u64(c) as f64).collect(),
        other => return Err(decode_err(format!("unexpected numeric type {other}"))),
    };
    Ok(out)
}

fn text(el: &Element<'_>, endian: Endian) -> String {
    match el.ty {
        MI_UINT16 | MI_UTF16 => {
            let units: Vec<u16> = el.data.chunks_exact(2).map(|c| endian.u16(c)).collect();
            String::from_utf16_lossy(&units)
        }
        _ => String::from_utf8_lossy(el.data).into_owned(),
    }
}
