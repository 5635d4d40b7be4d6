// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversion between raw register words and typed values.

mod transform;

use std::{fmt, str::FromStr};

use byteorder::{BigEndian, ByteOrder as _};
use smallvec::SmallVec;

pub use self::transform::Transform;

use crate::{frame::Word, Error, Result};

/// Words of a single encoded value. Scalars never exceed four words.
pub type Words = SmallVec<[Word; 4]>;

/// The data type of a register port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    /// IEEE 754 binary32.
    F32,
    Bool,
    /// Words are passed through untouched.
    Raw,
}

impl DataType {
    /// Number of 16 bit registers occupied by one value.
    #[must_use]
    pub const fn words(self) -> usize {
        match self {
            Self::U16 | Self::I16 | Self::Bool | Self::Raw => 1,
            Self::U32 | Self::I32 | Self::F32 => 2,
            Self::U64 | Self::I64 => 4,
        }
    }

    /// Number of addressable bits of one value.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.words() as u32 * 16
    }

    #[must_use]
    pub const fn is_signed(self) -> bool {
        matches!(self, Self::I16 | Self::I32 | Self::I64)
    }

    /// Canonical lower case token.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::U16 => "u16",
            Self::I16 => "i16",
            Self::U32 => "u32",
            Self::I32 => "i32",
            Self::U64 => "u64",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::Bool => "bool",
            Self::Raw => "raw",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = Error;

    /// Case-insensitive. Accepts the canonical tokens and the
    /// EtherNet/IP CIP type names.
    fn from_str(s: &str) -> Result<Self> {
        let data_type = match s.to_ascii_lowercase().as_str() {
            "u16" | "uint" | "word" => Self::U16,
            "i16" | "int" => Self::I16,
            "u32" | "udint" | "dword" => Self::U32,
            "i32" | "dint" => Self::I32,
            "u64" | "ulint" | "lword" => Self::U64,
            "i64" | "lint" => Self::I64,
            "f32" | "real" => Self::F32,
            "bool" => Self::Bool,
            "raw" => Self::Raw,
            _ => return Err(Error::InvalidDataType(s.to_owned())),
        };
        Ok(data_type)
    }
}

/// Order of the words of multi-register values.
///
/// Device families disagree on this, so it is a per driver policy that
/// may be overridden per port. Bytes within a word are always big-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WordOrder {
    /// Most significant word first (`ABCD`).
    #[default]
    MsbFirst,
    /// Least significant word first (`CDAB`).
    LsbFirst,
}

impl FromStr for WordOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "msbfirst" | "mswfirst" | "msb" | "msw" | "big" | "bigendian" | "be" | "abcd" => {
                Ok(Self::MsbFirst)
            }
            "lsbfirst" | "lswfirst" | "lsb" | "lsw" | "little" | "littleendian" | "le"
            | "cdab" | "wordswap" => Ok(Self::LsbFirst),
            _ => Err(Error::Config(format!("unknown word order `{s}`"))),
        }
    }
}

/// A value as seen by the host.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Text(String),
    /// Untyped register contents.
    Words(Vec<Word>),
    /// Elements of a range port.
    Array(Vec<Value>),
}

impl Value {
    /// Numeric interpretation, parsing text if necessary.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Unsigned(v) => Some(*v as f64),
            Self::Signed(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Words(_) | Self::Array(_) => None,
        }
    }

    /// Truthiness for bit and coil writes.
    pub fn to_bool(&self) -> Result<bool> {
        match self {
            Self::Bool(b) => Ok(*b),
            Self::Unsigned(v) => Ok(*v != 0),
            Self::Signed(v) => Ok(*v != 0),
            Self::Float(v) => Ok(*v != 0.0),
            Self::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "on" | "yes" | "y" => Ok(true),
                "0" | "false" | "off" | "no" | "n" => Ok(false),
                _ => Err(Error::InvalidValue(format!("`{s}` is not a boolean"))),
            },
            other => Err(Error::InvalidValue(format!("{other} is not a boolean"))),
        }
    }

    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Unsigned(_) | Self::Signed(_) | Self::Float(_))
    }

    /// Integer interpretation used by the encoder. Floats are truncated
    /// toward zero.
    fn to_integer(&self) -> Result<i128> {
        match self {
            Self::Bool(b) => Ok((*b).into()),
            Self::Unsigned(v) => Ok((*v).into()),
            Self::Signed(v) => Ok((*v).into()),
            Self::Float(v) if v.is_finite() => Ok(v.trunc() as i128),
            Self::Text(s) => {
                let s = s.trim();
                s.parse::<i128>().or_else(|_| {
                    Self::Float(
                        s.parse()
                            .map_err(|_| Error::InvalidValue(format!("`{s}` is not a number")))?,
                    )
                    .to_integer()
                })
            }
            other => Err(Error::InvalidValue(format!("{other} is not an integer"))),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => f.write_str(if *b { "1" } else { "0" }),
            Self::Unsigned(v) => write!(f, "{v}"),
            Self::Signed(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
            Self::Words(words) => {
                for (i, w) in words.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{w}")?;
                }
                Ok(())
            }
            Self::Array(values) => {
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{v}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(from: bool) -> Self {
        Self::Bool(from)
    }
}

impl From<u16> for Value {
    fn from(from: u16) -> Self {
        Self::Unsigned(from.into())
    }
}

impl From<u32> for Value {
    fn from(from: u32) -> Self {
        Self::Unsigned(from.into())
    }
}

impl From<u64> for Value {
    fn from(from: u64) -> Self {
        Self::Unsigned(from)
    }
}

impl From<i16> for Value {
    fn from(from: i16) -> Self {
        Self::Signed(from.into())
    }
}

impl From<i32> for Value {
    fn from(from: i32) -> Self {
        Self::Signed(from.into())
    }
}

impl From<i64> for Value {
    fn from(from: i64) -> Self {
        Self::Signed(from)
    }
}

impl From<f32> for Value {
    fn from(from: f32) -> Self {
        Self::Float(from.into())
    }
}

impl From<f64> for Value {
    fn from(from: f64) -> Self {
        Self::Float(from)
    }
}

impl From<&str> for Value {
    fn from(from: &str) -> Self {
        Self::Text(from.to_owned())
    }
}

impl From<String> for Value {
    fn from(from: String) -> Self {
        Self::Text(from)
    }
}

/// Puts the words of one value into most-significant-first order (or back).
fn reorder(words: &[Word], order: WordOrder) -> Words {
    let mut ordered = Words::from_slice(words);
    if order == WordOrder::LsbFirst {
        ordered.reverse();
    }
    ordered
}

/// Decodes the leading words of `words` into a value of `data_type`.
///
/// `Raw` consumes all words, every other type exactly
/// [`DataType::words`].
pub fn decode(words: &[Word], data_type: DataType, order: WordOrder) -> Result<Value> {
    // Big endian bytes of the leading `data_type.words()` words.
    let fixed = || -> Result<[u8; 8]> {
        let count = data_type.words();
        if words.len() < count {
            return Err(Error::InvalidValue(format!(
                "{data_type} needs {count} words, got {}",
                words.len()
            )));
        }
        let mut buf = [0u8; 8];
        BigEndian::write_u16_into(&reorder(&words[..count], order), &mut buf[..count * 2]);
        Ok(buf)
    };
    let value = match data_type {
        DataType::Raw => Value::Words(words.to_vec()),
        DataType::Bool => Value::Bool(BigEndian::read_u16(&fixed()?) != 0),
        DataType::U16 => Value::Unsigned(BigEndian::read_u16(&fixed()?).into()),
        DataType::I16 => Value::Signed(BigEndian::read_i16(&fixed()?).into()),
        DataType::U32 => Value::Unsigned(BigEndian::read_u32(&fixed()?).into()),
        DataType::I32 => Value::Signed(BigEndian::read_i32(&fixed()?).into()),
        DataType::U64 => Value::Unsigned(BigEndian::read_u64(&fixed()?)),
        DataType::I64 => Value::Signed(BigEndian::read_i64(&fixed()?)),
        DataType::F32 => Value::Float(BigEndian::read_f32(&fixed()?).into()),
    };
    Ok(value)
}

/// Decodes `count` consecutive values of `data_type`.
pub fn decode_elements(
    words: &[Word],
    data_type: DataType,
    order: WordOrder,
    count: usize,
) -> Result<Vec<Value>> {
    let stride = data_type.words();
    if words.len() < stride * count {
        return Err(Error::InvalidValue(format!(
            "{count} x {data_type} needs {} words, got {}",
            stride * count,
            words.len()
        )));
    }
    words
        .chunks_exact(stride)
        .take(count)
        .map(|chunk| decode(chunk, data_type, order))
        .collect()
}

fn check_range(value: i128, data_type: DataType, min: i128, max: i128) -> Result<()> {
    if value < min || value > max {
        return Err(Error::InvalidValue(format!(
            "{value} is out of range for {data_type}"
        )));
    }
    Ok(())
}

/// Encodes `value` into the words of `data_type`.
pub fn encode(value: &Value, data_type: DataType, order: WordOrder) -> Result<Words> {
    let mut buf = [0u8; 8];
    let bytes = &mut buf[..data_type.words() * 2];
    match data_type {
        DataType::Raw => {
            return match value {
                Value::Words(words) => Ok(Words::from_slice(words)),
                other => {
                    let v = other.to_integer()?;
                    check_range(v, data_type, 0, u16::MAX.into())?;
                    Ok(Words::from_slice(&[v as Word]))
                }
            };
        }
        DataType::Bool => BigEndian::write_u16(bytes, value.to_bool()?.into()),
        DataType::F32 => {
            let v = value
                .as_f64()
                .ok_or_else(|| Error::InvalidValue(format!("{value} is not a number")))?;
            BigEndian::write_f32(bytes, v as f32);
        }
        DataType::U16 => {
            let v = value.to_integer()?;
            check_range(v, data_type, 0, u16::MAX.into())?;
            BigEndian::write_u16(bytes, v as u16);
        }
        DataType::I16 => {
            let v = value.to_integer()?;
            check_range(v, data_type, i16::MIN.into(), i16::MAX.into())?;
            BigEndian::write_i16(bytes, v as i16);
        }
        DataType::U32 => {
            let v = value.to_integer()?;
            check_range(v, data_type, 0, u32::MAX.into())?;
            BigEndian::write_u32(bytes, v as u32);
        }
        DataType::I32 => {
            let v = value.to_integer()?;
            check_range(v, data_type, i32::MIN.into(), i32::MAX.into())?;
            BigEndian::write_i32(bytes, v as i32);
        }
        DataType::U64 => {
            let v = value.to_integer()?;
            check_range(v, data_type, 0, u64::MAX.into())?;
            BigEndian::write_u64(bytes, v as u64);
        }
        DataType::I64 => {
            let v = value.to_integer()?;
            check_range(v, data_type, i64::MIN.into(), i64::MAX.into())?;
            BigEndian::write_i64(bytes, v as i64);
        }
    }
    let mut words = [0; 4];
    let words = &mut words[..data_type.words()];
    BigEndian::read_u16_into(bytes, words);
    Ok(reorder(words, order))
}

/// Encodes the elements of an array (or a single scalar) back to back.
pub fn encode_elements(value: &Value, data_type: DataType, order: WordOrder) -> Result<Vec<Word>> {
    match value {
        Value::Array(values) => {
            let mut words = Vec::with_capacity(values.len() * data_type.words());
            for v in values {
                words.extend_from_slice(&encode(v, data_type, order)?);
            }
            Ok(words)
        }
        scalar => Ok(encode(scalar, data_type, order)?.to_vec()),
    }
}

/// Interprets the words of one value as an unsigned bit field, used for
/// bit addressing within multi-word registers.
pub(crate) fn words_to_bits(words: &[Word], order: WordOrder) -> u64 {
    reorder(words, order)
        .iter()
        .fold(0_u64, |acc, w| (acc << 16) | u64::from(*w))
}

/// Inverse of [`words_to_bits`] for `count` words.
pub(crate) fn bits_to_words(bits: u64, count: usize, order: WordOrder) -> Words {
    let msb_first: Words = (0..count)
        .rev()
        .map(|i| (bits >> (16 * i)) as Word)
        .collect();
    reorder(&msb_first, order)
}
