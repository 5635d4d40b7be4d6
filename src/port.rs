// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Port specifiers
//!
//! A port specifier is the compact address string a host assigns to a
//! logical port:
//!
//! ```text
//! [kind]base[:TYPE][/bit | [index] | [first-last]]
//! ```
//!
//! - `kind` is one of `c` (coil), `d` (discrete input), `i` (input register)
//!   or `h` (holding register) and only applies to numeric bases.
//! - `base` is a register number, an SNMP OID (`1.3.6.1.2.1.1.3.0`) or a tag name.
//! - `TYPE` selects the codec, see [`DataType`].
//!
//! ```
//! use phi_core::port::{Address, Base, Selector};
//! use phi_core::RegisterKind;
//!
//! let addr: Address = "h1000/3".parse().unwrap();
//! assert_eq!(addr.kind(), Some(RegisterKind::Holding));
//! assert_eq!(addr.base(), &Base::Register(1000));
//! assert_eq!(addr.selector(), Some(Selector::Bit(3)));
//! ```

use std::{fmt, str::FromStr};

use crate::{
    codec::DataType,
    frame::{Oid, RegisterAddress, RegisterKind},
    Error, Result,
};

/// The highest bit index of the widest (64 bit) register type.
const MAX_BIT: u8 = 63;

/// What a port refers to on the device.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Base {
    Register(RegisterAddress),
    Tag(String),
    Oid(Oid),
}

impl fmt::Display for Base {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Register(addr) => write!(f, "{addr}"),
            Self::Tag(tag) => f.write_str(tag),
            Self::Oid(oid) => write!(f, "{oid}"),
        }
    }
}

/// Sub-addressing within the base. Bit and array addressing are mutually
/// exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Selector {
    /// Zero-based bit within the base register.
    Bit(u8),
    /// A single array element.
    Index(u16),
    /// An inclusive range of array elements.
    Range(u16, u16),
}

impl Selector {
    /// First element and number of elements of array selectors.
    #[must_use]
    pub const fn span(self) -> Option<(u16, u16)> {
        match self {
            Self::Bit(_) => None,
            Self::Index(index) => Some((index, 1)),
            Self::Range(first, last) => Some((first, last - first + 1)),
        }
    }
}

/// A parsed port specifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    kind: Option<RegisterKind>,
    base: Base,
    selector: Option<Selector>,
    data_type: Option<DataType>,
}

impl Address {
    /// Parses a port specifier.
    pub fn parse(spec: &str) -> Result<Self> {
        let s = spec.trim();
        if s.is_empty() {
            return Err(Error::invalid_port(spec, "empty specifier"));
        }

        let (rest, selector) = if let Some(stripped) = s.strip_suffix(']') {
            let (head, inner) = stripped
                .rsplit_once('[')
                .ok_or_else(|| Error::invalid_port(spec, "unbalanced bracket"))?;
            (head, Some(parse_span(spec, inner)?))
        } else if let Some((head, bit)) = s.rsplit_once('/') {
            (head, Some(Selector::Bit(parse_bit(spec, bit)?)))
        } else {
            (s, None)
        };

        let (base, data_type) = match rest.rsplit_once(':') {
            Some((_, "")) => return Err(Error::invalid_port(spec, "empty type")),
            Some((head, token)) => (head, Some(token.parse::<DataType>()?)),
            None => (rest, None),
        };

        let (kind, base) = parse_base(spec, base)?;
        let addr = Self {
            kind,
            base,
            selector,
            data_type,
        };
        addr.validate(spec)?;
        Ok(addr)
    }

    fn validate(&self, spec: &str) -> Result<()> {
        if let Some(kind) = self.kind {
            if kind.is_bit() {
                if matches!(self.selector, Some(Selector::Bit(_))) {
                    return Err(Error::invalid_port(spec, "bit of a single-bit register"));
                }
                if self.data_type.map_or(false, |t| t != DataType::Bool) {
                    return Err(Error::invalid_port(spec, "coils and discrete inputs are boolean"));
                }
            }
            if kind == RegisterKind::Oid && self.selector.is_some() {
                return Err(Error::invalid_port(spec, "OIDs take no sub-address"));
            }
        }
        if let (Some(Selector::Bit(bit)), Some(data_type)) = (self.selector, self.data_type) {
            if data_type == DataType::Bool || u32::from(bit) >= data_type.bits() {
                return Err(Error::invalid_port(spec, "bit index exceeds the data type"));
            }
        }
        Ok(())
    }

    /// Register kind, `None` if it is left to the driver configuration.
    #[must_use]
    pub const fn kind(&self) -> Option<RegisterKind> {
        self.kind
    }

    #[must_use]
    pub const fn base(&self) -> &Base {
        &self.base
    }

    #[must_use]
    pub const fn selector(&self) -> Option<Selector> {
        self.selector
    }

    /// The bit index of bit ports.
    #[must_use]
    pub const fn bit(&self) -> Option<u8> {
        match self.selector {
            Some(Selector::Bit(bit)) => Some(bit),
            _ => None,
        }
    }

    /// The explicit `:TYPE` suffix, if any.
    #[must_use]
    pub const fn data_type(&self) -> Option<DataType> {
        self.data_type
    }

    /// The data type with defaults applied: `bool` for coils and discrete
    /// inputs, `u16` otherwise.
    #[must_use]
    pub fn resolved_data_type(&self) -> DataType {
        match (self.kind, self.data_type) {
            (Some(kind), _) if kind.is_bit() => DataType::Bool,
            (_, Some(data_type)) => data_type,
            _ => DataType::U16,
        }
    }

    /// The register number if the base is numeric.
    #[must_use]
    pub const fn register(&self) -> Option<RegisterAddress> {
        match self.base {
            Base::Register(addr) => Some(addr),
            _ => None,
        }
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// The canonical form, parsing it again yields an equal address.
impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(letter) = self.kind.and_then(RegisterKind::letter) {
            write!(f, "{letter}")?;
        }
        write!(f, "{}", self.base)?;
        if let Some(data_type) = self.data_type {
            write!(f, ":{data_type}")?;
        }
        match self.selector {
            Some(Selector::Bit(bit)) => write!(f, "/{bit}"),
            Some(Selector::Index(index)) => write!(f, "[{index}]"),
            Some(Selector::Range(first, last)) => write!(f, "[{first}-{last}]"),
            None => Ok(()),
        }
    }
}

fn is_decimal(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn is_oid(s: &str) -> bool {
    let arcs = s.strip_prefix("iso").unwrap_or(s);
    arcs.contains('.') && arcs.bytes().all(|b| b.is_ascii_digit() || b == b'.')
}

fn parse_register(spec: &str, s: &str) -> Result<RegisterAddress> {
    s.parse()
        .map_err(|_| Error::invalid_port(spec, "register number out of range"))
}

fn parse_base(spec: &str, s: &str) -> Result<(Option<RegisterKind>, Base)> {
    if s.is_empty() {
        return Err(Error::invalid_port(spec, "missing base"));
    }
    if is_oid(s) {
        let oid = s
            .parse()
            .map_err(|_| Error::invalid_port(spec, "malformed OID"))?;
        return Ok((Some(RegisterKind::Oid), Base::Oid(oid)));
    }
    let mut chars = s.chars();
    let kind = chars.next().and_then(RegisterKind::from_letter);
    let tail = chars.as_str();
    match kind {
        Some(kind) if is_decimal(tail) => {
            Ok((Some(kind), Base::Register(parse_register(spec, tail)?)))
        }
        _ if is_decimal(s) => Ok((None, Base::Register(parse_register(spec, s)?))),
        _ if s
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '[' | ']' | '/' | ':')) =>
        {
            Err(Error::invalid_port(spec, "malformed tag name"))
        }
        _ => Ok((None, Base::Tag(s.to_owned()))),
    }
}

fn parse_bit(spec: &str, s: &str) -> Result<u8> {
    if !is_decimal(s) {
        return Err(Error::invalid_port(spec, "bit index is not a number"));
    }
    match s.parse() {
        Ok(bit) if bit <= MAX_BIT => Ok(bit),
        _ => Err(Error::invalid_port(spec, "bit index out of range")),
    }
}

fn parse_span(spec: &str, s: &str) -> Result<Selector> {
    let index = |s: &str| -> Result<u16> {
        if !is_decimal(s) {
            return Err(Error::invalid_port(spec, "array index is not a number"));
        }
        s.parse()
            .map_err(|_| Error::invalid_port(spec, "array index out of range"))
    };
    match s.split_once('-') {
        Some((first, last)) => {
            let (first, last) = (index(first)?, index(last)?);
            if first > last {
                return Err(Error::invalid_port(spec, "descending array range"));
            }
            Ok(Selector::Range(first, last))
        }
        None => Ok(Selector::Index(index(s)?)),
    }
}
