// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

mod oid;

use std::{
    borrow::Cow,
    fmt::{self, Display},
};

pub use self::oid::{Oid, OidValue};

use crate::codec::Value;

/// A register address is represented by 16 bit from `0` to `65535`.
///
/// This *protocol address* uses 0-based indexing. Device manuals often
/// list 1-based register numbers that need to be converted by the host.
pub type RegisterAddress = u16;

/// A Coil represents a single bit.
///
/// - `true` is equivalent to `ON`, `1` and `0xFF00`.
/// - `false` is equivalent to `OFF`, `0` and `0x0000`.
pub type Coil = bool;

/// Registers hold 16 bit data items.
pub type Word = u16;

/// Number of items to process.
pub type Quantity = u16;

/// The class of a data item on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RegisterKind {
    /// Read-write bit (`c`).
    Coil,
    /// Read-only bit (`d`).
    Discrete,
    /// Read-only word (`i`).
    Input,
    /// Read-write word (`h`).
    Holding,
    /// SNMP object identifier.
    Oid,
}

impl RegisterKind {
    /// Resolves the single letter prefix of a port specifier.
    #[must_use]
    pub const fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'c' => Some(Self::Coil),
            'd' => Some(Self::Discrete),
            'i' => Some(Self::Input),
            'h' => Some(Self::Holding),
            _ => None,
        }
    }

    /// The single letter prefix, `None` for OIDs which have no prefix.
    #[must_use]
    pub const fn letter(self) -> Option<char> {
        match self {
            Self::Coil => Some('c'),
            Self::Discrete => Some('d'),
            Self::Input => Some('i'),
            Self::Holding => Some('h'),
            Self::Oid => None,
        }
    }

    /// Coils and discrete inputs carry single bits instead of words.
    #[must_use]
    pub const fn is_bit(self) -> bool {
        matches!(self, Self::Coil | Self::Discrete)
    }

    #[must_use]
    pub const fn is_writable(self) -> bool {
        matches!(self, Self::Coil | Self::Holding | Self::Oid)
    }
}

impl Display for RegisterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Coil => "coil",
            Self::Discrete => "discrete input",
            Self::Input => "input register",
            Self::Holding => "holding register",
            Self::Oid => "oid",
        };
        f.write_str(name)
    }
}

/// A contiguous run of array elements of a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// Index of the first element.
    pub first: u16,
    /// Number of elements.
    pub count: Quantity,
}

/// A request represents a message from the core to a transport session.
#[derive(Debug, Clone, PartialEq)]
pub enum Request<'a> {
    /// A request to read multiple coils.
    /// The first parameter is the address of the first coil to read.
    /// The second parameter is the number of coils to read.
    ReadCoils(RegisterAddress, Quantity),

    /// A request to read multiple discrete inputs.
    /// The first parameter is the address of the first discrete input to read.
    /// The second parameter is the number of discrete inputs to read.
    ReadDiscreteInputs(RegisterAddress, Quantity),

    /// A request to read multiple input registers.
    /// The first parameter is the address of the first input register to read.
    /// The second parameter is the number of input registers to read.
    ReadInputRegisters(RegisterAddress, Quantity),

    /// A request to read multiple holding registers.
    /// The first parameter is the address of the first holding register to read.
    /// The second parameter is the number of holding registers to read.
    ReadHoldingRegisters(RegisterAddress, Quantity),

    /// A request to write a single coil.
    WriteSingleCoil(RegisterAddress, Coil),

    /// A request to write to multiple holding registers.
    /// The first parameter is the address of the first register to write.
    /// The second parameter is the vector of values to write to the registers.
    WriteMultipleRegisters(RegisterAddress, Cow<'a, [Word]>),

    /// A request to read a single SNMP variable.
    GetOid(Cow<'a, Oid>),

    /// A request to read all SNMP variables below an OID.
    WalkOid(Cow<'a, Oid>),

    /// A request to write a single SNMP variable.
    SetOid(Cow<'a, Oid>, OidValue),

    /// A request to read a tag, optionally restricted to array elements.
    ReadTag(Cow<'a, str>, Option<Span>),

    /// A request to write a tag, optionally restricted to array elements.
    WriteTag(Cow<'a, str>, Option<Span>, Cow<'a, [Value]>),
}

impl Request<'_> {
    /// Converts the request into an owned instance with `'static'` lifetime.
    #[must_use]
    pub fn into_owned(self) -> Request<'static> {
        use Request::*;

        match self {
            ReadCoils(addr, qty) => ReadCoils(addr, qty),
            ReadDiscreteInputs(addr, qty) => ReadDiscreteInputs(addr, qty),
            ReadInputRegisters(addr, qty) => ReadInputRegisters(addr, qty),
            ReadHoldingRegisters(addr, qty) => ReadHoldingRegisters(addr, qty),
            WriteSingleCoil(addr, coil) => WriteSingleCoil(addr, coil),
            WriteMultipleRegisters(addr, words) => {
                WriteMultipleRegisters(addr, Cow::Owned(words.into_owned()))
            }
            GetOid(oid) => GetOid(Cow::Owned(oid.into_owned())),
            WalkOid(oid) => WalkOid(Cow::Owned(oid.into_owned())),
            SetOid(oid, value) => SetOid(Cow::Owned(oid.into_owned()), value),
            ReadTag(tag, span) => ReadTag(Cow::Owned(tag.into_owned()), span),
            WriteTag(tag, span, values) => WriteTag(
                Cow::Owned(tag.into_owned()),
                span,
                Cow::Owned(values.into_owned()),
            ),
        }
    }

    /// Whether the request modifies device state.
    #[must_use]
    pub const fn is_write(&self) -> bool {
        matches!(
            self,
            Request::WriteSingleCoil(..)
                | Request::WriteMultipleRegisters(..)
                | Request::SetOid(..)
                | Request::WriteTag(..)
        )
    }
}

/// The data of a successful request.
///
/// ReadCoils/ReadDiscreteInputs: sessions may return more bits than
/// requested (whole bytes on the wire). Only the leading bits that have
/// actually been requested are defined.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Response to a `ReadCoils` request.
    ReadCoils(Vec<Coil>),

    /// Response to a `ReadDiscreteInputs` request.
    ReadDiscreteInputs(Vec<Coil>),

    /// Response to a `ReadInputRegisters` request.
    ReadInputRegisters(Vec<Word>),

    /// Response to a `ReadHoldingRegisters` request.
    ReadHoldingRegisters(Vec<Word>),

    /// Response to a `WriteSingleCoil` request
    /// The first parameter contains the address of the coil that has been written to
    /// The second parameter contains the value that has been written
    WriteSingleCoil(RegisterAddress, Coil),

    /// Response to a `WriteMultipleRegisters` request
    /// The first parameter contains the address at the start of the register range that has been written to
    /// The second parameter contains the amount of register that have been written
    WriteMultipleRegisters(RegisterAddress, Quantity),

    /// Response to a `GetOid` request.
    GetOid(OidValue),

    /// Response to a `WalkOid` request, in ascending OID order.
    WalkOid(Vec<(Oid, OidValue)>),

    /// Response to a `SetOid` request.
    SetOid,

    /// Response to a `ReadTag` request, one value per element.
    ReadTag(Vec<Value>),

    /// Response to a `WriteTag` request, `false` if the device refused the write.
    WriteTag(bool),
}
