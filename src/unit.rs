// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{fmt, str::FromStr};

use crate::Error;

pub type UnitId = u8;

/// A single byte for addressing a device behind a shared session,
/// e.g. a Modbus slave on a serial bus or behind a TCP gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct Unit(pub UnitId);

impl Unit {
    /// The minimum address of a single device.
    #[must_use]
    pub const fn min_device() -> Self {
        Unit(1)
    }

    /// The maximum address of a single device.
    #[must_use]
    pub const fn max_device() -> Self {
        Unit(247)
    }

    /// The address of a directly connected TCP device that isn't
    /// forwarded through a gateway.
    #[must_use]
    pub const fn tcp_device() -> Self {
        Unit(255)
    }

    #[must_use]
    pub fn is_single_device(self) -> bool {
        self >= Self::min_device() && self <= Self::max_device()
    }
}

impl Default for Unit {
    fn default() -> Self {
        Self::min_device()
    }
}

impl From<UnitId> for Unit {
    fn from(from: UnitId) -> Self {
        Unit(from)
    }
}

impl From<Unit> for UnitId {
    fn from(from: Unit) -> Self {
        from.0
    }
}

impl FromStr for Unit {
    type Err = Error;

    /// Accepts decimal and `0x` prefixed hexadecimal ids.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let id = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => UnitId::from_str_radix(hex, 16),
            None => s.parse(),
        };
        id.map(Unit)
            .map_err(|_| Error::Config(format!("invalid unit id `{s}`")))
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:0>2X}", self.0)
    }
}

pub trait UnitContext {
    /// Select a device for all subsequent outgoing requests.
    fn set_unit(&mut self, unit: Unit);
}
