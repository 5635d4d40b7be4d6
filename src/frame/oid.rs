// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{fmt, str::FromStr};

use crate::{codec::Value, Error};

/// An SNMP object identifier, e.g. `1.3.6.1.2.1.2.2.1.10.3`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Oid(Vec<u32>);

impl Oid {
    #[must_use]
    pub fn new(arcs: Vec<u32>) -> Self {
        Self(arcs)
    }

    #[must_use]
    pub fn arcs(&self) -> &[u32] {
        &self.0
    }

    /// Appends a sub-identifier, e.g. an interface index to a table column.
    #[must_use]
    pub fn child(&self, arc: u32) -> Self {
        let mut arcs = self.0.clone();
        arcs.push(arc);
        Self(arcs)
    }

    /// The last sub-identifier, i.e. the row index of a table cell.
    #[must_use]
    pub fn last(&self) -> Option<u32> {
        self.0.last().copied()
    }

    /// Checks if `self` lies below `prefix` in the OID tree.
    #[must_use]
    pub fn starts_with(&self, prefix: &Oid) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, arc) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{arc}")?;
        }
        Ok(())
    }
}

impl FromStr for Oid {
    type Err = Error;

    /// Accepts `1.3.6.1`, `.1.3.6.1` and the net-snmp style `iso.3.6.1`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.strip_prefix('.').unwrap_or(s);
        let (mut arcs, rest) = match trimmed.strip_prefix("iso.") {
            Some(rest) => (vec![1], rest),
            None => (Vec::new(), trimmed),
        };
        for arc in rest.split('.') {
            if arc.is_empty() || !arc.bytes().all(|b| b.is_ascii_digit()) {
                return Err(Error::invalid_port(s, "malformed OID"));
            }
            let arc = arc
                .parse()
                .map_err(|_| Error::invalid_port(s, "OID arc out of range"))?;
            arcs.push(arc);
        }
        if arcs.len() < 2 {
            return Err(Error::invalid_port(s, "OID needs at least two arcs"));
        }
        Ok(Self(arcs))
    }
}

/// A typed SNMP variable binding value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OidValue {
    Integer(i64),
    Counter32(u32),
    Counter64(u64),
    Gauge32(u32),
    TimeTicks(u32),
    OctetString(String),
    Null,
}

impl OidValue {
    /// Width of the counter in bits if the value is a monotonic counter.
    #[must_use]
    pub const fn counter_bits(&self) -> Option<u32> {
        match self {
            Self::Counter32(_) => Some(32),
            Self::Counter64(_) => Some(64),
            _ => None,
        }
    }

    /// Interprets the value as an unsigned integer if possible.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Self::Integer(v) => u64::try_from(v).ok(),
            Self::Counter32(v) | Self::Gauge32(v) | Self::TimeTicks(v) => Some(v.into()),
            Self::Counter64(v) => Some(v),
            Self::OctetString(_) | Self::Null => None,
        }
    }
}

impl From<OidValue> for Value {
    fn from(from: OidValue) -> Self {
        match from {
            OidValue::Integer(v) => Value::Signed(v),
            OidValue::Counter32(v) | OidValue::Gauge32(v) | OidValue::TimeTicks(v) => {
                Value::Unsigned(v.into())
            }
            OidValue::Counter64(v) => Value::Unsigned(v),
            OidValue::OctetString(s) => Value::Text(s),
            OidValue::Null => Value::Text(String::new()),
        }
    }
}

impl TryFrom<&Value> for OidValue {
    type Error = Error;

    /// Values without an SNMP type hint are written as `Integer` or `OctetString`.
    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::Bool(b) => Ok(Self::Integer((*b).into())),
            Value::Signed(v) => Ok(Self::Integer(*v)),
            Value::Unsigned(v) => i64::try_from(*v)
                .map(Self::Integer)
                .map_err(|_| Error::InvalidValue(format!("{v} exceeds an SNMP integer"))),
            Value::Float(v) if v.fract() == 0.0 && v.is_finite() => {
                Ok(Self::Integer(*v as i64))
            }
            Value::Text(s) => Ok(s
                .trim()
                .parse()
                .map_or_else(|_| Self::OctetString(s.clone()), Self::Integer)),
            other => Err(Error::InvalidValue(format!(
                "{other} cannot be written to an OID"
            ))),
        }
    }
}
