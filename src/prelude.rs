// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types and traits

///////////////////////////////////////////////////////////////////
/// Modules
///////////////////////////////////////////////////////////////////
pub use crate::client;

#[allow(missing_docs)]
#[cfg(feature = "blocking")]
pub mod blocking {
    pub use crate::client::blocking::*;
}

///////////////////////////////////////////////////////////////////
/// Types
///////////////////////////////////////////////////////////////////
pub use crate::{
    DataType, Driver, DriverConfig, Error, PortConfig, PortInfo, Request, Response, Result, Unit,
    UnitId, Value, WordOrder,
};
pub use crate::{feed::Feed, netif::InterfaceMonitor, port::Address};

///////////////////////////////////////////////////////////////////
/// Traits
///////////////////////////////////////////////////////////////////
pub use crate::client::{
    OidReader, OidWriter, Reader, Session, TagReader, TagWriter, Transport, Writer,
};
pub use crate::clock::Clock;
pub use crate::UnitContext;

#[cfg(feature = "blocking")]
pub use crate::client::blocking::{AsyncSession, AsyncTransport};
