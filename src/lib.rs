// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A register-addressed polling core for hardware interface adapters.
//!
//! Adapters poll or actuate field devices (relays, sensors, PDUs, PLC
//! registers) through some wire protocol. This crate is the part they
//! share:
//!
//! - [`port`] parses compact port specifiers like `h1000/3` or `TAG:INT[2-5]`,
//! - [`codec`] converts between register words and typed, scaled values,
//! - [`cache`] memoizes register reads for a short time,
//! - [`bits`] performs read-modify-write of single register bits,
//! - [`counter`] turns wrapping hardware counters into rates,
//! - [`budget`] spreads the timeout of a call over retries and steps.
//!
//! The protocol itself is plugged in as a [`client::Transport`]. The
//! [`Driver`] exposes `get`/`set` to the host.
//!
//! ```
//! use std::time::Duration;
//! use phi_core::{client::Transport, Driver, PortConfig};
//!
//! fn poll<T: Transport>(driver: &Driver<T>) -> phi_core::Result<()> {
//!     let value = driver.get("h1000/3", &PortConfig::default(), Duration::from_secs(1))?;
//!     println!("{value}");
//!     Ok(())
//! }
//! ```
//!
//! ## Installation
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! phi-core = "*"
//! ```

pub mod prelude;

pub mod bits;
pub mod budget;
pub mod cache;
pub mod client;
pub mod clock;
pub mod codec;
pub mod config;
pub mod counter;
pub mod feed;
pub mod netif;
pub mod port;

mod driver;
mod error;
mod frame;
mod unit;

pub use self::{
    codec::{DataType, Value, WordOrder},
    config::{DriverConfig, PortConfig, PortInfo},
    driver::Driver,
    error::Error,
    frame::*,
    unit::{Unit, UnitContext, UnitId},
};

/// Specialized [`std::result::Result`] type for driver operations.
pub type Result<T> = std::result::Result<T, Error>;
