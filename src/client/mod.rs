// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport sessions
//!
//! The core doesn't speak any wire protocol. It opens a [`Session`] through
//! a [`Transport`] and hands it [`Request`]s, each with the timeout of the
//! current attempt.

use std::{
    borrow::Cow,
    fmt::Debug,
    io,
    ops::{Deref, DerefMut},
    time::Duration,
};

pub use crate::unit::{Unit, UnitContext};

use crate::{codec::Value, frame::*, Error, Result};

#[cfg(feature = "blocking")]
pub mod blocking;

/// Opens sessions to a device, e.g. by reserving a pooled connection.
pub trait Transport: Send + Sync + Debug {
    type Session: Session;

    /// Blocks until a session is available or `timeout` elapsed.
    fn open(&self, timeout: Duration) -> io::Result<Self::Session>;
}

/// Transport independent synchronous session trait
pub trait Session: UnitContext + Send + Debug {
    /// Invokes a request and waits at most `timeout` for the response.
    fn call(&mut self, request: Request<'_>, timeout: Duration) -> io::Result<Response>;

    /// Hands the session back to the transport.
    ///
    /// Called exactly once when the [`Lease`] of the session is dropped.
    fn release(&mut self) {}
}

impl<S: Session + ?Sized> Session for Box<S> {
    fn call(&mut self, request: Request<'_>, timeout: Duration) -> io::Result<Response> {
        (**self).call(request, timeout)
    }

    fn release(&mut self) {
        (**self).release();
    }
}

impl<S: UnitContext + ?Sized> UnitContext for Box<S> {
    fn set_unit(&mut self, unit: Unit) {
        (**self).set_unit(unit);
    }
}

fn unexpected<T>(response: Response) -> Result<T> {
    Err(Error::UnexpectedResponse { response })
}

/// Register and bit reads
pub trait Reader: Session {
    fn read_coils(&mut self, addr: RegisterAddress, cnt: Quantity, timeout: Duration)
        -> Result<Vec<Coil>>;

    fn read_discrete_inputs(
        &mut self,
        addr: RegisterAddress,
        cnt: Quantity,
        timeout: Duration,
    ) -> Result<Vec<Coil>>;

    fn read_input_registers(
        &mut self,
        addr: RegisterAddress,
        cnt: Quantity,
        timeout: Duration,
    ) -> Result<Vec<Word>>;

    fn read_holding_registers(
        &mut self,
        addr: RegisterAddress,
        cnt: Quantity,
        timeout: Duration,
    ) -> Result<Vec<Word>>;
}

/// Register and bit writes
pub trait Writer: Session {
    fn write_single_coil(&mut self, addr: RegisterAddress, coil: Coil, timeout: Duration)
        -> Result<()>;

    fn write_multiple_registers(
        &mut self,
        addr: RegisterAddress,
        words: &[Word],
        timeout: Duration,
    ) -> Result<()>;
}

/// SNMP style reads
pub trait OidReader: Session {
    fn get_oid(&mut self, oid: &Oid, timeout: Duration) -> Result<OidValue>;

    /// All variables below `oid` in ascending order.
    fn walk_oid(&mut self, oid: &Oid, timeout: Duration) -> Result<Vec<(Oid, OidValue)>>;
}

/// SNMP style writes
pub trait OidWriter: Session {
    fn set_oid(&mut self, oid: &Oid, value: OidValue, timeout: Duration) -> Result<()>;
}

/// Tag reads
pub trait TagReader: Session {
    fn read_tag(&mut self, tag: &str, span: Option<Span>, timeout: Duration)
        -> Result<Vec<Value>>;
}

/// Tag writes
pub trait TagWriter: Session {
    /// Returns `false` if the device refused the write.
    fn write_tag(
        &mut self,
        tag: &str,
        span: Option<Span>,
        values: &[Value],
        timeout: Duration,
    ) -> Result<bool>;
}

fn take_bits(
    mut bits: Vec<Coil>,
    cnt: Quantity,
    response: fn(Vec<Coil>) -> Response,
) -> Result<Vec<Coil>> {
    if bits.len() < cnt.into() {
        return unexpected(response(bits));
    }
    bits.truncate(cnt.into());
    Ok(bits)
}

fn take_words(
    words: Vec<Word>,
    cnt: Quantity,
    response: fn(Vec<Word>) -> Response,
) -> Result<Vec<Word>> {
    if words.len() != usize::from(cnt) {
        return unexpected(response(words));
    }
    Ok(words)
}

impl<S: Session + ?Sized> Reader for S {
    fn read_coils(
        &mut self,
        addr: RegisterAddress,
        cnt: Quantity,
        timeout: Duration,
    ) -> Result<Vec<Coil>> {
        match self.call(Request::ReadCoils(addr, cnt), timeout)? {
            Response::ReadCoils(coils) => take_bits(coils, cnt, Response::ReadCoils),
            response => unexpected(response),
        }
    }

    fn read_discrete_inputs(
        &mut self,
        addr: RegisterAddress,
        cnt: Quantity,
        timeout: Duration,
    ) -> Result<Vec<Coil>> {
        match self.call(Request::ReadDiscreteInputs(addr, cnt), timeout)? {
            Response::ReadDiscreteInputs(inputs) => {
                take_bits(inputs, cnt, Response::ReadDiscreteInputs)
            }
            response => unexpected(response),
        }
    }

    fn read_input_registers(
        &mut self,
        addr: RegisterAddress,
        cnt: Quantity,
        timeout: Duration,
    ) -> Result<Vec<Word>> {
        match self.call(Request::ReadInputRegisters(addr, cnt), timeout)? {
            Response::ReadInputRegisters(words) => {
                take_words(words, cnt, Response::ReadInputRegisters)
            }
            response => unexpected(response),
        }
    }

    fn read_holding_registers(
        &mut self,
        addr: RegisterAddress,
        cnt: Quantity,
        timeout: Duration,
    ) -> Result<Vec<Word>> {
        match self.call(Request::ReadHoldingRegisters(addr, cnt), timeout)? {
            Response::ReadHoldingRegisters(words) => {
                take_words(words, cnt, Response::ReadHoldingRegisters)
            }
            response => unexpected(response),
        }
    }
}

impl<S: Session + ?Sized> Writer for S {
    fn write_single_coil(
        &mut self,
        addr: RegisterAddress,
        coil: Coil,
        timeout: Duration,
    ) -> Result<()> {
        match self.call(Request::WriteSingleCoil(addr, coil), timeout)? {
            Response::WriteSingleCoil(rsp_addr, rsp_coil)
                if rsp_addr == addr && rsp_coil == coil =>
            {
                Ok(())
            }
            response => unexpected(response),
        }
    }

    fn write_multiple_registers(
        &mut self,
        addr: RegisterAddress,
        words: &[Word],
        timeout: Duration,
    ) -> Result<()> {
        let request = Request::WriteMultipleRegisters(addr, Cow::Borrowed(words));
        match self.call(request, timeout)? {
            Response::WriteMultipleRegisters(rsp_addr, rsp_cnt)
                if rsp_addr == addr && usize::from(rsp_cnt) == words.len() =>
            {
                Ok(())
            }
            response => unexpected(response),
        }
    }
}

impl<S: Session + ?Sized> OidReader for S {
    fn get_oid(&mut self, oid: &Oid, timeout: Duration) -> Result<OidValue> {
        match self.call(Request::GetOid(Cow::Borrowed(oid)), timeout)? {
            Response::GetOid(value) => Ok(value),
            response => unexpected(response),
        }
    }

    fn walk_oid(&mut self, oid: &Oid, timeout: Duration) -> Result<Vec<(Oid, OidValue)>> {
        match self.call(Request::WalkOid(Cow::Borrowed(oid)), timeout)? {
            Response::WalkOid(vars) => Ok(vars),
            response => unexpected(response),
        }
    }
}

impl<S: Session + ?Sized> OidWriter for S {
    fn set_oid(&mut self, oid: &Oid, value: OidValue, timeout: Duration) -> Result<()> {
        match self.call(Request::SetOid(Cow::Borrowed(oid), value), timeout)? {
            Response::SetOid => Ok(()),
            response => unexpected(response),
        }
    }
}

impl<S: Session + ?Sized> TagReader for S {
    fn read_tag(
        &mut self,
        tag: &str,
        span: Option<Span>,
        timeout: Duration,
    ) -> Result<Vec<Value>> {
        match self.call(Request::ReadTag(Cow::Borrowed(tag), span), timeout)? {
            Response::ReadTag(values) => Ok(values),
            response => unexpected(response),
        }
    }
}

impl<S: Session + ?Sized> TagWriter for S {
    fn write_tag(
        &mut self,
        tag: &str,
        span: Option<Span>,
        values: &[Value],
        timeout: Duration,
    ) -> Result<bool> {
        let request = Request::WriteTag(Cow::Borrowed(tag), span, Cow::Borrowed(values));
        match self.call(request, timeout)? {
            Response::WriteTag(accepted) => Ok(accepted),
            response => unexpected(response),
        }
    }
}

/// An open session that is released when dropped, on every exit path.
#[derive(Debug)]
pub struct Lease<S: Session> {
    session: S,
}

impl<S: Session> Lease<S> {
    /// Opens a session and selects `unit` on it.
    pub fn open<T>(transport: &T, unit: Unit, timeout: Duration) -> Result<Self>
    where
        T: Transport<Session = S>,
    {
        let mut session = transport.open(timeout)?;
        log::debug!("Opened session to unit {unit}");
        session.set_unit(unit);
        Ok(Self { session })
    }
}

impl<S: Session> Deref for Lease<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.session
    }
}

impl<S: Session> DerefMut for Lease<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.session
    }
}

impl<S: Session> Drop for Lease<S> {
    fn drop(&mut self) {
        log::debug!("Releasing session");
        self.session.release();
    }
}
