// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Blocking access to asynchronous sessions
//!
//! Transports written against tokio implement [`AsyncTransport`] and
//! [`AsyncSession`]. [`BlockingTransport`] drives them on a private
//! current-thread runtime, so the synchronous core can use them.
//!
//! The blocking calls must not be made from within an async context.

use std::{fmt::Debug, future::Future, io, time::Duration};

use async_trait::async_trait;
use tokio::runtime::{Builder, Runtime};

use super::{Session, Transport};
use crate::{
    frame::{Request, Response},
    unit::{Unit, UnitContext},
};

/// Transport independent asynchronous session trait
#[async_trait]
pub trait AsyncSession: UnitContext + Send + Debug {
    async fn call(&mut self, request: Request<'_>) -> io::Result<Response>;

    /// Hands the session back, e.g. by returning it to a pool or by
    /// closing the connection.
    async fn release(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Opens asynchronous sessions.
#[async_trait]
pub trait AsyncTransport: Send + Sync + Debug {
    type Session: AsyncSession;

    async fn open(&self) -> io::Result<Self::Session>;
}

fn timed_out() -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, "deadline elapsed")
}

fn block_on_timeout<F, T>(runtime: &Runtime, timeout: Duration, future: F) -> io::Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    runtime.block_on(async {
        tokio::time::timeout(timeout, future)
            .await
            .map_err(|_| timed_out())?
    })
}

/// A synchronous session context.
#[derive(Debug)]
pub struct BlockingSession<S> {
    runtime: Runtime,
    session: S,
}

impl<S: AsyncSession> BlockingSession<S> {
    pub fn new(session: S) -> io::Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(Self { runtime, session })
    }

    #[must_use]
    pub fn into_inner(self) -> S {
        self.session
    }
}

impl<S: AsyncSession> Session for BlockingSession<S> {
    fn call(&mut self, request: Request<'_>, timeout: Duration) -> io::Result<Response> {
        let Self { runtime, session } = self;
        block_on_timeout(runtime, timeout, session.call(request))
    }

    fn release(&mut self) {
        if let Err(err) = self.runtime.block_on(self.session.release()) {
            log::warn!("Failed to release session: {err}");
        }
    }
}

impl<S: AsyncSession> UnitContext for BlockingSession<S> {
    fn set_unit(&mut self, unit: Unit) {
        self.session.set_unit(unit);
    }
}

/// Adapts an [`AsyncTransport`] to the blocking [`Transport`] trait.
#[derive(Debug)]
pub struct BlockingTransport<T> {
    inner: T,
}

impl<T: AsyncTransport> BlockingTransport<T> {
    #[must_use]
    pub const fn new(inner: T) -> Self {
        Self { inner }
    }
}

impl<T: AsyncTransport> Transport for BlockingTransport<T> {
    type Session = BlockingSession<T::Session>;

    fn open(&self, timeout: Duration) -> io::Result<Self::Session> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        let session = block_on_timeout(&runtime, timeout, self.inner.open())?;
        Ok(BlockingSession { runtime, session })
    }
}
