// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The polling driver
//!
//! A [`Driver`] ties a [`Transport`] to the register cache, the counter
//! tracker and the timeout budget of each call. All methods block the
//! calling thread and may be invoked concurrently.

use std::{sync::Arc, time::Duration};

use parking_lot::{Mutex, MutexGuard};

use crate::{
    bits::{self, BitAddress, RegisterIo},
    budget::{Budget, Retry},
    cache::{CacheKey, RegisterCache},
    client::{
        Lease, OidReader as _, OidWriter as _, Reader as _, TagReader as _, TagWriter as _,
        Transport, Writer as _,
    },
    clock::{Clock, SystemClock},
    codec::{self, DataType, Value, WordOrder, Words},
    config::{DriverConfig, PortConfig, PortInfo},
    counter::{CounterTracker, CounterWidth},
    feed::{Feed, FeedReceiver},
    frame::{Oid, OidValue, Quantity, RegisterAddress, RegisterKind, Response, Span, Word},
    port::{Address, Base, Selector},
    unit::Unit,
    Error, Result,
};

/// Shared mutable state, guarded by a single lock.
#[derive(Debug)]
pub(crate) struct State {
    pub(crate) cache: RegisterCache,
    pub(crate) counters: CounterTracker,
    feed: FeedReceiver,
}

/// What a resolved port refers to.
#[derive(Debug)]
enum Target {
    /// Coils or discrete inputs, cached one word per bit.
    Bits {
        kind: RegisterKind,
        first: RegisterAddress,
        count: Quantity,
        scalar: bool,
    },
    /// A single bit of an input or holding register.
    Bit(BitAddress),
    Registers {
        kind: RegisterKind,
        first: RegisterAddress,
        data_type: DataType,
        order: WordOrder,
        count: Quantity,
        scalar: bool,
    },
    Tag {
        name: String,
        span: Option<Span>,
        scalar: bool,
    },
    Oid(Oid),
}

const fn element_span(selector: Option<Selector>) -> (u16, Quantity, bool) {
    match selector {
        Some(Selector::Index(index)) => (index, 1, true),
        Some(Selector::Range(first, last)) => (first, last - first + 1, false),
        Some(Selector::Bit(_)) | None => (0, 1, true),
    }
}

/// A polling driver instance.
#[derive(Debug)]
pub struct Driver<T> {
    transport: T,
    config: DriverConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<State>,
}

impl<T: Transport> Driver<T> {
    #[must_use]
    pub fn new(transport: T, config: DriverConfig) -> Self {
        Self::with_clock(transport, config, Arc::new(SystemClock))
    }

    /// Creates a driver reading time from `clock`, e.g. a
    /// [`ManualClock`](crate::clock::ManualClock) in tests.
    #[must_use]
    pub fn with_clock(transport: T, config: DriverConfig, clock: Arc<dyn Clock>) -> Self {
        let state = State {
            cache: RegisterCache::new(config.ttl, config.cache_capacity),
            counters: CounterTracker::new(),
            feed: FeedReceiver::new(),
        };
        Self {
            transport,
            config,
            clock,
            state: Mutex::new(state),
        }
    }

    #[must_use]
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns a sender for register values pushed by the device.
    ///
    /// Updates queue up to [`FEED_CAPACITY`](crate::feed::FEED_CAPACITY)
    /// entries until the next call of the driver drains them.
    #[must_use]
    pub fn feed(&self) -> Feed {
        self.state.lock().feed.feed()
    }

    /// Drops all cached registers, the next reads go to the device.
    ///
    /// Pending feed updates are discarded as well.
    pub fn clear_cache(&self) {
        self.lock_state().cache.clear();
    }

    /// Drops every cached register overlapping a port.
    pub fn invalidate(&self, port: &str) -> Result<()> {
        let (kind, first, count) = match self.resolve(port, &PortConfig::default())? {
            Target::Bits {
                kind, first, count, ..
            } => (kind, first, usize::from(count)),
            Target::Registers {
                kind,
                first,
                data_type,
                count,
                ..
            } => (kind, first, usize::from(count) * data_type.words()),
            Target::Bit(addr) => (addr.key.kind, addr.key.base, addr.words),
            Target::Tag { .. } | Target::Oid(_) => return Ok(()),
        };
        self.lock_state().cache.invalidate_range(kind, first, count);
        Ok(())
    }

    /// The port list from the configuration.
    #[must_use]
    pub fn get_ports(&self) -> Vec<PortInfo> {
        self.config.ports.clone()
    }

    /// Opens and releases a session within `timeout`.
    pub fn test(&self, timeout: Duration) -> Result<()> {
        let budget = self.budget(timeout);
        let lease = Lease::open(&self.transport, self.config.unit, budget.check()?)?;
        drop(lease);
        Ok(())
    }

    pub(crate) fn budget(&self, timeout: Duration) -> Budget {
        Budget::start_with(Arc::clone(&self.clock), timeout)
    }

    pub(crate) fn call(&self, timeout: Duration) -> Call<'_, T> {
        Call {
            transport: &self.transport,
            unit: self.config.unit,
            retry: Retry {
                attempts: self.config.retries.saturating_add(1),
                delay: self.config.retry_delay,
                min_slice: self.config.min_slice,
            },
            budget: self.budget(timeout),
            lease: None,
        }
    }

    /// Locks the state after folding in pending feed updates.
    pub(crate) fn lock_state(&self) -> MutexGuard<'_, State> {
        let mut state = self.state.lock();
        let State { cache, feed, .. } = &mut *state;
        feed.drain_into(cache, &*self.clock);
        state
    }

    pub(crate) fn clock(&self) -> &dyn Clock {
        &*self.clock
    }

    fn resolve(&self, port: &str, cfg: &PortConfig) -> Result<Target> {
        let addr = Address::parse(port)?;
        let order = cfg.word_order.unwrap_or(self.config.word_order);
        let target = match addr.base() {
            Base::Oid(oid) => Target::Oid(oid.clone()),
            Base::Tag(name) => {
                if addr.bit().is_some() {
                    return Err(Error::invalid_port(port, "bit addressing needs a register"));
                }
                let (first, count, scalar) = element_span(addr.selector());
                let span = addr.selector().map(|_| Span { first, count });
                Target::Tag {
                    name: name.clone(),
                    span,
                    scalar,
                }
            }
            Base::Register(base) => {
                let kind = addr.kind().unwrap_or(self.config.default_kind);
                let data_type = if kind.is_bit() {
                    DataType::Bool
                } else {
                    addr.data_type().or(cfg.data_type).unwrap_or(DataType::U16)
                };
                if let Some(bit) = addr.bit() {
                    if kind.is_bit() {
                        return Err(Error::invalid_port(port, "bit of a single-bit register"));
                    }
                    if data_type == DataType::Bool || u32::from(bit) >= data_type.bits() {
                        return Err(Error::invalid_port(port, "bit index exceeds the data type"));
                    }
                    return Ok(Target::Bit(BitAddress {
                        key: CacheKey::new(kind, *base),
                        bit,
                        words: data_type.words(),
                        order,
                    }));
                }
                let (element, count, scalar) = element_span(addr.selector());
                let stride = if kind.is_bit() { 1 } else { data_type.words() as u32 };
                let first = u32::from(*base) + u32::from(element) * stride;
                let len = u32::from(count) * stride;
                if first + len > 0x1_0000 || len > u32::from(Quantity::MAX) {
                    return Err(Error::invalid_port(port, "exceeds the register space"));
                }
                let first = first as RegisterAddress;
                if kind.is_bit() {
                    Target::Bits {
                        kind,
                        first,
                        count,
                        scalar,
                    }
                } else {
                    Target::Registers {
                        kind,
                        first,
                        data_type,
                        order,
                        count,
                        scalar,
                    }
                }
            }
        };
        Ok(target)
    }

    /// Reads registers through the cache. The lock is held during the
    /// refill, a concurrent bit write can't be overwritten by older data.
    fn read_cached(&self, call: &mut Call<'_, T>, key: CacheKey, count: usize) -> Result<Words> {
        let mut state = self.lock_state();
        state
            .cache
            .get_or_fetch(key, count, &*self.clock, || call.read(key, count))
    }

    /// Reads the current value of a port.
    ///
    /// Bits (coils, discrete inputs and register bits) are returned as
    /// `0` or `1`. Numeric values pass through the transform of `cfg`.
    pub fn get(&self, port: &str, cfg: &PortConfig, timeout: Duration) -> Result<Value> {
        let target = self.resolve(port, cfg)?;
        let transform = cfg.transform;
        let mut call = self.call(timeout);
        let value = match target {
            Target::Bit(addr) => {
                let mut state = self.lock_state();
                let bit = bits::read_bit(&mut state.cache, &addr, &*self.clock, &mut call)?;
                return Ok(Value::Unsigned(bit.into()));
            }
            Target::Bits {
                kind,
                first,
                count,
                scalar,
            } => {
                let words = self.read_cached(&mut call, CacheKey::new(kind, first), count.into())?;
                let mut bits = words
                    .iter()
                    .take(count.into())
                    .map(|w| Value::Unsigned((*w != 0).into()));
                return if scalar {
                    bits.next().ok_or_else(|| Error::InvalidValue("empty bit read".into()))
                } else {
                    Ok(Value::Array(bits.collect()))
                };
            }
            Target::Registers {
                kind,
                first,
                data_type,
                order,
                count,
                scalar,
            } => {
                let len = usize::from(count) * data_type.words();
                let words = self.read_cached(&mut call, CacheKey::new(kind, first), len)?;
                if scalar {
                    codec::decode(&words[..len], data_type, order)?
                } else {
                    Value::Array(codec::decode_elements(&words, data_type, order, count.into())?)
                }
            }
            Target::Tag { name, span, scalar } => {
                let values = call.run(|session, timeout| session.read_tag(&name, span, timeout))?;
                if scalar {
                    values.into_iter().next().ok_or(Error::UnexpectedResponse {
                        response: Response::ReadTag(Vec::new()),
                    })?
                } else {
                    Value::Array(values)
                }
            }
            Target::Oid(oid) => {
                Value::from(call.run(|session, timeout| session.get_oid(&oid, timeout))?)
            }
        };
        Ok(transform.apply_value(value))
    }

    /// Writes a value to a port.
    ///
    /// Returns `false` if the device refused the write. Numeric data is
    /// converted back through the transform of `cfg` before encoding.
    pub fn set(
        &self,
        port: &str,
        data: Value,
        cfg: &PortConfig,
        timeout: Duration,
    ) -> Result<bool> {
        let target = self.resolve(port, cfg)?;
        let mut call = self.call(timeout);
        match target {
            Target::Bits { kind, .. }
            | Target::Registers { kind, .. }
            | Target::Bit(BitAddress {
                key: CacheKey { kind, .. },
                ..
            }) if !kind.is_writable() =>
            {
                Err(Error::ReadOnly(port.to_owned()))
            }
            Target::Bit(addr) => {
                let value = data.to_bool()?;
                let mut state = self.lock_state();
                bits::write_bit(&mut state.cache, &addr, value, &*self.clock, &mut call)?;
                Ok(true)
            }
            Target::Bits {
                kind,
                first,
                count,
                scalar,
            } => {
                let coils = coil_values(&data, count, scalar)?;
                let mut state = self.lock_state();
                state.cache.invalidate_range(kind, first, coils.len());
                for (offset, coil) in (0..).zip(&coils) {
                    call.write(CacheKey::new(kind, first + offset), &[*coil])?;
                }
                let words = Words::from_vec(coils);
                state
                    .cache
                    .store(CacheKey::new(kind, first), words, self.clock.now());
                Ok(true)
            }
            Target::Registers {
                kind,
                first,
                data_type,
                order,
                count,
                scalar,
            } => {
                let data = cfg.transform.reverse_value(data);
                let words = match (&data, scalar) {
                    (Value::Array(values), true) if values.len() != 1 => {
                        return Err(Error::InvalidValue(format!(
                            "expected a single value, got {data}"
                        )));
                    }
                    (Value::Array(values), false) if values.len() != usize::from(count) => {
                        return Err(Error::InvalidValue(format!(
                            "expected {count} values, got {}",
                            values.len()
                        )));
                    }
                    (Value::Array(_), _) => codec::encode_elements(&data, data_type, order)?,
                    (_, true) => codec::encode(&data, data_type, order)?.to_vec(),
                    (_, false) => {
                        return Err(Error::InvalidValue(format!(
                            "expected {count} values, got {data}"
                        )));
                    }
                };
                let key = CacheKey::new(kind, first);
                let mut state = self.lock_state();
                call.write(key, &words)?;
                state.cache.store(key, Words::from_vec(words), self.clock.now());
                Ok(true)
            }
            Target::Tag { name, span, .. } => {
                let values = match cfg.transform.reverse_value(data) {
                    Value::Array(values) => values,
                    value => vec![value],
                };
                call.run(|session, timeout| session.write_tag(&name, span, &values, timeout))
            }
            Target::Oid(oid) => {
                let value = OidValue::try_from(&cfg.transform.reverse_value(data))?;
                call.run(|session, timeout| session.set_oid(&oid, value.clone(), timeout))?;
                Ok(true)
            }
        }
    }

    /// Reads a counter port and returns its rate of change per second,
    /// passed through the transform of `cfg`.
    ///
    /// Counters are OIDs of type `Counter32`/`Counter64` or `u32`/`u64`
    /// registers. The first read of a port returns `0`. Register counters
    /// are always read from the device.
    pub fn rate(&self, port: &str, cfg: &PortConfig, timeout: Duration) -> Result<f64> {
        let target = self.resolve(port, cfg)?;
        let mut call = self.call(timeout);
        let (raw, width) = match target {
            Target::Oid(oid) => {
                let value = call.run(|session, timeout| session.get_oid(&oid, timeout))?;
                counter_value(&value)?
            }
            Target::Registers {
                kind,
                first,
                data_type,
                order,
                scalar: true,
                ..
            } => {
                let width = match data_type {
                    DataType::U32 => CounterWidth::Bits32,
                    DataType::U64 => CounterWidth::Bits64,
                    other => {
                        return Err(Error::InvalidValue(format!("{other} is not a counter type")))
                    }
                };
                let words = call.read(CacheKey::new(kind, first), data_type.words())?;
                match codec::decode(&words, data_type, order)? {
                    Value::Unsigned(raw) => (raw, width),
                    other => {
                        return Err(Error::InvalidValue(format!(
                            "{other} is not a counter value"
                        )))
                    }
                }
            }
            _ => return Err(Error::invalid_port(port, "not a counter")),
        };
        let rate = self
            .lock_state()
            .counters
            .observe(port, raw, width, self.clock.now());
        Ok(cfg.transform.apply(rate))
    }
}

pub(crate) fn counter_value(value: &OidValue) -> Result<(u64, CounterWidth)> {
    match *value {
        OidValue::Counter32(raw) => Ok((raw.into(), CounterWidth::Bits32)),
        OidValue::Counter64(raw) => Ok((raw, CounterWidth::Bits64)),
        _ => Err(Error::UnexpectedResponse {
            response: Response::GetOid(value.clone()),
        }),
    }
}

fn coil_values(data: &Value, count: Quantity, scalar: bool) -> Result<Vec<Word>> {
    let coils = match data {
        Value::Array(values) => values
            .iter()
            .map(Value::to_bool)
            .collect::<Result<Vec<_>>>()?,
        value => vec![value.to_bool()?],
    };
    let expected = if scalar { 1 } else { usize::from(count) };
    if coils.len() != expected {
        return Err(Error::InvalidValue(format!(
            "expected {expected} values, got {}",
            coils.len()
        )));
    }
    Ok(coils.into_iter().map(Word::from).collect())
}

/// The state of one host call: its budget, retry policy and the
/// session, opened on first use and released when the call ends.
#[derive(Debug)]
pub(crate) struct Call<'a, T: Transport> {
    transport: &'a T,
    unit: Unit,
    retry: Retry,
    budget: Budget,
    lease: Option<Lease<T::Session>>,
}

impl<T: Transport> Call<'_, T> {
    /// Runs a session step with retries within the budget.
    ///
    /// A session that failed with a transport error is released and a
    /// fresh one is opened for the next attempt.
    pub(crate) fn run<R, F>(&mut self, mut op: F) -> Result<R>
    where
        F: FnMut(&mut T::Session, Duration) -> Result<R>,
    {
        let Self {
            transport,
            unit,
            retry,
            budget,
            lease,
        } = self;
        retry.run(budget, |slice| {
            let mut session = match lease.take() {
                Some(session) => session,
                None => Lease::open(*transport, *unit, slice)?,
            };
            let res = op(&mut *session, slice);
            match &res {
                Err(err) if err.is_retryable() => {
                    log::debug!("Dropping session after failure: {err}");
                }
                _ => *lease = Some(session),
            }
            res
        })
    }
}

fn bits_to_words(bits: Vec<bool>) -> Words {
    bits.into_iter().map(Word::from).collect()
}

impl<T: Transport> RegisterIo for Call<'_, T> {
    fn read(&mut self, key: CacheKey, count: usize) -> Result<Words> {
        let cnt = Quantity::try_from(count)
            .map_err(|_| Error::InvalidValue(format!("cannot read {count} registers at once")))?;
        let addr = key.base;
        match key.kind {
            RegisterKind::Coil => self
                .run(|session, timeout| session.read_coils(addr, cnt, timeout))
                .map(bits_to_words),
            RegisterKind::Discrete => self
                .run(|session, timeout| session.read_discrete_inputs(addr, cnt, timeout))
                .map(bits_to_words),
            RegisterKind::Input => self
                .run(|session, timeout| session.read_input_registers(addr, cnt, timeout))
                .map(Words::from_vec),
            RegisterKind::Holding => self
                .run(|session, timeout| session.read_holding_registers(addr, cnt, timeout))
                .map(Words::from_vec),
            RegisterKind::Oid => Err(Error::InvalidValue("OIDs have no registers".into())),
        }
    }

    fn write(&mut self, key: CacheKey, words: &[Word]) -> Result<()> {
        let addr = key.base;
        match key.kind {
            RegisterKind::Holding => {
                self.run(|session, timeout| session.write_multiple_registers(addr, words, timeout))
            }
            RegisterKind::Coil => {
                let coil = words.first().map_or(false, |w| *w != 0);
                self.run(|session, timeout| session.write_single_coil(addr, coil, timeout))
            }
            kind => Err(Error::ReadOnly(format!("{kind} {addr}"))),
        }
    }
}
