// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{
    collections::{BTreeMap, BTreeSet},
    io,
    sync::{Arc, Mutex, MutexGuard},
    thread,
    time::Duration,
};

use phi_core::{
    client::{Session, Transport},
    clock::{Clock, ManualClock},
    Oid, OidValue, Request, Response, Unit, UnitContext, Value,
};

/// Memory of a simulated device.
#[derive(Debug, Default)]
pub struct Device {
    pub holding: BTreeMap<u16, u16>,
    pub input: BTreeMap<u16, u16>,
    pub coils: BTreeMap<u16, bool>,
    pub oids: BTreeMap<Oid, OidValue>,
    pub tags: BTreeMap<String, Vec<Value>>,
    pub locked_tags: BTreeSet<String>,
    pub requests: Vec<Request<'static>>,
    /// Timeout passed along with each request.
    pub timeouts: Vec<Duration>,
    pub opened: usize,
    pub released: usize,
    /// Number of upcoming calls that fail with a transport error.
    pub failures: usize,
}

impl Device {
    pub fn reads(&self) -> usize {
        self.requests.iter().filter(|r| !r.is_write()).count()
    }

    pub fn writes(&self) -> usize {
        self.requests.iter().filter(|r| r.is_write()).count()
    }

    pub fn handle(&mut self, request: Request<'_>) -> io::Result<Response> {
        use Request::*;

        let words = |map: &BTreeMap<u16, u16>, addr: u16, cnt: u16| -> Vec<u16> {
            (addr..addr + cnt)
                .map(|a| map.get(&a).copied().unwrap_or_default())
                .collect()
        };
        let rsp = match request {
            ReadCoils(addr, cnt) => Response::ReadCoils(
                (addr..addr + cnt)
                    .map(|a| self.coils.get(&a).copied().unwrap_or_default())
                    .collect(),
            ),
            // discrete inputs read `true` at odd addresses
            ReadDiscreteInputs(addr, cnt) => {
                Response::ReadDiscreteInputs((addr..addr + cnt).map(|a| a % 2 == 1).collect())
            }
            ReadInputRegisters(addr, cnt) => {
                Response::ReadInputRegisters(words(&self.input, addr, cnt))
            }
            ReadHoldingRegisters(addr, cnt) => {
                Response::ReadHoldingRegisters(words(&self.holding, addr, cnt))
            }
            WriteSingleCoil(addr, coil) => {
                self.coils.insert(addr, coil);
                Response::WriteSingleCoil(addr, coil)
            }
            WriteMultipleRegisters(addr, data) => {
                for (a, w) in (addr..).zip(data.iter()) {
                    self.holding.insert(a, *w);
                }
                Response::WriteMultipleRegisters(addr, data.len() as u16)
            }
            GetOid(oid) => Response::GetOid(
                self.oids
                    .get(&*oid)
                    .cloned()
                    .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, oid.to_string()))?,
            ),
            WalkOid(prefix) => Response::WalkOid(
                self.oids
                    .iter()
                    .filter(|(oid, _)| oid.starts_with(&prefix))
                    .map(|(oid, value)| (oid.clone(), value.clone()))
                    .collect(),
            ),
            SetOid(oid, value) => {
                self.oids.insert(oid.into_owned(), value);
                Response::SetOid
            }
            ReadTag(tag, span) => {
                let values = self
                    .tags
                    .get(&*tag)
                    .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, tag.to_string()))?;
                let values = match span {
                    Some(span) => values
                        .iter()
                        .skip(span.first.into())
                        .take(span.count.into())
                        .cloned()
                        .collect(),
                    None => values.iter().take(1).cloned().collect(),
                };
                Response::ReadTag(values)
            }
            WriteTag(tag, span, data) => {
                if self.locked_tags.contains(&*tag) {
                    return Ok(Response::WriteTag(false));
                }
                let first = span.map_or(0, |span| usize::from(span.first));
                let values = self.tags.entry(tag.into_owned()).or_default();
                if values.len() < first + data.len() {
                    values.resize(first + data.len(), Value::Unsigned(0));
                }
                values[first..first + data.len()].clone_from_slice(&data);
                Response::WriteTag(true)
            }
        };
        Ok(rsp)
    }
}

/// Transport handing out sessions to a shared [`Device`].
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    device: Arc<Mutex<Device>>,
    clock: Option<Arc<ManualClock>>,
    latency: Duration,
}

impl MockTransport {
    pub fn new(device: Device) -> Self {
        Self {
            device: Arc::new(Mutex::new(device)),
            ..Default::default()
        }
    }

    /// Every call advances `clock` by `latency`.
    pub fn with_latency(mut self, clock: Arc<ManualClock>, latency: Duration) -> Self {
        self.clock = Some(clock);
        self.latency = latency;
        self
    }

    pub fn device(&self) -> MutexGuard<'_, Device> {
        self.device.lock().unwrap()
    }
}

impl Transport for MockTransport {
    type Session = MockSession;

    fn open(&self, _: Duration) -> io::Result<MockSession> {
        self.device().opened += 1;
        Ok(MockSession {
            transport: self.clone(),
            unit: None,
        })
    }
}

#[derive(Debug)]
pub struct MockSession {
    transport: MockTransport,
    unit: Option<Unit>,
}

impl Session for MockSession {
    fn call(&mut self, request: Request<'_>, timeout: Duration) -> io::Result<Response> {
        assert!(!timeout.is_zero());
        assert!(self.unit.is_some());
        if let Some(clock) = &self.transport.clock {
            clock.sleep(self.transport.latency);
        }
        // let concurrent callers interleave
        thread::yield_now();
        let mut device = self.transport.device();
        device.requests.push(request.clone().into_owned());
        device.timeouts.push(timeout);
        if device.failures > 0 {
            device.failures -= 1;
            return Err(io::Error::new(io::ErrorKind::TimedOut, "no answer"));
        }
        device.handle(request)
    }

    fn release(&mut self) {
        self.transport.device().released += 1;
    }
}

impl UnitContext for MockSession {
    fn set_unit(&mut self, unit: Unit) {
        self.unit = Some(unit);
    }
}
