// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bandwidth meter for SNMP equipment
//!
//! Ports are named `in_N` and `out_N` after the interface index `N`. A get
//! returns the traffic of the interface in bits per second, derived from
//! the octet counters of the IF-MIB.

use std::{collections::BTreeMap, time::Duration};

use crate::{
    client::{OidReader as _, Transport},
    codec::Value,
    config::{DriverConfig, PortInfo},
    driver::{counter_value, Driver},
    frame::{Oid, OidValue},
    Error, Result,
};

const IF_INDEX: [u32; 10] = [1, 3, 6, 1, 2, 1, 2, 2, 1, 1];
const IF_DESCR: [u32; 10] = [1, 3, 6, 1, 2, 1, 2, 2, 1, 2];
const IF_SPEED: [u32; 10] = [1, 3, 6, 1, 2, 1, 2, 2, 1, 5];
const IF_ADMIN_STATUS: [u32; 10] = [1, 3, 6, 1, 2, 1, 2, 2, 1, 7];
const IF_IN_OCTETS: [u32; 10] = [1, 3, 6, 1, 2, 1, 2, 2, 1, 10];
const IF_OUT_OCTETS: [u32; 10] = [1, 3, 6, 1, 2, 1, 2, 2, 1, 16];
const SYS_DESCR: [u32; 9] = [1, 3, 6, 1, 2, 1, 1, 1, 0];

/// `up(1)` and `testing(3)`, everything else is down.
const OPERATIONAL: [u64; 2] = [1, 3];

fn oid(arcs: &[u32]) -> Oid {
    Oid::new(arcs.to_vec())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    In,
    Out,
}

impl Direction {
    fn counter(self, index: u32) -> Oid {
        match self {
            Self::In => oid(&IF_IN_OCTETS).child(index),
            Self::Out => oid(&IF_OUT_OCTETS).child(index),
        }
    }
}

fn parse_port(port: &str) -> Result<(Direction, u32)> {
    let (direction, index) = port
        .split_once('_')
        .ok_or_else(|| Error::invalid_port(port, "expected in_N or out_N"))?;
    let direction = match direction {
        "in" => Direction::In,
        "out" => Direction::Out,
        _ => return Err(Error::invalid_port(port, "expected in_N or out_N")),
    };
    let index = index
        .parse()
        .map_err(|_| Error::invalid_port(port, "invalid interface index"))?;
    Ok((direction, index))
}

/// Interface monitor on top of an SNMP [`Transport`].
#[derive(Debug)]
pub struct InterfaceMonitor<T> {
    driver: Driver<T>,
}

impl<T: Transport> InterfaceMonitor<T> {
    #[must_use]
    pub fn new(transport: T, config: DriverConfig) -> Self {
        Self {
            driver: Driver::new(transport, config),
        }
    }

    /// Wraps an existing driver, e.g. one with a manual clock.
    #[must_use]
    pub fn from_driver(driver: Driver<T>) -> Self {
        Self { driver }
    }

    #[must_use]
    pub fn driver(&self) -> &Driver<T> {
        &self.driver
    }

    /// Bits per second on an interface since the previous get of the
    /// same port, `0` on the first get.
    ///
    /// Fails with [`Error::NotOperational`] if the interface is
    /// administratively down.
    pub fn get(&self, port: &str, timeout: Duration) -> Result<Value> {
        let (direction, index) = parse_port(port)?;
        let mut call = self.driver.call(timeout);
        let admin = oid(&IF_ADMIN_STATUS).child(index);
        let status = call.run(|session, timeout| session.get_oid(&admin, timeout))?;
        if !status.as_u64().map_or(false, |s| OPERATIONAL.contains(&s)) {
            log::warn!("Port {port} is not operational");
            return Err(Error::NotOperational(port.to_owned()));
        }
        let counter = direction.counter(index);
        let value = call.run(|session, timeout| session.get_oid(&counter, timeout))?;
        let (raw, width) = counter_value(&value)?;
        let now = self.driver.clock().now();
        let rate = self
            .driver
            .lock_state()
            .counters
            .observe(port, raw, width, now);
        Ok(Value::Unsigned((rate * 8.0).round() as u64))
    }

    /// Lists `in_N` and `out_N` for every interface in index order.
    pub fn get_ports(&self, timeout: Duration) -> Result<Vec<PortInfo>> {
        let mut call = self.driver.call(timeout);
        let (index, descr, speed) = (oid(&IF_INDEX), oid(&IF_DESCR), oid(&IF_SPEED));
        let indices = call.run(|session, timeout| session.walk_oid(&index, timeout))?;
        let names = call.run(|session, timeout| session.walk_oid(&descr, timeout))?;
        let speeds = call.run(|session, timeout| session.walk_oid(&speed, timeout))?;

        let by_index = |vars: Vec<(Oid, OidValue)>| -> BTreeMap<u32, Value> {
            vars.into_iter()
                .filter_map(|(oid, value)| Some((oid.last()?, Value::from(value))))
                .collect()
        };
        let (names, speeds) = (by_index(names), by_index(speeds));
        let mut interfaces: Vec<u32> = indices
            .iter()
            .filter_map(|(_, value)| value.as_u64().and_then(|v| u32::try_from(v).ok()))
            .collect();
        interfaces.sort_unstable();
        interfaces.dedup();

        let mut ports = Vec::with_capacity(interfaces.len() * 2);
        for n in interfaces {
            let name = names.get(&n).map(ToString::to_string).unwrap_or_default();
            let description = speeds
                .get(&n)
                .map(|speed| format!("speed: {speed}"))
                .unwrap_or_default();
            for (prefix, suffix) in [("in", "input"), ("out", "output")] {
                ports.push(PortInfo::new(
                    format!("{prefix}_{n}"),
                    format!("{name} {suffix}"),
                    description.clone(),
                ));
            }
        }
        Ok(ports)
    }

    /// The `sysDescr` of the equipment, i.e. its model and vendor.
    pub fn info(&self, timeout: Duration) -> Result<String> {
        let mut call = self.driver.call(timeout);
        let descr = oid(&SYS_DESCR);
        let value = call.run(|session, timeout| session.get_oid(&descr, timeout))?;
        Ok(Value::from(value).to_string())
    }

    /// Self test, succeeds if the equipment answers.
    pub fn test(&self, timeout: Duration) -> Result<()> {
        self.info(timeout).map(drop)
    }
}
