// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bandwidth of SNMP interfaces.

#[allow(unused)]
mod mock;

use std::{sync::Arc, time::Duration};

use phi_core::{
    clock::ManualClock, netif::InterfaceMonitor, Driver, DriverConfig, Error, Oid, OidValue,
    PortInfo, Value,
};

use mock::{Device, MockTransport};

const TIMEOUT: Duration = Duration::from_secs(1);

fn oid(s: &str) -> Oid {
    s.parse().unwrap()
}

fn switch() -> Device {
    let mut device = Device::default();
    let vars = [
        ("1.3.6.1.2.1.1.1.0", OidValue::OctetString("Acme Switch 8".into())),
        ("1.3.6.1.2.1.2.2.1.1.2", OidValue::Integer(2)),
        ("1.3.6.1.2.1.2.2.1.1.1", OidValue::Integer(1)),
        ("1.3.6.1.2.1.2.2.1.2.1", OidValue::OctetString("eth0".into())),
        ("1.3.6.1.2.1.2.2.1.2.2", OidValue::OctetString("eth1".into())),
        ("1.3.6.1.2.1.2.2.1.5.1", OidValue::Gauge32(1_000_000_000)),
        ("1.3.6.1.2.1.2.2.1.5.2", OidValue::Gauge32(100_000_000)),
        ("1.3.6.1.2.1.2.2.1.7.1", OidValue::Integer(1)),
        ("1.3.6.1.2.1.2.2.1.7.2", OidValue::Integer(2)),
        ("1.3.6.1.2.1.2.2.1.10.1", OidValue::Counter32(4_294_967_290)),
        ("1.3.6.1.2.1.2.2.1.16.1", OidValue::Counter32(1000)),
    ];
    for (name, value) in vars {
        device.oids.insert(oid(name), value);
    }
    device
}

fn monitor(device: Device) -> (InterfaceMonitor<MockTransport>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let driver = Driver::with_clock(
        MockTransport::new(device),
        DriverConfig::default(),
        clock.clone(),
    );
    (InterfaceMonitor::from_driver(driver), clock)
}

#[test]
fn traffic_in_bits_per_second() -> anyhow::Result<()> {
    let (monitor, clock) = monitor(switch());

    assert_eq!(monitor.get("in_1", TIMEOUT)?, Value::Unsigned(0));
    assert_eq!(monitor.get("out_1", TIMEOUT)?, Value::Unsigned(0));

    clock.advance(Duration::from_secs(1));
    {
        let mut device = monitor.driver().transport().device();
        // the input counter wraps around
        device
            .oids
            .insert(oid("1.3.6.1.2.1.2.2.1.10.1"), OidValue::Counter32(5));
        device
            .oids
            .insert(oid("1.3.6.1.2.1.2.2.1.16.1"), OidValue::Counter32(1250));
    }
    assert_eq!(monitor.get("in_1", TIMEOUT)?, Value::Unsigned(80));
    assert_eq!(monitor.get("out_1", TIMEOUT)?, Value::Unsigned(2000));
    Ok(())
}

#[test]
fn interfaces_that_are_down_are_not_measured() {
    let (monitor, _) = monitor(switch());

    let err = monitor.get("in_2", TIMEOUT).unwrap_err();
    assert!(matches!(err, Error::NotOperational(port) if port == "in_2"));
    assert!(matches!(
        monitor.get("up_1", TIMEOUT),
        Err(Error::InvalidPortSpec { .. })
    ));
}

#[test]
fn ports_are_listed_per_interface() -> anyhow::Result<()> {
    let (monitor, _) = monitor(switch());

    let ports = monitor.get_ports(TIMEOUT)?;
    assert_eq!(
        ports,
        [
            PortInfo::new("in_1", "eth0 input", "speed: 1000000000"),
            PortInfo::new("out_1", "eth0 output", "speed: 1000000000"),
            PortInfo::new("in_2", "eth1 input", "speed: 100000000"),
            PortInfo::new("out_2", "eth1 output", "speed: 100000000"),
        ]
    );
    Ok(())
}

#[test]
fn equipment_info() -> anyhow::Result<()> {
    let (monitor, _) = monitor(switch());

    assert_eq!(monitor.info(TIMEOUT)?, "Acme Switch 8");
    monitor.test(TIMEOUT)?;

    let (silent, _) = self::monitor(Device::default());
    assert!(silent.test(TIMEOUT).is_err());
    Ok(())
}

#[test]
fn oid_ports_through_the_driver() -> anyhow::Result<()> {
    let (monitor, clock) = monitor(switch());
    let driver = monitor.driver();
    let cfg = Default::default();

    assert_eq!(
        driver.get("1.3.6.1.2.1.2.2.1.2.1", &cfg, TIMEOUT)?,
        Value::Text("eth0".into())
    );
    assert!(driver.set("1.3.6.1.2.1.2.2.1.7.2", Value::Unsigned(1), &cfg, TIMEOUT)?);
    assert_eq!(
        driver.transport().device().oids.get(&oid("1.3.6.1.2.1.2.2.1.7.2")),
        Some(&OidValue::Integer(1))
    );
    assert!(driver.get("1.3.6.1.2.1.2.2.1.7.2/1", &cfg, TIMEOUT).is_err());

    assert_eq!(driver.rate("1.3.6.1.2.1.2.2.1.16.1", &cfg, TIMEOUT)?, 0.0);
    clock.advance(Duration::from_secs(2));
    driver
        .transport()
        .device()
        .oids
        .insert(oid("1.3.6.1.2.1.2.2.1.16.1"), OidValue::Counter32(1100));
    assert_eq!(driver.rate("1.3.6.1.2.1.2.2.1.16.1", &cfg, TIMEOUT)?, 50.0);
    Ok(())
}
