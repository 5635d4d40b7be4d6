// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Driver and port configuration
//!
//! Hosts hand over options as string maps. They are converted once into
//! typed structures; malformed values are rejected with [`Error::Config`].
//! Keys that are not recognized are ignored, hosts usually put unrelated
//! settings into the same map.

use std::{str::FromStr, time::Duration};

use crate::{
    cache::{DEFAULT_CAPACITY, DEFAULT_TTL},
    codec::{DataType, Transform, WordOrder},
    frame::RegisterKind,
    unit::Unit,
    Error, Result,
};

/// Descriptive entry of the port list offered to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct PortInfo {
    pub port: String,
    pub name: String,
    pub description: String,
}

impl PortInfo {
    #[must_use]
    pub fn new(
        port: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            port: port.into(),
            name: name.into(),
            description: description.into(),
        }
    }

    /// Ports `1` to `max` as found on fixed relay and sensor boards.
    ///
    /// `{}` in `template` is replaced by the port number.
    #[must_use]
    pub fn numbered(max: u16, template: &str) -> Vec<Self> {
        (1..=max)
            .map(|n| {
                let port = n.to_string();
                let description = template.replace("{}", &port);
                Self::new(port.clone(), port, description)
            })
            .collect()
    }
}

fn parse_option<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("invalid value `{value}` for `{key}`")))
}

fn parse_seconds(key: &str, value: &str) -> Result<Duration> {
    let secs: f64 = parse_option(key, value)?;
    Duration::try_from_secs_f64(secs)
        .map_err(|_| Error::Config(format!("invalid duration `{value}` for `{key}`")))
}

fn parse_kind(value: &str) -> Result<RegisterKind> {
    let kind = match value.trim().to_ascii_lowercase().as_str() {
        "c" | "coil" => RegisterKind::Coil,
        "d" | "discrete" => RegisterKind::Discrete,
        "i" | "input" => RegisterKind::Input,
        "h" | "holding" => RegisterKind::Holding,
        _ => return Err(Error::Config(format!("unknown register kind `{value}`"))),
    };
    Ok(kind)
}

/// Per call options of a single port.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "serde_impl::RawPortConfig"))]
pub struct PortConfig {
    /// Used when the port specifier carries no `:TYPE` suffix.
    pub data_type: Option<DataType>,
    pub transform: Transform,
    /// Overrides the word order of the driver.
    pub word_order: Option<WordOrder>,
}

impl PortConfig {
    /// Recognized keys: `type`, `multiply`, `divide`, `round`, `word_order`.
    pub fn from_options<I, K, V>(options: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut cfg = Self::default();
        for (key, value) in options {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                "type" => cfg.data_type = Some(value.trim().parse()?),
                "multiply" => cfg.transform.multiply = Some(parse_option(key, value)?),
                "divide" => cfg.transform.divide = Some(parse_option(key, value)?),
                "round" => cfg.transform.round_to = Some(parse_option(key, value)?),
                "word_order" => cfg.word_order = Some(value.parse()?),
                _ => log::debug!("Ignoring port option `{key}`"),
            }
        }
        Ok(cfg)
    }
}

/// Settings of a driver instance.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "serde_impl::RawDriverConfig"))]
pub struct DriverConfig {
    /// Device selected on every opened session.
    pub unit: Unit,
    /// Lifetime of cached register reads.
    pub ttl: Duration,
    /// Maximum number of cached registers.
    pub cache_capacity: usize,
    pub word_order: WordOrder,
    /// Additional attempts after a failed transport call.
    pub retries: u32,
    /// Settle time between attempts.
    pub retry_delay: Duration,
    /// Shortest timeout an attempt is started with.
    pub min_slice: Duration,
    /// Kind of numeric ports without a kind letter.
    pub default_kind: RegisterKind,
    /// Static port list reported to the host.
    pub ports: Vec<PortInfo>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            unit: Unit::default(),
            ttl: DEFAULT_TTL,
            cache_capacity: DEFAULT_CAPACITY,
            word_order: WordOrder::default(),
            retries: 0,
            retry_delay: Duration::ZERO,
            min_slice: Duration::from_millis(10),
            default_kind: RegisterKind::Holding,
            ports: Vec::new(),
        }
    }
}

impl DriverConfig {
    /// Recognized keys: `unit`, `ttl`, `cache_capacity`, `word_order`,
    /// `retries`, `retry_delay`, `min_slice`, `default_kind`, `port_max`
    /// and `port_description`.
    ///
    /// Durations are given in (fractional) seconds. `port_max` generates a
    /// numbered port list, see [`PortInfo::numbered`].
    pub fn from_options<I, K, V>(options: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut cfg = Self::default();
        let mut port_max = None;
        let mut port_description = None;
        for (key, value) in options {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                "unit" => cfg.unit = value.parse()?,
                "ttl" => cfg.ttl = parse_seconds(key, value)?,
                "cache_capacity" => cfg.cache_capacity = parse_option(key, value)?,
                "word_order" => cfg.word_order = value.parse()?,
                "retries" => cfg.retries = parse_option(key, value)?,
                "retry_delay" => cfg.retry_delay = parse_seconds(key, value)?,
                "min_slice" => cfg.min_slice = parse_seconds(key, value)?,
                "default_kind" => cfg.default_kind = parse_kind(value)?,
                "port_max" => port_max = Some(parse_option::<u16>(key, value)?),
                "port_description" => port_description = Some(value.to_owned()),
                _ => log::debug!("Ignoring driver option `{key}`"),
            }
        }
        if let Some(max) = port_max {
            cfg.ports = PortInfo::numbered(max, port_description.as_deref().unwrap_or("port {}"));
        }
        Ok(cfg)
    }
}

#[cfg(feature = "serde")]
mod serde_impl {
    use std::time::Duration;

    use serde::Deserialize;

    use super::*;

    #[derive(Deserialize, Default)]
    #[serde(default)]
    pub struct RawPortConfig {
        #[serde(rename = "type")]
        data_type: Option<String>,
        multiply: Option<f64>,
        divide: Option<f64>,
        round: Option<u32>,
        word_order: Option<String>,
    }

    impl TryFrom<RawPortConfig> for PortConfig {
        type Error = Error;

        fn try_from(raw: RawPortConfig) -> Result<Self> {
            Ok(Self {
                data_type: raw.data_type.as_deref().map(str::parse).transpose()?,
                transform: Transform {
                    multiply: raw.multiply,
                    divide: raw.divide,
                    round_to: raw.round,
                },
                word_order: raw.word_order.as_deref().map(str::parse).transpose()?,
            })
        }
    }

    #[derive(Deserialize, Default)]
    #[serde(default)]
    pub struct RawDriverConfig {
        unit: Option<Unit>,
        ttl: Option<f64>,
        cache_capacity: Option<usize>,
        word_order: Option<String>,
        retries: Option<u32>,
        retry_delay: Option<f64>,
        min_slice: Option<f64>,
        default_kind: Option<String>,
        ports: Vec<PortInfo>,
    }

    fn seconds(key: &str, secs: Option<f64>, default: Duration) -> Result<Duration> {
        secs.map_or(Ok(default), |secs| {
            Duration::try_from_secs_f64(secs)
                .map_err(|_| Error::Config(format!("invalid duration {secs} for `{key}`")))
        })
    }

    impl TryFrom<RawDriverConfig> for DriverConfig {
        type Error = Error;

        fn try_from(raw: RawDriverConfig) -> Result<Self> {
            let defaults = Self::default();
            Ok(Self {
                unit: raw.unit.unwrap_or(defaults.unit),
                ttl: seconds("ttl", raw.ttl, defaults.ttl)?,
                cache_capacity: raw.cache_capacity.unwrap_or(defaults.cache_capacity),
                word_order: raw
                    .word_order
                    .as_deref()
                    .map_or(Ok(defaults.word_order), str::parse)?,
                retries: raw.retries.unwrap_or(defaults.retries),
                retry_delay: seconds("retry_delay", raw.retry_delay, defaults.retry_delay)?,
                min_slice: seconds("min_slice", raw.min_slice, defaults.min_slice)?,
                default_kind: raw
                    .default_kind
                    .as_deref()
                    .map_or(Ok(defaults.default_kind), parse_kind)?,
                ports: raw.ports,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_options() {
        let cfg = PortConfig::from_options([
            ("type", "i32"),
            ("multiply", "2"),
            ("divide", "10"),
            ("round", "1"),
            ("word_order", "cdab"),
            ("name", "boiler"),
        ])
        .unwrap();
        assert_eq!(cfg.data_type, Some(DataType::I32));
        assert_eq!(cfg.transform.multiply, Some(2.0));
        assert_eq!(cfg.transform.divide, Some(10.0));
        assert_eq!(cfg.transform.round_to, Some(1));
        assert_eq!(cfg.word_order, Some(WordOrder::LsbFirst));
    }

    #[test]
    fn invalid_port_options() {
        assert!(matches!(
            PortConfig::from_options([("type", "u12")]),
            Err(Error::InvalidDataType(_))
        ));
        assert!(matches!(
            PortConfig::from_options([("divide", "ten")]),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            PortConfig::from_options([("round", "-1")]),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn driver_defaults() {
        let cfg = DriverConfig::from_options(Vec::<(String, String)>::new()).unwrap();
        assert_eq!(cfg, DriverConfig::default());
        assert_eq!(cfg.ttl, Duration::from_millis(500));
        assert_eq!(cfg.cache_capacity, 8192);
        assert_eq!(cfg.default_kind, RegisterKind::Holding);
    }

    #[test]
    fn driver_options() {
        let cfg = DriverConfig::from_options([
            ("unit", "3"),
            ("ttl", "0.25"),
            ("retries", "2"),
            ("retry_delay", "0.05"),
            ("default_kind", "input"),
            ("port_max", "3"),
            ("port_description", "relay {}"),
        ])
        .unwrap();
        assert_eq!(cfg.unit, Unit(3));
        assert_eq!(cfg.ttl, Duration::from_millis(250));
        assert_eq!(cfg.retries, 2);
        assert_eq!(cfg.retry_delay, Duration::from_millis(50));
        assert_eq!(cfg.default_kind, RegisterKind::Input);
        assert_eq!(cfg.ports.len(), 3);
        assert_eq!(cfg.ports[2], PortInfo::new("3", "3", "relay 3"));
    }

    #[test]
    fn invalid_driver_options() {
        assert!(DriverConfig::from_options([("ttl", "-1")]).is_err());
        assert!(DriverConfig::from_options([("ttl", "soon")]).is_err());
        assert!(DriverConfig::from_options([("default_kind", "x")]).is_err());
        assert!(DriverConfig::from_options([("word_order", "middle")]).is_err());
    }

    #[test]
    fn numbered_ports() {
        let ports = PortInfo::numbered(2, "Relay {}");
        assert_eq!(
            ports,
            [
                PortInfo::new("1", "1", "Relay 1"),
                PortInfo::new("2", "2", "Relay 2"),
            ]
        );
        assert!(PortInfo::numbered(0, "x").is_empty());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn deserialize_configs() {
        let cfg: DriverConfig =
            serde_json::from_str(r#"{"unit": 2, "ttl": 1.5, "word_order": "little"}"#).unwrap();
        assert_eq!(cfg.unit, Unit(2));
        assert_eq!(cfg.ttl, Duration::from_millis(1500));
        assert_eq!(cfg.word_order, WordOrder::LsbFirst);

        let port: PortConfig =
            serde_json::from_str(r#"{"type": "REAL", "divide": 10}"#).unwrap();
        assert_eq!(port.data_type, Some(DataType::F32));
        assert_eq!(port.transform.divide, Some(10.0));
        assert!(serde_json::from_str::<PortConfig>(r#"{"type": "u12"}"#).is_err());
    }
}
