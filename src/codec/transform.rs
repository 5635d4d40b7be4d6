// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::Value;

/// Linear scaling `value * multiply / divide`, optionally rounded.
///
/// A missing or zero divisor leaves the value undivided.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Transform {
    pub multiply: Option<f64>,
    pub divide: Option<f64>,
    /// Fractional digits to keep.
    pub round_to: Option<u32>,
}

fn non_zero(factor: Option<f64>) -> Option<f64> {
    factor.filter(|f| *f != 0.0)
}

impl Transform {
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.multiply.map_or(true, |m| m == 1.0)
            && non_zero(self.divide).map_or(true, |d| d == 1.0)
            && self.round_to.is_none()
    }

    /// Raw device value to host value.
    #[must_use]
    pub fn apply(&self, value: f64) -> f64 {
        let mut value = value;
        if let Some(multiply) = self.multiply {
            value *= multiply;
        }
        if let Some(divide) = non_zero(self.divide) {
            value /= divide;
        }
        match self.round_to {
            Some(digits) => round(value, digits),
            None => value,
        }
    }

    /// Host value back to device value, used on set.
    ///
    /// Multiplies by the divisor and divides by the multiplier; a zero
    /// multiplier is skipped like a zero divisor.
    #[must_use]
    pub fn reverse(&self, value: f64) -> f64 {
        let mut value = value;
        if let Some(divide) = non_zero(self.divide) {
            value *= divide;
        }
        if let Some(multiply) = non_zero(self.multiply) {
            value /= multiply;
        }
        value
    }

    /// Applies the transform to numeric values (and arrays of them).
    /// Non-numeric values pass through unchanged.
    #[must_use]
    pub fn apply_value(&self, value: Value) -> Value {
        if self.is_identity() {
            return value;
        }
        match value {
            Value::Array(values) => {
                Value::Array(values.into_iter().map(|v| self.apply_value(v)).collect())
            }
            v if v.is_numeric() => match v.as_f64() {
                Some(f) => Value::Float(self.apply(f)),
                None => v,
            },
            other => other,
        }
    }

    /// Reverses the transform for host data about to be encoded. Text is
    /// parsed if it holds a number.
    #[must_use]
    pub fn reverse_value(&self, value: Value) -> Value {
        if self.multiply.is_none() && self.divide.is_none() {
            return value;
        }
        match value {
            Value::Array(values) => {
                Value::Array(values.into_iter().map(|v| self.reverse_value(v)).collect())
            }
            Value::Bool(b) => Value::Bool(b),
            v => match v.as_f64() {
                Some(f) => Value::Float(self.reverse(f)),
                None => v,
            },
        }
    }
}

fn round(value: f64, digits: u32) -> f64 {
    let factor = 10_f64.powi(digits.min(15) as i32);
    (value * factor).round() / factor
}
