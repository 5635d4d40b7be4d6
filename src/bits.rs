// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Single bits within cached registers
//!
//! Several logical ports often map onto the bits of one physical register.
//! Writing a bit is a read-modify-write of the whole register. The caller
//! passes the cache by mutable reference, which it can only obtain by
//! holding the lock of the driver state for the whole cycle.

use crate::{
    cache::{CacheKey, RegisterCache},
    clock::Clock,
    codec::{bits_to_words, words_to_bits, WordOrder, Words},
    frame::Word,
    Result,
};

/// Location of a bit port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitAddress {
    pub key: CacheKey,
    /// Zero-based, counted from the least significant bit of the value.
    pub bit: u8,
    /// Width of the value in registers.
    pub words: usize,
    pub order: WordOrder,
}

impl BitAddress {
    fn mask(&self) -> u64 {
        1 << self.bit
    }
}

/// Extracts the bit from the words of a register value.
#[must_use]
pub fn bit_of(words: &[Word], addr: &BitAddress) -> bool {
    let count = addr.words.min(words.len());
    words_to_bits(&words[..count], addr.order) & addr.mask() != 0
}

/// Returns the register value with the bit set or cleared.
#[must_use]
pub fn with_bit(words: &[Word], addr: &BitAddress, value: bool) -> Words {
    let count = addr.words.min(words.len());
    let bits = words_to_bits(&words[..count], addr.order);
    let bits = if value {
        bits | addr.mask()
    } else {
        bits & !addr.mask()
    };
    bits_to_words(bits, count, addr.order)
}

/// Register access of an ongoing call.
pub trait RegisterIo {
    /// Reads `count` words (or bits, one per word) starting at the key.
    fn read(&mut self, key: CacheKey, count: usize) -> Result<Words>;

    /// Writes `words` starting at the key.
    fn write(&mut self, key: CacheKey, words: &[Word]) -> Result<()>;
}

/// Reads a bit through the cache, fetching the register on a miss.
pub fn read_bit<I>(
    cache: &mut RegisterCache,
    addr: &BitAddress,
    clock: &dyn Clock,
    io: &mut I,
) -> Result<bool>
where
    I: RegisterIo + ?Sized,
{
    let words = cache.get_or_fetch(addr.key, addr.words, clock, || io.read(addr.key, addr.words))?;
    Ok(bit_of(&words, addr))
}

/// Sets or clears a bit and writes the whole register back.
///
/// The cache is only updated after the write succeeded, a failed write
/// leaves the cached value as it was.
pub fn write_bit<I>(
    cache: &mut RegisterCache,
    addr: &BitAddress,
    value: bool,
    clock: &dyn Clock,
    io: &mut I,
) -> Result<Words>
where
    I: RegisterIo + ?Sized,
{
    let old = cache.get_or_fetch(addr.key, addr.words, clock, || io.read(addr.key, addr.words))?;
    let new = with_bit(&old, addr, value);
    log::debug!(
        "{} {}: {:04X?} -> {:04X?}",
        addr.key.kind,
        addr.key.base,
        &old[..new.len()],
        new
    );
    io.write(addr.key, &new)?;
    cache.store(addr.key, new.clone(), clock.now());
    Ok(new)
}

#[cfg(test)]
mod tests {
    use std::{io, time::Duration};

    use super::*;
    use crate::{clock::ManualClock, frame::RegisterKind, Error};

    #[derive(Debug, Default)]
    struct Device {
        words: Vec<Word>,
        reads: usize,
        writes: Vec<Vec<Word>>,
        broken: bool,
    }

    impl RegisterIo for Device {
        fn read(&mut self, _: CacheKey, count: usize) -> Result<Words> {
            self.reads += 1;
            Ok(Words::from_slice(&self.words[..count]))
        }

        fn write(&mut self, _: CacheKey, words: &[Word]) -> Result<()> {
            if self.broken {
                return Err(Error::Transport(io::Error::new(io::ErrorKind::BrokenPipe, "gone")));
            }
            self.writes.push(words.to_vec());
            self.words[..words.len()].copy_from_slice(words);
            Ok(())
        }
    }

    fn holding(bit: u8, words: usize) -> BitAddress {
        BitAddress {
            key: CacheKey::new(RegisterKind::Holding, 100),
            bit,
            words,
            order: WordOrder::MsbFirst,
        }
    }

    #[test]
    fn set_and_clear_never_toggle() {
        let addr = holding(3, 1);
        assert_eq!(&with_bit(&[0b0000], &addr, true)[..], &[0b1000]);
        assert_eq!(&with_bit(&[0b1000], &addr, true)[..], &[0b1000]);
        assert_eq!(&with_bit(&[0b1010], &addr, false)[..], &[0b0010]);
        assert_eq!(&with_bit(&[0b0010], &addr, false)[..], &[0b0010]);
    }

    #[test]
    fn bits_of_multi_word_values() {
        let addr = holding(16, 2);
        assert!(bit_of(&[0x0001, 0x0000], &addr));
        assert!(!bit_of(&[0x0000, 0xFFFF], &addr));
        assert_eq!(&with_bit(&[0, 0], &addr, true)[..], &[1, 0]);

        let swapped = BitAddress {
            order: WordOrder::LsbFirst,
            ..addr
        };
        assert!(bit_of(&[0x0000, 0x0001], &swapped));
        assert_eq!(&with_bit(&[0, 0], &swapped, true)[..], &[0, 1]);
    }

    #[test]
    fn read_modify_write_updates_cache() {
        let clock = ManualClock::new();
        let mut cache = RegisterCache::new(Duration::from_secs(1), 16);
        let mut device = Device {
            words: vec![0x8000],
            ..Default::default()
        };
        let new = write_bit(&mut cache, &holding(0, 1), true, &clock, &mut device).unwrap();
        assert_eq!(&new[..], &[0x8001]);
        assert_eq!(device.writes, [vec![0x8001]]);

        // The second bit sees the first one without reading the device.
        let new = write_bit(&mut cache, &holding(1, 1), true, &clock, &mut device).unwrap();
        assert_eq!(&new[..], &[0x8003]);
        assert!(read_bit(&mut cache, &holding(1, 1), &clock, &mut device).unwrap());
        assert_eq!(device.reads, 1);

        let new = write_bit(&mut cache, &holding(15, 1), false, &clock, &mut device).unwrap();
        assert_eq!(&new[..], &[0x0003]);
        assert_eq!(device.words, [0x0003]);
    }

    #[test]
    fn expired_registers_are_read_again() {
        let clock = ManualClock::new();
        let mut cache = RegisterCache::new(Duration::from_millis(500), 16);
        let mut device = Device {
            words: vec![0x0004],
            ..Default::default()
        };
        assert!(read_bit(&mut cache, &holding(2, 1), &clock, &mut device).unwrap());
        device.words[0] = 0;
        assert!(read_bit(&mut cache, &holding(2, 1), &clock, &mut device).unwrap());
        clock.advance(Duration::from_millis(500));
        assert!(!read_bit(&mut cache, &holding(2, 1), &clock, &mut device).unwrap());
        assert_eq!(device.reads, 2);
    }

    #[test]
    fn failed_write_keeps_cached_value() {
        let clock = ManualClock::new();
        let mut cache = RegisterCache::new(Duration::from_secs(1), 16);
        let addr = holding(2, 1);
        cache.put(addr.key, Words::from_slice(&[0x0001]), clock.now());
        let mut device = Device {
            words: vec![0x0001],
            broken: true,
            ..Default::default()
        };
        assert!(write_bit(&mut cache, &addr, true, &clock, &mut device).is_err());
        assert_eq!(
            cache.get(addr.key, clock.now()),
            Some(Words::from_slice(&[0x0001]))
        );
    }
}
