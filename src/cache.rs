// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Register cache with a time-to-live and a least-recently-used bound.

use std::{
    collections::BTreeMap,
    time::{Duration, Instant},
};

use crate::{
    clock::Clock,
    codec::Words,
    frame::{RegisterAddress, RegisterKind},
    Result,
};

/// Default maximum number of cached registers.
pub const DEFAULT_CAPACITY: usize = 8192;

/// Default time-to-live of a cached read.
pub const DEFAULT_TTL: Duration = Duration::from_millis(500);

/// Identifies a physical register, shared by all ports addressing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    pub kind: RegisterKind,
    pub base: RegisterAddress,
}

impl CacheKey {
    #[must_use]
    pub const fn new(kind: RegisterKind, base: RegisterAddress) -> Self {
        Self { kind, base }
    }
}

#[derive(Debug)]
struct Entry {
    words: Words,
    stored_at: Instant,
    tick: u64,
}

/// Raw register words keyed by [`CacheKey`].
///
/// Entries are valid while `now - stored_at < ttl`. Beyond `capacity`
/// entries the least recently used one is evicted.
#[derive(Debug)]
pub struct RegisterCache {
    ttl: Duration,
    capacity: usize,
    entries: BTreeMap<CacheKey, Entry>,
    // Access order, oldest first.
    recency: BTreeMap<u64, CacheKey>,
    tick: u64,
}

impl Default for RegisterCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_CAPACITY)
    }
}

impl RegisterCache {
    /// A capacity of `0` is treated as `1`.
    #[must_use]
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity: capacity.max(1),
            entries: BTreeMap::new(),
            recency: BTreeMap::new(),
            tick: 0,
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    /// Looks up a valid entry and marks it as recently used.
    ///
    /// Expired entries are dropped, `None` means the caller has to read
    /// the register from the device.
    pub fn get(&mut self, key: CacheKey, now: Instant) -> Option<Words> {
        let ttl = self.ttl;
        let tick = self.next_tick();
        let entry = self.entries.get_mut(&key)?;
        if now.saturating_duration_since(entry.stored_at) >= ttl {
            let stale = entry.tick;
            self.entries.remove(&key);
            self.recency.remove(&stale);
            return None;
        }
        self.recency.remove(&entry.tick);
        entry.tick = tick;
        self.recency.insert(tick, key);
        Some(entry.words.clone())
    }

    /// Stores the words of a register read from or written to the device.
    pub fn put(&mut self, key: CacheKey, words: Words, now: Instant) {
        let tick = self.next_tick();
        let previous = self.entries.insert(
            key,
            Entry {
                words,
                stored_at: now,
                tick,
            },
        );
        if let Some(previous) = previous {
            self.recency.remove(&previous.tick);
        }
        self.recency.insert(tick, key);
        while self.entries.len() > self.capacity {
            let Some((&tick, &oldest)) = self.recency.iter().next() else {
                break;
            };
            self.recency.remove(&tick);
            log::debug!("Evicting {} {} from the register cache", oldest.kind, oldest.base);
            self.entries.remove(&oldest);
        }
    }

    /// Returns at least `count` words of a register, reading them with
    /// `fetch` on a miss and caching the result.
    ///
    /// Entries holding fewer words than requested count as a miss.
    pub fn get_or_fetch<F>(
        &mut self,
        key: CacheKey,
        count: usize,
        clock: &dyn Clock,
        fetch: F,
    ) -> Result<Words>
    where
        F: FnOnce() -> Result<Words>,
    {
        if let Some(words) = self.get(key, clock.now()).filter(|w| w.len() >= count) {
            log::debug!("Cache hit for {} {}", key.kind, key.base);
            return Ok(words);
        }
        log::debug!("Cache miss for {} {}", key.kind, key.base);
        let words = fetch()?;
        self.store(key, words.clone(), clock.now());
        Ok(words)
    }

    /// Stores the words of a register block and drops every other entry
    /// of the same kind overlapping `key.base .. key.base + words.len()`.
    pub fn store(&mut self, key: CacheKey, words: Words, now: Instant) {
        self.invalidate_range(key.kind, key.base, words.len());
        self.put(key, words, now);
    }

    /// Drops all entries of `kind` holding any register in
    /// `first .. first + count`.
    pub fn invalidate_range(&mut self, kind: RegisterKind, first: RegisterAddress, count: usize) {
        if count == 0 {
            return;
        }
        let start = u32::from(first);
        let end = start.saturating_add(u32::try_from(count).unwrap_or(u32::MAX));
        let last = RegisterAddress::try_from(end - 1).unwrap_or(RegisterAddress::MAX);
        let overlapping: Vec<_> = self
            .entries
            .range(CacheKey::new(kind, 0)..=CacheKey::new(kind, last))
            .filter(|(key, entry)| {
                let len = u32::try_from(entry.words.len()).unwrap_or(u32::MAX);
                u32::from(key.base).saturating_add(len) > start
            })
            .map(|(key, _)| *key)
            .collect();
        for key in overlapping {
            log::debug!("Dropping overlapping {} {} from the register cache", key.kind, key.base);
            self.invalidate(key);
        }
    }

    pub fn invalidate(&mut self, key: CacheKey) {
        if let Some(entry) = self.entries.remove(&key) {
            self.recency.remove(&entry.tick);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
    }
}
