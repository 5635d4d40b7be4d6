// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Register values pushed by the device
//!
//! Some devices report changes on their own, e.g. through a subscription.
//! The collaborator that receives them sends [`RegisterUpdate`]s through a
//! [`Feed`]; the driver folds them into its cache on the next access.
//! At most [`FEED_CAPACITY`] updates are queued between two accesses.

use tokio::sync::mpsc::{self, error::TrySendError};

use crate::{
    cache::{CacheKey, RegisterCache},
    clock::Clock,
    codec::Words,
    frame::{RegisterAddress, RegisterKind, Word},
};

/// Maximum number of pending updates.
pub const FEED_CAPACITY: usize = 1024;

/// The current words of a register as reported by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterUpdate {
    pub kind: RegisterKind,
    pub base: RegisterAddress,
    pub words: Vec<Word>,
}

/// Sending half of a driver's update channel.
#[derive(Debug, Clone)]
pub struct Feed {
    tx: mpsc::Sender<RegisterUpdate>,
}

impl Feed {
    /// Queues an update without blocking.
    ///
    /// Returns `false` if the driver has been dropped or if
    /// [`FEED_CAPACITY`] updates are already pending. A dropped update
    /// only costs a device read once the cached value expires.
    pub fn push(&self, update: RegisterUpdate) -> bool {
        match self.tx.try_send(update) {
            Ok(()) => true,
            Err(TrySendError::Full(update)) => {
                log::warn!(
                    "Feed is full, dropping update of {} {}",
                    update.kind,
                    update.base
                );
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

#[derive(Debug)]
pub(crate) struct FeedReceiver {
    tx: mpsc::Sender<RegisterUpdate>,
    rx: mpsc::Receiver<RegisterUpdate>,
}

impl FeedReceiver {
    pub(crate) fn new() -> Self {
        let (tx, rx) = mpsc::channel(FEED_CAPACITY);
        Self { tx, rx }
    }

    pub(crate) fn feed(&self) -> Feed {
        Feed {
            tx: self.tx.clone(),
        }
    }

    /// Moves all pending updates into the cache without blocking.
    pub(crate) fn drain_into(&mut self, cache: &mut RegisterCache, clock: &dyn Clock) {
        while let Ok(update) = self.rx.try_recv() {
            log::trace!("Feed update of {} {}: {:?}", update.kind, update.base, update.words);
            let key = CacheKey::new(update.kind, update.base);
            cache.store(key, Words::from_vec(update.words), clock.now());
        }
    }
}
