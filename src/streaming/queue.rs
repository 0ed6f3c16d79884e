//! Bounded register write queue between control threads and the audio thread

use std::sync::Arc;

use crossbeam_queue::ArrayQueue;

use crate::backend::ChipBackend;
use crate::{Result, Ym2151Error};

/// A register write waiting to be applied by the audio thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingWrite {
    /// Register address
    pub address: u8,
    /// Register value
    pub value: u8,
}

/// Sending side, cheap to clone and share between control threads.
#[derive(Debug, Clone)]
pub struct RegisterQueue {
    queue: Arc<ArrayQueue<PendingWrite>>,
}

/// Receiving side, owned by the audio source.
#[derive(Debug)]
pub struct RegisterReceiver {
    queue: Arc<ArrayQueue<PendingWrite>>,
}

/// Create a connected queue pair holding at most `capacity` pending writes.
pub fn register_queue(capacity: usize) -> Result<(RegisterQueue, RegisterReceiver)> {
    if capacity == 0 {
        return Err(Ym2151Error::ConfigError(
            "register queue capacity must be greater than 0".into(),
        ));
    }
    let queue = Arc::new(ArrayQueue::new(capacity));
    Ok((
        RegisterQueue {
            queue: Arc::clone(&queue),
        },
        RegisterReceiver { queue },
    ))
}

impl RegisterQueue {
    /// Queue a register write. Never blocks; a full queue rejects the write.
    pub fn write(&self, address: u8, value: u8) -> Result<()> {
        self.queue
            .push(PendingWrite { address, value })
            .map_err(|rejected| {
                log::warn!(
                    "Register queue full, dropping write {:#04x} <- {:#04x}",
                    rejected.address,
                    rejected.value
                );
                Ym2151Error::QueueFull
            })
    }

    /// Queue several writes in order, stopping at the first rejected one.
    pub fn write_all(&self, writes: &[(u8, u8)]) -> Result<()> {
        writes
            .iter()
            .try_for_each(|&(address, value)| self.write(address, value))
    }

    /// Writes currently waiting
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// No writes waiting
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Maximum number of pending writes
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }
}

impl RegisterReceiver {
    /// Apply up to `max` pending writes to `chip` in arrival order. Returns the count.
    pub fn drain_into<C: ChipBackend>(&self, chip: &mut C, max: usize) -> usize {
        let mut applied = 0;
        while applied < max {
            let Some(write) = self.queue.pop() else {
                break;
            };
            chip.write_register(write.address, write.value);
            applied += 1;
        }
        applied
    }
}
