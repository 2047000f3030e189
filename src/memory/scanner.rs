// Tue Feb 3 2026 - Alex

use crate::memory::{Address, HostStore, MemoryError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// How often scan loops poll the cancel token, in bytes scanned.
const CANCEL_CHECK_INTERVAL: u64 = 0x1000;

/// Cooperative cancellation handle for long scans. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    pub fn checkpoint(&self) -> Result<(), MemoryError> {
        if self.is_cancelled() {
            Err(MemoryError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Scans the readable ranges of a store for raw byte patterns. Used to find
/// type-name strings and the pointers that reference them.
pub struct StoreScanner<'a> {
    store: &'a dyn HostStore,
}

impl<'a> StoreScanner<'a> {
    pub fn new(store: &'a dyn HostStore) -> Self {
        Self { store }
    }

    /// Finds every occurrence of a NUL-terminated string in readable memory.
    pub fn find_string(
        &self,
        needle: &str,
        token: &CancelToken,
    ) -> Result<Vec<Address>, MemoryError> {
        let mut pattern = needle.as_bytes().to_vec();
        pattern.push(0);
        self.find_bytes(&pattern, 1, token)
    }

    /// Finds every pointer-aligned direct reference to the target address.
    pub fn find_references(
        &self,
        target: Address,
        token: &CancelToken,
    ) -> Result<Vec<Address>, MemoryError> {
        let pointer_size = self.store.pointer_size();
        let pattern = match pointer_size {
            4 => (target.as_u64() as u32).to_le_bytes().to_vec(),
            _ => target.as_u64().to_le_bytes().to_vec(),
        };
        self.find_bytes(&pattern, pointer_size, token)
    }

    fn find_bytes(
        &self,
        pattern: &[u8],
        alignment: usize,
        token: &CancelToken,
    ) -> Result<Vec<Address>, MemoryError> {
        let mut hits = Vec::new();
        for (start, len) in self.store.readable_ranges() {
            if (len as usize) < pattern.len() {
                continue;
            }
            let data = self.store.read_bytes(start, len as usize)?;
            let mut next_check = CANCEL_CHECK_INTERVAL;
            for off in (0..=data.len() - pattern.len()).step_by(alignment) {
                if off as u64 >= next_check {
                    token.checkpoint()?;
                    next_check += CANCEL_CHECK_INTERVAL;
                }
                if data[off..off + pattern.len()] == *pattern {
                    hits.push(start + off as u64);
                }
            }
        }
        Ok(hits)
    }
}
