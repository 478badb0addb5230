use std::sync::Arc;

/// Fixed-capacity bump arena for a single writer.
///
/// The submission thread stores values through `&mut self`; workers read them through the
/// `Arc` handles the pool hands out. `release_all` rewinds the cursor and the next frame
/// overwrites slot allocations in place once their readers are gone.
pub(crate) struct FixedPool<T> {
    slots: Vec<Arc<T>>,
    capacity: usize,
    next: usize,
    detached: u64,
}

impl<T> FixedPool<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            next: 0,
            detached: 0,
        }
    }

    /// Store `value` in the next unused slot and return a shared handle to it.
    ///
    /// Hands `value` back when every slot is taken.
    pub(crate) fn acquire(&mut self, value: T) -> Result<Arc<T>, T> {
        if self.next >= self.capacity {
            return Err(value);
        }
        let slot = self.next;
        self.next += 1;

        match self.slots.get_mut(slot) {
            None => self.slots.push(Arc::new(value)),
            Some(cell) => match Arc::get_mut(cell) {
                Some(stored) => *stored = value,
                None => {
                    // A reader from an earlier frame still holds this slot.
                    *cell = Arc::new(value);
                    self.detached += 1;
                }
            },
        }
        Ok(Arc::clone(&self.slots[slot]))
    }

    /// Rewind to empty. Outstanding handles stay valid; their slots are replaced on reuse.
    pub(crate) fn release_all(&mut self) {
        self.next = 0;
    }

    /// Slots taken since the last release; also the index of the next slot.
    pub(crate) fn len(&self) -> usize {
        self.next
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn is_exhausted(&self) -> bool {
        self.next >= self.capacity
    }

    /// Slots that had to be reallocated because a stale reader still held them.
    pub(crate) fn detached(&self) -> u64 {
        self.detached
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pool/fixed.rs"]
mod tests;
