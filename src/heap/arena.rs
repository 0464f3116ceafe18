//! Slot storage for one kind of collectable object

enum Slot<T> {
    Live { marked: bool, value: T },
    Free { next: Option<u32> },
}

/// A vector of slots with a mark bit per live slot.
///
/// Freed slots are threaded into a chain through their own storage and are reused
/// before the vector grows.
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Option<u32>,
    live: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: None,
            live: 0,
        }
    }
}

impl<T> Arena<T> {
    pub fn alloc(&mut self, value: T) -> u32 {
        self.live += 1;
        let slot = Slot::Live {
            marked: false,
            value,
        };
        match self.free {
            Some(index) => {
                let cell = &mut self.slots[index as usize];
                let Slot::Free { next } = cell else {
                    unreachable!("free chain points at a live slot")
                };
                self.free = *next;
                *cell = slot;
                index
            }
            None => {
                let index = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
                self.slots.push(slot);
                index
            }
        }
    }

    pub fn get(&self, index: usize) -> &T {
        match &self.slots[index] {
            Slot::Live { value, .. } => value,
            Slot::Free { .. } => unreachable!("handle {index} outlived its collection"),
        }
    }

    pub fn get_mut(&mut self, index: usize) -> &mut T {
        match &mut self.slots[index] {
            Slot::Live { value, .. } => value,
            Slot::Free { .. } => unreachable!("handle {index} outlived its collection"),
        }
    }

    /// Sets the mark bit, returning whether it was already set
    pub fn mark(&mut self, index: usize) -> bool {
        match &mut self.slots[index] {
            Slot::Live { marked, .. } => std::mem::replace(marked, true),
            Slot::Free { .. } => true,
        }
    }

    /// Frees every unmarked slot and clears the marks of the rest.
    ///
    /// Returns the number of survivors.
    pub fn sweep(&mut self) -> usize {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            match slot {
                Slot::Live { marked, .. } if *marked => *marked = false,
                Slot::Live { .. } => {
                    *slot = Slot::Free { next: self.free };
                    self.free = Some(index as u32);
                    self.live -= 1;
                }
                Slot::Free { .. } => {}
            }
        }
        self.live
    }

    pub fn live(&self) -> usize {
        self.live
    }
}

#[cfg(test)]
mod tests {
    use assert2::check;

    use super::Arena;

    #[test]
    fn sweep_frees_unmarked_and_reuses_slots() {
        let mut arena = Arena::default();
        let a = arena.alloc("a");
        let b = arena.alloc("b");
        let c = arena.alloc("c");
        check!(arena.live() == 3);

        check!(!arena.mark(b as usize));
        check!(arena.mark(b as usize));
        check!(arena.sweep() == 1);
        check!(*arena.get(b as usize) == "b");

        // freed slots are handed out again before the arena grows
        let d = arena.alloc("d");
        let e = arena.alloc("e");
        check!([a, c].contains(&d));
        check!([a, c].contains(&e));
        check!(arena.alloc("f") == 3);

        // marks do not survive a sweep
        check!(arena.sweep() == 0);
        check!(arena.live() == 0);
    }
}
