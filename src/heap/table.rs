//! Separately chained hash tables, used for environment frames and table values

use crate::value::Value;

/// Represents the value at a certain location in a table.
///
/// A frozen binding refuses every later write through it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Binding {
    pub value: Value,
    pub is_frozen: bool,
}

impl Binding {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            is_frozen: false,
        }
    }

    pub fn frozen(value: Value) -> Self {
        Self {
            value,
            is_frozen: true,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub key: Value,
    pub hash: u64,
    pub binding: Binding,
}

#[derive(Debug, Default)]
pub struct Table {
    buckets: Vec<Vec<Entry>>,
    len: usize,
}

impl Table {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buckets: std::iter::repeat_with(Vec::new).take(capacity).collect(),
            len: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    /// Candidates that share a bucket with `hash`
    pub(crate) fn bucket(&self, hash: u64) -> &[Entry] {
        if self.buckets.is_empty() {
            &[]
        } else {
            &self.buckets[self.slot(hash)]
        }
    }

    pub(crate) fn bucket_mut(&mut self, hash: u64) -> &mut [Entry] {
        if self.buckets.is_empty() {
            &mut []
        } else {
            let slot = self.slot(hash);
            &mut self.buckets[slot]
        }
    }

    /// Adds an entry the caller knows is absent.
    ///
    /// Grows to `(len + 1) * 2` buckets once the entry count would pass the bucket count.
    pub(crate) fn insert_new(&mut self, key: Value, hash: u64, binding: Binding) {
        if self.len + 1 > self.buckets.len() {
            self.rehash((self.len + 1) * 2);
        }
        let slot = self.slot(hash);
        self.buckets[slot].push(Entry { key, hash, binding });
        self.len += 1;
    }

    fn slot(&self, hash: u64) -> usize {
        (hash % self.buckets.len() as u64) as usize
    }

    fn rehash(&mut self, capacity: usize) {
        let old = std::mem::replace(
            &mut self.buckets,
            std::iter::repeat_with(Vec::new).take(capacity).collect(),
        );
        for entry in old.into_iter().flatten() {
            let slot = self.slot(entry.hash);
            self.buckets[slot].push(entry);
        }
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.buckets.iter().flatten()
    }
}
