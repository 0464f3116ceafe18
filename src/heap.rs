//! Allocator arenas, the root stack, and the mark-and-sweep collector
//!
//! Every collectable object lives in one of four arenas and is addressed by a handle.
//! Nothing is reachable for the collector's purposes unless it can be traced from
//! the root stack, the pinned roots, the last top-level result, or the forms a front
//! end has read ahead. The evaluator keeps the root stack in step with its own call
//! lifetime: allocations push themselves, and every evaluation call truncates the
//! stack back to its entry length on return.

use smallvec::SmallVec;

use crate::{
    error::{ErrorKind, Result},
    value::{PairRef, StringRef, TableRef, Value, VectorRef},
};

pub mod arena;
pub mod table;

use arena::Arena;
pub use table::{Binding, Table};

/// Inline storage covers short vectors and argument lists
pub type Vector = SmallVec<[Value; 8]>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pair {
    pub car: Value,
    pub cdr: Value,
}

/// Live object counts per arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeapStats {
    pub pairs: usize,
    pub strings: usize,
    pub tables: usize,
    pub vectors: usize,
}

impl HeapStats {
    pub fn total(&self) -> usize {
        self.pairs + self.strings + self.tables + self.vectors
    }
}

// Hashing only looks at a bounded prefix of a structure, so cyclic keys still hash
const HASH_LIST_LIMIT: usize = 32;
const HASH_DEPTH_LIMIT: usize = 8;

pub struct Heap {
    pairs: Arena<Pair>,
    strings: Arena<String>,
    tables: Arena<Table>,
    vectors: Arena<Vector>,
    roots: Vec<Value>,
    pinned: Vec<Value>,
    result: Value,
    /// Forms a front end has read but not yet evaluated
    pending: Value,
    /// Live count recorded after the last collection
    baseline: usize,
    disabled: bool,
    collections: usize,
}

impl Heap {
    pub fn new(disabled: bool) -> Self {
        Self {
            pairs: Arena::default(),
            strings: Arena::default(),
            tables: Arena::default(),
            vectors: Arena::default(),
            roots: Vec::new(),
            pinned: Vec::new(),
            result: Value::Void,
            pending: Value::Nil,
            baseline: 0,
            disabled,
            collections: 0,
        }
    }

    // --- allocation ---

    pub fn cons(&mut self, car: Value, cdr: Value) -> Value {
        Value::Pair(self.cons_cell(car, cdr))
    }

    /// Allocates a cons cell without committing to its tag, for closures and macros
    pub fn cons_cell(&mut self, car: Value, cdr: Value) -> PairRef {
        let cell = PairRef(self.pairs.alloc(Pair { car, cdr }));
        self.root(Value::Pair(cell));
        cell
    }

    pub fn alloc_string(&mut self, string: impl Into<String>) -> Value {
        let string = Value::String(StringRef(self.strings.alloc(string.into())));
        self.root(string);
        string
    }

    pub fn alloc_table(&mut self, capacity: usize) -> Value {
        Value::Table(self.table_cell(capacity))
    }

    pub fn table_cell(&mut self, capacity: usize) -> TableRef {
        let table = TableRef(self.tables.alloc(Table::with_capacity(capacity)));
        self.root(Value::Table(table));
        table
    }

    pub fn alloc_vector(&mut self, items: Vector) -> Value {
        let vector = Value::Vector(VectorRef(self.vectors.alloc(items)));
        self.root(vector);
        vector
    }

    // --- access ---

    pub fn pair(&self, cell: PairRef) -> &Pair {
        self.pairs.get(cell.index())
    }

    pub fn pair_mut(&mut self, cell: PairRef) -> &mut Pair {
        self.pairs.get_mut(cell.index())
    }

    pub fn car(&self, cell: PairRef) -> Value {
        self.pair(cell).car
    }

    pub fn cdr(&self, cell: PairRef) -> Value {
        self.pair(cell).cdr
    }

    /// Splits a plain pair into its halves
    pub fn uncons(&self, value: Value) -> Option<(Value, Value)> {
        match value {
            Value::Pair(cell) => {
                let Pair { car, cdr } = *self.pair(cell);
                Some((car, cdr))
            }
            _ => None,
        }
    }

    pub fn string(&self, string: StringRef) -> &str {
        self.strings.get(string.index())
    }

    pub fn table(&self, table: TableRef) -> &Table {
        self.tables.get(table.index())
    }

    pub fn vector(&self, vector: VectorRef) -> &Vector {
        self.vectors.get(vector.index())
    }

    // --- lists ---

    /// Builds a proper list, or one ending in `tail`
    pub fn list_with_tail(&mut self, items: &[Value], tail: Value) -> Value {
        items
            .iter()
            .rev()
            .fold(tail, |rest, item| self.cons(*item, rest))
    }

    pub fn list(&mut self, items: &[Value]) -> Value {
        self.list_with_tail(items, Value::Nil)
    }

    /// Collects the cars of a list, ignoring an improper tail
    pub fn list_items(&self, mut list: Value) -> Vector {
        let mut items = Vector::new();
        while let Some((car, cdr)) = self.uncons(list) {
            items.push(car);
            list = cdr;
        }
        items
    }

    pub fn is_list(&self, mut value: Value) -> bool {
        loop {
            match value {
                v if v.is_nil() => return true,
                Value::Pair(cell) => value = self.cdr(cell),
                _ => return false,
            }
        }
    }

    /// Element count, with an improper tail counting as one more
    pub fn list_len(&self, mut value: Value) -> usize {
        let mut len = 0;
        loop {
            match value {
                v if v.is_nil() => return len,
                Value::Pair(cell) => {
                    len += 1;
                    value = self.cdr(cell);
                }
                _ => return len + 1,
            }
        }
    }

    /// Copies the spine of a list, sharing the elements
    pub fn copy_list(&mut self, list: Value) -> Value {
        let mut items = Vector::new();
        let mut rest = list;
        while let Some((car, cdr)) = self.uncons(rest) {
            items.push(car);
            rest = cdr;
        }
        self.list_with_tail(&items, rest)
    }

    pub fn nth(&self, list: Value, index: usize) -> Value {
        let mut rest = list;
        for _ in 0..index {
            match self.uncons(rest) {
                Some((_, cdr)) => rest = cdr,
                None => return Value::Nil,
            }
        }
        self.uncons(rest).map_or(Value::Nil, |(car, _)| car)
    }

    // --- tables ---

    pub fn hash(&self, value: Value) -> u64 {
        self.hash_bounded(value, 0)
    }

    fn hash_bounded(&self, value: Value, depth: usize) -> u64 {
        if depth > HASH_DEPTH_LIMIT {
            return 0;
        }
        match value {
            Value::Nil | Value::Void => 0,
            Value::Symbol(sym) => sym.id() as u64,
            Value::Number(x) => x as i64 as u64,
            Value::Bool(b) => u64::from(b) + 1,
            Value::Pair(_) => {
                let mut hash = 1u64;
                let mut rest = value;
                for _ in 0..HASH_LIST_LIMIT {
                    if rest.is_nil() {
                        break;
                    }
                    hash = hash.wrapping_mul(31);
                    match self.uncons(rest) {
                        Some((car, cdr)) => {
                            hash = hash.wrapping_add(self.hash_bounded(car, depth + 1));
                            rest = cdr;
                        }
                        None => {
                            hash = hash.wrapping_add(self.hash_bounded(rest, depth + 1));
                            break;
                        }
                    }
                }
                hash
            }
            Value::Closure(cell) | Value::Macro(cell) => {
                self.hash_bounded(self.cdr(cell), depth + 1)
            }
            Value::String(string) => self
                .string(string)
                .bytes()
                .fold(1u64, |hash, byte| hash.wrapping_mul(31).wrapping_add(byte.into())),
            Value::Vector(vector) => self
                .vector(vector)
                .iter()
                .take(HASH_LIST_LIMIT)
                .fold(1u64, |hash, item| {
                    hash.wrapping_mul(31)
                        .wrapping_add(self.hash_bounded(*item, depth + 1))
                }),
            Value::Builtin(builtin) => builtin
                .name
                .bytes()
                .fold(1u64, |hash, byte| hash.wrapping_mul(31).wrapping_add(byte.into())),
            Value::Table(table) => u64::from(table.0),
            Value::Input(port) | Value::Output(port) => u64::from(port.0),
            Value::Error(kind) => kind.message().len() as u64,
            Value::Type(ty) => ty as u64,
        }
    }

    pub fn table_get(&self, table: TableRef, key: Value) -> Option<Binding> {
        let hash = self.hash(key);
        self.table(table)
            .bucket(hash)
            .iter()
            .find(|entry| entry.hash == hash && self.eq_strict(entry.key, key))
            .map(|entry| entry.binding)
    }

    /// Replaces an existing binding in place.
    ///
    /// Returns `None` when `key` is absent, and NOMUT when the binding is frozen.
    pub fn table_replace(
        &mut self,
        table: TableRef,
        key: Value,
        binding: Binding,
    ) -> Option<Result<()>> {
        let hash = self.hash(key);
        let position = self
            .table(table)
            .bucket(hash)
            .iter()
            .position(|entry| entry.hash == hash && self.eq_strict(entry.key, key))?;
        let entry = &mut self.tables.get_mut(table.index()).bucket_mut(hash)[position];
        if entry.binding.is_frozen {
            Some(Err(ErrorKind::NoMut.into()))
        } else {
            entry.binding = binding;
            Some(Ok(()))
        }
    }

    /// Inserts or overwrites `key`, refusing to overwrite a frozen binding
    pub fn table_set(&mut self, table: TableRef, key: Value, binding: Binding) -> Result<()> {
        match self.table_replace(table, key, binding) {
            Some(result) => result,
            None => {
                let hash = self.hash(key);
                self.tables
                    .get_mut(table.index())
                    .insert_new(key, hash, binding);
                Ok(())
            }
        }
    }

    // --- roots ---

    /// Current length of the root stack, to hand back to [`Self::restore`]
    pub fn frame(&self) -> usize {
        self.roots.len()
    }

    pub fn root(&mut self, value: Value) {
        if value.is_collectable() {
            self.roots.push(value);
        }
    }

    /// Truncates the root stack to `saved` and gives the collector a chance to run
    pub fn restore(&mut self, saved: usize) {
        self.roots.truncate(saved);
        self.consider();
    }

    /// Like [`Self::restore`], keeping `value` rooted in the caller's frame
    pub fn restore_with(&mut self, saved: usize, value: Value) {
        self.restore_keeping(saved, &[value]);
    }

    /// Like [`Self::restore`], re-rooting every one of `values` before collecting
    pub fn restore_keeping(&mut self, saved: usize, values: &[Value]) {
        self.roots.truncate(saved);
        for value in values {
            self.root(*value);
        }
        self.consider();
    }

    /// Roots `value` for the lifetime of the heap
    pub fn pin(&mut self, value: Value) {
        if value.is_collectable() {
            self.pinned.push(value);
        }
    }

    /// Keeps the latest top-level result alive until the next one replaces it
    pub fn set_result(&mut self, value: Value) {
        self.result = value;
    }

    /// Keeps freshly read top-level forms alive until the next read replaces them
    pub fn set_pending(&mut self, forms: Value) {
        self.pending = forms;
    }

    // --- collection ---

    pub fn stats(&self) -> HeapStats {
        HeapStats {
            pairs: self.pairs.live(),
            strings: self.strings.live(),
            tables: self.tables.live(),
            vectors: self.vectors.live(),
        }
    }

    pub fn collections(&self) -> usize {
        self.collections
    }

    fn consider(&mut self) {
        if !self.disabled && self.stats().total() > 2 * self.baseline {
            self.collect();
        }
    }

    pub fn collect(&mut self) {
        let before = self.stats().total();
        let mut worklist: Vec<Value> = self
            .roots
            .iter()
            .chain(self.pinned.iter())
            .copied()
            .chain([self.result, self.pending])
            .collect();

        while let Some(value) = worklist.pop() {
            match value {
                Value::Pair(cell) | Value::Closure(cell) | Value::Macro(cell) => {
                    if !self.pairs.mark(cell.index()) {
                        let Pair { car, cdr } = *self.pairs.get(cell.index());
                        worklist.push(car);
                        worklist.push(cdr);
                    }
                }
                Value::String(string) => {
                    self.strings.mark(string.index());
                }
                Value::Table(table) => {
                    if !self.tables.mark(table.index()) {
                        worklist.extend(
                            self.tables
                                .get(table.index())
                                .entries()
                                .flat_map(|entry| [entry.key, entry.binding.value]),
                        );
                    }
                }
                Value::Vector(vector) => {
                    if !self.vectors.mark(vector.index()) {
                        worklist.extend(self.vectors.get(vector.index()).iter().copied());
                    }
                }
                _ => {}
            }
        }

        self.baseline =
            self.pairs.sweep() + self.strings.sweep() + self.tables.sweep() + self.vectors.sweep();
        self.collections += 1;
        tracing::debug!(
            freed = before - self.baseline,
            live = self.baseline,
            roots = self.roots.len(),
            "collected garbage"
        );
    }
}
