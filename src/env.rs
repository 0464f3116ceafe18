//! Lexical environments
//!
//! An environment is the pair `(parent . frame)`, where `frame` is a table from
//! symbols to bindings and `parent` is another environment or nil.

use crate::{
    error::{Error, ErrorKind, Result},
    heap::{Binding, Heap},
    symbol::Symbol,
    value::{TableRef, Value},
};

impl Heap {
    pub fn env_create(&mut self, parent: Value, capacity: usize) -> Value {
        let frame = self.alloc_table(capacity);
        self.cons(parent, frame)
    }

    fn env_frame(&self, env: Value) -> Result<(Value, TableRef)> {
        match self.uncons(env) {
            Some((parent, Value::Table(frame))) => Ok((parent, frame)),
            _ => Err(Error::with_message(ErrorKind::Type, "not an environment")),
        }
    }

    /// The nearest binding of `symbol`, searching outward through the parents
    pub fn env_get(&self, mut env: Value, symbol: Symbol) -> Result<Option<Binding>> {
        loop {
            let (parent, frame) = self.env_frame(env)?;
            if let Some(binding) = self.table_get(frame, Value::Symbol(symbol)) {
                return Ok(Some(binding));
            }
            if parent.is_nil() {
                return Ok(None);
            }
            env = parent;
        }
    }

    /// Binds `symbol` in the innermost frame of `env` only
    pub fn env_assign(&mut self, env: Value, symbol: Symbol, binding: Binding) -> Result<()> {
        let (_, frame) = self.env_frame(env)?;
        self.table_set(frame, Value::Symbol(symbol), binding)
    }

    /// Overwrites the nearest existing binding of `symbol`.
    ///
    /// When no frame binds it, the binding is created in the frame of `env` itself.
    pub fn env_assign_eq(&mut self, env: Value, symbol: Symbol, binding: Binding) -> Result<()> {
        let mut current = env;
        loop {
            let (parent, frame) = self.env_frame(current)?;
            if let Some(result) = self.table_replace(frame, Value::Symbol(symbol), binding) {
                return result;
            }
            if parent.is_nil() {
                return self.env_assign(env, symbol, binding);
            }
            current = parent;
        }
    }
}

#[cfg(test)]
mod tests {
    use assert2::{check, let_assert};

    use crate::{
        error::ErrorKind,
        heap::{Binding, Heap},
        symbol::Symbols,
        value::Value,
    };

    #[test]
    fn child_frames_shadow_and_assign_eq_reaches_ancestors() {
        let mut heap = Heap::new(true);
        let mut symbols = Symbols::default();
        let x = symbols.intern("x");
        let y = symbols.intern("y");

        let global = heap.env_create(Value::Nil, 8);
        let child = heap.env_create(global, 2);
        check!(heap.env_assign(global, x, Binding::new(Value::Number(1.0))).is_ok());

        // shadowing leaves the parent alone
        check!(heap.env_assign(child, x, Binding::new(Value::Number(2.0))).is_ok());
        check!(heap.env_get(child, x) == Ok(Some(Binding::new(Value::Number(2.0)))));
        check!(heap.env_get(global, x) == Ok(Some(Binding::new(Value::Number(1.0)))));

        // assign_eq mutates the nearest frame that already binds the name
        let grandchild = heap.env_create(child, 2);
        check!(heap.env_assign_eq(grandchild, x, Binding::new(Value::Number(3.0))).is_ok());
        check!(heap.env_get(child, x) == Ok(Some(Binding::new(Value::Number(3.0)))));
        check!(heap.env_get(global, x) == Ok(Some(Binding::new(Value::Number(1.0)))));

        // and falls back to the starting frame for unbound names
        check!(heap.env_assign_eq(grandchild, y, Binding::new(Value::Bool(true))).is_ok());
        check!(heap.env_get(grandchild, y) == Ok(Some(Binding::new(Value::Bool(true)))));
        check!(heap.env_get(child, y) == Ok(None));
    }

    #[test]
    fn frozen_bindings_stop_assign_eq() {
        let mut heap = Heap::new(true);
        let mut symbols = Symbols::default();
        let pi = symbols.intern("pi");
        let global = heap.env_create(Value::Nil, 8);
        let child = heap.env_create(global, 2);
        check!(heap.env_assign(global, pi, Binding::frozen(Value::Number(2.5))).is_ok());
        let_assert!(Err(err) = heap.env_assign_eq(child, pi, Binding::new(Value::Nil)));
        check!(err.kind == ErrorKind::NoMut);
    }

    #[test]
    fn non_environments_are_rejected() {
        let heap = Heap::new(true);
        let mut symbols = Symbols::default();
        let_assert!(Err(err) = heap.env_get(Value::Number(1.0), symbols.intern("x")));
        check!(err.kind == ErrorKind::Type);
    }
}
