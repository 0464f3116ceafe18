//! Macro expansion
//!
//! Expansion walks a form top-down before it is evaluated. Only macros bound in the
//! global environment are recognized, and `quote` forms are left untouched.

use smallvec::SmallVec;

use crate::{error::Result, interpreter::Interpreter, value::Value};

impl Interpreter {
    /// Expands every macro call in `expr`, leaving the result on the root stack
    pub(crate) fn expand_macros(&mut self, expr: Value) -> Result<Value> {
        let saved = self.heap.frame();
        let result = self.expand(expr);
        self.settle(saved, result)
    }

    /// Expands `expr` and evaluates the result in the global environment
    pub(crate) fn expand_and_eval(&mut self, expr: Value) -> Result<Value> {
        let saved = self.heap.frame();
        let result = self
            .expand_macros(expr)
            .and_then(|expanded| self.evaluate(expanded, self.global));
        self.settle(saved, result)
    }

    fn expand(&mut self, mut expr: Value) -> Result<Value> {
        loop {
            let Some((head, args)) = self.heap.uncons(expr) else {
                return Ok(expr);
            };
            if !self.heap.is_list(expr) {
                return Ok(expr);
            }

            if let Value::Symbol(symbol) = head {
                if symbol == self.symbols.well_known.quote {
                    return Ok(expr);
                }
                let binding = self.heap.env_get(self.global, symbol)?;
                if let Some(Value::Macro(cell)) = binding.map(|binding| binding.value) {
                    tracing::trace!(name = self.symbols.resolve(symbol), "expanding macro");
                    let args = self.heap.list_items(args);
                    // No cycle detection: a macro that expands to itself never returns
                    expr = self.call_closure(cell, &args)?;
                    continue;
                }
            }

            let items = self.heap.list_items(expr);
            let mut expanded: SmallVec<[Value; 8]> = SmallVec::with_capacity(items.len());
            for item in items {
                expanded.push(self.expand_macros(item)?);
            }
            return Ok(self.heap.list(&expanded));
        }
    }
}
