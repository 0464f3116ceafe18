use crate::{
    error::{Error, ErrorKind, Result},
    interpreter::Interpreter,
    value::{PairRef, Value},
};

impl Interpreter {
    /// Calls `operator` with already evaluated arguments.
    ///
    /// Besides functions, strings, lists and vectors can be indexed by a number and
    /// tables by a key, with nil for anything out of range.
    pub(crate) fn invoke(&mut self, operator: Value, args: &[Value]) -> Result<Value> {
        match operator {
            Value::Builtin(builtin) => builtin.call(self, args),
            Value::Closure(cell) => self.call_closure(cell, args),
            Value::String(string) => {
                let index = index_arg(args)?;
                let c = index.and_then(|i| self.heap.string(string).chars().nth(i));
                Ok(match c {
                    Some(c) => self.heap.alloc_string(c.to_string()),
                    None => Value::Nil,
                })
            }
            Value::Pair(_) if self.heap.is_list(operator) => {
                let index = index_arg(args)?;
                Ok(index.map_or(Value::Nil, |i| self.heap.nth(operator, i)))
            }
            Value::Vector(vector) => {
                let index = index_arg(args)?;
                let item = index.and_then(|i| self.heap.vector(vector).get(i).copied());
                Ok(item.unwrap_or(Value::Nil))
            }
            Value::Table(table) => {
                let (key, default) = match args {
                    [key] => (*key, Value::Nil),
                    [key, default] => (*key, *default),
                    _ => {
                        return Err(Error::with_message(
                            ErrorKind::Args,
                            "a table takes a key and an optional default",
                        ))
                    }
                };
                Ok(self
                    .heap
                    .table_get(table, key)
                    .map_or(default, |binding| binding.value))
            }
            other => Err(Error::with_message(
                ErrorKind::Type,
                format!("cannot apply {}", other.type_of()),
            )),
        }
    }

    /// Runs a closure's body to completion, on behalf of a caller outside the evaluator loop
    pub(crate) fn call_closure(&mut self, cell: PairRef, args: &[Value]) -> Result<Value> {
        let saved = self.heap.frame();
        let result = self
            .enter_closure(cell, args)
            .and_then(|(body, env)| self.evaluate(body, env));
        self.settle(saved, result)
    }
}

/// The single numeric index of an indexing call, `None` when it cannot be in range
fn index_arg(args: &[Value]) -> Result<Option<usize>> {
    match args {
        [Value::Number(x)] => Ok((x.is_finite() && *x >= 0.0).then_some(*x as usize)),
        [other] => Err(Error::with_message(
            ErrorKind::Type,
            format!("an index must be a number, not {}", other.type_of()),
        )),
        _ => Err(Error::with_message(
            ErrorKind::Args,
            "indexing takes exactly one argument",
        )),
    }
}
