//! Equality predicates and the explicit cast matrix

use crate::{
    error::{Error, ErrorKind, Result},
    heap::{Heap, Vector},
    interpreter::Interpreter,
    value::{print::format_number, Type, Value},
};

impl Heap {
    /// Equality without coercion: types must agree, symbols compare by identity,
    /// strings by content, and cons-shaped values structurally.
    pub fn eq_strict(&self, a: Value, b: Value) -> bool {
        if a.type_of() != b.type_of() {
            return false;
        }
        match (a, b) {
            (Value::Nil | Value::Void, _) => true,
            (Value::Number(x), Value::Number(y)) => x == y,
            (Value::Symbol(x), Value::Symbol(y)) => x == y,
            (Value::Bool(x), Value::Bool(y)) => x == y,
            (Value::Builtin(x), Value::Builtin(y)) => x == y,
            (Value::Type(x), Value::Type(y)) => x == y,
            (Value::Error(x), Value::Error(y)) => x == y,
            (Value::Input(x), Value::Input(y)) | (Value::Output(x), Value::Output(y)) => x == y,
            (Value::Table(x), Value::Table(y)) => x == y,
            (Value::String(x), Value::String(y)) => x == y || self.string(x) == self.string(y),
            (Value::Vector(x), Value::Vector(y)) => {
                x == y || {
                    let (xs, ys) = (self.vector(x), self.vector(y));
                    xs.len() == ys.len()
                        && xs.iter().zip(ys.iter()).all(|(l, r)| self.eq_strict(*l, *r))
                }
            }
            (Value::Pair(x), Value::Pair(y))
            | (Value::Closure(x), Value::Closure(y))
            | (Value::Macro(x), Value::Macro(y)) => self.eq_cells(x, y),
            _ => false,
        }
    }

    // cars recurse, cdrs iterate
    fn eq_cells(&self, mut x: crate::value::PairRef, mut y: crate::value::PairRef) -> bool {
        loop {
            if x == y {
                return true;
            }
            let (l, r) = (*self.pair(x), *self.pair(y));
            if !self.eq_strict(l.car, r.car) {
                return false;
            }
            match (l.cdr, r.cdr) {
                (Value::Pair(next_x), Value::Pair(next_y)) => {
                    x = next_x;
                    y = next_y;
                }
                (l, r) => return self.eq_strict(l, r),
            }
        }
    }
}

/// Longest numeric prefix, zero when there is none
pub(crate) fn parse_number_prefix(text: &str) -> f64 {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let digits = |from: usize| bytes[from..].iter().take_while(|b| b.is_ascii_digit()).count();

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    for word in ["infinity", "inf", "nan"] {
        let candidate = text[end..].get(..word.len());
        if candidate.is_some_and(|candidate| candidate.eq_ignore_ascii_case(word)) {
            return text[..end + word.len()].parse().unwrap_or(0.0);
        }
    }

    let whole = digits(end);
    end += whole;
    let mut mantissa = whole;
    if bytes.get(end) == Some(&b'.') {
        let fraction = digits(end + 1);
        if whole + fraction > 0 {
            end += 1 + fraction;
            mantissa += fraction;
        }
    }
    if mantissa == 0 {
        return 0.0;
    }
    // an exponent only counts with digits after it
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let sign = usize::from(matches!(bytes.get(end + 1), Some(b'+' | b'-')));
        let exponent = digits(end + 1 + sign);
        if exponent > 0 {
            end += 1 + sign + exponent;
        }
    }
    text[..end].parse().unwrap_or(0.0)
}

impl Interpreter {
    /// The boolean a value stands for when used as a condition
    pub fn truthy(&self, value: Value) -> bool {
        match value {
            Value::Nil | Value::Void => false,
            Value::Bool(b) => b,
            Value::Number(x) => x > 0.0 && x.is_normal(),
            Value::Symbol(sym) => sym != self.symbols.well_known.nil,
            Value::String(string) => !matches!(self.heap.string(string), "nil" | "false"),
            Value::Type(ty) => ty != Type::Nil,
            _ => true,
        }
    }

    /// Converts `value` to `target`, failing with COERCION_FAIL where no conversion exists
    pub fn cast(&mut self, value: Value, target: Type) -> Result<Value> {
        if value.type_of() == target {
            return Ok(value);
        }
        let converted = match (value, target) {
            (_, Type::Nil) => Value::Nil,
            (_, Type::Type) => Value::Type(value.type_of()),
            (_, Type::Bool) => Value::Bool(self.truthy(value)),

            (Value::Nil | Value::Void, Type::Number) => Value::Number(f64::NAN),
            (Value::Nil | Value::Void, Type::Symbol) => {
                Value::Symbol(self.symbols.well_known.nil)
            }
            (Value::Nil | Value::Void, Type::Vector) => self.heap.alloc_vector(Vector::new()),

            (Value::Number(x), Type::Symbol) => Value::Symbol(self.symbols.intern(format_number(x))),
            (Value::Number(x), Type::String) => self.heap.alloc_string(format_number(x)),

            (Value::Symbol(sym), Type::Number) => {
                Value::Number(parse_number_prefix(self.symbols.resolve(sym)))
            }
            (Value::Symbol(sym), Type::String) => {
                let name = self.symbols.resolve(sym).to_owned();
                self.heap.alloc_string(name)
            }

            (Value::String(string), Type::Number) => {
                Value::Number(parse_number_prefix(self.heap.string(string)))
            }
            (Value::String(string), Type::Symbol) => {
                let name = self.heap.string(string).to_owned();
                Value::Symbol(self.symbols.intern(name))
            }

            (Value::Bool(b), Type::Number) => Value::Number(if b { 1.0 } else { 0.0 }),
            (Value::Bool(b), Type::Symbol) => {
                Value::Symbol(self.symbols.intern(if b { "true" } else { "false" }))
            }
            (Value::Bool(b), Type::String) => {
                self.heap.alloc_string(if b { "true" } else { "false" })
            }

            (Value::Type(ty), Type::Symbol) => Value::Symbol(self.symbols.intern(ty.to_string())),
            (Value::Type(ty), Type::String) => self.heap.alloc_string(ty.to_string()),

            (Value::Pair(_), Type::Vector) if self.heap.is_list(value) => {
                let items = self.heap.list_items(value);
                self.heap.alloc_vector(items)
            }
            (Value::Vector(vector), Type::Pair) => {
                let items = self.heap.vector(vector).clone();
                self.heap.list(&items)
            }

            (
                Value::Nil
                | Value::Void
                | Value::Number(_)
                | Value::Symbol(_)
                | Value::String(_)
                | Value::Bool(_)
                | Value::Type(_),
                Type::Pair,
            ) => self.heap.cons(value, Value::Nil),

            (_, Type::String) => {
                let text = self.display(value);
                self.heap.alloc_string(text)
            }

            _ => {
                return Err(Error::with_message(
                    ErrorKind::CoercionFail,
                    format!("cannot cast {} to {target}", value.type_of()),
                ))
            }
        };
        Ok(converted)
    }

    /// Equality after casting `b` to the type of `a`. A failed cast compares unequal.
    pub fn eq_coerce(&mut self, a: Value, b: Value) -> bool {
        if a.type_of() == b.type_of() {
            return self.heap.eq_strict(a, b);
        }
        match self.cast(b, a.type_of()) {
            Ok(b) => self.heap.eq_strict(a, b),
            Err(_) => false,
        }
    }
}
