//! Textual rendering of values

use core::fmt;

use crate::{
    heap::Heap,
    interpreter::Interpreter,
    symbol::Symbols,
    value::{PairRef, Value},
};

/// Shortest text that reads back as the same number; integral values carry no fraction
pub fn format_number(x: f64) -> String {
    if x.is_finite() && x == x.trunc() && x.abs() < 1e16 {
        format!("{}", x as i64)
    } else {
        format!("{x}")
    }
}

/// A value borrowed for display.
///
/// In write mode strings are quoted and escaped so the text reads back as the same value.
pub struct Printed<'a> {
    heap: &'a Heap,
    symbols: &'a Symbols,
    value: Value,
    write: bool,
}

impl Interpreter {
    pub fn printed(&self, value: Value, write: bool) -> Printed<'_> {
        Printed {
            heap: &self.heap,
            symbols: &self.symbols,
            value,
            write,
        }
    }

    /// Display form: strings print raw
    pub fn display(&self, value: Value) -> String {
        self.printed(value, false).to_string()
    }

    /// Write form: strings print quoted
    pub fn write(&self, value: Value) -> String {
        self.printed(value, true).to_string()
    }
}

impl Printed<'_> {
    fn value(&self, f: &mut fmt::Formatter<'_>, value: Value) -> fmt::Result {
        match value {
            Value::Nil => f.write_str("nil"),
            Value::Void => f.write_str("_"),
            Value::Number(x) => f.write_str(&format_number(x)),
            Value::Symbol(sym) => f.write_str(self.symbols.resolve(sym)),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Type(ty) => write!(f, "{ty}"),
            Value::Builtin(builtin) => write!(f, "#<builtin {}>", builtin.name),
            Value::Input(_) => f.write_str("#<input port>"),
            Value::Output(_) => f.write_str("#<output port>"),
            Value::Table(table) => write!(f, "#<table {}>", self.heap.table(table).len()),
            Value::Error(kind) => write!(f, "#<error {kind}>"),
            Value::String(string) if self.write => {
                f.write_str("\"")?;
                for c in self.heap.string(string).chars() {
                    match c {
                        '"' => f.write_str("\\\"")?,
                        '\\' => f.write_str("\\\\")?,
                        '\n' => f.write_str("\\n")?,
                        '\t' => f.write_str("\\t")?,
                        '\r' => f.write_str("\\r")?,
                        c => write!(f, "{c}")?,
                    }
                }
                f.write_str("\"")
            }
            Value::String(string) => f.write_str(self.heap.string(string)),
            Value::Vector(vector) => {
                f.write_str("[")?;
                for (i, item) in self.heap.vector(vector).iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    self.value(f, *item)?;
                }
                f.write_str("]")
            }
            Value::Closure(cell) => {
                f.write_str("(lambda")?;
                self.tail(f, self.heap.cdr(cell))
            }
            Value::Macro(cell) => {
                f.write_str("(macro")?;
                self.tail(f, self.heap.cdr(cell))
            }
            Value::Pair(cell) => {
                if let Some(prefix) = self.shorthand(cell) {
                    f.write_str(prefix)?;
                    return self.value(f, self.heap.nth(value, 1));
                }
                f.write_str("(")?;
                self.value(f, self.heap.car(cell))?;
                self.tail(f, self.heap.cdr(cell))
            }
        }
    }

    /// Remaining list items, each after a space, then the closing paren
    fn tail(&self, f: &mut fmt::Formatter<'_>, mut rest: Value) -> fmt::Result {
        loop {
            match rest {
                Value::Pair(cell) => {
                    f.write_str(" ")?;
                    self.value(f, self.heap.car(cell))?;
                    rest = self.heap.cdr(cell);
                }
                v if v.is_nil() => break,
                tail => {
                    f.write_str(" . ")?;
                    self.value(f, tail)?;
                    break;
                }
            }
        }
        f.write_str(")")
    }

    /// `'x` and friends, for two element lists headed by a quoting symbol
    fn shorthand(&self, cell: PairRef) -> Option<&'static str> {
        let wk = &self.symbols.well_known;
        let head = self.heap.car(cell).as_symbol()?;
        let (_, rest) = self.heap.uncons(self.heap.cdr(cell))?;
        if !rest.is_nil() {
            return None;
        }
        match head {
            h if h == wk.quote => Some("'"),
            h if h == wk.quasiquote => Some("`"),
            h if h == wk.unquote => Some(","),
            h if h == wk.unquote_splicing => Some(",@"),
            _ => None,
        }
    }
}

impl fmt::Display for Printed<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value(f, self.value)
    }
}

#[cfg(test)]
mod tests {
    use assert2::check;

    use super::format_number;
    use crate::{
        interpreter::{Config, Interpreter},
        value::{Type, Value},
    };

    #[test]
    fn numbers() {
        check!(format_number(3.0) == "3");
        check!(format_number(-0.5) == "-0.5");
        check!(format_number(1e20) == "100000000000000000000");
        check!(format_number(f64::INFINITY) == "inf");
    }

    #[test]
    fn lists_and_shorthand() {
        let mut um = Interpreter::new(Config::default());
        let quote = Value::Symbol(um.symbols.well_known.quote);
        let x = Value::Symbol(um.symbols.intern("x"));
        let quoted = um.heap.list(&[quote, x]);
        check!(um.display(quoted) == "'x");

        let dotted = um.heap.list_with_tail(&[Value::Number(1.0)], Value::Number(2.0));
        check!(um.display(dotted) == "(1 . 2)");

        let text = um.heap.alloc_string("a \"b\"\n");
        let nested = um.heap.list(&[quoted, text, Value::Nil]);
        check!(um.display(nested) == "('x a \"b\"\n nil)");
        check!(um.write(nested) == r#"('x "a \"b\"\n" nil)"#);

        check!(um.display(Value::Bool(true)) == "True");
        check!(um.display(Value::Type(Type::Closure)) == "@Closure");
    }
}
