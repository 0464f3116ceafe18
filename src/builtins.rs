//! Native functions and the prelude
//!
//! Builtins receive their arguments already evaluated, after the arity check.

use core::fmt;

use crate::{
    error::{Error, ErrorKind, Result},
    heap::{Binding, Vector},
    interpreter::Interpreter,
    value::{port::Ports, PortRef, Type, Value},
};

mod math;

/// Library functions written in the language itself, run once at startup
pub const PRELUDE: &str = include_str!("builtins/prelude.um");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    Min(usize),
    /// Inclusive on both ends
    Range(usize, usize),
}

impl Arity {
    pub fn is_satisfied(&self, len: usize) -> bool {
        match self {
            Self::Exact(e) => *e == len,
            Self::Min(m) => *m <= len,
            Self::Range(lo, hi) => (*lo..=*hi).contains(&len),
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(1) => write!(f, "1 argument"),
            Self::Exact(e) => write!(f, "{e} arguments"),
            Self::Min(m) => write!(f, "at least {m}"),
            Self::Range(lo, hi) => write!(f, "{lo} to {hi} arguments"),
        }
    }
}

pub type NativeFn = fn(&mut Interpreter, &[Value]) -> Result<Value>;

pub struct Builtin {
    pub name: &'static str,
    pub arity: Arity,
    func: NativeFn,
}

impl Builtin {
    pub fn call(&self, um: &mut Interpreter, args: &[Value]) -> Result<Value> {
        if !self.arity.is_satisfied(args.len()) {
            return Err(Error::with_message(
                ErrorKind::Args,
                format!("{}: expected {}, got {}", self.name, self.arity, args.len()),
            ));
        }
        (self.func)(um, args)
    }
}

// Builtins are unique statics, so identity is equality
impl PartialEq for Builtin {
    fn eq(&self, other: &Self) -> bool {
        core::ptr::eq(self, other)
    }
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<builtin {}>", self.name)
    }
}

macro_rules! builtins {
    ($($name:literal => $func:path, $arity:expr;)*) => {
        /// Every builtin, bound under its name in the global environment
        pub static BUILTINS: &[Builtin] = &[
            $(Builtin { name: $name, arity: $arity, func: $func },)*
        ];
    };
}

builtins! {
    "car" => car, Arity::Exact(1);
    "cdr" => cdr, Arity::Exact(1);
    "cons" => cons, Arity::Exact(2);
    "+" => math::add, Arity::Range(1, 2);
    "-" => math::subtract, Arity::Range(1, 2);
    "*" => math::multiply, Arity::Exact(2);
    "/" => math::divide, Arity::Exact(2);
    "%" => math::modulo, Arity::Exact(2);
    ">" => math::greater, Arity::Exact(2);
    "<" => math::less, Arity::Exact(2);
    "=" => eq_strict, Arity::Min(0);
    "eq?" => eq_strict, Arity::Min(0);
    "eqv?" => eq_coerce, Arity::Min(0);
    "not" => not, Arity::Exact(1);
    "and" => and, Arity::Exact(2);
    "pair?" => is_pair, Arity::Exact(1);
    "len" => len, Arity::Exact(1);
    "eval" => eval, Arity::Exact(1);
    "macex" => macex, Arity::Exact(1);
    "apply" => apply, Arity::Exact(2);
    "type" => type_of, Arity::Exact(1);
    "cast" => cast, Arity::Exact(2);
    "coerce" => cast, Arity::Exact(2);
    "float" => math::float, Arity::Exact(1);
    "int" => math::int, Arity::Exact(1);
    "exit" => exit, Arity::Exact(1);
    "str" => string, Arity::Min(0);
    "print" => print, Arity::Min(0);
    "range" => math::range, Arity::Range(1, 2);
    "getlist" => getlist, Arity::Exact(2);
    "setlist" => setlist, Arity::Exact(3);
    "vec" => vec, Arity::Exact(1);
    "error" => error, Arity::Min(0);
    "table" => table, Arity::Min(0);
    "table-set" => table_set, Arity::Exact(3);
    "write" => write, Arity::Exact(2);
    "read-line" => read_line, Arity::Range(0, 1);
    "load" => load, Arity::Exact(1);
    "__builtin_vector" => vector, Arity::Min(0);
    "__builtin_pow" => math::pow, Arity::Exact(2);
    "__builtin_cbrt" => math::cbrt, Arity::Exact(1);
    "__builtin_sin" => math::sin, Arity::Exact(1);
    "__builtin_cos" => math::cos, Arity::Exact(1);
    "__builtin_tan" => math::tan, Arity::Exact(1);
    "__builtin_asin" => math::asin, Arity::Exact(1);
    "__builtin_acos" => math::acos, Arity::Exact(1);
    "__builtin_atan" => math::atan, Arity::Exact(1);
    "__builtin_ceil" => math::ceil, Arity::Exact(1);
    "__builtin_floor" => math::floor, Arity::Exact(1);
    "__builtin_format_hex" => math::format_hex, Arity::Exact(1);
    "__builtin_format_precision" => math::format_precision, Arity::Exact(2);
    "__builtin_format_upper" => math::format_upper, Arity::Exact(1);
    "__builtin_format_lower" => math::format_lower, Arity::Exact(1);
}

fn type_error(name: &str, expected: &str, got: Value) -> Error {
    Error::with_message(
        ErrorKind::Type,
        format!("{name}: expected {expected}, got {}", got.type_of()),
    )
}

fn car(um: &mut Interpreter, args: &[Value]) -> Result<Value> {
    match args[0] {
        v if v.is_nil() => Ok(Value::Nil),
        Value::Pair(cell) => Ok(um.heap.car(cell)),
        other => Err(type_error("car", "a pair", other)),
    }
}

fn cdr(um: &mut Interpreter, args: &[Value]) -> Result<Value> {
    match args[0] {
        v if v.is_nil() => Ok(Value::Nil),
        Value::Pair(cell) => Ok(um.heap.cdr(cell)),
        other => Err(type_error("cdr", "a pair", other)),
    }
}

fn cons(um: &mut Interpreter, args: &[Value]) -> Result<Value> {
    Ok(um.heap.cons(args[0], args[1]))
}

fn eq_strict(um: &mut Interpreter, args: &[Value]) -> Result<Value> {
    let all = args
        .windows(2)
        .all(|pair| um.heap.eq_strict(pair[0], pair[1]));
    Ok(Value::Bool(all))
}

fn eq_coerce(um: &mut Interpreter, args: &[Value]) -> Result<Value> {
    let all = args.windows(2).all(|pair| um.eq_coerce(pair[0], pair[1]));
    Ok(Value::Bool(all))
}

fn not(um: &mut Interpreter, args: &[Value]) -> Result<Value> {
    Ok(Value::Bool(!um.truthy(args[0])))
}

fn and(um: &mut Interpreter, args: &[Value]) -> Result<Value> {
    Ok(Value::Bool(um.truthy(args[0]) && um.truthy(args[1])))
}

fn is_pair(_: &mut Interpreter, args: &[Value]) -> Result<Value> {
    Ok(Value::Bool(matches!(args[0], Value::Pair(_))))
}

fn len(um: &mut Interpreter, args: &[Value]) -> Result<Value> {
    let len = match args[0] {
        list if um.heap.is_list(list) => um.heap.list_len(list),
        Value::String(string) => um.heap.string(string).chars().count(),
        Value::Vector(vector) => um.heap.vector(vector).len(),
        other => return Err(type_error("len", "a list, string or vector", other)),
    };
    Ok(Value::Number(len as f64))
}

fn eval(um: &mut Interpreter, args: &[Value]) -> Result<Value> {
    um.expand_and_eval(args[0])
}

fn macex(um: &mut Interpreter, args: &[Value]) -> Result<Value> {
    um.expand_macros(args[0])
}

fn apply(um: &mut Interpreter, args: &[Value]) -> Result<Value> {
    if !um.heap.is_list(args[1]) {
        return Err(type_error("apply", "a list of arguments", args[1]));
    }
    let arguments = um.heap.list_items(args[1]);
    um.invoke(args[0], &arguments)
}

fn type_of(_: &mut Interpreter, args: &[Value]) -> Result<Value> {
    Ok(Value::Type(args[0].type_of()))
}

/// `(cast value @Type)`, or any value standing for its own type
fn cast(um: &mut Interpreter, args: &[Value]) -> Result<Value> {
    let target = match args[1] {
        Value::Type(ty) => ty,
        other => other.type_of(),
    };
    um.cast(args[0], target)
}

fn exit(um: &mut Interpreter, args: &[Value]) -> Result<Value> {
    match um.cast(args[0], Type::Number)? {
        Value::Number(code) if code.is_finite() => Err(ErrorKind::Exit(code as i32).into()),
        _ => Err(type_error("exit", "a numeric status", args[0])),
    }
}

/// Display forms of every non-nil argument, concatenated
fn concat(um: &Interpreter, args: &[Value]) -> String {
    args.iter()
        .filter(|arg| !arg.is_nil())
        .map(|arg| um.display(*arg))
        .collect()
}

fn string(um: &mut Interpreter, args: &[Value]) -> Result<Value> {
    let text = concat(um, args);
    Ok(um.heap.alloc_string(text))
}

fn port_error(err: std::io::Error) -> Error {
    Error::with_message(ErrorKind::File, err.to_string())
}

/// Each non-nil argument on its own line
fn print(um: &mut Interpreter, args: &[Value]) -> Result<Value> {
    use std::io::Write;

    let mut text = String::new();
    for arg in args.iter().filter(|arg| !arg.is_nil()) {
        text.push_str(&um.display(*arg));
        text.push('\n');
    }
    let stdout = um.ports.output(Ports::STDOUT);
    stdout.write_all(text.as_bytes()).map_err(port_error)?;
    stdout.flush().map_err(port_error)?;
    Ok(Value::Void)
}

/// `(write port value)` without a trailing newline
fn write(um: &mut Interpreter, args: &[Value]) -> Result<Value> {
    use std::io::Write;

    let Value::Output(port) = args[0] else {
        return Err(type_error("write", "an output port", args[0]));
    };
    let text = um.display(args[1]);
    let output = um.ports.output(port);
    output.write_all(text.as_bytes()).map_err(port_error)?;
    output.flush().map_err(port_error)?;
    Ok(Value::Void)
}

/// `(read-line [port])`, nil once the port is exhausted
fn read_line(um: &mut Interpreter, args: &[Value]) -> Result<Value> {
    let port: PortRef = match args.first() {
        None => Ports::STDIN,
        Some(Value::Input(port)) => *port,
        Some(other) => return Err(type_error("read-line", "an input port", *other)),
    };
    match um.ports.input(port).read_line().map_err(port_error)? {
        Some(line) => Ok(um.heap.alloc_string(line)),
        None => Ok(Value::Nil),
    }
}

fn load(um: &mut Interpreter, args: &[Value]) -> Result<Value> {
    let path = match args[0] {
        Value::String(_) | Value::Symbol(_) => um.display(args[0]),
        other => return Err(type_error("load", "a path", other)),
    };
    um.load_file(path)
}

fn index(name: &str, value: Value) -> Result<usize> {
    match value {
        Value::Number(x) if x.is_finite() && x >= 0.0 => Ok(x as usize),
        Value::Number(_) => Err(Error::with_message(
            ErrorKind::Args,
            format!("{name}: index out of range"),
        )),
        other => Err(type_error(name, "a numeric index", other)),
    }
}

/// `(getlist index list-or-vector)`
fn getlist(um: &mut Interpreter, args: &[Value]) -> Result<Value> {
    let at = index("getlist", args[0])?;
    match args[1] {
        Value::Vector(vector) => Ok(um.heap.vector(vector).get(at).copied().unwrap_or_default()),
        list if um.heap.is_list(list) => Ok(um.heap.nth(list, at)),
        other => Err(type_error("getlist", "a list or vector", other)),
    }
}

/// `(setlist index list value)` returns a copy of `list` with one element replaced
fn setlist(um: &mut Interpreter, args: &[Value]) -> Result<Value> {
    let at = index("setlist", args[0])?;
    if !um.heap.is_list(args[1]) {
        return Err(type_error("setlist", "a list", args[1]));
    }
    let mut items = um.heap.list_items(args[1]);
    let Some(slot) = items.get_mut(at) else {
        return Err(Error::with_message(
            ErrorKind::Args,
            "setlist: index out of range",
        ));
    };
    *slot = args[2];
    Ok(um.heap.list(&items))
}

/// A vector of the arguments
fn vector(um: &mut Interpreter, args: &[Value]) -> Result<Value> {
    Ok(um.heap.alloc_vector(Vector::from_slice(args)))
}

/// A vector of a list's elements
fn vec(um: &mut Interpreter, args: &[Value]) -> Result<Value> {
    match args[0] {
        Value::Vector(_) => Ok(args[0]),
        list if um.heap.is_list(list) => {
            let items = um.heap.list_items(list);
            Ok(um.heap.alloc_vector(items))
        }
        other => Err(type_error("vec", "a list", other)),
    }
}

/// Raises a USER error whose message is the concatenated arguments
fn error(um: &mut Interpreter, args: &[Value]) -> Result<Value> {
    Err(Error::with_message(ErrorKind::User, concat(um, args)))
}

/// `(table key value ...)`
fn table(um: &mut Interpreter, args: &[Value]) -> Result<Value> {
    if args.len() % 2 != 0 {
        return Err(Error::with_message(
            ErrorKind::Args,
            "table: keys and values must come in pairs",
        ));
    }
    let table = um.heap.table_cell(args.len() / 2);
    for entry in args.chunks_exact(2) {
        um.heap
            .table_set(table, entry[0], Binding::new(entry[1]))?;
    }
    Ok(Value::Table(table))
}

/// `(table-set table key value)` returns the value
fn table_set(um: &mut Interpreter, args: &[Value]) -> Result<Value> {
    let Value::Table(handle) = args[0] else {
        return Err(type_error("table-set", "a table", args[0]));
    };
    um.heap.table_set(handle, args[1], Binding::new(args[2]))?;
    Ok(args[2])
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, io::Cursor, rc::Rc};

    use assert2::{check, let_assert};

    use super::{Arity, BUILTINS};
    use crate::{
        error::ErrorKind,
        interpreter::{Config, Interpreter},
    };

    fn run(um: &mut Interpreter, text: &str) -> String {
        let_assert!(Ok(value) = um.interpret(text), "{text}");
        um.write(value)
    }

    fn fails(um: &mut Interpreter, text: &str) -> ErrorKind {
        let_assert!(Err(err) = um.interpret(text), "{text}");
        err.kind
    }

    #[test]
    fn arity() {
        check!(Arity::Exact(2).is_satisfied(2));
        check!(!Arity::Exact(2).is_satisfied(1));
        check!(Arity::Min(1).is_satisfied(5));
        check!(Arity::Range(1, 2).is_satisfied(1));
        check!(!Arity::Range(1, 2).is_satisfied(3));
        check!(Arity::Range(0, 1).to_string() == "0 to 1 arguments");
    }

    #[test]
    fn names_are_unique() {
        for (i, builtin) in BUILTINS.iter().enumerate() {
            check!(BUILTINS[i + 1..].iter().all(|other| other.name != builtin.name));
        }
    }

    #[test]
    fn arity_is_checked_before_the_call() {
        let mut um = Interpreter::new(Config::default());
        check!(fails(&mut um, "(car)") == ErrorKind::Args);
        check!(fails(&mut um, "(cons 1)") == ErrorKind::Args);
        let_assert!(Err(err) = um.interpret("(car 1 2)"));
        check!(err.to_string() == "Parameter error: car: expected 1 argument, got 2");
    }

    #[test]
    fn pairs() {
        let mut um = Interpreter::new(Config::default());
        check!(run(&mut um, "(car '(1 2))") == "1");
        check!(run(&mut um, "(cdr '(1 2))") == "(2)");
        check!(run(&mut um, "(car nil)") == "nil");
        check!(run(&mut um, "(cdr ())") == "nil");
        check!(fails(&mut um, "(car 1)") == ErrorKind::Type);
        check!(run(&mut um, "(pair? '(1))") == "True");
        check!(run(&mut um, "(pair? nil)") == "False");
    }

    #[test]
    fn equality() {
        let mut um = Interpreter::new(Config::default());
        check!(run(&mut um, "(= 1 1 1)") == "True");
        check!(run(&mut um, "(= 1 1 2)") == "False");
        check!(run(&mut um, "(eq? \"a\" \"a\")") == "True");
        check!(run(&mut um, "(eq? 1 \"1\")") == "False");
        check!(run(&mut um, "(eqv? 1 \"1\")") == "True");
        check!(run(&mut um, "(=)") == "True");
        check!(run(&mut um, "(= '(1 (2)) (list 1 (list 2)))") == "True");
    }

    #[test]
    fn logic() {
        let mut um = Interpreter::new(Config::default());
        check!(run(&mut um, "(not nil)") == "True");
        check!(run(&mut um, "(not 1)") == "False");
        check!(run(&mut um, "(and 1 \"x\")") == "True");
        check!(run(&mut um, "(and 1 false)") == "False");
    }

    #[test]
    fn lengths() {
        let mut um = Interpreter::new(Config::default());
        check!(run(&mut um, "(len '(1 2 3))") == "3");
        check!(run(&mut um, "(len nil)") == "0");
        check!(run(&mut um, "(len \"héllo\")") == "5");
        check!(run(&mut um, "(len [1 2])") == "2");
        check!(fails(&mut um, "(len 5)") == ErrorKind::Type);
    }

    #[test]
    fn evaluation_builtins() {
        let mut um = Interpreter::new(Config::default());
        check!(run(&mut um, "(eval '(+ 1 2))") == "3");
        check!(run(&mut um, "(apply + '(1 2))") == "3");
        check!(run(&mut um, "(apply list '(1 2 3))") == "(1 2 3)");
        check!(fails(&mut um, "(apply + 1)") == ErrorKind::Type);
        check!(run(&mut um, "(type 1)") == "@Number");
        check!(run(&mut um, "(type type)") == "@Builtin");
        check!(run(&mut um, "(type (type 1))") == "@Type");
    }

    #[test]
    fn casting() {
        let mut um = Interpreter::new(Config::default());
        check!(run(&mut um, "(cast \"12\" @Number)") == "12");
        check!(run(&mut um, "(cast 12 \"\")") == "\"12\"");
        check!(run(&mut um, "(float \"2.5x\")") == "2.5");
        check!(run(&mut um, "(cast '(1 2) @Vector)") == "[1 2]");
        check!(fails(&mut um, "(cast '(1 2) @Number)") == ErrorKind::CoercionFail);

        check!(run(&mut um, "(coerce \"12\" @Number)") == "12");
        check!(run(&mut um, "(coerce 'abc @String)") == "\"abc\"");
        check!(run(&mut um, "(std::coerce 1 \"\")") == "\"1\"");
        check!(fails(&mut um, "(coerce 1)") == ErrorKind::Args);
    }

    #[test]
    fn strings_and_printing() {
        let mut um = Interpreter::new(Config::default());
        check!(run(&mut um, "(str \"a\" 1 nil 'b '(1 \"c\"))") == "\"a1b(1 c)\"");
        check!(run(&mut um, "(str)") == "\"\"");

        let buffer = Rc::new(RefCell::new(Vec::<u8>::new()));
        um.redirect_stdout(buffer.clone().into());
        check!(run(&mut um, "(print 1 \"two\")") == "_");
        check!(run(&mut um, "(write stdout '(a \"b\"))") == "_");
        check!(buffer.borrow().as_slice() == b"1\ntwo\n(a b)");
        check!(fails(&mut um, "(write stdin 1)") == ErrorKind::Type);
    }

    #[test]
    fn reading_lines() {
        let mut um = Interpreter::new(Config::default());
        let input = Cursor::new(b"first\nsecond\n".to_vec());
        um.redirect_stdin(Rc::new(RefCell::new(input)).into());
        check!(run(&mut um, "(read-line)") == "\"first\"");
        check!(run(&mut um, "(read-line stdin)") == "\"second\"");
        check!(run(&mut um, "(read-line)") == "nil");
    }

    #[test]
    fn list_access() {
        let mut um = Interpreter::new(Config::default());
        check!(run(&mut um, "(getlist 1 '(a b c))") == "b");
        check!(run(&mut um, "(getlist 5 '(a b c))") == "nil");
        check!(run(&mut um, "(getlist 0 [x y])") == "x");
        check!(run(&mut um, "(def xs '(1 2 3)) (setlist 1 xs 'two)") == "(1 two 3)");
        check!(run(&mut um, "xs") == "(1 2 3)");
        check!(fails(&mut um, "(setlist 3 xs 0)") == ErrorKind::Args);
        check!(fails(&mut um, "(getlist 'a xs)") == ErrorKind::Type);
    }

    #[test]
    fn vectors() {
        let mut um = Interpreter::new(Config::default());
        check!(run(&mut um, "(__builtin_vector 1 nil 2)") == "[1 nil 2]");
        check!(run(&mut um, "(vec '(1 2))") == "[1 2]");
        check!(run(&mut um, "(std::vector 1 2)") == "[1 2]");
        check!(run(&mut um, "[(+ 1 1)]") == "[(+ 1 1)]");
    }

    #[test]
    fn user_errors() {
        let mut um = Interpreter::new(Config::default());
        let_assert!(Err(err) = um.interpret("(error \"bad \" 42)"));
        check!(err.kind == ErrorKind::User);
        check!(err.to_string() == "bad 42");
    }

    #[test]
    fn tables() {
        let mut um = Interpreter::new(Config::default());
        run(&mut um, "(def t (table))");
        check!(run(&mut um, "(table-set t 'k 1)") == "1");
        check!(run(&mut um, "(table-set t 'k 2)") == "2");
        check!(run(&mut um, "(t 'k)") == "2");
        check!(run(&mut um, "t") == "#<table 1>");
        check!(fails(&mut um, "(table 1)") == ErrorKind::Args);
        check!(fails(&mut um, "(table-set 1 2 3)") == ErrorKind::Type);
    }

    #[test]
    fn loading_files() {
        let mut um = Interpreter::new(Config::default());
        let path = std::env::temp_dir().join(format!("um-load-{}.um", std::process::id()));
        let_assert!(Ok(()) = std::fs::write(&path, "(def loaded 41) (+ loaded 1)"));
        let text = format!("(load \"{}\")", path.display());
        check!(run(&mut um, &text) == "42");
        check!(run(&mut um, "loaded") == "41");
        let _ = std::fs::remove_file(&path);
        check!(fails(&mut um, "(load 1)") == ErrorKind::Type);
    }
}
