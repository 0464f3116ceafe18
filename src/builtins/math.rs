//! Arithmetic, trigonometry and number formatting.
//!
//! Operands are cast to numbers first, so `(+ "1" true)` is 2.

use icu_casemap::CaseMapper;
use icu_locid::LanguageIdentifier;

use crate::{
    error::{Error, ErrorKind, Result},
    interpreter::Interpreter,
    value::{Type, Value},
};

fn number(um: &mut Interpreter, value: Value) -> Result<f64> {
    Ok(um.cast(value, Type::Number)?.as_number().unwrap_or(f64::NAN))
}

fn binary(um: &mut Interpreter, args: &[Value], op: fn(f64, f64) -> f64) -> Result<Value> {
    let a = number(um, args[0])?;
    let b = number(um, args[1])?;
    Ok(Value::Number(op(a, b)))
}

fn unary(um: &mut Interpreter, args: &[Value], op: fn(f64) -> f64) -> Result<Value> {
    let x = number(um, args[0])?;
    Ok(Value::Number(op(x)))
}

/// With one argument, the absolute value
pub(super) fn add(um: &mut Interpreter, args: &[Value]) -> Result<Value> {
    match args {
        [x] => unary(um, &[*x], f64::abs),
        _ => binary(um, args, |a, b| a + b),
    }
}

/// With one argument, the negated absolute value
pub(super) fn subtract(um: &mut Interpreter, args: &[Value]) -> Result<Value> {
    match args {
        [x] => unary(um, &[*x], |x| -x.abs()),
        _ => binary(um, args, |a, b| a - b),
    }
}

pub(super) fn multiply(um: &mut Interpreter, args: &[Value]) -> Result<Value> {
    binary(um, args, |a, b| a * b)
}

pub(super) fn divide(um: &mut Interpreter, args: &[Value]) -> Result<Value> {
    binary(um, args, |a, b| a / b)
}

/// Remainder of the operands truncated to integers
pub(super) fn modulo(um: &mut Interpreter, args: &[Value]) -> Result<Value> {
    let a = number(um, args[0])? as i64;
    let b = number(um, args[1])? as i64;
    match a.checked_rem(b) {
        Some(rem) => Ok(Value::Number(rem as f64)),
        None => Err(Error::with_message(ErrorKind::Args, "%: division by zero")),
    }
}

pub(super) fn greater(um: &mut Interpreter, args: &[Value]) -> Result<Value> {
    let (a, b) = (number(um, args[0])?, number(um, args[1])?);
    Ok(Value::Bool(a > b))
}

pub(super) fn less(um: &mut Interpreter, args: &[Value]) -> Result<Value> {
    let (a, b) = (number(um, args[0])?, number(um, args[1])?);
    Ok(Value::Bool(a < b))
}

pub(super) fn float(um: &mut Interpreter, args: &[Value]) -> Result<Value> {
    unary(um, args, |x| x)
}

/// Truncates toward zero, after the same cast `float` applies
pub(super) fn int(um: &mut Interpreter, args: &[Value]) -> Result<Value> {
    let x = number(um, args[0]).map_err(|_| super::type_error("int", "a number", args[0]))?;
    Ok(Value::Number(x.trunc()))
}

/// `(range end)` counts from zero. Both ends are included, and a start above the
/// end counts down.
pub(super) fn range(um: &mut Interpreter, args: &[Value]) -> Result<Value> {
    let mut bounds = [0.0; 2];
    let given = &mut bounds[2 - args.len()..];
    for (bound, arg) in given.iter_mut().zip(args) {
        match arg {
            Value::Number(x) if x.is_finite() => *bound = *x,
            other => {
                return Err(Error::with_message(
                    ErrorKind::Type,
                    format!("range: expected finite numbers, got {}", other.type_of()),
                ))
            }
        }
    }

    let [start, end] = bounds;
    let mut items = vec![];
    let mut x = start;
    if start <= end {
        while x <= end {
            items.push(Value::Number(x));
            x += 1.0;
        }
    } else {
        while x >= end {
            items.push(Value::Number(x));
            x -= 1.0;
        }
    }
    Ok(um.heap.list(&items))
}

pub(super) fn pow(um: &mut Interpreter, args: &[Value]) -> Result<Value> {
    binary(um, args, f64::powf)
}

pub(super) fn cbrt(um: &mut Interpreter, args: &[Value]) -> Result<Value> {
    unary(um, args, f64::cbrt)
}

pub(super) fn sin(um: &mut Interpreter, args: &[Value]) -> Result<Value> {
    unary(um, args, f64::sin)
}

pub(super) fn cos(um: &mut Interpreter, args: &[Value]) -> Result<Value> {
    unary(um, args, f64::cos)
}

pub(super) fn tan(um: &mut Interpreter, args: &[Value]) -> Result<Value> {
    unary(um, args, f64::tan)
}

pub(super) fn asin(um: &mut Interpreter, args: &[Value]) -> Result<Value> {
    unary(um, args, f64::asin)
}

pub(super) fn acos(um: &mut Interpreter, args: &[Value]) -> Result<Value> {
    unary(um, args, f64::acos)
}

pub(super) fn atan(um: &mut Interpreter, args: &[Value]) -> Result<Value> {
    unary(um, args, f64::atan)
}

pub(super) fn ceil(um: &mut Interpreter, args: &[Value]) -> Result<Value> {
    unary(um, args, f64::ceil)
}

pub(super) fn floor(um: &mut Interpreter, args: &[Value]) -> Result<Value> {
    unary(um, args, f64::floor)
}

/// Lowercase hex of the value as a 32-bit integer, two's complement when negative
pub(super) fn format_hex(um: &mut Interpreter, args: &[Value]) -> Result<Value> {
    let x = number(um, args[0])?;
    Ok(um.heap.alloc_string(format!("{:x}", x as i32)))
}

/// `(format::precision x places)` rounds half away from zero
pub(super) fn format_precision(um: &mut Interpreter, args: &[Value]) -> Result<Value> {
    let x = number(um, args[0])?;
    let places = number(um, args[1])?;
    if !(0.0..=16.0).contains(&places) {
        return Err(Error::with_message(
            ErrorKind::Args,
            "precision: places must be between 0 and 16",
        ));
    }
    let places = places as usize;
    let scale = 10f64.powi(places as i32);
    let rounded = (x * scale).round() / scale;
    Ok(um.heap.alloc_string(format!("{rounded:.places$}")))
}

fn case_map(um: &mut Interpreter, value: Value, upper: bool) -> Result<Value> {
    let text = match um.cast(value, Type::String)? {
        Value::String(string) => um.heap.string(string).to_owned(),
        other => um.display(other),
    };
    let mapper = CaseMapper::new();
    let mapped = if upper {
        mapper.uppercase_to_string(&text, &LanguageIdentifier::UND)
    } else {
        mapper.lowercase_to_string(&text, &LanguageIdentifier::UND)
    };
    Ok(um.heap.alloc_string(mapped))
}

pub(super) fn format_upper(um: &mut Interpreter, args: &[Value]) -> Result<Value> {
    case_map(um, args[0], true)
}

pub(super) fn format_lower(um: &mut Interpreter, args: &[Value]) -> Result<Value> {
    case_map(um, args[0], false)
}

#[cfg(test)]
mod tests {
    use arbtest::arbtest;
    use assert2::{check, let_assert};

    use crate::{
        error::ErrorKind,
        interpreter::{Config, Interpreter},
        value::Value,
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
    fn arithmetic() {
        let mut um = Interpreter::new(Config::default());
        check!(run(&mut um, "(+ 1 2)") == "3");
        check!(run(&mut um, "(+ -4)") == "4");
        check!(run(&mut um, "(- 4)") == "-4");
        check!(run(&mut um, "(- 10 4)") == "6");
        check!(run(&mut um, "(* 2.5 2)") == "5");
        check!(run(&mut um, "(/ 1 4)") == "0.25");
        check!(run(&mut um, "(/ 1 0)") == "inf");
        check!(run(&mut um, "(% 7 3)") == "1");
        check!(run(&mut um, "(% -7 3)") == "-1");
        check!(run(&mut um, "(+ \"1\" true)") == "2");
        check!(fails(&mut um, "(% 1 0)") == ErrorKind::Args);
        check!(fails(&mut um, "(+ 1 2 3)") == ErrorKind::Args);
        check!(fails(&mut um, "(+ '(1) 2)") == ErrorKind::CoercionFail);
    }

    #[test]
    fn truncation() {
        let mut um = Interpreter::new(Config::default());
        check!(run(&mut um, "(int 3.7)") == "3");
        check!(run(&mut um, "(int -3.7)") == "-3");
        check!(run(&mut um, "(int \"42.9xyz\")") == "42");
        check!(run(&mut um, "(int true)") == "1");
        check!(fails(&mut um, "(int '(1 2))") == ErrorKind::Type);
        check!(fails(&mut um, "(int)") == ErrorKind::Args);
        check!(fails(&mut um, "(int 1 2)") == ErrorKind::Args);
    }

    #[test]
    fn comparisons() {
        let mut um = Interpreter::new(Config::default());
        check!(run(&mut um, "(< 1 2)") == "True");
        check!(run(&mut um, "(> 1 2)") == "False");
    }

    #[test]
    fn ranges() {
        let mut um = Interpreter::new(Config::default());
        check!(run(&mut um, "(range 3)") == "(0 1 2 3)");
        check!(run(&mut um, "(range 2 5)") == "(2 3 4 5)");
        check!(run(&mut um, "(range 3 1)") == "(3 2 1)");
        check!(run(&mut um, "(range 0)") == "(0)");
        check!(run(&mut um, "1..3") == "(1 2 3)");
        check!(fails(&mut um, "(range 'a)") == ErrorKind::Type);
        check!(fails(&mut um, "(range)") == ErrorKind::Args);
    }

    #[test]
    fn formatting() {
        let mut um = Interpreter::new(Config::default());
        check!(run(&mut um, "(format::hex 255)") == "\"ff\"");
        check!(run(&mut um, "(format::hex -1)") == "\"ffffffff\"");
        check!(run(&mut um, "(format::precision 3.14159 2)") == "\"3.14\"");
        check!(run(&mut um, "(format::precision 2.5 0)") == "\"3\"");
        check!(run(&mut um, "(format::upper \"straße\")") == "\"STRASSE\"");
        check!(run(&mut um, "(format::lower 'ABC)") == "\"abc\"");
    }

    #[test]
    fn math_dispatcher() {
        let mut um = Interpreter::new(Config::default());
        check!(run(&mut um, "(math::sqrt 16)") == "4");
        check!(run(&mut um, "(math::square 3)") == "9");
        check!(run(&mut um, "(math::cube 2)") == "8");
        check!(run(&mut um, "(math::cbrt 27)") == "3");
        check!(run(&mut um, "(math::floor 2.7)") == "2");
        check!(run(&mut um, "(math::ceil 2.1)") == "3");
        check!(run(&mut um, "(math::sum '(1 2 3))") == "6");
        check!(run(&mut um, "(math::product '(2 3 4))") == "24");
        check!(run(&mut um, "(math::sigma (fn (x) (* x x)) 1 3)") == "14");
        check!(run(&mut um, "(math::min '(4 2 8))") == "2");
        check!(run(&mut um, "(math::max '(4 2 8))") == "8");
        check!(run(&mut um, "(math::sin 0)") == "0");
        check!(run(&mut um, "(and (< 3.14 math::pi) (> 2.72 math::e))") == "True");
    }

    #[test]
    fn modulo_matches_integer_remainder() {
        arbtest(|u| {
            let mut um = Interpreter::new(Config {
                gc_disabled: true,
                ..Config::default()
            });
            let a: i32 = u.arbitrary()?;
            let b: i32 = u.arbitrary()?;
            let result = super::modulo(&mut um, &[Value::Number(a.into()), Value::Number(b.into())]);
            match i64::from(a).checked_rem(i64::from(b)) {
                Some(rem) => {
                    check!(result == Ok(Value::Number(rem as f64)));
                }
                None => {
                    check!(result.is_err());
                }
            }
            Ok(())
        });
    }
}
