//! The evaluator
//!
//! Evaluation is a loop over `(expr, env)`. Forms in tail position hand back the
//! next pair instead of recursing, so self-recursive programs run in bounded native
//! stack. Everything else recurses through [`Interpreter::eval`], which owns one
//! frame of the root stack for the duration of the call.

use smallvec::SmallVec;

use crate::{
    error::{Error, ErrorKind, Result},
    heap::Binding,
    interpreter::Interpreter,
    symbol::{Symbol, WellKnown},
    value::{PairRef, Value},
};

/// Forms recognized by the identity of their head symbol. They cannot be shadowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpecialForm {
    Quote,
    If,
    Cond,
    Switch,
    Match,
    Def,
    Set,
    Const,
    Defun,
    Lambda,
    Do,
    Mac,
    Try,
}

impl SpecialForm {
    fn of(wk: &WellKnown, head: Symbol) -> Option<Self> {
        Some(match head {
            s if s == wk.quote => Self::Quote,
            s if s == wk.if_ => Self::If,
            s if s == wk.cond => Self::Cond,
            s if s == wk.switch => Self::Switch,
            s if s == wk.match_ => Self::Match,
            s if s == wk.def => Self::Def,
            s if s == wk.set => Self::Set,
            s if s == wk.constant => Self::Const,
            s if s == wk.defun => Self::Defun,
            s if s == wk.fn_ || s == wk.lambda || s == wk.backslash => Self::Lambda,
            s if s == wk.do_ => Self::Do,
            s if s == wk.mac => Self::Mac,
            s if s == wk.try_ => Self::Try,
            _ => return None,
        })
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Quote => "quote",
            Self::If => "if",
            Self::Cond => "cond",
            Self::Switch => "switch",
            Self::Match => "match",
            Self::Def => "def",
            Self::Set => "set",
            Self::Const => "const",
            Self::Defun => "defun",
            Self::Lambda => "fn",
            Self::Do => "do",
            Self::Mac => "mac",
            Self::Try => "try",
        }
    }
}

/// What a special form leaves for the loop
enum Step {
    Done(Value),
    /// Continue with this expression in this environment
    Tail(Value, Value),
}

/// How a definition form writes its binding
#[derive(Clone, Copy)]
enum Assign {
    /// current frame only
    Local,
    /// nearest existing binding, which must exist
    Existing,
    /// nearest binding, frozen afterwards
    Frozen,
}

fn arity_error(form: SpecialForm, expected: &str) -> Error {
    Error::with_message(
        ErrorKind::Args,
        format!("{} expects {expected}", form.name()),
    )
}

impl Interpreter {
    /// Evaluates `expr` in `env`.
    ///
    /// The root stack is back at its entry length when this returns, plus the result.
    pub(crate) fn evaluate(&mut self, expr: Value, env: Value) -> Result<Value> {
        let saved = self.heap.frame();
        let result = self.eval_loop(expr, env, saved);
        self.settle(saved, result)
    }

    fn eval_loop(&mut self, mut expr: Value, mut env: Value, saved: usize) -> Result<Value> {
        loop {
            // Drop whatever the previous iteration left behind
            self.heap.restore_keeping(saved, &[expr, env]);

            let (head, args) = match expr {
                Value::Symbol(symbol) => return self.resolve(env, symbol),
                Value::Pair(cell) => (self.heap.car(cell), self.heap.cdr(cell)),
                _ => return Ok(expr),
            };

            if let Value::Symbol(symbol) = head {
                if let Some(form) = SpecialForm::of(&self.symbols.well_known, symbol) {
                    match self.special_form(form, args, env)? {
                        Step::Done(value) => return Ok(value),
                        Step::Tail(next, next_env) => {
                            expr = next;
                            env = next_env;
                            continue;
                        }
                    }
                }
            }

            let operator = self.evaluate(head, env)?;
            let mut values: SmallVec<[Value; 8]> = SmallVec::new();
            let mut rest = args;
            while let Some((arg, next)) = self.heap.uncons(rest) {
                values.push(self.evaluate(arg, env)?);
                rest = next;
            }
            if !rest.is_nil() {
                return Err(Error::with_message(
                    ErrorKind::Syntax,
                    "improper argument list",
                ));
            }

            match operator {
                Value::Closure(cell) => {
                    let (body, body_env) = self.enter_closure(cell, &values)?;
                    expr = body;
                    env = body_env;
                }
                _ => return self.invoke(operator, &values),
            }
        }
    }

    fn resolve(&self, env: Value, symbol: Symbol) -> Result<Value> {
        match self.heap.env_get(env, symbol)? {
            Some(binding) => Ok(binding.value),
            None => Err(Error::with_message(
                ErrorKind::Unbound,
                self.symbols.resolve(symbol),
            )),
        }
    }

    fn special_form(&mut self, form: SpecialForm, args: Value, env: Value) -> Result<Step> {
        if !self.heap.is_list(args) {
            return Err(Error::with_message(
                ErrorKind::Syntax,
                format!("improper {} form", form.name()),
            ));
        }
        let len = self.heap.list_len(args);
        match form {
            SpecialForm::Quote => {
                if len != 1 {
                    return Err(arity_error(form, "exactly one operand"));
                }
                Ok(Step::Done(self.heap.nth(args, 0)))
            }
            SpecialForm::If => self.eval_if(args, env),
            SpecialForm::Cond => {
                let mut clauses = args;
                while let Some((clause, rest)) = self.heap.uncons(clauses) {
                    let test = self.evaluate(self.heap.nth(clause, 0), env)?;
                    if self.truthy(test) {
                        return Ok(Step::Tail(self.heap.nth(clause, 1), env));
                    }
                    clauses = rest;
                }
                Ok(Step::Done(Value::Nil))
            }
            SpecialForm::Switch | SpecialForm::Match => {
                let Some((subject, mut clauses)) = self.heap.uncons(args) else {
                    return Err(arity_error(form, "a subject"));
                };
                let subject = self.evaluate(subject, env)?;
                while let Some((clause, rest)) = self.heap.uncons(clauses) {
                    let key = self.evaluate(self.heap.nth(clause, 0), env)?;
                    let matched = if form == SpecialForm::Switch {
                        self.eq_coerce(key, subject)
                    } else {
                        let verdict = self.invoke(key, &[subject])?;
                        self.truthy(verdict)
                    };
                    if matched {
                        return Ok(Step::Tail(self.heap.nth(clause, 1), env));
                    }
                    clauses = rest;
                }
                Ok(Step::Done(Value::Nil))
            }
            SpecialForm::Def | SpecialForm::Set | SpecialForm::Const => {
                if len < 2 {
                    return Err(arity_error(form, "a target and a value"));
                }
                let assign = match form {
                    SpecialForm::Def => Assign::Local,
                    SpecialForm::Set => Assign::Existing,
                    _ => Assign::Frozen,
                };
                self.define_form(assign, args, env).map(Step::Done)
            }
            SpecialForm::Defun => {
                if len < 3 {
                    return Err(arity_error(form, "a name, parameters and a body"));
                }
                let name = self.definition_name(self.heap.nth(args, 0))?;
                let (params, body) = self.split_definition(args);
                let closure = Value::Closure(self.new_closure(env, params, body)?);
                self.heap
                    .env_assign_eq(env, name, Binding::new(closure))?;
                Ok(Step::Done(Value::Symbol(name)))
            }
            SpecialForm::Lambda => {
                if len < 2 {
                    return Err(arity_error(form, "parameters and a body"));
                }
                let (params, body) = self.heap.uncons(args).unwrap_or_default();
                let cell = self.new_closure(env, params, body)?;
                Ok(Step::Done(Value::Closure(cell)))
            }
            SpecialForm::Do => {
                let mut rest = args;
                while let Some((expr, next)) = self.heap.uncons(rest) {
                    if next.is_nil() {
                        return Ok(Step::Tail(expr, env));
                    }
                    self.evaluate(expr, env)?;
                    rest = next;
                }
                Ok(Step::Done(Value::Nil))
            }
            SpecialForm::Mac => {
                if len < 3 {
                    return Err(arity_error(form, "a name, parameters and a body"));
                }
                let name = self.definition_name(self.heap.nth(args, 0))?;
                let (params, body) = self.split_definition(args);
                let cell = self.new_closure(env, params, body)?;
                self.heap
                    .env_assign(env, name, Binding::new(Value::Macro(cell)))?;
                Ok(Step::Done(Value::Symbol(name)))
            }
            SpecialForm::Try => {
                if len != 1 {
                    return Err(arity_error(form, "exactly one operand"));
                }
                match self.evaluate(self.heap.nth(args, 0), env) {
                    Ok(value) => Ok(Step::Done(value)),
                    Err(err) if matches!(err.kind, ErrorKind::Exit(_)) => Err(err),
                    Err(err) => {
                        tracing::trace!(%err, "caught by try");
                        Ok(Step::Done(Value::Error(err.kind)))
                    }
                }
            }
        }
    }

    /// `(if test branch test branch ... default)`
    fn eval_if(&mut self, args: Value, env: Value) -> Result<Step> {
        let mut rest = args;
        while let Some((test, next)) = self.heap.uncons(rest) {
            let Some((branch, after)) = self.heap.uncons(next) else {
                // a lone trailing default
                return Ok(Step::Tail(test, env));
            };
            let condition = self.evaluate(test, env)?;
            if self.truthy(condition) {
                return Ok(Step::Tail(branch, env));
            }
            rest = after;
        }
        Ok(Step::Done(Value::Nil))
    }

    /// `def`, `set` and `const`, in both their `name value` and `(name . params) body...` shapes
    fn define_form(&mut self, assign: Assign, args: Value, env: Value) -> Result<Value> {
        let target = self.heap.nth(args, 0);
        let (name, value, result) = match target {
            Value::Symbol(name) => {
                let value = self.evaluate(self.heap.nth(args, 1), env)?;
                (name, value, value)
            }
            Value::Pair(cell) => {
                let name = self.definition_name(self.heap.car(cell))?;
                let body = self.heap.uncons(args).map_or(Value::Nil, |(_, body)| body);
                let closure = self.new_closure(env, self.heap.cdr(cell), body)?;
                (name, Value::Closure(closure), Value::Symbol(name))
            }
            other => {
                return Err(Error::with_message(
                    ErrorKind::Type,
                    format!("cannot bind to {}", other.type_of()),
                ))
            }
        };

        let existing = self.heap.env_get(env, name)?;
        match assign {
            Assign::Local => self.heap.env_assign(env, name, Binding::new(value))?,
            Assign::Existing => {
                if existing.is_none() {
                    return Err(Error::with_message(
                        ErrorKind::Unbound,
                        self.symbols.resolve(name),
                    ));
                }
                self.heap.env_assign_eq(env, name, Binding::new(value))?
            }
            Assign::Frozen => {
                if existing.is_some_and(|binding| binding.is_frozen) {
                    return Err(Error::with_message(
                        ErrorKind::NoMut,
                        self.symbols.resolve(name),
                    ));
                }
                self.heap.env_assign_eq(env, name, Binding::frozen(value))?
            }
        }
        Ok(result)
    }

    fn definition_name(&self, name: Value) -> Result<Symbol> {
        name.as_symbol().ok_or_else(|| {
            Error::with_message(
                ErrorKind::Type,
                format!("definition names must be symbols, not {}", name.type_of()),
            )
        })
    }

    /// `(name params body...)` into `(params, body)`
    fn split_definition(&self, args: Value) -> (Value, Value) {
        let rest = self.heap.uncons(args).map_or(Value::Nil, |(_, rest)| rest);
        self.heap.uncons(rest).unwrap_or_default()
    }

    /// Builds `(env . (params . (body)))`, wrapping a multi-expression body in `do`.
    ///
    /// The cell is untagged so the caller can make it a closure or a macro.
    pub(crate) fn new_closure(&mut self, env: Value, params: Value, body: Value) -> Result<PairRef> {
        if !self.heap.is_list(body) {
            return Err(Error::with_message(
                ErrorKind::Syntax,
                "a function body must be a proper list",
            ));
        }

        let mut rest = params;
        loop {
            match rest {
                Value::Pair(cell) => {
                    let param = self.heap.car(cell);
                    if !matches!(param, Value::Symbol(_) | Value::Pair(_)) {
                        return Err(Error::with_message(
                            ErrorKind::Type,
                            format!("parameters must be symbols or lists, not {}", param.type_of()),
                        ));
                    }
                    rest = self.heap.cdr(cell);
                }
                Value::Symbol(_) => break,
                tail if tail.is_nil() => break,
                tail => {
                    return Err(Error::with_message(
                        ErrorKind::Type,
                        format!("a rest parameter must be a symbol, not {}", tail.type_of()),
                    ))
                }
            }
        }

        let body = if self.heap.list_len(body) > 1 {
            let block = self
                .heap
                .cons(Value::Symbol(self.symbols.well_known.do_), body);
            self.heap.list(&[block])
        } else {
            body
        };
        let code = self.heap.cons(params, body);
        Ok(self.heap.cons_cell(env, code))
    }

    /// Binds `args` in a fresh child of the closure's environment.
    ///
    /// Returns the body expression and the environment to run it in.
    pub(crate) fn enter_closure(&mut self, cell: PairRef, args: &[Value]) -> Result<(Value, Value)> {
        let captured = self.heap.car(cell);
        let (params, body) = self.heap.uncons(self.heap.cdr(cell)).unwrap_or_default();
        let body = self.heap.nth(body, 0);

        let env = self.heap.env_create(captured, self.heap.list_len(params));
        let mut rest = params;
        let mut args = args.iter();
        loop {
            match rest {
                Value::Pair(param) => {
                    let value = args.next().copied().unwrap_or(Value::Nil);
                    self.destructure(env, self.heap.car(param), value)?;
                    rest = self.heap.cdr(param);
                }
                Value::Symbol(tail) => {
                    let remaining = self.heap.list(args.as_slice());
                    self.heap.env_assign(env, tail, Binding::new(remaining))?;
                    break;
                }
                _ => {
                    if args.len() > 0 {
                        return Err(Error::with_message(
                            ErrorKind::Args,
                            format!("{} too many arguments", args.len()),
                        ));
                    }
                    break;
                }
            }
        }
        Ok((body, env))
    }

    /// Binds the symbols of `pattern` against the matching parts of `value`
    fn destructure(&mut self, env: Value, mut pattern: Value, mut value: Value) -> Result<()> {
        loop {
            match pattern {
                Value::Symbol(symbol) => {
                    return self.heap.env_assign(env, symbol, Binding::new(value));
                }
                Value::Pair(cell) => {
                    let Some((head, rest)) = self.heap.uncons(value) else {
                        return Err(Error::with_message(
                            ErrorKind::Args,
                            format!("cannot destructure {}", value.type_of()),
                        ));
                    };
                    self.destructure(env, self.heap.car(cell), head)?;
                    pattern = self.heap.cdr(cell);
                    value = rest;
                }
                p if p.is_nil() => {
                    return if value.is_nil() {
                        Ok(())
                    } else {
                        Err(Error::with_message(ErrorKind::Args, "too many values to destructure"))
                    };
                }
                other => {
                    return Err(Error::with_message(
                        ErrorKind::Type,
                        format!("cannot bind to {}", other.type_of()),
                    ))
                }
            }
        }
    }
}
