//! The interpreter context and its public entry points
//!
//! An [`Interpreter`] owns everything a running program can reach: the heap, the
//! symbol table, the global environment and the open ports. Independent instances
//! share nothing.

use std::path::Path;

use crate::{
    builtins,
    error::{Error, ErrorKind, Result},
    heap::{Binding, Heap, HeapStats},
    reader::Reader,
    symbol::Symbols,
    value::{
        port::{InputPort, OutputPort, Ports},
        Type, Value,
    },
};

mod apply;
mod eval;
mod macros;

/// Settings fixed for the lifetime of an interpreter
#[derive(Debug, Clone)]
pub struct Config {
    /// Never run the collector
    pub gc_disabled: bool,
    /// Initial bucket count of the global environment and the interner
    pub symbol_capacity: usize,
    /// Log every top-level form before it runs
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gc_disabled: false,
            symbol_capacity: 1000,
            debug: false,
        }
    }
}

pub struct Interpreter {
    pub(crate) heap: Heap,
    pub(crate) symbols: Symbols,
    pub(crate) global: Value,
    pub(crate) ports: Ports,
    config: Config,
}

impl Interpreter {
    /// A fresh interpreter with the builtins and the prelude installed
    pub fn new(config: Config) -> Self {
        let mut heap = Heap::new(config.gc_disabled);
        let symbols = Symbols::with_capacity(config.symbol_capacity);
        let global = heap.env_create(Value::Nil, config.symbol_capacity);
        heap.pin(global);
        heap.restore(0);

        let mut um = Self {
            heap,
            symbols,
            global,
            ports: Ports::standard(),
            config,
        };

        let mut globals = vec![
            ("true", Value::Bool(true)),
            ("false", Value::Bool(false)),
            ("nil", Value::Nil),
            ("_", Value::Void),
            ("stdin", Value::Input(Ports::STDIN)),
            ("stdout", Value::Output(Ports::STDOUT)),
            ("stderr", Value::Output(Ports::STDERR)),
        ];
        let type_names: Vec<_> = Type::ALL
            .iter()
            .map(|ty| (ty.to_string(), Value::Type(*ty)))
            .collect();
        globals.extend(type_names.iter().map(|(name, ty)| (name.as_str(), *ty)));
        globals.extend(
            builtins::BUILTINS
                .iter()
                .map(|builtin| (builtin.name, Value::Builtin(builtin))),
        );
        for (name, value) in globals {
            if let Err(err) = um.define(name, value) {
                tracing::error!(name, %err, "failed to install global");
            }
        }

        if let Err(err) = um.interpret(builtins::PRELUDE) {
            tracing::error!(%err, "failed to load the prelude");
        }
        um
    }

    /// Binds `name` in the global environment
    pub fn define(&mut self, name: &str, value: Value) -> Result<()> {
        let symbol = self.symbols.intern(name);
        self.heap
            .env_assign(self.global, symbol, Binding::new(value))
    }

    /// Looks `name` up in the global environment
    pub fn lookup(&self, name: &str) -> Option<Value> {
        let symbol = self.symbols.get(name)?;
        let binding = self.heap.env_get(self.global, symbol).ok()??;
        Some(binding.value)
    }

    /// Reads and evaluates the top-level forms of `text` one at a time, stopping at the
    /// first read or evaluation error.
    ///
    /// Forms before a syntax error have already run when it is reported. Empty input
    /// evaluates to Void.
    pub fn interpret(&mut self, text: &str) -> Result<Value> {
        let saved = self.heap.frame();
        let mut reader = Reader::new(text);
        let mut last = Value::Void;
        let result = loop {
            match reader.read(self) {
                Ok(Some(form)) => match self.eval_top(form) {
                    Ok(value) => last = value,
                    Err(err) => break Err(err),
                },
                Ok(None) => break Ok(last),
                Err(err) => break Err(err),
            }
            // the form is done with, its value lives in the result register
            self.heap.restore(saved);
        };
        self.heap.restore(saved);
        result
    }

    /// Expands and evaluates one form read earlier with [`Interpreter::read_next`] or
    /// [`Interpreter::read`].
    ///
    /// The result is not left on the root stack. It stays reachable until the
    /// next top-level evaluation replaces it.
    pub fn eval_top(&mut self, form: Value) -> Result<Value> {
        if self.config.debug {
            tracing::debug!(form = %self.printed(form, true), "evaluating");
        }
        let saved = self.heap.frame();
        let result = self.expand_and_eval(form);
        self.publish(saved, result)
    }

    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<Value> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "loading file");
        let text = std::fs::read_to_string(path).map_err(|err| {
            Error::with_message(ErrorKind::File, format!("{}: {err}", path.display()))
        })?;
        self.interpret(&text)
    }

    pub fn collect_garbage(&mut self) {
        self.heap.collect();
    }

    pub fn heap_stats(&self) -> HeapStats {
        self.heap.stats()
    }

    pub fn collections(&self) -> usize {
        self.heap.collections()
    }

    /// Sends everything written to `stdout` into `output` instead
    pub fn redirect_stdout(&mut self, output: OutputPort) {
        self.ports.set_output(Ports::STDOUT, output);
    }

    pub fn redirect_stderr(&mut self, output: OutputPort) {
        self.ports.set_output(Ports::STDERR, output);
    }

    pub fn redirect_stdin(&mut self, input: InputPort) {
        self.ports.set_input(Ports::STDIN, input);
    }

    /// Ends a call made from outside the evaluator: the root stack goes back to `saved`
    /// and a successful result is held by the result register until the next such call
    fn publish(&mut self, saved: usize, result: Result<Value>) -> Result<Value> {
        if let Ok(value) = result {
            self.heap.set_result(value);
        }
        self.heap.restore(saved);
        result
    }

    /// Evaluates `expr` in `env` for an embedder.
    ///
    /// Nothing is left on the root stack; the result stays reachable until the next
    /// top-level call replaces it.
    pub fn eval(&mut self, expr: Value, env: Value) -> Result<Value> {
        let saved = self.heap.frame();
        let result = self.evaluate(expr, env);
        self.publish(saved, result)
    }

    /// Calls `operator` with `args` for an embedder, rooting the result like [`Interpreter::eval`]
    pub fn apply(&mut self, operator: Value, args: &[Value]) -> Result<Value> {
        let saved = self.heap.frame();
        let result = self.invoke(operator, args);
        self.publish(saved, result)
    }

    /// Expands every macro call in `expr`
    pub fn macex(&mut self, expr: Value) -> Result<Value> {
        let saved = self.heap.frame();
        let result = self.expand_macros(expr);
        self.publish(saved, result)
    }

    /// Expands `expr` and evaluates the result in the global environment
    pub fn macex_eval(&mut self, expr: Value) -> Result<Value> {
        let saved = self.heap.frame();
        let result = self.expand_and_eval(expr);
        self.publish(saved, result)
    }

    /// Truncates the root stack to `saved`, keeping a successful result rooted
    pub(crate) fn settle(&mut self, saved: usize, result: Result<Value>) -> Result<Value> {
        match result {
            Ok(value) => {
                self.heap.restore_with(saved, value);
                Ok(value)
            }
            Err(err) => {
                self.heap.restore(saved);
                Err(err)
            }
        }
    }
}
