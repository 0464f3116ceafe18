//! The runtime's universal datum and its type tags

use core::fmt;

use arbitrary::Arbitrary;

use crate::{builtins::Builtin, error::ErrorKind, symbol::Symbol};

pub mod cast;
pub mod port;
pub mod print;

macro_rules! handle {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
            pub struct $name(pub(crate) u32);

            impl $name {
                pub(crate) fn index(self) -> usize {
                    self.0 as usize
                }
            }
        )*
    };
}

handle! {
    /// Cons cell slot, shared by pairs, closures and macros
    PairRef,
    StringRef,
    TableRef,
    VectorRef,
    /// Index into the interpreter's port list. Ports are not collected.
    PortRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Value {
    /// The empty list, also logical false
    #[default]
    Nil,
    /// "No value", what `_` is bound to. Every nil test accepts it.
    Void,
    Pair(PairRef),
    Symbol(Symbol),
    Number(f64),
    Bool(bool),
    Builtin(&'static Builtin),
    /// `(env . (params . body))`
    Closure(PairRef),
    /// Same shape as a closure, run by the expander instead of the evaluator
    Macro(PairRef),
    Vector(VectorRef),
    String(StringRef),
    Input(PortRef),
    Output(PortRef),
    Table(TableRef),
    Error(ErrorKind),
    Type(Type),
}

impl Value {
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil | Value::Void)
    }

    pub fn type_of(&self) -> Type {
        match self {
            Value::Nil | Value::Void => Type::Nil,
            Value::Pair(_) => Type::Pair,
            Value::Symbol(_) => Type::Symbol,
            Value::Number(_) => Type::Number,
            Value::Bool(_) => Type::Bool,
            Value::Builtin(_) => Type::Builtin,
            Value::Closure(_) => Type::Closure,
            Value::Macro(_) => Type::Macro,
            Value::Vector(_) => Type::Vector,
            Value::String(_) => Type::String,
            Value::Input(_) => Type::Input,
            Value::Output(_) => Type::Output,
            Value::Table(_) => Type::Table,
            Value::Error(_) => Type::Error,
            Value::Type(_) => Type::Type,
        }
    }

    /// The cons cell behind pairs, closures and macros
    pub fn cell(&self) -> Option<PairRef> {
        match self {
            Value::Pair(cell) | Value::Closure(cell) | Value::Macro(cell) => Some(*cell),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<Symbol> {
        match self {
            Value::Symbol(sym) => Some(*sym),
            _ => None,
        }
    }

    /// Values that live in an arena and so need rooting while in flight
    pub(crate) fn is_collectable(&self) -> bool {
        matches!(
            self,
            Value::Pair(_)
                | Value::Closure(_)
                | Value::Macro(_)
                | Value::String(_)
                | Value::Table(_)
                | Value::Vector(_)
        )
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<Symbol> for Value {
    fn from(value: Symbol) -> Self {
        Value::Symbol(value)
    }
}

impl From<Type> for Value {
    fn from(value: Type) -> Self {
        Value::Type(value)
    }
}

impl From<&'static Builtin> for Value {
    fn from(value: &'static Builtin) -> Self {
        Value::Builtin(value)
    }
}

/// Type tags, first-class through `@Name` globals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Arbitrary)]
pub enum Type {
    Nil,
    Pair,
    Symbol,
    Number,
    Bool,
    Builtin,
    Closure,
    Macro,
    Vector,
    String,
    Input,
    Output,
    Table,
    Error,
    Type,
}

impl Type {
    pub const ALL: [Type; 15] = [
        Type::Nil,
        Type::Pair,
        Type::Symbol,
        Type::Number,
        Type::Bool,
        Type::Builtin,
        Type::Closure,
        Type::Macro,
        Type::Vector,
        Type::String,
        Type::Input,
        Type::Output,
        Type::Table,
        Type::Error,
        Type::Type,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Type::Nil => "Nil",
            Type::Pair => "Pair",
            Type::Symbol => "Symbol",
            Type::Number => "Number",
            Type::Bool => "Bool",
            Type::Builtin => "Builtin",
            Type::Closure => "Closure",
            Type::Macro => "Macro",
            Type::Vector => "Vector",
            Type::String => "String",
            Type::Input => "Input",
            Type::Output => "Output",
            Type::Table => "Table",
            Type::Error => "Error",
            Type::Type => "Type",
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.name())
    }
}
