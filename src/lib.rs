pub mod builtins;
pub mod env;
pub mod error;
pub mod heap;
pub mod interpreter;
pub mod lexer;
pub mod reader;
pub mod symbol;
pub mod value;

pub use error::{Error, ErrorKind, Result};
pub use heap::HeapStats;
pub use interpreter::{Config, Interpreter};
pub use symbol::Symbol;
pub use value::{
    port::{InputPort, OutputPort},
    Type, Value,
};
