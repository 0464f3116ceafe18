use core::{fmt, ops::Range};

/// The failure classes a running program can observe.
///
/// The display text of each kind is what the REPL prints before any attached message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Syntax,
    Unbound,
    Args,
    Type,
    /// The reader ran out of text in the middle of an expression
    Incomplete,
    File,
    User,
    NoMut,
    CoercionFail,
    /// Raised by `exit`, carries the requested process status
    Exit(i32),
}

impl ErrorKind {
    pub fn message(&self) -> &'static str {
        match self {
            ErrorKind::Syntax => "Syntax error",
            ErrorKind::Unbound => "Symbol unbound",
            ErrorKind::Args => "Parameter error",
            ErrorKind::Type => "Type error",
            ErrorKind::Incomplete => "Input incomplete",
            ErrorKind::File => "File error",
            ErrorKind::User => "",
            ErrorKind::NoMut => "Cannot mutate constant",
            ErrorKind::CoercionFail => "Coercion error",
            ErrorKind::Exit(_) => "Exit requested",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("{}", render(.kind, .message))]
pub struct Error {
    pub kind: ErrorKind,
    pub message: Option<Box<str>>,
    /// Byte range of the offending source text, for errors raised while reading
    pub span: Option<Range<usize>>,
}

fn render(kind: &ErrorKind, message: &Option<Box<str>>) -> String {
    match (kind, message) {
        (ErrorKind::User, Some(message)) => message.to_string(),
        (kind, Some(message)) => format!("{kind}: {message}"),
        (kind, None) => kind.to_string(),
    }
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            span: None,
        }
    }

    pub fn with_message(kind: ErrorKind, message: impl AsRef<str>) -> Self {
        Self {
            kind,
            message: Some(Box::from(message.as_ref())),
            span: None,
        }
    }

    pub fn at(mut self, span: Range<usize>) -> Self {
        self.span = Some(span);
        self
    }

    pub fn is_incomplete(&self) -> bool {
        self.kind == ErrorKind::Incomplete
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
