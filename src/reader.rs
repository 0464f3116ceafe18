//! Recursive-descent reader from text to expression trees
//!
//! The reader allocates the trees it builds straight into the interpreter's heap.
//! Every allocation roots itself, so a partly read expression survives any collection
//! a caller triggers before it truncates the root stack.

use logos::Lexer;
use smallvec::SmallVec;

use crate::{
    error::{Error, ErrorKind, Result},
    interpreter::Interpreter,
    lexer::{LexerError, Span, Token},
    symbol::Symbol,
    value::Value,
};

pub struct Reader<'src> {
    lexer: Lexer<'src, Token>,
}

impl<'src> Reader<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            lexer: Token::lexer(source),
        }
    }

    /// Reads the next top-level expression.
    ///
    /// Returns `None` once only whitespace and comments remain. Input that ends inside
    /// an expression is an INCOMPLETE error.
    pub fn read(&mut self, um: &mut Interpreter) -> Result<Option<Value>> {
        match self.lexer.next() {
            None => Ok(None),
            Some(token) => {
                let token = self.check(token)?;
                self.read_from(um, token).map(Some)
            }
        }
    }

    /// Reads every remaining top-level expression
    pub fn read_all(&mut self, um: &mut Interpreter) -> Result<Vec<Value>> {
        let mut forms = vec![];
        while let Some(form) = self.read(um)? {
            forms.push(form);
        }
        Ok(forms)
    }

    fn span(&self) -> Span {
        self.lexer.span()
    }

    fn check(&self, token: Result<Token, LexerError>) -> Result<Token> {
        token.map_err(|err| match err {
            LexerError::UnterminatedString => {
                Error::with_message(ErrorKind::Incomplete, err.to_string()).at(self.span())
            }
            LexerError::Invalid => {
                Error::with_message(ErrorKind::Syntax, err.to_string()).at(self.span())
            }
        })
    }

    fn next_token(&mut self) -> Result<Token> {
        match self.lexer.next() {
            Some(token) => self.check(token),
            None => Err(ErrorKind::Incomplete.into()),
        }
    }

    fn read_expr(&mut self, um: &mut Interpreter) -> Result<Value> {
        let token = self.next_token()?;
        self.read_from(um, token)
    }

    fn read_from(&mut self, um: &mut Interpreter, token: Token) -> Result<Value> {
        let wk = um.symbols.well_known;
        match token {
            Token::LParen => self.read_list(um),
            Token::LBrace => {
                let body = self.read_until(um, &Token::RBrace)?;
                Ok(um.heap.list_with_tail(&[Value::Symbol(wk.do_)], body))
            }
            Token::LBracket => {
                let items = self.read_until(um, &Token::RBracket)?;
                let items = um.heap.list_items(items);
                Ok(um.heap.alloc_vector(items))
            }
            Token::RParen | Token::RBrace | Token::RBracket => {
                let bracket = match token {
                    Token::RParen => ")",
                    Token::RBrace => "}",
                    _ => "]",
                };
                Err(
                    Error::with_message(ErrorKind::Syntax, format!("unexpected `{bracket}`"))
                        .at(self.span()),
                )
            }
            Token::Quote => self.prefixed(um, wk.quote),
            Token::Quasiquote => self.prefixed(um, wk.quasiquote),
            Token::Unquote => self.prefixed(um, wk.unquote),
            Token::UnquoteSplicing => self.prefixed(um, wk.unquote_splicing),
            Token::Bang => self.prefixed(um, wk.not),
            Token::Ampersand => self.prefixed(um, wk.curry),
            Token::Colon => Ok(Value::Symbol(um.symbols.intern(":"))),
            Token::Dot => Ok(Value::Symbol(wk.dot)),
            Token::String(text) => Ok(um.heap.alloc_string(text.as_ref())),
            Token::Atom(text) => {
                let span = self.span();
                parse_simple(um, &text).map_err(|err| err.at(span))
            }
        }
    }

    /// `(a b c)` or `(a b . c)`. The opening paren has been consumed.
    fn read_list(&mut self, um: &mut Interpreter) -> Result<Value> {
        let mut items: SmallVec<[Value; 8]> = SmallVec::new();
        loop {
            match self.next_token()? {
                Token::RParen => return Ok(um.heap.list(&items)),
                // A leading dot is just the symbol `.`
                Token::Dot if !items.is_empty() => {
                    let tail = self.read_expr(um)?;
                    return match self.next_token()? {
                        Token::RParen => Ok(um.heap.list_with_tail(&items, tail)),
                        _ => Err(Error::with_message(
                            ErrorKind::Syntax,
                            "expected `)` after the tail of a dotted list",
                        )
                        .at(self.span())),
                    };
                }
                token => {
                    let item = self.read_from(um, token)?;
                    items.push(item);
                }
            }
        }
    }

    /// Items up to `close`, as a list
    fn read_until(&mut self, um: &mut Interpreter, close: &Token) -> Result<Value> {
        let mut items: SmallVec<[Value; 8]> = SmallVec::new();
        loop {
            let token = self.next_token()?;
            if &token == close {
                return Ok(um.heap.list(&items));
            }
            let item = self.read_from(um, token)?;
            items.push(item);
        }
    }

    /// `'x` and the other one-character prefixes wrap the next expression
    fn prefixed(&mut self, um: &mut Interpreter, head: Symbol) -> Result<Value> {
        let item = self.read_expr(um)?;
        Ok(um.heap.list(&[Value::Symbol(head), item]))
    }
}

/// Classifies an atom: a number, `nil`, an infix form, or else a symbol.
///
/// Infix operators are found scanning from the right, so `a::b::c` reads as
/// `((a 'b) 'c)`. Each side is itself parsed as an atom.
pub fn parse_simple(um: &mut Interpreter, atom: &str) -> Result<Value> {
    if let Ok(number) = atom.parse::<f64>() {
        return Ok(Value::Number(number));
    }
    if atom == "nil" {
        return Ok(Value::Nil);
    }

    let bytes = atom.as_bytes();
    for at in (0..bytes.len()).rev() {
        let (width, operator) = match (bytes[at], bytes.get(at + 1)) {
            (b'^', _) => (1, "^"),
            (b':', Some(b':')) => (2, "::"),
            (b'.', Some(b'.')) => (2, ".."),
            _ => continue,
        };
        let (left, right) = (&atom[..at], &atom[at + width..]);
        if left.is_empty() || right.is_empty() {
            return Err(Error::with_message(
                ErrorKind::Syntax,
                format!("`{operator}` needs an operand on each side"),
            ));
        }

        let left = parse_simple(um, left)?;
        let right = parse_simple(um, right)?;
        let wk = um.symbols.well_known;
        return Ok(match operator {
            "^" => um.heap.cons(left, right),
            "::" => {
                let quoted = um.heap.list(&[Value::Symbol(wk.quote), right]);
                um.heap.list(&[left, quoted])
            }
            _ => um.heap.list(&[Value::Symbol(wk.range), left, right]),
        });
    }

    Ok(Value::Symbol(um.symbols.intern(atom)))
}

impl Interpreter {
    /// Reads the next top-level form from `reader` without evaluating it.
    ///
    /// The form stays reachable until the next read, so a front end can evaluate it
    /// with [`Interpreter::eval_top`] and report it afterwards.
    pub fn read_next(&mut self, reader: &mut Reader<'_>) -> Result<Option<Value>> {
        let saved = self.heap.frame();
        let form = reader.read(self);
        if let Ok(Some(form)) = form {
            self.heap.set_pending(form);
        }
        self.heap.restore(saved);
        form
    }

    /// Parses every top-level form in `text` without evaluating anything.
    ///
    /// The forms stay reachable until the next call to `read`, so a front end can
    /// evaluate them one at a time with [`Interpreter::eval_top`].
    pub fn read(&mut self, text: &str) -> Result<Vec<Value>> {
        let saved = self.heap.frame();
        let forms = Reader::new(text).read_all(self);
        match forms {
            Ok(forms) => {
                let list = self.heap.list(&forms);
                self.heap.set_pending(list);
                self.heap.restore(saved);
                Ok(forms)
            }
            Err(err) => {
                self.heap.restore(saved);
                Err(err)
            }
        }
    }
}
