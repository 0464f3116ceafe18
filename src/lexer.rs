pub use logos::Span;
use logos::{Lexer, Logos};

/// Reads the body of a string literal after its opening quote.
///
/// `\n`, `\t` and `\r` are the only named escapes; any other escaped character stands for itself.
fn lex_string(lexer: &mut Lexer<Token>) -> Result<Box<str>, LexerError> {
    let mut string = String::new();
    let mut chars = lexer.remainder().char_indices();

    while let Some((at, c)) = chars.next() {
        match c {
            '"' => {
                lexer.bump(at + 1);
                return Ok(Box::from(string.as_str()));
            }
            '\\' => match chars.next() {
                Some((_, 'n')) => string.push('\n'),
                Some((_, 't')) => string.push('\t'),
                Some((_, 'r')) => string.push('\r'),
                Some((_, c)) => string.push(c),
                None => break,
            },
            c => string.push(c),
        }
    }

    // Swallow the rest so the error span covers the whole literal
    lexer.bump(lexer.remainder().len());
    Err(LexerError::UnterminatedString)
}

#[derive(thiserror::Error, Debug, PartialEq, Clone, Default)]
pub enum LexerError {
    #[default]
    #[error("invalid token encountered")]
    Invalid,
    #[error("unterminated string")]
    UnterminatedString,
}

/// Tokens are lexed from some source, and own the text they carry.
///
/// Whitespace and `;` line comments never reach the reader.
#[derive(Debug, Clone, PartialEq, Logos)]
#[logos(error = LexerError)]
#[logos(skip r"([ \t\r\n\f]|;[^\n]*)+")]
pub enum Token {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("'")]
    Quote,
    #[token("`")]
    Quasiquote,
    #[token(",")]
    Unquote,
    #[token(",@")]
    UnquoteSplicing,
    #[token("!")]
    Bang,
    #[token("&")]
    Ampersand,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,
    #[token("\"", lex_string)]
    String(Box<str>),
    /// Everything else, up to the next bracket, whitespace or comment.
    /// Numbers, `nil`, infix forms and plain symbols are told apart by the reader.
    #[regex(r#"[^(){}\[\]'`!&:.,;" \t\r\n\f][^(){}\[\] \t\r\n\f;]*"#, |l| Box::from(l.slice()))]
    Atom(Box<str>),
}

impl Token {
    pub fn lexer(source: &str) -> Lexer<Self> {
        <Self as Logos>::lexer(source)
    }
}

#[cfg(test)]
mod tests {
    use arbtest::arbtest;
    use assert2::{check, let_assert};

    use super::{LexerError, Token};

    fn tokens(source: &str) -> Vec<Result<Token, LexerError>> {
        Token::lexer(source).collect()
    }

    fn atom(text: &str) -> Result<Token, LexerError> {
        Ok(Token::Atom(Box::from(text)))
    }

    #[test]
    fn delimiters_only_start_tokens() {
        check!(
            tokens("(a.b :c)")
                == vec![
                    Ok(Token::LParen),
                    atom("a.b"),
                    Ok(Token::Colon),
                    atom("c"),
                    Ok(Token::RParen),
                ]
        );
        check!(tokens("math::pi") == vec![atom("math::pi")]);
        check!(tokens("1..5") == vec![atom("1..5")]);
        check!(
            tokens("'x`y!z&w") == vec![Ok(Token::Quote), atom("x`y!z&w")],
            "prefix characters inside an atom belong to it"
        );
    }

    #[test]
    fn unquote_forms() {
        check!(tokens(",@xs") == vec![Ok(Token::UnquoteSplicing), atom("xs")]);
        check!(tokens(", x") == vec![Ok(Token::Unquote), atom("x")]);
    }

    #[test]
    fn comments_and_whitespace_are_skipped() {
        check!(tokens("  ; nothing here\n\t").is_empty());
        check!(tokens("a;comment\nb") == vec![atom("a"), atom("b")]);
    }

    #[test]
    fn string_escapes() {
        check!(tokens(r#""a\nb\t\"q\"\\""#) == vec![Ok(Token::String(Box::from("a\nb\t\"q\"\\")))]);
        check!(tokens(r#""\z""#) == vec![Ok(Token::String(Box::from("z")))]);
        check!(tokens("\"multi\nline\"") == vec![Ok(Token::String(Box::from("multi\nline")))]);
    }

    #[test]
    fn unterminated_strings() {
        let mut lexer = Token::lexer(r#"(print "abc"#);
        check!(lexer.next() == Some(Ok(Token::LParen)));
        check!(lexer.next() == Some(atom("print")));
        let_assert!(Some(Err(LexerError::UnterminatedString)) = lexer.next());
        check!(lexer.span() == (7..11));
        check!(lexer.next().is_none());

        check!(tokens(r#""ends in escape\"#) == vec![Err(LexerError::UnterminatedString)]);
    }

    #[test]
    fn lexing_covers_the_source() {
        arbtest(|u| {
            let source: String = u.arbitrary()?;
            let mut lexer = Token::lexer(&source);
            let mut last_end = 0;
            while let Some(token) = lexer.next() {
                let span = lexer.span();
                check!(span.start >= last_end);
                check!(span.end > span.start);
                if let Ok(Token::Atom(text)) = token {
                    check!(&source[span.clone()] == text.as_ref());
                    check!(tokens(&text) == vec![Ok(Token::Atom(text.clone()))]);
                }
                last_end = span.end;
            }
            Ok(())
        });
    }
}
