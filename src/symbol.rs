//! Symbol interning

use lasso::{Capacity, Key, Rodeo, Spur};

/// An interned name. Two symbols compare equal exactly when they were interned from the same spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(Spur);

impl Symbol {
    /// Stable integer identity, assigned at intern time
    pub fn id(&self) -> usize {
        self.0.into_usize()
    }
}

macro_rules! well_known {
    ($($field:ident => $name:literal),* $(,)?) => {
        /// Symbols the reader and evaluator recognize by identity
        #[derive(Debug, Clone, Copy)]
        pub struct WellKnown {
            $(pub $field: Symbol,)*
        }

        impl WellKnown {
            fn intern(rodeo: &mut Rodeo) -> Self {
                Self {
                    $($field: Symbol(rodeo.get_or_intern_static($name)),)*
                }
            }
        }
    };
}

well_known! {
    quote => "quote",
    quasiquote => "quasiquote",
    unquote => "unquote",
    unquote_splicing => "unquote-splicing",
    def => "def",
    set => "set",
    constant => "const",
    defun => "defun",
    fn_ => "fn",
    lambda => "lambda",
    backslash => "\\",
    if_ => "if",
    cond => "cond",
    switch => "switch",
    match_ => "match",
    mac => "mac",
    do_ => "do",
    try_ => "try",
    nil => "nil",
    not => "not",
    curry => "curry",
    range => "range",
    dot => ".",
}

pub struct Symbols {
    rodeo: Rodeo,
    pub well_known: WellKnown,
}

impl Symbols {
    pub fn with_capacity(capacity: usize) -> Self {
        let mut rodeo = Rodeo::with_capacity(Capacity::for_strings(capacity.max(1)));
        let well_known = WellKnown::intern(&mut rodeo);
        Self { rodeo, well_known }
    }

    pub fn intern(&mut self, name: impl AsRef<str>) -> Symbol {
        Symbol(self.rodeo.get_or_intern(name.as_ref()))
    }

    /// Looks a name up without interning it
    pub fn get(&self, name: impl AsRef<str>) -> Option<Symbol> {
        self.rodeo.get(name.as_ref()).map(Symbol)
    }

    pub fn resolve(&self, symbol: Symbol) -> &str {
        self.rodeo.resolve(&symbol.0)
    }

    pub fn len(&self) -> usize {
        self.rodeo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rodeo.is_empty()
    }
}

impl Default for Symbols {
    fn default() -> Self {
        Self::with_capacity(1000)
    }
}

#[cfg(test)]
mod tests {
    use arbtest::arbtest;
    use assert2::check;

    use super::Symbols;

    #[test]
    fn well_known_symbols_are_interned() {
        let mut symbols = Symbols::default();
        let quote = symbols.intern("quote");
        check!(quote == symbols.well_known.quote);
        check!(symbols.resolve(symbols.well_known.unquote_splicing) == "unquote-splicing");
        check!(symbols.get("never-seen").is_none());
    }

    #[test]
    fn interning_is_identity() {
        arbtest(|u| {
            let mut symbols = Symbols::with_capacity(4);
            let name: String = u.arbitrary()?;
            let first = symbols.intern(&name);
            let count = symbols.len();
            let second = symbols.intern(name.clone());
            check!(first == second);
            check!(first.id() == second.id());
            check!(symbols.len() == count);
            check!(symbols.resolve(first) == name);
            Ok(())
        });
    }
}
