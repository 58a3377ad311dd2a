//! Grammar expressions
//!
//! Rule bodies are trees of combinators. Symbols are referenced by name and
//! resolved when the grammar is built.

use std::fmt;

/// Associativity attached to a precedence level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum Assoc {
    #[default]
    None,
    Left,
    Right,
}

/// Precedence level and associativity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Precedence {
    pub level: i32,
    pub assoc: Assoc,
}

impl Precedence {
    #[must_use]
    pub const fn new(level: i32, assoc: Assoc) -> Self {
        Self { level, assoc }
    }
}

/// Grammar expression representing a rule body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Matches nothing
    Blank,
    /// Reference to a rule or named token
    Symbol(String),
    /// Anonymous literal token
    Literal(String),
    /// Match all expressions in order
    Seq(Vec<Expr>),
    /// Match any one of the expressions
    Choice(Vec<Expr>),
    /// Zero or one occurrence
    Optional(Box<Expr>),
    /// Zero or more occurrences
    Repeat(Box<Expr>),
    /// One or more occurrences
    Repeat1(Box<Expr>),
    /// Label the nodes produced by `expr` with a field name
    Field { name: String, expr: Box<Expr> },
    /// Attach precedence to the productions produced by `expr`
    Prec { prec: Precedence, expr: Box<Expr> },
}

impl Expr {
    #[must_use]
    pub fn sym(name: impl Into<String>) -> Self {
        Self::Symbol(name.into())
    }

    #[must_use]
    pub fn lit(text: impl Into<String>) -> Self {
        Self::Literal(text.into())
    }

    #[must_use]
    pub fn seq(exprs: impl IntoIterator<Item = Self>) -> Self {
        let mut items: Vec<Self> = exprs.into_iter().collect();
        if items.len() == 1 {
            return items.remove(0);
        }
        Self::Seq(items)
    }

    #[must_use]
    pub fn choice(exprs: impl IntoIterator<Item = Self>) -> Self {
        let mut items: Vec<Self> = exprs.into_iter().collect();
        if items.len() == 1 {
            return items.remove(0);
        }
        Self::Choice(items)
    }

    #[must_use]
    pub fn optional(expr: Self) -> Self {
        Self::Optional(Box::new(expr))
    }

    #[must_use]
    pub fn repeat(expr: Self) -> Self {
        Self::Repeat(Box::new(expr))
    }

    #[must_use]
    pub fn repeat1(expr: Self) -> Self {
        Self::Repeat1(Box::new(expr))
    }

    #[must_use]
    pub fn field(name: impl Into<String>, expr: Self) -> Self {
        Self::Field {
            name: name.into(),
            expr: Box::new(expr),
        }
    }

    #[must_use]
    pub fn prec(level: i32, expr: Self) -> Self {
        Self::with_prec(Precedence::new(level, Assoc::None), expr)
    }

    #[must_use]
    pub fn prec_left(level: i32, expr: Self) -> Self {
        Self::with_prec(Precedence::new(level, Assoc::Left), expr)
    }

    #[must_use]
    pub fn prec_right(level: i32, expr: Self) -> Self {
        Self::with_prec(Precedence::new(level, Assoc::Right), expr)
    }

    #[must_use]
    pub fn with_prec(prec: Precedence, expr: Self) -> Self {
        Self::Prec {
            prec,
            expr: Box::new(expr),
        }
    }

    /// Visit every symbol name referenced by this expression.
    pub fn for_each_symbol<'a>(&'a self, f: &mut impl FnMut(&'a str)) {
        match self {
            Self::Symbol(name) => f(name),
            Self::Blank | Self::Literal(_) => {}
            Self::Seq(items) | Self::Choice(items) => {
                for item in items {
                    item.for_each_symbol(f);
                }
            }
            Self::Optional(expr)
            | Self::Repeat(expr)
            | Self::Repeat1(expr)
            | Self::Field { expr, .. }
            | Self::Prec { expr, .. } => expr.for_each_symbol(f),
        }
    }

    /// Visit every anonymous literal in this expression.
    pub fn for_each_literal<'a>(&'a self, f: &mut impl FnMut(&'a str)) {
        match self {
            Self::Literal(text) => f(text),
            Self::Blank | Self::Symbol(_) => {}
            Self::Seq(items) | Self::Choice(items) => {
                for item in items {
                    item.for_each_literal(f);
                }
            }
            Self::Optional(expr)
            | Self::Repeat(expr)
            | Self::Repeat1(expr)
            | Self::Field { expr, .. }
            | Self::Prec { expr, .. } => expr.for_each_literal(f),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blank => write!(f, "()"),
            Self::Symbol(name) => write!(f, "{name}"),
            Self::Literal(text) => write!(f, "{text:?}"),
            Self::Seq(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
            Self::Choice(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
            Self::Optional(expr) => write!(f, "{expr}?"),
            Self::Repeat(expr) => write!(f, "{expr}*"),
            Self::Repeat1(expr) => write!(f, "{expr}+"),
            Self::Field { name, expr } => write!(f, "{name}: {expr}"),
            Self::Prec { prec, expr } => write!(f, "prec({}, {expr})", prec.level),
        }
    }
}
