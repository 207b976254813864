use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use string_interner::{DefaultSymbol as Symbol, StringInterner};

thread_local! {
  pub static INTERNER: RefCell<StringInterner> = RefCell::new(StringInterner::default());
}

/// An interned identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Var(Symbol);

impl Var {
  pub fn new(t: impl AsRef<str>) -> Self {
    INTERNER.with(|interner| {
      let symbol = interner.borrow_mut().get_or_intern(t.as_ref());
      Var(symbol)
    })
  }

  pub fn name(&self) -> String {
    INTERNER.with(|interner| {
      interner
        .borrow()
        .resolve(self.0)
        .map(str::to_owned)
        .unwrap_or_default()
    })
  }
}

pub fn v(t: impl AsRef<str>) -> Var {
  Var::new(t)
}

impl fmt::Debug for Var {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}", self.name())
  }
}

impl fmt::Display for Var {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}", self.name())
  }
}

/// Byte range of a node in its source text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Location {
  pub start: usize,
  pub end: usize,
}

impl Location {
  pub fn new(start: usize, end: usize) -> Self {
    Location { start, end }
  }

  pub fn to(self, other: Location) -> Location {
    Location::new(self.start.min(other.start), self.end.max(other.end))
  }

  pub fn contains(&self, offset: usize) -> bool {
    self.start <= offset && offset < self.end
  }

  /// 1-based line and column of `start`.
  pub fn line_col(&self, source: &str) -> (usize, usize) {
    let prefix = &source[..self.start.min(source.len())];
    let line = prefix.matches('\n').count() + 1;
    let column = prefix.rfind('\n').map(|i| prefix.len() - i).unwrap_or(prefix.len() + 1);
    (line, column)
  }
}

impl fmt::Display for Location {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}..{}", self.start, self.end)
  }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BinOp {
  Add,
  Sub,
  Mul,
  Div,
  Pow,
  DotAdd,
  DotSub,
  DotMul,
  DotDiv,
  DotPow,
  Eq,
  Neq,
  Lt,
  Leq,
  Gt,
  Geq,
  To,
}

impl BinOp {
  /// Name of the library function an infix operator desugars to.
  pub fn builtin_name(self) -> &'static str {
    use BinOp::*;
    match self {
      Add => "add",
      Sub => "subtract",
      Mul => "multiply",
      Div => "divide",
      Pow => "pow",
      DotAdd => "dotAdd",
      DotSub => "dotSubtract",
      DotMul => "dotMultiply",
      DotDiv => "dotDivide",
      DotPow => "dotPow",
      Eq => "equal",
      Neq => "unequal",
      Lt => "smaller",
      Leq => "smallerEq",
      Gt => "larger",
      Geq => "largerEq",
      To => "to",
    }
  }
}

impl fmt::Display for BinOp {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    use BinOp::*;
    let s = match self {
      Add => "+",
      Sub => "-",
      Mul => "*",
      Div => "/",
      Pow => "^",
      DotAdd => ".+",
      DotSub => ".-",
      DotMul => ".*",
      DotDiv => "./",
      DotPow => ".^",
      Eq => "==",
      Neq => "!=",
      Lt => "<",
      Leq => "<=",
      Gt => ">",
      Geq => ">=",
      To => "to",
    };
    write!(f, "{}", s)
  }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum UnaryOp {
  Neg,
  Not,
}

impl UnaryOp {
  pub fn builtin_name(self) -> &'static str {
    match self {
      UnaryOp::Neg => "unaryMinus",
      UnaryOp::Not => "not",
    }
  }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LogicOp {
  And,
  Or,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
  pub kind: ExprKind,
  pub location: Location,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
  Number(f64),
  Str(String),
  Bool(bool),
  Void,
  Ident(Var),
  /// `List.upTo`, `Math.pi`: a stdlib member or a field chain on a capitalized name.
  Qualified(String),
  Array(Vec<Expr>),
  Dict(Vec<DictEntry>),
  Lambda(Rc<LambdaDef>),
  Block(Vec<Stmt>, Box<Expr>),
  Call(Box<Expr>, Vec<Expr>),
  Bin(Box<Expr>, Box<Expr>, BinOp),
  Logic(Box<Expr>, Box<Expr>, LogicOp),
  Unary(Box<Expr>, UnaryOp),
  Index(Box<Expr>, Box<Expr>),
  Field(Box<Expr>, String),
  Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct LambdaDef {
  pub params: Vec<Var>,
  pub body: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DictEntry {
  KeyValue {
    key: String,
    key_location: Location,
    value: Expr,
  },
  Spread(Expr),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Decorator {
  pub name: String,
  pub args: Vec<Expr>,
  pub location: Location,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Stmt {
  pub var: Var,
  pub var_location: Location,
  pub kind: StmtKind,
  pub decorators: Vec<Decorator>,
  pub exported: bool,
  pub location: Location,
}

#[derive(Clone, Debug, PartialEq)]
pub enum StmtKind {
  Let(Expr),
  Defun(Rc<LambdaDef>),
}

impl Stmt {
  pub fn value_expr(&self) -> &Expr {
    match &self.kind {
      StmtKind::Let(e) => e,
      StmtKind::Defun(def) => &def.body,
    }
  }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Import {
  pub specifier: String,
  pub var: Var,
  pub location: Location,
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct Program {
  pub imports: Vec<Import>,
  pub statements: Vec<Stmt>,
  pub result: Option<Expr>,
}

impl Expr {
  pub fn new(kind: ExprKind, location: Location) -> Self {
    Expr { kind, location }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn interned_vars_compare_by_name() {
    assert_eq!(v("foo"), Var::new(String::from("foo")));
    assert_ne!(v("foo"), v("bar"));
    assert_eq!(v("foo").name(), "foo");
  }

  #[test]
  fn line_col_counts_from_one() {
    let src = "a = 1\nbb = 2";
    assert_eq!(Location::new(0, 1).line_col(src), (1, 1));
    assert_eq!(Location::new(7, 8).line_col(src), (2, 2));
  }
}
