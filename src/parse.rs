//! Grammar over the token stream produced by `lex`.

use crate::error::ErrorMessage;
use crate::lang::{
  BinOp, Decorator, DictEntry, Expr, ExprKind, Import, LambdaDef, Location, LogicOp, Program, Stmt, StmtKind,
  UnaryOp, Var,
};
use crate::lex::{lex, Token, Tokens};
use std::cell::Cell;
use std::rc::Rc;

/// Deepest nesting of brackets, prefix operators and branches a source may use.
pub const MAX_NESTING: usize = 256;

const PARSE_STACK_SIZE: usize = 32 * 1024 * 1024;

thread_local! {
  static NESTING: Cell<usize> = Cell::new(0);
  /// Token index where the nesting bound was first hit.
  static TOO_DEEP: Cell<Option<usize>> = Cell::new(None);
}

fn enter_nesting(pos: usize) -> Result<(), &'static str> {
  NESTING.with(|depth| {
    if depth.get() >= MAX_NESTING {
      TOO_DEEP.with(|at| {
        if at.get().is_none() {
          at.set(Some(pos));
        }
      });
      Err("shallower nesting")
    } else {
      depth.set(depth.get() + 1);
      Ok(())
    }
  })
}

fn leave_nesting<T>(parsed: Option<T>) -> Result<T, &'static str> {
  NESTING.with(|depth| depth.set(depth.get().saturating_sub(1)));
  parsed.ok_or("expression")
}

fn bin(a: Expr, b: Expr, op: BinOp) -> Expr {
  let location = a.location.to(b.location);
  Expr::new(ExprKind::Bin(Box::new(a), Box::new(b), op), location)
}

fn fold_bin(first: Expr, rest: Vec<(BinOp, Expr)>) -> Expr {
  rest.into_iter().fold(first, |a, (op, b)| bin(a, b, op))
}

fn fold_logic(first: Expr, rest: Vec<Expr>, op: LogicOp) -> Expr {
  rest.into_iter().fold(first, |a, b| {
    let location = a.location.to(b.location);
    Expr::new(ExprKind::Logic(Box::new(a), Box::new(b), op), location)
  })
}

fn ternary(c: Expr, a: Expr, b: Expr, start: Location) -> Expr {
  let location = start.to(b.location);
  Expr::new(ExprKind::Ternary(Box::new(c), Box::new(a), Box::new(b)), location)
}

fn call(f: Expr, args: Vec<Expr>, end: Location) -> Expr {
  let location = f.location.to(end);
  Expr::new(ExprKind::Call(Box::new(f), args), location)
}

/// Statements followed by a result expression, as in blocks and lambda bodies.
fn with_statements(stmts: Vec<Stmt>, result: Expr, location: Location) -> Expr {
  if stmts.is_empty() {
    result
  } else {
    Expr::new(ExprKind::Block(stmts, Box::new(result)), location)
  }
}

enum Postfix {
  Call(Vec<Expr>, Location),
  Index(Expr, Location),
  Field(String, Location),
}

fn apply_postfix(e: Expr, op: Postfix) -> Expr {
  match op {
    Postfix::Call(args, end) => call(e, args, end),
    Postfix::Index(i, end) => {
      let location = e.location.to(end);
      Expr::new(ExprKind::Index(Box::new(e), Box::new(i)), location)
    }
    Postfix::Field(name, end) => {
      let location = e.location.to(end);
      Expr::new(ExprKind::Field(Box::new(e), name), location)
    }
  }
}

peg::parser! {
  grammar squiggle() for Tokens {
    rule t(expected: Token) -> Location
      = [(token, l) if *token == expected] { l }

    rule semis() = t(Token::Semicolon)*

    rule enter() = p:position!() {? enter_nesting(p) }

    rule nested<T>(r: rule<T>) -> T
      = enter() v:r()? {? leave_nesting(v) }

    rule name() -> (Var, Location)
      = [(Token::Ident(s), l)] { (Var::new(s), l) }

    rule qualified() -> Expr
      = [(Token::Qualified(s), l)] { Expr::new(ExprKind::Qualified(s.clone()), l) }

    rule literal() -> Expr
      = [(Token::Number(n), l)] { Expr::new(ExprKind::Number(*n), l) }
      / [(Token::Str(s), l)] { Expr::new(ExprKind::Str(s.clone()), l) }
      / [(Token::True, l)] { Expr::new(ExprKind::Bool(true), l) }
      / [(Token::False, l)] { Expr::new(ExprKind::Bool(false), l) }

    pub rule program() -> Program
      = semis()
        imports:(i:import() semis() { i })*
        statements:(s:statement() semis() { s })*
        result:(e:expr() semis() { e })?
      { Program { imports, statements, result } }

    rule import() -> Import
      = start:t(Token::Import) [(Token::Str(specifier), _)] t(Token::As) n:name() {
        Import { specifier: specifier.clone(), var: n.0, location: start.to(n.1) }
      }

    rule decorator() -> Decorator
      = start:t(Token::At) n:name() args:call_args()? {
        let (args, end) = args.unwrap_or((Vec::new(), n.1));
        Decorator { name: n.0.name(), args, location: start.to(end) }
      }

    rule statement() -> Stmt
      = decorators:decorator()* export:t(Token::Export)? n:name() kind:binding() {
        let start = decorators
          .first()
          .map(|d| d.location)
          .or(export)
          .unwrap_or(n.1);
        let end = match &kind {
          StmtKind::Let(e) => e.location,
          StmtKind::Defun(def) => def.body.location,
        };
        Stmt {
          var: n.0,
          var_location: n.1,
          kind,
          decorators,
          exported: export.is_some(),
          location: start.to(end),
        }
      }

    rule binding() -> StmtKind
      = t(Token::LParen) params:(name() ** t(Token::Comma)) t(Token::RParen) t(Token::Assign) body:expr() {
        StmtKind::Defun(Rc::new(LambdaDef { params: params.into_iter().map(|p| p.0).collect(), body }))
      }
      / t(Token::Assign) e:expr() { StmtKind::Let(e) }

    pub rule expr() -> Expr = nested(<branch()>)

    rule branch() -> Expr
      = start:t(Token::If) c:expr() t(Token::Then) a:expr() t(Token::Else) b:expr() { ternary(c, a, b, start) }
      / c:or() branches:(t(Token::Question) a:expr() t(Token::Colon) b:expr() { (a, b) })? {
        match branches {
          Some((a, b)) => {
            let start = c.location;
            ternary(c, a, b, start)
          }
          None => c,
        }
      }

    rule or() -> Expr
      = first:and() rest:(t(Token::Or) e:and() { e })* { fold_logic(first, rest, LogicOp::Or) }

    rule and() -> Expr
      = first:comparison() rest:(t(Token::And) e:comparison() { e })* { fold_logic(first, rest, LogicOp::And) }

    rule comparison_op() -> BinOp
      = [(Token::Eq, _)] { BinOp::Eq }
      / [(Token::Neq, _)] { BinOp::Neq }
      / [(Token::Lt, _)] { BinOp::Lt }
      / [(Token::Leq, _)] { BinOp::Leq }
      / [(Token::Gt, _)] { BinOp::Gt }
      / [(Token::Geq, _)] { BinOp::Geq }

    rule comparison() -> Expr
      = first:range() rest:(op:comparison_op() e:range() { (op, e) })* { fold_bin(first, rest) }

    rule range() -> Expr
      = a:additive() upper:(t(Token::To) b:additive() { b })? {
        match upper {
          Some(b) => bin(a, b, BinOp::To),
          None => a,
        }
      }

    rule additive_op() -> BinOp
      = [(Token::Plus, _)] { BinOp::Add }
      / [(Token::Minus, _)] { BinOp::Sub }
      / [(Token::DotPlus, _)] { BinOp::DotAdd }
      / [(Token::DotMinus, _)] { BinOp::DotSub }

    rule additive() -> Expr
      = first:multiplicative() rest:(op:additive_op() e:multiplicative() { (op, e) })* { fold_bin(first, rest) }

    rule multiplicative_op() -> BinOp
      = [(Token::Star, _)] { BinOp::Mul }
      / [(Token::Slash, _)] { BinOp::Div }
      / [(Token::DotStar, _)] { BinOp::DotMul }
      / [(Token::DotSlash, _)] { BinOp::DotDiv }

    rule multiplicative() -> Expr
      = first:power() rest:(op:multiplicative_op() e:power() { (op, e) })* { fold_bin(first, rest) }

    rule power_op() -> BinOp
      = [(Token::Caret, _)] { BinOp::Pow }
      / [(Token::DotCaret, _)] { BinOp::DotPow }

    // Right associative.
    rule power() -> Expr
      = a:pipe() rest:(op:power_op() b:nested(<power()>) { (op, b) })? {
        match rest {
          Some((op, b)) => bin(a, b, op),
          None => a,
        }
      }

    rule pipe_target() -> Expr
      = n:name() { Expr::new(ExprKind::Ident(n.0), n.1) }
      / qualified()
      / t(Token::LParen) e:expr() t(Token::RParen) { e }

    rule pipe() -> Expr
      = first:unary() stages:(t(Token::Arrow) f:pipe_target() args:call_args()? { (f, args) })* {
        stages.into_iter().fold(first, |acc, (f, args)| {
          let (rest, end) = args.unwrap_or_else(|| (Vec::new(), f.location));
          let location = acc.location.to(end);
          let mut all = vec![acc];
          all.extend(rest);
          Expr::new(ExprKind::Call(Box::new(f), all), location)
        })
      }

    rule unary() -> Expr
      = start:t(Token::Minus) e:nested(<unary()>) {
        let location = start.to(e.location);
        Expr::new(ExprKind::Unary(Box::new(e), UnaryOp::Neg), location)
      }
      / start:t(Token::Bang) e:nested(<unary()>) {
        let location = start.to(e.location);
        Expr::new(ExprKind::Unary(Box::new(e), UnaryOp::Not), location)
      }
      / postfix()

    rule call_args() -> (Vec<Expr>, Location)
      = t(Token::LParen) args:(expr() ** t(Token::Comma)) t(Token::Comma)? end:t(Token::RParen) { (args, end) }

    rule postfix_op() -> Postfix
      = args:call_args() { Postfix::Call(args.0, args.1) }
      / t(Token::LBracket) i:expr() end:t(Token::RBracket) { Postfix::Index(i, end) }
      / t(Token::Dot) n:name() { Postfix::Field(n.0.name(), n.1) }

    rule postfix() -> Expr
      = e:primary() ops:postfix_op()* { ops.into_iter().fold(e, apply_postfix) }

    rule primary() -> Expr
      = literal()
      / n:name() { Expr::new(ExprKind::Ident(n.0), n.1) }
      / qualified()
      / start:t(Token::LParen) end:t(Token::RParen) { Expr::new(ExprKind::Void, start.to(end)) }
      / t(Token::LParen) e:expr() t(Token::RParen) { e }
      / start:t(Token::LBracket) es:(expr() ** t(Token::Comma)) t(Token::Comma)? end:t(Token::RBracket) {
        Expr::new(ExprKind::Array(es), start.to(end))
      }
      / lambda()
      / record()
      / block()

    rule block_body() -> (Vec<Stmt>, Expr)
      = semis() stmts:(s:statement() semis() { s })* e:expr() semis() { (stmts, e) }

    rule lambda_params() -> Vec<Var>
      = t(Token::Or) { Vec::new() }
      / t(Token::Bar) params:(name() ** t(Token::Comma)) t(Token::Bar) { params.into_iter().map(|p| p.0).collect() }

    rule lambda() -> Expr
      = start:t(Token::LBrace) params:lambda_params() b:block_body() end:t(Token::RBrace) {
        let location = start.to(end);
        let body = with_statements(b.0, b.1, location);
        Expr::new(ExprKind::Lambda(Rc::new(LambdaDef { params, body })), location)
      }

    rule record_entry() -> DictEntry
      = t(Token::Spread) e:expr() { DictEntry::Spread(e) }
      / [(Token::Ident(key) | Token::Str(key), key_location)] t(Token::Colon) value:expr() {
        DictEntry::KeyValue { key: key.clone(), key_location, value }
      }
      / n:name() {
        let value = Expr::new(ExprKind::Ident(n.0), n.1);
        DictEntry::KeyValue { key: n.0.name(), key_location: n.1, value }
      }

    // `{x}` is a block, `{x,}` a record.
    rule record() -> Expr
      = start:t(Token::LBrace) end:t(Token::RBrace) { Expr::new(ExprKind::Dict(Vec::new()), start.to(end)) }
      / !(t(Token::LBrace) name() t(Token::RBrace))
        start:t(Token::LBrace) entries:(record_entry() ++ t(Token::Comma)) t(Token::Comma)? end:t(Token::RBrace) {
        Expr::new(ExprKind::Dict(entries), start.to(end))
      }

    rule block() -> Expr
      = start:t(Token::LBrace) b:block_body() end:t(Token::RBrace) { with_statements(b.0, b.1, start.to(end)) }
  }
}

fn parse_error(source: &str, tokens: &Tokens, offset: usize) -> ErrorMessage {
  match tokens.items.iter().find(|(_, l)| l.start == offset) {
    Some((_, location)) => ErrorMessage::Parse {
      message: format!("unexpected {:?}", &source[location.start..location.end]),
      location: *location,
    },
    None => ErrorMessage::Parse {
      message: "unexpected end of input".to_string(),
      location: Location::new(offset, offset),
    },
  }
}

/// Runs a grammar entry point on a fresh nesting count and a stack large
/// enough for `MAX_NESTING` levels.
fn run_grammar<T>(
  source: &str,
  entry: impl FnOnce(&Tokens) -> Result<T, peg::error::ParseError<usize>>,
) -> Result<T, ErrorMessage> {
  let tokens = lex(source)?;
  NESTING.with(|depth| depth.set(0));
  TOO_DEEP.with(|at| at.set(None));
  let result = stacker::maybe_grow(PARSE_STACK_SIZE, PARSE_STACK_SIZE, || entry(&tokens));
  result.map_err(|e| match TOO_DEEP.with(Cell::get) {
    Some(pos) => ErrorMessage::Parse {
      message: format!("expression is nested more than {} levels deep", MAX_NESTING),
      location: tokens.items.get(pos).map(|(_, l)| *l).unwrap_or(Location::new(tokens.eof, tokens.eof)),
    },
    None => parse_error(source, &tokens, e.location),
  })
}

pub fn parse(source: &str) -> Result<Program, ErrorMessage> {
  run_grammar(source, |tokens| squiggle::program(tokens))
}

pub fn parse_expr(source: &str) -> Result<Expr, ErrorMessage> {
  run_grammar(source, |tokens| squiggle::expr(tokens))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::lang::v;

  fn shape(e: &Expr) -> String {
    match &e.kind {
      ExprKind::Number(n) => n.to_string(),
      ExprKind::Str(s) => format!("{:?}", s),
      ExprKind::Bool(b) => b.to_string(),
      ExprKind::Void => "()".to_string(),
      ExprKind::Ident(x) => x.name(),
      ExprKind::Qualified(s) => s.clone(),
      ExprKind::Array(es) => format!("[{}]", es.iter().map(shape).collect::<Vec<_>>().join(" ")),
      ExprKind::Dict(entries) => format!("{{{} entries}}", entries.len()),
      ExprKind::Lambda(def) => format!("(fn {} {})", def.params.len(), shape(&def.body)),
      ExprKind::Block(stmts, e) => format!("(block {} {})", stmts.len(), shape(e)),
      ExprKind::Call(f, args) => format!(
        "({} {})",
        shape(f),
        args.iter().map(shape).collect::<Vec<_>>().join(" ")
      ),
      ExprKind::Bin(a, b, op) => format!("({} {} {})", op, shape(a), shape(b)),
      ExprKind::Logic(a, b, op) => format!("({:?} {} {})", op, shape(a), shape(b)),
      ExprKind::Unary(a, op) => format!("({:?} {})", op, shape(a)),
      ExprKind::Index(a, i) => format!("(index {} {})", shape(a), shape(i)),
      ExprKind::Field(a, k) => format!("(field {} {})", shape(a), k),
      ExprKind::Ternary(c, a, b) => format!("(if {} {} {})", shape(c), shape(a), shape(b)),
    }
  }

  fn p(src: &str) -> String {
    shape(&parse_expr(src).unwrap())
  }

  #[test]
  fn operator_precedence() {
    assert_eq!(p("1 + 2 * 3 ^ 2"), "(+ 1 (* 2 (^ 3 2)))");
    assert_eq!(p("-2 ^ 2"), "(^ (Neg 2) 2)");
    assert_eq!(p("2 ^ 3 ^ 2"), "(^ 2 (^ 3 2))");
    assert_eq!(p("1 to 2 + 3"), "(to 1 (+ 2 3))");
    assert_eq!(p("a || b && c == d"), "(Or a (And b (== c d)))");
    assert_eq!(p("a .* b .+ c"), "(.+ (.* a b) c)");
  }

  #[test]
  fn conditionals() {
    assert_eq!(p("a ? 1 : b ? 2 : 3"), "(if a 1 (if b 2 3))");
    assert_eq!(p("if x < 1 then 0 else x"), "(if (< x 1) 0 x)");
  }

  #[test]
  fn postfix_and_pipes() {
    assert_eq!(p("r.a[0](1, 2)"), "((index (field r a) 0) 1 2)");
    assert_eq!(p("x -> f -> List.map(g)"), "(List.map (f x) g)");
    assert_eq!(p("2 * 3 -> f"), "(* 2 (f 3))");
  }

  #[test]
  fn braces_disambiguate() {
    assert_eq!(p("{}"), "{0 entries}");
    assert_eq!(p("{x}"), "x");
    assert_eq!(p("{x,}"), "{1 entries}");
    assert_eq!(p("{a: 1, \"b c\": 2, d, ...e}"), "{4 entries}");
    assert_eq!(p("{y = 2; y * 3}"), "(block 1 (* y 3))");
    assert_eq!(p("{|x, i| x + i}"), "(fn 2 (+ x i))");
    assert_eq!(p("{|| 1}"), "(fn 0 1)");
    assert_eq!(p("()"), "()");
  }

  #[test]
  fn programs_split_statements_without_separators() {
    let program = parse("import \"lib\" as lib\n@name(\"X\")\nexport x = 1\nf(a, b) = a + b; f(x, 2)").unwrap();
    assert_eq!(program.imports.len(), 1);
    assert_eq!(program.imports[0].specifier, "lib");
    assert_eq!(program.imports[0].var, v("lib"));
    assert_eq!(program.statements.len(), 2);
    let x = &program.statements[0];
    assert!(x.exported);
    assert_eq!(x.decorators[0].name, "name");
    assert_eq!(x.location.start, 20);
    assert!(matches!(program.statements[1].kind, StmtKind::Defun(_)));
    assert_eq!(program.result.as_ref().map(shape).as_deref(), Some("(f x 2)"));
  }

  #[test]
  fn program_without_result() {
    let program = parse("a = 1\nb = a").unwrap();
    assert_eq!(program.statements.len(), 2);
    assert!(program.result.is_none());
  }

  #[test]
  fn errors_point_at_the_offending_token() {
    match parse("x = 1\ny = )") {
      Err(ErrorMessage::Parse { message, location }) => {
        assert_eq!(location, Location::new(10, 11));
        assert_eq!(message, "unexpected \")\"");
      }
      other => panic!("expected a parse error, got {:?}", other),
    }
    match parse("a = (1 + 2") {
      Err(ErrorMessage::Parse { location, .. }) => assert_eq!(location, Location::new(10, 10)),
      other => panic!("expected a parse error, got {:?}", other),
    }
  }

  #[test]
  fn nesting_is_bounded() {
    let shallow = format!("{}1{}", "(".repeat(100), ")".repeat(100));
    assert_eq!(p(&shallow), "1");

    let deep = format!("{}1{}", "(".repeat(500), ")".repeat(500));
    match parse(&deep) {
      Err(ErrorMessage::Parse { message, location }) => {
        assert_eq!(location, Location::new(MAX_NESTING, MAX_NESTING + 1));
        assert!(message.contains("nested"), "{}", message);
      }
      other => panic!("expected a parse error, got {:?}", other),
    }

    let negations = format!("{}1", "-".repeat(400));
    assert!(matches!(parse_expr(&negations), Err(ErrorMessage::Parse { .. })));
    let brackets = format!("{}1{}", "[".repeat(300), "]".repeat(300));
    assert!(matches!(parse_expr(&brackets), Err(ErrorMessage::Parse { .. })));
    // Bound state resets between parses.
    assert_eq!(p(&shallow), "1");
  }

  #[test]
  fn long_chains_parse_iteratively() {
    let src = vec!["1"; 3000].join(" + ");
    let e = parse_expr(&src).unwrap();
    assert!(matches!(e.kind, ExprKind::Bin(_, _, BinOp::Add)));
    assert_eq!(e.location, Location::new(0, src.len()));
  }
}
