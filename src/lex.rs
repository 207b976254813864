use crate::error::ErrorMessage;
use crate::lang::Location;
use logos::{Lexer, Logos};

#[derive(Logos, Debug, Clone, PartialEq)]
pub enum Token {
  #[regex(r"[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?[numkMBT%]?", number)]
  Number(f64),

  #[regex(r#""([^"\\]|\\.)*""#, string)]
  #[regex(r#"'([^'\\]|\\.)*'"#, string)]
  Str(String),

  #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
  Ident(String),

  #[regex(r"[A-Z][a-zA-Z0-9_]*(\.[a-zA-Z_][a-zA-Z0-9_]*)+", |lex| lex.slice().to_string())]
  Qualified(String),

  #[token("if")]
  If,
  #[token("then")]
  Then,
  #[token("else")]
  Else,
  #[token("true")]
  True,
  #[token("false")]
  False,
  #[token("import")]
  Import,
  #[token("export")]
  Export,
  #[token("as")]
  As,
  #[token("to")]
  To,

  #[token("(")]
  LParen,
  #[token(")")]
  RParen,
  #[token("[")]
  LBracket,
  #[token("]")]
  RBracket,
  #[token("{")]
  LBrace,
  #[token("}")]
  RBrace,
  #[token(",")]
  Comma,
  #[token(";")]
  Semicolon,
  #[token(":")]
  Colon,
  #[token("?")]
  Question,
  #[token("@")]
  At,
  #[token("|")]
  Bar,
  #[token("...")]
  Spread,
  #[token("->")]
  Arrow,

  #[token("=")]
  Assign,
  #[token("==")]
  Eq,
  #[token("!=")]
  Neq,
  #[token("<")]
  Lt,
  #[token("<=")]
  Leq,
  #[token(">")]
  Gt,
  #[token(">=")]
  Geq,
  #[token("&&")]
  And,
  #[token("||")]
  Or,
  #[token("!")]
  Bang,

  #[token("+")]
  Plus,
  #[token("-")]
  Minus,
  #[token("*")]
  Star,
  #[token("/")]
  Slash,
  #[token("^")]
  Caret,
  #[token(".+")]
  DotPlus,
  #[token(".-")]
  DotMinus,
  #[token(".*")]
  DotStar,
  #[token("./")]
  DotSlash,
  #[token(".^")]
  DotCaret,
  #[token(".")]
  Dot,

  #[error]
  #[regex(r"[ \t\r\n\f]+", logos::skip)]
  #[regex(r"//[^\n]*", logos::skip)]
  #[regex(r"/\*([^*]|\*+[^*/])*\*+/", logos::skip)]
  Error,
}

fn number(lex: &mut Lexer<Token>) -> Option<f64> {
  let slice = lex.slice();
  let (digits, scale) = match slice.chars().last() {
    Some(c) if !c.is_ascii_digit() => {
      let scale = match c {
        'n' => 1e-9,
        'u' => 1e-6,
        'm' => 1e-3,
        '%' => 1e-2,
        'k' => 1e3,
        'M' => 1e6,
        'B' => 1e9,
        'T' => 1e12,
        _ => return None,
      };
      (&slice[..slice.len() - 1], scale)
    }
    _ => (slice, 1.0),
  };
  digits.parse::<f64>().ok().map(|n| n * scale)
}

fn string(lex: &mut Lexer<Token>) -> Option<String> {
  let slice = lex.slice();
  let inner = &slice[1..slice.len() - 1];
  let mut out = String::with_capacity(inner.len());
  let mut chars = inner.chars();
  while let Some(c) = chars.next() {
    if c != '\\' {
      out.push(c);
      continue;
    }
    match chars.next()? {
      'n' => out.push('\n'),
      't' => out.push('\t'),
      'r' => out.push('\r'),
      other => out.push(other),
    }
  }
  Some(out)
}

/// Token stream consumed by the grammar in `parse.rs`.
pub struct Tokens {
  pub items: Vec<(Token, Location)>,
  pub eof: usize,
}

pub fn lex(source: &str) -> Result<Tokens, ErrorMessage> {
  let mut lexer = Token::lexer(source);
  let mut items = Vec::new();
  while let Some(token) = lexer.next() {
    let span = lexer.span();
    let location = Location::new(span.start, span.end);
    if token == Token::Error {
      return Err(ErrorMessage::Parse {
        message: format!("unexpected character sequence {:?}", lexer.slice()),
        location,
      });
    }
    items.push((token, location));
  }
  Ok(Tokens {
    items,
    eof: source.len(),
  })
}

impl peg::Parse for Tokens {
  type PositionRepr = usize;

  fn start<'input>(&'input self) -> usize {
    0
  }

  fn is_eof<'input>(&'input self, p: usize) -> bool {
    p >= self.items.len()
  }

  fn position_repr<'input>(&'input self, p: usize) -> usize {
    self.items.get(p).map(|(_, l)| l.start).unwrap_or(self.eof)
  }
}

impl<'input> peg::ParseElem<'input> for Tokens {
  type Element = (&'input Token, Location);

  fn parse_elem(&'input self, pos: usize) -> peg::RuleResult<Self::Element> {
    match self.items.get(pos) {
      Some((token, location)) => peg::RuleResult::Matched(pos + 1, (token, *location)),
      None => peg::RuleResult::Failed,
    }
  }
}
