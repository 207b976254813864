//! Tree-walking evaluation of programs over persistent bindings.

use crate::env::Environment;
use crate::error::{Error, ErrorMessage};
use crate::frame::{Frame, FrameStack};
use crate::lang::{
  Decorator, DictEntry, Expr, ExprKind, LambdaDef, Location, LogicOp, Program, Stmt, StmtKind, Var,
};
use crate::registry::Registry;
use crate::tags::ValueTags;
use crate::value::{Bindings, Lambda, UserLambda, Value};
use indexmap::IndexMap;
use rand::rngs::StdRng;
use std::rc::Rc;

const STACK_RED_ZONE: usize = 128 * 1024;
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

/// Bound on nested expression evaluation, calls included.
pub const MAX_EXPR_DEPTH: usize = 20_000;

/// Everything a running program may touch besides its bindings.
pub struct Context {
  pub env: Environment,
  pub registry: Rc<Registry>,
  pub rng: StdRng,
  pub frames: FrameStack,
  depth: usize,
}

impl Context {
  pub fn new(env: Environment, registry: Rc<Registry>) -> Self {
    let rng = env.rng();
    let frames = FrameStack::new(env.max_call_depth);
    Context {
      env,
      registry,
      rng,
      frames,
      depth: 0,
    }
  }

  /// Calls a user lambda or a library function inside a new frame.
  pub fn call(&mut self, f: &Lambda, args: Vec<Value>, location: Option<Location>) -> Result<Value, Error> {
    if !self.frames.push(Frame::new(f.name(), location)) {
      return Err(Error::with_stack(
        ErrorMessage::CallStackExceeded(self.frames.max_depth()),
        &self.frames,
      ));
    }
    let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || match f {
      Lambda::User(l) => self.call_user(f, l, args),
      Lambda::Builtin(entry) => entry.call(&args, self),
    });
    let result = result.map_err(|e| e.in_frames(&self.frames));
    self.frames.pop();
    result
  }

  fn call_user(&mut self, f: &Lambda, l: &UserLambda, args: Vec<Value>) -> Result<Value, Error> {
    let params = &l.def.params;
    if params.len() != args.len() {
      return Err(
        ErrorMessage::argument(format!(
          "{} expects {} argument{}, got {}",
          f.name(),
          params.len(),
          if params.len() == 1 { "" } else { "s" },
          args.len()
        ))
        .into(),
      );
    }
    let mut scope = l.captured.clone();
    if let Some(name) = &l.name {
      scope.insert(Var::new(name), Value::Lambda(f.clone()));
    }
    for (param, arg) in params.iter().zip(args) {
      scope.insert(*param, arg);
    }
    eval_expr(&l.def.body, &scope, self)
  }

  fn call_named(&mut self, name: &str, args: Vec<Value>, location: Location) -> Result<Value, Error> {
    let entry = self
      .registry
      .entry(name)
      .ok_or_else(|| ErrorMessage::internal(format!("missing builtin {}", name)))?;
    self.call(&Lambda::Builtin(entry), args, Some(location))
  }
}

/// What a program leaves behind.
#[derive(Debug, Clone)]
pub struct ProgramOutput {
  pub result: Value,
  /// All bindings visible at the end, inherited ones included.
  pub bindings: Bindings,
  /// Bindings introduced by the program's own statements, in order.
  pub own: IndexMap<String, Value>,
  pub exports: IndexMap<String, Value>,
}

pub fn eval_program(program: &Program, base: &Bindings, ctx: &mut Context) -> Result<ProgramOutput, Error> {
  let mut scope = base.clone();
  let mut own = IndexMap::new();
  let mut exports = IndexMap::new();
  for stmt in &program.statements {
    let value = eval_stmt(stmt, &scope, ctx)?;
    scope.insert(stmt.var, value.clone());
    let name = stmt.var.name();
    if stmt.exported {
      exports.insert(name.clone(), value.clone());
    }
    own.insert(name, value);
  }
  let result = match &program.result {
    Some(e) => eval_expr(e, &scope, ctx)?,
    None => Value::Void,
  };
  Ok(ProgramOutput {
    result,
    bindings: scope,
    own,
    exports,
  })
}

fn lambda_value(def: &Rc<LambdaDef>, name: Option<String>, scope: &Bindings, location: Location) -> Value {
  Value::Lambda(Lambda::User(Rc::new(UserLambda {
    name,
    def: Rc::clone(def),
    captured: scope.clone(),
    location,
  })))
}

fn decorator_tags(decorators: &[Decorator], scope: &Bindings, ctx: &mut Context) -> Result<ValueTags, Error> {
  let mut tags = ValueTags::default();
  for d in decorators {
    let args = d
      .args
      .iter()
      .map(|a| eval_expr(a, scope, ctx))
      .collect::<Result<Vec<_>, _>>()?;
    let text = |i: usize| -> Result<String, Error> {
      args
        .get(i)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| Error::new(ErrorMessage::argument(format!("@{} expects a String", d.name))).at(d.location))
    };
    match d.name.as_str() {
      "name" => tags.name = Some(text(0)?),
      "doc" => tags.doc = Some(text(0)?),
      "format" => tags.format = Some(text(0)?),
      "showAs" => {
        tags.show_as = Some(args.first().cloned().ok_or_else(|| {
          Error::new(ErrorMessage::argument("@showAs expects a value")).at(d.location)
        })?)
      }
      "hide" => tags.hidden = Some(args.first().and_then(Value::as_bool).unwrap_or(true)),
      other => {
        return Err(Error::new(ErrorMessage::Type(format!("unknown decorator @{}", other))).at(d.location));
      }
    }
  }
  Ok(tags)
}

pub fn eval_stmt(stmt: &Stmt, scope: &Bindings, ctx: &mut Context) -> Result<Value, Error> {
  let name = stmt.var.name();
  let value = match &stmt.kind {
    StmtKind::Defun(def) => lambda_value(def, Some(name), scope, stmt.location),
    StmtKind::Let(e) => match eval_expr(e, scope, ctx)? {
      Value::Lambda(Lambda::User(l)) if l.name.is_none() => {
        lambda_value(&l.def, Some(name), &l.captured, l.location)
      }
      v => v,
    },
  };
  let mut tags = decorator_tags(&stmt.decorators, scope, ctx)?;
  tags.location = Some(stmt.location);
  Ok(value.with_tags(tags))
}

pub fn eval_expr(e: &Expr, scope: &Bindings, ctx: &mut Context) -> Result<Value, Error> {
  if ctx.depth >= MAX_EXPR_DEPTH {
    return Err(Error::with_stack(ErrorMessage::CallStackExceeded(MAX_EXPR_DEPTH), &ctx.frames).at(e.location));
  }
  ctx.depth += 1;
  let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || eval_expr_inner(e, scope, ctx));
  ctx.depth -= 1;
  result.map_err(|err| err.at(e.location))
}

fn lookup_ident(x: Var, scope: &Bindings, ctx: &Context) -> Result<Value, Error> {
  if let Some(v) = scope.get(&x) {
    return Ok(v.clone());
  }
  let name = x.name();
  match ctx.registry.resolve_unqualified(&name)? {
    Some(entry) => Ok(Value::Lambda(Lambda::Builtin(entry))),
    None => Err(ErrorMessage::Binding(name).into()),
  }
}

/// `List.upTo` names a library member; `Lib.x` can also read a field of a binding.
fn lookup_qualified(name: &str, scope: &Bindings, ctx: &Context) -> Result<Value, Error> {
  if let Some(v) = ctx.registry.get(name) {
    return Ok(v);
  }
  let mut parts = name.split('.');
  let head = parts.next().unwrap_or_default();
  let mut current = scope
    .get(&Var::new(head))
    .cloned()
    .ok_or_else(|| ErrorMessage::Binding(name.to_string()))?;
  for field in parts {
    current = get_field(&current, field)?;
  }
  Ok(current)
}

fn get_field(v: &Value, field: &str) -> Result<Value, Error> {
  match v.untagged() {
    Value::Dict(d) => d
      .get(field)
      .cloned()
      .ok_or_else(|| ErrorMessage::argument(format!("record has no key {:?}", field)).into()),
    other => Err(ErrorMessage::Type(format!("cannot read field {:?} of a {}", field, other.type_name())).into()),
  }
}

fn get_index(v: &Value, index: &Value) -> Result<Value, Error> {
  match (v.untagged(), index.untagged()) {
    (Value::Array(xs), Value::Number(i)) => {
      if i.fract() != 0.0 || *i < 0.0 || *i as usize >= xs.len() {
        return Err(
          ErrorMessage::argument(format!("index {} is out of bounds for a list of length {}", i, xs.len())).into(),
        );
      }
      Ok(xs[*i as usize].clone())
    }
    (Value::Dict(_), Value::String(k)) => get_field(v, k),
    (container, index) => Err(
      ErrorMessage::Type(format!(
        "cannot index a {} with a {}",
        container.type_name(),
        index.type_name()
      ))
      .into(),
    ),
  }
}

fn expect_bool(v: &Value, what: &str) -> Result<bool, Error> {
  v.as_bool()
    .ok_or_else(|| ErrorMessage::Type(format!("{} must be a Bool, got {}", what, v.type_name())).into())
}

fn eval_expr_inner(e: &Expr, scope: &Bindings, ctx: &mut Context) -> Result<Value, Error> {
  Ok(match &e.kind {
    ExprKind::Number(x) => Value::Number(*x),
    ExprKind::Str(s) => Value::string(s.clone()),
    ExprKind::Bool(b) => Value::Bool(*b),
    ExprKind::Void => Value::Void,
    ExprKind::Ident(x) => lookup_ident(*x, scope, ctx)?,
    ExprKind::Qualified(name) => lookup_qualified(name, scope, ctx)?,
    ExprKind::Array(es) => Value::array(es.iter().map(|e| eval_expr(e, scope, ctx)).collect::<Result<Vec<_>, _>>()?),
    ExprKind::Dict(entries) => {
      let mut map = IndexMap::new();
      for entry in entries {
        match entry {
          DictEntry::KeyValue { key, value, .. } => {
            map.insert(key.clone(), eval_expr(value, scope, ctx)?);
          }
          DictEntry::Spread(e) => {
            let v = eval_expr(e, scope, ctx)?;
            let d = v.as_dict().ok_or_else(|| {
              Error::new(ErrorMessage::Type(format!("cannot spread a {} into a record", v.type_name())))
                .at(e.location)
            })?;
            map.extend(d.iter().map(|(k, v)| (k.clone(), v.clone())));
          }
        }
      }
      Value::from_map(map)
    }
    ExprKind::Lambda(def) => lambda_value(def, None, scope, e.location),
    ExprKind::Block(stmts, result) => {
      let mut inner = scope.clone();
      for stmt in stmts {
        let v = eval_stmt(stmt, &inner, ctx)?;
        inner.insert(stmt.var, v);
      }
      eval_expr(result, &inner, ctx)?
    }
    ExprKind::Call(f, args) => {
      let callee = eval_expr(f, scope, ctx)?;
      let args = args.iter().map(|a| eval_expr(a, scope, ctx)).collect::<Result<Vec<_>, _>>()?;
      match callee.as_lambda() {
        Some(l) => ctx.call(l, args, Some(e.location))?,
        None => return Err(ErrorMessage::Type(format!("a {} is not callable", callee.type_name())).into()),
      }
    }
    ExprKind::Bin(a, b, op) => {
      let a = eval_expr(a, scope, ctx)?;
      let b = eval_expr(b, scope, ctx)?;
      ctx.call_named(op.builtin_name(), vec![a, b], e.location)?
    }
    ExprKind::Logic(a, b, op) => {
      let lhs = expect_bool(&eval_expr(a, scope, ctx)?, "left operand")?;
      match (op, lhs) {
        (LogicOp::And, false) => Value::Bool(false),
        (LogicOp::Or, true) => Value::Bool(true),
        _ => Value::Bool(expect_bool(&eval_expr(b, scope, ctx)?, "right operand")?),
      }
    }
    ExprKind::Unary(a, op) => {
      let a = eval_expr(a, scope, ctx)?;
      ctx.call_named(op.builtin_name(), vec![a], e.location)?
    }
    ExprKind::Index(a, i) => {
      let a = eval_expr(a, scope, ctx)?;
      let i = eval_expr(i, scope, ctx)?;
      get_index(&a, &i)?
    }
    ExprKind::Field(a, field) => get_field(&eval_expr(a, scope, ctx)?, field)?,
    ExprKind::Ternary(c, a, b) => {
      if expect_bool(&eval_expr(c, scope, ctx)?, "condition")? {
        eval_expr(a, scope, ctx)?
      } else {
        eval_expr(b, scope, ctx)?
      }
    }
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::parse::{parse, parse_expr};

  fn run(src: &str) -> Result<Value, Error> {
    let env = Environment::default().with_seed("reducer").with_max_call_depth(20);
    let mut ctx = Context::new(env, Rc::new(Registry::standard()));
    let program = parse(src)?;
    Ok(eval_program(&program, &Bindings::new(), &mut ctx)?.result)
  }

  #[test]
  fn closures_capture_their_scope() {
    assert_eq!(run("a = 2\nf(x) = x * a\na = 10\nf(3)").unwrap(), Value::Number(6.0));
  }

  #[test]
  fn named_lambdas_recurse() {
    let src = "fact(n) = n <= 1 ? 1 : n * fact(n - 1)\nfact(5)";
    assert_eq!(run(src).unwrap(), Value::Number(120.0));
    let src = "fib = {|n| if n < 2 then n else fib(n - 1) + fib(n - 2)}\nfib(10)";
    assert_eq!(run(src).unwrap(), Value::Number(55.0));
  }

  #[test]
  fn logic_short_circuits() {
    assert_eq!(run("false && undefinedThing").unwrap(), Value::Bool(false));
    assert_eq!(run("true || undefinedThing").unwrap(), Value::Bool(true));
    assert!(run("1 && true").is_err());
  }

  #[test]
  fn records_spread_and_index() {
    let v = run("base = {a: 1, b: 2}\nr = {...base, b: 3, \"c d\": [10, 20]}\nr.b + r[\"c d\"][1]").unwrap();
    assert_eq!(v, Value::Number(23.0));
  }

  #[test]
  fn undefined_names_are_binding_errors() {
    let err = run("x = 1\ny + x").unwrap_err();
    assert_eq!(err.message, ErrorMessage::Binding("y".into()));
    assert_eq!(err.location, Some(Location::new(6, 7)));
  }

  #[test]
  fn recursion_depth_is_bounded() {
    let err = run("f(n) = f(n + 1)\nf(0)").unwrap_err();
    assert_eq!(err.message, ErrorMessage::CallStackExceeded(20));
    assert_eq!(err.stack.len(), 20);
    assert_eq!(err.stack[1].name, "f");
  }

  #[test]
  fn long_operator_chains_evaluate() {
    let src = vec!["1"; 3000].join(" + ");
    assert_eq!(run(&src).unwrap(), Value::Number(3000.0));
  }

  #[test]
  fn expression_nesting_is_bounded() {
    let e = parse_expr("-(-1)").unwrap();
    let mut ctx = Context::new(Environment::default(), Rc::new(Registry::standard()));
    ctx.depth = MAX_EXPR_DEPTH - 2;
    let err = eval_expr(&e, &Bindings::new(), &mut ctx).unwrap_err();
    assert_eq!(err.message, ErrorMessage::CallStackExceeded(MAX_EXPR_DEPTH));
    assert_eq!(ctx.depth, MAX_EXPR_DEPTH - 2);
    ctx.depth = 0;
    assert_eq!(eval_expr(&e, &Bindings::new(), &mut ctx).unwrap(), Value::Number(1.0));
  }

  #[test]
  fn arity_is_checked() {
    let err = run("f(a, b) = a\nf(1)").unwrap_err();
    assert!(matches!(err.message, ErrorMessage::Argument(_)));
    assert_eq!(err.stack.last().map(|f| f.name.as_str()), Some("f"));
  }

  #[test]
  fn decorators_become_tags() {
    let env = Environment::default();
    let mut ctx = Context::new(env, Rc::new(Registry::standard()));
    let program = parse("@name(\"Speed\")\n@hide\nx = 5").unwrap();
    let out = eval_program(&program, &Bindings::new(), &mut ctx).unwrap();
    let tags = out.own["x"].tags().cloned().unwrap_or_default();
    assert_eq!(tags.name.as_deref(), Some("Speed"));
    assert_eq!(tags.hidden, Some(true));
    assert_eq!(out.result, Value::Void);
  }

  #[test]
  fn pipes_pass_the_left_value_first() {
    assert_eq!(run("f(a, b) = a - b\n10 -> f(3)").unwrap(), Value::Number(7.0));
  }
}
