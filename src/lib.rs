//! Evaluation engine for a small probabilistic language.

pub mod dist;
pub mod env;
pub mod error;
pub mod frame;
pub mod lang;
pub mod lex;
pub mod library;
pub mod parse;
pub mod path;
pub mod project;
pub mod reducer;
pub mod registry;
pub mod tags;
pub mod value;

pub use dist::GenericDist;
pub use env::Environment;
pub use error::{CompileError, Error, ErrorMessage};
pub use path::{PathItem, SubvaluePath};
pub use project::{Project, Resolver, RunOutput, SourceId};
pub use registry::{FnDefinition, FnEntry, FrType, Registry, RegistryBuilder};
pub use tags::ValueTags;
pub use value::Value;

const MAIN: &str = "main";

/// Runs a single source with the standard library. Imports fail since there is no resolver.
pub fn evaluate(source: &str, env: &Environment) -> Result<RunOutput, Error> {
  env.validate()?;
  let mut project = Project::new();
  project.set_environment(env.clone());
  project.set_source(MAIN, source);
  project.run(MAIN);
  match project.output(MAIN) {
    Some(out) => out.clone(),
    None => Err(ErrorMessage::internal("source did not run").into()),
  }
}
