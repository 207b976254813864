//! Error taxonomy shared by the reducer, the library and the project.

use crate::dist::DistError;
use crate::frame::{Frame, FrameStack};
use crate::lang::Location;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
  #[error("cyclic imports: {}", .0.join(" -> "))]
  ImportCycle(Vec<String>),

  #[error("source {dependency} imported by {source_id} does not exist")]
  MissingDependency {
    source_id: String,
    dependency: String,
  },

  #[error("dependency {0} failed to evaluate")]
  DependencyFailed(String),

  #[error("cannot resolve import {specifier:?}: {reason}")]
  ImportResolution { specifier: String, reason: String },

  #[error("{name} is ambiguous, candidates: {}", .candidates.join(", "))]
  Ambiguous {
    name: String,
    candidates: Vec<String>,
  },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ErrorMessage {
  #[error("Parse error at {location}: {message}")]
  Parse { message: String, location: Location },

  #[error("Compile error: {0}")]
  Compile(#[from] CompileError),

  #[error("Argument error: {0}")]
  Argument(String),

  #[error("{0} is not defined")]
  Binding(String),

  #[error("Error: {0}")]
  User(String),

  #[error("Domain error: {0}")]
  Domain(String),

  #[error("Type error: {0}")]
  Type(String),

  #[error("Distribution error: {0}")]
  Dist(DistError),

  #[error("Maximum call stack depth of {0} exceeded")]
  CallStackExceeded(usize),

  #[error("Internal error: {0}")]
  Internal(String),
}

impl ErrorMessage {
  pub fn argument(msg: impl Into<String>) -> Self {
    ErrorMessage::Argument(msg.into())
  }

  pub fn domain(msg: impl Into<String>) -> Self {
    ErrorMessage::Domain(msg.into())
  }

  pub fn internal(msg: impl Into<String>) -> Self {
    ErrorMessage::Internal(msg.into())
  }

  /// Location attached to the message itself (parse errors only).
  pub fn location(&self) -> Option<Location> {
    match self {
      ErrorMessage::Parse { location, .. } => Some(*location),
      _ => None,
    }
  }

  pub fn is_domain(&self) -> bool {
    matches!(self, ErrorMessage::Domain(_))
  }
}

impl From<DistError> for ErrorMessage {
  fn from(e: DistError) -> Self {
    match e {
      DistError::Domain(msg) => ErrorMessage::Domain(msg),
      other => ErrorMessage::Dist(other),
    }
  }
}

/// An error message together with the call stack active when it was raised.
#[derive(Debug, Clone, PartialEq)]
pub struct Error {
  pub message: ErrorMessage,
  pub stack: Vec<Frame>,
  /// Innermost expression that was being evaluated.
  pub location: Option<Location>,
}

impl Error {
  pub fn new(message: ErrorMessage) -> Self {
    Error {
      message,
      stack: Vec::new(),
      location: None,
    }
  }

  pub fn with_stack(message: ErrorMessage, stack: &FrameStack) -> Self {
    Error {
      message,
      stack: stack.frames(),
      location: None,
    }
  }

  /// Sets the location unless an inner expression already did.
  pub fn at(mut self, location: Location) -> Self {
    if self.location.is_none() {
      self.location = Some(location);
    }
    self
  }

  /// Records the active frames unless they were captured deeper down.
  pub fn in_frames(mut self, stack: &FrameStack) -> Self {
    if self.stack.is_empty() {
      self.stack = stack.frames();
    }
    self
  }

  /// Innermost location known for this error.
  pub fn location(&self) -> Option<Location> {
    self
      .message
      .location()
      .or(self.location)
      .or_else(|| self.stack.iter().rev().find_map(|f| f.location))
  }

  /// Human-readable traceback with line/column positions resolved against `source`.
  pub fn traceback(&self, source: &str) -> String {
    let mut out = self.message.to_string();
    if let Some(location) = self.location.or_else(|| self.message.location()) {
      let (line, column) = location.line_col(source);
      out.push_str(&format!(" (line {}, column {})", line, column));
    }
    for frame in self.stack.iter().rev() {
      out.push_str("\n  at ");
      out.push_str(&frame.name);
      if let Some(location) = frame.location {
        let (line, column) = location.line_col(source);
        out.push_str(&format!(" (line {}, column {})", line, column));
      }
    }
    out
  }
}

impl fmt::Display for Error {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}", self.message)?;
    for frame in self.stack.iter().rev() {
      write!(f, "\n  at {}", frame.name)?;
      if let Some(location) = frame.location {
        write!(f, " ({})", location)?;
      }
    }
    Ok(())
  }
}

impl std::error::Error for Error {}

impl From<ErrorMessage> for Error {
  fn from(message: ErrorMessage) -> Self {
    Error::new(message)
  }
}

impl From<CompileError> for Error {
  fn from(e: CompileError) -> Self {
    Error::new(e.into())
  }
}

impl From<DistError> for Error {
  fn from(e: DistError) -> Self {
    Error::new(e.into())
  }
}
