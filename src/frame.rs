use crate::lang::Location;

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
  pub name: String,
  /// Where the frame was entered from.
  pub location: Option<Location>,
}

impl Frame {
  pub fn new(name: impl Into<String>, location: Option<Location>) -> Self {
    Frame {
      name: name.into(),
      location,
    }
  }
}

/// Active call frames, outermost first.
#[derive(Debug, Clone, Default)]
pub struct FrameStack {
  frames: Vec<Frame>,
  max_depth: usize,
}

impl FrameStack {
  pub fn new(max_depth: usize) -> Self {
    FrameStack {
      frames: vec![Frame::new("<top>", None)],
      max_depth,
    }
  }

  pub fn depth(&self) -> usize {
    self.frames.len()
  }

  /// Returns false when the depth bound would be exceeded; the frame is not pushed then.
  pub fn push(&mut self, frame: Frame) -> bool {
    if self.frames.len() >= self.max_depth {
      return false;
    }
    self.frames.push(frame);
    true
  }

  pub fn pop(&mut self) {
    if self.frames.len() > 1 {
      self.frames.pop();
    }
  }

  pub fn frames(&self) -> Vec<Frame> {
    self.frames.clone()
  }

  pub fn max_depth(&self) -> usize {
    self.max_depth
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn push_respects_bound() {
    let mut stack = FrameStack::new(3);
    assert!(stack.push(Frame::new("a", None)));
    assert!(stack.push(Frame::new("b", None)));
    assert!(!stack.push(Frame::new("c", None)));
    assert_eq!(stack.depth(), 3);
    stack.pop();
    stack.pop();
    stack.pop();
    assert_eq!(stack.depth(), 1);
  }
}
