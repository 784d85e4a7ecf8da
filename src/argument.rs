//! Instruction arguments: a literal, a register, or a label resolved to an instruction position.

use std::fmt::{Display, Formatter};

use string_cache::DefaultAtom;

/// Values held by registers, tape cells, and literals.
pub type Value = i64;

/// Register 0 is the accumulator; general registers count from 1.
pub type RegisterNumber = usize;

/// A 1-based index into a `Program`.
pub type Position = usize;

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum Argument {
  /// A non-negative constant.
  Literal(Value),
  /// A reference to a register by number.
  Register(RegisterNumber),
  /**
    A symbolic jump target. The name is kept for display and decompilation only; the
    machine uses `position` exclusively.
  */
  Label {
    name     : DefaultAtom,
    position : Position
  }
}

impl Argument {

  pub fn literal(value: Value) -> Argument {
    Argument::Literal(value)
  }

  pub fn register(number: RegisterNumber) -> Argument {
    Argument::Register(number)
  }

  pub fn label<S: Into<DefaultAtom>>(name: S, position: Position) -> Argument {
    Argument::Label{ name: name.into(), position }
  }

  pub fn is_literal(&self) -> bool {
    matches!(self, Argument::Literal(_))
  }

  pub fn is_register(&self) -> bool {
    matches!(self, Argument::Register(_))
  }

  pub fn is_label(&self) -> bool {
    matches!(self, Argument::Label{..})
  }

  /// The numeric payload of a literal or label. Registers have none until read.
  pub fn value(&self) -> Option<Value> {
    match self {
      Argument::Literal(value)         => Some(*value),
      Argument::Label{ position, .. }  => Some(*position as Value),
      Argument::Register(_)            => None
    }
  }

  /// The position a label resolves to, if this is a label.
  pub fn position(&self) -> Option<Position> {
    match self {
      Argument::Label{ position, .. } => Some(*position),
      _ => None
    }
  }

}

impl Display for Argument {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Argument::Literal(value) => {
        write!(f, "{}", value)
      },
      Argument::Register(number) => {
        write!(f, "R{}", number)
      },
      Argument::Label{ name, .. } => {
        write!(f, "{}", name)
      }
    }
  }
}
