use std::fmt::{Display, Formatter};

use strum_macros::{Display as StrumDisplay, EnumIter, EnumString, IntoStaticStr};
use num_enum::{TryFromPrimitive, IntoPrimitive};
use string_cache::DefaultAtom;

use crate::argument::Argument;

/**
  Mnemonics of the machine, one per instruction kind.

  Parsing is case insensitive; display is the canonical uppercase spelling. The numeric
  value of each variant is its opcode in the binary image, so reordering the variants
  changes the image format.
*/
#[derive(
  StrumDisplay, IntoStaticStr, EnumString, EnumIter, TryFromPrimitive, IntoPrimitive,
  Clone,        Copy,          Eq, PartialEq, Debug,  Hash
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[repr(u8)]
pub enum Mnemonic {
  Nop,
  // Arithmetic
  Add,               // add( literal | register )
  Sub,               // sub( literal | register )
  Half,
  // Registers
  Load,              // load( register )
  Store,             // store( register )
  // Tape
  Read,              // read( literal | register )
  Write,             // write( literal | register )
  // Control
  Jzero,             // jzero( label )
  Jpos,              // jpos( label )
  Jump,              // jump( label )
  Halt,
}

/// The kind of argument an instruction accepts at a given position.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub enum ArgumentShape {
  Register,
  LiteralOrRegister,
  Label
}

impl ArgumentShape {

  pub fn admits(&self, argument: &Argument) -> bool {
    match self {
      ArgumentShape::Register          => argument.is_register(),
      ArgumentShape::LiteralOrRegister => argument.is_literal() || argument.is_register(),
      ArgumentShape::Label             => argument.is_label(),
    }
  }

}

impl Display for ArgumentShape {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      ArgumentShape::Register          => write!(f, "a register"),
      ArgumentShape::LiteralOrRegister => write!(f, "either a literal or a register"),
      ArgumentShape::Label             => write!(f, "a label"),
    }
  }
}

impl Mnemonic {

  pub fn code(&self) -> u8 {
    Into::<u8>::into(*self)
  }

  pub fn arity(&self) -> usize {
    match self {
      | Mnemonic::Nop
      | Mnemonic::Half
      | Mnemonic::Halt => 0,
      _ => 1
    }
  }

  /// The shape required at `index`, or `None` if `index` is past the arity.
  pub fn shape(&self, index: usize) -> Option<ArgumentShape> {
    if index >= self.arity() {
      return None;
    }
    match self {
      | Mnemonic::Add
      | Mnemonic::Sub
      | Mnemonic::Read
      | Mnemonic::Write => Some(ArgumentShape::LiteralOrRegister),

      | Mnemonic::Load
      | Mnemonic::Store => Some(ArgumentShape::Register),

      | Mnemonic::Jzero
      | Mnemonic::Jpos
      | Mnemonic::Jump => Some(ArgumentShape::Label),

      | Mnemonic::Nop
      | Mnemonic::Half
      | Mnemonic::Halt => None,
    }
  }

}

fn ordinal(index: usize) -> String {
  match index {
    0 => "1st".to_string(),
    1 => "2nd".to_string(),
    2 => "3rd".to_string(),
    n => format!("{}th", n + 1)
  }
}

/// Rejections raised while building an instruction.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum ArgumentError {
  TooMany {
    mnemonic : Mnemonic,
    argument : Argument
  },
  Unsupported {
    mnemonic : Mnemonic,
    index    : usize,
    shape    : ArgumentShape,
    argument : Argument
  },
  Missing {
    mnemonic : Mnemonic,
    expected : usize,
    provided : usize
  }
}

impl Display for ArgumentError {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      ArgumentError::TooMany{ mnemonic, argument } => {
        write!(
          f,
          "The {} instruction takes {} argument{}, {} is one too many",
          mnemonic, mnemonic.arity(), plural(mnemonic.arity()), argument
        )
      },
      ArgumentError::Unsupported{ mnemonic, index, shape, argument } => {
        write!(
          f,
          "The {} argument of the {} instruction must be {}, got {}",
          ordinal(*index), mnemonic, shape, argument
        )
      },
      ArgumentError::Missing{ mnemonic, expected, provided } => {
        write!(
          f,
          "The {} instruction takes {} argument{} but {} {} given",
          mnemonic, expected, plural(*expected), provided,
          if *provided == 1 { "was" } else { "were" }
        )
      }
    }
  }
}

impl std::error::Error for ArgumentError {}

fn plural(count: usize) -> &'static str {
  if count == 1 { "" } else { "s" }
}

/**
  A single instruction: its mnemonic, the labels that point at it, and exactly
  `mnemonic.arity()` arguments of the right shapes. Instances can only be obtained from an
  `InstructionBuilder` (or `Instruction::new`, which uses one), so a malformed
  instruction is never observable.
*/
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Instruction {
  mnemonic  : Mnemonic,
  labels    : Vec<DefaultAtom>,
  arguments : Vec<Argument>,
}

impl Instruction {

  pub fn new(
    mnemonic  : Mnemonic,
    labels    : Vec<DefaultAtom>,
    arguments : Vec<Argument>
  ) -> Result<Instruction, ArgumentError>
  {
    let mut builder = InstructionBuilder::new(mnemonic);
    for label in labels {
      builder.label(label);
    }
    for argument in arguments {
      builder.argument(argument)?;
    }
    builder.build()
  }

  pub fn builder(mnemonic: Mnemonic) -> InstructionBuilder {
    InstructionBuilder::new(mnemonic)
  }

  pub fn mnemonic(&self) -> Mnemonic {
    self.mnemonic
  }

  pub fn labels(&self) -> &[DefaultAtom] {
    &self.labels
  }

  pub fn arguments(&self) -> &[Argument] {
    &self.arguments
  }

  pub fn argument(&self, index: usize) -> Option<&Argument> {
    self.arguments.get(index)
  }

}

impl Display for Instruction {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    for label in &self.labels {
      write!(f, "{}: ", label)?;
    }
    write!(f, "{}", self.mnemonic)?;
    for argument in &self.arguments {
      write!(f, " {}", argument)?;
    }
    Ok(())
  }
}

/// Accumulates the parts of an `Instruction`, checking each argument as it is appended.
#[derive(Clone, Debug)]
pub struct InstructionBuilder {
  mnemonic  : Mnemonic,
  labels    : Vec<DefaultAtom>,
  arguments : Vec<Argument>,
}

impl InstructionBuilder {

  pub fn new(mnemonic: Mnemonic) -> InstructionBuilder {
    InstructionBuilder {
      mnemonic,
      labels    : vec![],
      arguments : Vec::with_capacity(mnemonic.arity()),
    }
  }

  pub fn label<S: Into<DefaultAtom>>(&mut self, label: S) -> &mut Self {
    self.labels.push(label.into());
    self
  }

  pub fn argument(&mut self, argument: Argument) -> Result<&mut Self, ArgumentError> {
    let index = self.arguments.len();
    match self.mnemonic.shape(index) {

      None => {
        return Err(ArgumentError::TooMany{ mnemonic: self.mnemonic, argument });
      }

      Some(shape) if !shape.admits(&argument) => {
        return Err(ArgumentError::Unsupported{
          mnemonic: self.mnemonic,
          index,
          shape,
          argument
        });
      }

      Some(_) => {
        self.arguments.push(argument);
      }

    }
    Ok(self)
  }

  pub fn build(self) -> Result<Instruction, ArgumentError> {
    if self.arguments.len() != self.mnemonic.arity() {
      return Err(ArgumentError::Missing{
        mnemonic: self.mnemonic,
        expected: self.mnemonic.arity(),
        provided: self.arguments.len()
      });
    }
    Ok(Instruction {
      mnemonic  : self.mnemonic,
      labels    : self.labels,
      arguments : self.arguments,
    })
  }

}
