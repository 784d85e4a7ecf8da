/*!
  A compact binary image of a program, one double word per instruction:

  ```text
  [Value:32][Reserved:16][Tag:8][OpCode:8]
  ```

  The tag says which kind of argument the value holds (none, literal, register, or label
  position). Label names are not part of the image: decoding names every jump target
  `l<position>` and attaches that name to the target instruction, so a decoded program
  decompiles to assembly that compiles back to the same positions.
*/

use std::convert::TryFrom;
use std::fmt::{Display, Formatter};

use num_enum::{IntoPrimitive, TryFromPrimitive};
use string_cache::DefaultAtom;

use super::{ArgumentError, Instruction, Mnemonic, Program};
use crate::argument::{Argument, Position, Value};

pub type DoubleWord = u64;

#[derive(TryFromPrimitive, IntoPrimitive, Clone, Copy, Eq, PartialEq, Debug)]
#[repr(u8)]
enum Tag {
  None,
  Literal,
  Register,
  Label
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub enum ImageError {
  /// A value that does not fit the 32 bit field. Positions are 1-based.
  ValueOutOfRange {
    position : Position,
    value    : i128
  },
  InvalidOpcode {
    position : Position,
    opcode   : u8
  },
  InvalidTag {
    position : Position,
    tag      : u8
  },
  LabelOutOfRange {
    position : Position,
    target   : Position
  },
  InvalidInstruction {
    position : Position,
    source   : ArgumentError
  }
}

impl Display for ImageError {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      ImageError::ValueOutOfRange{ position, value } => {
        write!(f, "instruction {}: value {} does not fit in 32 bits", position, value)
      }
      ImageError::InvalidOpcode{ position, opcode } => {
        write!(f, "instruction {}: invalid opcode {:#04x}", position, opcode)
      }
      ImageError::InvalidTag{ position, tag } => {
        write!(f, "instruction {}: invalid argument tag {}", position, tag)
      }
      ImageError::LabelOutOfRange{ position, target } => {
        write!(f, "instruction {}: jump target {} is outside the program", position, target)
      }
      ImageError::InvalidInstruction{ position, source } => {
        write!(f, "instruction {}: {}", position, source)
      }
    }
  }
}

impl std::error::Error for ImageError {}

fn encode_instruction(instruction: &Instruction, position: Position) -> Result<DoubleWord, ImageError> {
  let (tag, value): (Tag, i128) =
    match instruction.argument(0) {
      None                                => (Tag::None, 0),
      Some(Argument::Literal(value))      => (Tag::Literal, *value as i128),
      Some(Argument::Register(number))    => (Tag::Register, *number as i128),
      Some(Argument::Label{ position: target, .. }) => (Tag::Label, *target as i128),
    };

  let value = u32::try_from(value).map_err(|_| ImageError::ValueOutOfRange{ position, value })?;

  Ok(
    (instruction.mnemonic().code() as DoubleWord)
      + ((Into::<u8>::into(tag) as DoubleWord) << 8)
      + ((value as DoubleWord) << 32)
  )
}

/// Encodes `program` into its binary image.
pub fn encode_program(program: &Program) -> Result<Vec<DoubleWord>, ImageError> {
  program.iter()
         .enumerate()
         .map(|(index, instruction)| encode_instruction(instruction, index + 1))
         .collect()
}

fn label_name(target: Position) -> DefaultAtom {
  DefaultAtom::from(format!("l{}", target))
}

/// Decodes a binary image produced by `encode_program`.
pub fn decode_program(image: &[DoubleWord]) -> Result<Program, ImageError> {
  let mut fields: Vec<(Mnemonic, Option<Argument>)> = Vec::with_capacity(image.len());
  let mut targets: Vec<bool> = vec![false; image.len() + 1];

  for (index, word) in image.iter().enumerate() {
    let position = index + 1;
    let opcode = (word & 0xFF) as u8;
    let tag = ((word >> 8) & 0xFF) as u8;
    let value = (word >> 32) as u32;

    let mnemonic = Mnemonic::try_from(opcode)
      .map_err(|_| ImageError::InvalidOpcode{ position, opcode })?;

    let argument =
      match Tag::try_from(tag).map_err(|_| ImageError::InvalidTag{ position, tag })? {
        Tag::None     => None,
        Tag::Literal  => Some(Argument::Literal(value as Value)),
        Tag::Register => Some(Argument::Register(value as usize)),
        Tag::Label    => {
          let target = value as Position;
          if target == 0 || target > image.len() {
            return Err(ImageError::LabelOutOfRange{ position, target });
          }
          targets[target] = true;
          Some(Argument::label(label_name(target), target))
        }
      };

    fields.push((mnemonic, argument));
  }

  let instructions =
    fields.into_iter()
          .enumerate()
          .map(|(index, (mnemonic, argument))| {
            let position = index + 1;
            let labels = match targets[position] {
              true  => vec![label_name(position)],
              false => vec![]
            };
            Instruction::new(mnemonic, labels, argument.into_iter().collect())
              .map_err(|source| ImageError::InvalidInstruction{ position, source })
          })
          .collect::<Result<Vec<Instruction>, ImageError>>()?;

  Ok(Program::new(instructions))
}
