//! An assembled program: an immutable sequence of instructions addressed from 1.

use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::slice::Iter;

use super::Instruction;
use crate::argument::Position;

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct Program {
  instructions: Vec<Instruction>
}

impl Program {

  pub fn new(instructions: Vec<Instruction>) -> Program {
    Program{ instructions }
  }

  /// The instruction at the 1-based `position`.
  pub fn get(&self, position: Position) -> Option<&Instruction> {
    match position {
      0 => None,
      p => self.instructions.get(p - 1)
    }
  }

  pub fn len(&self) -> usize {
    self.instructions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.instructions.is_empty()
  }

  pub fn iter(&self) -> Iter<'_, Instruction> {
    self.instructions.iter()
  }

}

impl Deref for Program {
  type Target = [Instruction];

  fn deref(&self) -> &[Instruction] {
    &self.instructions
  }
}

impl From<Vec<Instruction>> for Program {
  fn from(instructions: Vec<Instruction>) -> Program {
    Program::new(instructions)
  }
}

impl<'a> IntoIterator for &'a Program {
  type Item = &'a Instruction;
  type IntoIter = Iter<'a, Instruction>;

  fn into_iter(self) -> Self::IntoIter {
    self.instructions.iter()
  }
}

/// Same text as `decompile`.
impl Display for Program {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    for (i, instruction) in self.instructions.iter().enumerate() {
      if i > 0 {
        writeln!(f)?;
      }
      write!(f, "{}", instruction)?;
    }
    Ok(())
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::bytecode::Mnemonic;

  #[test]
  fn positions_start_at_one(){
    let program = Program::new(vec![
      Instruction::new(Mnemonic::Nop, vec![], vec![]).unwrap(),
      Instruction::new(Mnemonic::Halt, vec![], vec![]).unwrap(),
    ]);
    assert_eq!(program.get(0), None);
    assert_eq!(program.get(1).map(Instruction::mnemonic), Some(Mnemonic::Nop));
    assert_eq!(program.get(2).map(Instruction::mnemonic), Some(Mnemonic::Halt));
    assert_eq!(program.get(3), None);
    assert_eq!(program.to_string(), "NOP\nHALT");
  }

  #[test]
  fn empty_program_displays_nothing(){
    assert_eq!(Program::default().to_string(), "");
    assert!(Program::default().is_empty());
  }

}
