/*!

  Programs for the Random Access Machine.

  A program is a sequence of instructions addressed from 1, which is also how jump
  targets are expressed. Each instruction has a `Mnemonic`, which fixes its arity and the
  shape of every argument, the labels that point at it, and its arguments.

  One design decision that needed to be made is whether to give each instruction kind its
  own type with its own execution method. The instruction set is small and closed, so a
  single `Mnemonic` enum is matched exhaustively both here, when checking arguments, and
  in the machine, when executing. Adding a mnemonic therefore fails to compile until every
  match handles it.

  Labels only exist at assembly time. By the time a program runs, every label argument
  carries the numeric position it names, and the label names are kept only so the
  program can be shown and decompiled.

*/

mod assembly;
mod binary;
mod instruction;
mod program;

pub use assembly::{compile, decompile, AssemblyError, MAX_LITERAL};
pub use binary::{decode_program, encode_program, DoubleWord, ImageError};
pub use instruction::{ArgumentError, ArgumentShape, Instruction, InstructionBuilder, Mnemonic};
pub use program::Program;
