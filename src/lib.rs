/*!
  An emulator for a Random Access Machine.

  Assembly text is compiled into a `Program` by `bytecode::compile`, installed in a
  `Machine`, and executed one instruction at a time with `Machine::step`. The machine
  records which registers and tape cells every step touches so a front end can show
  them.

  ```
  use ramach::{compile, Machine};

  let program = compile("load r1\nwrite 0\nhalt").unwrap();
  let mut machine = Machine::new(1, 1).unwrap();
  machine.set_program(program);
  machine.set_register(1, 5).unwrap();
  machine.run(10);
  assert_eq!(machine.tape(0), Some(5));
  ```
*/

#[macro_use] extern crate prettytable;
#[macro_use] extern crate lazy_static;

pub mod argument;
pub mod bytecode;
pub mod machine;
pub mod runner;

pub use argument::{Argument, Position, RegisterNumber, Value};
pub use bytecode::{compile, decompile, AssemblyError, Instruction, Mnemonic, Program};
pub use machine::{ExecutionError, ExecutionErrorKind, Machine, MachineError, StepOutcome, StepTrace};
