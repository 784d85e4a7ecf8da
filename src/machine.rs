//! The Random Access Machine: an accumulator, a bank of general registers, a tape, and a
//! program executed one instruction per `step`.

use std::error::Error;
use std::fmt::{Display, Formatter};

use prettytable::{format as TableFormat, Table};

use crate::argument::{Argument, Position, RegisterNumber, Value};
use crate::bytecode::{Instruction, Mnemonic, Program};

/// Index of a tape cell.
pub type TapeAddress = usize;

/// Errors raised when building or editing a machine from outside a step.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum MachineError {
  /// A machine needs at least one general register.
  NoRegisters,
  RegisterOutOfRange(RegisterNumber),
  TapeAddressOutOfRange(TapeAddress),
}

impl Display for MachineError {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      MachineError::NoRegisters => {
        write!(f, "There must be at least one register.")
      }
      MachineError::RegisterOutOfRange(number) => {
        write!(f, "Register R{} does not exist.", number)
      }
      MachineError::TapeAddressOutOfRange(address) => {
        write!(f, "Tape address {} is out of bounds.", address)
      }
    }
  }
}

impl Error for MachineError {}

/// What went wrong while executing an instruction.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum ExecutionErrorKind {
  TapeReadOutOfBounds(TapeAddress),
  TapeWriteOutOfBounds(TapeAddress),
  /// A tape address computed from a register holding a negative value.
  InvalidAddress(Value),
  RegisterOutOfBounds(RegisterNumber),
  InvalidJumpTarget(Position),
  /// The instruction lacks the argument its mnemonic requires.
  MalformedInstruction,
}

impl Display for ExecutionErrorKind {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      ExecutionErrorKind::TapeReadOutOfBounds(address) => {
        write!(f, "attempted to read out-of-bounds tape address {}", address)
      }
      ExecutionErrorKind::TapeWriteOutOfBounds(address) => {
        write!(f, "attempted to write to out-of-bounds tape address {}", address)
      }
      ExecutionErrorKind::InvalidAddress(value) => {
        write!(f, "{} is not a tape address", value)
      }
      ExecutionErrorKind::RegisterOutOfBounds(number) => {
        write!(f, "register R{} does not exist", number)
      }
      ExecutionErrorKind::InvalidJumpTarget(position) => {
        write!(f, "cannot jump to instruction {}", position)
      }
      ExecutionErrorKind::MalformedInstruction => {
        write!(f, "the instruction is missing a required argument")
      }
    }
  }
}

/// A failed step: the instruction kind, where it was, and why it failed.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct ExecutionError {
  pub mnemonic        : Mnemonic,
  pub program_counter : Position,
  pub kind            : ExecutionErrorKind,
}

impl Display for ExecutionError {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(
      f,
      "Failed to execute {} at line #{}: {}.",
      self.mnemonic, self.program_counter, self.kind
    )
  }
}

impl Error for ExecutionError {}

/// The result of a call to `Machine::step`.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum StepOutcome {
  /// An instruction ran and the machine is still running.
  Executed,
  /// The machine halted during this step, by `HALT` or by running off the end.
  Halted,
  /// The instruction failed. The machine is halted.
  Faulted(ExecutionError),
  /// The machine was already halted; nothing happened.
  Idle,
}

/**
  Which parts of the machine the last step touched. Only one register and one tape
  address are remembered for reading and one for writing. Register 0 is recorded as the
  accumulator.
*/
#[derive(Clone, Copy, Eq, PartialEq, Debug, Default)]
pub struct StepTrace {
  pub accumulator_read    : bool,
  pub accumulator_changed : bool,
  pub register_read       : Option<RegisterNumber>,
  pub register_changed    : Option<RegisterNumber>,
  pub tape_read           : Option<TapeAddress>,
  pub tape_changed        : Option<TapeAddress>,
}

/// The register named by a `LOAD` or `STORE` argument.
fn register_of(argument: Option<&Argument>) -> Result<RegisterNumber, ExecutionErrorKind> {
  match argument {
    Some(Argument::Register(number)) => Ok(*number),
    _ => Err(ExecutionErrorKind::MalformedInstruction)
  }
}

/// How the program counter moves after an instruction.
enum Flow {
  Next,
  Jump(Position),
  Halt,
}

#[derive(Clone, Debug)]
pub struct Machine {

  // Memory Stores
  tape      : Vec<Value>,
  registers : Vec<Value>, // registers[0] is the accumulator
  program   : Program,

  // Control
  program_counter : Position, // 1-based
  halted          : bool,

  // Observability
  trace      : StepTrace,
  last_error : Option<ExecutionError>,

}

impl Machine {

  // region Display methods

  fn make_cell_table<F>(
      titles  : (&str, &str),
      values  : &[Value],
      name    : F,
      read    : Option<usize>,
      changed : Option<usize>
    ) -> Table
    where F: Fn(usize) -> String
  {
    let mut table = Table::new();

    table.set_format(*TABLE_DISPLAY_FORMAT);
    table.set_titles(row![ubr->titles.0, ubl->titles.1, ub->""]);

    for (i, value) in values.iter().enumerate() {
      let marks = match (read == Some(i), changed == Some(i)) {
        (true,  true ) => "read, written",
        (true,  false) => "read",
        (false, true ) => "written",
        (false, false) => "",
      };
      table.add_row(row![r->format!("{} =", name(i)), value, marks]);
    }
    table
  }

  fn make_program_table(&self) -> Table {
    let mut table = Table::new();

    table.set_format(*TABLE_DISPLAY_FORMAT);
    table.set_titles(row![ubr->"Line", ubl->"Instruction"]);

    for (i, instruction) in self.program.iter().enumerate() {
      let position = i + 1;
      match !self.halted && position == self.program_counter {

        true  => {
          table.add_row(row![r->format!("* --> {}", position), instruction]);
        }

        false => {
          table.add_row(row![r->position, instruction]);
        }

      }
    }
    table
  }

  // endregion

  /**
    Creates a machine with `tape_length` tape cells and `register_count` general
    registers, all zero, and no program.
  */
  pub fn new(tape_length: usize, register_count: usize) -> Result<Machine, MachineError> {
    if register_count < 1 {
      return Err(MachineError::NoRegisters);
    }
    Ok(Machine {
      tape            : vec![0; tape_length],
      registers       : vec![0; register_count + 1],
      program         : Program::default(),
      program_counter : 1,
      halted          : false,
      trace           : StepTrace::default(),
      last_error      : None,
    })
  }

  /// Installs `program`. The program counter and halted flag are left alone; call
  /// `reset` to start from the top.
  pub fn set_program(&mut self, program: Program) {
    self.program = program;
  }

  // region Execution

  /**
    Executes the instruction at the program counter.

    Stepping a halted machine does nothing. A failing instruction halts the machine and
    is returned as `StepOutcome::Faulted`; the error is also kept in `last_error`. The
    step trace is cleared first and then describes what this step read and wrote.
  */
  pub fn step(&mut self) -> StepOutcome {
    self.trace = StepTrace::default();

    if self.halted {
      return StepOutcome::Idle;
    }

    let program_counter = self.program_counter;
    let (mnemonic, argument) =
      match self.program.get(program_counter) {
        Some(instruction) => (instruction.mnemonic(), instruction.argument(0).cloned()),
        None => {
          self.halt();
          return StepOutcome::Halted;
        }
      };

    #[cfg(feature = "trace_computation")]
    println!("{:>4}: {}", program_counter, self.program[program_counter - 1]);

    match self.execute(mnemonic, argument.as_ref()) {

      Ok(Flow::Halt) => {
        self.halt();
        StepOutcome::Halted
      }

      Ok(flow) => {
        match flow {
          Flow::Jump(target) => { self.program_counter = target; }
          _                  => { self.program_counter += 1; }
        }
        if self.program_counter > self.program.len() {
          self.halt();
          StepOutcome::Halted
        } else {
          StepOutcome::Executed
        }
      }

      Err(kind) => {
        let error = ExecutionError{ mnemonic, program_counter, kind };
        #[cfg(feature = "trace_computation")] println!("{}", error);
        self.halt();
        self.last_error = Some(error);
        StepOutcome::Faulted(error)
      }

    }
  }

  /// Steps until the machine halts or `max_steps` steps have been taken. Returns the
  /// number of steps taken.
  pub fn run(&mut self, max_steps: usize) -> usize {
    let mut steps = 0;
    while !self.halted && steps < max_steps {
      self.step();
      steps += 1;
    }
    steps
  }

  /// Zeroes every register, clears the halted flag and the step trace, and returns to the
  /// first instruction. The tape is kept.
  pub fn reset(&mut self) {
    for register in self.registers.iter_mut() {
      *register = 0;
    }
    self.program_counter = 1;
    self.halted = false;
    self.trace = StepTrace::default();
    self.last_error = None;
  }

  fn halt(&mut self) {
    self.halted = true;
    self.program_counter = 1;
  }

  fn execute(&mut self, mnemonic: Mnemonic, argument: Option<&Argument>)
    -> Result<Flow, ExecutionErrorKind>
  {
    match mnemonic {

      Mnemonic::Nop => {}

      Mnemonic::Add => {
        let operand = self.resolve(argument)?;
        let sum = self.read_accumulator().wrapping_add(operand);
        self.write_accumulator(sum);
      }

      Mnemonic::Sub => {
        let operand = self.resolve(argument)?;
        let difference = self.read_accumulator().wrapping_sub(operand);
        self.write_accumulator(difference);
      }

      Mnemonic::Half => {
        let half = self.read_accumulator() / 2;
        self.write_accumulator(half);
      }

      Mnemonic::Load => {
        let value = self.read_register(register_of(argument)?)?;
        self.write_accumulator(value);
      }

      Mnemonic::Store => {
        let value = self.read_accumulator();
        self.write_register(register_of(argument)?, value)?;
      }

      Mnemonic::Read => {
        let address = self.resolve_address(argument)?;
        let value = self.read_tape(address)?;
        self.write_accumulator(value);
      }

      Mnemonic::Write => {
        let address = self.resolve_address(argument)?;
        let value = self.read_accumulator();
        self.write_tape(address, value)?;
      }

      Mnemonic::Jzero => {
        if self.read_accumulator() == 0 {
          return self.jump_to(argument);
        }
      }

      Mnemonic::Jpos => {
        if self.read_accumulator() > 0 {
          return self.jump_to(argument);
        }
      }

      Mnemonic::Jump => {
        return self.jump_to(argument);
      }

      Mnemonic::Halt => {
        return Ok(Flow::Halt);
      }

    }
    Ok(Flow::Next)
  }

  fn jump_to(&self, argument: Option<&Argument>) -> Result<Flow, ExecutionErrorKind> {
    let target = argument.and_then(Argument::position)
                         .ok_or(ExecutionErrorKind::MalformedInstruction)?;
    if target == 0 || target > self.program.len() + 1 {
      return Err(ExecutionErrorKind::InvalidJumpTarget(target));
    }
    Ok(Flow::Jump(target))
  }

  /// The numeric value of a literal or register argument.
  fn resolve(&mut self, argument: Option<&Argument>) -> Result<Value, ExecutionErrorKind> {
    match argument {
      Some(Argument::Register(number)) => self.read_register(*number),
      Some(other)                      => other.value().ok_or(ExecutionErrorKind::MalformedInstruction),
      None                             => Err(ExecutionErrorKind::MalformedInstruction),
    }
  }

  fn resolve_address(&mut self, argument: Option<&Argument>) -> Result<TapeAddress, ExecutionErrorKind> {
    let value = self.resolve(argument)?;
    if value < 0 {
      return Err(ExecutionErrorKind::InvalidAddress(value));
    }
    Ok(value as TapeAddress)
  }

  // endregion

  // region Tracked access used while executing

  fn read_accumulator(&mut self) -> Value {
    self.trace.accumulator_read = true;
    self.registers[0]
  }

  fn write_accumulator(&mut self, value: Value) {
    self.trace.accumulator_changed = true;
    self.registers[0] = value;
  }

  fn read_register(&mut self, number: RegisterNumber) -> Result<Value, ExecutionErrorKind> {
    let value = *self.registers
                     .get(number)
                     .ok_or(ExecutionErrorKind::RegisterOutOfBounds(number))?;
    match number {
      0 => self.trace.accumulator_read = true,
      _ => self.trace.register_read = Some(number)
    }
    Ok(value)
  }

  fn write_register(&mut self, number: RegisterNumber, value: Value) -> Result<(), ExecutionErrorKind> {
    let register = self.registers
                       .get_mut(number)
                       .ok_or(ExecutionErrorKind::RegisterOutOfBounds(number))?;
    *register = value;
    match number {
      0 => self.trace.accumulator_changed = true,
      _ => self.trace.register_changed = Some(number)
    }
    Ok(())
  }

  fn read_tape(&mut self, address: TapeAddress) -> Result<Value, ExecutionErrorKind> {
    let value = *self.tape
                     .get(address)
                     .ok_or(ExecutionErrorKind::TapeReadOutOfBounds(address))?;
    self.trace.tape_read = Some(address);
    Ok(value)
  }

  fn write_tape(&mut self, address: TapeAddress, value: Value) -> Result<(), ExecutionErrorKind> {
    let cell = self.tape
                   .get_mut(address)
                   .ok_or(ExecutionErrorKind::TapeWriteOutOfBounds(address))?;
    *cell = value;
    self.trace.tape_changed = Some(address);
    Ok(())
  }

  // endregion

  // region Accessors

  pub fn accumulator(&self) -> Value {
    self.registers[0]
  }

  /// Register `number`, where 0 is the accumulator.
  pub fn register(&self, number: RegisterNumber) -> Option<Value> {
    self.registers.get(number).copied()
  }

  pub fn registers(&self) -> &[Value] {
    &self.registers
  }

  pub fn tape(&self, address: TapeAddress) -> Option<Value> {
    self.tape.get(address).copied()
  }

  pub fn tape_cells(&self) -> &[Value] {
    &self.tape
  }

  pub fn program_counter(&self) -> Position {
    self.program_counter
  }

  pub fn is_halted(&self) -> bool {
    self.halted
  }

  pub fn program(&self) -> &Program {
    &self.program
  }

  pub fn program_length(&self) -> usize {
    self.program.len()
  }

  pub fn tape_length(&self) -> usize {
    self.tape.len()
  }

  /// The number of general registers, not counting the accumulator.
  pub fn register_count(&self) -> usize {
    self.registers.len() - 1
  }

  /// The instruction the next step will execute, if any.
  pub fn current_instruction(&self) -> Option<&Instruction> {
    match self.halted {
      true  => None,
      false => self.program.get(self.program_counter)
    }
  }

  /// The failure that halted the machine, until the next `reset`.
  pub fn last_error(&self) -> Option<&ExecutionError> {
    self.last_error.as_ref()
  }

  // endregion

  // region Editing between steps

  pub fn set_accumulator(&mut self, value: Value) {
    self.registers[0] = value;
  }

  pub fn set_register(&mut self, number: RegisterNumber, value: Value) -> Result<(), MachineError> {
    let register = self.registers
                       .get_mut(number)
                       .ok_or(MachineError::RegisterOutOfRange(number))?;
    *register = value;
    Ok(())
  }

  pub fn set_tape(&mut self, address: TapeAddress, value: Value) -> Result<(), MachineError> {
    let cell = self.tape
                   .get_mut(address)
                   .ok_or(MachineError::TapeAddressOutOfRange(address))?;
    *cell = value;
    Ok(())
  }

  // endregion

  // region Observability

  pub fn step_trace(&self) -> &StepTrace {
    &self.trace
  }

  pub fn has_accumulator_been_read(&self) -> bool {
    self.trace.accumulator_read
  }

  pub fn has_accumulator_been_changed(&self) -> bool {
    self.trace.accumulator_changed
  }

  pub fn has_register_been_read(&self, number: RegisterNumber) -> bool {
    self.trace.register_read == Some(number)
  }

  pub fn has_register_been_changed(&self, number: RegisterNumber) -> bool {
    self.trace.register_changed == Some(number)
  }

  pub fn has_tape_been_read(&self, address: TapeAddress) -> bool {
    self.trace.tape_read == Some(address)
  }

  pub fn has_tape_been_changed(&self, address: TapeAddress) -> bool {
    self.trace.tape_changed == Some(address)
  }

  // endregion

}


lazy_static! {
  static ref TABLE_DISPLAY_FORMAT: TableFormat::TableFormat =
    TableFormat::FormatBuilder::new()
      .column_separator('│')
      .borders(' ')
      .separator(
        TableFormat::LinePosition::Title,
        TableFormat::LineSeparator::new('─', '┼', ' ', ' ')
      )
      .separator(
        TableFormat::LinePosition::Bottom,
        TableFormat::LineSeparator::new('─', '┴', ' ', ' ')
      )
      .padding(1, 1)
      .build();
}

impl Display for Machine {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    // The accumulator is shown as the first register, and flagged through its own fields.
    let register_read = match self.trace.accumulator_read {
      true  => Some(0),
      false => self.trace.register_read
    };
    let register_changed = match self.trace.accumulator_changed {
      true  => Some(0),
      false => self.trace.register_changed
    };

    let r_table = Machine::make_cell_table(
      ("Register", "Value"),
      &self.registers,
      |i| match i { 0 => "A".to_string(), n => format!("R{}", n) },
      register_read,
      register_changed
    );
    let t_table = Machine::make_cell_table(
      ("Address", "Value"),
      &self.tape,
      |i| format!("T[{}]", i),
      self.trace.tape_read,
      self.trace.tape_changed
    );
    let p_table = self.make_program_table();

    let mut combined_table = table!([p_table, r_table, t_table]);

    combined_table.set_titles(row![ub->"Program", ub->"Registers", ub->"Tape"]);
    combined_table.set_format(*TABLE_DISPLAY_FORMAT);

    let status = match (self.halted, &self.last_error) {
      (true,  Some(error)) => format!("Halted. {}", error),
      (true,  None)        => "Halted.".to_string(),
      (false, _)           => format!("Running at line #{}.", self.program_counter),
    };

    write!(f, "{}\n{}", status, combined_table)
  }
}
