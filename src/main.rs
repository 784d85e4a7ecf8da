use std::{fs, process};
use std::path::PathBuf;

use clap::{ArgAction, Parser};

use ramach::bytecode::{compile, decompile};
use ramach::machine::{Machine, StepOutcome};
use ramach::runner::Speed;

const DEFAULT_TAPE_LENGTH: usize = 16;
const DEFAULT_REGISTER_COUNT: usize = 8;
const DEFAULT_MAX_STEPS: usize = 10_000;

#[derive(Parser, Debug)]
#[command(
  name = "ramach",
  version,
  about = "RAMACH - Random Access Machine emulator"
)]
struct Cli {
  /// Assembly source file.
  #[arg(value_name = "FILE")]
  filename: PathBuf,
  /// Tape length.
  #[arg(long = "tape", value_name = "N", default_value_t = DEFAULT_TAPE_LENGTH)]
  tape_length: usize,
  /// Number of general registers.
  #[arg(long = "registers", value_name = "N", default_value_t = DEFAULT_REGISTER_COUNT)]
  register_count: usize,
  /// Stop after this many steps.
  #[arg(long, value_name = "N", default_value_t = DEFAULT_MAX_STEPS)]
  max_steps: usize,
  /// Initial tape contents.
  #[arg(long = "input", value_name = "VALUES", value_delimiter = ',', allow_hyphen_values = true)]
  tape: Vec<i64>,
  /// Print the assembled program and exit.
  #[arg(long, action = ArgAction::SetTrue)]
  compile_only: bool,
  /// Print the machine after every step.
  #[arg(long, action = ArgAction::SetTrue)]
  trace: bool,
  /// Pause between traced steps, 1 slowest.
  #[arg(long, value_name = "1-5", value_parser = clap::value_parser!(u8).range(1..=5))]
  speed: Option<u8>,
}

impl Cli {
  fn speed(&self) -> Option<Speed> {
    self.speed.map(|level| match level {
      1 => Speed::Slowest,
      2 => Speed::Slow,
      3 => Speed::Medium,
      4 => Speed::Fast,
      _ => Speed::Fastest,
    })
  }
}

fn run(options: &Cli) -> Result<(), String> {
  let source = fs::read_to_string(&options.filename)
    .map_err(|e| format!("Failed to read '{}': {}", options.filename.display(), e))?;

  let program = compile(&source).map_err(|e| format!("Assembly error: {}", e))?;
  println!("{}\n", decompile(&program));
  if options.compile_only {
    return Ok(());
  }

  let mut machine = Machine::new(options.tape_length, options.register_count)
    .map_err(|e| e.to_string())?;
  for (address, value) in options.tape.iter().enumerate() {
    machine.set_tape(address, *value).map_err(|e| e.to_string())?;
  }
  machine.set_program(program);

  let mut steps = 0;
  while !machine.is_halted() && steps < options.max_steps {
    let outcome = machine.step();
    steps += 1;
    if options.trace {
      println!("{}", machine);
      if let Some(speed) = options.speed() {
        std::thread::sleep(speed.interval());
      }
    }
    if let StepOutcome::Faulted(error) = outcome {
      eprintln!("{}", error);
    }
  }

  if !options.trace {
    println!("{}", machine);
  }
  match machine.is_halted() {
    true  => println!("Halted after {} steps.", steps),
    false => println!("Stopped after {} steps without halting.", steps),
  }
  Ok(())
}

fn main() {
  let cli = Cli::parse();

  if let Err(e) = run(&cli) {
    eprintln!("{}", e);
    process::exit(1);
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults(){
    let cli = Cli::parse_from(["ramach", "program.ram"]);
    assert_eq!(cli.filename, PathBuf::from("program.ram"));
    assert_eq!(cli.tape_length, DEFAULT_TAPE_LENGTH);
    assert_eq!(cli.register_count, DEFAULT_REGISTER_COUNT);
    assert_eq!(cli.max_steps, DEFAULT_MAX_STEPS);
    assert!(cli.tape.is_empty());
    assert!(!cli.compile_only && !cli.trace);
    assert_eq!(cli.speed(), None);
  }

  #[test]
  fn value_flags(){
    let cli = Cli::parse_from([
      "ramach", "program.ram",
      "--tape", "4",
      "--registers", "2",
      "--max-steps", "50",
      "--input", "3,-1,0",
      "--speed", "4",
      "--trace",
    ]);
    assert_eq!(cli.tape_length, 4);
    assert_eq!(cli.register_count, 2);
    assert_eq!(cli.max_steps, 50);
    assert_eq!(cli.tape, vec![3i64, -1, 0]);
    assert_eq!(cli.speed(), Some(Speed::Fast));
    assert!(cli.trace);
  }

  #[test]
  fn speed_out_of_range_is_rejected(){
    assert!(Cli::try_parse_from(["ramach", "program.ram", "--speed", "6"]).is_err());
    assert!(Cli::try_parse_from(["ramach", "program.ram", "--speed", "0"]).is_err());
    assert!(Cli::try_parse_from(["ramach"]).is_err());
  }

}
