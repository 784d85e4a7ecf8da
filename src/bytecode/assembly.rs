/*!
  The human readable textual form of a program is called assembly. This module turns
  assembly into a `Program` and back.

  Syntax, one instruction per line:

  ```text
  [label:]... MNEMONIC [argument]   ; comment
  ```

  Everything is case insensitive. Registers are written `r<n>` (`r0` is the accumulator),
  literals are non-negative decimal, `0x` hexadecimal, or `0b` binary numerals, and any
  other argument starting with a letter names a label. Several labels may precede one
  instruction, and a label with no instruction after it points at an implicit `HALT`
  appended to the program.
*/

use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use nom::{
  branch::alt,
  bytes::complete::{is_a, tag},
  character::complete::{char as one_char, digit1, hex_digit1},
  combinator::{all_consuming, map, opt},
  sequence::{pair, preceded},
  IResult
};
use string_cache::DefaultAtom;

use crate::argument::{Argument, Position, RegisterNumber, Value};
use crate::bytecode::{ArgumentError, Instruction, Mnemonic, Program};

const COMMENT_CHAR: char = ';';
const LABEL_SUFFIX: char = ':';

/// Literals are limited to the range of a 32 bit signed integer.
pub const MAX_LITERAL: Value = i32::MAX as Value;

/// Errors raised by `compile`. Line numbers count from 1.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum AssemblyError {
  DuplicateLabel {
    label      : String,
    first_line : usize,
    line       : usize
  },
  InvalidLabel {
    label : String,
    line  : usize
  },
  UnknownMnemonic {
    mnemonic : String,
    line     : usize
  },
  MissingArguments {
    mnemonic : Mnemonic,
    expected : usize,
    given    : usize,
    line     : usize
  },
  InvalidRegister {
    token : String,
    line  : usize
  },
  UndefinedLabel {
    label : String,
    line  : usize
  },
  InvalidNumeral {
    token : String,
    line  : usize
  },
  NegativeLiteral {
    token : String,
    line  : usize
  },
  UnsupportedArgument {
    line   : usize,
    source : ArgumentError
  },
  IncompleteInstruction {
    line   : usize,
    source : ArgumentError
  }
}

impl AssemblyError {
  pub fn line(&self) -> usize {
    match self {
      | AssemblyError::DuplicateLabel{ line, .. }
      | AssemblyError::InvalidLabel{ line, .. }
      | AssemblyError::UnknownMnemonic{ line, .. }
      | AssemblyError::MissingArguments{ line, .. }
      | AssemblyError::InvalidRegister{ line, .. }
      | AssemblyError::UndefinedLabel{ line, .. }
      | AssemblyError::InvalidNumeral{ line, .. }
      | AssemblyError::NegativeLiteral{ line, .. }
      | AssemblyError::UnsupportedArgument{ line, .. }
      | AssemblyError::IncompleteInstruction{ line, .. } => *line
    }
  }
}

impl Display for AssemblyError {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      AssemblyError::DuplicateLabel{ label, first_line, line } => {
        write!(
          f,
          "Error on line {}: label {} was already declared on line {}.",
          line, label, first_line
        )
      }
      AssemblyError::InvalidLabel{ label, line } => {
        write!(f, "Error on line {}: \"{}\" is not a valid label name.", line, label)
      }
      AssemblyError::UnknownMnemonic{ mnemonic, line } => {
        write!(f, "Error on line {}: \"{}\" is not an instruction.", line, mnemonic)
      }
      AssemblyError::MissingArguments{ mnemonic, expected, given, line } => {
        write!(
          f,
          "Error on line {}: {} requires {} arguments, only {} given.",
          line, mnemonic, expected, given
        )
      }
      AssemblyError::InvalidRegister{ token, line } => {
        write!(f, "Error on line {}: invalid register {}.", line, token)
      }
      AssemblyError::UndefinedLabel{ label, line } => {
        write!(f, "Error on line {}: undefined label \"{}\".", line, label)
      }
      AssemblyError::InvalidNumeral{ token, line } => {
        write!(f, "Error on line {}: invalid numeral {}.", line, token)
      }
      AssemblyError::NegativeLiteral{ token, line } => {
        write!(f, "Error on line {}: negative literal {}.", line, token)
      }
      AssemblyError::UnsupportedArgument{ line, source } => {
        write!(f, "Error on line {}: unsupported argument. {}.", line, source)
      }
      AssemblyError::IncompleteInstruction{ line, source } => {
        write!(f, "Error on line {}: illegal instruction. {}.", line, source)
      }
    }
  }
}

impl Error for AssemblyError {
  fn source(&self) -> Option<&(dyn Error + 'static)> {
    match self {
      | AssemblyError::UnsupportedArgument{ source, .. }
      | AssemblyError::IncompleteInstruction{ source, .. } => Some(source),
      _ => None
    }
  }
}

// region Argument token parsers

fn register_p(input: &str) -> IResult<&str, &str> {
  preceded(pair(one_char('r'), opt(one_char('+'))), digit1)(input)
}

/// A numeral with an optional sign: `(negative, radix, digits)`.
fn numeral_p(input: &str) -> IResult<&str, (bool, u32, &str)> {
  map(
    pair(
      opt(alt((one_char('-'), one_char('+')))),
      alt((
        map(preceded(tag("0x"), hex_digit1), |digits| (16u32, digits)),
        map(preceded(tag("0b"), is_a("01")), |digits| (2u32, digits)),
        map(digit1, |digits| (10u32, digits))
      ))
    ),
    |(sign, (radix, digits))| (sign == Some('-'), radix, digits)
  )(input)
}

/// Register tokens are `r` followed by a digit or a sign; other `r...` words are labels.
fn looks_like_register(token: &str) -> bool {
  let mut chars = token.chars();
  chars.next() == Some('r')
    && matches!(chars.next(), Some(c) if c.is_ascii_digit() || c == '-' || c == '+')
}

fn is_label_name(name: &str) -> bool {
  name.starts_with(|c: char| c.is_ascii_lowercase())
    && !name.contains(char::is_whitespace)
    && !name.contains(LABEL_SUFFIX)
    && !looks_like_register(name)
}

fn parse_register(token: &str, line: usize) -> Result<RegisterNumber, AssemblyError> {
  let invalid = || AssemblyError::InvalidRegister{ token: token.to_string(), line };
  let (_, digits) = all_consuming(register_p)(token).map_err(|_| invalid())?;
  digits.parse::<RegisterNumber>().map_err(|_| invalid())
}

fn parse_literal(token: &str, line: usize) -> Result<Value, AssemblyError> {
  let invalid = || AssemblyError::InvalidNumeral{ token: token.to_string(), line };
  let (_, (negative, radix, digits)) = all_consuming(numeral_p)(token).map_err(|_| invalid())?;
  let value = Value::from_str_radix(digits, radix).map_err(|_| invalid())?;
  if negative && value != 0 {
    return Err(AssemblyError::NegativeLiteral{ token: token.to_string(), line });
  }
  if value > MAX_LITERAL {
    return Err(invalid());
  }
  Ok(value)
}

// endregion

/// Label declarations discovered in the first pass.
#[derive(Default)]
struct LabelTable {
  /// Label name to (target position, line of declaration).
  targets  : HashMap<String, (Position, usize)>,
  /// Target position to the labels attached to it, in declaration order.
  attached : HashMap<Position, Vec<DefaultAtom>>
}

impl LabelTable {

  fn declare(&mut self, label: &str, position: Position, line: usize) -> Result<(), AssemblyError> {
    if !is_label_name(label) {
      return Err(AssemblyError::InvalidLabel{ label: label.to_string(), line });
    }
    match self.targets.get(label) {
      // Repeating a label at the same target is harmless.
      Some((existing, _)) if *existing == position => Ok(()),

      Some((_, first_line)) => {
        Err(AssemblyError::DuplicateLabel{
          label: label.to_string(),
          first_line: *first_line,
          line
        })
      }

      None => {
        self.targets.insert(label.to_string(), (position, line));
        self.attached.entry(position).or_insert_with(Vec::new).push(DefaultAtom::from(label));
        Ok(())
      }
    }
  }

  fn resolve(&self, label: &str) -> Option<Position> {
    self.targets.get(label).map(|(position, _)| *position)
  }

  fn attached_to(&self, position: Position) -> &[DefaultAtom] {
    self.attached.get(&position).map(Vec::as_slice).unwrap_or(&[])
  }

}

/// A source line that holds an instruction once comments and labels are removed.
struct SourceLine {
  line : usize,
  text : String
}

fn classify_argument(token: &str, labels: &LabelTable, line: usize) -> Result<Argument, AssemblyError> {
  if looks_like_register(token) {
    parse_register(token, line).map(Argument::Register)
  } else if token.starts_with(|c: char| c.is_ascii_lowercase()) {
    match labels.resolve(token) {
      Some(position) => Ok(Argument::label(token, position)),
      None => Err(AssemblyError::UndefinedLabel{ label: token.to_string(), line })
    }
  } else {
    parse_literal(token, line).map(Argument::Literal)
  }
}

fn assemble_line(source: &SourceLine, position: Position, labels: &LabelTable)
  -> Result<Instruction, AssemblyError>
{
  let line = source.line;
  let mut tokens = source.text.split_whitespace();

  // Lines reaching this point are non-empty.
  let mnemonic_text = tokens.next().unwrap_or_default();
  let mnemonic = Mnemonic::from_str(mnemonic_text).map_err(|_| {
    AssemblyError::UnknownMnemonic{ mnemonic: mnemonic_text.to_string(), line }
  })?;

  let mut builder = Instruction::builder(mnemonic);
  for label in labels.attached_to(position) {
    builder.label(label.clone());
  }

  let arity = mnemonic.arity();
  for given in 0..arity {
    let token = tokens.next().ok_or(AssemblyError::MissingArguments{
      mnemonic,
      expected: arity,
      given,
      line
    })?;
    let argument = classify_argument(token, labels, line)?;
    builder.argument(argument)
           .map_err(|source| AssemblyError::UnsupportedArgument{ line, source })?;
  }

  builder.build().map_err(|source| AssemblyError::IncompleteInstruction{ line, source })
}

/**
  Assembles `code` into a program.

  The first pass strips comments, records every label with the position of the
  instruction that follows it, and keeps the lines that still hold an instruction. The
  second pass builds one instruction per kept line, resolving label arguments against
  the table from the first pass, so forward references work.
*/
pub fn compile(code: &str) -> Result<Program, AssemblyError> {
  let mut labels = LabelTable::default();
  let mut kept: Vec<SourceLine> = vec![];

  // First pass
  for (index, raw_line) in code.split('\n').enumerate() {
    let line = index + 1;
    let mut text = raw_line.trim().to_lowercase();

    if let Some(comment) = text.find(COMMENT_CHAR) {
      text.truncate(comment);
    }

    let mut rest = text.trim();
    while let Some(colon) = rest.find(LABEL_SUFFIX) {
      let label = rest[..colon].trim();
      if !label.is_empty() {
        labels.declare(label, kept.len() + 1, line)?;
      }
      rest = rest[colon + 1..].trim();
    }

    if !rest.is_empty() {
      kept.push(SourceLine{ line, text: rest.to_string() });
    }
  }

  // Labels after the last instruction point at an implicit halt.
  if !labels.attached_to(kept.len() + 1).is_empty() {
    let line = code.split('\n').count();
    let text: &'static str = Mnemonic::Halt.into();
    kept.push(SourceLine{ line, text: text.to_string() });
  }

  // Second pass
  let instructions =
    kept.iter()
        .enumerate()
        .map(|(index, source)| assemble_line(source, index + 1, &labels))
        .collect::<Result<Vec<Instruction>, AssemblyError>>()?;

  #[cfg(feature = "trace_computation")]
  println!("Assembled {} instructions from {} lines.", instructions.len(), code.split('\n').count());

  Ok(Program::new(instructions))
}

/// Renders instructions as assembly, one per line, with no trailing newline.
pub fn decompile(instructions: &[Instruction]) -> String {
  instructions.iter()
              .map(Instruction::to_string)
              .collect::<Vec<String>>()
              .join("\n")
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::bytecode::ArgumentShape;
  use strum::IntoEnumIterator;

  fn mnemonics(program: &Program) -> Vec<Mnemonic> {
    program.iter().map(Instruction::mnemonic).collect()
  }

  #[test]
  fn label_resolution(){
    let program = compile("loop: add r1\n sub r2\n jump loop").unwrap();
    assert_eq!(mnemonics(&program), vec![Mnemonic::Add, Mnemonic::Sub, Mnemonic::Jump]);
    assert_eq!(program[2].argument(0), Some(&Argument::label("loop", 1)));
    assert_eq!(program[0].labels(), &[DefaultAtom::from("loop")]);
  }

  #[test]
  fn forward_reference(){
    let program = compile("jzero done\nadd 1\ndone: halt").unwrap();
    assert_eq!(program[0].argument(0).and_then(Argument::position), Some(3));
  }

  #[test]
  fn trailing_label_gets_a_halt(){
    let program = compile("end:").unwrap();
    assert_eq!(program.len(), 1);
    assert_eq!(program[0].mnemonic(), Mnemonic::Halt);
    assert_eq!(program[0].labels(), &[DefaultAtom::from("end")]);
  }

  #[test]
  fn trailing_label_after_code(){
    let program = compile("jump end\nadd 1\nend:\n\n").unwrap();
    assert_eq!(mnemonics(&program), vec![Mnemonic::Jump, Mnemonic::Add, Mnemonic::Halt]);
    assert_eq!(program[0].argument(0).and_then(Argument::position), Some(3));
  }

  #[test]
  fn several_labels_on_one_instruction(){
    let program = compile("a: b:\nc: nop").unwrap();
    assert_eq!(program.len(), 1);
    assert_eq!(
      program[0].labels(),
      &[DefaultAtom::from("a"), DefaultAtom::from("b"), DefaultAtom::from("c")]
    );
  }

  #[test]
  fn repeated_label_at_same_target_is_tolerated(){
    let program = compile("x: x: nop").unwrap();
    assert_eq!(program[0].labels(), &[DefaultAtom::from("x")]);
  }

  #[test]
  fn duplicate_label(){
    let result = compile("x: nop\nx: halt");
    assert_eq!(
      result,
      Err(AssemblyError::DuplicateLabel{ label: "x".to_string(), first_line: 1, line: 2 })
    );
  }

  #[test]
  fn comments_and_blank_lines(){
    let program = compile("; header\n\n  ADD 0x10 ; sixteen\n;\nhalf").unwrap();
    assert_eq!(mnemonics(&program), vec![Mnemonic::Add, Mnemonic::Half]);
    assert_eq!(program[0].argument(0), Some(&Argument::literal(16)));
  }

  #[test]
  fn numerals(){
    let program = compile("add 0b101\nadd 0xff\nadd 42\nadd -0").unwrap();
    let values: Vec<Argument> = program.iter().map(|i| i.arguments()[0].clone()).collect();
    assert_eq!(
      values,
      vec![Argument::literal(5), Argument::literal(255), Argument::literal(42), Argument::literal(0)]
    );
  }

  #[test]
  fn registers(){
    let program = compile("load R3\nstore r0").unwrap();
    assert_eq!(program[0].argument(0), Some(&Argument::register(3)));
    assert_eq!(program[1].argument(0), Some(&Argument::register(0)));
  }

  #[test]
  fn plus_signs_are_accepted(){
    let program = compile("add +5\nload r+1\nsub +0x10").unwrap();
    assert_eq!(program[0].argument(0), Some(&Argument::literal(5)));
    assert_eq!(program[1].argument(0), Some(&Argument::register(1)));
    assert_eq!(program[2].argument(0), Some(&Argument::literal(16)));
    assert!(matches!(compile("load r-1"), Err(AssemblyError::InvalidRegister{ line: 1, .. })));
    assert!(matches!(compile("add +-5"), Err(AssemblyError::InvalidNumeral{ line: 1, .. })));
  }

  #[test]
  fn label_names_may_start_with_r(){
    let program = compile("restart: jump restart").unwrap();
    assert_eq!(program[0].argument(0), Some(&Argument::label("restart", 1)));
  }

  #[test]
  fn label_in_literal_position_fails(){
    let result = compile("loop: add loop");
    assert!(matches!(
      result,
      Err(AssemblyError::UnsupportedArgument{
        line: 1,
        source: ArgumentError::Unsupported{ mnemonic: Mnemonic::Add, .. }
      })
    ));
  }

  #[test]
  fn literal_in_register_position_fails(){
    assert!(matches!(compile("load 3"), Err(AssemblyError::UnsupportedArgument{ line: 1, .. })));
    assert!(matches!(compile("jump 3"), Err(AssemblyError::UnsupportedArgument{ line: 1, .. })));
  }

  #[test]
  fn negative_literals_fail(){
    for source in &["add -1", "write -1", "read -0x1", "sub -0b1"] {
      assert!(
        matches!(compile(source), Err(AssemblyError::NegativeLiteral{ line: 1, .. })),
        "{} should be rejected", source
      );
    }
  }

  #[test]
  fn malformed_tokens(){
    assert!(matches!(compile("add 12ab"), Err(AssemblyError::InvalidNumeral{ line: 1, .. })));
    assert!(matches!(compile("add 0xzz"), Err(AssemblyError::InvalidNumeral{ line: 1, .. })));
    assert!(matches!(compile("add 0b12"), Err(AssemblyError::InvalidNumeral{ line: 1, .. })));
    assert!(matches!(compile("add 99999999999"), Err(AssemblyError::InvalidNumeral{ .. })));
    assert!(matches!(compile("load r1x"), Err(AssemblyError::InvalidRegister{ line: 1, .. })));
    assert!(matches!(compile("load r-1"), Err(AssemblyError::InvalidRegister{ line: 1, .. })));
    assert!(matches!(compile("jump nowhere"), Err(AssemblyError::UndefinedLabel{ line: 1, .. })));
  }

  #[test]
  fn unknown_mnemonic_reports_line(){
    let result = compile("nop\n\nmul r1");
    assert_eq!(
      result,
      Err(AssemblyError::UnknownMnemonic{ mnemonic: "mul".to_string(), line: 3 })
    );
  }

  #[test]
  fn missing_argument(){
    let result = compile("add");
    assert_eq!(
      result,
      Err(AssemblyError::MissingArguments{ mnemonic: Mnemonic::Add, expected: 1, given: 0, line: 1 })
    );
    assert_eq!(
      result.unwrap_err().to_string(),
      "Error on line 1: ADD requires 1 arguments, only 0 given."
    );
  }

  #[test]
  fn invalid_label_names(){
    assert!(matches!(compile("1x: nop"), Err(AssemblyError::InvalidLabel{ line: 1, .. })));
    assert!(matches!(compile("r2: nop"), Err(AssemblyError::InvalidLabel{ line: 1, .. })));
  }

  #[test]
  fn empty_source(){
    assert!(compile("").unwrap().is_empty());
    assert!(compile("  ; nothing here\n\n").unwrap().is_empty());
  }

  #[test]
  fn decompile_text(){
    let program = compile("start: Load r1\n write 0x0\nagain: also: jpos start\n half").unwrap();
    assert_eq!(decompile(&program), "start: LOAD R1\nWRITE 0\nagain: also: JPOS start\nHALF");
  }

  #[test]
  fn round_trip(){
    let source = "
      ; count down r1 to zero
      start:  load r1
      loop:   jzero done
              sub 1
              store r1
              write r1
              jump loop
      done:   halt
      tail:
    ";
    let first = compile(source).unwrap();
    let second = compile(&decompile(&first)).unwrap();
    assert_eq!(first, second);
  }

  /// Xorshift generator so that generated sources are reproducible.
  struct XorShift(u64);

  impl XorShift {
    fn below(&mut self, bound: usize) -> usize {
      self.0 ^= self.0 << 13;
      self.0 ^= self.0 >> 7;
      self.0 ^= self.0 << 17;
      (self.0 % bound as u64) as usize
    }
  }

  fn random_literal(rng: &mut XorShift) -> String {
    let value = rng.below(300);
    match rng.below(4) {
      0 => format!("{}", value),
      1 => format!("0x{:x}", value),
      2 => format!("0b{:b}", value),
      _ => format!("+{}", value),
    }
  }

  fn random_register(rng: &mut XorShift) -> String {
    let number = rng.below(10);
    match rng.below(3) {
      0 => format!("r{}", number),
      1 => format!("R{}", number),
      _ => format!("r+{}", number),
    }
  }

  /// A well-formed source with `length` instructions, random label placement, and maybe a
  /// trailing label.
  fn random_source(rng: &mut XorShift, length: usize) -> (String, usize) {
    let catalog: Vec<Mnemonic> = Mnemonic::iter().collect();
    let mut labels: Vec<Vec<String>> = vec![vec![]; length];
    let mut names: Vec<String> = vec![];
    labels[0].push("start".to_string());
    names.push("start".to_string());
    for (position, attached) in labels.iter_mut().enumerate() {
      for extra in 0..rng.below(3) {
        let name = format!("at{}x{}", position, extra);
        attached.push(name.clone());
        names.push(name);
      }
    }

    let mut source = String::new();
    for attached in &labels {
      for label in attached {
        source.push_str(label);
        source.push_str(": ");
        if rng.below(2) == 0 {
          source.push('\n');
        }
      }
      let mnemonic = catalog[rng.below(catalog.len())];
      let text: &'static str = mnemonic.into();
      source.push_str(&if rng.below(2) == 0 { text.to_lowercase() } else { text.to_string() });
      if let Some(shape) = mnemonic.shape(0) {
        let argument = match shape {
          ArgumentShape::Register => random_register(rng),
          ArgumentShape::LiteralOrRegister if rng.below(2) == 0 => random_register(rng),
          ArgumentShape::LiteralOrRegister => random_literal(rng),
          ArgumentShape::Label => names[rng.below(names.len())].clone(),
        };
        source.push(' ');
        source.push_str(&argument);
      }
      if rng.below(3) == 0 {
        source.push_str(" ; note");
      }
      source.push('\n');
    }

    let mut expected = length;
    if rng.below(3) == 0 {
      source.push_str("tail:\n");
      expected += 1;
    }
    (source, expected)
  }

  #[test]
  fn round_trip_of_generated_sources(){
    let mut rng = XorShift(0x2545_f491_4f6c_dd1d);
    for _ in 0..300 {
      let length = 1 + rng.below(8);
      let (source, expected) = random_source(&mut rng, length);
      let first = compile(&source).unwrap_or_else(|e| panic!("{}\n{}", e, source));
      assert_eq!(first.len(), expected, "{}", source);
      let second = compile(&decompile(&first)).unwrap();
      assert_eq!(first, second, "{}", source);
    }
  }

}
