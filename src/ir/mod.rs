//! Three-address Tiger IR consumed by the back end.

pub mod parser;

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    str::FromStr,
};

use itertools::Itertools;
use strum::{Display, EnumDiscriminants, EnumIter, EnumString};
use thiserror::Error;

pub use parser::parse;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, EnumIter)]
pub enum BinOp {
    #[strum(serialize = "add")]
    Add,
    #[strum(serialize = "sub")]
    Sub,
    #[strum(serialize = "mult")]
    Mult,
    #[strum(serialize = "div")]
    Div,
    #[strum(serialize = "or")]
    Or,
    #[strum(serialize = "and")]
    And,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, EnumIter)]
pub enum RelOp {
    #[strum(serialize = "breq")]
    Eq,
    #[strum(serialize = "brneq")]
    Neq,
    #[strum(serialize = "brlt")]
    Lt,
    #[strum(serialize = "brgt")]
    Gt,
    #[strum(serialize = "brleq")]
    Leq,
    #[strum(serialize = "brgeq")]
    Geq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumDiscriminants)]
#[strum_discriminants(name(InstructionKind), derive(Hash, Display, EnumIter))]
pub enum Operation {
    Label,
    Assign,
    Arithmetic(BinOp),
    Branch(RelOp),
    Goto,
    Return,
    Call,
    CallWithResult,
    ArrayLoad,
    ArrayStore,
}

impl Operation {
    pub fn kind(&self) -> InstructionKind {
        InstructionKind::from(self)
    }

    /// Look up the operation spelled by an IR mnemonic (`assign`, `brneq`, `callr`, ...).
    pub fn from_mnemonic(mnemonic: &str) -> Option<Self> {
        let operation = match mnemonic {
            "assign" => Operation::Assign,
            "goto" => Operation::Goto,
            "return" => Operation::Return,
            "call" => Operation::Call,
            "callr" => Operation::CallWithResult,
            "array_load" => Operation::ArrayLoad,
            "array_store" => Operation::ArrayStore,
            other => {
                if let Ok(op) = BinOp::from_str(other) {
                    Operation::Arithmetic(op)
                } else if let Ok(op) = RelOp::from_str(other) {
                    Operation::Branch(op)
                } else {
                    return None;
                }
            }
        };
        Some(operation)
    }

    fn arity(&self) -> (usize, Option<usize>) {
        match self {
            Operation::Label | Operation::Goto => (1, Some(1)),
            Operation::Assign => (2, Some(3)),
            Operation::Arithmetic(_)
            | Operation::Branch(_)
            | Operation::ArrayLoad
            | Operation::ArrayStore => (3, Some(3)),
            Operation::Return => (0, Some(1)),
            Operation::Call => (1, None),
            Operation::CallWithResult => (2, None),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Label => write!(f, "label"),
            Operation::Assign => write!(f, "assign"),
            Operation::Arithmetic(op) => write!(f, "{}", op),
            Operation::Branch(op) => write!(f, "{}", op),
            Operation::Goto => write!(f, "goto"),
            Operation::Return => write!(f, "return"),
            Operation::Call => write!(f, "call"),
            Operation::CallWithResult => write!(f, "callr"),
            Operation::ArrayLoad => write!(f, "array_load"),
            Operation::ArrayStore => write!(f, "array_store"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InstructionError {
    #[error("`{operation}` takes {expected} operands, found {found}")]
    Arity {
        operation: String,
        expected: String,
        found: usize,
    },

    #[error("integer literal `{0}` does not fit in 32 bits")]
    IntegerOutOfRange(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    operation: Operation,
    operands: Vec<String>,
    defs: BTreeSet<String>,
    uses: BTreeSet<String>,
}

impl Instruction {
    pub fn new<I, S>(operation: Operation, operands: I) -> Result<Self, InstructionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let operands: Vec<String> = operands.into_iter().map(Into::into).collect();

        let (min, max) = operation.arity();
        if operands.len() < min || max.map_or(false, |max| operands.len() > max) {
            let expected = match max {
                Some(max) if max == min => min.to_string(),
                Some(max) => format!("{} to {}", min, max),
                None => format!("at least {}", min),
            };
            return Err(InstructionError::Arity {
                operation: operation.to_string(),
                expected,
                found: operands.len(),
            });
        }

        if let Some(operand) = operands
            .iter()
            .find(|operand| is_integer_syntax(operand) && !is_int_literal(operand))
        {
            return Err(InstructionError::IntegerOutOfRange(operand.clone()));
        }

        let (defs, uses): (&[String], &[String]) = match operation {
            Operation::Label | Operation::Goto => (&[], &[]),
            Operation::Assign if operands.len() == 3 => (&[], &operands[2..]),
            Operation::Assign => (&operands[..1], &operands[1..]),
            Operation::Arithmetic(_) => (&operands[2..], &operands[..2]),
            Operation::Branch(_) => (&[], &operands[..2]),
            Operation::Return => (&[], &operands[..]),
            Operation::Call => (&[], &operands[1..]),
            Operation::CallWithResult => (&operands[..1], &operands[2..]),
            Operation::ArrayLoad => (&operands[..1], &operands[2..]),
            Operation::ArrayStore => (&[], &operands[1..]),
        };

        let names = |operands: &[String]| {
            operands
                .iter()
                .filter(|operand| !is_literal(operand))
                .cloned()
                .collect()
        };
        let defs = names(defs);
        let uses = names(uses);

        Ok(Self {
            operation,
            operands,
            defs,
            uses,
        })
    }

    pub fn label(name: impl Into<String>) -> Self {
        Self {
            operation: Operation::Label,
            operands: vec![name.into()],
            defs: BTreeSet::new(),
            uses: BTreeSet::new(),
        }
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn kind(&self) -> InstructionKind {
        self.operation.kind()
    }

    pub fn operands(&self) -> &[String] {
        &self.operands
    }

    /// Variables written by this instruction. Literals never appear here.
    pub fn defs(&self) -> &BTreeSet<String> {
        &self.defs
    }

    /// Variables read by this instruction. Literals never appear here.
    pub fn uses(&self) -> &BTreeSet<String> {
        &self.uses
    }

    pub fn label_name(&self) -> Option<&str> {
        match self.operation {
            Operation::Label => Some(&self.operands[0]),
            _ => None,
        }
    }

    /// The label a branch or goto transfers control to.
    pub fn jump_target(&self) -> Option<&str> {
        match self.operation {
            Operation::Branch(_) => Some(&self.operands[2]),
            Operation::Goto => Some(&self.operands[0]),
            _ => None,
        }
    }

    /// Whether control leaves the block after this instruction.
    pub fn is_terminator(&self) -> bool {
        matches!(
            self.kind(),
            InstructionKind::Branch | InstructionKind::Goto | InstructionKind::Return
        )
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operation {
            Operation::Label => write!(f, "{}:", self.operands[0]),
            _ if self.operands.is_empty() => write!(f, "{},", self.operation),
            _ => write!(f, "{}, {}", self.operation, self.operands.iter().join(", ")),
        }
    }
}

/// A literal that fits a MIPS word.
pub fn is_int_literal(operand: &str) -> bool {
    is_integer_syntax(operand) && operand.parse::<i32>().is_ok()
}

pub fn is_float_literal(operand: &str) -> bool {
    looks_numeric(operand) && !is_integer_syntax(operand) && operand.parse::<f64>().is_ok()
}

pub fn is_literal(operand: &str) -> bool {
    is_int_literal(operand) || is_float_literal(operand)
}

fn is_integer_syntax(operand: &str) -> bool {
    let digits = operand
        .strip_prefix(|c: char| c == '-' || c == '+')
        .unwrap_or(operand);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

// keeps names such as `inf` or `nan` out of the float literals
fn looks_numeric(operand: &str) -> bool {
    operand
        .chars()
        .next()
        .map_or(false, |c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.'))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub is_float: bool,
}

impl Parameter {
    pub fn int(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_float: false,
        }
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_float: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Function {
    pub name: String,
    pub int_locals: Vec<String>,
    pub float_locals: Vec<String>,
    pub params: Vec<Parameter>,
    /// Locally declared arrays (locals and parameters) and their element counts.
    pub arrays: BTreeMap<String, usize>,
    pub instructions: Vec<Instruction>,
}

impl Function {
    /// Arrays reachable from this function: statics first, locals shadow them.
    pub fn visible_arrays(&self, program: &Program) -> BTreeMap<String, usize> {
        let mut arrays = program.static_arrays.clone();
        arrays.extend(self.arrays.iter().map(|(name, size)| (name.clone(), *size)));
        arrays
    }

    pub fn float_variables(&self, program: &Program) -> BTreeSet<String> {
        let mut floats: BTreeSet<String> = program.float_statics.iter().cloned().collect();
        floats.extend(self.float_locals.iter().cloned());
        floats.extend(
            self.params
                .iter()
                .filter(|param| param.is_float)
                .map(|param| param.name.clone()),
        );
        floats
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Program {
    /// Int-typed statics, arrays included, in declaration order.
    pub int_statics: Vec<String>,
    /// Float-typed statics, arrays included, in declaration order.
    pub float_statics: Vec<String>,
    pub static_arrays: BTreeMap<String, usize>,
    pub functions: Vec<Function>,
}

impl Program {
    pub fn statics(&self) -> impl Iterator<Item = &String> {
        self.int_statics.iter().chain(self.float_statics.iter())
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|function| function.name == name)
    }
}
