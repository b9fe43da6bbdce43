pub mod flow;
mod generator;
pub mod graph;
pub mod liveness;
pub mod mips;
pub mod reg_alloc;

use thiserror::Error;

pub use generator::generate;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("undefined label `{label}` in function `{function}`")]
    UndefinedLabel { function: String, label: String },

    #[error("label `{0}` is defined more than once")]
    DuplicateLabel(String),

    #[error("cannot resolve operand `{0}`")]
    UnresolvableOperand(String),

    #[error("`{0}` is not an array")]
    UnknownArray(String),

    #[error("cannot implicitly convert float `{0}` to int")]
    NarrowingConversion(String),

    #[error("`{0}` is not supported on floats")]
    UnsupportedFloatOperation(String),

    #[error("array `{array}` cannot be passed to `{callee}`")]
    ArrayArgument { callee: String, array: String },

    #[error("cannot assign between array and scalar: `{0}`")]
    ArrayMismatch(String),

    #[error("literal `{0}` cannot be assigned to")]
    LiteralDestination(String),

    #[error("function `{0}` has no instructions")]
    EmptyFunction(String),
}
