//! Registers, instruction templates and runtime routines of the MIPS target.

use std::{collections::HashMap, fmt::Display};

use once_cell::sync::Lazy;

use crate::ir::{BinOp, RelOp};

pub const ZERO: &str = "$zero";
pub const SP: &str = "$sp";
pub const RA: &str = "$ra";
pub const V0: &str = "$v0";
pub const F0: &str = "$f0";

pub const INT_ARGS: [&str; 4] = ["$a0", "$a1", "$a2", "$a3"];
pub const FLOAT_ARGS: [&str; 2] = ["$f12", "$f14"];

pub const INT_TEMPS: [&str; 3] = ["$t0", "$t1", "$t2"];
pub const FLOAT_TEMPS: [&str; 3] = ["$f4", "$f6", "$f8"];

/// Callee-saved registers handed out by the allocators.
pub const INT_SAVED: [&str; 8] = ["$s0", "$s1", "$s2", "$s3", "$s4", "$s5", "$s6", "$s7"];
pub const FLOAT_SAVED: [&str; 6] = ["$f20", "$f22", "$f24", "$f26", "$f28", "$f30"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterClass {
    Int,
    Float,
}

impl RegisterClass {
    pub fn of(is_float: bool) -> Self {
        if is_float {
            RegisterClass::Float
        } else {
            RegisterClass::Int
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, RegisterClass::Float)
    }

    pub fn saved(&self) -> &'static [&'static str] {
        match self {
            RegisterClass::Int => &INT_SAVED,
            RegisterClass::Float => &FLOAT_SAVED,
        }
    }

    /// Scratch register number `n` (0..3) of this class.
    pub fn temp(&self, n: usize) -> &'static str {
        match self {
            RegisterClass::Int => INT_TEMPS[n],
            RegisterClass::Float => FLOAT_TEMPS[n],
        }
    }

    pub fn return_register(&self) -> &'static str {
        match self {
            RegisterClass::Int => V0,
            RegisterClass::Float => F0,
        }
    }

    pub fn first_argument(&self) -> &'static str {
        match self {
            RegisterClass::Int => INT_ARGS[0],
            RegisterClass::Float => FLOAT_ARGS[0],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LibraryFunction {
    pub label: &'static str,
    pub argument: RegisterClass,
}

/// Runtime routines called directly with one argument in `$a0` or `$f12`.
pub static LIBRARY: Lazy<HashMap<&'static str, LibraryFunction>> = Lazy::new(|| {
    let int = |label| LibraryFunction {
        label,
        argument: RegisterClass::Int,
    };
    HashMap::from([
        ("printi", int("_lprinti")),
        (
            "printf",
            LibraryFunction {
                label: "_lprintf",
                argument: RegisterClass::Float,
            },
        ),
        ("not", int("_lnot")),
        ("exit", int("_lexit")),
    ])
});

/// Labels defined by `standard_routines`.
pub const LIBRARY_LABELS: [&str; 6] = [
    "_lprinti",
    "_lprintf",
    "_lnot",
    "_lexit",
    "__ret_zero_start",
    "__ret_zero_end",
];

pub fn standard_routines() -> Vec<String> {
    [
        "_lprinti:",
        "\tli $v0, 1",
        "\tsyscall",
        "\tli $a0, 10",
        "\tli $v0, 11",
        "\tsyscall",
        "\tjr $ra",
        "_lprintf:",
        "\tli $v0, 2",
        "\tsyscall",
        "\tli $a0, 10",
        "\tli $v0, 11",
        "\tsyscall",
        "\tjr $ra",
        "_lnot:",
        "\tbne $a0, $zero, __ret_zero_start",
        "\tli $v0, 1",
        "\tj __ret_zero_end",
        "__ret_zero_start:",
        "\tli $v0, 0",
        "__ret_zero_end:",
        "\tjr $ra",
        "_lexit:",
        "\tli $v0, 17",
        "\tsyscall",
        "\tjr $ra",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

pub fn arithmetic(op: BinOp, class: RegisterClass) -> Option<&'static str> {
    let mnemonic = match (op, class) {
        (BinOp::Add, RegisterClass::Int) => "add",
        (BinOp::Sub, RegisterClass::Int) => "sub",
        (BinOp::Mult, RegisterClass::Int) => "mul",
        (BinOp::Div, RegisterClass::Int) => "div",
        (BinOp::Or, RegisterClass::Int) => "or",
        (BinOp::And, RegisterClass::Int) => "and",
        (BinOp::Add, RegisterClass::Float) => "add.s",
        (BinOp::Sub, RegisterClass::Float) => "sub.s",
        (BinOp::Mult, RegisterClass::Float) => "mul.s",
        (BinOp::Div, RegisterClass::Float) => "div.s",
        (BinOp::Or | BinOp::And, RegisterClass::Float) => return None,
    };
    Some(mnemonic)
}

pub fn int_branch(op: RelOp) -> &'static str {
    match op {
        RelOp::Eq => "beq",
        RelOp::Neq => "bne",
        RelOp::Lt => "blt",
        RelOp::Gt => "bgt",
        RelOp::Leq => "ble",
        RelOp::Geq => "bge",
    }
}

/// Float compare sets the condition flag; `!=`, `>` and `>=` branch on its negation.
pub fn float_branch(op: RelOp) -> (&'static str, bool) {
    match op {
        RelOp::Eq => ("c.eq.s", true),
        RelOp::Lt => ("c.lt.s", true),
        RelOp::Leq => ("c.le.s", true),
        RelOp::Neq => ("c.eq.s", false),
        RelOp::Gt => ("c.le.s", false),
        RelOp::Geq => ("c.lt.s", false),
    }
}

pub fn label(name: &str) -> String {
    format!("{}:", name)
}

pub fn space(name: &str, bytes: usize) -> String {
    format!("\t{}: .space {}", name, bytes)
}

pub fn li(class: RegisterClass, dst: &str, imm: &str) -> String {
    match class {
        RegisterClass::Int => format!("\tli {}, {}", dst, imm),
        RegisterClass::Float => format!("\tli.s {}, {}", dst, imm),
    }
}

pub fn load(class: RegisterClass, dst: &str, offset: impl Display, base: &str) -> String {
    match class {
        RegisterClass::Int => format!("\tlw {}, {}({})", dst, offset, base),
        RegisterClass::Float => format!("\tl.s {}, {}({})", dst, offset, base),
    }
}

pub fn store(class: RegisterClass, src: &str, offset: impl Display, base: &str) -> String {
    match class {
        RegisterClass::Int => format!("\tsw {}, {}({})", src, offset, base),
        RegisterClass::Float => format!("\ts.s {}, {}({})", src, offset, base),
    }
}

pub fn mov(class: RegisterClass, dst: &str, src: &str) -> String {
    match class {
        RegisterClass::Int => format!("\tmove {}, {}", dst, src),
        RegisterClass::Float => format!("\tmov.s {}, {}", dst, src),
    }
}

/// Bit copy from an int register into a float register.
pub fn mtc1(src: &str, dst: &str) -> String {
    format!("\tmtc1 {}, {}", src, dst)
}

pub fn cvt_s_w(dst: &str, src: &str) -> String {
    format!("\tcvt.s.w {}, {}", dst, src)
}

pub fn op3(mnemonic: &str, dst: &str, lhs: &str, rhs: &str) -> String {
    format!("\t{} {}, {}, {}", mnemonic, dst, lhs, rhs)
}

pub fn compare(mnemonic: &str, lhs: &str, rhs: &str) -> String {
    format!("\t{} {}, {}", mnemonic, lhs, rhs)
}

pub fn bc1(on_true: bool, target: &str) -> String {
    if on_true {
        format!("\tbc1t {}", target)
    } else {
        format!("\tbc1f {}", target)
    }
}

pub fn j(target: &str) -> String {
    format!("\tj {}", target)
}

pub fn jal(target: &str) -> String {
    format!("\tjal {}", target)
}

pub fn jr_ra() -> String {
    format!("\tjr {}", RA)
}

/// `addi $sp, $sp, delta`
pub fn adjust_sp(delta: i64) -> String {
    format!("\taddi {}, {}, {}", SP, SP, delta)
}
