pub mod codegen;
pub mod frame;
pub mod ir;
pub mod report;

use std::io::{self, Read, Write};

use thiserror::Error;

use crate::codegen::reg_alloc::AllocatorKind;

#[derive(Debug, Default, Clone, Copy)]
pub struct Options {
    allocator: AllocatorKind,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocator(mut self, allocator: AllocatorKind) -> Self {
        self.allocator = allocator;
        self
    }
}

/// Reads IR text from `r` and writes MIPS assembly to `w`, one line at a time.
pub struct Compiler<N, R, W>
where
    N: Into<String>,
    R: Read,
    W: Write,
{
    filename: N,
    r: R,
    w: W,
    options: Options,
}

impl<N, R, W> Compiler<N, R, W>
where
    N: Into<String>,
    R: Read,
    W: Write,
{
    pub fn new(filename: N, r: R, w: W) -> Self {
        Self {
            filename,
            r,
            w,
            options: Options::default(),
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn compile(mut self) -> Result<(), Error> {
        let program = ir::parse(self.filename, self.r)?;
        let code = codegen::generate(&program, self.options.allocator)?;

        for line in code {
            writeln!(self.w, "{}", line)?;
        }
        self.w.flush()?;

        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Parse(#[from] ir::parser::Error),

    #[error("{0}")]
    Codegen(#[from] codegen::Error),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}
