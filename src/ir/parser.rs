use std::{
    fmt,
    io::{self, BufRead, BufReader, Read},
};

use thiserror::Error;

use super::{Function, Instruction, InstructionError, Operation, Parameter, Program};

#[derive(Debug, Error)]
pub struct Error {
    pub(crate) kind: ErrorKind,
    pub(crate) filename: String,
    pub(crate) line: usize,
}

impl Error {
    fn new(kind: ErrorKind, filename: &str, line: usize) -> Self {
        Self {
            kind,
            filename: filename.to_string(),
            line,
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn line(&self) -> usize {
        self.line
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "file: {}, line: {}", self.filename, self.line)?;
        write!(f, "{}", self.kind)
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("unknown operation `{0}`")]
    UnknownOperation(String),

    #[error("malformed instruction: {0}")]
    Instruction(#[from] InstructionError),

    #[error("unexpected line `{0}`")]
    Header(String),

    #[error("malformed function signature `{0}`")]
    Signature(String),

    #[error("malformed array declaration `{0}`")]
    ArraySize(String),

    #[error("function `{0}` has no `end_function`")]
    UnterminatedFunction(String),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

type Result<T> = std::result::Result<T, Error>;

const START_PROGRAM: &str = "start_program";
const END_PROGRAM: &str = "end_program";
const START_FUNCTION: &str = "start_function";
const END_FUNCTION: &str = "end_function";
const STATIC_INT_LIST: &str = "static-int-list:";
const STATIC_FLOAT_LIST: &str = "static-float-list:";
const INT_LIST: &str = "int-list:";
const FLOAT_LIST: &str = "float-list:";

/// Parse a whole IR program.
///
/// Blank lines and lines starting with `#` are ignored. Missing declaration
/// lists are treated as empty.
pub fn parse<R>(filename: impl Into<String>, r: R) -> Result<Program>
where
    R: Read,
{
    let filename = filename.into();

    let mut lines = Vec::new();
    for (idx, line) in BufReader::new(r).lines().enumerate() {
        let line = line.map_err(|e| Error::new(e.into(), &filename, idx + 1))?;
        let trimmed = line.trim();
        if !trimmed.is_empty() && !trimmed.starts_with('#') {
            lines.push((idx + 1, trimmed.to_string()));
        }
    }

    Parser {
        filename,
        lines,
        pos: 0,
    }
    .program()
}

struct Parser {
    filename: String,
    lines: Vec<(usize, String)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&str> {
        self.lines.get(self.pos).map(|(_, line)| line.as_str())
    }

    fn next(&mut self) -> Option<(usize, String)> {
        let line = self.lines.get(self.pos).cloned();
        if line.is_some() {
            self.pos += 1;
        }
        line
    }

    fn make_error(&self, kind: ErrorKind, line: usize) -> Error {
        Error::new(kind, &self.filename, line)
    }

    fn last_line(&self) -> usize {
        self.lines.last().map_or(0, |(line, _)| *line)
    }

    fn program(mut self) -> Result<Program> {
        let mut program = Program::default();

        if self.peek() == Some(START_PROGRAM) {
            self.next();
        }

        if let Some(rest) = self.peek().and_then(|l| l.strip_prefix(STATIC_INT_LIST)) {
            let rest = rest.to_string();
            let (line, _) = self.lines[self.pos];
            self.next();
            for (name, size) in self.declarations(&rest, line)? {
                if let Some(size) = size {
                    program.static_arrays.insert(name.clone(), size);
                }
                program.int_statics.push(name);
            }
        }

        if let Some(rest) = self.peek().and_then(|l| l.strip_prefix(STATIC_FLOAT_LIST)) {
            let rest = rest.to_string();
            let (line, _) = self.lines[self.pos];
            self.next();
            for (name, size) in self.declarations(&rest, line)? {
                if let Some(size) = size {
                    program.static_arrays.insert(name.clone(), size);
                }
                program.float_statics.push(name);
            }
        }

        while let Some((line, text)) = self.next() {
            match text.as_str() {
                START_FUNCTION => {
                    let function = self.function(line)?;
                    program.functions.push(function);
                }
                END_PROGRAM => break,
                _ => return Err(self.make_error(ErrorKind::Header(text), line)),
            }
        }

        Ok(program)
    }

    fn function(&mut self, start: usize) -> Result<Function> {
        let (line, signature) = self.next().ok_or_else(|| {
            self.make_error(ErrorKind::UnterminatedFunction(String::new()), start)
        })?;
        let mut function = self.signature(&signature, line)?;

        if let Some(rest) = self.peek().and_then(|l| l.strip_prefix(INT_LIST)) {
            let rest = rest.to_string();
            let (line, _) = self.lines[self.pos];
            self.next();
            for (name, size) in self.declarations(&rest, line)? {
                if let Some(size) = size {
                    function.arrays.insert(name.clone(), size);
                }
                function.int_locals.push(name);
            }
        }

        if let Some(rest) = self.peek().and_then(|l| l.strip_prefix(FLOAT_LIST)) {
            let rest = rest.to_string();
            let (line, _) = self.lines[self.pos];
            self.next();
            for (name, size) in self.declarations(&rest, line)? {
                if let Some(size) = size {
                    function.arrays.insert(name.clone(), size);
                }
                function.float_locals.push(name);
            }
        }

        loop {
            let Some((line, text)) = self.next() else {
                let kind = ErrorKind::UnterminatedFunction(function.name.clone());
                return Err(self.make_error(kind, self.last_line()));
            };
            if text == END_FUNCTION {
                break;
            }

            let instruction = instruction(&text).map_err(|kind| self.make_error(kind, line))?;
            function.instructions.push(instruction);
        }

        Ok(function)
    }

    // ret name(type p, type q):
    fn signature(&self, text: &str, line: usize) -> Result<Function> {
        let malformed = || self.make_error(ErrorKind::Signature(text.to_string()), line);

        let (head, rest) = text.split_once('(').ok_or_else(malformed)?;
        let (params, _) = rest.split_once(')').ok_or_else(malformed)?;
        let name = head.split_whitespace().last().ok_or_else(malformed)?;

        let mut function = Function {
            name: name.to_string(),
            ..Function::default()
        };

        for param in params.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let mut words = param.split_whitespace();
            let (Some(ty), Some(name), None) = (words.next(), words.next(), words.next()) else {
                return Err(malformed());
            };
            let (name, size) = declaration(name).map_err(|kind| self.make_error(kind, line))?;
            let param = match ty {
                "int" => Parameter::int(name.as_str()),
                "float" => Parameter::float(name.as_str()),
                _ => return Err(malformed()),
            };
            if let Some(size) = size {
                function.arrays.insert(name, size);
            }
            function.params.push(param);
        }

        Ok(function)
    }

    fn declarations(&self, list: &str, line: usize) -> Result<Vec<(String, Option<usize>)>> {
        list.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| declaration(item).map_err(|kind| self.make_error(kind, line)))
            .collect()
    }
}

fn declaration(item: &str) -> std::result::Result<(String, Option<usize>), ErrorKind> {
    let Some((name, rest)) = item.split_once('[') else {
        return Ok((item.to_string(), None));
    };

    let size = rest
        .strip_suffix(']')
        .and_then(|size| size.trim().parse::<usize>().ok())
        .ok_or_else(|| ErrorKind::ArraySize(item.to_string()))?;

    Ok((name.trim().to_string(), Some(size)))
}

fn instruction(text: &str) -> std::result::Result<Instruction, ErrorKind> {
    if let Some(label) = text.strip_suffix(':') {
        if !label.contains(',') {
            return Ok(Instruction::label(label.trim()));
        }
    }

    let mut parts = text.split(',').map(str::trim);
    let mnemonic = parts.next().unwrap_or_default();
    let operation = Operation::from_mnemonic(mnemonic)
        .ok_or_else(|| ErrorKind::UnknownOperation(mnemonic.to_string()))?;
    let operands = parts.filter(|operand| !operand.is_empty());

    Ok(Instruction::new(operation, operands)?)
}
