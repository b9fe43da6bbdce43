use std::collections::HashSet;

use tracing::{debug, trace};

use crate::{
    frame::{FrameLayout, Location, MemoryTable, RegisterAssignment, WORD_SIZE},
    ir::{is_float_literal, is_int_literal, is_literal, Function, Instruction, Operation, Program},
};

use super::{
    flow::{BasicBlock, FunctionControlFlow},
    liveness,
    mips::{self, RegisterClass, INT_ARGS, INT_TEMPS, LIBRARY, LIBRARY_LABELS, RA, SP, ZERO},
    reg_alloc::AllocatorKind,
    Error,
};

type Result<T> = std::result::Result<T, Error>;

/// Lower a whole program. Each call is an independent session.
pub fn generate(program: &Program, allocator: AllocatorKind) -> Result<Vec<String>> {
    CodeGenerator::new(program, allocator).generate()
}

/// One code generation session. Owns the set of labels emitted so far.
pub struct CodeGenerator<'p> {
    program: &'p Program,
    allocator: AllocatorKind,
    emitted_labels: HashSet<String>,
    code: Vec<String>,
}

impl<'p> CodeGenerator<'p> {
    pub fn new(program: &'p Program, allocator: AllocatorKind) -> Self {
        Self {
            program,
            allocator,
            emitted_labels: LIBRARY_LABELS.iter().map(|label| label.to_string()).collect(),
            code: Vec::new(),
        }
    }

    pub fn generate(mut self) -> Result<Vec<String>> {
        self.data_segment();
        let program = self.program;
        for function in &program.functions {
            self.function(function)?;
        }
        self.code.extend(mips::standard_routines());

        Ok(self.code)
    }

    fn data_segment(&mut self) {
        self.code.push(".data".to_string());
        for name in self.program.statics() {
            let bytes = self
                .program
                .static_arrays
                .get(name)
                .map_or(WORD_SIZE, |size| size * WORD_SIZE);
            self.code.push(mips::space(name, bytes));
        }
        self.code.push(".text".to_string());
        self.code.push(String::new());
    }

    fn function(&mut self, function: &'p Function) -> Result<()> {
        if function.instructions.is_empty() {
            return Err(Error::EmptyFunction(function.name.clone()));
        }

        let program = self.program;
        let flow = FunctionControlFlow::build(function)?;
        let liveness = liveness::analyze(&flow, &function.visible_arrays(program));
        let mut allocator = self.allocator.build(&flow, &liveness, program);
        let layout = allocator.allocate();

        if !self.emitted_labels.insert(function.name.clone()) {
            return Err(Error::DuplicateLabel(function.name.clone()));
        }

        debug!(
            function = %function.name,
            allocator = %self.allocator,
            blocks = flow.blocks().count(),
            "generating"
        );

        let mut emitter = FunctionEmitter {
            program,
            function,
            layout: &layout,
            registers: RegisterAssignment::new(),
            labels: &mut self.emitted_labels,
            code: Vec::new(),
        };

        emitter.prologue();
        for block in flow.blocks() {
            let registers = allocator.reallocate(block, &layout);
            emitter.block(block, registers)?;
            emitter.emit(String::new());
        }

        self.code.extend(emitter.code);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Reload,
    Spill,
}

struct FunctionEmitter<'a> {
    program: &'a Program,
    function: &'a Function,
    layout: &'a FrameLayout,
    registers: RegisterAssignment,
    labels: &'a mut HashSet<String>,
    code: Vec<String>,
}

impl<'a> FunctionEmitter<'a> {
    fn emit(&mut self, line: String) {
        self.code.push(line);
    }

    fn table(&self) -> MemoryTable<'_> {
        MemoryTable::new(self.layout, &self.registers)
    }

    fn prologue(&mut self) {
        let frame_size = self.layout.frame_size() as i64;
        let ra = self.layout.return_address_offset();

        self.emit(mips::label(&self.function.name));
        self.emit(mips::adjust_sp(-frame_size));
        self.emit(mips::store(RegisterClass::Int, RA, ra, SP));
    }

    /// Reloads follow a leading label, spills precede a terminator and otherwise
    /// follow the last instruction.
    fn block(&mut self, block: &BasicBlock<'_>, registers: RegisterAssignment) -> Result<()> {
        self.registers = registers;
        trace!(
            block = block.start(),
            registers = self.registers.moved().len(),
            "block"
        );

        let last = block.len() - 1;
        for (idx, instruction) in block.instructions().iter().enumerate() {
            let leading_label = idx == 0 && instruction.label_name().is_some();

            if idx == 0 && !leading_label {
                self.reload();
            }
            if instruction.is_terminator() {
                self.spill();
            }

            self.munch_stmt(instruction)?;

            if leading_label {
                self.reload();
            }
            if idx == last && !instruction.is_terminator() {
                self.spill();
            }
        }

        Ok(())
    }

    fn reload(&mut self) {
        let lines = self.moves(Direction::Reload);
        self.code.extend(lines);
    }

    fn spill(&mut self) {
        let lines = self.moves(Direction::Spill);
        self.code.extend(lines);
    }

    fn moves(&self, direction: Direction) -> Vec<String> {
        let table = self.table();
        self.registers
            .iter()
            .filter_map(|(var, reg)| {
                let class = RegisterClass::of(self.layout.is_float(var));
                let (offset, base) = match table.memory_location(var)? {
                    Location::Stack(offset) => (offset.to_string(), SP),
                    Location::Static(name) => (name.to_string(), ZERO),
                    Location::Register(_) => return None,
                };
                Some(match direction {
                    Direction::Reload => mips::load(class, reg, offset, base),
                    Direction::Spill => mips::store(class, reg, offset, base),
                })
            })
            .collect()
    }

    fn munch_stmt(&mut self, instruction: &Instruction) -> Result<()> {
        let operands = instruction.operands();
        match instruction.operation() {
            Operation::Label => self.label(&operands[0]),
            Operation::Assign => self.munch_assign(operands),
            Operation::Arithmetic(op) => {
                let (lhs, rhs, dst) = (&operands[0], &operands[1], &operands[2]);
                let class = self.destination_class(dst)?;
                let mnemonic = mips::arithmetic(op, class)
                    .ok_or_else(|| Error::UnsupportedFloatOperation(op.to_string()))?;

                let lhs = self.load_as(lhs, class, 0)?;
                let rhs = self.load_as(rhs, class, 1)?;
                let result = class.temp(2);
                self.emit(mips::op3(mnemonic, result, lhs, rhs));
                self.store_operand(dst, result)
            }
            Operation::Branch(op) => {
                let (lhs, rhs, target) = (&operands[0], &operands[1], &operands[2]);
                let float = self.class_of(lhs).is_float() || self.class_of(rhs).is_float();
                let class = RegisterClass::of(float);

                let lhs = self.load_as(lhs, class, 0)?;
                let rhs = self.load_as(rhs, class, 1)?;
                if float {
                    let (compare, on_true) = mips::float_branch(op);
                    self.emit(mips::compare(compare, lhs, rhs));
                    self.emit(mips::bc1(on_true, target));
                } else {
                    self.emit(mips::op3(mips::int_branch(op), lhs, rhs, target));
                }
                Ok(())
            }
            Operation::Goto => {
                self.emit(mips::j(&operands[0]));
                Ok(())
            }
            Operation::Return => self.munch_return(operands.first()),
            Operation::Call => self.munch_call(&operands[0], &operands[1..], None),
            Operation::CallWithResult => {
                self.munch_call(&operands[1], &operands[2..], Some(&operands[0]))
            }
            Operation::ArrayLoad => {
                let (dst, array, index) = (&operands[0], &operands[1], &operands[2]);
                let class = self.array_class(array)?;
                let element = class.temp(1);

                let (offset, base) = self.element_address(array, index)?;
                self.emit(mips::load(class, element, offset, base));

                let dst_class = self.destination_class(dst)?;
                let value = self.coerce(1, class, dst_class, array)?;
                self.store_operand(dst, value)
            }
            Operation::ArrayStore => {
                let (array, index, value) = (&operands[0], &operands[1], &operands[2]);
                let class = self.array_class(array)?;

                let value = self.load_as(value, class, 1)?;
                let (offset, base) = self.element_address(array, index)?;
                self.emit(mips::store(class, value, offset, base));
                Ok(())
            }
        }
    }

    fn label(&mut self, name: &str) -> Result<()> {
        // already emitted by the prologue
        if name == self.function.name {
            return Ok(());
        }
        if !self.labels.insert(name.to_string()) {
            return Err(Error::DuplicateLabel(name.to_string()));
        }
        self.emit(mips::label(name));
        Ok(())
    }

    fn munch_assign(&mut self, operands: &[String]) -> Result<()> {
        if let [array, _, value] = operands {
            let class = self.array_class(array)?;
            let value = self.load_as(value, class, 1)?;
            let size = self.layout.array_size(array).unwrap_or_default();
            for idx in 0..size {
                let (offset, base) = self.element_address(array, &idx.to_string())?;
                self.emit(mips::store(class, value, offset, base));
            }
            return Ok(());
        }

        let (dst, src) = (&operands[0], &operands[1]);
        match (self.layout.is_array(dst), self.layout.is_array(src)) {
            (true, true) => self.copy_array(dst, src),
            (true, false) | (false, true) => Err(Error::ArrayMismatch(dst.to_string())),
            (false, false) => {
                let class = self.destination_class(dst)?;
                let value = self.load_as(src, class, 0)?;
                self.store_operand(dst, value)
            }
        }
    }

    fn copy_array(&mut self, dst: &str, src: &str) -> Result<()> {
        let size = self.layout.array_size(dst).unwrap_or_default();
        if self.layout.array_size(src) != Some(size) {
            return Err(Error::ArrayMismatch(dst.to_string()));
        }
        let dst_class = self.array_class(dst)?;
        let src_class = self.array_class(src)?;

        for idx in 0..size {
            let idx = idx.to_string();
            let element = src_class.temp(1);
            let (offset, base) = self.element_address(src, &idx)?;
            self.emit(mips::load(src_class, element, offset, base));

            let value = self.coerce(1, src_class, dst_class, src)?;
            let (offset, base) = self.element_address(dst, &idx)?;
            self.emit(mips::store(dst_class, value, offset, base));
        }
        Ok(())
    }

    fn munch_return(&mut self, value: Option<&String>) -> Result<()> {
        let ra = self.layout.return_address_offset();
        self.emit(mips::load(RegisterClass::Int, RA, ra, SP));

        if let Some(value) = value {
            let class = self.class_of(value);
            self.load_operand(value, class.return_register())?;
        }

        self.emit(mips::adjust_sp(self.layout.frame_size() as i64));
        self.emit(mips::jr_ra());
        Ok(())
    }

    fn munch_call(&mut self, callee: &str, args: &[String], dst: Option<&String>) -> Result<()> {
        if let Some(array) = args.iter().find(|arg| self.layout.is_array(arg)) {
            return Err(Error::ArrayArgument {
                callee: callee.to_string(),
                array: array.to_string(),
            });
        }

        if let Some(library) = LIBRARY.get(callee) {
            if let Some(arg) = args.first() {
                match (self.class_of(arg), library.argument) {
                    (RegisterClass::Int, RegisterClass::Float) => {
                        let float = library.argument.first_argument();
                        self.load_operand(arg, INT_ARGS[0])?;
                        self.emit(mips::mtc1(INT_ARGS[0], float));
                        self.emit(mips::cvt_s_w(float, float));
                    }
                    (RegisterClass::Float, RegisterClass::Int) => {
                        return Err(Error::NarrowingConversion(arg.to_string()));
                    }
                    (_, class) => self.load_operand(arg, class.first_argument())?,
                }
            }
            self.emit(mips::jal(library.label));
        } else {
            self.spill();

            let program = self.program;
            let params = program.function(callee).map(|f| &f.params);
            let bytes = (args.len() * WORD_SIZE) as i64;
            for (idx, arg) in args.iter().enumerate() {
                let class = match params.and_then(|params| params.get(idx)) {
                    Some(param) => RegisterClass::of(param.is_float),
                    None => self.class_of(arg),
                };
                let value = self.load_as(arg, class, 0)?;
                let offset = (idx * WORD_SIZE) as i64 - bytes;
                self.emit(mips::store(class, value, offset, SP));
            }

            if bytes > 0 {
                self.emit(mips::adjust_sp(-bytes));
            }
            self.emit(mips::jal(callee));
            if bytes > 0 {
                self.emit(mips::adjust_sp(bytes));
            }

            self.reload();
        }

        if let Some(dst) = dst {
            let class = self.destination_class(dst)?;
            self.store_operand(dst, class.return_register())?;
        }
        Ok(())
    }

    fn class_of(&self, operand: &str) -> RegisterClass {
        if is_float_literal(operand) {
            RegisterClass::Float
        } else if is_int_literal(operand) {
            RegisterClass::Int
        } else {
            RegisterClass::of(self.layout.is_float(operand))
        }
    }

    fn destination_class(&self, dst: &str) -> Result<RegisterClass> {
        if is_literal(dst) {
            return Err(Error::LiteralDestination(dst.to_string()));
        }
        Ok(RegisterClass::of(self.layout.is_float(dst)))
    }

    fn array_class(&self, array: &str) -> Result<RegisterClass> {
        if !self.layout.is_array(array) {
            return Err(Error::UnknownArray(array.to_string()));
        }
        Ok(RegisterClass::of(self.layout.is_float(array)))
    }

    /// Load `operand` into `dst`, whose class must be the operand's own.
    fn load_operand(&mut self, operand: &str, dst: &str) -> Result<()> {
        let class = self.class_of(operand);
        if is_literal(operand) {
            self.emit(mips::li(class, dst, operand));
            return Ok(());
        }
        if self.layout.is_array(operand) {
            return Err(Error::ArrayMismatch(operand.to_string()));
        }

        let line = match self.table().location(operand) {
            Some(Location::Register(reg)) => mips::mov(class, dst, reg),
            Some(Location::Stack(offset)) => mips::load(class, dst, offset, SP),
            Some(Location::Static(name)) => mips::load(class, dst, name, ZERO),
            None => return Err(Error::UnresolvableOperand(operand.to_string())),
        };
        self.emit(line);
        Ok(())
    }

    /// Load `operand` into scratch register `slot` as a value of class `want`.
    fn load_as(&mut self, operand: &str, want: RegisterClass, slot: usize) -> Result<&'static str> {
        let have = self.class_of(operand);
        self.load_operand(operand, have.temp(slot))?;
        self.coerce(slot, have, want, operand)
    }

    /// Convert scratch register `slot` of class `have` to class `want`.
    /// Only int to float is allowed.
    fn coerce(
        &mut self,
        slot: usize,
        have: RegisterClass,
        want: RegisterClass,
        source: &str,
    ) -> Result<&'static str> {
        let reg = have.temp(slot);
        match (have, want) {
            (RegisterClass::Int, RegisterClass::Float) => {
                let float = want.temp(slot);
                self.emit(mips::mtc1(reg, float));
                self.emit(mips::cvt_s_w(float, float));
                Ok(float)
            }
            (RegisterClass::Float, RegisterClass::Int) => {
                Err(Error::NarrowingConversion(source.to_string()))
            }
            _ => Ok(reg),
        }
    }

    fn store_operand(&mut self, dst: &str, src: &str) -> Result<()> {
        let class = self.destination_class(dst)?;
        if self.layout.is_array(dst) {
            return Err(Error::ArrayMismatch(dst.to_string()));
        }

        let line = match self.table().location(dst) {
            Some(Location::Register(reg)) => mips::mov(class, reg, src),
            Some(Location::Stack(offset)) => mips::store(class, src, offset, SP),
            Some(Location::Static(name)) => mips::store(class, src, name, ZERO),
            None => return Err(Error::UnresolvableOperand(dst.to_string())),
        };
        self.emit(line);
        Ok(())
    }

    /// `index × 4` into `$t0`, plus `$sp` for stack arrays. Returns the `offset(base)` pair.
    fn element_address(&mut self, array: &str, index: &str) -> Result<(String, &'static str)> {
        let (address, multiplier) = (INT_TEMPS[0], INT_TEMPS[2]);

        let index = self.load_as(index, RegisterClass::Int, 0)?;
        self.emit(mips::li(RegisterClass::Int, multiplier, "4"));
        self.emit(mips::op3("mul", address, index, multiplier));

        if let Some(offset) = self.layout.stack_offset(array) {
            self.emit(mips::op3("add", address, address, SP));
            Ok((offset.to_string(), address))
        } else if self.layout.is_static(array) {
            Ok((array.to_string(), address))
        } else {
            Err(Error::UnresolvableOperand(array.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir;

    fn compile(src: &str, allocator: AllocatorKind) -> Result<Vec<String>> {
        let program = ir::parse("test.ir", src.as_bytes()).unwrap();
        generate(&program, allocator)
    }

    fn body<'c>(code: &'c [String], name: &str) -> &'c [String] {
        let start = code
            .iter()
            .position(|line| *line == format!("{}:", name))
            .unwrap();
        let len = code[start..].iter().position(String::is_empty).unwrap();
        &code[start..start + len]
    }

    #[test]
    fn test_increment_and_return() {
        let src = "\
start_function
int f(int x):
int-list: y
f:
add, x, 1, y
return, y
end_function
";
        let code = compile(src, AllocatorKind::Naive).unwrap();
        assert_eq!(&code[..3], [".data", ".text", ""]);
        assert_eq!(
            body(&code, "f"),
            [
                "f:",
                "\taddi $sp, $sp, -8",
                "\tsw $ra, 4($sp)",
                "\tlw $t0, 8($sp)",
                "\tli $t1, 1",
                "\tadd $t2, $t0, $t1",
                "\tsw $t2, 0($sp)",
                "\tlw $ra, 4($sp)",
                "\tlw $v0, 0($sp)",
                "\taddi $sp, $sp, 8",
                "\tjr $ra",
            ]
        );
        assert_eq!(code.last().map(String::as_str), Some("\tjr $ra"));
        assert!(code.iter().any(|line| line == "_lexit:"));
    }

    #[test]
    fn test_static_array_store() {
        let src = "\
static-int-list: a[10]
start_function
void main():
main:
array_store, a, 3, 7
return,
end_function
";
        let code = compile(src, AllocatorKind::Naive).unwrap();
        assert_eq!(&code[..4], [".data", "\ta: .space 40", ".text", ""]);
        assert_eq!(
            body(&code, "main"),
            [
                "main:",
                "\taddi $sp, $sp, -4",
                "\tsw $ra, 0($sp)",
                "\tli $t1, 7",
                "\tli $t0, 3",
                "\tli $t2, 4",
                "\tmul $t0, $t0, $t2",
                "\tsw $t1, a($t0)",
                "\tlw $ra, 0($sp)",
                "\taddi $sp, $sp, 4",
                "\tjr $ra",
            ]
        );
    }

    #[test]
    fn test_int_to_float_assign() {
        let src = "\
start_function
void g():
int-list: xi
float-list: yf
g:
assign, yf, xi
return,
end_function
";
        let code = compile(src, AllocatorKind::Naive).unwrap();
        assert_eq!(
            &body(&code, "g")[3..7],
            [
                "\tlw $t0, 0($sp)",
                "\tmtc1 $t0, $f4",
                "\tcvt.s.w $f4, $f4",
                "\ts.s $f4, 4($sp)",
            ]
        );
    }

    #[test]
    fn test_stack_array_and_static_scalar() {
        let src = "\
static-float-list: total
start_function
void h():
int-list: i
float-list: buf[2]
h:
array_load, total, buf, i
end_function
";
        let code = compile(src, AllocatorKind::Naive).unwrap();
        // i@0, buf@4, $ra@12
        assert_eq!(
            &body(&code, "h")[3..],
            [
                "\tlw $t0, 0($sp)",
                "\tli $t2, 4",
                "\tmul $t0, $t0, $t2",
                "\tadd $t0, $t0, $sp",
                "\tl.s $f6, 4($t0)",
                "\ts.s $f6, total($zero)",
            ]
        );
    }

    #[test]
    fn test_intra_block_reload_and_spill() {
        let src = "\
start_function
int f(int n):
int-list: i
f:
assign, i, 0
loop:
add, i, 1, i
brlt, i, n, loop
return, i
end_function
";
        let code = compile(src, AllocatorKind::IntraBlock).unwrap();
        let start = code.iter().position(|line| line == "loop:").unwrap();
        assert_eq!(
            &code[start..start + 11],
            [
                "loop:",
                "\tlw $s0, 0($sp)",
                "\tmove $t0, $s0",
                "\tli $t1, 1",
                "\tadd $t2, $t0, $t1",
                "\tmove $s0, $t2",
                "\tsw $s0, 0($sp)",
                "\tmove $t0, $s0",
                "\tlw $t1, 8($sp)",
                "\tblt $t0, $t1, loop",
                "",
            ]
        );
    }

    #[test]
    fn test_intra_block_spills_around_calls_and_fall_through() {
        let src = "\
start_function
int sum(int n):
sum:
return, n
end_function
start_function
void main():
int-list: r, t
main:
add, t, 1, t
add, t, 2, t
callr, r, sum, t
add, r, t, r
next:
return, r
end_function
";
        let code = compile(src, AllocatorKind::IntraBlock).unwrap();
        // t@0, r@4, $ra@8; t costs 12, r costs 6
        assert_eq!(
            body(&code, "main"),
            [
                "main:",
                "\taddi $sp, $sp, -12",
                "\tsw $ra, 8($sp)",
                "\tlw $s0, 0($sp)",
                "\tlw $s1, 4($sp)",
                "\tmove $t0, $s0",
                "\tli $t1, 1",
                "\tadd $t2, $t0, $t1",
                "\tmove $s0, $t2",
                "\tmove $t0, $s0",
                "\tli $t1, 2",
                "\tadd $t2, $t0, $t1",
                "\tmove $s0, $t2",
                "\tsw $s0, 0($sp)",
                "\tsw $s1, 4($sp)",
                "\tmove $t0, $s0",
                "\tsw $t0, -4($sp)",
                "\taddi $sp, $sp, -4",
                "\tjal sum",
                "\taddi $sp, $sp, 4",
                "\tlw $s0, 0($sp)",
                "\tlw $s1, 4($sp)",
                "\tmove $s1, $v0",
                "\tmove $t0, $s1",
                "\tmove $t1, $s0",
                "\tadd $t2, $t0, $t1",
                "\tmove $s1, $t2",
                "\tsw $s0, 0($sp)",
                "\tsw $s1, 4($sp)",
            ]
        );
        assert_eq!(
            body(&code, "next"),
            [
                "next:",
                "\tlw $ra, 8($sp)",
                "\tlw $v0, 4($sp)",
                "\taddi $sp, $sp, 12",
                "\tjr $ra",
            ]
        );
    }

    #[test]
    fn test_call_convention() {
        let src = "\
start_function
float g(int a, float b):
g:
return, b
end_function
start_function
void main():
int-list: x, r
main:
callr, r, g, x, 2.5
call, printf, x
end_function
";
        let code = compile(src, AllocatorKind::Naive).unwrap();
        // r@0, x@4, $ra@8
        assert_eq!(
            &body(&code, "main")[3..],
            [
                "\tlw $t0, 4($sp)",
                "\tsw $t0, -8($sp)",
                "\tli.s $f4, 2.5",
                "\ts.s $f4, -4($sp)",
                "\taddi $sp, $sp, -8",
                "\tjal g",
                "\taddi $sp, $sp, 8",
                "\tsw $v0, 0($sp)",
                "\tlw $a0, 4($sp)",
                "\tmtc1 $a0, $f12",
                "\tcvt.s.w $f12, $f12",
                "\tjal _lprintf",
            ]
        );
        assert_eq!(
            &body(&code, "g")[3..],
            [
                "\tlw $ra, 0($sp)",
                "\tl.s $f0, 8($sp)",
                "\taddi $sp, $sp, 4",
                "\tjr $ra",
            ]
        );
    }

    #[test]
    fn test_float_branch_negates_complement() {
        let src = "\
start_function
void k():
float-list: fx
k:
brgt, fx, 1, out
out:
return,
end_function
";
        let code = compile(src, AllocatorKind::Naive).unwrap();
        assert_eq!(
            &body(&code, "k")[3..],
            [
                "\tl.s $f4, 0($sp)",
                "\tli $t1, 1",
                "\tmtc1 $t1, $f6",
                "\tcvt.s.w $f6, $f6",
                "\tc.le.s $f4, $f6",
                "\tbc1f out",
            ]
        );
    }

    #[test]
    fn test_global_keeps_registers() {
        let src = "\
start_function
int f(int n):
int-list: i
f:
assign, i, 0
loop:
add, i, 1, i
brlt, i, n, loop
return, i
end_function
";
        let code = compile(src, AllocatorKind::Global).unwrap();
        let reg_of_i: Vec<_> = code
            .iter()
            .filter(|line| line.ends_with(", 0($sp)") && line.starts_with("\tlw $s"))
            .collect();
        assert!(!reg_of_i.is_empty());
        assert!(reg_of_i.iter().all(|line| *line == reg_of_i[0]));
    }

    #[test]
    fn test_errors() {
        let narrowing = "start_function\nvoid f():\nint-list: i\nfloat-list: x\nf:\nassign, i, x\nend_function\n";
        assert_eq!(
            compile(narrowing, AllocatorKind::Naive),
            Err(Error::NarrowingConversion("x".to_string()))
        );

        let float_or = "start_function\nvoid f():\nfloat-list: x\nf:\nor, x, x, x\nend_function\n";
        assert_eq!(
            compile(float_or, AllocatorKind::Naive),
            Err(Error::UnsupportedFloatOperation("or".to_string()))
        );

        let unknown = "start_function\nvoid f():\nf:\nassign, ghost, 1\nend_function\n";
        assert_eq!(
            compile(unknown, AllocatorKind::IntraBlock),
            Err(Error::UnresolvableOperand("ghost".to_string()))
        );

        let literal = "start_function\nvoid f():\nf:\nassign, 3, 1\nend_function\n";
        assert_eq!(
            compile(literal, AllocatorKind::Naive),
            Err(Error::LiteralDestination("3".to_string()))
        );

        let array_arg = "start_function\nvoid f():\nint-list: a[2]\nf:\ncall, g, a\nend_function\n";
        assert!(matches!(
            compile(array_arg, AllocatorKind::Naive),
            Err(Error::ArrayArgument { .. })
        ));

        let forwarded = "start_function\nvoid f(int xs[4]):\nf:\ncall, f, xs\nend_function\n";
        assert_eq!(
            compile(forwarded, AllocatorKind::IntraBlock),
            Err(Error::ArrayArgument {
                callee: "f".to_string(),
                array: "xs".to_string(),
            })
        );

        let undefined = "start_function\nvoid f():\nf:\ngoto, nowhere\nend_function\n";
        assert!(matches!(
            compile(undefined, AllocatorKind::Global),
            Err(Error::UndefinedLabel { .. })
        ));

        let shared_label = "\
start_function\nvoid f():\nf:\nl:\nreturn,\nend_function\n\
start_function\nvoid g():\ng:\nl:\nreturn,\nend_function\n";
        assert_eq!(
            compile(shared_label, AllocatorKind::Naive),
            Err(Error::DuplicateLabel("l".to_string()))
        );

        let empty = "start_function\nvoid f():\nend_function\n";
        assert_eq!(
            compile(empty, AllocatorKind::Naive),
            Err(Error::EmptyFunction("f".to_string()))
        );
    }

    #[test]
    fn test_sessions_are_independent() {
        let src = "start_function\nvoid main():\nmain:\ncall, printi, 1\nreturn,\nend_function\n";
        let program = ir::parse("test.ir", src.as_bytes()).unwrap();
        let first = generate(&program, AllocatorKind::Naive).unwrap();
        let second = generate(&program, AllocatorKind::Naive).unwrap();
        assert_eq!(first, second);
    }
}
