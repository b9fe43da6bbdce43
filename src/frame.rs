//! Stack frame geometry and the per-block register overlay consulted by the generator.

use std::collections::{BTreeMap, BTreeSet};

use crate::ir::{Function, Program};

pub const WORD_SIZE: usize = 4;

/// Where each variable of one function lives when it is not in a register.
///
/// Offsets are relative to `$sp` after the prologue has reserved `frame_size` bytes.
/// From the bottom: int locals (reversed), float locals (reversed), the `$ra`
/// slot, then the incoming parameters, which the caller already reserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameLayout {
    stack_offsets: BTreeMap<String, usize>,
    return_address_offset: usize,
    arrays: BTreeMap<String, usize>,
    statics: BTreeSet<String>,
    floats: BTreeSet<String>,
    consumed: usize,
    frame_size: usize,
}

impl FrameLayout {
    pub fn new(function: &Function, program: &Program) -> Self {
        let arrays = function.visible_arrays(program);
        let floats = function.float_variables(program);

        let mut stack_offsets = BTreeMap::new();
        let mut offset = 0;
        let mut place = |name: &String, offset: &mut usize| {
            stack_offsets.insert(name.clone(), *offset);
            *offset += arrays.get(name).map_or(WORD_SIZE, |size| size * WORD_SIZE);
        };

        for name in function.int_locals.iter().rev() {
            place(name, &mut offset);
        }
        for name in function.float_locals.iter().rev() {
            place(name, &mut offset);
        }

        let return_address_offset = offset;
        offset += WORD_SIZE;

        // one caller-reserved word per parameter, arrays included
        for param in &function.params {
            stack_offsets.insert(param.name.clone(), offset);
            offset += WORD_SIZE;
        }

        let params = function.params.len() * WORD_SIZE;
        let frame_size = offset - params;

        let statics = program
            .statics()
            .filter(|name| !stack_offsets.contains_key(*name))
            .cloned()
            .collect();

        Self {
            stack_offsets,
            return_address_offset,
            arrays,
            statics,
            floats,
            consumed: offset,
            frame_size,
        }
    }

    pub fn stack_offset(&self, var: &str) -> Option<usize> {
        self.stack_offsets.get(var).copied()
    }

    pub fn stack_offsets(&self) -> &BTreeMap<String, usize> {
        &self.stack_offsets
    }

    pub fn return_address_offset(&self) -> usize {
        self.return_address_offset
    }

    pub fn array_size(&self, var: &str) -> Option<usize> {
        self.arrays.get(var).copied()
    }

    pub fn is_array(&self, var: &str) -> bool {
        self.arrays.contains_key(var)
    }

    pub fn is_static(&self, var: &str) -> bool {
        self.statics.contains(var)
    }

    pub fn is_float(&self, var: &str) -> bool {
        self.floats.contains(var)
    }

    /// Whether `var` is a scalar with a stack or static home a register may shadow.
    pub fn has_slot(&self, var: &str) -> bool {
        !self.is_array(var) && (self.stack_offsets.contains_key(var) || self.is_static(var))
    }

    /// Bytes reserved by the prologue, excluding incoming parameter slots.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Bytes spanned by every slot, incoming parameters included.
    pub fn consumed(&self) -> usize {
        self.consumed
    }
}

/// Block-scoped variable to register map, rebuilt for every block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterAssignment {
    registers: BTreeMap<String, &'static str>,
    moved: Vec<String>,
}

impl RegisterAssignment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(&mut self, var: impl Into<String>, register: &'static str) {
        let var = var.into();
        if self.registers.insert(var.clone(), register).is_none() {
            self.moved.push(var);
        }
    }

    pub fn register(&self, var: &str) -> Option<&'static str> {
        self.registers.get(var).copied()
    }

    /// Variables that must be reloaded at block entry and spilled at block exit.
    pub fn moved(&self) -> &[String] {
        &self.moved
    }

    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &'static str)> + '_ {
        self.moved
            .iter()
            .map(|var| (var.as_str(), self.registers[var.as_str()]))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location<'a> {
    Register(&'static str),
    Stack(usize),
    Static(&'a str),
}

/// Read-only view combining the frame layout with the current block's registers.
#[derive(Debug, Clone, Copy)]
pub struct MemoryTable<'a> {
    layout: &'a FrameLayout,
    registers: &'a RegisterAssignment,
}

impl<'a> MemoryTable<'a> {
    pub fn new(layout: &'a FrameLayout, registers: &'a RegisterAssignment) -> Self {
        Self { layout, registers }
    }

    /// Home of a scalar: its register if any, else its stack slot, else its static label.
    pub fn location(&self, var: &'a str) -> Option<Location<'a>> {
        if let Some(register) = self.registers.register(var) {
            return Some(Location::Register(register));
        }
        self.memory_location(var)
    }

    /// Backing memory of a scalar, ignoring any register.
    pub fn memory_location(&self, var: &'a str) -> Option<Location<'a>> {
        if let Some(offset) = self.layout.stack_offset(var) {
            Some(Location::Stack(offset))
        } else if self.layout.is_static(var) {
            Some(Location::Static(var))
        } else {
            None
        }
    }
}
