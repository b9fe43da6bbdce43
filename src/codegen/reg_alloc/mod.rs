mod global;
mod intra_block;
mod naive;

use strum::{Display, EnumIter, EnumString};

use crate::{
    frame::{FrameLayout, RegisterAssignment},
    ir::Program,
};

use super::{flow::BasicBlock, flow::FunctionControlFlow, liveness::Liveness};

pub use global::GlobalAllocator;
pub use intra_block::IntraBlockAllocator;
pub use naive::NaiveAllocator;

/// Decides where the variables of one function live.
///
/// `allocate` runs once before any code of the function is emitted.
/// `reallocate` runs once per block and its result replaces the previous one.
pub trait Allocator {
    fn allocate(&mut self) -> FrameLayout;

    fn reallocate(&mut self, block: &BasicBlock<'_>, layout: &FrameLayout) -> RegisterAssignment;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, EnumString, Display, EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum AllocatorKind {
    #[default]
    Naive,
    IntraBlock,
    Global,
}

impl AllocatorKind {
    pub fn build<'a>(
        self,
        flow: &'a FunctionControlFlow<'a>,
        liveness: &'a Liveness,
        program: &'a Program,
    ) -> Box<dyn Allocator + 'a> {
        let function = flow.function();
        match self {
            AllocatorKind::Naive => Box::new(NaiveAllocator::new(function, program)),
            AllocatorKind::IntraBlock => Box::new(IntraBlockAllocator::new(function, program)),
            AllocatorKind::Global => Box::new(GlobalAllocator::new(flow, liveness, program)),
        }
    }
}

/// `2 × uses + 2 × defs` of every scalar with a home slot, in first-appearance order.
fn spill_costs<'i>(
    instructions: impl IntoIterator<Item = &'i crate::ir::Instruction>,
    layout: &FrameLayout,
) -> Vec<(&'i str, usize)> {
    const READ_COST: usize = 2;
    const WRITE_COST: usize = 2;

    let mut costs: Vec<(&str, usize)> = Vec::new();
    let mut bump = |var: &'i str, cost: usize| {
        if !layout.has_slot(var) {
            return;
        }
        match costs.iter_mut().find(|(name, _)| *name == var) {
            Some((_, total)) => *total += cost,
            None => costs.push((var, cost)),
        }
    };

    for instruction in instructions {
        for var in instruction.uses() {
            bump(var.as_str(), READ_COST);
        }
        for var in instruction.defs() {
            bump(var.as_str(), WRITE_COST);
        }
    }

    costs
}
