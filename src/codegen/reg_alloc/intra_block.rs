use tracing::{debug, trace};

use crate::{
    codegen::{flow::BasicBlock, mips::RegisterClass},
    frame::{FrameLayout, RegisterAssignment},
    ir::{Function, Program},
};

use super::{spill_costs, Allocator};

/// A register only pays off once it saves at least one load and one store.
const MINIMUM_COST_TO_MOVE_IN_REGISTER: usize = 4;

/// Assigns callee-saved registers to the most used variables of each block.
pub struct IntraBlockAllocator<'a> {
    function: &'a Function,
    program: &'a Program,
}

impl<'a> IntraBlockAllocator<'a> {
    pub fn new(function: &'a Function, program: &'a Program) -> Self {
        Self { function, program }
    }
}

impl Allocator for IntraBlockAllocator<'_> {
    fn allocate(&mut self) -> FrameLayout {
        let layout = FrameLayout::new(self.function, self.program);
        debug!(
            function = %self.function.name,
            frame_size = layout.frame_size(),
            "intra-block allocation"
        );
        layout
    }

    fn reallocate(&mut self, block: &BasicBlock<'_>, layout: &FrameLayout) -> RegisterAssignment {
        let mut costs = spill_costs(block.instructions(), layout);
        // stable: equal costs keep first-appearance order
        costs.sort_by(|(_, lhs), (_, rhs)| rhs.cmp(lhs));

        let mut ints = RegisterClass::Int.saved().iter().copied();
        let mut floats = RegisterClass::Float.saved().iter().copied();
        let mut assignment = RegisterAssignment::new();

        for (var, cost) in costs {
            if cost < MINIMUM_COST_TO_MOVE_IN_REGISTER {
                break;
            }
            let pool = if layout.is_float(var) {
                &mut floats
            } else {
                &mut ints
            };
            if let Some(register) = pool.next() {
                trace!(var, register, cost, block = block.start(), "promote");
                assignment.assign(var, register);
            }
        }

        assignment
    }
}
