use tracing::debug;

use crate::{
    codegen::flow::BasicBlock,
    frame::{FrameLayout, RegisterAssignment},
    ir::{Function, Program},
};

use super::Allocator;

/// Keeps every variable in memory; each access goes through a scratch register.
pub struct NaiveAllocator<'a> {
    function: &'a Function,
    program: &'a Program,
}

impl<'a> NaiveAllocator<'a> {
    pub fn new(function: &'a Function, program: &'a Program) -> Self {
        Self { function, program }
    }
}

impl Allocator for NaiveAllocator<'_> {
    fn allocate(&mut self) -> FrameLayout {
        let layout = FrameLayout::new(self.function, self.program);
        debug!(
            function = %self.function.name,
            frame_size = layout.frame_size(),
            "naive allocation"
        );
        layout
    }

    fn reallocate(&mut self, _: &BasicBlock<'_>, _: &FrameLayout) -> RegisterAssignment {
        RegisterAssignment::new()
    }
}
