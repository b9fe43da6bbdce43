use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::trace;

use crate::ir::{Function, Instruction, InstructionKind};

use super::{
    graph::{Graph, ID},
    Error,
};

/// A maximal straight-line run of instructions, `start..=end` in the function.
#[derive(Debug, Clone, Copy)]
pub struct BasicBlock<'f> {
    instructions: &'f [Instruction],
    start: usize,
    end: usize,
}

impl<'f> BasicBlock<'f> {
    pub fn instructions(&self) -> &'f [Instruction] {
        self.instructions
    }

    pub fn start(&self) -> usize {
        self.start
    }

    /// Index of the last instruction, inclusive.
    pub fn end(&self) -> usize {
        self.end
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

pub struct FunctionControlFlow<'f> {
    function: &'f Function,
    leaders: BTreeSet<usize>,
    successors: Vec<Vec<usize>>,
    blocks: Graph<BasicBlock<'f>>,
    entry: Option<ID>,
}

impl<'f> FunctionControlFlow<'f> {
    pub fn build(function: &'f Function) -> Result<Self, Error> {
        let instructions = &function.instructions;
        let len = instructions.len();

        let mut labels: HashMap<&str, usize> = HashMap::new();
        for (idx, instruction) in instructions.iter().enumerate() {
            if let Some(label) = instruction.label_name() {
                if labels.insert(label, idx).is_some() {
                    return Err(Error::DuplicateLabel(label.to_string()));
                }
            }
        }

        let resolve = |label: &str| {
            labels
                .get(label)
                .copied()
                .ok_or_else(|| Error::UndefinedLabel {
                    function: function.name.clone(),
                    label: label.to_string(),
                })
        };

        let mut leaders = BTreeSet::new();
        if len > 0 {
            leaders.insert(0);
        }

        let mut successors = Vec::with_capacity(len);
        for (idx, instruction) in instructions.iter().enumerate() {
            let next = idx + 1;
            let succ = match instruction.kind() {
                InstructionKind::Branch | InstructionKind::Goto => {
                    let target = resolve(instruction.jump_target().unwrap_or_default())?;
                    leaders.insert(target);
                    if next < len {
                        leaders.insert(next);
                    }

                    if instruction.kind() == InstructionKind::Goto || target == next {
                        vec![target]
                    } else {
                        vec![target, next]
                    }
                }
                _ => vec![next],
            };
            successors.push(succ);
        }
        if let Some(last) = successors.last_mut() {
            last.clear();
        }

        let bounds: Vec<usize> = leaders.iter().copied().chain([len]).collect();
        let mut blocks = Graph::with_capacity(leaders.len());
        let mut block_at: BTreeMap<usize, ID> = BTreeMap::new();
        for window in bounds.windows(2) {
            let (start, stop) = (window[0], window[1]);
            let block = BasicBlock {
                instructions: &instructions[start..stop],
                start,
                end: stop - 1,
            };
            block_at.insert(start, blocks.insert(block));
        }

        for &id in block_at.values() {
            let end = blocks.get(id).val().end();
            for succ in &successors[end] {
                if let Some(&to) = block_at.get(succ) {
                    blocks.link(id, to);
                }
            }
        }

        let entry = block_at.get(&0).copied();

        trace!(
            function = %function.name,
            blocks = blocks.len(),
            "built control flow"
        );

        Ok(Self {
            function,
            leaders,
            successors,
            blocks,
            entry,
        })
    }

    pub fn function(&self) -> &'f Function {
        self.function
    }

    pub fn name(&self) -> &'f str {
        &self.function.name
    }

    pub fn leaders(&self) -> &BTreeSet<usize> {
        &self.leaders
    }

    /// Instruction-level successors of the instruction at `idx`.
    pub fn successors(&self, idx: usize) -> &[usize] {
        &self.successors[idx]
    }

    pub fn block_graph(&self) -> &Graph<BasicBlock<'f>> {
        &self.blocks
    }

    /// Blocks in program order.
    pub fn blocks(&self) -> impl Iterator<Item = &BasicBlock<'f>> + '_ {
        self.blocks.nodes().iter().map(|node| node.val())
    }

    pub fn block(&self, id: ID) -> &BasicBlock<'f> {
        self.blocks.get(id).val()
    }

    pub fn block_successors(&self, id: ID) -> impl Iterator<Item = ID> + '_ {
        self.blocks.succ(id)
    }

    pub fn entry(&self) -> Option<ID> {
        self.entry
    }
}
