use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;
use tracing::{debug, trace};

use crate::{
    codegen::{
        flow::{BasicBlock, FunctionControlFlow},
        liveness::{InterferenceGraph, Liveness},
        mips::RegisterClass,
    },
    frame::{FrameLayout, RegisterAssignment},
    ir::Program,
};

use super::{spill_costs, Allocator};

/// Colours each register class once per function; a variable keeps its register in every block.
///
/// Values still round-trip through memory at block boundaries, so variables
/// referenced by the same block interfere even when their live ranges do not.
pub struct GlobalAllocator<'a> {
    flow: &'a FunctionControlFlow<'a>,
    liveness: &'a Liveness,
    program: &'a Program,
    colors: BTreeMap<String, &'static str>,
}

impl<'a> GlobalAllocator<'a> {
    pub fn new(
        flow: &'a FunctionControlFlow<'a>,
        liveness: &'a Liveness,
        program: &'a Program,
    ) -> Self {
        Self {
            flow,
            liveness,
            program,
            colors: BTreeMap::new(),
        }
    }

    pub fn register(&self, var: &str) -> Option<&'static str> {
        self.colors.get(var).copied()
    }
}

impl Allocator for GlobalAllocator<'_> {
    fn allocate(&mut self) -> FrameLayout {
        let function = self.flow.function();
        let layout = FrameLayout::new(function, self.program);

        let mut interference = InterferenceGraph::new(self.liveness);
        for block in self.flow.blocks() {
            let referenced = referenced(block);
            for (one, other) in referenced.iter().tuple_combinations() {
                interference.add_edge(one, other);
            }
        }

        let spill_cost: SpillCost = spill_costs(&function.instructions, &layout)
            .into_iter()
            .collect();

        self.colors.clear();
        for class in [RegisterClass::Int, RegisterClass::Float] {
            let nodes: BTreeSet<&str> = spill_cost
                .keys()
                .copied()
                .filter(|var| layout.is_float(var) == class.is_float())
                .collect();
            let colors = color(&interference, &nodes, &spill_cost, class.saved());
            self.colors
                .extend(colors.into_iter().map(|(var, reg)| (var.to_string(), reg)));
        }

        debug!(
            function = %function.name,
            frame_size = layout.frame_size(),
            colored = self.colors.len(),
            spilled = spill_cost.len() - self.colors.len(),
            "global allocation"
        );

        layout
    }

    fn reallocate(&mut self, block: &BasicBlock<'_>, _: &FrameLayout) -> RegisterAssignment {
        let mut assignment = RegisterAssignment::new();
        for instruction in block.instructions() {
            for var in instruction.uses().iter().chain(instruction.defs()) {
                if let Some(register) = self.register(var) {
                    assignment.assign(var.as_str(), register);
                }
            }
        }
        assignment
    }
}

fn referenced<'b>(block: &BasicBlock<'b>) -> BTreeSet<&'b str> {
    block
        .instructions()
        .iter()
        .flat_map(|instruction| instruction.uses().iter().chain(instruction.defs()))
        .map(String::as_str)
        .collect()
}

type Node<'a> = &'a str;
type SpillCost<'a> = BTreeMap<Node<'a>, usize>;
type Degree<'a> = BTreeMap<Node<'a>, usize>;
type AdjList<'a> = BTreeMap<Node<'a>, BTreeSet<Node<'a>>>;
type SimplifyWorkList<'a> = Vec<Node<'a>>;
type SpillWorkList<'a> = BTreeSet<Node<'a>>;
type SelectStack<'a> = Vec<Node<'a>>;
type Colors<'a> = BTreeMap<Node<'a>, &'static str>;

/// Briggs-style simplify / optimistic select over `nodes`. Uncoloured nodes stay in memory.
fn color<'a>(
    interference: &'a InterferenceGraph,
    nodes: &BTreeSet<Node<'a>>,
    spill_cost: &SpillCost<'a>,
    registers: &[&'static str],
) -> Colors<'a> {
    let k = registers.len();
    let (adj_list, mut degree) = build(interference, nodes);
    let (mut simplify_worklist, mut spill_worklist) = make_work_list(nodes, &degree, k);

    let mut select_stack = SelectStack::new();
    loop {
        if let Some(node) = simplify_worklist.pop() {
            simplify(
                node,
                &mut select_stack,
                &mut simplify_worklist,
                &mut spill_worklist,
                &adj_list,
                &mut degree,
                k,
            );
        } else if !spill_worklist.is_empty() {
            select_spill(spill_cost, &mut spill_worklist, &mut simplify_worklist);
        } else {
            break;
        }
    }

    assign_colors(&select_stack, &adj_list, registers)
}

fn build<'a>(
    interference: &'a InterferenceGraph,
    nodes: &BTreeSet<Node<'a>>,
) -> (AdjList<'a>, Degree<'a>) {
    let mut adj_list = AdjList::new();
    let mut degree = Degree::new();

    for &node in nodes {
        let adj: BTreeSet<Node> = interference
            .neighbours(node)
            .into_iter()
            .filter(|other| nodes.contains(other))
            .collect();
        degree.insert(node, adj.len());
        adj_list.insert(node, adj);
    }

    (adj_list, degree)
}

fn make_work_list<'a>(
    nodes: &BTreeSet<Node<'a>>,
    degree: &Degree<'a>,
    k: usize,
) -> (SimplifyWorkList<'a>, SpillWorkList<'a>) {
    let mut simplify_work_list = SimplifyWorkList::new();
    let mut spill_work_list = SpillWorkList::new();
    for &node in nodes {
        if degree[node] < k {
            simplify_work_list.push(node);
        } else {
            spill_work_list.insert(node);
        }
    }

    (simplify_work_list, spill_work_list)
}

fn simplify<'a>(
    node: Node<'a>,
    select_stack: &mut SelectStack<'a>,
    simplify_worklist: &mut SimplifyWorkList<'a>,
    spill_worklist: &mut SpillWorkList<'a>,
    adj_list: &AdjList<'a>,
    degree: &mut Degree<'a>,
    k: usize,
) {
    select_stack.push(node);

    let adjacent: Vec<Node> = adj_list[node]
        .iter()
        .copied()
        .filter(|adj| !select_stack.contains(adj))
        .collect();
    for adj in adjacent {
        decrement_degree(adj, k, degree, simplify_worklist, spill_worklist);
    }
}

fn decrement_degree<'a>(
    node: Node<'a>,
    k: usize,
    degree: &mut Degree<'a>,
    simplify_worklist: &mut SimplifyWorkList<'a>,
    spill_worklist: &mut SpillWorkList<'a>,
) {
    let Some(deg) = degree.get_mut(node) else {
        return;
    };
    let old_deg = *deg;
    *deg = old_deg.saturating_sub(1);

    if old_deg == k && spill_worklist.remove(node) {
        simplify_worklist.push(node);
    }
}

/// Optimistically push the cheapest spill candidate; it may still find a colour.
fn select_spill<'a>(
    spill_cost: &SpillCost<'a>,
    spill_worklist: &mut SpillWorkList<'a>,
    simplify_worklist: &mut SimplifyWorkList<'a>,
) {
    let candidate = spill_worklist
        .iter()
        .copied()
        .min_by_key(|node| spill_cost.get(node).copied().unwrap_or_default());
    if let Some(node) = candidate {
        spill_worklist.remove(node);
        simplify_worklist.push(node);
    }
}

fn assign_colors<'a>(
    select_stack: &SelectStack<'a>,
    adj_list: &AdjList<'a>,
    registers: &[&'static str],
) -> Colors<'a> {
    let mut colors = Colors::new();

    for &node in select_stack.iter().rev() {
        let taken: BTreeSet<&str> = adj_list[node]
            .iter()
            .filter_map(|adj| colors.get(adj).copied())
            .collect();

        match registers.iter().find(|reg| !taken.contains(**reg)) {
            Some(&register) => {
                colors.insert(node, register);
            }
            None => trace!(var = node, "left in memory"),
        }
    }

    colors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        codegen::{liveness, mips::INT_SAVED},
        ir::{BinOp, Function, Instruction, Operation, RelOp},
    };

    fn inst(operation: Operation, operands: &[&str]) -> Instruction {
        Instruction::new(operation, operands.iter().copied()).unwrap()
    }

    fn locals(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn allocate(function: &Function) -> (Vec<RegisterAssignment>, BTreeMap<String, &'static str>) {
        let program = Program::default();
        let flow = FunctionControlFlow::build(function).unwrap();
        let liveness = liveness::analyze(&flow, &function.arrays);
        let mut allocator = GlobalAllocator::new(&flow, &liveness, &program);

        let layout = allocator.allocate();
        let per_block = flow
            .blocks()
            .map(|block| allocator.reallocate(block, &layout))
            .collect();
        (per_block, allocator.colors.clone())
    }

    #[test]
    fn test_stable_registers_across_blocks() {
        let function = Function {
            name: "f".to_string(),
            int_locals: locals(&["a", "b", "c", "n"]),
            instructions: vec![
                inst(Operation::Assign, &["a", "0"]),
                Instruction::label("L1"),
                inst(Operation::Arithmetic(BinOp::Add), &["a", "1", "b"]),
                inst(Operation::Arithmetic(BinOp::Add), &["c", "b", "c"]),
                inst(Operation::Arithmetic(BinOp::Mult), &["b", "2", "a"]),
                inst(Operation::Branch(RelOp::Lt), &["a", "n", "L1"]),
                inst(Operation::Return, &["c"]),
            ],
            ..Function::default()
        };

        let (per_block, colors) = allocate(&function);
        let distinct: BTreeSet<_> = colors.values().collect();
        assert_eq!(colors.len(), 4);
        assert_eq!(distinct.len(), 4);

        assert_eq!(per_block[0].moved(), ["a"]);
        assert_eq!(per_block[0].register("a"), per_block[1].register("a"));
        assert_eq!(per_block[2].moved(), ["c"]);
        assert_eq!(per_block[2].register("c"), colors.get("c").copied());
    }

    #[test]
    fn test_disjoint_variables_share_a_register() {
        let function = Function {
            name: "g".to_string(),
            int_locals: locals(&["x", "y"]),
            instructions: vec![
                inst(Operation::Assign, &["x", "1"]),
                inst(Operation::Goto, &["L"]),
                Instruction::label("L"),
                inst(Operation::Assign, &["y", "2"]),
                inst(Operation::Return, &["y"]),
            ],
            ..Function::default()
        };

        let (_, colors) = allocate(&function);
        assert_eq!(colors.get("x"), Some(&"$s0"));
        assert_eq!(colors.get("y"), Some(&"$s0"));
    }

    #[test]
    fn test_spill_cheapest_when_pool_is_short() {
        let names: Vec<String> = (0..=INT_SAVED.len()).map(|i| format!("v{}", i)).collect();
        let mut body: Vec<Instruction> = names
            .iter()
            .map(|v| inst(Operation::Arithmetic(BinOp::Add), &[v.as_str(), "1", v.as_str()]))
            .collect();
        // everything but v0 gets one extra use
        for v in names.iter().skip(1) {
            body.push(inst(Operation::Call, &["printi", v.as_str()]));
        }

        let function = Function {
            name: "h".to_string(),
            int_locals: names.clone(),
            instructions: body,
            ..Function::default()
        };

        let (per_block, colors) = allocate(&function);
        assert_eq!(colors.get("v0"), None);
        assert_eq!(colors.len(), INT_SAVED.len());
        assert_eq!(per_block[0].moved().len(), INT_SAVED.len());
    }

    #[test]
    fn test_float_class_uses_float_pool() {
        let function = Function {
            name: "k".to_string(),
            int_locals: locals(&["i"]),
            float_locals: locals(&["x"]),
            instructions: vec![
                inst(Operation::Arithmetic(BinOp::Add), &["x", "0.5", "x"]),
                inst(Operation::Arithmetic(BinOp::Add), &["i", "1", "i"]),
            ],
            ..Function::default()
        };

        let (_, colors) = allocate(&function);
        assert_eq!(colors.get("x"), Some(&"$f20"));
        assert_eq!(colors.get("i"), Some(&"$s0"));
    }
}
