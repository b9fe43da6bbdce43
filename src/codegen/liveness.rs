use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::debug;

use super::{
    flow::FunctionControlFlow,
    graph::{Graph, ID},
};

pub type LiveSet = BTreeSet<String>;

/// Per-instruction live-in and live-out sets of one function.
#[derive(Debug, Clone)]
pub struct Liveness {
    defs: Vec<LiveSet>,
    uses: Vec<LiveSet>,
    ins: Vec<LiveSet>,
    outs: Vec<LiveSet>,
    iterations: usize,
}

/// Iterate `in = (out - def) ∪ use`, `out = ∪ in[succ]` to a fixpoint.
/// Arrays are addressed, never value-tracked, so they are dropped from def/use.
pub fn analyze(flow: &FunctionControlFlow<'_>, arrays: &BTreeMap<String, usize>) -> Liveness {
    let instructions = &flow.function().instructions;
    let scalars = |set: &BTreeSet<String>| -> LiveSet {
        set.iter()
            .filter(|name| !arrays.contains_key(*name))
            .cloned()
            .collect()
    };

    let len = instructions.len();
    let mut liveness = Liveness {
        defs: instructions.iter().map(|i| scalars(i.defs())).collect(),
        uses: instructions.iter().map(|i| scalars(i.uses())).collect(),
        ins: vec![LiveSet::new(); len],
        outs: vec![LiveSet::new(); len],
        iterations: 0,
    };

    loop {
        liveness.iterations += 1;
        if !liveness.sweep(flow) {
            break;
        }
    }

    debug!(
        function = flow.name(),
        iterations = liveness.iterations,
        "liveness converged"
    );

    liveness
}

impl Liveness {
    /// One backward pass. Returns whether any set changed.
    fn sweep(&mut self, flow: &FunctionControlFlow<'_>) -> bool {
        let mut has_change = false;

        for id in (0..self.ins.len()).rev() {
            let mut new_out = LiveSet::new();
            for &succ in flow.successors(id) {
                new_out.extend(self.ins[succ].iter().cloned());
            }

            let mut new_in: LiveSet = new_out.difference(&self.defs[id]).cloned().collect();
            new_in.extend(self.uses[id].iter().cloned());

            has_change |= self.ins[id] != new_in;
            has_change |= self.outs[id] != new_out;

            self.ins[id] = new_in;
            self.outs[id] = new_out;
        }

        has_change
    }

    pub fn len(&self) -> usize {
        self.ins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ins.is_empty()
    }

    pub fn live_in(&self, idx: usize) -> &LiveSet {
        &self.ins[idx]
    }

    pub fn live_out(&self, idx: usize) -> &LiveSet {
        &self.outs[idx]
    }

    pub fn defs(&self, idx: usize) -> &LiveSet {
        &self.defs[idx]
    }

    pub fn uses(&self, idx: usize) -> &LiveSet {
        &self.uses[idx]
    }

    /// Every scalar variable defined or used in the function.
    pub fn variables(&self) -> BTreeSet<&str> {
        self.defs
            .iter()
            .chain(self.uses.iter())
            .flatten()
            .map(String::as_str)
            .collect()
    }

    /// Maximal runs of consecutive instructions where `var` is live-in or live-out.
    pub fn live_ranges(&self, var: &str) -> Vec<(usize, usize)> {
        let mut ranges = Vec::new();
        let mut start = None;

        for idx in 0..self.len() {
            let live = self.ins[idx].contains(var) || self.outs[idx].contains(var);
            match (live, start) {
                (true, None) => start = Some(idx),
                (false, Some(from)) => {
                    ranges.push((from, idx - 1));
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(from) = start {
            ranges.push((from, self.len() - 1));
        }

        ranges
    }
}

pub type Node = String;

/// Undirected graph of variables that are live at the same time.
pub struct InterferenceGraph {
    graph: Graph<Node>,
    ids: HashMap<Node, ID>,
}

impl InterferenceGraph {
    /// Each defined variable interferes with everything else live out of its definition.
    pub fn new(liveness: &Liveness) -> Self {
        let variables = liveness.variables();

        let mut graph = Graph::with_capacity(variables.len());
        let mut ids = HashMap::new();
        for var in variables {
            let id = graph.insert(var.to_string());
            ids.insert(var.to_string(), id);
        }

        let mut interference = Self { graph, ids };
        for idx in 0..liveness.len() {
            for def in liveness.defs(idx) {
                for live in liveness.live_out(idx) {
                    interference.add_edge(def, live);
                }
            }
        }

        interference
    }

    pub fn graph_ref(&self) -> &Graph<Node> {
        &self.graph
    }

    pub fn id(&self, var: &str) -> Option<ID> {
        self.ids.get(var).copied()
    }

    pub fn var(&self, id: ID) -> &str {
        self.graph.get(id).val()
    }

    /// Link `one` and `other`, ignoring self-edges and unknown variables.
    pub fn add_edge(&mut self, one: &str, other: &str) {
        if one == other {
            return;
        }
        if let (Some(one), Some(other)) = (self.id(one), self.id(other)) {
            self.graph.double_link(one, other);
        }
    }

    pub fn interferes(&self, one: &str, other: &str) -> bool {
        match (self.id(one), self.id(other)) {
            (Some(one), Some(other)) => self.graph.succ(one).any(|id| id == other),
            _ => false,
        }
    }

    pub fn neighbours(&self, var: &str) -> BTreeSet<&str> {
        self.id(var)
            .map(|id| self.graph.get(id).adj().map(|adj| self.var(adj)).collect())
            .unwrap_or_default()
    }
}
