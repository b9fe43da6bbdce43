//! Plain-text diagnostics: Graphviz block graphs and liveness tables.

use itertools::Itertools;

use crate::{
    codegen::{
        flow::FunctionControlFlow,
        graph::ID,
        liveness::{self, Liveness},
        Error,
    },
    ir::Program,
};

/// One `subgraph cluster_N` per function, one box per block.
pub fn control_flow_dot(flows: &[FunctionControlFlow<'_>]) -> String {
    let mut lines = vec!["digraph d {".to_string()];

    for (n, flow) in flows.iter().enumerate() {
        lines.push(format!("\tsubgraph cluster_{} {{", n));
        lines.push(format!("\t\tlabel = \"{}\";", escape(flow.name())));

        let nodes = flow.block_graph().nodes();
        for node in nodes {
            let text = node
                .val()
                .instructions()
                .iter()
                .map(|instruction| escape(&instruction.to_string()))
                .join("\\l");
            lines.push(format!(
                "\t\t{} [shape=box, label=\"{}\\l\"];",
                node_name(n, node.id()),
                text
            ));
        }
        for node in nodes {
            for succ in node.succ() {
                lines.push(format!(
                    "\t\t{} -> {};",
                    node_name(n, node.id()),
                    node_name(n, succ)
                ));
            }
        }

        lines.push("\t}".to_string());
    }

    lines.push("}".to_string());
    lines.join("\n")
}

/// `ins` and `outs` of every instruction, numbered from 1.
pub fn liveness_table(name: &str, liveness: &Liveness) -> String {
    let mut lines = vec![format!("function {}", name)];
    for idx in 0..liveness.len() {
        lines.push(format!(
            "ins  of {}: [{}]",
            idx + 1,
            liveness.live_in(idx).iter().join(", ")
        ));
        lines.push(format!(
            "outs of {}: [{}]",
            idx + 1,
            liveness.live_out(idx).iter().join(", ")
        ));
    }
    lines.join("\n")
}

/// DOT graph of every function in `program`.
pub fn program_control_flow(program: &Program) -> Result<String, Error> {
    let flows = program
        .functions
        .iter()
        .map(FunctionControlFlow::build)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(control_flow_dot(&flows))
}

/// Liveness tables of every function in `program`, separated by blank lines.
pub fn program_liveness(program: &Program) -> Result<String, Error> {
    let mut tables = Vec::with_capacity(program.functions.len());
    for function in &program.functions {
        let flow = FunctionControlFlow::build(function)?;
        let liveness = liveness::analyze(&flow, &function.visible_arrays(program));
        tables.push(liveness_table(&function.name, &liveness));
    }
    Ok(tables.join("\n\n"))
}

fn node_name(function: usize, id: ID) -> String {
    format!("f{}_b{}", function, id.index())
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}
