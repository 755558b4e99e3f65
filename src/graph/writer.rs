use std::fmt::{self, Write};

use itertools::Itertools;

use super::{Block, Graph, Node, NodeId, NodeKind};

const INDENT: &str = "  ";

fn write_ids(ids: &[NodeId]) -> String {
    ids.iter().join(", ")
}

fn write_node(
    f: &mut fmt::Formatter<'_>,
    graph: &Graph,
    node: &Node,
    depth: usize,
) -> fmt::Result {
    let indent = INDENT.repeat(depth);
    write!(f, "{}{} = ", indent, node.id)?;
    match &node.kind {
        NodeKind::Constant(tensor) if tensor.rank() == 0 => write!(f, "const {}", tensor)?,
        NodeKind::Cond {
            then_block,
            else_block,
        } => {
            writeln!(f, "cond({}) {{", write_ids(&node.inputs))?;
            write_block(f, graph, then_block, depth + 1)?;
            writeln!(f, "{}}} else {{", indent)?;
            write_block(f, graph, else_block, depth + 1)?;
            return writeln!(f, "{}}}", indent);
        }
        NodeKind::While {
            params,
            cond_block,
            body_block,
        } => {
            writeln!(
                f,
                "while({}) carry ({}) {{",
                write_ids(&node.inputs),
                write_ids(params)
            )?;
            writeln!(f, "{}{}cond:", indent, INDENT)?;
            write_block(f, graph, cond_block, depth + 2)?;
            writeln!(f, "{}{}body:", indent, INDENT)?;
            write_block(f, graph, body_block, depth + 2)?;
            return writeln!(f, "{}}}", indent);
        }
        kind => write!(f, "{}({})", kind.label(), write_ids(&node.inputs))?,
    }
    match &node.spec {
        Some(spec) => writeln!(f, " : {}", spec),
        None => writeln!(f),
    }
}

fn write_block(
    f: &mut fmt::Formatter<'_>,
    graph: &Graph,
    block: &Block,
    depth: usize,
) -> fmt::Result {
    for id in block.nodes.iter() {
        match graph.get(*id) {
            Some(node) => write_node(f, graph, node, depth)?,
            None => writeln!(f, "{}{} = <missing>", INDENT.repeat(depth), id)?,
        }
    }
    writeln!(
        f,
        "{}yield ({})",
        INDENT.repeat(depth),
        write_ids(&block.results)
    )
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut header = String::new();
        for (position, id) in self.inputs.iter().enumerate() {
            if position > 0 {
                header.push_str(", ");
            }
            write!(header, "{}", id)?;
            if let Some(spec) = self.get(*id).and_then(Node::spec) {
                write!(header, ": {}", spec)?;
            }
        }
        writeln!(f, "graph({}) {{", header)?;
        write_block(f, self, &self.body, 1)?;
        write!(f, "}}")
    }
}
