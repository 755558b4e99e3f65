//! Portable graph form of a traced computation.
//!
//! Nodes live in one arena and are addressed by [`NodeId`]. Execution order is
//! given by [`Block`]s: the graph body is the root block, and the branches of a
//! `Cond` and the condition/body of a `While` are nested blocks. A nested block
//! may read any value of the blocks enclosing it, never the other way round.

use std::{fmt, sync::Arc};

use crate::{
    ops::Operation,
    tensor::{Tensor, TensorSpec},
};

mod traversal;
mod writer;

/// Callback run by an `Inspect` node each time the graph executes.
pub type InspectFn = Arc<dyn Fn(&str, &Tensor) + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Ordered run of nodes plus the values it yields.
#[derive(Clone, Debug, Default)]
pub struct Block {
    pub(crate) nodes: Vec<NodeId>,
    pub(crate) results: Vec<NodeId>,
}

impl Block {
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn results(&self) -> &[NodeId] {
        &self.results
    }
}

#[derive(Clone)]
pub enum NodeKind {
    /// Fed input `index` of the compiled unit.
    Placeholder { index: usize },
    /// Loop-carried value, rebound on every iteration of its `While`.
    LoopParam { index: usize },
    Constant(Tensor),
    Op(Box<dyn Operation>),
    ReadVariable { capture: usize },
    /// Writes its input into a captured variable and yields it.
    AssignVariable { capture: usize },
    /// Runs `effect` on its input and yields it unchanged.
    Inspect { label: String, effect: InspectFn },
    /// Runs one of two blocks depending on a scalar bool input.
    Cond { then_block: Block, else_block: Block },
    While {
        params: Vec<NodeId>,
        cond_block: Block,
        body_block: Block,
    },
    /// Element `index` of a multi-valued `Cond` or `While`.
    Output { index: usize },
}

impl NodeKind {
    pub fn label(&self) -> String {
        match self {
            NodeKind::Placeholder { index } => format!("input {}", index),
            NodeKind::LoopParam { index } => format!("loop_param {}", index),
            NodeKind::Constant(_) => "const".to_string(),
            NodeKind::Op(op) => op.name(),
            NodeKind::ReadVariable { capture } => format!("read_variable @{}", capture),
            NodeKind::AssignVariable { capture } => format!("assign_variable @{}", capture),
            NodeKind::Inspect { label, .. } => format!("inspect {:?}", label),
            NodeKind::Cond { .. } => "cond".to_string(),
            NodeKind::While { .. } => "while".to_string(),
            NodeKind::Output { index } => format!("output {}", index),
        }
    }
}

impl fmt::Debug for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

#[derive(Clone, Debug)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) kind: NodeKind,
    pub(crate) inputs: Vec<NodeId>,
    /// `None` for multi-valued nodes; read their values through `Output` nodes.
    pub(crate) spec: Option<TensorSpec>,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn inputs(&self) -> &[NodeId] {
        &self.inputs
    }

    pub fn spec(&self) -> Option<&TensorSpec> {
        self.spec.as_ref()
    }
}

/// Immutable recorded computation.
#[derive(Clone, Debug)]
pub struct Graph {
    pub(crate) nodes: Vec<Node>,
    pub(crate) inputs: Vec<NodeId>,
    pub(crate) body: Block,
}

impl Graph {
    pub(crate) fn new(nodes: Vec<Node>, inputs: Vec<NodeId>, body: Block) -> Self {
        Graph {
            nodes,
            inputs,
            body,
        }
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn body(&self) -> &Block {
        &self.body
    }

    pub fn inputs(&self) -> &[NodeId] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[NodeId] {
        &self.body.results
    }

    pub fn input_specs(&self) -> Vec<TensorSpec> {
        self.specs_of(&self.inputs)
    }

    pub fn output_specs(&self) -> Vec<TensorSpec> {
        self.specs_of(&self.body.results)
    }

    fn specs_of(&self, ids: &[NodeId]) -> Vec<TensorSpec> {
        ids.iter()
            .filter_map(|id| self.get(*id).and_then(|node| node.spec.clone()))
            .collect()
    }
}
