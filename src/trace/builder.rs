use log::warn;

use crate::{
    error::{CompilationError, TraceError},
    graph::{Block, Graph, Node, NodeId, NodeKind},
    ops::Operation,
    tensor::TensorSpec,
};

type ScopeId = usize;

#[derive(Debug)]
struct Scope {
    id: ScopeId,
    nodes: Vec<NodeId>,
}

/// Mutable graph under construction.
///
/// Scopes mirror the blocks of the finished graph. A value is usable while
/// the scope that recorded it is still open; once a scope closes, its values
/// can only leave it as block results.
pub(crate) struct GraphBuilder {
    name: String,
    nodes: Vec<Node>,
    node_scopes: Vec<ScopeId>,
    scopes: Vec<Scope>,
    next_scope: ScopeId,
    inputs: Vec<NodeId>,
    error: Option<TraceError>,
}

impl GraphBuilder {
    pub(crate) fn new(name: &str) -> Self {
        GraphBuilder {
            name: name.to_string(),
            nodes: vec![],
            node_scopes: vec![],
            scopes: vec![Scope { id: 0, nodes: vec![] }],
            next_scope: 1,
            inputs: vec![],
            error: None,
        }
    }

    /// Keep the first error of a trace; later ones are usually fallout from it.
    pub(crate) fn record_error<E: Into<TraceError>>(&mut self, error: E) {
        let error = error.into();
        match &self.error {
            None => self.error = Some(error),
            Some(first) => warn!(
                "Trace of {} already failed with \"{}\", also saw \"{}\"",
                self.name, first, error
            ),
        }
    }

    pub(crate) fn has_error(&self) -> bool {
        self.error.is_some()
    }

    fn current_scope(&self) -> ScopeId {
        self.scopes.last().map(|scope| scope.id).unwrap_or(0)
    }

    fn push(&mut self, kind: NodeKind, inputs: Vec<NodeId>, spec: Option<TensorSpec>, listed: bool) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            id,
            kind,
            inputs,
            spec,
        });
        self.node_scopes.push(self.current_scope());
        if listed {
            if let Some(scope) = self.scopes.last_mut() {
                scope.nodes.push(id);
            }
        }
        id
    }

    pub(crate) fn spec(&self, id: NodeId) -> Option<&TensorSpec> {
        self.nodes.get(id.0).and_then(Node::spec)
    }

    pub(crate) fn check_usable(&self, id: NodeId) -> Result<(), CompilationError> {
        match self.node_scopes.get(id.0) {
            Some(scope) if self.scopes.iter().any(|open| open.id == *scope) => Ok(()),
            _ => Err(CompilationError::ScopeEscape { node: id }),
        }
    }

    pub(crate) fn add_placeholder(&mut self, spec: TensorSpec) -> NodeId {
        let index = self.inputs.len();
        let id = self.push(NodeKind::Placeholder { index }, vec![], Some(spec), false);
        self.inputs.push(id);
        id
    }

    pub(crate) fn add_loop_param(&mut self, index: usize, spec: TensorSpec) -> NodeId {
        self.push(NodeKind::LoopParam { index }, vec![], Some(spec), false)
    }

    /// Record a node whose inputs have already been checked.
    pub(crate) fn add_node(
        &mut self,
        kind: NodeKind,
        inputs: Vec<NodeId>,
        spec: Option<TensorSpec>,
    ) -> NodeId {
        self.push(kind, inputs, spec, true)
    }

    pub(crate) fn add_op(
        &mut self,
        op: Box<dyn Operation>,
        inputs: Vec<NodeId>,
    ) -> Result<(NodeId, TensorSpec), CompilationError> {
        let mut specs = Vec::with_capacity(inputs.len());
        for id in inputs.iter() {
            self.check_usable(*id)?;
            match self.spec(*id) {
                Some(spec) => specs.push(spec),
                None => {
                    return Err(CompilationError::InvalidInput {
                        op: op.name(),
                        reason: format!("{} is not a single value", id),
                    })
                }
            }
        }
        let spec = op.output_spec(&specs)?;
        let id = self.push(NodeKind::Op(op), inputs, Some(spec.clone()), true);
        Ok((id, spec))
    }

    pub(crate) fn open_scope(&mut self) {
        let id = self.next_scope;
        self.next_scope += 1;
        self.scopes.push(Scope { id, nodes: vec![] });
    }

    /// Close the innermost scope and hand back the nodes it recorded.
    pub(crate) fn close_scope(&mut self) -> Vec<NodeId> {
        if self.scopes.len() > 1 {
            self.scopes.pop().map(|scope| scope.nodes).unwrap_or_default()
        } else {
            vec![]
        }
    }

    pub(crate) fn close_block(&mut self, results: Vec<NodeId>) -> Block {
        Block {
            nodes: self.close_scope(),
            results,
        }
    }

    pub(crate) fn finish(&mut self, outputs: Vec<NodeId>) -> Result<Graph, TraceError> {
        if let Some(error) = self.error.take() {
            return Err(error);
        }
        if outputs.is_empty() {
            return Err(CompilationError::NoOutputs {
                name: self.name.clone(),
            }
            .into());
        }
        for id in outputs.iter() {
            self.check_usable(*id)?;
        }
        let root = match self.scopes.first_mut() {
            Some(scope) => std::mem::take(&mut scope.nodes),
            None => vec![],
        };
        Ok(Graph::new(
            std::mem::take(&mut self.nodes),
            std::mem::take(&mut self.inputs),
            Block {
                nodes: root,
                results: outputs,
            },
        ))
    }
}
