use log::debug;

use super::{check_inputs, Backend};
use crate::{
    error::ExecutionError,
    graph::{Block, Graph, NodeId, NodeKind},
    tensor::{Tensor, Variable},
};

/// Interpreter that evaluates graph nodes with the ndarray kernels of the
/// operator set.
#[derive(Clone, Debug, Default)]
pub struct NativeBackend {}

impl NativeBackend {
    pub fn new() -> Self {
        NativeBackend {}
    }
}

#[derive(Clone, Debug)]
enum Slot {
    Value(Tensor),
    Tuple(Vec<Tensor>),
}

/// Values of one execution, indexed by node.
struct Frame<'g> {
    graph: &'g Graph,
    captures: &'g [Variable],
    slots: Vec<Option<Slot>>,
}

impl<'g> Frame<'g> {
    fn new(graph: &'g Graph, captures: &'g [Variable]) -> Self {
        Frame {
            graph,
            captures,
            slots: vec![None; graph.nodes().len()],
        }
    }

    fn set(&mut self, id: NodeId, slot: Slot) -> Result<(), ExecutionError> {
        match self.slots.get_mut(id.index()) {
            Some(entry) => {
                *entry = Some(slot);
                Ok(())
            }
            None => Err(ExecutionError::MissingValue { node: id }),
        }
    }

    fn value(&self, id: NodeId) -> Result<&Tensor, ExecutionError> {
        match self.slots.get(id.index()) {
            Some(Some(Slot::Value(tensor))) => Ok(tensor),
            _ => Err(ExecutionError::MissingValue { node: id }),
        }
    }

    fn tuple(&self, id: NodeId) -> Result<&[Tensor], ExecutionError> {
        match self.slots.get(id.index()) {
            Some(Some(Slot::Tuple(values))) => Ok(values),
            _ => Err(ExecutionError::MissingValue { node: id }),
        }
    }

    fn values(&self, ids: &[NodeId]) -> Result<Vec<Tensor>, ExecutionError> {
        ids.iter().map(|id| self.value(*id).map(Tensor::clone)).collect()
    }

    fn capture(&self, index: usize) -> Result<&'g Variable, ExecutionError> {
        self.captures
            .get(index)
            .ok_or(ExecutionError::MissingCapture {
                index,
                available: self.captures.len(),
            })
    }

    fn predicate(&self, id: NodeId) -> Result<bool, ExecutionError> {
        let value = self.value(id)?;
        value
            .to_predicate()
            .ok_or_else(|| ExecutionError::InvalidPredicate {
                found: value.spec(),
            })
    }

    fn run_block(&mut self, block: &'g Block) -> Result<Vec<Tensor>, ExecutionError> {
        for id in block.nodes().iter() {
            self.run_node(*id)?;
        }
        self.values(block.results())
    }

    fn run_node(&mut self, id: NodeId) -> Result<(), ExecutionError> {
        let graph = self.graph;
        let node = graph
            .get(id)
            .ok_or(ExecutionError::MissingValue { node: id })?;
        let slot = match node.kind() {
            // Bound before the block runs.
            NodeKind::Placeholder { .. } | NodeKind::LoopParam { .. } => return Ok(()),
            NodeKind::Constant(tensor) => Slot::Value(tensor.clone()),
            NodeKind::Op(op) => Slot::Value(op.evaluate(&self.values(node.inputs())?)?),
            NodeKind::ReadVariable { capture } => Slot::Value(self.capture(*capture)?.read()),
            NodeKind::AssignVariable { capture } => {
                let value = self.values(node.inputs())?.remove(0);
                self.capture(*capture)?.assign(value.clone())?;
                Slot::Value(value)
            }
            NodeKind::Inspect { label, effect } => {
                let value = self.values(node.inputs())?.remove(0);
                (**effect)(label.as_str(), &value);
                Slot::Value(value)
            }
            NodeKind::Cond {
                then_block,
                else_block,
            } => {
                let taken = if self.predicate(node.inputs()[0])? {
                    then_block
                } else {
                    else_block
                };
                Slot::Tuple(self.run_block(taken)?)
            }
            NodeKind::While {
                params,
                cond_block,
                body_block,
            } => {
                let mut carried = self.values(node.inputs())?;
                let mut iterations = 0_usize;
                loop {
                    for (param, value) in params.iter().zip(carried.iter()) {
                        self.set(*param, Slot::Value(value.clone()))?;
                    }
                    let pred = self.run_block(cond_block)?;
                    let keep_going = match pred.first() {
                        Some(value) => value.to_predicate().ok_or_else(|| {
                            ExecutionError::InvalidPredicate {
                                found: value.spec(),
                            }
                        })?,
                        None => false,
                    };
                    if !keep_going {
                        break;
                    }
                    carried = self.run_block(body_block)?;
                    iterations += 1;
                }
                debug!("Loop {} finished after {} iterations", id, iterations);
                Slot::Tuple(carried)
            }
            NodeKind::Output { index } => {
                let source = node.inputs()[0];
                let value = self
                    .tuple(source)?
                    .get(*index)
                    .cloned()
                    .ok_or(ExecutionError::MissingValue { node: source })?;
                Slot::Value(value)
            }
        };
        self.set(id, slot)
    }
}

impl Backend for NativeBackend {
    fn name(&self) -> String {
        "native".to_string()
    }

    fn execute(
        &self,
        graph: &Graph,
        captures: &[Variable],
        inputs: Vec<Tensor>,
    ) -> Result<Vec<Tensor>, ExecutionError> {
        check_inputs(graph, &inputs)?;
        let mut frame = Frame::new(graph, captures);
        for (id, tensor) in graph.inputs().iter().zip(inputs.into_iter()) {
            frame.set(*id, Slot::Value(tensor))?;
        }
        frame.run_block(graph.body())
    }
}
