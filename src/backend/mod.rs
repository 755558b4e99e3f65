//! Execution backends for compiled units.

use crate::{
    error::ExecutionError,
    graph::Graph,
    tensor::{Tensor, Variable},
};

#[cfg(feature = "native")]
pub mod native;

/// Runs a recorded graph on concrete inputs.
///
/// Replays must be deterministic for equal inputs and equal variable
/// contents. `captures` is indexed by the capture numbers recorded in
/// `ReadVariable` and `AssignVariable` nodes.
pub trait Backend: Send + Sync {
    fn name(&self) -> String;

    fn execute(
        &self,
        graph: &Graph,
        captures: &[Variable],
        inputs: Vec<Tensor>,
    ) -> Result<Vec<Tensor>, ExecutionError>;
}

/// Check fed tensors against the graph's placeholders.
pub fn check_inputs(graph: &Graph, inputs: &[Tensor]) -> Result<(), ExecutionError> {
    let specs = graph.input_specs();
    if specs.len() != inputs.len() {
        return Err(ExecutionError::InputCount {
            expected: specs.len(),
            received: inputs.len(),
        });
    }
    for (index, (spec, tensor)) in specs.iter().zip(inputs.iter()).enumerate() {
        if !spec.accepts_tensor(tensor) {
            return Err(ExecutionError::InputMismatch {
                index,
                expected: spec.to_string(),
                found: tensor.spec().to_string(),
            });
        }
    }
    Ok(())
}
