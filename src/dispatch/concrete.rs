use std::fmt;

use uuid::Uuid;

use crate::{
    backend::Backend,
    error::ExecutionError,
    graph::Graph,
    signature::{Arg, ArgSpec, Signature},
    tensor::{Tensor, TensorSpec, Variable},
};

/// Compiled unit: the graph traced for one signature plus the variables it
/// captured. Immutable once built.
pub struct ConcreteFunction {
    id: Uuid,
    name: String,
    signature: Signature,
    graph: Graph,
    captures: Vec<Variable>,
}

impl ConcreteFunction {
    pub(crate) fn new(name: &str, signature: Signature, graph: Graph, captures: Vec<Variable>) -> Self {
        ConcreteFunction {
            id: Uuid::new_v4(),
            name: name.to_string(),
            signature,
            graph,
            captures,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn captures(&self) -> &[Variable] {
        &self.captures
    }

    pub fn input_specs(&self) -> Vec<TensorSpec> {
        self.graph.input_specs()
    }

    pub fn output_specs(&self) -> Vec<TensorSpec> {
        self.graph.output_specs()
    }

    /// Tensors to feed for `args`: tensors as given, scalar-kind constants as
    /// rank-0 tensors, folded constants not at all.
    pub fn feed(&self, args: &[Arg]) -> Result<Vec<Tensor>, ExecutionError> {
        if args.len() != self.signature.len() {
            return Err(ExecutionError::InputCount {
                expected: self.signature.len(),
                received: args.len(),
            });
        }
        let mut feeds = vec![];
        for (index, (spec, arg)) in self.signature.args().iter().zip(args.iter()).enumerate() {
            match (spec, arg) {
                (ArgSpec::Const(_), _) => {}
                (ArgSpec::Tensor(_), Arg::Tensor(tensor)) => feeds.push(tensor.clone()),
                (ArgSpec::Scalar(_), Arg::Const(constant)) => match constant.to_tensor() {
                    Some(tensor) => feeds.push(tensor),
                    None => return Err(mismatch(index, spec, &constant.to_string())),
                },
                (_, Arg::Tensor(tensor)) => {
                    return Err(mismatch(index, spec, &tensor.spec().to_string()))
                }
                (_, Arg::Const(constant)) => {
                    return Err(mismatch(index, spec, &constant.to_string()))
                }
            }
        }
        Ok(feeds)
    }

    pub fn call(&self, backend: &dyn Backend, args: &[Arg]) -> Result<Vec<Tensor>, ExecutionError> {
        let feeds = self.feed(args)?;
        backend.execute(&self.graph, &self.captures, feeds)
    }
}

fn mismatch(index: usize, expected: &ArgSpec, found: &str) -> ExecutionError {
    ExecutionError::InputMismatch {
        index,
        expected: expected.to_string(),
        found: found.to_string(),
    }
}

impl fmt::Debug for ConcreteFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcreteFunction")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("signature", &self.signature)
            .field("captures", &self.captures)
            .finish()
    }
}

impl fmt::Display for ConcreteFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}{}", self.name, self.signature)?;
        write!(f, "{}", self.graph)
    }
}
