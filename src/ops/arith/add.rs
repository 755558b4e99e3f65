use crate::{
    error::{CompilationError, ExecutionError},
    ops::{arith::elementwise_spec, expect_runtime_arity, Operation},
    tensor::{Tensor, TensorSpec},
};

#[derive(Clone, Debug, Copy, PartialEq, Eq)]
pub(crate) enum AddType {
    Add,
    Subtract,
}

#[derive(Clone, Debug)]
pub(crate) struct TensorAdd {
    add_type: AddType,
}

impl TensorAdd {
    pub(crate) fn new(add_type: AddType) -> Self {
        TensorAdd { add_type }
    }
}

impl Operation for TensorAdd {
    fn name(&self) -> String {
        match self.add_type {
            AddType::Add => "Add",
            AddType::Subtract => "Sub",
        }
        .to_string()
    }

    fn output_spec(&self, inputs: &[&TensorSpec]) -> Result<TensorSpec, CompilationError> {
        elementwise_spec(&self.name(), inputs)
    }

    fn evaluate(&self, inputs: &[Tensor]) -> Result<Tensor, ExecutionError> {
        let name = self.name();
        expect_runtime_arity(&name, inputs, 2)?;
        match self.add_type {
            AddType::Add => numeric_binary!(
                &name, &inputs[0], &inputs[1],
                float: |a, b| a + b,
                int: |a, b| a.wrapping_add(b)
            ),
            AddType::Subtract => numeric_binary!(
                &name, &inputs[0], &inputs[1],
                float: |a, b| a - b,
                int: |a, b| a.wrapping_sub(b)
            ),
        }
    }
}
