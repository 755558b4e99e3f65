use crate::{
    error::{CompilationError, ExecutionError},
    ops::{expect_arity, expect_runtime_arity, Operation},
    tensor::{Shape, Tensor, TensorSpec},
};

/// Reverse the axis order; for matrices this is the usual transpose.
#[derive(Clone, Debug)]
pub(crate) struct TensorTranspose {}

impl TensorTranspose {
    pub(crate) fn new() -> Self {
        TensorTranspose {}
    }
}

impl Operation for TensorTranspose {
    fn name(&self) -> String {
        "Transpose".to_string()
    }

    fn output_spec(&self, inputs: &[&TensorSpec]) -> Result<TensorSpec, CompilationError> {
        expect_arity(&self.name(), inputs, 1)?;
        let dims = inputs[0].shape.dims().iter().rev().cloned().collect();
        Ok(TensorSpec::new(inputs[0].dtype, Shape::new(dims)))
    }

    fn evaluate(&self, inputs: &[Tensor]) -> Result<Tensor, ExecutionError> {
        expect_runtime_arity(&self.name(), inputs, 1)?;
        Ok(match &inputs[0] {
            Tensor::F32(a) => Tensor::F32(a.t().as_standard_layout().into_owned()),
            Tensor::F64(a) => Tensor::F64(a.t().as_standard_layout().into_owned()),
            Tensor::I32(a) => Tensor::I32(a.t().as_standard_layout().into_owned()),
            Tensor::I64(a) => Tensor::I64(a.t().as_standard_layout().into_owned()),
            Tensor::Bool(a) => Tensor::Bool(a.t().as_standard_layout().into_owned()),
        })
    }
}
