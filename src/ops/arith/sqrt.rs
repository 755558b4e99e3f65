use crate::{
    error::{CompilationError, ExecutionError},
    ops::{expect_arity, expect_runtime_arity, require_float, Operation},
    tensor::{Tensor, TensorSpec},
};

#[derive(Clone, Debug, Copy, PartialEq, Eq)]
pub(crate) enum UnaryType {
    Sqrt,
    Exp,
    Ln,
}

/// Elementwise float functions.
#[derive(Clone, Debug)]
pub(crate) struct TensorUnary {
    unary_type: UnaryType,
}

impl TensorUnary {
    pub(crate) fn new(unary_type: UnaryType) -> Self {
        TensorUnary { unary_type }
    }
}

impl Operation for TensorUnary {
    fn name(&self) -> String {
        format!("{:?}", self.unary_type)
    }

    fn output_spec(&self, inputs: &[&TensorSpec]) -> Result<TensorSpec, CompilationError> {
        let name = self.name();
        expect_arity(&name, inputs, 1)?;
        require_float(&name, inputs[0])?;
        Ok(inputs[0].clone())
    }

    fn evaluate(&self, inputs: &[Tensor]) -> Result<Tensor, ExecutionError> {
        let name = self.name();
        expect_runtime_arity(&name, inputs, 1)?;
        match self.unary_type {
            UnaryType::Sqrt => float_unary!(&name, &inputs[0], |x| x.sqrt()),
            UnaryType::Exp => float_unary!(&name, &inputs[0], |x| x.exp()),
            UnaryType::Ln => float_unary!(&name, &inputs[0], |x| x.ln()),
        }
    }
}
