use crate::{
    error::{CompilationError, ExecutionError},
    ops::{expect_arity, expect_runtime_arity, require_numeric, Operation},
    tensor::{Tensor, TensorSpec},
};

/// Multiply every element by a fixed factor.
#[derive(Clone, Debug)]
pub(crate) struct TensorScale {
    factor: f64,
}

impl TensorScale {
    pub(crate) fn new(factor: f64) -> Self {
        TensorScale { factor }
    }

    pub(crate) fn negate() -> Self {
        TensorScale::new(-1.0)
    }

    fn is_integral(&self) -> bool {
        self.factor.fract() == 0.0
    }
}

impl Operation for TensorScale {
    fn name(&self) -> String {
        if self.factor == -1.0 {
            "Neg".to_string()
        } else {
            format!("Scale({})", self.factor)
        }
    }

    fn output_spec(&self, inputs: &[&TensorSpec]) -> Result<TensorSpec, CompilationError> {
        let name = self.name();
        expect_arity(&name, inputs, 1)?;
        require_numeric(&name, inputs[0])?;
        if inputs[0].dtype.is_integer() && !self.is_integral() {
            return Err(CompilationError::InvalidInput {
                op: name,
                reason: format!(
                    "cannot scale {} by non-integral factor {}",
                    inputs[0].dtype, self.factor
                ),
            });
        }
        Ok(inputs[0].clone())
    }

    fn evaluate(&self, inputs: &[Tensor]) -> Result<Tensor, ExecutionError> {
        expect_runtime_arity(&self.name(), inputs, 1)?;
        let factor = self.factor;
        match &inputs[0] {
            Tensor::F32(array) => Ok(Tensor::F32(array.mapv(|x| x * factor as f32))),
            Tensor::F64(array) => Ok(Tensor::F64(array.mapv(|x| x * factor))),
            Tensor::I32(array) => Ok(Tensor::I32(array.mapv(|x| x.wrapping_mul(factor as i32)))),
            Tensor::I64(array) => Ok(Tensor::I64(array.mapv(|x| x.wrapping_mul(factor as i64)))),
            other => Err(ExecutionError::UnsupportedDType {
                op: self.name(),
                dtype: other.dtype(),
            }),
        }
    }
}
