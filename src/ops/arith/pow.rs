use crate::{
    error::{CompilationError, ExecutionError},
    ops::{
        arith::elementwise_spec, expect_runtime_arity, require_float, runtime_dtype_error,
        zip_broadcast, Operation,
    },
    tensor::{Tensor, TensorSpec},
};

/// Elementwise `base ^ exponent` on float tensors.
#[derive(Clone, Debug)]
pub(crate) struct TensorPow {}

impl TensorPow {
    pub(crate) fn new() -> Self {
        TensorPow {}
    }
}

impl Operation for TensorPow {
    fn name(&self) -> String {
        "Pow".to_string()
    }

    fn output_spec(&self, inputs: &[&TensorSpec]) -> Result<TensorSpec, CompilationError> {
        let spec = elementwise_spec(&self.name(), inputs)?;
        require_float(&self.name(), &spec)?;
        Ok(spec)
    }

    fn evaluate(&self, inputs: &[Tensor]) -> Result<Tensor, ExecutionError> {
        let name = self.name();
        expect_runtime_arity(&name, inputs, 2)?;
        match (&inputs[0], &inputs[1]) {
            (Tensor::F32(base), Tensor::F32(exponent)) => Ok(Tensor::F32(zip_broadcast(
                &name,
                base,
                exponent,
                f32::powf,
            )?)),
            (Tensor::F64(base), Tensor::F64(exponent)) => Ok(Tensor::F64(zip_broadcast(
                &name,
                base,
                exponent,
                f64::powf,
            )?)),
            (base, exponent) => Err(runtime_dtype_error(&name, base, exponent)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tensor::DType;

    #[test]
    fn square_with_broadcast_exponent() {
        let base = Tensor::from(vec![1_f64, 2., 3.]);
        let output = TensorPow::new()
            .evaluate(&[base, Tensor::from(2_f64)])
            .unwrap();
        assert_eq!(output.to_vec::<f64>().unwrap(), vec![1., 4., 9.]);
    }

    #[test]
    fn integers_are_unsupported() {
        let spec = TensorSpec::scalar(DType::I64);
        let result = TensorPow::new().output_spec(&[&spec, &spec]);
        assert!(matches!(
            result,
            Err(CompilationError::UnsupportedDType { .. })
        ));
    }
}
