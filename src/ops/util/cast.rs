use crate::{
    error::{CompilationError, ExecutionError},
    ops::{expect_arity, expect_runtime_arity, Operation},
    tensor::{DType, Tensor, TensorSpec},
};

/// Convert to another element type. Floats truncate toward zero when cast
/// to integers, and any non-zero value is `true` when cast to bool.
#[derive(Clone, Debug)]
pub(crate) struct TensorCast {
    target: DType,
}

impl TensorCast {
    pub(crate) fn new(target: DType) -> Self {
        TensorCast { target }
    }
}

impl Operation for TensorCast {
    fn name(&self) -> String {
        format!("Cast({})", self.target)
    }

    fn output_spec(&self, inputs: &[&TensorSpec]) -> Result<TensorSpec, CompilationError> {
        expect_arity(&self.name(), inputs, 1)?;
        Ok(TensorSpec::new(self.target, inputs[0].shape.clone()))
    }

    fn evaluate(&self, inputs: &[Tensor]) -> Result<Tensor, ExecutionError> {
        expect_runtime_arity(&self.name(), inputs, 1)?;
        Ok(inputs[0].cast(self.target))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tensor::Shape;

    #[test]
    fn cast_keeps_the_shape() {
        let input = TensorSpec::new(DType::I32, Shape::fixed(&[3]));
        let spec = TensorCast::new(DType::F32).output_spec(&[&input]).unwrap();
        assert_eq!(spec.to_string(), "f32[3]");
        let output = TensorCast::new(DType::F32)
            .evaluate(&[Tensor::from(vec![1_i32, 2, 3])])
            .unwrap();
        assert_eq!(output.to_vec::<f32>().unwrap(), vec![1., 2., 3.]);
    }
}
