use crate::{
    error::{CompilationError, ExecutionError},
    ops::{arith::elementwise_spec, expect_runtime_arity, Operation},
    tensor::{Tensor, TensorSpec},
};

#[derive(Clone, Debug, Copy, PartialEq, Eq)]
pub(crate) enum MultiplicationType {
    Hadamard,
    Divide,
    Remainder,
}

/// Elementwise product, quotient or remainder with broadcasting.
#[derive(Clone, Debug)]
pub(crate) struct TensorMultiply {
    multiplication_type: MultiplicationType,
}

impl TensorMultiply {
    pub(crate) fn new(multiplication_type: MultiplicationType) -> Self {
        TensorMultiply {
            multiplication_type,
        }
    }
}

fn has_integer_zero(tensor: &Tensor) -> bool {
    match tensor {
        Tensor::I32(array) => array.iter().any(|x| *x == 0),
        Tensor::I64(array) => array.iter().any(|x| *x == 0),
        _ => false,
    }
}

impl Operation for TensorMultiply {
    fn name(&self) -> String {
        match self.multiplication_type {
            MultiplicationType::Hadamard => "Mul",
            MultiplicationType::Divide => "Div",
            MultiplicationType::Remainder => "Rem",
        }
        .to_string()
    }

    fn output_spec(&self, inputs: &[&TensorSpec]) -> Result<TensorSpec, CompilationError> {
        elementwise_spec(&self.name(), inputs)
    }

    fn evaluate(&self, inputs: &[Tensor]) -> Result<Tensor, ExecutionError> {
        let name = self.name();
        expect_runtime_arity(&name, inputs, 2)?;
        if self.multiplication_type != MultiplicationType::Hadamard
            && has_integer_zero(&inputs[1])
        {
            return Err(ExecutionError::DivisionByZero { op: name });
        }
        match self.multiplication_type {
            MultiplicationType::Hadamard => numeric_binary!(
                &name, &inputs[0], &inputs[1],
                float: |a, b| a * b,
                int: |a, b| a.wrapping_mul(b)
            ),
            MultiplicationType::Divide => numeric_binary!(
                &name, &inputs[0], &inputs[1],
                float: |a, b| a / b,
                int: |a, b| a.wrapping_div(b)
            ),
            MultiplicationType::Remainder => numeric_binary!(
                &name, &inputs[0], &inputs[1],
                float: |a, b| a % b,
                int: |a, b| a.wrapping_rem(b)
            ),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hadamard_product() {
        let lhs = Tensor::from_vec(vec![1_f64, 2., 3., 4.], &[2, 2]).unwrap();
        let rhs = Tensor::from_vec(vec![2_f64, 0.5], &[2]).unwrap();
        let output = TensorMultiply::new(MultiplicationType::Hadamard)
            .evaluate(&[lhs, rhs])
            .unwrap();
        assert_eq!(output.to_vec::<f64>().unwrap(), vec![2., 1., 6., 2.]);
    }

    #[test]
    fn integer_remainder() {
        let numbers = Tensor::from(vec![1_i64, 3, 5, 15]);
        let output = TensorMultiply::new(MultiplicationType::Remainder)
            .evaluate(&[numbers, Tensor::from(3_i64)])
            .unwrap();
        assert_eq!(output.to_vec::<i64>().unwrap(), vec![1, 0, 2, 0]);
    }

    #[test]
    fn integer_division_by_zero_is_an_error() {
        let result = TensorMultiply::new(MultiplicationType::Divide)
            .evaluate(&[Tensor::from(4_i32), Tensor::from(0_i32)]);
        assert!(matches!(result, Err(ExecutionError::DivisionByZero { .. })));
    }

    #[test]
    fn float_division_by_zero_is_infinite() {
        let output = TensorMultiply::new(MultiplicationType::Divide)
            .evaluate(&[Tensor::from(1_f32), Tensor::from(0_f32)])
            .unwrap();
        assert_eq!(output.to_scalar::<f32>(), Some(f32::INFINITY));
    }
}
