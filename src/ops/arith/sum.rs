use ndarray::{ArrayD, Axis};

use crate::{
    error::{CompilationError, ExecutionError},
    ops::{expect_arity, expect_runtime_arity, require_numeric, Operation},
    tensor::{Shape, Tensor, TensorSpec},
};

/// Spec after reducing `axis`, or every axis when it is `None`.
pub(crate) fn reduced_spec(
    op: &str,
    input: &TensorSpec,
    axis: Option<usize>,
) -> Result<TensorSpec, CompilationError> {
    match axis {
        None => Ok(TensorSpec::scalar(input.dtype)),
        Some(axis) if axis < input.rank() => {
            let mut dims = input.shape.dims().to_vec();
            dims.remove(axis);
            Ok(TensorSpec::new(input.dtype, Shape::new(dims)))
        }
        Some(axis) => Err(CompilationError::InvalidInput {
            op: op.to_string(),
            reason: format!("axis {} is out of range for rank {}", axis, input.rank()),
        }),
    }
}

pub(crate) fn check_runtime_axis(
    op: &str,
    input: &Tensor,
    axis: Option<usize>,
) -> Result<(), ExecutionError> {
    match axis {
        Some(axis) if axis >= input.rank() => Err(ExecutionError::ShapeMismatch {
            op: op.to_string(),
            lhs: input.shape().to_vec(),
            rhs: vec![axis],
        }),
        _ => Ok(()),
    }
}

fn fold_sum<T, F>(array: &ArrayD<T>, axis: Option<usize>, zero: T, add: F) -> ArrayD<T>
where
    T: Copy,
    F: Fn(T, T) -> T,
{
    match axis {
        Some(axis) => array.fold_axis(Axis(axis), zero, |acc, x| add(*acc, *x)),
        None => ArrayD::from_elem(
            ndarray::IxDyn(&[]),
            array.iter().fold(zero, |acc, x| add(acc, *x)),
        ),
    }
}

/// Sum over one axis or over the whole tensor.
#[derive(Clone, Debug)]
pub(crate) struct TensorSum {
    axis: Option<usize>,
}

impl TensorSum {
    pub(crate) fn new(axis: Option<usize>) -> Self {
        TensorSum { axis }
    }
}

impl Operation for TensorSum {
    fn name(&self) -> String {
        match self.axis {
            Some(axis) => format!("Sum(axis={})", axis),
            None => "Sum".to_string(),
        }
    }

    fn output_spec(&self, inputs: &[&TensorSpec]) -> Result<TensorSpec, CompilationError> {
        let name = self.name();
        expect_arity(&name, inputs, 1)?;
        require_numeric(&name, inputs[0])?;
        reduced_spec(&name, inputs[0], self.axis)
    }

    fn evaluate(&self, inputs: &[Tensor]) -> Result<Tensor, ExecutionError> {
        let name = self.name();
        expect_runtime_arity(&name, inputs, 1)?;
        check_runtime_axis(&name, &inputs[0], self.axis)?;
        match &inputs[0] {
            Tensor::F32(array) => Ok(Tensor::F32(fold_sum(array, self.axis, 0.0, |a, b| a + b))),
            Tensor::F64(array) => Ok(Tensor::F64(fold_sum(array, self.axis, 0.0, |a, b| a + b))),
            Tensor::I32(array) => Ok(Tensor::I32(fold_sum(array, self.axis, 0, i32::wrapping_add))),
            Tensor::I64(array) => Ok(Tensor::I64(fold_sum(array, self.axis, 0, i64::wrapping_add))),
            other => Err(ExecutionError::UnsupportedDType {
                op: name,
                dtype: other.dtype(),
            }),
        }
    }
}
