use ndarray::{ArrayD, Axis, IxDyn};

use crate::{
    error::{CompilationError, ExecutionError},
    ops::{
        arith::sum::{check_runtime_axis, reduced_spec},
        expect_arity, expect_runtime_arity, require_float, Operation,
    },
    tensor::{Tensor, TensorSpec},
};

/// Arithmetic mean over one axis or over the whole tensor. An empty
/// reduction yields NaN.
#[derive(Clone, Debug)]
pub(crate) struct TensorMean {
    axis: Option<usize>,
}

impl TensorMean {
    pub(crate) fn new(axis: Option<usize>) -> Self {
        TensorMean { axis }
    }
}

macro_rules! mean_of {
    ($array:expr, $axis:expr, $float:ty) => {
        match $axis {
            Some(axis) => {
                let count = $array.len_of(Axis(axis)) as $float;
                $array.sum_axis(Axis(axis)).mapv(|total| total / count)
            }
            None => ArrayD::from_elem(
                IxDyn(&[]),
                $array.sum() / $array.len() as $float,
            ),
        }
    };
}

impl Operation for TensorMean {
    fn name(&self) -> String {
        match self.axis {
            Some(axis) => format!("Mean(axis={})", axis),
            None => "Mean".to_string(),
        }
    }

    fn output_spec(&self, inputs: &[&TensorSpec]) -> Result<TensorSpec, CompilationError> {
        let name = self.name();
        expect_arity(&name, inputs, 1)?;
        require_float(&name, inputs[0])?;
        reduced_spec(&name, inputs[0], self.axis)
    }

    fn evaluate(&self, inputs: &[Tensor]) -> Result<Tensor, ExecutionError> {
        let name = self.name();
        expect_runtime_arity(&name, inputs, 1)?;
        check_runtime_axis(&name, &inputs[0], self.axis)?;
        match &inputs[0] {
            Tensor::F32(array) => Ok(Tensor::F32(mean_of!(array, self.axis, f32))),
            Tensor::F64(array) => Ok(Tensor::F64(mean_of!(array, self.axis, f64))),
            other => Err(ExecutionError::UnsupportedDType {
                op: name,
                dtype: other.dtype(),
            }),
        }
    }
}
