use ndarray::{ArrayD, IxDyn};

use crate::{
    error::{CompilationError, ExecutionError},
    ops::{expect_arity, expect_runtime_arity, Operation},
    tensor::{Shape, Tensor, TensorSpec},
};

#[derive(Clone, Debug)]
pub(crate) struct TensorReshape {
    dims: Vec<usize>,
}

impl TensorReshape {
    pub(crate) fn new(dims: &[usize]) -> Self {
        TensorReshape {
            dims: dims.to_vec(),
        }
    }

    fn target_len(&self) -> usize {
        self.dims.iter().product()
    }
}

fn reshape_array<T: Clone>(array: &ArrayD<T>, dims: &[usize]) -> Result<ArrayD<T>, ExecutionError> {
    let values: Vec<T> = array.iter().cloned().collect();
    Ok(ArrayD::from_shape_vec(IxDyn(dims), values)?)
}

impl Operation for TensorReshape {
    fn name(&self) -> String {
        format!("Reshape({:?})", self.dims)
    }

    fn output_spec(&self, inputs: &[&TensorSpec]) -> Result<TensorSpec, CompilationError> {
        let name = self.name();
        expect_arity(&name, inputs, 1)?;
        match inputs[0].shape.num_elements() {
            Some(count) if count != self.target_len() => Err(CompilationError::InvalidInput {
                op: name,
                reason: format!(
                    "cannot reshape {} elements into {} elements",
                    count,
                    self.target_len()
                ),
            }),
            _ => Ok(TensorSpec::new(inputs[0].dtype, Shape::fixed(&self.dims))),
        }
    }

    fn evaluate(&self, inputs: &[Tensor]) -> Result<Tensor, ExecutionError> {
        expect_runtime_arity(&self.name(), inputs, 1)?;
        Ok(match &inputs[0] {
            Tensor::F32(array) => Tensor::F32(reshape_array(array, &self.dims)?),
            Tensor::F64(array) => Tensor::F64(reshape_array(array, &self.dims)?),
            Tensor::I32(array) => Tensor::I32(reshape_array(array, &self.dims)?),
            Tensor::I64(array) => Tensor::I64(reshape_array(array, &self.dims)?),
            Tensor::Bool(array) => Tensor::Bool(reshape_array(array, &self.dims)?),
        })
    }
}
