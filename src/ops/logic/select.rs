use ndarray::{ArrayD, Zip};

use crate::{
    error::{CompilationError, ExecutionError},
    ops::{
        broadcast_shapes, expect_arity, expect_runtime_arity, runtime_dtype_error, same_dtype,
        Operation,
    },
    tensor::{DType, Tensor, TensorSpec},
};

/// Elementwise `if cond { on_true } else { on_false }` with broadcasting.
#[derive(Clone, Debug)]
pub(crate) struct TensorSelect {}

impl TensorSelect {
    pub(crate) fn new() -> Self {
        TensorSelect {}
    }
}

fn select_arrays<T: Copy>(
    op: &str,
    cond: &ArrayD<bool>,
    on_true: &ArrayD<T>,
    on_false: &ArrayD<T>,
) -> Result<ArrayD<T>, ExecutionError> {
    let mismatch = || ExecutionError::ShapeMismatch {
        op: op.to_string(),
        lhs: on_true.shape().to_vec(),
        rhs: on_false.shape().to_vec(),
    };
    let shape = broadcast_shapes(on_true.shape(), on_false.shape())
        .and_then(|shape| broadcast_shapes(cond.shape(), &shape))
        .ok_or_else(mismatch)?;
    let cond = cond.broadcast(shape.as_slice()).ok_or_else(mismatch)?;
    let on_true = on_true.broadcast(shape.as_slice()).ok_or_else(mismatch)?;
    let on_false = on_false.broadcast(shape.as_slice()).ok_or_else(mismatch)?;
    Ok(Zip::from(cond)
        .and(on_true)
        .and(on_false)
        .map_collect(|c, t, f| if *c { *t } else { *f }))
}

impl Operation for TensorSelect {
    fn name(&self) -> String {
        "Select".to_string()
    }

    fn output_spec(&self, inputs: &[&TensorSpec]) -> Result<TensorSpec, CompilationError> {
        let name = self.name();
        expect_arity(&name, inputs, 3)?;
        if inputs[0].dtype != DType::Bool {
            return Err(CompilationError::UnsupportedDType {
                op: name,
                dtype: inputs[0].dtype,
            });
        }
        let dtype = same_dtype(&name, inputs[1], inputs[2])?;
        let incompatible = |lhs: &TensorSpec, rhs: &TensorSpec| CompilationError::IncompatibleShapes {
            op: name.clone(),
            lhs: lhs.shape.clone(),
            rhs: rhs.shape.clone(),
        };
        let values = inputs[1]
            .shape
            .broadcast(&inputs[2].shape)
            .ok_or_else(|| incompatible(inputs[1], inputs[2]))?;
        let shape = inputs[0]
            .shape
            .broadcast(&values)
            .ok_or_else(|| incompatible(inputs[0], inputs[1]))?;
        Ok(TensorSpec::new(dtype, shape))
    }

    fn evaluate(&self, inputs: &[Tensor]) -> Result<Tensor, ExecutionError> {
        let name = self.name();
        expect_runtime_arity(&name, inputs, 3)?;
        let cond = inputs[0]
            .array::<bool>()
            .ok_or_else(|| ExecutionError::UnsupportedDType {
                op: name.clone(),
                dtype: inputs[0].dtype(),
            })?;
        Ok(match (&inputs[1], &inputs[2]) {
            (Tensor::F32(t), Tensor::F32(f)) => Tensor::F32(select_arrays(&name, cond, t, f)?),
            (Tensor::F64(t), Tensor::F64(f)) => Tensor::F64(select_arrays(&name, cond, t, f)?),
            (Tensor::I32(t), Tensor::I32(f)) => Tensor::I32(select_arrays(&name, cond, t, f)?),
            (Tensor::I64(t), Tensor::I64(f)) => Tensor::I64(select_arrays(&name, cond, t, f)?),
            (Tensor::Bool(t), Tensor::Bool(f)) => Tensor::Bool(select_arrays(&name, cond, t, f)?),
            (t, f) => return Err(runtime_dtype_error(&name, t, f)),
        })
    }
}
