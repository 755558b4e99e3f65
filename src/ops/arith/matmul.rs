use ndarray::Ix2;

use crate::{
    error::{CompilationError, ExecutionError},
    ops::{expect_arity, expect_runtime_arity, require_numeric, same_dtype, Operation},
    tensor::{Dim, Shape, Tensor, TensorSpec},
};

/// Matrix product of two rank-2 tensors.
#[derive(Clone, Debug)]
pub(crate) struct TensorMatMul {}

impl TensorMatMul {
    pub(crate) fn new() -> Self {
        TensorMatMul {}
    }
}

macro_rules! matmul_arrays {
    ($lhs:expr, $rhs:expr) => {{
        let lhs = $lhs.view().into_dimensionality::<Ix2>()?;
        let rhs = $rhs.view().into_dimensionality::<Ix2>()?;
        lhs.dot(&rhs).into_dyn()
    }};
}

impl Operation for TensorMatMul {
    fn name(&self) -> String {
        "MatMul".to_string()
    }

    fn output_spec(&self, inputs: &[&TensorSpec]) -> Result<TensorSpec, CompilationError> {
        let name = self.name();
        expect_arity(&name, inputs, 2)?;
        let (lhs, rhs) = (inputs[0], inputs[1]);
        let dtype = same_dtype(&name, lhs, rhs)?;
        require_numeric(&name, lhs)?;
        if lhs.rank() != 2 || rhs.rank() != 2 {
            return Err(CompilationError::IncompatibleShapes {
                op: name,
                lhs: lhs.shape.clone(),
                rhs: rhs.shape.clone(),
            });
        }
        let (lhs_dims, rhs_dims) = (lhs.shape.dims(), rhs.shape.dims());
        if let (Dim::Fixed(inner_lhs), Dim::Fixed(inner_rhs)) = (lhs_dims[1], rhs_dims[0]) {
            if inner_lhs != inner_rhs {
                return Err(CompilationError::IncompatibleShapes {
                    op: name,
                    lhs: lhs.shape.clone(),
                    rhs: rhs.shape.clone(),
                });
            }
        }
        Ok(TensorSpec::new(
            dtype,
            Shape::new(vec![lhs_dims[0], rhs_dims[1]]),
        ))
    }

    fn evaluate(&self, inputs: &[Tensor]) -> Result<Tensor, ExecutionError> {
        let name = self.name();
        expect_runtime_arity(&name, inputs, 2)?;
        let (lhs, rhs) = (&inputs[0], &inputs[1]);
        let shape_error = || ExecutionError::ShapeMismatch {
            op: name.clone(),
            lhs: lhs.shape().to_vec(),
            rhs: rhs.shape().to_vec(),
        };
        if lhs.rank() != 2 || rhs.rank() != 2 || lhs.shape()[1] != rhs.shape()[0] {
            return Err(shape_error());
        }
        Ok(match (lhs, rhs) {
            (Tensor::F32(l), Tensor::F32(r)) => Tensor::F32(matmul_arrays!(l, r)),
            (Tensor::F64(l), Tensor::F64(r)) => Tensor::F64(matmul_arrays!(l, r)),
            (Tensor::I32(l), Tensor::I32(r)) => Tensor::I32(matmul_arrays!(l, r)),
            (Tensor::I64(l), Tensor::I64(r)) => Tensor::I64(matmul_arrays!(l, r)),
            (l, r) => return Err(crate::ops::runtime_dtype_error(&name, l, r)),
        })
    }
}
