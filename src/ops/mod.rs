//! Operator set a traced computation can record.
//!
//! Each operation knows how to infer its output spec at trace time and how to
//! evaluate itself on concrete tensors at run time. Trace-time inference is
//! where unsupported element types and incompatible shapes are caught, so the
//! run-time checks only guard against dynamic dimensions.

use std::fmt;

use ndarray::{ArrayD, Zip};

use crate::{
    error::{CompilationError, ExecutionError},
    tensor::{DType, Shape, Tensor, TensorSpec},
};

/// Apply a binary closure to two same-typed numeric tensors with broadcasting.
///
/// Floats and integers take separate closures so integer arithmetic can wrap
/// instead of overflowing.
macro_rules! numeric_binary {
    ($op:expr, $lhs:expr, $rhs:expr, float: |$fa:ident, $fb:ident| $float:expr, int: |$ia:ident, $ib:ident| $int:expr) => {
        match ($lhs, $rhs) {
            (Tensor::F32(lhs), Tensor::F32(rhs)) => Ok(Tensor::F32(
                $crate::ops::zip_broadcast($op, lhs, rhs, |$fa: f32, $fb: f32| $float)?,
            )),
            (Tensor::F64(lhs), Tensor::F64(rhs)) => Ok(Tensor::F64(
                $crate::ops::zip_broadcast($op, lhs, rhs, |$fa: f64, $fb: f64| $float)?,
            )),
            (Tensor::I32(lhs), Tensor::I32(rhs)) => Ok(Tensor::I32(
                $crate::ops::zip_broadcast($op, lhs, rhs, |$ia: i32, $ib: i32| $int)?,
            )),
            (Tensor::I64(lhs), Tensor::I64(rhs)) => Ok(Tensor::I64(
                $crate::ops::zip_broadcast($op, lhs, rhs, |$ia: i64, $ib: i64| $int)?,
            )),
            (lhs, rhs) => Err($crate::ops::runtime_dtype_error($op, lhs, rhs)),
        }
    };
}

/// Apply a unary closure to a float tensor.
macro_rules! float_unary {
    ($op:expr, $input:expr, |$x:ident| $body:expr) => {
        match $input {
            Tensor::F32(array) => Ok(Tensor::F32(array.mapv(|$x: f32| $body))),
            Tensor::F64(array) => Ok(Tensor::F64(array.mapv(|$x: f64| $body))),
            other => Err(ExecutionError::UnsupportedDType {
                op: $op.to_string(),
                dtype: other.dtype(),
            }),
        }
    };
}

pub(crate) mod arith;
pub(crate) mod logic;
pub(crate) mod util;

/// An operation recorded into a graph.
pub trait Operation: CloneableOps + fmt::Debug + Send + Sync {
    fn name(&self) -> String;
    fn output_spec(&self, inputs: &[&TensorSpec]) -> Result<TensorSpec, CompilationError>;
    fn evaluate(&self, inputs: &[Tensor]) -> Result<Tensor, ExecutionError>;
}

pub trait CloneableOps {
    fn internal_clone(&self) -> Box<dyn Operation>;
}

impl<G> CloneableOps for G
where
    G: Operation + Clone + 'static,
{
    fn internal_clone(&self) -> Box<dyn Operation> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn Operation> {
    fn clone(&self) -> Self {
        self.internal_clone()
    }
}

pub(crate) fn expect_arity<T>(op: &str, inputs: &[T], expected: usize) -> Result<(), CompilationError> {
    if inputs.len() == expected {
        Ok(())
    } else {
        Err(CompilationError::Arity {
            op: op.to_string(),
            expected,
            received: inputs.len(),
        })
    }
}

pub(crate) fn expect_runtime_arity(
    op: &str,
    inputs: &[Tensor],
    expected: usize,
) -> Result<(), ExecutionError> {
    if inputs.len() == expected {
        Ok(())
    } else {
        Err(ExecutionError::Arity {
            op: op.to_string(),
            expected,
            received: inputs.len(),
        })
    }
}

pub(crate) fn same_dtype(
    op: &str,
    lhs: &TensorSpec,
    rhs: &TensorSpec,
) -> Result<DType, CompilationError> {
    if lhs.dtype == rhs.dtype {
        Ok(lhs.dtype)
    } else {
        Err(CompilationError::DTypeMismatch {
            op: op.to_string(),
            lhs: lhs.dtype,
            rhs: rhs.dtype,
        })
    }
}

pub(crate) fn require_numeric(op: &str, spec: &TensorSpec) -> Result<(), CompilationError> {
    if spec.dtype.is_numeric() {
        Ok(())
    } else {
        Err(CompilationError::UnsupportedDType {
            op: op.to_string(),
            dtype: spec.dtype,
        })
    }
}

pub(crate) fn require_float(op: &str, spec: &TensorSpec) -> Result<(), CompilationError> {
    if spec.dtype.is_float() {
        Ok(())
    } else {
        Err(CompilationError::UnsupportedDType {
            op: op.to_string(),
            dtype: spec.dtype,
        })
    }
}

pub(crate) fn broadcast_spec(
    op: &str,
    lhs: &TensorSpec,
    rhs: &TensorSpec,
) -> Result<Shape, CompilationError> {
    lhs.shape
        .broadcast(&rhs.shape)
        .ok_or_else(|| CompilationError::IncompatibleShapes {
            op: op.to_string(),
            lhs: lhs.shape.clone(),
            rhs: rhs.shape.clone(),
        })
}

pub(crate) fn broadcast_shapes(lhs: &[usize], rhs: &[usize]) -> Option<Vec<usize>> {
    let rank = std::cmp::max(lhs.len(), rhs.len());
    let pad = |dims: &[usize]| -> Vec<usize> {
        std::iter::repeat(1)
            .take(rank - dims.len())
            .chain(dims.iter().cloned())
            .collect()
    };
    pad(lhs)
        .into_iter()
        .zip(pad(rhs).into_iter())
        .map(|(lhs, rhs)| match (lhs, rhs) {
            (lhs, rhs) if lhs == rhs => Some(lhs),
            (1, other) | (other, 1) => Some(other),
            _ => None,
        })
        .collect()
}

pub(crate) fn zip_broadcast<A, B, O, F>(
    op: &str,
    lhs: &ArrayD<A>,
    rhs: &ArrayD<B>,
    mut f: F,
) -> Result<ArrayD<O>, ExecutionError>
where
    A: Copy,
    B: Copy,
    F: FnMut(A, B) -> O,
{
    let mismatch = || ExecutionError::ShapeMismatch {
        op: op.to_string(),
        lhs: lhs.shape().to_vec(),
        rhs: rhs.shape().to_vec(),
    };
    let shape = broadcast_shapes(lhs.shape(), rhs.shape()).ok_or_else(mismatch)?;
    let lhs_view = lhs.broadcast(shape.as_slice()).ok_or_else(mismatch)?;
    let rhs_view = rhs.broadcast(shape.as_slice()).ok_or_else(mismatch)?;
    Ok(Zip::from(lhs_view)
        .and(rhs_view)
        .map_collect(|lhs, rhs| f(*lhs, *rhs)))
}

pub(crate) fn runtime_dtype_error(op: &str, lhs: &Tensor, rhs: &Tensor) -> ExecutionError {
    if lhs.dtype() == rhs.dtype() {
        ExecutionError::UnsupportedDType {
            op: op.to_string(),
            dtype: lhs.dtype(),
        }
    } else {
        ExecutionError::DTypeMismatch {
            op: op.to_string(),
            lhs: lhs.dtype(),
            rhs: rhs.dtype(),
        }
    }
}

/// Resolve a possibly negative axis against `rank`.
pub(crate) fn normalize_axis(op: &str, axis: isize, rank: usize) -> Result<usize, CompilationError> {
    let resolved = if axis < 0 { axis + rank as isize } else { axis };
    if resolved >= 0 && (resolved as usize) < rank {
        Ok(resolved as usize)
    } else {
        Err(CompilationError::InvalidInput {
            op: op.to_string(),
            reason: format!("axis {} is out of range for rank {}", axis, rank),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn runtime_broadcast_shapes() {
        assert_eq!(broadcast_shapes(&[10, 1], &[1]), Some(vec![10, 1]));
        assert_eq!(broadcast_shapes(&[], &[2, 3]), Some(vec![2, 3]));
        assert_eq!(broadcast_shapes(&[3, 1], &[1, 4]), Some(vec![3, 4]));
        assert_eq!(broadcast_shapes(&[3], &[4]), None);
    }

    #[test]
    fn zip_broadcast_rejects_incompatible_shapes() {
        let lhs = ArrayD::from_elem(ndarray::IxDyn(&[3]), 1_i32);
        let rhs = ArrayD::from_elem(ndarray::IxDyn(&[4]), 1_i32);
        let result = zip_broadcast("Add", &lhs, &rhs, |a, b| a + b);
        assert!(matches!(result, Err(ExecutionError::ShapeMismatch { .. })));
    }

    #[test]
    fn negative_axes_count_from_the_end() {
        assert_eq!(normalize_axis("Sum", -1, 3).unwrap(), 2);
        assert!(normalize_axis("Sum", 3, 3).is_err());
        assert!(normalize_axis("Sum", -4, 3).is_err());
    }
}
