use crate::{
    error::{CompilationError, ExecutionError},
    ops::{
        broadcast_spec, expect_arity, expect_runtime_arity, runtime_dtype_error, same_dtype,
        zip_broadcast, Operation,
    },
    tensor::{DType, Tensor, TensorSpec},
};

#[derive(Clone, Debug, Copy, PartialEq, Eq)]
pub(crate) enum CompareType {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
}

impl CompareType {
    fn apply<T: PartialOrd>(self, lhs: T, rhs: T) -> bool {
        match self {
            CompareType::Gt => lhs > rhs,
            CompareType::Ge => lhs >= rhs,
            CompareType::Lt => lhs < rhs,
            CompareType::Le => lhs <= rhs,
            CompareType::Eq => lhs == rhs,
            CompareType::Ne => lhs != rhs,
        }
    }

    fn is_equality(self) -> bool {
        matches!(self, CompareType::Eq | CompareType::Ne)
    }
}

/// Elementwise comparison producing a bool tensor.
#[derive(Clone, Debug)]
pub(crate) struct TensorCompare {
    compare_type: CompareType,
}

impl TensorCompare {
    pub(crate) fn new(compare_type: CompareType) -> Self {
        TensorCompare { compare_type }
    }
}

impl Operation for TensorCompare {
    fn name(&self) -> String {
        format!("{:?}", self.compare_type)
    }

    fn output_spec(&self, inputs: &[&TensorSpec]) -> Result<TensorSpec, CompilationError> {
        let name = self.name();
        expect_arity(&name, inputs, 2)?;
        let dtype = same_dtype(&name, inputs[0], inputs[1])?;
        if dtype == DType::Bool && !self.compare_type.is_equality() {
            return Err(CompilationError::UnsupportedDType { op: name, dtype });
        }
        let shape = broadcast_spec(&name, inputs[0], inputs[1])?;
        Ok(TensorSpec::new(DType::Bool, shape))
    }

    fn evaluate(&self, inputs: &[Tensor]) -> Result<Tensor, ExecutionError> {
        let name = self.name();
        expect_runtime_arity(&name, inputs, 2)?;
        let compare = self.compare_type;
        let result = match (&inputs[0], &inputs[1]) {
            (Tensor::F32(l), Tensor::F32(r)) => zip_broadcast(&name, l, r, |a, b| compare.apply(a, b))?,
            (Tensor::F64(l), Tensor::F64(r)) => zip_broadcast(&name, l, r, |a, b| compare.apply(a, b))?,
            (Tensor::I32(l), Tensor::I32(r)) => zip_broadcast(&name, l, r, |a, b| compare.apply(a, b))?,
            (Tensor::I64(l), Tensor::I64(r)) => zip_broadcast(&name, l, r, |a, b| compare.apply(a, b))?,
            (Tensor::Bool(l), Tensor::Bool(r)) if compare.is_equality() => {
                zip_broadcast(&name, l, r, |a, b| compare.apply(a, b))?
            }
            (l, r) => return Err(runtime_dtype_error(&name, l, r)),
        };
        Ok(Tensor::Bool(result))
    }
}
