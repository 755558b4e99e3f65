use crate::{
    error::{CompilationError, ExecutionError},
    ops::{broadcast_spec, expect_arity, expect_runtime_arity, zip_broadcast, Operation},
    tensor::{DType, Tensor, TensorSpec},
};

#[derive(Clone, Debug, Copy, PartialEq, Eq)]
pub(crate) enum LogicalType {
    And,
    Or,
    Xor,
    Not,
}

impl LogicalType {
    fn arity(self) -> usize {
        match self {
            LogicalType::Not => 1,
            _ => 2,
        }
    }
}

/// Boolean connectives over bool tensors.
#[derive(Clone, Debug)]
pub(crate) struct TensorLogical {
    logical_type: LogicalType,
}

impl TensorLogical {
    pub(crate) fn new(logical_type: LogicalType) -> Self {
        TensorLogical { logical_type }
    }
}

fn require_bool(op: &str, spec: &TensorSpec) -> Result<(), CompilationError> {
    if spec.dtype == DType::Bool {
        Ok(())
    } else {
        Err(CompilationError::UnsupportedDType {
            op: op.to_string(),
            dtype: spec.dtype,
        })
    }
}

impl Operation for TensorLogical {
    fn name(&self) -> String {
        format!("{:?}", self.logical_type)
    }

    fn output_spec(&self, inputs: &[&TensorSpec]) -> Result<TensorSpec, CompilationError> {
        let name = self.name();
        expect_arity(&name, inputs, self.logical_type.arity())?;
        for spec in inputs {
            require_bool(&name, spec)?;
        }
        match inputs {
            [input] => Ok((*input).clone()),
            [lhs, rhs] => Ok(TensorSpec::new(DType::Bool, broadcast_spec(&name, lhs, rhs)?)),
            _ => unreachable!("arity checked above"),
        }
    }

    fn evaluate(&self, inputs: &[Tensor]) -> Result<Tensor, ExecutionError> {
        let name = self.name();
        expect_runtime_arity(&name, inputs, self.logical_type.arity())?;
        let unsupported = |tensor: &Tensor| ExecutionError::UnsupportedDType {
            op: name.clone(),
            dtype: tensor.dtype(),
        };
        let lhs = inputs[0].array::<bool>().ok_or_else(|| unsupported(&inputs[0]))?;
        if self.logical_type == LogicalType::Not {
            return Ok(Tensor::Bool(lhs.mapv(|x| !x)));
        }
        let rhs = inputs[1].array::<bool>().ok_or_else(|| unsupported(&inputs[1]))?;
        let output = match self.logical_type {
            LogicalType::And => zip_broadcast(&name, lhs, rhs, |a, b| a && b)?,
            LogicalType::Or => zip_broadcast(&name, lhs, rhs, |a, b| a || b)?,
            _ => zip_broadcast(&name, lhs, rhs, |a, b| a ^ b)?,
        };
        Ok(Tensor::Bool(output))
    }
}
