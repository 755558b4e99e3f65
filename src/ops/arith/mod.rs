pub(crate) mod add;
pub(crate) mod matmul;
pub(crate) mod mean;
pub(crate) mod multiply;
pub(crate) mod pow;
pub(crate) mod scal;
pub(crate) mod sqrt;
pub(crate) mod sum;

use crate::{
    error::CompilationError,
    ops::{broadcast_spec, expect_arity, require_numeric, same_dtype},
    tensor::TensorSpec,
};

/// Output spec shared by the broadcasting elementwise arithmetic ops.
pub(crate) fn elementwise_spec(
    op: &str,
    inputs: &[&TensorSpec],
) -> Result<TensorSpec, CompilationError> {
    expect_arity(op, inputs, 2)?;
    let dtype = same_dtype(op, inputs[0], inputs[1])?;
    require_numeric(op, inputs[0])?;
    let shape = broadcast_spec(op, inputs[0], inputs[1])?;
    Ok(TensorSpec::new(dtype, shape))
}
