use std::sync::Arc;

use lazy_static::lazy_static;
use ndarray::{ArrayD, IxDyn};
use rand::{distributions::Standard, prelude::Distribution, Rng};

pub use num::{One, Zero};

use crate::{
    backend::Backend,
    error::ExecutionError,
    tensor::{Element, Tensor},
};

#[cfg(feature = "native")]
lazy_static! {
    static ref NATIVE_BACKEND: Arc<crate::backend::native::NativeBackend> =
        Arc::new(crate::backend::native::NativeBackend::new());
}

/// Shared interpreter backend used by [`Function::new`](crate::dispatch::Function::new).
#[cfg(feature = "native")]
pub fn get_native_backend() -> Arc<dyn Backend> {
    NATIVE_BACKEND.clone()
}

pub fn filled_tensor<T: Element>(dims: &[usize], data: &[T]) -> Result<Tensor, ExecutionError> {
    Tensor::from_vec(data.to_vec(), dims)
}

pub fn identity<T: Element + One + Zero>(length: usize) -> Tensor {
    T::wrap(ArrayD::from_shape_fn(IxDyn(&[length, length]), |index| {
        if index[0] == index[1] {
            T::one()
        } else {
            T::zero()
        }
    }))
}

pub fn ones<T: Element + One>(dims: &[usize]) -> Tensor {
    Tensor::filled(dims, T::one())
}

pub fn zeros<T: Element + Zero>(dims: &[usize]) -> Tensor {
    Tensor::filled(dims, T::zero())
}

pub fn random_initialize<T: Element>(dims: &[usize]) -> Tensor
where
    Standard: Distribution<T>,
{
    let mut rng = rand::thread_rng();
    T::wrap(ArrayD::from_shape_simple_fn(IxDyn(dims), || rng.gen::<T>()))
}
