pub(crate) mod spec;
pub(crate) mod variable;

use std::fmt;

use ndarray::{Array1, ArrayD, IxDyn};
use num::{One, Zero};
use num_traits::AsPrimitive;

use crate::error::ExecutionError;

pub use spec::{Dim, Shape, TensorSpec};
pub use variable::{Variable, VariableId};

/// Element type of a [`Tensor`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DType {
    F32,
    F64,
    I32,
    I64,
    Bool,
}

impl DType {
    pub fn is_float(self) -> bool {
        matches!(self, DType::F32 | DType::F64)
    }

    pub fn is_integer(self) -> bool {
        matches!(self, DType::I32 | DType::I64)
    }

    pub fn is_numeric(self) -> bool {
        self != DType::Bool
    }

    pub fn name(self) -> &'static str {
        match self {
            DType::F32 => "f32",
            DType::F64 => "f64",
            DType::I32 => "i32",
            DType::I64 => "i64",
            DType::Bool => "bool",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Dense, dynamically typed tensor value.
///
/// Concrete tensors are what callers pass into a traced function and what the
/// backend hands back. The element type is part of the value, which is what lets
/// the signature extractor tell an `f32` scalar apart from an `i32` scalar.
#[derive(Clone, Debug, PartialEq)]
pub enum Tensor {
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
    I32(ArrayD<i32>),
    I64(ArrayD<i64>),
    Bool(ArrayD<bool>),
}

/// Rust scalar types that can back a [`Tensor`].
pub trait Element: Copy + fmt::Debug + PartialEq + 'static {
    const DTYPE: DType;

    fn wrap(array: ArrayD<Self>) -> Tensor;
    fn view(tensor: &Tensor) -> Option<&ArrayD<Self>>;
}

macro_rules! impl_element {
    ($ty:ty, $variant:ident) => {
        impl Element for $ty {
            const DTYPE: DType = DType::$variant;

            fn wrap(array: ArrayD<Self>) -> Tensor {
                Tensor::$variant(array)
            }

            fn view(tensor: &Tensor) -> Option<&ArrayD<Self>> {
                match tensor {
                    Tensor::$variant(array) => Some(array),
                    _ => None,
                }
            }
        }

        impl From<$ty> for Tensor {
            fn from(value: $ty) -> Self {
                Tensor::scalar(value)
            }
        }

        impl From<Vec<$ty>> for Tensor {
            fn from(values: Vec<$ty>) -> Self {
                Tensor::$variant(Array1::from(values).into_dyn())
            }
        }

        impl From<ArrayD<$ty>> for Tensor {
            fn from(array: ArrayD<$ty>) -> Self {
                Tensor::$variant(array)
            }
        }
    };
}

impl_element!(f32, F32);
impl_element!(f64, F64);
impl_element!(i32, I32);
impl_element!(i64, I64);
impl_element!(bool, Bool);

fn is_nonzero<T: Zero + PartialEq>(value: T) -> bool {
    value != T::zero()
}

fn from_bool<T: Zero + One>(value: bool) -> T {
    if value {
        T::one()
    } else {
        T::zero()
    }
}

macro_rules! cast_numeric {
    ($array:expr, $target:expr) => {
        match $target {
            DType::F32 => Tensor::F32($array.mapv(|x| x.as_())),
            DType::F64 => Tensor::F64($array.mapv(|x| x.as_())),
            DType::I32 => Tensor::I32($array.mapv(|x| x.as_())),
            DType::I64 => Tensor::I64($array.mapv(|x| x.as_())),
            DType::Bool => Tensor::Bool($array.mapv(is_nonzero)),
        }
    };
}

macro_rules! for_each_array {
    ($tensor:expr, $array:ident => $body:expr) => {
        match $tensor {
            Tensor::F32($array) => $body,
            Tensor::F64($array) => $body,
            Tensor::I32($array) => $body,
            Tensor::I64($array) => $body,
            Tensor::Bool($array) => $body,
        }
    };
}

impl Tensor {
    pub fn scalar<T: Element>(value: T) -> Tensor {
        T::wrap(ArrayD::from_elem(IxDyn(&[]), value))
    }

    pub fn from_vec<T: Element>(data: Vec<T>, dims: &[usize]) -> Result<Tensor, ExecutionError> {
        Ok(T::wrap(ArrayD::from_shape_vec(IxDyn(dims), data)?))
    }

    pub fn filled<T: Element>(dims: &[usize], value: T) -> Tensor {
        T::wrap(ArrayD::from_elem(IxDyn(dims), value))
    }

    pub fn zeros(dtype: DType, dims: &[usize]) -> Tensor {
        match dtype {
            DType::F32 => Tensor::filled(dims, 0_f32),
            DType::F64 => Tensor::filled(dims, 0_f64),
            DType::I32 => Tensor::filled(dims, 0_i32),
            DType::I64 => Tensor::filled(dims, 0_i64),
            DType::Bool => Tensor::filled(dims, false),
        }
    }

    pub fn dtype(&self) -> DType {
        match self {
            Tensor::F32(_) => DType::F32,
            Tensor::F64(_) => DType::F64,
            Tensor::I32(_) => DType::I32,
            Tensor::I64(_) => DType::I64,
            Tensor::Bool(_) => DType::Bool,
        }
    }

    pub fn shape(&self) -> &[usize] {
        for_each_array!(self, array => array.shape())
    }

    pub fn rank(&self) -> usize {
        self.shape().len()
    }

    pub fn len(&self) -> usize {
        for_each_array!(self, array => array.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn spec(&self) -> TensorSpec {
        TensorSpec::new(self.dtype(), Shape::fixed(self.shape()))
    }

    pub fn array<T: Element>(&self) -> Option<&ArrayD<T>> {
        T::view(self)
    }

    /// Elements in logical order, when `T` matches the element type.
    pub fn to_vec<T: Element>(&self) -> Option<Vec<T>> {
        T::view(self).map(|array| array.iter().cloned().collect())
    }

    /// The single element of a one-element tensor.
    pub fn to_scalar<T: Element>(&self) -> Option<T> {
        match T::view(self) {
            Some(array) if array.len() == 1 => array.iter().next().cloned(),
            _ => None,
        }
    }

    pub(crate) fn to_predicate(&self) -> Option<bool> {
        self.to_scalar::<bool>()
    }

    pub fn cast(&self, dtype: DType) -> Tensor {
        if self.dtype() == dtype {
            return self.clone();
        }
        match self {
            Tensor::F32(array) => cast_numeric!(array, dtype),
            Tensor::F64(array) => cast_numeric!(array, dtype),
            Tensor::I32(array) => cast_numeric!(array, dtype),
            Tensor::I64(array) => cast_numeric!(array, dtype),
            Tensor::Bool(array) => match dtype {
                DType::F32 => Tensor::F32(array.mapv(from_bool)),
                DType::F64 => Tensor::F64(array.mapv(from_bool)),
                DType::I32 => Tensor::I32(array.mapv(from_bool)),
                DType::I64 => Tensor::I64(array.mapv(from_bool)),
                DType::Bool => Tensor::Bool(array.clone()),
            },
        }
    }
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for_each_array!(self, array => write!(f, "{}", array))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn scalar_tensors_carry_their_dtype() {
        assert_eq!(Tensor::from(1.5_f32).dtype(), DType::F32);
        assert_eq!(Tensor::from(3_i32).dtype(), DType::I32);
        assert_eq!(Tensor::from(3_i32).rank(), 0);
        assert_eq!(Tensor::from(true).to_scalar::<bool>(), Some(true));
    }

    #[test]
    fn check_tensor_conversion() {
        let tensor = Tensor::from_vec(vec![1_f32, 2., 3., 4., 5., 6.], &[2, 3]).unwrap();
        assert_eq!(tensor.shape(), &[2, 3]);
        assert_eq!(tensor.to_vec::<f32>().unwrap(), vec![1., 2., 3., 4., 5., 6.]);
        assert!(tensor.to_vec::<f64>().is_none());
    }

    #[test]
    fn mismatched_data_length_is_an_error() {
        assert!(Tensor::from_vec(vec![1_i64, 2, 3], &[2, 2]).is_err());
    }

    #[test]
    fn cast_between_element_types() {
        let tensor = Tensor::from(vec![0.0_f64, 1.7, -2.2]);
        assert_eq!(tensor.cast(DType::I32).to_vec::<i32>().unwrap(), vec![0, 1, -2]);
        assert_eq!(
            tensor.cast(DType::Bool).to_vec::<bool>().unwrap(),
            vec![false, true, true]
        );
        let flags = Tensor::from(vec![true, false]);
        assert_eq!(flags.cast(DType::F32).to_vec::<f32>().unwrap(), vec![1.0, 0.0]);
    }

    #[test]
    fn print_tensor() {
        let tensor = Tensor::filled(&[2, 3], 1_i64);
        print!("{}", tensor);
        assert_eq!(tensor.spec().to_string(), "i64[2, 3]");
    }
}
