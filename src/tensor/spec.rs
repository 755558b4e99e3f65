use std::fmt;

use itertools::Itertools;

use super::{DType, Tensor};

/// One dimension of a [`Shape`]: either known at trace time or left open.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Dim {
    Fixed(usize),
    Dynamic,
}

impl Dim {
    fn accepts(self, other: Dim) -> bool {
        match (self, other) {
            (Dim::Dynamic, _) => true,
            (Dim::Fixed(lhs), Dim::Fixed(rhs)) => lhs == rhs,
            (Dim::Fixed(_), Dim::Dynamic) => false,
        }
    }

    fn join(self, other: Dim) -> Dim {
        if self == other {
            self
        } else {
            Dim::Dynamic
        }
    }

    fn broadcast(self, other: Dim) -> Option<Dim> {
        match (self, other) {
            (Dim::Fixed(lhs), Dim::Fixed(rhs)) if lhs == rhs => Some(Dim::Fixed(lhs)),
            (Dim::Fixed(1), dim) | (dim, Dim::Fixed(1)) => Some(dim),
            (Dim::Fixed(_), Dim::Fixed(_)) => None,
            (Dim::Dynamic, Dim::Dynamic) => Some(Dim::Dynamic),
            // An open dimension can only broadcast against n if it is 1 or n at run time.
            (Dim::Dynamic, fixed) | (fixed, Dim::Dynamic) => Some(fixed),
        }
    }
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dim::Fixed(size) => write!(f, "{}", size),
            Dim::Dynamic => f.write_str("?"),
        }
    }
}

/// Shape class of a tensor as seen at trace time.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Shape(Vec<Dim>);

impl Shape {
    pub fn new(dims: Vec<Dim>) -> Self {
        Shape(dims)
    }

    pub fn fixed(dims: &[usize]) -> Self {
        Shape(dims.iter().map(|dim| Dim::Fixed(*dim)).collect())
    }

    pub fn scalar() -> Self {
        Shape(vec![])
    }

    /// A shape of the given rank with every dimension left open.
    pub fn dynamic(rank: usize) -> Self {
        Shape(vec![Dim::Dynamic; rank])
    }

    pub fn dims(&self) -> &[Dim] {
        &self.0
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    pub fn is_fully_defined(&self) -> bool {
        self.0.iter().all(|dim| matches!(dim, Dim::Fixed(_)))
    }

    /// Number of elements, when every dimension is known.
    pub fn num_elements(&self) -> Option<usize> {
        self.0
            .iter()
            .map(|dim| match dim {
                Dim::Fixed(size) => Some(*size),
                Dim::Dynamic => None,
            })
            .product()
    }

    pub fn relaxed(&self) -> Shape {
        Shape::dynamic(self.rank())
    }

    /// Whether every concrete shape described by `other` is also described by `self`.
    pub fn accepts(&self, other: &Shape) -> bool {
        self.rank() == other.rank()
            && self
                .0
                .iter()
                .zip(other.0.iter())
                .all(|(lhs, rhs)| lhs.accepts(*rhs))
    }

    /// Whether some concrete shape is described by both. Open dimensions
    /// agree with anything; fixed ones must be equal.
    pub fn overlaps(&self, other: &Shape) -> bool {
        self.rank() == other.rank()
            && self
                .0
                .iter()
                .zip(other.0.iter())
                .all(|(lhs, rhs)| match (lhs, rhs) {
                    (Dim::Fixed(lhs), Dim::Fixed(rhs)) => lhs == rhs,
                    _ => true,
                })
    }

    pub fn accepts_dims(&self, dims: &[usize]) -> bool {
        self.accepts(&Shape::fixed(dims))
    }

    /// Most specific shape describing both inputs, if they share a rank.
    pub fn join(&self, other: &Shape) -> Option<Shape> {
        if self.rank() != other.rank() {
            return None;
        }
        Some(Shape(
            self.0
                .iter()
                .zip(other.0.iter())
                .map(|(lhs, rhs)| lhs.join(*rhs))
                .collect(),
        ))
    }

    /// Numpy-style broadcast of two shapes, aligned on trailing dimensions.
    pub fn broadcast(&self, other: &Shape) -> Option<Shape> {
        let rank = std::cmp::max(self.rank(), other.rank());
        let lhs = std::iter::repeat(Dim::Fixed(1))
            .take(rank - self.rank())
            .chain(self.0.iter().cloned());
        let rhs = std::iter::repeat(Dim::Fixed(1))
            .take(rank - other.rank())
            .chain(other.0.iter().cloned());
        lhs.zip(rhs)
            .map(|(lhs, rhs)| lhs.broadcast(rhs))
            .collect::<Option<Vec<Dim>>>()
            .map(Shape)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.iter().join(", "))
    }
}

/// Element type plus shape class: the part of a tensor that decides whether a
/// compiled graph can be replayed on it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TensorSpec {
    pub dtype: DType,
    pub shape: Shape,
}

impl TensorSpec {
    pub fn new(dtype: DType, shape: Shape) -> Self {
        TensorSpec { dtype, shape }
    }

    pub fn scalar(dtype: DType) -> Self {
        TensorSpec::new(dtype, Shape::scalar())
    }

    pub fn of(tensor: &Tensor) -> Self {
        tensor.spec()
    }

    pub fn rank(&self) -> usize {
        self.shape.rank()
    }

    pub fn relaxed(&self) -> Self {
        TensorSpec::new(self.dtype, self.shape.relaxed())
    }

    pub fn is_scalar_bool(&self) -> bool {
        self.dtype == DType::Bool && self.shape.num_elements() == Some(1)
    }

    pub fn accepts(&self, other: &TensorSpec) -> bool {
        self.dtype == other.dtype && self.shape.accepts(&other.shape)
    }

    pub fn accepts_tensor(&self, tensor: &Tensor) -> bool {
        self.dtype == tensor.dtype() && self.shape.accepts_dims(tensor.shape())
    }
}

impl fmt::Display for TensorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.dtype, self.shape)
    }
}
