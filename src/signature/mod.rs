//! Signature extraction: the key that decides whether a compiled unit can be reused.
//!
//! A signature is a pure function of the argument list. Tensors contribute their
//! element type and shape class, never their contents. Plain values contribute
//! either their literal value or only their kind, depending on the
//! [`ConstantPolicy`].

use std::{
    fmt,
    hash::{Hash, Hasher},
};

use itertools::Itertools;

use crate::{
    config::{ConstantPolicy, TraceConfig},
    error::SignatureError,
    tensor::{DType, Tensor, TensorSpec},
};

/// Highest tensor rank a signature will describe.
pub const MAX_RANK: usize = 8;

/// Plain (non-tensor) argument value.
#[derive(Clone, Debug)]
pub enum Constant {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// Kind of a plain value, used when constants are keyed by type only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Bool,
    Int,
    Float,
}

impl ScalarKind {
    pub fn dtype(self) -> DType {
        match self {
            ScalarKind::Bool => DType::Bool,
            ScalarKind::Int => DType::I64,
            ScalarKind::Float => DType::F64,
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarKind::Bool => f.write_str("bool"),
            ScalarKind::Int => f.write_str("int"),
            ScalarKind::Float => f.write_str("float"),
        }
    }
}

impl Constant {
    pub fn kind(&self) -> Option<ScalarKind> {
        match self {
            Constant::Bool(_) => Some(ScalarKind::Bool),
            Constant::Int(_) => Some(ScalarKind::Int),
            Constant::Float(_) => Some(ScalarKind::Float),
            Constant::Str(_) => None,
        }
    }

    pub fn is_nan(&self) -> bool {
        matches!(self, Constant::Float(value) if value.is_nan())
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Constant::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Constant::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Constant::Int(value) => Some(*value as f64),
            Constant::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Constant::Str(value) => Some(value),
            _ => None,
        }
    }

    /// Rank-0 tensor holding this value; strings have no tensor form.
    pub fn to_tensor(&self) -> Option<Tensor> {
        match self {
            Constant::Bool(value) => Some(Tensor::scalar(*value)),
            Constant::Int(value) => Some(Tensor::scalar(*value)),
            Constant::Float(value) => Some(Tensor::scalar(*value)),
            Constant::Str(_) => None,
        }
    }
}

// Floats compare by bit pattern so the equality and hash contracts agree.
impl PartialEq for Constant {
    fn eq(&self, other: &Constant) -> bool {
        match (self, other) {
            (Constant::Bool(lhs), Constant::Bool(rhs)) => lhs == rhs,
            (Constant::Int(lhs), Constant::Int(rhs)) => lhs == rhs,
            (Constant::Float(lhs), Constant::Float(rhs)) => lhs.to_bits() == rhs.to_bits(),
            (Constant::Str(lhs), Constant::Str(rhs)) => lhs == rhs,
            _ => false,
        }
    }
}

impl Eq for Constant {}

impl Hash for Constant {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Constant::Bool(value) => value.hash(state),
            Constant::Int(value) => value.hash(state),
            Constant::Float(value) => value.to_bits().hash(state),
            Constant::Str(value) => value.hash(state),
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Bool(value) => write!(f, "{}", value),
            Constant::Int(value) => write!(f, "{}", value),
            Constant::Float(value) => write!(f, "{:?}", value),
            Constant::Str(value) => write!(f, "{:?}", value),
        }
    }
}

impl From<bool> for Constant {
    fn from(value: bool) -> Self {
        Constant::Bool(value)
    }
}

impl From<i32> for Constant {
    fn from(value: i32) -> Self {
        Constant::Int(value as i64)
    }
}

impl From<i64> for Constant {
    fn from(value: i64) -> Self {
        Constant::Int(value)
    }
}

impl From<f32> for Constant {
    fn from(value: f32) -> Self {
        Constant::Float(value as f64)
    }
}

impl From<f64> for Constant {
    fn from(value: f64) -> Self {
        Constant::Float(value)
    }
}

impl From<&str> for Constant {
    fn from(value: &str) -> Self {
        Constant::Str(value.to_string())
    }
}

impl From<String> for Constant {
    fn from(value: String) -> Self {
        Constant::Str(value)
    }
}

/// One argument of an invocation.
#[derive(Clone, Debug, PartialEq)]
pub enum Arg {
    Tensor(Tensor),
    Const(Constant),
}

impl Arg {
    pub fn constant<C: Into<Constant>>(value: C) -> Self {
        Arg::Const(value.into())
    }
}

impl From<Tensor> for Arg {
    fn from(tensor: Tensor) -> Self {
        Arg::Tensor(tensor)
    }
}

impl From<Constant> for Arg {
    fn from(constant: Constant) -> Self {
        Arg::Const(constant)
    }
}

// Plain Rust values are constants; tensors must be wrapped in `Tensor`.
macro_rules! impl_constant_arg {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Arg {
                fn from(value: $ty) -> Self {
                    Arg::Const(Constant::from(value))
                }
            }
        )*
    };
}

impl_constant_arg!(bool, i32, i64, f32, f64, &str, String);

/// Signature entry for one argument.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ArgSpec {
    /// Fed at run time; replayable for any tensor the spec accepts.
    Tensor(TensorSpec),
    /// Baked into the graph; a different value is a different signature.
    Const(Constant),
    /// Plain value keyed by kind; fed at run time as a rank-0 tensor.
    Scalar(ScalarKind),
}

impl ArgSpec {
    /// Spec of the tensor fed for this argument, if it is fed at all.
    pub fn feed_spec(&self) -> Option<TensorSpec> {
        match self {
            ArgSpec::Tensor(spec) => Some(spec.clone()),
            ArgSpec::Scalar(kind) => Some(TensorSpec::scalar(kind.dtype())),
            ArgSpec::Const(_) => None,
        }
    }
}

impl fmt::Display for ArgSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgSpec::Tensor(spec) => write!(f, "{}", spec),
            ArgSpec::Const(value) => write!(f, "={}", value),
            ArgSpec::Scalar(kind) => write!(f, "{}", kind),
        }
    }
}

/// Ordered description of an argument list. Equal signatures are guaranteed
/// replayable by the same compiled unit.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Signature {
    args: Vec<ArgSpec>,
}

impl Signature {
    pub fn new(args: Vec<ArgSpec>) -> Self {
        Signature { args }
    }

    pub fn args(&self) -> &[ArgSpec] {
        &self.args
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn feed_specs(&self) -> Vec<TensorSpec> {
        self.args.iter().filter_map(ArgSpec::feed_spec).collect()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.args.iter().join(", "))
    }
}

/// Derives a [`Signature`] from concrete arguments.
#[derive(Clone, Debug)]
pub struct SignatureExtractor {
    policy: ConstantPolicy,
    relax_shapes: bool,
    input_signature: Option<Vec<TensorSpec>>,
}

impl SignatureExtractor {
    pub fn new(config: &TraceConfig) -> Self {
        SignatureExtractor {
            policy: config.constant_policy(),
            relax_shapes: config.relax_shapes(),
            input_signature: None,
        }
    }

    /// Pin the signature: every call must pass tensors compatible with `specs`,
    /// and all of them share one compiled unit.
    pub fn with_input_signature(mut self, specs: Vec<TensorSpec>) -> Self {
        self.input_signature = Some(specs);
        self
    }

    pub fn input_signature(&self) -> Option<&[TensorSpec]> {
        self.input_signature.as_deref()
    }

    pub fn extract(&self, args: &[Arg]) -> Result<Signature, SignatureError> {
        match &self.input_signature {
            Some(declared) => self.match_declared(declared, args),
            None => args
                .iter()
                .enumerate()
                .map(|(index, arg)| self.describe(index, arg))
                .collect::<Result<Vec<ArgSpec>, SignatureError>>()
                .map(Signature::new),
        }
    }

    fn describe(&self, index: usize, arg: &Arg) -> Result<ArgSpec, SignatureError> {
        match arg {
            Arg::Tensor(tensor) => {
                check_rank(index, tensor)?;
                let spec = tensor.spec();
                Ok(ArgSpec::Tensor(if self.relax_shapes {
                    spec.relaxed()
                } else {
                    spec
                }))
            }
            Arg::Const(constant) => {
                if constant.is_nan() {
                    return Err(SignatureError::NanConstant { index });
                }
                match (self.policy, constant.kind()) {
                    (ConstantPolicy::ByType, Some(kind)) => Ok(ArgSpec::Scalar(kind)),
                    _ => Ok(ArgSpec::Const(constant.clone())),
                }
            }
        }
    }

    fn match_declared(
        &self,
        declared: &[TensorSpec],
        args: &[Arg],
    ) -> Result<Signature, SignatureError> {
        if declared.len() != args.len() {
            return Err(SignatureError::ArityMismatch {
                expected: declared.len(),
                received: args.len(),
            });
        }
        declared
            .iter()
            .zip(args.iter())
            .enumerate()
            .map(|(index, (spec, arg))| match arg {
                Arg::Tensor(tensor) => {
                    check_rank(index, tensor)?;
                    if spec.accepts_tensor(tensor) {
                        Ok(ArgSpec::Tensor(spec.clone()))
                    } else {
                        Err(SignatureError::IncompatibleArgument {
                            index,
                            declared: spec.clone(),
                            found: tensor.spec(),
                        })
                    }
                }
                Arg::Const(_) => Err(SignatureError::ExpectedTensor {
                    index,
                    declared: spec.clone(),
                }),
            })
            .collect::<Result<Vec<ArgSpec>, SignatureError>>()
            .map(Signature::new)
    }
}

fn check_rank(index: usize, tensor: &Tensor) -> Result<(), SignatureError> {
    if tensor.rank() > MAX_RANK {
        Err(SignatureError::RankTooLarge {
            index,
            rank: tensor.rank(),
            max: MAX_RANK,
        })
    } else {
        Ok(())
    }
}
