use thiserror::Error;

use crate::{
    graph::NodeId,
    tensor::{DType, Shape, TensorSpec, VariableId},
};

/// The argument list of an invocation could not be turned into a signature.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignatureError {
    #[error("Argument {index} is a NaN constant, which cannot key a signature")]
    NanConstant { index: usize },
    #[error("Argument {index} has rank {rank}, above the supported maximum of {max}")]
    RankTooLarge { index: usize, rank: usize, max: usize },
    #[error("Input signature declares {expected} arguments, received {received}")]
    ArityMismatch { expected: usize, received: usize },
    #[error("Argument {index} ({found}) does not match declared spec {declared}")]
    IncompatibleArgument {
        index: usize,
        declared: TensorSpec,
        found: TensorSpec,
    },
    #[error("Argument {index} must be a tensor to match declared spec {declared}")]
    ExpectedTensor { index: usize, declared: TensorSpec },
}

/// The computation could not be expressed as a graph.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompilationError {
    #[error("Operation {op} received mismatched element types {lhs} and {rhs}")]
    DTypeMismatch { op: String, lhs: DType, rhs: DType },
    #[error("Operation {op} does not support element type {dtype}")]
    UnsupportedDType { op: String, dtype: DType },
    #[error("Operation {op} received incompatible shapes {lhs} and {rhs}")]
    IncompatibleShapes { op: String, lhs: Shape, rhs: Shape },
    #[error("Operation {op} expected {expected} inputs, received {received}")]
    Arity {
        op: String,
        expected: usize,
        received: usize,
    },
    #[error("Operation {op} received invalid input: {reason}")]
    InvalidInput { op: String, reason: String },
    #[error("Condition must be a scalar bool, found {found}")]
    InvalidPredicate { found: TensorSpec },
    #[error("{construct} structure mismatch: {reason}")]
    StructureMismatch {
        construct: &'static str,
        reason: String,
    },
    #[error("Value {node} was used outside the block that defines it")]
    ScopeEscape { node: NodeId },
    #[error("A value recorded by another trace was used in this trace")]
    ForeignValue,
    #[error("Loop was unrolled more than {limit} times while tracing")]
    UnrollLimit { limit: usize },
    #[error("Computation {name} returned no outputs")]
    NoOutputs { name: String },
}

/// A retrace observed different captured state than the first trace.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    #[error("Trace of {function} created {found} variables, the first trace created {expected}")]
    CreationCountMismatch {
        function: String,
        expected: usize,
        found: usize,
    },
    #[error("Variable #{ordinal} of {function} was created as {found}, first created as {expected}")]
    CreationSpecMismatch {
        function: String,
        ordinal: usize,
        expected: TensorSpec,
        found: TensorSpec,
    },
}

/// The backend failed while running a compiled unit.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Operation {op} received incompatible runtime shapes {lhs:?} and {rhs:?}")]
    ShapeMismatch {
        op: String,
        lhs: Vec<usize>,
        rhs: Vec<usize>,
    },
    #[error("Operation {op} received mismatched element types {lhs} and {rhs}")]
    DTypeMismatch { op: String, lhs: DType, rhs: DType },
    #[error("Operation {op} cannot run on element type {dtype}")]
    UnsupportedDType { op: String, dtype: DType },
    #[error("Operation {op} expected {expected} inputs, received {received}")]
    Arity {
        op: String,
        expected: usize,
        received: usize,
    },
    #[error("Integer division by zero in {op}")]
    DivisionByZero { op: String },
    #[error("Expected {expected} inputs, received {received}")]
    InputCount { expected: usize, received: usize },
    #[error("Input {index} ({found}) does not match traced spec {expected}")]
    InputMismatch {
        index: usize,
        expected: String,
        found: String,
    },
    #[error("Variable {id} holds {expected}, cannot assign {found}")]
    AssignMismatch {
        id: VariableId,
        expected: TensorSpec,
        found: TensorSpec,
    },
    #[error("Graph refers to capture {index}, only {available} were provided")]
    MissingCapture { index: usize, available: usize },
    #[error("Value {node} was read before it was computed")]
    MissingValue { node: NodeId },
    #[error("Condition evaluated to {found}, expected a scalar bool")]
    InvalidPredicate { found: TensorSpec },
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
}

/// Everything an invocation of a traced function can report.
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("Signature extraction failed: {0}")]
    Signature(#[from] SignatureError),
    #[error("Compilation failed: {0}")]
    Compilation(#[from] CompilationError),
    #[error("Capture inconsistency: {0}")]
    CaptureInconsistency(#[from] CaptureError),
    #[error("Execution failed: {0}")]
    Execution(#[from] ExecutionError),
}
