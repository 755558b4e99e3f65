pub use crate::{
    args,
    backend::Backend,
    config::{ConstantPolicy, TraceConfig},
    dispatch::{CacheStats, ConcreteFunction, DispatchCache, Function},
    error::{CaptureError, CompilationError, ExecutionError, SignatureError, TraceError},
    graph::Graph,
    signature::{Arg, ArgSpec, Constant, Signature, SignatureExtractor},
    tensor::{DType, Dim, Shape, Tensor, TensorSpec, Variable},
    trace::{Pred, Sym, TraceArg, Tracer},
};

#[cfg(feature = "native")]
pub use crate::{backend::native::NativeBackend, dispatch::function};
