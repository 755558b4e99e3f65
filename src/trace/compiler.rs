use log::debug;

use super::{capture::CreationLedger, Computation, TraceArg, Tracer};
use crate::{
    config::TraceConfig,
    dispatch::ConcreteFunction,
    error::TraceError,
    signature::{ArgSpec, Signature},
    tensor::TensorSpec,
};

/// Trace `computation` once for `signature` and wrap the result.
///
/// Tensor and scalar-kind entries become placeholders, fed in signature
/// order; constant entries are handed to the computation as-is.
pub(crate) fn compile(
    name: &str,
    computation: &Computation,
    signature: &Signature,
    ledger: &CreationLedger,
    config: &TraceConfig,
) -> Result<ConcreteFunction, TraceError> {
    let (_first_trace, prior) = ledger.begin_trace();
    let tracer = Tracer::new(name, config, prior);
    let args: Vec<TraceArg> = signature
        .args()
        .iter()
        .map(|arg| match arg {
            ArgSpec::Tensor(spec) => TraceArg::Tensor(tracer.placeholder(spec.clone())),
            ArgSpec::Scalar(kind) => {
                TraceArg::Tensor(tracer.placeholder(TensorSpec::scalar(kind.dtype())))
            }
            ArgSpec::Const(value) => TraceArg::Const(value.clone()),
        })
        .collect();
    debug!("Tracing {} for signature {}", name, signature);
    let outputs = computation(&tracer, &args);
    let (graph, captures, created) = tracer.finish(outputs)?;
    ledger.commit(created);
    Ok(ConcreteFunction::new(name, signature.clone(), graph, captures))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        error::CompilationError,
        signature::{Constant, ScalarKind},
        tensor::DType,
        trace::Sym,
    };

    fn scale_by_constant(tracer: &Tracer, args: &[TraceArg]) -> Vec<Sym> {
        let x = tracer.lift(&args[0]);
        let factor = args[1].as_const().and_then(Constant::as_f64).unwrap_or(1.0);
        vec![x.scale(factor)]
    }

    #[test]
    fn constants_are_folded_into_the_graph() {
        let signature = Signature::new(vec![
            ArgSpec::Tensor(TensorSpec::scalar(DType::F32)),
            ArgSpec::Const(Constant::Float(3.0)),
        ]);
        let ledger = CreationLedger::new("scale");
        let unit = compile("scale", &scale_by_constant, &signature, &ledger, &TraceConfig::default())
            .unwrap();
        assert_eq!(unit.graph().inputs().len(), 1);
        assert_eq!(unit.graph().operation_names(), vec!["Scale(3)"]);
    }

    #[test]
    fn scalar_kinds_become_placeholders() {
        let signature = Signature::new(vec![ArgSpec::Scalar(ScalarKind::Int)]);
        let ledger = CreationLedger::new("identity");
        let unit = compile(
            "identity",
            &|tracer: &Tracer, args: &[TraceArg]| vec![tracer.lift(&args[0])],
            &signature,
            &ledger,
            &TraceConfig::default(),
        )
        .unwrap();
        assert_eq!(unit.graph().input_specs(), vec![TensorSpec::scalar(DType::I64)]);
    }

    #[test]
    fn failed_trace_reports_the_first_error() {
        let signature = Signature::new(vec![
            ArgSpec::Tensor(TensorSpec::scalar(DType::F32)),
            ArgSpec::Tensor(TensorSpec::scalar(DType::I32)),
        ]);
        let ledger = CreationLedger::new("mixed");
        let result = compile(
            "mixed",
            &|tracer: &Tracer, args: &[TraceArg]| {
                let (x, y) = (tracer.lift(&args[0]), tracer.lift(&args[1]));
                vec![&(&x + &y) * &y]
            },
            &signature,
            &ledger,
            &TraceConfig::default(),
        );
        assert!(matches!(
            result,
            Err(TraceError::Compilation(CompilationError::DTypeMismatch { .. }))
        ));
        assert!(ledger.snapshot().is_none());
    }
}
