use std::{
    cell::{Cell, RefCell},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use crate::{
    prelude::*,
    utility::{filled_tensor, ones, random_initialize, zeros},
};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn input(args: &[TraceArg], index: usize) -> Sym {
    args[index].as_sym().cloned().unwrap()
}

#[test]
fn retrace_only_on_new_signature() {
    init();
    let traces = Arc::new(AtomicUsize::new(0));
    let counter = traces.clone();
    let add_twice = Function::new("add_twice", move |_tracer, args| {
        counter.fetch_add(1, Ordering::SeqCst);
        let x = input(args, 0);
        vec![&x + &x]
    });
    let out = add_twice.call(&args![Tensor::from(1.5_f32)]).unwrap();
    assert_eq!(out[0].to_scalar::<f32>(), Some(3.0));
    let out = add_twice.call(&args![Tensor::from(2_i32)]).unwrap();
    assert_eq!(out[0].to_scalar::<i32>(), Some(4));
    let out = add_twice.call(&args![Tensor::from(4.0_f32)]).unwrap();
    assert_eq!(out[0].to_scalar::<f32>(), Some(8.0));

    assert_eq!(traces.load(Ordering::SeqCst), 2);
    assert_eq!(add_twice.trace_count(), 2);
    assert_eq!(add_twice.call_count(), 3);
    assert_eq!(add_twice.cache_stats().hits, 1);
    assert_eq!(add_twice.cached_signatures().len(), 2);
}

#[test]
fn shape_and_rank_split_signatures() {
    init();
    let total = function("total", |tracer, args| vec![tracer.lift(&args[0]).sum()]);
    for values in [vec![1_f64, 2.], vec![3_f64, 4.], vec![1_f64, 2., 3.]].iter() {
        total.call(&args![Tensor::from(values.clone())]).unwrap();
    }
    let matrix = filled_tensor(&[1, 2], &[1_f64, 2.]).unwrap();
    let out = total.call(&args![matrix]).unwrap();
    assert_eq!(out[0].to_scalar::<f64>(), Some(3.0));
    assert_eq!(total.trace_count(), 3);
    assert_eq!(total.call_count(), 4);
}

#[test]
fn data_dependent_conditional_selects_at_run_time() {
    init();
    let branch_traces = Arc::new(AtomicUsize::new(0));
    let counter = branch_traces.clone();
    let relu = Function::new("relu", move |tracer, args| {
        let x = input(args, 0);
        let zero = tracer.scalar(0.0, x.dtype());
        let (on_then, on_else) = (counter.clone(), counter.clone());
        tracer.cond(
            x.gt(&zero),
            |_| {
                on_then.fetch_add(1, Ordering::SeqCst);
                vec![x.clone()]
            },
            |_| {
                on_else.fetch_add(1, Ordering::SeqCst);
                vec![zero.clone()]
            },
        )
    });
    let negative = relu.call(&args![Tensor::from(-2.0_f64)]).unwrap();
    let positive = relu.call(&args![Tensor::from(3.0_f64)]).unwrap();
    assert_eq!(negative[0].to_scalar::<f64>(), Some(0.0));
    assert_eq!(positive[0].to_scalar::<f64>(), Some(3.0));
    assert_eq!(relu.trace_count(), 1);
    assert_eq!(branch_traces.load(Ordering::SeqCst), 2);
}

#[test]
fn constant_conditional_records_only_the_taken_branch() {
    init();
    let untaken = Arc::new(AtomicUsize::new(0));
    let counter = untaken.clone();
    let maybe_double = Function::new("maybe_double", move |tracer, args| {
        let x = input(args, 0);
        let double = args[1].as_const().and_then(Constant::as_bool).unwrap_or(false);
        let counter = counter.clone();
        tracer.cond(
            double,
            |_| vec![x.scale(2.0)],
            |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                vec![-&x]
            },
        )
    });
    let args = args![Tensor::from(3_f32), true];
    assert_eq!(maybe_double.call(&args).unwrap()[0].to_scalar::<f32>(), Some(6.0));
    assert_eq!(maybe_double.call(&args).unwrap()[0].to_scalar::<f32>(), Some(6.0));
    assert_eq!(untaken.load(Ordering::SeqCst), 0);
    let unit = maybe_double.concrete_function(&args).unwrap();
    assert_eq!(unit.graph().operation_names(), vec!["Scale(2)"]);
    assert!(!unit.graph().has_control_flow());

    let negated = maybe_double
        .call(&args![Tensor::from(3_f32), false])
        .unwrap();
    assert_eq!(negated[0].to_scalar::<f32>(), Some(-3.0));
    assert_eq!(untaken.load(Ordering::SeqCst), 1);
    assert_eq!(maybe_double.trace_count(), 2);
}

#[test]
fn concurrent_first_calls_trace_once() {
    init();
    let traces = Arc::new(AtomicUsize::new(0));
    let counter = traces.clone();
    let square = Function::new("slow_square", move |_tracer, args| {
        counter.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(20));
        let x = input(args, 0);
        vec![&x * &x]
    });
    crossbeam_utils::thread::scope(|scope| {
        for value in 0..8 {
            let square = &square;
            scope.spawn(move |_| {
                let out = square.call(&args![Tensor::from(value as f32)]).unwrap();
                assert_eq!(out[0].to_scalar::<f32>(), Some((value * value) as f32));
            });
        }
    })
    .unwrap();
    assert_eq!(traces.load(Ordering::SeqCst), 1);
    assert_eq!(square.cache_stats().compilations, 1);
    assert_eq!(square.cache_stats().hits, 7);
    assert_eq!(square.call_count(), 8);
}

#[test]
fn constants_key_by_value() {
    init();
    let power = Function::new("power", |_tracer, args| {
        let x = input(args, 0);
        let exponent = args[1].as_const().and_then(Constant::as_i64).unwrap_or(1);
        let mut result = x.clone();
        for _ in 1..exponent {
            result = &result * &x;
        }
        vec![result]
    });
    let cube = power.call(&args![Tensor::from(2_f64), 3]).unwrap();
    let square = power.call(&args![Tensor::from(2_f64), 2]).unwrap();
    let cube_again = power.call(&args![Tensor::from(5_f64), 3]).unwrap();
    assert_eq!(cube[0].to_scalar::<f64>(), Some(8.0));
    assert_eq!(square[0].to_scalar::<f64>(), Some(4.0));
    assert_eq!(cube_again[0].to_scalar::<f64>(), Some(125.0));
    assert_eq!(power.trace_count(), 2);
}

#[test]
fn constants_key_by_type_when_configured() {
    init();
    let scaled = Function::new("scaled", |tracer, args| {
        let x = input(args, 0);
        let factor = tracer.lift(&args[1]).cast(x.dtype());
        vec![&x * &factor]
    })
    .with_config(TraceConfig::new().with_constant_policy(ConstantPolicy::ByType));
    let values = Tensor::from(vec![1_f32, 2.]);
    let triple = scaled.call(&args![values.clone(), 3]).unwrap();
    let quadruple = scaled.call(&args![values.clone(), 4]).unwrap();
    assert_eq!(triple[0].to_vec::<f32>().unwrap(), vec![3., 6.]);
    assert_eq!(quadruple[0].to_vec::<f32>().unwrap(), vec![4., 8.]);
    assert_eq!(scaled.trace_count(), 1);

    let fractional = scaled.call(&args![values, 2.5]).unwrap();
    assert_eq!(fractional[0].to_vec::<f32>().unwrap(), vec![2.5, 5.]);
    assert_eq!(scaled.trace_count(), 2);
}

#[test]
fn nan_constants_are_rejected() {
    init();
    let f = Function::new("nan", |_tracer, args| vec![input(args, 0)]);
    let result = f.call(&args![Tensor::from(1_f32), f64::NAN]);
    assert!(matches!(
        result,
        Err(TraceError::Signature(SignatureError::NanConstant { index: 1 }))
    ));
    assert_eq!(f.trace_count(), 0);
}

#[test]
fn declared_input_signature_shares_one_trace() {
    init();
    let total = Function::new("total", |_tracer, args| vec![input(args, 0).sum()])
        .with_input_signature(vec![TensorSpec::new(
            DType::F64,
            Shape::new(vec![Dim::Dynamic]),
        )]);
    let short = total.call(&args![Tensor::from(vec![1_f64, 2., 3.])]).unwrap();
    let long = total
        .call(&args![Tensor::from(vec![1_f64, 2., 3., 4., 5.])])
        .unwrap();
    assert_eq!(short[0].to_scalar::<f64>(), Some(6.0));
    assert_eq!(long[0].to_scalar::<f64>(), Some(15.0));
    assert_eq!(total.trace_count(), 1);

    let matrix = filled_tensor(&[1, 2], &[1_f64, 2.]).unwrap();
    assert!(matches!(
        total.call(&args![matrix]),
        Err(TraceError::Signature(SignatureError::IncompatibleArgument { index: 0, .. }))
    ));
    assert!(matches!(
        total.call(&args![Tensor::from(vec![1_f32])]),
        Err(TraceError::Signature(SignatureError::IncompatibleArgument { .. }))
    ));
    assert!(matches!(
        total.call(&args![1.0]),
        Err(TraceError::Signature(SignatureError::ExpectedTensor { .. }))
    ));
    assert_eq!(total.trace_count(), 1);
}

#[test]
fn relaxed_shapes_share_one_trace_per_rank() {
    init();
    let norm = Function::new("norm", |_tracer, args| {
        let x = input(args, 0);
        vec![(&x * &x).sum().sqrt()]
    })
    .with_config(TraceConfig::new().with_relaxed_shapes());
    let five = norm.call(&args![Tensor::from(vec![3_f32, 4.])]).unwrap();
    let three = norm.call(&args![Tensor::from(vec![1_f32, 2., 2.])]).unwrap();
    assert_eq!(five[0].to_scalar::<f32>(), Some(5.0));
    assert_eq!(three[0].to_scalar::<f32>(), Some(3.0));
    assert_eq!(norm.trace_count(), 1);

    norm.call(&args![filled_tensor(&[1, 2], &[3_f32, 4.]).unwrap()])
        .unwrap();
    assert_eq!(norm.trace_count(), 2);
}

#[test]
fn graph_effects_run_per_call_and_trace_effects_per_trace() {
    init();
    let seen = Arc::new(Mutex::new(vec![]));
    let traces = Arc::new(AtomicUsize::new(0));
    let (sink, counter) = (seen.clone(), traces.clone());
    let observe = Function::new("observe", move |tracer, args| {
        counter.fetch_add(1, Ordering::SeqCst);
        let x = input(args, 0);
        let sink = sink.clone();
        tracer.inspect("x", &x, move |_, value| {
            sink.lock()
                .unwrap()
                .push(value.to_scalar::<f32>().unwrap_or(f32::NAN));
        });
        tracer.print("x", &x);
        vec![&x + &x]
    });
    for value in 1..4 {
        observe.call(&args![Tensor::from(value as f32)]).unwrap();
    }
    assert_eq!(*seen.lock().unwrap(), vec![1.0, 2.0, 3.0]);
    assert_eq!(traces.load(Ordering::SeqCst), 1);
}

#[test]
fn effects_in_an_untaken_branch_do_not_fire() {
    init();
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();
    let report = Function::new("report_positive", move |tracer, args| {
        let x = input(args, 0);
        let zero = tracer.scalar(0.0, DType::I32);
        let counter = counter.clone();
        tracer.cond(
            x.gt(&zero),
            |tracer| {
                tracer.inspect("positive", &x, move |_, _| {
                    counter.fetch_add(1, Ordering::SeqCst);
                });
                vec![]
            },
            |_| vec![],
        );
        vec![x]
    });
    report.call(&args![Tensor::from(1_i32)]).unwrap();
    report.call(&args![Tensor::from(-1_i32)]).unwrap();
    report.call(&args![Tensor::from(5_i32)]).unwrap();
    assert_eq!(fired.load(Ordering::SeqCst), 2);
    assert_eq!(report.trace_count(), 1);
}

#[test]
fn variables_are_captured_by_reference() {
    init();
    let weight = Variable::new(Tensor::from(vec![1_f32, 2.]));
    let captured = weight.clone();
    let weighted = Function::new("weighted", move |tracer, args| {
        let x = input(args, 0);
        vec![&x * &tracer.read_variable(&captured)]
    });
    let args = args![Tensor::from(vec![1_f32, 1.])];
    assert_eq!(weighted.call(&args).unwrap()[0].to_vec::<f32>().unwrap(), vec![1., 2.]);
    weight.assign(Tensor::from(vec![3_f32, 4.])).unwrap();
    assert_eq!(weighted.call(&args).unwrap()[0].to_vec::<f32>().unwrap(), vec![3., 4.]);
    assert_eq!(weighted.trace_count(), 1);
    assert_eq!(weighted.concrete_function(&args).unwrap().captures(), &[weight]);
}

#[test]
fn assignments_run_on_every_call() {
    init();
    let calls = Variable::new(Tensor::from(0_i64));
    let captured = calls.clone();
    let count_calls = Function::new("count_calls", move |tracer, _args| {
        let one = tracer.scalar(1.0, DType::I64);
        vec![tracer.assign_add(&captured, &one)]
    });
    let mut last = None;
    for _ in 0..3 {
        last = count_calls.call(&[]).unwrap()[0].to_scalar::<i64>();
    }
    assert_eq!(last, Some(3));
    assert_eq!(calls.read().to_scalar::<i64>(), Some(3));
    assert_eq!(count_calls.trace_count(), 1);
}

#[test]
fn retraces_reuse_created_variables() {
    init();
    let accumulate = Function::new("accumulate", |tracer, args| {
        let x = input(args, 0);
        let total = tracer.create_variable(Tensor::from(0_f64));
        vec![tracer.assign_add(&total, &x.sum())]
    });
    let first_args = args![Tensor::from(vec![1_f64, 2.])];
    let second_args = args![Tensor::from(vec![1_f64, 2., 3.])];
    let first = accumulate.call(&first_args).unwrap();
    let second = accumulate.call(&second_args).unwrap();
    assert_eq!(first[0].to_scalar::<f64>(), Some(3.0));
    assert_eq!(second[0].to_scalar::<f64>(), Some(9.0));
    assert_eq!(accumulate.trace_count(), 2);

    let first_unit = accumulate.concrete_function(&first_args).unwrap();
    let second_unit = accumulate.concrete_function(&second_args).unwrap();
    assert_eq!(first_unit.captures(), second_unit.captures());
}

#[test]
fn retrace_creating_other_variables_fails() {
    init();
    let grows = Function::new("grows", |tracer, args| {
        let x = input(args, 0);
        let mut out = x.clone();
        for _ in 0..x.shape().num_elements().unwrap_or(0) {
            let offset = tracer.create_variable(Tensor::from(1_f32));
            out = &out + &tracer.read_variable(&offset);
        }
        vec![out]
    });
    let one = args![Tensor::from(vec![0_f32])];
    assert_eq!(grows.call(&one).unwrap()[0].to_vec::<f32>().unwrap(), vec![1.]);
    let result = grows.call(&args![Tensor::from(vec![0_f32, 0.])]);
    assert!(matches!(
        result,
        Err(TraceError::CaptureInconsistency(CaptureError::CreationCountMismatch {
            expected: 1,
            found: 2,
            ..
        }))
    ));
    assert!(grows.call(&one).is_ok());
    assert_eq!(grows.cache_stats().failed_compilations, 1);
}

#[test]
fn reset_keeps_created_variables() {
    init();
    let offset = Function::new("offset", |tracer, args| {
        let x = input(args, 0);
        let base = tracer.create_variable(Tensor::from(10_i32));
        vec![&x + &tracer.read_variable(&base)]
    });
    let args = args![Tensor::from(1_i32)];
    let before = offset.concrete_function(&args).unwrap();
    assert_eq!(offset.call(&args).unwrap()[0].to_scalar::<i32>(), Some(11));
    offset.reset();
    assert!(offset.cached_signatures().is_empty());
    let after = offset.concrete_function(&args).unwrap();
    assert_eq!(offset.trace_count(), 2);
    assert_ne!(before.id(), after.id());
    assert_eq!(before.captures(), after.captures());
}

#[test]
fn bounded_cache_evicts_least_recently_used() {
    init();
    let identity = Function::new("identity", |_tracer, args| vec![input(args, 0)])
        .with_config(TraceConfig::new().with_max_cache_entries(2));
    identity.call(&args![Tensor::from(1_f32)]).unwrap();
    identity.call(&args![Tensor::from(1_i32)]).unwrap();
    identity.call(&args![Tensor::from(1_f64)]).unwrap();
    assert_eq!(identity.cached_signatures().len(), 2);
    assert_eq!(identity.cache_stats().evictions, 1);
    identity.call(&args![Tensor::from(1_f32)]).unwrap();
    assert_eq!(identity.trace_count(), 4);
}

#[test]
fn execution_errors_do_not_poison_the_cache() {
    init();
    let ratio = Function::new("ratio", |_tracer, args| {
        vec![&input(args, 0) / &input(args, 1)]
    });
    let out = ratio
        .call(&args![Tensor::from(6_i32), Tensor::from(3_i32)])
        .unwrap();
    assert_eq!(out[0].to_scalar::<i32>(), Some(2));
    let result = ratio.call(&args![Tensor::from(1_i32), Tensor::from(0_i32)]);
    assert!(matches!(
        result,
        Err(TraceError::Execution(ExecutionError::DivisionByZero { .. }))
    ));
    assert_eq!(ratio.cache_stats().compilations, 1);
    assert_eq!(ratio.cache_stats().hits, 1);
}

#[test]
fn traced_loop_is_lowered() {
    init();
    let collatz = Function::new("collatz", |tracer, args| {
        let n = input(args, 0);
        let zero = tracer.scalar(0.0, DType::I64);
        let one = tracer.scalar(1.0, DType::I64);
        let two = tracer.scalar(2.0, DType::I64);
        let three = tracer.scalar(3.0, DType::I64);
        tracer.while_loop(
            vec![n, zero.clone()],
            |_, state| state[0].gt(&one).into(),
            |tracer, state| {
                let even = (&state[0] % &two).equal(&zero);
                let halved = &state[0] / &two;
                let tripled = &(&state[0] * &three) + &one;
                vec![tracer.select(&even, &halved, &tripled), &state[1] + &one]
            },
        )
    });
    let steps = |start: i64| {
        collatz.call(&args![Tensor::from(start)]).unwrap()[1].to_scalar::<i64>()
    };
    assert_eq!(steps(6), Some(8));
    assert_eq!(steps(27), Some(111));
    assert_eq!(steps(1), Some(0));
    assert_eq!(collatz.trace_count(), 1);
    let unit = collatz.concrete_function(&args![Tensor::from(1_i64)]).unwrap();
    assert!(unit.graph().has_control_flow());
}

#[test]
fn constant_loop_is_unrolled() {
    init();
    let repeat_double = Function::new("repeat_double", |tracer, args| {
        let x = input(args, 0);
        let remaining = Cell::new(args[1].as_const().and_then(Constant::as_i64).unwrap_or(0));
        tracer.while_loop(
            vec![x],
            |_, _| Pred::Const(remaining.get() > 0),
            |_, state| {
                remaining.set(remaining.get() - 1);
                vec![&state[0] + &state[0]]
            },
        )
    });
    let args = args![Tensor::from(1_f32), 3];
    assert_eq!(repeat_double.call(&args).unwrap()[0].to_scalar::<f32>(), Some(8.0));
    let unit = repeat_double.concrete_function(&args).unwrap();
    assert_eq!(unit.graph().count_ops("Add"), 3);
    assert!(!unit.graph().has_control_flow());

    let limited = Function::new("limited", |tracer, args| {
        tracer.while_loop(vec![input(args, 0)], |_, _| Pred::Const(true), |_, state| {
            vec![state[0].clone()]
        })
    })
    .with_config(TraceConfig::new().with_max_unroll_iterations(2));
    assert!(matches!(
        limited.call(&args![Tensor::from(1_f32)]),
        Err(TraceError::Compilation(CompilationError::UnrollLimit { limit: 2 }))
    ));
}

#[test]
fn loop_carried_shapes_are_widened() {
    init();
    let grow = Function::new("grow", |tracer, args| {
        let step = tracer.constant(Tensor::from(vec![1_f32, 2., 3.]));
        let limit = tracer.scalar(10.0, DType::F32);
        tracer.while_loop(
            vec![input(args, 0)],
            |_, state| state[0].sum().lt(&limit).into(),
            |_, state| vec![&state[0] + &step],
        )
    });
    let out = grow.call(&args![Tensor::from(vec![0_f32])]).unwrap();
    assert_eq!(out[0].to_vec::<f32>().unwrap(), vec![2., 4., 6.]);
    let unit = grow.concrete_function(&args![Tensor::from(vec![0_f32])]).unwrap();
    assert_eq!(unit.output_specs()[0].to_string(), "f32[?]");
}

#[test]
fn branch_results_must_agree() {
    init();
    let mismatched = Function::new("mismatched", |tracer, args| {
        let x = input(args, 0);
        let zero = tracer.scalar(0.0, DType::F32);
        tracer.cond(
            x.gt(&zero),
            |_| vec![x.clone()],
            |_| vec![x.cast(DType::I32)],
        )
    });
    assert!(matches!(
        mismatched.call(&args![Tensor::from(1_f32)]),
        Err(TraceError::Compilation(CompilationError::StructureMismatch {
            construct: "cond",
            ..
        }))
    ));

    let not_bool = Function::new("not_bool", |tracer, args| {
        let x = input(args, 0);
        tracer.cond(&x, |_| vec![x.clone()], |_| vec![x.clone()])
    });
    assert!(matches!(
        not_bool.call(&args![Tensor::from(1_f32)]),
        Err(TraceError::Compilation(CompilationError::InvalidPredicate { .. }))
    ));
}

#[test]
fn values_cannot_escape_their_block() {
    init();
    let leaky = Function::new("leaky", |tracer, args| {
        let x = input(args, 0);
        let zero = tracer.scalar(0.0, DType::F32);
        let leaked = RefCell::new(None);
        tracer.cond(
            x.gt(&zero),
            |_| {
                let doubled = &x + &x;
                *leaked.borrow_mut() = Some(doubled.clone());
                vec![doubled]
            },
            |_| vec![x.clone()],
        );
        let escaped = leaked.borrow().clone().unwrap();
        vec![&escaped * &x]
    });
    assert!(matches!(
        leaky.call(&args![Tensor::from(2_f32)]),
        Err(TraceError::Compilation(CompilationError::ScopeEscape { .. }))
    ));
}

#[test]
fn values_from_another_trace_are_rejected() {
    init();
    let foreign = Function::new("foreign", |_tracer, args| {
        let other = Tracer::new("other", &TraceConfig::default(), None);
        let stranger = other.placeholder(TensorSpec::scalar(DType::F32));
        vec![&input(args, 0) + &stranger]
    });
    assert!(matches!(
        foreign.call(&args![Tensor::from(2_f32)]),
        Err(TraceError::Compilation(CompilationError::ForeignValue))
    ));
}

#[test]
fn mismatched_assignment_fails_to_trace() {
    init();
    let state = Variable::new(Tensor::from(vec![0_f32, 0.]));
    let captured = state.clone();
    let overwrite = Function::new("overwrite", move |tracer, args| {
        vec![tracer.assign(&captured, &input(args, 0))]
    });
    assert!(matches!(
        overwrite.call(&args![Tensor::from(vec![1_f32, 2., 3.])]),
        Err(TraceError::Compilation(CompilationError::InvalidInput { .. }))
    ));
    assert_eq!(overwrite.cache_stats().compilations, 0);
    assert!(overwrite.cached_signatures().is_empty());

    let captured = state.clone();
    let relaxed = Function::new("overwrite_relaxed", move |tracer, args| {
        vec![tracer.assign(&captured, &input(args, 0))]
    })
    .with_config(TraceConfig::new().with_relaxed_shapes());
    relaxed.call(&args![Tensor::from(vec![1_f32, 2.])]).unwrap();
    assert_eq!(state.read().to_vec::<f32>().unwrap(), vec![1., 2.]);
}

#[test]
fn loop_closures_run_once_per_evaluated_iteration() {
    init();
    let cond_runs = Arc::new(AtomicUsize::new(0));
    let body_runs = Arc::new(AtomicUsize::new(0));
    let counted = |name: &str, step: Vec<f32>, limit: f64| {
        let (cond_runs, body_runs) = (cond_runs.clone(), body_runs.clone());
        Function::new(name, move |tracer, args| {
            let step = tracer.constant(Tensor::from(step.clone()));
            let limit = tracer.scalar(limit, DType::F32);
            tracer.while_loop(
                vec![input(args, 0)],
                |_, state| {
                    cond_runs.fetch_add(1, Ordering::SeqCst);
                    state[0].sum().lt(&limit).into()
                },
                |_, state| {
                    body_runs.fetch_add(1, Ordering::SeqCst);
                    vec![&state[0] + &step]
                },
            )
        })
    };
    let runs = || (cond_runs.load(Ordering::SeqCst), body_runs.load(Ordering::SeqCst));

    let steady = counted("steady", vec![1.], 5.0);
    let out = steady.call(&args![Tensor::from(vec![0_f32])]).unwrap();
    assert_eq!(out[0].to_vec::<f32>().unwrap(), vec![5.]);
    steady.call(&args![Tensor::from(vec![2_f32])]).unwrap();
    assert_eq!(runs(), (1, 1));

    let widening = counted("widening", vec![1., 2., 3.], 10.0);
    widening.call(&args![Tensor::from(vec![0_f32])]).unwrap();
    assert_eq!(runs(), (3, 3));

    let remaining = Arc::new(AtomicUsize::new(3));
    let (cond_runs, body_runs) = (Arc::new(AtomicUsize::new(0)), Arc::new(AtomicUsize::new(0)));
    let (counted_cond, counted_body) = (cond_runs.clone(), body_runs.clone());
    let unrolled = Function::new("unrolled", move |tracer, args| {
        remaining.store(3, Ordering::SeqCst);
        tracer.while_loop(
            vec![input(args, 0)],
            |_, _| {
                counted_cond.fetch_add(1, Ordering::SeqCst);
                Pred::Const(remaining.load(Ordering::SeqCst) > 0)
            },
            |_, state| {
                counted_body.fetch_add(1, Ordering::SeqCst);
                remaining.fetch_sub(1, Ordering::SeqCst);
                vec![&state[0] + &state[0]]
            },
        )
    });
    unrolled.call(&args![Tensor::from(1_f32)]).unwrap();
    assert_eq!(cond_runs.load(Ordering::SeqCst), 4);
    assert_eq!(body_runs.load(Ordering::SeqCst), 3);
}

struct LinearNetwork {
    weights: Variable,
    bias: Variable,
}

impl LinearNetwork {
    pub fn new(input_size: usize, output_size: usize) -> Self {
        let weights = Variable::new(random_initialize::<f32>(&[input_size, output_size]));
        let bias = Variable::new(zeros::<f32>(&[output_size]));
        println!(
            "Initialised Linear Network with Weight ID {} and Bias ID {}",
            weights.id(),
            bias.id()
        );
        LinearNetwork { weights, bias }
    }

    pub fn forward(&self, tracer: &Tracer, input: &Sym) -> Sym {
        &input.matmul(&tracer.read_variable(&self.weights)) + &tracer.read_variable(&self.bias)
    }
}

fn mse(output: &Sym, labels: &Sym) -> Sym {
    let error = output - labels;
    (&error * &error).mean()
}

#[test]
fn forward_pass_native() {
    init();
    let network = Arc::new(LinearNetwork::new(1, 1));
    let model = network.clone();
    let cost = Function::new("cost", move |tracer, args| {
        let (features, labels) = (input(args, 0), input(args, 1));
        vec![mse(&model.forward(tracer, &features), &labels)]
    })
    .with_config(TraceConfig::new().with_relaxed_shapes());
    let features = filled_tensor(
        &[10, 1],
        &[0_f32, 0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9],
    )
    .unwrap();
    let labels = filled_tensor(&[10, 1], &[0_f32, 0., 0., 0., 0., 1., 1., 1., 1., 1.]).unwrap();

    let initial = cost.call(&args![features.clone(), labels.clone()]).unwrap()[0]
        .to_scalar::<f32>()
        .unwrap();
    assert!(initial.is_finite() && initial >= 0.0);

    network.weights.assign(ones::<f32>(&[1, 1])).unwrap();
    let exact = cost.call(&args![features, labels]).unwrap()[0]
        .to_scalar::<f32>()
        .unwrap();
    assert!((exact - 0.085).abs() < 1e-6);

    let batch = filled_tensor(&[2, 1], &[1_f32, 2.]).unwrap();
    let batch_labels = filled_tensor(&[2, 1], &[1_f32, 2.]).unwrap();
    let perfect = cost.call(&args![batch, batch_labels]).unwrap()[0]
        .to_scalar::<f32>()
        .unwrap();
    assert_eq!(perfect, 0.0);
    assert_eq!(cost.trace_count(), 1);
}
