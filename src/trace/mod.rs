//! Symbolic execution of a user computation.
//!
//! A [`Tracer`] hands the computation [`Sym`] placeholders instead of tensors.
//! Every operation on a `Sym` appends a node to the graph being built, in call
//! order. Two kinds of side effects follow from this:
//!
//! * effects of the Rust closure itself (a counter bump, a `println!`) are
//!   trace-time effects and run once per signature;
//! * effects recorded through the tracer ([`Tracer::print`],
//!   [`Tracer::inspect`], [`Tracer::assign`]) are graph effects and run on every
//!   invocation, provided their enclosing branch is taken.
//!
//! Operations never fail eagerly. The first error is kept by the builder and
//! reported when the trace finishes; the failed operation hands back a copy of
//! its receiver so the closure can run to completion.

use std::{cell::RefCell, fmt, rc::Rc, sync::Arc};

use log::debug;

use crate::{
    config::TraceConfig,
    error::{CompilationError, TraceError},
    graph::{Graph, NodeId, NodeKind},
    ops::{
        arith::{
            add::{AddType, TensorAdd},
            matmul::TensorMatMul,
            mean::TensorMean,
            multiply::{MultiplicationType, TensorMultiply},
            pow::TensorPow,
            scal::TensorScale,
            sqrt::{TensorUnary, UnaryType},
            sum::TensorSum,
        },
        logic::{
            compare::{CompareType, TensorCompare},
            logical::{LogicalType, TensorLogical},
            select::TensorSelect,
        },
        normalize_axis,
        util::{cast::TensorCast, reshape::TensorReshape, transpose::TensorTranspose},
        Operation,
    },
    signature::Constant,
    tensor::{DType, Shape, Tensor, TensorSpec, Variable},
};

use self::{builder::GraphBuilder, capture::CaptureSet};

pub(crate) mod builder;
pub(crate) mod capture;
pub(crate) mod compiler;
mod control;

/// Symbolic tensor recorded by a trace.
#[derive(Clone)]
pub struct Sym {
    builder: Rc<RefCell<GraphBuilder>>,
    node: NodeId,
    spec: TensorSpec,
}

/// Condition of [`Tracer::cond`] and [`Tracer::while_loop`].
///
/// A `Const` condition is decided while tracing; a `Traced` one is lowered
/// into the graph and decided on every invocation.
#[derive(Clone, Debug)]
pub enum Pred {
    Const(bool),
    Traced(Sym),
}

impl From<bool> for Pred {
    fn from(value: bool) -> Self {
        Pred::Const(value)
    }
}

impl From<Sym> for Pred {
    fn from(sym: Sym) -> Self {
        Pred::Traced(sym)
    }
}

impl From<&Sym> for Pred {
    fn from(sym: &Sym) -> Self {
        Pred::Traced(sym.clone())
    }
}

/// Argument as seen by the computation during a trace.
#[derive(Clone, Debug)]
pub enum TraceArg {
    /// Fed at run time.
    Tensor(Sym),
    /// Folded into the graph.
    Const(Constant),
}

impl TraceArg {
    pub fn as_sym(&self) -> Option<&Sym> {
        match self {
            TraceArg::Tensor(sym) => Some(sym),
            TraceArg::Const(_) => None,
        }
    }

    pub fn as_const(&self) -> Option<&Constant> {
        match self {
            TraceArg::Const(constant) => Some(constant),
            TraceArg::Tensor(_) => None,
        }
    }
}

/// User computation: traced once per signature.
pub type Computation = dyn Fn(&Tracer, &[TraceArg]) -> Vec<Sym> + Send + Sync;

pub struct Tracer {
    builder: Rc<RefCell<GraphBuilder>>,
    captures: RefCell<CaptureSet>,
    max_unroll_iterations: usize,
}

impl Tracer {
    pub(crate) fn new(name: &str, config: &TraceConfig, prior: Option<Vec<Variable>>) -> Self {
        Tracer {
            builder: Rc::new(RefCell::new(GraphBuilder::new(name))),
            captures: RefCell::new(CaptureSet::new(name, prior)),
            max_unroll_iterations: config.max_unroll_iterations(),
        }
    }

    fn sym(&self, node: NodeId, spec: TensorSpec) -> Sym {
        Sym {
            builder: self.builder.clone(),
            node,
            spec,
        }
    }

    fn record_error<E: Into<TraceError>>(&self, error: E) {
        self.builder.borrow_mut().record_error(error);
    }

    fn owns(&self, sym: &Sym) -> bool {
        Rc::ptr_eq(&self.builder, &sym.builder)
    }

    /// Node of `sym` if this trace may use it here.
    fn input_node(&self, sym: &Sym) -> Option<NodeId> {
        if !self.owns(sym) {
            self.record_error(CompilationError::ForeignValue);
            return None;
        }
        let usable = self.builder.borrow().check_usable(sym.node);
        match usable {
            Ok(()) => Some(sym.node),
            Err(error) => {
                self.record_error(error);
                None
            }
        }
    }

    pub(crate) fn placeholder(&self, spec: TensorSpec) -> Sym {
        let node = self.builder.borrow_mut().add_placeholder(spec.clone());
        self.sym(node, spec)
    }

    pub fn has_error(&self) -> bool {
        self.builder.borrow().has_error()
    }

    /// Embed a concrete tensor into the graph.
    pub fn constant<T: Into<Tensor>>(&self, value: T) -> Sym {
        let tensor = value.into();
        let spec = tensor.spec();
        let node = self
            .builder
            .borrow_mut()
            .add_node(NodeKind::Constant(tensor), vec![], Some(spec.clone()));
        self.sym(node, spec)
    }

    /// Rank-0 constant of the given element type.
    pub fn scalar(&self, value: f64, dtype: DType) -> Sym {
        self.constant(Tensor::scalar(value).cast(dtype))
    }

    /// Turn any trace argument into a symbol; constants become graph constants.
    pub fn lift(&self, arg: &TraceArg) -> Sym {
        match arg {
            TraceArg::Tensor(sym) => sym.clone(),
            TraceArg::Const(constant) => match constant.to_tensor() {
                Some(tensor) => self.constant(tensor),
                None => {
                    self.record_error(CompilationError::InvalidInput {
                        op: "Const".to_string(),
                        reason: format!("{} has no tensor form", constant),
                    });
                    self.constant(false)
                }
            },
        }
    }

    /// Elementwise choice between `on_true` and `on_false`. Both sides are
    /// always computed.
    pub fn select(&self, cond: &Sym, on_true: &Sym, on_false: &Sym) -> Sym {
        cond.apply(TensorSelect::new(), &[on_true, on_false])
    }

    /// Record a read of an externally owned variable. The value is read each
    /// time the compiled unit runs, never copied into the graph.
    pub fn read_variable(&self, variable: &Variable) -> Sym {
        let capture = self.captures.borrow_mut().capture(variable);
        let spec = variable.spec().clone();
        let node = self.builder.borrow_mut().add_node(
            NodeKind::ReadVariable { capture },
            vec![],
            Some(spec.clone()),
        );
        self.sym(node, spec)
    }

    /// Record a write into `variable`; yields the assigned value.
    pub fn assign(&self, variable: &Variable, value: &Sym) -> Sym {
        let input = match self.input_node(value) {
            Some(input) => input,
            None => return value.clone(),
        };
        let target = variable.spec();
        if target.dtype != value.spec.dtype || !target.shape.overlaps(&value.spec.shape) {
            self.record_error(CompilationError::InvalidInput {
                op: "Assign".to_string(),
                reason: format!("variable holds {}, value is {}", target, value.spec),
            });
            return value.clone();
        }
        let capture = self.captures.borrow_mut().capture(variable);
        let node = self.builder.borrow_mut().add_node(
            NodeKind::AssignVariable { capture },
            vec![input],
            Some(target.clone()),
        );
        self.sym(node, target.clone())
    }

    pub fn assign_add(&self, variable: &Variable, delta: &Sym) -> Sym {
        let current = self.read_variable(variable);
        self.assign(variable, &(&current + delta))
    }

    /// Create a variable while tracing. Retraces of the same function get the
    /// variable created at the same position by the first trace.
    pub fn create_variable(&self, initial: Tensor) -> Variable {
        let created = self.captures.borrow_mut().create(initial.clone());
        match created {
            Ok(variable) => variable,
            Err(error) => {
                self.record_error(error);
                Variable::new(initial)
            }
        }
    }

    /// Print `value` to stdout on every invocation.
    pub fn print(&self, label: &str, value: &Sym) {
        self.inspect(label, value, |label, tensor| println!("{}: {}", label, tensor));
    }

    /// Run `effect` on the runtime value of `value` on every invocation.
    pub fn inspect<F>(&self, label: &str, value: &Sym, effect: F)
    where
        F: Fn(&str, &Tensor) + Send + Sync + 'static,
    {
        if let Some(input) = self.input_node(value) {
            self.builder.borrow_mut().add_node(
                NodeKind::Inspect {
                    label: label.to_string(),
                    effect: Arc::new(effect),
                },
                vec![input],
                Some(value.spec.clone()),
            );
        }
    }

    /// Close the trace. Yields the graph, the captured variables in capture
    /// order, and the variables this trace created.
    pub(crate) fn finish(
        self,
        outputs: Vec<Sym>,
    ) -> Result<(Graph, Vec<Variable>, Vec<Variable>), TraceError> {
        let nodes: Vec<NodeId> = outputs
            .iter()
            .filter_map(|sym| {
                if self.owns(sym) {
                    Some(sym.node)
                } else {
                    self.record_error(CompilationError::ForeignValue);
                    None
                }
            })
            .collect();
        let graph = self.builder.borrow_mut().finish(nodes)?;
        let (captures, created) = self.captures.into_inner().finish()?;
        debug!(
            "Trace finished with {} nodes and {} captures",
            graph.nodes().len(),
            captures.len()
        );
        Ok((graph, captures, created))
    }
}

impl Sym {
    pub fn spec(&self) -> &TensorSpec {
        &self.spec
    }

    pub fn dtype(&self) -> DType {
        self.spec.dtype
    }

    pub fn shape(&self) -> &Shape {
        &self.spec.shape
    }

    pub fn rank(&self) -> usize {
        self.spec.rank()
    }

    fn apply<O: Operation + 'static>(&self, op: O, others: &[&Sym]) -> Sym {
        let mut builder = self.builder.borrow_mut();
        if others
            .iter()
            .any(|other| !Rc::ptr_eq(&self.builder, &other.builder))
        {
            builder.record_error(CompilationError::ForeignValue);
            return self.clone();
        }
        let inputs = std::iter::once(self.node)
            .chain(others.iter().map(|other| other.node))
            .collect();
        match builder.add_op(Box::new(op), inputs) {
            Ok((node, spec)) => Sym {
                builder: self.builder.clone(),
                node,
                spec,
            },
            Err(error) => {
                builder.record_error(error);
                self.clone()
            }
        }
    }

    fn resolve_axis(&self, op: &str, axis: isize) -> Option<usize> {
        match normalize_axis(op, axis, self.rank()) {
            Ok(axis) => Some(axis),
            Err(error) => {
                self.builder.borrow_mut().record_error(error);
                None
            }
        }
    }

    pub fn matmul(&self, rhs: &Sym) -> Sym {
        self.apply(TensorMatMul::new(), &[rhs])
    }

    pub fn pow(&self, exponent: &Sym) -> Sym {
        self.apply(TensorPow::new(), &[exponent])
    }

    pub fn scale(&self, factor: f64) -> Sym {
        self.apply(TensorScale::new(factor), &[])
    }

    pub fn sqrt(&self) -> Sym {
        self.apply(TensorUnary::new(UnaryType::Sqrt), &[])
    }

    pub fn exp(&self) -> Sym {
        self.apply(TensorUnary::new(UnaryType::Exp), &[])
    }

    pub fn ln(&self) -> Sym {
        self.apply(TensorUnary::new(UnaryType::Ln), &[])
    }

    pub fn sum(&self) -> Sym {
        self.apply(TensorSum::new(None), &[])
    }

    pub fn sum_axis(&self, axis: isize) -> Sym {
        match self.resolve_axis("Sum", axis) {
            Some(axis) => self.apply(TensorSum::new(Some(axis)), &[]),
            None => self.clone(),
        }
    }

    pub fn mean(&self) -> Sym {
        self.apply(TensorMean::new(None), &[])
    }

    pub fn mean_axis(&self, axis: isize) -> Sym {
        match self.resolve_axis("Mean", axis) {
            Some(axis) => self.apply(TensorMean::new(Some(axis)), &[]),
            None => self.clone(),
        }
    }

    pub fn gt(&self, rhs: &Sym) -> Sym {
        self.apply(TensorCompare::new(CompareType::Gt), &[rhs])
    }

    pub fn ge(&self, rhs: &Sym) -> Sym {
        self.apply(TensorCompare::new(CompareType::Ge), &[rhs])
    }

    pub fn lt(&self, rhs: &Sym) -> Sym {
        self.apply(TensorCompare::new(CompareType::Lt), &[rhs])
    }

    pub fn le(&self, rhs: &Sym) -> Sym {
        self.apply(TensorCompare::new(CompareType::Le), &[rhs])
    }

    pub fn equal(&self, rhs: &Sym) -> Sym {
        self.apply(TensorCompare::new(CompareType::Eq), &[rhs])
    }

    pub fn not_equal(&self, rhs: &Sym) -> Sym {
        self.apply(TensorCompare::new(CompareType::Ne), &[rhs])
    }

    pub fn and(&self, rhs: &Sym) -> Sym {
        self.apply(TensorLogical::new(LogicalType::And), &[rhs])
    }

    pub fn or(&self, rhs: &Sym) -> Sym {
        self.apply(TensorLogical::new(LogicalType::Or), &[rhs])
    }

    pub fn xor(&self, rhs: &Sym) -> Sym {
        self.apply(TensorLogical::new(LogicalType::Xor), &[rhs])
    }

    pub fn not(&self) -> Sym {
        self.apply(TensorLogical::new(LogicalType::Not), &[])
    }

    pub fn cast(&self, dtype: DType) -> Sym {
        self.apply(TensorCast::new(dtype), &[])
    }

    pub fn reshape(&self, dims: &[usize]) -> Sym {
        self.apply(TensorReshape::new(dims), &[])
    }

    pub fn transpose(&self) -> Sym {
        self.apply(TensorTranspose::new(), &[])
    }
}

impl fmt::Debug for Sym {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sym({}: {})", self.node, self.spec)
    }
}

macro_rules! impl_binary_operator {
    ($trait:ident, $method:ident, $op:expr) => {
        impl<'a, 'b> std::ops::$trait<&'b Sym> for &'a Sym {
            type Output = Sym;

            fn $method(self, rhs: &'b Sym) -> Sym {
                self.apply($op, &[rhs])
            }
        }

        impl<'b> std::ops::$trait<&'b Sym> for Sym {
            type Output = Sym;

            fn $method(self, rhs: &'b Sym) -> Sym {
                self.apply($op, &[rhs])
            }
        }

        impl std::ops::$trait<Sym> for Sym {
            type Output = Sym;

            fn $method(self, rhs: Sym) -> Sym {
                self.apply($op, &[&rhs])
            }
        }
    };
}

impl_binary_operator!(Add, add, TensorAdd::new(AddType::Add));
impl_binary_operator!(Sub, sub, TensorAdd::new(AddType::Subtract));
impl_binary_operator!(Mul, mul, TensorMultiply::new(MultiplicationType::Hadamard));
impl_binary_operator!(Div, div, TensorMultiply::new(MultiplicationType::Divide));
impl_binary_operator!(Rem, rem, TensorMultiply::new(MultiplicationType::Remainder));

impl std::ops::Neg for &Sym {
    type Output = Sym;

    fn neg(self) -> Sym {
        self.apply(TensorScale::negate(), &[])
    }
}

impl std::ops::Neg for Sym {
    type Output = Sym;

    fn neg(self) -> Sym {
        -&self
    }
}
