//! Trace-compiling dispatcher.
//!
//! A [`Function`](dispatch::Function) wraps a computation written against
//! [`Sym`](trace::Sym) values. The first call with a given argument
//! [`Signature`](signature::Signature) traces the computation into a graph;
//! later calls with an equal signature replay that graph on a
//! [`Backend`](backend::Backend).

extern crate crossbeam_utils;
extern crate ndarray;
extern crate num_traits;
extern crate rand;
extern crate thiserror;

use std::sync::Arc;

use crossbeam::sync::ShardedLock;

pub use num::{One, Zero};

pub mod backend;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod graph;
#[macro_use]
pub mod ops;
pub mod prelude;
pub mod signature;
pub mod tensor;
#[cfg(all(test, feature = "native"))]
mod tests;
pub mod trace;
pub mod utility;

type ArcLock<T> = Arc<ShardedLock<T>>;

/// Build an argument list; tensors stay tensors, plain values become constants.
#[macro_export]
macro_rules! args {
    ($($arg:expr),* $(,)?) => {
        vec![$($crate::signature::Arg::from($arg)),*]
    };
}
