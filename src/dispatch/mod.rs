//! Polymorphic dispatch: one traced unit per distinct argument signature.

use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use log::debug;
use uuid::Uuid;

use crate::{
    backend::Backend,
    config::TraceConfig,
    error::{SignatureError, TraceError},
    signature::{Arg, Signature, SignatureExtractor},
    tensor::{Tensor, TensorSpec},
    trace::{capture::CreationLedger, compiler::compile, Computation, Sym, TraceArg, Tracer},
};

mod cache;
mod concrete;

pub use cache::{CacheStats, DispatchCache};
pub use concrete::ConcreteFunction;

/// A computation wrapped in a trace cache.
///
/// Each call derives a [`Signature`] from its arguments. The first call with a
/// signature traces the computation into a [`ConcreteFunction`]; later calls
/// with an equal signature replay it on the backend without running the Rust
/// closure again.
pub struct Function {
    id: Uuid,
    name: String,
    computation: Arc<Computation>,
    config: TraceConfig,
    extractor: SignatureExtractor,
    cache: DispatchCache,
    ledger: CreationLedger,
    backend: Arc<dyn Backend>,
    calls: AtomicU64,
}

impl Function {
    /// Wrap `computation`, executing on the shared native backend.
    #[cfg(feature = "native")]
    pub fn new<F>(name: &str, computation: F) -> Self
    where
        F: Fn(&Tracer, &[TraceArg]) -> Vec<Sym> + Send + Sync + 'static,
    {
        Function::with_backend(name, computation, crate::utility::get_native_backend())
    }

    pub fn with_backend<F>(name: &str, computation: F, backend: Arc<dyn Backend>) -> Self
    where
        F: Fn(&Tracer, &[TraceArg]) -> Vec<Sym> + Send + Sync + 'static,
    {
        let config = TraceConfig::default();
        Function {
            id: Uuid::new_v4(),
            name: name.to_string(),
            computation: Arc::new(computation),
            extractor: SignatureExtractor::new(&config),
            cache: DispatchCache::new(config.max_cache_entries()),
            config,
            ledger: CreationLedger::new(name),
            backend,
            calls: AtomicU64::new(0),
        }
    }

    /// Replace the configuration. Drops every compiled unit.
    pub fn with_config(mut self, config: TraceConfig) -> Self {
        let declared = self.extractor.input_signature().map(<[TensorSpec]>::to_vec);
        self.extractor = SignatureExtractor::new(&config);
        if let Some(declared) = declared {
            self.extractor = self.extractor.with_input_signature(declared);
        }
        self.cache = DispatchCache::new(config.max_cache_entries());
        self.config = config;
        self
    }

    /// Declare the accepted tensor arguments up front. Every compatible call
    /// shares a single compiled unit.
    pub fn with_input_signature(mut self, specs: Vec<TensorSpec>) -> Self {
        self.extractor = self.extractor.with_input_signature(specs);
        self.cache = DispatchCache::new(self.config.max_cache_entries());
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &TraceConfig {
        &self.config
    }

    pub fn backend(&self) -> &dyn Backend {
        &*self.backend
    }

    pub fn signature(&self, args: &[Arg]) -> Result<Signature, SignatureError> {
        self.extractor.extract(args)
    }

    /// Compiled unit for `args`, tracing it if this signature is new.
    pub fn concrete_function(&self, args: &[Arg]) -> Result<Arc<ConcreteFunction>, TraceError> {
        let signature = self.extractor.extract(args)?;
        self.cache.resolve(&signature, || {
            compile(
                &self.name,
                &*self.computation,
                &signature,
                &self.ledger,
                &self.config,
            )
        })
    }

    pub fn call(&self, args: &[Arg]) -> Result<Vec<Tensor>, TraceError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let unit = self.concrete_function(args)?;
        debug!("Running {} for {}", self.name, unit.signature());
        Ok(unit.call(&*self.backend, args)?)
    }

    /// Number of traces run, failed ones included.
    pub fn trace_count(&self) -> u64 {
        let stats = self.cache.stats();
        stats.compilations + stats.failed_compilations
    }

    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn cached_signatures(&self) -> Vec<Signature> {
        self.cache.signatures()
    }

    /// Forget every compiled unit. Variables created by the first trace stay
    /// bound to this function and are reused by later traces.
    pub fn reset(&self) {
        debug!("Resetting {}", self.name);
        self.cache.clear();
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("config", &self.config)
            .field("backend", &self.backend.name())
            .field("cached", &self.cache.len())
            .finish()
    }
}

/// Shorthand for [`Function::new`].
#[cfg(feature = "native")]
pub fn function<F>(name: &str, computation: F) -> Function
where
    F: Fn(&Tracer, &[TraceArg]) -> Vec<Sym> + Send + Sync + 'static,
{
    Function::new(name, computation)
}
