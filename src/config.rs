/// How plain (non-tensor) arguments enter a signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConstantPolicy {
    /// Every distinct literal gets its own compiled unit and is baked into the graph.
    ByValue,
    /// Numeric and bool literals are keyed by kind only and fed as rank-0 tensors.
    /// Strings are still folded by value.
    ByType,
}

/// Tracing and caching knobs of a [`Function`](crate::dispatch::Function).
#[derive(Clone, Debug, PartialEq)]
pub struct TraceConfig {
    constant_policy: ConstantPolicy,
    relax_shapes: bool,
    max_cache_entries: Option<usize>,
    max_unroll_iterations: usize,
}

pub const DEFAULT_MAX_UNROLL_ITERATIONS: usize = 1000;

impl Default for TraceConfig {
    fn default() -> Self {
        TraceConfig {
            constant_policy: ConstantPolicy::ByValue,
            relax_shapes: false,
            max_cache_entries: None,
            max_unroll_iterations: DEFAULT_MAX_UNROLL_ITERATIONS,
        }
    }
}

impl TraceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_constant_policy(mut self, policy: ConstantPolicy) -> Self {
        self.constant_policy = policy;
        self
    }

    /// Key tensor arguments by element type and rank only.
    pub fn with_relaxed_shapes(mut self) -> Self {
        self.relax_shapes = true;
        self
    }

    /// Bound the cache; the least recently used unit is evicted past `entries`.
    pub fn with_max_cache_entries(mut self, entries: usize) -> Self {
        self.max_cache_entries = Some(std::cmp::max(entries, 1));
        self
    }

    pub fn with_max_unroll_iterations(mut self, iterations: usize) -> Self {
        self.max_unroll_iterations = iterations;
        self
    }

    pub fn constant_policy(&self) -> ConstantPolicy {
        self.constant_policy
    }

    pub fn relax_shapes(&self) -> bool {
        self.relax_shapes
    }

    pub fn max_cache_entries(&self) -> Option<usize> {
        self.max_cache_entries
    }

    pub fn max_unroll_iterations(&self) -> usize {
        self.max_unroll_iterations
    }
}
