//! Function registry contract.
//!
//! The analyzer consults a process-wide, read-only registry for two facts
//! about a function name: whether it is an aggregate (drives the aggregate
//! collector and the WHERE/PREWHERE checks) and whether it is stateful
//! (guards the duplicate-ORDER-BY removal). Names are matched
//! case-insensitively, so `COUNT` and `count` resolve to the same entry.
//!
//! Unknown functions are treated as ordinary stateless scalar functions.

use std::collections::HashSet;

/// Read-only registry of function properties.
#[derive(Debug, Clone)]
pub struct FunctionRegistry {
    aggregates: HashSet<String>,
    stateful: HashSet<String>,
}

const DEFAULT_AGGREGATES: &[&str] = &[
    "count",
    "sum",
    "min",
    "max",
    "avg",
    "any",
    "anyLast",
    "anyHeavy",
    "argMin",
    "argMax",
    "uniq",
    "uniqExact",
    "uniqCombined",
    "uniqHLL12",
    "groupArray",
    "groupUniqArray",
    "groupBitAnd",
    "groupBitOr",
    "groupBitXor",
    "quantile",
    "quantiles",
    "quantileExact",
    "median",
    "varSamp",
    "varPop",
    "stddevSamp",
    "stddevPop",
    "covarSamp",
    "covarPop",
    "corr",
    "topK",
    "sumWithOverflow",
    "sumMap",
];

const DEFAULT_STATEFUL: &[&str] = &[
    "neighbor",
    "runningAccumulate",
    "runningDifference",
    "runningDifferenceStartingWithFirstValue",
    "rowNumberInBlock",
    "rowNumberInAllBlocks",
    "blockNumber",
    "finalizeAggregation",
];

impl FunctionRegistry {
    /// An empty registry: nothing is an aggregate, nothing is stateful.
    pub fn empty() -> Self {
        Self {
            aggregates: HashSet::new(),
            stateful: HashSet::new(),
        }
    }

    /// The registry preloaded with the engine's built-in aggregate and
    /// stateful function names.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        for name in DEFAULT_AGGREGATES {
            registry.register_aggregate(name);
        }
        for name in DEFAULT_STATEFUL {
            registry.register_stateful(name);
        }
        registry
    }

    pub fn register_aggregate(&mut self, name: &str) {
        self.aggregates.insert(name.to_lowercase());
    }

    pub fn register_stateful(&mut self, name: &str) {
        self.stateful.insert(name.to_lowercase());
    }

    /// Whether `name` is a known aggregate function.
    pub fn is_aggregate(&self, name: &str) -> bool {
        self.aggregates.contains(&name.to_lowercase())
    }

    /// Whether `name` is a known stateful function. Unknown names are
    /// stateless.
    pub fn is_stateful(&self, name: &str) -> bool {
        self.stateful.contains(&name.to_lowercase())
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
