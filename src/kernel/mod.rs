//! Aggregation kernels.
//!
//! A kernel turns the candidate source points found for one target point into
//! a single output value. Each kernel declares which neighbourhood the
//! collocator must gather for it and which source/target structures it can
//! work on; the built-in set is looked up by name through a registry that also
//! accepts externally registered kernels.

pub mod bin;
pub mod boxed;
pub mod common;
pub mod linear;
pub mod nearest;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::constraint::{SeparationConstraints, SeparationWeights};
use crate::error::{CollocError, Result};
use crate::frame::Frame;
use crate::point::Point;

pub use common::{PartialValidity, Reduction};

/// Which candidates a kernel needs for each target point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Neighbourhood {
    /// Every point satisfying the separation constraints
    Window,
    /// The single closest usable point satisfying the constraints
    Nearest,
    /// The corners of the source grid cell enclosing the target
    Enclosing,
    /// Every point inside the target's own grid cell
    Cell,
}

/// Source/target structure a kernel is asked to work on
#[derive(Debug, Clone, Copy)]
pub struct KernelPlan<'a> {
    pub frame: &'a Frame,
    pub constraints: &'a SeparationConstraints,
    pub source_gridded: bool,
    pub target_gridded: bool,
    /// Whether the source is a grid with monotonic axes that all lie in the frame
    pub source_searchable_grid: bool,
}

/// Read-only state shared by every aggregation of one run
#[derive(Debug, Clone, Copy)]
pub struct KernelContext<'a> {
    pub frame: &'a Frame,
    /// Source points in frame coordinates, in source order
    pub points: &'a [Point],
    pub weights: &'a SeparationWeights,
}

impl<'a> KernelContext<'a> {
    /// Source point by index
    pub fn point(&self, index: usize) -> &'a Point {
        &self.points[index]
    }
}

/// Outcome of aggregating one target point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelResult {
    pub value: f64,
    pub valid: bool,
    /// Number of source points that contributed
    pub count: usize,
}

impl KernelResult {
    /// A valid result
    pub fn valid(value: f64, count: usize) -> Self {
        Self {
            value,
            valid: true,
            count,
        }
    }

    /// An invalid result
    pub fn invalid(count: usize) -> Self {
        Self {
            value: f64::NAN,
            valid: false,
            count,
        }
    }

    /// Valid when a value is available
    pub fn from_option(value: Option<f64>, count: usize) -> Self {
        match value {
            Some(value) if value.is_finite() => Self::valid(value, count),
            _ => Self::invalid(count),
        }
    }
}

/// An aggregation strategy
pub trait Kernel: Send + Sync + fmt::Debug {
    /// Name of this kernel
    fn name(&self) -> &str;

    /// Candidates needed for each target point
    fn neighbourhood(&self) -> Neighbourhood;

    /// Reject structures this kernel cannot handle
    fn check(&self, _plan: &KernelPlan<'_>) -> Result<()> {
        Ok(())
    }

    /// Combine the candidates of one target point.
    ///
    /// Candidates are indices into `ctx.points`, ascending, already filtered by
    /// the separation constraints. Errors are fatal to the whole run.
    fn aggregate(
        &self,
        ctx: &KernelContext<'_>,
        target: &Point,
        candidates: &[usize],
    ) -> Result<KernelResult>;
}

/// Kernel settings taken from the collocation options
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KernelParams {
    pub reduction: Reduction,
    pub partial_validity: PartialValidity,
}

/// Builds a kernel from its settings
pub type KernelFactory = Arc<dyn Fn(&KernelParams) -> Result<Arc<dyn Kernel>> + Send + Sync>;

/// Named kernel factories
pub struct KernelRegistry {
    factories: RwLock<BTreeMap<String, KernelFactory>>,
}

impl KernelRegistry {
    /// A registry holding the built-in kernels
    pub fn with_builtins() -> Self {
        let registry = Self {
            factories: RwLock::new(BTreeMap::new()),
        };

        let nearest: KernelFactory = Arc::new(|_| Ok(Arc::new(nearest::NearestKernel)));
        let linear: KernelFactory = Arc::new(|_| Ok(Arc::new(linear::LinearKernel)));
        registry.register("nn", nearest.clone());
        registry.register("nearest", nearest);
        registry.register("lin", linear.clone());
        registry.register("linear", linear);
        registry.register(
            "bin",
            Arc::new(|params| Ok(Arc::new(bin::BinKernel::new(params.partial_validity)))),
        );
        registry.register(
            "box",
            Arc::new(|params| {
                Ok(Arc::new(boxed::BoxKernel::new(
                    params.reduction,
                    params.partial_validity,
                )))
            }),
        );

        registry
    }

    /// The process-wide registry
    pub fn global() -> &'static KernelRegistry {
        static REGISTRY: Lazy<KernelRegistry> = Lazy::new(KernelRegistry::with_builtins);
        &REGISTRY
    }

    /// Register a kernel factory, replacing any previous one of the same name
    pub fn register(&self, name: &str, factory: KernelFactory) {
        self.factories.write().insert(name.to_lowercase(), factory);
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        self.factories.read().keys().cloned().collect()
    }

    /// Build a kernel by name
    pub fn create(&self, name: &str, params: &KernelParams) -> Result<Arc<dyn Kernel>> {
        let factory = self.factories.read().get(&name.to_lowercase()).cloned();
        match factory {
            Some(factory) => factory(params),
            None => Err(CollocError::config(format!(
                "Unknown kernel: {}. Must be one of: {}",
                name,
                self.names().join(", ")
            ))),
        }
    }
}

/// Get a kernel by name from the global registry
pub fn get_kernel(name: &str, params: &KernelParams) -> Result<Arc<dyn Kernel>> {
    KernelRegistry::global().create(name, params)
}

/// Register a kernel with the global registry
pub fn register_kernel(name: &str, factory: KernelFactory) {
    KernelRegistry::global().register(name, factory);
}
