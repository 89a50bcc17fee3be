//! The collocation engine.
//!
//! A [`Collocator`] resamples one source dataset onto the points of one
//! target dataset. It resolves the kernel and the comparison frame, indexes
//! the source, gathers the relevant candidates for every target point, lets
//! the kernel aggregate them and assembles an output shaped like the target.
//! All configuration problems are reported before any sampling starts.

pub mod assemble;
pub mod options;

use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::constraint::ConstraintEvaluator;
use crate::data::DataView;
use crate::error::{CollocError, Result};
use crate::frame::Frame;
use crate::geo;
use crate::index::{build_index, Cell, GridLayout, SpatialIndex};
use crate::kernel::{get_kernel, Kernel, KernelContext, KernelPlan, KernelResult, Neighbourhood};
use crate::logging;
use crate::point::{Dim, Point};

pub use assemble::{Collocated, CollocationSummary};
pub use options::{CollocationOptions, OutputNaming};

use assemble::Slot;

/// Number of target points sampled sequentially before parallel dispatch
pub const DEFAULT_PROBE_POINTS: usize = 8;

/// Lifecycle of a collocator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollocatorState {
    Initialized,
    Indexing,
    Sampling,
    Assembled,
}

/// Shared flag used to abort a running collocation
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every worker to stop
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Resamples one source dataset onto one target dataset, once
#[derive(Debug)]
pub struct Collocator {
    options: CollocationOptions,
    kernel: Option<Arc<dyn Kernel>>,
    workers: Option<usize>,
    probe_points: usize,
    cancel: CancellationToken,
    state: CollocatorState,
}

impl Collocator {
    pub fn new(options: CollocationOptions) -> Self {
        Self {
            options,
            kernel: None,
            workers: None,
            probe_points: DEFAULT_PROBE_POINTS,
            cancel: CancellationToken::new(),
            state: CollocatorState::Initialized,
        }
    }

    /// Use this kernel object instead of looking one up by name
    pub fn with_kernel(mut self, kernel: Arc<dyn Kernel>) -> Self {
        self.kernel = Some(kernel);
        self
    }

    /// Run on a dedicated pool of `workers` threads
    pub fn with_workers(mut self, workers: Option<usize>) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_probe_points(mut self, probe_points: usize) -> Self {
        self.probe_points = probe_points;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn options(&self) -> &CollocationOptions {
        &self.options
    }

    pub fn state(&self) -> CollocatorState {
        self.state
    }

    fn transition(&mut self, state: CollocatorState) {
        debug!(from = ?self.state, to = ?state, "Collocator state change");
        self.state = state;
    }

    /// Collocate `source` onto the points of `target`
    pub fn collocate(&mut self, source: DataView<'_>, target: DataView<'_>) -> Result<Collocated> {
        if self.state != CollocatorState::Initialized {
            return Err(CollocError::config(
                "A collocator processes a single source/sample pair; create a new one",
            ));
        }
        let start = Instant::now();
        let run_id = logging::generate_run_id();
        let options = self.options.clone();
        options.validate()?;

        let kernel = match &self.kernel {
            Some(kernel) => kernel.clone(),
            None => get_kernel(&options.kernel, &options.kernel_params())?,
        };

        let frame = Frame::between(source.schema(), target.schema())?;
        let meta = options.naming.resolve(source.meta())?;
        let source_projector = frame.projector(source.schema())?;
        let target_projector = frame.projector(target.schema())?;
        let layout = source.grid_layout(&frame, &source_projector);

        let plan = KernelPlan {
            frame: &frame,
            constraints: &options.constraints,
            source_gridded: source.is_gridded(),
            target_gridded: target.is_gridded(),
            source_searchable_grid: layout.as_ref().is_some_and(GridLayout::is_searchable),
        };
        kernel.check(&plan)?;

        let cells = match kernel.neighbourhood() {
            Neighbourhood::Cell => Some(
                CellGrid::new(&frame, target.grid_layout(&frame, &target_projector))
                    .ok_or_else(|| CollocError::config("Binning requires a gridded sample"))?,
            ),
            _ => None,
        };

        debug!(
            run_id = %run_id,
            kernel = kernel.name(),
            frame = ?frame.dims(),
            constraints = %options.constraints,
            source_points = source.data().len(),
            target_points = target.data().len(),
            "Collocation configured"
        );

        self.transition(CollocatorState::Indexing);
        let source_points: Vec<Point> = source
            .data()
            .get_all_points()
            .iter()
            .map(|p| source_projector.project(p))
            .collect();
        let index = logging::log_timed_operation("index", &run_id, || {
            build_index(source_points, layout, frame.clone())
        });
        debug!(index = index.kind(), points = index.points().len(), "Source indexed");

        self.transition(CollocatorState::Sampling);
        let targets: Vec<Point> = target
            .data()
            .get_all_points()
            .iter()
            .map(|p| target_projector.project(p))
            .collect();

        let sampler = Sampler {
            kernel: kernel.as_ref(),
            index: index.as_ref(),
            frame: &frame,
            options: &options,
            targets: &targets,
            cells: cells.as_ref(),
            cancel: &self.cancel,
            processed: AtomicUsize::new(0),
        };
        let probe_points = self.probe_points;
        let slots = logging::log_timed_operation("sample", &run_id, || -> Result<Vec<Slot>> {
            match self.workers {
                Some(workers) => {
                    let pool = rayon::ThreadPoolBuilder::new()
                        .num_threads(workers)
                        .build()
                        .map_err(|e| CollocError::config(format!("Cannot start worker pool: {}", e)))?;
                    pool.install(|| sampler.run(probe_points))
                }
                None => sampler.run(probe_points),
            }
        })?;

        let note = assemble::history_note(kernel.name(), &options.constraints, source.meta(), target.meta());
        let collocated = assemble::assemble(target, meta, &note, &slots)?;
        self.transition(CollocatorState::Assembled);

        logging::log_collocation_stats(&run_id, kernel.name(), &collocated.summary, start);
        if collocated.summary.points > 0 && collocated.summary.valid == 0 {
            warn!(
                run_id = %run_id,
                points = collocated.summary.points,
                filled = collocated.summary.filled,
                empty = collocated.summary.empty,
                "No sample point received a collocated value"
            );
        }

        Ok(collocated)
    }
}

/// Collocate with default runtime settings
pub fn collocate(source: DataView<'_>, target: DataView<'_>, options: &CollocationOptions) -> Result<Collocated> {
    Collocator::new(options.clone()).collocate(source, target)
}

/// Per-run sampling state shared by all workers
struct Sampler<'a> {
    kernel: &'a dyn Kernel,
    index: &'a dyn SpatialIndex,
    frame: &'a Frame,
    options: &'a CollocationOptions,
    targets: &'a [Point],
    cells: Option<&'a CellGrid>,
    cancel: &'a CancellationToken,
    processed: AtomicUsize,
}

impl Sampler<'_> {
    fn run(&self, probe_points: usize) -> Result<Vec<Slot>> {
        let total = self.targets.len();
        let mut slots = vec![Slot::default(); total];
        let probe = probe_points.min(total);

        // fatal errors surface on the first few points before fanning out
        for (i, slot) in slots[..probe].iter_mut().enumerate() {
            *slot = self.sample_slot(i)?;
        }

        let rest = total - probe;
        if rest > 0 {
            let chunk = rest.div_ceil(rayon::current_num_threads()).max(1);
            slots[probe..]
                .par_chunks_mut(chunk)
                .enumerate()
                .try_for_each(|(c, chunk_slots)| -> Result<()> {
                    let offset = probe + c * chunk;
                    for (j, slot) in chunk_slots.iter_mut().enumerate() {
                        *slot = self.sample_slot(offset + j)?;
                    }
                    Ok(())
                })?;
        }

        Ok(slots)
    }

    fn sample_slot(&self, i: usize) -> Result<Slot> {
        if self.cancel.is_cancelled() {
            return Err(CollocError::Cancelled {
                processed: self.processed.load(Ordering::Relaxed),
                total: self.targets.len(),
            });
        }
        let result = self.sample(i)?;
        self.processed.fetch_add(1, Ordering::Relaxed);
        Ok(Slot::new(result, self.options.fill_value))
    }

    fn sample(&self, i: usize) -> Result<KernelResult> {
        let target = &self.targets[i];
        if self.options.missing_data_for_missing_sample && !target.is_valid() {
            return Ok(KernelResult::invalid(0));
        }
        if !target.coords().iter().all(|c| c.is_finite()) {
            return Ok(KernelResult::invalid(0));
        }

        let evaluator = ConstraintEvaluator::new(self.frame, &self.options.constraints);
        let points = self.index.points();
        let matches = |index: usize| evaluator.matches(target, &points[index]);

        let candidates: Vec<usize> = match self.kernel.neighbourhood() {
            Neighbourhood::Window => self
                .index
                .query(&evaluator.window(target))
                .into_iter()
                .filter(|&j| matches(j))
                .collect(),
            Neighbourhood::Nearest => {
                let accept = |j: usize| points[j].is_usable() && matches(j);
                self.index
                    .nearest(target, &evaluator.window(target), &self.options.weights, &accept)
                    .into_iter()
                    .collect()
            }
            Neighbourhood::Enclosing => self
                .index
                .enclosing(target)
                .unwrap_or_default()
                .into_iter()
                .filter(|&j| matches(j))
                .collect(),
            Neighbourhood::Cell => match self.cells {
                Some(cells) => self
                    .index
                    .cell(&cells.cell(i))
                    .into_iter()
                    .filter(|&j| matches(j))
                    .collect(),
                None => Vec::new(),
            },
        };

        let ctx = KernelContext {
            frame: self.frame,
            points,
            weights: &self.options.weights,
        };
        self.kernel.aggregate(&ctx, target, &candidates)
    }
}

/// Cell bounds along one target axis that lies in the frame
#[derive(Debug)]
struct CellAxis {
    frame_pos: usize,
    centres: Vec<f64>,
    lower: Vec<f64>,
    upper: Vec<f64>,
    closed: Vec<bool>,
}

impl CellAxis {
    /// Cells bounded halfway between neighbouring values
    fn new(frame_pos: usize, dim: Dim, values: &[f64]) -> Self {
        let n = values.len();
        let mut edges = Vec::with_capacity(n + 1);
        if n == 1 {
            edges.extend([values[0], values[0]]);
        } else {
            edges.push(values[0] - (values[1] - values[0]) / 2.0);
            edges.extend(values.windows(2).map(|w| (w[0] + w[1]) / 2.0));
            edges.push(values[n - 1] + (values[n - 1] - values[n - 2]) / 2.0);
        }

        // full-circle longitudes have no last cell
        let periodic = dim == Dim::Longitude
            && n > 1
            && geo::longitude_difference(edges[0], edges[n]) < 1e-9
            && (edges[n] - edges[0]).abs() > 180.0;
        let ascending = n == 1 || values[n - 1] > values[0];
        let top = if ascending { n - 1 } else { 0 };

        let mut axis = CellAxis {
            frame_pos,
            centres: values.to_vec(),
            lower: Vec::with_capacity(n),
            upper: Vec::with_capacity(n),
            closed: Vec::with_capacity(n),
        };
        for i in 0..n {
            axis.lower.push(edges[i].min(edges[i + 1]));
            axis.upper.push(edges[i].max(edges[i + 1]));
            axis.closed.push(i == top && !periodic);
        }
        axis
    }
}

/// Cells of a gridded target, in frame units
#[derive(Debug)]
struct CellGrid {
    frame_len: usize,
    longitude: Option<usize>,
    shape: Vec<usize>,
    // per target axis; `None` for axes outside the frame
    axes: Vec<Option<CellAxis>>,
}

impl CellGrid {
    fn new(frame: &Frame, layout: Option<GridLayout>) -> Option<Self> {
        let layout = layout?;
        Some(Self {
            frame_len: frame.len(),
            longitude: frame.longitude(),
            shape: layout.axes.iter().map(|a| a.values.len()).collect(),
            axes: layout
                .axes
                .iter()
                .map(|a| a.frame_pos.map(|pos| CellAxis::new(pos, a.dim, &a.values)))
                .collect(),
        })
    }

    /// The cell of the target point at a flat lattice index
    fn cell(&self, mut flat: usize) -> Cell {
        let mut cell = Cell {
            centre: vec![0.0; self.frame_len],
            lower: vec![f64::NEG_INFINITY; self.frame_len],
            upper: vec![f64::INFINITY; self.frame_len],
            closed: vec![true; self.frame_len],
            longitude: self.longitude,
        };
        for (axis, len) in self.axes.iter().zip(&self.shape).rev() {
            let i = flat % len;
            flat /= len;
            if let Some(axis) = axis {
                let pos = axis.frame_pos;
                cell.centre[pos] = axis.centres[i];
                cell.lower[pos] = axis.lower[i];
                cell.upper[pos] = axis.upper[i];
                cell.closed[pos] = axis.closed[i];
            }
        }
        cell
    }
}
