//! Gridded datasets.
//!
//! Values live on the lattice spanned by one coordinate axis per dimension,
//! stored as an n-dimensional array in standard (row-major) layout together
//! with a mask of the same shape. Points enumerate the lattice with the last
//! axis varying fastest.

use ndarray::{ArrayD, Axis, IxDyn};
use serde::{Deserialize, Serialize};

use crate::error::{CollocError, Result};
use crate::point::{Coord, Point, Schema};

use super::{from_nullable, to_nullable, CommonData, DataView, Dataset, SubsetSpec, VariableMeta};

/// One axis of a grid: its coordinate and the values along it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimCoord {
    pub coord: Coord,
    pub points: Vec<f64>,
}

impl DimCoord {
    pub fn new(coord: Coord, points: Vec<f64>) -> Self {
        Self { coord, points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Values on a rectilinear lattice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GriddedRepr", into = "GriddedRepr")]
pub struct GriddedData {
    meta: VariableMeta,
    schema: Schema,
    axes: Vec<DimCoord>,
    values: ArrayD<f64>,
    mask: ArrayD<bool>,
}

/// Serialised form; masked or undefined values are `null`
#[derive(Debug, Clone, Serialize, Deserialize)]
struct GriddedRepr {
    meta: VariableMeta,
    axes: Vec<DimCoord>,
    values: Vec<Option<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mask: Option<Vec<bool>>,
}

impl TryFrom<GriddedRepr> for GriddedData {
    type Error = CollocError;

    fn try_from(repr: GriddedRepr) -> Result<Self> {
        let mask = repr
            .mask
            .unwrap_or_else(|| repr.values.iter().map(Option::is_none).collect());
        GriddedData::from_vec(repr.meta, repr.axes, from_nullable(&repr.values))?.with_mask(mask)
    }
}

impl From<GriddedData> for GriddedRepr {
    fn from(data: GriddedData) -> Self {
        let masked = data.mask.iter().any(|m| *m);
        GriddedRepr {
            values: to_nullable(data.values.iter().copied()),
            mask: masked.then(|| data.mask.iter().copied().collect()),
            meta: data.meta,
            axes: data.axes,
        }
    }
}

impl GriddedData {
    /// Create a grid from an array whose shape matches the axes
    pub fn new(meta: VariableMeta, axes: Vec<DimCoord>, values: ArrayD<f64>) -> Result<Self> {
        let schema = Schema::new(axes.iter().map(|a| a.coord.clone()).collect())?;
        if axes.is_empty() {
            return Err(CollocError::InvalidCoordinates {
                message: "A grid needs at least one axis".to_string(),
            });
        }
        if let Some(axis) = axes.iter().find(|a| a.is_empty()) {
            return Err(CollocError::InvalidCoordinates {
                message: format!("Axis {} has no values", axis.coord.name),
            });
        }

        let shape: Vec<usize> = axes.iter().map(DimCoord::len).collect();
        if values.shape() != shape.as_slice() {
            return Err(CollocError::InvalidCoordinates {
                message: format!(
                    "Values have shape {:?} but the axes span {:?}",
                    values.shape(),
                    shape
                ),
            });
        }

        let values = values.as_standard_layout().into_owned();
        let mask = ArrayD::from_elem(IxDyn(&shape), false);
        Ok(Self {
            meta,
            schema,
            axes,
            values,
            mask,
        })
    }

    /// Create a grid from values in lattice order
    pub fn from_vec(meta: VariableMeta, axes: Vec<DimCoord>, values: Vec<f64>) -> Result<Self> {
        let shape: Vec<usize> = axes.iter().map(DimCoord::len).collect();
        let values = ArrayD::from_shape_vec(IxDyn(&shape), values)?;
        Self::new(meta, axes, values)
    }

    /// Attach a mask given in lattice order; `true` marks a missing value
    pub fn with_mask(mut self, mask: Vec<bool>) -> Result<Self> {
        self.mask = ArrayD::from_shape_vec(IxDyn(self.values.shape()), mask)?;
        Ok(self)
    }

    /// Mask every value that is not finite
    pub fn mask_non_finite(mut self) -> Self {
        self.mask.zip_mut_with(&self.values, |m, v| *m = *m || !v.is_finite());
        self
    }

    /// A grid on the same axes with new values
    pub fn with_values(&self, meta: VariableMeta, values: Vec<f64>, mask: Vec<bool>) -> Result<Self> {
        Self::from_vec(meta, self.axes.clone(), values)?.with_mask(mask)
    }

    pub fn axes(&self) -> &[DimCoord] {
        &self.axes
    }

    pub fn values(&self) -> &ArrayD<f64> {
        &self.values
    }

    pub fn mask(&self) -> &ArrayD<bool> {
        &self.mask
    }

    pub fn shape(&self) -> &[usize] {
        self.values.shape()
    }

    /// Coordinates of the lattice point at a flat index
    fn coords_at(&self, mut flat: usize) -> Vec<f64> {
        let mut coords = vec![0.0; self.axes.len()];
        for (k, axis) in self.axes.iter().enumerate().rev() {
            coords[k] = axis.points[flat % axis.len()];
            flat /= axis.len();
        }
        coords
    }
}

impl CommonData for GriddedData {
    fn meta(&self) -> &VariableMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut VariableMeta {
        &mut self.meta
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn is_gridded(&self) -> bool {
        true
    }

    fn view(&self) -> DataView<'_> {
        DataView::Gridded(self)
    }

    fn len(&self) -> usize {
        self.values.len()
    }

    fn get_coordinates_points(&self) -> Vec<Point> {
        (0..self.len())
            .map(|i| Point::coordinates_only(self.coords_at(i)))
            .collect()
    }

    fn get_all_points(&self) -> Vec<Point> {
        self.values
            .iter()
            .zip(self.mask.iter())
            .enumerate()
            .map(|(i, (value, masked))| Point::new(self.coords_at(i), *value, !masked))
            .collect()
    }

    fn subset(&self, spec: &SubsetSpec) -> Result<Dataset> {
        spec.validate(&self.schema)?;

        let mut axes = Vec::with_capacity(self.axes.len());
        let mut values = self.values.clone();
        let mut mask = self.mask.clone();
        for (k, axis) in self.axes.iter().enumerate() {
            let keep: Vec<usize> = (0..axis.len())
                .filter(|&i| spec.contains(axis.coord.dim, axis.points[i]))
                .collect();
            if keep.is_empty() {
                return Err(CollocError::InsufficientData {
                    message: format!("No {} values lie within the subset", axis.coord.name),
                });
            }
            if keep.len() < axis.len() {
                values = values.select(Axis(k), &keep);
                mask = mask.select(Axis(k), &keep);
            }
            axes.push(DimCoord::new(
                axis.coord.clone(),
                keep.iter().map(|&i| axis.points[i]).collect(),
            ));
        }

        let mut subset = GriddedData::new(self.meta.clone(), axes, values)?;
        subset.mask = mask.as_standard_layout().into_owned();
        Ok(Dataset::Gridded(subset))
    }
}
