//! Dataset model.
//!
//! Datasets come in two structures: [`GriddedData`] holds values on the
//! lattice spanned by one coordinate axis per dimension, [`UngriddedData`]
//! holds a scatter of points, each with its own coordinates. Both expose the
//! same capabilities through [`CommonData`], and [`Dataset`] owns either one.

pub mod gridded;
pub mod list;
pub mod ungridded;

use arrow_array::{ArrayRef, Float64Array, RecordBatch};
use arrow_schema::{DataType, Field, Schema as ArrowSchema};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::collocator::{self, CollocationOptions, Collocated};
use crate::error::{CollocError, Result};
use crate::frame::{Frame, Projector};
use crate::index::{GridLayout, LayoutAxis};
use crate::point::{Dim, Point, Schema};

pub use gridded::{DimCoord, GriddedData};
pub use list::DataList;
pub use ungridded::UngriddedData;

/// Identity and provenance of a data variable
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableMeta {
    pub var_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Newline separated processing notes
    #[serde(default)]
    pub history: String,
    #[serde(default)]
    pub filenames: Vec<String>,
}

impl VariableMeta {
    /// Metadata for a named variable
    pub fn new(var_name: impl Into<String>) -> Self {
        Self {
            var_name: var_name.into(),
            ..Self::default()
        }
    }

    pub fn with_long_name(mut self, long_name: impl Into<String>) -> Self {
        self.long_name = Some(long_name.into());
        self
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    pub fn with_filenames(mut self, filenames: Vec<String>) -> Self {
        self.filenames = filenames;
        self
    }

    /// Append a line to the history
    pub fn add_history(&mut self, note: &str) {
        if !self.history.is_empty() {
            self.history.push('\n');
        }
        self.history.push_str(note);
    }
}

/// Inclusive per-dimension ranges used to cut a dataset down.
///
/// Ranges are given in the dataset's own units. A longitude range whose upper
/// bound is below its lower bound wraps through the dateline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubsetSpec {
    pub ranges: BTreeMap<Dim, (f64, f64)>,
}

impl SubsetSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict one dimension to `[lo, hi]`
    pub fn with(mut self, dim: Dim, lo: f64, hi: f64) -> Self {
        self.ranges.insert(dim, (lo, hi));
        self
    }

    /// Reject malformed ranges and dimensions the schema does not have
    pub fn validate(&self, schema: &Schema) -> Result<()> {
        for (dim, (lo, hi)) in &self.ranges {
            if !schema.contains(*dim) {
                return Err(CollocError::InvalidParameter {
                    param: "subset".to_string(),
                    message: format!("Dataset has no {} coordinate", dim),
                });
            }
            if lo.is_nan() || hi.is_nan() || (*dim != Dim::Longitude && lo > hi) {
                return Err(CollocError::InvalidParameter {
                    param: "subset".to_string(),
                    message: format!("Invalid range for {}: [{}, {}]", dim, lo, hi),
                });
            }
        }
        Ok(())
    }

    /// Whether `value` of dimension `dim` lies in the requested range
    pub fn contains(&self, dim: Dim, value: f64) -> bool {
        match self.ranges.get(&dim) {
            None => true,
            Some(&(lo, hi)) if dim == Dim::Longitude => {
                if hi - lo >= 360.0 {
                    return value.is_finite();
                }
                let width = (hi - lo).rem_euclid(360.0);
                let offset = (value - lo).rem_euclid(360.0);
                offset <= width
            }
            Some(&(lo, hi)) => value >= lo && value <= hi,
        }
    }
}

/// Borrowed view of either dataset structure
#[derive(Debug, Clone, Copy)]
pub enum DataView<'a> {
    Gridded(&'a GriddedData),
    Ungridded(&'a UngriddedData),
}

impl<'a> DataView<'a> {
    /// The dataset behind the view
    pub fn data(&self) -> &'a dyn CommonData {
        match self {
            DataView::Gridded(data) => *data,
            DataView::Ungridded(data) => *data,
        }
    }

    pub fn is_gridded(&self) -> bool {
        matches!(self, DataView::Gridded(_))
    }

    pub fn schema(&self) -> &'a Schema {
        self.data().schema()
    }

    pub fn meta(&self) -> &'a VariableMeta {
        self.data().meta()
    }

    /// Lattice description in frame units, for gridded datasets
    pub fn grid_layout(&self, frame: &Frame, projector: &Projector) -> Option<GridLayout> {
        match self {
            DataView::Gridded(data) => Some(GridLayout {
                axes: data
                    .axes()
                    .iter()
                    .map(|axis| {
                        let frame_pos = frame.position(axis.coord.dim);
                        let values = match frame_pos {
                            Some(pos) => {
                                let conversion = projector.conversion(pos);
                                axis.points.iter().map(|v| conversion.apply(*v)).collect()
                            }
                            None => axis.points.clone(),
                        };
                        LayoutAxis {
                            dim: axis.coord.dim,
                            frame_pos,
                            values,
                        }
                    })
                    .collect(),
            }),
            DataView::Ungridded(_) => None,
        }
    }

    /// A dataset of the same structure carrying new values
    pub fn with_values(&self, meta: VariableMeta, values: Vec<f64>, mask: Vec<bool>) -> Result<Dataset> {
        match self {
            DataView::Gridded(data) => Ok(Dataset::Gridded(data.with_values(meta, values, mask)?)),
            DataView::Ungridded(data) => {
                Ok(Dataset::Ungridded(data.with_values(meta, values, mask)?))
            }
        }
    }
}

/// Capabilities shared by every dataset structure
pub trait CommonData {
    fn meta(&self) -> &VariableMeta;

    fn meta_mut(&mut self) -> &mut VariableMeta;

    /// Coordinate layout of every point
    fn schema(&self) -> &Schema;

    fn is_gridded(&self) -> bool;

    /// Borrow as a [`DataView`]
    fn view(&self) -> DataView<'_>;

    /// Number of points
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Locations only; values undefined, every point valid
    fn get_coordinates_points(&self) -> Vec<Point>;

    /// Every point with its value and validity
    fn get_all_points(&self) -> Vec<Point>;

    /// Only the points whose value is not masked
    fn get_non_masked_points(&self) -> Vec<Point> {
        self.get_all_points()
            .into_iter()
            .filter(Point::is_valid)
            .collect()
    }

    /// Restrict to inclusive coordinate ranges
    fn subset(&self, spec: &SubsetSpec) -> Result<Dataset>;

    fn history(&self) -> &str {
        &self.meta().history
    }

    fn var_name(&self) -> &str {
        &self.meta().var_name
    }

    /// The alias if one was set, otherwise the variable name
    fn alias(&self) -> &str {
        self.meta().alias.as_deref().unwrap_or(self.var_name())
    }

    fn set_alias(&mut self, alias: &str) {
        self.meta_mut().alias = Some(alias.to_string());
    }

    fn filenames(&self) -> &[String] {
        &self.meta().filenames
    }

    fn add_history(&mut self, note: &str) {
        self.meta_mut().add_history(note);
    }

    /// One row per point: a column per coordinate plus the value column,
    /// null where the value is masked
    fn as_data_frame(&self) -> Result<RecordBatch> {
        let schema = self.schema();
        let points = self.get_all_points();

        let mut fields = Vec::with_capacity(schema.len() + 1);
        let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.len() + 1);
        for (position, coord) in schema.coords().iter().enumerate() {
            fields.push(Field::new(coord.name.as_str(), DataType::Float64, false));
            let column: Float64Array = points.iter().map(|p| p.coord(position)).collect::<Vec<_>>().into();
            columns.push(Arc::new(column));
        }

        fields.push(Field::new(self.var_name(), DataType::Float64, true));
        let values: Float64Array = points
            .iter()
            .map(|p| p.is_usable().then_some(p.value()))
            .collect();
        columns.push(Arc::new(values));

        Ok(RecordBatch::try_new(
            Arc::new(ArrowSchema::new(fields)),
            columns,
        )?)
    }

    /// Collocate `source` onto the points of this dataset
    fn sampled_from(&self, source: &dyn CommonData, options: &CollocationOptions) -> Result<Collocated> {
        collocator::collocate(source.view(), self.view(), options)
    }

    /// Collocate this dataset onto the points of `target`
    fn collocated_onto(&self, target: &dyn CommonData, options: &CollocationOptions) -> Result<Collocated> {
        collocator::collocate(self.view(), target.view(), options)
    }
}

/// An owned dataset of either structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Dataset {
    Gridded(GriddedData),
    Ungridded(UngriddedData),
}

impl Dataset {
    fn inner(&self) -> &dyn CommonData {
        match self {
            Dataset::Gridded(data) => data,
            Dataset::Ungridded(data) => data,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn CommonData {
        match self {
            Dataset::Gridded(data) => data,
            Dataset::Ungridded(data) => data,
        }
    }

    pub fn as_gridded(&self) -> Option<&GriddedData> {
        match self {
            Dataset::Gridded(data) => Some(data),
            Dataset::Ungridded(_) => None,
        }
    }

    pub fn as_ungridded(&self) -> Option<&UngriddedData> {
        match self {
            Dataset::Gridded(_) => None,
            Dataset::Ungridded(data) => Some(data),
        }
    }

    /// Values in point order, NaN where masked
    pub fn values(&self) -> Vec<f64> {
        self.get_all_points()
            .iter()
            .map(|p| if p.is_valid() { p.value() } else { f64::NAN })
            .collect()
    }
}

impl CommonData for Dataset {
    fn meta(&self) -> &VariableMeta {
        self.inner().meta()
    }

    fn meta_mut(&mut self) -> &mut VariableMeta {
        self.inner_mut().meta_mut()
    }

    fn schema(&self) -> &Schema {
        self.inner().schema()
    }

    fn is_gridded(&self) -> bool {
        matches!(self, Dataset::Gridded(_))
    }

    fn view(&self) -> DataView<'_> {
        self.inner().view()
    }

    fn len(&self) -> usize {
        self.inner().len()
    }

    fn get_coordinates_points(&self) -> Vec<Point> {
        self.inner().get_coordinates_points()
    }

    fn get_all_points(&self) -> Vec<Point> {
        self.inner().get_all_points()
    }

    fn subset(&self, spec: &SubsetSpec) -> Result<Dataset> {
        self.inner().subset(spec)
    }
}

impl From<GriddedData> for Dataset {
    fn from(data: GriddedData) -> Self {
        Dataset::Gridded(data)
    }
}

impl From<UngriddedData> for Dataset {
    fn from(data: UngriddedData) -> Self {
        Dataset::Ungridded(data)
    }
}

/// Values stored as NaN serialise as `null`
pub(crate) fn to_nullable(values: impl IntoIterator<Item = f64>) -> Vec<Option<f64>> {
    values
        .into_iter()
        .map(|v| if v.is_nan() { None } else { Some(v) })
        .collect()
}

pub(crate) fn from_nullable(values: &[Option<f64>]) -> Vec<f64> {
    values.iter().map(|v| v.unwrap_or(f64::NAN)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_lines() {
        let mut meta = VariableMeta::new("aod");
        meta.add_history("first");
        meta.add_history("second");
        assert_eq!(meta.history, "first\nsecond");
    }

    #[test]
    fn test_alias_falls_back_to_var_name() {
        let schema = Schema::new(vec![crate::point::Coord::latitude()]).unwrap();
        let mut data =
            UngriddedData::new(VariableMeta::new("aod550"), schema, vec![vec![0.0]], vec![1.0]).unwrap();
        assert_eq!(data.alias(), "aod550");

        data.set_alias("aod");
        assert_eq!(data.alias(), "aod");
        assert_eq!(data.var_name(), "aod550");
    }

    #[test]
    fn test_subset_longitude_wraps() {
        let spec = SubsetSpec::new().with(Dim::Longitude, 170.0, -170.0);
        assert!(spec.contains(Dim::Longitude, 175.0));
        assert!(spec.contains(Dim::Longitude, -175.0));
        assert!(spec.contains(Dim::Longitude, 185.0));
        assert!(!spec.contains(Dim::Longitude, 0.0));

        let plain = SubsetSpec::new().with(Dim::Longitude, -10.0, 10.0);
        assert!(plain.contains(Dim::Longitude, 350.0));
        assert!(!plain.contains(Dim::Longitude, 20.0));
        assert!(plain.contains(Dim::Latitude, 1000.0));
    }

    #[test]
    fn test_subset_validation() {
        let schema = Schema::new(vec![crate::point::Coord::latitude()]).unwrap();
        assert!(SubsetSpec::new().with(Dim::Latitude, 0.0, 1.0).validate(&schema).is_ok());
        assert!(SubsetSpec::new().with(Dim::Latitude, 1.0, 0.0).validate(&schema).is_err());
        assert!(SubsetSpec::new().with(Dim::Time, 0.0, 1.0).validate(&schema).is_err());
    }
}
