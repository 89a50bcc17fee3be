//! Ungridded datasets: a scatter of points, each with its own coordinates.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::{CollocError, Result};
use crate::point::{Point, Schema};

use super::{from_nullable, to_nullable, CommonData, DataView, Dataset, SubsetSpec, VariableMeta};

/// Values at arbitrary points; one coordinate column per schema entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "UngriddedRepr", into = "UngriddedRepr")]
pub struct UngriddedData {
    meta: VariableMeta,
    schema: Schema,
    coords: Vec<Array1<f64>>,
    values: Array1<f64>,
    mask: Array1<bool>,
}

/// Serialised form; missing coordinates and values are `null`
#[derive(Debug, Clone, Serialize, Deserialize)]
struct UngriddedRepr {
    meta: VariableMeta,
    schema: Schema,
    coords: Vec<Vec<Option<f64>>>,
    values: Vec<Option<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mask: Option<Vec<bool>>,
}

impl TryFrom<UngriddedRepr> for UngriddedData {
    type Error = CollocError;

    fn try_from(repr: UngriddedRepr) -> Result<Self> {
        let mask = repr
            .mask
            .unwrap_or_else(|| repr.values.iter().map(Option::is_none).collect());
        let coords = repr.coords.iter().map(|c| from_nullable(c)).collect();
        UngriddedData::new(repr.meta, repr.schema, coords, from_nullable(&repr.values))?
            .with_mask(mask)
    }
}

impl From<UngriddedData> for UngriddedRepr {
    fn from(data: UngriddedData) -> Self {
        let masked = data.mask.iter().any(|m| *m);
        UngriddedRepr {
            coords: data
                .coords
                .iter()
                .map(|c| to_nullable(c.iter().copied()))
                .collect(),
            values: to_nullable(data.values.iter().copied()),
            mask: masked.then(|| data.mask.to_vec()),
            meta: data.meta,
            schema: data.schema,
        }
    }
}

impl UngriddedData {
    /// Create a dataset from coordinate columns (in schema order) and values
    pub fn new(meta: VariableMeta, schema: Schema, coords: Vec<Vec<f64>>, values: Vec<f64>) -> Result<Self> {
        if coords.len() != schema.len() {
            return Err(CollocError::InvalidCoordinates {
                message: format!(
                    "Expected {} coordinate columns, got {}",
                    schema.len(),
                    coords.len()
                ),
            });
        }
        if let Some((coord, column)) = schema
            .coords()
            .iter()
            .zip(&coords)
            .find(|(_, column)| column.len() != values.len())
        {
            return Err(CollocError::InvalidCoordinates {
                message: format!(
                    "Coordinate {} has {} values but there are {} data values",
                    coord.name,
                    column.len(),
                    values.len()
                ),
            });
        }

        let mask = Array1::from_elem(values.len(), false);
        Ok(Self {
            meta,
            schema,
            coords: coords.into_iter().map(Array1::from).collect(),
            values: Array1::from(values),
            mask,
        })
    }

    /// Create a dataset from points laid out according to `schema`
    pub fn from_points(meta: VariableMeta, schema: Schema, points: &[Point]) -> Result<Self> {
        if let Some(point) = points.iter().find(|p| p.dimensionality() != schema.len()) {
            return Err(CollocError::InvalidCoordinates {
                message: format!(
                    "Point has {} coordinates but the schema has {}",
                    point.dimensionality(),
                    schema.len()
                ),
            });
        }

        let coords = (0..schema.len())
            .map(|k| points.iter().map(|p| p.coord(k)).collect())
            .collect();
        let values = points.iter().map(Point::value).collect();
        let mask = points.iter().map(|p| !p.is_valid()).collect();
        Self::new(meta, schema, coords, values)?.with_mask(mask)
    }

    /// Attach a mask; `true` marks a missing value
    pub fn with_mask(mut self, mask: Vec<bool>) -> Result<Self> {
        if mask.len() != self.values.len() {
            return Err(CollocError::InvalidCoordinates {
                message: format!(
                    "Mask has {} entries but there are {} values",
                    mask.len(),
                    self.values.len()
                ),
            });
        }
        self.mask = Array1::from(mask);
        Ok(self)
    }

    /// Mask every value that is not finite
    pub fn mask_non_finite(mut self) -> Self {
        self.mask.zip_mut_with(&self.values, |m, v| *m = *m || !v.is_finite());
        self
    }

    /// The same points with new values
    pub fn with_values(&self, meta: VariableMeta, values: Vec<f64>, mask: Vec<bool>) -> Result<Self> {
        let coords = self.coords.iter().map(|c| c.to_vec()).collect();
        Self::new(meta, self.schema.clone(), coords, values)?.with_mask(mask)
    }

    /// Coordinate column at a schema position
    pub fn coord_column(&self, position: usize) -> &Array1<f64> {
        &self.coords[position]
    }

    pub fn values(&self) -> &Array1<f64> {
        &self.values
    }

    pub fn mask(&self) -> &Array1<bool> {
        &self.mask
    }

    fn coords_at(&self, i: usize) -> Vec<f64> {
        self.coords.iter().map(|c| c[i]).collect()
    }

    fn rows(&self, keep: &[usize]) -> Result<Self> {
        let coords = self
            .coords
            .iter()
            .map(|c| keep.iter().map(|&i| c[i]).collect())
            .collect();
        let values = keep.iter().map(|&i| self.values[i]).collect();
        let mask = keep.iter().map(|&i| self.mask[i]).collect();
        Self::new(self.meta.clone(), self.schema.clone(), coords, values)?.with_mask(mask)
    }
}

impl CommonData for UngriddedData {
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
        false
    }

    fn view(&self) -> DataView<'_> {
        DataView::Ungridded(self)
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
        (0..self.len())
            .map(|i| Point::new(self.coords_at(i), self.values[i], !self.mask[i]))
            .collect()
    }

    fn subset(&self, spec: &SubsetSpec) -> Result<Dataset> {
        spec.validate(&self.schema)?;

        let keep: Vec<usize> = (0..self.len())
            .filter(|&i| {
                self.schema
                    .coords()
                    .iter()
                    .enumerate()
                    .all(|(k, coord)| spec.contains(coord.dim, self.coords[k][i]))
            })
            .collect();

        if keep.is_empty() {
            return Err(CollocError::InsufficientData {
                message: format!("No points of {} lie within the subset", self.meta.var_name),
            });
        }
        Ok(Dataset::Ungridded(self.rows(&keep)?))
    }
}
