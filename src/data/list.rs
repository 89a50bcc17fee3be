//! Homogeneous collections of datasets.

use crate::error::{CollocError, Result};
use crate::point::Schema;

use super::{CommonData, Dataset};

/// A list of datasets that all share the same structure
#[derive(Debug, Clone, PartialEq)]
pub struct DataList {
    is_gridded: bool,
    items: Vec<Dataset>,
}

impl DataList {
    /// An empty list of gridded datasets
    pub fn gridded() -> Self {
        Self {
            is_gridded: true,
            items: Vec::new(),
        }
    }

    /// An empty list of ungridded datasets
    pub fn ungridded() -> Self {
        Self {
            is_gridded: false,
            items: Vec::new(),
        }
    }

    pub fn is_gridded(&self) -> bool {
        self.is_gridded
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Dataset> {
        self.items.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Dataset> {
        self.items.get(index)
    }

    fn check(&self, item: &Dataset) -> Result<()> {
        if item.is_gridded() != self.is_gridded {
            let kind = |gridded| if gridded { "gridded" } else { "ungridded" };
            return Err(CollocError::TypeMismatch {
                message: format!(
                    "Cannot add {} data '{}' to a list of {} data",
                    kind(item.is_gridded()),
                    item.var_name(),
                    kind(self.is_gridded)
                ),
            });
        }
        Ok(())
    }

    /// Add one dataset; the list is unchanged on error
    pub fn append(&mut self, item: Dataset) -> Result<()> {
        self.check(&item)?;
        self.items.push(item);
        Ok(())
    }

    /// Add several datasets; nothing is added unless every one is accepted
    pub fn extend(&mut self, items: impl IntoIterator<Item = Dataset>) -> Result<()> {
        let items: Vec<Dataset> = items.into_iter().collect();
        for item in &items {
            self.check(item)?;
        }
        self.items.extend(items);
        Ok(())
    }

    /// Variable names of every member, in order
    pub fn var_names(&self) -> Vec<String> {
        self.items.iter().map(|d| d.var_name().to_string()).collect()
    }

    /// Filenames of every member, concatenated in order
    pub fn filenames(&self) -> Vec<String> {
        self.items
            .iter()
            .flat_map(|d| d.filenames().iter().cloned())
            .collect()
    }

    /// Add a note to the history of every member
    pub fn add_history(&mut self, note: &str) {
        for item in &mut self.items {
            item.add_history(note);
        }
    }

    /// Coordinate schema of the first member
    pub fn coords(&self) -> Option<&Schema> {
        self.items.first().map(|d| d.schema())
    }
}

impl TryFrom<Vec<Dataset>> for DataList {
    type Error = CollocError;

    /// Build a list whose structure follows the first member
    fn try_from(items: Vec<Dataset>) -> Result<Self> {
        let mut list = match items.first() {
            Some(first) if !first.is_gridded() => DataList::ungridded(),
            _ => DataList::gridded(),
        };
        list.extend(items)?;
        Ok(list)
    }
}

impl<'a> IntoIterator for &'a DataList {
    type Item = &'a Dataset;
    type IntoIter = std::slice::Iter<'a, Dataset>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
