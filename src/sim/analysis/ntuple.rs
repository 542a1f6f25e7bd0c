use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::error::DetectorError;

/// Row-oriented table of double columns, one row per event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ntuple {
    pub name: String,
    pub title: String,
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
    #[serde(skip)]
    current: Vec<f64>,
    #[serde(skip)]
    finished: bool,
}

impl Ntuple {
    pub fn new(name: &str, title: &str) -> Self {
        Self {
            name: name.to_string(),
            title: title.to_string(),
            columns: Vec::new(),
            rows: Vec::new(),
            current: Vec::new(),
            finished: false,
        }
    }

    pub fn create_d_column(&mut self, name: &str) -> Result<usize> {
        if self.finished {
            bail!(booking(format!(
                "n-tuple '{}' is finished, cannot add column '{name}'",
                self.name
            )));
        }
        if self.columns.iter().any(|c| c == name) {
            bail!(booking(format!(
                "column '{name}' already exists in n-tuple '{}'",
                self.name
            )));
        }
        self.columns.push(name.to_string());
        Ok(self.columns.len() - 1)
    }

    pub fn finish(&mut self) -> Result<()> {
        if self.columns.is_empty() {
            bail!(booking(format!("n-tuple '{}' has no columns", self.name)));
        }
        self.finished = true;
        self.current = vec![0.0; self.columns.len()];
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn fill_d_column(&mut self, id: usize, value: f64) -> Result<()> {
        if !self.finished {
            bail!(booking(format!("n-tuple '{}' is not finished", self.name)));
        }
        let Some(slot) = self.current.get_mut(id) else {
            bail!(booking(format!(
                "column {id} does not exist in n-tuple '{}' ({} columns)",
                self.name,
                self.columns.len()
            )));
        };
        *slot = value;
        Ok(())
    }

    /// Appends the current row and clears it for the next event.
    pub fn add_row(&mut self) -> Result<()> {
        if !self.finished {
            bail!(booking(format!("n-tuple '{}' is not finished", self.name)));
        }
        let row = std::mem::replace(&mut self.current, vec![0.0; self.columns.len()]);
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Appends the rows of an n-tuple with the same columns.
    pub fn merge(&mut self, other: &Self) -> Result<()> {
        if self.columns != other.columns {
            bail!(booking(format!(
                "cannot merge n-tuple '{}' into '{}': columns differ",
                other.name, self.name
            )));
        }
        self.rows.extend(other.rows.iter().cloned());
        Ok(())
    }
}

fn booking(msg: String) -> DetectorError {
    DetectorError::Booking(msg)
}
