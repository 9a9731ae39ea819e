//! Raw input tables and the places they come from.
//!
//! A [`RawTable`] is the untouched shape of an input: header names exactly as
//! the source spelled them and rows of text cells. Files are read by
//! [`file::load_table`]; the ad-platform reporting API is read by
//! [`remote::GraphClient`].

pub mod actions;
pub mod file;
pub mod remote;

pub use file::load_table;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Builds a table, padding or truncating every row to the header width.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Self { headers, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Appends `other` below `self`, aligning columns by name. Columns only
    /// one side knows about are blank on the other side's rows.
    pub fn append(&mut self, other: RawTable) {
        if self.headers.is_empty() && self.rows.is_empty() {
            *self = other;
            return;
        }
        let mapping = other
            .headers
            .iter()
            .map(|name| match self.column_index(name) {
                Some(idx) => idx,
                None => {
                    self.headers.push(name.clone());
                    self.headers.len() - 1
                }
            })
            .collect::<Vec<_>>();
        let width = self.headers.len();
        for row in &mut self.rows {
            row.resize(width, String::new());
        }
        for row in other.rows {
            let mut aligned = vec![String::new(); width];
            for (value, &target) in row.into_iter().zip(&mapping) {
                aligned[target] = value;
            }
            self.rows.push(aligned);
        }
    }
}
