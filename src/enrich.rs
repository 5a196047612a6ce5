//! Enrichment tables
//!
//! A table lists target entities (rows) and enrichment fields (columns).
//! Every missing cell is looked up with a single-field research session;
//! the row's already-known cells are passed along as context.
//!
//! On disk a table is plain JSON:
//!
//! ```json
//! {
//!   "columns": ["ceo", "headquarters"],
//!   "rows": [
//!     { "target": "Acme Corp", "enrichment_fields": { "ceo": "Jane Doe", "headquarters": null } }
//!   ]
//! }
//! ```
//!
//! `null` marks a pending cell; a failed lookup is stored as `{"failed": "<reason>"}`.

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{SchemaError, TableError};
use crate::orchestrator::{Orchestrator, RunRequest};
use crate::schema::is_identifier;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(untagged)]
pub enum CellValue {
    Filled(String),
    Failed { failed: String },
    #[default]
    Pending,
}

impl CellValue {
    pub fn is_pending(&self) -> bool {
        matches!(self, CellValue::Pending)
    }

    pub fn as_filled(&self) -> Option<&str> {
        match self {
            CellValue::Filled(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnrichmentRow {
    pub target: String,
    #[serde(default)]
    pub enrichment_fields: BTreeMap<String, CellValue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EnrichmentTable {
    pub columns: Vec<String>,
    pub rows: Vec<EnrichmentRow>,
}

/// A cell awaiting research.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCell {
    pub row: usize,
    pub column: String,
}

impl EnrichmentTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, TableError> {
        let text = std::fs::read_to_string(path)?;
        let mut table: EnrichmentTable = serde_json::from_str(&text)?;
        table.normalize()?;
        Ok(table)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), TableError> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Add an enrichment field; every existing row gets a pending cell.
    pub fn add_column(&mut self, name: &str) -> Result<(), TableError> {
        if !is_identifier(name) {
            return Err(SchemaError::InvalidFieldName(name.to_string()).into());
        }
        if self.columns.iter().any(|c| c == name) {
            return Err(SchemaError::DuplicateField(name.to_string()).into());
        }

        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.enrichment_fields.insert(name.to_string(), CellValue::Pending);
        }
        Ok(())
    }

    /// Add a target entity with every column pending.
    pub fn add_target(&mut self, target: &str) -> Result<(), TableError> {
        if self.rows.iter().any(|r| r.target == target) {
            return Err(TableError::DuplicateTarget(target.to_string()));
        }

        self.rows.push(EnrichmentRow {
            target: target.to_string(),
            enrichment_fields: self
                .columns
                .iter()
                .map(|c| (c.clone(), CellValue::Pending))
                .collect(),
        });
        Ok(())
    }

    /// Pending cells, row by row, columns in table order.
    pub fn pending_cells(&self) -> Vec<PendingCell> {
        self.rows
            .iter()
            .enumerate()
            .flat_map(|(row, r)| {
                self.columns
                    .iter()
                    .filter(move |c| r.enrichment_fields.get(*c).map_or(true, CellValue::is_pending))
                    .map(move |c| PendingCell { row, column: c.clone() })
            })
            .collect()
    }

    /// Mark failed cells pending again so the next run retries them.
    pub fn reset_failed(&mut self) -> usize {
        let mut reset = 0;
        for value in self.rows.iter_mut().flat_map(|r| r.enrichment_fields.values_mut()) {
            if matches!(value, CellValue::Failed { .. }) {
                *value = CellValue::Pending;
                reset += 1;
            }
        }
        reset
    }

    /// Research request for one cell: the row's target plus its filled fields.
    pub fn request_for(&self, cell: &PendingCell) -> Option<RunRequest> {
        let row = self.rows.get(cell.row)?;

        let mut input_info = Map::new();
        input_info.insert("target".to_string(), Value::String(row.target.clone()));
        for column in &self.columns {
            if let Some(value) = row.enrichment_fields.get(column).and_then(CellValue::as_filled) {
                input_info.insert(column.clone(), Value::String(value.to_string()));
            }
        }

        Some(RunRequest::target(input_info, cell.column.clone()))
    }

    /// Validate column names and give every row a cell for every column.
    fn normalize(&mut self) -> Result<(), TableError> {
        let mut seen = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            if !is_identifier(column) {
                return Err(SchemaError::InvalidFieldName(column.clone()).into());
            }
            if seen.contains(&column) {
                return Err(SchemaError::DuplicateField(column.clone()).into());
            }
            seen.push(column);
        }

        for row in &mut self.rows {
            for column in &self.columns {
                row.enrichment_fields.entry(column.clone()).or_default();
            }
        }
        Ok(())
    }
}

/// Outcome counts of one enrichment pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EnrichmentSummary {
    pub filled: usize,
    pub failed: usize,
}

/// Fills pending cells by running one research session per cell.
pub struct Enricher {
    orchestrator: Orchestrator,
    concurrency: usize,
}

impl Enricher {
    pub fn new(orchestrator: Orchestrator, concurrency: usize) -> Self {
        Self {
            orchestrator,
            concurrency: concurrency.max(1),
        }
    }

    /// Research every pending cell, at most `concurrency` sessions at a time.
    ///
    /// A failed session marks its cell failed; it never stops the others.
    pub async fn run(&self, table: &mut EnrichmentTable) -> EnrichmentSummary {
        let jobs: Vec<(PendingCell, RunRequest)> = table
            .pending_cells()
            .into_iter()
            .filter_map(|cell| table.request_for(&cell).map(|request| (cell, request)))
            .collect();

        info!(cells = jobs.len(), concurrency = self.concurrency, "Enriching table");

        let outcomes: Vec<(PendingCell, CellValue)> = stream::iter(jobs)
            .map(|(cell, request)| async move {
                let value = match self.orchestrator.run(&request).await {
                    Ok(output) => CellValue::Filled(output.as_text()),
                    Err(e) => {
                        warn!(subject = %request.label(), error = %e, "Cell research failed");
                        CellValue::Failed { failed: e.to_string() }
                    }
                };
                (cell, value)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut summary = EnrichmentSummary::default();
        for (cell, value) in outcomes {
            match value {
                CellValue::Filled(_) => summary.filled += 1,
                _ => summary.failed += 1,
            }
            if let Some(row) = table.rows.get_mut(cell.row) {
                row.enrichment_fields.insert(cell.column, value);
            }
        }

        info!(filled = summary.filled, failed = summary.failed, "Enrichment complete");
        summary
    }
}
