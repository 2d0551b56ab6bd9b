// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::OceError;
use std::collections::HashSet;

/// Semantic type of a variable; decides which detectors may run on it.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VariableKind {
    ContinuousQuantitative,
    DiscreteQuantitative,
    NominalCategorical,
    BinaryCategorical,
}

impl VariableKind {
    /// Numeric detectors require a quantitative kind.
    pub fn is_quantitative(self) -> bool {
        matches!(
            self,
            Self::ContinuousQuantitative | Self::DiscreteQuantitative
        )
    }
}

/// Cell storage for one column; `None` marks a missing value.
#[derive(Clone, Debug, PartialEq)]
pub enum ColumnValues {
    Numeric(Vec<Option<f64>>),
    Categorical(Vec<Option<String>>),
}

impl ColumnValues {
    fn len(&self) -> usize {
        match self {
            Self::Numeric(v) => v.len(),
            Self::Categorical(v) => v.len(),
        }
    }
}

/// A named, typed column.
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    name: String,
    kind: VariableKind,
    values: ColumnValues,
}

impl Column {
    /// Numeric column; `kind` must be quantitative.
    pub fn numeric(
        name: impl Into<String>,
        kind: VariableKind,
        values: Vec<Option<f64>>,
    ) -> Result<Self, OceError> {
        let name = name.into();
        if !kind.is_quantitative() {
            return Err(OceError::invalid_input(format!(
                "column '{name}': numeric values require a quantitative kind; got {kind:?}"
            )));
        }
        if let Some(bad) = values.iter().flatten().find(|v| !v.is_finite()) {
            return Err(OceError::invalid_input(format!(
                "column '{name}': non-finite value {bad} (use None for missing cells)"
            )));
        }
        Ok(Self {
            name,
            kind,
            values: ColumnValues::Numeric(values),
        })
    }

    /// Categorical column; `kind` must not be quantitative.
    pub fn categorical(
        name: impl Into<String>,
        kind: VariableKind,
        values: Vec<Option<String>>,
    ) -> Result<Self, OceError> {
        let name = name.into();
        if kind.is_quantitative() {
            return Err(OceError::invalid_input(format!(
                "column '{name}': categorical values require a categorical kind; got {kind:?}"
            )));
        }
        Ok(Self {
            name,
            kind,
            values: ColumnValues::Categorical(values),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> VariableKind {
        self.kind
    }

    pub fn values(&self) -> &ColumnValues {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Immutable in-memory tabular dataset.
///
/// Records are ordered; all columns have equal length. The subject-id column
/// is designated by the caller at run time (see [`Dataset::subject_ids`])
/// rather than baked into the table.
#[derive(Clone, Debug, PartialEq)]
pub struct Dataset {
    columns: Vec<Column>,
    n_records: usize,
}

impl Dataset {
    pub fn new(columns: Vec<Column>) -> Result<Self, OceError> {
        if columns.is_empty() {
            return Err(OceError::invalid_input("dataset requires at least 1 column"));
        }

        let n_records = columns[0].len();
        if n_records == 0 {
            return Err(OceError::invalid_input("dataset requires at least 1 record"));
        }
        for column in &columns {
            if column.len() != n_records {
                return Err(OceError::invalid_input(format!(
                    "column '{}' has {} records, expected {}",
                    column.name(),
                    column.len(),
                    n_records
                )));
            }
        }

        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name().to_string()) {
                return Err(OceError::invalid_input(format!(
                    "duplicate column name '{}'",
                    column.name()
                )));
            }
        }

        Ok(Self { columns, n_records })
    }

    pub fn n_records(&self) -> usize {
        self.n_records
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Names of quantitative columns, excluding the subject-id column.
    pub fn quantitative_variables(&self, id_column: &str) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.kind().is_quantitative() && c.name() != id_column)
            .map(|c| c.name().to_string())
            .collect()
    }

    /// Extracts and validates the subject-id column: it must exist, be
    /// categorical, and hold a unique non-empty id for every record.
    pub fn subject_ids(&self, id_column: &str) -> Result<Vec<String>, OceError> {
        if id_column.is_empty() {
            return Err(OceError::invalid_input("subject-id column name is empty"));
        }
        let column = self.column(id_column).ok_or_else(|| {
            OceError::invalid_input(format!("subject-id column '{id_column}' not found"))
        })?;
        let ColumnValues::Categorical(values) = column.values() else {
            return Err(OceError::invalid_input(format!(
                "subject-id column '{id_column}' must be categorical"
            )));
        };

        let mut ids = Vec::with_capacity(values.len());
        let mut seen = HashSet::new();
        for (row, value) in values.iter().enumerate() {
            let id = value.as_deref().unwrap_or("");
            if id.is_empty() {
                return Err(OceError::invalid_input(format!(
                    "subject-id column '{id_column}' has a missing or empty id at record {row}"
                )));
            }
            if !seen.insert(id.to_string()) {
                return Err(OceError::invalid_input(format!(
                    "subject-id column '{id_column}' has duplicate id '{id}'"
                )));
            }
            ids.push(id.to_string());
        }
        Ok(ids)
    }

    /// Non-missing values of one quantitative variable, paired with the
    /// owning record's subject id.
    pub fn numeric_with_ids(
        &self,
        variable: &str,
        id_column: &str,
    ) -> Result<Vec<(String, f64)>, OceError> {
        let ids = self.subject_ids(id_column)?;
        let column = self.column(variable).ok_or_else(|| {
            OceError::invalid_input(format!("variable '{variable}' not found"))
        })?;
        let ColumnValues::Numeric(values) = column.values() else {
            return Err(OceError::invalid_input(format!(
                "variable '{variable}' is not numeric"
            )));
        };

        Ok(ids
            .into_iter()
            .zip(values.iter())
            .filter_map(|(id, value)| value.map(|v| (id, v)))
            .collect())
    }

    /// Row-complete numeric matrix over the selected variables.
    ///
    /// Rows with a missing value in any selected variable are dropped
    /// (listwise deletion); dropped records are ineligible for multivariate
    /// flagging. Returns the surviving subject ids and one row per record.
    pub fn numeric_matrix(
        &self,
        variables: &[String],
        id_column: &str,
    ) -> Result<(Vec<String>, Vec<Vec<f64>>), OceError> {
        if variables.is_empty() {
            return Err(OceError::invalid_input(
                "numeric_matrix requires at least 1 variable",
            ));
        }

        let ids = self.subject_ids(id_column)?;
        let mut numeric_columns = Vec::with_capacity(variables.len());
        for variable in variables {
            let column = self.column(variable).ok_or_else(|| {
                OceError::invalid_input(format!("variable '{variable}' not found"))
            })?;
            let ColumnValues::Numeric(values) = column.values() else {
                return Err(OceError::invalid_input(format!(
                    "variable '{variable}' is not numeric"
                )));
            };
            numeric_columns.push(values);
        }

        let mut kept_ids = Vec::new();
        let mut rows = Vec::new();
        for (record, id) in ids.into_iter().enumerate() {
            let mut row = Vec::with_capacity(variables.len());
            for values in &numeric_columns {
                match values[record] {
                    Some(v) => row.push(v),
                    None => {
                        row.clear();
                        break;
                    }
                }
            }
            if row.len() == variables.len() {
                kept_ids.push(id);
                rows.push(row);
            }
        }
        Ok((kept_ids, rows))
    }
}

#[cfg(test)]
mod tests {
    use super::{Column, Dataset, VariableKind};

    fn ids(names: &[&str]) -> Vec<Option<String>> {
        names.iter().map(|n| Some(n.to_string())).collect()
    }

    fn sample_dataset() -> Dataset {
        Dataset::new(vec![
            Column::categorical("subject", VariableKind::NominalCategorical, ids(&["A", "B", "C", "D"]))
                .expect("id column"),
            Column::numeric(
                "weight",
                VariableKind::ContinuousQuantitative,
                vec![Some(60.0), None, Some(80.0), Some(90.0)],
            )
            .expect("weight column"),
            Column::numeric(
                "visits",
                VariableKind::DiscreteQuantitative,
                vec![Some(1.0), Some(2.0), None, Some(4.0)],
            )
            .expect("visits column"),
            Column::categorical(
                "group",
                VariableKind::BinaryCategorical,
                ids(&["x", "y", "x", "y"]),
            )
            .expect("group column"),
        ])
        .expect("dataset should build")
    }

    #[test]
    fn quantitative_kinds_are_classified() {
        assert!(VariableKind::ContinuousQuantitative.is_quantitative());
        assert!(VariableKind::DiscreteQuantitative.is_quantitative());
        assert!(!VariableKind::NominalCategorical.is_quantitative());
        assert!(!VariableKind::BinaryCategorical.is_quantitative());
    }

    #[test]
    fn numeric_column_rejects_categorical_kind_and_non_finite_values() {
        assert!(Column::numeric("x", VariableKind::NominalCategorical, vec![Some(1.0)]).is_err());
        let err = Column::numeric(
            "x",
            VariableKind::ContinuousQuantitative,
            vec![Some(f64::NAN)],
        )
        .expect_err("NaN cell must fail");
        assert!(err.to_string().contains("non-finite"));
    }

    #[test]
    fn dataset_rejects_length_mismatch_and_duplicate_names() {
        let short = Column::numeric(
            "weight",
            VariableKind::ContinuousQuantitative,
            vec![Some(1.0)],
        )
        .expect("column");
        let id = Column::categorical("subject", VariableKind::NominalCategorical, ids(&["A", "B"]))
            .expect("id column");
        let err = Dataset::new(vec![id.clone(), short]).expect_err("mismatch must fail");
        assert!(err.to_string().contains("expected 2"));

        let err = Dataset::new(vec![id.clone(), id]).expect_err("duplicate must fail");
        assert!(err.to_string().contains("duplicate column name"));
    }

    #[test]
    fn quantitative_variables_exclude_the_id_column() {
        let data = sample_dataset();
        assert_eq!(
            data.quantitative_variables("subject"),
            vec!["weight".to_string(), "visits".to_string()]
        );
    }

    #[test]
    fn subject_ids_validate_presence_and_uniqueness() {
        let data = sample_dataset();
        assert_eq!(
            data.subject_ids("subject").expect("ids should extract"),
            vec!["A", "B", "C", "D"]
        );

        let err = data.subject_ids("nope").expect_err("unknown column");
        assert!(err.to_string().contains("not found"));

        let err = data.subject_ids("").expect_err("empty name");
        assert!(err.to_string().contains("empty"));

        let dup = Dataset::new(vec![
            Column::categorical("subject", VariableKind::NominalCategorical, ids(&["A", "A"]))
                .expect("id column"),
            Column::numeric(
                "x",
                VariableKind::ContinuousQuantitative,
                vec![Some(1.0), Some(2.0)],
            )
            .expect("x column"),
        ])
        .expect("dataset");
        let err = dup.subject_ids("subject").expect_err("duplicate ids");
        assert!(err.to_string().contains("duplicate id 'A'"));
    }

    #[test]
    fn numeric_with_ids_skips_missing_cells() {
        let data = sample_dataset();
        let pairs = data
            .numeric_with_ids("weight", "subject")
            .expect("extraction should succeed");
        assert_eq!(
            pairs,
            vec![
                ("A".to_string(), 60.0),
                ("C".to_string(), 80.0),
                ("D".to_string(), 90.0)
            ]
        );
    }

    #[test]
    fn numeric_matrix_applies_listwise_deletion() {
        let data = sample_dataset();
        let (kept, rows) = data
            .numeric_matrix(
                &["weight".to_string(), "visits".to_string()],
                "subject",
            )
            .expect("matrix should build");
        // B misses weight, C misses visits; only A and D are complete.
        assert_eq!(kept, vec!["A".to_string(), "D".to_string()]);
        assert_eq!(rows, vec![vec![60.0, 1.0], vec![90.0, 4.0]]);
    }

    #[test]
    fn numeric_matrix_rejects_unknown_or_non_numeric_variables() {
        let data = sample_dataset();
        assert!(data
            .numeric_matrix(&["nope".to_string()], "subject")
            .is_err());
        assert!(data
            .numeric_matrix(&["group".to_string()], "subject")
            .is_err());
        assert!(data.numeric_matrix(&[], "subject").is_err());
    }
}
