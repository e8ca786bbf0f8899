use serde::{Deserialize, Serialize};

/// One named column of a dataset. Undefined cells are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

impl Column {
    pub fn is_question(&self) -> bool {
        is_question_id(&self.name)
    }

    pub fn defined(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().filter_map(|value| *value)
    }
}

/// Question identifiers look like `s1-3`; anything without a hyphen is metadata.
pub fn is_question_id(name: &str) -> bool {
    name.contains('-')
}

/// Column-major table of responses for one survey family, or a row-joined
/// union of several. Columns keep first-appearance order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<Column>,
    rows: usize,
}

impl Dataset {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: usize) -> Self {
        Self {
            columns: Vec::new(),
            rows,
        }
    }

    /// True when there is nothing to aggregate: no rows or no columns.
    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.columns.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn question_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|column| column.is_question())
    }

    /// Adds (or replaces) a column. Values are padded or cut to the row count.
    pub fn push_column(&mut self, name: impl Into<String>, mut values: Vec<Option<f64>>) {
        values.resize(self.rows, None);
        let name = name.into();
        match self.columns.iter_mut().find(|column| column.name == name) {
            Some(existing) => existing.values = values,
            None => self.columns.push(Column { name, values }),
        }
    }

    /// Appends rows read under `headers`, outer-joining on column names.
    /// Columns missing from this batch are filled with `None`, and columns
    /// new to the dataset are back-filled with `None` for earlier rows.
    pub fn append_rows(&mut self, headers: &[String], rows: &[Vec<Option<f64>>]) {
        let previous = self.rows;
        let added = rows.len();

        for column in &mut self.columns {
            column.values.resize(previous + added, None);
        }

        for (position, header) in headers.iter().enumerate() {
            if headers[..position].contains(header) {
                continue;
            }
            let index = match self.columns.iter().position(|c| &c.name == header) {
                Some(index) => index,
                None => {
                    self.columns.push(Column {
                        name: header.clone(),
                        values: vec![None; previous + added],
                    });
                    self.columns.len() - 1
                }
            };
            let column = &mut self.columns[index];
            for (offset, row) in rows.iter().enumerate() {
                column.values[previous + offset] = row.get(position).copied().flatten();
            }
        }

        self.rows = previous + added;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefixCategory {
    pub name: String,
    pub prefix: String,
}

/// Descriptive statistics over the defined observations of one score column.
/// Every field is `None` when there was nothing to summarize.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Summary {
    pub count: usize,
    pub min: Option<f64>,
    pub q1: Option<f64>,
    pub median: Option<f64>,
    pub mean: Option<f64>,
    pub q3: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundPair {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryStatistics {
    pub category: String,
    pub theoretical_min: f64,
    #[serde(flatten)]
    pub summary: Summary,
    pub theoretical_max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionScore {
    pub id: String,
    pub prompt: String,
    pub mean: f64,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RadarPoint {
    pub category: String,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryDistribution {
    pub category: String,
    pub summary: Summary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngagementScore {
    pub category: String,
    pub index: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormulaFailure {
    pub category: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FamilyContent {
    pub respondents: usize,
    pub columns: Vec<String>,
    pub lowest_questions: Vec<QuestionScore>,
    pub radar: Vec<RadarPoint>,
    pub distributions: Vec<CategoryDistribution>,
    pub engagement: Vec<EngagementScore>,
    pub commentary: String,
}

/// Everything the presentation layer needs for one survey family.
/// `content` is `None` when the family has no data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FamilyPanel {
    pub family: String,
    pub label: String,
    pub content: Option<FamilyContent>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetaPanel {
    pub missing_families: Vec<String>,
    pub respondents: usize,
    pub rows: Vec<CategoryStatistics>,
    pub failures: Vec<FormulaFailure>,
}

impl MetaPanel {
    pub fn is_available(&self) -> bool {
        self.missing_families.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_rows_outer_joins_columns() {
        let mut dataset = Dataset::empty();
        dataset.append_rows(
            &["s1-1".to_string(), "s1-2".to_string()],
            &[vec![Some(4.0), Some(8.0)]],
        );
        dataset.append_rows(
            &["s1-2".to_string(), "s2-1".to_string()],
            &[vec![Some(5.0), Some(7.0)], vec![None, Some(3.0)]],
        );

        assert_eq!(dataset.row_count(), 3);
        assert_eq!(
            dataset.column("s1-1").map(|c| c.values.clone()),
            Some(vec![Some(4.0), None, None])
        );
        assert_eq!(
            dataset.column("s1-2").map(|c| c.values.clone()),
            Some(vec![Some(8.0), Some(5.0), None])
        );
        assert_eq!(
            dataset.column("s2-1").map(|c| c.values.clone()),
            Some(vec![None, Some(7.0), Some(3.0)])
        );
    }

    #[test]
    fn question_columns_skip_metadata() {
        let mut dataset = Dataset::empty();
        dataset.append_rows(
            &["timestamp".to_string(), "s1-1".to_string()],
            &[vec![None, Some(2.0)]],
        );
        let names: Vec<&str> = dataset.question_columns().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["s1-1"]);
    }

    #[test]
    fn empty_when_no_rows_or_columns() {
        assert!(Dataset::empty().is_empty());
        assert!(Dataset::with_rows(3).is_empty());
        let mut dataset = Dataset::empty();
        dataset.append_rows(&["s1-1".to_string()], &[]);
        assert!(dataset.is_empty());
    }
}
