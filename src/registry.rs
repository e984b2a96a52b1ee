//! Dataset Registry
//!
//! Static descriptions of every queryable table: columns, value domains and
//! the preferred query shape handed to the SQL generator. Loaded once at
//! startup and never mutated afterwards.

use crate::error::{Result, ScoutError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// One column of a dataset
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnDescriptor {
    pub name: String,

    /// SQL type as the model should see it (e.g. "INTEGER", "TEXT")
    pub sql_type: String,

    /// Allowed values or numeric range, if constrained
    #[serde(default)]
    pub domain: Option<String>,

    pub description: String,
}

/// Schema, semantics and preferred query shape for one table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatasetDescriptor {
    /// Table name as referenced in SQL
    pub name: String,

    /// Uppercase token the router uses to select this dataset
    pub marker: String,

    /// One-paragraph summary of what the dataset covers
    pub summary: String,

    pub columns: Vec<ColumnDescriptor>,

    /// Example query shape biasing the generator toward aggregated results
    pub preferred_query: String,
}

impl DatasetDescriptor {
    /// Schema text handed verbatim to the SQL generator
    pub fn schema_text(&self) -> String {
        let mut lines = vec![format!("Table: {}", self.name), "Columns:".to_string()];
        for column in &self.columns {
            let mut line = format!("- {} ({}): {}", column.name, column.sql_type, column.description);
            if let Some(ref domain) = column.domain {
                line.push_str(&format!(" [{}]", domain));
            }
            lines.push(line);
        }
        lines.join("\n")
    }
}

/// Immutable set of dataset descriptors
#[derive(Debug, Clone)]
pub struct DatasetRegistry {
    datasets: Vec<Arc<DatasetDescriptor>>,
}

impl DatasetRegistry {
    pub fn new(datasets: Vec<DatasetDescriptor>) -> Result<Self> {
        if datasets.is_empty() {
            return Err(ScoutError::Registry("registry must contain at least one dataset".to_string()));
        }

        let mut seen = std::collections::HashSet::new();
        for dataset in &datasets {
            let marker = dataset.marker.to_uppercase();
            if marker.is_empty() || !marker.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(ScoutError::Registry(format!(
                    "dataset '{}' has invalid marker '{}'",
                    dataset.name, dataset.marker
                )));
            }
            if !seen.insert(marker) {
                return Err(ScoutError::Registry(format!("duplicate dataset marker '{}'", dataset.marker)));
            }
        }

        Ok(Self {
            datasets: datasets.into_iter().map(Arc::new).collect(),
        })
    }

    /// Load descriptors from a JSON array file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ScoutError::Registry(format!("failed to read registry {}: {}", path.display(), e))
        })?;
        let datasets: Vec<DatasetDescriptor> = serde_json::from_str(&content)?;
        Self::new(datasets)
    }

    /// Student performance dataset served from the local SQLite file
    pub fn student() -> Self {
        Self {
            datasets: vec![Arc::new(student_demographic())],
        }
    }

    /// Google Trends top terms served from BigQuery
    pub fn google_trends() -> Self {
        Self {
            datasets: vec![Arc::new(google_trends_top_terms())],
        }
    }

    /// Resolve a router token against markers and table names
    pub fn resolve(&self, token: &str) -> Option<Arc<DatasetDescriptor>> {
        self.datasets
            .iter()
            .find(|d| d.marker.eq_ignore_ascii_case(token) || d.name.eq_ignore_ascii_case(token))
            .cloned()
    }

    pub fn datasets(&self) -> &[Arc<DatasetDescriptor>] {
        &self.datasets
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    /// The only dataset, when there is exactly one
    pub fn single(&self) -> Option<Arc<DatasetDescriptor>> {
        match self.datasets.as_slice() {
            [only] => Some(Arc::clone(only)),
            _ => None,
        }
    }

    /// Marker and summary lines for the routing prompt
    pub fn routing_overview(&self) -> String {
        self.datasets
            .iter()
            .map(|d| format!("- {} (table `{}`): {}", d.marker, d.name, d.summary))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Human-readable description of every dataset, used by the chat front end
    pub fn describe(&self) -> String {
        self.datasets
            .iter()
            .map(|d| format!("{}\n{}", d.summary, d.schema_text()))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

fn column(name: &str, sql_type: &str, domain: Option<&str>, description: &str) -> ColumnDescriptor {
    ColumnDescriptor {
        name: name.to_string(),
        sql_type: sql_type.to_string(),
        domain: domain.map(str::to_string),
        description: description.to_string(),
    }
}

fn student_demographic() -> DatasetDescriptor {
    DatasetDescriptor {
        name: "student_demographic".to_string(),
        marker: "DEMOGRAPHIC".to_string(),
        summary: "Secondary-school students from two Portuguese schools: demographics, family background, \
                  study habits, social life, alcohol consumption, health, absences and the three period grades."
            .to_string(),
        columns: vec![
            column("school", "TEXT", Some("'GP' or 'MS'"), "student's school"),
            column("sex", "TEXT", Some("'F' or 'M'"), "student's sex"),
            column("age", "INTEGER", Some("15 to 22"), "student's age"),
            column("address", "TEXT", Some("'U' urban or 'R' rural"), "home address type"),
            column("famsize", "TEXT", Some("'LE3' or 'GT3'"), "family size"),
            column("Pstatus", "TEXT", Some("'T' together or 'A' apart"), "parents' cohabitation status"),
            column("Medu", "INTEGER", Some("0 none to 4 higher education"), "mother's education"),
            column("Fedu", "INTEGER", Some("0 none to 4 higher education"), "father's education"),
            column("Mjob", "TEXT", Some("'teacher', 'health', 'services', 'at_home', 'other'"), "mother's job"),
            column("Fjob", "TEXT", Some("'teacher', 'health', 'services', 'at_home', 'other'"), "father's job"),
            column("reason", "TEXT", Some("'home', 'reputation', 'course', 'other'"), "reason to choose this school"),
            column("guardian", "TEXT", Some("'mother', 'father', 'other'"), "student's guardian"),
            column("traveltime", "INTEGER", Some("1 (<15 min) to 4 (>1 hour)"), "home to school travel time"),
            column("studytime", "INTEGER", Some("1 (<2 hours) to 4 (>10 hours)"), "weekly study time"),
            column("failures", "INTEGER", Some("0 to 4"), "number of past class failures"),
            column("schoolsup", "TEXT", Some("'yes' or 'no'"), "extra educational support"),
            column("famsup", "TEXT", Some("'yes' or 'no'"), "family educational support"),
            column("paid", "TEXT", Some("'yes' or 'no'"), "extra paid classes"),
            column("activities", "TEXT", Some("'yes' or 'no'"), "extra-curricular activities"),
            column("nursery", "TEXT", Some("'yes' or 'no'"), "attended nursery school"),
            column("higher", "TEXT", Some("'yes' or 'no'"), "wants to take higher education"),
            column("internet", "TEXT", Some("'yes' or 'no'"), "internet access at home"),
            column("romantic", "TEXT", Some("'yes' or 'no'"), "in a romantic relationship"),
            column("famrel", "INTEGER", Some("1 very bad to 5 excellent"), "quality of family relationships"),
            column("freetime", "INTEGER", Some("1 very low to 5 very high"), "free time after school"),
            column("goout", "INTEGER", Some("1 very low to 5 very high"), "going out with friends"),
            column("Dalc", "INTEGER", Some("1 very low to 5 very high"), "workday alcohol consumption"),
            column("Walc", "INTEGER", Some("1 very low to 5 very high"), "weekend alcohol consumption"),
            column("health", "INTEGER", Some("1 very bad to 5 very good"), "current health status"),
            column("absences", "INTEGER", Some("0 to 93"), "number of school absences"),
            column("G1", "INTEGER", Some("0 to 20"), "first period grade"),
            column("G2", "INTEGER", Some("0 to 20"), "second period grade"),
            column("G3", "INTEGER", Some("0 to 20"), "final grade"),
        ],
        preferred_query: "SELECT <group_column>, COUNT(*) AS students, ROUND(AVG(<measure_column>), 2) AS avg_<measure>\n\
                          FROM student_demographic\n\
                          GROUP BY <group_column>\n\
                          ORDER BY <group_column>\n\
                          LIMIT <max_rows>;"
            .to_string(),
    }
}

fn google_trends_top_terms() -> DatasetDescriptor {
    DatasetDescriptor {
        name: "`bigquery-public-data.google_trends.top_terms`".to_string(),
        marker: "TRENDS".to_string(),
        summary: "Weekly top 25 Google search terms per US designated market area (DMA), with popularity \
                  score and rank, refreshed daily."
            .to_string(),
        columns: vec![
            column("refresh_date", "DATE", None, "the date the data was refreshed"),
            column("dma_name", "STRING", None, "the name of the designated market area"),
            column("dma_id", "INTEGER", None, "the numeric ID of the DMA"),
            column("term", "STRING", None, "the search term"),
            column("week", "DATE", None, "the week of the trend data"),
            column("score", "INTEGER", Some("0 to 100 or NULL"), "the popularity score of the term"),
            column("rank", "INTEGER", Some("1 to 25"), "the rank of the term for that week and DMA"),
        ],
        preferred_query: "SELECT term, ROUND(AVG(rank), 2) AS avg_rank, COUNT(*) AS num_entries\n\
                          FROM `bigquery-public-data.google_trends.top_terms`\n\
                          WHERE refresh_date = (SELECT MAX(refresh_date) FROM `bigquery-public-data.google_trends.top_terms`)\n\
                          GROUP BY term\n\
                          ORDER BY avg_rank ASC\n\
                          LIMIT <max_rows>;"
            .to_string(),
    }
}
