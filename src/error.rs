use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    /// The input file is malformed or incomplete as a whole.
    #[error("Failed to parse {source_name}: {reason}")]
    Parse { source_name: String, reason: String },

    /// A numeric cell could not be read.
    #[error("Invalid value {value:?} in column {column}")]
    Value { column: String, value: String },

    /// A required cell was empty.
    #[error("Missing value for {0}")]
    MissingField(String),

    /// Statistics were requested over zero values.
    #[error("No data to aggregate for {0}")]
    EmptyAggregate(String),

    #[error("Failed to open {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_names_source() {
        let err = AnalyticsError::Parse {
            source_name: "students.csv".to_string(),
            reason: "missing column Age".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to parse students.csv: missing column Age"
        );
    }

    #[test]
    fn value_error_quotes_the_cell() {
        let err = AnalyticsError::Value {
            column: "Age".to_string(),
            value: "fifteen".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid value \"fifteen\" in column Age");
    }

    #[test]
    fn empty_aggregate_display() {
        let err = AnalyticsError::EmptyAggregate("subject analysis".to_string());
        assert_eq!(err.to_string(), "No data to aggregate for subject analysis");
    }

    #[test]
    fn file_read_keeps_path() {
        let err = AnalyticsError::FileRead {
            path: PathBuf::from("/missing/students.csv"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/missing/students.csv"));
        assert!(msg.contains("no such file"));
    }
}
