//! Fatal, whole-run errors.
//!
//! Each variant maps to its own process exit status so scripted callers can
//! tell the causes apart. Per-node trouble never becomes one of these.

use std::path::PathBuf;

use thiserror::Error;

use crate::constants::UNCLASSIFIED_FAILURE_EXIT_CODE;

#[derive(Debug, Error)]
pub enum FatalError {
    #[error("data-source directory {0} doesn't exist")]
    MissingDataSourceDir(PathBuf),

    #[error("failed to load configuration: {0}")]
    Config(String),

    #[error("can't detect release on {address}: {stderr}")]
    Release { address: String, stderr: String },

    #[error("can't fetch node inventory from {address}: {stderr}")]
    InventoryFetch { address: String, stderr: String },

    #[error("malformed log filter pattern {pattern:?}: {source}")]
    FilterPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("can't decode node inventory from {origin}: {reason}")]
    InventoryDecode { origin: String, reason: String },

    #[error("data-source category {0} is empty")]
    EmptyCategory(String),
}

impl FatalError {
    /// Process exit status for this cause
    pub fn exit_code(&self) -> i32 {
        match self {
            FatalError::MissingDataSourceDir(_) => 1,
            FatalError::Config(_) => 2,
            FatalError::Release { .. } => 3,
            FatalError::InventoryFetch { .. } => 4,
            FatalError::FilterPattern { .. } => 5,
            FatalError::InventoryDecode { .. } => 6,
            FatalError::EmptyCategory(_) => 7,
        }
    }
}

/// Exit status for any run error: the fatal cause's own status when there is
/// one in the chain, otherwise [`UNCLASSIFIED_FAILURE_EXIT_CODE`]
pub fn exit_code_of(error: &anyhow::Error) -> i32 {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<FatalError>())
        .map(FatalError::exit_code)
        .unwrap_or(UNCLASSIFIED_FAILURE_EXIT_CODE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_exit_codes_are_distinct() {
        let bad_regex = regex::Regex::new("(").unwrap_err();
        let errors = vec![
            FatalError::MissingDataSourceDir(PathBuf::from("/nope")),
            FatalError::Config("bad".to_string()),
            FatalError::Release { address: "10.0.0.2".to_string(), stderr: String::new() },
            FatalError::InventoryFetch { address: "10.0.0.2".to_string(), stderr: String::new() },
            FatalError::FilterPattern { pattern: "(".to_string(), source: bad_regex },
            FatalError::InventoryDecode { origin: "nodes.json".to_string(), reason: String::new() },
            FatalError::EmptyCategory("cmds".to_string()),
        ];

        let mut codes: HashSet<i32> = errors.iter().map(|e| e.exit_code()).collect();
        assert_eq!(codes.len(), errors.len());
        assert!(!codes.contains(&0));
        assert!(codes.insert(UNCLASSIFIED_FAILURE_EXIT_CODE));
    }

    #[test]
    fn test_exit_code_of_run_errors() {
        let unwritable = anyhow::Error::new(std::io::Error::from(std::io::ErrorKind::PermissionDenied))
            .context("Failed to create output directory /info");
        assert_eq!(exit_code_of(&unwritable), UNCLASSIFIED_FAILURE_EXIT_CODE);
        assert_ne!(exit_code_of(&unwritable), FatalError::MissingDataSourceDir(PathBuf::new()).exit_code());

        let missing = anyhow::Error::new(FatalError::MissingDataSourceDir(PathBuf::from("rq")));
        assert_eq!(exit_code_of(&missing), 1);

        let wrapped = anyhow::Error::new(FatalError::EmptyCategory("logs".to_string())).context("resolving");
        assert_eq!(exit_code_of(&wrapped), 7);
    }

    #[test]
    fn test_filter_pattern_message() {
        let source = regex::Regex::new("[").unwrap_err();
        let err = FatalError::FilterPattern { pattern: "[".to_string(), source };
        assert_eq!(err.exit_code(), 5);
        assert!(err.to_string().contains("\"[\""));
    }
}
