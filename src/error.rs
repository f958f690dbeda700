/// A failure while answering one request. Every variant aborts the whole
/// request, not only the line that caused it.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Error reading request body: {0}")]
    ReadBody(#[source] csv::Error),
    #[error("Error executing query for params [{}]: {}", .params.join(" "), .source)]
    Execute {
        params: Vec<String>,
        source: ExecError,
    },
    #[error("Error reading query results for params [{}]: {}", .params.join(" "), .source)]
    ReadResults {
        params: Vec<String>,
        source: rusqlite::Error,
    },
    #[error("Error writing response: {0}")]
    Write(#[source] std::io::Error),
}

/// Why the engine refused to execute the statement for one record.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("expected {expected} arguments, got {got}")]
    ArgumentCount { expected: usize, got: usize },
    #[error(transparent)]
    Engine(#[from] rusqlite::Error),
}

impl PipelineError {
    pub(crate) fn execute(params: &[String], source: impl Into<ExecError>) -> Self {
        PipelineError::Execute {
            params: params.to_vec(),
            source: source.into(),
        }
    }

    pub(crate) fn read_results(params: &[String], source: rusqlite::Error) -> Self {
        PipelineError::ReadResults {
            params: params.to_vec(),
            source,
        }
    }
}

/// Invalid command line configuration, reported before anything is started.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Must provide --db param")]
    MissingDb,
    #[error("Must provide --query param")]
    MissingQuery,
    #[error("Database file '{}' doesn't exist", .0.display())]
    DbNotFound(std::path::PathBuf),
    #[error("invalid port {0}: must be at most 65535")]
    InvalidPort(u32),
    #[error("invalid path '{0}': must start with '/'")]
    InvalidPath(String),
    #[error("--connections must be at least 1")]
    NoConnections,
}
