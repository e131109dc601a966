use thiserror::Error;

#[derive(Error, Debug)]
pub enum CpueError {
    #[error("Data not loaded: {0}")]
    NotLoaded(String),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config: {0}")]
    Config(String),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("InvalidData: {0}")]
    InvalidData(String),
}

impl From<toml::de::Error> for CpueError {
    fn from(err: toml::de::Error) -> Self {
        CpueError::Config(err.to_string())
    }
}

#[cfg(feature = "python")]
impl From<CpueError> for pyo3::PyErr {
    fn from(err: CpueError) -> pyo3::PyErr {
        pyo3::exceptions::PyRuntimeError::new_err(err.to_string())
    }
}
