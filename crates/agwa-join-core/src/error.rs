use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid project file: {0}")]
    ProjectParse(#[from] toml::de::Error),

    #[error("Could not write project file: {0}")]
    ProjectWrite(#[from] toml::ser::Error),

    #[error("Invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("'{0}' is not a file geodatabase")]
    NotAGeodatabase(PathBuf),

    #[error("Table '{0}' does not exist")]
    TableNotFound(PathBuf),

    #[error("Layer '{0}' not found in the active map")]
    LayerNotFound(String),

    #[error("Layer '{0}' has no data source")]
    NoDataSource(String),

    #[error("Field '{field}' not found on '{source_name}'")]
    FieldNotFound { source_name: String, field: String },

    #[error("Layer '{layer}' has no join named '{join}'")]
    JoinNotFound { layer: String, join: String },

    #[error("Layer '{layer}' is already joined to '{join}'")]
    DuplicateJoin { layer: String, join: String },

    #[error("Layer '{layer}' is joined to '{table}', which is not a simulation results table")]
    UnrecognizedJoin { layer: String, table: String },

    #[error("Layer '{layer}' does not show discretization '{discretization}'")]
    ForeignLayer { layer: String, discretization: String },

    #[error("No owning delineation found for discretization '{0}'")]
    NoOwningDelineation(String),

    #[error("'{0}' is not a valid simulation directory")]
    InvalidSimulationPath(PathBuf),

    #[error("Simulation '{0}' is not eligible to be joined")]
    IneligibleSimulation(PathBuf),

    #[error(
        "Join transition failed at '{failed}' after completing [{completed}]: {source}. \
         The elements and streams layers may now be joined to different tables; \
         re-run the tool or fix the joins manually."
    )]
    PartialTransition {
        completed: String,
        failed: String,
        #[source]
        source: Box<Error>,
    },

    #[error("{0}")]
    Other(String),
}
