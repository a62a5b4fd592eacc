use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum GeometryError {
    #[error("Survey points do not form a rectangle: {side} differ by {delta:.6} m (tolerance {tolerance} m)")]
    NotRectangle {
        side: &'static str,
        delta: f64,
        tolerance: f64,
    },
    #[error("Survey points are degenerate; side {0} has zero length")]
    Degenerate(&'static str),
}

#[derive(Debug, Error)]
pub enum SurveyError {
    #[error("Could not open survey file because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Survey file failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Survey file failed to parse a coordinate: {0}")]
    ParsingError(#[from] std::num::ParseFloatError),
    #[error("Survey file has no column named {0}")]
    MissingColumn(&'static str),
    #[error("Survey file line {0} has the incorrect number of columns")]
    BadFileFormat(usize),
    #[error("Survey of {bank} has no point named {point}")]
    MissingPoint { bank: String, point: String },
    #[error("Survey failed due to geometry error: {0}")]
    GeometryError(#[from] GeometryError),
}

#[derive(Debug, Error)]
pub enum NexusError {
    #[error("{0:?} not found. Not creating geometry")]
    BadFilePath(PathBuf),
    #[error("NeXus file failed due to HDF5 error: {0}")]
    HDF5Error(#[from] hdf5::Error),
    #[error("NeXus dataset {name} has shape {found:?}; expected {expected:?}")]
    BadShape {
        name: String,
        found: Vec<usize>,
        expected: Vec<usize>,
    },
    #[error("NeXus bank {bank} has only {tubes} tubes; cannot drop {ghosts} ghost tubes")]
    TooFewTubes {
        bank: usize,
        tubes: usize,
        ghosts: usize,
    },
}

#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Component of type {0} has no matching type definition")]
    MissingType(String),
    #[error("Component of type {component} refers to undeclared idlist {idlist}")]
    MissingIdList { component: String, idlist: String },
    #[error("Type {0} is declared more than once")]
    DuplicateType(String),
    #[error("Idlist {0} is declared more than once")]
    DuplicateIdList(String),
    #[error("Component of type {component} places {positions} pixels but idlist {idlist} holds {ids} ids")]
    CountMismatch {
        component: String,
        idlist: String,
        positions: u64,
        ids: u64,
    },
    #[error("Idlist {idlist} has a malformed id entry: {reason}")]
    BadIdEntry { idlist: String, reason: String },
    #[error("Type {0} contains itself")]
    CyclicType(String),
    #[error("Idlist {0} is declared but no component refers to it")]
    UnusedIdList(String),
}

#[derive(Debug, Error)]
pub enum IdfWriterError {
    #[error("IdfWriter failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("IdfWriter refused to write an invalid document: {0}")]
    ValidationError(#[from] ValidationError),
    #[error("IdfWriter failed to move the finished file into place: {0}")]
    PersistError(#[from] tempfile::PersistError),
    #[error("IdfWriter produced non UTF-8 output: {0}")]
    EncodingError(#[from] std::string::FromUtf8Error),
}

#[derive(Debug, Error)]
pub enum FilenameError {
    #[error("Could not parse validity date {date:?}: {source}")]
    BadDate {
        date: String,
        source: time::error::Parse,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Config requires {0} for the requested instrument but none was given")]
    MissingInput(&'static str),
}

#[derive(Debug, Error)]
pub enum InstrumentError {
    #[error("Instrument failed due to IdfWriter error: {0}")]
    WriterError(#[from] IdfWriterError),
    #[error("Instrument failed due to filename error: {0}")]
    FilenameError(#[from] FilenameError),
    #[error("Instrument failed due to survey error: {0}")]
    SurveyError(#[from] SurveyError),
    #[error("Instrument failed due to NeXus error: {0}")]
    NexusError(#[from] NexusError),
    #[error("Instrument failed due to validation error: {0}")]
    ValidationError(#[from] ValidationError),
    #[error("Instrument has {expected} banks but {found} bank placements were given")]
    BankCountMismatch { expected: usize, found: usize },
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to Instrument error: {0}")]
    InstrumentError(#[from] InstrumentError),
    #[error("Processor failed due to IO error: {0}")]
    IoError(#[from] std::io::Error),
}
