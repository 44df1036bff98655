use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Exit status for problems with the input data
pub const EXIT_DATA: i32 = 2;
/// Exit status for problems on the charting/output side
pub const EXIT_CHART: i32 = 3;

#[derive(Debug, Error)]
pub enum PlotError {
    #[error("CSV not found: {}", .0.display())]
    CsvNotFound(PathBuf),
    #[error("could not read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("CSV missing required columns: {}", .0.join(","))]
    MissingColumns(Vec<&'static str>),
    #[error("could not parse CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("No data found in CSV")]
    NoData,
    #[error("could not create output directory {}: {source}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("chart rendering failed: {0} (the plotting backend needs a sans-serif system font, e.g. install fontconfig and fonts-dejavu)")]
    Draw(String),
    #[error("could not write {}: {source}", path.display())]
    WriteImage {
        path: PathBuf,
        #[source]
        source: png::EncodingError,
    },
    #[error("could not create a temporary image: {0}")]
    TempImage(#[source] io::Error),
    #[error("could not launch image viewer '{program}': {source} (install it, or pass --output to save the chart)")]
    Viewer {
        program: &'static str,
        #[source]
        source: io::Error,
    },
}

impl PlotError {
    pub fn exit_code(&self) -> i32 {
        match self {
            PlotError::CsvNotFound(_)
            | PlotError::Read { .. }
            | PlotError::MissingColumns(_)
            | PlotError::Csv(_)
            | PlotError::NoData => EXIT_DATA,
            PlotError::OutputDir { .. }
            | PlotError::Draw(_)
            | PlotError::WriteImage { .. }
            | PlotError::TempImage(_)
            | PlotError::Viewer { .. } => EXIT_CHART,
        }
    }
}
