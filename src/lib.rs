use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tracing::{debug, warn};
pub mod chart;
pub mod error;
pub mod plot;
pub mod scale;

pub use error::PlotError;

pub const VERSION: Option<&str> = option_env!("CARGO_PKG_VERSION");

pub const COL_LOCK: &str = "lock";
pub const COL_THREADS: &str = "threads";
pub const COL_OPS_S: &str = "ops_s";
pub const COL_TASK: &str = "task";

/// One benchmark sample, as read from a csv record
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub lock: String,
    pub threads: u32,
    pub ops_s: f64,
    pub task: Option<String>,
}

/// Positions of the known columns in the csv header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Columns {
    lock: usize,
    threads: usize,
    ops_s: usize,
    task: Option<usize>,
}

impl Columns {
    /// fails listing every required column that is absent
    fn locate(header: &csv::StringRecord) -> Result<Columns, PlotError> {
        let find = |name: &str| header.iter().position(|h| h == name);
        let (lock, threads, ops_s) = (find(COL_LOCK), find(COL_THREADS), find(COL_OPS_S));
        match (lock, threads, ops_s) {
            (Some(lock), Some(threads), Some(ops_s)) => Ok(Columns {
                lock,
                threads,
                ops_s,
                task: find(COL_TASK),
            }),
            _ => {
                let missing = [(COL_LOCK, lock), (COL_THREADS, threads), (COL_OPS_S, ops_s)]
                    .iter()
                    .filter(|(_, idx)| idx.is_none())
                    .map(|(name, _)| *name)
                    .collect();
                Err(PlotError::MissingColumns(missing))
            }
        }
    }
}

impl Row {
    /// None when a required field is missing or does not parse;
    /// a record short of the task column still counts.
    /// Non-finite throughput cannot be drawn and is rejected as well.
    fn from_record(record: &csv::StringRecord, columns: &Columns) -> Option<Row> {
        let lock = record.get(columns.lock)?.to_string();
        let threads = parse_threads(record.get(columns.threads)?)?;
        let ops_s: f64 = record.get(columns.ops_s)?.parse().ok()?;
        if !ops_s.is_finite() {
            return None;
        }
        let task = columns
            .task
            .and_then(|idx| record.get(idx))
            .map(str::to_string);
        Some(Row {
            lock,
            threads,
            ops_s,
            task,
        })
    }
}

/// thread counts may be written as floats ("4.0"), they are truncated;
/// negative and non-finite counts are refused
pub fn parse_threads(s: &str) -> Option<u32> {
    let t: f64 = s.parse().ok()?;
    if !t.is_finite() || t < 0. || t >= u32::MAX as f64 + 1. {
        return None;
    }
    Some(t.trunc() as u32)
}

/// Throughput samples of one lock, two parallel columns kept in step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    pub threads: Vec<u32>,
    pub ops_s: Vec<f64>,
}

impl Series {
    pub fn new(capacity: usize) -> Series {
        Series {
            threads: Vec::with_capacity(capacity),
            ops_s: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, threads: u32, ops_s: f64) {
        self.threads.push(threads);
        self.ops_s.push(ops_s);
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    /// stable sort by thread count, equal counts keep their file order
    pub fn sort_by_threads(&mut self) {
        let mut points: Vec<(u32, f64)> = self.points().collect();
        points.sort_by_key(|&(t, _)| t);
        let (threads, ops_s) = points.into_iter().unzip();
        self.threads = threads;
        self.ops_s = ops_s;
    }

    pub fn points(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.threads.iter().copied().zip(self.ops_s.iter().copied())
    }
}

/// All the series of one csv file, keyed by lock label
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    series: BTreeMap<String, Series>,
    task: Option<String>,
}

impl ResultSet {
    /// Init a ResultSet from the csv at the given path.
    pub fn from_csv(fin: &Path) -> Result<ResultSet, PlotError> {
        let file = match File::open(fin) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(PlotError::CsvNotFound(fin.to_path_buf()))
            }
            Err(e) => {
                return Err(PlotError::Read {
                    path: fin.to_path_buf(),
                    source: e,
                })
            }
        };
        debug!("reading benchmark rows from {}", fin.display());
        ResultSet::from_reader(file)
    }

    /// Reads the header, then every record; records that do not parse are
    /// skipped and only counted. Fails if no record survives.
    pub fn from_reader<R: Read>(rdr: R) -> Result<ResultSet, PlotError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(rdr);
        let columns = Columns::locate(reader.headers()?)?;
        let mut resultset = ResultSet::default();
        let mut skipped = 0usize;
        for (i, record) in reader.records().enumerate() {
            let record = match record {
                Ok(r) => r,
                Err(e) if e.is_io_error() => return Err(e.into()),
                Err(e) => {
                    debug!("skipping record {}: {}", i + 1, e);
                    skipped += 1;
                    continue;
                }
            };
            if record.iter().all(|f| f.is_empty()) {
                continue;
            }
            match Row::from_record(&record, &columns) {
                Some(row) => resultset.insert(row),
                None => {
                    debug!("skipping malformed record {}: {:?}", i + 1, record);
                    skipped += 1;
                }
            }
        }
        if skipped > 0 {
            warn!("skipped {} malformed row(s)", skipped);
        }
        if resultset.is_empty() {
            return Err(PlotError::NoData);
        }
        for series in resultset.series.values_mut() {
            series.sort_by_threads();
        }
        Ok(resultset)
    }

    /// adds one row to the series of its lock;
    /// the first non-empty task becomes the title prefix
    pub fn insert(&mut self, row: Row) {
        if self.task.is_none() {
            self.task = row.task.filter(|t| !t.is_empty());
        }
        self.series
            .entry(row.lock)
            .or_insert_with(|| Series::new(16))
            .push(row.threads, row.ops_s);
    }

    /// number of locks
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn sample_count(&self) -> usize {
        self.series.values().map(Series::len).sum()
    }

    pub fn get(&self, lock: &str) -> Option<&Series> {
        self.series.get(lock)
    }

    /// series in lexicographic order of their lock label
    pub fn iter(&self) -> btree_map::Iter<'_, String, Series> {
        self.series.iter()
    }

    pub fn task(&self) -> Option<&str> {
        self.task.as_deref()
    }

    pub fn title(&self) -> String {
        match self.task() {
            Some(task) => format!("{} threads vs ops/s", task),
            None => "threads vs ops/s".to_string(),
        }
    }

    /// every thread count seen in any series, ascending and deduplicated
    pub fn distinct_threads(&self) -> Vec<u32> {
        let mut threads: Vec<u32> = self
            .series
            .values()
            .flat_map(|s| s.threads.iter().copied())
            .collect();
        threads.sort_unstable();
        threads.dedup();
        threads
    }
}

impl std::fmt::Display for ResultSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "lock,threads,ops_s\n")?;
        for (lock, series) in self.iter() {
            for (t, y) in series.points() {
                write!(f, "{},{},{}\n", lock, t, y)?
            }
        }
        Ok(())
    }
}

/// None for an empty slice; NAN values never become min or max
pub fn min_and_max<T: std::cmp::PartialOrd + Copy>(s: &[T]) -> Option<(T, T)> {
    let mut self_iter = s.iter();
    let (mut min, mut max) = match self_iter.next() {
        Some(v) => (*v, *v),
        None => return None,
    };
    for es in self_iter {
        if *es > max {
            max = *es
        }
        if *es < min {
            min = *es
        }
    }
    Some((min, max))
}
