use super::VERSION;
use crate::chart::{ChartOptions, FigSize};
use crate::scale::{YScale, YSCALE_NAMES};
use clap::{App, Arg, ArgMatches, ErrorKind};
use std::ffi::OsString;
use std::path::PathBuf;
use std::str::FromStr;

/// What the plotting CLI asks for.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotArgs {
    pub csvin: PathBuf,
    /// None shows the chart in the image viewer
    pub output: Option<PathBuf>,
    pub options: ChartOptions,
    pub verbose: bool,
}

fn validate<T: FromStr>(v: String) -> Result<(), String>
where
    T::Err: ToString,
{
    v.parse::<T>().map(|_| ()).map_err(|e| e.to_string())
}

pub fn build_cli() -> App<'static, 'static> {
    let arg_csvin = Arg::with_name("csv_in")
        .help("csv file with lock,threads,ops_s[,task] columns")
        .long("csv-in")
        .takes_value(true)
        .value_name("PATH")
        .required(true);
    let arg_output = Arg::with_name("output")
        .help("image file to save (png, or svg by extension); shows the chart if omitted")
        .short("o")
        .long("output")
        .takes_value(true)
        .value_name("PATH");
    let arg_yscale = Arg::with_name("yscale")
        .help("scale of the ops/s axis")
        .long("yscale")
        .takes_value(true)
        .possible_values(&YSCALE_NAMES)
        .default_value("log");
    let arg_max_x_ticks = Arg::with_name("max_x_ticks")
        .help("maximum number of thread count ticks, 0 hides them")
        .long("max-x-ticks")
        .takes_value(true)
        .value_name("N")
        .validator(validate::<usize>)
        .default_value("12");
    let arg_figsize = Arg::with_name("figsize")
        .help("figure size in inches, WIDTHxHEIGHT")
        .long("figsize")
        .takes_value(true)
        .value_name("WxH")
        .validator(validate::<FigSize>)
        .default_value("8x5");
    let arg_verbose = Arg::with_name("verbose")
        .help("log debug messages to stderr")
        .short("v")
        .long("verbose");
    App::new("lock_plot")
        .version(VERSION.unwrap_or("unknown"))
        .about("plot threads vs ops/s from a lock benchmark csv")
        .arg(arg_csvin)
        .arg(arg_output)
        .arg(arg_yscale)
        .arg(arg_max_x_ticks)
        .arg(arg_figsize)
        .arg(arg_verbose)
}

fn value<T: FromStr>(matches: &ArgMatches, name: &str) -> Result<T, clap::Error>
where
    T::Err: ToString,
{
    let raw = matches.value_of(name).unwrap_or_default();
    raw.parse::<T>().map_err(|e| {
        clap::Error::with_description(
            &format!("invalid value '{}' for --{}: {}", raw, name, e.to_string()),
            ErrorKind::InvalidValue,
        )
    })
}

/// Parses the given arguments (program name first).
pub fn args_from<I, T>(args: I) -> Result<PlotArgs, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = build_cli().get_matches_from_safe(args)?;
    let csvin = PathBuf::from(matches.value_of_os("csv_in").unwrap_or_default());
    let output = matches.value_of_os("output").map(PathBuf::from);
    let options = ChartOptions {
        yscale: value::<YScale>(&matches, "yscale")?,
        max_x_ticks: value::<usize>(&matches, "max_x_ticks")?,
        figsize: value::<FigSize>(&matches, "figsize")?,
    };
    Ok(PlotArgs {
        csvin,
        output,
        options,
        verbose: matches.is_present("verbose"),
    })
}

/// Takes the CLI arguments that control the plotting; exits on bad usage.
pub fn parse_cli() -> PlotArgs {
    match args_from(std::env::args_os()) {
        Ok(args) => args,
        Err(e) => e.exit(),
    }
}
