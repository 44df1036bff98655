use lock_plot::plot::{parse_cli, PlotArgs};
use lock_plot::{PlotError, ResultSet};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() {
    let args = parse_cli();
    setup_tracing(args.verbose);
    let code = match run(&args) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("{}", e);
            e.exit_code()
        }
    };
    std::process::exit(code);
}

fn setup_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: &PlotArgs) -> Result<(), PlotError> {
    info!("read data from {}", args.csvin.display());
    let resultset = ResultSet::from_csv(&args.csvin)?;
    info!(
        "{} lock(s), {} sample(s), y scale {}",
        resultset.len(),
        resultset.sample_count(),
        args.options.yscale
    );
    match &args.output {
        Some(fout) => {
            resultset.plot(fout, &args.options)?;
            println!("Saved figure to {}", fout.display());
        }
        None => {
            let shown = resultset.show(&args.options)?;
            info!("showing {}", shown.display());
        }
    }
    Ok(())
}
