use crate::scale::{x_ticks, YScale};
use crate::{min_and_max, PlotError, ResultSet};
use plotters::coord::ranged1d::{DefaultFormatting, KeyPointHint, Ranged};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::fmt;
use std::fs::{self, File};
use std::io::BufWriter;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Resolution of the saved image, pixels per inch of figure size
pub const DPI: u32 = 150;
/// DPI in the units of the png pHYs chunk
const PIXELS_PER_METRE: u32 = (DPI as f64 / 0.0254 + 0.5) as u32;

pub const X_DESC: &str = "Threads";
pub const Y_DESC: &str = "Ops/s";

/// Figure size in inches
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FigSize {
    pub width: f64,
    pub height: f64,
}

impl Default for FigSize {
    fn default() -> Self {
        FigSize {
            width: 8.,
            height: 5.,
        }
    }
}

impl FigSize {
    pub fn pixels(&self) -> (u32, u32) {
        (
            (self.width * DPI as f64).round() as u32,
            (self.height * DPI as f64).round() as u32,
        )
    }
}

impl FromStr for FigSize {
    type Err = String;

    /// "8x5", width by height in inches
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("invalid figure size '{}', expected WIDTHxHEIGHT in inches", s);
        let mut parts = s.splitn(2, |c: char| c == 'x' || c == 'X');
        let width: f64 = parts.next().and_then(|w| w.trim().parse().ok()).ok_or_else(invalid)?;
        let height: f64 = parts.next().and_then(|h| h.trim().parse().ok()).ok_or_else(invalid)?;
        let valid = |v: f64| v.is_finite() && v > 0. && v <= 100.;
        if !valid(width) || !valid(height) {
            return Err(invalid());
        }
        Ok(FigSize { width, height })
    }
}

impl fmt::Display for FigSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartOptions {
    pub yscale: YScale,
    /// 0 hides the x tick labels
    pub max_x_ticks: usize,
    pub figsize: FigSize,
}

impl Default for ChartOptions {
    fn default() -> Self {
        ChartOptions {
            yscale: YScale::default(),
            max_x_ticks: 12,
            figsize: FigSize::default(),
        }
    }
}

/// One drawn line, points already on the transformed y axis
#[derive(Debug, Clone, PartialEq)]
pub struct PlotLine {
    pub label: String,
    pub points: Vec<(f64, f64)>,
}

/// Everything that ends up on the chart, computed before touching a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartLayout {
    pub title: String,
    pub yscale: YScale,
    pub x_range: Range<f64>,
    pub y_range: Range<f64>,
    pub x_ticks: Vec<f64>,
    pub y_ticks: Vec<f64>,
    pub lines: Vec<PlotLine>,
}

impl ChartLayout {
    pub fn new(resultset: &ResultSet, options: &ChartOptions) -> Result<ChartLayout, PlotError> {
        let yscale = options.yscale;
        let mut lines = Vec::with_capacity(resultset.len());
        for (lock, series) in resultset.iter() {
            let points: Vec<(f64, f64)> = series
                .points()
                .filter(|&(_, y)| yscale.accepts(y))
                .map(|(t, y)| (t as f64, yscale.forward(y)))
                .collect();
            let masked = series.len() - points.len();
            if masked > 0 {
                warn!(
                    "{}: {} sample(s) cannot be shown on a {} scale",
                    lock, masked, yscale
                );
            }
            if points.is_empty() {
                continue;
            }
            lines.push(PlotLine {
                label: lock.clone(),
                points,
            });
        }
        let xs: Vec<f64> = lines.iter().flat_map(|l| l.points.iter().map(|p| p.0)).collect();
        let ys: Vec<f64> = lines.iter().flat_map(|l| l.points.iter().map(|p| p.1)).collect();
        let ((xmin, xmax), (ymin, ymax)) = match (min_and_max(&xs), min_and_max(&ys)) {
            (Some(x), Some(y)) => (x, y),
            _ => return Err(PlotError::NoData),
        };
        let x_range = padded(xmin, xmax, 0.05);
        let y_range = padded(ymin, ymax, 0.1);
        // only thread counts that made it onto the chart
        let mut drawn_threads: Vec<u32> = xs.iter().map(|x| *x as u32).collect();
        drawn_threads.sort_unstable();
        drawn_threads.dedup();
        let x_ticks = x_ticks(&drawn_threads, options.max_x_ticks)
            .into_iter()
            .map(f64::from)
            .collect();
        let y_ticks = yscale.ticks(y_range.start, y_range.end);
        Ok(ChartLayout {
            title: resultset.title(),
            yscale,
            x_range,
            y_range,
            x_ticks,
            y_ticks,
            lines,
        })
    }
}

/// widens [min, max] by frac of its span on each side, or by 1 if it is a point
fn padded(min: f64, max: f64, frac: f64) -> Range<f64> {
    let span = max - min;
    if span <= f64::EPSILON * max.abs().max(1.) {
        (min - 1.)..(max + 1.)
    } else {
        (min - span * frac)..(max + span * frac)
    }
}

/// Linear axis whose ticks are exactly the given values.
#[derive(Debug, Clone)]
pub struct TickedRange {
    range: Range<f64>,
    ticks: Vec<f64>,
}

impl TickedRange {
    pub fn new(range: Range<f64>, ticks: Vec<f64>) -> TickedRange {
        TickedRange { range, ticks }
    }
}

impl Ranged for TickedRange {
    type FormatOption = DefaultFormatting;
    type ValueType = f64;

    fn map(&self, value: &f64, limit: (i32, i32)) -> i32 {
        let logic_length = (*value - self.range.start) / (self.range.end - self.range.start);
        let actual_length = limit.1 - limit.0;
        if actual_length == 0 {
            return limit.1;
        }
        limit.0 + (actual_length as f64 * logic_length + 1e-3).floor() as i32
    }

    fn key_points<Hint: KeyPointHint>(&self, _hint: Hint) -> Vec<f64> {
        self.ticks.clone()
    }

    fn range(&self) -> Range<f64> {
        self.range.clone()
    }
}

impl ResultSet {
    /// Draws the chart to fout, png unless the extension is svg.
    /// Missing parent directories are created.
    pub fn plot(&self, fout: &Path, options: &ChartOptions) -> Result<(), PlotError> {
        let layout = ChartLayout::new(self, options)?;
        prepare_output(fout)?;
        let size = options.figsize.pixels();
        let is_svg = fout
            .extension()
            .map_or(false, |e| e.eq_ignore_ascii_case("svg"));
        debug!(
            "drawing {} line(s) to {} at {}x{} px",
            layout.lines.len(),
            fout.display(),
            size.0,
            size.1
        );
        if is_svg {
            draw(SVGBackend::new(fout, size).into_drawing_area(), &layout).map_err(draw_error)
        } else {
            let mut rgb = vec![0u8; size.0 as usize * size.1 as usize * 3];
            draw(BitMapBackend::with_buffer(&mut rgb, size).into_drawing_area(), &layout)
                .map_err(draw_error)?;
            write_png(fout, &rgb, size)
        }
    }

    /// Draws the chart to a fresh temporary png and hands it to the platform image viewer.
    /// The image is left in place for the viewer to read.
    pub fn show(&self, options: &ChartOptions) -> Result<PathBuf, PlotError> {
        let fout = viewer_image()?;
        self.plot(&fout, options)?;
        open_viewer(&fout)?;
        Ok(fout)
    }
}

fn draw_error(e: Box<dyn std::error::Error>) -> PlotError {
    PlotError::Draw(e.to_string())
}

/// Encodes an rgb buffer as png, tagged with the chart DPI.
pub fn write_png(fout: &Path, rgb: &[u8], size: (u32, u32)) -> Result<(), PlotError> {
    let encode = || -> Result<(), png::EncodingError> {
        let file = BufWriter::new(File::create(fout)?);
        let mut encoder = png::Encoder::new(file, size.0, size.1);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_pixel_dims(Some(png::PixelDimensions {
            xppu: PIXELS_PER_METRE,
            yppu: PIXELS_PER_METRE,
            unit: png::Unit::Meter,
        }));
        let mut writer = encoder.write_header()?;
        writer.write_image_data(rgb)?;
        writer.finish()
    };
    encode().map_err(|source| PlotError::WriteImage {
        path: fout.to_path_buf(),
        source,
    })
}

/// new uniquely named png in the temp directory, created exclusively
pub fn viewer_image() -> Result<PathBuf, PlotError> {
    let (_, path) = tempfile::Builder::new()
        .prefix("lock_plot-")
        .suffix(".png")
        .tempfile()
        .and_then(|f| f.keep().map_err(|e| e.error))
        .map_err(PlotError::TempImage)?;
    Ok(path)
}

/// creates the parent directories of fout, if any are missing
pub fn prepare_output(fout: &Path) -> Result<(), PlotError> {
    match fout.parent() {
        Some(dir) if !dir.as_os_str().is_empty() && !dir.exists() => {
            info!("creating output directory {}", dir.display());
            fs::create_dir_all(dir).map_err(|e| PlotError::OutputDir {
                path: dir.to_path_buf(),
                source: e,
            })
        }
        _ => Ok(()),
    }
}

#[cfg(target_os = "macos")]
const VIEWER: (&str, &[&str]) = ("open", &[]);
#[cfg(target_os = "windows")]
const VIEWER: (&str, &[&str]) = ("cmd", &["/C", "start", ""]);
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const VIEWER: (&str, &[&str]) = ("xdg-open", &[]);

fn open_viewer(image: &Path) -> Result<(), PlotError> {
    let (program, args) = VIEWER;
    debug!("opening {} with {}", image.display(), program);
    Command::new(program)
        .args(args)
        .arg(image)
        .spawn()
        .map(|_| ())
        .map_err(|e| PlotError::Viewer { program, source: e })
}

fn draw<DB: DrawingBackend>(
    root: DrawingArea<DB, Shift>,
    layout: &ChartLayout,
) -> Result<(), Box<dyn std::error::Error>>
where
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;
    let yscale = layout.yscale;
    let mut chart = ChartBuilder::on(&root)
        .caption(&layout.title, ("sans-serif", 30))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(110)
        .build_cartesian_2d(
            TickedRange::new(layout.x_range.clone(), layout.x_ticks.clone()),
            TickedRange::new(layout.y_range.clone(), layout.y_ticks.clone()),
        )?;
    chart
        .configure_mesh()
        .light_line_style(&TRANSPARENT)
        .bold_line_style(&BLACK.mix(0.3))
        .set_all_tick_mark_size(2)
        .label_style(("sans-serif", 20))
        .x_desc(X_DESC)
        .y_desc(Y_DESC)
        .x_label_formatter(&|x: &f64| format!("{:.0}", x))
        .y_label_formatter(&|y: &f64| yscale.format_tick(*y))
        .draw()?;

    for (idx, line) in layout.lines.iter().enumerate() {
        let color = Palette99::pick(idx).to_rgba();
        chart
            .draw_series(LineSeries::new(
                line.points.iter().copied(),
                color.stroke_width(2),
            ))?
            .label(line.label.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
        chart.draw_series(
            line.points
                .iter()
                .map(|&p| Circle::new(p, 5, color.filled())),
        )?;
    }
    chart
        .configure_series_labels()
        .label_font(("sans-serif", 20))
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;
    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resultset(csv: &str) -> ResultSet {
        ResultSet::from_reader(csv.as_bytes()).unwrap()
    }

    fn options(yscale: YScale, max_x_ticks: usize) -> ChartOptions {
        ChartOptions {
            yscale,
            max_x_ticks,
            ..ChartOptions::default()
        }
    }

    const AB: &str = "lock,threads,ops_s,task\n\
                      A,1,1000,sum\nA,2,1800,sum\nA,4,3000,sum\n\
                      B,1,900,sum\nB,2,500,sum\nB,4,120,sum\n";

    #[test]
    fn figsize_parses_and_converts_at_150_dpi() {
        let size: FigSize = "8x5".parse().unwrap();
        assert_eq!(size, FigSize::default());
        assert_eq!(size.pixels(), (1200, 750));
        assert_eq!("6.5X4".parse::<FigSize>().unwrap().pixels(), (975, 600));
        assert!("8".parse::<FigSize>().is_err());
        assert!("0x5".parse::<FigSize>().is_err());
        assert!("axb".parse::<FigSize>().is_err());
    }

    #[test]
    fn one_line_per_lock_with_title() {
        let layout = ChartLayout::new(&resultset(AB), &options(YScale::Linear, 12)).unwrap();
        assert_eq!(layout.title, "sum threads vs ops/s");
        let labels: Vec<&str> = layout.lines.iter().map(|l| l.label.as_str()).collect();
        assert_eq!(labels, vec!["A", "B"]);
        assert_eq!(
            layout.lines[0].points,
            vec![(1., 1000.), (2., 1800.), (4., 3000.)]
        );
        assert_eq!(layout.x_ticks, vec![1., 2., 4.]);
        assert!(layout.x_range.start < 1. && layout.x_range.end > 4.);
        assert!(layout.y_range.start < 120. && layout.y_range.end > 3000.);
    }

    #[test]
    fn zero_max_ticks_hides_ticks_but_keeps_points() {
        let layout = ChartLayout::new(&resultset(AB), &options(YScale::Log, 0)).unwrap();
        assert!(layout.x_ticks.is_empty());
        let drawn: usize = layout.lines.iter().map(|l| l.points.len()).sum();
        assert_eq!(drawn, 6);
    }

    #[test]
    fn log_and_linear_place_the_same_data() {
        let rs = resultset(AB);
        let log = ChartLayout::new(&rs, &options(YScale::Log, 12)).unwrap();
        let linear = ChartLayout::new(&rs, &options(YScale::Linear, 12)).unwrap();
        assert_ne!(log.y_range, linear.y_range);
        assert_eq!(log.x_ticks, linear.x_ticks);
        for (l, n) in log.lines.iter().zip(linear.lines.iter()) {
            assert_eq!(l.label, n.label);
            assert_eq!(l.points.len(), n.points.len());
            for (p, q) in l.points.iter().zip(n.points.iter()) {
                assert_eq!(p.0, q.0);
                assert!((10f64.powf(p.1) - q.1).abs() < 1e-6 * q.1);
            }
        }
        // same input, same layout
        assert_eq!(log, ChartLayout::new(&rs, &options(YScale::Log, 12)).unwrap());
    }

    #[test]
    fn log_scale_masks_zero_throughput() {
        let rs = resultset("lock,threads,ops_s\nA,1,0\nA,2,10\nB,1,0\n");
        let layout = ChartLayout::new(&rs, &options(YScale::Log, 12)).unwrap();
        assert_eq!(layout.lines.len(), 1);
        assert_eq!(layout.lines[0].points, vec![(2., 1.)]);
        let symlog = ChartLayout::new(&rs, &options(YScale::Symlog, 12)).unwrap();
        assert_eq!(symlog.lines.len(), 2);
        assert_eq!(symlog.lines[1].points, vec![(1., 0.)]);
    }

    #[test]
    fn x_ticks_end_at_the_largest_drawn_thread_count() {
        let rs = resultset("lock,threads,ops_s\nA,1,10\nA,2,20\nA,16,0\nB,16,0\n");
        let log = ChartLayout::new(&rs, &options(YScale::Log, 12)).unwrap();
        assert_eq!(log.x_ticks, vec![1., 2.]);
        let linear = ChartLayout::new(&rs, &options(YScale::Linear, 12)).unwrap();
        assert_eq!(linear.x_ticks, vec![1., 2., 16.]);

        let mut csv = String::from("lock,threads,ops_s\n");
        for t in 1..=13 {
            csv.push_str(&format!("A,{},5\n", t));
        }
        csv.push_str("A,14,0\n");
        let layout = ChartLayout::new(&resultset(&csv), &options(YScale::Log, 6)).unwrap();
        assert_eq!(layout.x_ticks, vec![1., 4., 7., 10., 13.]);
    }

    #[test]
    fn png_carries_the_chart_dpi() {
        let dir = tempfile::tempdir().unwrap();
        let fout = dir.path().join("tiny.png");
        write_png(&fout, &[255, 0, 0, 0, 0, 255], (2, 1)).unwrap();
        let decoder = png::Decoder::new(File::open(&fout).unwrap());
        let reader = decoder.read_info().unwrap();
        let info = reader.info();
        assert_eq!((info.width, info.height), (2, 1));
        let dims = info.pixel_dims.unwrap();
        // 150 dpi
        assert_eq!((dims.xppu, dims.yppu), (5906, 5906));
        assert!(matches!(dims.unit, png::Unit::Meter));
    }

    #[test]
    fn viewer_images_are_fresh_files() {
        let first = viewer_image().unwrap();
        let second = viewer_image().unwrap();
        assert_ne!(first, second);
        for image in &[&first, &second] {
            assert!(image.is_file());
            assert!(image.starts_with(std::env::temp_dir()));
            assert_eq!(image.extension().unwrap(), "png");
            fs::remove_file(image).unwrap();
        }
    }

    #[test]
    fn nothing_placeable_is_no_data() {
        let rs = resultset("lock,threads,ops_s\nA,1,0\nA,2,-3\n");
        assert!(matches!(
            ChartLayout::new(&rs, &options(YScale::Log, 12)),
            Err(PlotError::NoData)
        ));
    }

    #[test]
    fn single_point_gets_a_usable_range() {
        let rs = resultset("lock,threads,ops_s\nA,4,100\n");
        let layout = ChartLayout::new(&rs, &options(YScale::Linear, 12)).unwrap();
        assert_eq!(layout.x_range, 3.0..5.0);
        assert_eq!(layout.y_range, 99.0..101.0);
    }

    #[test]
    fn ticked_range_maps_linearly() {
        let axis = TickedRange::new(0.0..10.0, vec![0., 5., 10.]);
        assert_eq!(axis.map(&0., (0, 100)), 0);
        assert_eq!(axis.map(&5., (0, 100)), 50);
        assert_eq!(axis.map(&10., (0, 100)), 100);
        // y axes map onto a reversed pixel range
        assert_eq!(axis.map(&10., (100, 0)), 0);
        assert_eq!(axis.key_points(3usize), vec![0., 5., 10.]);
    }

    #[test]
    fn prepare_output_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let fout = dir.path().join("out").join("nested").join("chart.png");
        prepare_output(&fout).unwrap();
        assert!(fout.parent().unwrap().is_dir());
        // existing directory, and a bare file name
        prepare_output(&fout).unwrap();
        prepare_output(Path::new("chart.png")).unwrap();
    }
}
