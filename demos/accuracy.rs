use plotters::prelude::*;
use std::error::Error;
use std::path::Path;
use tdigest_bench::traits::{Digest, OwnedSize};
use tdigest_bench::util::{gen_uniform_vec, sample_digest_accuracy, SampleDistribution};
use tdigest_bench::MergingDigest;

const QUANTILES: [f64; 9] = [1e-4, 1e-3, 1e-2, 0.1, 0.5, 0.9, 0.99, 0.999, 0.9999];

pub struct Line<'a> {
    name: String,
    datapoints: Vec<(f64, Vec<f64>)>,
    colour: &'a RGBColor,
}

pub struct DataStat {
    x: f64,
    y_mean: f64,
    y_min: f64,
    y_max: f64,
}

impl DataStat {
    fn from_measurements(x: f64, measurements: &[f64]) -> Self {
        DataStat {
            x,
            y_mean: measurements.iter().sum::<f64>() / measurements.len() as f64,
            y_min: measurements.iter().cloned().fold(f64::INFINITY, f64::min),
            y_max: measurements.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

fn bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

pub fn plot_line_graph(
    title: &str,
    series: Vec<Line>,
    output_path: &Path,
    x_label: &str,
    y_label: &str,
) -> Result<(), Box<dyn Error>> {
    let root = BitMapBackend::new(output_path, (1024, 768)).into_drawing_area();
    root.fill(&WHITE)?;

    let (min_x, max_x) = bounds(series.iter().flat_map(|s| s.datapoints.iter().map(|dp| dp.0)));
    let (min_y, max_y) = bounds(
        series
            .iter()
            .flat_map(|s| s.datapoints.iter().flat_map(|dp| dp.1.iter().cloned())),
    );

    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .margin_right(30)
        .caption(title, ("sans-serif", 25))
        .set_label_area_size(LabelAreaPosition::Left, 60)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d(
            (min_x..max_x).log_scale(),
            (min_y + 1e-4..max_y + 1e-4).log_scale(),
        )?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .x_labels(30)
        .x_desc(x_label)
        .y_desc(y_label)
        .draw()?;

    for s in series.iter() {
        let data_stats: Vec<DataStat> = s
            .datapoints
            .iter()
            .map(|(x, measurements)| DataStat::from_measurements(*x, measurements))
            .collect();

        chart
            .draw_series(LineSeries::new(
                data_stats.iter().map(|stat| (stat.x, stat.y_mean + 1e-4)),
                s.colour,
            ))?
            .label(&s.name)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], s.colour));

        chart.draw_series(data_stats.iter().map(|stat| {
            PathElement::new(
                vec![(stat.x, stat.y_max + 1e-4), (stat.x, stat.y_min + 1e-4)],
                s.colour,
            )
        }))?;
    }

    chart
        .configure_series_labels()
        .border_style(&BLACK)
        .background_style(&WHITE.mix(0.8))
        .draw()?;

    Ok(())
}

fn create_digest(compression: f64) -> impl Fn(&[f64]) -> tdigest_bench::Result<MergingDigest> {
    move |dataset: &[f64]| {
        let mut digest = MergingDigest::new(compression)?;
        digest.add_buffer(dataset)?;
        Ok(digest)
    }
}

fn absolute_error(measured: f64, actual: f64) -> f64 {
    (measured - actual).abs()
}

/// Error of the value estimate at each quantile, one line per compression
fn error_against_quantile() -> Result<(), Box<dyn Error>> {
    let mut series = Vec::new();
    for &(compression, colour) in [(50.0, &RED), (100.0, &BLUE), (200.0, &GREEN)].iter() {
        let mut datapoints = Vec::new();
        for quantile in QUANTILES.iter() {
            let quantile = *quantile;
            let measurements = sample_digest_accuracy(
                create_digest(compression),
                || gen_uniform_vec(100_000),
                |digest: &mut dyn Digest| digest.est_value_at_quantile(quantile),
                |a, b| absolute_error(a, b) * 1e3,
                20,
            )?;
            datapoints.push((quantile, measurements));
        }
        series.push(Line {
            name: format!("compression {}", compression),
            datapoints,
            colour,
        });
    }

    plot_line_graph(
        "Error against quantile for value estimate",
        series,
        Path::new("plots/acc_vs_quantile_est_value.png"),
        "Quantile",
        "Absolute Error (x 1e-3)",
    )
}

/// Rank error of the cdf estimate for each input distribution
fn rank_error_against_distribution() -> Result<(), Box<dyn Error>> {
    let colours = [&RED, &BLUE, &GREEN, &MAGENTA, &CYAN];
    let mut series = Vec::new();
    for (distribution, &colour) in SampleDistribution::ALL.iter().zip(colours.iter()) {
        let mut datapoints = Vec::new();
        for quantile in QUANTILES.iter() {
            let quantile = *quantile;
            let measurements = sample_digest_accuracy(
                create_digest(100.0),
                || {
                    let mut rng = rand::thread_rng();
                    match distribution.sampler() {
                        Ok(mut sampler) => sampler.gen_vec(100_000, &mut rng),
                        Err(_) => Vec::new(),
                    }
                },
                |digest: &mut dyn Digest| {
                    let value = digest.est_value_at_quantile(quantile)?;
                    digest.est_quantile_at_value(value)
                },
                |a, b| absolute_error(a, b) * 1e6,
                20,
            )?;
            datapoints.push((quantile, measurements));
        }
        series.push(Line {
            name: distribution.name().to_string(),
            datapoints,
            colour,
        });
    }

    plot_line_graph(
        "Rank error of cdf(quantile(q)) at compression 100",
        series,
        Path::new("plots/rank_error_vs_distribution.png"),
        "Quantile",
        "Absolute Error (ppm)",
    )
}

fn plot_memory_usage_against_compression() -> Result<(), Box<dyn Error>> {
    let mut datapoints = Vec::new();
    for compression in (0..10).map(|x| (10u32 << x) as f64) {
        let digest = create_digest(compression)(&gen_uniform_vec(100_000))?;
        println!("compression {}: {} bytes", compression, digest.owned_size());
        datapoints.push((compression, vec![digest.owned_size() as f64]));
    }

    plot_line_graph(
        "Memory usage against compression",
        vec![Line {
            name: "MergingDigest".to_string(),
            datapoints,
            colour: &BLUE,
        }],
        Path::new("plots/mem_vs_compression.png"),
        "Compression",
        "Memory usage bytes",
    )
}

fn main() -> Result<(), Box<dyn Error>> {
    std::fs::create_dir_all("plots")?;
    error_against_quantile()?;
    rank_error_against_distribution()?;
    plot_memory_usage_against_compression()?;
    println!("Complete");
    Ok(())
}
