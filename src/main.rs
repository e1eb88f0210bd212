use anyhow::{Result, anyhow};
use clap::{Arg, ArgMatches, Command};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::hint::black_box;
use std::time::Instant;

use intgemm::{AlignedBuffer, BiasAddUnquantize, CpuType, dispatch, prepare_bias_for_8};

#[derive(Debug, Clone, Copy, Serialize)]
struct Shape {
    a_rows: usize,
    width: usize,
    b_cols: usize,
}

#[derive(Debug, Serialize)]
struct ShapeReport {
    a_rows: usize,
    width: usize,
    b_cols: usize,
    /// Signed int8 path (abs/sign + pmaddubsw)
    signed_seconds: f64,
    /// Unsigned-A path with folded bias (vpdpbusd on VNNI hardware)
    shifted_seconds: f64,
}

#[derive(Debug, Serialize)]
struct BenchReport {
    cpu: String,
    repeat: usize,
    shapes: Vec<ShapeReport>,
}

// The shape set of the original bias-multiply benchmark
const DEFAULT_SIZES: &str = "8x256x256,8x2048x256,320x256x256,472x256x256,248x256x256,200x256x256";

fn main() {
    let matches = Command::new("intgemm-bench")
        .version("0.1.0")
        .author("Henk-Jan Lebbink")
        .about("Benchmark the int8 multiply paths on this machine")
        .arg(
            Arg::new("repeat")
                .help("Iterations per shape")
                .value_parser(clap::value_parser!(usize))
                .default_value("1000"),
        )
        .arg(
            Arg::new("sizes")
                .short('s')
                .long("sizes")
                .help("Comma-separated shapes as ROWSxWIDTHxCOLS")
                .default_value(DEFAULT_SIZES),
        )
        .arg(
            Arg::new("format")
                .short('f')
                .long("format")
                .help("Output format")
                .value_parser(["human", "json"])
                .default_value("human"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .help("Also write the JSON report to this file"),
        )
        .subcommand(Command::new("cpu").about("Print detected CPU capabilities"))
        .get_matches();

    let result = match matches.subcommand() {
        Some(("cpu", _)) => handle_cpu(),
        _ => handle_bench(&matches),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn handle_cpu() -> Result<()> {
    let tags = [
        CpuType::Sse2,
        CpuType::Ssse3,
        CpuType::Avx2,
        CpuType::Avx512Bw,
        CpuType::Avx512Vnni,
    ];
    for tag in tags {
        println!("{:<12} {}", tag.as_str(), if tag.is_supported() { "yes" } else { "no" });
    }
    match intgemm::cpu::kcpu() {
        Some(best) => println!("dispatching to {}", best),
        None => return Err(anyhow!("no usable SIMD level detected")),
    }
    Ok(())
}

fn handle_bench(matches: &ArgMatches) -> Result<()> {
    let repeat = *matches.get_one::<usize>("repeat").expect("repeat has a default");
    let sizes = matches.get_one::<String>("sizes").expect("sizes has a default");
    let format = matches.get_one::<String>("format").expect("format has a default");

    let shapes = parse_sizes(sizes)?;
    let cpu = intgemm::cpu::kcpu().ok_or_else(|| anyhow!("no usable SIMD level detected"))?;

    let mut rng = StdRng::seed_from_u64(42);
    let mut reports = Vec::with_capacity(shapes.len());
    for shape in &shapes {
        reports.push(bench_shape(*shape, repeat, &mut rng)?);
    }

    let report = BenchReport {
        cpu: cpu.to_string(),
        repeat,
        shapes: reports,
    };

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print_human(&report),
    }

    if let Some(path) = matches.get_one::<String>("output") {
        fs::write(path, serde_json::to_string_pretty(&report)?)?;
    }

    Ok(())
}

fn parse_sizes(input: &str) -> Result<Vec<Shape>> {
    let re = Regex::new(r"^(\d+)x(\d+)x(\d+)$").expect("shape pattern is valid");
    let tile_row = dispatch::tile_row_i8()?;

    let mut shapes = Vec::new();
    for part in input.split(',') {
        let part = part.trim();
        let caps = re
            .captures(part)
            .ok_or_else(|| anyhow!("bad shape '{}'; expected ROWSxWIDTHxCOLS", part))?;
        let shape = Shape {
            a_rows: caps[1].parse()?,
            width: caps[2].parse()?,
            b_cols: caps[3].parse()?,
        };
        if shape.width % tile_row != 0 {
            return Err(anyhow!(
                "width {} must be a multiple of {} on this CPU",
                shape.width,
                tile_row
            ));
        }
        if shape.b_cols % 8 != 0 {
            return Err(anyhow!("cols {} must be a multiple of 8", shape.b_cols));
        }
        shapes.push(shape);
    }
    Ok(shapes)
}

fn bench_shape(shape: Shape, repeat: usize, rng: &mut StdRng) -> Result<ShapeReport> {
    let Shape { a_rows, width, b_cols } = shape;

    let a = AlignedBuffer::from_fn(a_rows * width, |_| rng.random_range(-1.0f32..1.0))?;
    let b = AlignedBuffer::from_fn(width * b_cols, |_| rng.random_range(-1.0f32..1.0))?;
    let bias: Vec<f32> = (0..b_cols).map(|_| rng.random_range(-1.0f32..1.0)).collect();

    let alpha = 2.0f32;
    let quant_mult = 127.0 / alpha;
    let unquant_mult = 1.0 / (quant_mult * quant_mult);

    let mut a_q = AlignedBuffer::<i8>::new(a.len())?;
    let mut a_u = AlignedBuffer::<u8>::new(a.len())?;
    let mut b_packed = AlignedBuffer::<i8>::new(b.len())?;
    dispatch::prepare_a_i8(&a, a_q.as_mut_slice(), quant_mult, a_rows, width)?;
    dispatch::prepare_a_shifted_i8(&a, a_u.as_mut_slice(), quant_mult, a_rows, width)?;
    dispatch::prepare_b_i8(&b, b_packed.as_mut_slice(), quant_mult, width, b_cols)?;

    let mut shifted_bias = bias.clone();
    prepare_bias_for_8(&b, &mut shifted_bias, alpha, width, b_cols)?;

    let mut out = vec![0.0f32; a_rows * b_cols];

    let start = Instant::now();
    for _ in 0..repeat {
        let mut writer = BiasAddUnquantize::new(&mut out, &bias, b_cols, unquant_mult);
        dispatch::multiply_i8(a_q.as_slice(), b_packed.as_slice(), &mut writer, a_rows, width, b_cols)?;
        black_box(&out);
    }
    let signed_seconds = start.elapsed().as_secs_f64();

    let start = Instant::now();
    for _ in 0..repeat {
        let mut writer = BiasAddUnquantize::new(&mut out, &shifted_bias, b_cols, unquant_mult);
        dispatch::multiply_shifted_i8(
            a_u.as_slice(),
            b_packed.as_slice(),
            &mut writer,
            a_rows,
            width,
            b_cols,
        )?;
        black_box(&out);
    }
    let shifted_seconds = start.elapsed().as_secs_f64();

    Ok(ShapeReport {
        a_rows,
        width,
        b_cols,
        signed_seconds,
        shifted_seconds,
    })
}

fn print_human(report: &BenchReport) {
    println!("CPU: {}", report.cpu);
    println!("{} iterations per shape", report.repeat);
    println!(
        "{:>6} {:>6} {:>6}  {:>14} {:>14}",
        "rows", "width", "cols", "signed (s)", "shifted (s)"
    );
    for s in &report.shapes {
        println!(
            "{:>6} {:>6} {:>6}  {:>14.6} {:>14.6}",
            s.a_rows, s.width, s.b_cols, s.signed_seconds, s.shifted_seconds
        );
    }
}
