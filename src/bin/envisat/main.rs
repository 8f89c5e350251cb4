//! envisat-cli - Tool for inspecting ENVISAT product files.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use envisat::prelude::*;

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("ENVISAT_BUILD_DATE"), ")");

#[derive(Parser)]
#[command(name = "envisat-cli", version = VERSION, about = "Inspect ENVISAT product files")]
struct CliArgs {
    /// DDDB JSON file (defaults to $ENVISAT_DDDB, then the built-in descriptions)
    #[arg(long, global = true)]
    dddb: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Product summary: id, size, scene, datasets and bands
    #[command(alias = "i")]
    Info { file: PathBuf },

    /// List the DSD table
    Dsds { file: PathBuf },

    /// Print records of a dataset (all of them without an index)
    #[command(alias = "d")]
    Dump {
        file: PathBuf,
        dataset: String,
        index: Option<u32>,
    },

    /// Write a band's scene raster as raw native-endian samples
    #[command(alias = "b")]
    Band {
        file: PathBuf,
        band: String,
        output: PathBuf,
    },

    /// Evaluate a flag expression over the scene into a raw uchar mask
    Bitmask {
        file: PathBuf,
        expr: String,
        output: PathBuf,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn open_product(path: &Path, dddb: Option<&Path>) -> Result<Product> {
    let mut options = OpenOptions::new();
    if let Some(dddb) = dddb {
        debug!(path = %dddb.display(), "loading DDDB");
        options = options.dddb(Dddb::from_path(dddb)?);
    }
    info!(path = %path.display(), "opening product");
    options.open(path)
}

fn create_output(path: &Path) -> Result<BufWriter<File>> {
    Ok(BufWriter::new(File::create(path)?))
}

fn cmd_info(product: &Product) -> Result<()> {
    println!("Product:    {}", product.id_string()?);
    println!("Type:       {}", product.product_type()?);
    println!("File:       {}", product.file_path().display());
    println!("Size:       {} bytes", product.tot_size()?);
    println!(
        "Scene:      {} x {} pixels",
        product.get_scene_width()?,
        product.get_scene_height()?
    );
    let iodd = product.meris_iodd_version()?;
    if iodd > 0 {
        println!("MERIS IODD: {}", iodd);
    }
    println!();

    println!("Datasets ({}):", product.get_num_datasets()?);
    for dataset in product.datasets()? {
        println!(
            "  {:<32} {:>8} records x {:>6} bytes",
            dataset.get_name()?,
            dataset.get_num_records()?,
            dataset.record_size()?
        );
    }
    println!();

    println!("Bands ({}):", product.get_num_bands()?);
    for band in product.bands()? {
        println!(
            "  {:<32} {:<6} {:<5} {}",
            band.get_name()?,
            band.data_type(),
            band.scaling_method().name(),
            band.unit().unwrap_or("")
        );
    }
    Ok(())
}

fn cmd_dsds(product: &Product) -> Result<()> {
    println!(
        "{:>3} {:<28} {:<4} {:>12} {:>12} {:>8} {:>8}",
        "#", "DS_NAME", "TYPE", "OFFSET", "SIZE", "NUM_DSR", "DSR_SIZE"
    );
    for dsd in product.get_dsds()? {
        println!(
            "{:>3} {:<28} {:<4} {:>12} {:>12} {:>8} {:>8}",
            dsd.index, dsd.ds_name, dsd.ds_type, dsd.ds_offset, dsd.ds_size, dsd.num_dsr, dsd.dsr_size
        );
    }
    Ok(())
}

fn cmd_dump(product: &Product, name: &str, index: Option<u32>) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let record = match name {
        "MPH" => Some(product.get_mph()?),
        "SPH" => Some(product.get_sph()?),
        _ => None,
    };
    if let Some(record) = record {
        return record.print(&mut out);
    }

    let dataset = product.get_dataset(name)?;
    match index {
        Some(i) => dataset.read_record(i)?.print(&mut out)?,
        None => {
            for (i, record) in dataset.iter().enumerate() {
                writeln!(out, "# record {}", i)?;
                record?.print(&mut out)?;
            }
        }
    }
    Ok(())
}

fn cmd_band(product: &Product, name: &str, output: &Path) -> Result<()> {
    let band = product.get_band(name)?;
    let raster = band.read_raster(0, 0, None)?;
    let mut out = create_output(output)?;
    raster.write_raw(&mut out)?;
    out.flush()?;
    println!("{} -> {}", raster, output.display());
    Ok(())
}

fn cmd_bitmask(product: &Product, expr: &str, output: &Path) -> Result<()> {
    let (width, height) = (product.get_scene_width()?, product.get_scene_height()?);
    let mut raster = create_bitmask_raster(width, height, 1, 1)?;
    product.read_bitmask_raster(expr, 0, 0, &mut raster)?;

    let mut out = create_output(output)?;
    raster.write_raw(&mut out)?;
    out.flush()?;

    let set = raster
        .data()
        .read()
        .as_array::<u8>()
        .map_or(0, |a| a.iter().filter(|&&v| v != 0).count());
    println!("{} -> {} ({} pixels set)", raster, output.display(), set);
    Ok(())
}

fn run(args: CliArgs) -> Result<()> {
    let dddb = args.dddb.as_deref();
    match &args.command {
        Command::Info { file } => cmd_info(&open_product(file, dddb)?),
        Command::Dsds { file } => cmd_dsds(&open_product(file, dddb)?),
        Command::Dump { file, dataset, index } => {
            cmd_dump(&open_product(file, dddb)?, dataset, *index)
        }
        Command::Band { file, band, output } => {
            cmd_band(&open_product(file, dddb)?, band, output)
        }
        Command::Bitmask { file, expr, output } => {
            cmd_bitmask(&open_product(file, dddb)?, expr, output)
        }
    }
}

fn main() -> ExitCode {
    let args = CliArgs::parse();
    init_logging(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
