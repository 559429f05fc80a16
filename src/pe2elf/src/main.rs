use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::LevelFilter;

use pe2elf::{convert, PeParser};

#[derive(Parser, Debug)]
#[command(name = "pe2elf", about = "Convert a PE/i386 image into a relocatable ELF object")]
struct Args {
    /// PE input file
    #[arg(short, long)]
    input: PathBuf,
    /// ELF output file
    #[arg(short, long, default_value = "out.elf")]
    output: PathBuf,
    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn run(args: &Args) -> pe2elf::Result<()> {
    let image = PeParser::open(&args.input)?.read()?;

    // The relocation pass reads back and patches words it already wrote,
    // so the output file is opened for reading as well.
    let out = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(&args.output)?;
    convert(&image, out)?;

    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(if args.verbose { LevelFilter::Debug } else { LevelFilter::Info })
        .format_timestamp(None)
        .format_target(false)
        .parse_default_env()
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
