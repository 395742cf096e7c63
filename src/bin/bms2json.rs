//! BMS to JSON disassembler

use clap::Parser;
use miditobms::bms::{BmsJson, BmsReader};
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bms2json")]
#[command(version = "0.3.0")]
#[command(about = "Disassemble BMS sequence files to JSON", long_about = None)]
struct Args {
    /// Input BMS file
    input: PathBuf,

    /// Output JSON file (writes to stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output compact JSON (default is pretty-printed)
    #[arg(short, long)]
    compact: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let data = fs::read(&args.input)?;
    let instructions = BmsReader::new(&data).parse_commands()?;
    debug!("Decoded {} instructions", instructions.len());

    let bms_json = BmsJson::new(data.len(), instructions);

    let json_string = if args.compact {
        serde_json::to_string(&bms_json)?
    } else {
        serde_json::to_string_pretty(&bms_json)?
    };

    match args.output {
        Some(path) => {
            let mut file = File::create(path)?;
            file.write_all(json_string.as_bytes())?;
            file.write_all(b"\n")?;
        }
        None => {
            println!("{}", json_string);
        }
    }

    Ok(())
}
