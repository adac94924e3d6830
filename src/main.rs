use clap::{Parser, Subcommand};
use fdd::{ReaderOptions, RowOrCell, Value};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fdd", version = "0.1.0", about = "Freeze-Dried Data container CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a file's schema, row count, splits, and properties
    Info {
        input: PathBuf,
    },
    /// Print one row's decoded columns
    Dump {
        input: PathBuf,
        key: String,
        /// Split to resolve the key against
        #[arg(short, long, default_value = "all_rows")]
        split: String,
    },
    /// List every split a file carries
    Splits {
        input: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    match Cli::parse().command {
        Commands::Info { input } => {
            let reader = fdd::open_reader(&input, ReaderOptions::default())?;
            let file_size = std::fs::metadata(&input)?.len();
            println!("── fdd file ─────────────────────────────────────────────");
            println!("  Path       {}", input.display());
            println!("  File size  {} B", file_size);
            println!("  Rows       {}", reader.len());
            match reader.columns() {
                Some(columns) => {
                    println!("  Columns    ({}):", columns.len());
                    for c in columns {
                        println!("    {:<20} {}", c.name, c.codec.name());
                    }
                }
                None => println!("  Columns    (schemaless)"),
            }
            let splits = reader.available_splits();
            println!("  Splits     ({}): {}", splits.len(), splits.join(", "));
            let properties: Vec<&str> = reader.property_names().collect();
            println!("  Properties ({}): {}", properties.len(), properties.join(", "));
        }

        Commands::Dump { input, key, split } => {
            let reader = fdd::open_reader(&input, ReaderOptions { split, ..ReaderOptions::default() })?;
            let key = parse_key(&key);
            match reader.get(&key)? {
                RowOrCell::Row(row) => {
                    let view = row.row_view();
                    for (name, value) in view.items()? {
                        println!("{name} = {value:?}");
                    }
                }
                RowOrCell::Cell(value) => println!("{value:?}"),
            }
        }

        Commands::Splits { input } => {
            let reader = fdd::open_reader(&input, ReaderOptions::default())?;
            for name in reader.available_splits() {
                println!("{name}");
            }
        }
    }

    Ok(())
}

/// CLI keys are always given as plain strings; numeric-looking keys parse
/// as `Value::Int` so integer-keyed files can be dumped from the shell.
fn parse_key(s: &str) -> Value {
    match s.parse::<i128>() {
        Ok(i) => Value::Int(i),
        Err(_) => Value::Str(s.to_owned()),
    }
}
