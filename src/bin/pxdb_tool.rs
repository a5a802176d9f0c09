use clap::{Parser, Subcommand};
use std::path::PathBuf;

use paradox_db::{export_to_csv, export_to_json, read_table_with_options, OpenOptions};

#[derive(Parser)]
#[command(name = "pxdb_tool")]
#[command(about = "A tool for working with legacy Paradox (.DB/.MB) tables", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display information about a Paradox table
    Info {
        /// The .DB file to inspect
        file: PathBuf,
        /// Password, if the table is encrypted
        #[arg(short, long)]
        password: Option<String>,
        /// Override the table's declared codepage
        #[arg(short, long)]
        encoding: Option<String>,
    },
    /// Export a table to JSON
    ExportJson {
        /// The .DB file to export
        file: PathBuf,
        /// Output JSON file
        output: PathBuf,
        #[arg(short, long)]
        password: Option<String>,
        #[arg(short, long)]
        encoding: Option<String>,
    },
    /// Export a table to CSV
    ExportCsv {
        /// The .DB file to export
        file: PathBuf,
        /// Output CSV file
        output: PathBuf,
        #[arg(short, long)]
        password: Option<String>,
        #[arg(short, long)]
        encoding: Option<String>,
    },
}

fn open_options(password: Option<String>, encoding: Option<String>) -> OpenOptions {
    let mut options = OpenOptions::new();
    if let Some(password) = password {
        options = options.password(password);
    }
    if let Some(encoding) = encoding {
        options = options.encoding(encoding);
    }
    options
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Info {
            file,
            password,
            encoding,
        } => {
            let table = read_table_with_options(&file, open_options(password, encoding))?;
            let metadata = &table.metadata;

            println!("Paradox table: {}", file.display());
            println!("  Records: {}", metadata.record_count);
            println!("  Fields: {}", metadata.field_count);
            println!("  Codepage: {}", metadata.codepage);
            println!("  Header version: {}", metadata.header_version);
            for field in &metadata.fields {
                println!("    {:<24} {:?} ({} bytes)", field.name, field.field_type, field.size);
            }
        }
        Commands::ExportJson {
            file,
            output,
            password,
            encoding,
        } => {
            let table = read_table_with_options(&file, open_options(password, encoding))?;
            let output_file = std::fs::File::create(output)?;
            export_to_json(&table, output_file)?;
            println!("Exported {} records to JSON", table.records.len());
        }
        Commands::ExportCsv {
            file,
            output,
            password,
            encoding,
        } => {
            let table = read_table_with_options(&file, open_options(password, encoding))?;
            let output_file = std::fs::File::create(output)?;
            export_to_csv(&table, output_file)?;
            println!("Exported {} records to CSV", table.records.len());
        }
    }

    Ok(())
}
