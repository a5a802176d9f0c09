//! # Read Table Example
//!
//! Demonstrates opening a Paradox `.DB` table, printing its schema, and
//! iterating its records.
//!
//! ## Usage
//! ```bash
//! cargo run --example read_table -- path/to/table.db
//! ```

use std::env;
use std::path::Path;

use paradox_db::{Document, OpenOptions};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = env::args().nth(1).unwrap_or_else(|| "country.db".to_string());
    let path = Path::new(&path);

    println!("Opening table: {}", path.display());
    let mut doc = Document::open(path, OpenOptions::new()).inspect_err(|_| {
        eprintln!("Error: could not open '{}'", path.display());
    })?;

    let metadata = doc.metadata()?;
    println!("Fields:");
    for field in &metadata.fields {
        println!("  {:<20} {:?} ({} bytes)", field.name, field.field_type, field.size);
    }

    println!("\nRecords:");
    let mut count = 0;
    for record in doc.records()? {
        let record = record?;
        println!("  {:?}", record.values());
        count += 1;
    }
    println!("\n{count} records read");

    for warning in doc.warnings() {
        eprintln!("warning: {warning}");
    }

    doc.close();
    Ok(())
}
