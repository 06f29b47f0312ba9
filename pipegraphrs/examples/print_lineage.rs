use std::{env, path::PathBuf};

use pipegraph::{config::PipegraphConfig, load_pipeline, workflow::generate_pipeline};
use tracing_subscriber::EnvFilter;

fn usage() {
    eprintln!("Usage: print_lineage [declarations_dir]");
    eprintln!("Example: cargo run --example print_lineage -- tests/fixtures/workflow");
    eprintln!("Without a directory the built-in ephys workflow is printed.");
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = env::args().skip(1).collect::<Vec<_>>();
    if args.iter().any(|a| a == "-h" || a == "--help") || args.len() > 1 {
        usage();
        std::process::exit(1);
    }

    let config = PipegraphConfig::load_default();
    let pipeline = match args.first() {
        Some(dir) => load_pipeline(PathBuf::from(dir), &config)?,
        None => generate_pipeline(&config)?,
    };

    for table in pipeline.tables() {
        println!("{table} [{}] {}", table.tier(), table.full_table_name());
        for parent in table.parent_handles() {
            println!("    -> {parent}");
        }
    }
    Ok(())
}
