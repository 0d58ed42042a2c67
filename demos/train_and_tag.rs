//! Train on a labeled text file and tag an unlabeled one.
//!
//! ```text
//! RUST_LOG=info cargo run --example train_and_tag -- train.txt test.txt
//! ```

use std::env;
use std::fs;
use std::process;

use chaincrf::{Config, Trainer};

fn main() -> Result<(), chaincrf::Error> {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.len() != 2 {
        eprintln!("usage: train_and_tag <training file> <input file>");
        process::exit(2);
    }

    let mut builder = Config::builder().verbose(true);
    // CRF_EPSILON=0.05, CRF_MAX_ITERATIONS=50, CRF_USEFEATURE_T=true, ...
    for (var, value) in env::vars() {
        if let Some(option) = var.strip_prefix("CRF_") {
            builder.set(&option_name(option), &value)?;
        }
    }
    let config = builder.build()?;

    let mut trainer = Trainer::new(config);
    let count = trainer.load_text(&fs::read(&args[0])?)?;
    log::info!("loaded {} training sequences", count);
    let model = trainer.train()?;
    let report = model.report();
    log::info!(
        "trained {} features in {} iterations (converged: {})",
        model.num_features(),
        report.iterations,
        report.converged
    );

    let input = fs::read(&args[1])?;
    let mut tagger = model.tagger();
    for labels in tagger.tag_text(&input)? {
        for label in labels {
            println!("{}", label);
        }
        println!();
    }
    Ok(())
}

fn option_name(var: &str) -> String {
    match var.strip_prefix("USEFEATURE_") {
        Some(tag) => format!("usefeature.{}", tag),
        None => var.to_lowercase(),
    }
}
