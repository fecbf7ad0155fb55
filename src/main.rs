use std::fs::File;
use std::io::{self, BufRead, BufReader};

use argh::FromArgs;
use kine2parquet::{LocalDirSink, Pipeline, PipelineConfig};

#[derive(FromArgs)]
/// Decode wearable sensor envelopes and write one Parquet file per patient limb
struct Args {
    /// newline-delimited JSON envelopes; stdin when omitted
    #[argh(option, short = 'i')]
    input: Option<String>,

    /// directory artifacts are written below
    #[argh(option, short = 'o', default = "String::from(\"out\")")]
    out: String,

    /// path to a JSON pipeline configuration file
    #[argh(option, short = 'c')]
    config: Option<String>,
}

fn read_records(reader: impl BufRead) -> io::Result<Vec<String>> {
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if !line.trim().is_empty() {
            records.push(line);
        }
    }
    Ok(records)
}

fn main() {
    let env = env_logger::Env::default().default_filter_or("info");
    env_logger::init_from_env(env);

    let args: Args = argh::from_env();

    let config = match &args.config {
        Some(path) => match PipelineConfig::from_file(path) {
            Ok(c) => c,
            Err(e) => {
                log::error!("Failed to load config from '{}': {}", path, e);
                std::process::exit(1);
            }
        },
        None => PipelineConfig::default(),
    };

    let records = match &args.input {
        Some(path) => File::open(path).and_then(|f| read_records(BufReader::new(f))),
        None => read_records(io::stdin().lock()),
    };
    let records = match records {
        Ok(r) => r,
        Err(e) => {
            log::error!("Failed to read envelopes: {}", e);
            std::process::exit(1);
        }
    };

    log::info!("Read {} envelopes, writing to {}", records.len(), args.out);

    let mut pipeline = Pipeline::new(config);
    let mut sink = LocalDirSink::new(&args.out);

    match pipeline.process_records(&records, &mut sink) {
        Ok(report) => {
            for artifact in &report.artifacts {
                println!(
                    "{}\t{} rows\t{} row groups",
                    sink.root().join(&artifact.key).display(),
                    artifact.metadata.num_rows,
                    artifact.metadata.row_groups.len()
                );
            }
            if report.envelopes_dropped > 0 {
                log::warn!("{} envelopes dropped", report.envelopes_dropped);
            }
            if !report.is_complete() {
                for failed in &report.failed {
                    log::error!("{}: {}", failed.identity, failed.error);
                }
                std::process::exit(2);
            }
        }
        Err(e) => {
            log::error!("Batch failed: {}", e);
            std::process::exit(1);
        }
    }
}
