//! Replicated concurrency-control and recovery engine — command-line driver.
//!
//! Reads an instruction script one line at a time and runs it through an
//! [`Engine`], writing its output to stdout. Every `dump()` line in the
//! input is skipped during the read — `original_source/main.cpp` does the
//! same — and replaced by exactly one synthetic dump once the input is
//! exhausted and the engine has drained to quiescence.

use std::fs::File;
use std::io::{self, BufRead, BufReader};

use log::{error, info};

use repcrec::{Engine, EngineConfig, Instruction, WriterSink};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() > 2 || args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        std::process::exit(if args.len() > 2 { 1 } else { 0 });
    }

    let reader: Box<dyn BufRead> = match args.get(1) {
        Some(path) => match File::open(path) {
            Ok(f) => Box::new(BufReader::new(f)),
            Err(e) => {
                error!("cannot open {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => Box::new(BufReader::new(io::stdin())),
    };

    info!("starting engine run");
    let mut engine = Engine::new(EngineConfig::default(), WriterSink::new(io::stdout()));

    for (lineno, line) in reader.lines().enumerate() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                error!("read error at line {}: {}", lineno + 1, e);
                std::process::exit(1);
            }
        };
        if line.trim_start().starts_with("dump") {
            continue;
        }
        match repcrec::parse_line(&line) {
            Ok(Some(instruction)) => {
                if let Instruction::Dump = instruction {
                    continue;
                }
                if let Err(e) = engine.submit(instruction) {
                    error!("line {}: {}", lineno + 1, e);
                }
            }
            Ok(None) => {}
            Err(e) => error!("line {}: {}", lineno + 1, e),
        }
    }

    engine.finish();
}

fn print_usage() {
    println!("repcrec - replicated concurrency-control and recovery engine");
    println!();
    println!("Usage: repcrec [INSTRUCTION_FILE]");
    println!();
    println!("Reads instructions from INSTRUCTION_FILE, or stdin if omitted.");
}
