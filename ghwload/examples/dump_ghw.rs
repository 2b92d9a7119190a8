// Copyright 2024 The Regents of the University of California
// Copyright 2024-2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use clap::Parser;
use ghwload::{GhwLoader, LoadOptions};
use std::io::Write;

#[derive(Parser, Debug)]
#[command(name = "dump_ghw")]
#[command(author = "Kevin Laeufer <laeufer@cornell.edu>")]
#[command(version)]
#[command(about = "Loads a GHW file and prints its signal directory.", long_about = None)]
struct Args {
    #[arg(value_name = "GHWFILE", index = 1)]
    filename: String,
    #[arg(long, help = "print every history entry")]
    full: bool,
    #[arg(long, help = "only print the changes of this signal")]
    signal: Option<String>,
    #[arg(long, default_value = "0")]
    start: i64,
    #[arg(long, default_value_t = i64::MAX)]
    end: i64,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let start = std::time::Instant::now();
    let dump = match GhwLoader::new(LoadOptions::default()).load(&args.filename) {
        Ok(dump) => dump,
        Err(e) => {
            eprintln!("Failed to load {}: {e}", args.filename);
            std::process::exit(1);
        }
    };
    let load_duration = start.elapsed();
    println!(
        "It took {load_duration:?} to load {} signals.",
        dump.facs().len()
    );
    let stats = dump.glitch_stats();
    println!(
        "{} glitches in {} regions, time range {}..{}",
        stats.glitches,
        stats.regions,
        dump.time_range().start,
        dump.time_range().end
    );

    let mut out = std::io::stdout().lock();
    if let Some(name) = args.signal {
        match dump.changes(&name, args.start, args.end, usize::MAX) {
            Some(changes) => {
                for (time, value) in changes {
                    writeln!(out, "{time}: {value}").unwrap();
                }
            }
            None => eprintln!("unknown signal {name}"),
        }
    } else if args.full {
        dump.write_debug(&mut out).unwrap();
    } else {
        for fac in dump.facs() {
            writeln!(out, "{}", fac.name).unwrap();
        }
    }
}
