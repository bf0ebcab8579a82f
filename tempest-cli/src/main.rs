//! Tempest: an MCTS chess engine.
//!
//! With no arguments the binary speaks UCI on stdio. Subcommands:
//! - `tempest bench [depth]`
//! - `tempest datagen threads=N positions=M nodes=K`
//! - `tempest genfens count=N seed=S nodes=K`

mod bench;
mod options;
mod uci;

use std::env;
use std::process;

fn keyed_value<T: std::str::FromStr>(args: &[String], key: &str, default: T) -> T {
    args.iter()
        .find_map(|arg| arg.strip_prefix(&format!("{key}=")))
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn main() {
    tempest_core::attacks::init();

    let args: Vec<String> = env::args().collect();
    if args.len() > 1 {
        match args[1].as_str() {
            "bench" => {
                let depth = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(7);
                bench::run(depth);
            }
            "datagen" => {
                if let Err(msg) = tempest_datagen::check_host_endianness() {
                    eprintln!("{msg}");
                    process::exit(1);
                }
                let cfg = tempest_datagen::DatagenConfig {
                    threads: keyed_value(&args, "threads", 1usize).max(1),
                    positions: keyed_value(&args, "positions", 100_000_000u64),
                    nodes: keyed_value(&args, "nodes", 2_000u64).max(1),
                    ..Default::default()
                };
                if let Err(e) = tempest_datagen::run(cfg) {
                    eprintln!("datagen failed: {e}");
                    process::exit(1);
                }
            }
            "genfens" => {
                let count = keyed_value(&args, "count", 1u64);
                let seed = keyed_value(&args, "seed", tempest_logging::now_ms());
                let nodes = keyed_value(&args, "nodes", tempest_datagen::GENFENS_VERIFY_NODES);
                tempest_datagen::gen_fens(count, seed, nodes);
            }
            "--version" | "-V" => println!("Tempest {}", env!("CARGO_PKG_VERSION")),
            other => {
                eprintln!("unknown subcommand: {other}");
                eprintln!("usage: tempest [bench [depth] | datagen ... | genfens ...]");
                process::exit(1);
            }
        }
        return;
    }

    uci::UciSession::new().run_loop();
}
