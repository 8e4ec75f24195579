//! Inspect how a contract is chunked and what a PC trace costs under each scheme.
//!
//! Usage:
//!   cargo run --bin chunk_layout -- --code 0x7f...5b00 --pcs 0,40,40
//!   cargo run --bin chunk_layout -- --code-file runtime.hex --stats
//!   RUST_LOG=chunk_witness=trace cargo run --bin chunk_layout -- --code 0x6001

use chunk_witness::{
    build_invalid_jumpdest_table, join_chunk_reports, jumpdest::encode_table_prefix,
    simulate_transaction, Address, ChunkingScheme, PcAccess, SimulationConfig, TransactionTrace,
    B256,
};
use std::collections::HashMap;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return;
    }

    let code_hex = match (parse_arg(&args, "--code"), parse_arg(&args, "--code-file")) {
        (Some(hex), _) => hex.to_string(),
        (None, Some(path)) => std::fs::read_to_string(path).expect("readable code file"),
        (None, None) => {
            print_usage();
            std::process::exit(2);
        }
    };
    let code_hex = code_hex.trim();
    let code = hex::decode(code_hex.strip_prefix("0x").unwrap_or(code_hex)).expect("valid hex bytecode");

    let pcs: Vec<u64> = parse_arg(&args, "--pcs")
        .map(|s| {
            s.split(',')
                .filter(|p| !p.is_empty())
                .map(|p| p.trim().parse().expect("invalid pc"))
                .collect()
        })
        .unwrap_or_default();
    let collect_chunk_stats = args.iter().any(|a| a == "--stats");

    let table = build_invalid_jumpdest_table(&code);
    println!("=== Contract ===");
    println!("Code size: {} bytes", code.len());
    println!("Jumpdest table: {} entries, {} bytes", table.num_entries(), table.len());
    println!("Table prefix: 0x{}", hex::encode(encode_table_prefix(&table)));
    for entry in table.entries() {
        println!("  chunk {:>5}  first valid offset {:>2}", entry.chunk_number, entry.first_valid_offset);
    }
    println!();

    let contract = Address::ZERO;
    let bytecode = HashMap::from([(contract, code)]);
    let trace = TransactionTrace {
        tx_hash: B256::ZERO,
        destination: contract,
        accesses: pcs.iter().map(|&pc| PcAccess { contract, pc }).collect(),
    };
    let config = SimulationConfig { collect_chunk_stats, ..Default::default() };

    let report = match simulate_transaction(&trace, &bytecode, &config) {
        Ok(report) => report,
        Err(err) => {
            eprintln!("simulation failed: {err}");
            std::process::exit(1);
        }
    };

    for (metrics, scheme) in report.reports.iter().zip(ChunkingScheme::ALL) {
        let stats = &metrics.contracts[&contract];
        println!("=== {} ===", metrics.chunker_name);
        println!("Chunk size: {}", scheme.chunk_size());
        println!("Chunked size: {} bytes ({} chunks)", stats.chunked_size_bytes, stats.num_code_chunks);
        println!("Header warm-up gas: {}", metrics.warmup_gas);
        println!("Code chunk gas: {}", metrics.gas);
        for chunk in &stats.chunks {
            println!(
                "  chunk {:>5}  accessed {:>2} bytes  gas {}",
                chunk.chunk_number, chunk.accessed_bytes, chunk.charged_gas
            );
        }
        println!();
    }

    if collect_chunk_stats {
        println!("=== Side by side ===");
        let names: Vec<_> = report.reports.iter().map(|m| m.chunker_name.as_str()).collect();
        println!("  chunk  {}", names.join("  "));
        for ((_, chunk_number), slots) in join_chunk_reports(&report.reports) {
            let cells: Vec<String> = slots
                .iter()
                .map(|slot| match slot {
                    Some(chunk) => format!("{:>13}", chunk.charged_gas),
                    None => format!("{:>13}", "-"),
                })
                .collect();
            println!("  {:>5}  {}", chunk_number, cells.join(""));
        }
    }
}

fn parse_arg<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

fn print_usage() {
    println!("Code chunking layout inspector");
    println!();
    println!("USAGE:");
    println!("  chunk_layout [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("  --code <HEX>         Runtime bytecode");
    println!("  --code-file <PATH>   File holding runtime bytecode as hex");
    println!("  --pcs <N,N,...>      Program counters to replay, in order");
    println!("  --stats              Print per-chunk statistics");
    println!("  --help               Show this message");
    println!();
    println!("Set RUST_LOG=chunk_witness=debug to log layout decisions.");
}
