use std::env;

use caselake_cli::{index_health, init_tracing, load_settings, open_index, print_health};
use caselake_core::Error;
use caselake_ingest::pipeline_from_settings;
use caselake_rag::RagService;

const USAGE: &str = "Usage: caselake <ingest | ask \"<question>\" [--keyword K] | health | sources>";

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() { eprintln!("{}", USAGE); std::process::exit(1); }
    let cmd = args.remove(0);
    (cmd, args)
}

fn parse_ask(args: &[String]) -> (String, Option<String>) {
    let mut question = Vec::new();
    let mut keyword = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--keyword" | "-k" => {
                if i + 1 < args.len() { keyword = Some(args[i + 1].clone()); i += 1; }
                else { eprintln!("Error: --keyword requires a value"); std::process::exit(1); }
            }
            other => question.push(other.to_string()),
        }
        i += 1;
    }
    if question.is_empty() { eprintln!("{}", USAGE); std::process::exit(1); }
    (question.join(" "), keyword)
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let settings = load_settings()?;
    let (cmd, args) = parse_args();
    match cmd.as_str() {
        "ingest" => {
            let report = pipeline_from_settings(&settings)?.with_progress(true).run()?;
            println!(
                "Ingested {} chunks from {} documents ({} skipped without text)",
                report.chunks, report.documents, report.skipped
            );
        }
        "ask" => {
            let (question, keyword) = parse_ask(&args);
            let service = RagService::from_settings(&settings)?;
            match service.ask(&question, keyword.as_deref()) {
                Ok(answer) => {
                    println!("{}", answer.text);
                    if !answer.sources.is_empty() {
                        println!("\nSources:");
                        for s in &answer.sources { println!("- {}", s); }
                    }
                }
                Err(e @ Error::Provider { .. }) => {
                    eprintln!("Request failed, please try again: {}", e);
                    std::process::exit(2);
                }
                Err(e) => return Err(e.into()),
            }
        }
        "health" => {
            let report = index_health(&settings)?;
            print_health(&report);
            if !report.healthy { std::process::exit(1); }
        }
        "sources" => {
            for s in open_index(&settings)?.sources() { println!("{}", s); }
        }
        _ => { eprintln!("Unknown command: {}\n{}", cmd, USAGE); std::process::exit(1); }
    }
    Ok(())
}
