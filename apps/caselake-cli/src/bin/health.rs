use caselake_cli::{index_health, init_tracing, load_settings, print_health};

fn main() -> anyhow::Result<()> {
    init_tracing();
    let settings = load_settings()?;
    match index_health(&settings) {
        Ok(report) => {
            print_health(&report);
            if !report.healthy { std::process::exit(1); }
        }
        Err(e) => {
            eprintln!("Vector DB not available: {}", e);
            std::process::exit(1);
        }
    }
    Ok(())
}
