use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    choice_consensus::apps::run_analyze_runs(std::env::args().skip(1))
}
