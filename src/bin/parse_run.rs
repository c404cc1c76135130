use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    choice_consensus::apps::run_parse_run(std::env::args().skip(1))
}
