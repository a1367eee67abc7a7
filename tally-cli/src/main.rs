use anyhow::Result;

fn main() -> Result<()> {
    tally_cli::run_app()
}
