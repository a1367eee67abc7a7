fn main() -> anyhow::Result<()> {
    tally_cli::run_app()
}
