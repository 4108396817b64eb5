use anyhow::Result;

use cyclenet::app::{COUNT_USAGE, CountCli, init_tracing, parse_or_usage, run_count};

fn main() -> Result<()> {
    let cli: CountCli = parse_or_usage(COUNT_USAGE);
    init_tracing(cli.common.verbose);
    run_count(&cli)?;
    Ok(())
}
