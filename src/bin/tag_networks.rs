use anyhow::Result;

use cyclenet::app::{TAG_USAGE, TagCli, init_tracing, parse_or_usage, run_tag};

fn main() -> Result<()> {
    let cli: TagCli = parse_or_usage(TAG_USAGE);
    init_tracing(cli.common.verbose);
    run_tag(&cli)?;
    Ok(())
}
