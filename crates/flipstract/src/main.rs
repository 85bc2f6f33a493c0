mod cli;
mod logging;
mod run;

use anyhow::Result;
use clap::Parser;

use crate::cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    let line = run::run(&cli.input, &cli.decoder_path())?;
    println!("{line}");
    Ok(())
}
