// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use clap::Parser;

mod cli;

use cli::args::{Cli, Commands};
use cli::simulate::run_simulation;

fn main() {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Simulate(args) => {
            cli::logging::init(args.verbose);
            run_simulation(args);
        }
    }
}
