mod cli;
mod execute;

use clap::Parser;

use crate::cli::CLI;

fn main() {
    env_logger::init();
    let cli = CLI::parse();
    match execute::execute(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            execute::report_error(&e);
            std::process::exit(1);
        }
    }
}
