mod cli;

use clap::Parser;
use cli::Cli;
use colored::Colorize;
use safe_tx::exit::exit_code;

fn main() {
    if let Err(err) = Cli::parse().run() {
        let code = exit_code(&err);
        if code == 0 {
            println!("{}", format!("{err}").yellow());
        } else {
            eprintln!("Error: {err:?}");
        }
        std::process::exit(code);
    }
}
