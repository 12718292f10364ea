use clap::Parser;

mod cli;

fn main() {
    cli::run(cli::Cli::parse());
}
