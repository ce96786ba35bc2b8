pub mod arrays;
pub mod cli;
pub mod emit;
pub mod error;
pub mod provider;
pub mod resolve;
pub mod run;
pub mod scaffold;
pub mod schema;
pub mod spec;
pub mod toolcheck;

#[cfg(test)]
mod testutil;

fn main() -> anyhow::Result<()> {
    cli::CommandLineInterface::load().run()
}
