pub mod args;

use clap::Parser;

pub use args::{Arguments, PackageStage, Scheduler, Stage};

pub fn parse() -> Arguments {
    Arguments::parse()
}
