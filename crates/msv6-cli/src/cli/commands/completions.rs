//! `msv6 completions <shell>` and `msv6 man`.

use anyhow::Result;
use clap::CommandFactory;
use clap_complete::Shell;
use std::io;

use super::EXIT_OK;
use crate::cli::Cli;

pub fn run_completions(shell: Shell) -> Result<i32> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, &mut io::stdout());
    Ok(EXIT_OK)
}

pub fn run_man() -> Result<i32> {
    let man = clap_mangen::Man::new(Cli::command());
    man.render(&mut io::stdout())?;
    Ok(EXIT_OK)
}
