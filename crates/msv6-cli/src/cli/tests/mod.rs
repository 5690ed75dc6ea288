//! CLI parse tests.

use super::{Cli, CliCommand};
use clap::Parser;

pub(super) fn parse(args: &[&str]) -> CliCommand {
    let cli = Cli::try_parse_from(args).unwrap();
    cli.command
}

pub(super) fn parse_cli(args: &[&str]) -> Cli {
    Cli::try_parse_from(args).unwrap()
}


#[test]
fn global_flags_after_subcommand() {
    let cli = parse_cli(&["msv6", "plan", "--repo-id", "o/n", "--ipv6", "--verbose"]);
    assert!(cli.ipv6);
    assert!(cli.debug_logging());
    let cli = parse_cli(&["msv6", "--debug", "man"]);
    assert!(cli.debug_logging());
    assert!(!cli.ipv6);
}

#[test]
fn completions_shell_parses() {
    match parse(&["msv6", "completions", "bash"]) {
        CliCommand::Completions { shell } => assert_eq!(shell, clap_complete::Shell::Bash),
        _ => panic!("expected Completions"),
    }
    assert!(Cli::try_parse_from(["msv6", "completions", "tcsh"]).is_err());
}

#[test]
fn command_definition_is_consistent() {
    use clap::CommandFactory;
    Cli::command().debug_assert();
}

#[test]
fn human_bytes_units() {
    use super::commands::human_bytes;
    assert_eq!(human_bytes(0), "0 B");
    assert_eq!(human_bytes(1023), "1023 B");
    assert_eq!(human_bytes(1536), "1.5 KiB");
    assert_eq!(human_bytes(3 * 1024 * 1024), "3.0 MiB");
}
