use super::super::args::{Cli, Command};

pub fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    let config = super::load_config(cli.config.as_deref())?;
    match cli.cmd {
        Command::Pack(args) => super::pack::run(args, config),
        Command::Inspect(args) => super::inspect::run(args),
        Command::Fingerprint(args) => super::fingerprint::run(args),
        Command::Apply(args) => super::apply::run(args, config),
    }
}
