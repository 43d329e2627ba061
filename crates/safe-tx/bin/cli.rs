use clap::{
    builder::{styling::AnsiColor, Styles},
    ArgAction, Parser, Subcommand,
};
use safe_cli_runner::CliRunner;
use safe_tx::cmd::{
    config::ConfigCommands, confirm::ConfirmCommand, execute::ExecuteCommand, info::InfoCommand,
    pending::PendingCommand, propose::ProposeCommand, reject::RejectCommand, status::StatusCommand,
    watch::WatchCommand,
};
use safe_version::{LONG_VERSION, SHORT_VERSION};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// The verbosity level.
pub type Verbosity = u8;

#[derive(Debug, Parser)]
#[command(
    name = "safe-tx",
    about = "Propose, confirm and execute Safe multisig transactions.",
    author = "Hyve <support@thehyve.xyz>",
    version = SHORT_VERSION.as_str(),
    long_version = LONG_VERSION.as_str(),
    term_width = 80,
    styles = get_color_style()
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, help = "Enable debug logging")]
    pub debug: bool,

    /// Verbosity level of the log messages.
    ///
    /// Pass multiple times to increase the verbosity (e.g. -v, -vv, -vvv).
    ///
    /// - 0: warnings and errors only
    /// - 1 (-v): lifecycle events
    /// - 2 (-vv): relay and chain calls
    /// - 3 (-vvv): everything, including poll ticks
    #[arg(help_heading = "Display options", global = true, short, long, verbatim_doc_comment, action = ArgAction::Count)]
    verbosity: Verbosity,
}

impl Cli {
    pub fn run(self) -> eyre::Result<()> {
        init_tracing(self.debug, self.verbosity);

        let runner = CliRunner::default();
        match self.command {
            Commands::Propose(propose) => runner.run_command_until_exit(|ctx| propose.execute(ctx)),
            Commands::Reject(reject) => runner.run_command_until_exit(|ctx| reject.execute(ctx)),
            Commands::Confirm(confirm) => runner.run_command_until_exit(|ctx| confirm.execute(ctx)),
            Commands::Execute(execute) => runner.run_command_until_exit(|ctx| execute.execute(ctx)),
            Commands::Status(status) => runner.run_command_until_exit(|ctx| status.execute(ctx)),
            Commands::Pending(pending) => runner.run_command_until_exit(|ctx| pending.execute(ctx)),
            Commands::Watch(watch) => runner.run_command_until_exit(|ctx| watch.execute(ctx)),
            Commands::Info(info) => runner.run_command_until_exit(|ctx| info.execute(ctx)),
            Commands::Config(config) => match config {
                ConfigCommands::Set(set) => runner.run_command_until_exit(|ctx| set.execute(ctx)),
                ConfigCommands::Show(show) => runner.run_command_until_exit(|ctx| show.execute(ctx)),
            },
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(name = "propose")]
    Propose(ProposeCommand),

    #[command(name = "reject")]
    Reject(RejectCommand),

    #[command(name = "confirm")]
    Confirm(ConfirmCommand),

    #[command(name = "execute")]
    Execute(ExecuteCommand),

    #[command(name = "status")]
    Status(StatusCommand),

    #[command(name = "pending")]
    Pending(PendingCommand),

    #[command(name = "watch")]
    Watch(WatchCommand),

    #[command(name = "info")]
    Info(InfoCommand),

    #[command(name = "config", subcommand)]
    Config(ConfigCommands),
}

/// `RUST_LOG` wins over the flags when set.
fn init_tracing(debug: bool, verbosity: Verbosity) {
    let level = match (debug, verbosity) {
        (_, 3..) => "trace",
        (true, _) | (_, 2) => "debug",
        (_, 1) => "info",
        _ => "warn",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("safe_multisig={level},safe_tx={level}")));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn get_color_style() -> Styles {
    Styles::styled()
        .usage(AnsiColor::Green.on_default().bold().underline())
        .header(AnsiColor::Yellow.on_default().bold().underline())
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}
