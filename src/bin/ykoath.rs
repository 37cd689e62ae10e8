use anyhow::{Context as _, Result};
use clap::Parser as _;
use owo_colors::OwoColorize;
use tap::TapFallible;
use tracing::{debug, trace, trace_span, warn};
use ykoath::oath::Outcome;
use ykoath::pcsc::PcscContext;
use ykoath::session::DEFAULT_READER_MARKER;
use ykoath::transport::Context;
use ykoath::Session;

#[derive(clap::Parser, Debug)]
struct Args {
    /// Increase log level.
    #[arg(short, long, action=clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease log level.
    #[arg(short, long, action=clap::ArgAction::Count)]
    quiet: u8,

    /// Use the first reader whose name contains this (case-insensitive).
    #[arg(short, long, default_value = DEFAULT_READER_MARKER)]
    reader: String,

    /// Command.
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// List connected readers.
    ListReaders,

    /// List stored credentials.
    List,

    /// Calculate one-time passwords.
    Code {
        /// Only calculate this credential.
        name: Option<String>,
    },

    /// Delete a credential.
    Delete { name: String },
}

impl Command {
    pub fn run(&self, args: &Args) -> Result<()> {
        match self {
            Self::ListReaders => self.list_readers(args),
            Self::List => with_session(args, |session| {
                for name in session.list()? {
                    let details = format!("({}, {})", name.kind, name.algorithm);
                    println!("{} {}", name.name, details.dimmed());
                }
                Ok(())
            }),
            Self::Code { name: Some(name) } => with_session(args, |session| {
                let code = session
                    .calculate(name)
                    .with_context(|| format!("couldn't calculate {}", name))?;
                println!("{}", code.bold());
                Ok(())
            }),
            Self::Code { name: None } => with_session(args, |session| {
                let entries = session.calculate_all()?;
                let width = name_width(entries.iter().map(|e| e.name.as_str()));
                for entry in entries {
                    match entry.outcome {
                        Outcome::Code(code) => {
                            println!("{:width$}  {}", entry.name, code.bold(), width = width)
                        }
                        Outcome::TouchRequired => {
                            println!("{:width$}  {}", entry.name, "[touch]".yellow(), width = width)
                        }
                        Outcome::Hotp => {
                            println!("{:width$}  {}", entry.name, "[hotp]".cyan(), width = width)
                        }
                    }
                }
                Ok(())
            }),
            Self::Delete { name } => with_session(args, |session| {
                session
                    .delete(name)
                    .with_context(|| format!("couldn't delete {}", name))?;
                println!("Deleted {}", name.green());
                Ok(())
            }),
        }
    }

    fn list_readers(&self, _args: &Args) -> Result<()> {
        let span = trace_span!("list_readers");
        let _enter = span.enter();

        let ctx = PcscContext::establish().context("couldn't establish PC/SC context")?;
        for name in ctx.list_readers().context("couldn't list readers")? {
            println!("{}", name);
        }
        ctx.release()
            .tap_err(|err| warn!(%err, "Couldn't release context"))
            .ok();
        Ok(())
    }
}

/// Opens a session on the selected reader, selects the OATH applet, runs `f`, and closes
/// the session again, even if `f` failed.
fn with_session<F>(args: &Args, f: F) -> Result<()>
where
    F: FnOnce(&mut Session) -> Result<()>,
{
    let ctx = PcscContext::establish().context("couldn't establish PC/SC context")?;
    let mut session = Session::open_matching(ctx, &args.reader)?;
    let result = session
        .select()
        .context("couldn't select OATH applet")
        .and_then(|rsp| {
            debug!(version = %rsp.version_string(), "OATH applet selected");
            f(&mut session)
        });
    let close = session.close();
    result?;
    Ok(close?)
}

/// Width of the name column, in chars, since that's what `{:width$}` pads by.
fn name_width<'a>(names: impl Iterator<Item = &'a str>) -> usize {
    names.map(|name| name.chars().count()).max().unwrap_or(0)
}

fn init_logging(args: &Args) {
    tracing_subscriber::fmt()
        .without_time()
        .with_target(false)
        .with_max_level(match 2u8.saturating_add(args.verbose).saturating_sub(args.quiet) {
            0 => tracing::Level::ERROR,
            1 => tracing::Level::WARN,
            2 => tracing::Level::INFO,
            3 => tracing::Level::DEBUG,
            4.. => tracing::Level::TRACE,
        })
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args);
    trace!(?args, "Starting up");
    args.command.run(&args)
}
