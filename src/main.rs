use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;
use miette::{miette, Result, Severity};

use rv64sim::debugger::{print_trace, Shell, ShellOptions};
use rv64sim::output::Output;
use rv64sim::{Debugger, OpcodePolicy, Options, Program};

/// rv64sim loads textual RV64I assembly programs, then runs or debugs them instruction by
/// instruction.
#[derive(Parser)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Quickly provide a `.s` file to debug
    path: Option<PathBuf>,

    #[command(flatten)]
    flags: Flags,
}

#[derive(clap::Args, Clone, Copy, Debug)]
struct Flags {
    /// Treat unknown opcodes as no-ops, instead of rejecting the program
    #[arg(long, global = true)]
    permissive: bool,
    /// Make `x0` always read as zero, discarding writes to it
    #[arg(long, global = true)]
    hardwire_zero: bool,
    /// Sign-extend `lw`, `lh` and `lb`, instead of zero-extending them
    #[arg(long, global = true)]
    sign_extend_loads: bool,
    /// Produce minimal output, suited for blackbox tests
    #[arg(short, long, global = true)]
    minimal: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run a program until it ends, then print all registers
    Run {
        /// Assembly file to run
        name: PathBuf,
    },
    /// Start the interactive debugger, optionally with a program loaded
    Debug {
        /// Assembly file to load
        name: Option<PathBuf>,
        /// Read debugger commands from argument, separated by newlines or `;`
        #[arg(short, long)]
        command: Option<String>,
    },
    /// Check an assembly file for errors without running it
    Check {
        /// File to check
        name: PathBuf,
    },
}

fn main() -> Result<()> {
    use MsgColor::*;
    let args = Args::parse();
    rv64sim::env::init();

    let minimal = args.flags.minimal;
    Output::set_minimal(minimal);

    miette::set_hook(Box::new(move |_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .context_lines(rv64sim::DIAGNOSTIC_CONTEXT_LINES)
                .color(!minimal)
                .unicode(!minimal)
                .build(),
        )
    }))?;

    let options = args.flags.options();
    match args.command {
        Some(Command::Run { name }) => run(&name, options),
        Some(Command::Debug { name, command }) => debug(name.as_deref(), command, options),
        Some(Command::Check { name }) => {
            file_message(Green, "Checking", &name);
            let program = Program::from_file(&name, options.unknown_opcodes)?;
            message(
                Green,
                "Success",
                &format!("no errors found ({} instructions)", program.len()),
            );
            Ok(())
        }
        None => debug(args.path.as_deref(), None, options),
    }
}

impl Flags {
    /// Flags enable an option, as do their environment variables.
    fn options(self) -> Options {
        let env = rv64sim::env::options();
        Options {
            unknown_opcodes: if self.permissive {
                OpcodePolicy::Permissive
            } else {
                env.unknown_opcodes
            },
            hardwire_zero: self.hardwire_zero || env.hardwire_zero,
            sign_extend_loads: self.sign_extend_loads || env.sign_extend_loads,
        }
    }
}

enum MsgColor {
    Green,
    Cyan,
    Red,
}

fn file_message(color: MsgColor, left: &str, right: &Path) {
    let right = format!("target {}", right.display());
    message(color, left, &right);
}

/// Status line on stderr, omitted if `--minimal`.
fn message(color: MsgColor, left: &str, right: &str) {
    if Output::is_minimal() {
        return;
    }
    let left = match color {
        MsgColor::Green => left.green(),
        MsgColor::Cyan => left.cyan(),
        MsgColor::Red => left.red(),
    };
    eprintln!("{left:>12} {right}");
}

fn run(name: &Path, options: Options) -> Result<()> {
    file_message(MsgColor::Green, "Loading", name);
    let program = Program::from_file(name, options.unknown_opcodes)?;
    let mut debugger = Debugger::new(options);
    debugger.load(program);

    message(MsgColor::Green, "Running", "loaded program");
    let result = debugger.run(print_trace);
    Output::Normal.print_registers(debugger.state());

    if let Err(fault) = result {
        file_message(MsgColor::Red, "Faulted", name);
        return Err(miette!(
            severity = Severity::Error,
            code = "run::fault",
            help = "run `debug` on the file to step up to the faulting instruction",
            "{fault}",
        ));
    }
    file_message(MsgColor::Green, "Completed", name);
    Ok(())
}

fn debug(name: Option<&Path>, command: Option<String>, options: Options) -> Result<()> {
    let mut debugger = Debugger::new(options);
    match name {
        Some(name) => {
            file_message(MsgColor::Green, "Loading", name);
            debugger.load(Program::from_file(name, options.unknown_opcodes)?);
        }
        None => message(
            MsgColor::Cyan,
            "Help",
            "use `load <file>` to load a program, or `help` for all commands",
        ),
    }

    Shell::new(ShellOptions { command }, debugger).run();
    Ok(())
}
