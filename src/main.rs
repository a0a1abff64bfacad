use anyhow::Result;
use lab_shell::cli::{self, Args, Startup};
use lab_shell::lexer::ArgLimit;
use lab_shell::{Interpreter, Session};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn main() {
    let argv: Vec<String> = std::env::args().collect();
    let args = match cli::parse(&argv) {
        Startup::Run(args) => args,
        Startup::Version => {
            println!("{}", cli::version_banner());
            std::process::exit(0);
        }
        Startup::Exit { output, success } => {
            if success {
                print!("{output}");
                std::process::exit(0);
            }
            eprint!("{output}");
            std::process::exit(1);
        }
    };

    init_logging(&args.log_level);

    if let Err(e) = run(&args) {
        error!(error = %format!("{e:#}"), "shell terminated");
        eprintln!("lab-shell: {e:#}");
        std::process::exit(1);
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .init();
}

fn run(args: &Args) -> Result<()> {
    let session = Session::initialize()?;
    info!(
        prompt = session.prompt(),
        terminal = session.terminal_fd(),
        pgid = %session.process_group(),
        interactive = session.is_interactive(),
        "session initialized"
    );

    let limit = args.arg_max.map_or_else(ArgLimit::from_system, ArgLimit::new);
    Interpreter::with_session(session)
        .with_arg_limit(limit)
        .repl()
}
