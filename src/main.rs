use clap::Parser;
use log0::{
    APP_ID_ENV, DirectiveMatcher, ROOT_DIR_ENV, StartPosition, TailConfig, TailWatcher,
    ViewerArgs, app_dir, default_root_dir, normalize_app_id,
};
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::process;
use tokio_stream::StreamExt;

const USAGE: &str = "usage: log0 [appID] [(+|-)tags] [[+|-]stream ...]";

#[derive(Parser)]
#[command(
    name = "log0",
    version,
    about = "Live tail of an application's log0 streams"
)]
struct Cli {
    /// Directory holding every application's stream files.
    #[arg(long, env = ROOT_DIR_ENV)]
    root_dir: Option<PathBuf>,

    /// Replay what the stream files already contain.
    #[arg(long)]
    from_start: bool,

    /// Never colorize stream tags.
    #[arg(long)]
    no_color: bool,

    /// Application to follow when none is given positionally.
    #[arg(long, env = APP_ID_ENV)]
    app: Option<String>,

    /// `[appID] [(+|-)tags] [[+|-]stream ...]`; `...` in a stream name is a wildcard.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    tokens: Vec<String>,
}

#[tokio::main]
async fn main() {
    log0::logging::init();
    let cli = Cli::parse();

    let args = match ViewerArgs::from_tokens(cli.tokens, cli.app) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}. {USAGE}");
            process::exit(1);
        }
    };

    let app_id = normalize_app_id(&args.app_id);
    let root_dir = cli.root_dir.unwrap_or_else(default_root_dir);
    let stdout_is_terminal = std::io::stdout().is_terminal();

    let config = TailConfig {
        start: if cli.from_start {
            StartPosition::Beginning
        } else {
            StartPosition::End
        },
        tag_all: args.tag_all,
        color: !cli.no_color && stdout_is_terminal,
    };
    let matcher = DirectiveMatcher::compile(&args.directives, config.tag_all);

    if stdout_is_terminal {
        // OSC 0 sets the terminal window title
        print!("\x1b]0;{app_id} live logs {}\x07", matcher.title());
    }

    let dir = app_dir(&root_dir, &app_id);
    let mut tail = match TailWatcher::attach(&dir, matcher, config).await {
        Ok(tail) => tail,
        Err(e) => {
            eprintln!("Error watching {}: {e}", dir.display());
            process::exit(1);
        }
    };

    let mut stdout = std::io::stdout();
    loop {
        tokio::select! {
            chunk = tail.next() => match chunk {
                Some(Ok(chunk)) => {
                    let _ = stdout.write_all(chunk.text.as_bytes());
                    let _ = stdout.flush();
                }
                // already reported by the watcher; keep following the others
                Some(Err(_)) => continue,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    tail.detach();
    println!();
}
