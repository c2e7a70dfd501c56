use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Build automation task runner
#[derive(Parser, Debug)]
#[command(
    name = "buildrig",
    about = "Discover and run build tasks for a named build context",
    version,
    author,
    long_about = "buildrig collects the tasks registered for a build context (built-in task \
                  families and script plugins), checks their environment requirements and \
                  runs them in order with cooperative cancellation."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "List the tasks of a build context",
        long_about = "Enumerates the tasks of a context without a live project: settings, \
                      requirements and option schema.\n\n\
                      Examples:\n  \
                      buildrig list CppExample\n  \
                      buildrig list CppExample --format json"
    )]
    List(ListArgs),

    #[command(
        about = "Check task requirements against this machine",
        long_about = "Evaluates every requirement of every task and prints all that are not \
                      satisfied. Exits with 1 if any task cannot run.\n\n\
                      Examples:\n  \
                      buildrig check CppExample --project app.sln"
    )]
    Check(CheckArgs),

    #[command(
        about = "Run the tasks of a build context",
        long_about = "Collects and runs the tasks of a context. Arguments after `--` are \
                      bound to task options. Ctrl-C cancels the run.\n\n\
                      Exit codes: 0 completed, 1 failed, 2 canceled, -1 setup failure.\n\n\
                      Examples:\n  \
                      buildrig run CppExample --project app.sln\n  \
                      buildrig run CppExample --project app.sln -- --Configuration=Debug --Rebuild"
    )]
    Run(RunArgs),

    #[command(
        about = "Show, save or load the options of a task",
        long_about = "Resolves a task's options from defaults, a saved document and \
                      arguments after `--`, in that order, and prints them as a command line.\n\n\
                      Examples:\n  \
                      buildrig options CppExample BuildProject --simplify -- --Arch=x86\n  \
                      buildrig options CppExample BuildProject --save release.json"
    )]
    Options(OptionsArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    #[arg(value_name = "CONTEXT", help = "Build context name")]
    pub context: String,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    #[arg(value_name = "CONTEXT", help = "Build context name")]
    pub context: String,

    #[arg(short = 'p', long, value_name = "PATH", help = "Project file to build")]
    pub project: Option<PathBuf>,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[arg(value_name = "CONTEXT", help = "Build context name")]
    pub context: String,

    #[arg(short = 'p', long, value_name = "PATH", help = "Project file to build")]
    pub project: Option<PathBuf>,

    #[arg(
        short = 'c',
        long,
        value_name = "CONDITION",
        help = "Active condition; tasks bound to another condition are skipped"
    )]
    pub condition: Option<String>,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Report format"
    )]
    pub format: OutputFormatArg,

    #[arg(last = true, value_name = "ARGS", help = "Task option arguments")]
    pub args: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct OptionsArgs {
    #[arg(value_name = "CONTEXT", help = "Build context name")]
    pub context: String,

    #[arg(value_name = "TASK", help = "Task name")]
    pub task: String,

    #[arg(long, help = "Only print options that differ from their defaults")]
    pub simplify: bool,

    #[arg(
        long,
        value_name = "FILE",
        num_args = 0..=1,
        help = "Load option values from a saved document (default: the options directory)"
    )]
    pub load: Option<Option<PathBuf>>,

    #[arg(
        long,
        value_name = "FILE",
        num_args = 0..=1,
        help = "Save the resolved options to a document (default: the options directory)"
    )]
    pub save: Option<Option<PathBuf>>,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,

    #[arg(last = true, value_name = "ARGS", help = "Option arguments")]
    pub args: Vec<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Yaml,
    Human,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Yaml => super::output::OutputFormat::Yaml,
            OutputFormatArg::Human => super::output::OutputFormat::Human,
        }
    }
}
