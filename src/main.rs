use buildrig::cli::commands::{CliArgs, Commands};
use buildrig::cli::handlers::{handle_check, handle_list, handle_options, handle_run};
use buildrig::util::logging::{init_logging, json_from_env, parse_level, LoggingConfig};
use buildrig::{BuildrigConfig, VERSION};

use clap::Parser;
use tracing::{debug, error, Level};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    let config = BuildrigConfig::default();
    init_logging_from_args(&args, &config);

    debug!("buildrig v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    if let Err(e) = config.validate() {
        error!("{}", e);
        std::process::exit(-1);
    }
    debug!("{}", config);

    let exit_code = match &args.command {
        Commands::List(list_args) => handle_list(list_args, &config).await,
        Commands::Check(check_args) => handle_check(check_args, &config).await,
        Commands::Run(run_args) => handle_run(run_args, &config, args.quiet, args.verbose).await,
        Commands::Options(options_args) => handle_options(options_args, &config).await,
    };

    std::process::exit(exit_code);
}

fn init_logging_from_args(args: &CliArgs, config: &BuildrigConfig) {
    let level = if let Some(level_str) = &args.log_level {
        parse_level(level_str)
    } else if args.verbose {
        Level::DEBUG
    } else if args.quiet {
        Level::ERROR
    } else {
        parse_level(&config.log_level)
    };

    init_logging(LoggingConfig {
        use_json: json_from_env(),
        ..LoggingConfig::with_level(level)
    });
}
