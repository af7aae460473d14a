use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgMatches, Command};
use serde::Serialize;
use taskcache::Application;
use taskcache_config::AppConfig;
use taskcache_domain::entities::NewTask;
use taskcache_domain::value_objects::CacheOutcome;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn owner_arg() -> Arg {
    Arg::new("owner")
        .long("owner")
        .value_name("ID")
        .help("Authenticated owner id")
        .value_parser(value_parser!(i64))
        .required(true)
}

fn id_arg() -> Arg {
    Arg::new("id")
        .value_name("TASK_ID")
        .help("Task id")
        .value_parser(value_parser!(i64))
        .required(true)
}

fn description_arg() -> Arg {
    Arg::new("description")
        .value_name("TEXT")
        .help("Task description")
        .required(true)
}

fn cli() -> Command {
    Command::new("taskcache")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Owner-scoped task lists with a cache-aside Redis layer")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level, overrides the configuration file"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("Log format, overrides the configuration file")
                .value_parser(["json", "pretty"]),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("create")
                .about("Create a task")
                .arg(owner_arg())
                .arg(description_arg()),
        )
        .subcommand(Command::new("list").about("List all tasks").arg(owner_arg()))
        .subcommand(
            Command::new("get")
                .about("Show one task")
                .arg(owner_arg())
                .arg(id_arg()),
        )
        .subcommand(
            Command::new("update")
                .about("Replace a task description")
                .arg(owner_arg())
                .arg(id_arg())
                .arg(description_arg()),
        )
        .subcommand(
            Command::new("delete")
                .about("Delete a task")
                .arg(owner_arg())
                .arg(id_arg()),
        )
        .subcommand(Command::new("health").about("Check the backing and cache stores"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    let config_path = matches.get_one::<String>("config");
    let mut config = AppConfig::load(config_path.map(String::as_str))
        .with_context(|| format!("failed to load configuration: {config_path:?}"))?;
    if let Some(level) = matches.get_one::<String>("log-level") {
        config.observability.log_level = level.clone();
    }
    if let Some(format) = matches.get_one::<String>("log-format") {
        config.observability.log_format = format.clone();
    }

    init_logging(&config.observability.log_level, &config.observability.log_format)?;

    let app = Application::build(&config)
        .await
        .context("failed to initialise application")?;
    let result = run(&app, &matches).await;
    app.shutdown().await;
    result
}

async fn run(app: &Application, matches: &ArgMatches) -> Result<()> {
    let service = app.service();

    match matches.subcommand() {
        Some(("create", args)) => {
            let description = required::<String>(args, "description")?;
            let outcome = service
                .create_task(owner(args)?, NewTask::new(description))
                .await?;
            print_outcome("create", outcome.map(|id| serde_json::json!({ "id": id })))
        }
        Some(("list", args)) => {
            let outcome = service.get_all_tasks(owner(args)?).await?;
            print_outcome("list", outcome)
        }
        Some(("get", args)) => {
            let outcome = service.get_task_by_id(owner(args)?, task_id(args)?).await?;
            print_outcome("get", outcome)
        }
        Some(("update", args)) => {
            let description = required::<String>(args, "description")?;
            let outcome = service
                .update_task(owner(args)?, task_id(args)?, &description)
                .await?;
            print_outcome("update", outcome.map(|()| serde_json::json!({ "updated": true })))
        }
        Some(("delete", args)) => {
            let outcome = service.delete_task(owner(args)?, task_id(args)?).await?;
            print_outcome("delete", outcome.map(|()| serde_json::json!({ "deleted": true })))
        }
        Some(("health", _)) => {
            let report = app.health().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.is_healthy() {
                anyhow::bail!("one or more stores are unhealthy");
            }
            Ok(())
        }
        _ => anyhow::bail!("unknown command"),
    }
}

fn required<T: Clone + Send + Sync + 'static>(args: &ArgMatches, name: &str) -> Result<T> {
    args.get_one::<T>(name)
        .cloned()
        .with_context(|| format!("missing argument: {name}"))
}

fn owner(args: &ArgMatches) -> Result<i64> {
    required::<i64>(args, "owner")
}

fn task_id(args: &ArgMatches) -> Result<i64> {
    required::<i64>(args, "id")
}

fn print_outcome<T: Serialize>(command: &str, outcome: CacheOutcome<T>) -> Result<()> {
    if let Some(error) = outcome.warning() {
        warn!(command, error = %error, "Completed with cache inconsistency");
    }
    println!("{}", serde_json::to_string_pretty(&outcome.value)?);
    info!(command, "Done");
    Ok(())
}

/// Initialise the tracing subscriber
fn init_logging(log_level: &str, log_format: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match log_format {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .try_init()
                .context("failed to initialise JSON logging")?;
        }
        "pretty" => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
                .try_init()
                .context("failed to initialise pretty logging")?;
        }
        _ => {
            return Err(anyhow::anyhow!("unsupported log format: {log_format}"));
        }
    }

    Ok(())
}
