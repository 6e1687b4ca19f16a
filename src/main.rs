use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio::runtime::Runtime;

use lodcrm::config::{self, Config};
use lodcrm::filter::{self, FilterState, LinkedinFilter};
use lodcrm::remote::actions::{ActionClient, ActionResult};
use lodcrm::remote::assistant::AssistantClient;
use lodcrm::{directory, logging, store, ui};

#[derive(Parser, Debug)]
#[command(name = "lodcrm", version, about = "Terminal CRM for contacts and listings")]
struct Cli {
    /// Configuration file (defaults to the per-user config directory)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print contacts matching the filters as tab-separated rows
    Query(QueryArgs),
    /// Send one message to the assistant and print the reply
    Chat(MessageArgs),
    /// Submit one contact action command and print the outcome
    Action(MessageArgs),
}

#[derive(Args, Debug)]
struct QueryArgs {
    /// Substring of the business sector
    #[arg(long)]
    sector: Option<String>,

    /// Substring of the company name
    #[arg(long)]
    company: Option<String>,

    /// Substring of the notes
    #[arg(long)]
    notes: Option<String>,

    #[arg(long, value_enum)]
    linkedin: Option<LinkedinArg>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LinkedinArg {
    Known,
    Blank,
}

#[derive(Args, Debug)]
struct MessageArgs {
    #[arg(value_name = "TEXT", required = true, num_args = 1..)]
    text: Vec<String>,
}

impl MessageArgs {
    fn joined(&self) -> String {
        self.text.join(" ")
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.command.is_some() {
        logging::init_stderr();
    } else if let Some(path) = logging::default_log_path() {
        logging::init_file(&path)?;
    }

    let config = config::load(cli.config.as_deref())?;
    match &config.config_path {
        Some(path) => tracing::info!(path = %path.display(), "configuration loaded"),
        None => tracing::info!("running with default configuration"),
    }

    let runtime = Runtime::new().context("failed to start async runtime")?;

    match cli.command {
        Some(Command::Query(args)) => handle_query(args, &config, &runtime),
        Some(Command::Chat(args)) => handle_chat(args, &config, &runtime),
        Some(Command::Action(args)) => handle_action(args, &config, &runtime),
        None => {
            let store = store::connect(&config.store);
            ui::run(&config, store, runtime.handle().clone())
        }
    }
}

fn handle_query(args: QueryArgs, config: &Config, runtime: &Runtime) -> Result<()> {
    let store = store::connect(&config.store);
    let contacts = runtime
        .block_on(directory::fetch_contacts(store.as_ref()))
        .map_err(|err| anyhow::anyhow!(err.message))?;

    let filter = FilterState {
        business_sector: args.sector.unwrap_or_default(),
        company: args.company.unwrap_or_default(),
        notes: args.notes.unwrap_or_default(),
        linkedin: match args.linkedin {
            Some(LinkedinArg::Known) => LinkedinFilter::Known,
            Some(LinkedinArg::Blank) => LinkedinFilter::Blank,
            None => LinkedinFilter::Any,
        },
    };
    let matches = filter::apply_filters(&contacts, &filter);

    println!("id\tdisplayName\temail\tcompany");
    for contact in matches {
        println!(
            "{}\t{}\t{}\t{}",
            contact.id,
            contact.display_name,
            contact.email.as_deref().unwrap_or(""),
            contact.company.as_deref().unwrap_or("")
        );
    }

    Ok(())
}

fn handle_chat(args: MessageArgs, config: &Config, runtime: &Runtime) -> Result<()> {
    let client = AssistantClient::new(&config.assistant);
    let reply = runtime.block_on(client.send_message(&args.joined()))?;
    println!("{}", reply);
    Ok(())
}

fn handle_action(args: MessageArgs, config: &Config, runtime: &Runtime) -> Result<()> {
    let client = ActionClient::new(&config.assistant);
    match runtime.block_on(client.submit_command(&args.joined())) {
        ActionResult::Completed { message, kind, .. } => {
            println!("{}\t{}", kind, message);
            Ok(())
        }
        ActionResult::Failed { error } => anyhow::bail!(error),
    }
}
