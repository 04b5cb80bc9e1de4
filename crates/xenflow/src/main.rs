mod commands;
mod context;
mod declare;
mod render;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "xenflow")]
#[command(about = "Declarative VM provisioning for XCP-ng / Xen Orchestra", long_about = None)]
struct Cli {
    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or converge the declared VMs
    Up {
        /// Only this machine
        #[arg(short, long, env = "XENFLOW_MACHINE")]
        machine: Option<String>,
        /// Apply the plan without stopping after it
        #[arg(short, long)]
        yes: bool,
    },
    /// Resolve lookups and show the plan
    Preview {
        #[arg(short, long, env = "XENFLOW_MACHINE")]
        machine: Option<String>,
    },
    /// Print a machine's cloud-init document
    Render {
        #[arg(short, long)]
        machine: String,
        #[arg(short, long, value_enum, default_value_t = Part::Metadata)]
        part: Part,
        /// Required for userdata, which embeds passwords
        #[arg(long)]
        show_secrets: bool,
    },
    /// Delete VMs recorded in state
    Destroy {
        #[arg(short, long, env = "XENFLOW_MACHINE")]
        machine: Option<String>,
        #[arg(short, long)]
        yes: bool,
    },
    /// Re-run the post-create memory fix on an existing VM
    #[command(name = "fix-memory")]
    FixMemory {
        /// Xen Orchestra VM id
        #[arg(long)]
        vm_id: String,
        /// Target memory, e.g. 8GiB
        #[arg(long)]
        memory: xenflow_config::ByteSize,
        /// Do not wait for the first boot to settle
        #[arg(long)]
        skip_wait: bool,
    },
    /// Read and write stack configuration values
    #[command(subcommand)]
    Config(ConfigCommands),
    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Set a value (namespaced keys look like xenorchestra:url)
    Set {
        key: String,
        value: String,
        /// Encrypt with XENFLOW_SECRETS_KEY
        #[arg(long)]
        secret: bool,
    },
    /// Print a value; secrets are masked
    Get { key: String },
    /// Generate a new secrets key
    #[command(name = "gen-key")]
    GenKey,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Part {
    Metadata,
    Userdata,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Version => {
            println!("xenflow {}", env!("CARGO_PKG_VERSION"));
        }
        Commands::Config(ConfigCommands::GenKey) => {
            commands::config::handle_gen_key();
        }
        Commands::Config(ConfigCommands::Set { key, value, secret }) => {
            let project = context::Project::load()?;
            commands::config::handle_set(&project, &key, value, secret)?;
        }
        Commands::Config(ConfigCommands::Get { key }) => {
            let project = context::Project::load()?;
            commands::config::handle_get(&project, &key)?;
        }
        Commands::FixMemory {
            vm_id,
            memory,
            skip_wait,
        } => {
            let project = context::Project::load()?;
            commands::fix_memory::handle(&project, &vm_id, memory, skip_wait).await?;
        }
        Commands::Render {
            machine,
            part,
            show_secrets,
        } => {
            let project = context::Project::load()?;
            commands::render::handle(&project, &machine, part, show_secrets).await?;
        }
        Commands::Preview { machine } => {
            let project = context::Project::load()?;
            commands::preview::handle(&project, machine.as_deref()).await?;
        }
        Commands::Up { machine, yes } => {
            let project = context::Project::load()?;
            commands::up::handle(&project, machine.as_deref(), yes).await?;
        }
        Commands::Destroy { machine, yes } => {
            let project = context::Project::load()?;
            commands::destroy::handle(&project, machine.as_deref(), yes).await?;
        }
    }

    Ok(())
}

