use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{debug, error};

use storeforge::commands::{self, ProvisionContext};
use storeforge::config::Config;
use storeforge::record::RecordApi;
use storeforge::sfcli::SfCli;
use storeforge::subprocess::SubprocessManager;

/// Provision commerce storefronts on scratch orgs, resumably
#[derive(Parser)]
#[command(name = "storeforge")]
#[command(about = "Provision commerce storefronts on scratch orgs, resumably", long_about = None)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to a configuration file (default: ~/.storeforge/config.toml)
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Identity of the provisioning target; every resumable command is
/// scoped to this triple in the status file.
#[derive(Args, Clone)]
struct IdentityArgs {
    /// Dev hub username
    #[arg(long)]
    hub_org: String,

    /// Scratch org admin username
    #[arg(short = 'u', long)]
    target_org: String,

    /// Store name
    #[arg(short = 's', long)]
    store_name: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Scratch org management
    Org {
        #[command(subcommand)]
        command: OrgCommands,
    },
    /// Storefront creation and publishing
    Store {
        #[command(subcommand)]
        command: StoreCommands,
    },
    /// Convert example metadata and push it to a fresh scratch org
    Setup(SetupArgs),
    /// Product catalog operations
    Products {
        #[command(subcommand)]
        command: ProductCommands,
    },
    /// Checkout extension providers
    Extension {
        #[command(subcommand)]
        command: ExtensionCommands,
    },
    /// Payment gateway integration
    Payments {
        #[command(subcommand)]
        command: PaymentCommands,
    },
    /// Storefront search
    Search {
        #[command(subcommand)]
        command: SearchCommands,
    },
}

#[derive(Subcommand)]
enum OrgCommands {
    /// Create (or reuse) the scratch org for a store
    Create {
        #[command(flatten)]
        identity: IdentityArgs,

        /// Scratch org definition file
        #[arg(short = 'f', long)]
        definition_file: Option<PathBuf>,

        /// Scratch org lifetime in days
        #[arg(long, default_value = "30")]
        duration_days: u32,

        /// Minutes to wait for org creation
        #[arg(short = 'w', long, default_value = "15")]
        wait: u32,
    },
}

#[derive(Subcommand)]
enum StoreCommands {
    /// Create, populate, and publish a storefront
    Create {
        #[command(flatten)]
        identity: IdentityArgs,

        /// Community template to build the storefront from
        #[arg(long, default_value = "B2C Commerce")]
        template: String,

        /// URL path prefix (default: derived from the store name)
        #[arg(long)]
        url_prefix: Option<String>,

        /// Product catalog CSV to bulk-upsert before the import job
        #[arg(long)]
        products_csv: Option<PathBuf>,

        /// Username for the buyer user
        #[arg(long, default_value = "buyer@storeforge.example")]
        buyer_username: String,

        /// Alias for the buyer user
        #[arg(long, default_value = "buyer")]
        buyer_alias: String,
    },
}

#[derive(Args)]
struct SetupArgs {
    #[command(flatten)]
    identity: IdentityArgs,

    /// Example metadata tree to convert
    #[arg(long)]
    examples_dir: PathBuf,

    /// Target source directory for converted metadata
    #[arg(long, default_value = "force-app/main/default")]
    project_dir: PathBuf,

    /// Scratch org definition file
    #[arg(short = 'f', long)]
    definition_file: Option<PathBuf>,

    /// Scratch org lifetime in days
    #[arg(long, default_value = "30")]
    duration_days: u32,

    /// Minutes to wait for org creation
    #[arg(short = 'w', long, default_value = "15")]
    wait: u32,

    /// Username for the buyer user referenced by the examples
    #[arg(long, default_value = "buyer@storeforge.example")]
    buyer_username: String,
}

#[derive(Subcommand)]
enum ProductCommands {
    /// Import the product catalog and build the buyer group
    Import {
        #[command(flatten)]
        identity: IdentityArgs,

        /// Product catalog CSV to bulk-upsert before the import job
        #[arg(long)]
        csv: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ExtensionCommands {
    /// Register an Apex class as an extension provider
    Register {
        /// Target org username
        #[arg(short = 'u', long)]
        target_org: String,

        /// Developer name for the registered provider
        #[arg(long)]
        name: String,

        /// Apex class implementing the extension point
        #[arg(long)]
        apex_class: String,

        /// Extension point identifier
        #[arg(long)]
        extension_point: String,
    },
    /// Map a registered provider to a store
    Map {
        /// Target org username
        #[arg(short = 'u', long)]
        target_org: String,

        /// Developer name of the registered provider
        #[arg(long)]
        name: String,

        /// Store name
        #[arg(short = 's', long)]
        store_name: Option<String>,

        /// Store id (skips the name lookup)
        #[arg(long)]
        store_id: Option<String>,
    },
}

#[derive(Subcommand)]
enum PaymentCommands {
    /// Register a payment gateway and map it to a store
    Setup {
        /// Target org username
        #[arg(short = 'u', long)]
        target_org: String,

        /// Gateway provider label
        #[arg(long)]
        provider: String,

        /// Apex gateway adapter class
        #[arg(long)]
        apex_adapter: String,

        /// Developer name of the merchant named credential
        #[arg(long)]
        merchant_credential: String,

        /// Store name
        #[arg(short = 's', long)]
        store_name: Option<String>,

        /// Store id (skips the name lookup)
        #[arg(long)]
        store_id: Option<String>,
    },
}

#[derive(Subcommand)]
enum SearchCommands {
    /// Start a search index build for a store
    Index {
        /// Target org username
        #[arg(short = 'u', long)]
        target_org: String,

        /// Store name
        #[arg(short = 's', long)]
        store_name: Option<String>,

        /// Store id (skips the name lookup)
        #[arg(long)]
        store_id: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(cli.verbose >= 2)
        .init();

    debug!("storeforge started with verbosity level: {}", cli.verbose);

    let result = dispatch(cli).await;

    if let Err(e) = result {
        error!("Fatal error: {:#}", e);
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Org { command } => match command {
            OrgCommands::Create {
                identity,
                definition_file,
                duration_days,
                wait,
            } => {
                let ctx = context(&config, &identity);
                let cmd = commands::org::CreateOrg {
                    definition_file: definition_file
                        .unwrap_or_else(|| config.scratch_org_def.clone()),
                    duration_days,
                    wait_minutes: wait,
                };
                commands::org::run(&ctx, &cmd).await
            }
        },
        Commands::Store { command } => match command {
            StoreCommands::Create {
                identity,
                template,
                url_prefix,
                products_csv,
                buyer_username,
                buyer_alias,
            } => {
                let ctx = context(&config, &identity);
                let cmd = commands::store::CreateStore {
                    template,
                    url_prefix,
                    products_csv,
                    buyer_username,
                    buyer_alias,
                };
                commands::store::run(&ctx, &cmd).await
            }
        },
        Commands::Setup(args) => {
            let ctx = context(&config, &args.identity);
            let cmd = commands::setup::Quickstart {
                examples_dir: args.examples_dir,
                project_dir: args.project_dir,
                definition_file: args
                    .definition_file
                    .unwrap_or_else(|| config.scratch_org_def.clone()),
                duration_days: args.duration_days,
                wait_minutes: args.wait,
                buyer_username: args.buyer_username,
            };
            commands::setup::run(&ctx, &cmd).await
        }
        Commands::Products { command } => match command {
            ProductCommands::Import { identity, csv } => {
                let ctx = context(&config, &identity);
                let cmd = commands::products::ImportProducts { csv };
                commands::products::run(&ctx, &cmd).await
            }
        },
        Commands::Extension { command } => match command {
            ExtensionCommands::Register {
                target_org,
                name,
                apex_class,
                extension_point,
            } => {
                let records = records(&config, &target_org);
                let cmd = commands::extension::RegisterExtension {
                    name,
                    apex_class,
                    extension_point,
                };
                let id = commands::extension::register(&records, &cmd).await?;
                println!("Registered extension provider: {id}");
                Ok(())
            }
            ExtensionCommands::Map {
                target_org,
                name,
                store_name,
                store_id,
            } => {
                let records = records(&config, &target_org);
                let cmd = commands::extension::MapExtension {
                    name,
                    store_name,
                    store_id,
                };
                let id = commands::extension::map(&records, &cmd).await?;
                println!("Mapped extension to store: {id}");
                Ok(())
            }
        },
        Commands::Payments { command } => match command {
            PaymentCommands::Setup {
                target_org,
                provider,
                apex_adapter,
                merchant_credential,
                store_name,
                store_id,
            } => {
                let records = records(&config, &target_org);
                let cmd = commands::payments::SetupPayments {
                    provider,
                    apex_adapter,
                    merchant_credential,
                    store_name,
                    store_id,
                };
                commands::payments::run(&records, &cmd).await
            }
        },
        Commands::Search { command } => match command {
            SearchCommands::Index {
                target_org,
                store_name,
                store_id,
            } => {
                let cli = sf_cli(&config);
                let records = RecordApi::new(cli.clone(), &target_org);
                let cmd = commands::search::IndexSearch {
                    store_name,
                    store_id,
                };
                commands::search::run(&cli, &records, &target_org, config.retry_policy(), &cmd)
                    .await
            }
        },
    }
}

fn context(config: &Config, identity: &IdentityArgs) -> ProvisionContext {
    ProvisionContext::new(
        config,
        identity.hub_org.clone(),
        identity.target_org.clone(),
        identity.store_name.clone(),
    )
}

fn sf_cli(config: &Config) -> SfCli {
    SfCli::new(SubprocessManager::production(), config.base_dir.clone())
}

fn records(config: &Config, target_org: &str) -> RecordApi {
    RecordApi::new(sf_cli(config), target_org)
}
