//! `custody` plays the host platform for the stores named in its config: it
//! names the caller, passes on the agreed transaction time, and prints results
//! as JSON.
use anyhow::Context;
use clap::{Parser, Subcommand};
use custody_ledger::{
    Deployment,
    config::LedgerConfig,
    context::{FixedClock, FixedIdentity, Invocation},
    utils,
};
use serde_json::{Value, json};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "custody", version, about = "Chain-of-custody record store")]
struct Cli {
    /// Path to the ledger TOML config
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verified identity of the caller, e.g. an MSP id
    #[arg(long, global = true)]
    identity: Option<String>,

    /// Agreed transaction time as RFC3339. Writes fail without it
    #[arg(long, global = true)]
    at: Option<String>,

    /// Act on the hosted store of this domain instead of the local one
    #[arg(long, global = true)]
    domain: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install the starter records
    Seed,
    /// Create every record of a JSON array file
    Import { file: PathBuf },
    /// Create a record owned by the caller
    Create {
        id: String,
        description: String,
        status: String,
    },
    /// Overwrite an existing record
    Update {
        id: String,
        description: String,
        status: String,
    },
    /// Print the current value of a record
    Read { id: String },
    /// Print whether a record currently exists
    Exists { id: String },
    /// Print the full history of a record
    History { id: String },
    /// Recompute the digest chain of a record's history
    Verify { id: String },
    /// Run a read-only query against a store of another domain
    Query {
        domain: String,
        store: String,
        operation: String,
        argument: String,
    },
}

fn main() -> anyhow::Result<()> {
    utils::init_logging();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => LedgerConfig::load(path)?,
        None => LedgerConfig::default(),
    };
    let deployment = Deployment::open(&config).context("could not open the configured stores")?;
    let service = match &cli.domain {
        Some(domain) => deployment.service_in(domain).with_context(|| {
            let hosted: Vec<_> = deployment.stores().map(|(d, _)| d).collect();
            format!("domain '{domain}' is not hosted here (hosted: {})", hosted.join(", "))
        })?,
        None => deployment.local(),
    };

    let identity = match cli.identity {
        Some(principal) => FixedIdentity::new(principal),
        None => FixedIdentity::unverified(),
    };
    let clock = FixedClock::from_rfc3339(cli.at.as_deref())?;
    let inv = Invocation::new(&identity, &clock);

    let output: Value = match cli.command {
        Commands::Seed => {
            service.seed_defaults(&inv)?;
            json!({ "txId": inv.tx_ref() })
        }
        Commands::Import { file } => {
            let data = std::fs::read_to_string(&file)
                .with_context(|| format!("could not read '{}'", file.display()))?;
            let imported = service.batch_import(&inv, &data)?;
            json!({ "txId": inv.tx_ref(), "imported": imported })
        }
        Commands::Create {
            id,
            description,
            status,
        } => serde_json::to_value(service.create_record(&inv, &id, &description, &status)?)?,
        Commands::Update {
            id,
            description,
            status,
        } => serde_json::to_value(service.update_record(&inv, &id, &description, &status)?)?,
        Commands::Read { id } => serde_json::to_value(service.read_record(&id)?)?,
        Commands::Exists { id } => json!(service.record_exists(&id)?),
        Commands::History { id } => serde_json::to_value(service.get_history(&id)?)?,
        Commands::Verify { id } => {
            let verified = service.verify_history(&id)?;
            json!({ "id": id, "verified": verified })
        }
        Commands::Query {
            domain,
            store,
            operation,
            argument,
        } => {
            let payload = service.query_foreign_domain(&domain, &store, &operation, &argument)?;
            serde_json::from_str::<Value>(&payload).unwrap_or(Value::String(payload))
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
