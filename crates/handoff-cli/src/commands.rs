use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use handoff_registry::OwnershipRegistry;
use handoff_store::{keys, KvBackend, RemoteKv, RetryPolicy, StateStore, StoreError};
use handoff_transport::{TransportClient, TransportConfig};
use handoff_types::{EntityId, OwnershipState, PersistedSnapshot, Version};
use serde_json::json;

use crate::cli::*;

struct Console {
    kv: Arc<dyn KvBackend>,
    store: StateStore,
    registry: OwnershipRegistry,
    format: OutputFormat,
}

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let client = TransportClient::new(TransportConfig::new(&cli.backend));
    let kv: Arc<dyn KvBackend> = Arc::new(RemoteKv::new(client));
    let console = Console {
        kv: kv.clone(),
        store: StateStore::new(kv.clone(), RetryPolicy::default()),
        registry: OwnershipRegistry::new(kv),
        format: cli.format,
    };

    match cli.command {
        Command::Get(args) => console.get(args).await,
        Command::Put(args) => console.put(args).await,
        Command::Delete(args) => console.delete(args).await,
        Command::Owner(args) => console.owner(args).await,
        Command::List(args) => console.list(args).await,
        Command::Servers(args) => console.servers(args).await,
        Command::Reconcile(args) => console.reconcile(args).await,
    }
}

fn parse_entity(raw: &str) -> anyhow::Result<EntityId> {
    EntityId::from_str(raw).with_context(|| format!("invalid entity id `{raw}`"))
}

impl Console {
    fn json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    async fn get(&self, args: GetArgs) -> anyhow::Result<()> {
        let entity = parse_entity(&args.entity)?;
        match self.store.get_snapshot(&entity).await {
            Ok(snapshot) => self.print_snapshot(&snapshot),
            Err(StoreError::NotFound(_)) => {
                if self.json() {
                    println!("{}", json!({ "entity": entity.to_string(), "snapshot": null }));
                } else {
                    println!("No snapshot for {}", entity.to_string().yellow());
                }
            }
            Err(err) => return Err(err.into()),
        }
        Ok(())
    }

    fn print_snapshot(&self, snapshot: &PersistedSnapshot) {
        if self.json() {
            println!(
                "{}",
                json!({
                    "entity": snapshot.entity.to_string(),
                    "version": snapshot.version.get(),
                    "written_at": snapshot.written_at.to_rfc3339(),
                    "payload_hex": hex::encode(&snapshot.payload),
                })
            );
        } else {
            println!("Entity:   {}", snapshot.entity.to_string().yellow().bold());
            println!("Version:  {}", snapshot.version.to_string().cyan());
            println!("Written:  {}", snapshot.written_at.to_rfc3339());
            println!("Payload:  {} ({} bytes)", hex::encode(&snapshot.payload), snapshot.payload.len());
        }
    }

    async fn put(&self, args: PutArgs) -> anyhow::Result<()> {
        let entity = parse_entity(&args.entity)?;
        let payload = hex::decode(&args.payload).context("payload must be hex")?;
        let snapshot = PersistedSnapshot::new(entity.clone(), Version::new(args.version), payload);
        self.store.put_snapshot(&snapshot).await?;
        if self.json() {
            println!(
                "{}",
                json!({ "entity": entity.to_string(), "version": args.version, "stored": true })
            );
        } else {
            println!(
                "{} Stored {} at version {}",
                "✓".green(),
                entity.to_string().yellow(),
                args.version.to_string().cyan()
            );
        }
        Ok(())
    }

    async fn delete(&self, args: DeleteArgs) -> anyhow::Result<()> {
        let entity = parse_entity(&args.entity)?;
        self.store.delete_snapshot(&entity).await?;
        if self.json() {
            println!("{}", json!({ "entity": entity.to_string(), "deleted": true }));
        } else {
            println!("{} Deleted snapshot for {}", "✓".green(), entity.to_string().yellow());
        }
        Ok(())
    }

    async fn owner(&self, args: OwnerArgs) -> anyhow::Result<()> {
        let entity = parse_entity(&args.entity)?;
        let record = self.registry.record(&entity).await?;
        let state = match &record.state {
            OwnershipState::Unowned => "unowned".to_string(),
            OwnershipState::Owned(server) => format!("owned by {server}"),
            OwnershipState::InTransit { from, to } => format!("in transit {from} -> {to}"),
        };
        if self.json() {
            println!(
                "{}",
                json!({
                    "entity": entity.to_string(),
                    "state": state,
                    "version": record.version.get(),
                    "seq": record.seq,
                    "updated_at": record.updated_at.to_rfc3339(),
                })
            );
        } else {
            println!("Entity:   {}", entity.to_string().yellow().bold());
            println!("State:    {}", state.cyan());
            println!("Version:  {}", record.version.to_string().cyan());
            println!("Updated:  {}", record.updated_at.to_rfc3339());
        }
        Ok(())
    }

    async fn list(&self, args: ListArgs) -> anyhow::Result<()> {
        let prefix = match &args.class {
            Some(class) => format!("{}{class}.", keys::SNAPSHOT_PREFIX),
            None => keys::SNAPSHOT_PREFIX.to_string(),
        };
        let entries = self.kv.list(&prefix).await?;
        if self.json() {
            let items: Vec<_> = entries
                .iter()
                .map(|(key, version)| {
                    json!({
                        "entity": key.trim_start_matches(keys::SNAPSHOT_PREFIX),
                        "version": version.get(),
                    })
                })
                .collect();
            println!("{}", json!(items));
        } else if entries.is_empty() {
            println!("No snapshots.");
        } else {
            for (key, version) in &entries {
                println!(
                    "{}  v{}",
                    key.trim_start_matches(keys::SNAPSHOT_PREFIX).yellow(),
                    version.to_string().cyan()
                );
            }
        }
        Ok(())
    }

    async fn servers(&self, args: ServersArgs) -> anyhow::Result<()> {
        let ttl = chrono::Duration::milliseconds(args.ttl_ms as i64);
        let live = self.registry.live_servers(ttl).await?;
        if self.json() {
            let items: Vec<_> = live
                .iter()
                .map(|record| {
                    json!({
                        "server": record.server.to_string(),
                        "last_seen": record.last_seen.to_rfc3339(),
                    })
                })
                .collect();
            println!("{}", json!(items));
        } else if live.is_empty() {
            println!("No live servers.");
        } else {
            for record in &live {
                println!(
                    "{}  last seen {}",
                    record.server.to_string().green().bold(),
                    record.last_seen.to_rfc3339()
                );
            }
        }
        Ok(())
    }

    async fn reconcile(&self, args: ReconcileArgs) -> anyhow::Result<()> {
        let deadline = chrono::Duration::milliseconds(args.deadline_ms as i64);
        let aborted = self.registry.reconcile(deadline).await?;
        if self.json() {
            let items: Vec<_> = aborted.iter().map(ToString::to_string).collect();
            println!("{}", json!({ "aborted": items }));
        } else if aborted.is_empty() {
            println!("{} No stuck transfers.", "✓".green());
        } else {
            for entity in &aborted {
                println!(
                    "{} Returned {} to its source",
                    "✓".green(),
                    entity.to_string().yellow()
                );
            }
        }
        Ok(())
    }
}
