use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "handoff",
    about = "Operations console for a Handoff cluster",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Backend endpoint.
    #[arg(long, global = true, default_value = "127.0.0.1:7400")]
    pub backend: String,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show an entity's stored snapshot
    Get(GetArgs),
    /// Write an entity snapshot at an explicit version
    Put(PutArgs),
    /// Delete an entity's snapshot
    Delete(DeleteArgs),
    /// Show an entity's ownership record
    Owner(OwnerArgs),
    /// List entities with stored snapshots
    List(ListArgs),
    /// List servers with a fresh heartbeat
    Servers(ServersArgs),
    /// Force-abort transfers stuck past their deadline
    Reconcile(ReconcileArgs),
}

#[derive(Args)]
pub struct GetArgs {
    /// Entity id, `class.unique` form.
    pub entity: String,
}

#[derive(Args)]
pub struct PutArgs {
    pub entity: String,
    /// Version to write at; must exceed the stored version.
    #[arg(long)]
    pub version: u64,
    /// Hex-encoded payload.
    #[arg(long)]
    pub payload: String,
}

#[derive(Args)]
pub struct DeleteArgs {
    pub entity: String,
}

#[derive(Args)]
pub struct OwnerArgs {
    pub entity: String,
}

#[derive(Args)]
pub struct ListArgs {
    /// Restrict to one entity class.
    #[arg(long)]
    pub class: Option<String>,
}

#[derive(Args)]
pub struct ServersArgs {
    /// Heartbeats older than this count as dead.
    #[arg(long, default_value = "60000")]
    pub ttl_ms: u64,
}

#[derive(Args)]
pub struct ReconcileArgs {
    /// Transfers in transit longer than this are aborted.
    #[arg(long, default_value = "30000")]
    pub deadline_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_get() {
        let cli = Cli::try_parse_from(["handoff", "get", "player.e1"]).unwrap();
        if let Command::Get(args) = cli.command {
            assert_eq!(args.entity, "player.e1");
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_put() {
        let cli = Cli::try_parse_from([
            "handoff", "put", "player.e1", "--version", "4", "--payload", "deadbeef",
        ])
        .unwrap();
        if let Command::Put(args) = cli.command {
            assert_eq!(args.version, 4);
            assert_eq!(args.payload, "deadbeef");
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_list_with_class() {
        let cli = Cli::try_parse_from(["handoff", "list", "--class", "player"]).unwrap();
        if let Command::List(args) = cli.command {
            assert_eq!(args.class, Some("player".into()));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_global_backend() {
        let cli =
            Cli::try_parse_from(["handoff", "--backend", "kv.internal:7400", "servers"]).unwrap();
        assert_eq!(cli.backend, "kv.internal:7400");
    }

    #[test]
    fn parse_reconcile_deadline() {
        let cli = Cli::try_parse_from(["handoff", "reconcile", "--deadline-ms", "500"]).unwrap();
        if let Command::Reconcile(args) = cli.command {
            assert_eq!(args.deadline_ms, 500);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_json_format() {
        let cli = Cli::try_parse_from(["handoff", "--format", "json", "servers"]).unwrap();
        assert!(matches!(cli.format, OutputFormat::Json));
    }
}
