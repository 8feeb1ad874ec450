//! Operator CLI for local smoke-testing of the dynamiq broker. One-shot,
//! non-interactive subcommands rather than the teacher's `mixtape-cli`
//! REPL: this broker carries no session state across process restarts
//! for the CLI to persist (spec.md §1, "Non-goals").

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "dynamiq-broker", about = "Operator CLI for the dynamiq broker")]
struct Cli {
    /// Base URL of a running broker-server instance.
    #[arg(long, global = true, default_value = "http://localhost:8080")]
    base_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Issue a signed session token from the process-wide secret.
    IssueToken {
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        conversation_id: String,
        #[arg(long, default_value = "")]
        sandbox_id: String,
        /// Repeatable; defaults to the wildcard scope.
        #[arg(long = "scope")]
        scopes: Vec<String>,
    },
    /// List the providers registered with a running broker.
    ListProviders,
    /// Call a tool through the Tool-Access Proxy.
    CallTool {
        #[arg(long)]
        token: String,
        #[arg(long)]
        app: String,
        #[arg(long)]
        tool: String,
        /// JSON-encoded tool input, defaults to `{}`.
        #[arg(long, default_value = "{}")]
        input: String,
    },
    /// Vend short-lived cloud credentials for a sandbox.
    VendCloudCredential {
        #[arg(long)]
        token: String,
        #[arg(long)]
        role_arn: Option<String>,
        #[arg(long)]
        external_id: Option<String>,
        #[arg(long)]
        access_key_id: Option<String>,
        #[arg(long)]
        secret_access_key: Option<String>,
        #[arg(long)]
        region: Option<String>,
        #[arg(long)]
        duration_seconds: Option<u32>,
    },
    /// Resolve the identity backing the default credential chain.
    Whoami {
        #[arg(long)]
        token: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::IssueToken {
            user_id,
            conversation_id,
            sandbox_id,
            scopes,
        } => commands::issue_token(&user_id, &conversation_id, &sandbox_id, scopes)?,
        Command::ListProviders => commands::list_providers(&cli.base_url).await?,
        Command::CallTool { token, app, tool, input } => {
            commands::call_tool(&cli.base_url, &token, &app, &tool, &input).await?
        }
        Command::VendCloudCredential {
            token,
            role_arn,
            external_id,
            access_key_id,
            secret_access_key,
            region,
            duration_seconds,
        } => {
            commands::vend_cloud_credential(
                &cli.base_url,
                &token,
                role_arn,
                external_id,
                access_key_id,
                secret_access_key,
                region,
                duration_seconds,
            )
            .await?
        }
        Command::Whoami { token } => commands::whoami(&cli.base_url, &token).await?,
    }

    Ok(())
}
