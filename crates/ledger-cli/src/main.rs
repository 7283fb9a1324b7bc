use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ledger-cli")]
#[command(about = "CLI client for the audit ledger node")]
struct Cli {
    /// Node base URL (e.g. http://127.0.0.1:8080)
    #[arg(long, global = true, env = "LEDGER_NODE", default_value = "http://127.0.0.1:8080")]
    node: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every block of the chain
    Chain,
    /// Ask the node whether the chain still verifies
    Valid,
    /// Print a single block
    Block {
        /// Block index
        index: u64,
    },
    /// Append a block carrying a JSON object payload
    Append {
        /// Payload, e.g. '{"patient_id":"p1","label":1}'
        #[arg(long)]
        data: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    let node = cli.node.trim_end_matches('/');
    let client = reqwest::Client::new();

    let request = match cli.cmd {
        Command::Chain => client.get(format!("{node}/blockchain")),
        Command::Valid => client.get(format!("{node}/blockchain/valid")),
        Command::Block { index } => client.get(format!("{node}/blockchain/blocks/{index}")),
        Command::Append { data } => {
            let payload: Value = serde_json::from_str(&data).context("--data is not valid JSON")?;
            if !payload.is_object() {
                bail!("--data must be a JSON object");
            }
            client.post(format!("{node}/blockchain/blocks")).json(&payload)
        }
    };

    debug!(?request, "sending request");
    let res = request.send().await?;
    let status = res.status();
    let body = res.text().await?;
    println!("status: {}", status);
    match serde_json::from_str::<Value>(&body) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{body}"),
    }
    Ok(())
}
