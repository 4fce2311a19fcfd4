use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agora_client::{
    AgoraClient, ClientConfig, Keypair, Network, ProtocolVariant, TokenKind,
};

#[derive(Parser)]
#[command(name = "agora-cli")]
#[command(about = "Call paid marketplace agents from the command line", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "https://agora.example")]
    url: String,

    #[arg(short, long, value_enum, default_value_t = NetworkArg::Devnet)]
    network: NetworkArg,

    /// Settlement protocol: platform-relayed (fail-fast) or direct.
    #[arg(long, value_enum, default_value_t = VariantArg::FailFast)]
    variant: VariantArg,

    /// Keypair file (64-byte JSON array). Falls back to $AGORA_SECRET_KEY.
    #[arg(short, long)]
    keypair: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum NetworkArg {
    Mainnet,
    Devnet,
}

#[derive(Clone, Copy, ValueEnum)]
enum VariantArg {
    SelfAuthorized,
    FailFast,
}

#[derive(Subcommand)]
enum Commands {
    /// List agents on the marketplace
    Agents,
    /// Show one agent's descriptor
    Show { agent_id: String },
    /// Call an agent with a paid invocation
    Call {
        agent_id: String,
        /// Input payload as JSON
        #[arg(short, long)]
        input: String,
        #[arg(short, long, default_value = "USDC")]
        token: String,
    },
    /// Generate a fresh (unfunded) keypair and print its address
    GenerateKey,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agora_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    if let Commands::GenerateKey = cli.command {
        let keypair = Keypair::generate();
        println!("address: {}", keypair.address());
        println!("fund this address before calling any agent");
        return Ok(());
    }

    let keypair = match &cli.keypair {
        Some(path) => Keypair::from_file(path)?,
        None => Keypair::from_env(agora_client::wallet::SECRET_KEY_ENV_VAR)?,
    };

    let network = match cli.network {
        NetworkArg::Mainnet => Network::Mainnet,
        NetworkArg::Devnet => Network::Devnet,
    };
    let variant = match cli.variant {
        VariantArg::SelfAuthorized => ProtocolVariant::SelfAuthorized,
        VariantArg::FailFast => ProtocolVariant::FailFast,
    };

    let client = AgoraClient::new(
        ClientConfig::new(&cli.url, network).with_variant(variant),
        keypair,
    )?;

    match cli.command {
        Commands::Agents => {
            let agents = client.list_agents().await?;
            for agent in agents {
                println!(
                    "{}  {}  ${:.2} ({} bps)",
                    agent.id, agent.name, agent.price_usd, agent.fee_bps
                );
            }
        }
        Commands::Show { agent_id } => {
            let agent = client.get_agent(&agent_id).await?;
            println!("{}", serde_json::to_string_pretty(&agent)?);
        }
        Commands::Call {
            agent_id,
            input,
            token,
        } => {
            let input: Value = serde_json::from_str(&input)?;
            let token = TokenKind::parse(&token)?;

            match client.invoke(&agent_id, input, token).await {
                Ok(result) => {
                    println!("output:\n{}", serde_json::to_string_pretty(&result.output)?);
                    println!("tx signature: {}", result.tx_signature);
                    println!("receipt:      {}", result.receipt_id);
                    println!("explorer:     {}", result.explorer_url);
                    println!(
                        "agent received {} / protocol fee {} ({} base units)",
                        result.agent_received, result.protocol_fee, result.token
                    );
                }
                Err(err) => {
                    eprintln!("call failed during {}: {}", err.phase, err.source);
                    eprintln!("retry guidance: {:?}", err.retry_safety());
                    std::process::exit(1);
                }
            }
        }
        Commands::GenerateKey => unreachable!(),
    }

    Ok(())
}
