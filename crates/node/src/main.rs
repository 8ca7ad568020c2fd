//! pocc-node: drives a single in-process PoCC ledger from the command line.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use pocc_crypto::{
    address_from_pubkey, generate_keypair, ApplicationSalt, IdentityCrypto, PersonalInfo,
    Sha256Identity,
};
use pocc_ledger::{now_millis, Ledger, LedgerConfig, LedgerError};
use pocc_types::{Address, Node, NodeType, Transaction, TxKind};
use tracing::info;

#[derive(Parser)]
#[command(name = "pocc-node")]
#[command(about = "Permissioned ledger driven by Proof of Civil Contribution")]
struct Cli {
    /// Path to a TOML ledger config; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Leading hex zeros required of block hashes (overrides config file)
    #[arg(long)]
    difficulty: Option<usize>,

    #[command(subcommand)]
    cmd: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Register a root and an applicant, issue a DID and produce a block
    Demo,
    /// Print a fresh ed25519 keypair and its ledger address
    Keygen,
    /// Queue government-action records and seal them into a block
    Seal {
        /// Payload of each record
        #[arg(required = true)]
        payloads: Vec<String>,
    },
}

fn load_config(cli: &Cli) -> anyhow::Result<LedgerConfig> {
    let mut config = match &cli.config {
        Some(path) => LedgerConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => LedgerConfig::default(),
    };
    if let Some(difficulty) = cli.difficulty {
        config.difficulty = difficulty;
    }
    config.validate()?;
    Ok(config)
}

fn root_node() -> Node {
    Node::new("UBC", "BCBOOK", NodeType::Business, ["Alice", "Bob"])
}

fn short(hash: &str) -> &str {
    hash.get(..16).unwrap_or(hash)
}

fn demo(config: LedgerConfig) -> anyhow::Result<()> {
    let ledger = Ledger::new(config, root_node())?;
    let root = ledger.root_address();
    let crypto = Sha256Identity;

    // Step 1: Alice registers and applies to the root for a DID.
    let (_sk, pk) = generate_keypair();
    let alice = address_from_pubkey(&pk);
    ledger.register_node(Node::new("Alice", alice.clone(), NodeType::Personal, ["Alice"]))?;

    let info = PersonalInfo {
        name: "John Doe".into(),
        email: "john.doe@example.com".into(),
        phone: "1234567890".into(),
        postal_address: "123 Main St, Anytown, USA".into(),
        passport: "P1234567".into(),
    };
    // The salt is handed to the root together with `info`, never published.
    let salt = ApplicationSalt::generate();
    let digest = crypto.derive_personal_digest(&info, &salt)?;
    ledger.apply_for_did(&alice, &root, &digest)?;

    // Step 2: the root attests the application and issues the DID.
    let did = ledger.mint_did(&crypto, &digest, &alice, &root, 100.0)?;
    let did_id = did.did_id.clone();
    ledger.approve_did(did)?;
    ledger.record_contribution(&did_id, 100.0)?;
    info!(did = %did_id, verified = ledger.verify_did(&did_id, &alice), "DID issued");

    // Step 3: Alice wins a production round and is rewarded.
    let mut rng = rand::thread_rng();
    let block = loop {
        let Some(ticket) = ledger.begin_round(&alice, &mut rng) else {
            continue;
        };
        match ledger.commit_round(&ticket) {
            Ok(block) => break block,
            Err(LedgerError::StaleTip { .. }) => continue,
            Err(e) => return Err(e.into()),
        }
    };
    println!(
        "block {} hash={} txs={} valid={}",
        block.index,
        short(&block.hash),
        block.transactions.len(),
        ledger.validate_block(&block)
    );
    println!(
        "reward of {}: {:.4}",
        short(alice.as_str()),
        ledger.reward_of(&alice).unwrap_or(0.0)
    );

    println!("{}", serde_json::to_string_pretty(&ledger.blocks())?);
    Ok(())
}

fn seal(config: LedgerConfig, payloads: Vec<String>) -> anyhow::Result<()> {
    let ledger = Ledger::new(config, root_node())?;
    let root = ledger.root_address();
    for payload in payloads {
        let tx = Transaction::new(
            root.as_str(),
            root.as_str(),
            0.0,
            TxKind::GovernmentAction,
            Some(payload),
            now_millis(),
        );
        ledger.submit(tx);
    }

    let before = ledger.pending_len();
    let block = ledger.seal_block()?;
    println!(
        "sealed block {} proof={} hash={} (pending before={} after={})",
        block.index,
        block.proof,
        short(&block.hash),
        before,
        ledger.pending_len()
    );
    Ok(())
}

fn keygen() {
    let (sk, pk) = generate_keypair();
    let address: Address = address_from_pubkey(&pk);
    println!("secret  {}", hex::encode(sk.to_bytes()));
    println!("public  {}", hex::encode(pk.to_bytes()));
    println!("address {address}");
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.cmd.unwrap_or(Command::Demo) {
        Command::Demo => demo(config),
        Command::Keygen => {
            keygen();
            Ok(())
        }
        Command::Seal { payloads } => seal(config, payloads),
    }
}
