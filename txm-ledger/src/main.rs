//! txm (transaction Merkle trees) CLI

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use txm_ledger::render::{render_levels, render_tree};
use txm_ledger::{Ledger, LedgerConfig, Receipt};

#[derive(Parser)]
#[command(name = "txm")]
#[command(about = "Transaction ledger with Merkle inclusion receipts", long_about = None)]
struct Cli {
    /// Configuration file (TOML); defaults are used if it does not exist
    #[arg(short, long, default_value = "txm.toml")]
    config: PathBuf,

    /// Storage directory, overriding the configuration
    #[arg(short = 'd', long)]
    storage_dir: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a fresh ledger, discarding existing transactions
    Init {
        /// Add the four demo transfers
        #[arg(long)]
        seed: bool,
    },

    /// Append a transfer
    Add {
        #[arg(long)]
        from: String,

        #[arg(long)]
        to: String,

        #[arg(long)]
        amount: u64,
    },

    /// Append generated transfers with random amounts
    Generate {
        /// Number of transfers
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
    },

    /// List all transactions
    List,

    /// Print the current root hash
    Root,

    /// Issue an inclusion receipt for a transaction
    Prove {
        /// Transaction id
        id: u64,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Verify a receipt file
    Verify {
        /// Receipt JSON file
        file: PathBuf,

        /// Raise the amount by ten before verifying
        #[arg(long)]
        tamper: bool,
    },

    /// Show a transaction and its latest stored receipt
    Show {
        /// Transaction id
        id: u64,
    },

    /// Print the tree
    Tree {
        /// Mark the proof path of this transaction
        #[arg(long)]
        highlight: Option<u64>,

        /// One line per level instead of the nested view
        #[arg(long)]
        levels: bool,
    },
}

fn load_config(cli: &Cli) -> Result<LedgerConfig> {
    let mut config = LedgerConfig::load_or_default(&cli.config)?;
    if let Some(dir) = &cli.storage_dir {
        config.storage.path = dir.clone();
    }
    Ok(config)
}

fn log_level(cli: &Cli, config: &LedgerConfig) -> Result<Level> {
    Ok(match cli.verbose {
        0 => config.logging.max_level()?,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(log_level(&cli, &config)?)
        .with_writer(std::io::stderr)
        .init();

    let mut ledger = Ledger::open(&config)?;

    match cli.command {
        Commands::Init { seed } => {
            ledger.reset()?;
            if seed {
                ledger.seed()?;
            }
            if !cli.config.exists() {
                config.to_file(&cli.config)?;
                println!("Default configuration saved to {}", cli.config.display());
            }

            println!("Ledger initialized at {}", config.storage.path.display());
            println!("Transactions: {}", ledger.len()?);
            print_root(&ledger)?;
        }

        Commands::Add { from, to, amount } => {
            let tx = ledger.add(&from, &to, amount)?;
            println!("Added {}", tx);
            print_root(&ledger)?;
        }

        Commands::Generate { count } => {
            let mut rng = rand::thread_rng();
            for _ in 0..count {
                let tx = ledger.generate(&mut rng)?;
                println!("Added {}", tx);
            }
            print_root(&ledger)?;
        }

        Commands::List => {
            let transactions = ledger.transactions()?;

            if transactions.is_empty() {
                println!("No transactions");
            } else {
                println!("Transactions ({})", transactions.len());
                println!();
                for tx in transactions {
                    println!("  {}", tx);
                }
            }
        }

        Commands::Root => print_root(&ledger)?,

        Commands::Prove { id, output } => {
            let receipt = ledger.prove(id)?;
            let json = receipt.to_json_pretty()?;

            if let Some(output_path) = output {
                std::fs::write(&output_path, json)?;
                println!("Receipt for transaction {} written to {}", id, output_path.display());
                println!("Root:        {}", receipt.root);
                println!("Path Length: {}", receipt.proof.len());
            } else {
                println!("{}", json);
            }
        }

        Commands::Verify { file, tamper } => {
            let json = std::fs::read_to_string(&file)?;
            let mut receipt = Receipt::from_json(&json)?;
            if tamper {
                receipt = receipt.tampered();
                println!("Tampered: amount raised to {}", receipt.transaction.amount);
            }

            let check = ledger.check_receipt(&receipt)?;
            println!("Transaction: {}", receipt.transaction);
            println!("Root:        {}", receipt.root);
            println!(
                "Inclusion:   {}",
                if check.valid { "VALID" } else { "INVALID" }
            );
            println!(
                "Current:     {}",
                if check.current {
                    "issued against the current root"
                } else {
                    "ledger root has changed since issue"
                }
            );

            if !check.valid {
                anyhow::bail!("receipt does not verify");
            }
        }

        Commands::Show { id } => {
            let tx = ledger
                .get(id)?
                .ok_or_else(|| anyhow::anyhow!("No transaction with id {}", id))?;

            println!("Transaction");
            println!("===========");
            println!("Id:     {}", tx.id);
            println!("From:   {}", tx.from);
            println!("To:     {}", tx.to);
            println!("Amount: {} ETH", tx.amount);

            if let Some(receipt) = ledger.receipt(id)? {
                println!();
                println!("Latest Receipt");
                println!("==============");
                println!("Issued:      {}", receipt.issued_at.to_rfc3339());
                println!("Root:        {}", receipt.root);
                println!("Leaf Index:  {}", receipt.proof.leaf_index);
                println!("Path Length: {}", receipt.proof.len());
                println!("Hash:        {}", receipt.hash);
                for (i, step) in receipt.proof.steps.iter().enumerate() {
                    println!("  {:>2}. {:<5} {}", i, step.side.to_string(), step.hash);
                }
            }
        }

        Commands::Tree { highlight, levels } => {
            let tree = ledger.tree()?;
            match tree.as_built() {
                None => println!("Empty tree"),
                Some(built) => {
                    println!(
                        "{} leaves, depth {}, {}, {:?}",
                        built.leaf_count(),
                        built.depth(),
                        ledger.hash_algorithm(),
                        built.policy()
                    );
                    println!();
                    if levels {
                        print!("{}", render_levels(built));
                    } else {
                        print!("{}", render_tree(built, highlight.as_ref()));
                    }
                }
            }
        }
    }

    Ok(())
}

fn print_root(ledger: &Ledger) -> Result<()> {
    match ledger.root()? {
        Some(root) => println!("Root: {}", root),
        None => println!("Root: (empty ledger)"),
    }
    Ok(())
}
