//! Basic usage example for transaction Merkle trees
//!
//! This example demonstrates:
//! - Building a tree over four transactions
//! - Generating and inspecting an inclusion proof
//! - Verifying the proof, and watching a tampered transaction fail
//! - Issuing a self-contained receipt from a ledger
//!
//! Run with: cargo run --example basic_usage

use txm_core::{Blake3Hash, CanonicalJson, OddNodePolicy, TreeBuilder, Verifier};
use txm_ledger::config::TreeConfig;
use txm_ledger::render::render_tree;
use txm_ledger::{Ledger, Transaction};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Transaction Merkle Tree Example");
    println!("===============================\n");

    // Step 1: The records to commit to
    let transactions = Transaction::seed();
    println!("Transactions:");
    for tx in &transactions {
        println!("  {}", tx);
    }
    println!();

    // Step 2: Build the tree
    let builder = TreeBuilder::new(Blake3Hash, CanonicalJson);
    let tree = builder.build(&transactions)?;
    let built = tree
        .as_built()
        .ok_or("tree over four transactions is empty")?;

    println!("Tree Built:");
    println!("  Leaves: {}", built.leaf_count());
    println!("  Depth:  {}", built.depth());
    println!("  Root:   {}", built.root());
    println!();
    print!("{}", render_tree(built, Some(&1)));
    println!();

    // Step 3: Prove inclusion of the first transaction
    let proof = built.prove(&1)?;
    println!("Proof for {}:", transactions[0]);
    for (i, step) in proof.steps.iter().enumerate() {
        println!("  {}. sibling on the {}: {}", i + 1, step.side, step.hash);
    }
    println!("  JSON: {}", proof.to_json()?);
    println!();

    // Step 4: Verify, then tamper
    let verifier = Verifier::from(&builder);
    let valid = verifier.verify(&transactions[0], &proof, built.root())?;
    println!("Original transaction verifies: {}", valid);

    let tampered = transactions[0].tampered();
    let valid = verifier.verify(&tampered, &proof, built.root())?;
    println!("Tampered transaction ({}) verifies: {}", tampered, valid);
    println!();

    // Step 5: An odd-width tree under both policies
    for policy in [OddNodePolicy::Promote, OddNodePolicy::Duplicate] {
        let tree = TreeBuilder::new(Blake3Hash, CanonicalJson)
            .with_policy(policy)
            .build(&transactions[..3])?;
        let proof = tree.prove(&3)?;
        println!(
            "{:?}: three leaves, root {}, proof for #3 has {} step(s)",
            policy,
            tree.root().map(|r| r.short_hex(16)).unwrap_or_default(),
            proof.len()
        );
    }
    println!();

    // Step 6: Receipts from an in-memory ledger
    let ledger = Ledger::in_memory(TreeConfig::default());
    ledger.seed()?;
    let added = ledger.add("Eve", "Frank", 4)?;
    let receipt = ledger.prove(added.id)?;

    println!("Receipt for {}:", added);
    println!("{}", receipt.to_json_pretty()?);
    println!("Receipt verifies: {}", receipt.verify()?);
    println!("Tampered receipt verifies: {}", receipt.tampered().verify()?);

    Ok(())
}
