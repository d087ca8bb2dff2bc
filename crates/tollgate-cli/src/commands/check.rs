//! `tollgate check` command implementation.
//!
//! Runs a statement through classification, table extraction, and the
//! denylist policy without touching the database. Useful for verifying a
//! denylist before deploying it.

use anyhow::Result;
use tollgate_core::GateConfig;
use tollgate_policy::DenylistPolicy;
use tollgate_sql::SqlAnalyzer;

/// Evaluate one statement against the configured policy.
///
/// Returns `true` when the statement would be blocked.
pub fn run(config: &GateConfig, sql: &str) -> Result<bool> {
    let permissions = config.effective_permissions();
    let analyzer = SqlAnalyzer::new();

    let statement = match analyzer.parse_one(sql) {
        Ok(statement) => statement,
        Err(e) => {
            // Unparseable input is a denial, same as at execution time.
            println!("kind: unknown");
            println!("decision: blocked ({e})");
            return Ok(true);
        }
    };

    let kind = analyzer.classify(&statement);
    println!("kind: {kind}");

    let tables = analyzer.extract_tables(&statement);
    if tables.is_empty() {
        println!("tables: (none)");
    } else {
        let names: Vec<String> = tables.iter().map(|table| table.to_string()).collect();
        println!("tables: {}", names.join(", "));
    }

    let policy = DenylistPolicy::new(
        permissions.denylist.clone(),
        permissions.default_schema.clone(),
        permissions.multi_schema,
    );
    let decision = policy.evaluate_statement(&statement);
    match &decision.reason {
        Some(reason) if decision.blocked => println!("decision: blocked ({reason})"),
        _ if decision.blocked => println!("decision: blocked"),
        _ => println!("decision: allowed"),
    }

    Ok(decision.blocked)
}
