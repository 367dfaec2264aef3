//! `check`: report configuration problems per form kind

use anyhow::{Result, bail};
use colored::*;

use crate::config::{Config, Destination};
use crate::etl::FormKind;

/// Print the resolved configuration; fails if anything would be skipped at run time
pub fn handle_check_command(config: &Config) -> Result<()> {
    let problems = check_config(config);

    println!("{}", "Forms".bold());
    for kind in FormKind::ALL {
        match config.forms.get(kind).target() {
            Ok(target) => println!(
                "  {} {:<9} {} ({}) -> {}",
                "✓".green(),
                kind.as_str(),
                target.source_sheet_id,
                target.source_range,
                target.destination
            ),
            Err(e) => println!("  {} {:<9} {:#}", "✗".red(), kind.as_str(), e),
        }
    }

    println!("{}", "Store".bold());
    match &config.store {
        Some(store) => println!(
            "  {}:{}/{} as {}",
            store.host, store.port, store.database, store.username
        ),
        None => println!("  {}", "not configured".dimmed()),
    }

    println!("{}", "Google".bold());
    if config.google.access_token.is_some() {
        println!("  access token from configuration");
    } else if let Some(path) = &config.google.credentials_file {
        println!("  credentials {}", path.display());
    } else {
        println!("  {}", "no credentials".dimmed());
    }

    if problems.is_empty() {
        println!();
        println!("{}", "Configuration OK".green());
        return Ok(());
    }

    println!();
    for problem in &problems {
        println!("{} {}", "•".red(), problem);
    }
    bail!("{} configuration problem(s) found", problems.len())
}

/// Every problem that would make a run skip work
pub fn check_config(config: &Config) -> Vec<String> {
    let mut problems = Vec::new();
    let mut needs_store = false;

    for kind in FormKind::ALL {
        match config.forms.get(kind).target() {
            Ok(target) => {
                if matches!(target.destination, Destination::Procedure(_)) {
                    needs_store = true;
                }
            }
            Err(e) => problems.push(format!("forms.{}: {:#}", kind, e)),
        }
    }

    if needs_store {
        match &config.store {
            Some(store) => {
                if let Err(e) = store.validate() {
                    problems.push(format!("{:#}", e));
                }
            }
            None => problems.push("store: not configured but a form writes to a procedure".to_string()),
        }
    }

    let has_token = config
        .google
        .access_token
        .as_deref()
        .is_some_and(|t| !t.trim().is_empty());
    match &config.google.credentials_file {
        _ if has_token => {}
        Some(path) if !path.exists() => {
            problems.push(format!("google: credentials file {} not found", path.display()))
        }
        Some(_) => {}
        None => problems.push("google: no credentials_file or access token".to_string()),
    }

    problems
}
