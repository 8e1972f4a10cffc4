use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use vbox_search::cli::{Cli, Command};
use vbox_search::config;
use vbox_search::extension::Extension;
use vbox_search::logging;
use vbox_search::notifier::LogNotifier;
use vbox_search::provider::{SearchProvider, VmSearchProvider};
use vbox_search::registry::VmRegistry;

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = config::load_config(cli.config.as_deref())?;
    let settings = config.settings(cli.source.map(Into::into))?;

    let mut extension = Extension::new(settings, Arc::new(LogNotifier));
    if matches!(cli.command, Command::Watch) {
        extension = extension.on_refresh(Arc::new(|registry: &VmRegistry| {
            eprintln!("registry refreshed: {} machine(s)", registry.len());
        }));
    }
    let provider = extension.enable()?;

    match cli.command {
        Command::List { json } => {
            let records = provider.records();
            if json {
                println!(
                    "{}",
                    facet_json::to_string(&records).expect("JSON serialization")
                );
            } else {
                for record in &records {
                    println!("{}\t{}", record.display_name, record.identifier);
                }
            }
        }
        Command::Search { terms, json } => {
            let ids = provider.initial_result_set(&terms);
            print_results(&provider, &ids, json);
        }
        Command::Start { id } => {
            let name = provider
                .registry()
                .get(&id)
                .map(|r| r.display_name)
                .unwrap_or_else(|| id.clone());
            println!("Starting '{name}'...");
            provider.activate_result(&id);
        }
        Command::Pick { terms } => vbox_search::pick::run(&provider, &terms)?,
        Command::Watch => run_watch(&provider).await,
    }

    extension.disable();
    Ok(())
}

fn print_results(provider: &VmSearchProvider, ids: &[String], json: bool) {
    let metas = provider.result_metas(ids);
    if json {
        println!(
            "{}",
            facet_json::to_string(&metas).expect("JSON serialization")
        );
    } else {
        for meta in &metas {
            println!("{}\t{}", meta.name, meta.id);
        }
    }
}

/// One query per stdin line until EOF or Ctrl-C. Every line after the first
/// is answered as a subsearch of the previous results.
async fn run_watch(provider: &VmSearchProvider) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut previous: Option<Vec<String>> = None;

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = tokio::signal::ctrl_c() => break,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("failed to read query: {e}");
                break;
            }
        };

        let terms: Vec<String> = line.split_whitespace().map(String::from).collect();
        if terms.is_empty() {
            continue;
        }
        let ids = match &previous {
            None => provider.initial_result_set(&terms),
            Some(prev) => provider.subsearch_result_set(prev, &terms),
        };
        print_results(provider, &ids, false);
        println!();
        previous = Some(ids);
    }
}
