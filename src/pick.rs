use std::fmt;
use std::io::IsTerminal;

use inquire::Select;

use crate::error::SearchError;
use crate::provider::{SearchProvider, VmSearchProvider};
use crate::record::VmRecord;

struct Choice(VmRecord);

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.source_path {
            Some(path) => write!(f, "{}  ({path})", self.0.display_name),
            None => write!(f, "{}  {{{}}}", self.0.display_name, self.0.identifier),
        }
    }
}

/// Candidates for `pick`: everything when no terms are given.
pub fn candidates(provider: &VmSearchProvider, terms: &[String]) -> Vec<VmRecord> {
    if terms.is_empty() {
        return provider.records();
    }
    let ids = provider.initial_result_set(terms);
    let snapshot = provider.registry().snapshot();
    ids.iter()
        .filter_map(|id| snapshot.iter().find(|r| &r.identifier == id).cloned())
        .collect()
}

/// Filter, prompt, start.
///
/// Without a terminal on stdout the candidates are printed tab-separated
/// instead, so the command stays usable in pipes.
pub fn run(provider: &VmSearchProvider, terms: &[String]) -> Result<(), SearchError> {
    let found = candidates(provider, terms);
    if found.is_empty() {
        let message = if terms.is_empty() {
            "No VMs registered".to_string()
        } else {
            format!("No VMs matching '{}'", terms.join(" "))
        };
        return Err(SearchError::Validation { message });
    }

    if !std::io::stdout().is_terminal() {
        for record in &found {
            println!("{}\t{}", record.display_name, record.identifier);
        }
        return Ok(());
    }

    let choices: Vec<Choice> = found.into_iter().map(Choice).collect();
    let choice = Select::new("Start which VM?", choices)
        .with_help_message("Use ↑↓ to navigate, type to filter")
        .prompt()
        .map_err(map_inquire_err)?;

    println!("Starting '{}'...", choice.0.display_name);
    provider.activate_result(&choice.0.identifier);
    Ok(())
}

fn map_inquire_err(e: inquire::InquireError) -> SearchError {
    match e {
        inquire::InquireError::OperationCanceled | inquire::InquireError::OperationInterrupted => {
            SearchError::Cancelled
        }
        other => SearchError::Prompt {
            message: other.to_string(),
        },
    }
}
