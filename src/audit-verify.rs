//! A simple CLI tool for verifying an election's audit trail.
//! This uses the server's own chain implementation, and is by definition
//! compatible with the output of `GET /audit`.

use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::BufReader;

use clap::{Arg, ArgAction, ArgMatches, Command};
use rocket::serde::json::serde_json;
use serde::Deserialize;

use election_engine::api::Paginated;
use election_engine::model::{
    audit::{replay_tallies, verify_chain, ChainError, ReplayedTally},
    AuditRecord,
};

const PROGRAM_NAME: &str = "audit-verify";

const ABOUT_TEXT: &str = "Verify the hash chain of an election's audit trail and replay its tallies.

EXIT CODES:
     0: Verification succeeded.
   255: Ran successfully, but verification failed.
 Other: Error.";

const DUMP_PATH: &str = "DUMP_PATH";

const DUMP_PATH_HELP: &str = "The path to a JSON dump of the complete audit trail: either an\n\
array of records, or a single page as returned by `GET /audit` holding every record";

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    clap::command!(PROGRAM_NAME).about(ABOUT_TEXT).arg(
        Arg::new(DUMP_PATH)
            .help(DUMP_PATH_HELP)
            .action(ArgAction::Set)
            .required(true),
    )
}

/// Errors that this program may produce.
#[derive(Debug, Eq, PartialEq)]
enum Error {
    /// IO error described by the inner message.
    IO(String),
    /// Failed to decode the JSON dump.
    Format(String),
    /// Verification failed due to the contained reason.
    Verification(ChainError),
}

/// Either shape of dump we accept.
#[derive(Deserialize)]
#[serde(untagged)]
enum Dump {
    Records(Vec<AuditRecord>),
    Page(Paginated<AuditRecord>),
}

/// A friendly representation of the replayed tally for a particular candidate.
#[derive(Debug, Eq, PartialEq)]
struct FriendlyResults(ReplayedTally);

impl Display for FriendlyResults {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let votes = self.0.votes;
        write!(
            f,
            "{}: {} vote{}",
            self.0.name,
            votes,
            if votes != 1 { "s" } else { "" }
        )
    }
}

/// Run verification.
fn verify(path: &str) -> Result<Vec<FriendlyResults>, Error> {
    // Load the file.
    let file = BufReader::new(File::open(path).map_err(|e| Error::IO(e.to_string()))?);
    let records = match serde_json::from_reader(file).map_err(|e| Error::Format(e.to_string()))? {
        Dump::Records(records) => records,
        Dump::Page(page) => {
            if page.pagination.total != page.items.len() as u64 {
                return Err(Error::Format(format!(
                    "page holds {} of {} records",
                    page.items.len(),
                    page.pagination.total
                )));
            }
            page.items
        }
    };

    // Run verification.
    verify_chain(&records).map_err(Error::Verification)?;

    // Replay the current cycle, in candidate index order.
    Ok(replay_tallies(&records)
        .into_iter()
        .map(FriendlyResults)
        .collect())
}

/// Run verification, report the result, and return the exit code.
fn run(args: &ArgMatches) -> u8 {
    let path: &String = args.get_one(DUMP_PATH).unwrap(); // Required argument is guaranteed to be present.
    match verify(path) {
        Ok(friendly_results) => {
            println!("Verification succeeded.");
            for result in friendly_results {
                println!("{}", result);
            }
            0
        }
        Err(Error::IO(msg)) => {
            println!("IO error: {}", msg);
            1
        }
        Err(Error::Format(msg)) => {
            println!("Invalid JSON: {}", msg);
            1
        }
        Err(Error::Verification(err)) => {
            println!("Verification failed: {}", err);
            255
        }
    }
}

fn main() {
    let args = cli().get_matches();
    let exit_code = run(&args);
    std::process::exit(exit_code.into())
}
