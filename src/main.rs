use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

use camppics::clock::SystemClock;
use camppics::db::{SearchSource, SqliteDb};
use camppics::search::{self, SearchCache};
use camppics::Config;

enum Command {
    Refresh,
    Search(String),
    Browse,
}

struct Args {
    command: Command,
    config_path: Option<PathBuf>,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = None;
    let mut command = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("camppics {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
            }
            "refresh" if command.is_none() => {
                command = Some(Command::Refresh);
            }
            "browse" if command.is_none() => {
                command = Some(Command::Browse);
            }
            "search" if command.is_none() => {
                if i + 1 < args.len() {
                    command = Some(Command::Search(args[i + 1].clone()));
                    i += 1;
                } else {
                    eprintln!("Error: search requires a query argument");
                    std::process::exit(1);
                }
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let command = match command {
        Some(command) => command,
        None => {
            print_help();
            std::process::exit(1);
        }
    };

    Args {
        command,
        config_path,
    }
}

fn print_help() {
    println!(
        r#"camppics - campground search and media tools

USAGE:
    camppics [OPTIONS] <COMMAND>

COMMANDS:
    search QUERY        Rank parks and campgrounds against QUERY
    browse              List all parks alphabetically
    refresh             Force a rebuild of the search snapshot

OPTIONS:
    --config, -c PATH   Path to config file
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    CAMPPICS_LOG        Log level (trace, debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/camppics/config.toml"#
    );
}

fn main() -> Result<()> {
    let args = parse_args();

    // Initialize logging (uses journald on Linux, file fallback otherwise)
    let _ = camppics::logging::init(None);

    // Load configuration
    let config = match &args.config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    // Initialize database
    let db = Arc::new(SqliteDb::open(&config.db_path)?);

    let cache = SearchCache::new(
        Arc::clone(&db) as Arc<dyn SearchSource>,
        Arc::new(SystemClock),
        config.cache.dir.join("parkSearch.json"),
    )
    .with_refresh_interval(chrono::Duration::hours(config.cache.refresh_interval_hours));

    match args.command {
        Command::Refresh => {
            let entries = cache.get(true);
            println!("Search snapshot rebuilt: {} entries", entries.len());
        }
        Command::Search(query) => {
            let results = search::search_api(&cache, &query);
            if results.is_empty() {
                println!("No results for \"{query}\"");
            }
            for ranked in results {
                let kind = match ranked.entry.kind {
                    search::EntryKind::Park => "park",
                    search::EntryKind::Campground => "campground",
                };
                match &ranked.entry.parent_park {
                    Some(parent) => println!(
                        "{:3}  {} ({}) - {kind} in {parent}",
                        ranked.score, ranked.entry.name, ranked.entry.province
                    ),
                    None => println!(
                        "{:3}  {} ({}) - {kind}",
                        ranked.score, ranked.entry.name, ranked.entry.province
                    ),
                }
            }
        }
        Command::Browse => {
            for park in search::browse_all(&cache) {
                println!("{} ({})", park.name, park.province);
            }
        }
    }

    Ok(())
}
