use std::io::Write;
use std::process::exit;

use clap::{Args, Parser, Subcommand};
use serde_json::{to_string, to_string_pretty};
use trialtree::{
    abstract_server::{
        ArchiveStore, Result, RowSource, ServerError, ZipArchiveStore, FILE_TREE_QUERY,
    },
    file_format::config::ServerConfig,
    hierarchy::{HierarchyBuilder, OrphanPolicy},
    logging::init_logging,
};

/// Poke at the same data the trialtree server serves, without the server.
#[derive(Debug, Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the file tree as JSON.
    Tree(TreeArgs),
    /// Print the raw joined rows as JSON, before folding.
    Rows(RowArgs),
    /// Print the join query the database row source runs.
    Query,
    /// Write one file from the archive to stdout.
    Cat(CatArgs),
    /// List the files in the archive.
    Ls(ArchiveArgs),
}

#[derive(Debug, Args)]
struct RowArgs {
    /// SQLite database to query.
    #[clap(long, value_parser)]
    database: Option<String>,

    /// JSON file of pre-joined rows; used instead of `--database`.
    #[clap(long, value_parser, conflicts_with = "database")]
    rows: Option<String>,

    /// One line of JSON instead of pretty-printed output.
    #[clap(long, value_parser)]
    concise: bool,
}

#[derive(Debug, Args)]
struct TreeArgs {
    #[clap(flatten)]
    source: RowArgs,

    /// Place rows with columns beyond a missing key as far as their keys go
    /// instead of leaving them out.
    #[clap(long, value_parser)]
    truncate_orphans: bool,

    /// Fail on the first row with columns beyond a missing key.
    #[clap(long, value_parser, conflicts_with = "truncate_orphans")]
    fail_on_orphans: bool,
}

#[derive(Debug, Args)]
struct ArchiveArgs {
    /// Zip archive holding the trial artifacts.
    #[clap(long, value_parser, default_value = "files.zip")]
    archive: String,

    /// Directory inside the archive that paths are relative to.
    #[clap(long, value_parser, default_value = "files/")]
    prefix: String,
}

#[derive(Debug, Args)]
struct CatArgs {
    #[clap(flatten)]
    archive: ArchiveArgs,

    /// Path of the file, as it appears in the tree's `location`.
    #[clap(value_parser)]
    path: String,
}

impl RowArgs {
    fn row_source(&self) -> Result<Box<dyn RowSource + Send + Sync>> {
        let config = ServerConfig {
            database_path: self.database.clone(),
            rows_path: self.rows.clone(),
            ..Default::default()
        };
        config.row_source()
    }
}

impl ArchiveArgs {
    fn store(&self) -> ZipArchiveStore {
        ZipArchiveStore::new(&self.archive, &self.prefix)
    }
}

fn print_json<T: serde::Serialize>(value: &T, concise: bool) -> Result<()> {
    let output = if concise {
        to_string(value)?
    } else {
        to_string_pretty(value)?
    };
    println!("{}", output);
    Ok(())
}

async fn run(command: Command) -> Result<()> {
    match command {
        Command::Tree(args) => {
            let rows = args.source.row_source()?.fetch_rows().await?;
            let orphans = if args.truncate_orphans {
                OrphanPolicy::Truncate
            } else if args.fail_on_orphans {
                OrphanPolicy::Fail
            } else {
                OrphanPolicy::Skip
            };
            let forest = HierarchyBuilder::new(orphans).build(&rows)?;
            print_json(&forest, args.source.concise)
        }
        Command::Rows(args) => {
            let rows = args.row_source()?.fetch_rows().await?;
            print_json(&rows, args.concise)
        }
        Command::Query => {
            println!("{}", FILE_TREE_QUERY);
            Ok(())
        }
        Command::Cat(args) => {
            let contents = args.archive.store().fetch_file(&args.path).await?;
            std::io::stdout().write_all(&contents)?;
            Ok(())
        }
        Command::Ls(args) => {
            for path in args.store().list_files().await? {
                println!("{}", path);
            }
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();

    if let Err(err) = run(cli.command).await {
        eprintln!("{}", err);
        exit(match err {
            ServerError::NotFound(_) => 2,
            _ => 1,
        });
    }
}
