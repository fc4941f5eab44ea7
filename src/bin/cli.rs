//! LStore CLI
//!
//! Administrative access to an LStore data directory. Every invocation opens
//! the database, runs one operation and closes it again.

use clap::{Parser, Subcommand};
use lstore::{Config, Database, EvictionPolicy, MergeMode, Result, Table, Value};
use tracing_subscriber::{fmt, EnvFilter};

/// LStore CLI
#[derive(Parser, Debug)]
#[command(name = "lstore-cli")]
#[command(about = "Administer an LStore columnar database")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./lstore_data")]
    data_dir: String,

    /// Table to operate on
    #[arg(short, long)]
    table: String,

    /// Use LRU instead of random buffer pool eviction
    #[arg(long)]
    lru: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the table
    Create {
        /// Number of columns
        #[arg(short, long)]
        columns: usize,

        /// Primary key column
        #[arg(short, long, default_value = "0")]
        key: usize,
    },

    /// Insert a record: comma-separated values
    Insert { values: String },

    /// Update a record: comma-separated values, `_` keeps a column
    Update { key: Value, values: String },

    /// Delete a record by primary key
    Delete { key: Value },

    /// Select records whose column equals a value
    Select {
        value: Value,

        /// Column to search (defaults to the primary key)
        #[arg(short, long)]
        column: Option<usize>,
    },

    /// Run one merge pass
    Merge,

    /// Print table statistics
    Stats,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,lstore=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    let policy = if args.lru {
        EvictionPolicy::Lru
    } else {
        EvictionPolicy::Random
    };
    let config = Config::builder()
        .data_dir(&args.data_dir)
        .merge_mode(MergeMode::Inline)
        .eviction_policy(policy)
        .build();

    let db = match Database::open(config) {
        Ok(db) => db,
        Err(e) => {
            tracing::error!("Failed to open database: {}", e);
            std::process::exit(1);
        }
    };

    let outcome = run(&db, &args).and_then(|()| db.close());
    if let Err(e) = outcome {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(db: &Database, args: &Args) -> Result<()> {
    if let Commands::Create { columns, key } = args.command {
        db.create_table(&args.table, columns, key)?;
        println!("created table {} ({} columns, key column {})", args.table, columns, key);
        return Ok(());
    }

    let table = db.get_table(&args.table)?;
    match &args.command {
        Commands::Create { .. } => {}
        Commands::Insert { values } => {
            let values = parse_values(values)?;
            let rid = table.insert(&values)?;
            println!("inserted rid {}", rid);
        }
        Commands::Update { key, values } => {
            let values = parse_update(values)?;
            let rid = table.update(*key, &values)?;
            println!("updated key {} (tail rid {})", key, rid);
        }
        Commands::Delete { key } => {
            table.delete(*key)?;
            println!("deleted key {}", key);
        }
        Commands::Select { value, column } => {
            let column = column.unwrap_or(table.key_index());
            let mask = vec![1u8; table.num_columns()];
            for record in table.select(*value, column, &mask)? {
                let cells: Vec<String> = record
                    .columns
                    .iter()
                    .map(|c| c.map_or_else(|| "_".to_string(), |v| v.to_string()))
                    .collect();
                println!("rid {}: {}", record.rid, cells.join(","));
            }
        }
        Commands::Merge => {
            let report = table.merge()?;
            println!(
                "merged {} tail records ({} failed), tps = {}",
                report.processed, report.failed, report.tps
            );
        }
        Commands::Stats => print_stats(&table),
    }
    Ok(())
}

fn print_stats(table: &Table) {
    println!("table:         {}", table.name());
    println!("columns:       {} (key {})", table.num_columns(), table.key_index());
    println!("records:       {}", table.record_count());
    println!("page ranges:   {}", table.page_range_count());
    println!("base pages:    {}", table.base_page_count());
    println!("tail records:  {}", table.tail_record_count());
    println!("tps:           {}", table.tps());
}

fn parse_values(text: &str) -> Result<Vec<Value>> {
    text.split(',')
        .map(|v| {
            v.trim().parse().map_err(|_| {
                lstore::LStoreError::Malformed(format!("not an integer: {:?}", v))
            })
        })
        .collect()
}

fn parse_update(text: &str) -> Result<Vec<Option<Value>>> {
    text.split(',')
        .map(|v| match v.trim() {
            "_" | "" => Ok(None),
            v => v.parse().map(Some).map_err(|_| {
                lstore::LStoreError::Malformed(format!("not an integer: {:?}", v))
            }),
        })
        .collect()
}
