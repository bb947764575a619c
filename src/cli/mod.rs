use crate::gateway::{Gateway, ValidateOptions};
use crate::manifest::Manifest;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeSet;

#[derive(Parser)]
#[command(name = "sqlgate")]
#[command(about = "Validate and rewrite untrusted SQL against a table access manifest", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a query and print the rewritten, safe SQL
    Validate {
        /// Path to the manifest JSON file
        #[arg(long, env = "SQLGATE_MANIFEST")]
        manifest: String,
        /// Id of the calling user
        #[arg(long)]
        user: i64,
        /// Skip user-filter injection entirely
        #[arg(long)]
        skip_user_filter: bool,
        /// Tables exempted from user-filter injection (repeatable)
        #[arg(long = "skip-table")]
        skip_tables: Vec<String>,
        /// Also filter global tables that declare a user_key
        #[arg(long)]
        enforce_global_filter: bool,
        /// Use this user id in injected filters instead of --user
        #[arg(long)]
        override_user: Option<i64>,
        /// Row cap to apply instead of the default
        #[arg(long)]
        limit: Option<u64>,
        /// The SQL statement to validate
        sql: String,
    },

    /// Print the manifest's table access scopes
    Policy {
        /// Path to the manifest JSON file
        #[arg(long, env = "SQLGATE_MANIFEST")]
        manifest: String,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Validate {
            manifest,
            user,
            skip_user_filter,
            skip_tables,
            enforce_global_filter,
            override_user,
            limit,
            sql,
        } => {
            let manifest = Manifest::from_file(&manifest)
                .with_context(|| format!("loading manifest {manifest}"))?;
            let gateway = Gateway::new(manifest)?;
            let options = ValidateOptions {
                skip_user_filter,
                skip_user_filter_tables: skip_tables.into_iter().collect::<BTreeSet<_>>(),
                enforce_user_filter_on_global_tables: enforce_global_filter,
                override_user_id: override_user,
                custom_limit: limit,
            };
            let rewritten = gateway.validate_query_with(&sql, user, &options)?;
            println!("{rewritten}");
            Ok(())
        }
        Commands::Policy { manifest } => {
            let manifest = Manifest::from_file(&manifest)
                .with_context(|| format!("loading manifest {manifest}"))?;
            print!("{}", manifest.scope_summary());
            Ok(())
        }
    }
}
