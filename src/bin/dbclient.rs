use dbclient::config::{default_config_path, load_config};
use dbclient::{DatabaseClient, DbClientError, Result};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

const USAGE: &str = "usage: dbclient [--config PATH] <command> [args]

commands:
  tables                  list tables
  columns <table>         list the columns of a table
  export <table> <file>   write a table to CSV
  import <table> <file>   insert CSV records into a table
  backup <file>           write a SQL dump (sqlite only)
  restore <file>          run a SQL script
  query <sql>             run a statement and print rows as JSON";

fn usage_error() -> DbClientError {
    DbClientError::Config(USAGE.to_string())
}

fn run(mut args: Vec<String>) -> Result<()> {
    let config_path = if args.first().map(String::as_str) == Some("--config") {
        if args.len() < 2 {
            return Err(usage_error());
        }
        let path = PathBuf::from(args.remove(1));
        args.remove(0);
        path
    } else {
        default_config_path()
            .ok_or_else(|| DbClientError::Config("no configuration directory found".to_string()))?
    };

    let config = load_config(&config_path)?;
    let mut client: DatabaseClient = config.connect()?;
    info!("Using configuration {}", config_path.display());

    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    match args.as_slice() {
        ["tables"] => {
            for table in client.list_tables()? {
                println!("{}", table);
            }
        }
        ["columns", table] => {
            for column in client.list_columns(table)? {
                println!("{}", column);
            }
        }
        ["export", table, file] => {
            let rows = client.export_to_csv(table, file)?;
            println!("exported {} rows", rows);
        }
        ["import", table, file] => {
            let rows = client.import_from_csv(table, file)?;
            println!("imported {} rows", rows);
        }
        ["backup", file] => client.backup_database(file)?,
        ["restore", file] => client.restore_database(file)?,
        ["query", sql] => {
            for row in client.execute_query(sql, &[])? {
                let line = serde_json::to_string(&row)
                    .map_err(|e| DbClientError::Decode(e.to_string()))?;
                println!("{}", line);
            }
        }
        _ => return Err(usage_error()),
    }

    client.close()
}

fn main() -> ExitCode {
    // Logs go to stderr so command output stays machine-readable
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    match run(std::env::args().skip(1).collect()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
