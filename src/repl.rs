//! A plain line-oriented shell: `db > ` prompt, meta-commands prefixed
//! with `.`, and `insert`/`select` statements.
use crate::errors::Error;
use crate::storage::table::describe_constants;
use crate::storage::{Row, Table};
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

enum Statement {
    Insert(Row),
    Select,
}

impl FromStr for Statement {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self, Error> {
        if let Some(rest) = line.strip_prefix("insert") {
            Ok(Statement::Insert(rest.trim().parse()?))
        } else if line.trim() == "select" {
            Ok(Statement::Select)
        } else {
            Err(Error::Parse(format!(
                "Unrecognized keyword at start of '{line}'."
            )))
        }
    }
}

/// Run the REPL against the database at `path` until `.exit` or EOF.
pub fn run(path: &Path) -> Result<(), Error> {
    let mut table = Table::open(path)?;
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("db > ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }

        if let Some(meta) = line.strip_prefix('.') {
            match meta {
                "exit" => break,
                "btree" => print!("{}", table.describe_tree()?),
                "constants" => {
                    println!("Constants:");
                    print!("{}", describe_constants());
                }
                _ => println!("Unrecognized command '{line}'."),
            }
            continue;
        }

        match line.parse::<Statement>() {
            Ok(Statement::Insert(row)) => match table.insert(row) {
                Ok(()) => println!("Executed."),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => println!("{e}"),
            },
            Ok(Statement::Select) => match table.select() {
                Ok(rows) => {
                    for row in rows {
                        println!("{row}");
                    }
                    println!("Executed.");
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => println!("{e}"),
            },
            Err(e) => println!("{e}"),
        }
    }

    table.close()?;
    info!("shell exited");
    Ok(())
}
