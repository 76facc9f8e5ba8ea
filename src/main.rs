// Main entry point for the hookdb CLI
// Opens a connection and runs SQL through it, either once or in a shell

use anyhow::{anyhow, Context, Result};
use clap::Parser as ClapParser;
use hookdb::{
    audit, format, ConnectOptions, Database, MemoryDriver, Params, Registry, AUDIT_EVENT,
};
use std::io::{self, Write};
use tracing_subscriber::EnvFilter;

/// hookdb - SQL connections with pre/post query hooks
#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Connection string of the default connection
    #[arg(long, env = "HOOKDB_DSN", default_value = "memory:")]
    dsn: String,

    /// Username for the connection
    #[arg(short, long)]
    user: Option<String>,

    /// Password for the connection
    #[arg(short, long)]
    password: Option<String>,

    /// Driver option as key=value, may be repeated
    #[arg(short, long = "option", value_parser = parse_key_value)]
    options: Vec<(String, String)>,

    /// Execute a single SQL command and exit
    #[arg(short, long)]
    execute: Option<String>,

    /// Parameters for --execute, as a JSON array or object
    #[arg(long)]
    params: Option<String>,

    /// Run statements under this event name
    #[arg(long)]
    event: Option<String>,

    /// Log every statement and its row count through audit hooks
    #[arg(long)]
    audit: bool,

    /// Print result rows as JSON
    #[arg(long)]
    json: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    log_level: String,
}

impl Args {
    fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            username: self.user.clone(),
            password: self.password.clone(),
            options: self.options.iter().cloned().collect(),
        }
    }

    /// Event statements run under, if any
    fn event(&self) -> Option<&str> {
        match (&self.event, self.audit) {
            (Some(event), _) => Some(event),
            (None, true) => Some(AUDIT_EVENT),
            (None, false) => None,
        }
    }
}

fn parse_key_value(s: &str) -> Result<(String, String)> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| anyhow!("expected key=value, got '{}'", s))?;
    Ok((key.to_string(), value.to_string()))
}

/// State shared by the shell commands
struct Session {
    args: Args,
    driver: MemoryDriver,
    registry: Registry,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&args.log_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let mut session = Session {
        args,
        driver: MemoryDriver::new(),
        registry: Registry::new(),
    };
    let dsn = session.args.dsn.clone();
    session.connect(None, &dsn)?;

    if let Some(sql) = session.args.execute.clone() {
        let params = match &session.args.params {
            Some(json) => {
                let json = serde_json::from_str(json).context("--params is not valid JSON")?;
                Params::from_json(&json)?
            }
            None => Params::default(),
        };
        return session.run(&sql, params);
    }

    println!("╔════════════════════════════════════════════╗");
    println!("║          hookdb Interactive Shell          ║");
    println!("╚════════════════════════════════════════════╝");
    println!();
    println!("Connected to {}", dsn);
    println!("Type SQL commands or '.help' for help");
    println!("Type '.exit' to quit");
    println!();

    repl(&mut session)
}

impl Session {
    /// Open a connection and register it, making it the default
    fn connect(&mut self, id: Option<&str>, dsn: &str) -> Result<String> {
        let mut database = Database::connect(&self.driver, dsn, &self.args.connect_options())?;
        if self.args.audit {
            audit::install(&mut database);
        }
        Ok(self.registry.add(database, id))
    }

    /// Execute a statement on the default connection and print its result
    fn run(&self, sql: &str, params: Params) -> Result<()> {
        let database = self
            .registry
            .get(None)
            .ok_or_else(|| anyhow!("No default connection"))?;
        let mut statement = database.lock().query(sql, params, self.args.event())?;

        if statement.columns().is_empty() {
            println!("{} row(s) affected", statement.rows_affected());
            return Ok(());
        }

        let columns = statement.columns().to_vec();
        let rows = statement.fetch_all();
        if self.args.json {
            println!("{}", serde_json::to_string_pretty(&format::json(&columns, &rows))?);
        } else {
            println!("{}", format::table(&columns, &rows));
        }
        Ok(())
    }

    /// Handle a dot command, returning false when the shell should exit
    fn command(&mut self, input: &str) -> Result<bool> {
        let mut words = input.split_whitespace();
        match (words.next(), words.next(), words.next()) {
            (Some(".exit" | ".quit"), None, None) => {
                println!("Goodbye!");
                return Ok(false);
            }
            (Some(".help"), None, None) => print_help(),
            (Some(".connections"), None, None) => {
                let default = self.registry.default_id();
                for id in self.registry.ids() {
                    let marker = if Some(&id) == default.as_ref() { "*" } else { " " };
                    println!("{} {}", marker, id);
                }
            }
            (Some(".connect"), Some(id), Some(dsn)) => {
                let id = self.connect(Some(id), dsn)?;
                println!("Connected '{}' to {}", id, dsn);
            }
            (Some(".use"), Some(id), None) => {
                if !self.registry.set_default(id) {
                    return Err(anyhow!("No connection named '{}'", id));
                }
                println!("Using '{}'", id);
            }
            _ => {
                println!("Unknown command: {}", input);
                println!("Type '.help' for help");
            }
        }
        Ok(true)
    }
}

fn repl(session: &mut Session) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("hookdb> ");
        stdout.flush()?;

        let mut input = String::new();
        if stdin.read_line(&mut input)? == 0 {
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        let result = if input.starts_with('.') {
            match session.command(input) {
                Ok(false) => break,
                other => other.map(|_| ()),
            }
        } else {
            session.run(input, Params::default())
        };

        if let Err(e) = result {
            eprintln!("Error: {:#}", e);
        }
    }

    Ok(())
}

fn print_help() {
    println!("╔════════════════════════════════════════════╗");
    println!("║                hookdb Help                 ║");
    println!("╚════════════════════════════════════════════╝");
    println!();
    println!("Special Commands:");
    println!("  .help                  Show this help message");
    println!("  .exit, .quit           Exit the shell");
    println!("  .connections           List connections (* marks the default)");
    println!("  .connect <id> <dsn>    Open a connection and make it the default");
    println!("  .use <id>              Make a connection the default");
    println!();
    println!("Connection strings:");
    println!("  memory:                A private in-memory database");
    println!("  memory:<name>          A named in-memory database shared by connections");
    println!();
    println!("Supported SQL Commands:");
    println!("  CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, age INTEGER)");
    println!("  INSERT INTO users VALUES (1, 'Alice', 30), (2, 'Bob', 25)");
    println!("  INSERT INTO users (id, name) VALUES (3, 'Carol')");
    println!("  SELECT * FROM users WHERE id = 1");
    println!("  SELECT name AS who FROM users LIMIT 10");
    println!("  UPDATE users SET age = 31 WHERE id = 1");
    println!("  DELETE FROM users WHERE id = 1");
    println!("  CREATE INDEX ON users (name)");
    println!();
    println!("Notes:");
    println!("  - UPDATE and DELETE require a WHERE clause");
    println!("  - WHERE supports a single column = value condition");
    println!("  - --audit logs every statement at info level (set --log-level info)");
    println!();
}
