//! DbBot command implementations

use anyhow::{bail, Context, Result};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use dbbot_agent::{
    CodeSandbox, LoopPolicy, ReActAgent, SessionLoop, SqlToolSettings, ToolId, ToolRegistry,
};
use dbbot_config::{self, Config};
use dbbot_db::{ConnectionDescriptor, Database, Dialect};
use dbbot_provider::OpenAiProvider;

use crate::render::print_step;

/// Shown until a database has been chosen
pub const SELECT_DATABASE: &str = "Please select the type of your database and enter the uri.";

/// Database selection given on the command line
#[derive(Debug, Default)]
pub struct DatabaseArgs {
    pub dialect: Option<String>,
    pub uri: Option<String>,
}

impl DatabaseArgs {
    /// Command-line values win over the config file
    fn apply(self, config: &mut Config) {
        if let Some(dialect) = self.dialect {
            config.database.dialect = dialect;
        }
        if let Some(uri) = self.uri {
            config.database.uri = uri;
        }
    }
}

/// Read line from stdin; `None` at end of input
fn read_line() -> Result<Option<String>> {
    let mut input = String::new();
    if std::io::stdin().read_line(&mut input)? == 0 {
        return Ok(None);
    }
    Ok(Some(input.trim().to_string()))
}

fn prompt(label: &str) -> Result<Option<String>> {
    print!("{}", label);
    std::io::stdout().flush()?;
    read_line()
}

/// Accepts a list number or a dialect name
fn parse_dialect_choice(choice: &str) -> Option<Dialect> {
    match choice.trim().parse::<usize>() {
        Ok(n) if (1..=Dialect::ALL.len()).contains(&n) => Some(Dialect::ALL[n - 1]),
        Ok(_) => None,
        Err(_) => choice.parse().ok(),
    }
}

/// Ask for dialect and uri until a connection succeeds
async fn prompt_for_database(read_only: bool) -> Result<(ConnectionDescriptor, Arc<dyn Database>)> {
    println!("{}", SELECT_DATABASE);
    loop {
        println!();
        for (i, dialect) in Dialect::ALL.iter().enumerate() {
            println!("  {}. {}", i + 1, dialect.label());
        }
        let Some(choice) = prompt("Database type: ")? else {
            bail!("no database selected");
        };
        let Some(dialect) = parse_dialect_choice(&choice) else {
            println!("Unknown database type '{}'.", choice);
            continue;
        };

        let Some(uri) = prompt(&format!("URI (e.g. {}): ", dialect.placeholder()))? else {
            bail!("no database selected");
        };
        let descriptor = match ConnectionDescriptor::new(dialect, uri) {
            Ok(d) => d.with_read_only(read_only),
            Err(e) => {
                println!("✗ {}", e);
                continue;
            }
        };

        match dbbot_db::connect(&descriptor).await {
            Ok(db) => return Ok((descriptor, db)),
            Err(e) => println!("✗ {}", e),
        }
    }
}

/// Configured dialect and uri; the guard setting also applies to the connection
fn configured_descriptor(config: &Config) -> Result<ConnectionDescriptor> {
    Ok(
        ConnectionDescriptor::parse(&config.database.dialect, &config.database.uri)?
            .with_read_only(config.database.read_only),
    )
}

/// Connect to the configured database, or explain what is missing
async fn connect_configured(config: &Config) -> Result<(ConnectionDescriptor, Arc<dyn Database>)> {
    if !config.has_database() {
        println!("{}", SELECT_DATABASE);
        bail!("no database selected; pass --dialect and --uri or set them in the config");
    }
    let descriptor = configured_descriptor(config)?;
    let db = dbbot_db::connect(&descriptor)
        .await
        .with_context(|| format!("could not connect to {}", descriptor.redacted_url()))?;
    Ok((descriptor, db))
}

fn sandbox(config: &Config) -> CodeSandbox {
    CodeSandbox {
        python: config.sandbox.python.clone(),
        working_dir: config.sandbox_root(),
        timeout: config.sandbox.timeout_secs.map(Duration::from_secs),
    }
}

fn sql_settings(config: &Config) -> SqlToolSettings {
    SqlToolSettings {
        top_k: config.agent.top_k,
        read_only: config.database.read_only,
        sample_rows: config.database.sample_rows,
    }
}

/// Provider, tools and agent for one database
fn build_session(
    config: &Config,
    dialect: Dialect,
    db: Arc<dyn Database>,
) -> Result<SessionLoop<OpenAiProvider>> {
    let api_key = config
        .api_key()
        .context("No API key configured. Set DBBOT_API_KEY or add one to ~/.dbbot/config.json")?;
    let provider = OpenAiProvider::new(
        api_key,
        config.provider.api_base.clone(),
        Some(config.provider.model.clone()),
    );

    let tools = ToolRegistry::build(
        db,
        config.sandbox_root(),
        sandbox(config),
        sql_settings(config),
    )?;

    let policy = LoopPolicy {
        max_iterations: config.agent.max_iterations,
        parse_retry_backoff: Duration::from_millis(config.agent.parse_retry_backoff_ms),
    };
    let agent = ReActAgent::new(provider, tools)
        .with_policy(policy)
        .with_model(config.provider.model.clone())
        .with_sampling(config.provider.max_tokens, config.provider.temperature);

    Ok(SessionLoop::new(agent, dialect, config.agent.top_k)
        .with_history_window(config.agent.max_history_messages))
}

/// Chat with the database
pub async fn chat_command(args: DatabaseArgs, message: Option<String>) -> Result<()> {
    let mut config = Config::load().await?;
    args.apply(&mut config);
    config.validate()?;

    let (descriptor, db) = if config.has_database() || message.is_some() {
        connect_configured(&config).await?
    } else {
        prompt_for_database(config.database.read_only).await?
    };
    info!("chatting with {}", descriptor.redacted_url());

    let mut session = build_session(&config, descriptor.dialect(), db)?;

    if let Some(msg) = message {
        let answer = session.on_user_message(&msg, &print_step).await;
        println!("\n◆ {}", answer);
        return Ok(());
    }

    println!(
        "◆ Connected to {} ({}, up to {} rows per query)",
        descriptor.redacted_url(),
        session.dialect().label(),
        session.top_k()
    );
    println!("Commands: /tables, /clear, exit");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("\n◆ {}\n", session.session().greeting());

    loop {
        let Some(input) = prompt("> ")? else {
            break;
        };
        if input.is_empty() {
            continue;
        }
        match input.as_str() {
            "exit" | "quit" => break,
            "/clear" => {
                session.reset();
                println!("\n◆ {}\n", session.session().greeting());
            }
            "/tables" => {
                let tables = session
                    .agent()
                    .tools()
                    .invoke(ToolId::SqlListTables, "")
                    .await;
                println!("{}\n", tables);
            }
            _ => {
                let answer = session.on_user_message(&input, &print_step).await;
                println!("\n◆ {}\n", answer);
            }
        }
    }

    Ok(())
}

/// Write the default config
pub async fn init_command() -> Result<()> {
    println!("◆ Initializing DbBot...");

    let config = dbbot_config::init().await?;
    println!("✓ Config at {}", dbbot_config::config_path().display());

    println!("\nNext steps:");
    if !config.has_api_key() {
        println!("  1. Set DBBOT_API_KEY or add provider.api_key to the config");
    }
    if !config.has_database() {
        println!("  2. Pick a database: dbbot chat --dialect sqlite --uri ./chinook.db");
    }
    println!("  Start chatting: dbbot chat");

    Ok(())
}

fn mark(ok: bool, yes: &'static str, no: &'static str) -> &'static str {
    if ok {
        yes
    } else {
        no
    }
}

/// Show configuration status
pub async fn status_command() -> Result<()> {
    let config_path = dbbot_config::config_path();

    println!("◆ DbBot Status");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!(
        "Config:    {} {}",
        config_path.display(),
        mark(config_path.exists(), "[OK]", "[Missing]")
    );

    let config = Config::load().await?;
    println!("Model:     {}", config.provider.model);
    println!(
        "API Key:   {}",
        mark(config.has_api_key(), "[Set]", "[Missing]")
    );

    if config.has_database() {
        match ConnectionDescriptor::parse(&config.database.dialect, &config.database.uri) {
            Ok(descriptor) => println!(
                "Database:  {} ({})",
                descriptor.redacted_url(),
                descriptor.dialect().label()
            ),
            Err(e) => {
                warn!("bad database settings: {}", e);
                println!("Database:  [Invalid] {}", e);
            }
        }
    } else {
        println!("Database:  [Not set]");
    }
    println!(
        "Read-only: {}",
        mark(config.database.read_only, "[On]", "[Off]")
    );
    println!("Top k:     {}", config.agent.top_k);
    println!("Sandbox:   {}", config.sandbox_root().display());

    Ok(())
}

/// List the tables of the database
pub async fn tables_command(args: DatabaseArgs) -> Result<()> {
    let mut config = Config::load().await?;
    args.apply(&mut config);

    let (_, db) = connect_configured(&config).await?;
    let tables = db.list_tables().await?;
    if tables.is_empty() {
        println!("(no tables)");
    }
    for table in tables {
        println!("{}", table);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dialect_choice() {
        assert_eq!(parse_dialect_choice("1"), Some(Dialect::PostgreSql));
        assert_eq!(parse_dialect_choice("3"), Some(Dialect::Sqlite));
        assert_eq!(parse_dialect_choice("mysql"), Some(Dialect::MySql));
        assert_eq!(parse_dialect_choice("0"), None);
        assert_eq!(parse_dialect_choice("4"), None);
        assert_eq!(parse_dialect_choice("oracle"), None);
    }

    #[test]
    fn test_args_override_config() {
        let mut config = Config::default();
        config.database.dialect = "postgresql".to_string();
        config.database.uri = "old".to_string();
        DatabaseArgs {
            dialect: None,
            uri: Some("new.db".to_string()),
        }
        .apply(&mut config);
        assert_eq!(config.database.dialect, "postgresql");
        assert_eq!(config.database.uri, "new.db");
    }

    #[test]
    fn test_descriptor_follows_read_only_setting() {
        let mut config = Config::default();
        config.database.dialect = "sqlite".to_string();
        config.database.uri = "shop.db".to_string();
        assert!(configured_descriptor(&config).unwrap().read_only());

        config.database.read_only = false;
        assert!(!configured_descriptor(&config).unwrap().read_only());
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = Config::default();
        config.agent.top_k = 25;
        config.database.read_only = false;
        config.sandbox.timeout_secs = Some(30);

        let sql = sql_settings(&config);
        assert_eq!(sql.top_k, 25);
        assert!(!sql.read_only);
        assert_eq!(sql.sample_rows, 3);
        assert_eq!(sandbox(&config).timeout, Some(Duration::from_secs(30)));
    }
}
