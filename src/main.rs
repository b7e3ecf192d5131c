//! Nicole CLI
//!
//! Interactive shell around a [`ChatSession`] talking to a local Ollama
//! instance.

use clap::Parser;
use nicole::{ChatSession, ConfigLoader, OllamaClient};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Nicole - persona chat with long-term memory
#[derive(Parser, Debug)]
#[command(name = "nicole")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory with the YAML configuration files
    #[arg(long, default_value = "config")]
    config_dir: PathBuf,

    /// Directory for memory and emergency snapshot files
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();

    let loader = ConfigLoader::new(&cli.config_dir);
    let settings = loader.load_settings().await;
    let character = loader.load_character().await;

    let client = OllamaClient::new(&settings.model)?;
    let mut session = ChatSession::new(&loader, &cli.data_dir, settings, client).await?;

    println!("🤖 Система {} активирована", character.name);
    println!("🔒 Протоколы безопасности: АКТИВНЫ");
    println!("💾 Долговременная память: АКТИВНА");
    println!("🚨 Аварийное сохранение: АКТИВНО");
    println!("\nКоманды: 'стата', 'память', 'выход'");
    println!("{}", "-".repeat(50));

    let stdin = io::stdin();
    loop {
        print!("➤ ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match input.to_lowercase().as_str() {
            "выход" | "exit" | "quit" => {
                println!("💾 Сохранение данных...");
                session.shutdown().await?;
                break;
            }
            "стата" => {
                let stats = session.stats();
                println!("📊 Сообщений: {}", stats.total_messages);
                println!("🧠 Память: {} записей", stats.memory_entries);
                println!("⭐ Важных: {}", stats.important_memories);
            }
            "память" => {
                println!("{}", session.memory_summary());
            }
            _ => {
                let response = session.chat(input).await;
                println!("{}: {}\n", character.name, response);
            }
        }
    }

    Ok(())
}
