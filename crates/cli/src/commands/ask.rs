//! `knowdesk ask` — Single-question or interactive chat mode.

use std::io::Write;
use std::sync::Arc;

use knowdesk_assistant::{SessionState, TurnPipeline};
use knowdesk_config::{AppConfig, AwsCredentials};
use knowdesk_core::Topic;
use tokio::io::{AsyncBufReadExt, BufReader};

/// One line of interactive input.
#[derive(Debug, PartialEq, Eq)]
enum ReplInput {
    Empty,
    Quit,
    Help,
    Topics,
    History,
    SwitchTopic(String),
    Question(String),
}

fn parse_input(line: &str) -> ReplInput {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ReplInput::Empty;
    }

    match trimmed.split_once(char::is_whitespace) {
        Some(("/topic", rest)) => ReplInput::SwitchTopic(rest.trim().to_string()),
        _ => match trimmed {
            "exit" | "quit" | "/exit" | "/quit" => ReplInput::Quit,
            "/help" => ReplInput::Help,
            "/topic" | "/topics" => ReplInput::Topics,
            "/history" => ReplInput::History,
            _ => ReplInput::Question(line.to_string()),
        },
    }
}

pub async fn run(topic: &str, message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let topic: Topic = topic.parse()?;

    let credentials = match AwsCredentials::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!();
            eprintln!("  ERROR: {e}");
            eprintln!();
            eprintln!("  Set AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY, or add them to:");
            eprintln!("    {}", AppConfig::secrets_path().display());
            eprintln!();
            eprintln!("  Run `knowdesk onboard` to create a template.");
            eprintln!();
            return Err("No AWS credentials found. See above for setup instructions.".into());
        }
    };

    let services = knowdesk_providers::build_from_config(&config, credentials);
    let pipeline = Arc::new(TurnPipeline::from_config(
        &config,
        services.generator,
        services.knowledge_base,
    ));

    let mut session = SessionState::new();
    session.set_active_topic(topic);

    if let Some(question) = message {
        eprint!("  Thinking...");
        let record = pipeline.run_turn(&mut session, &question).await?;
        eprint!("\r              \r");
        println!("{}", record.assistant_turn.content);
        return Ok(());
    }

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║      Knowdesk — Internal Knowledge Assistant ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Knowledge base: {}", config.knowledge_base.knowledge_base_id);
    println!("  Topic:          {}", session.active_topic());
    println!();
    print_help();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt(&session)?;

    while let Some(line) = lines.next_line().await? {
        match parse_input(&line) {
            ReplInput::Empty => {}
            ReplInput::Quit => break,
            ReplInput::Help => print_help(),
            ReplInput::Topics => {
                for t in Topic::ALL {
                    let marker = if t == session.active_topic() { "●" } else { "○" };
                    println!("  {marker} {} ({})", t.display_name(), t.slug());
                }
            }
            ReplInput::History => {
                let summary = session.log().history_summary(config.history.preview_chars);
                for (t, previews) in summary {
                    println!("  {t}:");
                    if previews.is_empty() {
                        println!("    (no questions yet)");
                    }
                    for preview in previews {
                        println!("    - {preview}");
                    }
                }
            }
            ReplInput::SwitchTopic(name) => match name.parse::<Topic>() {
                Ok(t) => {
                    session.set_active_topic(t);
                    println!("  ✅ Selected Topic: {t}");
                }
                Err(e) => eprintln!("  [Error] {e}"),
            },
            ReplInput::Question(question) => {
                eprint!("  ...");
                match pipeline.run_turn(&mut session, &question).await {
                    Ok(record) => {
                        eprint!("\r     \r");
                        println!();
                        for line in record.assistant_turn.content.lines() {
                            println!("  Assistant > {line}");
                        }
                        println!();
                    }
                    Err(e) => {
                        eprint!("\r     \r");
                        eprintln!("  [Error] {e}");
                    }
                }
            }
        }
        prompt(&session)?;
    }

    println!();
    println!("  Goodbye! 👋");
    println!();

    Ok(())
}

const HELP: &str = "\
  Type your question and press Enter.
  /topic <name>  switch topic    /topics   list topics
  /history       past questions  exit      quit
  A line that is only `exit` or `quit` ends the session; it is never asked.
  Ask a one-word question like that with `knowdesk ask -m exit`.
";

fn print_help() {
    println!("{HELP}");
}

fn prompt(session: &SessionState) -> std::io::Result<()> {
    print!("  {} > ", session.active_topic());
    std::io::stdout().flush()
}
