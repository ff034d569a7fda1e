use std::io::{self, BufRead, Write};
use std::path::Path;

use pharmline_agent::{CallSession, OpenAiClient};
use pharmline_core::config::{AppConfig, LoadOptions};
use pharmline_directory::DirectoryClient;

use super::CommandResult;

/// Caller utterances that end the call.
const HANGUP_WORDS: &[&str] = &["quit", "exit", "bye", "goodbye"];

const DEMO_PHONE: &str = "555-0001";
const FAREWELL_LINE: &str = "Thank you for calling Pharmline. Have a great day!";

pub fn run(phone: Option<&str>, config_path: Option<&Path>) -> CommandResult {
    let options = LoadOptions {
        config_path: config_path.map(Path::to_path_buf),
        require_file: config_path.is_some(),
        ..LoadOptions::default()
    };
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("call", "config_validation", error.to_string(), 2);
        }
    };

    init_logging(&config);

    let llm = match OpenAiClient::from_config(&config.llm) {
        Ok(client) => Box::new(client),
        Err(error) => {
            return CommandResult::failure("call", "backend_client", error.to_string(), 3);
        }
    };
    let directory = match DirectoryClient::new(&config.directory) {
        Ok(client) => Box::new(client),
        Err(error) => {
            return CommandResult::failure("call", "directory_client", error.to_string(), 3);
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "call",
                "runtime",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let phone = match phone {
        Some(phone) => phone.to_string(),
        None => prompt_for_phone(),
    };

    runtime.block_on(answer_call(&phone, CallSession::new(llm, directory)))
}

async fn answer_call(phone: &str, mut session: CallSession) -> CommandResult {
    let opening = session.start_call(phone).await;
    print_agent_line(&opening);

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(_) => break,
        };
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if is_hangup(text) {
            break;
        }

        let reply = session.continue_turn(text).await;
        print_agent_line(&reply);
    }

    print_agent_line(FAREWELL_LINE);

    let summary = session.end_call();
    let payload = serde_json::to_string_pretty(&summary)
        .unwrap_or_else(|error| format!("summary serialization failed: {error}"));

    CommandResult { exit_code: 0, output: format!("call summary:\n{payload}") }
}

fn prompt_for_phone() -> String {
    print!("Caller phone number [{DEMO_PHONE}]: ");
    let _ = io::stdout().flush();

    let mut line = String::new();
    if io::stdin().read_line(&mut line).is_err() {
        return DEMO_PHONE.to_string();
    }

    let trimmed = line.trim();
    if trimmed.is_empty() {
        DEMO_PHONE.to_string()
    } else {
        trimmed.to_string()
    }
}

fn is_hangup(text: &str) -> bool {
    let lowered = text.to_lowercase();
    HANGUP_WORDS.iter().any(|word| lowered == *word)
}

fn print_agent_line(reply: &str) {
    println!("Agent: {reply}\n");
    let _ = io::stdout().flush();
}

fn init_logging(config: &AppConfig) {
    use pharmline_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}
