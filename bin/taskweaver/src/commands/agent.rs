use std::io::{BufRead, Write};
use taskweaver_agent::AgentRuntime;
use taskweaver_core::{Config, Paths};
use tracing::info;

pub async fn run(message: Option<String>, session: String) -> anyhow::Result<()> {
    let config = Config::from_env();
    let paths = Paths::new();
    let runtime = AgentRuntime::new(config, paths)?;

    // One-shot mode
    if let Some(message) = message {
        let response = runtime.process_message(&session, &message).await?;
        println!("{}", response);
        return Ok(());
    }

    // Interactive REPL
    println!("Welcome to TaskWeaver! Type 'q', 'Q', or 'quit' to exit.");
    info!(session = %session, "Interactive session started");

    let stdin = std::io::stdin();
    loop {
        print!("\nEnter your query: ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            // EOF behaves like quit
            println!("Goodbye!");
            break;
        }
        let query = line.trim();

        if is_exit_command(query) {
            println!("Goodbye!");
            break;
        }

        if query.is_empty() {
            println!("Please enter a valid query.");
            continue;
        }

        match runtime.process_message(&session, query).await {
            Ok(response) => println!("{}", response),
            Err(e) => eprintln!("Error: {}", e),
        }
    }

    Ok(())
}

fn is_exit_command(input: &str) -> bool {
    matches!(input.to_lowercase().as_str(), "q" | "quit")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_exit_command() {
        assert!(is_exit_command("q"));
        assert!(is_exit_command("Q"));
        assert!(is_exit_command("quit"));
        assert!(is_exit_command("QUIT"));
        assert!(!is_exit_command(""));
        assert!(!is_exit_command("quit please"));
    }
}
