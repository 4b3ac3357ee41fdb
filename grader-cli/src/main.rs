//! grader-cli - submit answers to an activity grading server
//!
//! # Subcommands
//! - `submit <identifier> <answer> [--session <id>] [--json]` - grade one answer
//! - `status`                                                 - show server health

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

const DEFAULT_SERVER: &str = "http://127.0.0.1:8080";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "grader-cli",
    version,
    about = "Submit answers to an activity grading server"
)]
struct Cli {
    /// Grading server URL (overrides GRADER_URL env var)
    #[arg(long, env = "GRADER_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Submit an answer for grading
    Submit {
        /// Activity identifier
        identifier: String,

        /// Answer to be graded
        answer: String,

        /// Session identifier recorded with the submission
        #[arg(long, env = "GRADER_SESSION", default_value = "")]
        session: String,

        /// Print the raw feedback JSON
        #[arg(long)]
        json: bool,
    },

    /// Show grading server status
    Status,
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct SubmissionRequest<'a> {
    pub identifier: &'a str,
    pub answer: &'a str,
    pub session: &'a str,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Feedback {
    pub grade: f64,
    pub hint: String,
}

/// Human-readable rendering of a feedback response.
pub fn format_feedback(feedback: &Feedback) -> String {
    let verdict = if feedback.grade >= 1.0 {
        "Correct"
    } else if feedback.grade > 0.0 {
        "Partially correct"
    } else {
        "Incorrect"
    };

    if feedback.hint.is_empty() {
        format!("{} ({:.0}%)", verdict, feedback.grade * 100.0)
    } else {
        format!(
            "{} ({:.0}%)\nHint: {}",
            verdict,
            feedback.grade * 100.0,
            feedback.hint
        )
    }
}

/// Pull the server's error message out of a non-2xx body, if it has one.
pub fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn do_submit(
    server: &str,
    identifier: &str,
    answer: &str,
    session: &str,
    json_output: bool,
) -> anyhow::Result<()> {
    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()?;

    let url = format!("{}/submissions", server);
    let body = SubmissionRequest {
        identifier,
        answer,
        session,
    };

    let resp = match client.post(&url).json(&body).send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("grader-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().unwrap_or_default();
        eprintln!("grader-cli: server returned {}: {}", status, error_message(&body));
        std::process::exit(1);
    }

    let feedback: Feedback = match resp.json() {
        Ok(f) => f,
        Err(e) => {
            eprintln!("grader-cli: failed to parse feedback: {}", e);
            std::process::exit(1);
        }
    };

    if json_output {
        println!("{}", serde_json::to_string(&feedback)?);
    } else {
        println!("{}", format_feedback(&feedback));
    }

    Ok(())
}

/// Show the server status by calling GET /health.
fn do_status(server: &str) -> anyhow::Result<()> {
    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()?;

    let url = format!("{}/health", server);

    match client.get(&url).send() {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            let records = &body["records"];
            println!("Grader server: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Version:       {}", body["version"].as_str().unwrap_or("?"));
            println!("Activities:    {}", body["activities"]);
            println!(
                "Record queue:  {}/{} queued, {} pending",
                records["queued"], records["capacity"], records["pending"]
            );
            println!(
                "Records:       {} written, {} dropped, {} failed",
                records["recorded"], records["dropped"], records["failed"]
            );
        }
        Ok(r) => {
            eprintln!("grader-cli: server unhealthy (HTTP {})", r.status());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("grader-cli: cannot reach {}: {}", url, e);
            std::process::exit(1);
        }
    }

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::Submit {
            identifier,
            answer,
            session,
            json,
        } => do_submit(&server, &identifier, &answer, &session, json),
        Commands::Status => do_status(&server),
    };

    if let Err(e) = result {
        eprintln!("grader-cli: {}", e);
        std::process::exit(1);
    }
}
