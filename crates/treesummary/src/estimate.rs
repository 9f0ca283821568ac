use std::path::PathBuf;
use std::process::Stdio;
use std::sync::LazyLock;

use log::{debug, info, warn};
use regex::Regex;
use tokio::process::Command;

static RE_TOKENS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Tokens \(Approximate\):\s*([\d,]+)").unwrap());

/// Extracts the token count from the estimator's output, e.g.
/// `Tokens (Approximate): 4,324` gives `4324`.
pub fn parse_token_estimate(output: &str) -> Option<u64> {
    output.lines().find_map(|line| {
        let caps = RE_TOKENS.captures(line)?;
        caps[1].replace(',', "").parse().ok()
    })
}

/// Runs an external tool over a batch to estimate its prompt size.
///
/// Best effort only: every failure is logged and yields 0.
#[derive(Debug, Clone)]
pub struct TokenEstimator {
    command: String,
}

impl TokenEstimator {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub async fn estimate(&self, paths: &[PathBuf]) -> u64 {
        if paths.is_empty() {
            return 0;
        }

        debug!("Running {} on {} files", self.command, paths.len());
        let output = match Command::new(&self.command)
            .args(paths)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .await
        {
            Ok(output) => output,
            Err(e) => {
                warn!(
                    "Token estimator '{}' could not be run, skipping estimate: {}",
                    self.command, e
                );
                return 0;
            }
        };

        if !output.status.success() {
            warn!(
                "Token estimator '{}' exited with {}, skipping estimate",
                self.command, output.status
            );
            return 0;
        }

        match parse_token_estimate(&String::from_utf8_lossy(&output.stdout)) {
            Some(tokens) => {
                info!("Estimated total tokens for this batch: {}", tokens);
                tokens
            }
            None => {
                warn!("Token estimator '{}' printed no token count", self.command);
                0
            }
        }
    }
}
