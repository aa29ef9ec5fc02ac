//! Text generator boundary and the subprocess-backed implementation.

use async_trait::async_trait;
use fieldplan_core::{config::PlannerConfig, error::PlanError};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Black-box producer of planning text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn name(&self) -> &str;

    /// Complete `prompt` under the `system` instruction.
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, PlanError>;
}

/// Runs an external program once per prompt and returns its stdout.
///
/// `{system}` and `{prompt}` in the configured args are substituted. When no
/// arg carries `{prompt}`, the system text and prompt are written to stdin.
pub struct CommandGenerator {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandGenerator {
    pub fn new(program: &str, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.to_string(),
            args,
            timeout,
        }
    }

    /// `None` when no command is configured.
    pub fn from_config(config: &PlannerConfig) -> Option<Self> {
        let program = config.command.trim();
        if program.is_empty() {
            return None;
        }
        Some(Self::new(
            program,
            config.args.clone(),
            Duration::from_secs(config.timeout_secs.max(1)),
        ))
    }

    fn uses_stdin(&self) -> bool {
        !self.args.iter().any(|a| a.contains("{prompt}"))
    }

    pub(crate) fn build_args(&self, system: &str, prompt: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.replace("{system}", system).replace("{prompt}", prompt))
            .collect()
    }
}

#[async_trait]
impl TextGenerator for CommandGenerator {
    fn name(&self) -> &str {
        &self.program
    }

    async fn complete(&self, system: &str, prompt: &str) -> Result<String, PlanError> {
        let label = self.program.as_str();
        let stdin_payload = self.uses_stdin().then(|| format!("{system}\n\n{prompt}"));

        let mut cmd = Command::new(&self.program);
        cmd.args(self.build_args(system, prompt))
            .stdin(if stdin_payload.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("executing generator: {label} ({} args)", self.args.len());

        let run = async {
            let mut child = cmd
                .spawn()
                .map_err(|e| PlanError::Generator(format!("failed to run {label}: {e}")))?;
            if let (Some(payload), Some(mut stdin)) = (stdin_payload, child.stdin.take()) {
                stdin
                    .write_all(payload.as_bytes())
                    .await
                    .map_err(|e| PlanError::Generator(format!("{label} stdin: {e}")))?;
            }
            child
                .wait_with_output()
                .await
                .map_err(|e| PlanError::Generator(format!("failed to wait for {label}: {e}")))
        };

        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| {
                PlanError::Generator(format!(
                    "{label} timed out after {}s",
                    self.timeout.as_secs()
                ))
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PlanError::Generator(format!(
                "{label} exited with {}: {stderr}",
                output.status
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_disabled_when_empty() {
        assert!(CommandGenerator::from_config(&PlannerConfig::default()).is_none());

        let config = PlannerConfig {
            command: "planner-cli".into(),
            ..PlannerConfig::default()
        };
        let generator = CommandGenerator::from_config(&config).unwrap();
        assert_eq!(generator.name(), "planner-cli");
        assert_eq!(generator.timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_build_args_substitutes() {
        let generator = CommandGenerator::new(
            "llm",
            vec!["--system".into(), "{system}".into(), "-p".into(), "{prompt}".into()],
            Duration::from_secs(5),
        );
        assert!(!generator.uses_stdin());
        assert_eq!(
            generator.build_args("농업 전문가", "작물: 토마토"),
            vec!["--system", "농업 전문가", "-p", "작물: 토마토"]
        );
    }

    #[tokio::test]
    async fn test_stdin_round_trip() {
        let generator = CommandGenerator::new("cat", vec![], Duration::from_secs(5));
        let out = generator.complete("system", "[\"관수\"]").await.unwrap();
        assert!(out.starts_with("system"));
        assert!(out.ends_with("[\"관수\"]"));
    }

    #[tokio::test]
    async fn test_failing_program_is_generator_error() {
        let generator = CommandGenerator::new("false", vec![], Duration::from_secs(5));
        let err = generator.complete("s", "p").await.unwrap_err();
        assert!(matches!(err, PlanError::Generator(_)));
    }

    #[tokio::test]
    async fn test_missing_program_is_generator_error() {
        let generator =
            CommandGenerator::new("/nonexistent/fieldplan-gen", vec![], Duration::from_secs(5));
        assert!(generator.complete("s", "p").await.is_err());
    }
}
