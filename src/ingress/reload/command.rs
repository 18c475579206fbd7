// ABOUTME: Reloads nginx by running an external command with a deadline.
// ABOUTME: Backs the direct, set-user-id-script, and docker-kill-hup strategies.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use super::Reload;

const TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct CommandReload {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandReload {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
            timeout: TIMEOUT,
        }
    }

    pub fn direct() -> Self {
        Self::new("/usr/local/bin/nginx", &["-s", "reload"])
    }

    pub fn set_user_id_script() -> Self {
        Self::new("nginx-reload", &[])
    }

    pub fn docker_kill_hup(host: &str) -> Self {
        Self::new("docker", &["kill", "--signal", "HUP", host])
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Reload for CommandReload {
    async fn reload(&self) -> Result<(), String> {
        tracing::info!("run {} {}", self.program, self.args.join(" "));

        // The child is not killed on timeout; nginx may still finish the reload.
        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output();

        let output = match tokio::time::timeout(self.timeout, output).await {
            Err(_) => return Err("could not reload nginx in time".to_string()),
            Ok(Err(e)) => {
                tracing::warn!("reload failed: {}", e);
                return Err(format!("reload failed: {e}"));
            }
            Ok(Ok(output)) => output,
        };

        if output.status.success() {
            return Ok(());
        }

        let code = output
            .status
            .code()
            .map_or_else(|| "signal".to_string(), |code| code.to_string());
        let mut message = format!("nginx reload with error {code}");
        for stream in [&output.stdout, &output.stderr] {
            let text = String::from_utf8_lossy(stream);
            let text = text.trim();
            if !text.is_empty() {
                message.push_str(": ");
                message.push_str(text);
            }
        }
        Err(message)
    }
}
