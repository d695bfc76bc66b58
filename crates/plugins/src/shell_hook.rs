//! Shell-based hooks that execute external commands.
//!
//! The hook spawns a child process in the declaring plugin's root, passing the
//! merged `{...payload, config}` context as JSON on stdin, and interprets the
//! response:
//!
//! - Exit 0, no stdout → success
//! - Exit 0, stdout JSON `{"action": "exit", "code": N}` → [`HookError::Exit`]
//! - Non-zero exit, spawn failure, or timeout → [`HookError::Failed`]
//!
//! Hook references come in three forms: a `*.md` file with TOML frontmatter,
//! a `*.toml` manifest, or a plain shell command line.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use {
    anyhow::{Context, anyhow},
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
    serde_json::Value,
    tendril_common::hooks::{Hook, HookError, HookRef},
    tendril_config::Dialect,
    tokio::{io::AsyncWriteExt, process::Command},
    tracing::debug,
};

use crate::{dialect, frontmatter};

/// Configuration for a hook declared in a manifest file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookManifest {
    pub command: String,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

fn default_timeout() -> u64 {
    10
}

/// Response format expected from shell hooks on stdout.
#[derive(Debug, Deserialize, Serialize)]
struct ShellHookResponse {
    action: String,
    #[serde(default)]
    code: Option<i32>,
}

/// A hook that executes an external shell command.
pub struct ShellHook {
    hook_name: String,
    command: String,
    cwd: PathBuf,
    timeout: Duration,
    env: HashMap<String, String>,
}

impl ShellHook {
    pub fn new(
        name: impl Into<String>,
        command: impl Into<String>,
        cwd: impl Into<PathBuf>,
        timeout: Duration,
        env: HashMap<String, String>,
    ) -> Self {
        Self {
            hook_name: name.into(),
            command: command.into(),
            cwd: cwd.into(),
            timeout,
            env,
        }
    }

    /// Create from a [`HookManifest`].
    pub fn from_manifest(name: impl Into<String>, cwd: &Path, manifest: &HookManifest) -> Self {
        Self::new(
            name,
            manifest.command.clone(),
            cwd,
            Duration::from_secs(manifest.timeout),
            manifest.env.clone(),
        )
    }

    /// Resolve a hook reference into a runnable hook.
    pub async fn resolve(hook: &HookRef) -> anyhow::Result<Self> {
        let name = hook.to_string();
        let path = hook.root.join(&hook.module);

        match Dialect::from_path(Path::new(&hook.module)) {
            Some(Dialect::Toml) => {
                let content = tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("failed to read hook {}", path.display()))?;
                let manifest: HookManifest = toml::from_str(&content)
                    .with_context(|| format!("failed to parse hook {}", path.display()))?;
                Ok(Self::from_manifest(name, &hook.root, &manifest))
            },
            Some(Dialect::Markdown) => {
                if !dialect::is_registered() {
                    anyhow::bail!(
                        "hook {} is markdown but the markdown dialect is not registered",
                        path.display()
                    );
                }
                let content = tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("failed to read hook {}", path.display()))?;
                let parsed = frontmatter::parse::<HookManifest>(&content, &path)?;
                Ok(Self::from_manifest(name, &hook.root, &parsed.metadata))
            },
            None => Ok(Self::new(
                name,
                hook.module.clone(),
                &hook.root,
                Duration::from_secs(default_timeout()),
                HashMap::new(),
            )),
        }
    }
}

#[async_trait]
impl Hook for ShellHook {
    fn name(&self) -> &str {
        &self.hook_name
    }

    async fn run(&self, context: &Value) -> Result<(), HookError> {
        let context_json =
            serde_json::to_string(context).context("failed to serialize hook context")?;

        debug!(
            hook = %self.hook_name,
            command = %self.command,
            context_len = context_json.len(),
            "spawning shell hook"
        );

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .current_dir(&self.cwd)
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn hook command: {}", self.command))?;

        // Write context to stdin (ignore broken pipe if child doesn't read it).
        if let Some(mut stdin) = child.stdin.take()
            && let Err(e) = stdin.write_all(context_json.as_bytes()).await
            && e.kind() != std::io::ErrorKind::BrokenPipe
        {
            return Err(anyhow!(e).into());
        }

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .with_context(|| {
                format!(
                    "hook '{}' timed out after {:?}",
                    self.hook_name, self.timeout
                )
            })?
            .with_context(|| format!("hook '{}' failed to complete", self.hook_name))?;

        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        debug!(
            hook = %self.hook_name,
            exit_code,
            stdout_len = stdout.len(),
            stderr_len = stderr.len(),
            "shell hook completed"
        );

        if exit_code != 0 {
            return Err(anyhow!(
                "hook '{}' exited with code {}: {}",
                self.hook_name,
                exit_code,
                stderr.trim()
            )
            .into());
        }

        let stdout_trimmed = stdout.trim();
        if stdout_trimmed.is_empty() {
            return Ok(());
        }

        match serde_json::from_str::<ShellHookResponse>(stdout_trimmed) {
            Ok(resp) if resp.action == "exit" => Err(HookError::exit(resp.code.unwrap_or(0))),
            Ok(_) => Ok(()),
            Err(e) => {
                debug!(hook = %self.hook_name, error = %e, "hook stdout is not a response, ignoring");
                Ok(())
            },
        }
    }
}
