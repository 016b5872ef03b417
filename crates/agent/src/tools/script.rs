//! Child-process execution of alert scripts.
//!
//! A script receives `{"configurations": .., "parameters": .., "host_name": ..}`
//! on stdin and prints its verdict on stdout, either as
//! `{"state": "OK", "text": ["..."]}` or as `["OK", ["..."]]`.

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::{ScriptInvocation, ScriptOutput, ScriptRunner};
use crate::{context::Platform, Error, Result};

#[derive(Debug, Clone)]
pub struct ProcessScriptRunner {
    platform: Platform,
    python: String,
}

impl ProcessScriptRunner {
    pub fn for_platform(platform: Platform, python: impl Into<String>) -> Self {
        Self {
            platform,
            python: python.into(),
        }
    }

    /// Pick the interpreter for a script from its extension and the host platform.
    fn command_for(&self, script: &Path) -> Command {
        let extension = script
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match (self.platform, extension.as_deref()) {
            (_, Some("py")) => {
                let mut command = Command::new(&self.python);
                command.arg(script);
                command
            }
            (Platform::Windows, Some("ps1")) => {
                let mut command = Command::new("powershell");
                command
                    .args(["-NoProfile", "-NonInteractive", "-ExecutionPolicy", "Bypass", "-File"])
                    .arg(script);
                command
            }
            (Platform::Windows, Some("cmd")) | (Platform::Windows, Some("bat")) => {
                let mut command = Command::new("cmd");
                command.arg("/C").arg(script);
                command
            }
            (Platform::Windows, _) => Command::new(script),
            (_, Some("sh")) => {
                let mut command = Command::new("/bin/sh");
                command.arg(script);
                command
            }
            _ => Command::new(script),
        }
    }
}

#[async_trait]
impl ScriptRunner for ProcessScriptRunner {
    async fn run(&self, script: &Path, invocation: &ScriptInvocation) -> Result<ScriptOutput> {
        let payload = serde_json::to_vec(invocation)?;

        let mut command = self.command_for(script);
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command
            .spawn()
            .map_err(|e| Error::Script(format!("Unable to start {}: {}", script.display(), e)))?;

        let stdin = child.stdin.take();
        let execution = async move {
            if let Some(mut stdin) = stdin {
                // scripts that never read stdin close the pipe early
                if let Err(e) = stdin.write_all(&payload).await {
                    debug!(error = %e, "script did not consume its input");
                }
            }
            child.wait_with_output().await
        };

        let output = match tokio::time::timeout(invocation.timeout, execution).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(Error::Script(format!(
                    "{} did not complete within {:.1} seconds and was terminated",
                    script.display(),
                    invocation.timeout.as_secs_f64()
                )));
            }
        };

        if !output.status.success() {
            return Err(Error::Script(format!(
                "{} exited with {}: {}",
                script.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_script_output(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Decode a script verdict. Leading log lines are tolerated; the last line
/// that parses wins when the whole output is not a single document.
pub fn parse_script_output(stdout: &str) -> Result<ScriptOutput> {
    let trimmed = stdout.trim();
    if let Some(parsed) = decode(trimmed) {
        return Ok(parsed);
    }

    trimmed
        .lines()
        .rev()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .find_map(decode)
        .ok_or_else(|| {
            Error::Script(format!(
                "Script output is not a (state, [text]) result: '{}'",
                trimmed
            ))
        })
}

fn decode(candidate: &str) -> Option<ScriptOutput> {
    let value: Value = serde_json::from_str(candidate).ok()?;
    let (state, text) = match value {
        Value::Object(mut map) => (map.remove("state")?, map.remove("text").unwrap_or(Value::Null)),
        Value::Array(mut items) if !items.is_empty() => {
            let text = if items.len() > 1 { items.remove(1) } else { Value::Null };
            (items.remove(0), text)
        }
        _ => return None,
    };

    let state = state.as_str()?.to_string();
    let text = match text {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    };

    Some(ScriptOutput { state, text })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::{BTreeMap, HashMap};
    use std::time::Duration;

    fn invocation(pairs: &[(&str, &str)], timeout: Duration) -> ScriptInvocation {
        ScriptInvocation {
            configurations: pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect::<HashMap<_, _>>(),
            parameters: BTreeMap::new(),
            host_name: "c6401.ambari.apache.org".to_string(),
            timeout,
        }
    }

    #[test]
    fn test_parse_object_and_tuple_forms() {
        let parsed = parse_script_output(r#"{"state": "WARNING", "text": ["a", 1]}"#).unwrap();
        assert_eq!(parsed.state, "WARNING");
        assert_eq!(parsed.text, vec![json!("a"), json!(1)]);

        let parsed = parse_script_output("starting\n[\"OK\", [\"fine\"]]\n").unwrap();
        assert_eq!(parsed.state, "OK");
        assert_eq!(parsed.text, vec![json!("fine")]);

        let parsed = parse_script_output(r#"["CRITICAL", "down"]"#).unwrap();
        assert_eq!(parsed.text, vec![json!("down")]);
    }

    #[test]
    fn test_parse_garbage_is_an_error() {
        assert!(parse_script_output("no verdict here").is_err());
        assert!(parse_script_output("[]").is_err());
        assert!(parse_script_output(r#"{"text": []}"#).is_err());
    }

    #[test]
    fn test_interpreter_selection() {
        let runner = ProcessScriptRunner::for_platform(Platform::Linux, "python3");
        let command = runner.command_for(Path::new("/tmp/check.py"));
        assert_eq!(command.as_std().get_program(), "python3");

        let command = runner.command_for(Path::new("/tmp/check.sh"));
        assert_eq!(command.as_std().get_program(), "/bin/sh");

        let windows = ProcessScriptRunner::for_platform(Platform::Windows, "python.exe");
        let command = windows.command_for(Path::new("C:/scripts/check.ps1"));
        assert_eq!(command.as_std().get_program(), "powershell");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_shell_script_sees_configurations() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("check.sh");
        std::fs::write(
            &script,
            r#"input=$(cat)
case "$input" in
  *'"foo-site/skip":"true"'*) echo '["SKIPPED", []]' ;;
  *) echo '{"state": "OK", "text": ["all good"]}' ;;
esac
"#,
        )
        .unwrap();

        let runner = ProcessScriptRunner::for_platform(Platform::Linux, "python3");

        let output = runner
            .run(&script, &invocation(&[("foo-site/bar", "x")], Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(output.state, "OK");
        assert_eq!(output.text, vec![json!("all good")]);

        let output = runner
            .run(&script, &invocation(&[("foo-site/skip", "true")], Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(output.state, "SKIPPED");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_reports_non_zero_exit() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fail.sh");
        std::fs::write(&script, "echo broken >&2\nexit 3\n").unwrap();

        let runner = ProcessScriptRunner::for_platform(Platform::Linux, "python3");
        let err = runner
            .run(&script, &invocation(&[], Duration::from_secs(5)))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("broken"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_enforces_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("hang.sh");
        std::fs::write(&script, "sleep 10\n").unwrap();

        let runner = ProcessScriptRunner::for_platform(Platform::Linux, "python3");
        let err = runner
            .run(&script, &invocation(&[], Duration::from_millis(200)))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("did not complete"));
    }
}
