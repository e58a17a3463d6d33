//! Python code execution tool
//!
//! Every call runs in a fresh interpreter process. A small driver script
//! applies the address-space ceiling, executes the code with stdout captured,
//! and prints either the captured output or `repr()` of the raised exception.
//! Whatever happens, the tool answers with text.

use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use cloud_agent_core::safety::{MODIFIED_RESOURCE_NAME, MODIFIES_RESOURCE};
use cloud_agent_core::{ParameterSchema, Tool, ToolDescriptor};
use regex::Regex;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

pub const TOOL_NAME: &str = "run_python_code";

const DRIVER: &str = r#"
import contextlib, io, sys
try:
    import resource
    limit = int(sys.argv[1])
    if limit > 0:
        resource.setrlimit(resource.RLIMIT_AS, (limit, limit))
except Exception:
    pass
code = sys.stdin.read()
buffer = io.StringIO()
try:
    with contextlib.redirect_stdout(buffer):
        exec(code, {"__name__": "__main__"})
    result = buffer.getvalue()
except Exception as e:
    result = repr(e)
sys.stdout.write(result)
sys.stdout.flush()
"#;

static LEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s|`)*(?i:python)?\s*").expect("valid leading pattern"));
static TRAILING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\s|`)*$").expect("valid trailing pattern"));

/// Worker limits
#[derive(Clone, Debug)]
pub struct PythonConfig {
    /// Interpreter executable
    pub interpreter: String,

    /// Wall-clock limit per call
    pub timeout: Duration,

    /// Address-space ceiling; 0 disables it
    pub memory_limit_bytes: u64,

    /// Captured output beyond this is dropped
    pub max_output_bytes: usize,
}

impl Default for PythonConfig {
    fn default() -> Self {
        Self {
            interpreter: "python3".into(),
            timeout: Duration::from_secs(30),
            memory_limit_bytes: 512 * 1024 * 1024,
            max_output_bytes: 64 * 1024,
        }
    }
}

/// Strip markdown fences, a leading `python` tag and surrounding whitespace
pub fn sanitize_input(query: &str) -> String {
    let query = LEADING.replace(query, "");
    TRAILING.replace(&query, "").into_owned()
}

/// Runs Python code and returns what it printed
#[derive(Clone, Debug, Default)]
pub struct RunPythonCode {
    config: PythonConfig,
}

impl RunPythonCode {
    pub const fn new(config: PythonConfig) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> &PythonConfig {
        &self.config
    }

    async fn execute(&self, code: &str) -> String {
        let spawned = Command::new(&self.config.interpreter)
            .arg("-c")
            .arg(DRIVER)
            .arg(self.config.memory_limit_bytes.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(interpreter = %self.config.interpreter, "Failed to start interpreter: {}", e);
                return format!(
                    "Failed to start Python interpreter '{}': {e}",
                    self.config.interpreter
                );
            }
        };

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(code.as_bytes()).await {
                tracing::warn!("Failed to send code to interpreter: {}", e);
                return format!("Failed to send code to the interpreter: {e}");
            }
        }

        let limit = self.config.max_output_bytes;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let finished = tokio::time::timeout(self.config.timeout, async {
            tokio::join!(
                read_limited(stdout, limit),
                read_limited(stderr, limit),
                child.wait()
            )
        })
        .await;

        let Ok((stdout, stderr, status)) = finished else {
            let _ = child.start_kill();
            tracing::warn!(timeout_secs = self.config.timeout.as_secs(), "Python execution timed out");
            return format!(
                "Execution timed out after {} seconds",
                self.config.timeout.as_secs()
            );
        };

        match status {
            Ok(status) if status.success() => truncate_output(&stdout, limit),
            Ok(status) => {
                tracing::debug!(%status, "Interpreter exited abnormally");
                let detail = truncate_output(&stderr, limit);
                if detail.trim().is_empty() {
                    format!("Process exited with {status}")
                } else {
                    format!("Process exited with {status}: {}", detail.trim_end())
                }
            }
            Err(e) => format!("Failed to wait for the interpreter: {e}"),
        }
    }
}

/// Read up to `limit + 1` bytes and drain the rest so the child never blocks
async fn read_limited<R: AsyncRead + Unpin>(reader: Option<R>, limit: usize) -> Vec<u8> {
    let mut buffer = Vec::new();
    let Some(mut reader) = reader else {
        return buffer;
    };

    let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
    if let Err(e) = (&mut reader).take(cap).read_to_end(&mut buffer).await {
        tracing::debug!("Failed to read interpreter output: {}", e);
        return buffer;
    }
    let _ = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await;
    buffer
}

/// Cut at `limit` bytes, backing off to a character boundary
fn truncate_output(bytes: &[u8], limit: usize) -> String {
    if bytes.len() <= limit {
        return String::from_utf8_lossy(bytes).into_owned();
    }

    let mut end = limit;
    // continuation bytes look like 0b10xx_xxxx
    while end > 0 && (bytes[end] & 0xC0) == 0x80 {
        end -= 1;
    }

    format!(
        "{}\n... [output truncated at {limit} bytes]",
        String::from_utf8_lossy(&bytes[..end])
    )
}

#[async_trait]
impl Tool for RunPythonCode {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: TOOL_NAME.into(),
            description: "Executes Python code in an isolated REPL environment and returns the \
                          printed output or error message."
                .into(),
            parameters: vec![
                ParameterSchema::string(
                    "command",
                    "A string of Python code to execute in a REPL environment.",
                )
                .required(),
                ParameterSchema::string(
                    MODIFIES_RESOURCE,
                    "Whether the command modifies a cloud resource: \"yes\" if it does, \"no\" \
                     if it does not, \"unknown\" if its effect is unknown.",
                )
                .required()
                .one_of(["yes", "no", "unknown"]),
                ParameterSchema::string(
                    MODIFIED_RESOURCE_NAME,
                    "The name or ID of the resource being modified, e.g. \
                     'i-0abcd1234efgh5678' for an EC2 instance or 'my-s3-bucket' for a bucket.",
                ),
            ],
        }
    }

    async fn call(&self, args: &Value) -> String {
        let Some(command) = args.get("command").and_then(Value::as_str) else {
            return "Error: missing 'command' argument".into();
        };

        let code = sanitize_input(command);
        tracing::debug!(bytes = code.len(), "Running Python code");
        self.execute(&code).await
    }
}
