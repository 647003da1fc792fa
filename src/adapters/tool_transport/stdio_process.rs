//! A single stdio subprocess tool server: one JSON request per line in,
//! one JSON response per line out (§6.2, §6.3's framing reused for the
//! subprocess side of the wire).

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

use crate::ports::ToolTransportError;

pub struct StdioProcess {
    #[allow(dead_code)]
    child: Child,
    stdin: Mutex<ChildStdin>,
    stdout: Mutex<BufReader<ChildStdout>>,
}

impl StdioProcess {
    /// Spawns `command` (split on whitespace: first token is the program,
    /// the rest are arguments) with piped stdin/stdout.
    pub fn spawn(command: &str) -> Result<Self, ToolTransportError> {
        let mut parts = command.split_whitespace();
        let program = parts.next().ok_or_else(|| ToolTransportError::Transport("empty stdio command".to_string()))?;

        let mut child = Command::new(program)
            .args(parts)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(|e| ToolTransportError::Transport(format!("failed to spawn '{command}': {e}")))?;

        let stdin = child.stdin.take().ok_or_else(|| ToolTransportError::Transport("child has no stdin".to_string()))?;
        let stdout = child.stdout.take().ok_or_else(|| ToolTransportError::Transport("child has no stdout".to_string()))?;

        Ok(Self { child, stdin: Mutex::new(stdin), stdout: Mutex::new(BufReader::new(stdout)) })
    }

    /// Writes `request` as one line of JSON, reads back one line of JSON.
    /// Serialized by the two mutexes: concurrent callers queue rather than
    /// interleave requests on the same pipe.
    pub async fn call(&self, request: &Value) -> Result<Value, ToolTransportError> {
        let mut line = serde_json::to_string(request).map_err(|e| ToolTransportError::Transport(format!("failed to serialize request: {e}")))?;
        line.push('\n');

        {
            let mut stdin = self.stdin.lock().await;
            stdin.write_all(line.as_bytes()).await.map_err(|e| ToolTransportError::Transport(format!("write failed: {e}")))?;
            stdin.flush().await.map_err(|e| ToolTransportError::Transport(format!("flush failed: {e}")))?;
        }

        let mut response_line = String::new();
        {
            let mut stdout = self.stdout.lock().await;
            let bytes_read = stdout.read_line(&mut response_line).await.map_err(|e| ToolTransportError::Transport(format!("read failed: {e}")))?;
            if bytes_read == 0 {
                return Err(ToolTransportError::ServerUnavailable("subprocess closed stdout".to_string()));
            }
        }

        serde_json::from_str(response_line.trim()).map_err(|e| ToolTransportError::Transport(format!("malformed response line: {e}")))
    }
}
