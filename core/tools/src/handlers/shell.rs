//! Shell execution handler.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use cradle_protocol::JsonSchema;
use cradle_protocol::LocalShellAction;
use cradle_protocol::ToolKind;
use cradle_protocol::ToolOutput;
use cradle_protocol::ToolPayload;
use cradle_protocol::ToolSpec;
use cradle_shell::ExecParams;

use crate::error::Result;
use crate::error::ToolError;
use crate::format::ExecSummary;
use crate::format::format_exec_output;
use crate::handler::ToolHandler;
use crate::handler::ToolInvocation;

/// Hard ceiling on handler-supplied timeouts (10 minutes).
const MAX_TIMEOUT_MS: u64 = 600_000;

/// Tool spec shown to the model.
pub fn spec() -> ToolSpec {
    let mut properties = std::collections::BTreeMap::new();
    properties.insert(
        "command".to_string(),
        JsonSchema::string("The shell command to execute, as a string or argv array"),
    );
    properties.insert(
        "cwd".to_string(),
        JsonSchema::string("Optional working directory for the command"),
    );
    properties.insert(
        "timeout_ms".to_string(),
        JsonSchema::number("Optional timeout in milliseconds (max 600000)"),
    );
    properties.insert(
        "with_escalated_permissions".to_string(),
        JsonSchema::boolean("Request to run outside the sandbox restrictions"),
    );
    properties.insert(
        "is_background".to_string(),
        JsonSchema::boolean("Run the command detached, streaming output to log files"),
    );
    ToolSpec::new(
        "run_terminal_cmd",
        "Execute a shell command and return its output with exit code and duration. \
         Background mode dispatches the process and returns a job descriptor immediately.",
        JsonSchema::Object {
            properties,
            required: Some(vec!["command".to_string()]),
            additional_properties: Some(false),
        },
    )
}

/// Command argument: a full line or an argv vector.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CommandArg {
    Line(String),
    Argv(Vec<String>),
}

impl CommandArg {
    fn to_command_line(&self) -> String {
        match self {
            CommandArg::Line(line) => line.clone(),
            CommandArg::Argv(argv) => argv
                .iter()
                .map(|arg| shell_quote(arg))
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ShellInput {
    command: CommandArg,
    #[serde(default)]
    cwd: Option<String>,
    #[serde(default)]
    env: BTreeMap<String, String>,
    #[serde(default)]
    timeout_ms: Option<u64>,
    #[serde(default)]
    with_escalated_permissions: bool,
    #[serde(default)]
    is_background: bool,
}

/// Runs shell commands through the turn's executor.
#[derive(Debug, Default)]
pub struct ShellHandler;

#[async_trait]
impl ToolHandler for ShellHandler {
    fn kind(&self) -> ToolKind {
        ToolKind::UnifiedExec
    }

    fn matches_kind(&self, payload: &ToolPayload) -> bool {
        matches!(
            payload,
            ToolPayload::Function { .. }
                | ToolPayload::UnifiedExec { .. }
                | ToolPayload::LocalShell { .. }
        )
    }

    async fn handle(&self, invocation: ToolInvocation) -> Result<ToolOutput> {
        let input = decode_input(&invocation)?;
        let command_line = input.command.to_command_line();
        let turn = &invocation.turn;

        if input.with_escalated_permissions && turn.policy.refuses_escalation() {
            return Err(ToolError::permission(
                "escalated permissions rejected by approval policy: reject",
            ));
        }

        turn.policy.check_command(&command_line)?;

        if turn
            .policy
            .approval_needed(true, input.with_escalated_permissions)
        {
            let approved = turn
                .approvals
                .request_approval(&invocation.tool_name, &command_line)
                .await;
            if !approved {
                return Err(ToolError::permission("denied by user"));
            }
        }

        let cwd = input
            .cwd
            .as_deref()
            .map(|dir| turn.resolve_path(dir))
            .unwrap_or_else(|| turn.cwd.clone());

        if input.is_background {
            let job = turn
                .background
                .spawn(
                    &command_line,
                    "/bin/sh",
                    &cwd,
                    &input.env,
                    &turn.log_dir,
                )
                .map_err(|err| ToolError::system(format!("failed to spawn background job: {err}")))?;
            let formatted = format_exec_output(&ExecSummary {
                exit_code: 0,
                duration: Duration::ZERO,
                output: job.describe(),
                timed_out: false,
            });
            return Ok(ToolOutput::Function {
                content: formatted.content,
                success: true,
                metadata: Some(json!({"job_id": job.job_id, "truncated": formatted.truncated})),
            });
        }

        let requested = input
            .timeout_ms
            .map(|ms| Duration::from_millis(ms.min(MAX_TIMEOUT_MS)));
        let timeout = turn.policy.cap_timeout(requested);

        let mut params = ExecParams::new(&command_line).with_cwd(cwd);
        params.env = input.env.clone();
        if let Some(timeout) = timeout {
            params.timeout = Some(timeout);
        }

        // Dropping the execute future on cancellation kills the process
        // group via the executor's child guard.
        let result = tokio::select! {
            biased;
            _ = invocation.cancel.cancelled() => return Err(ToolError::Cancelled),
            executed = turn.shell.execute(params) => {
                executed.map_err(|err| ToolError::system(format!("failed to spawn command: {err}")))?
            }
        };

        let formatted = format_exec_output(&ExecSummary {
            exit_code: result.exit_code,
            duration: result.duration,
            output: result.combined_output(),
            timed_out: result.timed_out,
        });
        Ok(ToolOutput::Function {
            content: formatted.content,
            success: true,
            metadata: Some(json!({
                "exit_code": result.exit_code,
                "timed_out": result.timed_out,
                "truncated": formatted.truncated,
            })),
        })
    }
}

fn decode_input(invocation: &ToolInvocation) -> Result<ShellInput> {
    if let ToolPayload::LocalShell { action } = &invocation.payload {
        let LocalShellAction::Exec {
            command,
            working_directory,
            timeout_ms,
        } = action;
        return Ok(ShellInput {
            command: CommandArg::Argv(command.clone()),
            cwd: working_directory.clone(),
            env: BTreeMap::new(),
            timeout_ms: *timeout_ms,
            with_escalated_permissions: false,
            is_background: false,
        });
    }

    let raw = invocation
        .raw_arguments()
        .ok_or_else(|| ToolError::validation("shell call carries no arguments"))?;
    Ok(serde_json::from_str(raw)?)
}

/// Quote one argv element for `sh -c`.
fn shell_quote(arg: &str) -> String {
    if !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:".contains(c))
    {
        return arg.to_string();
    }
    format!("'{}'", arg.replace('\'', r"'\''"))
}

#[cfg(test)]
#[path = "shell.test.rs"]
mod tests;
