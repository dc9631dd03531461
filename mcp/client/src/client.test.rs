use std::time::Duration;

use super::*;

/// Build a config that runs a canned stdio server through /bin/sh.
///
/// The fake server answers the fixed request sequence the client issues:
/// initialize (id 1), the initialized notification, then one request per
/// extra response line supplied.
fn canned_server(extra_responses: &[&str]) -> McpServerConfig {
    let mut script = String::new();
    script.push_str(
        r#"read line; printf '%s\n' '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05"}}'; read line; "#,
    );
    for response in extra_responses {
        script.push_str(&format!("read line; printf '%s\\n' '{response}'; "));
    }
    McpServerConfig {
        name: "fake".to_string(),
        command: "/bin/sh".to_string(),
        args: vec!["-c".to_string(), script],
        env: Default::default(),
        ttl_seconds: None,
    }
}

#[tokio::test]
async fn handshake_and_list_tools() {
    let config = canned_server(&[
        r#"{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"echo","description":"Echo text","inputSchema":{"type":"object","properties":{}}}]}}"#,
    ]);
    let client = McpClient::connect(&config).await.unwrap();
    assert!(client.is_healthy());

    let tools = client.list_tools().await.unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "echo");
    assert_eq!(tools[0].description.as_deref(), Some("Echo text"));

    client.shutdown(Duration::from_secs(2)).await;
}

#[tokio::test]
async fn call_tool_maps_result() {
    let config = canned_server(&[
        r#"{"jsonrpc":"2.0","id":2,"result":{"content":[{"type":"text","text":"hi there"}],"isError":false}}"#,
    ]);
    let client = McpClient::connect(&config).await.unwrap();

    let result = client
        .call_tool("echo", serde_json::json!({"text": "hi there"}))
        .await
        .unwrap();
    assert!(!result.is_error);
    assert_eq!(result.rendered_text(), "hi there");

    client.shutdown(Duration::from_secs(2)).await;
}

#[tokio::test]
async fn server_error_is_not_transient() {
    let config = canned_server(&[
        r#"{"jsonrpc":"2.0","id":2,"error":{"code":-32601,"message":"no such tool"}}"#,
    ]);
    let client = McpClient::connect(&config).await.unwrap();

    let err = client
        .call_tool("missing", serde_json::json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, McpError::Server { code: -32601, .. }));
    assert!(!err.is_transient());
    // A server-level error does not poison the connection.
    assert!(client.is_healthy());

    client.shutdown(Duration::from_secs(2)).await;
}

#[tokio::test]
async fn closed_pipe_is_transient_and_unhealthy() {
    // Server exits right after the handshake; the next request hits EOF.
    let config = canned_server(&[]);
    let client = McpClient::connect(&config).await.unwrap();

    let err = client.list_tools().await.unwrap_err();
    assert!(err.is_transient());
    assert!(!client.is_healthy());
}

#[tokio::test]
async fn spawn_failure_is_reported() {
    let config = McpServerConfig {
        name: "ghost".to_string(),
        command: "/nonexistent/command".to_string(),
        args: vec![],
        env: Default::default(),
        ttl_seconds: None,
    };
    let err = McpClient::connect(&config).await.unwrap_err();
    assert!(matches!(err, McpError::Spawn { .. }));
}
