use super::*;

/// Server that completes the handshake and then keeps answering tools/list
/// with an empty set until stdin closes.
fn idle_server(name: &str) -> McpServerConfig {
    let script = concat!(
        r#"read line; printf '%s\n' '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05"}}'; "#,
        r#"read line; "#,
        r#"i=2; while read line; do printf '{"jsonrpc":"2.0","id":%d,"result":{"tools":[]}}\n' "$i"; i=$((i+1)); done"#,
    );
    McpServerConfig {
        name: name.to_string(),
        command: "/bin/sh".to_string(),
        args: vec!["-c".to_string(), script.to_string()],
        env: Default::default(),
        ttl_seconds: None,
    }
}

#[tokio::test]
async fn get_client_reuses_pooled_instance() {
    let pool = McpPool::new(vec![idle_server("fs")]);
    let first = pool.get_client("fs").await.unwrap();
    let second = pool.get_client("fs").await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    pool.close_all().await;
}

#[tokio::test]
async fn unknown_server_is_an_error() {
    let pool = McpPool::new(vec![]);
    let err = pool.get_client("ghost").await.unwrap_err();
    assert!(matches!(err, McpError::UnknownServer(_)));
}

#[tokio::test]
async fn mark_unhealthy_forces_fresh_client() {
    let pool = McpPool::new(vec![idle_server("fs")]);
    let first = pool.get_client("fs").await.unwrap();
    pool.mark_unhealthy("fs").await;
    let second = pool.get_client("fs").await.unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    pool.close_all().await;
}

#[tokio::test]
async fn unhealthy_client_is_replaced_on_get() {
    let pool = McpPool::new(vec![idle_server("fs")]);
    let first = pool.get_client("fs").await.unwrap();
    // Break the connection by shutting the server down behind the pool's back.
    first.shutdown(std::time::Duration::from_secs(2)).await;
    let _ = first.list_tools().await;
    assert!(!first.is_healthy());

    let second = pool.get_client("fs").await.unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert!(second.is_healthy());
    pool.close_all().await;
}

#[tokio::test]
async fn close_all_empties_pool() {
    let pool = McpPool::new(vec![idle_server("a"), idle_server("b")]);
    pool.get_client("a").await.unwrap();
    pool.get_client("b").await.unwrap();
    pool.close_all().await;

    // Clients can be re-created afterwards.
    let fresh = pool.get_client("a").await.unwrap();
    assert!(fresh.is_healthy());
    pool.close_all().await;
}
