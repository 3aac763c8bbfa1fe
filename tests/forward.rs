// Forwarding client against a mock upstream node

use mockito::{Matcher, Server};
use rpc_relay::{
    ForwardError, Forwarder, Id, JsonRpcRequest, UpstreamClient, SERVER_ERROR,
};
use serde_json::json;
use std::time::Duration;
use url::Url;

fn client_for(server: &Server) -> UpstreamClient {
    let url = Url::parse(&server.url()).unwrap();
    UpstreamClient::new(url, Duration::from_secs(5)).unwrap()
}

fn block_number(id: u64) -> JsonRpcRequest {
    JsonRpcRequest::new("eth_blockNumber", json!([]), id)
}

#[tokio::test]
async fn success_is_passed_through() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(json!({
            "jsonrpc": "2.0",
            "method": "eth_blockNumber",
            "params": [],
            "id": 1
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"jsonrpc":"2.0","result":"0x123","id":1}"#)
        .create_async()
        .await;

    let resp = client_for(&server).forward_one(&block_number(1)).await.unwrap();

    mock.assert_async().await;
    assert_eq!(resp.result, Some(json!("0x123")));
    assert!(resp.error.is_none());
    assert_eq!(resp.id, Id::from(1u64));
}

#[tokio::test]
async fn upstream_rpc_error_is_passed_through() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/")
        .with_status(200)
        .with_body(r#"{"jsonrpc":"2.0","error":{"code":-32601,"message":"the method eth_foo does not exist","data":{"hint":1}},"id":"x"}"#)
        .create_async()
        .await;

    let req = JsonRpcRequest::new("eth_foo", json!([]), "x");
    let resp = client_for(&server).forward_one(&req).await.unwrap();

    let error = resp.error.unwrap();
    assert_eq!(error.code, -32601);
    assert_eq!(error.data, Some(json!({"hint": 1})));
    assert_eq!(resp.id, Id::from("x"));
}

#[tokio::test]
async fn http_500_is_a_generic_server_error() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/")
        .with_status(500)
        .with_body("boom")
        .create_async()
        .await;

    let resp = client_for(&server).forward_one(&block_number(5)).await.unwrap();

    let error = resp.error.unwrap();
    assert_eq!(error.code, SERVER_ERROR);
    assert_eq!(error.message, "upstream error");
    assert!(resp.result.is_none());
    assert_eq!(resp.id, Id::from(5u64));
}

#[tokio::test]
async fn timeout_statuses_get_timeout_message() {
    for status in [408, 504] {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(status)
            .create_async()
            .await;

        let resp = client_for(&server).forward_one(&block_number(6)).await.unwrap();

        let error = resp.error.unwrap();
        assert_eq!(error.code, SERVER_ERROR);
        assert_eq!(error.message, "upstream timeout", "status {status}");
    }
}

#[tokio::test]
async fn other_2xx_statuses_are_server_errors() {
    for status in [202, 204] {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(status)
            .with_body(if status == 204 {
                ""
            } else {
                r#"{"jsonrpc":"2.0","result":"0x1","id":9}"#
            })
            .create_async()
            .await;

        let resp = client_for(&server).forward_one(&block_number(9)).await.unwrap();

        assert_eq!(resp.error_code(), Some(SERVER_ERROR), "status {status}");
        assert_eq!(resp.error.unwrap().message, "upstream error");
        assert!(resp.result.is_none());
        assert_eq!(resp.id, Id::from(9u64));
    }
}

#[tokio::test]
async fn malformed_body_is_a_hard_failure() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/")
        .with_status(200)
        .with_body("<html>not json</html>")
        .create_async()
        .await;

    let result = client_for(&server).forward_one(&block_number(7)).await;

    assert!(matches!(result, Err(ForwardError::Decode(_))));
}

#[tokio::test]
async fn unreachable_upstream_is_a_hard_failure() {
    let url = Url::parse("http://127.0.0.1:1").unwrap();
    let client = UpstreamClient::new(url, Duration::from_secs(2)).unwrap();

    let result = client.forward_one(&block_number(8)).await;

    assert!(matches!(
        result,
        Err(ForwardError::Transport(_)) | Err(ForwardError::Timeout(_))
    ));
}

#[tokio::test]
async fn batch_is_sent_as_array_and_returned_in_order() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .match_body(Matcher::Json(json!([
            {"jsonrpc": "2.0", "method": "eth_blockNumber", "params": [], "id": 1},
            {"jsonrpc": "2.0", "method": "eth_chainId", "params": [], "id": "b"}
        ])))
        .with_status(200)
        .with_body(r#"[{"jsonrpc":"2.0","result":"0x10","id":1},{"jsonrpc":"2.0","result":"0x1","id":"b"}]"#)
        .create_async()
        .await;

    let batch = vec![
        block_number(1),
        JsonRpcRequest::new("eth_chainId", json!([]), "b"),
    ];
    let resps = client_for(&server).forward_batch(&batch).await.unwrap();

    mock.assert_async().await;
    assert_eq!(resps.len(), 2);
    assert_eq!(resps[0].id, Id::from(1u64));
    assert_eq!(resps[0].result, Some(json!("0x10")));
    assert_eq!(resps[1].id, Id::from("b"));
}

#[tokio::test]
async fn batch_non_200_status_is_a_hard_failure() {
    for status in [500, 504, 202] {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(status)
            .with_body(r#"[{"jsonrpc":"2.0","result":"0x1","id":1}]"#)
            .create_async()
            .await;

        let batch = vec![block_number(1), block_number(2)];
        let result = client_for(&server).forward_batch(&batch).await;

        assert!(
            matches!(result, Err(ForwardError::Status(code)) if code.as_u16() == status as u16),
            "status {status}"
        );
    }
}

#[tokio::test]
async fn batch_object_body_is_a_hard_failure() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/")
        .with_status(200)
        .with_body(r#"{"jsonrpc":"2.0","error":{"code":-32600,"message":"batch disabled"},"id":null}"#)
        .create_async()
        .await;

    let result = client_for(&server).forward_batch(&[block_number(1)]).await;

    assert!(matches!(result, Err(ForwardError::Decode(_))));
}
