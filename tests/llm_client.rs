use chat_with_sql::{ChatCompletion, ChatSqlError, GenerationParameters, LlmAuth, LlmClient, LlmConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Raw request captured by the responder
struct CapturedRequest {
    head: String,
    body: serde_json::Value,
}

/// Serve exactly one HTTP response on a local port
async fn serve_once(status: &'static str, body: String) -> (String, oneshot::Receiver<CapturedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/chat/completions", listener.local_addr().unwrap());
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();

        let mut buffer = Vec::new();
        let mut chunk = [0u8; 4096];
        let header_end = loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break buffer.len();
            }
            buffer.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
        let content_length = head
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);

        while buffer.len() < header_end + content_length {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buffer.extend_from_slice(&chunk[..n]);
        }

        let request_body = buffer
            .get(header_end..header_end + content_length)
            .and_then(|raw| serde_json::from_slice(raw).ok())
            .unwrap_or(serde_json::Value::Null);

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.shutdown().await.ok();

        let _ = tx.send(CapturedRequest {
            head,
            body: request_body,
        });
    });

    (url, rx)
}

#[tokio::test]
async fn test_send_request_round_trip() {
    let reply = serde_json::json!({
        "choices": [{
            "message": {"role": "assistant", "content": "SELECT product_name FROM products;"},
            "finish_reason": "stop"
        }]
    });
    let (url, captured) = serve_once("200 OK", reply.to_string()).await;

    let client = LlmClient::new(LlmConfig::new(url, "test-key"));
    let parameters = GenerationParameters {
        temperature: 0.0,
        top_p: 0.95,
        max_tokens: 2000,
    };

    let content = client
        .send_request("list products using Postgres.", "You are a data engineer assistant.", &parameters)
        .await
        .unwrap();
    assert_eq!(content, "SELECT product_name FROM products;");

    let request = captured.await.unwrap();
    let head = request.head.to_lowercase();
    assert!(head.starts_with("post /chat/completions"));
    assert!(head.contains("api-key: test-key"));
    assert_eq!(request.body["messages"][0]["role"], "system");
    assert_eq!(request.body["messages"][1]["content"], "list products using Postgres.");
    assert_eq!(request.body["max_tokens"], 2000);
}

#[tokio::test]
async fn test_bearer_auth() {
    let reply = serde_json::json!({"choices": [{"message": {"content": "ok"}}]});
    let (url, captured) = serve_once("200 OK", reply.to_string()).await;

    let mut config = LlmConfig::new(url, "test-key");
    config.auth = LlmAuth::Bearer;
    config.model = Some("gpt-4o".to_string());
    let client = LlmClient::new(config);

    client
        .send_request("x", "y", &GenerationParameters::default())
        .await
        .unwrap();

    let request = captured.await.unwrap();
    assert!(request.head.to_lowercase().contains("authorization: bearer test-key"));
    assert_eq!(request.body["model"], "gpt-4o");
}

#[tokio::test]
async fn test_http_error_is_reported() {
    let (url, _captured) =
        serve_once("429 Too Many Requests", r#"{"error":"slow down"}"#.to_string()).await;
    let client = LlmClient::new(LlmConfig::new(url, "test-key"));

    match client
        .send_request("x", "y", &GenerationParameters::default())
        .await
    {
        Err(ChatSqlError::Llm(message)) => {
            assert!(message.contains("429"));
            assert!(message.contains("slow down"));
        }
        other => panic!("expected LLM error, got {:?}", other),
    }
}
