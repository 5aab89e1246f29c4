//! Shared helpers for unit tests

use ethers::{
    providers::{Middleware, MockProvider, Provider},
    types::{Bytes, U64},
};
use serde_json::Value;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};

/// ABI-encoded `eth_call` output
pub(crate) fn call_output(tokens: &[ethers::abi::Token]) -> Value {
    serde_json::to_value(Bytes::from(ethers::abi::encode(tokens))).unwrap()
}

/// Queue mocked responses so that the n-th request receives `responses[n]`.
///
/// The queue order of `MockProvider` is an implementation detail, so it is
/// measured with two throwaway requests first.
pub(crate) async fn push_in_call_order(
    provider: &Provider<MockProvider>,
    mock: &MockProvider,
    responses: Vec<Value>,
) {
    mock.push::<U64, _>(U64::from(1)).unwrap();
    mock.push::<U64, _>(U64::from(2)).unwrap();
    let first = provider.get_block_number().await.unwrap();
    provider.get_block_number().await.unwrap();

    let last_in_first_out = first == U64::from(2);
    let ordered: Vec<Value> = if last_in_first_out {
        responses.into_iter().rev().collect()
    } else {
        responses
    };
    for response in ordered {
        mock.push::<Value, _>(response).unwrap();
    }
}

async fn answer(mut socket: TcpStream, body: &str) {
    // read the head, then as much body as announced
    let mut req = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = socket.read(&mut buf).await.unwrap();
        if n == 0 {
            return;
        }
        req.extend_from_slice(&buf[..n]);
        if let Some(end) = req.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&req[..end]).to_ascii_lowercase();
            let len = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|l| l.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if req.len() >= end + 4 + len {
                break;
            }
        }
    }

    let resp = format!(
        "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\n\
         content-length: {}\r\nconnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    socket.write_all(resp.as_bytes()).await.unwrap();
}

/// Answer every request with `body`. Returns the base URL
pub(crate) async fn serve(body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::spawn(answer(socket, body));
        }
    });
    format!("http://{}/", addr)
}
