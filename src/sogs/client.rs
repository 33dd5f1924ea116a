//! reqwest-backed community server client

use super::traits::*;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct HttpSogsClient {
    base: Url,
    client: Client,
}

impl HttpSogsClient {
    pub fn new(base: &Url) -> SogsResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SogsError::Network(e.to_string()))?;

        Ok(Self {
            base: base.clone(),
            client,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Join an absolute API path onto the base URL, keeping any base path prefix.
    fn endpoint(&self, path: &str) -> SogsResult<Url> {
        let joined = format!("{}{}", self.base.as_str().trim_end_matches('/'), path);
        Url::parse(&joined).map_err(|e| SogsError::Protocol(format!("bad URL '{}': {}", joined, e)))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> SogsResult<T> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SogsError::Network(e.to_string()))?;

        parse_json(response, SogsError::Network).await
    }
}

/// Map non-success statuses to `err` and parse the body as `T`.
///
/// A body that cannot be read or decoded is reported through `err` too:
/// proxies and restarting servers answer 200 with HTML often enough that it
/// has to be treated like any other transport failure.
async fn parse_json<T: DeserializeOwned>(
    response: Response,
    err: fn(String) -> SogsError,
) -> SogsResult<T> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(err(format!("HTTP status {}: {}", status, text)));
    }

    let body = response.bytes().await.map_err(|e| err(e.to_string()))?;
    serde_json::from_slice(&body)
        .map_err(|e| err(format!("undecodable response body: {}", e)))
}

#[async_trait]
impl SogsClient for HttpSogsClient {
    async fn room_info(&self, room: &str) -> SogsResult<RoomInfo> {
        let url = self.endpoint(&room_path(room))?;
        self.get_json(url).await
    }

    async fn messages_since(
        &self,
        room: &str,
        since: i64,
        limit: u32,
    ) -> SogsResult<Vec<RoomMessage>> {
        let mut url = self.endpoint(&messages_since_path(room, since))?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string());
        self.get_json(url).await
    }

    async fn post_message(&self, request: &SignedRequest) -> SogsResult<PostedMessage> {
        let url = self.endpoint(&request.path)?;
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|e| SogsError::Send(e.to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in request.headers.pairs() {
            let name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| SogsError::Send(e.to_string()))?;
            let value = HeaderValue::from_str(value).map_err(|e| SogsError::Send(e.to_string()))?;
            headers.insert(name, value);
        }

        let response = self
            .client
            .request(method, url)
            .headers(headers)
            .body(request.body.clone())
            .send()
            .await
            .map_err(|e| SogsError::Send(e.to_string()))?;

        parse_json(response, SogsError::Send).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sogs::auth::AuthHeaders;

    #[test]
    fn test_endpoint_join() {
        let client = HttpSogsClient::new(&Url::parse("http://localhost:3000").unwrap()).unwrap();
        assert_eq!(
            client.endpoint("/room/r").unwrap().as_str(),
            "http://localhost:3000/room/r"
        );
    }

    #[test]
    fn test_endpoint_keeps_base_prefix() {
        let client =
            HttpSogsClient::new(&Url::parse("https://example.org/sogs/").unwrap()).unwrap();
        assert_eq!(
            client.endpoint("/room/r/message").unwrap().as_str(),
            "https://example.org/sogs/room/r/message"
        );
    }

    /// Serve `response` verbatim to every connection on a local port.
    async fn canned_server(response: &'static str) -> Url {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        Url::parse(&format!("http://{}", addr)).unwrap()
    }

    const HTML_OK: &str = "HTTP/1.1 200 OK\r\n\
        Content-Type: text/html\r\n\
        Content-Length: 25\r\n\
        Connection: close\r\n\r\n\
        <html>proxy hiccup</html>";

    #[tokio::test]
    async fn test_html_body_on_fetch_is_network_error() {
        let client = HttpSogsClient::new(&canned_server(HTML_OK).await).unwrap();

        let result = client.messages_since("room", 0, 10).await;
        assert!(matches!(result, Err(SogsError::Network(_))), "{:?}", result);

        let result = client.room_info("room").await;
        assert!(matches!(result, Err(SogsError::Network(_))), "{:?}", result);
    }

    #[tokio::test]
    async fn test_html_body_on_post_is_send_error() {
        let client = HttpSogsClient::new(&canned_server(HTML_OK).await).unwrap();
        let request = SignedRequest {
            method: "POST".into(),
            path: "/room/room/message".into(),
            body: b"{}".to_vec(),
            headers: AuthHeaders {
                pubkey: "00".repeat(33),
                timestamp: "1".into(),
                nonce: "AAAAAAAAAAAAAAAAAAAAAA==".into(),
                signature: "sig".into(),
            },
        };

        let result = client.post_message(&request).await;
        assert!(matches!(result, Err(SogsError::Send(_))), "{:?}", result);
    }

    #[tokio::test]
    async fn test_json_body_decodes() {
        const JSON_OK: &str = "HTTP/1.1 200 OK\r\n\
            Content-Type: application/json\r\n\
            Content-Length: 2\r\n\
            Connection: close\r\n\r\n\
            []";
        let client = HttpSogsClient::new(&canned_server(JSON_OK).await).unwrap();
        let messages = client.messages_since("room", 0, 10).await.unwrap();
        assert!(messages.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        let client = HttpSogsClient::new(&Url::parse("http://127.0.0.1:9").unwrap()).unwrap();
        let result = client.room_info("room").await;
        assert!(matches!(result, Err(SogsError::Network(_))));
    }
}
