//! Local HTTP callback server for OAuth redirects.

use std::net::TcpListener;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

use crate::config::OAuthConfig;

/// Result of the OAuth callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackResult {
    /// Authorization code from the callback
    pub code: String,
    /// State parameter (should match the one sent)
    pub state: String,
}

#[derive(Debug, PartialEq, Eq)]
enum Callback {
    Code(CallbackResult),
    Denied(String),
}

/// Local HTTP server that listens for OAuth callbacks.
#[derive(Debug)]
pub struct CallbackServer {
    port: u16,
    listener: TcpListener,
}

impl CallbackServer {
    /// Try to start a callback server on an available port.
    pub fn start(config: &OAuthConfig) -> Result<Self, std::io::Error> {
        if let Some(port) = config.required_port {
            let listener = TcpListener::bind(("127.0.0.1", port))?;
            listener.set_nonblocking(true)?;
            Ok(Self { port, listener })
        } else if let Some((start, end)) = config.port_range {
            for port in start..=end {
                if let Ok(listener) = TcpListener::bind(("127.0.0.1", port)) {
                    listener.set_nonblocking(true)?;
                    return Ok(Self { port, listener });
                }
            }
            Err(std::io::Error::new(
                std::io::ErrorKind::AddrInUse,
                format!("No available ports in range {}-{}", start, end),
            ))
        } else {
            let listener = TcpListener::bind("127.0.0.1:0")?;
            let port = listener.local_addr()?.port();
            listener.set_nonblocking(true)?;
            Ok(Self { port, listener })
        }
    }

    /// Get the port this server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Wait for the OAuth callback.
    ///
    /// Requests that carry neither a code nor an error are answered with 400
    /// and the server keeps waiting.
    pub async fn wait_for_callback(self, timeout: Duration) -> Result<CallbackResult, CallbackError> {
        let listener = tokio::net::TcpListener::from_std(self.listener)?;

        let result = tokio::time::timeout(timeout, async {
            loop {
                let (mut stream, peer) = listener.accept().await?;

                let mut buffer = [0u8; 4096];
                let n = stream.read(&mut buffer).await?;
                let request = String::from_utf8_lossy(&buffer[..n]);
                debug!(%peer, "OAuth callback connection");

                match Self::parse_callback_request(&request) {
                    Some(Callback::Code(result)) => {
                        let _ = stream.write_all(Self::success_response().as_bytes()).await;
                        return Ok(result);
                    }
                    Some(Callback::Denied(reason)) => {
                        let _ = stream
                            .write_all(Self::error_response(&reason).as_bytes())
                            .await;
                        return Err(CallbackError::Denied(reason));
                    }
                    None => {
                        let response = Self::error_response("Missing code or state parameter");
                        let _ = stream.write_all(response.as_bytes()).await;
                    }
                }
            }
        })
        .await;

        match result {
            Ok(inner) => inner,
            Err(_) => Err(CallbackError::Timeout),
        }
    }

    fn parse_callback_request(request: &str) -> Option<Callback> {
        // GET /callback?code=xxx&state=yyy HTTP/1.1
        let first_line = request.lines().next()?;
        let mut parts = first_line.split_whitespace();
        if parts.next()? != "GET" {
            return None;
        }
        let target = parts.next()?;
        let (_, query) = target.split_once('?')?;

        let mut code = None;
        let mut state = None;
        let mut error = None;
        let mut error_description = None;

        for pair in query.split('&') {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let value = urlencoding::decode(&value.replace('+', " ")).ok()?.into_owned();
            match key {
                "code" => code = Some(value),
                "state" => state = Some(value),
                "error" => error = Some(value),
                "error_description" => error_description = Some(value),
                _ => {}
            }
        }

        if let Some(error) = error {
            return Some(Callback::Denied(error_description.unwrap_or(error)));
        }

        Some(Callback::Code(CallbackResult {
            code: code?,
            state: state?,
        }))
    }

    fn success_response() -> String {
        let body = r#"<!DOCTYPE html>
<html>
<head><title>Authorization Successful</title></head>
<body style="font-family: system-ui; text-align: center; padding: 50px;">
<h1>Authorization successful</h1>
<p>You can close this window and return to your flow.</p>
</body>
</html>"#;
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        )
    }

    fn error_response(message: &str) -> String {
        let body = format!(
            r#"<!DOCTYPE html>
<html>
<head><title>Authorization Failed</title></head>
<body style="font-family: system-ui; text-align: center; padding: 50px;">
<h1>Authorization failed</h1>
<p>{}</p>
</body>
</html>"#,
            html_escape(message)
        );
        format!(
            "HTTP/1.1 400 Bad Request\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        )
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Errors that can occur during callback handling.
#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    #[error("Callback timeout")]
    Timeout,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Authorization denied: {0}")]
    Denied(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    #[test]
    fn test_parse_code() {
        let parsed = CallbackServer::parse_callback_request(
            "GET /callback?code=abc%2F123&state=xyz HTTP/1.1\r\nHost: localhost\r\n\r\n",
        );
        assert_eq!(
            parsed,
            Some(Callback::Code(CallbackResult {
                code: "abc/123".to_string(),
                state: "xyz".to_string(),
            }))
        );
    }

    #[test]
    fn test_parse_denied() {
        let parsed = CallbackServer::parse_callback_request(
            "GET /callback?error=access_denied&error_description=User+cancelled&state=xyz HTTP/1.1\r\n",
        );
        assert_eq!(
            parsed,
            Some(Callback::Denied("User cancelled".to_string()))
        );
    }

    #[test]
    fn test_parse_incomplete() {
        assert_eq!(
            CallbackServer::parse_callback_request("GET /callback?code=abc HTTP/1.1\r\n"),
            None
        );
        assert_eq!(
            CallbackServer::parse_callback_request("GET /favicon.ico HTTP/1.1\r\n"),
            None
        );
        assert_eq!(
            CallbackServer::parse_callback_request("POST /callback?code=a&state=b HTTP/1.1\r\n"),
            None
        );
    }

    #[test]
    fn test_error_page_escapes_message() {
        let page = CallbackServer::error_response("<script>");
        assert!(page.contains("&lt;script&gt;"));
        assert!(page.starts_with("HTTP/1.1 400"));
    }

    async fn hit(port: u16, target: &str) -> String {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        stream
            .write_all(format!("GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", target).as_bytes())
            .await
            .unwrap();
        let mut out = String::new();
        stream.read_to_string(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn test_wait_for_callback() {
        let config = OAuthConfig::new("id", "secret", "https://a", "https://t").with_ephemeral_port();
        let server = CallbackServer::start(&config).unwrap();
        let port = server.port();

        let waiter = tokio::spawn(server.wait_for_callback(Duration::from_secs(5)));

        let first = hit(port, "/favicon.ico").await;
        assert!(first.starts_with("HTTP/1.1 400"));

        let second = hit(port, "/callback?code=c0de&state=s7").await;
        assert!(second.starts_with("HTTP/1.1 200"));

        let result = waiter.await.unwrap().unwrap();
        assert_eq!(result.code, "c0de");
        assert_eq!(result.state, "s7");
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let config = OAuthConfig::new("id", "secret", "https://a", "https://t").with_ephemeral_port();
        let server = CallbackServer::start(&config).unwrap();

        let err = server
            .wait_for_callback(Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, CallbackError::Timeout));
    }
}
