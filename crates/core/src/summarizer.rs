use crate::error::IngestError;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

pub const SUMMARY_LINE_COUNT: usize = 3;

pub trait Summarizer: Send + Sync {
    fn name(&self) -> &'static str;

    fn summarize(&self, raw_text: &str) -> Result<String, IngestError>;
}

/// The first three non-empty lines, trimmed and concatenated.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicSummarizer;

impl Summarizer for HeuristicSummarizer {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    fn summarize(&self, raw_text: &str) -> Result<String, IngestError> {
        Ok(heuristic_summary(raw_text))
    }
}

pub fn heuristic_summary(raw_text: &str) -> String {
    raw_text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(SUMMARY_LINE_COUNT)
        .collect()
}

#[derive(Debug, Clone, Serialize)]
struct SummaryRequest<'a> {
    text: &'a str,
    max_sentences: usize,
}

#[derive(Debug, Clone, Deserialize)]
struct SummaryResponse {
    #[serde(default)]
    summary: Option<String>,
}

/// Remote summarization over HTTP. Output is not reproducible, so this is
/// only used when configured explicitly; callers fall back to
/// [`heuristic_summary`] when it errors.
pub struct ModelSummarizer {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl ModelSummarizer {
    pub fn new(endpoint: &str, api_key: Option<String>, timeout: Duration) -> Result<Self, IngestError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Self::with_client(client, endpoint, api_key)
    }

    pub fn with_client(client: Client, endpoint: &str, api_key: Option<String>) -> Result<Self, IngestError> {
        Ok(Self {
            client,
            endpoint: Url::parse(endpoint)?,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl Summarizer for ModelSummarizer {
    fn name(&self) -> &'static str {
        "model"
    }

    fn summarize(&self, raw_text: &str) -> Result<String, IngestError> {
        let mut request = self
            .client
            .post(self.endpoint.clone())
            .header("content-type", "application/json")
            .json(&SummaryRequest {
                text: raw_text,
                max_sentences: SUMMARY_LINE_COUNT,
            });

        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send()?;
        if !response.status().is_success() {
            return Err(IngestError::Summarizer(format!(
                "summary request to {} returned {}",
                self.endpoint,
                response.status()
            )));
        }

        let payload: SummaryResponse = response.json()?;
        payload
            .summary
            .map(|summary| summary.trim().to_string())
            .filter(|summary| !summary.is_empty())
            .ok_or_else(|| {
                IngestError::Summarizer(format!("empty summary from {}", self.endpoint))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread::{self, JoinHandle};

    /// Answers exactly one request and hands back what it received.
    fn serve_once(
        status_line: &'static str,
        body: &'static str,
    ) -> std::io::Result<(String, JoinHandle<std::io::Result<String>>)> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let endpoint = format!("http://{}/summarize", listener.local_addr()?);

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept()?;
            let request = read_request(&stream)?;
            let response = format!(
                "{status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes())?;
            stream.flush()?;
            Ok(request)
        });
        Ok((endpoint, handle))
    }

    fn read_request(stream: &TcpStream) -> std::io::Result<String> {
        let mut reader = BufReader::new(stream);
        let mut head = String::new();
        let mut content_length = 0;
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line)? == 0 || line == "\r\n" {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                if name.trim().eq_ignore_ascii_case("content-length") {
                    content_length = value.trim().parse().unwrap_or(0);
                }
            }
            head.push_str(&line.to_ascii_lowercase());
        }

        let mut body = vec![0; content_length];
        reader.read_exact(&mut body)?;
        Ok(format!("{head}\r\n{}", String::from_utf8_lossy(&body)))
    }

    fn local_summarizer(endpoint: &str, api_key: Option<&str>) -> Result<ModelSummarizer, IngestError> {
        let client = Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()?;
        ModelSummarizer::with_client(client, endpoint, api_key.map(str::to_string))
    }

    #[test]
    fn model_summary_is_trimmed_and_request_carries_text_and_token(
    ) -> Result<(), Box<dyn std::error::Error>> {
        let (endpoint, server) =
            serve_once("HTTP/1.1 200 OK", r#"{"summary": "  Kasse am Abend abschliessen  "}"#)?;
        let summarizer = local_summarizer(&endpoint, Some("secret"))?;

        let summary = summarizer.summarize("Kasse abschliessen")?;
        assert_eq!(summary, "Kasse am Abend abschliessen");

        let request = server.join().map_err(|_| "server thread panicked")??;
        assert!(request.starts_with("post /summarize "));
        assert!(request.contains("authorization: bearer secret"));
        assert!(request.contains(r#""text":"Kasse abschliessen""#));
        assert!(request.contains(r#""max_sentences":3"#));
        Ok(())
    }

    #[test]
    fn error_status_is_a_summarizer_error() -> Result<(), Box<dyn std::error::Error>> {
        let (endpoint, server) = serve_once("HTTP/1.1 503 Service Unavailable", "{}")?;
        let summarizer = local_summarizer(&endpoint, None)?;

        let result = summarizer.summarize("Kasse abschliessen");
        assert!(matches!(result, Err(IngestError::Summarizer(_))));

        let request = server.join().map_err(|_| "server thread panicked")??;
        assert!(!request.contains("authorization:"));
        Ok(())
    }

    #[test]
    fn blank_model_summary_is_a_summarizer_error() -> Result<(), Box<dyn std::error::Error>> {
        let (endpoint, server) = serve_once("HTTP/1.1 200 OK", r#"{"summary": "   "}"#)?;
        let summarizer = local_summarizer(&endpoint, None)?;

        let result = summarizer.summarize("Kasse abschliessen");
        assert!(matches!(result, Err(IngestError::Summarizer(_))));
        server.join().map_err(|_| "server thread panicked")??;
        Ok(())
    }

    #[test]
    fn heuristic_takes_first_three_non_empty_lines() {
        let summary = heuristic_summary("\n  Line1 \n\nLine2\nLine3\nLine4");
        assert_eq!(summary, "Line1Line2Line3");
    }

    #[test]
    fn heuristic_with_short_text_uses_what_exists() {
        assert_eq!(heuristic_summary("only one"), "only one");
        assert_eq!(heuristic_summary(" \n\t\n"), "");
    }

    #[test]
    fn model_summarizer_rejects_bad_endpoint() {
        let result = ModelSummarizer::new("not a url", None, Duration::from_secs(1));
        assert!(matches!(result, Err(IngestError::Url(_))));
    }

    #[test]
    fn empty_api_key_is_ignored() -> Result<(), IngestError> {
        let summarizer = ModelSummarizer::new(
            "http://127.0.0.1:9/summarize",
            Some("  ".to_string()),
            Duration::from_secs(1),
        )?;
        assert!(summarizer.api_key.is_none());
        assert_eq!(summarizer.endpoint().path(), "/summarize");
        Ok(())
    }
}
