// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Upstash Redis over its REST interface.
//!
//! Each command is a JSON array POSTed to the database URL with a bearer
//! token. The reply is `{"result": ...}` or `{"error": "..."}`. Several
//! commands can be sent as one transaction-less batch to `/pipeline`, which
//! answers with one such reply per command.

use std::time::Duration;

use async_trait::async_trait;
use crambot_core::{CrambotError, DistributedCache};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

#[derive(Debug, Deserialize)]
struct RestReply {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
}

pub struct UpstashKv {
    client: reqwest::Client,
    url: String,
}

impl std::fmt::Debug for UpstashKv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstashKv")
            .field("url", &self.url)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl UpstashKv {
    pub fn new(url: String, token: String, timeout: Duration) -> Result<Self, CrambotError> {
        let mut headers = HeaderMap::new();
        let mut bearer = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| CrambotError::Config(format!("invalid kv token: {e}")))?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| CrambotError::Cache {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
        })
    }

    async fn post(&self, url: &str, body: &Value) -> Result<(reqwest::StatusCode, String), CrambotError> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| CrambotError::Cache {
                message: format!("kv request failed: {e}"),
                source: Some(Box::new(e)),
            })?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Ok((status, body))
    }

    async fn command(&self, args: Value) -> Result<Value, CrambotError> {
        debug!(command = %args[0], "upstash command");
        let (status, body) = self.post(&self.url, &args).await?;
        let reply: RestReply = serde_json::from_str(&body).map_err(|e| CrambotError::Cache {
            message: format!("kv returned {status} with unreadable body"),
            source: Some(Box::new(e)),
        })?;
        if !status.is_success() && reply.error.is_none() {
            return Err(CrambotError::cache(format!("kv returned {status}")));
        }
        reply.into_result()
    }

    /// Sends `commands` in one round trip and returns their results in order.
    /// The first failing command fails the whole call.
    async fn pipeline(&self, commands: Value) -> Result<Vec<Value>, CrambotError> {
        debug!(commands = %commands, "upstash pipeline");
        let (status, body) = self.post(&format!("{}/pipeline", self.url), &commands).await?;
        if !status.is_success() {
            let reason = serde_json::from_str::<RestReply>(&body)
                .ok()
                .and_then(|r| r.error)
                .unwrap_or_else(|| status.to_string());
            return Err(CrambotError::cache(format!("kv pipeline failed: {reason}")));
        }
        let replies: Vec<RestReply> =
            serde_json::from_str(&body).map_err(|e| CrambotError::Cache {
                message: "kv pipeline returned an unreadable body".into(),
                source: Some(Box::new(e)),
            })?;
        replies.into_iter().map(RestReply::into_result).collect()
    }
}

impl RestReply {
    fn into_result(self) -> Result<Value, CrambotError> {
        match self.error {
            Some(error) => Err(CrambotError::cache(format!("kv error: {error}"))),
            None => Ok(self.result),
        }
    }
}

#[async_trait]
impl DistributedCache for UpstashKv {
    async fn get(&self, key: &str) -> Result<Option<String>, CrambotError> {
        match self.command(json!(["GET", key])).await? {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s)),
            other => Ok(Some(other.to_string())),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CrambotError> {
        let args = match ttl {
            Some(ttl) => json!(["SET", key, value, "EX", ttl.as_secs().max(1)]),
            None => json!(["SET", key, value]),
        };
        self.command(args).await.map(|_| ())
    }

    async fn incr(&self, key: &str, ttl: Duration) -> Result<i64, CrambotError> {
        // NX arms the expiry only when the key has none, so the window's end
        // stays put while a key orphaned by an earlier failure is repaired.
        let commands = json!([
            ["INCR", key],
            ["EXPIRE", key, ttl.as_secs().max(1), "NX"],
        ]);
        let result = self
            .pipeline(commands)
            .await?
            .into_iter()
            .next()
            .unwrap_or(Value::Null);
        result
            .as_i64()
            .ok_or_else(|| CrambotError::cache(format!("INCR returned non-integer {result}")))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), CrambotError> {
        self.command(json!(["EXPIRE", key, ttl.as_secs().max(1)]))
            .await
            .map(|_| ())
    }

    async fn del(&self, key: &str) -> Result<(), CrambotError> {
        self.command(json!(["DEL", key])).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn kv(server: &MockServer) -> UpstashKv {
        UpstashKv::new(server.uri(), "secret".into(), Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn incr_pipelines_expiry_in_the_same_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/pipeline"))
            .and(header("authorization", "Bearer secret"))
            .and(body_json(json!([
                ["INCR", "rl:u1"],
                ["EXPIRE", "rl:u1", 60, "NX"],
            ])))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{"result": 4}, {"result": 0}])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let count = kv(&server)
            .await
            .incr("rl:u1", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(count, 4);
    }

    #[tokio::test]
    async fn incr_fails_when_the_expiry_command_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/pipeline"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([{"result": 1}, {"error": "ERR syntax error"}])),
            )
            .mount(&server)
            .await;

        let err = kv(&server)
            .await
            .incr("k", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("syntax error"));
    }

    #[tokio::test]
    async fn set_with_ttl_uses_ex() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(json!(["SET", "k", "v", "EX", 300])))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "OK"})))
            .expect(1)
            .mount(&server)
            .await;

        kv(&server)
            .await
            .set("k", "v", Some(Duration::from_secs(300)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn missing_key_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": null})))
            .mount(&server)
            .await;

        assert_eq!(kv(&server).await.get("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn error_reply_becomes_cache_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"error": "WRONGTYPE"})),
            )
            .mount(&server)
            .await;

        let err = kv(&server).await.get("k").await.unwrap_err();
        assert!(matches!(err, CrambotError::Cache { .. }));
        assert!(err.to_string().contains("WRONGTYPE"));
    }

    #[tokio::test]
    async fn server_error_without_body_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        assert!(kv(&server).await.get("k").await.is_err());
    }
}
