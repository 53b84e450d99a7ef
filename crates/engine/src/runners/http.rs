// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP request runner.

use crate::error::RunnerKind;
use crate::runner::{RunnerError, RunnerRequest, StepRunner};
use async_trait::async_trait;
use serde_json::{json, Map, Value};

/// Runs steps addressed at an HTTP runner.
///
/// Payload: `{method?, path?, headers?, query?, body?, json?}`. The recorded
/// entry is `{status, headers, body}` plus a `cookies` map mirrored into the
/// store's cookie jar. HTTP error statuses are results, not errors.
pub struct HttpRunner {
    target: String,
    client: reqwest::Client,
}

impl HttpRunner {
    pub fn new(target: &str) -> Result<Self, RunnerError> {
        // Validate the base URL once at construction.
        if !target.is_empty() {
            reqwest::Url::parse(target).map_err(|e| RunnerError::new(e.to_string()))?;
        }
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .map_err(RunnerError::from)?;
        Ok(Self {
            target: target.to_string(),
            client,
        })
    }

    /// A runner with no target; steps against it fail, and non-force close
    /// leaves it alone. Used by test scaffolding that injects runners.
    pub fn detached() -> Self {
        Self {
            target: String::new(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl StepRunner for HttpRunner {
    fn kind(&self) -> RunnerKind {
        RunnerKind::Http
    }

    fn detached_target(&self) -> bool {
        self.target.is_empty()
    }

    async fn run(&self, req: RunnerRequest) -> Result<Value, RunnerError> {
        if self.target.is_empty() {
            return Err(RunnerError::new("no target configured"));
        }
        let payload = req.payload.as_object().cloned().unwrap_or_default();
        let method = payload
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or("GET")
            .to_uppercase();
        let method = reqwest::Method::from_bytes(method.as_bytes())
            .map_err(|_| RunnerError::new(format!("invalid method: {}", method)))?;
        let path = payload.get("path").and_then(Value::as_str).unwrap_or("/");
        let base = reqwest::Url::parse(&self.target).map_err(|e| RunnerError::new(e.to_string()))?;
        let url = base
            .join(path)
            .map_err(|e| RunnerError::new(e.to_string()))?;

        let mut builder = self.client.request(method, url);
        if let Some(headers) = payload.get("headers").and_then(Value::as_object) {
            for (name, value) in headers {
                builder = builder.header(name, crate::expr::stringify(value));
            }
        }
        if let Some(query) = payload.get("query").and_then(Value::as_object) {
            let pairs: Vec<(String, String)> = query
                .iter()
                .map(|(k, v)| (k.clone(), crate::expr::stringify(v)))
                .collect();
            builder = builder.query(&pairs);
        }
        if let Some(body) = payload.get("json") {
            builder = builder.json(body);
        } else if let Some(body) = payload.get("body") {
            builder = builder.body(crate::expr::stringify(body));
        }

        let response = tokio::select! {
            response = builder.send() => response?,
            _ = req.cancel.cancelled() => {
                return Err(RunnerError::new("canceled"));
            }
        };

        let status = response.status().as_u16();
        let mut headers = Map::new();
        for (name, value) in response.headers() {
            let rendered = Value::String(String::from_utf8_lossy(value.as_bytes()).to_string());
            match headers.get_mut(name.as_str()) {
                // Repeated headers become arrays, exposed verbatim.
                Some(Value::Array(values)) => values.push(rendered),
                Some(existing) => {
                    let first = existing.clone();
                    *existing = Value::Array(vec![first, rendered]);
                }
                None => {
                    headers.insert(name.as_str().to_string(), rendered);
                }
            }
        }

        let mut cookies = Map::new();
        for cookie in response.cookies() {
            cookies.insert(cookie.name().to_string(), json!(cookie.value()));
        }

        let text = response.text().await?;
        let body: Value = serde_json::from_str(&text).unwrap_or(Value::String(text));

        Ok(json!({
            "status": status,
            "headers": headers,
            "body": body,
            "cookies": cookies,
        }))
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
