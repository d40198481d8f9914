use reqwest::Client;
use url::Url;

use crate::config::CallbackSettings;
use crate::models::payload::CallbackPayload;

/// Redirects callbacks aimed at a host this process cannot reach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteRule {
    pub internal_host: String,
    pub internal_port: u16,
    pub tunnel_netloc: String,
}

impl RewriteRule {
    /// Apply the rule to `callback_url`.
    ///
    /// Only the authority is replaced; scheme, path, query and fragment are
    /// copied byte for byte. A URL without an explicit port matches too.
    pub fn apply(&self, callback_url: &str) -> String {
        let Ok(parsed) = Url::parse(callback_url) else {
            return callback_url.to_string();
        };

        let Some((start, end)) = authority_span(callback_url) else {
            return callback_url.to_string();
        };

        let host_matches = parsed
            .host_str()
            .is_some_and(|h| h.eq_ignore_ascii_case(&self.internal_host));
        // Url::port() hides a written default port (":80" on http), so only
        // an authority without any port counts as "no port".
        let port_matches = if has_written_port(&callback_url[start..end]) {
            parsed.port_or_known_default() == Some(self.internal_port)
        } else {
            true
        };
        if !host_matches || !port_matches {
            return callback_url.to_string();
        }

        format!(
            "{}{}{}",
            &callback_url[..start],
            self.tunnel_netloc,
            &callback_url[end..]
        )
    }
}

/// Byte range of the `user:pass@host:port` part of a URL.
fn authority_span(url: &str) -> Option<(usize, usize)> {
    let start = url.find("://")? + 3;
    let end = url[start..]
        .find(['/', '?', '#'])
        .map_or(url.len(), |i| start + i);
    Some((start, end))
}

fn has_written_port(authority: &str) -> bool {
    let host_port = authority.rsplit('@').next().unwrap_or(authority);
    let after_host = match host_port.rfind(']') {
        Some(i) => &host_port[i + 1..],
        None => host_port,
    };
    after_host.contains(':')
}

/// Delivers job results to caller webhooks. One attempt, no retries.
pub struct CallbackDispatcher {
    http: Client,
    rewrite: Option<RewriteRule>,
}

impl CallbackDispatcher {
    pub fn new(settings: &CallbackSettings) -> Result<Self, CallbackError> {
        let http = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.timeout)
            .build()
            .map_err(|e| CallbackError::Connect(format!("failed to build HTTP client: {e}")))?;

        let rewrite = settings.tunnel_netloc.as_ref().map(|netloc| RewriteRule {
            internal_host: settings.internal_host.clone(),
            internal_port: settings.internal_port,
            tunnel_netloc: netloc.clone(),
        });

        Ok(Self { http, rewrite })
    }

    pub fn resolve_url(&self, callback_url: &str) -> String {
        match &self.rewrite {
            Some(rule) => rule.apply(callback_url),
            None => callback_url.to_string(),
        }
    }

    /// POST `payload` as JSON to the (possibly rewritten) callback URL.
    pub async fn deliver(
        &self,
        callback_url: &str,
        payload: &CallbackPayload,
    ) -> Result<(), CallbackError> {
        let target = self.resolve_url(callback_url);
        tracing::info!(
            job_id = %payload.job_id(),
            status = %payload.status(),
            original = %callback_url,
            rewritten = %target,
            "Delivering callback"
        );

        let response = self
            .http
            .post(&target)
            .json(payload)
            .send()
            .await
            .map_err(CallbackError::from_transport)?;

        let status = response.status();
        tracing::info!(job_id = %payload.job_id(), status = status.as_u16(), "Callback answered");

        if !status.is_success() {
            return Err(CallbackError::HttpStatus(status.as_u16()));
        }
        Ok(())
    }

    /// Deliver and swallow any failure after logging it.
    /// Returns whether the callback was accepted.
    pub async fn deliver_or_log(&self, callback_url: &str, payload: &CallbackPayload) -> bool {
        match self.deliver(callback_url, payload).await {
            Ok(()) => {
                metrics::counter!("callback_deliveries_total", "outcome" => "delivered").increment(1);
                true
            }
            Err(e) => {
                metrics::counter!("callback_deliveries_total", "outcome" => e.class()).increment(1);
                tracing::error!(
                    job_id = %payload.job_id(),
                    error_class = e.class(),
                    error = %e,
                    "Callback delivery failed"
                );
                false
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    #[error("callback timed out: {0}")]
    Timeout(String),

    #[error("callback connection failed: {0}")]
    Connect(String),

    #[error("callback returned HTTP {0}")]
    HttpStatus(u16),

    #[error("invalid callback URL: {0}")]
    InvalidUrl(String),
}

impl CallbackError {
    fn from_transport(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else if e.is_builder() {
            Self::InvalidUrl(e.to_string())
        } else {
            Self::Connect(e.to_string())
        }
    }

    pub fn class(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "CallbackTimeoutError",
            Self::Connect(_) => "CallbackConnectError",
            Self::HttpStatus(_) => "CallbackHTTPStatusError",
            Self::InvalidUrl(_) => "CallbackInvalidUrlError",
        }
    }
}
