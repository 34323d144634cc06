use std::{collections::HashMap, fmt::Display, future::Future};

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::{
    error::SendError,
    models::{
        retry::{DeliveryAttempt, RetryConfig},
        status::AttemptOutcome,
    },
};

/// Errors that know whether another attempt could succeed.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for SendError {
    fn is_retryable(&self) -> bool {
        matches!(self, SendError::Transient(_))
    }
}

#[derive(Debug)]
pub struct Retried<T> {
    pub value: T,
    pub trace: Vec<DeliveryAttempt>,
}

#[derive(Debug)]
pub enum RetryError<E> {
    Exhausted {
        trace: Vec<DeliveryAttempt>,
        last_error: E,
    },
    Fatal {
        trace: Vec<DeliveryAttempt>,
        error: E,
    },
}

impl<E> RetryError<E> {
    pub fn trace(&self) -> &[DeliveryAttempt] {
        match self {
            RetryError::Exhausted { trace, .. } | RetryError::Fatal { trace, .. } => trace,
        }
    }
}

/// Runs `operation` until it succeeds, fails fatally, or `max_attempts` is
/// reached, sleeping a fixed `delay_ms` between attempts.
///
/// The closure receives the 1-based attempt number.
pub async fn retry_with_fixed_delay<F, Fut, T, E>(
    config: &RetryConfig,
    mut operation: F,
) -> Result<Retried<T>, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display + Retryable,
{
    let max_attempts = config.max_attempts.max(1);
    let mut trace = Vec::with_capacity(max_attempts as usize);
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    info!(attempt, max_attempts, "Retry succeeded");
                }
                trace.push(DeliveryAttempt::succeeded(attempt));
                return Ok(Retried { value, trace });
            }
            Err(e) if !e.is_retryable() => {
                warn!(attempt, error = %e, "Attempt failed with non-retryable error");
                trace.push(DeliveryAttempt::failed(
                    attempt,
                    AttemptOutcome::FatalFailure,
                    e.to_string(),
                ));
                return Err(RetryError::Fatal { trace, error: e });
            }
            Err(e) => {
                trace.push(DeliveryAttempt::failed(
                    attempt,
                    AttemptOutcome::TransientFailure,
                    e.to_string(),
                ));

                if attempt >= max_attempts {
                    warn!(
                        max_attempts,
                        error = %e,
                        "Retry failed after exhausting all attempts"
                    );
                    return Err(RetryError::Exhausted {
                        trace,
                        last_error: e,
                    });
                }

                debug!(
                    attempt,
                    max_attempts,
                    delay_ms = config.delay_ms,
                    error = %e,
                    "Attempt failed, waiting before retry"
                );

                sleep(config.delay()).await;
            }
        }
    }
}

/// Replaces every `{{name}}` token whose name is in `variables`.
///
/// Single pass: substituted values are never re-scanned, and tokens with no
/// matching variable are copied through unchanged.
pub fn substitute(pattern: &str, variables: &HashMap<String, String>) -> String {
    let mut output = String::with_capacity(pattern.len());
    let mut rest = pattern;

    while let Some(start) = rest.find("{{") {
        let Some(len) = rest[start + 2..].find("}}") else {
            break;
        };
        let end = start + 2 + len + 2;
        let name = rest[start + 2..start + 2 + len].trim();

        output.push_str(&rest[..start]);
        match variables.get(name) {
            Some(value) => output.push_str(value),
            None => output.push_str(&rest[start..end]),
        }
        rest = &rest[end..];
    }

    output.push_str(rest);
    output
}

/// Escapes the characters that are significant inside HTML text and attributes.
pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Names of all `{{name}}` tokens in `pattern`, in order of appearance.
pub fn placeholders(pattern: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = pattern;

    while let Some(start) = rest.find("{{") {
        let Some(len) = rest[start + 2..].find("}}") else {
            break;
        };
        let name = rest[start + 2..start + 2 + len].trim();
        if !name.is_empty() && !names.contains(&name) {
            names.push(name);
        }
        rest = &rest[start + 2 + len + 2..];
    }

    names
}

/// Joins a base URL and a path, percent-encoding `value` exactly once.
pub fn token_link(base_url: &str, path: &str, param: &str, value: &str) -> String {
    format!(
        "{}{}?{}={}",
        base_url.trim_end_matches('/'),
        path,
        param,
        urlencoding::encode(value)
    )
}

pub fn path_link(base_url: &str, path: &str, segment: &str) -> String {
    format!(
        "{}{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_end_matches('/'),
        urlencoding::encode(segment)
    )
}
