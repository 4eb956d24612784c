//! Per-read latency forwarder.
//!
//! The first read passes through immediately so header timing is unaffected;
//! every later read notes a deadline, performs the inner read, then sleeps
//! until the deadline fires. The configured latency is wall-clock per read,
//! independent of how long the inner read itself took.

use super::{ForwardContext, Wrapped};
use crate::error::SeekError;
use crate::expr;
use crate::generators::{Generator, Whence};
use async_trait::async_trait;
use std::time::Duration;

/// Parse a Go-style duration literal: decimal (optionally fractional) value
/// with an `ns`/`us`/`ms`/`s`/`m`/`h` suffix, e.g. `100ms`, `1.5s`.
pub fn parse_duration(text: &str) -> Option<Duration> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let split = text.find(|c: char| !c.is_ascii_digit() && c != '.')?;
    let (num, unit) = text.split_at(split);
    let value: f64 = num.parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    let nanos_per_unit: f64 = match unit {
        "ns" => 1.0,
        "us" | "µs" => 1e3,
        "ms" => 1e6,
        "s" => 1e9,
        "m" => 60e9,
        "h" => 3600e9,
        _ => return None,
    };
    Some(Duration::from_nanos((value * nanos_per_unit) as u64))
}

/// Resolve the forwarder's latency and wrap. The argument is a literal
/// duration when it parses as one, otherwise an expression evaluated with
/// the request's random seed and read as nanoseconds. The resolved value is
/// written back into the map so later stages observe the literal, not the
/// roll.
pub fn build(inner: Box<dyn Generator>, ctx: &mut ForwardContext<'_>) -> Wrapped {
    let arg = ctx.directives.get("delay").unwrap_or_default().to_string();
    let latency = match parse_duration(&arg) {
        Some(d) => d,
        None => Duration::from_nanos(expr::eval(&arg, ctx.rnd).max(0) as u64),
    };
    ctx.directives
        .insert("delay", format!("{}ns", latency.as_nanos()));
    Wrapped::Stream(Box::new(DelayForwarder {
        inner,
        latency,
        first: true,
    }))
}

pub struct DelayForwarder {
    inner: Box<dyn Generator>,
    latency: Duration,
    first: bool,
}

#[async_trait]
impl Generator for DelayForwarder {
    fn content_type(&self) -> &str {
        self.inner.content_type()
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }

    async fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.first {
            self.first = false;
            return self.inner.read(buf).await;
        }
        let deadline = tokio::time::Instant::now() + self.latency;
        let n = self.inner.read(buf).await?;
        tokio::time::sleep_until(deadline).await;
        Ok(n)
    }

    fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64, SeekError> {
        self.inner.seek(offset, whence)
    }
}
