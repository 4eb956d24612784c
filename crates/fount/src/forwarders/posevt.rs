//! Byte-offset event forwarder: triggers a fault when the stream crosses a
//! configured byte offset.
//!
//! Directive form: `posevt=<trigger>.<action>[.<args>...]`
//! - `close` cuts the stream at exactly the trigger byte, regardless of how
//!   the client chunks its reads.
//! - `sc.<status>` aborts the pipeline with a status when the trigger lies
//!   inside the first requested range. Evaluated once at construction.
//! - `etags.<a>.<b>` picks one of two ETag values depending on whether the
//!   requested range ends at or before the trigger, then never intercepts.
//!
//! A non-positive trigger, or a missing/unparseable Range where one is
//! required, degrades to pass-through.

use super::{ForwardContext, Wrapped};
use crate::error::SeekError;
use crate::generators::{Generator, Whence};
use async_trait::async_trait;
use hyper::header::{HeaderValue, ETAG};
use hyper::StatusCode;
use tracing::debug;

pub fn build(inner: Box<dyn Generator>, ctx: &mut ForwardContext<'_>) -> Wrapped {
    let arg = ctx.directives.get("posevt").unwrap_or_default().to_string();
    let mut parts = arg.split('.');
    let trigger: i64 = parts
        .next()
        .and_then(|t| t.parse().ok())
        .unwrap_or_default();
    let action = parts.next().unwrap_or_default();

    if trigger <= 0 {
        return Wrapped::Stream(inner);
    }
    let trigger = trigger as u64;

    match action {
        "close" => Wrapped::Stream(Box::new(PosEventForwarder {
            inner,
            trigger,
            pos: 0,
            done: false,
        })),
        "sc" => {
            let Some(range) = ctx.range else {
                return Wrapped::Stream(inner);
            };
            let status = parts
                .next()
                .and_then(|s| s.parse::<u16>().ok())
                .and_then(|s| StatusCode::from_u16(s).ok())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            if range.begin <= trigger && trigger < range.end {
                debug!("posevt sc: trigger {trigger} inside range, aborting with {status}");
                Wrapped::Abort(status)
            } else {
                Wrapped::Stream(inner)
            }
        }
        "etags" => {
            let Some(range) = ctx.range else {
                return Wrapped::Stream(inner);
            };
            let (Some(before), Some(after)) = (parts.next(), parts.next()) else {
                return Wrapped::Stream(inner);
            };
            let chosen = if range.end <= trigger { before } else { after };
            if let Ok(value) = HeaderValue::from_str(chosen) {
                ctx.response_headers.insert(ETAG, value);
            }
            // Trigger cleared: reads are never intercepted.
            Wrapped::Stream(inner)
        }
        other => {
            debug!("unknown posevt action {other:?}, passing through");
            Wrapped::Stream(inner)
        }
    }
}

pub struct PosEventForwarder {
    inner: Box<dyn Generator>,
    trigger: u64,
    pos: u64,
    done: bool,
}

#[async_trait]
impl Generator for PosEventForwarder {
    fn content_type(&self) -> &str {
        self.inner.content_type()
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }

    async fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.done || self.pos >= self.trigger {
            return Ok(0);
        }
        let start = self.pos;
        let n = self.inner.read(buf).await?;
        if n == 0 {
            return Ok(0);
        }
        let end = start + n as u64;
        if end < self.trigger {
            self.pos = end;
            return Ok(n);
        }
        // The cut point falls inside (or exactly at the end of) this read:
        // hand back bytes up to the trigger, park the inner stream there,
        // and report end-of-stream from now on.
        let keep = (self.trigger - start) as usize;
        if keep < n {
            self.inner.seek(self.trigger as i64, Whence::Start)?;
        }
        self.pos = self.trigger;
        self.done = true;
        Ok(keep)
    }

    fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64, SeekError> {
        self.pos = self.inner.seek(offset, whence)?;
        Ok(self.pos)
    }
}
