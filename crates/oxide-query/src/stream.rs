//! Streaming in batches.
//!
//! A [`QueryStream`] pulls one `forward` batch at a time and hands out its
//! items one by one. After the last item of a batch the parameter advances,
//! either through the enhancer (keyset style paging) or by moving the
//! offset past the batch. Failed batches are retried from the same
//! parameter after a back-off delay.
//!
//! Batches are delivered at least once: a retry re-executes the batch from
//! its start, so when the backend changed between attempts callers can see
//! items that were already returned before the failure.

use std::collections::VecDeque;
use std::fmt;
use std::marker::PhantomData;
use std::time::Duration;

use futures::Stream;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{QueryError, Result};
use crate::parameter::QueryParameter;
use crate::result::Forwarding;
use crate::service::QueryService;
use crate::value::Record;

/// Delay between retries of a failed batch.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum BackoffStrategy {
    /// Retry immediately.
    #[default]
    None,
    /// Wait the same time before every retry.
    Fixed(Duration),
    /// Wait `base * factor^(attempt - 1)`, capped at `max`.
    Exponential {
        base: Duration,
        factor: f64,
        max: Duration,
    },
}

impl BackoffStrategy {
    /// Returns the delay before retry number `attempt` (starting at 1).
    #[must_use]
    pub fn delay(&self, attempt: usize) -> Duration {
        match *self {
            Self::None => Duration::ZERO,
            Self::Fixed(delay) => delay,
            Self::Exponential { base, factor, max } => {
                let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
                let secs = base.as_secs_f64() * factor.powi(exponent);
                if secs.is_finite() && secs >= 0.0 && secs < max.as_secs_f64() {
                    Duration::from_secs_f64(secs)
                } else {
                    max
                }
            }
        }
    }
}

type Terminator = Box<dyn Fn(usize, &Record) -> bool + Send + Sync>;
type Enhancer = Box<dyn Fn(&Record, &mut QueryParameter) + Send + Sync>;

/// Cursor state of a stream.
pub struct StreamQueryParameter {
    parameter: QueryParameter,
    retry_times: usize,
    backoff: BackoffStrategy,
    terminator: Option<Terminator>,
    enhancer: Option<Enhancer>,
    auto_close: bool,
}

impl StreamQueryParameter {
    /// Wraps `parameter`; its limit becomes the batch size, at least 1.
    #[must_use]
    pub fn new(parameter: QueryParameter) -> Self {
        let limit = parameter.limit.unwrap_or(1).max(1);
        Self {
            parameter: QueryParameter {
                limit: Some(limit),
                ..parameter
            },
            retry_times: 0,
            backoff: BackoffStrategy::None,
            terminator: None,
            enhancer: None,
            auto_close: true,
        }
    }

    /// Retries a failing batch up to `times` more times.
    #[must_use]
    pub const fn with_retry(mut self, times: usize, backoff: BackoffStrategy) -> Self {
        self.retry_times = times;
        self.backoff = backoff;
        self
    }

    /// Keeps streaming while `terminator(emitted, last)` returns true.
    #[must_use]
    pub fn with_terminator(
        mut self,
        terminator: impl Fn(usize, &Record) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.terminator = Some(Box::new(terminator));
        self
    }

    /// Computes the next batch's parameter from the last item.
    #[must_use]
    pub fn with_enhancer(
        mut self,
        enhancer: impl Fn(&Record, &mut QueryParameter) + Send + Sync + 'static,
    ) -> Self {
        self.enhancer = Some(Box::new(enhancer));
        self
    }

    /// Whether the stream closes itself once exhausted.
    #[must_use]
    pub const fn with_auto_close(mut self, auto_close: bool) -> Self {
        self.auto_close = auto_close;
        self
    }

    #[must_use]
    pub const fn parameter(&self) -> &QueryParameter {
        &self.parameter
    }

    /// Returns the batch size.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.parameter.limit.unwrap_or(1).max(1)
    }

    /// Advances past `last`, the final item of a batch.
    pub fn forward(&mut self, last: &Record) {
        match &self.enhancer {
            Some(enhancer) => enhancer(last, &mut self.parameter),
            None => self.parameter.offset += self.limit(),
        }
        if self.parameter.limit.map_or(true, |limit| limit == 0) {
            self.parameter.limit = Some(1);
        }
    }

    fn should_continue(&self, emitted: usize, last: &Record) -> bool {
        self.terminator
            .as_ref()
            .map_or(true, |terminator| terminator(emitted, last))
    }
}

impl fmt::Debug for StreamQueryParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamQueryParameter")
            .field("parameter", &self.parameter)
            .field("retry_times", &self.retry_times)
            .field("backoff", &self.backoff)
            .field("terminator", &self.terminator.is_some())
            .field("enhancer", &self.enhancer.is_some())
            .field("auto_close", &self.auto_close)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    Open,
    Exhausted,
    Closed,
}

/// A pull-based sequence over a query, fetched in batches.
///
/// Must be closed once the caller is done with it: explicitly through
/// [`QueryStream::close`], on exhaustion when auto-close is on, or by
/// dropping it.
pub struct QueryStream<T> {
    service: QueryService,
    name: String,
    param: StreamQueryParameter,
    buffer: VecDeque<Record>,
    has_next: bool,
    emitted: usize,
    batches: usize,
    state: StreamState,
    _marker: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> QueryStream<T> {
    pub(crate) fn new(service: QueryService, name: &str, param: StreamQueryParameter) -> Self {
        Self {
            service,
            name: name.to_string(),
            param,
            buffer: VecDeque::new(),
            has_next: true,
            emitted: 0,
            batches: 0,
            state: StreamState::Open,
            _marker: PhantomData,
        }
    }

    /// Returns the next item, or `None` once the stream is exhausted or
    /// closed.
    ///
    /// # Errors
    ///
    /// Returns the batch failure (wrapped in
    /// [`QueryError::RetriesExhausted`] when retries were configured) or a
    /// conversion failure. The stream is closed after an error.
    pub async fn next(&mut self) -> Result<Option<T>> {
        loop {
            if self.state == StreamState::Closed {
                return Ok(None);
            }
            if let Some(record) = self.buffer.pop_front() {
                return self.emit(record).map(Some);
            }
            if self.state == StreamState::Exhausted || !self.has_next {
                self.exhaust();
                return Ok(None);
            }

            let batch = match self.fetch_batch().await {
                Ok(batch) => batch,
                Err(e) => {
                    self.close();
                    return Err(e);
                }
            };
            self.batches += 1;
            self.has_next = batch.has_next;
            if batch.results.is_empty() {
                self.exhaust();
                return Ok(None);
            }
            self.buffer.extend(batch.results);
        }
    }

    /// Releases the stream; later calls to [`QueryStream::next`] return
    /// `None`.
    pub fn close(&mut self) {
        if self.state != StreamState::Closed {
            debug!(query = %self.name, emitted = self.emitted, batches = self.batches, "Closing query stream");
            self.state = StreamState::Closed;
            self.buffer.clear();
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state == StreamState::Closed
    }

    /// Returns how many items were handed out so far.
    #[must_use]
    pub const fn emitted(&self) -> usize {
        self.emitted
    }

    /// Adapts the stream to [`futures::Stream`]. The adapter ends after the
    /// first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<T>> {
        futures::stream::unfold(self, |mut stream| async move {
            match stream.next().await {
                Ok(Some(item)) => Some((Ok(item), stream)),
                Ok(None) => None,
                Err(e) => Some((Err(e), stream)),
            }
        })
    }

    fn emit(&mut self, record: Record) -> Result<T> {
        self.emitted += 1;
        if self.buffer.is_empty() {
            self.param.forward(&record);
        }
        if !self.param.should_continue(self.emitted, &record) {
            debug!(query = %self.name, emitted = self.emitted, "Stream terminated by predicate");
            self.buffer.clear();
            self.exhaust();
        }
        let converted = serde_json::from_value(Value::Object(record)).map_err(|source| {
            QueryError::Conversion {
                query: self.name.clone(),
                source,
            }
        });
        if converted.is_err() {
            self.close();
        }
        converted
    }

    fn exhaust(&mut self) {
        if self.state == StreamState::Open {
            self.state = StreamState::Exhausted;
        }
        if self.param.auto_close {
            self.close();
        }
    }

    async fn fetch_batch(&self) -> Result<Forwarding<Record>> {
        let mut attempt = 0;
        loop {
            let result = self
                .service
                .forward_records(&self.name, self.param.parameter.clone())
                .await;
            let err = match result {
                Ok(batch) => return Ok(batch),
                Err(e) => e,
            };
            if !err.is_transient() || self.param.retry_times == 0 {
                return Err(err);
            }
            if attempt >= self.param.retry_times {
                return Err(QueryError::RetriesExhausted {
                    query: self.name.clone(),
                    attempts: attempt + 1,
                    last: Box::new(err),
                });
            }
            attempt += 1;
            let delay = self.param.backoff.delay(attempt);
            warn!(
                query = %self.name,
                offset = self.param.parameter.offset,
                attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %err,
                "Stream batch failed, retrying"
            );
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }
}

impl<T> Drop for QueryStream<T> {
    fn drop(&mut self) {
        if self.state != StreamState::Closed {
            debug!(query = %self.name, emitted = self.emitted, "Query stream dropped before close");
            self.state = StreamState::Closed;
        }
    }
}

impl<T> fmt::Debug for QueryStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryStream")
            .field("name", &self.name)
            .field("param", &self.param)
            .field("buffered", &self.buffer.len())
            .field("emitted", &self.emitted)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
