use c8db_core::{CursorBatch, Request};
use futures::stream::{self, Stream};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::connection::Connection;
use crate::{ClientError, Result};

/// Forward-only, single-pass view over a paged query result
///
/// The first batch arrives with the query response; further batches are
/// fetched as the buffer drains. Continuation requests go to the host that
/// created the cursor, since cursor state lives on that server only.
pub struct ArrayCursor {
    connection: Arc<Connection>,
    buffer: VecDeque<Value>,
    has_more: bool,
    id: Option<String>,
    host: usize,
    count: Option<u64>,
    extra: Option<Value>,
    closed: bool,
}

impl ArrayCursor {
    pub(crate) fn new(connection: Arc<Connection>, batch: CursorBatch, host: usize) -> Self {
        Self {
            connection,
            buffer: batch.result.into(),
            has_more: batch.has_more,
            id: batch.id,
            host,
            count: batch.count,
            extra: batch.extra,
            closed: false,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// HostPool index continuation requests are pinned to
    pub fn host(&self) -> usize {
        self.host
    }

    /// Total result count, when the query asked for it
    pub fn count(&self) -> Option<u64> {
        self.count
    }

    pub fn extra(&self) -> Option<&Value> {
        self.extra.as_ref()
    }

    pub fn has_next(&self) -> bool {
        !self.buffer.is_empty() || self.has_more
    }

    pub async fn next(&mut self) -> Result<Value> {
        while self.buffer.is_empty() && self.has_more {
            self.fetch_more().await?;
        }
        self.buffer.pop_front().ok_or(ClientError::ExhaustedCursor)
    }

    /// Drain every remaining item, in order
    ///
    /// On a failed fetch nothing is consumed: items received so far stay
    /// buffered and can still be read with `next`.
    pub async fn all(&mut self) -> Result<Vec<Value>> {
        while self.has_more {
            self.fetch_more().await?;
        }
        Ok(self.buffer.drain(..).collect())
    }

    /// Feed items to `f` until it returns `false` or the cursor runs out
    ///
    /// Returns `false` if `f` stopped early.
    pub async fn each<F>(&mut self, mut f: F) -> Result<bool>
    where
        F: FnMut(Value) -> bool,
    {
        while self.has_next() {
            let item = match self.next().await {
                Ok(item) => item,
                Err(ClientError::ExhaustedCursor) => break,
                Err(err) => return Err(err),
            };
            if !f(item) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<Value>> {
        stream::try_unfold(self, |mut cursor| async move {
            if !cursor.has_next() {
                return Ok(None);
            }
            match cursor.next().await {
                Ok(item) => Ok(Some((item, cursor))),
                Err(ClientError::ExhaustedCursor) => Ok(None),
                Err(err) => Err(err),
            }
        })
    }

    /// Release the server-side cursor; items already buffered stay readable
    ///
    /// Best effort: a failed release is logged, never returned.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if !self.has_more {
            return;
        }
        self.has_more = false;
        let Some(id) = self.id.clone() else {
            return;
        };

        let request = Request::delete(format!("/cursor/{}", id)).pinned(self.host);
        match self.connection.request(request, |_| Ok(())).await {
            Ok(()) => debug!(cursor = %id, "Cursor released"),
            Err(err) => warn!(cursor = %id, error = %err, "Failed to release cursor"),
        }
    }

    async fn fetch_more(&mut self) -> Result<()> {
        let id = self.id.clone().ok_or_else(|| {
            ClientError::InvalidResponse("cursor reports more results but has no id".to_string())
        })?;
        let request = Request::put(format!("/cursor/{}", id)).pinned(self.host);
        let batch: CursorBatch = self.connection.request(request, |res| res.json()).await?;

        debug!(cursor = %id, items = batch.result.len(), has_more = batch.has_more, "Fetched cursor batch");
        self.buffer.extend(batch.result);
        self.has_more = batch.has_more;
        Ok(())
    }
}
