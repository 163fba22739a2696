//! Streaming query results.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

use bytes::Bytes;
use futures_util::Stream;
use reqwest::header::HeaderMap;

use super::pool::PooledConnection;
use crate::error::ChResult;
use crate::protocol::command::Command;
use crate::protocol::decoder::RowDecoder;
use crate::types::{Columns, Row};

type ChunkStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

/// Row batches in arrival order.
///
/// Each item holds every row completed by one body chunk; a row split
/// across chunks is carried over to the next item. The pool slot is freed
/// when the body ends, on the first error, or when the stream is dropped.
pub struct RowStream {
    chunks: ChunkStream,
    decoder: RowDecoder,
    command: Command,
    headers: HeaderMap,
    conn: Option<PooledConnection>,
}

impl RowStream {
    pub(crate) fn new(
        chunks: ChunkStream,
        decoder: RowDecoder,
        command: Command,
        headers: HeaderMap,
        conn: PooledConnection,
    ) -> Self {
        Self {
            chunks,
            decoder,
            command,
            headers,
            conn: Some(conn),
        }
    }

    pub fn command(&self) -> Command {
        self.command
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Column names and types, once a `RowBinaryWithNamesAndTypes` header
    /// has arrived.
    pub fn columns(&self) -> Option<&Arc<Columns>> {
        self.decoder.columns()
    }

    fn is_done(&self) -> bool {
        self.conn.is_none()
    }

    fn close(&mut self) {
        self.conn = None;
    }
}

impl Stream for RowStream {
    type Item = ChResult<Vec<Row>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if this.is_done() {
                return Poll::Ready(None);
            }
            match ready!(this.chunks.as_mut().poll_next(cx)) {
                Some(Ok(chunk)) => match this.decoder.feed(chunk) {
                    Ok(rows) if rows.is_empty() => continue,
                    Ok(rows) => return Poll::Ready(Some(Ok(rows))),
                    Err(e) => {
                        this.close();
                        return Poll::Ready(Some(Err(e.into())));
                    }
                },
                Some(Err(e)) => {
                    this.close();
                    return Poll::Ready(Some(Err(e.into())));
                }
                None => {
                    this.close();
                    return Poll::Ready(this.decoder.finish().err().map(|e| Err(e.into())));
                }
            }
        }
    }
}

impl std::fmt::Debug for RowStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowStream")
            .field("command", &self.command)
            .field("buffered", &self.decoder.buffered())
            .field("done", &self.is_done())
            .finish()
    }
}
