//! Bridges vendor token sources onto a bounded channel.
//!
//! Blocking sources are drained on a dedicated blocking worker, async
//! sources on a spawned task. Either way the channel capacity is the only
//! throttle: a slow consumer holds the producer back, a dropped consumer
//! stops it at the next send.

use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use sekvo_core::{Result, SekvoError, StreamErrorMode};

use crate::provider::TokenStream;
use crate::vendor::{AsyncTokens, BlockingTokens, TextRequest, TokenSource, VendorClient};

/// Prefix of the final token emitted on failure in sentinel mode.
pub const STREAM_ERROR_PREFIX: &str = "Error in streaming: ";

/// Producer side of a [`TokenStream`].
#[derive(Clone)]
pub(crate) struct Emitter {
    provider: &'static str,
    mode: StreamErrorMode,
    tx: mpsc::Sender<Result<String>>,
}

impl Emitter {
    pub(crate) fn channel(
        provider: &'static str,
        mode: StreamErrorMode,
        buffer: usize,
    ) -> (Self, TokenStream) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { provider, mode, tx }, TokenStream::new(rx))
    }

    /// Returns `false` once the consumer is gone.
    async fn token(&self, token: String) -> bool {
        self.tx.send(Ok(token)).await.is_ok()
    }

    fn blocking_token(&self, token: String) -> bool {
        self.tx.blocking_send(Ok(token)).is_ok()
    }

    fn failure(&self, message: String) -> Result<String> {
        warn!(provider = self.provider, error = %message, "streaming failed");
        match self.mode {
            StreamErrorMode::Sentinel => Ok(format!("{STREAM_ERROR_PREFIX}{message}")),
            StreamErrorMode::Strict => Err(SekvoError::Stream {
                provider: self.provider.to_string(),
                message,
            }),
        }
    }

    pub(crate) async fn fail(&self, message: impl Into<String>) {
        let _ = self.tx.send(self.failure(message.into())).await;
    }

    fn blocking_fail(&self, message: impl Into<String>) {
        let _ = self.tx.blocking_send(self.failure(message.into()));
    }

    /// Fail before any worker exists. The channel is fresh, so this never blocks.
    pub(crate) fn fail_now(&self, message: impl Into<String>) {
        let _ = self.tx.try_send(self.failure(message.into()));
    }
}

/// Run `work` on its own task; if it panics, the consumer gets a final failure item.
fn spawn_supervised<F, Fut>(emitter: Emitter, work: F)
where
    F: FnOnce(Emitter) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let worker = tokio::spawn(work(emitter.clone()));
    tokio::spawn(async move {
        if let Err(e) = worker.await
            && e.is_panic()
        {
            emitter.fail("token worker panicked").await;
        }
    });
}

/// Stream tokens from the vendor's token-producing method.
pub(crate) fn spawn_streaming(client: Arc<dyn VendorClient>, request: TextRequest, emitter: Emitter) {
    spawn_supervised(emitter, |emitter| async move {
        let Some(streaming) = client.as_streaming() else {
            emitter.fail("vendor client has no token stream").await;
            return;
        };
        let source = match streaming.stream_text(&request).await {
            Ok(source) => source,
            Err(e) => {
                emitter.fail(e.to_string()).await;
                return;
            }
        };
        match source {
            TokenSource::Async(tokens) => forward_async(tokens, emitter).await,
            TokenSource::Blocking(tokens) => forward_blocking(tokens, emitter).await,
        }
    });
}

/// Generate the full text and deliver it as a single token.
pub(crate) fn spawn_fallback(client: Arc<dyn VendorClient>, request: TextRequest, emitter: Emitter) {
    spawn_supervised(emitter, |emitter| async move {
        match client.generate_text(&request).await {
            Ok(text) => {
                emitter.token(text).await;
            }
            Err(e) => emitter.fail(e.to_string()).await,
        }
    });
}

async fn forward_async(mut tokens: AsyncTokens, emitter: Emitter) {
    while let Some(item) = tokens.next().await {
        match item {
            Ok(token) if token.is_empty() => continue,
            Ok(token) => {
                if !emitter.token(token).await {
                    debug!(provider = emitter.provider, "consumer dropped the stream");
                    return;
                }
            }
            Err(e) => {
                emitter.fail(e.to_string()).await;
                return;
            }
        }
    }
}

async fn forward_blocking(tokens: BlockingTokens, emitter: Emitter) {
    let worker_emitter = emitter.clone();
    let worker = tokio::task::spawn_blocking(move || {
        for item in tokens {
            match item {
                Ok(token) if token.is_empty() => continue,
                Ok(token) => {
                    if !worker_emitter.blocking_token(token) {
                        debug!(provider = worker_emitter.provider, "consumer dropped the stream");
                        return;
                    }
                }
                Err(e) => {
                    worker_emitter.blocking_fail(e.to_string());
                    return;
                }
            }
        }
    });

    if let Err(e) = worker.await
        && e.is_panic()
    {
        emitter.fail("token worker panicked").await;
    }
}
