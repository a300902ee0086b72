//! Cache in front of the chain, composed the way a request handler does it.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use muninn::{
    CacheConfig, CancellationToken, ChainConfig, ChainResponse, Completion, Message,
    ProviderAdapter, ProviderCapabilities, ProviderChain, ProviderError, ResponseCache, Result,
    ToolDefinition,
};

struct SlowAnswer {
    delay: Duration,
    calls: AtomicUsize,
}

#[async_trait]
impl ProviderAdapter for SlowAnswer {
    fn name(&self) -> &str {
        "slow"
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::text_only()
    }

    async fn complete(
        &self,
        _messages: &[Message],
        _tools: Option<&[ToolDefinition]>,
    ) -> std::result::Result<Completion, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(Completion::text("R$ 1.520,50"))
    }
}

/// Cache lookup, chain on miss, write back only on success.
async fn answer(
    cache: &ResponseCache<ChainResponse>,
    chain: &ProviderChain,
    question: &str,
    owner: Option<&str>,
    cancel: &CancellationToken,
) -> Result<ChainResponse> {
    if let Some(hit) = cache.get(question, owner).await {
        return Ok(hit);
    }
    let response = chain
        .complete_with_cancel(&[Message::user(question)], None, cancel)
        .await?;
    cache.set(question, response.clone(), owner).await;
    Ok(response)
}

async fn setup(delay: Duration) -> (ResponseCache<ChainResponse>, ProviderChain, Arc<SlowAnswer>) {
    let adapter = Arc::new(SlowAnswer {
        delay,
        calls: AtomicUsize::new(0),
    });
    let chain = ProviderChain::builder(ChainConfig::new("slow"))
        .adapter(adapter.clone())
        .build();
    let cache = ResponseCache::in_memory(CacheConfig::default()).await;
    (cache, chain, adapter)
}

#[tokio::test(start_paused = true)]
async fn second_paraphrased_question_is_served_from_cache() {
    let (cache, chain, adapter) = setup(Duration::from_millis(500)).await;
    let token = CancellationToken::new();

    let first = answer(
        &cache,
        &chain,
        "Vendas do produto 369946 em 2026-01",
        Some("u1"),
        &token,
    )
    .await
    .unwrap();
    let second = answer(
        &cache,
        &chain,
        "vendas produto 369946 janeiro 2026",
        Some("u1"),
        &token,
    )
    .await
    .unwrap();

    assert_eq!(first, second);
    assert_eq!(second.provider_used, "slow");
    assert_eq!(adapter.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn cancelled_request_leaves_cache_untouched() {
    let (cache, chain, adapter) = setup(Duration::from_secs(10)).await;
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let result = answer(&cache, &chain, "estoque atual", None, &token).await;
    assert!(matches!(result, Err(muninn::MuninnError::Cancelled)));
    assert_eq!(adapter.calls.load(Ordering::SeqCst), 1);
    assert!(cache.is_empty().await);
}
