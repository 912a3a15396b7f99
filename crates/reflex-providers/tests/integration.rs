//! Integration tests for the reflex-providers crate.
//!
//! These tests exercise the provider contract end to end — registry lookup,
//! streaming, the default `complete` path — without requiring a live
//! backend.

use std::sync::Arc;

use futures::StreamExt;
use reflex_providers::{
    Message, ProviderError, ProviderRegistry, ScriptedProvider, StreamRequest, StreamingProvider,
};

#[tokio::test]
async fn registry_roundtrip_through_trait_object() {
    let registry = ProviderRegistry::new();
    registry.register(Arc::new(ScriptedProvider::new("mock", &["one ", "two"])));

    let provider = registry.get("mock").expect("provider should be registered");
    let text = provider
        .complete(StreamRequest::from_prompt("count"))
        .await
        .unwrap();

    assert_eq!(text, "one two");
}

#[tokio::test]
async fn stream_yields_chunks_then_terminal() {
    let provider = ScriptedProvider::new("mock", &["a", "b", "c"]);
    let mut stream = provider
        .stream(StreamRequest::new(vec![
            Message::system("You are terse."),
            Message::user("go"),
        ]))
        .await
        .unwrap();

    let mut contents = Vec::new();
    let mut terminal = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.unwrap();
        if chunk.done {
            terminal += 1;
        } else {
            contents.push(chunk.content);
        }
    }

    assert_eq!(contents, vec!["a", "b", "c"]);
    assert_eq!(terminal, 1);
}

#[tokio::test]
async fn failing_provider_surfaces_stream_error() {
    let registry = ProviderRegistry::new();
    registry.register(Arc::new(
        ScriptedProvider::new("flaky", &["partial"]).fail_after(1),
    ));

    let provider = registry.require("flaky").unwrap();
    let result = provider.complete(StreamRequest::from_prompt("go")).await;

    assert!(matches!(result, Err(ProviderError::Stream { .. })));
}

#[tokio::test]
async fn multiple_providers_are_independent() {
    let registry = ProviderRegistry::new();
    registry.register(Arc::new(ScriptedProvider::new("fast", &["f"])));
    registry.register(Arc::new(ScriptedProvider::new("slow", &["s"])));

    let fast = registry.require("fast").unwrap();
    let slow = registry.require("slow").unwrap();

    let (a, b) = tokio::join!(
        fast.complete(StreamRequest::from_prompt("x")),
        slow.complete(StreamRequest::from_prompt("y")),
    );

    assert_eq!(a.unwrap(), "f");
    assert_eq!(b.unwrap(), "s");
}
