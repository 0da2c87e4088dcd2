//! Polling JSON feeds.
//!
//! A [`PollingFeed`] owns one background task that fetches a URL on start
//! and then on every tick of its interval. The latest `{data, error, loading}`
//! snapshot is published on a `watch` channel.
//!
//! The task selects over:
//! - cancellation (explicit or by dropping the handle)
//! - a reload request
//! - the next interval tick
//! - the in-flight request
//!
//! Starting a new fetch drops the previous in-flight request, which aborts
//! it. A failed fetch records the error, keeps the last good data, and waits
//! for the next tick; there is no backoff.

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use thiserror::Error;
use tokio::{
    sync::{watch, Notify},
    time::{Interval, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(7);

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FeedError {
    #[error("request failed: {0}")]
    Http(String),

    #[error("HTTP error! status: {0}")]
    Status(u16),

    #[error("invalid feed payload: {0}")]
    Decode(String),
}

/// Snapshot published after every state change.
#[derive(Clone, Debug)]
pub struct FeedState<T> {
    pub data: Option<T>,
    pub error: Option<FeedError>,
    pub loading: bool,
}

impl<T> FeedState<T> {
    fn initial(loading: bool) -> Self {
        Self {
            data: None,
            error: None,
            loading,
        }
    }
}

#[derive(Clone, Debug)]
pub struct FeedOptions {
    pub url: String,
    /// `None` fetches once and then only on [`PollingFeed::reload`].
    pub interval: Option<Duration>,
    /// A disabled feed never fetches.
    pub enabled: bool,
}

impl FeedOptions {
    pub fn polling(url: impl Into<String>, interval: Duration) -> Self {
        Self {
            url: url.into(),
            interval: Some(interval),
            enabled: true,
        }
    }

    pub fn one_shot(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            interval: None,
            enabled: true,
        }
    }
}

type Parser<T> = dyn Fn(&[u8]) -> Result<T, FeedError> + Send + Sync;
type Fetch<T> = Pin<Box<dyn Future<Output = Result<T, FeedError>> + Send>>;

/// Handle to a running feed. Dropping it stops the background task.
pub struct PollingFeed<T> {
    state: watch::Receiver<FeedState<T>>,
    reload: Arc<Notify>,
    cancel: CancellationToken,
    enabled: bool,
}

impl<T> PollingFeed<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Start polling. Must be called inside a tokio runtime.
    pub fn spawn<F>(http: reqwest::Client, options: FeedOptions, parse: F) -> Self
    where
        F: Fn(&[u8]) -> Result<T, FeedError> + Send + Sync + 'static,
    {
        let (tx, rx) = watch::channel(FeedState::initial(options.enabled));
        let reload = Arc::new(Notify::new());
        let cancel = CancellationToken::new();

        if options.enabled {
            let worker = FeedWorker {
                http,
                url: options.url,
                parse: Arc::new(parse),
                state: tx,
                reload: reload.clone(),
                cancel: cancel.clone(),
            };
            tokio::spawn(worker.run(options.interval));
        } else {
            debug!("Feed {} is disabled", options.url);
        }

        Self {
            state: rx,
            reload,
            cancel,
            enabled: options.enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Latest snapshot.
    pub fn state(&self) -> FeedState<T> {
        (*self.state.borrow()).clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedState<T>> {
        self.state.clone()
    }

    /// Fetch now, aborting any in-flight request.
    pub fn reload(&self) {
        self.reload.notify_one();
    }

    /// Stop the background task.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the next published snapshot. `None` once the feed stopped.
    pub async fn changed(&mut self) -> Option<FeedState<T>> {
        self.state.changed().await.ok()?;
        Some((*self.state.borrow_and_update()).clone())
    }

    /// Wait until a snapshot satisfies `predicate`.
    pub async fn wait_for(
        &mut self,
        mut predicate: impl FnMut(&FeedState<T>) -> bool,
    ) -> Option<FeedState<T>> {
        let state = self.state.wait_for(|state| predicate(state)).await.ok()?;
        Some((*state).clone())
    }
}

impl<T> Drop for PollingFeed<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct FeedWorker<T> {
    http: reqwest::Client,
    url: String,
    parse: Arc<Parser<T>>,
    state: watch::Sender<FeedState<T>>,
    reload: Arc<Notify>,
    cancel: CancellationToken,
}

impl<T> FeedWorker<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn run(self, interval: Option<Duration>) {
        let mut ticker = interval.map(|period| {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });
        // An interval's first tick is immediate; a one-shot feed fetches here.
        let mut in_flight: Option<Fetch<T>> = match ticker {
            Some(_) => None,
            None => Some(self.fetch()),
        };

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    debug!("Feed {} cancelled", self.url);
                    break;
                }

                _ = self.reload.notified() => {
                    in_flight = Some(self.fetch());
                }

                _ = next_tick(&mut ticker) => {
                    in_flight = Some(self.fetch());
                }

                result = settle(&mut in_flight) => {
                    in_flight = None;
                    self.publish(result);
                }
            }
        }
    }

    fn fetch(&self) -> Fetch<T> {
        Box::pin(fetch_once(
            self.http.clone(),
            self.url.clone(),
            self.parse.clone(),
        ))
    }

    fn publish(&self, result: Result<T, FeedError>) {
        match result {
            Ok(data) => self.state.send_modify(|state| {
                state.data = Some(data);
                state.error = None;
                state.loading = false;
            }),
            Err(err) => {
                warn!("Feed {} failed: {}", self.url, err);
                self.state.send_modify(|state| {
                    state.error = Some(err);
                    state.loading = false;
                });
            }
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

async fn settle<T>(in_flight: &mut Option<Fetch<T>>) -> Result<T, FeedError> {
    match in_flight {
        Some(fetch) => fetch.await,
        None => std::future::pending().await,
    }
}

async fn fetch_once<T>(
    http: reqwest::Client,
    url: String,
    parse: Arc<Parser<T>>,
) -> Result<T, FeedError> {
    let response = http
        .get(&url)
        .send()
        .await
        .map_err(|err| FeedError::Http(err.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(FeedError::Status(status.as_u16()));
    }
    let body = response
        .bytes()
        .await
        .map_err(|err| FeedError::Http(err.to_string()))?;
    parse(&body)
}

/// Parse a JSON body into `T`.
pub fn parse_json<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, FeedError> {
    serde_json::from_slice(body).map_err(|err| FeedError::Decode(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves `/feed` returning the hit count, failing on hits listed in
    /// `fail_on`.
    async fn stub_feed(fail_on: &'static [usize]) -> (String, Arc<AtomicUsize>) {
        async fn feed(
            State((hits, fail_on)): State<(Arc<AtomicUsize>, &'static [usize])>,
        ) -> Result<Json<Value>, StatusCode> {
            let hit = hits.fetch_add(1, Ordering::SeqCst) + 1;
            if fail_on.contains(&hit) {
                return Err(StatusCode::SERVICE_UNAVAILABLE);
            }
            Ok(Json(json!({ "hit": hit })))
        }

        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route("/feed", get(feed))
            .with_state((hits.clone(), fail_on));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/feed"), hits)
    }

    fn hit_parser(body: &[u8]) -> Result<u64, FeedError> {
        let value: Value = parse_json(body)?;
        value["hit"]
            .as_u64()
            .ok_or_else(|| FeedError::Decode("missing hit".into()))
    }

    #[tokio::test]
    async fn publishes_data_then_polls_again() {
        let (url, _) = stub_feed(&[]).await;
        let mut feed = PollingFeed::spawn(
            reqwest::Client::new(),
            FeedOptions::polling(url, Duration::from_millis(50)),
            hit_parser,
        );
        assert!(feed.state().loading);

        let first = feed.wait_for(|s| s.data.is_some()).await.unwrap();
        assert!(!first.loading);
        assert!(first.error.is_none());

        let later = feed
            .wait_for(|s| s.data.map(|hit| hit >= 3).unwrap_or(false))
            .await
            .unwrap();
        assert!(later.error.is_none());
    }

    #[tokio::test]
    async fn errors_keep_last_data_and_recover() {
        let (url, _) = stub_feed(&[2]).await;
        let mut feed = PollingFeed::spawn(
            reqwest::Client::new(),
            FeedOptions::polling(url, Duration::from_millis(50)),
            hit_parser,
        );

        let failed = feed.wait_for(|s| s.error.is_some()).await.unwrap();
        assert_eq!(failed.error, Some(FeedError::Status(503)));
        assert_eq!(failed.data, Some(1));

        let recovered = feed.wait_for(|s| s.data == Some(3)).await.unwrap();
        assert!(recovered.error.is_none());
    }

    #[tokio::test]
    async fn one_shot_fetches_once_until_reload() {
        let (url, hits) = stub_feed(&[]).await;
        let mut feed = PollingFeed::spawn(
            reqwest::Client::new(),
            FeedOptions::one_shot(url),
            hit_parser,
        );

        feed.wait_for(|s| s.data == Some(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        feed.reload();
        feed.wait_for(|s| s.data == Some(2)).await.unwrap();
    }

    #[tokio::test]
    async fn disabled_feed_never_fetches() {
        let (url, hits) = stub_feed(&[]).await;
        let options = FeedOptions {
            enabled: false,
            ..FeedOptions::one_shot(url)
        };
        let feed = PollingFeed::spawn(reqwest::Client::new(), options, hit_parser);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!feed.is_enabled());
        assert!(!feed.state().loading);
        assert!(feed.state().data.is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancel_stops_polling() {
        let (url, hits) = stub_feed(&[]).await;
        let mut feed = PollingFeed::spawn(
            reqwest::Client::new(),
            FeedOptions::polling(url, Duration::from_millis(30)),
            hit_parser,
        );
        feed.wait_for(|s| s.data.is_some()).await.unwrap();

        feed.cancel();
        while feed.changed().await.is_some() {}
        tokio::time::sleep(Duration::from_millis(50)).await;
        let after_cancel = hits.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(hits.load(Ordering::SeqCst), after_cancel);
    }

    #[tokio::test]
    async fn decode_errors_are_reported() {
        let (url, _) = stub_feed(&[]).await;
        let mut feed = PollingFeed::spawn(
            reqwest::Client::new(),
            FeedOptions::one_shot(url),
            |_body: &[u8]| -> Result<u64, FeedError> { Err(FeedError::Decode("bad".into())) },
        );
        let state = feed.wait_for(|s| !s.loading).await.unwrap();
        assert_eq!(state.error, Some(FeedError::Decode("bad".into())));
        assert!(state.data.is_none());
    }
}
