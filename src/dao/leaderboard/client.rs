use std::{sync::Arc, time::Instant};

use futures::future::BoxFuture;
use reqwest::Client;
use tracing::debug;

use crate::dao::models::EventId;

use super::{
    LeaderboardSource,
    config::LeaderboardConfig,
    error::{FetchError, FetchResult},
    models::{ApiResponse, RawPage},
};

/// Leaderboard source backed by the public HTTP API.
#[derive(Clone)]
pub struct HttpLeaderboardClient {
    client: Client,
    endpoint: Arc<str>,
}

impl HttpLeaderboardClient {
    /// Build a client for the configured endpoint.
    pub fn new(config: LeaderboardConfig) -> FetchResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|source| FetchError::ClientBuilder { source })?;

        Ok(Self {
            client,
            endpoint: Arc::from(config.endpoint),
        })
    }

    async fn get_page(&self, event: EventId, stage: u32, page: u32) -> FetchResult<RawPage> {
        let transport = |source| FetchError::Transport {
            event,
            stage,
            page,
            source,
        };

        let query = [
            ("eventId", event.to_string()),
            ("stageId", stage.to_string()),
            ("page", page.to_string()),
            ("leaderboard", "true".to_string()),
            ("assists", "any".to_string()),
            ("noCache", cache_buster()),
        ];

        let started = Instant::now();
        let response = self
            .client
            .get(&*self.endpoint)
            .query(&query)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(transport)?;
        let body = response.bytes().await.map_err(transport)?;
        let elapsed = started.elapsed();

        let payload = serde_json::from_slice::<ApiResponse>(&body).map_err(|source| {
            FetchError::Parse {
                event,
                stage,
                page,
                source,
            }
        })?;

        let raw = RawPage::from_response(event, stage, page, payload, elapsed).map_err(|field| {
            FetchError::MissingField {
                event,
                stage,
                page,
                field,
            }
        })?;

        debug!(
            event_id = event,
            stage,
            page,
            pages = raw.pages,
            elapsed_ms = raw.elapsed_ms(),
            "fetched leaderboard page"
        );

        Ok(raw)
    }
}

impl LeaderboardSource for HttpLeaderboardClient {
    fn fetch_page(
        &self,
        event: EventId,
        stage: u32,
        page: u32,
    ) -> BoxFuture<'static, FetchResult<RawPage>> {
        let client = self.clone();
        Box::pin(async move { client.get_page(event, stage, page).await })
    }
}

/// Random token keeping intermediate caches from serving stale pages.
fn cache_buster() -> String {
    format!("{:x}", rand::random::<u64>())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mockito::Matcher;

    use super::*;

    fn client_for(server: &mockito::ServerGuard) -> HttpLeaderboardClient {
        let config = LeaderboardConfig::new(format!("{}/api/event", server.url()))
            .with_timeout(Duration::from_secs(5));
        HttpLeaderboardClient::new(config).unwrap()
    }

    #[tokio::test]
    async fn sends_fixed_query_and_parses_page() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/event")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("eventId".into(), "91822".into()),
                Matcher::UrlEncoded("stageId".into(), "2".into()),
                Matcher::UrlEncoded("page".into(), "3".into()),
                Matcher::UrlEncoded("leaderboard".into(), "true".into()),
                Matcher::UrlEncoded("assists".into(), "any".into()),
                Matcher::Regex("noCache=[0-9a-f]+".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"Pages": 3, "TotalStages": 4, "LeaderboardTotal": 41,
                    "Entries": [{"Position": 41, "PlayerId": 5, "Name": "Ott",
                                 "VehicleName": "Ford Fiesta", "Time": "05:00.000",
                                 "DiffFirst": "+00:30.000"}]}"#,
            )
            .create_async()
            .await;

        let page = client_for(&server)
            .fetch_page(91822, 2, 3)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!((page.event, page.stage, page.page), (91822, 2, 3));
        assert_eq!(page.pages, 3);
        assert_eq!(page.total, 41);
        assert_eq!(page.entries.len(), 1);
        assert_eq!(page.entries[0].diff_first, "+00:30.000");
    }

    #[tokio::test]
    async fn zero_pages_is_a_page_not_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/event")
            .match_query(Matcher::Any)
            .with_body(r#"{"Pages": 0, "Entries": []}"#)
            .create_async()
            .await;

        let page = client_for(&server).fetch_page(1, 1, 1).await.unwrap();
        assert!(!page.has_leaderboard());
    }

    #[tokio::test]
    async fn non_json_body_is_a_parse_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/event")
            .match_query(Matcher::Any)
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        let err = client_for(&server).fetch_page(1, 0, 1).await.unwrap_err();
        assert!(matches!(err, FetchError::Parse { event: 1, stage: 0, .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn error_json_is_a_parse_error_not_an_empty_board() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/event")
            .match_query(Matcher::Any)
            .with_header("content-type", "application/json")
            .with_body(r#"{"Message":"An error has occurred."}"#)
            .create_async()
            .await;

        let err = client_for(&server).fetch_page(1, 1, 1).await.unwrap_err();
        assert!(matches!(err, FetchError::Parse { stage: 1, page: 1, .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn overview_without_stage_count_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/event")
            .match_query(Matcher::Any)
            .with_body(r#"{"Pages": 1, "Entries": []}"#)
            .create_async()
            .await;

        let err = client_for(&server).fetch_page(7, 0, 1).await.unwrap_err();
        assert!(
            matches!(err, FetchError::MissingField { event: 7, field: "TotalStages", .. }),
            "got {err:?}"
        );
    }

    #[tokio::test]
    async fn error_status_is_a_transport_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/event")
            .match_query(Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let err = client_for(&server).fetch_page(1, 1, 2).await.unwrap_err();
        assert!(matches!(err, FetchError::Transport { page: 2, .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_error() {
        let config = LeaderboardConfig::new("http://127.0.0.1:9/api/event")
            .with_timeout(Duration::from_secs(2));
        let client = HttpLeaderboardClient::new(config).unwrap();

        let err = client.fetch_page(1, 0, 1).await.unwrap_err();
        assert!(matches!(err, FetchError::Transport { .. }), "got {err:?}");
    }
}
