//! Paginated full-collection export with id deduplication.

use std::collections::HashSet;
use std::sync::Mutex;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::guard::BusyFlag;
use super::lock;
use super::progress::ProgressTracker;
use crate::api::UserApi;
use crate::error::SyncResult;
use crate::events::{EventSink, Pipeline};
use crate::models::ExportedRow;

/// Fetches every user page by page and keeps the flattened rows of the
/// last successful run.
pub struct ExportEngine {
    api: UserApi,
    events: EventSink,
    busy: BusyFlag,
    progress: ProgressTracker,
    rows: Mutex<Vec<ExportedRow>>,
}

impl ExportEngine {
    pub fn new(api: UserApi) -> Self {
        let events = api.events().clone();
        Self {
            api,
            progress: ProgressTracker::new(Pipeline::Export, events.clone()),
            events,
            busy: BusyFlag::new(Pipeline::Export),
            rows: Mutex::new(Vec::new()),
        }
    }

    pub fn progress(&self) -> u8 {
        self.progress.get()
    }

    /// Rows from the last successful export.
    pub fn rows(&self) -> Vec<ExportedRow> {
        lock(&self.rows).clone()
    }

    /// Follow `nextPage` from the first page until the server stops
    /// returning one. Any failed page aborts the run and leaves the
    /// previous rows in place; page URLs are never replayed.
    pub async fn run(&self) -> SyncResult<Vec<ExportedRow>> {
        let _guard = self.busy.try_acquire()?;

        let run_id = Uuid::new_v4();
        info!(%run_id, "Export run started");
        self.events.info("Exporting users");
        self.progress.reset();

        let mut url = self.api.export_first_url();
        let mut seen: HashSet<String> = HashSet::new();
        let mut rows = Vec::new();
        let mut fetched: u32 = 0;
        let mut duplicates = 0usize;
        let mut missing_id = 0usize;

        loop {
            let page = match self.api.fetch_page(&url).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(%run_id, page = fetched + 1, error = %e, "Export page failed");
                    self.events
                        .error(format!("Export aborted on page {}: {}", fetched + 1, e));
                    self.progress.reset();
                    return Err(e);
                }
            };
            fetched += 1;

            for user in &page.users {
                if user.id.is_empty() {
                    missing_id += 1;
                } else if seen.insert(user.id.clone()) {
                    rows.push(user.project());
                } else {
                    duplicates += 1;
                }
            }

            let pager = page.pager.unwrap_or_default();
            debug!(
                page = pager.page,
                page_count = pager.page_count,
                users = page.users.len(),
                "Export page fetched"
            );
            self.progress.advance_to(pager.percent_after(fetched));

            match pager.next_page {
                Some(next) if !next.is_empty() && next != url => url = next,
                Some(next) if next == url => {
                    warn!(%run_id, url = %next, "Pager points back at the current page, stopping");
                    break;
                }
                _ => break,
            }
        }

        if duplicates > 0 {
            debug!(%run_id, duplicates, "Skipped users repeated across pages");
        }
        if missing_id > 0 {
            warn!(%run_id, missing_id, "Skipped users without an id");
            self.events
                .warning(format!("Skipped {} user(s) without an id", missing_id));
        }
        info!(%run_id, pages = fetched, rows = rows.len(), unique = seen.len(), "Export run ended");
        self.events
            .success(format!("Exported {} user(s) from {} page(s)", rows.len(), fetched));

        *lock(&self.rows) = rows.clone();
        self.progress.reset();
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{MockHttpClient, MockResponse};
    use crate::error::SyncError;
    use crate::events::{create_event_channel, drain, SyncEvent};
    use crate::sync::testing::{api_with, assert_monotonic, config, progress_values};
    use crate::traits::Method;
    use serde_json::{json, Value};

    const PAGE2: &str = "https://dhis.test/api/users?page=2";
    const PAGE3: &str = "https://dhis.test/api/users?page=3";

    fn user(id: &str) -> Value {
        json!({"id": id, "name": format!("User {}", id), "username": id})
    }

    fn page(n: u32, count: u32, next: Option<&str>, users: Vec<Value>) -> MockResponse {
        let mut pager = json!({"page": n, "pageCount": count});
        if let Some(next) = next {
            pager["nextPage"] = json!(next);
        }
        MockResponse::json(200, json!({"pager": pager, "users": users}))
    }

    fn setup(events: EventSink) -> (MockHttpClient, ExportEngine) {
        let mock = MockHttpClient::new();
        let engine = ExportEngine::new(api_with(&mock, config(), events));
        (mock, engine)
    }

    fn first_url(engine: &ExportEngine) -> String {
        engine.api.export_first_url()
    }

    #[tokio::test]
    async fn test_overlapping_pages_deduplicated() {
        let (sink, mut rx) = create_event_channel();
        let (mock, engine) = setup(sink);
        mock.set_response(
            Method::Get,
            &first_url(&engine),
            page(1, 3, Some(PAGE2), vec![user("a"), user("b")]),
        );
        mock.set_response(
            Method::Get,
            PAGE2,
            page(2, 3, Some(PAGE3), vec![user("b"), user("c")]),
        );
        mock.set_response(Method::Get, PAGE3, page(3, 3, None, vec![user("d")]));

        let rows = engine.run().await.unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
        assert_eq!(mock.get_requests().len(), 3);
        assert_eq!(engine.rows(), rows);

        let values = progress_values(&drain(&mut rx));
        assert_eq!(values, vec![0, 33, 66, 100, 0]);
        assert_monotonic(&values);
    }

    #[tokio::test]
    async fn test_undercounted_total_clamps_progress() {
        let (sink, mut rx) = create_event_channel();
        let (mock, engine) = setup(sink);
        mock.set_response(
            Method::Get,
            &first_url(&engine),
            page(1, 1, Some(PAGE2), vec![user("a")]),
        );
        mock.set_response(Method::Get, PAGE2, page(2, 1, None, vec![user("b")]));

        let rows = engine.run().await.unwrap();
        assert_eq!(rows.len(), 2);
        let values = progress_values(&drain(&mut rx));
        assert!(values.iter().all(|v| *v <= 100));
        assert_monotonic(&values);
    }

    #[tokio::test]
    async fn test_failed_page_aborts_and_keeps_previous_rows() {
        let (mock, engine) = setup(EventSink::disabled());
        mock.set_response(
            Method::Get,
            &first_url(&engine),
            page(1, 1, None, vec![user("a")]),
        );
        engine.run().await.unwrap();
        assert_eq!(engine.rows().len(), 1);

        mock.set_response(
            Method::Get,
            &first_url(&engine),
            page(1, 2, Some(PAGE2), vec![user("x"), user("y")]),
        );
        mock.set_response(Method::Get, PAGE2, MockResponse::status(400));
        mock.clear_requests();

        let err = engine.run().await.unwrap_err();
        assert!(matches!(err, SyncError::Network(_)));
        assert_eq!(mock.get_requests().len(), 2);
        assert_eq!(engine.rows()[0].id, "a");
        assert_eq!(engine.progress(), 0);
    }

    #[tokio::test]
    async fn test_transient_page_failure_aborts_without_resend() {
        let (mock, engine) = setup(EventSink::disabled());
        mock.set_response(
            Method::Get,
            &first_url(&engine),
            page(1, 2, Some(PAGE2), vec![user("a")]),
        );
        mock.push_response(Method::Get, PAGE2, MockResponse::status(503));
        mock.push_response(Method::Get, PAGE2, page(2, 2, None, vec![user("b")]));

        let err = engine.run().await.unwrap_err();
        assert!(matches!(err, SyncError::Network(ref e) if e.has_status(503)));
        let page2: Vec<_> = mock
            .requests_with(Method::Get)
            .into_iter()
            .filter(|r| r.url == PAGE2)
            .collect();
        assert_eq!(page2.len(), 1);
        assert!(engine.rows().is_empty());
    }

    #[tokio::test]
    async fn test_users_without_id_are_skipped() {
        let (sink, mut rx) = create_event_channel();
        let (mock, engine) = setup(sink);
        mock.set_response(
            Method::Get,
            &first_url(&engine),
            page(
                1,
                1,
                None,
                vec![
                    json!({"username": "ghost1"}),
                    user("a"),
                    json!({"id": null, "username": "ghost2"}),
                ],
            ),
        );

        let rows = engine.run().await.unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a"]);
        let warned = drain(&mut rx).into_iter().any(|e| {
            matches!(e, SyncEvent::Log(ref l) if l.message.contains("without an id"))
        });
        assert!(warned);
    }

    #[tokio::test]
    async fn test_next_page_pointing_at_itself_stops() {
        let (mock, engine) = setup(EventSink::disabled());
        let first = first_url(&engine);
        mock.set_response(Method::Get, &first, page(1, 2, Some(&first), vec![user("a")]));

        let rows = engine.run().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(mock.get_requests().len(), 1);
    }
}
