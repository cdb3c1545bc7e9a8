//! Notification dispatcher.
//!
//! Reacts to the store's change feed (route started, chat inquiry created)
//! and to a periodic proximity scan of planned routes. Handlers only read
//! state and send, so running one twice only repeats the notification.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use vanlink_core::{AccountId, PushToken};
use vanlink_store::{Account, ChangeEvent, Chat, Route, RouteStatus, Store};

use crate::error::Result;
use crate::messages;
use crate::transport::PushTransport;
use crate::types::{DispatchReport, NotifyConfig, PushPayload};

/// Dispatches push notifications for route and chat events.
pub struct NotificationDispatcher<S: Store, P: PushTransport> {
    store: Arc<S>,
    transport: Arc<P>,
    config: NotifyConfig,
}

impl<S, P> NotificationDispatcher<S, P>
where
    S: Store + 'static,
    P: PushTransport + 'static,
{
    /// Create a new dispatcher.
    #[must_use]
    pub fn new(store: Arc<S>, transport: Arc<P>, config: NotifyConfig) -> Self {
        Self {
            store,
            transport,
            config,
        }
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &NotifyConfig {
        &self.config
    }

    /// Handle one change event.
    ///
    /// Returns the dispatch report if a notification was sent.
    pub async fn handle_event(&self, event: &ChangeEvent) -> Option<DispatchReport> {
        match event {
            ChangeEvent::RouteWritten { before, after, .. } => {
                self.on_route_written(before.as_ref(), after).await
            }
            ChangeEvent::ChatCreated { chat, .. } => self.on_chat_created(chat).await,
        }
    }

    /// Notify the route's students when the driver starts it.
    ///
    /// Fires only on an update that moves the status into `emAndamento`.
    pub async fn on_route_written(
        &self,
        before: Option<&Route>,
        after: &Route,
    ) -> Option<DispatchReport> {
        let before = before?;
        if before.status == RouteStatus::InProgress || after.status != RouteStatus::InProgress {
            return None;
        }

        info!(route_id = %after.route_id, "Route started");

        if after.student_ids.is_empty() {
            info!(route_id = %after.route_id, "Route has no students, nothing to notify");
            return None;
        }

        let tokens = self.resolve_tokens(&after.student_ids).await;
        if tokens.is_empty() {
            info!(route_id = %after.route_id, "No student push tokens found for route");
            return None;
        }

        Some(
            self.deliver("route_started", &tokens, &messages::route_started(after))
                .await,
        )
    }

    /// Notify the driver of a new chat inquiry from a student.
    pub async fn on_chat_created(&self, chat: &Chat) -> Option<DispatchReport> {
        if !chat.is_inquiry() {
            return None;
        }

        if chat.participants.len() != 2 {
            warn!(
                chat_id = %chat.chat_id,
                participants = chat.participants.len(),
                "Inquiry chat does not have two participants"
            );
            return None;
        }

        let Some(student_id) = chat.last_message.as_ref().and_then(|m| m.sender_id.as_ref())
        else {
            warn!(chat_id = %chat.chat_id, "Inquiry chat has no sender");
            return None;
        };

        let Some(driver_id) = chat.participants.iter().find(|p| *p != student_id) else {
            warn!(chat_id = %chat.chat_id, "Inquiry chat has no driver participant");
            return None;
        };

        let token = match self.store.get_account(driver_id) {
            Ok(account) => account.and_then(|a| a.usable_push_token().cloned()),
            Err(e) => {
                error!(chat_id = %chat.chat_id, driver_id = %driver_id, error = %e, "Failed to read driver account");
                return None;
            }
        };

        let Some(token) = token else {
            info!(chat_id = %chat.chat_id, driver_id = %driver_id, "Driver has no push token");
            return None;
        };

        let student_name = match self.store.get_account(student_id) {
            Ok(account) => account.and_then(|a| a.display_name),
            Err(e) => {
                warn!(student_id = %student_id, error = %e, "Failed to read student account");
                None
            }
        };

        let payload = messages::chat_inquiry(&chat.chat_id, student_name.as_deref());
        Some(self.deliver("chat_inquiry", &[token], &payload).await)
    }

    /// Notify the students of every planned route starting inside the
    /// proximity window measured from `now`.
    ///
    /// Routes are handled concurrently; one route's failure does not affect
    /// the others. Returns a report for each route a notification was sent for.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured window is out of range or the
    /// route query fails.
    pub async fn run_proximity_scan(&self, now: DateTime<Utc>) -> Result<Vec<DispatchReport>> {
        let (from, until) = self.config.proximity_window(now)?;

        let routes = self
            .store
            .list_routes_starting_between(&RouteStatus::Planned, from, until)?;

        if routes.is_empty() {
            debug!(%from, %until, "No routes starting soon");
            return Ok(Vec::new());
        }

        info!(count = routes.len(), %from, %until, "Notifying routes starting soon");

        let reports = join_all(routes.iter().map(|route| self.notify_departing(route))).await;
        Ok(reports.into_iter().flatten().collect())
    }

    async fn notify_departing(&self, route: &Route) -> Option<DispatchReport> {
        if route.student_ids.is_empty() {
            debug!(route_id = %route.route_id, "Route has no students");
            return None;
        }

        let tokens = self.resolve_tokens(&route.student_ids).await;
        if tokens.is_empty() {
            info!(route_id = %route.route_id, "No student push tokens found for route");
            return None;
        }

        Some(
            self.deliver(
                "route_departing_soon",
                &tokens,
                &messages::route_departing_soon(route),
            )
            .await,
        )
    }

    /// Look up the push token of each account.
    ///
    /// Store reads block, so each lookup runs on the blocking pool and the
    /// lookups proceed in parallel. Accounts without a usable token are
    /// skipped; a token shared by several accounts appears once.
    async fn resolve_tokens(&self, account_ids: &[AccountId]) -> Vec<PushToken> {
        let lookups = account_ids.iter().cloned().map(|account_id| {
            let store = Arc::clone(&self.store);
            tokio::task::spawn_blocking(move || {
                let account = store.get_account(&account_id);
                (account_id, account)
            })
        });

        let mut seen = HashSet::new();
        let mut tokens = Vec::new();
        for joined in join_all(lookups).await {
            let token = match joined {
                Ok((account_id, account)) => usable_token(&account_id, &account),
                Err(e) => {
                    warn!(error = %e, "Token lookup task failed");
                    None
                }
            };
            if let Some(token) = token {
                if seen.insert(token.clone()) {
                    tokens.push(token);
                }
            }
        }
        tokens
    }

    async fn deliver(
        &self,
        kind: &'static str,
        tokens: &[PushToken],
        payload: &PushPayload,
    ) -> DispatchReport {
        match self.transport.send(tokens, payload).await {
            Ok(outcomes) => {
                for outcome in outcomes.iter().filter(|o| !o.is_success()) {
                    warn!(
                        kind,
                        token = %outcome.token.fingerprint(),
                        error = outcome.error.as_deref().unwrap_or_default(),
                        "Push delivery failed"
                    );
                }
                let report = DispatchReport::from_outcomes(&outcomes);
                info!(
                    kind,
                    success_count = report.success_count,
                    failure_count = report.failure_count,
                    "Dispatched notification"
                );
                report
            }
            Err(e) => {
                error!(
                    kind,
                    tokens = tokens.len(),
                    retriable = e.is_retriable(),
                    error = %e,
                    "Push dispatch failed"
                );
                DispatchReport::all_failed(tokens.len())
            }
        }
    }

    /// Consume the change feed, handling each event on its own task.
    ///
    /// Runs until the feed closes. It should be spawned as a background task.
    pub async fn run_event_loop(self: Arc<Self>, mut events: broadcast::Receiver<ChangeEvent>) {
        info!("Starting notification event loop");

        loop {
            match events.recv().await {
                Ok(event) => {
                    let dispatcher = Arc::clone(&self);
                    tokio::spawn(async move {
                        dispatcher.handle_event(&event).await;
                    });
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Notification event loop lagged, events dropped");
                }
                Err(RecvError::Closed) => {
                    info!("Change feed closed, stopping notification event loop");
                    break;
                }
            }
        }
    }

    /// Run the proximity scan on a fixed interval.
    ///
    /// Runs indefinitely. It should be spawned as a background task.
    pub async fn run_schedule(self: Arc<Self>) {
        let period = self.config.proximity_interval().max(Duration::from_secs(1));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval_secs = period.as_secs(), "Starting proximity schedule");

        loop {
            interval.tick().await;
            let now = Utc::now();
            match self.run_proximity_scan(now).await {
                Ok(reports) => debug!(routes = reports.len(), "Proximity scan complete"),
                Err(e) => error!(error = %e, "Proximity scan failed"),
            }
        }
    }
}

fn usable_token(
    account_id: &AccountId,
    account: &vanlink_store::Result<Option<Account>>,
) -> Option<PushToken> {
    match account {
        Ok(Some(account)) => {
            let token = account.usable_push_token().cloned();
            if token.is_none() {
                debug!(account_id = %account_id, "Account has no push token");
            }
            token
        }
        Ok(None) => {
            debug!(account_id = %account_id, "Account not found");
            None
        }
        Err(e) => {
            warn!(account_id = %account_id, error = %e, "Failed to read account");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockPushTransport;
    use tempfile::TempDir;
    use vanlink_core::{ChatId, RouteId};
    use vanlink_store::{Account, AccountRole, ChatMessage, RocksStore};

    type TestDispatcher = NotificationDispatcher<RocksStore, MockPushTransport>;

    fn id(s: &str) -> AccountId {
        AccountId::new(s).unwrap()
    }

    fn setup() -> (Arc<TestDispatcher>, Arc<RocksStore>, Arc<MockPushTransport>, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RocksStore::open(dir.path()).unwrap());
        let transport = Arc::new(MockPushTransport::new());
        let dispatcher = Arc::new(NotificationDispatcher::new(
            Arc::clone(&store),
            Arc::clone(&transport),
            NotifyConfig::default(),
        ));
        (dispatcher, store, transport, dir)
    }

    fn account(store: &RocksStore, account_id: &str, name: Option<&str>, token: Option<&str>) {
        store
            .put_account(&Account {
                account_id: id(account_id),
                role: AccountRole::Student,
                email: None,
                display_name: name.map(str::to_string),
                push_token: token.map(PushToken::new),
                updated_at: Utc::now(),
            })
            .unwrap();
    }

    fn route(route_id: &str, status: RouteStatus, students: &[&str]) -> Route {
        Route {
            route_id: RouteId::new(route_id).unwrap(),
            name: Some("Manhã".to_string()),
            status,
            student_ids: students.iter().map(|s| id(s)).collect(),
            start_time: None,
            driver_id: Some(id("driver-1")),
        }
    }

    fn inquiry(participants: &[&str], sender: Option<&str>) -> Chat {
        Chat {
            chat_id: ChatId::new("chat-1").unwrap(),
            status: "inquiry".to_string(),
            participants: participants.iter().map(|s| id(s)).collect(),
            last_message: Some(ChatMessage {
                sender_id: sender.map(id),
                text: "Oi".to_string(),
            }),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn route_started_sends_to_students_with_tokens() {
        let (dispatcher, store, transport, _dir) = setup();
        account(&store, "s1", None, Some("T1"));
        account(&store, "s2", None, None);

        let before = route("route-1", RouteStatus::Planned, &["s1", "s2"]);
        let mut after = before.clone();
        after.status = RouteStatus::InProgress;

        let report = dispatcher.on_route_written(Some(&before), &after).await;
        assert_eq!(
            report,
            Some(DispatchReport {
                success_count: 1,
                failure_count: 0
            })
        );

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].tokens, vec![PushToken::new("T1")]);
        assert_eq!(sent[0].payload.title, "Sua van está a caminho!");
        assert_eq!(
            sent[0].payload.data.get("rotaId").map(String::as_str),
            Some("route-1")
        );
    }

    #[tokio::test]
    async fn route_started_ignores_other_transitions() {
        let (dispatcher, store, transport, _dir) = setup();
        account(&store, "s1", None, Some("T1"));

        let planned = route("route-1", RouteStatus::Planned, &["s1"]);
        let running = route("route-1", RouteStatus::InProgress, &["s1"]);
        let finished = route("route-1", RouteStatus::Finished, &["s1"]);

        assert!(dispatcher.on_route_written(Some(&running), &running).await.is_none());
        assert!(dispatcher.on_route_written(Some(&running), &finished).await.is_none());
        assert!(dispatcher.on_route_written(Some(&planned), &planned).await.is_none());
        assert!(dispatcher.on_route_written(None, &running).await.is_none());
        assert_eq!(transport.batch_count(), 0);
    }

    #[tokio::test]
    async fn route_started_without_tokens_sends_nothing() {
        let (dispatcher, store, transport, _dir) = setup();
        account(&store, "s1", None, Some("   "));

        let before = route("route-1", RouteStatus::Planned, &["s1", "missing"]);
        let after = route("route-1", RouteStatus::InProgress, &["s1", "missing"]);

        assert!(dispatcher.on_route_written(Some(&before), &after).await.is_none());

        let empty_before = route("route-2", RouteStatus::Planned, &[]);
        let empty_after = route("route-2", RouteStatus::InProgress, &[]);
        assert!(dispatcher
            .on_route_written(Some(&empty_before), &empty_after)
            .await
            .is_none());
        assert_eq!(transport.batch_count(), 0);
    }

    #[tokio::test]
    async fn per_token_failures_are_counted() {
        let (dispatcher, store, transport, _dir) = setup();
        account(&store, "s1", None, Some("T1"));
        account(&store, "s2", None, Some("T2"));
        transport.reject_token("T2");

        let before = route("route-1", RouteStatus::Planned, &["s1", "s2"]);
        let after = route("route-1", RouteStatus::InProgress, &["s1", "s2"]);

        let report = dispatcher.on_route_written(Some(&before), &after).await.unwrap();
        assert_eq!(report.success_count, 1);
        assert_eq!(report.failure_count, 1);
    }

    #[tokio::test]
    async fn transport_outage_counts_all_as_failed() {
        let (dispatcher, store, transport, _dir) = setup();
        account(&store, "s1", None, Some("T1"));
        transport.set_unavailable(true);

        let before = route("route-1", RouteStatus::Planned, &["s1"]);
        let after = route("route-1", RouteStatus::InProgress, &["s1"]);

        let report = dispatcher.on_route_written(Some(&before), &after).await.unwrap();
        assert_eq!(report, DispatchReport::all_failed(1));
    }

    #[tokio::test]
    async fn chat_inquiry_notifies_driver() {
        let (dispatcher, store, transport, _dir) = setup();
        account(&store, "student-1", Some("Maria"), Some("TS"));
        account(&store, "driver-1", None, Some("TD"));

        let chat = inquiry(&["student-1", "driver-1"], Some("student-1"));
        let report = dispatcher.on_chat_created(&chat).await.unwrap();
        assert_eq!(report.success_count, 1);

        let sent = transport.sent();
        assert_eq!(sent[0].tokens, vec![PushToken::new("TD")]);
        assert_eq!(sent[0].payload.body, "Maria quer iniciar uma conversa com você.");
        assert_eq!(
            sent[0].payload.data.get("screen").map(String::as_str),
            Some("tela_lista_chats")
        );
    }

    #[tokio::test]
    async fn chat_inquiry_without_name_uses_fallback() {
        let (dispatcher, store, transport, _dir) = setup();
        account(&store, "driver-1", None, Some("TD"));

        let chat = inquiry(&["student-1", "driver-1"], Some("student-1"));
        dispatcher.on_chat_created(&chat).await.unwrap();
        assert!(transport.sent()[0].payload.body.starts_with("Um aluno"));
    }

    #[tokio::test]
    async fn malformed_chats_are_ignored() {
        let (dispatcher, store, transport, _dir) = setup();
        account(&store, "driver-1", None, Some("TD"));

        let mut not_inquiry = inquiry(&["student-1", "driver-1"], Some("student-1"));
        not_inquiry.status = "active".to_string();
        assert!(dispatcher.on_chat_created(&not_inquiry).await.is_none());

        let three = inquiry(&["student-1", "driver-1", "x"], Some("student-1"));
        assert!(dispatcher.on_chat_created(&three).await.is_none());

        let no_sender = inquiry(&["student-1", "driver-1"], None);
        assert!(dispatcher.on_chat_created(&no_sender).await.is_none());

        let driver_without_token = inquiry(&["student-1", "driver-2"], Some("student-1"));
        assert!(dispatcher.on_chat_created(&driver_without_token).await.is_none());

        assert_eq!(transport.batch_count(), 0);
    }

    #[tokio::test]
    async fn proximity_scan_selects_window() {
        let (dispatcher, store, transport, _dir) = setup();
        account(&store, "s1", None, Some("T1"));
        let now = Utc::now();

        let mut soon = route("soon", RouteStatus::Planned, &["s1"]);
        soon.start_time = Some(now + chrono::Duration::minutes(12));
        let mut later = route("later", RouteStatus::Planned, &["s1"]);
        later.start_time = Some(now + chrono::Duration::minutes(16));
        let mut running = route("running", RouteStatus::InProgress, &["s1"]);
        running.start_time = Some(now + chrono::Duration::minutes(12));
        let mut edge = route("edge", RouteStatus::Planned, &["s1"]);
        edge.start_time = Some(now + chrono::Duration::minutes(15));

        for r in [&soon, &later, &running, &edge] {
            store.put_route(r).unwrap();
        }

        let reports = dispatcher.run_proximity_scan(now).await.unwrap();
        assert_eq!(reports.len(), 1);

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].payload.title, "Sua van está quase saindo!");
        assert_eq!(sent[0].payload.data.get("rotaId").map(String::as_str), Some("soon"));
    }

    #[tokio::test]
    async fn shared_device_token_is_sent_once() {
        let (dispatcher, store, transport, _dir) = setup();
        account(&store, "s1", None, Some("T1"));
        account(&store, "s2", None, Some("T1"));
        account(&store, "s3", None, Some("T3"));

        let before = route("route-1", RouteStatus::Planned, &["s1", "s2", "s3"]);
        let mut after = before.clone();
        after.status = RouteStatus::InProgress;

        let report = dispatcher.on_route_written(Some(&before), &after).await;
        assert_eq!(report.map(|r| r.success_count), Some(2));

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].tokens, vec![PushToken::new("T1"), PushToken::new("T3")]);
    }

    #[tokio::test]
    async fn out_of_range_window_fails_scan_without_panicking() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RocksStore::open(dir.path()).unwrap());
        let transport = Arc::new(MockPushTransport::new());
        let config = NotifyConfig {
            window_end_minutes: i64::MAX,
            ..NotifyConfig::default()
        };
        let dispatcher = NotificationDispatcher::new(store, Arc::clone(&transport), config);

        let err = dispatcher.run_proximity_scan(Utc::now()).await.unwrap_err();
        assert!(matches!(err, crate::error::NotifyError::Config(_)));
        assert_eq!(transport.batch_count(), 0);
    }

    #[tokio::test]
    async fn proximity_scan_handles_each_route() {
        let (dispatcher, store, transport, _dir) = setup();
        account(&store, "s1", None, Some("T1"));
        account(&store, "s2", None, Some("T2"));
        let now = Utc::now();

        for (route_id, student) in [("a", "s1"), ("b", "s2"), ("c", "nobody")] {
            let mut r = route(route_id, RouteStatus::Planned, &[student]);
            r.start_time = Some(now + chrono::Duration::minutes(10));
            store.put_route(&r).unwrap();
        }

        let reports = dispatcher.run_proximity_scan(now).await.unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(transport.batch_count(), 2);
    }

    #[tokio::test]
    async fn event_loop_dispatches_store_changes() {
        let (dispatcher, store, transport, _dir) = setup();
        account(&store, "s1", None, Some("T1"));

        let events = store.subscribe();
        tokio::spawn(Arc::clone(&dispatcher).run_event_loop(events));

        store
            .put_route(&route("route-1", RouteStatus::Planned, &["s1"]))
            .unwrap();
        store
            .put_route(&route("route-1", RouteStatus::InProgress, &["s1"]))
            .unwrap();

        let delivered = tokio::time::timeout(Duration::from_secs(5), async {
            while transport.batch_count() == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(delivered.is_ok());
        assert_eq!(transport.batch_count(), 1);
    }
}
