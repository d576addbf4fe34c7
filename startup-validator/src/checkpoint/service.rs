//! Programmatic review through a registry of pending requests.

use super::{ReviewDecision, ReviewRequest, Reviewer};
use crate::errors::ValidatorError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;
use uuid::Uuid;

struct Pending {
    request: ReviewRequest,
    created_at: DateTime<Utc>,
    response_tx: oneshot::Sender<ReviewDecision>,
}

/// A request waiting for a decision, as listed by [`ReviewService::pending`].
#[derive(Debug, Clone, PartialEq)]
pub struct PendingReview {
    /// Identifier to resolve the request with.
    pub id: Uuid,
    /// The request.
    pub request: ReviewRequest,
    /// When it was submitted.
    pub created_at: DateTime<Utc>,
}

/// Holds review requests until something resolves them.
///
/// Each service is an explicit value; share it through an `Arc` between the
/// [`ChannelReviewer`] and whatever answers the requests.
#[derive(Default)]
pub struct ReviewService {
    requests: RwLock<HashMap<Uuid, Pending>>,
}

impl ReviewService {
    /// Creates an empty service.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `request` and returns its id and the decision channel.
    pub fn submit(&self, request: ReviewRequest) -> (Uuid, oneshot::Receiver<ReviewDecision>) {
        let id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        tracing::debug!(review_id = %id, run_id = %request.run_id, "Review requested");
        self.requests.write().insert(
            id,
            Pending {
                request,
                created_at: Utc::now(),
                response_tx: tx,
            },
        );
        (id, rx)
    }

    /// Resolves a pending request. Returns false for unknown or finished ids.
    pub fn resolve(&self, id: Uuid, decision: ReviewDecision) -> bool {
        let Some(pending) = self.requests.write().remove(&id) else {
            return false;
        };
        pending.response_tx.send(decision).is_ok()
    }

    /// Approves a pending request.
    pub fn approve(&self, id: Uuid) -> bool {
        self.resolve(id, ReviewDecision::Approve)
    }

    /// Rejects a pending request.
    pub fn reject(&self, id: Uuid, reason: impl Into<String>) -> bool {
        self.resolve(
            id,
            ReviewDecision::Reject {
                reason: reason.into(),
            },
        )
    }

    /// Answers a pending request with an edited payload.
    pub fn edit(&self, id: Uuid, payload: serde_json::Value) -> bool {
        self.resolve(id, ReviewDecision::Edit { payload })
    }

    /// Drops a pending request without a decision.
    pub fn withdraw(&self, id: Uuid) -> bool {
        self.requests.write().remove(&id).is_some()
    }

    /// Number of pending requests.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.requests.read().len()
    }

    /// Pending requests, oldest first.
    #[must_use]
    pub fn pending(&self) -> Vec<PendingReview> {
        let mut pending: Vec<PendingReview> = self
            .requests
            .read()
            .iter()
            .map(|(id, p)| PendingReview {
                id: *id,
                request: p.request.clone(),
                created_at: p.created_at,
            })
            .collect();
        pending.sort_by_key(|p| p.created_at);
        pending
    }
}

impl std::fmt::Debug for ReviewService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReviewService")
            .field("pending_count", &self.pending_count())
            .finish()
    }
}

/// Removes the request when the waiting reviewer goes away.
struct WithdrawOnDrop<'a> {
    service: &'a ReviewService,
    id: Uuid,
}

impl Drop for WithdrawOnDrop<'_> {
    fn drop(&mut self) {
        self.service.withdraw(self.id);
    }
}

/// Reviewer that parks requests in a [`ReviewService`].
#[derive(Debug, Clone)]
pub struct ChannelReviewer {
    service: Arc<ReviewService>,
}

impl ChannelReviewer {
    /// Creates a reviewer backed by `service`.
    #[must_use]
    pub fn new(service: Arc<ReviewService>) -> Self {
        Self { service }
    }

    /// The backing service.
    #[must_use]
    pub fn service(&self) -> &Arc<ReviewService> {
        &self.service
    }
}

#[async_trait]
impl Reviewer for ChannelReviewer {
    fn name(&self) -> &str {
        "channel"
    }

    async fn review(&self, request: &ReviewRequest) -> Result<ReviewDecision, ValidatorError> {
        let (id, rx) = self.service.submit(request.clone());
        let _guard = WithdrawOnDrop {
            service: &self.service,
            id,
        };
        rx.await
            .map_err(|_| ValidatorError::Cancelled(format!("review {id} was withdrawn")))
    }
}
