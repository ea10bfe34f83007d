//! The event a poll emits when its result is declared.

use chama_groups::{notify_best_effort, Notification, NotificationSink};
use chama_store::{LedgerTxn, PollRecord};
use chama_types::{CoreError, GroupId, PollId, PollKind, PollResult, Timestamp};
use serde::Serialize;
use serde_json::json;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResultDeclared {
    pub poll: PollId,
    pub group: GroupId,
    pub kind: PollKind,
    pub title: String,
    pub result: PollResult,
    pub winning_option: Option<u32>,
    pub declared_at: Timestamp,
}

impl ResultDeclared {
    pub(crate) fn from_sealed(poll: &PollRecord, declared_at: Timestamp) -> Self {
        Self {
            poll: poll.id,
            group: poll.group,
            kind: poll.kind,
            title: poll.title.clone(),
            result: poll.result,
            winning_option: poll.winning_option,
            declared_at,
        }
    }
}

/// Receives poll outcomes inside the transaction that seals the poll.
///
/// An error aborts the whole transaction, so the vote or close that
/// triggered the declaration is rolled back as well.
pub trait ResultSubscriber: Send + Sync {
    fn on_result_declared(
        &self,
        txn: &mut dyn LedgerTxn,
        event: &ResultDeclared,
    ) -> Result<(), CoreError>;

    /// Called when an active poll is cancelled without a result.
    fn on_poll_cancelled(&self, _txn: &mut dyn LedgerTxn, _poll: &PollRecord) -> Result<(), CoreError> {
        Ok(())
    }
}

/// Tell the group a poll has been decided.
pub async fn announce_result(sink: &dyn NotificationSink, event: &ResultDeclared) {
    let body = match (event.result, event.winning_option) {
        (PollResult::Passed, Some(option)) => format!("\"{}\" passed (option {})", event.title, option + 1),
        (result, _) => format!("\"{}\" closed: {result}", event.title),
    };
    let notification = Notification::new(event.group, "Poll result declared", body).with_data(json!({
        "poll_id": event.poll.to_string(),
        "result": event.result.to_string(),
        "winning_option": event.winning_option,
    }));
    notify_best_effort(sink, &notification).await;
}
