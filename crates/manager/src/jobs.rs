use crate::Error;
use chrono::{DateTime, Utc};
use models::{SearchParams, Vacancy};
use sources::SearchResult;
use tokio::sync::oneshot;
use uuid::Uuid;

/// A unit of work flowing through the bounded queue. The reply sender is
/// single-use and owned by the submitter; a worker consumes it exactly once
/// and silently drops the send when the submitter has gone away.
pub(crate) enum Job {
    Search(SearchJob),
    Details(DetailsJob),
}

pub(crate) struct SearchJob {
    pub id: Uuid,
    pub params: SearchParams,
    pub reply: oneshot::Sender<Result<Vec<SearchResult>, Error>>,
    pub created_at: DateTime<Utc>,
}

pub(crate) struct DetailsJob {
    pub id: Uuid,
    pub source: String,
    pub vacancy_id: String,
    pub reply: oneshot::Sender<Result<Vacancy, Error>>,
    pub created_at: DateTime<Utc>,
}

impl SearchJob {
    pub fn new(params: SearchParams) -> (Self, oneshot::Receiver<Result<Vec<SearchResult>, Error>>) {
        let (reply, rx) = oneshot::channel();
        (
            Self {
                id: Uuid::new_v4(),
                params,
                reply,
                created_at: Utc::now(),
            },
            rx,
        )
    }
}

impl DetailsJob {
    pub fn new(
        source: &str,
        vacancy_id: &str,
    ) -> (Self, oneshot::Receiver<Result<Vacancy, Error>>) {
        let (reply, rx) = oneshot::channel();
        (
            Self {
                id: Uuid::new_v4(),
                source: source.to_string(),
                vacancy_id: vacancy_id.to_string(),
                reply,
                created_at: Utc::now(),
            },
            rx,
        )
    }
}
