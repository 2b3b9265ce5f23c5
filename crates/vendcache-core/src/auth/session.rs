use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Freshness marker distinguishing one login from the next.
///
/// Generated at commit time from wall-clock milliseconds, with a floor of
/// last-issued + 1 so two commits in the same millisecond still produce
/// strictly increasing ids. Serialized as a string in the storage schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct SessionId(i64);

static LAST_ISSUED: AtomicI64 = AtomicI64::new(0);

impl SessionId {
    /// Generate the next session id. Strictly greater than any id this
    /// process has issued before, even under concurrent callers.
    pub fn fresh() -> Self {
        let now = Utc::now().timestamp_millis();
        let mut prev = LAST_ISSUED.load(Ordering::Relaxed);
        loop {
            let next = now.max(prev + 1);
            match LAST_ISSUED.compare_exchange_weak(prev, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return SessionId(next),
                Err(actual) => prev = actual,
            }
        }
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0.to_string()
    }
}

impl TryFrom<String> for SessionId {
    type Error = std::num::ParseIntError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ok(SessionId(value.trim().parse()?))
    }
}

/// The entity the user is acting as (a customer account or a vendor store).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedEntity {
    #[serde(rename = "entityId")]
    pub entity_id: String,
    pub name: Option<String>,
    pub role: Option<String>,
}

/// The in-memory authenticated identity. At most one exists at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "userId")]
    pub user_id: i64,
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub token: String,
    #[serde(rename = "selectedEntity")]
    pub selected_entity: Option<SelectedEntity>,
    #[serde(rename = "sessionId")]
    pub session_id: SessionId,
    #[serde(rename = "issuedAt")]
    pub issued_at: DateTime<Utc>,
}

/// The durable mirror of a [`Session`], stored under the `auth_data` key.
///
/// The bare `session_id` marker is stored under its own key; a record is
/// only trusted when its embedded id equals that marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSessionRecord {
    #[serde(rename = "userId")]
    pub user_id: i64,
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub token: String,
    #[serde(rename = "selectedEntity")]
    pub selected_entity: Option<SelectedEntity>,
    #[serde(rename = "sessionId")]
    pub session_id: SessionId,
    #[serde(rename = "issuedAt")]
    pub issued_at: DateTime<Utc>,
}

impl From<&Session> for PersistedSessionRecord {
    fn from(session: &Session) -> Self {
        Self {
            user_id: session.user_id,
            display_name: session.display_name.clone(),
            token: session.token.clone(),
            selected_entity: session.selected_entity.clone(),
            session_id: session.session_id,
            issued_at: session.issued_at,
        }
    }
}

impl From<PersistedSessionRecord> for Session {
    fn from(record: PersistedSessionRecord) -> Self {
        Self {
            user_id: record.user_id,
            display_name: record.display_name,
            token: record.token,
            selected_entity: record.selected_entity,
            session_id: record.session_id,
            issued_at: record.issued_at,
        }
    }
}

/// Point-in-time view of the session store for consumers.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub is_authenticated: bool,
    pub is_loading: bool,
    pub session: Option<Session>,
}
