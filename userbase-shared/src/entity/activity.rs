/// Request audit record
///
/// One row per handled HTTP request, written by the activity middleware after
/// the response status is known. Rows are never updated or deleted by the
/// application.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{Entity, Value};

/// Action tag for middleware-produced rows
pub const REQUEST_ACTION: &str = "request";

/// Audit row for one HTTP request
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Activity {
    /// BIGSERIAL, assigned by the database
    pub id: i64,

    /// Authenticated actor, if any
    pub user_id: Option<Uuid>,

    pub action: String,

    pub path: String,

    pub method: String,

    pub ip: String,

    pub user_agent: String,

    /// Request body as text
    pub request: String,

    /// Final response status code
    pub status: i32,

    pub created_at: DateTime<Utc>,
}

impl Activity {
    /// Builds an unsaved audit row for one request
    pub fn request(
        user_id: Option<Uuid>,
        path: impl Into<String>,
        method: impl Into<String>,
        ip: impl Into<String>,
        user_agent: impl Into<String>,
        request: impl Into<String>,
        status: u16,
    ) -> Self {
        Self {
            id: 0,
            user_id,
            action: REQUEST_ACTION.to_string(),
            path: path.into(),
            method: method.into(),
            ip: ip.into(),
            user_agent: user_agent.into(),
            request: request.into(),
            status: i32::from(status),
            created_at: Utc::now(),
        }
    }
}

impl Entity for Activity {
    type Id = i64;

    const TABLE: &'static str = "activities";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "user_id",
        "action",
        "path",
        "method",
        "ip",
        "user_agent",
        "request",
        "status",
        "created_at",
    ];
    const FILTERABLE: &'static [&'static str] = &[
        "id",
        "user_id",
        "action",
        "path",
        "method",
        "ip",
        "status",
        "created_at",
    ];
    const SORTABLE: &'static [&'static str] = &["id", "path", "method", "status", "created_at"];
    const AGGREGABLE: &'static [&'static str] = &["id", "status"];
    const SEARCHABLE: &'static [&'static str] = &["path", "user_agent", "request"];

    fn id(&self) -> i64 {
        self.id
    }

    // id is left to the sequence
    fn to_row(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("user_id", self.user_id.into()),
            ("action", self.action.clone().into()),
            ("path", self.path.clone().into()),
            ("method", self.method.clone().into()),
            ("ip", self.ip.clone().into()),
            ("user_agent", self.user_agent.clone().into()),
            ("request", self.request.clone().into()),
            ("status", self.status.into()),
            ("created_at", self.created_at.into()),
        ]
    }
}
