//! Social graph edges.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A follower/followed edge. Independent of copy settings: following a trader
/// makes an account eligible for copy-trade consideration, nothing more.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowEdge {
    pub follower_id: i64,
    pub followed_id: i64,
    pub created_at: DateTime<Utc>,
}
