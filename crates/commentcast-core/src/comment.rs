//! Comment projections for typed producers.
//!
//! The write path owns persistence; these types are only the post-write
//! shape that travels in event payloads, plus the helpers producers use to
//! build events from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::Event;
use commentcast_protocol::EventKind;

/// Moderation status of a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentStatus {
    Active,
    Deleted,
    Flagged,
    Hidden,
}

/// Engagement and edit metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentMetadata {
    pub likes: u64,
    pub reports: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editor_id: Option<i64>,
}

/// A comment as seen by subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentView {
    pub id: String,
    pub post_id: String,
    pub user_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub content: String,
    pub status: CommentStatus,
    pub metadata: CommentMetadata,
    /// RFC 3339 on the wire.
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<CommentView>,
}

/// Payload of `comment.deleted`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedComment {
    pub id: String,
}

/// Payload of `comment.liked`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikedComment {
    pub id: String,
    pub likes: u64,
}

impl CommentView {
    /// Event carrying the full projection, routed to the comment's post.
    #[must_use]
    pub fn event(&self, kind: EventKind) -> Event<&CommentView> {
        Event::new(kind, self.post_id.clone(), self)
    }

    /// `comment.deleted` event for this comment.
    #[must_use]
    pub fn deleted_event(&self) -> Event<DeletedComment> {
        Event::new(
            EventKind::Deleted,
            self.post_id.clone(),
            DeletedComment {
                id: self.id.clone(),
            },
        )
    }

    /// `comment.liked` event with the current like count.
    #[must_use]
    pub fn liked_event(&self) -> Event<LikedComment> {
        Event::new(
            EventKind::Liked,
            self.post_id.clone(),
            LikedComment {
                id: self.id.clone(),
                likes: self.metadata.likes,
            },
        )
    }
}

/// Report-count rule a producer applies before emitting `comment.flagged`.
///
/// The hub knows nothing about reports; this lives with producers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationPolicy {
    /// Reports at or above which a comment is flagged.
    pub flag_threshold: u64,
}

impl Default for ModerationPolicy {
    fn default() -> Self {
        Self { flag_threshold: 5 }
    }
}

impl ModerationPolicy {
    /// Whether a comment with `reports` reports should be flagged.
    #[must_use]
    pub fn should_flag(&self, reports: u64) -> bool {
        reports >= self.flag_threshold
    }

    /// Apply a new report to `comment`.
    ///
    /// Returns the `comment.flagged` event when this report crosses the
    /// threshold; already flagged comments are not flagged again.
    pub fn record_report<'a>(
        &self,
        comment: &'a mut CommentView,
    ) -> Option<Event<&'a CommentView>> {
        comment.metadata.reports += 1;
        if comment.status == CommentStatus::Flagged
            || !self.should_flag(comment.metadata.reports)
        {
            return None;
        }
        comment.status = CommentStatus::Flagged;
        Some(comment.event(EventKind::Flagged))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn comment() -> CommentView {
        let posted = Utc.with_ymd_and_hms(2023, 11, 14, 22, 13, 20).unwrap();
        CommentView {
            id: "c1".into(),
            post_id: "post-42".into(),
            user_id: 7,
            parent_id: None,
            content: "first".into(),
            status: CommentStatus::Active,
            metadata: CommentMetadata::default(),
            created_at: posted,
            updated_at: posted,
            children: Vec::new(),
        }
    }

    #[test]
    fn test_projection_json_shape() {
        let value = serde_json::to_value(comment()).unwrap();
        assert_eq!(value["status"], "active");
        assert_eq!(value["metadata"], json!({"likes": 0, "reports": 0}));
        assert!(value.get("parent_id").is_none());
        assert!(value.get("children").is_none());
        assert_eq!(value["created_at"], "2023-11-14T22:13:20Z");
    }

    #[test]
    fn test_edit_metadata_timestamps() {
        let mut c = comment();
        c.metadata.edited_at = Some(Utc.with_ymd_and_hms(2023, 11, 15, 8, 0, 0).unwrap());
        c.metadata.editor_id = Some(7);

        let value = serde_json::to_value(&c).unwrap();
        assert_eq!(value["metadata"]["edited_at"], "2023-11-15T08:00:00Z");

        let parsed: CommentView = serde_json::from_value(json!({
            "id": "c2",
            "post_id": "post-42",
            "user_id": 9,
            "content": "edited",
            "status": "active",
            "metadata": {"likes": 1, "reports": 0, "edited_at": "2023-11-15T09:30:00+01:00"},
            "created_at": "2023-11-14T22:13:20.5Z",
            "updated_at": "2023-11-15T08:30:00Z"
        }))
        .unwrap();
        assert_eq!(
            parsed.metadata.edited_at,
            Some(Utc.with_ymd_and_hms(2023, 11, 15, 8, 30, 0).unwrap())
        );
        assert_eq!(parsed.created_at.timestamp_subsec_millis(), 500);
        assert!(parsed.children.is_empty());
    }

    #[test]
    fn test_events_route_to_post() {
        let mut c = comment();
        c.metadata.likes = 3;

        let created = c.event(EventKind::Created);
        assert_eq!(created.room(), "post-42");

        let liked = c.liked_event();
        assert_eq!(liked.kind(), EventKind::Liked);
        assert_eq!(
            serde_json::to_value(liked.payload()).unwrap(),
            json!({"id": "c1", "likes": 3})
        );

        assert_eq!(c.deleted_event().payload().id, "c1");
    }

    #[test]
    fn test_flag_threshold() {
        let policy = ModerationPolicy::default();
        let mut c = comment();

        for _ in 0..4 {
            assert!(policy.record_report(&mut c).is_none());
        }
        let flagged = policy.record_report(&mut c).map(|e| e.kind());
        assert_eq!(flagged, Some(EventKind::Flagged));
        assert_eq!(c.status, CommentStatus::Flagged);
        assert!(policy.record_report(&mut c).is_none());
        assert_eq!(c.metadata.reports, 6);
    }

    #[test]
    fn test_custom_threshold() {
        let policy = ModerationPolicy { flag_threshold: 1 };
        let mut c = comment();
        assert!(policy.record_report(&mut c).is_some());
    }
}
