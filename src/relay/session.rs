use chrono::{DateTime, Datelike, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// The user the admin is currently talking to. At most one at a time.
#[derive(Debug, Default)]
pub struct AdminSession {
    target: Mutex<Option<i64>>,
}

impl AdminSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn target(&self) -> Option<i64> {
        *self.target.lock().await
    }

    pub async fn set_target(&self, user_id: i64) {
        *self.target.lock().await = Some(user_id);
    }

    /// Clear the target, returning whatever was set.
    pub async fn clear_target(&self) -> Option<i64> {
        self.target.lock().await.take()
    }
}

/// Integer `YYYYMMDD` key of the UTC calendar day containing `at`.
pub fn day_key(at: DateTime<Utc>) -> u32 {
    let date = at.date_naive();
    date.year() as u32 * 10_000 + date.month() * 100 + date.day()
}

/// What the relay remembers about a user who has written in.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct UserSession {
    pub user_id: i64,
    pub display_name: String,
    pub username: Option<String>,
    pub last_message_at: DateTime<Utc>,
    pub last_seen_day: u32,
}

/// In-memory directory of users, keyed by id. Grows for the process lifetime.
#[derive(Debug, Default)]
pub struct Visitors {
    sessions: Mutex<HashMap<i64, UserSession>>,
}

impl Visitors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message from `user_id` and report whether it is the user's
    /// first one this UTC day.
    pub async fn touch(
        &self,
        user_id: i64,
        display_name: &str,
        username: Option<&str>,
        now: DateTime<Utc>,
    ) -> bool {
        let today = day_key(now);
        let mut sessions = self.sessions.lock().await;
        let session = sessions.entry(user_id).or_insert_with(|| UserSession {
            user_id,
            display_name: display_name.to_string(),
            username: username.map(str::to_string),
            last_message_at: now,
            last_seen_day: 0,
        });

        let is_new_today = session.last_seen_day != today;
        session.display_name = display_name.to_string();
        session.username = username.map(str::to_string);
        session.last_message_at = now;
        session.last_seen_day = today;
        is_new_today
    }

    pub async fn get(&self, user_id: i64) -> Option<UserSession> {
        self.sessions.lock().await.get(&user_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[tokio::test]
    async fn test_target_set_and_clear() {
        let session = AdminSession::new();
        assert_eq!(session.target().await, None);

        session.set_target(123456789).await;
        assert_eq!(session.target().await, Some(123456789));

        session.set_target(42).await;
        assert_eq!(session.target().await, Some(42));

        assert_eq!(session.clear_target().await, Some(42));
        assert_eq!(session.target().await, None);
        assert_eq!(session.clear_target().await, None);
    }

    #[test]
    fn test_day_key_uses_utc_calendar_day() {
        assert_eq!(day_key(at(2026, 10, 16, 0, 0)), 20261016);
        assert_eq!(day_key(at(2026, 1, 2, 23, 59)), 20260102);
    }

    #[tokio::test]
    async fn test_first_message_each_day_is_new() {
        let visitors = Visitors::new();

        assert!(visitors.touch(7, "Ann", None, at(2026, 3, 1, 9, 0)).await);
        assert!(!visitors.touch(7, "Ann", None, at(2026, 3, 1, 18, 30)).await);
        assert!(visitors.touch(7, "Ann", None, at(2026, 3, 2, 0, 1)).await);

        // Other users are tracked independently
        assert!(visitors.touch(8, "Bob", None, at(2026, 3, 2, 0, 2)).await);
        assert_eq!(visitors.len().await, 2);
    }

    #[tokio::test]
    async fn test_touch_refreshes_profile() {
        let visitors = Visitors::new();
        visitors.touch(7, "Ann", None, at(2026, 3, 1, 9, 0)).await;
        visitors
            .touch(7, "Ann B.", Some("annb"), at(2026, 3, 1, 9, 5))
            .await;

        let session = visitors.get(7).await.unwrap();
        assert_eq!(session.display_name, "Ann B.");
        assert_eq!(session.username.as_deref(), Some("annb"));
        assert_eq!(session.last_message_at, at(2026, 3, 1, 9, 5));
        assert_eq!(session.last_seen_day, 20260301);
    }
}
