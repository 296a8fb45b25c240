use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Per-user debounce: a message is forwarded only if the previous accepted
/// one from the same user is at least `cooldown` old.
#[derive(Debug)]
pub struct SpamGate {
    cooldown: TimeDelta,
    last_accepted: Mutex<HashMap<i64, DateTime<Utc>>>,
}

impl SpamGate {
    pub fn new(cooldown: TimeDelta) -> Self {
        Self {
            cooldown,
            last_accepted: Mutex::new(HashMap::new()),
        }
    }

    pub async fn allow(&self, user_id: i64, now: DateTime<Utc>) -> bool {
        let mut last_accepted = self.last_accepted.lock().await;
        if let Some(last) = last_accepted.get(&user_id) {
            if now - *last < self.cooldown {
                return false;
            }
        }
        last_accepted.insert(user_id, now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_rapid_second_message_is_dropped() {
        let gate = SpamGate::new(TimeDelta::seconds(1));
        assert!(gate.allow(1, t0()).await);
        assert!(!gate.allow(1, t0() + TimeDelta::milliseconds(400)).await);
        assert!(!gate.allow(1, t0() + TimeDelta::milliseconds(999)).await);
        assert!(gate.allow(1, t0() + TimeDelta::seconds(1)).await);
    }

    #[tokio::test]
    async fn test_rejection_does_not_extend_cooldown() {
        let gate = SpamGate::new(TimeDelta::seconds(1));
        assert!(gate.allow(1, t0()).await);
        assert!(!gate.allow(1, t0() + TimeDelta::milliseconds(900)).await);
        // Measured from the last accepted message, not the rejected one
        assert!(gate.allow(1, t0() + TimeDelta::milliseconds(1100)).await);
    }

    #[tokio::test]
    async fn test_users_are_independent() {
        let gate = SpamGate::new(TimeDelta::seconds(1));
        assert!(gate.allow(1, t0()).await);
        assert!(gate.allow(2, t0()).await);
        assert!(!gate.allow(2, t0() + TimeDelta::milliseconds(10)).await);
    }
}
