use serde::Serialize;

pub const DEFAULT_NOTIFICATION_SECONDS: f64 = 2.0;
pub const STAGING_NOTIFICATION_SECONDS: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub text: String,
    pub expires_at: f64,
}

/// Short-lived HUD messages, newest last
#[derive(Debug, Clone, Default)]
pub struct Notifications {
    items: Vec<Notification>,
}

impl Notifications {
    pub fn push(&mut self, text: impl Into<String>, now: f64, seconds: f64) {
        self.items.push(Notification {
            text: text.into(),
            expires_at: now + seconds.max(0.0),
        });
    }

    pub fn expire(&mut self, now: f64) {
        self.items.retain(|n| n.expires_at > now);
    }

    pub fn active(&self) -> impl Iterator<Item = &Notification> {
        self.items.iter()
    }

    pub fn latest(&self) -> Option<&Notification> {
        self.items.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notifications_expire() {
        let mut notifications = Notifications::default();
        notifications.push("Manual Transmission", 0.0, DEFAULT_NOTIFICATION_SECONDS);
        notifications.push("Press Enter to Start Run", 1.0, STAGING_NOTIFICATION_SECONDS);

        notifications.expire(1.5);
        assert_eq!(notifications.active().count(), 2);

        notifications.expire(2.0);
        let texts: Vec<&str> = notifications.active().map(|n| n.text.as_str()).collect();
        assert_eq!(texts, vec!["Press Enter to Start Run"]);

        notifications.expire(11.0);
        assert!(notifications.latest().is_none());
    }
}
