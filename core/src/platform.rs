use std::sync::Arc;

use anyhow::Result;

use crate::reminders::AlarmSpec;

/// Push identity as reported by the host's native bridge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushInfo {
    pub subscriber_id: Option<String>,
    pub is_subscribed: bool,
}

impl PushInfo {
    /// Subscribed with an identity we can hand to the reminder job.
    #[must_use]
    pub fn confirmed_id(&self) -> Option<&str> {
        if self.is_subscribed {
            self.subscriber_id.as_deref().filter(|id| !id.is_empty())
        } else {
            None
        }
    }
}

/// Host-app bridge: push registration plus local alarms.
pub trait NativeBridge: Send + Sync {
    fn register(&self) -> Result<()>;
    fn info(&self) -> Result<PushInfo>;
    fn create_alarm(&self, alarm: &AlarmSpec) -> Result<()>;
    fn cancel_all_alarms(&self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Default,
    Granted,
    Denied,
}

/// Web notification API.
pub trait BrowserNotifications: Send + Sync {
    fn permission(&self) -> Permission;
    fn request_permission(&self) -> Result<Permission>;
    fn show(&self, title: &str, body: &str) -> Result<()>;
}

/// Notification capability, chosen once when the host starts.
#[derive(Clone)]
pub enum Platform {
    Native(Arc<dyn NativeBridge>),
    Browser(Arc<dyn BrowserNotifications>),
    Unavailable,
}

impl Platform {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Native(_) => "native",
            Self::Browser(_) => "browser",
            Self::Unavailable => "unavailable",
        }
    }
}
