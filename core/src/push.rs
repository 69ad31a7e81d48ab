use std::sync::{Arc, Mutex, PoisonError};

use crate::notify::{Notice, Notifier};
use crate::platform::{Permission, Platform};
use crate::retry::{PollOutcome, RetryPolicy};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushState {
    Unregistered,
    Registering,
    /// Browser subscriptions have no addressable id.
    Subscribed { subscriber_id: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Subscribed { subscriber_id: Option<String> },
    /// No push capability on this host.
    Unavailable,
    /// The user declined the browser permission prompt.
    Denied,
    /// The bridge never confirmed a subscription.
    TimedOut,
    Failed(String),
}

/// Push subscription lifecycle for this installation.
pub struct PushRegistration {
    platform: Platform,
    notifier: Arc<dyn Notifier>,
    retry: RetryPolicy,
    state: Mutex<PushState>,
}

impl PushRegistration {
    pub fn new(platform: Platform, notifier: Arc<dyn Notifier>, retry: RetryPolicy) -> Self {
        Self {
            platform,
            notifier,
            retry,
            state: Mutex::new(PushState::Unregistered),
        }
    }

    #[must_use]
    pub fn state(&self) -> PushState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn subscriber_id(&self) -> Option<String> {
        match self.state() {
            PushState::Subscribed { subscriber_id } => subscriber_id,
            _ => None,
        }
    }

    fn set_state(&self, state: PushState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Read the current subscription without prompting or registering.
    pub fn refresh(&self) -> PushState {
        let state = match &self.platform {
            Platform::Native(bridge) => match bridge.info() {
                Ok(info) => match info.confirmed_id() {
                    Some(id) => PushState::Subscribed {
                        subscriber_id: Some(id.to_string()),
                    },
                    None => PushState::Unregistered,
                },
                Err(e) => {
                    tracing::warn!(error = %e, "failed to read push info");
                    PushState::Unregistered
                }
            },
            Platform::Browser(browser) => {
                if browser.permission() == Permission::Granted {
                    PushState::Subscribed {
                        subscriber_id: None,
                    }
                } else {
                    PushState::Unregistered
                }
            }
            Platform::Unavailable => PushState::Unregistered,
        };
        self.set_state(state.clone());
        state
    }

    /// Register this device and wait (bounded) for the host to confirm.
    pub async fn register_device(&self) -> RegistrationOutcome {
        match &self.platform {
            Platform::Unavailable => {
                self.notifier.notify(Notice::error(
                    "Push notifications are only available in the mobile app",
                ));
                RegistrationOutcome::Unavailable
            }
            Platform::Native(bridge) => {
                self.set_state(PushState::Registering);
                if let Err(e) = bridge.register() {
                    tracing::warn!(error = %e, "push registration failed");
                    self.set_state(PushState::Unregistered);
                    self.notifier
                        .notify(Notice::error("Failed to register for notifications"));
                    return RegistrationOutcome::Failed(e.to_string());
                }
                self.notifier
                    .notify(Notice::info("Registering this device for notifications..."));

                let outcome = self
                    .retry
                    .poll(|| bridge.info(), |info| info.confirmed_id().is_some())
                    .await;
                match outcome {
                    PollOutcome::Ready { value, attempt } => {
                        let subscriber_id = value.confirmed_id().map(str::to_string);
                        tracing::info!(attempt, "push registration confirmed");
                        self.set_state(PushState::Subscribed {
                            subscriber_id: subscriber_id.clone(),
                        });
                        self.notifier
                            .notify(Notice::success("Notifications enabled"));
                        RegistrationOutcome::Subscribed { subscriber_id }
                    }
                    PollOutcome::TimedOut { .. } => {
                        tracing::warn!(
                            attempts = self.retry.max_attempts,
                            "push registration not confirmed"
                        );
                        self.set_state(PushState::Unregistered);
                        self.notifier.notify(Notice::error(
                            "Registration is taking too long. Please try again.",
                        ));
                        RegistrationOutcome::TimedOut
                    }
                }
            }
            Platform::Browser(browser) => match browser.request_permission() {
                Ok(Permission::Granted) => {
                    self.set_state(PushState::Subscribed {
                        subscriber_id: None,
                    });
                    self.notifier
                        .notify(Notice::success("Notifications enabled"));
                    RegistrationOutcome::Subscribed {
                        subscriber_id: None,
                    }
                }
                Ok(_) => {
                    self.set_state(PushState::Unregistered);
                    self.notifier
                        .notify(Notice::error("Notification permission was not granted"));
                    RegistrationOutcome::Denied
                }
                Err(e) => {
                    tracing::warn!(error = %e, "notification permission request failed");
                    self.set_state(PushState::Unregistered);
                    self.notifier
                        .notify(Notice::error("Failed to request notification permission"));
                    RegistrationOutcome::Failed(e.to_string())
                }
            },
        }
    }
}
