use anyhow::{Result, bail};
use serde::Serialize;

use bulk_core::push::{PushState, RegistrationOutcome};
use bulk_core::remote::RemoteStore;
use bulk_core::store::BulkingStore;

use super::helpers::print_json;
use crate::app::App;

#[derive(Serialize)]
struct PushResult {
    subscribed: bool,
    subscriber_id: Option<String>,
    stored_on_goal: bool,
}

pub(crate) async fn cmd_push_register(app: &App, json: bool) -> Result<()> {
    let outcome = app.push.register_device().await;
    let subscriber_id = match outcome {
        RegistrationOutcome::Subscribed { subscriber_id } => subscriber_id,
        RegistrationOutcome::Unavailable => bail!("Push notifications are not available here"),
        RegistrationOutcome::Denied => bail!("Notification permission was not granted"),
        RegistrationOutcome::TimedOut => bail!("Registration timed out"),
        RegistrationOutcome::Failed(e) => bail!("Registration failed: {e}"),
    };

    let stored_on_goal = subscriber_id
        .as_deref()
        .is_some_and(|id| app.store.attach_subscriber(id));

    if json {
        return print_json(&PushResult {
            subscribed: true,
            subscriber_id,
            stored_on_goal,
        });
    }
    match subscriber_id {
        Some(id) if stored_on_goal => println!("Subscribed as {id} (saved to goal)"),
        Some(id) => println!("Subscribed as {id}"),
        None => println!("Subscribed"),
    }
    Ok(())
}

/// Save a confirmed subscriber id onto the goal so the reminder dispatch
/// job can reach this device. Returns whether the goal changed.
fn remember_subscriber<R: RemoteStore>(store: &BulkingStore<R>, state: &PushState) -> bool {
    match state {
        PushState::Subscribed {
            subscriber_id: Some(id),
        } => store.attach_subscriber(id),
        _ => false,
    }
}

pub(crate) fn cmd_push_status(app: &App, json: bool) -> Result<()> {
    let state = app.push.refresh();
    let saved_now = remember_subscriber(&app.store, &state);
    let on_goal = app.store.goal().subscriber_id;
    let subscriber_id = match &state {
        PushState::Subscribed { subscriber_id } => subscriber_id.clone(),
        PushState::Unregistered | PushState::Registering => None,
    };
    let subscribed = matches!(state, PushState::Subscribed { .. });

    if json {
        return print_json(&PushResult {
            subscribed,
            stored_on_goal: on_goal.is_some() && on_goal == subscriber_id,
            subscriber_id,
        });
    }
    match subscriber_id {
        Some(id) => println!("Subscribed as {id}"),
        None if subscribed => println!("Subscribed"),
        None => println!("Not registered. Run `bulk push register`"),
    }
    match on_goal {
        Some(id) if saved_now => println!("Saved {id} to the goal for reminder dispatch"),
        Some(id) => println!("Reminder dispatch targets {id}"),
        None => println!("No device saved to the goal yet"),
    }
    Ok(())
}
