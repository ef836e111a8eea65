use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};

use serde_json::{Value, json};
use tracing::trace;

pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 256;

/// Named notifications emitted by the interaction controllers and the simulation.
#[derive(Clone, Debug, PartialEq)]
pub enum Notification {
    DragStart { ids: Vec<String>, x: f32, y: f32 },
    DragMove { ids: Vec<String>, x: f32, y: f32 },
    DragEnd { ids: Vec<String>, x: f32, y: f32 },
    Throw { id: String, vx: f32, vy: f32 },
    ZoomChanged { zoom: f32 },
    PanChanged { x: f32, y: f32 },
    ViewReset,
    SimulationStable { steps: u64 },
}

impl Notification {
    pub fn name(&self) -> &'static str {
        match self {
            Self::DragStart { .. } => "drag-start",
            Self::DragMove { .. } => "drag-move",
            Self::DragEnd { .. } => "drag-end",
            Self::Throw { .. } => "drag-throw",
            Self::ZoomChanged { .. } => "zoom-changed",
            Self::PanChanged { .. } => "pan-changed",
            Self::ViewReset => "view-reset",
            Self::SimulationStable { .. } => "simulation-stable",
        }
    }

    pub fn payload(&self) -> Value {
        match self {
            Self::DragStart { ids, x, y }
            | Self::DragMove { ids, x, y }
            | Self::DragEnd { ids, x, y } => json!({ "ids": ids, "x": x, "y": y }),
            Self::Throw { id, vx, vy } => json!({ "id": id, "vx": vx, "vy": vy }),
            Self::ZoomChanged { zoom } => json!({ "zoom": zoom }),
            Self::PanChanged { x, y } => json!({ "x": x, "y": y }),
            Self::ViewReset => Value::Null,
            Self::SimulationStable { steps } => json!({ "steps": steps }),
        }
    }
}

/// The host's generic `publish(name, payload)` capability.
pub trait EventSink {
    fn publish(&mut self, name: &str, payload: Value);
}

impl<F> EventSink for F
where
    F: FnMut(&str, Value),
{
    fn publish(&mut self, name: &str, payload: Value) {
        self(name, payload)
    }
}

/// Sending half handed to every component that emits notifications.
#[derive(Clone, Debug, Default)]
pub struct Notifier {
    tx: Option<SyncSender<Notification>>,
}

impl Notifier {
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn notify(&self, notification: Notification) {
        let Some(tx) = &self.tx else {
            return;
        };
        match tx.try_send(notification) {
            Ok(()) => {}
            Err(TrySendError::Full(dropped)) => {
                trace!(name = dropped.name(), "notification channel full, dropping");
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

pub struct NotificationReceiver {
    rx: Receiver<Notification>,
}

impl NotificationReceiver {
    pub fn drain(&self) -> impl Iterator<Item = Notification> + '_ {
        self.rx.try_iter()
    }

    /// Drains pending notifications into `sink`, returning how many were forwarded.
    pub fn forward_to(&self, sink: &mut impl EventSink) -> usize {
        let mut forwarded = 0usize;
        for notification in self.rx.try_iter() {
            sink.publish(notification.name(), notification.payload());
            forwarded += 1;
        }
        forwarded
    }
}

pub fn channel(capacity: usize) -> (Notifier, NotificationReceiver) {
    let (tx, rx) = mpsc::sync_channel(capacity.max(1));
    (Notifier { tx: Some(tx) }, NotificationReceiver { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forwards_names_and_payloads() {
        let (notifier, receiver) = channel(8);
        notifier.notify(Notification::ZoomChanged { zoom: 2.0 });
        notifier.notify(Notification::ViewReset);

        let mut seen = Vec::new();
        let forwarded = receiver.forward_to(&mut |name: &str, payload: Value| {
            seen.push((name.to_owned(), payload));
        });

        assert_eq!(forwarded, 2);
        assert_eq!(seen[0].0, "zoom-changed");
        assert_eq!(seen[0].1["zoom"], 2.0);
        assert_eq!(seen[1], ("view-reset".to_owned(), Value::Null));
    }

    #[test]
    fn full_channel_drops_instead_of_blocking() {
        let (notifier, receiver) = channel(1);
        notifier.notify(Notification::ViewReset);
        notifier.notify(Notification::ZoomChanged { zoom: 1.5 });
        assert_eq!(receiver.drain().count(), 1);
    }

    #[test]
    fn disabled_notifier_is_silent() {
        Notifier::disabled().notify(Notification::ViewReset);
    }
}
