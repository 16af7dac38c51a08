//! In-process realtime event hub.
//!
//! Events are addressed to rooms: one per user (`user-<id>`), one per role
//! (`role-<role>`), or everyone. Each subscriber sees the events of the rooms
//! it joined. The channel is bounded; a subscriber that falls behind skips
//! the events it missed.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::auth::{AuthUser, Role};

pub const BILL_UPDATE: &str = "bill-update";
pub const QUEUE_UPDATE: &str = "queue-update";
pub const ROSTER_UPDATE: &str = "roster-update";
pub const DISCHARGE_UPDATE: &str = "discharge-update";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Room {
    User(String),
    Role(Role),
    All,
}

impl Room {
    pub fn name(&self) -> String {
        match self {
            Room::User(id) => format!("user-{id}"),
            Room::Role(role) => format!("role-{}", role.as_str()),
            Room::All => "all".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Event {
    pub name: &'static str,
    pub rooms: Vec<Room>,
    pub data: serde_json::Value,
}

impl Event {
    /// Whether a member of `joined` should receive this event.
    pub fn reaches(&self, joined: &[Room]) -> bool {
        self.rooms
            .iter()
            .any(|room| *room == Room::All || joined.contains(room))
    }
}

#[derive(Clone)]
pub struct EventHub {
    sender: broadcast::Sender<Arc<Event>>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish `data` under `name` to `rooms`. Having no listeners is fine.
    pub fn publish(&self, name: &'static str, rooms: Vec<Room>, data: &impl Serialize) {
        let data = match serde_json::to_value(data) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(event = name, error = %e, "event payload not serializable");
                return;
            }
        };
        let delivered = self
            .sender
            .send(Arc::new(Event { name, rooms, data }))
            .unwrap_or(0);
        tracing::trace!(event = name, delivered, "event published");
    }

    pub fn to_roles(&self, name: &'static str, roles: &[Role], data: &impl Serialize) {
        self.publish(name, roles.iter().copied().map(Room::Role).collect(), data);
    }

    pub fn to_all(&self, name: &'static str, data: &impl Serialize) {
        self.publish(name, vec![Room::All], data);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Event>> {
        self.sender.subscribe()
    }
}

/// Rooms a connected user joins: their own and their role's.
pub fn rooms_for(user: &AuthUser) -> Vec<Room> {
    vec![Room::User(user.user_id.clone()), Room::Role(user.role)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> AuthUser {
        AuthUser {
            user_id: "u1".into(),
            role,
        }
    }

    #[test]
    fn test_room_names() {
        assert_eq!(Room::User("42".into()).name(), "user-42");
        assert_eq!(Room::Role(Role::Receptionist).name(), "role-receptionist");
        assert_eq!(Room::All.name(), "all");
    }

    #[tokio::test]
    async fn test_role_delivery() {
        let hub = EventHub::new(8);
        let mut rx = hub.subscribe();

        hub.to_roles(BILL_UPDATE, &[Role::Admin, Role::Receptionist], &serde_json::json!({"id": 1}));
        hub.to_all(QUEUE_UPDATE, &serde_json::json!({"id": 2}));

        let bill = rx.recv().await.unwrap();
        assert!(bill.reaches(&rooms_for(&user(Role::Receptionist))));
        assert!(!bill.reaches(&rooms_for(&user(Role::Doctor))));

        let queue = rx.recv().await.unwrap();
        assert!(queue.reaches(&rooms_for(&user(Role::Patient))));
        assert_eq!(queue.data["id"], 2);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let hub = EventHub::new(1);
        hub.to_all(ROSTER_UPDATE, &"nobody listening");
    }

    #[test]
    fn test_user_room() {
        let event = Event {
            name: DISCHARGE_UPDATE,
            rooms: vec![Room::User("u1".into())],
            data: serde_json::Value::Null,
        };
        assert!(event.reaches(&rooms_for(&user(Role::Patient))));
        assert!(!event.reaches(&[Room::User("u2".into())]));
    }
}
