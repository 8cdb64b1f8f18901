//! Room registry service

use validator::Validate;

use super::{required, required_change};
use crate::{
    error::AppResult,
    models::room::{CreateRoom, Room, RoomQuery, RoomRecord, UpdateRoom},
    repository::Repository,
};

#[derive(Clone)]
pub struct RoomsService {
    repository: Repository,
}

/// Blank class teacher means none
fn teacher(name: Option<String>) -> Option<String> {
    name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())
}

impl RoomsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn list(&self, query: &RoomQuery) -> AppResult<Vec<Room>> {
        self.repository.rooms.list(query).await
    }

    pub async fn get(&self, id: i32) -> AppResult<Room> {
        self.repository.rooms.get_by_id(id).await
    }

    pub async fn create(&self, room: CreateRoom) -> AppResult<Room> {
        room.validate()?;
        let created = self
            .repository
            .rooms
            .create(&RoomRecord {
                form: required("Form", &room.form)?,
                stream: required("Stream", &room.stream)?,
                class_teacher: teacher(room.class_teacher),
            })
            .await?;
        tracing::info!(room_id = created.id, "Room {} created", created.label());
        Ok(created)
    }

    pub async fn update(&self, id: i32, changes: UpdateRoom) -> AppResult<Room> {
        changes.validate()?;
        let current = self.repository.rooms.get_by_id(id).await?;
        let record = RoomRecord {
            form: required_change("Form", changes.form)?.unwrap_or(current.form),
            stream: required_change("Stream", changes.stream)?.unwrap_or(current.stream),
            class_teacher: match changes.class_teacher {
                Some(name) => teacher(Some(name)),
                None => current.class_teacher,
            },
        };
        self.repository.rooms.update(id, &record).await
    }

    /// Refused while students are assigned to the room
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        self.repository.rooms.delete(id).await?;
        tracing::info!(room_id = id, "Room deleted");
        Ok(())
    }
}
