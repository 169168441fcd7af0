//! Room managers: resolve a session to a room and own running rooms.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tickwire_protocol::{RoomId, SessionId};
use tickwire_pubsub::PubSub;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{Application, Room, RoomConfig, RoomError, RoomOutbound};

/// Chooses a room for sessions that ask to be auto-assigned.
pub trait RoomManager: Send + Sync + 'static {
    /// Resolves the room `session_id` should join.
    fn get_room(
        &self,
        session_id: SessionId,
    ) -> impl Future<Output = Result<RoomId, RoomError>> + Send;
}

// ---------------------------------------------------------------------------
// StaticRoomManager
// ---------------------------------------------------------------------------

/// Sends every session to the same room.
#[derive(Debug, Clone, Copy)]
pub struct StaticRoomManager {
    room_id: RoomId,
}

impl StaticRoomManager {
    pub fn new(room_id: RoomId) -> Self {
        Self { room_id }
    }
}

impl RoomManager for StaticRoomManager {
    async fn get_room(&self, _session_id: SessionId) -> Result<RoomId, RoomError> {
        Ok(self.room_id)
    }
}

// ---------------------------------------------------------------------------
// LocalRoomManager
// ---------------------------------------------------------------------------

struct RoomEntry {
    outbound: RoomOutbound,
    cancel: CancellationToken,
    task: JoinHandle<Result<(), RoomError>>,
}

/// Spawns rooms as tasks on the current runtime and tracks them.
///
/// Auto-assignment returns the default room, set with
/// [`set_default`](Self::set_default) or implicitly by the first room
/// spawned.
pub struct LocalRoomManager<P: PubSub> {
    pubsub: Arc<P>,
    config: RoomConfig,
    rooms: Mutex<HashMap<RoomId, RoomEntry>>,
    default_room: Mutex<Option<RoomId>>,
    cancel: CancellationToken,
}

impl<P: PubSub> LocalRoomManager<P> {
    /// # Errors
    /// Rejects an invalid [`RoomConfig`] up front so spawning can't fail
    /// on configuration later.
    pub fn new(pubsub: Arc<P>, config: RoomConfig) -> Result<Self, RoomError> {
        config.validate()?;
        Ok(Self {
            pubsub,
            config,
            rooms: Mutex::new(HashMap::new()),
            default_room: Mutex::new(None),
            cancel: CancellationToken::new(),
        })
    }

    /// Spawns a room with a fresh id running `app`.
    pub fn spawn_room<A: Application>(&self, app: A) -> Result<RoomId, RoomError> {
        let id = RoomId::new_random();
        self.spawn_room_with_id(id, app)?;
        Ok(id)
    }

    /// Spawns a room with a caller-chosen id.
    ///
    /// # Errors
    /// [`RoomError::AlreadyExists`] if a room with this id is running.
    pub fn spawn_room_with_id<A: Application>(&self, id: RoomId, app: A) -> Result<(), RoomError> {
        let mut rooms = self.rooms.lock().unwrap_or_else(PoisonError::into_inner);
        if rooms.contains_key(&id) {
            return Err(RoomError::AlreadyExists(id));
        }

        let room = Room::new(id, Arc::clone(&self.pubsub), app, &self.config)?;
        let outbound = room.outbound();
        let cancel = self.cancel.child_token();
        let task = tokio::spawn(room.run(cancel.clone()));
        rooms.insert(
            id,
            RoomEntry {
                outbound,
                cancel,
                task,
            },
        );
        drop(rooms);

        self.default_room
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_or_insert(id);
        tracing::info!(room_id = %id, "room spawned");
        Ok(())
    }

    /// Makes `id` the room auto-assigned sessions join.
    pub fn set_default(&self, id: RoomId) -> Result<(), RoomError> {
        if !self.contains(id) {
            return Err(RoomError::NotFound(id));
        }
        *self
            .default_room
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(id);
        Ok(())
    }

    pub fn default_room(&self) -> Option<RoomId> {
        *self
            .default_room
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn contains(&self, id: RoomId) -> bool {
        self.rooms
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&id)
    }

    /// Producer handle for a running room.
    pub fn outbound(&self, id: RoomId) -> Option<RoomOutbound> {
        self.rooms
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .map(|entry| entry.outbound.clone())
    }

    pub fn room_ids(&self) -> Vec<RoomId> {
        self.rooms
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect()
    }

    pub fn room_count(&self) -> usize {
        self.rooms
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Stops one room and waits for its task to finish.
    pub async fn destroy_room(&self, id: RoomId) -> Result<(), RoomError> {
        let entry = self
            .rooms
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .ok_or(RoomError::NotFound(id))?;
        {
            let mut default = self
                .default_room
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if *default == Some(id) {
                *default = None;
            }
        }
        entry.cancel.cancel();
        Self::join_room_task(id, entry.task).await;
        tracing::info!(room_id = %id, "room destroyed");
        Ok(())
    }

    /// Stops every room and waits for all of them.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let entries: Vec<(RoomId, RoomEntry)> = self
            .rooms
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .collect();
        *self
            .default_room
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
        for (id, entry) in entries {
            Self::join_room_task(id, entry.task).await;
        }
        tracing::info!("all rooms stopped");
    }

    async fn join_room_task(id: RoomId, task: JoinHandle<Result<(), RoomError>>) {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(room_id = %id, error = %e, "room exited with error"),
            Err(e) => tracing::error!(room_id = %id, error = %e, "room task panicked"),
        }
    }
}

impl<P: PubSub> RoomManager for LocalRoomManager<P> {
    async fn get_room(&self, session_id: SessionId) -> Result<RoomId, RoomError> {
        let room = self.default_room().ok_or(RoomError::NoDefaultRoom)?;
        tracing::debug!(%session_id, room_id = %room, "auto-assigned room");
        Ok(room)
    }
}
