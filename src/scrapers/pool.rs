//! A fixed set of independent sessions, one per concurrent worker.
//!
//! Each [`SessionSlot`] is owned by exactly one worker for the whole run, so
//! a session is never driven by two tasks at once.

use std::sync::Arc;
use tracing::{info, warn};

use super::traits::{Session, SessionFactory};
use crate::error::SessionError;

pub struct SessionSlot {
    id: usize,
    factory: Arc<dyn SessionFactory>,
    session: Option<Box<dyn Session>>,
    restarts: u32,
}

impl SessionSlot {
    pub fn new(id: usize, factory: Arc<dyn SessionFactory>) -> Self {
        Self {
            id,
            factory,
            session: None,
            restarts: 0,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    /// The live session, started on first use.
    pub async fn session(&mut self) -> Result<&dyn Session, SessionError> {
        if self.session.is_none() {
            self.session = Some(self.factory.create().await?);
        }
        match self.session.as_deref() {
            Some(session) => Ok(session),
            None => Err(SessionError::Launch("session slot is empty".to_string())),
        }
    }

    /// Throw the current session away and start a new one.
    pub async fn restart(&mut self) -> Result<(), SessionError> {
        if let Some(old) = self.session.take() {
            old.close().await;
        }
        self.restarts += 1;
        info!(slot = self.id, restarts = self.restarts, "Restarting {} session", self.factory.name());
        self.session = Some(self.factory.create().await?);
        Ok(())
    }

    pub async fn close(&mut self) {
        if let Some(session) = self.session.take() {
            session.close().await;
        }
    }
}

pub struct SessionPool {
    slots: Vec<SessionSlot>,
}

impl SessionPool {
    /// Start `size` sessions up front. Fails if none of them comes up.
    pub async fn start(factory: Arc<dyn SessionFactory>, size: usize) -> Result<Self, SessionError> {
        let mut slots = Vec::with_capacity(size);
        let mut last_error = None;

        for id in 0..size.max(1) {
            let mut slot = SessionSlot::new(id, Arc::clone(&factory));
            match slot.session().await {
                Ok(_) => slots.push(slot),
                Err(e) => {
                    warn!(slot = id, "Failed to start {} session: {}", factory.name(), e);
                    last_error = Some(e);
                }
            }
        }

        if slots.is_empty() {
            return Err(last_error
                .unwrap_or_else(|| SessionError::Launch("no sessions requested".to_string())));
        }
        info!("Started {} {} session(s)", slots.len(), factory.name());
        Ok(Self { slots })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn into_slots(self) -> Vec<SessionSlot> {
        self.slots
    }
}
