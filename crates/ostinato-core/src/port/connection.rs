//! Port connections and the manager the graph queries when it is built.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use super::PortId;
use crate::{Error, Result};

/// A directed link between two ports.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortConnection {
    pub src: PortId,
    pub dest: PortId,
    pub multiplier: f32,
    /// Locked connections cannot be removed.
    pub locked: bool,
    pub enabled: bool,
    /// Parameter value used when the destination is a control port.
    pub base_value: f32,
}

impl PortConnection {
    pub fn new(src: PortId, dest: PortId) -> Self {
        Self {
            src,
            dest,
            multiplier: 1.0,
            locked: false,
            enabled: true,
            base_value: 0.0,
        }
    }

    pub fn with_multiplier(mut self, multiplier: f32) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn locked(mut self) -> Self {
        self.locked = true;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn with_base_value(mut self, base_value: f32) -> Self {
        self.base_value = base_value;
        self
    }
}

/// Connections keyed by destination port.
///
/// Shared between the control thread, which edits it, and graph builds,
/// which read it. Never touched from inside a cycle: edits reach a running
/// graph through [`Graph::refresh_port_sources`](crate::Graph::refresh_port_sources)
/// or a rebuild.
#[derive(Debug, Default)]
pub struct PortConnectionsManager {
    by_dest: DashMap<PortId, Vec<PortConnection>>,
}

impl PortConnectionsManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection, or overwrites the existing one between the same
    /// ports. Returns true if the connection is new.
    pub fn connect(&self, conn: PortConnection) -> Result<bool> {
        if conn.src == conn.dest {
            return Err(Error::SelfConnection(conn.src));
        }
        let mut conns = self.by_dest.entry(conn.dest).or_default();
        if let Some(existing) = conns.iter_mut().find(|c| c.src == conn.src) {
            *existing = conn;
            return Ok(false);
        }
        conns.push(conn);
        tracing::debug!("Connected {} -> {}", conn.src, conn.dest);
        Ok(true)
    }

    /// Removes the connection. Locked or missing connections are kept and
    /// false is returned.
    pub fn disconnect(&self, src: PortId, dest: PortId) -> bool {
        let Some(mut conns) = self.by_dest.get_mut(&dest) else {
            return false;
        };
        let Some(index) = conns.iter().position(|c| c.src == src) else {
            return false;
        };
        if conns[index].locked {
            tracing::debug!("Refusing to remove locked connection {} -> {}", src, dest);
            return false;
        }
        conns.remove(index);
        let now_empty = conns.is_empty();
        drop(conns);
        if now_empty {
            self.by_dest.remove_if(&dest, |_, conns| conns.is_empty());
        }
        tracing::debug!("Disconnected {} -> {}", src, dest);
        true
    }

    /// Applies `update` to the connection. Returns false if it does not exist.
    pub fn update(&self, src: PortId, dest: PortId, update: impl FnOnce(&mut PortConnection)) -> bool {
        let Some(mut conns) = self.by_dest.get_mut(&dest) else {
            return false;
        };
        match conns.iter_mut().find(|c| c.src == src) {
            Some(conn) => {
                update(conn);
                conn.src = src;
                conn.dest = dest;
                true
            }
            None => false,
        }
    }

    pub fn set_enabled(&self, src: PortId, dest: PortId, enabled: bool) -> bool {
        self.update(src, dest, |c| c.enabled = enabled)
    }

    pub fn set_multiplier(&self, src: PortId, dest: PortId, multiplier: f32) -> bool {
        self.update(src, dest, |c| c.multiplier = multiplier)
    }

    /// Connections into `dest`, in the order they were made.
    pub fn sources_of(&self, dest: PortId) -> Vec<PortConnection> {
        self.by_dest
            .get(&dest)
            .map(|conns| conns.clone())
            .unwrap_or_default()
    }

    /// Connections out of `src`.
    pub fn destinations_of(&self, src: PortId) -> Vec<PortConnection> {
        self.by_dest
            .iter()
            .flat_map(|entry| {
                entry
                    .value()
                    .iter()
                    .filter(|c| c.src == src)
                    .copied()
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    pub fn find(&self, src: PortId, dest: PortId) -> Option<PortConnection> {
        self.by_dest
            .get(&dest)
            .and_then(|conns| conns.iter().find(|c| c.src == src).copied())
    }

    pub fn is_connected(&self, src: PortId, dest: PortId) -> bool {
        self.find(src, dest).is_some()
    }

    /// Every connection, grouped by destination.
    pub fn connections(&self) -> Vec<PortConnection> {
        self.by_dest
            .iter()
            .flat_map(|entry| entry.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_dest.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops unlocked connections touching `port`. Returns how many were removed.
    pub fn remove_port(&self, port: PortId) -> usize {
        let mut removed = 0;
        self.by_dest.retain(|dest, conns| {
            let before = conns.len();
            conns.retain(|c| c.locked || (c.src != port && *dest != port));
            removed += before - conns.len();
            !conns.is_empty()
        });
        removed
    }

    /// Removes every connection, locked ones included.
    pub fn clear(&self) {
        self.by_dest.clear();
    }
}
