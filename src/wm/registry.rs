//! Client Registry
//!
//! Owning arena for every managed client. Other subsystems hold `ClientId`s
//! and re-resolve them here; nothing keeps a borrowed `Client` across a call
//! that may destroy one.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::shared::Xid;
use crate::wm::client::{Client, ClientId, WmState};

#[derive(Debug, Default)]
pub struct ClientRegistry {
    /// Ordered by id, i.e. by creation time
    clients: BTreeMap<ClientId, Client>,
    /// Window, frame and titlebar identities of every client
    windows: HashMap<Xid, ClientId>,
    next_serial: u64,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve an id for a client that is about to be inserted
    pub fn allocate_id(&mut self) -> ClientId {
        self.next_serial += 1;
        ClientId(self.next_serial)
    }

    /// Insert a fully constructed client and index all of its windows
    pub fn insert(&mut self, client: Client) -> ClientId {
        let id = client.id;
        for xid in [Some(client.window), client.frame, client.titlebar]
            .into_iter()
            .flatten()
        {
            self.windows.insert(xid, id);
        }
        self.clients.insert(id, client);
        id
    }

    /// Index an additional window (a lazily created titlebar) for `id`
    pub fn index_window(&mut self, xid: Xid, id: ClientId) {
        if self.clients.contains_key(&id) {
            self.windows.insert(xid, id);
        }
    }

    /// Resolve any of a client's windows (application, frame or titlebar)
    pub fn find(&self, xid: Xid) -> Option<ClientId> {
        self.windows.get(&xid).copied()
    }

    pub fn get(&self, id: ClientId) -> Option<&Client> {
        self.clients.get(&id)
    }

    pub fn get_mut(&mut self, id: ClientId) -> Option<&mut Client> {
        self.clients.get_mut(&id)
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.clients.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Clients in creation order
    pub fn iter(&self) -> impl Iterator<Item = &Client> {
        self.clients.values()
    }

    pub fn ids(&self) -> Vec<ClientId> {
        self.clients.keys().copied().collect()
    }

    /// Detach `id` from its transient relations and release the record.
    /// Children transient for it lose their owner.
    pub fn remove(&mut self, id: ClientId) -> Option<Client> {
        let parent = self.get(id)?.transient_parent;
        if let Some(parent) = parent.and_then(|p| self.clients.get_mut(&p)) {
            parent.transients.retain(|&c| c != id);
        }

        let mut client = self.clients.remove(&id)?;
        for child in client.transients.drain(..) {
            if let Some(child) = self.clients.get_mut(&child) {
                debug!(id = %child.id, owner = %id, "owner destroyed, clearing transient parent");
                child.transient_parent = None;
            }
        }

        self.windows.retain(|_, owner| *owner != id);
        Some(client)
    }

    /// Mapped and on the active workspace (or on every workspace)
    pub fn is_visible(&self, id: ClientId, current_workspace: u32) -> bool {
        self.get(id).is_some_and(|c| {
            c.state == WmState::Normal
                && (c.workspace == current_workspace
                    || c.policy.sticky.get()
                    || c.policy.omnipresent.get())
        })
    }

    /// Members of the window group led by `leader`, in creation order
    pub fn group_members(&self, leader: Xid) -> Vec<ClientId> {
        self.clients
            .values()
            .filter(|c| c.group_leader == Some(leader))
            .map(|c| c.id)
            .collect()
    }
}
