//! Focus Module
//!
//! Per-workspace most-recently-used focus rings and the focus commit.
//!
//! Each ring is circular and doubly linked through client ids, so moving a
//! node is a constant number of link updates. The head of the active
//! workspace's ring is the focused client; an empty ring means focus sits on
//! the sink window.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};

use crate::wm::client::ClientId;
use crate::wm::client_flags::{FocusPolicy, Protocols};
use crate::wm::error::{Result, tolerate};
use crate::wm::transport::{ProtocolMessage, RootUpdate, Transport};
use crate::wm::WindowManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Link {
    prev: ClientId,
    next: ClientId,
}

/// One circular MRU list
#[derive(Debug, Clone, Default)]
pub struct Ring {
    head: Option<ClientId>,
    links: HashMap<ClientId, Link>,
}

impl Ring {
    pub fn head(&self) -> Option<ClientId> {
        self.head
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.links.contains_key(&id)
    }

    pub fn next(&self, id: ClientId) -> Option<ClientId> {
        self.links.get(&id).map(|l| l.next)
    }

    pub fn prev(&self, id: ClientId) -> Option<ClientId> {
        self.links.get(&id).map(|l| l.prev)
    }

    /// Most recent first
    pub fn order(&self) -> Vec<ClientId> {
        let mut out = Vec::with_capacity(self.len());
        let Some(head) = self.head else {
            return out;
        };
        let mut current = head;
        loop {
            out.push(current);
            match self.next(current) {
                Some(next) if next != head && out.len() < self.len() => current = next,
                _ => break,
            }
        }
        out
    }

    /// Link `id` in directly before `at`
    fn link_before(&mut self, id: ClientId, at: ClientId) {
        let Some(prev) = self.prev(at) else {
            return;
        };
        self.links.insert(id, Link { prev, next: at });
        if let Some(l) = self.links.get_mut(&prev) {
            l.next = id;
        }
        if let Some(l) = self.links.get_mut(&at) {
            l.prev = id;
        }
    }

    fn insert(&mut self, id: ClientId, as_head: bool) {
        if self.contains(id) {
            return;
        }
        match self.head {
            None => {
                self.links.insert(id, Link { prev: id, next: id });
                self.head = Some(id);
            }
            Some(head) => {
                // before the head is the tail of the ring
                self.link_before(id, head);
                if as_head {
                    self.head = Some(id);
                }
            }
        }
    }

    pub fn insert_head(&mut self, id: ClientId) {
        self.insert(id, true);
    }

    /// Detach `id`; the head passes to its successor
    pub fn remove(&mut self, id: ClientId) -> bool {
        let Some(link) = self.links.remove(&id) else {
            return false;
        };
        if self.links.is_empty() {
            self.head = None;
            return true;
        }
        if let Some(l) = self.links.get_mut(&link.prev) {
            l.next = link.next;
        }
        if let Some(l) = self.links.get_mut(&link.next) {
            l.prev = link.prev;
        }
        if self.head == Some(id) {
            self.head = Some(link.next);
        }
        true
    }

    pub fn move_to_head(&mut self, id: ClientId) {
        if !self.contains(id) || self.head == Some(id) {
            return;
        }
        self.remove(id);
        self.insert_head(id);
    }

    /// Relink `d` to sit directly before `a`; when `a` was the head, `d` takes over.
    ///
    /// `…→F→A→B→…→C→D→E→…→F` becomes `…→F→D→A→B→…→C→E→…→F`.
    pub fn permute(&mut self, a: ClientId, d: ClientId) {
        if a == d || self.len() <= 1 || !self.contains(a) || !self.contains(d) {
            return;
        }

        // rings of two and an existing F→D→A adjacency only need a new head
        if self.len() > 2 && self.prev(a) != Some(d) {
            self.remove(d);
            self.link_before(d, a);
        }

        if self.head == Some(a) {
            self.head = Some(d);
        }
    }
}

/// The set of rings, one per workspace, plus the logical focus
#[derive(Debug, Clone, Default)]
pub struct FocusManager {
    rings: BTreeMap<u32, Ring>,
    /// `None` means the sink window
    pub current: Option<ClientId>,
}

impl FocusManager {
    pub fn new(workspaces: u32) -> Self {
        Self {
            rings: (1..=workspaces).map(|ws| (ws, Ring::default())).collect(),
            current: None,
        }
    }

    pub fn ring(&self, workspace: u32) -> Option<&Ring> {
        self.rings.get(&workspace)
    }

    pub fn ring_mut(&mut self, workspace: u32) -> Option<&mut Ring> {
        self.rings.get_mut(&workspace)
    }

    pub fn head(&self, workspace: u32) -> Option<ClientId> {
        self.ring(workspace).and_then(Ring::head)
    }

    /// Insert `id` into each ring in `workspaces`
    pub fn add(&mut self, id: ClientId, workspaces: &[u32], as_head: bool) {
        for ws in workspaces {
            if let Some(ring) = self.rings.get_mut(ws) {
                ring.insert(id, as_head);
            }
        }
    }

    /// Remove every node of `id`
    pub fn remove(&mut self, id: ClientId) {
        for ring in self.rings.values_mut() {
            ring.remove(id);
        }
    }

    pub fn remove_from(&mut self, id: ClientId, workspace: u32) {
        if let Some(ring) = self.rings.get_mut(&workspace) {
            ring.remove(id);
        }
    }

    /// Workspaces whose ring holds `id`
    pub fn workspaces_of(&self, id: ClientId) -> Vec<u32> {
        self.rings
            .iter()
            .filter(|(_, r)| r.contains(id))
            .map(|(&ws, _)| ws)
            .collect()
    }

    pub fn permute(&mut self, workspace: u32, a: ClientId, d: ClientId) {
        if let Some(ring) = self.rings.get_mut(&workspace) {
            ring.permute(a, d);
        }
    }
}

impl<C: Transport> WindowManager<C> {
    /// Rings `id` belongs in: every workspace when omnipresent, else its own
    fn focus_workspaces(&self, id: ClientId) -> Vec<u32> {
        let Some(client) = self.clients.get(id) else {
            return Vec::new();
        };
        if client.policy.omnipresent.get() {
            (1..=self.workspaces.count()).collect()
        } else if client.workspace != 0 {
            vec![client.workspace]
        } else {
            Vec::new()
        }
    }

    /// Insert a client into its ring(s). Never-focus clients, and new clients
    /// when new windows should not steal focus, go to the tail.
    pub fn focus_add(&mut self, id: ClientId) -> Result<()> {
        let Some(client) = self.clients.get(id) else {
            return Ok(());
        };
        let never = client.policy.focus.get() == FocusPolicy::Never;
        let as_head = !never && self.config.focus.focus_new;

        let workspaces = self.focus_workspaces(id);
        debug!(id = %id, ?workspaces, as_head, "adding to focus ring");
        self.focus.add(id, &workspaces, as_head);
        self.sync_focus()
    }

    pub fn focus_remove(&mut self, id: ClientId) -> Result<()> {
        self.focus.remove(id);
        if self.focus.current == Some(id) {
            debug!(id = %id, "focused client left the ring");
        }
        self.sync_focus()
    }

    /// Make `id` the most recent client of its ring and commit when that ring is active
    pub fn focus_set(&mut self, id: ClientId) -> Result<()> {
        let never = self
            .clients
            .get(id)
            .is_none_or(|c| c.policy.focus.get() == FocusPolicy::Never);
        if never {
            return Ok(());
        }

        let current_ws = self.workspaces.current();
        let rings = self.focus.workspaces_of(id);
        let ws = if rings.contains(&current_ws) {
            current_ws
        } else if let Some(&ws) = rings.first() {
            ws
        } else {
            return Ok(());
        };

        if let Some(ring) = self.focus.ring_mut(ws) {
            ring.move_to_head(id);
        }

        if ws == current_ws {
            self.focus.current = Some(id);
            self.focus_ensure()?;
            if self.config.focus.raise_on_focus {
                self.raise(id)?;
            }
        }
        Ok(())
    }

    /// Bring `focus.current` in line with the active ring head, committing on change
    pub fn sync_focus(&mut self) -> Result<()> {
        let head = self.focus.head(self.workspaces.current());
        if head != self.focus.current {
            self.focus.current = head;
            self.focus_ensure()?;
        }
        Ok(())
    }

    /// (Re)issue the input focus transfer for the current focus
    pub fn focus_ensure(&mut self) -> Result<()> {
        let target = self.focus.current.and_then(|id| self.clients.get(id));

        let Some(client) = target else {
            debug!("focusing sink");
            tolerate(self.conn.set_input_focus(self.conn.sink()), "focus sink")?;
            self.conn.publish(RootUpdate::ActiveWindow(None))?;
            return Ok(());
        };

        let window = client.window;
        debug!(id = %client.id, window, "committing focus");

        if client.policy.focus.get() == FocusPolicy::Never {
            tolerate(self.conn.set_input_focus(self.conn.sink()), "focus sink")?;
        } else {
            if client.input_hint {
                tolerate(self.conn.set_input_focus(window), "set input focus")?;
            }
            if client.protocols.contains(Protocols::TAKE_FOCUS) {
                tolerate(
                    self.conn.send_protocol(window, ProtocolMessage::TakeFocus),
                    "take focus",
                )?;
            }
            tolerate(self.conn.install_colormap(window), "install colormap")?;
        }

        self.conn.publish(RootUpdate::ActiveWindow(Some(window)))?;
        Ok(())
    }

    /// Focused client must be the head of the active ring
    pub fn check_focus_invariant(&self) -> bool {
        let ws = self.workspaces.current();
        let head = self.focus.head(ws);
        let holds = self.focus.current == head;
        if !holds {
            let ring = self.focus.ring(ws).map(Ring::order);
            warn!(current = ?self.focus.current, ?head, ?ring, "focus is not the ring head");
        }
        holds
    }
}
