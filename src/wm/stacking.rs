//! Stacking Module
//!
//! Global z-order in three tiers (bottom-locked, normal, top-locked) and the
//! transient raise. Transients always end up above their owner: a raise walks
//! up the owner chain and re-raises each level's subtree on the way down.
//! Owners that do not keep their transients above are not pulled forward when
//! one of their transients is raised; the transient rises on its own.

use std::collections::HashSet;

use tracing::debug;

use crate::wm::client::{ClientId, WmState};
use crate::wm::client_flags::{Provenance, Tier};
use crate::wm::error::{Result, tolerate};
use crate::wm::registry::ClientRegistry;
use crate::wm::transport::{RootUpdate, Transport};
use crate::wm::WindowManager;

fn slot(tier: Tier) -> usize {
    match tier {
        Tier::Bottom => 0,
        Tier::Normal => 1,
        Tier::Top => 2,
    }
}

/// Stacking manager; every tier is ordered bottom to top
#[derive(Debug, Clone, Default)]
pub struct StackingManager {
    tiers: [Vec<ClientId>; 3],
}

impl StackingManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full order, bottom to top
    pub fn bottom_to_top(&self) -> Vec<ClientId> {
        self.tiers.iter().flatten().copied().collect()
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.tiers.iter().any(|t| t.contains(&id))
    }

    /// Index in the concatenated order
    pub fn position(&self, id: ClientId) -> Option<usize> {
        self.tiers.iter().flatten().position(|&c| c == id)
    }

    fn tier_containing(&self, id: ClientId) -> Option<usize> {
        self.tiers.iter().position(|t| t.contains(&id))
    }

    /// A client's own tier, raised to the highest tier along its owner chain
    pub fn effective_tier(&self, clients: &ClientRegistry, id: ClientId) -> Tier {
        clients
            .ancestors(id)
            .into_iter()
            .filter_map(|c| clients.get(c))
            .map(|c| c.policy.tier())
            .max()
            .unwrap_or(Tier::Normal)
    }

    /// Insert at the top of its tier
    pub fn add(&mut self, clients: &ClientRegistry, id: ClientId) {
        if self.contains(id) {
            return;
        }
        let tier = self.effective_tier(clients, id);
        self.tiers[slot(tier)].push(id);
    }

    pub fn remove(&mut self, id: ClientId) {
        for tier in &mut self.tiers {
            tier.retain(|&c| c != id);
        }
    }

    /// Move every client whose tier changed to the top of its new tier,
    /// keeping the relative order of the moved clients
    pub fn restratify(&mut self, clients: &ClientRegistry) {
        let mut moved = Vec::new();
        for i in 0..self.tiers.len() {
            let (keep, go): (Vec<_>, Vec<_>) = self.tiers[i]
                .iter()
                .copied()
                .partition(|&id| slot(self.effective_tier(clients, id)) == i);
            self.tiers[i] = keep;
            moved.extend(go);
        }
        for id in moved {
            let tier = self.effective_tier(clients, id);
            debug!(id = %id, ?tier, "changing tier");
            self.tiers[slot(tier)].push(id);
        }
    }

    fn move_to_top(&mut self, id: ClientId) {
        if let Some(i) = self.tier_containing(id) {
            self.tiers[i].retain(|&c| c != id);
            self.tiers[i].push(id);
        }
    }

    /// `id`'s transients, bottom-most first
    fn children_in_order(&self, clients: &ClientRegistry, id: ClientId) -> Vec<ClientId> {
        let Some(client) = clients.get(id) else {
            return Vec::new();
        };
        let mut children = client.transients.clone();
        children.sort_by_key(|&c| self.position(c).unwrap_or(usize::MAX));
        children
    }

    fn raise_subtree(
        &mut self,
        clients: &ClientRegistry,
        id: ClientId,
        skip: Option<ClientId>,
        visible: &dyn Fn(ClientId) -> bool,
        visited: &mut HashSet<ClientId>,
    ) {
        if !visited.insert(id) {
            return;
        }
        if visible(id) {
            self.move_to_top(id);
        }

        for child in self.children_in_order(clients, id) {
            if Some(child) != skip {
                self.raise_subtree(clients, child, None, visible, visited);
            }
        }
    }

    /// Transient raise. Ancestors are raised oldest first, each followed by its
    /// other transients, then `id` with all of its descendants on top. Clients
    /// that are not visible keep their position but their subtrees are visited.
    /// The climb stops below the first owner that does not keep transients above.
    pub fn raise(
        &mut self,
        clients: &ClientRegistry,
        id: ClientId,
        visible: &dyn Fn(ClientId) -> bool,
    ) {
        let mut path: Vec<ClientId> = clients
            .ancestors(id)
            .into_iter()
            .enumerate()
            .take_while(|&(i, c)| {
                i == 0
                    || clients
                        .get(c)
                        .is_some_and(|owner| owner.policy.keep_transients_above.get())
            })
            .map(|(_, c)| c)
            .collect();
        path.reverse();

        let mut visited = HashSet::new();
        for (i, &node) in path.iter().enumerate() {
            let next_on_path = path.get(i + 1).copied();
            self.raise_subtree(clients, node, next_on_path, visible, &mut visited);
        }
    }

    /// Move the whole transient family of `id` to the bottom of their tiers
    pub fn lower(&mut self, clients: &ClientRegistry, id: ClientId) {
        let root = clients.ancestors(id).last().copied().unwrap_or(id);
        let family: HashSet<ClientId> = clients.descendants(root).into_iter().collect();

        for tier in &mut self.tiers {
            let (mut members, rest): (Vec<_>, Vec<_>) =
                tier.iter().copied().partition(|c| family.contains(c));
            members.extend(rest);
            *tier = members;
        }
    }
}

impl<C: Transport> WindowManager<C> {
    pub fn stack_add(&mut self, id: ClientId) -> Result<()> {
        self.stacking.add(&self.clients, id);
        self.restack()
    }

    pub fn raise(&mut self, id: ClientId) -> Result<()> {
        if !self.clients.contains(id) {
            return Ok(());
        }
        debug!(id = %id, "raising");
        let ws = self.workspaces.current();
        let clients = &self.clients;
        self.stacking
            .raise(clients, id, &|c| clients.is_visible(c, ws));
        self.restack()
    }

    pub fn lower(&mut self, id: ClientId) -> Result<()> {
        if !self.clients.contains(id) {
            return Ok(());
        }
        debug!(id = %id, "lowering");
        self.stacking.lower(&self.clients, id);
        self.restack()
    }

    /// Pin a client to a tier (or back to normal) and re-file it
    pub fn set_layer(&mut self, id: ClientId, tier: Tier, provenance: Provenance) -> Result<()> {
        let Some(client) = self.clients.get_mut(id) else {
            return Ok(());
        };
        client
            .policy
            .always_on_top
            .assign(tier == Tier::Top, provenance);
        client
            .policy
            .always_on_bottom
            .assign(tier == Tier::Bottom, provenance);

        self.stacking.restratify(&self.clients);
        self.raise(id)
    }

    /// Commit the full order to the server and republish the stacking list
    pub fn restack(&mut self) -> Result<()> {
        let order = self.stacking.bottom_to_top();
        let frames: Vec<_> = order
            .iter()
            .rev()
            .filter_map(|&id| self.clients.get(id))
            .filter_map(|c| c.frame)
            .collect();
        tolerate(self.conn.restack(&frames), "restack")?;

        let windows = order
            .iter()
            .filter_map(|&id| self.clients.get(id))
            .filter(|c| c.state != WmState::Withdrawn)
            .map(|c| c.window)
            .collect();
        self.conn.publish(RootUpdate::ClientListStacking(windows))
    }
}
