//! Transients Module
//!
//! Transient-parent resolution for the client registry. The owner graph is a
//! forest: every retarget walks the candidate's owner chain and refuses any
//! link that would close a cycle.

use tracing::{debug, warn};

use crate::shared::Xid;
use crate::wm::client::ClientId;
use crate::wm::registry::ClientRegistry;

impl ClientRegistry {
    /// Owner chain of `id`, starting with `id` itself and ending at the root ancestor
    pub fn ancestors(&self, id: ClientId) -> Vec<ClientId> {
        let mut chain = vec![id];
        let mut current = id;
        while let Some(parent) = self.get(current).and_then(|c| c.transient_parent) {
            if chain.contains(&parent) || chain.len() > self.len() {
                warn!(id = %id, "transient chain loops, truncating");
                break;
            }
            chain.push(parent);
            current = parent;
        }
        chain
    }

    /// `id` and every transient below it, parents before children
    pub fn descendants(&self, id: ClientId) -> Vec<ClientId> {
        let mut out = vec![id];
        let mut i = 0;
        while i < out.len() {
            if let Some(client) = self.get(out[i]) {
                for &child in &client.transients {
                    if !out.contains(&child) {
                        out.push(child);
                    }
                }
            }
            i += 1;
        }
        out
    }

    /// Would making `parent` the owner of `id` close a cycle?
    pub fn would_cycle(&self, id: ClientId, parent: ClientId) -> bool {
        parent == id || self.ancestors(parent).contains(&id)
    }

    /// Relink `id` under `parent`, maintaining both sides of the relation.
    /// Cycles are rejected by falling back to no parent.
    pub fn set_transient_parent(&mut self, id: ClientId, parent: Option<ClientId>) {
        let parent = match parent {
            Some(p) if !self.contains(p) => None,
            Some(p) if self.would_cycle(id, p) => {
                warn!(id = %id, parent = %p, "rejecting transient cycle");
                None
            }
            other => other,
        };

        let Some(old) = self.get(id).map(|c| c.transient_parent) else {
            return;
        };
        if old == parent {
            return;
        }

        if let Some(old) = old.and_then(|p| self.get_mut(p)) {
            old.transients.retain(|&c| c != id);
        }
        if let Some(new) = parent.and_then(|p| self.get_mut(p)) {
            new.transients.push(id);
        }
        if let Some(client) = self.get_mut(id) {
            client.transient_parent = parent;
        }
    }

    /// Resolve the application's WM_TRANSIENT_FOR hint to a client.
    /// A hint naming the root window means "transient for my group".
    pub fn resolve_transient_hint(&self, id: ClientId, root: Xid) -> Option<ClientId> {
        let client = self.get(id)?;
        let hint = client.transient_for_hint?;

        let candidate = if hint == root || hint == 0 {
            let leader = client.group_leader?;
            // an unmanaged leader hands the role to the oldest plain member
            self.find(leader).or_else(|| {
                self.group_members(leader).into_iter().find(|&m| {
                    m != id && self.get(m).is_some_and(|c| c.transient_for_hint.is_none())
                })
            })
        } else {
            self.find(hint)
        };

        candidate.filter(|&c| c != id)
    }

    /// Re-resolve the transient parent from the current hint.
    /// Returns the parent that ended up linked.
    pub fn retarget_transient(&mut self, id: ClientId, root: Xid) -> Option<ClientId> {
        let candidate = self.resolve_transient_hint(id, root);
        if let Some(parent) = candidate {
            if self.would_cycle(id, parent) {
                warn!(id = %id, parent = %parent, "transient hint would create a cycle, ignoring");
                self.set_transient_parent(id, None);
                return None;
            }
        }

        debug!(id = %id, parent = ?candidate, "retargeting transient");
        self.set_transient_parent(id, candidate);
        self.get(id).and_then(|c| c.transient_parent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::Geometry;
    use crate::wm::client::Client;
    use crate::wm::client_flags::Policy;

    const ROOT: Xid = 1;

    fn add(reg: &mut ClientRegistry, window: Xid) -> ClientId {
        let id = reg.allocate_id();
        reg.insert(Client::new(
            id,
            window,
            Geometry::new(0, 0, 10, 10),
            Policy::default(),
        ))
    }

    fn hint(reg: &mut ClientRegistry, id: ClientId, to: Xid) {
        reg.get_mut(id).unwrap().transient_for_hint = Some(to);
    }

    #[test]
    fn retarget_links_both_directions() {
        let mut reg = ClientRegistry::new();
        let owner = add(&mut reg, 10);
        let dialog = add(&mut reg, 11);
        hint(&mut reg, dialog, 10);

        assert_eq!(reg.retarget_transient(dialog, ROOT), Some(owner));
        assert_eq!(reg.get(owner).unwrap().transients, vec![dialog]);
        assert_eq!(reg.ancestors(dialog), vec![dialog, owner]);
    }

    #[test]
    fn retarget_rejects_cycles() {
        let mut reg = ClientRegistry::new();
        let a = add(&mut reg, 10);
        let b = add(&mut reg, 11);
        let c = add(&mut reg, 12);
        hint(&mut reg, b, 10);
        hint(&mut reg, c, 11);
        reg.retarget_transient(b, ROOT);
        reg.retarget_transient(c, ROOT);

        // a -> c would close a -> c -> b -> a
        hint(&mut reg, a, 12);
        assert_eq!(reg.retarget_transient(a, ROOT), None);
        assert_eq!(reg.get(a).unwrap().transient_parent, None);
        assert_eq!(reg.ancestors(c), vec![c, b, a]);
    }

    #[test]
    fn self_transient_is_ignored() {
        let mut reg = ClientRegistry::new();
        let a = add(&mut reg, 10);
        hint(&mut reg, a, 10);

        assert_eq!(reg.retarget_transient(a, ROOT), None);
    }

    #[test]
    fn root_hint_resolves_to_group_leader() {
        let mut reg = ClientRegistry::new();
        let leader = add(&mut reg, 10);
        let dialog = add(&mut reg, 11);
        reg.get_mut(dialog).unwrap().group_leader = Some(10);
        hint(&mut reg, dialog, ROOT);

        assert_eq!(reg.retarget_transient(dialog, ROOT), Some(leader));
    }

    #[test]
    fn unmanaged_leader_falls_back_to_a_plain_member() {
        let mut reg = ClientRegistry::new();
        let main = add(&mut reg, 10);
        let dialog = add(&mut reg, 11);
        for id in [main, dialog] {
            reg.get_mut(id).unwrap().group_leader = Some(99);
        }
        hint(&mut reg, dialog, ROOT);

        assert_eq!(reg.retarget_transient(dialog, ROOT), Some(main));
    }

    #[test]
    fn retarget_moves_between_owners() {
        let mut reg = ClientRegistry::new();
        let first = add(&mut reg, 10);
        let second = add(&mut reg, 11);
        let dialog = add(&mut reg, 12);
        hint(&mut reg, dialog, 10);
        reg.retarget_transient(dialog, ROOT);
        hint(&mut reg, dialog, 11);
        reg.retarget_transient(dialog, ROOT);

        assert!(reg.get(first).unwrap().transients.is_empty());
        assert_eq!(reg.get(second).unwrap().transients, vec![dialog]);
        assert_eq!(reg.descendants(second), vec![second, dialog]);
    }
}
