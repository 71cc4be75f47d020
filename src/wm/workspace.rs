//! Workspace Module
//!
//! Virtual desktops, workspace switching, and sticky/omnipresent clients.
//! Workspaces are numbered from 1; 0 means a client has not been assigned yet.

use tracing::{debug, info, warn};

use crate::wm::client::{ClientId, WmState};
use crate::wm::client_flags::Provenance;
use crate::wm::error::{Result, tolerate};
use crate::wm::rules::apply_rules;
use crate::wm::transport::{RootUpdate, Transport};
use crate::wm::WindowManager;

/// Workspace manager
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    current: u32,
    names: Vec<String>,
}

impl WorkspaceManager {
    /// `names` beyond `count` are dropped, missing ones get a default
    pub fn new(count: u32, names: &[String]) -> Self {
        let count = count.max(1);
        let names = (0..count as usize)
            .map(|i| {
                names
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| format!("Workspace {}", i + 1))
            })
            .collect();
        Self { current: 1, names }
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn count(&self) -> u32 {
        self.names.len() as u32
    }

    pub fn is_valid(&self, workspace: u32) -> bool {
        (1..=self.count()).contains(&workspace)
    }

    pub fn name(&self, workspace: u32) -> Option<&str> {
        let index = workspace.checked_sub(1)?;
        self.names.get(index as usize).map(String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

impl<C: Transport> WindowManager<C> {
    /// Publish the desktop count, names and current desktop on the root window
    pub fn publish_workspaces(&self) -> Result<()> {
        self.conn
            .publish(RootUpdate::NumberOfDesktops(self.workspaces.count()))?;
        self.conn
            .publish(RootUpdate::DesktopNames(self.workspaces.names().to_vec()))?;
        self.conn
            .publish(RootUpdate::CurrentDesktop(self.workspaces.current() - 1))
    }

    pub(crate) fn publish_client_desktop(&self, id: ClientId) -> Result<()> {
        let Some(client) = self.clients.get(id) else {
            return Ok(());
        };
        let desktop = if client.policy.omnipresent.get() {
            crate::wm::hints::ALL_DESKTOPS
        } else if client.workspace == 0 {
            return Ok(());
        } else {
            client.workspace - 1
        };
        self.conn.publish(RootUpdate::WmDesktop {
            window: client.window,
            desktop,
        })
    }

    /// Show or hide a mapped client to match the current workspace
    pub(crate) fn update_visibility(&mut self, id: ClientId) -> Result<()> {
        let ws = self.workspaces.current();
        let Some(client) = self.clients.get_mut(id) else {
            return Ok(());
        };
        let should_show = client.workspace == ws
            || client.policy.sticky.get()
            || client.policy.omnipresent.get();

        let target = match (client.state, should_show) {
            (WmState::Unmapped, true) => WmState::Normal,
            (WmState::Normal, false) => WmState::Unmapped,
            _ => return Ok(()),
        };
        client.state = target;
        let (window, frame) = (client.window, client.frame);
        debug!(id = %id, state = ?target, "visibility changed");

        if let Some(frame) = frame {
            let op = if target == WmState::Normal {
                self.conn.map_window(frame)
            } else {
                self.conn.unmap_window(frame)
            };
            tolerate(op, "toggle frame")?;
        }
        tolerate(self.conn.set_wm_state(window, target), "set WM_STATE")?;
        Ok(())
    }

    /// Move a ring node from one workspace to another, at the head when `as_head`
    fn refile(&mut self, id: ClientId, from: u32, to: u32, as_head: bool) {
        if from == to {
            return;
        }
        self.focus.remove_from(id, from);
        self.focus.add(id, &[to], as_head);
    }

    fn in_ring(&self, id: ClientId) -> bool {
        !self.focus.workspaces_of(id).is_empty()
    }

    pub fn switch_workspace(&mut self, workspace: u32) -> Result<()> {
        if !self.workspaces.is_valid(workspace) {
            warn!(workspace, count = self.workspaces.count(), "invalid workspace");
            return Ok(());
        }
        let old = self.workspaces.current();
        if workspace == old {
            debug!(workspace, "already on workspace");
            return Ok(());
        }

        info!(
            from = old,
            to = workspace,
            name = self.workspaces.name(workspace).unwrap_or_default(),
            "switching workspace"
        );
        self.workspaces.current = workspace;

        let focused = self.focus.current;
        for id in self.clients.ids() {
            let Some(client) = self.clients.get_mut(id) else {
                continue;
            };
            let follows = client.policy.sticky.get() && !client.policy.omnipresent.get();
            if follows && client.workspace == old {
                client.workspace = workspace;
                if self.in_ring(id) {
                    self.refile(id, old, workspace, focused == Some(id));
                }
                self.publish_client_desktop(id)?;
            }
        }

        // map the incoming clients before unmapping the outgoing ones
        let (entering, leaving): (Vec<_>, Vec<_>) = self
            .clients
            .iter()
            .filter(|c| matches!(c.state, WmState::Normal | WmState::Unmapped))
            .map(|c| c.id)
            .partition(|&id| {
                self.clients
                    .get(id)
                    .is_some_and(|c| c.state == WmState::Unmapped)
            });
        for id in entering.into_iter().chain(leaving) {
            self.update_visibility(id)?;
        }

        self.restack()?;
        self.conn.publish(RootUpdate::CurrentDesktop(workspace - 1))?;
        self.sync_focus()
    }

    pub fn move_to_workspace(&mut self, id: ClientId, workspace: u32) -> Result<()> {
        if !self.workspaces.is_valid(workspace) {
            warn!(workspace, "invalid workspace");
            return Ok(());
        }
        let rules = self.config.rules.clone();
        let Some(client) = self.clients.get_mut(id) else {
            return Ok(());
        };
        let old = client.workspace;
        if old == workspace {
            return Ok(());
        }
        info!(id = %id, from = old, to = workspace, "moving client to workspace");

        client.policy.sticky.assign(false, Provenance::UserSet);
        client.workspace = workspace;
        apply_rules(&rules, client);
        let omnipresent = client.policy.omnipresent.get();

        if !omnipresent && self.in_ring(id) {
            self.refile(id, old, workspace, true);
        }
        self.stacking.restratify(&self.clients);
        self.update_visibility(id)?;
        self.restack()?;
        self.publish_client_desktop(id)?;
        self.sync_focus()
    }

    pub fn set_sticky(&mut self, id: ClientId, on: bool, provenance: Provenance) -> Result<()> {
        let ws = self.workspaces.current();
        let Some(client) = self.clients.get_mut(id) else {
            return Ok(());
        };
        if !client.policy.sticky.assign(on, provenance) {
            debug!(
                id = %id,
                held = ?client.policy.sticky.provenance(),
                "sticky change refused by provenance"
            );
            return Ok(());
        }
        let old = client.workspace;
        if on && old != 0 && old != ws && client.state != WmState::Withdrawn {
            client.workspace = ws;
            let omnipresent = client.policy.omnipresent.get();
            if !omnipresent && self.in_ring(id) {
                self.refile(id, old, ws, false);
            }
        }
        self.update_visibility(id)?;
        self.publish_client_desktop(id)?;
        self.sync_focus()
    }

    /// Omnipresent clients own one ring node per workspace
    pub fn set_omnipresent(&mut self, id: ClientId, on: bool, provenance: Provenance) -> Result<()> {
        let Some(client) = self.clients.get_mut(id) else {
            return Ok(());
        };
        if client.policy.omnipresent.get() == on || !client.policy.omnipresent.assign(on, provenance) {
            return Ok(());
        }
        let own = client.workspace;

        if self.in_ring(id) {
            if on {
                let others: Vec<u32> = (1..=self.workspaces.count())
                    .filter(|&w| w != own && !self.focus.workspaces_of(id).contains(&w))
                    .collect();
                self.focus.add(id, &others, false);
            } else {
                for w in self.focus.workspaces_of(id) {
                    if w != own {
                        self.focus.remove_from(id, w);
                    }
                }
            }
        }
        self.update_visibility(id)?;
        self.publish_client_desktop(id)?;
        self.sync_focus()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::Geometry;
    use crate::wm::mock::{Request, manage, test_wm};

    fn square() -> Geometry {
        Geometry::new(0, 0, 100, 100)
    }

    #[test]
    fn names_are_padded_and_truncated() {
        let ws = WorkspaceManager::new(3, &["web".to_string()]);
        assert_eq!(ws.count(), 3);
        assert_eq!(ws.name(1), Some("web"));
        assert_eq!(ws.name(3), Some("Workspace 3"));
        assert_eq!(ws.name(0), None);
        assert!(!ws.is_valid(4));
    }

    #[test]
    fn switching_hides_and_shows_clients() {
        let mut wm = test_wm();
        let a = manage(&mut wm, 10, square());
        wm.switch_workspace(2).unwrap();
        let b = manage(&mut wm, 20, square());

        assert_eq!(wm.clients.get(a).unwrap().state, WmState::Unmapped);
        assert_eq!(wm.focus.current, Some(b));

        let frame_a = wm.clients.get(a).unwrap().frame.unwrap();
        wm.conn.take_requests();
        wm.switch_workspace(1).unwrap();

        assert_eq!(wm.conn.last_focus(), Some(10));
        let requests = wm.conn.take_requests();
        assert!(requests.contains(&Request::Map(frame_a)));
        assert!(requests.contains(&Request::Publish(RootUpdate::CurrentDesktop(0))));
        assert_eq!(wm.clients.get(a).unwrap().state, WmState::Normal);
        assert_eq!(wm.clients.get(b).unwrap().state, WmState::Unmapped);
        assert_eq!(wm.focus.current, Some(a));
    }

    #[test]
    fn empty_workspace_focuses_the_sink() {
        let mut wm = test_wm();
        manage(&mut wm, 10, square());
        wm.switch_workspace(3).unwrap();

        assert_eq!(wm.focus.current, None);
        assert_eq!(wm.conn.last_focus(), Some(crate::wm::mock::SINK));
    }

    #[test]
    fn invalid_workspace_is_ignored() {
        let mut wm = test_wm();
        wm.switch_workspace(0).unwrap();
        wm.switch_workspace(99).unwrap();
        assert_eq!(wm.workspaces.current(), 1);
    }

    #[test]
    fn sticky_clients_follow_with_their_ring_node() {
        let mut wm = test_wm();
        let a = manage(&mut wm, 10, square());
        wm.set_sticky(a, true, Provenance::UserSet).unwrap();

        wm.switch_workspace(2).unwrap();

        let client = wm.clients.get(a).unwrap();
        assert_eq!(client.workspace, 2);
        assert_eq!(client.state, WmState::Normal);
        assert_eq!(wm.focus.workspaces_of(a), vec![2]);
        assert_eq!(wm.focus.current, Some(a));
    }

    #[test]
    fn omnipresent_clients_head_every_ring() {
        let mut wm = test_wm();
        let a = manage(&mut wm, 10, square());
        wm.set_omnipresent(a, true, Provenance::UserSet).unwrap();
        assert_eq!(wm.focus.workspaces_of(a).len() as u32, wm.workspaces.count());

        wm.switch_workspace(2).unwrap();
        assert_eq!(wm.focus.current, Some(a));

        wm.set_omnipresent(a, false, Provenance::UserSet).unwrap();
        assert_eq!(wm.focus.workspaces_of(a), vec![1]);
        assert_eq!(wm.focus.current, None);
    }

    #[test]
    fn hint_cannot_unset_a_user_choice() {
        let mut wm = test_wm();
        let a = manage(&mut wm, 10, square());
        wm.set_sticky(a, true, Provenance::UserSet).unwrap();
        wm.set_sticky(a, false, Provenance::HintSet).unwrap();
        assert!(wm.clients.get(a).unwrap().policy.sticky.get());
    }

    #[test]
    fn moving_the_focused_client_away_refocuses() {
        let mut wm = test_wm();
        let a = manage(&mut wm, 10, square());
        let b = manage(&mut wm, 20, square());
        assert_eq!(wm.focus.current, Some(b));

        wm.move_to_workspace(b, 2).unwrap();

        assert_eq!(wm.clients.get(b).unwrap().state, WmState::Unmapped);
        assert_eq!(wm.focus.workspaces_of(b), vec![2]);
        assert_eq!(wm.focus.current, Some(a));
        assert_eq!(wm.focus.head(2), Some(b));
        let requests = wm.conn.take_requests();
        assert!(requests.contains(&Request::Publish(RootUpdate::WmDesktop {
            window: 20,
            desktop: 1
        })));
    }
}
