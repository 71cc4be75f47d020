//! Window Manager Module
//!
//! The window manager context. One [`WindowManager`] owns the client
//! registry, the focus rings, the stacking order and the workspaces, and is
//! driven by events read from a [`Transport`]. Every subsystem adds its
//! operations to it in its own module.

pub mod client;
pub mod client_flags;
pub mod cycle;
pub mod display;
pub mod error;
pub mod events;
pub mod ewmh;
pub mod focus;
pub mod hints;
pub mod keyboard;
#[cfg(test)]
pub mod mock;
pub mod moveresize;
pub mod placement;
pub mod registry;
pub mod rules;
pub mod stacking;
pub mod terminate;
pub mod transients;
pub mod transport;
pub mod workspace;

use std::time::Duration;

use tracing::{debug, error, info};

use crate::config::Config;
use crate::shared::{Geometry, Xid};
use crate::wm::client::{Client, ClientId, Gravity, WmState};
use crate::wm::client_flags::Policy;
use crate::wm::error::{Error, Result, tolerate};
use crate::wm::events::ConfigureRequest;
use crate::wm::focus::FocusManager;
use crate::wm::hints::HintsManager;
use crate::wm::keyboard::{KeyCombo, KeyboardManager};
use crate::wm::registry::ClientRegistry;
use crate::wm::rules::apply_rules;
use crate::wm::stacking::StackingManager;
use crate::wm::terminate::TerminateManager;
use crate::wm::transport::{RootUpdate, Transport};
use crate::wm::workspace::WorkspaceManager;

/// The nested session currently holding an input grab
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrabKind {
    MoveResize,
    Cycle,
}

pub struct WindowManager<C: Transport> {
    pub conn: C,
    pub config: Config,
    pub clients: ClientRegistry,
    pub focus: FocusManager,
    pub stacking: StackingManager,
    pub workspaces: WorkspaceManager,
    pub keyboard: KeyboardManager,
    pub terminate: TerminateManager,
    /// At most one interactive session at a time
    pub grab: Option<GrabKind>,
    pub work_area: Geometry,
}

impl<C: Transport> WindowManager<C> {
    /// Create a new window manager on top of an established transport
    pub fn new(conn: C, config: Config) -> Result<Self> {
        let keyboard = KeyboardManager::from_config(&config.keybindings.0)?;
        let workspaces = WorkspaceManager::new(config.workspaces.count, &config.workspaces.names);
        let work_area = conn.work_area();

        info!(
            workspaces = workspaces.count(),
            ?work_area,
            "initializing window manager"
        );

        Ok(Self {
            focus: FocusManager::new(workspaces.count()),
            stacking: StackingManager::new(),
            clients: ClientRegistry::new(),
            terminate: TerminateManager::new(),
            grab: None,
            conn,
            config,
            keyboard,
            workspaces,
            work_area,
        })
    }

    /// Publish root state, grab bindings and adopt the windows already on screen
    pub fn start(&mut self) -> Result<()> {
        self.publish_workspaces()?;
        self.grab_keys()?;
        self.manage_existing()?;
        self.focus_ensure()?;
        self.conn.flush()
    }

    pub fn grab_keys(&self) -> Result<()> {
        let combos: Vec<KeyCombo> = self.keyboard.combos().copied().collect();
        debug!(count = combos.len(), "grabbing key bindings");
        self.conn.grab_keys(&combos)
    }

    pub fn manage_existing(&mut self) -> Result<()> {
        let windows = self.conn.existing_windows()?;
        info!(count = windows.len(), "adopting existing windows");
        for window in windows {
            self.create(window)?;
        }
        Ok(())
    }

    /// Dispatch everything already queued on the transport
    pub fn process_pending(&mut self) -> Result<()> {
        while let Some(event) = self.conn.poll_event()? {
            self.handle_event(event)?;
        }
        self.conn.flush()
    }

    /// Hand every window back to the root, for a clean exit or a replacing manager
    pub fn release_all(&mut self) -> Result<()> {
        if self.clients.is_empty() {
            return self.conn.flush();
        }
        info!(count = self.clients.len(), "releasing managed windows");
        let th = self.config.decorations.titlebar_height;
        for client in self.clients.iter() {
            if let Some(frame) = client.frame {
                tolerate(
                    self.conn.release_frame(client.window, frame, client.content_origin(th)),
                    "release frame",
                )?;
            }
        }
        self.conn.flush()
    }

    pub fn is_visible(&self, id: ClientId) -> bool {
        self.clients.is_visible(id, self.workspaces.current())
    }

    /// Start managing `window`. Returns `None` for windows the manager must not
    /// touch, and when the window could not be framed; nothing is recorded then.
    pub fn create(&mut self, window: Xid) -> Result<Option<ClientId>> {
        if self.clients.find(window).is_some()
            || window == self.conn.root()
            || window == self.conn.sink()
        {
            return Ok(None);
        }

        let Some(attrs) = tolerate(self.conn.window_attributes(window), "window attributes")?
        else {
            return Ok(None);
        };
        if attrs.override_redirect {
            debug!(window, "override-redirect window, not managing");
            return Ok(None);
        }
        let Some(props) = tolerate(self.conn.client_properties(window), "client properties")?
        else {
            return Ok(None);
        };

        let id = self.clients.allocate_id();
        let policy = Policy::new(self.config.focus.policy, self.config.decorations.titlebar);
        let mut client = Client::new(id, window, attrs.geometry, policy);
        client.patience = Duration::from_millis(self.config.terminate.patience_ms);

        let hinted = HintsManager::apply(&mut client, &props);
        let ruled = apply_rules(&self.config.rules, &mut client);
        client.workspace = ruled
            .or(hinted)
            .filter(|&ws| self.workspaces.is_valid(ws))
            .unwrap_or(0);

        let (width, height) = client
            .size_hints
            .constrain(client.geometry.width, client.geometry.height);
        client.geometry = Geometry { width, height, ..client.geometry };
        if props.net_state.contains(hints::NetState::MAXIMIZED) {
            client.saved_geometry = Some(client.geometry);
        }

        let th = self.config.decorations.titlebar_height;
        let frame = match self.conn.create_frame(
            window,
            client.frame_geometry(th),
            client.title_height(th),
        ) {
            Ok(frame) => frame,
            Err(e) if e.is_benign() => {
                debug!(window, error = %e, "window vanished before it was framed");
                return Ok(None);
            }
            Err(e @ Error::IdsExhausted) => {
                error!(window, error = %e, "cannot frame window, not managing it");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        client.frame = Some(frame);
        if attrs.viewable {
            // reparenting a mapped window unmaps it
            client.ignore_unmaps += 1;
        }

        self.clients.insert(client);
        info!(id = %id, window, frame, "managing window");

        tolerate(self.conn.grab_buttons(frame), "grab buttons")?;
        let root = self.conn.root();
        self.clients.retarget_transient(id, root);
        self.stack_add(id)?;
        self.publish_client_list()?;

        if attrs.viewable {
            self.map_client(id)?;
        }
        Ok(Some(id))
    }

    /// Bring a client to Normal (or Unmapped, off the current workspace)
    pub fn map_client(&mut self, id: ClientId) -> Result<()> {
        let current = self.workspaces.current();
        let th = self.config.decorations.titlebar_height;

        let parent_ws = self
            .clients
            .get(id)
            .and_then(|c| c.transient_parent)
            .and_then(|p| self.clients.get(p))
            .map(|p| p.workspace)
            .filter(|&ws| ws != 0);

        let Some(client) = self.clients.get_mut(id) else {
            return Ok(());
        };
        if client.state != WmState::Withdrawn {
            return Ok(());
        }
        if client.workspace == 0 {
            client.workspace = parent_ws.unwrap_or(current);
        }
        if client.policy.sticky.get() && !client.policy.omnipresent.get() {
            client.workspace = current;
        }
        let needs_titlebar = client.has_titlebar() && client.titlebar.is_none();
        let (frame, width) = (client.frame, client.geometry.width);

        if needs_titlebar {
            if let Some(frame) = frame {
                self.create_titlebar(id, frame, width, th)?;
            }
        }

        self.place_client(id)?;
        let Some(client) = self.clients.get(id) else {
            return Ok(());
        };
        let geometry = client.saved_geometry.map_or(client.geometry, |_| {
            Geometry::new(
                self.work_area.x,
                self.work_area.y,
                self.work_area.width,
                self.work_area.height.saturating_sub(client.title_height(th)),
            )
        });
        self.configure_client(id, geometry)?;

        let Some(client) = self.clients.get_mut(id) else {
            return Ok(());
        };
        let visible = client.workspace == current
            || client.policy.sticky.get()
            || client.policy.omnipresent.get();
        client.state = if visible { WmState::Normal } else { WmState::Unmapped };
        let (window, titlebar, frame, state) =
            (client.window, client.titlebar, client.frame, client.state);

        tolerate(self.conn.map_window(window), "map window")?;
        if let Some(titlebar) = titlebar {
            tolerate(self.conn.map_window(titlebar), "map titlebar")?;
        }
        if let (Some(frame), true) = (frame, visible) {
            tolerate(self.conn.map_window(frame), "map frame")?;
        }
        tolerate(self.conn.set_wm_state(window, state), "set WM_STATE")?;
        info!(id = %id, ?state, "mapped");

        self.publish_client_desktop(id)?;
        self.focus_add(id)?;
        if visible {
            self.raise(id)?;
        }
        Ok(())
    }

    /// Titlebars are created the first time a client that has one is mapped
    fn create_titlebar(&mut self, id: ClientId, frame: Xid, width: u32, height: u32) -> Result<()> {
        match self.conn.create_titlebar(frame, width, height) {
            Ok(titlebar) => {
                if let Some(client) = self.clients.get_mut(id) {
                    client.titlebar = Some(titlebar);
                }
                self.clients.index_window(titlebar, id);
                Ok(())
            }
            Err(e) if e.is_benign() => Ok(()),
            Err(e @ Error::IdsExhausted) => {
                error!(id = %id, error = %e, "cannot create titlebar, dropping decoration");
                if let Some(client) = self.clients.get_mut(id) {
                    client.policy.has_titlebar.force(false);
                }
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// The application unmapped its window
    pub fn withdraw(&mut self, id: ClientId) -> Result<()> {
        let Some(client) = self.clients.get_mut(id) else {
            return Ok(());
        };
        if client.state == WmState::Withdrawn {
            return Ok(());
        }
        client.state = WmState::Withdrawn;
        let (window, frame) = (client.window, client.frame);
        info!(id = %id, "withdrawn");

        if let Some(frame) = frame {
            tolerate(self.conn.unmap_window(frame), "unmap frame")?;
        }
        tolerate(self.conn.set_wm_state(window, WmState::Withdrawn), "set WM_STATE")?;
        self.focus_remove(id)?;
        self.restack()
    }

    /// The application window is gone: detach from every structure, then drop the record
    pub fn destroy(&mut self, id: ClientId) -> Result<()> {
        if !self.clients.contains(id) {
            return Ok(());
        }
        self.stacking.remove(id);
        self.focus.remove(id);

        let Some(client) = self.clients.remove(id) else {
            return Ok(());
        };
        info!(id = %id, window = client.window, "unmanaging window");
        if let Some(frame) = client.frame {
            tolerate(self.conn.destroy_window(frame), "destroy frame")?;
        }

        // orphaned transients may fall back to their own tier
        self.stacking.restratify(&self.clients);
        self.restack()?;
        self.publish_client_list()?;
        self.sync_focus()
    }

    /// Push a client's geometry to its frame, titlebar and window
    pub(crate) fn configure_frame(&self, id: ClientId) -> Result<()> {
        let titlebar_height = self.config.decorations.titlebar_height;
        let Some(client) = self.clients.get(id) else {
            return Ok(());
        };
        let th = client.title_height(titlebar_height);
        let Geometry { width, height, .. } = client.geometry;

        if let Some(frame) = client.frame {
            tolerate(
                self.conn.configure_window(frame, client.frame_geometry(titlebar_height)),
                "configure frame",
            )?;
        }
        if let (Some(titlebar), true) = (client.titlebar, th > 0) {
            tolerate(
                self.conn.configure_window(titlebar, Geometry::new(0, 0, width, th)),
                "configure titlebar",
            )?;
        }
        tolerate(
            self.conn
                .configure_window(client.window, Geometry::new(0, th as i32, width, height)),
            "configure window",
        )?;
        Ok(())
    }

    /// Move/resize a client within its size constraints and tell it where it
    /// ended up with a synthetic ConfigureNotify
    pub fn configure_client(&mut self, id: ClientId, geometry: Geometry) -> Result<()> {
        let th = self.config.decorations.titlebar_height;
        let Some(client) = self.clients.get_mut(id) else {
            return Ok(());
        };
        let (width, height) = client.size_hints.constrain(geometry.width, geometry.height);
        client.geometry = Geometry { width, height, ..geometry };
        let origin = client.content_origin(th);
        let window = client.window;

        self.configure_frame(id)?;
        tolerate(
            self.conn
                .send_configure_notify(window, Geometry::new(origin.x, origin.y, width, height)),
            "synthetic configure notify",
        )?;
        Ok(())
    }

    pub fn handle_configure_request(&mut self, req: ConfigureRequest) -> Result<()> {
        let Some(id) = self
            .clients
            .find(req.window)
            .filter(|&id| self.clients.get(id).is_some_and(|c| c.window == req.window))
        else {
            return self.configure_unmanaged(req);
        };

        let th = self.config.decorations.titlebar_height;
        let Some(client) = self.clients.get(id) else {
            return Ok(());
        };
        let current = client.geometry;
        if client.is_maximized() {
            debug!(id = %id, "ignoring configure request of maximized client");
            return self.configure_client(id, current);
        }

        // a static-gravity client names its own position, everything else the frame's
        let y_offset = match client.size_hints.gravity {
            Gravity::Static => client.title_height(th) as i32,
            _ => 0,
        };
        let requested = Geometry {
            x: req.x.unwrap_or(current.x),
            y: req.y.map_or(current.y, |y| y - y_offset),
            width: req.width.unwrap_or(current.width),
            height: req.height.unwrap_or(current.height),
        };
        debug!(id = %id, ?requested, "configure request");

        self.configure_client(id, requested)?;
        if req.restack && self.is_visible(id) {
            self.raise(id)?;
        }
        Ok(())
    }

    /// Windows we do not manage get what they ask for
    fn configure_unmanaged(&mut self, req: ConfigureRequest) -> Result<()> {
        let Some(attrs) = tolerate(self.conn.window_attributes(req.window), "window attributes")?
        else {
            return Ok(());
        };
        let g = attrs.geometry;
        let geometry = Geometry {
            x: req.x.unwrap_or(g.x),
            y: req.y.unwrap_or(g.y),
            width: req.width.unwrap_or(g.width),
            height: req.height.unwrap_or(g.height),
        };
        tolerate(self.conn.configure_window(req.window, geometry), "configure unmanaged")?;
        Ok(())
    }

    /// Fill the work area, remembering the geometry to restore
    pub fn set_maximized(&mut self, id: ClientId, on: bool) -> Result<()> {
        let th = self.config.decorations.titlebar_height;
        let area = self.work_area;
        let Some(client) = self.clients.get_mut(id) else {
            return Ok(());
        };
        if client.is_maximized() == on {
            return Ok(());
        }

        let target = if on {
            client.saved_geometry = Some(client.geometry);
            Geometry::new(
                area.x,
                area.y,
                area.width,
                area.height.saturating_sub(client.title_height(th)),
            )
        } else {
            client.saved_geometry.take().unwrap_or(client.geometry)
        };
        info!(id = %id, maximized = on, "maximize");
        self.configure_client(id, target)
    }

    pub fn toggle_maximize(&mut self, id: ClientId) -> Result<()> {
        let Some(client) = self.clients.get(id) else {
            return Ok(());
        };
        let on = !client.is_maximized();
        self.set_maximized(id, on)
    }

    /// `_NET_CLIENT_LIST` in creation order
    pub fn publish_client_list(&self) -> Result<()> {
        let windows = self.clients.iter().map(|c| c.window).collect();
        self.conn.publish(RootUpdate::ClientList(windows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wm::client::SizeHints;
    use crate::wm::events::XEvent;
    use crate::wm::hints::ClientProperties;
    use crate::wm::client_flags::{FocusPolicy, Provenance};
    use crate::wm::mock::{MockConn, Request, manage, test_wm};
    use crate::wm::rules::Rule;

    #[test]
    fn override_redirect_windows_are_not_managed() {
        let mut wm = test_wm();
        wm.conn.add_override_redirect(10, Geometry::new(0, 0, 10, 10));

        assert_eq!(wm.create(10).unwrap(), None);
        assert!(wm.clients.is_empty());
        assert!(wm.conn.take_requests().is_empty());
    }

    #[test]
    fn frame_allocation_failure_leaves_no_trace() {
        let mut wm = test_wm();
        wm.conn.add_window(10, Geometry::new(0, 0, 10, 10), ClientProperties::default());
        wm.conn.fail_frames.set(true);

        assert_eq!(wm.create(10).unwrap(), None);
        assert!(wm.clients.is_empty());
        assert!(wm.stacking.bottom_to_top().is_empty());
        assert!(wm.conn.take_requests().is_empty());
    }

    #[test]
    fn vanished_window_is_skipped() {
        let mut wm = test_wm();
        assert_eq!(wm.create(99).unwrap(), None);
    }

    #[test]
    fn every_identity_resolves_to_the_same_client() {
        let mut wm = test_wm();
        let id = manage(&mut wm, 10, Geometry::new(0, 0, 100, 100));
        let client = wm.clients.get(id).unwrap();
        let (frame, titlebar) = (client.frame.unwrap(), client.titlebar.unwrap());

        assert_eq!(wm.clients.find(10), Some(id));
        assert_eq!(wm.clients.find(frame), Some(id));
        assert_eq!(wm.clients.find(titlebar), Some(id));
    }

    #[test]
    fn mapping_focuses_raises_and_publishes() {
        let mut wm = test_wm();
        let id = manage(&mut wm, 10, Geometry::new(0, 0, 100, 100));
        let client = wm.clients.get(id).unwrap();

        assert_eq!(client.state, WmState::Normal);
        assert_eq!(client.workspace, 1);
        assert!(client.placed);
        assert_eq!(wm.focus.current, Some(id));
        let requests = wm.conn.take_requests();
        assert!(requests.contains(&Request::Map(client.frame.unwrap())));
        assert!(requests.contains(&Request::WmState(10, WmState::Normal)));
        assert!(requests.contains(&Request::Publish(RootUpdate::ClientList(vec![10]))));
        assert!(requests.contains(&Request::Publish(RootUpdate::ActiveWindow(Some(10)))));
    }

    #[test]
    fn destroy_detaches_everything() {
        let mut wm = test_wm();
        let owner = manage(&mut wm, 10, Geometry::new(0, 0, 100, 100));
        wm.conn.add_window(
            20,
            Geometry::new(0, 0, 50, 50),
            ClientProperties { transient_for: Some(10), ..Default::default() },
        );
        wm.handle_event(XEvent::MapRequest(20)).unwrap();
        let dialog = wm.clients.find(20).unwrap();
        assert_eq!(wm.clients.get(dialog).unwrap().transient_parent, Some(owner));

        wm.handle_event(XEvent::DestroyNotify(10)).unwrap();

        assert!(wm.clients.get(owner).is_none());
        assert_eq!(wm.clients.find(10), None);
        assert_eq!(wm.clients.get(dialog).unwrap().transient_parent, None);
        assert_eq!(wm.stacking.bottom_to_top(), vec![dialog]);
        assert_eq!(wm.focus.current, Some(dialog));
        assert!(wm.check_focus_invariant());
    }

    #[test]
    fn destroying_the_last_client_focuses_the_sink() {
        let mut wm = test_wm();
        manage(&mut wm, 10, Geometry::new(0, 0, 100, 100));

        wm.handle_event(XEvent::DestroyNotify(10)).unwrap();

        assert_eq!(wm.focus.current, None);
        assert_eq!(wm.conn.last_focus(), Some(crate::wm::mock::SINK));
    }

    #[test]
    fn configure_request_is_constrained_and_answered() {
        let mut wm = test_wm();
        let props = ClientProperties {
            size_hints: SizeHints {
                base: Some((20, 20)),
                inc: Some((10, 10)),
                ..Default::default()
            },
            ..Default::default()
        };
        wm.conn.add_window(10, Geometry::new(0, 0, 100, 100), props);
        wm.handle_event(XEvent::MapRequest(10)).unwrap();
        let id = wm.clients.find(10).unwrap();
        wm.conn.take_requests();

        wm.handle_event(XEvent::ConfigureRequest(ConfigureRequest {
            window: 10,
            x: Some(40),
            y: Some(30),
            width: Some(205),
            height: Some(99),
            restack: false,
        }))
        .unwrap();

        let th = wm.config.decorations.titlebar_height;
        assert_eq!(wm.clients.get(id).unwrap().geometry, Geometry::new(40, 30, 200, 90));
        let requests = wm.conn.take_requests();
        assert!(requests.contains(&Request::ConfigureNotify(
            10,
            Geometry::new(40, 30 + th as i32, 200, 90)
        )));
        assert!(requests.contains(&Request::Configure(10, Geometry::new(0, th as i32, 200, 90))));
    }

    #[test]
    fn unmanaged_configure_requests_pass_through() {
        let mut wm = test_wm();
        wm.conn.add_override_redirect(10, Geometry::new(0, 0, 10, 10));

        wm.handle_event(XEvent::ConfigureRequest(ConfigureRequest {
            window: 10,
            width: Some(30),
            ..Default::default()
        }))
        .unwrap();

        assert_eq!(
            wm.conn.take_requests(),
            vec![Request::Configure(10, Geometry::new(0, 0, 30, 10))]
        );
    }

    #[test]
    fn maximize_saves_and_restores() {
        let mut wm = test_wm();
        let id = manage(&mut wm, 10, Geometry::new(0, 0, 100, 100));
        let before = wm.clients.get(id).unwrap().geometry;
        let th = wm.config.decorations.titlebar_height;

        wm.toggle_maximize(id).unwrap();
        let client = wm.clients.get(id).unwrap();
        assert!(client.is_maximized());
        assert_eq!(client.frame_geometry(th), wm.work_area);

        wm.toggle_maximize(id).unwrap();
        let client = wm.clients.get(id).unwrap();
        assert!(!client.is_maximized());
        assert_eq!(client.geometry, before);
    }

    #[test]
    fn existing_windows_are_adopted_without_withdrawing() {
        let mut wm = test_wm();
        wm.conn.add_viewable(10, Geometry::new(0, 0, 100, 100), ClientProperties::default());
        wm.conn.add_override_redirect(11, Geometry::new(0, 0, 10, 10));

        wm.manage_existing().unwrap();
        let id = wm.clients.find(10).unwrap();
        assert_eq!(wm.clients.len(), 1);
        assert_eq!(wm.clients.get(id).unwrap().state, WmState::Normal);

        // the unmap caused by reparenting is ours
        wm.handle_event(XEvent::UnmapNotify { window: 10, synthetic: false }).unwrap();
        assert_eq!(wm.clients.get(id).unwrap().state, WmState::Normal);
    }

    #[test]
    fn unmap_withdraws_and_map_request_brings_back() {
        let mut wm = test_wm();
        let a = manage(&mut wm, 10, Geometry::new(0, 0, 100, 100));
        let b = manage(&mut wm, 20, Geometry::new(0, 0, 100, 100));

        wm.handle_event(XEvent::UnmapNotify { window: 20, synthetic: false }).unwrap();
        assert_eq!(wm.clients.get(b).unwrap().state, WmState::Withdrawn);
        assert_eq!(wm.focus.current, Some(a));

        wm.handle_event(XEvent::MapRequest(20)).unwrap();
        assert_eq!(wm.clients.get(b).unwrap().state, WmState::Normal);
        assert_eq!(wm.focus.current, Some(b));
    }

    fn last_stacking(wm: &WindowManager<MockConn>) -> Option<Vec<Xid>> {
        wm.conn.requests.borrow().iter().rev().find_map(|r| match r {
            Request::Publish(RootUpdate::ClientListStacking(windows)) => Some(windows.clone()),
            _ => None,
        })
    }

    #[test]
    fn withdrawn_clients_leave_the_stacking_list() {
        let mut wm = test_wm();
        manage(&mut wm, 10, Geometry::new(0, 0, 100, 100));
        manage(&mut wm, 20, Geometry::new(0, 0, 100, 100));
        assert_eq!(last_stacking(&wm), Some(vec![10, 20]));

        wm.handle_event(XEvent::UnmapNotify { window: 20, synthetic: false }).unwrap();
        assert_eq!(last_stacking(&wm), Some(vec![10]));

        wm.handle_event(XEvent::MapRequest(20)).unwrap();
        assert_eq!(last_stacking(&wm), Some(vec![10, 20]));
    }

    #[test]
    fn configured_rules_apply_when_a_window_is_managed() {
        let mut config = Config::default();
        config.rules.push(Rule {
            class: Some("Mail".into()),
            workspace: Some(3),
            focus: Some(FocusPolicy::Sloppy),
            ..Default::default()
        });
        let conn = MockConn::new(Geometry::new(0, 0, 1000, 800));
        let mut wm = WindowManager::new(conn, config).unwrap();
        let props = ClientProperties { class: "Mail".into(), ..Default::default() };
        wm.conn.add_window(10, Geometry::new(0, 0, 100, 100), props);

        let id = wm.create(10).unwrap().unwrap();

        let client = wm.clients.get(id).unwrap();
        assert_eq!(client.workspace, 3);
        assert_eq!(client.policy.focus.get(), FocusPolicy::Sloppy);
        assert_eq!(client.policy.focus.provenance(), Provenance::UserSet);
    }

    #[test]
    fn focus_invariant_holds_across_a_session_of_events() {
        let mut wm = test_wm();
        let a = manage(&mut wm, 10, Geometry::new(0, 0, 100, 100));
        manage(&mut wm, 20, Geometry::new(0, 0, 100, 100));
        manage(&mut wm, 30, Geometry::new(0, 0, 100, 100));

        let events = [
            XEvent::UnmapNotify { window: 30, synthetic: false },
            XEvent::ClientMessage {
                window: 10,
                message: crate::wm::events::ClientMessage::ActiveWindow,
            },
            XEvent::DestroyNotify(20),
            XEvent::ClientMessage {
                window: 10,
                message: crate::wm::events::ClientMessage::CurrentDesktop(1),
            },
            XEvent::MapRequest(30),
        ];
        for event in events {
            wm.handle_event(event).unwrap();
            assert!(wm.check_focus_invariant(), "after {event:?}");
        }
        assert_eq!(wm.workspaces.current(), 2);
        assert_eq!(wm.clients.get(a).unwrap().state, WmState::Unmapped);
    }
}
