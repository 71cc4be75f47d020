//! Events Module
//!
//! Typed protocol events and the top-level dispatcher. Nested grab sessions
//! (move/resize, focus cycling) forward whatever they do not understand to
//! [`WindowManager::handle_event`], so every handler here must tolerate
//! running while a session is active.

use tracing::{debug, info, trace};

use crate::shared::{Point, Xid};
use crate::wm::client::ClientId;
use crate::wm::client_flags::{FocusPolicy, Provenance, Tier};
use crate::wm::error::Result;
use crate::wm::hints::{ALL_DESKTOPS, HintsManager, NetState};
use crate::wm::keyboard::{Key, KeyboardAction, ModMask};
use crate::wm::moveresize::{InputSource, Operation};
use crate::wm::transport::Transport;
use crate::wm::WindowManager;

pub const BUTTON_LEFT: u8 = 1;
pub const BUTTON_RIGHT: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEvent {
    pub window: Xid,
    pub root: Point,
    pub button: u8,
    pub mods: ModMask,
    pub time: u32,
}

/// For releases of a modifier key, `mods` is the state after the release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub mods: ModMask,
    pub time: u32,
}

/// Fields a client asked to change in a ConfigureRequest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConfigureRequest {
    pub window: Xid,
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// A stack-mode change was requested
    pub restack: bool,
}

/// Properties whose changes the manager reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Property {
    TransientFor,
    NormalHints,
    Name,
    Protocols,
    Hints,
    Other,
}

/// `_NET_WM_STATE` request action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateAction {
    Remove,
    Add,
    Toggle,
}

impl StateAction {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Remove),
            1 => Some(Self::Add),
            2 => Some(Self::Toggle),
            _ => None,
        }
    }

    fn apply(self, on: bool) -> bool {
        match self {
            Self::Remove => false,
            Self::Add => true,
            Self::Toggle => !on,
        }
    }
}

/// EWMH client messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientMessage {
    ActiveWindow,
    CloseWindow,
    /// 0-based desktop
    CurrentDesktop(u32),
    /// 0-based desktop or `ALL_DESKTOPS`
    WmDesktop(u32),
    /// `_NET_WM_MOVERESIZE` with its raw direction code
    MoveResize { direction: u32, root: Point },
    Restack { above: bool },
    WmState { action: StateAction, states: NetState },
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XEvent {
    CreateNotify(Xid),
    DestroyNotify(Xid),
    UnmapNotify { window: Xid, synthetic: bool },
    MapRequest(Xid),
    ConfigureRequest(ConfigureRequest),
    ButtonPress(ButtonEvent),
    ButtonRelease(ButtonEvent),
    KeyPress(KeyEvent),
    KeyRelease(KeyEvent),
    Motion { root: Point },
    Enter { window: Xid, root: Point },
    Leave { window: Xid },
    PropertyNotify { window: Xid, property: Property },
    ClientMessage { window: Xid, message: ClientMessage },
}

/// Which part of a client a pointer event landed on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClientPart {
    Content,
    Titlebar,
    Border,
}

impl<C: Transport> WindowManager<C> {
    /// Route one event. Afterwards the focused client is the active ring head.
    pub fn handle_event(&mut self, event: XEvent) -> Result<()> {
        trace!(?event, "dispatching");

        match event {
            XEvent::CreateNotify(window) => debug!(window, "window created"),
            XEvent::DestroyNotify(window) => self.handle_destroy_notify(window)?,
            XEvent::UnmapNotify { window, synthetic } => {
                self.handle_unmap_notify(window, synthetic)?
            }
            XEvent::MapRequest(window) => self.handle_map_request(window)?,
            XEvent::ConfigureRequest(req) => self.handle_configure_request(req)?,
            XEvent::ButtonPress(ev) => self.handle_button_press(ev)?,
            XEvent::ButtonRelease(_) | XEvent::Motion { .. } | XEvent::Leave { .. } => {}
            XEvent::KeyPress(ev) => self.handle_key_press(ev)?,
            XEvent::KeyRelease(_) => {}
            XEvent::Enter { window, .. } => self.handle_enter(window)?,
            XEvent::PropertyNotify { window, property } => {
                self.handle_property_notify(window, property)?
            }
            XEvent::ClientMessage { window, message } => {
                self.handle_client_message(window, message)?
            }
        }

        self.check_focus_invariant();
        Ok(())
    }

    /// Only the application window's destruction ends a client
    fn handle_destroy_notify(&mut self, window: Xid) -> Result<()> {
        if let Some(id) = self.client_for_window(window) {
            self.destroy(id)?;
        }
        Ok(())
    }

    fn handle_unmap_notify(&mut self, window: Xid, synthetic: bool) -> Result<()> {
        let Some(id) = self.client_for_window(window) else {
            return Ok(());
        };
        if let Some(client) = self.clients.get_mut(id) {
            if client.ignore_unmaps > 0 && !synthetic {
                client.ignore_unmaps -= 1;
                return Ok(());
            }
        }
        self.withdraw(id)
    }

    fn handle_map_request(&mut self, window: Xid) -> Result<()> {
        let id = match self.client_for_window(window) {
            Some(id) => Some(id),
            None => self.create(window)?,
        };
        match id {
            Some(id) => self.map_client(id),
            None => Ok(()),
        }
    }

    fn handle_key_press(&mut self, ev: KeyEvent) -> Result<()> {
        let Some(action) = self.keyboard.handle_key_press(ev.mods, ev.key) else {
            return Ok(());
        };
        debug!(?action, "key binding");
        self.run_action(action, ev.mods)
    }

    /// Execute a bound action against the focused client
    pub fn run_action(&mut self, action: KeyboardAction, mods: ModMask) -> Result<()> {
        let focused = self.focus.current;
        let ws = self.workspaces.current();

        match action {
            KeyboardAction::CycleForward => self.cycle_windows(true, mods),
            KeyboardAction::CycleBackward => self.cycle_windows(false, mods),
            KeyboardAction::PreviousWorkspace => {
                let prev = if ws <= 1 { self.workspaces.count() } else { ws - 1 };
                self.switch_workspace(prev)
            }
            KeyboardAction::NextWorkspace => {
                let next = if ws >= self.workspaces.count() { 1 } else { ws + 1 };
                self.switch_workspace(next)
            }
            KeyboardAction::SwitchWorkspace(n) => self.switch_workspace(n),
            _ => {
                let Some(id) = focused else {
                    return Ok(());
                };
                match action {
                    KeyboardAction::MoveWindow => {
                        self.start_move_resize(id, Operation::Move, InputSource::Keyboard, None)
                    }
                    KeyboardAction::ResizeWindow => {
                        self.start_move_resize(id, Operation::Resize, InputSource::Keyboard, None)
                    }
                    KeyboardAction::CloseWindow => self.close(id),
                    KeyboardAction::KillWindow => self.kill(id),
                    KeyboardAction::RaiseWindow => self.raise(id),
                    KeyboardAction::LowerWindow => self.lower(id),
                    KeyboardAction::ToggleMaximize => self.toggle_maximize(id),
                    KeyboardAction::MoveToWorkspace(n) => self.move_to_workspace(id, n),
                    _ => Ok(()),
                }
            }
        }
    }

    fn client_part(&self, id: ClientId, window: Xid) -> ClientPart {
        match self.clients.get(id) {
            Some(c) if c.titlebar == Some(window) => ClientPart::Titlebar,
            Some(c) if c.frame == Some(window) => ClientPart::Border,
            _ => ClientPart::Content,
        }
    }

    fn handle_button_press(&mut self, ev: ButtonEvent) -> Result<()> {
        let Some(id) = self.clients.find(ev.window) else {
            return self.conn.allow_pointer_events(true);
        };

        let part = self.client_part(id, ev.window);
        let alt = ev.mods.contains(ModMask::ALT);
        let operation = match (ev.button, part, alt) {
            (BUTTON_LEFT, _, true) | (BUTTON_LEFT, ClientPart::Titlebar, _) => {
                Some(Operation::Move)
            }
            (BUTTON_RIGHT, _, true) | (BUTTON_LEFT, ClientPart::Border, _) => {
                Some(Operation::Resize)
            }
            _ => None,
        };

        let was_focused = self.focus.current == Some(id);
        let click_through = self
            .clients
            .get(id)
            .is_some_and(|c| c.policy.click_through.get());

        // unfreeze the synchronous grab before anything that may grab again
        self.conn
            .allow_pointer_events(operation.is_none() && (was_focused || click_through))?;

        if !was_focused {
            self.focus_set(id)?;
        }
        if self.config.focus.raise_on_click {
            self.raise(id)?;
        }

        if let Some(operation) = operation {
            self.start_move_resize(id, operation, InputSource::Pointer(ev.root), None)?;
        }
        Ok(())
    }

    fn handle_enter(&mut self, window: Xid) -> Result<()> {
        let Some(id) = self.clients.find(window) else {
            return Ok(());
        };
        let sloppy = self
            .clients
            .get(id)
            .is_some_and(|c| c.policy.focus.get() == FocusPolicy::Sloppy);
        if sloppy && self.focus.current != Some(id) && self.grab.is_none() {
            self.focus_set(id)?;
        }
        Ok(())
    }

    fn handle_property_notify(&mut self, window: Xid, property: Property) -> Result<()> {
        let Some(id) = self.client_for_window(window) else {
            return Ok(());
        };
        if property == Property::Other {
            return Ok(());
        }

        let props = match self.conn.client_properties(window) {
            Ok(props) => props,
            Err(e) if e.is_benign() => return Ok(()),
            Err(e) => return Err(e),
        };
        let root = self.conn.root();
        let Some(client) = self.clients.get_mut(id) else {
            return Ok(());
        };

        match property {
            Property::TransientFor => {
                client.transient_for_hint = props.transient_for;
                let parent = self.clients.retarget_transient(id, root);
                debug!(id = %id, ?parent, "transient hint changed");
                self.stacking.restratify(&self.clients);
                if self.is_visible(id) {
                    self.raise(id)?;
                }
            }
            Property::NormalHints => {
                client.size_hints = props.size_hints;
                let geometry = client.geometry;
                self.configure_client(id, geometry)?;
            }
            Property::Name => {
                client.name = props.name;
                client.class = props.class;
            }
            Property::Protocols => client.protocols = props.protocols,
            Property::Hints => {
                client.input_hint = props.input.unwrap_or(true);
                client.group_leader = props.group_leader;
                HintsManager::apply_policy(client, &props);
                self.stacking.restratify(&self.clients);
            }
            Property::Other => {}
        }
        Ok(())
    }

    fn handle_client_message(&mut self, window: Xid, message: ClientMessage) -> Result<()> {
        if let ClientMessage::CurrentDesktop(d) = message {
            return self.switch_workspace(d + 1);
        }

        let Some(id) = self.client_for_window(window) else {
            return Ok(());
        };

        match message {
            ClientMessage::ActiveWindow => {
                let ws = self.clients.get(id).map_or(0, |c| c.workspace);
                if ws != 0 && ws != self.workspaces.current() && !self.is_visible(id) {
                    info!(id = %id, ws, "activation request switches workspace");
                    self.switch_workspace(ws)?;
                }
                self.focus_set(id)?;
                self.raise(id)
            }
            ClientMessage::CloseWindow => self.close(id),
            ClientMessage::WmDesktop(ALL_DESKTOPS) => self.set_sticky(id, true, Provenance::HintSet),
            ClientMessage::WmDesktop(d) => self.move_to_workspace(id, d + 1),
            ClientMessage::MoveResize { direction, root } => {
                self.handle_net_moveresize(id, direction, root)
            }
            ClientMessage::Restack { above: true } => self.raise(id),
            ClientMessage::Restack { above: false } => self.lower(id),
            ClientMessage::WmState { action, states } => self.handle_net_state(id, action, states),
            ClientMessage::CurrentDesktop(_) | ClientMessage::Other => Ok(()),
        }
    }

    fn handle_net_state(&mut self, id: ClientId, action: StateAction, states: NetState) -> Result<()> {
        let Some(client) = self.clients.get(id) else {
            return Ok(());
        };
        let sticky = client.policy.sticky.get();
        let tier = client.policy.tier();
        let maximized = client.is_maximized();
        debug!(id = %id, ?action, ?states, "state request");

        if states.contains(NetState::STICKY) {
            let on = action.apply(sticky);
            self.set_sticky(id, on, Provenance::HintSet)?;
            self.set_omnipresent(id, on, Provenance::HintSet)?;
        }

        let layer = if states.contains(NetState::ABOVE) {
            Some(match action.apply(tier == Tier::Top) {
                true => Tier::Top,
                false if tier == Tier::Top => Tier::Normal,
                false => tier,
            })
        } else if states.contains(NetState::BELOW) {
            Some(match action.apply(tier == Tier::Bottom) {
                true => Tier::Bottom,
                false if tier == Tier::Bottom => Tier::Normal,
                false => tier,
            })
        } else {
            None
        };
        if let Some(layer) = layer.filter(|&l| l != tier) {
            self.set_layer(id, layer, Provenance::HintSet)?;
        }

        if states.contains(NetState::MAXIMIZED) {
            self.set_maximized(id, action.apply(maximized))?;
        }
        Ok(())
    }

    /// Resolve a client by its application window only
    fn client_for_window(&self, window: Xid) -> Option<ClientId> {
        self.clients
            .find(window)
            .filter(|&id| self.clients.get(id).is_some_and(|c| c.window == window))
    }
}
