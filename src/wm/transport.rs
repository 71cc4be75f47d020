//! Display-protocol transport.
//!
//! The core tells the server what to do through this trait and never asks it
//! to reconstruct window topology. `display::X11Conn` is the x11rb
//! implementation, `mock::MockConn` records requests for tests.

use crate::shared::{Geometry, Point, Xid};
use crate::wm::client::WmState;
use crate::wm::error::Result;
use crate::wm::events::XEvent;
use crate::wm::hints::ClientProperties;
use crate::wm::keyboard::KeyCombo;

/// What `create` needs to know about a window before managing it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowAttributes {
    pub geometry: Geometry,
    pub override_redirect: bool,
    /// Already mapped when we found it
    pub viewable: bool,
}

/// ICCCM client messages sent on WM_PROTOCOLS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolMessage {
    TakeFocus,
    DeleteWindow,
}

/// Root window and per-client properties the manager owns
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootUpdate {
    /// `_NET_CLIENT_LIST`, creation order
    ClientList(Vec<Xid>),
    /// `_NET_CLIENT_LIST_STACKING`, bottom to top
    ClientListStacking(Vec<Xid>),
    /// `_NET_ACTIVE_WINDOW`, `None` clears it
    ActiveWindow(Option<Xid>),
    /// `_NET_CURRENT_DESKTOP`, 0-based
    CurrentDesktop(u32),
    NumberOfDesktops(u32),
    DesktopNames(Vec<String>),
    /// `_NET_WM_DESKTOP` on a client window, 0-based or `ALL_DESKTOPS`
    WmDesktop { window: Xid, desktop: u32 },
}

pub trait Transport {
    fn root(&self) -> Xid;

    /// Window that holds input focus when no client has it
    fn sink(&self) -> Xid;

    /// Usable screen area
    fn work_area(&self) -> Geometry;

    /// Top-level windows present at startup, bottom to top
    fn existing_windows(&self) -> Result<Vec<Xid>>;

    fn window_attributes(&self, window: Xid) -> Result<WindowAttributes>;

    fn client_properties(&self, window: Xid) -> Result<ClientProperties>;

    /// Create a frame at `frame` and reparent `window` into it, `title_height` below its top
    fn create_frame(&self, window: Xid, frame: Geometry, title_height: u32) -> Result<Xid>;

    fn create_titlebar(&self, frame: Xid, width: u32, height: u32) -> Result<Xid>;

    fn destroy_window(&self, window: Xid) -> Result<()>;

    /// Reparent `window` back to the root and destroy its frame
    fn release_frame(&self, window: Xid, frame: Xid, at: Point) -> Result<()>;

    fn map_window(&self, window: Xid) -> Result<()>;

    fn unmap_window(&self, window: Xid) -> Result<()>;

    fn configure_window(&self, window: Xid, geometry: Geometry) -> Result<()>;

    /// Stack `frames` so that the first is on top
    fn restack(&self, frames: &[Xid]) -> Result<()>;

    fn set_input_focus(&self, window: Xid) -> Result<()>;

    fn send_protocol(&self, window: Xid, message: ProtocolMessage) -> Result<()>;

    /// Synthetic ConfigureNotify telling the client its root-relative geometry
    fn send_configure_notify(&self, window: Xid, geometry: Geometry) -> Result<()>;

    fn install_colormap(&self, window: Xid) -> Result<()>;

    fn set_wm_state(&self, window: Xid, state: WmState) -> Result<()>;

    /// Returns false when another client holds the grab
    fn grab_pointer(&self) -> Result<bool>;

    fn ungrab_pointer(&self) -> Result<()>;

    fn grab_keyboard(&self) -> Result<bool>;

    fn ungrab_keyboard(&self) -> Result<()>;

    /// Release a synchronous button grab, replaying the click to the client when asked
    fn allow_pointer_events(&self, replay: bool) -> Result<()>;

    fn grab_keys(&self, combos: &[KeyCombo]) -> Result<()>;

    /// Passive button grabs on a newly framed client
    fn grab_buttons(&self, frame: Xid) -> Result<()>;

    fn query_pointer(&self) -> Result<Point>;

    fn kill_client(&self, window: Xid) -> Result<()>;

    fn publish(&self, update: RootUpdate) -> Result<()>;

    fn flush(&self) -> Result<()>;

    /// Next queued event without blocking
    fn poll_event(&self) -> Result<Option<XEvent>>;

    /// Block until an event arrives; used by nested grab sessions
    fn next_event(&self) -> Result<XEvent>;
}
