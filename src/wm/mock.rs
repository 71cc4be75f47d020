//! Recording transport for tests.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};

use crate::config::Config;
use crate::shared::{Geometry, Point, Xid};
use crate::wm::WindowManager;
use crate::wm::client::{ClientId, WmState};
use crate::wm::error::{Error, Result};
use crate::wm::events::XEvent;
use crate::wm::hints::ClientProperties;
use crate::wm::keyboard::KeyCombo;
use crate::wm::transport::{ProtocolMessage, RootUpdate, Transport, WindowAttributes};

pub const ROOT: Xid = 1;
pub const SINK: Xid = 2;

/// Every request the core made, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    CreateFrame { window: Xid, frame: Xid, geometry: Geometry },
    CreateTitlebar { frame: Xid, titlebar: Xid },
    Destroy(Xid),
    ReleaseFrame { window: Xid, frame: Xid },
    Map(Xid),
    Unmap(Xid),
    Configure(Xid, Geometry),
    Restack(Vec<Xid>),
    Focus(Xid),
    Protocol(Xid, ProtocolMessage),
    ConfigureNotify(Xid, Geometry),
    Colormap(Xid),
    WmState(Xid, WmState),
    GrabPointer,
    UngrabPointer,
    GrabKeyboard,
    UngrabKeyboard,
    AllowEvents { replay: bool },
    GrabKeys(usize),
    GrabButtons(Xid),
    Kill(Xid),
    Publish(RootUpdate),
}

pub struct MockConn {
    pub requests: RefCell<Vec<Request>>,
    events: RefCell<VecDeque<XEvent>>,
    windows: RefCell<HashMap<Xid, (WindowAttributes, ClientProperties)>>,
    next_xid: Cell<Xid>,
    pub fail_frames: Cell<bool>,
    pub pointer: Cell<Point>,
    pub grabs_succeed: Cell<bool>,
    work_area: Geometry,
}

impl MockConn {
    pub fn new(work_area: Geometry) -> Self {
        Self {
            requests: RefCell::new(Vec::new()),
            events: RefCell::new(VecDeque::new()),
            windows: RefCell::new(HashMap::new()),
            next_xid: Cell::new(0x1000),
            fail_frames: Cell::new(false),
            pointer: Cell::new(Point::default()),
            grabs_succeed: Cell::new(true),
            work_area,
        }
    }

    /// Make a top-level window known to the fake server
    pub fn add_window(&self, window: Xid, geometry: Geometry, props: ClientProperties) {
        let attrs = WindowAttributes { geometry, ..Default::default() };
        self.windows.borrow_mut().insert(window, (attrs, props));
    }

    /// A window that was already mapped before the manager started
    pub fn add_viewable(&self, window: Xid, geometry: Geometry, props: ClientProperties) {
        let attrs = WindowAttributes { geometry, viewable: true, ..Default::default() };
        self.windows.borrow_mut().insert(window, (attrs, props));
    }

    pub fn add_override_redirect(&self, window: Xid, geometry: Geometry) {
        let attrs = WindowAttributes { geometry, override_redirect: true, viewable: true };
        self.windows.borrow_mut().insert(window, (attrs, ClientProperties::default()));
    }

    pub fn set_properties(&self, window: Xid, props: ClientProperties) {
        if let Some(entry) = self.windows.borrow_mut().get_mut(&window) {
            entry.1 = props;
        }
    }

    pub fn forget_window(&self, window: Xid) {
        self.windows.borrow_mut().remove(&window);
    }

    pub fn push_event(&self, event: XEvent) {
        self.events.borrow_mut().push_back(event);
    }

    pub fn push_events(&self, events: impl IntoIterator<Item = XEvent>) {
        self.events.borrow_mut().extend(events);
    }

    pub fn take_requests(&self) -> Vec<Request> {
        std::mem::take(&mut *self.requests.borrow_mut())
    }

    pub fn last_focus(&self) -> Option<Xid> {
        self.requests.borrow().iter().rev().find_map(|r| match r {
            Request::Focus(w) => Some(*w),
            _ => None,
        })
    }

    pub fn last_restack(&self) -> Option<Vec<Xid>> {
        self.requests.borrow().iter().rev().find_map(|r| match r {
            Request::Restack(frames) => Some(frames.clone()),
            _ => None,
        })
    }

    fn record(&self, request: Request) -> Result<()> {
        self.requests.borrow_mut().push(request);
        Ok(())
    }

    fn fresh_xid(&self) -> Xid {
        let xid = self.next_xid.get();
        self.next_xid.set(xid + 1);
        xid
    }
}

impl Transport for MockConn {
    fn root(&self) -> Xid {
        ROOT
    }

    fn sink(&self) -> Xid {
        SINK
    }

    fn work_area(&self) -> Geometry {
        self.work_area
    }

    fn existing_windows(&self) -> Result<Vec<Xid>> {
        let mut windows: Vec<Xid> = self
            .windows
            .borrow()
            .iter()
            .filter(|(_, (attrs, _))| attrs.viewable)
            .map(|(&w, _)| w)
            .collect();
        windows.sort_unstable();
        Ok(windows)
    }

    fn window_attributes(&self, window: Xid) -> Result<WindowAttributes> {
        self.windows
            .borrow()
            .get(&window)
            .map(|(attrs, _)| *attrs)
            .ok_or(Error::BadWindow(window))
    }

    fn client_properties(&self, window: Xid) -> Result<ClientProperties> {
        self.windows
            .borrow()
            .get(&window)
            .map(|(_, props)| props.clone())
            .ok_or(Error::BadWindow(window))
    }

    fn create_frame(&self, window: Xid, frame: Geometry, _title_height: u32) -> Result<Xid> {
        if self.fail_frames.get() {
            return Err(Error::IdsExhausted);
        }
        let xid = self.fresh_xid();
        self.record(Request::CreateFrame { window, frame: xid, geometry: frame })?;
        Ok(xid)
    }

    fn create_titlebar(&self, frame: Xid, _width: u32, _height: u32) -> Result<Xid> {
        let xid = self.fresh_xid();
        self.record(Request::CreateTitlebar { frame, titlebar: xid })?;
        Ok(xid)
    }

    fn destroy_window(&self, window: Xid) -> Result<()> {
        self.record(Request::Destroy(window))
    }

    fn release_frame(&self, window: Xid, frame: Xid, _at: Point) -> Result<()> {
        self.record(Request::ReleaseFrame { window, frame })
    }

    fn map_window(&self, window: Xid) -> Result<()> {
        self.record(Request::Map(window))
    }

    fn unmap_window(&self, window: Xid) -> Result<()> {
        self.record(Request::Unmap(window))
    }

    fn configure_window(&self, window: Xid, geometry: Geometry) -> Result<()> {
        self.record(Request::Configure(window, geometry))
    }

    fn restack(&self, frames: &[Xid]) -> Result<()> {
        self.record(Request::Restack(frames.to_vec()))
    }

    fn set_input_focus(&self, window: Xid) -> Result<()> {
        self.record(Request::Focus(window))
    }

    fn send_protocol(&self, window: Xid, message: ProtocolMessage) -> Result<()> {
        self.record(Request::Protocol(window, message))
    }

    fn send_configure_notify(&self, window: Xid, geometry: Geometry) -> Result<()> {
        self.record(Request::ConfigureNotify(window, geometry))
    }

    fn install_colormap(&self, window: Xid) -> Result<()> {
        self.record(Request::Colormap(window))
    }

    fn set_wm_state(&self, window: Xid, state: WmState) -> Result<()> {
        self.record(Request::WmState(window, state))
    }

    fn grab_pointer(&self) -> Result<bool> {
        self.record(Request::GrabPointer)?;
        Ok(self.grabs_succeed.get())
    }

    fn ungrab_pointer(&self) -> Result<()> {
        self.record(Request::UngrabPointer)
    }

    fn grab_keyboard(&self) -> Result<bool> {
        self.record(Request::GrabKeyboard)?;
        Ok(self.grabs_succeed.get())
    }

    fn ungrab_keyboard(&self) -> Result<()> {
        self.record(Request::UngrabKeyboard)
    }

    fn allow_pointer_events(&self, replay: bool) -> Result<()> {
        self.record(Request::AllowEvents { replay })
    }

    fn grab_keys(&self, combos: &[KeyCombo]) -> Result<()> {
        self.record(Request::GrabKeys(combos.len()))
    }

    fn grab_buttons(&self, frame: Xid) -> Result<()> {
        self.record(Request::GrabButtons(frame))
    }

    fn query_pointer(&self) -> Result<Point> {
        Ok(self.pointer.get())
    }

    fn kill_client(&self, window: Xid) -> Result<()> {
        self.record(Request::Kill(window))
    }

    fn publish(&self, update: RootUpdate) -> Result<()> {
        self.record(Request::Publish(update))
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn poll_event(&self) -> Result<Option<XEvent>> {
        Ok(self.events.borrow_mut().pop_front())
    }

    fn next_event(&self) -> Result<XEvent> {
        self.events
            .borrow_mut()
            .pop_front()
            .ok_or(Error::Disconnected)
    }
}

/// A manager on a 1000x800 screen with the default configuration
pub fn test_wm() -> WindowManager<MockConn> {
    let conn = MockConn::new(Geometry::new(0, 0, 1000, 800));
    match WindowManager::new(conn, Config::default()) {
        Ok(wm) => wm,
        Err(e) => panic!("default configuration rejected: {e}"),
    }
}

/// Map a plain window through the normal MapRequest path
pub fn manage(wm: &mut WindowManager<MockConn>, window: Xid, geometry: Geometry) -> ClientId {
    wm.conn.add_window(window, geometry, ClientProperties::default());
    wm.handle_event(XEvent::MapRequest(window)).unwrap();
    wm.clients.find(window).unwrap()
}
