//! Display Module
//!
//! The x11rb side of the window manager: connection setup, the ICCCM
//! `WM_S{n}` selection handover, and the [`Transport`] implementation that
//! turns core requests into protocol requests and raw events into [`XEvent`]s.

use std::cell::RefCell;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use tracing::{debug, info, trace, warn};
use x11rb::connection::Connection;
use x11rb::errors::{ConnectionError, ReplyError, ReplyOrIdError};
use x11rb::protocol::xproto::ModMask as XModMask;
use x11rb::protocol::xproto::*;
use x11rb::protocol::{ErrorKind, Event};
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;
use x11rb::x11_utils::X11Error;
use x11rb::{CURRENT_TIME, NONE};

use crate::shared::{Geometry, Point, Xid};
use crate::wm::client::{Gravity, SizeHints, WmState};
use crate::wm::client_flags::Protocols;
use crate::wm::error::{Error, Result};
use crate::wm::events::{self, ButtonEvent, ConfigureRequest, KeyEvent, XEvent};
use crate::wm::ewmh::Atoms;
use crate::wm::hints::{ClientProperties, NetState};
use crate::wm::keyboard::{Key, KeyCombo, ModMask};
use crate::wm::transport::{ProtocolMessage, RootUpdate, Transport, WindowAttributes};

const TITLEBAR_PIXEL: u32 = 0x002e_3440;
const FRAME_PIXEL: u32 = 0x003b_4252;

/// How long `--replace` waits for the previous manager to let go
const REPLACE_TIMEOUT: Duration = Duration::from_secs(15);

impl From<ConnectionError> for Error {
    fn from(e: ConnectionError) -> Self {
        use std::io::ErrorKind as Io;
        match e {
            ConnectionError::IoError(ref io)
                if matches!(
                    io.kind(),
                    Io::BrokenPipe | Io::ConnectionReset | Io::UnexpectedEof
                ) =>
            {
                Error::Disconnected
            }
            e => Error::Connection(e.to_string()),
        }
    }
}

impl From<X11Error> for Error {
    fn from(e: X11Error) -> Self {
        match e.error_kind {
            ErrorKind::Window | ErrorKind::Drawable => Error::BadWindow(e.bad_value),
            kind => Error::Protocol {
                request: e.request_name.unwrap_or("unknown").to_string(),
                kind: format!("{kind:?}"),
            },
        }
    }
}

impl From<ReplyError> for Error {
    fn from(e: ReplyError) -> Self {
        match e {
            ReplyError::ConnectionError(e) => e.into(),
            ReplyError::X11Error(e) => e.into(),
        }
    }
}

impl From<ReplyOrIdError> for Error {
    fn from(e: ReplyOrIdError) -> Self {
        match e {
            ReplyOrIdError::IdsExhausted => Error::IdsExhausted,
            ReplyOrIdError::ConnectionError(e) => e.into(),
            ReplyOrIdError::X11Error(e) => e.into(),
        }
    }
}

/// Errors that only mean a window went away under us
fn is_race(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::Window | ErrorKind::Drawable | ErrorKind::Match)
}

/// Presses inside a frame report the frame's child that was hit
fn button_event(e: &ButtonPressEvent) -> ButtonEvent {
    ButtonEvent {
        window: if e.child != NONE { e.child } else { e.event },
        root: Point::new(i32::from(e.root_x), i32::from(e.root_y)),
        button: e.detail,
        mods: mods_from_state(u16::from(e.state)),
        time: e.time,
    }
}

/// Keycode to keysym table, first column only
#[derive(Debug, Default)]
struct Keymap {
    min_keycode: u8,
    per_keycode: usize,
    keysyms: Vec<u32>,
}

impl Keymap {
    fn load(conn: &RustConnection) -> Result<Self> {
        let setup = conn.setup();
        let (min, max) = (setup.min_keycode, setup.max_keycode);
        let reply = conn
            .get_keyboard_mapping(min, max - min + 1)?
            .reply()?;
        Ok(Self {
            min_keycode: min,
            per_keycode: usize::from(reply.keysyms_per_keycode),
            keysyms: reply.keysyms,
        })
    }

    fn keysym(&self, code: u8) -> u32 {
        let Some(offset) = code.checked_sub(self.min_keycode) else {
            return 0;
        };
        self.keysyms
            .get(usize::from(offset) * self.per_keycode)
            .copied()
            .unwrap_or(0)
    }

    fn keycodes(&self, sym: u32) -> Vec<u8> {
        if self.per_keycode == 0 {
            return Vec::new();
        }
        self.keysyms
            .chunks(self.per_keycode)
            .enumerate()
            .filter(|(_, syms)| syms.first() == Some(&sym))
            .filter_map(|(i, _)| u8::try_from(i).ok())
            .map(|i| i + self.min_keycode)
            .collect()
    }
}

mod keysym {
    pub const SPACE: u32 = 0x0020;
    pub const TAB: u32 = 0xff09;
    pub const RETURN: u32 = 0xff0d;
    pub const ESCAPE: u32 = 0xff1b;
    pub const LEFT: u32 = 0xff51;
    pub const UP: u32 = 0xff52;
    pub const RIGHT: u32 = 0xff53;
    pub const DOWN: u32 = 0xff54;
    pub const F1: u32 = 0xffbe;
    pub const SHIFT_L: u32 = 0xffe1;
    pub const SHIFT_R: u32 = 0xffe2;
    pub const CONTROL_L: u32 = 0xffe3;
    pub const CONTROL_R: u32 = 0xffe4;
    pub const META_L: u32 = 0xffe7;
    pub const META_R: u32 = 0xffe8;
    pub const ALT_L: u32 = 0xffe9;
    pub const ALT_R: u32 = 0xffea;
    pub const SUPER_L: u32 = 0xffeb;
    pub const SUPER_R: u32 = 0xffec;
}

fn key_from_keysym(sym: u32) -> Key {
    match sym {
        keysym::TAB => Key::Tab,
        keysym::ESCAPE => Key::Escape,
        keysym::RETURN => Key::Return,
        keysym::SPACE => Key::Space,
        keysym::LEFT => Key::Left,
        keysym::RIGHT => Key::Right,
        keysym::UP => Key::Up,
        keysym::DOWN => Key::Down,
        s if (keysym::F1..keysym::F1 + 12).contains(&s) => Key::F((s - keysym::F1 + 1) as u8),
        s if modifier_of(s).is_some() => Key::Modifier,
        s @ 0x21..=0x7e => match char::from_u32(s) {
            Some(c) => Key::Char(c.to_ascii_lowercase()),
            None => Key::Other(s),
        },
        s => Key::Other(s),
    }
}

fn keysym_for(key: Key) -> Option<u32> {
    Some(match key {
        Key::Tab => keysym::TAB,
        Key::Escape => keysym::ESCAPE,
        Key::Return => keysym::RETURN,
        Key::Space => keysym::SPACE,
        Key::Left => keysym::LEFT,
        Key::Right => keysym::RIGHT,
        Key::Up => keysym::UP,
        Key::Down => keysym::DOWN,
        Key::F(n) if (1..=12).contains(&n) => keysym::F1 + u32::from(n) - 1,
        Key::Char(c) => u32::from(c),
        Key::Other(sym) => sym,
        Key::F(_) | Key::Modifier => return None,
    })
}

/// The modifier a modifier key sets while held
fn modifier_of(sym: u32) -> Option<ModMask> {
    match sym {
        keysym::SHIFT_L | keysym::SHIFT_R => Some(ModMask::SHIFT),
        keysym::CONTROL_L | keysym::CONTROL_R => Some(ModMask::CONTROL),
        keysym::ALT_L | keysym::ALT_R | keysym::META_L | keysym::META_R => Some(ModMask::ALT),
        keysym::SUPER_L | keysym::SUPER_R => Some(ModMask::SUPER),
        _ => None,
    }
}

/// Core modifier state with Lock and NumLock stripped
fn mods_from_state(state: u16) -> ModMask {
    let mut mods = ModMask::empty();
    for (bit, flag) in [
        (u16::from(KeyButMask::SHIFT), ModMask::SHIFT),
        (u16::from(KeyButMask::CONTROL), ModMask::CONTROL),
        (u16::from(KeyButMask::MOD1), ModMask::ALT),
        (u16::from(KeyButMask::MOD4), ModMask::SUPER),
    ] {
        if state & bit != 0 {
            mods |= flag;
        }
    }
    mods
}

fn state_from_mods(mods: ModMask) -> u16 {
    let mut state = 0;
    for (flag, bit) in [
        (ModMask::SHIFT, XModMask::SHIFT),
        (ModMask::CONTROL, XModMask::CONTROL),
        (ModMask::ALT, XModMask::M1),
        (ModMask::SUPER, XModMask::M4),
    ] {
        if mods.contains(flag) {
            state |= u16::from(bit);
        }
    }
    state
}

/// Lock modifier combinations a binding must also fire under
fn lock_variants() -> [u16; 4] {
    let lock = u16::from(XModMask::LOCK);
    let num = u16::from(XModMask::M2);
    [0, lock, num, lock | num]
}

fn gravity_from(value: u32) -> Gravity {
    match value {
        2 => Gravity::North,
        3 => Gravity::NorthEast,
        4 => Gravity::West,
        5 => Gravity::Center,
        6 => Gravity::East,
        7 => Gravity::SouthWest,
        8 => Gravity::South,
        9 => Gravity::SouthEast,
        10 => Gravity::Static,
        _ => Gravity::NorthWest,
    }
}

/// WM_NORMAL_HINTS: 18 CARD32s, flags first
fn parse_size_hints(data: &[u32]) -> SizeHints {
    const US_POSITION: u32 = 1 << 0;
    const P_MIN_SIZE: u32 = 1 << 4;
    const P_MAX_SIZE: u32 = 1 << 5;
    const P_RESIZE_INC: u32 = 1 << 6;
    const P_BASE_SIZE: u32 = 1 << 8;
    const P_WIN_GRAVITY: u32 = 1 << 9;

    let Some(&flags) = data.first() else {
        return SizeHints::default();
    };
    let pair = |flag: u32, i: usize| -> Option<(u32, u32)> {
        if flags & flag == 0 {
            return None;
        }
        Some((*data.get(i)?, *data.get(i + 1)?))
    };

    SizeHints {
        min: pair(P_MIN_SIZE, 5),
        max: pair(P_MAX_SIZE, 7),
        inc: pair(P_RESIZE_INC, 9),
        base: pair(P_BASE_SIZE, 15),
        gravity: match data.get(17) {
            Some(&g) if flags & P_WIN_GRAVITY != 0 => gravity_from(g),
            _ => Gravity::NorthWest,
        },
        user_position: flags & US_POSITION != 0,
    }
}

/// WM_HINTS: (input, window group)
fn parse_wm_hints(data: &[u32]) -> (Option<bool>, Option<Xid>) {
    const INPUT_HINT: u32 = 1 << 0;
    const WINDOW_GROUP_HINT: u32 = 1 << 6;

    let flags = data.first().copied().unwrap_or(0);
    let input = data
        .get(1)
        .filter(|_| flags & INPUT_HINT != 0)
        .map(|&v| v != 0);
    let group = data
        .get(8)
        .copied()
        .filter(|&w| flags & WINDOW_GROUP_HINT != 0 && w != NONE);
    (input, group)
}

/// `_MOTIF_WM_HINTS` asking for no decorations at all
fn parse_motif_no_decorations(data: &[u32]) -> bool {
    const MWM_HINTS_DECORATIONS: u32 = 1 << 1;
    match data {
        [flags, _, decorations, ..] => flags & MWM_HINTS_DECORATIONS != 0 && *decorations == 0,
        _ => false,
    }
}

/// WM_CLASS is "instance\0class\0"; prefer the class
fn parse_class(data: &[u8]) -> String {
    let mut parts = data.split(|&b| b == 0).filter(|p| !p.is_empty());
    let instance = parts.next();
    parts
        .next()
        .or(instance)
        .map(|p| String::from_utf8_lossy(p).into_owned())
        .unwrap_or_default()
}

/// X11 connection owned by the window manager
pub struct X11Conn {
    conn: Arc<RustConnection>,
    root: Window,
    /// Holds focus when no client does
    sink: Window,
    /// Owns WM_S{n} and carries `_NET_SUPPORTING_WM_CHECK`; lives as long as we do
    #[allow(dead_code)]
    owner: Window,
    atoms: Atoms,
    screen: Geometry,
    keymap: RefCell<Keymap>,
    /// Bindings to re-grab after a keyboard mapping change
    grabbed: RefCell<Vec<KeyCombo>>,
}

impl X11Conn {
    /// Connect, take over the screen and advertise EWMH support
    ///
    /// With `replace`, an existing manager is asked to leave by taking its
    /// selection; otherwise its presence is an error.
    pub fn connect(replace: bool) -> anyhow::Result<Self> {
        let (conn, screen_num) = x11rb::connect(None).context("Failed to connect to X server")?;
        let conn = Arc::new(conn);
        let screen = conn.setup().roots[screen_num].clone();
        let root = screen.root;
        info!(
            "Connected to X server, screen {}, root window 0x{:x}, {}x{}",
            screen_num, root, screen.width_in_pixels, screen.height_in_pixels
        );

        let selection_name = format!("WM_S{screen_num}");
        let selection = conn
            .intern_atom(false, selection_name.as_bytes())?
            .reply()
            .context("Failed to intern WM selection atom")?
            .atom;

        let previous = conn
            .get_selection_owner(selection)?
            .reply()
            .context("Failed to get current WM selection owner")?
            .owner;
        if previous != NONE {
            if !replace {
                anyhow::bail!(
                    "Another window manager is already running (window 0x{:x}). \
                    Use --replace to replace it.",
                    previous
                );
            }
            info!("Existing WM detected (window 0x{:x}), replacing", previous);
            conn.change_window_attributes(
                previous,
                &ChangeWindowAttributesAux::new().event_mask(EventMask::STRUCTURE_NOTIFY),
            )?;
        }

        let owner = conn.generate_id()?;
        conn.create_window(
            x11rb::COPY_DEPTH_FROM_PARENT,
            owner,
            root,
            -100,
            -100,
            1,
            1,
            0,
            WindowClass::INPUT_ONLY,
            x11rb::COPY_FROM_PARENT,
            &CreateWindowAux::new().override_redirect(1),
        )?;
        conn.set_selection_owner(owner, selection, CURRENT_TIME)?
            .check()
            .context("Failed to set WM selection owner")?;
        let acquired = conn
            .get_selection_owner(selection)?
            .reply()
            .context("Failed to verify WM selection ownership")?
            .owner;
        if acquired != owner {
            anyhow::bail!(
                "Failed to acquire WM selection (expected 0x{:x}, got 0x{:x})",
                owner,
                acquired
            );
        }

        if previous != NONE {
            Self::wait_for_exit(&conn, previous);
        }

        conn.change_window_attributes(
            root,
            &ChangeWindowAttributesAux::new().event_mask(
                EventMask::SUBSTRUCTURE_REDIRECT
                    | EventMask::SUBSTRUCTURE_NOTIFY
                    | EventMask::PROPERTY_CHANGE
                    | EventMask::ENTER_WINDOW,
            ),
        )?
        .check()
        .context("Failed to select SubstructureRedirect on the root window - is another WM running?")?;

        let sink = conn.generate_id()?;
        conn.create_window(
            x11rb::COPY_DEPTH_FROM_PARENT,
            sink,
            root,
            -100,
            -100,
            1,
            1,
            0,
            WindowClass::INPUT_ONLY,
            x11rb::COPY_FROM_PARENT,
            &CreateWindowAux::new().override_redirect(1),
        )?;
        conn.map_window(sink)?;

        let atoms = Atoms::new(conn.as_ref())?;
        atoms.setup_supported(conn.as_ref(), root, owner)?;
        let keymap = Keymap::load(&conn)?;
        conn.flush()?;

        debug!("owner 0x{:x}, focus sink 0x{:x}", owner, sink);
        Ok(Self {
            conn,
            root,
            sink,
            owner,
            atoms,
            screen: Geometry::new(
                0,
                0,
                u32::from(screen.width_in_pixels),
                u32::from(screen.height_in_pixels),
            ),
            keymap: RefCell::new(keymap),
            grabbed: RefCell::new(Vec::new()),
        })
    }

    fn wait_for_exit(conn: &RustConnection, previous: Window) {
        info!("Waiting for previous WM to exit...");
        let start = Instant::now();
        while start.elapsed() < REPLACE_TIMEOUT {
            let gone = match conn.get_window_attributes(previous) {
                Ok(cookie) => cookie.reply().is_err(),
                Err(_) => true,
            };
            if gone {
                info!("Previous WM exited");
                return;
            }
            std::thread::sleep(Duration::from_millis(100));
        }
        warn!("Timeout waiting for previous WM to exit, proceeding anyway");
    }

    pub fn connection(&self) -> Arc<RustConnection> {
        self.conn.clone()
    }

    fn property32(&self, window: Window, property: Atom, len: u32) -> Result<Vec<u32>> {
        let reply = self
            .conn
            .get_property(false, window, property, AtomEnum::ANY, 0, len)?
            .reply()?;
        Ok(reply.value32().map(|v| v.collect()).unwrap_or_default())
    }

    fn property8(&self, window: Window, property: Atom) -> Result<Vec<u8>> {
        let reply = self
            .conn
            .get_property(false, window, property, AtomEnum::ANY, 0, 1024)?
            .reply()?;
        Ok(reply.value)
    }

    fn window_name(&self, window: Window) -> Result<String> {
        let mut name = self.property8(window, self.atoms.net_wm_name)?;
        if name.is_empty() {
            name = self.property8(window, AtomEnum::WM_NAME.into())?;
        }
        Ok(String::from_utf8_lossy(&name).into_owned())
    }

    fn grab_combos(&self, combos: &[KeyCombo]) -> Result<()> {
        self.conn.ungrab_key(Grab::ANY, self.root, XModMask::ANY)?;
        let keymap = self.keymap.borrow();
        for combo in combos {
            let Some(sym) = keysym_for(combo.key) else {
                continue;
            };
            let codes = keymap.keycodes(sym);
            if codes.is_empty() {
                warn!("No keycode for binding {}", combo);
                continue;
            }
            let base = state_from_mods(combo.mods);
            for code in codes {
                for extra in lock_variants() {
                    let grabbed = self
                        .conn
                        .grab_key(
                            true,
                            self.root,
                            XModMask::from(base | extra),
                            code,
                            GrabMode::ASYNC,
                            GrabMode::ASYNC,
                        )?
                        .check();
                    if let Err(e) = grabbed {
                        warn!("Failed to grab {} (keycode {}): {}", combo, code, e);
                    }
                }
            }
        }
        Ok(())
    }

    fn key_event(&self, code: u8, state: u16, time: u32, release: bool) -> KeyEvent {
        let sym = self.keymap.borrow().keysym(code);
        let key = key_from_keysym(sym);
        let mut mods = mods_from_state(state);
        // the server reports the state before the event
        if let Some(own) = modifier_of(sym) {
            if release {
                mods.remove(own);
            } else {
                mods.insert(own);
            }
        }
        KeyEvent { key, mods, time }
    }

    fn client_message(&self, e: &ClientMessageEvent) -> events::ClientMessage {
        use events::ClientMessage as M;

        let data = e.data.as_data32();
        let a = &self.atoms;
        match e.type_ {
            t if t == a.net_active_window => M::ActiveWindow,
            t if t == a.net_close_window => M::CloseWindow,
            t if t == a.net_current_desktop => M::CurrentDesktop(data[0]),
            t if t == a.net_wm_desktop => M::WmDesktop(data[0]),
            t if t == a.net_wm_moveresize => M::MoveResize {
                direction: data[2],
                root: Point::new(data[0] as i32, data[1] as i32),
            },
            t if t == a.net_restack_window => M::Restack {
                above: data[2] != u32::from(StackMode::BELOW),
            },
            t if t == a.net_wm_state => match events::StateAction::from_code(data[0]) {
                Some(action) => M::WmState {
                    action,
                    states: a.net_state(data[1]) | a.net_state(data[2]),
                },
                None => M::Other,
            },
            _ => M::Other,
        }
    }

    /// Translate one raw event; `None` for events the core has no use for
    fn translate(&self, event: Event) -> Result<Option<XEvent>> {
        let event = match event {
            Event::Error(e) if is_race(e.error_kind) => {
                debug!("ignoring {:?} error on 0x{:x}", e.error_kind, e.bad_value);
                return Ok(None);
            }
            Event::Error(e) => return Err(e.into()),
            Event::CreateNotify(e) => XEvent::CreateNotify(e.window),
            Event::DestroyNotify(e) => XEvent::DestroyNotify(e.window),
            Event::UnmapNotify(e) => XEvent::UnmapNotify {
                window: e.window,
                synthetic: e.response_type & 0x80 != 0,
            },
            Event::MapRequest(e) => XEvent::MapRequest(e.window),
            Event::ConfigureRequest(e) => {
                let mask = u16::from(e.value_mask);
                let has = |flag: ConfigWindow| mask & u16::from(flag) != 0;
                XEvent::ConfigureRequest(ConfigureRequest {
                    window: e.window,
                    x: has(ConfigWindow::X).then_some(i32::from(e.x)),
                    y: has(ConfigWindow::Y).then_some(i32::from(e.y)),
                    width: has(ConfigWindow::WIDTH).then_some(u32::from(e.width)),
                    height: has(ConfigWindow::HEIGHT).then_some(u32::from(e.height)),
                    restack: has(ConfigWindow::STACK_MODE),
                })
            }
            Event::ButtonPress(e) => XEvent::ButtonPress(button_event(&e)),
            Event::ButtonRelease(e) => XEvent::ButtonRelease(button_event(&e)),
            Event::KeyPress(e) => {
                XEvent::KeyPress(self.key_event(e.detail, u16::from(e.state), e.time, false))
            }
            Event::KeyRelease(e) => {
                XEvent::KeyRelease(self.key_event(e.detail, u16::from(e.state), e.time, true))
            }
            Event::MotionNotify(e) => XEvent::Motion {
                root: Point::new(i32::from(e.root_x), i32::from(e.root_y)),
            },
            Event::EnterNotify(e) => {
                // crossings caused by grabs or by moving between a frame and its children
                if e.mode != NotifyMode::NORMAL || e.detail == NotifyDetail::INFERIOR {
                    return Ok(None);
                }
                XEvent::Enter {
                    window: e.event,
                    root: Point::new(i32::from(e.root_x), i32::from(e.root_y)),
                }
            }
            Event::LeaveNotify(e) => XEvent::Leave { window: e.event },
            Event::PropertyNotify(e) => XEvent::PropertyNotify {
                window: e.window,
                property: self.atoms.property_kind(e.atom),
            },
            Event::ClientMessage(e) => XEvent::ClientMessage {
                window: e.window,
                message: self.client_message(&e),
            },
            Event::MappingNotify(e) => {
                if e.request == Mapping::KEYBOARD {
                    info!("Keyboard mapping changed, reloading keymap");
                    *self.keymap.borrow_mut() = Keymap::load(&self.conn)?;
                    let combos = self.grabbed.borrow().clone();
                    self.grab_combos(&combos)?;
                }
                return Ok(None);
            }
            other => {
                trace!("unhandled event {:?}", other);
                return Ok(None);
            }
        };
        Ok(Some(event))
    }
}

impl Transport for X11Conn {
    fn root(&self) -> Xid {
        self.root
    }

    fn sink(&self) -> Xid {
        self.sink
    }

    fn work_area(&self) -> Geometry {
        self.screen
    }

    fn existing_windows(&self) -> Result<Vec<Xid>> {
        let tree = self.conn.query_tree(self.root)?.reply()?;
        let cookies = tree
            .children
            .iter()
            .map(|&w| Ok((w, self.conn.get_window_attributes(w)?)))
            .collect::<Result<Vec<_>>>()?;

        let mut windows = Vec::new();
        for (window, cookie) in cookies {
            match cookie.reply() {
                Ok(attrs) if attrs.map_state == MapState::VIEWABLE => windows.push(window),
                Ok(_) => {}
                Err(ReplyError::X11Error(e)) if is_race(e.error_kind) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(windows)
    }

    fn window_attributes(&self, window: Xid) -> Result<WindowAttributes> {
        let attrs = self.conn.get_window_attributes(window)?;
        let geometry = self.conn.get_geometry(window)?;
        let attrs = attrs.reply()?;
        let geometry = geometry.reply()?;
        Ok(WindowAttributes {
            geometry: Geometry::new(
                i32::from(geometry.x),
                i32::from(geometry.y),
                u32::from(geometry.width),
                u32::from(geometry.height),
            ),
            override_redirect: attrs.override_redirect,
            viewable: attrs.map_state == MapState::VIEWABLE,
        })
    }

    fn client_properties(&self, window: Xid) -> Result<ClientProperties> {
        let a = &self.atoms;
        let transient_for = self
            .property32(window, AtomEnum::WM_TRANSIENT_FOR.into(), 1)?
            .first()
            .copied()
            .filter(|&w| w != NONE);
        let (input, group_leader) =
            parse_wm_hints(&self.property32(window, AtomEnum::WM_HINTS.into(), 9)?);
        let protocols = self
            .property32(window, a.wm_protocols, 32)?
            .into_iter()
            .fold(Protocols::empty(), |acc, atom| acc | a.protocol(atom));
        let window_type = self
            .property32(window, a.net_wm_window_type, 32)?
            .into_iter()
            .find_map(|atom| a.window_type(atom))
            .unwrap_or_default();
        let net_state = self
            .property32(window, a.net_wm_state, 32)?
            .into_iter()
            .fold(NetState::empty(), |acc, atom| acc | a.net_state(atom));

        Ok(ClientProperties {
            name: self.window_name(window)?,
            class: parse_class(&self.property8(window, AtomEnum::WM_CLASS.into())?),
            transient_for,
            group_leader,
            size_hints: parse_size_hints(
                &self.property32(window, AtomEnum::WM_NORMAL_HINTS.into(), 18)?,
            ),
            protocols,
            input,
            window_type,
            net_state,
            no_decorations: parse_motif_no_decorations(
                &self.property32(window, a.motif_wm_hints, 5)?,
            ),
            desktop: self
                .property32(window, a.net_wm_desktop, 1)?
                .first()
                .copied(),
        })
    }

    fn create_frame(&self, window: Xid, frame: Geometry, title_height: u32) -> Result<Xid> {
        let id = self.conn.generate_id()?;
        self.conn
            .create_window(
                x11rb::COPY_DEPTH_FROM_PARENT,
                id,
                self.root,
                frame.x as i16,
                frame.y as i16,
                frame.width.max(1) as u16,
                frame.height.max(1) as u16,
                0,
                WindowClass::INPUT_OUTPUT,
                x11rb::COPY_FROM_PARENT,
                &CreateWindowAux::new()
                    .background_pixel(FRAME_PIXEL)
                    .event_mask(
                        EventMask::SUBSTRUCTURE_REDIRECT
                            | EventMask::SUBSTRUCTURE_NOTIFY
                            | EventMask::ENTER_WINDOW,
                    ),
            )?
            .check()?;

        let reparented = self
            .conn
            .change_save_set(SetMode::INSERT, window)
            .and_then(|_| self.conn.reparent_window(window, id, 0, title_height as i16))
            .map_err(Error::from)
            .and_then(|cookie| cookie.check().map_err(Error::from));
        if let Err(e) = reparented {
            self.conn.destroy_window(id)?;
            return Err(e);
        }
        self.conn.change_window_attributes(
            window,
            &ChangeWindowAttributesAux::new().event_mask(EventMask::PROPERTY_CHANGE),
        )?;
        trace!("framed 0x{:x} in 0x{:x}", window, id);
        Ok(id)
    }

    fn create_titlebar(&self, frame: Xid, width: u32, height: u32) -> Result<Xid> {
        let id = self.conn.generate_id()?;
        self.conn.create_window(
            x11rb::COPY_DEPTH_FROM_PARENT,
            id,
            frame,
            0,
            0,
            width.max(1) as u16,
            height.max(1) as u16,
            0,
            WindowClass::INPUT_OUTPUT,
            x11rb::COPY_FROM_PARENT,
            &CreateWindowAux::new().background_pixel(TITLEBAR_PIXEL),
        )?;
        Ok(id)
    }

    fn destroy_window(&self, window: Xid) -> Result<()> {
        self.conn.destroy_window(window)?;
        Ok(())
    }

    fn release_frame(&self, window: Xid, frame: Xid, at: Point) -> Result<()> {
        self.conn
            .reparent_window(window, self.root, at.x as i16, at.y as i16)?;
        self.conn.change_save_set(SetMode::DELETE, window)?;
        self.conn.destroy_window(frame)?;
        Ok(())
    }

    fn map_window(&self, window: Xid) -> Result<()> {
        self.conn.map_window(window)?;
        Ok(())
    }

    fn unmap_window(&self, window: Xid) -> Result<()> {
        self.conn.unmap_window(window)?;
        Ok(())
    }

    fn configure_window(&self, window: Xid, geometry: Geometry) -> Result<()> {
        self.conn.configure_window(
            window,
            &ConfigureWindowAux::new()
                .x(geometry.x)
                .y(geometry.y)
                .width(geometry.width.max(1))
                .height(geometry.height.max(1)),
        )?;
        Ok(())
    }

    fn restack(&self, frames: &[Xid]) -> Result<()> {
        let Some(&top) = frames.first() else {
            return Ok(());
        };
        self.conn.configure_window(
            top,
            &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE),
        )?;
        for pair in frames.windows(2) {
            self.conn.configure_window(
                pair[1],
                &ConfigureWindowAux::new()
                    .sibling(pair[0])
                    .stack_mode(StackMode::BELOW),
            )?;
        }
        Ok(())
    }

    fn set_input_focus(&self, window: Xid) -> Result<()> {
        self.conn
            .set_input_focus(InputFocus::POINTER_ROOT, window, CURRENT_TIME)?;
        Ok(())
    }

    fn send_protocol(&self, window: Xid, message: ProtocolMessage) -> Result<()> {
        let protocol = match message {
            ProtocolMessage::TakeFocus => self.atoms.wm_take_focus,
            ProtocolMessage::DeleteWindow => self.atoms.wm_delete_window,
        };
        let event = ClientMessageEvent::new(
            32,
            window,
            self.atoms.wm_protocols,
            [protocol, CURRENT_TIME, 0, 0, 0],
        );
        self.conn
            .send_event(false, window, EventMask::NO_EVENT, event)?;
        Ok(())
    }

    fn send_configure_notify(&self, window: Xid, geometry: Geometry) -> Result<()> {
        let event = ConfigureNotifyEvent {
            response_type: CONFIGURE_NOTIFY_EVENT,
            sequence: 0,
            event: window,
            window,
            above_sibling: NONE,
            x: geometry.x as i16,
            y: geometry.y as i16,
            width: geometry.width as u16,
            height: geometry.height as u16,
            border_width: 0,
            override_redirect: false,
        };
        self.conn
            .send_event(false, window, EventMask::STRUCTURE_NOTIFY, event)?;
        Ok(())
    }

    fn install_colormap(&self, window: Xid) -> Result<()> {
        let colormap = self.conn.get_window_attributes(window)?.reply()?.colormap;
        if colormap != NONE {
            self.conn.install_colormap(colormap)?;
        }
        Ok(())
    }

    fn set_wm_state(&self, window: Xid, state: WmState) -> Result<()> {
        let value = match state {
            WmState::Withdrawn => 0,
            WmState::Normal => 1,
            WmState::Unmapped => 3,
        };
        self.conn.change_property32(
            PropMode::REPLACE,
            window,
            self.atoms.wm_state,
            self.atoms.wm_state,
            &[value, NONE],
        )?;
        Ok(())
    }

    fn grab_pointer(&self) -> Result<bool> {
        let reply = self
            .conn
            .grab_pointer(
                false,
                self.root,
                EventMask::BUTTON_PRESS | EventMask::BUTTON_RELEASE | EventMask::POINTER_MOTION,
                GrabMode::ASYNC,
                GrabMode::ASYNC,
                NONE,
                NONE,
                CURRENT_TIME,
            )?
            .reply()?;
        Ok(reply.status == GrabStatus::SUCCESS)
    }

    fn ungrab_pointer(&self) -> Result<()> {
        self.conn.ungrab_pointer(CURRENT_TIME)?;
        Ok(())
    }

    fn grab_keyboard(&self) -> Result<bool> {
        let reply = self
            .conn
            .grab_keyboard(false, self.root, CURRENT_TIME, GrabMode::ASYNC, GrabMode::ASYNC)?
            .reply()?;
        Ok(reply.status == GrabStatus::SUCCESS)
    }

    fn ungrab_keyboard(&self) -> Result<()> {
        self.conn.ungrab_keyboard(CURRENT_TIME)?;
        Ok(())
    }

    fn allow_pointer_events(&self, replay: bool) -> Result<()> {
        let mode = if replay {
            Allow::REPLAY_POINTER
        } else {
            Allow::ASYNC_POINTER
        };
        self.conn.allow_events(mode, CURRENT_TIME)?;
        Ok(())
    }

    fn grab_keys(&self, combos: &[KeyCombo]) -> Result<()> {
        *self.grabbed.borrow_mut() = combos.to_vec();
        self.grab_combos(combos)
    }

    fn grab_buttons(&self, frame: Xid) -> Result<()> {
        self.conn.grab_button(
            false,
            frame,
            EventMask::BUTTON_PRESS,
            GrabMode::SYNC,
            GrabMode::ASYNC,
            NONE,
            NONE,
            ButtonIndex::ANY,
            XModMask::ANY,
        )?;
        Ok(())
    }

    fn query_pointer(&self) -> Result<Point> {
        let reply = self.conn.query_pointer(self.root)?.reply()?;
        Ok(Point::new(i32::from(reply.root_x), i32::from(reply.root_y)))
    }

    fn kill_client(&self, window: Xid) -> Result<()> {
        self.conn.kill_client(window)?;
        Ok(())
    }

    fn publish(&self, update: RootUpdate) -> Result<()> {
        if let RootUpdate::NumberOfDesktops(count) = update {
            let s = self.screen;
            self.atoms
                .update_workarea(self.conn.as_ref(), self.root, count, (s.x, s.y, s.width, s.height))?;
        }
        self.atoms.publish(self.conn.as_ref(), self.root, update)
    }

    fn flush(&self) -> Result<()> {
        self.conn.flush()?;
        Ok(())
    }

    fn poll_event(&self) -> Result<Option<XEvent>> {
        while let Some(event) = self.conn.poll_for_event()? {
            if let Some(event) = self.translate(event)? {
                return Ok(Some(event));
            }
        }
        Ok(None)
    }

    fn next_event(&self) -> Result<XEvent> {
        self.conn.flush()?;
        loop {
            let event = self.conn.wait_for_event()?;
            if let Some(event) = self.translate(event)? {
                return Ok(event);
            }
        }
    }
}
