use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use crate::shared::{Geometry, Point, Xid};
use crate::wm::client_flags::{Policy, Protocols, WindowType};

/// Stable identity of a managed client. Serials are never reused, so a stale
/// id simply fails to resolve instead of aliasing a newer client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientId(pub(crate) u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// ICCCM-level lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WmState {
    /// Not mapped yet, or unmapped by the client and pending destruction
    #[default]
    Withdrawn,
    Normal,
    /// Hidden because its workspace is not the current one
    Unmapped,
}

/// Preferred anchor corner when the client resizes itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Gravity {
    #[default]
    NorthWest,
    North,
    NorthEast,
    West,
    Center,
    East,
    SouthWest,
    South,
    SouthEast,
    Static,
}

/// Size constraints supplied by the application (WM_NORMAL_HINTS)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SizeHints {
    pub min: Option<(u32, u32)>,
    pub max: Option<(u32, u32)>,
    pub base: Option<(u32, u32)>,
    pub inc: Option<(u32, u32)>,
    pub gravity: Gravity,
    /// The position was chosen by the user, not the program
    pub user_position: bool,
}

impl SizeHints {
    /// Minimum size, falling back to the base size as ICCCM prescribes
    pub fn min_size(&self) -> (u32, u32) {
        let (w, h) = self.min.or(self.base).unwrap_or((1, 1));
        (w.max(1), h.max(1))
    }

    pub fn max_size(&self) -> (u32, u32) {
        let (w, h) = self.max.unwrap_or((u32::MAX, u32::MAX));
        let (min_w, min_h) = self.min_size();
        (if w == 0 { u32::MAX } else { w.max(min_w) }, if h == 0 { u32::MAX } else { h.max(min_h) })
    }

    pub fn increments(&self) -> (u32, u32) {
        let (w, h) = self.inc.unwrap_or((1, 1));
        (w.max(1), h.max(1))
    }

    /// Clamp to min/max and snap down onto the `base + k * inc` grid
    pub fn constrain(&self, width: u32, height: u32) -> (u32, u32) {
        let (min_w, min_h) = self.min_size();
        let (max_w, max_h) = self.max_size();
        let (inc_w, inc_h) = self.increments();
        let (base_w, base_h) = self.base.or(self.min).unwrap_or((0, 0));

        let snap = |size: u32, base: u32, inc: u32, min: u32, max: u32| {
            let size = size.clamp(min, max);
            if inc <= 1 || size < base {
                return size;
            }
            let snapped = base + (size - base) / inc * inc;
            if snapped < min { snapped + inc } else { snapped }
        };

        (
            snap(width, base_w, inc_w, min_w, max_w),
            snap(height, base_h, inc_h, min_h, max_h),
        )
    }
}

/// Fingerprint of a client used to re-validate deferred actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(u64);

/// Window manager client state
/// Represents an application window being managed by the WM
#[derive(Debug, Clone)]
pub struct Client {
    pub id: ClientId,

    /// Application window
    pub window: Xid,

    /// Decoration frame, present once the client is reparented
    pub frame: Option<Xid>,

    /// Titlebar, created lazily the first time the client is mapped
    pub titlebar: Option<Xid>,

    /// Content geometry. `x`/`y` is the frame origin on the root window,
    /// `width`/`height` the size of the application window.
    pub geometry: Geometry,

    /// Geometry before maximizing, `None` when not maximized
    pub saved_geometry: Option<Geometry>,

    pub state: WmState,

    /// Workspace number, 0 until assigned
    pub workspace: u32,

    pub policy: Policy,
    pub size_hints: SizeHints,
    pub protocols: Protocols,
    pub window_type: WindowType,

    /// WM_HINTS input field: the client wants focus handed to it directly
    pub input_hint: bool,

    pub group_leader: Option<Xid>,

    /// Raw WM_TRANSIENT_FOR value as last read from the application
    pub transient_for_hint: Option<Xid>,

    /// Resolved owner
    pub transient_parent: Option<ClientId>,

    /// Clients whose owner is this client, oldest first
    pub transients: Vec<ClientId>,

    pub name: String,
    pub class: String,

    /// Grace period between a polite close and a forced kill
    pub patience: Duration,

    /// Initial placement has happened
    pub placed: bool,

    /// Unmap notifications caused by the window manager itself
    pub ignore_unmaps: u32,
}

impl Client {
    pub fn new(id: ClientId, window: Xid, geometry: Geometry, policy: Policy) -> Self {
        Self {
            id,
            window,
            frame: None,
            titlebar: None,
            geometry,
            saved_geometry: None,
            state: WmState::Withdrawn,
            workspace: 0,
            policy,
            size_hints: SizeHints::default(),
            protocols: Protocols::empty(),
            window_type: WindowType::Normal,
            input_hint: true,
            group_leader: None,
            transient_for_hint: None,
            transient_parent: None,
            transients: Vec::new(),
            name: String::new(),
            class: String::new(),
            patience: Duration::from_secs(5),
            placed: false,
            ignore_unmaps: 0,
        }
    }

    pub fn has_titlebar(&self) -> bool {
        self.policy.has_titlebar.get()
    }

    /// Height reserved above the content for the titlebar
    pub fn title_height(&self, titlebar_height: u32) -> u32 {
        if self.has_titlebar() { titlebar_height } else { 0 }
    }

    /// Full on-screen rectangle: content plus titlebar when the client has one
    pub fn frame_geometry(&self, titlebar_height: u32) -> Geometry {
        Geometry {
            height: self.geometry.height + self.title_height(titlebar_height),
            ..self.geometry
        }
    }

    /// Root coordinates of the application window's top-left corner
    pub fn content_origin(&self, titlebar_height: u32) -> Point {
        Point::new(
            self.geometry.x,
            self.geometry.y + self.title_height(titlebar_height) as i32,
        )
    }

    pub fn is_maximized(&self) -> bool {
        self.saved_geometry.is_some()
    }

    pub fn fingerprint(&self) -> Fingerprint {
        let mut hasher = DefaultHasher::new();
        self.id.hash(&mut hasher);
        self.window.hash(&mut hasher);
        self.class.hash(&mut hasher);
        self.name.hash(&mut hasher);
        Fingerprint(hasher.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;

    fn client() -> Client {
        Client::new(ClientId(1), 42, Geometry::new(10, 20, 300, 200), Policy::default())
    }

    #[test]
    fn frame_geometry_includes_titlebar_only_when_present() {
        let mut c = client();
        assert_eq!(c.frame_geometry(24), Geometry::new(10, 20, 300, 224));
        assert_eq!(c.content_origin(24), Point::new(10, 44));

        c.policy.has_titlebar.force(false);
        assert_eq!(c.frame_geometry(24), Geometry::new(10, 20, 300, 200));
        assert_eq!(c.content_origin(24), Point::new(10, 20));
    }

    #[test_case(SizeHints::default(), (123, 45), (123, 45); "no hints")]
    #[test_case(
        SizeHints { min: Some((50, 50)), ..Default::default() },
        (10, 60), (50, 60); "min clamps")]
    #[test_case(
        SizeHints { max: Some((200, 100)), ..Default::default() },
        (300, 300), (200, 100); "max clamps")]
    #[test_case(
        SizeHints { base: Some((20, 4)), inc: Some((10, 16)), ..Default::default() },
        (45, 40), (40, 36); "snaps to increment grid")]
    #[test]
    fn constrain(hints: SizeHints, size: (u32, u32), expected: (u32, u32)) {
        assert_eq!(hints.constrain(size.0, size.1), expected);
    }

    #[test]
    fn fingerprint_tracks_identity_and_content() {
        let a = client();
        let mut b = a.clone();
        assert_eq!(a.fingerprint(), b.fingerprint());

        b.name = "renamed".into();
        assert_ne!(a.fingerprint(), b.fingerprint());

        let mut c = a.clone();
        c.id = ClientId(2);
        assert_ne!(a.fingerprint(), c.fingerprint());
    }
}
