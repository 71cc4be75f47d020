//! MoveResize Module
//!
//! Interactive move and resize. A session grabs pointer and keyboard and runs
//! its own event loop until the user accepts or cancels. Events it does not
//! understand go to the normal dispatcher, after which the target client is
//! looked up again: it may have been destroyed in the meantime.

use tracing::{debug, info};

use crate::shared::{Geometry, Point};
use crate::wm::client::{ClientId, SizeHints, WmState};
use crate::wm::error::Result;
use crate::wm::events::{KeyEvent, XEvent};
use crate::wm::keyboard::Key;
use crate::wm::transport::Transport;
use crate::wm::{GrabKind, WindowManager};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Move,
    Resize,
}

/// Edge or corner being dragged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
    /// Pointer started in the middle of the window; the first motion decides
    Unknown,
}

impl Direction {
    /// Horizontal edge being dragged: -1 left, 1 right, 0 neither
    fn horizontal(self) -> i32 {
        match self {
            Direction::NorthEast | Direction::East | Direction::SouthEast => 1,
            Direction::NorthWest | Direction::West | Direction::SouthWest => -1,
            _ => 0,
        }
    }

    /// Vertical edge being dragged: -1 top, 1 bottom, 0 neither
    fn vertical(self) -> i32 {
        match self {
            Direction::SouthWest | Direction::South | Direction::SouthEast => 1,
            Direction::NorthWest | Direction::North | Direction::NorthEast => -1,
            _ => 0,
        }
    }

    /// Direction for a pointer at `p` inside `frame`, split into thirds on each axis
    pub fn from_point(frame: &Geometry, p: Point) -> Self {
        let third = |offset: i32, size: u32| {
            let size = size.max(1) as i32;
            if offset * 3 < size {
                -1
            } else if offset * 3 >= size * 2 {
                1
            } else {
                0
            }
        };

        match (third(p.x - frame.x, frame.width), third(p.y - frame.y, frame.height)) {
            (-1, -1) => Direction::NorthWest,
            (0, -1) => Direction::North,
            (1, -1) => Direction::NorthEast,
            (1, 0) => Direction::East,
            (1, 1) => Direction::SouthEast,
            (0, 1) => Direction::South,
            (-1, 1) => Direction::SouthWest,
            (-1, 0) => Direction::West,
            _ => Direction::Unknown,
        }
    }

    /// Direction after the pointer drifted `(dx, dy)` from where it was pressed.
    ///
    /// An unresolved direction takes the dominant axis of the first motion; a
    /// cardinal direction turns into the adjacent diagonal once the
    /// perpendicular drift exceeds `threshold`. Diagonals never change.
    pub fn extend(self, dx: i32, dy: i32, threshold: i32) -> Self {
        let beyond = |d: i32| d.abs() > threshold;
        match self {
            Direction::Unknown if dx == 0 && dy == 0 => self,
            Direction::Unknown if dx.abs() >= dy.abs() => {
                if dx > 0 { Direction::East } else { Direction::West }
            }
            Direction::Unknown => {
                if dy > 0 { Direction::South } else { Direction::North }
            }
            Direction::North if beyond(dx) => {
                if dx > 0 { Direction::NorthEast } else { Direction::NorthWest }
            }
            Direction::South if beyond(dx) => {
                if dx > 0 { Direction::SouthEast } else { Direction::SouthWest }
            }
            Direction::East if beyond(dy) => {
                if dy > 0 { Direction::SouthEast } else { Direction::NorthEast }
            }
            Direction::West if beyond(dy) => {
                if dy > 0 { Direction::SouthWest } else { Direction::NorthWest }
            }
            _ => self,
        }
    }

    /// `_NET_WM_MOVERESIZE` size directions 0..=7
    fn from_net(code: u32) -> Option<Self> {
        Some(match code {
            0 => Direction::NorthWest,
            1 => Direction::North,
            2 => Direction::NorthEast,
            3 => Direction::East,
            4 => Direction::SouthEast,
            5 => Direction::South,
            6 => Direction::SouthWest,
            7 => Direction::West,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSource {
    /// Pointer driven, pressed at this root position
    Pointer(Point),
    Keyboard,
}

/// Grow or shrink `size` by `delta` on the `inc` grid.
///
/// The part of the delta that does not fill a whole increment is kept in
/// `carry` for the next call. Hitting `min` or `max` drops the carry.
pub fn snap_axis(size: u32, delta: i32, carry: &mut i32, inc: u32, min: u32, max: u32) -> u32 {
    let inc = inc.max(1) as i64;
    let pending = *carry as i64 + delta as i64;
    let applied = pending / inc * inc;
    *carry = (pending - applied) as i32;

    let wanted = size as i64 + applied;
    let clamped = wanted.clamp(min as i64, max as i64);
    if clamped != wanted {
        *carry = 0;
    }
    clamped as u32
}

/// An active move/resize; holds only the client's identity
#[derive(Debug, Clone)]
pub struct MoveResizeSession {
    pub client: ClientId,
    /// Restored on cancel
    pub original: Geometry,
    pub current: Geometry,
    pub operation: Operation,
    pub direction: Direction,
    previous_direction: Direction,
    /// Last processed pointer position
    pub anchor: Point,
    press: Point,
    pub input: InputSource,
    carry: (i32, i32),
}

impl MoveResizeSession {
    pub fn new(
        client: ClientId,
        geometry: Geometry,
        operation: Operation,
        direction: Direction,
        input: InputSource,
    ) -> Self {
        let anchor = match input {
            InputSource::Pointer(p) => p,
            InputSource::Keyboard => Point::default(),
        };
        Self {
            client,
            original: geometry,
            current: geometry,
            operation,
            direction,
            previous_direction: direction,
            anchor,
            press: anchor,
            input,
            carry: (0, 0),
        }
    }

    pub fn translate(&mut self, dx: i32, dy: i32) {
        self.current.x += dx;
        self.current.y += dy;
    }

    /// Drag the edges named by the current direction. West and north drags
    /// keep the opposite edge in place.
    pub fn resize(&mut self, dx: i32, dy: i32, hints: &SizeHints) {
        let (min_w, min_h) = hints.min_size();
        let (max_w, max_h) = hints.max_size();
        let (inc_w, inc_h) = hints.increments();
        let g = self.current;

        match self.direction.horizontal() {
            1 => self.current.width = snap_axis(g.width, dx, &mut self.carry.0, inc_w, min_w, max_w),
            -1 => {
                let width = snap_axis(g.width, -dx, &mut self.carry.0, inc_w, min_w, max_w);
                self.current.x = g.right() - width as i32;
                self.current.width = width;
            }
            _ => {}
        }

        match self.direction.vertical() {
            1 => {
                self.current.height = snap_axis(g.height, dy, &mut self.carry.1, inc_h, min_h, max_h)
            }
            -1 => {
                let height = snap_axis(g.height, -dy, &mut self.carry.1, inc_h, min_h, max_h);
                self.current.y = g.y + g.height as i32 - height as i32;
                self.current.height = height;
            }
            _ => {}
        }
    }

    /// Process pointer motion to `root`
    pub fn motion(&mut self, root: Point, hints: &SizeHints, threshold: i32) {
        let (dx, dy) = (root.x - self.anchor.x, root.y - self.anchor.y);
        self.anchor = root;

        match self.operation {
            Operation::Move => self.translate(dx, dy),
            Operation::Resize => {
                let drift = (root.x - self.press.x, root.y - self.press.y);
                let direction = self.direction.extend(drift.0, drift.1, threshold);
                if direction != self.direction {
                    debug!(from = ?self.direction, to = ?direction, "resize direction changed");
                    self.direction = direction;
                }
                self.resize(dx, dy, hints);
            }
        }
    }

    /// Arrow key step. Resizing grows or shrinks right/bottom by at least one increment.
    pub fn key_step(&mut self, key: Key, step: i32, hints: &SizeHints) {
        let (dx, dy) = match key {
            Key::Left => (-1, 0),
            Key::Right => (1, 0),
            Key::Up => (0, -1),
            Key::Down => (0, 1),
            _ => return,
        };

        match self.operation {
            Operation::Move => self.translate(dx * step, dy * step),
            Operation::Resize => {
                let (inc_w, inc_h) = hints.increments();
                let step_x = step.max(inc_w as i32);
                let step_y = step.max(inc_h as i32);
                let saved = self.direction;
                self.direction = Direction::SouthEast;
                self.resize(dx * step_x, dy * step_y, hints);
                self.direction = saved;
            }
        }
    }

    /// Switch between moving and resizing without releasing the grab
    pub fn toggle(&mut self) {
        self.carry = (0, 0);
        self.operation = match self.operation {
            Operation::Move => {
                self.direction = match self.previous_direction {
                    Direction::Unknown if self.input == InputSource::Keyboard => Direction::SouthEast,
                    d => d,
                };
                Operation::Resize
            }
            Operation::Resize => {
                self.previous_direction = self.direction;
                Operation::Move
            }
        };
        self.press = self.anchor;
    }
}

enum Step {
    Continue,
    Accept,
    Cancel,
}

impl<C: Transport> WindowManager<C> {
    /// Enter the interactive move/resize state machine for `id`. A no-op
    /// while any other grab session is running.
    pub fn start_move_resize(
        &mut self,
        id: ClientId,
        operation: Operation,
        input: InputSource,
        direction: Option<Direction>,
    ) -> Result<()> {
        if self.grab.is_some() {
            debug!(id = %id, "move/resize requested while a grab is held");
            return Ok(());
        }

        let th = self.config.decorations.titlebar_height;
        let Some(client) = self.clients.get(id) else {
            return Ok(());
        };
        if client.state != WmState::Normal {
            return Ok(());
        }
        let geometry = client.geometry;
        let direction = direction.unwrap_or(match input {
            InputSource::Pointer(p) => Direction::from_point(&client.frame_geometry(th), p),
            InputSource::Keyboard => Direction::SouthEast,
        });

        if !self.conn.grab_pointer()? {
            debug!(id = %id, "pointer grab refused");
            return Ok(());
        }
        if !self.conn.grab_keyboard()? {
            debug!(id = %id, "keyboard grab refused");
            self.conn.ungrab_pointer()?;
            return Ok(());
        }
        self.grab = Some(GrabKind::MoveResize);

        info!(id = %id, ?operation, ?direction, "starting move/resize");
        let mut session = MoveResizeSession::new(id, geometry, operation, direction, input);
        let result = self.move_resize_loop(&mut session);

        self.grab = None;
        let ungrab = self
            .conn
            .ungrab_pointer()
            .and_then(|_| self.conn.ungrab_keyboard());
        result.and(ungrab)
    }

    fn move_resize_loop(&mut self, session: &mut MoveResizeSession) -> Result<()> {
        let threshold = self.config.move_resize.direction_threshold;
        let step = self.config.move_resize.keyboard_step;

        loop {
            let event = self.conn.next_event()?;

            let hints = match self.clients.get(session.client) {
                Some(c) => c.size_hints,
                None => return Ok(()),
            };
            let outcome = match event {
                XEvent::Motion { root } if matches!(session.input, InputSource::Pointer(_)) => {
                    session.motion(root, &hints, threshold);
                    self.apply_geometry(session.client, session.current)?;
                    Step::Continue
                }
                XEvent::ButtonRelease(_) if matches!(session.input, InputSource::Pointer(_)) => {
                    Step::Accept
                }
                XEvent::KeyPress(KeyEvent { key, .. }) => match key {
                    Key::Return => Step::Accept,
                    Key::Escape => Step::Cancel,
                    Key::Space => {
                        session.toggle();
                        debug!(operation = ?session.operation, "toggled move/resize");
                        Step::Continue
                    }
                    Key::Left | Key::Right | Key::Up | Key::Down => {
                        session.key_step(key, step, &hints);
                        self.apply_geometry(session.client, session.current)?;
                        Step::Continue
                    }
                    _ => Step::Continue,
                },
                XEvent::KeyRelease(_)
                | XEvent::ButtonPress(_)
                | XEvent::ButtonRelease(_)
                | XEvent::Motion { .. } => Step::Continue,
                other => {
                    self.handle_event(other)?;
                    Step::Continue
                }
            };

            let alive = self
                .clients
                .get(session.client)
                .is_some_and(|c| c.state == WmState::Normal);
            if !alive {
                info!(id = %session.client, "move/resize target went away");
                return Ok(());
            }

            match outcome {
                Step::Continue => {}
                Step::Accept => {
                    debug!(id = %session.client, geometry = ?session.current, "move/resize accepted");
                    return self.configure_client(session.client, session.current);
                }
                Step::Cancel => {
                    debug!(id = %session.client, "move/resize cancelled");
                    return self.configure_client(session.client, session.original);
                }
            }
        }
    }

    /// `_NET_WM_MOVERESIZE` from a client or pager
    pub fn handle_net_moveresize(&mut self, id: ClientId, code: u32, root: Point) -> Result<()> {
        let pointer = InputSource::Pointer(root);
        match code {
            0..=7 => self.start_move_resize(id, Operation::Resize, pointer, Direction::from_net(code)),
            8 => self.start_move_resize(id, Operation::Move, pointer, None),
            9 => self.start_move_resize(id, Operation::Resize, InputSource::Keyboard, None),
            10 => self.start_move_resize(id, Operation::Move, InputSource::Keyboard, None),
            _ => Ok(()),
        }
    }

    /// Live feedback during a session: reposition without notifying the client
    fn apply_geometry(&mut self, id: ClientId, geometry: Geometry) -> Result<()> {
        let Some(client) = self.clients.get_mut(id) else {
            return Ok(());
        };
        client.geometry = geometry;
        self.configure_frame(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wm::events::ButtonEvent;
    use crate::wm::keyboard::ModMask;
    use crate::wm::mock::{Request, manage, test_wm};
    use simple_test_case::test_case;

    #[test]
    fn increment_remainder_is_carried() {
        let mut carry = 0;
        let width = snap_axis(120, 24, &mut carry, 10, 20, u32::MAX);
        assert_eq!((width, carry), (140, 4));

        let width = snap_axis(width, 6, &mut carry, 10, 20, u32::MAX);
        assert_eq!((width, carry), (150, 0));
    }

    #[test]
    fn shrinking_carries_negative_remainder() {
        let mut carry = 0;
        assert_eq!(snap_axis(100, -15, &mut carry, 10, 20, 500), 90);
        assert_eq!(carry, -5);
        assert_eq!(snap_axis(90, -5, &mut carry, 10, 20, 500), 80);
    }

    #[test]
    fn clamping_drops_the_carry() {
        let mut carry = 3;
        assert_eq!(snap_axis(30, -40, &mut carry, 10, 20, 500), 20);
        assert_eq!(carry, 0);
    }

    #[test_case(Point::new(5, 5), Direction::NorthWest; "top left")]
    #[test_case(Point::new(150, 5), Direction::North; "top")]
    #[test_case(Point::new(295, 5), Direction::NorthEast; "top right")]
    #[test_case(Point::new(295, 150), Direction::East; "right")]
    #[test_case(Point::new(295, 295), Direction::SouthEast; "bottom right")]
    #[test_case(Point::new(150, 295), Direction::South; "bottom")]
    #[test_case(Point::new(5, 295), Direction::SouthWest; "bottom left")]
    #[test_case(Point::new(5, 150), Direction::West; "left")]
    #[test_case(Point::new(150, 150), Direction::Unknown; "center")]
    #[test]
    fn direction_from_point(p: Point, expected: Direction) {
        let frame = Geometry::new(0, 0, 300, 300);
        assert_eq!(Direction::from_point(&frame, p), expected);
    }

    #[test_case(Direction::North, 20, 0, Direction::NorthEast; "north drifts east")]
    #[test_case(Direction::North, -20, 0, Direction::NorthWest; "north drifts west")]
    #[test_case(Direction::North, 5, 0, Direction::North; "north under threshold")]
    #[test_case(Direction::East, 0, 20, Direction::SouthEast; "east drifts south")]
    #[test_case(Direction::West, 0, -20, Direction::NorthWest; "west drifts north")]
    #[test_case(Direction::South, -20, 40, Direction::SouthWest; "south drifts west")]
    #[test_case(Direction::SouthEast, -50, -50, Direction::SouthEast; "diagonals stay")]
    #[test_case(Direction::Unknown, 3, -9, Direction::North; "unknown takes dominant axis")]
    #[test_case(Direction::Unknown, 0, 0, Direction::Unknown; "unknown without motion")]
    #[test]
    fn direction_extend(from: Direction, dx: i32, dy: i32, expected: Direction) {
        assert_eq!(from.extend(dx, dy, 10), expected);
    }

    #[test]
    fn west_and_north_resizes_keep_the_opposite_edge() {
        let hints = SizeHints::default();
        let mut s = MoveResizeSession::new(
            ClientId(1),
            Geometry::new(100, 100, 200, 150),
            Operation::Resize,
            Direction::NorthWest,
            InputSource::Keyboard,
        );

        s.resize(-30, 20, &hints);

        assert_eq!(s.current, Geometry::new(70, 120, 230, 130));
        assert_eq!(s.current.right(), 300);
    }

    #[test]
    fn pointer_resize_snaps_to_increments() {
        let hints = SizeHints {
            base: Some((20, 20)),
            inc: Some((10, 10)),
            ..Default::default()
        };
        let mut s = MoveResizeSession::new(
            ClientId(1),
            Geometry::new(0, 0, 120, 120),
            Operation::Resize,
            Direction::East,
            InputSource::Pointer(Point::new(120, 60)),
        );

        s.motion(Point::new(144, 60), &hints, 10);
        assert_eq!(s.current.width, 140);
        s.motion(Point::new(150, 60), &hints, 10);
        assert_eq!(s.current.width, 150);
    }

    #[test]
    fn toggle_restores_the_previous_resize_direction() {
        let mut s = MoveResizeSession::new(
            ClientId(1),
            Geometry::new(0, 0, 100, 100),
            Operation::Resize,
            Direction::West,
            InputSource::Pointer(Point::new(0, 50)),
        );

        s.toggle();
        assert_eq!(s.operation, Operation::Move);
        s.toggle();
        assert_eq!((s.operation, s.direction), (Operation::Resize, Direction::West));
    }

    fn key(key: Key) -> XEvent {
        XEvent::KeyPress(KeyEvent { key, mods: ModMask::empty(), time: 0 })
    }

    #[test]
    fn keyboard_move_commits_with_a_synthetic_configure() {
        let mut wm = test_wm();
        let id = manage(&mut wm, 10, Geometry::new(0, 0, 100, 100));
        let start = wm.clients.get(id).unwrap().geometry;
        wm.conn.take_requests();
        wm.conn.push_events([key(Key::Right), key(Key::Down), key(Key::Return)]);

        wm.start_move_resize(id, Operation::Move, InputSource::Keyboard, None).unwrap();

        let step = wm.config.move_resize.keyboard_step;
        let expected = start.with_position(start.x + step, start.y + step);
        assert_eq!(wm.clients.get(id).unwrap().geometry, expected);
        let requests = wm.conn.take_requests();
        assert!(requests.iter().any(|r| matches!(r, Request::ConfigureNotify(10, g) if g.x == expected.x)));
        assert_eq!(requests.last(), Some(&Request::UngrabKeyboard));
        assert!(wm.grab.is_none());
    }

    #[test]
    fn cancel_restores_the_original_geometry() {
        let mut wm = test_wm();
        let id = manage(&mut wm, 10, Geometry::new(0, 0, 100, 100));
        let start = wm.clients.get(id).unwrap().geometry;
        wm.conn.push_events([key(Key::Right), key(Key::Space), key(Key::Down), key(Key::Escape)]);

        wm.start_move_resize(id, Operation::Move, InputSource::Keyboard, None).unwrap();

        assert_eq!(wm.clients.get(id).unwrap().geometry, start);
    }

    #[test]
    fn pointer_move_accepts_on_release() {
        let mut wm = test_wm();
        let id = manage(&mut wm, 10, Geometry::new(0, 0, 100, 100));
        let start = wm.clients.get(id).unwrap().geometry;
        let press = Point::new(start.x + 50, start.y + 10);
        let release = ButtonEvent {
            window: 10,
            root: Point::new(press.x + 30, press.y + 40),
            button: 1,
            mods: ModMask::empty(),
            time: 0,
        };
        wm.conn.push_events([
            XEvent::Motion { root: Point::new(press.x + 10, press.y + 10) },
            XEvent::Motion { root: Point::new(press.x + 30, press.y + 40) },
            XEvent::ButtonRelease(release),
        ]);

        wm.start_move_resize(id, Operation::Move, InputSource::Pointer(press), None).unwrap();

        assert_eq!(
            wm.clients.get(id).unwrap().geometry,
            start.with_position(start.x + 30, start.y + 40)
        );
    }

    #[test]
    fn destroying_the_target_ends_the_session() {
        let mut wm = test_wm();
        let id = manage(&mut wm, 10, Geometry::new(0, 0, 100, 100));
        let start = wm.clients.get(id).unwrap().geometry;
        let press = Point::new(start.x + 50, start.y + 50);
        wm.conn.push_events([
            XEvent::Motion { root: Point::new(press.x + 10, press.y) },
            XEvent::DestroyNotify(10),
            // never reached: the session ends with the client
            XEvent::Motion { root: Point::new(press.x + 90, press.y) },
        ]);
        wm.conn.take_requests();

        wm.start_move_resize(id, Operation::Move, InputSource::Pointer(press), None).unwrap();

        assert!(wm.clients.get(id).is_none());
        assert!(wm.grab.is_none());
        let requests = wm.conn.take_requests();
        assert!(requests.iter().any(|r| matches!(r, Request::Destroy(_))));
        let after_destroy = requests
            .iter()
            .skip_while(|r| !matches!(r, Request::Destroy(_)))
            .collect::<Vec<_>>();
        assert!(!after_destroy.iter().any(|r| matches!(r, Request::Configure(..) | Request::ConfigureNotify(..))));
        assert!(requests.contains(&Request::UngrabPointer));
        assert!(requests.contains(&Request::UngrabKeyboard));
        // the remaining motion is still queued for the main loop
        assert!(wm.conn.poll_event().unwrap().is_some());
    }

    #[test]
    fn second_invocation_while_grabbed_is_a_noop() {
        let mut wm = test_wm();
        let id = manage(&mut wm, 10, Geometry::new(0, 0, 100, 100));
        wm.grab = Some(GrabKind::Cycle);
        wm.conn.take_requests();

        wm.start_move_resize(id, Operation::Move, InputSource::Keyboard, None).unwrap();

        assert!(wm.conn.take_requests().is_empty());
    }
}
