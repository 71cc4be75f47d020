//! Cycle Module
//!
//! Hold-modifier-and-tap window cycling. Taps move a candidate around the
//! active focus ring and only preview it; the ring is permuted and focus
//! committed once, when the held modifier is released.

use tracing::{debug, info};

use crate::wm::client::{ClientId, WmState};
use crate::wm::client_flags::{CycleBehavior, FocusPolicy};
use crate::wm::error::Result;
use crate::wm::events::{KeyEvent, XEvent};
use crate::wm::keyboard::{Key, ModMask};
use crate::wm::transport::Transport;
use crate::wm::{GrabKind, WindowManager};

/// An active cycle; holds identities only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleSession {
    pub workspace: u32,
    /// Ring head when cycling started
    pub origin: ClientId,
    /// Currently previewed client
    pub candidate: ClientId,
    /// Modifiers whose release ends the session
    hold: ModMask,
}

enum Outcome {
    Commit,
    Cancel,
}

impl<C: Transport> WindowManager<C> {
    fn cycle_eligible(&self, id: ClientId) -> bool {
        self.clients.get(id).is_some_and(|c| {
            c.state == WmState::Normal
                && c.policy.cycle.get() != CycleBehavior::Skip
                && c.policy.focus.get() != FocusPolicy::Never
        })
    }

    /// Next eligible client after `from` in the ring, walking backwards when `!forward`
    fn cycle_step(&self, session: &CycleSession, from: ClientId, forward: bool) -> Option<ClientId> {
        let ring = self.focus.ring(session.workspace).filter(|r| !r.is_empty())?;
        let mut current = from;
        for _ in 0..ring.len() {
            current = if forward { ring.next(current)? } else { ring.prev(current)? };
            if current == from {
                break;
            }
            if self.cycle_eligible(current) {
                return Some(current);
            }
        }
        None
    }

    fn cycle_advance(&mut self, session: &mut CycleSession, forward: bool) -> Result<()> {
        let Some(next) = self.cycle_step(session, session.candidate, forward) else {
            return Ok(());
        };
        debug!(from = %session.candidate, to = %next, "cycle preview");
        session.candidate = next;

        let immediate = self
            .clients
            .get(next)
            .is_some_and(|c| c.policy.cycle.get() == CycleBehavior::RaiseImmediately);
        if immediate {
            self.raise(next)?;
        }
        Ok(())
    }

    /// Re-resolve the session after a forwarded event. Returns false when it can not go on.
    fn cycle_revalidate(&mut self, session: &mut CycleSession) -> bool {
        if self.workspaces.current() != session.workspace {
            return false;
        }
        let Some(head) = self.focus.head(session.workspace) else {
            return false;
        };
        session.origin = head;

        let ring_has_candidate = self
            .focus
            .ring(session.workspace)
            .is_some_and(|r| r.contains(session.candidate));
        if !ring_has_candidate || !self.cycle_eligible(session.candidate) {
            session.candidate = session.origin;
        }
        true
    }

    /// Start a cycle session from a key binding pressed with `mods`
    pub fn cycle_windows(&mut self, forward: bool, mods: ModMask) -> Result<()> {
        if self.grab.is_some() {
            return Ok(());
        }
        let workspace = self.workspaces.current();
        let Some(origin) = self.focus.head(workspace) else {
            return Ok(());
        };

        let mut session = CycleSession {
            workspace,
            origin,
            candidate: origin,
            hold: mods - ModMask::SHIFT,
        };
        if self.cycle_step(&session, origin, forward).is_none() {
            debug!("nothing to cycle to");
            return Ok(());
        }

        if !self.conn.grab_keyboard()? {
            debug!("keyboard grab refused, not cycling");
            return Ok(());
        }
        self.grab = Some(GrabKind::Cycle);

        let result = self
            .cycle_advance(&mut session, forward)
            .and_then(|_| self.cycle_loop(&mut session));

        self.grab = None;
        let ungrab = self.conn.ungrab_keyboard();

        let outcome = result?;
        ungrab?;
        match outcome {
            Some(Outcome::Commit) => self.cycle_commit(&session),
            Some(Outcome::Cancel) | None => {
                debug!("cycle cancelled");
                self.focus_ensure()
            }
        }
    }

    /// `None` when the session was invalidated by a forwarded event
    fn cycle_loop(&mut self, session: &mut CycleSession) -> Result<Option<Outcome>> {
        if session.hold.is_empty() {
            return Ok(Some(Outcome::Commit));
        }

        loop {
            match self.conn.next_event()? {
                XEvent::KeyPress(KeyEvent { key: Key::Tab, mods, .. }) => {
                    self.cycle_advance(session, !mods.contains(ModMask::SHIFT))?;
                }
                XEvent::KeyPress(KeyEvent { key: Key::Escape, .. }) => {
                    return Ok(Some(Outcome::Cancel));
                }
                XEvent::KeyRelease(KeyEvent { key: Key::Modifier, mods, .. })
                    if !mods.intersects(session.hold) =>
                {
                    return Ok(Some(Outcome::Commit));
                }
                XEvent::KeyPress(_) | XEvent::KeyRelease(_) => {}
                other => {
                    self.handle_event(other)?;
                    if !self.cycle_revalidate(session) {
                        return Ok(None);
                    }
                }
            }
        }
    }

    fn cycle_commit(&mut self, session: &CycleSession) -> Result<()> {
        let (origin, candidate) = (session.origin, session.candidate);
        if !self.clients.contains(candidate) {
            return self.focus_ensure();
        }

        info!(from = %origin, to = %candidate, "cycle finished");
        self.focus.permute(session.workspace, origin, candidate);
        self.focus.current = Some(candidate);
        self.focus_ensure()?;

        let raise = self.config.focus.raise_on_focus
            || self.clients.get(candidate).is_some_and(|c| {
                matches!(
                    c.policy.cycle.get(),
                    CycleBehavior::RaiseOnFinish | CycleBehavior::RaiseImmediately
                )
            });
        if raise {
            self.raise(candidate)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::Geometry;
    use crate::wm::client_flags::Provenance;
    use crate::wm::mock::{Request, manage, test_wm};

    fn tap(shift: bool) -> XEvent {
        let mut mods = ModMask::ALT;
        if shift {
            mods |= ModMask::SHIFT;
        }
        XEvent::KeyPress(KeyEvent { key: Key::Tab, mods, time: 0 })
    }

    fn release_alt() -> XEvent {
        XEvent::KeyRelease(KeyEvent { key: Key::Modifier, mods: ModMask::empty(), time: 0 })
    }

    fn escape() -> XEvent {
        XEvent::KeyPress(KeyEvent { key: Key::Escape, mods: ModMask::ALT, time: 0 })
    }

    /// Ring [a, b, c] with `a` focused
    fn three(wm: &mut WindowManager<crate::wm::mock::MockConn>) -> [ClientId; 3] {
        let c = manage(wm, 30, Geometry::new(0, 0, 50, 50));
        let b = manage(wm, 20, Geometry::new(0, 0, 50, 50));
        let a = manage(wm, 10, Geometry::new(0, 0, 50, 50));
        [a, b, c]
    }

    #[test]
    fn cycling_skips_flagged_clients_and_commits_on_release() {
        let mut wm = test_wm();
        let [a, b, c] = three(&mut wm);
        wm.clients
            .get_mut(b)
            .unwrap()
            .policy
            .cycle
            .assign(CycleBehavior::Skip, Provenance::UserSet);
        let ws = wm.workspaces.current();
        assert_eq!(wm.focus.ring(ws).unwrap().order(), vec![a, b, c]);
        wm.conn.push_event(release_alt());

        wm.cycle_windows(true, ModMask::ALT).unwrap();

        assert_eq!(wm.focus.ring(ws).unwrap().order(), vec![c, a, b]);
        assert_eq!(wm.focus.current, Some(c));
        assert_eq!(wm.conn.last_focus(), Some(30));
        assert!(wm.grab.is_none());
    }

    #[test]
    fn taps_do_not_commit_focus() {
        let mut wm = test_wm();
        let [a, b, c] = three(&mut wm);
        wm.conn.take_requests();
        wm.conn.push_events([tap(false)]);

        // the queue runs dry while alt is still held
        assert!(wm.cycle_windows(true, ModMask::ALT).is_err());

        let requests = wm.conn.take_requests();
        assert!(!requests.iter().any(|r| matches!(r, Request::Focus(w) if *w != 10)));
        let ws = wm.workspaces.current();
        assert_eq!(wm.focus.ring(ws).unwrap().order(), vec![a, b, c]);
        assert!(requests.contains(&Request::UngrabKeyboard));
    }

    #[test]
    fn second_tap_advances_and_backwards_walks_the_other_way() {
        let mut wm = test_wm();
        let [a, b, c] = three(&mut wm);
        let ws = wm.workspaces.current();

        wm.conn.push_events([tap(false), release_alt()]);
        wm.cycle_windows(true, ModMask::ALT).unwrap();
        assert_eq!(wm.focus.ring(ws).unwrap().order(), vec![c, a, b]);

        wm.conn.push_event(release_alt());
        wm.cycle_windows(false, ModMask::ALT | ModMask::SHIFT).unwrap();
        assert_eq!(wm.focus.current, Some(b));
    }

    #[test]
    fn escape_cancels_without_permuting() {
        let mut wm = test_wm();
        let [a, b, c] = three(&mut wm);
        wm.conn.push_events([tap(false), escape()]);

        wm.cycle_windows(true, ModMask::ALT).unwrap();

        let ws = wm.workspaces.current();
        assert_eq!(wm.focus.ring(ws).unwrap().order(), vec![a, b, c]);
        assert_eq!(wm.focus.current, Some(a));
    }

    #[test]
    fn destroying_the_candidate_falls_back_to_origin() {
        let mut wm = test_wm();
        let [a, b, _c] = three(&mut wm);
        wm.conn.push_events([XEvent::DestroyNotify(20), release_alt()]);

        wm.cycle_windows(true, ModMask::ALT).unwrap();

        assert!(wm.clients.get(b).is_none());
        assert_eq!(wm.focus.current, Some(a));
    }
}
