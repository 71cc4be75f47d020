//! Terminate Module
//!
//! Graceful close with a deferred forced kill for clients that ignore it.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::shared::Xid;
use crate::wm::client::{ClientId, Fingerprint};
use crate::wm::client_flags::Protocols;
use crate::wm::error::{Result, tolerate};
use crate::wm::transport::{ProtocolMessage, Transport};
use crate::wm::WindowManager;

/// A kill scheduled after a polite close request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingKill {
    pub client: ClientId,
    pub window: Xid,
    pub fingerprint: Fingerprint,
    pub deadline: Instant,
}

/// Termination manager
#[derive(Debug, Default)]
pub struct TerminateManager {
    pending: Vec<PendingKill>,
}

impl TerminateManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any kill already pending for the same client
    pub fn schedule(&mut self, kill: PendingKill) {
        self.pending.retain(|p| p.client != kill.client);
        self.pending.push(kill);
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.iter().map(|p| p.deadline).min()
    }

    /// Remove and return every kill due at `now`
    pub fn take_expired(&mut self, now: Instant) -> Vec<PendingKill> {
        let (due, pending) = self.pending.drain(..).partition(|p| p.deadline <= now);
        self.pending = pending;
        due
    }

    pub fn is_pending(&self, client: ClientId) -> bool {
        self.pending.iter().any(|p| p.client == client)
    }
}

impl<C: Transport> WindowManager<C> {
    /// Ask the client to close, killing it after its patience runs out
    pub fn close(&mut self, id: ClientId) -> Result<()> {
        let Some(client) = self.clients.get(id) else {
            return Ok(());
        };
        if !client.protocols.contains(Protocols::DELETE_WINDOW) {
            debug!(id = %id, "no WM_DELETE_WINDOW, killing");
            return self.kill(id);
        }

        let kill = PendingKill {
            client: id,
            window: client.window,
            fingerprint: client.fingerprint(),
            deadline: Instant::now() + client.patience,
        };
        if self.terminate.is_pending(id) {
            debug!(id = %id, "close repeated, restarting patience");
        }
        info!(id = %id, patience = ?client.patience, "closing client");
        tolerate(
            self.conn.send_protocol(kill.window, ProtocolMessage::DeleteWindow),
            "delete window",
        )?;
        self.terminate.schedule(kill);
        Ok(())
    }

    pub fn kill(&mut self, id: ClientId) -> Result<()> {
        let Some(client) = self.clients.get(id) else {
            return Ok(());
        };
        info!(id = %id, window = client.window, "killing client");
        tolerate(self.conn.kill_client(client.window), "kill client")?;
        Ok(())
    }

    /// Fire the kills that are due and still refer to the same client
    pub fn run_timers(&mut self, now: Instant) -> Result<()> {
        for pending in self.terminate.take_expired(now) {
            let same = self
                .clients
                .find(pending.window)
                .filter(|&id| id == pending.client)
                .and_then(|id| self.clients.get(id))
                .is_some_and(|c| c.fingerprint() == pending.fingerprint);

            if !same {
                debug!(id = %pending.client, "client changed or gone, dropping kill");
                continue;
            }
            warn!(id = %pending.client, "client ignored close request");
            self.kill(pending.client)?;
        }
        Ok(())
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.terminate.next_deadline()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::Geometry;
    use crate::wm::hints::ClientProperties;
    use crate::wm::mock::{Request, manage, test_wm};
    use std::time::Duration;

    fn polite() -> ClientProperties {
        ClientProperties {
            protocols: Protocols::DELETE_WINDOW,
            name: "editor".into(),
            ..Default::default()
        }
    }

    #[test]
    fn close_without_protocol_kills_immediately() {
        let mut wm = test_wm();
        let a = manage(&mut wm, 10, Geometry::new(0, 0, 50, 50));
        wm.conn.take_requests();

        wm.close(a).unwrap();

        assert_eq!(wm.conn.take_requests(), vec![Request::Kill(10)]);
        assert_eq!(wm.next_deadline(), None);
    }

    #[test]
    fn ignored_close_is_followed_by_a_kill() {
        let mut wm = test_wm();
        wm.conn.add_window(10, Geometry::new(0, 0, 50, 50), polite());
        wm.handle_event(crate::wm::events::XEvent::MapRequest(10)).unwrap();
        let a = wm.clients.find(10).unwrap();
        wm.conn.take_requests();

        wm.close(a).unwrap();
        assert_eq!(
            wm.conn.take_requests(),
            vec![Request::Protocol(10, ProtocolMessage::DeleteWindow)]
        );
        let deadline = wm.next_deadline().unwrap();

        wm.run_timers(deadline - Duration::from_millis(1)).unwrap();
        assert!(wm.conn.take_requests().is_empty());

        wm.run_timers(deadline).unwrap();
        assert_eq!(wm.conn.take_requests(), vec![Request::Kill(10)]);
        assert_eq!(wm.next_deadline(), None);
    }

    #[test]
    fn destroyed_client_is_not_killed() {
        let mut wm = test_wm();
        wm.conn.add_window(10, Geometry::new(0, 0, 50, 50), polite());
        wm.handle_event(crate::wm::events::XEvent::MapRequest(10)).unwrap();
        let a = wm.clients.find(10).unwrap();
        wm.close(a).unwrap();
        let deadline = wm.next_deadline().unwrap();

        wm.handle_event(crate::wm::events::XEvent::DestroyNotify(10)).unwrap();
        wm.conn.take_requests();
        wm.run_timers(deadline).unwrap();

        assert!(!wm.conn.take_requests().contains(&Request::Kill(10)));
    }

    #[test]
    fn changed_fingerprint_cancels_the_kill() {
        let mut wm = test_wm();
        wm.conn.add_window(10, Geometry::new(0, 0, 50, 50), polite());
        wm.handle_event(crate::wm::events::XEvent::MapRequest(10)).unwrap();
        let a = wm.clients.find(10).unwrap();
        wm.close(a).unwrap();
        let deadline = wm.next_deadline().unwrap();

        wm.clients.get_mut(a).unwrap().name = "save changes?".into();
        wm.conn.take_requests();
        wm.run_timers(deadline).unwrap();

        assert!(wm.conn.take_requests().is_empty());
    }

    #[test]
    fn rescheduling_replaces_the_pending_kill() {
        let mut t = TerminateManager::new();
        let now = Instant::now();
        let kill = |secs| PendingKill {
            client: ClientId(1),
            window: 10,
            fingerprint: crate::wm::client::Client::new(
                ClientId(1),
                10,
                Geometry::default(),
                Default::default(),
            )
            .fingerprint(),
            deadline: now + Duration::from_secs(secs),
        };
        t.schedule(kill(5));
        t.schedule(kill(9));

        assert!(t.is_pending(ClientId(1)));
        assert!(t.take_expired(now + Duration::from_secs(6)).is_empty());
        assert_eq!(t.take_expired(now + Duration::from_secs(9)).len(), 1);
    }
}
