//! Hints Module
//!
//! Translation of ICCCM/EWMH/Motif properties into client state. Every policy
//! flag set here carries `Provenance::HintSet`, so user rules always win.

use bitflags::bitflags;
use tracing::debug;

use crate::shared::Xid;
use crate::wm::client::{Client, SizeHints};
use crate::wm::client_flags::{CycleBehavior, FocusPolicy, Protocols, Provenance, WindowType};

/// `_NET_WM_DESKTOP` value meaning "all desktops"
pub const ALL_DESKTOPS: u32 = 0xFFFF_FFFF;

bitflags! {
    /// The `_NET_WM_STATE` atoms we act on
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct NetState: u16 {
        const STICKY       = 1 << 0;
        const ABOVE        = 1 << 1;
        const BELOW        = 1 << 2;
        const SKIP_TASKBAR = 1 << 3;
        const SKIP_PAGER   = 1 << 4;
        const MAXIMIZED    = 1 << 5;
    }
}

/// Decoded client properties as read by the transport
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientProperties {
    pub name: String,
    pub class: String,
    pub transient_for: Option<Xid>,
    pub group_leader: Option<Xid>,
    pub size_hints: SizeHints,
    pub protocols: Protocols,
    /// WM_HINTS input field, `None` when the client does not say
    pub input: Option<bool>,
    pub window_type: WindowType,
    pub net_state: NetState,
    /// Motif hints asked for no decorations
    pub no_decorations: bool,
    pub desktop: Option<u32>,
}

/// Hints manager
pub struct HintsManager;

impl HintsManager {
    /// Copy the plain data (name, class, size hints, protocols, group, transient hint)
    pub fn apply_properties(client: &mut Client, props: &ClientProperties) {
        client.name = props.name.clone();
        client.class = props.class.clone();
        client.size_hints = props.size_hints;
        client.protocols = props.protocols;
        client.window_type = props.window_type;
        client.group_leader = props.group_leader;
        client.transient_for_hint = props.transient_for;
        client.input_hint = props.input.unwrap_or(true);
    }

    /// Derive policy flags from the hints. Returns the desktop the client asked for.
    pub fn apply_policy(client: &mut Client, props: &ClientProperties) -> Option<u32> {
        let hint = Provenance::HintSet;
        let policy = &mut client.policy;

        if props.no_decorations {
            policy.has_titlebar.assign(false, hint);
        }

        match props.window_type {
            WindowType::Desktop => {
                policy.has_titlebar.assign(false, hint);
                policy.always_on_bottom.assign(true, hint);
                policy.sticky.assign(true, hint);
                policy.cycle.assign(CycleBehavior::Skip, hint);
                policy.focus.assign(FocusPolicy::Never, hint);
            }
            WindowType::Dock => {
                policy.has_titlebar.assign(false, hint);
                policy.always_on_top.assign(true, hint);
                policy.sticky.assign(true, hint);
                policy.cycle.assign(CycleBehavior::Skip, hint);
            }
            WindowType::Notification | WindowType::Splashscreen => {
                policy.has_titlebar.assign(false, hint);
                policy.cycle.assign(CycleBehavior::Skip, hint);
            }
            WindowType::Toolbar | WindowType::Menu | WindowType::Utility => {
                policy.cycle.assign(CycleBehavior::Skip, hint);
            }
            WindowType::Normal | WindowType::Dialog => {}
        }

        if props.net_state.contains(NetState::STICKY) {
            policy.sticky.assign(true, hint);
            policy.omnipresent.assign(true, hint);
        }
        if props.net_state.contains(NetState::ABOVE) {
            policy.always_on_top.assign(true, hint);
        }
        if props.net_state.contains(NetState::BELOW) {
            policy.always_on_bottom.assign(true, hint);
        }
        if props
            .net_state
            .intersects(NetState::SKIP_TASKBAR | NetState::SKIP_PAGER)
        {
            policy.cycle.assign(CycleBehavior::Skip, hint);
        }

        if props.input == Some(false) && !props.protocols.contains(Protocols::TAKE_FOCUS) {
            policy.focus.assign(FocusPolicy::Never, hint);
        }

        match props.desktop {
            Some(ALL_DESKTOPS) => {
                policy.sticky.assign(true, hint);
                policy.omnipresent.assign(true, hint);
                None
            }
            // _NET_WM_DESKTOP counts from 0, our workspaces from 1
            Some(d) => Some(d + 1),
            None => None,
        }
    }

    /// Apply everything read at creation time
    pub fn apply(client: &mut Client, props: &ClientProperties) -> Option<u32> {
        Self::apply_properties(client, props);
        let desktop = Self::apply_policy(client, props);
        debug!(id = %client.id, class = %client.class, ?desktop, "applied hints");
        desktop
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::Geometry;
    use crate::wm::client::ClientId;
    use crate::wm::client_flags::{Policy, Tier};
    use simple_test_case::test_case;

    fn client() -> Client {
        Client::new(ClientId(1), 10, Geometry::new(0, 0, 100, 100), Policy::default())
    }

    #[test_case(WindowType::Dock, Tier::Top, false; "dock")]
    #[test_case(WindowType::Desktop, Tier::Bottom, false; "desktop")]
    #[test_case(WindowType::Dialog, Tier::Normal, true; "dialog")]
    #[test_case(WindowType::Notification, Tier::Normal, false; "notification")]
    #[test]
    fn window_type_sets_tier_and_decorations(ty: WindowType, tier: Tier, titlebar: bool) {
        let mut c = client();
        HintsManager::apply(&mut c, &ClientProperties { window_type: ty, ..Default::default() });

        assert_eq!(c.policy.tier(), tier);
        assert_eq!(c.has_titlebar(), titlebar);
    }

    #[test]
    fn hints_never_override_user_settings() {
        let mut c = client();
        c.policy.has_titlebar.assign(true, Provenance::UserSet);
        c.policy.cycle.assign(CycleBehavior::RaiseOnFinish, Provenance::UserSet);

        let props = ClientProperties {
            no_decorations: true,
            net_state: NetState::SKIP_TASKBAR,
            ..Default::default()
        };
        HintsManager::apply(&mut c, &props);

        assert!(c.has_titlebar());
        assert_eq!(c.policy.cycle.get(), CycleBehavior::RaiseOnFinish);
    }

    #[test]
    fn no_input_without_take_focus_means_never_focus() {
        let mut c = client();
        let mut props = ClientProperties { input: Some(false), ..Default::default() };
        HintsManager::apply(&mut c, &props);
        assert_eq!(c.policy.focus.get(), FocusPolicy::Never);

        let mut c = client();
        props.protocols = Protocols::TAKE_FOCUS;
        HintsManager::apply(&mut c, &props);
        assert_eq!(c.policy.focus.get(), FocusPolicy::ClickToFocus);
        assert!(!c.input_hint);
    }

    #[test_case(None, None, false; "no desktop")]
    #[test_case(Some(0), Some(1), false; "first desktop")]
    #[test_case(Some(ALL_DESKTOPS), None, true; "all desktops")]
    #[test]
    fn desktop_hint(desktop: Option<u32>, workspace: Option<u32>, sticky: bool) {
        let mut c = client();
        let ws = HintsManager::apply(&mut c, &ClientProperties { desktop, ..Default::default() });

        assert_eq!(ws, workspace);
        assert_eq!(c.policy.sticky.get(), sticky);
        assert_eq!(c.policy.omnipresent.get(), sticky);
    }
}
