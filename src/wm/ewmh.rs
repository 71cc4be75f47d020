//! EWMH (Extended Window Manager Hints) implementation
//!
//! Interned atoms, `_NET_SUPPORTED` setup and publication of the root and
//! per-client properties the manager owns.

use tracing::debug;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::*;
use x11rb::wrapper::ConnectionExt as _;

use crate::wm::client_flags::{Protocols, WindowType};
use crate::wm::error::Result;
use crate::wm::events::Property;
use crate::wm::hints::NetState;
use crate::wm::transport::RootUpdate;

/// Holds all interned atoms
#[derive(Debug, Clone, Copy)]
pub struct Atoms {
    pub net_supported: Atom,
    pub net_supporting_wm_check: Atom,
    pub net_client_list: Atom,
    pub net_client_list_stacking: Atom,
    pub net_number_of_desktops: Atom,
    pub net_desktop_names: Atom,
    pub net_current_desktop: Atom,
    pub net_active_window: Atom,
    pub net_workarea: Atom,
    pub net_wm_name: Atom,
    pub net_wm_desktop: Atom,
    pub net_wm_window_type: Atom,
    pub net_wm_window_type_desktop: Atom,
    pub net_wm_window_type_dock: Atom,
    pub net_wm_window_type_toolbar: Atom,
    pub net_wm_window_type_menu: Atom,
    pub net_wm_window_type_utility: Atom,
    pub net_wm_window_type_splash: Atom,
    pub net_wm_window_type_dialog: Atom,
    pub net_wm_window_type_notification: Atom,
    pub net_wm_window_type_normal: Atom,
    pub net_wm_state: Atom,
    pub net_wm_state_sticky: Atom,
    pub net_wm_state_above: Atom,
    pub net_wm_state_below: Atom,
    pub net_wm_state_skip_taskbar: Atom,
    pub net_wm_state_skip_pager: Atom,
    pub net_wm_state_maximized_vert: Atom,
    pub net_wm_state_maximized_horz: Atom,
    pub net_close_window: Atom,
    pub net_wm_moveresize: Atom,
    pub net_restack_window: Atom,
    pub utf8_string: Atom,
    // ICCCM
    pub wm_protocols: Atom,
    pub wm_delete_window: Atom,
    pub wm_take_focus: Atom,
    pub wm_save_yourself: Atom,
    pub wm_state: Atom,
    // Motif decoration hints
    pub motif_wm_hints: Atom,
}

impl Atoms {
    /// Intern all required atoms
    pub fn new<C: Connection>(conn: &C) -> Result<Self> {
        let intern = |name: &str| -> Result<Atom> {
            Ok(conn.intern_atom(false, name.as_bytes())?.reply()?.atom)
        };

        Ok(Self {
            net_supported: intern("_NET_SUPPORTED")?,
            net_supporting_wm_check: intern("_NET_SUPPORTING_WM_CHECK")?,
            net_client_list: intern("_NET_CLIENT_LIST")?,
            net_client_list_stacking: intern("_NET_CLIENT_LIST_STACKING")?,
            net_number_of_desktops: intern("_NET_NUMBER_OF_DESKTOPS")?,
            net_desktop_names: intern("_NET_DESKTOP_NAMES")?,
            net_current_desktop: intern("_NET_CURRENT_DESKTOP")?,
            net_active_window: intern("_NET_ACTIVE_WINDOW")?,
            net_workarea: intern("_NET_WORKAREA")?,
            net_wm_name: intern("_NET_WM_NAME")?,
            net_wm_desktop: intern("_NET_WM_DESKTOP")?,
            net_wm_window_type: intern("_NET_WM_WINDOW_TYPE")?,
            net_wm_window_type_desktop: intern("_NET_WM_WINDOW_TYPE_DESKTOP")?,
            net_wm_window_type_dock: intern("_NET_WM_WINDOW_TYPE_DOCK")?,
            net_wm_window_type_toolbar: intern("_NET_WM_WINDOW_TYPE_TOOLBAR")?,
            net_wm_window_type_menu: intern("_NET_WM_WINDOW_TYPE_MENU")?,
            net_wm_window_type_utility: intern("_NET_WM_WINDOW_TYPE_UTILITY")?,
            net_wm_window_type_splash: intern("_NET_WM_WINDOW_TYPE_SPLASH")?,
            net_wm_window_type_dialog: intern("_NET_WM_WINDOW_TYPE_DIALOG")?,
            net_wm_window_type_notification: intern("_NET_WM_WINDOW_TYPE_NOTIFICATION")?,
            net_wm_window_type_normal: intern("_NET_WM_WINDOW_TYPE_NORMAL")?,
            net_wm_state: intern("_NET_WM_STATE")?,
            net_wm_state_sticky: intern("_NET_WM_STATE_STICKY")?,
            net_wm_state_above: intern("_NET_WM_STATE_ABOVE")?,
            net_wm_state_below: intern("_NET_WM_STATE_BELOW")?,
            net_wm_state_skip_taskbar: intern("_NET_WM_STATE_SKIP_TASKBAR")?,
            net_wm_state_skip_pager: intern("_NET_WM_STATE_SKIP_PAGER")?,
            net_wm_state_maximized_vert: intern("_NET_WM_STATE_MAXIMIZED_VERT")?,
            net_wm_state_maximized_horz: intern("_NET_WM_STATE_MAXIMIZED_HORZ")?,
            net_close_window: intern("_NET_CLOSE_WINDOW")?,
            net_wm_moveresize: intern("_NET_WM_MOVERESIZE")?,
            net_restack_window: intern("_NET_RESTACK_WINDOW")?,
            utf8_string: intern("UTF8_STRING")?,
            wm_protocols: intern("WM_PROTOCOLS")?,
            wm_delete_window: intern("WM_DELETE_WINDOW")?,
            wm_take_focus: intern("WM_TAKE_FOCUS")?,
            wm_save_yourself: intern("WM_SAVE_YOURSELF")?,
            wm_state: intern("WM_STATE")?,
            motif_wm_hints: intern("_MOTIF_WM_HINTS")?,
        })
    }

    /// Advertise what we support and point `_NET_SUPPORTING_WM_CHECK` at `check`
    pub fn setup_supported<C: Connection>(&self, conn: &C, root: Window, check: Window) -> Result<()> {
        let supported = [
            self.net_supported,
            self.net_supporting_wm_check,
            self.net_client_list,
            self.net_client_list_stacking,
            self.net_number_of_desktops,
            self.net_desktop_names,
            self.net_current_desktop,
            self.net_active_window,
            self.net_workarea,
            self.net_wm_name,
            self.net_wm_desktop,
            self.net_wm_window_type,
            self.net_wm_state,
            self.net_wm_state_sticky,
            self.net_wm_state_above,
            self.net_wm_state_below,
            self.net_wm_state_skip_taskbar,
            self.net_wm_state_skip_pager,
            self.net_wm_state_maximized_vert,
            self.net_wm_state_maximized_horz,
            self.net_close_window,
            self.net_wm_moveresize,
            self.net_restack_window,
        ];
        conn.change_property32(
            PropMode::REPLACE,
            root,
            self.net_supported,
            AtomEnum::ATOM,
            &supported,
        )?;

        for window in [root, check] {
            conn.change_property32(
                PropMode::REPLACE,
                window,
                self.net_supporting_wm_check,
                AtomEnum::WINDOW,
                &[check],
            )?;
        }
        conn.change_property8(
            PropMode::REPLACE,
            check,
            self.net_wm_name,
            self.utf8_string,
            b"area",
        )?;

        debug!("EWMH: advertised {} supported atoms", supported.len());
        Ok(())
    }

    pub fn update_workarea<C: Connection>(
        &self,
        conn: &C,
        root: Window,
        desktops: u32,
        area: (i32, i32, u32, u32),
    ) -> Result<()> {
        let (x, y, w, h) = area;
        let values: Vec<u32> = (0..desktops)
            .flat_map(|_| [x as u32, y as u32, w, h])
            .collect();
        conn.change_property32(
            PropMode::REPLACE,
            root,
            self.net_workarea,
            AtomEnum::CARDINAL,
            &values,
        )?;
        Ok(())
    }

    /// Write one manager-owned property
    pub fn publish<C: Connection>(&self, conn: &C, root: Window, update: RootUpdate) -> Result<()> {
        match update {
            RootUpdate::ClientList(windows) => {
                conn.change_property32(
                    PropMode::REPLACE,
                    root,
                    self.net_client_list,
                    AtomEnum::WINDOW,
                    &windows,
                )?;
            }
            RootUpdate::ClientListStacking(windows) => {
                conn.change_property32(
                    PropMode::REPLACE,
                    root,
                    self.net_client_list_stacking,
                    AtomEnum::WINDOW,
                    &windows,
                )?;
            }
            RootUpdate::ActiveWindow(window) => {
                conn.change_property32(
                    PropMode::REPLACE,
                    root,
                    self.net_active_window,
                    AtomEnum::WINDOW,
                    &[window.unwrap_or(x11rb::NONE)],
                )?;
            }
            RootUpdate::CurrentDesktop(desktop) => {
                conn.change_property32(
                    PropMode::REPLACE,
                    root,
                    self.net_current_desktop,
                    AtomEnum::CARDINAL,
                    &[desktop],
                )?;
            }
            RootUpdate::NumberOfDesktops(count) => {
                conn.change_property32(
                    PropMode::REPLACE,
                    root,
                    self.net_number_of_desktops,
                    AtomEnum::CARDINAL,
                    &[count],
                )?;
            }
            RootUpdate::DesktopNames(names) => {
                conn.change_property8(
                    PropMode::REPLACE,
                    root,
                    self.net_desktop_names,
                    self.utf8_string,
                    &null_separated(&names),
                )?;
            }
            RootUpdate::WmDesktop { window, desktop } => {
                conn.change_property32(
                    PropMode::REPLACE,
                    window,
                    self.net_wm_desktop,
                    AtomEnum::CARDINAL,
                    &[desktop],
                )?;
            }
        }
        Ok(())
    }

    /// Which client property an atom names
    pub fn property_kind(&self, atom: Atom) -> Property {
        match atom {
            a if a == Atom::from(AtomEnum::WM_TRANSIENT_FOR) => Property::TransientFor,
            a if a == Atom::from(AtomEnum::WM_NORMAL_HINTS) => Property::NormalHints,
            a if a == Atom::from(AtomEnum::WM_NAME)
                || a == Atom::from(AtomEnum::WM_CLASS)
                || a == self.net_wm_name =>
            {
                Property::Name
            }
            a if a == self.wm_protocols => Property::Protocols,
            a if a == Atom::from(AtomEnum::WM_HINTS) => Property::Hints,
            _ => Property::Other,
        }
    }

    pub fn protocol(&self, atom: Atom) -> Protocols {
        match atom {
            a if a == self.wm_delete_window => Protocols::DELETE_WINDOW,
            a if a == self.wm_take_focus => Protocols::TAKE_FOCUS,
            a if a == self.wm_save_yourself => Protocols::SAVE_YOURSELF,
            _ => Protocols::empty(),
        }
    }

    pub fn window_type(&self, atom: Atom) -> Option<WindowType> {
        let types = [
            (self.net_wm_window_type_normal, WindowType::Normal),
            (self.net_wm_window_type_desktop, WindowType::Desktop),
            (self.net_wm_window_type_dock, WindowType::Dock),
            (self.net_wm_window_type_dialog, WindowType::Dialog),
            (self.net_wm_window_type_toolbar, WindowType::Toolbar),
            (self.net_wm_window_type_menu, WindowType::Menu),
            (self.net_wm_window_type_utility, WindowType::Utility),
            (self.net_wm_window_type_splash, WindowType::Splashscreen),
            (self.net_wm_window_type_notification, WindowType::Notification),
        ];
        types.into_iter().find(|&(a, _)| a == atom).map(|(_, t)| t)
    }

    /// Both maximized atoms map to one flag
    pub fn net_state(&self, atom: Atom) -> NetState {
        match atom {
            a if a == self.net_wm_state_sticky => NetState::STICKY,
            a if a == self.net_wm_state_above => NetState::ABOVE,
            a if a == self.net_wm_state_below => NetState::BELOW,
            a if a == self.net_wm_state_skip_taskbar => NetState::SKIP_TASKBAR,
            a if a == self.net_wm_state_skip_pager => NetState::SKIP_PAGER,
            a if a == self.net_wm_state_maximized_vert || a == self.net_wm_state_maximized_horz => {
                NetState::MAXIMIZED
            }
            _ => NetState::empty(),
        }
    }
}

/// `_NET_DESKTOP_NAMES` encoding: every name followed by a NUL
fn null_separated(names: &[String]) -> Vec<u8> {
    names
        .iter()
        .flat_map(|n| n.bytes().chain(std::iter::once(0)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn desktop_names_are_nul_terminated() {
        let names = vec!["one".to_string(), "two".to_string()];
        assert_eq!(null_separated(&names), b"one\0two\0".to_vec());
        assert!(null_separated(&[]).is_empty());
    }
}
