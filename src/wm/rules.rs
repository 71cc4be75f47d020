//! Per-client rules from the configuration file.
//!
//! A rule's assignments carry `Provenance::UserSet`; an unconditional rule
//! forces them even over an earlier user assignment.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::wm::client::Client;
use crate::wm::client_flags::{CycleBehavior, Flagged, FocusPolicy, Provenance};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rule {
    /// Exact WM_CLASS class to match
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    /// Exact window title to match
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus: Option<FocusPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle: Option<CycleBehavior>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sticky: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub omnipresent: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub always_on_top: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub always_on_bottom: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub titlebar: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub click_through: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_transients_above: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patience_ms: Option<u64>,

    pub unconditional: bool,
}

impl Rule {
    /// A rule with no matcher matches nothing
    pub fn matches(&self, client: &Client) -> bool {
        if self.class.is_none() && self.name.is_none() {
            return false;
        }
        self.class.as_deref().is_none_or(|c| c == client.class)
            && self.name.as_deref().is_none_or(|n| n == client.name)
    }

    /// Apply the rule's assignments. Returns the workspace it asks for.
    pub fn apply(&self, client: &mut Client) -> Option<u32> {
        let unconditional = self.unconditional;
        fn set<T: Copy>(flag: &mut Flagged<T>, value: Option<T>, unconditional: bool) {
            match value {
                Some(v) if unconditional => flag.force(v),
                Some(v) => {
                    flag.assign(v, Provenance::UserSet);
                }
                None => {}
            }
        }

        let policy = &mut client.policy;
        set(&mut policy.focus, self.focus, unconditional);
        set(&mut policy.cycle, self.cycle, unconditional);
        set(&mut policy.sticky, self.sticky, unconditional);
        set(&mut policy.omnipresent, self.omnipresent, unconditional);
        set(&mut policy.always_on_top, self.always_on_top, unconditional);
        set(&mut policy.always_on_bottom, self.always_on_bottom, unconditional);
        set(&mut policy.has_titlebar, self.titlebar, unconditional);
        set(&mut policy.click_through, self.click_through, unconditional);
        set(&mut policy.keep_transients_above, self.keep_transients_above, unconditional);

        if let Some(ms) = self.patience_ms {
            client.patience = Duration::from_millis(ms);
        }

        self.workspace
    }
}

/// Apply every matching rule in order; the last workspace assignment wins
pub fn apply_rules(rules: &[Rule], client: &mut Client) -> Option<u32> {
    let mut workspace = None;
    for rule in rules {
        if !rule.matches(client) {
            continue;
        }
        debug!(id = %client.id, class = %client.class, "applying rule");
        if let Some(ws) = rule.apply(client) {
            workspace = Some(ws);
        }
    }
    workspace
}
