//! Placement Module
//!
//! Initial position for newly mapped clients. Smart placement tries the four
//! corners of the work area first and otherwise picks the candidate position
//! with the least total overlap against the visible clients.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::shared::{Geometry, Point};
use crate::wm::client::ClientId;
use crate::wm::error::Result;
use crate::wm::transport::Transport;
use crate::wm::WindowManager;

/// Placement policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementPolicy {
    /// Free corner, else least overlap
    #[default]
    Smart,
    /// Center of the work area
    Center,
    /// Centered under the pointer
    Mouse,
}

/// Top-left, top-right, bottom-left, bottom-right; the first corner where a
/// `width` x `height` rectangle overlaps none of `obstacles`
pub fn place_corner(area: &Geometry, width: u32, height: u32, obstacles: &[Geometry]) -> Option<Point> {
    let left = area.x;
    let top = area.y;
    let right = area.right() - width as i32;
    let bottom = area.bottom() - height as i32;

    [(left, top), (right, top), (left, bottom), (right, bottom)]
        .into_iter()
        .map(|(x, y)| Geometry::new(x, y, width, height))
        .find(|candidate| !obstacles.iter().any(|o| candidate.overlaps(o)))
        .map(|g| Point::new(g.x, g.y))
}

/// Position with the globally smallest total overlap, ties broken by smaller
/// y then smaller x.
///
/// A local optimum always has each edge against a work area edge or against
/// an obstacle edge, so the candidates are the area edges plus, per
/// obstacle, the positions flush after its far edge and flush before its
/// near edge.
pub fn least_overlap(area: &Geometry, width: u32, height: u32, obstacles: &[Geometry]) -> Point {
    let (w, h) = (width as i32, height as i32);
    let fits_x = |x: &i32| *x >= area.x && *x + w <= area.right();
    let fits_y = |y: &i32| *y >= area.y && *y + h <= area.bottom();

    let xs: BTreeSet<i32> = [area.x, area.right() - w]
        .into_iter()
        .chain(obstacles.iter().flat_map(|o| [o.right(), o.x - w]))
        .filter(fits_x)
        .collect();
    let ys: BTreeSet<i32> = [area.y, area.bottom() - h]
        .into_iter()
        .chain(obstacles.iter().flat_map(|o| [o.bottom(), o.y - h]))
        .filter(fits_y)
        .collect();

    let mut best = Point::new(area.x, area.y);
    let mut best_overlap = u64::MAX;
    for &y in &ys {
        for &x in &xs {
            let candidate = Geometry::new(x, y, width, height);
            let overlap: u64 = obstacles.iter().map(|o| candidate.overlap_area(o)).sum();
            if overlap < best_overlap {
                best_overlap = overlap;
                best = Point::new(x, y);
            }
        }
    }
    best
}

pub fn place_smart(area: &Geometry, width: u32, height: u32, obstacles: &[Geometry]) -> Point {
    place_corner(area, width, height, obstacles)
        .unwrap_or_else(|| least_overlap(area, width, height, obstacles))
}

/// Center a `width` x `height` rectangle on `over`, kept inside `area`
pub fn center_on(area: &Geometry, over: Point, width: u32, height: u32) -> Point {
    let g = Geometry::new(
        over.x - width as i32 / 2,
        over.y - height as i32 / 2,
        width,
        height,
    )
    .clamp_within(area);
    Point::new(g.x, g.y)
}

impl<C: Transport> WindowManager<C> {
    /// Frames of the visible clients other than `id`, topmost first
    fn placement_obstacles(&self, id: ClientId) -> Vec<Geometry> {
        let ws = self.workspaces.current();
        let th = self.config.decorations.titlebar_height;
        self.stacking
            .bottom_to_top()
            .into_iter()
            .rev()
            .filter(|&c| c != id && self.clients.is_visible(c, ws))
            .filter_map(|c| self.clients.get(c))
            .map(|c| c.frame_geometry(th))
            .collect()
    }

    /// Choose the initial position of `id`. Runs once per client.
    pub fn place_client(&mut self, id: ClientId) -> Result<()> {
        let th = self.config.decorations.titlebar_height;
        let area = self.work_area;
        let ws = self.workspaces.current();

        let Some(client) = self.clients.get(id) else {
            return Ok(());
        };
        if client.placed {
            return Ok(());
        }
        let frame = client.frame_geometry(th);

        let owner = client
            .transient_parent
            .filter(|&p| self.clients.is_visible(p, ws))
            .and_then(|p| self.clients.get(p))
            .map(|p| p.frame_geometry(th));

        let position = if client.size_hints.user_position {
            Point::new(frame.x, frame.y)
        } else if let Some(owner) = owner {
            center_on(&area, owner.center(), frame.width, frame.height)
        } else {
            match self.config.placement.policy {
                PlacementPolicy::Smart => {
                    let obstacles = self.placement_obstacles(id);
                    place_smart(&area, frame.width, frame.height, &obstacles)
                }
                PlacementPolicy::Center => {
                    center_on(&area, area.center(), frame.width, frame.height)
                }
                PlacementPolicy::Mouse => {
                    let pointer = self.conn.query_pointer().unwrap_or(area.center());
                    center_on(&area, pointer, frame.width, frame.height)
                }
            }
        };

        debug!(id = %id, x = position.x, y = position.y, "placed");
        if let Some(client) = self.clients.get_mut(id) {
            client.geometry = client.geometry.with_position(position.x, position.y);
            client.placed = true;
        }
        Ok(())
    }
}
