//! Geometry shared by every window manager subsystem
//!
//! Plain value types: no protocol handles, no borrowed client state.

/// X11 resource id (window, frame, titlebar)
pub type Xid = u32;

/// Rectangle in root window coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Geometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Geometry {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// One past the right-most column
    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    /// One past the bottom-most row
    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    pub fn with_position(self, x: i32, y: i32) -> Self {
        Self { x, y, ..self }
    }

    pub fn center(&self) -> Point {
        Point::new(
            self.x + self.width as i32 / 2,
            self.y + self.height as i32 / 2,
        )
    }

    /// Area of the intersection with `other`, zero unless it has positive width and height
    pub fn overlap_area(&self, other: &Geometry) -> u64 {
        let w = self.right().min(other.right()) - self.x.max(other.x);
        let h = self.bottom().min(other.bottom()) - self.y.max(other.y);
        if w > 0 && h > 0 {
            w as u64 * h as u64
        } else {
            0
        }
    }

    pub fn overlaps(&self, other: &Geometry) -> bool {
        self.overlap_area(other) > 0
    }

    /// Shift `self` so that it lies inside `area` where possible.
    /// A rectangle larger than `area` is pinned to its top-left corner.
    pub fn clamp_within(self, area: &Geometry) -> Self {
        let max_x = (area.right() - self.width as i32).max(area.x);
        let max_y = (area.bottom() - self.height as i32).max(area.y);
        Self {
            x: self.x.clamp(area.x, max_x),
            y: self.y.clamp(area.y, max_y),
            ..self
        }
    }
}

/// Point in root window coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;

    #[test_case(Geometry::new(0, 0, 100, 100), Geometry::new(50, 50, 100, 100), 2500; "partial")]
    #[test_case(Geometry::new(0, 0, 100, 100), Geometry::new(100, 0, 100, 100), 0; "touching edges")]
    #[test_case(Geometry::new(0, 0, 100, 100), Geometry::new(10, 10, 10, 10), 100; "contained")]
    #[test_case(Geometry::new(0, 0, 100, 100), Geometry::new(300, 300, 10, 10), 0; "disjoint")]
    #[test]
    fn overlap_area(a: Geometry, b: Geometry, expected: u64) {
        assert_eq!(a.overlap_area(&b), expected);
        assert_eq!(b.overlap_area(&a), expected);
    }

    #[test]
    fn clamp_within_pins_oversized_rectangles() {
        let area = Geometry::new(0, 0, 400, 300);

        let moved = Geometry::new(350, -20, 100, 100).clamp_within(&area);
        assert_eq!(moved, Geometry::new(300, 0, 100, 100));

        let huge = Geometry::new(50, 50, 800, 800).clamp_within(&area);
        assert_eq!((huge.x, huge.y), (0, 0));
    }
}
