//! Structures used to map areas on the screen

use serde::{Deserialize, Serialize};
use std::{
    cmp,
    fmt,
    ops::{Add, Sub},
};

// ============================== Padding =============================
// ====================================================================

/// Padding around a window
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Padding {
    /// Padding on the top
    pub(crate) top:    u32,
    /// Padding on the right
    pub(crate) right:  u32,
    /// Padding on the bottom
    pub(crate) bottom: u32,
    /// Padding on the left
    pub(crate) left:   u32,
}

impl Padding {
    /// Create a new [`Padding`]
    pub(crate) const fn new(top: u32, right: u32, bottom: u32, left: u32) -> Self {
        Self { top, right, bottom, left }
    }

    /// The same amount on every side
    pub(crate) const fn uniform(width: u32) -> Self {
        Self::new(width, width, width, width)
    }
}

/// Type alias for [`Padding`]
pub(crate) type Extents = Padding;

impl Extents {
    /// No [`Extents`]
    pub(crate) const EMPTY: Self = Self {
        left:   0,
        right:  0,
        top:    0,
        bottom: 0,
    };
}

// =============================== Point ==============================
// ====================================================================

/// Wrapper for [`Point`](xproto::Point). When this is used with a
/// [`Rectangle`], it represents the top-left corner
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub(crate) struct Point {
    /// X-coordinate
    pub(crate) x: i32,
    /// Y-coordinate
    pub(crate) y: i32,
}

impl Point {
    /// Create a new [`Point`]
    pub(crate) const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Check if [`Point`] is contained within the given [`Rectangle`]
    pub(crate) const fn is_inside(self, rect: Rectangle) -> bool {
        rect.is_inside(self)
    }

    /// Return the [`Point`] relative to the given [`Point`]
    pub(crate) const fn relative(self, p: Self) -> Self {
        Self {
            x: self.x - p.x,
            y: self.y - p.y,
        }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "x: {}, y: {}", self.x, self.y)
    }
}

impl Add<Self> for Point {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        Self::Output {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }
}

// ============================= Dimension ===========================
// ====================================================================

/// An a `width` and a `height`. An `area` of a [`Rectangle`]`
#[derive(
    Debug, Default, Copy, Clone, PartialOrd, Ord, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub(crate) struct Dimension {
    /// The width of the [`Rectangle`]
    pub(crate) width:  u32,
    /// The height of the [`Rectangle`]
    pub(crate) height: u32,
}

impl Dimension {
    /// Create a new [`Dimension`]
    pub(crate) const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Check if either side is zero
    pub(crate) const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "width: {}, height: {}", self.width, self.height)
    }
}

// ============================= Rectangle ============================
// ====================================================================

/// Equivalent to `xcb_rectangle_t`
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub(crate) struct Rectangle {
    /// Represents the top-left corner of the rectangle
    pub(crate) point:     Point,
    /// The width and height of the rectangle
    pub(crate) dimension: Dimension,
}

impl Rectangle {
    /// Create a new [`Rectangle`]
    pub(crate) const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            point:     Point::new(x, y),
            dimension: Dimension::new(width, height),
        }
    }

    /// Create a zeroed [`Rectangle`]
    pub(crate) fn zeroed() -> Self {
        Self::default()
    }

    /// Return the area of the [`Rectangle`]
    pub(crate) const fn area(&self) -> u64 {
        self.dimension.width as u64 * self.dimension.height as u64
    }

    /// Return the bottom right [`Point`] (exclusive)
    pub(crate) const fn bottom_right(&self) -> Point {
        Point {
            x: self.point.x + self.dimension.width as i32,
            y: self.point.y + self.dimension.height as i32,
        }
    }

    /// Test whether the given [`Point`] is contained within the [`Rectangle`]
    pub(crate) const fn is_inside(&self, point: Point) -> bool {
        point.x >= self.point.x
            && point.x < self.point.x + self.dimension.width as i32
            && point.y >= self.point.y
            && point.y < self.point.y + self.dimension.height as i32
    }

    /// The shared area of two [`Rectangle`]s, if any
    pub(crate) fn intersection(&self, other: Self) -> Option<Self> {
        let (a, b) = (self.bottom_right(), other.bottom_right());
        let x = cmp::max(self.point.x, other.point.x);
        let y = cmp::max(self.point.y, other.point.y);
        let right = cmp::min(a.x, b.x);
        let bottom = cmp::min(a.y, b.y);

        (right > x && bottom > y).then(|| Self::new(x, y, (right - x) as u32, (bottom - y) as u32))
    }

    /// Size of the shared area of two [`Rectangle`]s
    pub(crate) fn overlap(&self, other: Self) -> u64 {
        self.intersection(other).map_or(0, |r| r.area())
    }

    /// Move the [`Rectangle`] by the difference between two origins
    pub(crate) const fn translate(self, from: Point, to: Point) -> Self {
        Self {
            point:     Point {
                x: self.point.x - from.x + to.x,
                y: self.point.y - from.y + to.y,
            },
            dimension: self.dimension,
        }
    }
}

impl fmt::Display for Rectangle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}), ({})", self.point, self.dimension)
    }
}

impl Add<Padding> for Rectangle {
    type Output = Self;

    fn add(self, padding: Padding) -> Self::Output {
        Self::Output {
            point:     Point {
                x: self.point.x - padding.left as i32,
                y: self.point.y - padding.top as i32,
            },
            dimension: Dimension {
                width:  self.dimension.width + padding.left + padding.right,
                height: self.dimension.height + padding.top + padding.bottom,
            },
        }
    }
}

impl Sub<Padding> for Rectangle {
    type Output = Self;

    fn sub(self, padding: Padding) -> Self::Output {
        Self::Output {
            point:     Point {
                x: self.point.x + padding.left as i32,
                y: self.point.y + padding.top as i32,
            },
            dimension: Dimension {
                width:  self
                    .dimension
                    .width
                    .saturating_sub(padding.left + padding.right)
                    .max(1),
                height: self
                    .dimension
                    .height
                    .saturating_sub(padding.top + padding.bottom)
                    .max(1),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Padding, Point, Rectangle};

    #[test]
    fn intersection_of_disjoint_rectangles_is_empty() {
        let a = Rectangle::new(0, 0, 1920, 1080);
        let b = Rectangle::new(1920, 0, 1280, 1024);
        assert_eq!(a.intersection(b), None);
        assert_eq!(a.overlap(b), 0);
    }

    #[test]
    fn intersection_of_overlapping_rectangles() {
        let a = Rectangle::new(0, 0, 100, 100);
        let b = Rectangle::new(50, 25, 100, 100);
        assert_eq!(a.intersection(b), Some(Rectangle::new(50, 25, 50, 75)));
        assert_eq!(a.overlap(b), 50 * 75);
    }

    #[test]
    fn padding_round_trips_through_a_frame() {
        let inner = Rectangle::new(10, 30, 200, 100);
        let pad = Padding::new(20, 2, 2, 2);
        let outer = inner + pad;
        assert_eq!(outer, Rectangle::new(8, 10, 204, 122));
        assert_eq!(outer - pad, inner);
    }

    #[test]
    fn translate_between_heads() {
        let r = Rectangle::new(1930, 10, 50, 50);
        let moved = r.translate(Point::new(1920, 0), Point::new(0, 0));
        assert_eq!(moved, Rectangle::new(10, 10, 50, 50));
    }

    #[test]
    fn points_on_the_far_edge_are_outside() {
        let r = Rectangle::new(0, 0, 10, 10);
        assert!(Point::new(9, 9).is_inside(r));
        assert!(!Point::new(10, 0).is_inside(r));
    }
}
