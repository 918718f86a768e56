//! Planar rectangles in an overlay's projected coordinates.

/// Axis-aligned rectangle. `Default` is the empty rectangle at the origin.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rectangle {
    pub minimum_x: f64,
    pub minimum_y: f64,
    pub maximum_x: f64,
    pub maximum_y: f64,
}

impl Rectangle {
    pub fn new(minimum_x: f64, minimum_y: f64, maximum_x: f64, maximum_y: f64) -> Self {
        Self {
            minimum_x,
            minimum_y,
            maximum_x,
            maximum_y,
        }
    }

    pub fn width(&self) -> f64 {
        self.maximum_x - self.minimum_x
    }

    pub fn height(&self) -> f64 {
        self.maximum_y - self.minimum_y
    }

    /// True when the rectangle covers no area.
    pub fn is_empty(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_empty() {
        assert!(Rectangle::default().is_empty());
        assert!(!Rectangle::new(0.0, 0.0, 2.0, 1.0).is_empty());
        assert_eq!(Rectangle::new(1.0, 1.0, 4.0, 2.0).width(), 3.0);
    }
}
