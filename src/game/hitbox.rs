//! Axis-aligned boxes for attack reach and vulnerable areas

/// Axis-aligned rectangle, origin at the top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center_x(&self) -> f32 {
        self.x + self.width / 2.0
    }

    /// Strict overlap: rectangles that only share an edge do not intersect
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

/// A rectangle with an activation flag and, for attack boxes, a damage value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hitbox {
    pub rect: Rect,
    pub damage: u32,
    pub active: bool,
}

impl Hitbox {
    /// Inactive box of the given size
    pub fn new(width: f32, height: f32, damage: u32) -> Self {
        Self {
            rect: Rect::new(0.0, 0.0, width, height),
            damage,
            active: false,
        }
    }

    /// Place the box in front of `body` on the `facing` side, `offset_y` below its top
    pub fn place_in_front(&mut self, body: &Rect, offset_y: f32, facing: i8) {
        self.rect.x = if facing >= 0 {
            body.right()
        } else {
            body.x - self.rect.width
        };
        self.rect.y = body.y + offset_y;
    }

    /// Both boxes active and overlapping
    pub fn is_colliding(&self, other: &Hitbox) -> bool {
        self.active && other.active && self.rect.intersects(&other.rect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touching_edges_do_not_intersect() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(10.0, 0.0, 10.0, 10.0);
        assert!(!a.intersects(&b));
        let c = Rect::new(9.5, 5.0, 10.0, 10.0);
        assert!(a.intersects(&c));
        assert!(c.intersects(&a));
    }

    #[test]
    fn inactive_box_never_collides() {
        let mut attack = Hitbox::new(10.0, 10.0, 5);
        let mut hurt = Hitbox::new(10.0, 10.0, 0);
        hurt.active = true;
        assert!(!attack.is_colliding(&hurt));
        attack.active = true;
        assert!(attack.is_colliding(&hurt));
    }

    #[test]
    fn placement_follows_facing() {
        let body = Rect::new(100.0, 500.0, 50.0, 100.0);
        let mut attack = Hitbox::new(33.0, 25.0, 30);

        attack.place_in_front(&body, 25.0, 1);
        assert_eq!(attack.rect.x, 150.0);
        assert_eq!(attack.rect.y, 525.0);

        attack.place_in_front(&body, 25.0, -1);
        assert_eq!(attack.rect.x, 67.0);
    }
}
