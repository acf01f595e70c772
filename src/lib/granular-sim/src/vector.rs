use serde::{Deserialize, Serialize};

/// A 2-D double-precision vector. Used for velocity (cells/second), for
/// center-of-mass offsets (cell-local, roughly [-1,1] per axis), and for
/// pressure (unit-agnostic, structured quantity lives in `Cell`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vector2 {
    pub x: f64,
    pub y: f64,
}

impl Vector2 {
    pub const ZERO: Vector2 = Vector2 { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Vector2 { x, y }
    }

    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Returns the zero vector when `self` is (approximately) zero, rather
    /// than dividing by zero.
    pub fn normalize(&self) -> Vector2 {
        let mag = self.magnitude();
        if mag < f64::EPSILON {
            Vector2::ZERO
        } else {
            Vector2::new(self.x / mag, self.y / mag)
        }
    }

    pub fn dot(&self, other: &Vector2) -> f64 {
        self.x * other.x + self.y * other.y
    }

    pub fn clamp(&self, min: Vector2, max: Vector2) -> Vector2 {
        Vector2::new(self.x.clamp(min.x, max.x), self.y.clamp(min.y, max.y))
    }

    /// Component-wise clamp to `[-bound, bound]` on both axes.
    pub fn clamp_magnitude_per_axis(&self, bound: f64) -> Vector2 {
        self.clamp(Vector2::new(-bound, -bound), Vector2::new(bound, bound))
    }
}

impl std::ops::Add for Vector2 {
    type Output = Vector2;
    fn add(self, rhs: Vector2) -> Vector2 {
        Vector2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::AddAssign for Vector2 {
    fn add_assign(&mut self, rhs: Vector2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl std::ops::Sub for Vector2 {
    type Output = Vector2;
    fn sub(self, rhs: Vector2) -> Vector2 {
        Vector2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::SubAssign for Vector2 {
    fn sub_assign(&mut self, rhs: Vector2) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl std::ops::Mul<f64> for Vector2 {
    type Output = Vector2;
    fn mul(self, rhs: f64) -> Vector2 {
        Vector2::new(self.x * rhs, self.y * rhs)
    }
}

impl std::ops::MulAssign<f64> for Vector2 {
    fn mul_assign(&mut self, rhs: f64) {
        self.x *= rhs;
        self.y *= rhs;
    }
}

impl std::ops::Div<f64> for Vector2 {
    type Output = Vector2;
    fn div(self, rhs: f64) -> Vector2 {
        Vector2::new(self.x / rhs, self.y / rhs)
    }
}

impl std::ops::Neg for Vector2 {
    type Output = Vector2;
    fn neg(self) -> Vector2 {
        Vector2::new(-self.x, -self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_of_zero_is_zero() {
        assert_eq!(Vector2::ZERO.normalize(), Vector2::ZERO);
    }

    #[test]
    fn normalize_has_unit_magnitude() {
        let v = Vector2::new(3.0, 4.0).normalize();
        assert!((v.magnitude() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn clamp_magnitude_per_axis_bounds_each_axis() {
        let v = Vector2::new(5.0, -5.0).clamp_magnitude_per_axis(1.2);
        assert_eq!(v, Vector2::new(1.2, -1.2));
    }

    #[test]
    fn dot_product() {
        assert_eq!(Vector2::new(1.0, 2.0).dot(&Vector2::new(3.0, 4.0)), 11.0);
    }
}
