//! Базовая геометрия плоскости: точки и прямоугольная область карты.
//!
//! Область карты всегда центрирована в начале координат: `x ∈ [-w/2, w/2]`,
//! `y ∈ [-h/2, h/2]`. На этом держатся генераторы `slope` и `cone`.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{MapgenError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    #[must_use]
    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }

    #[must_use]
    pub fn dot(self, other: Point) -> f64 {
        self.x * other.x + self.y * other.y
    }

    #[must_use]
    pub fn midpoint(self, other: Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    /// Побитовый ключ позиции: совпадающие точки дают одинаковый ключ.
    /// `-0.0` приводится к `0.0`.
    #[must_use]
    pub fn key(self) -> (u64, u64) {
        ((self.x + 0.0).to_bits(), (self.y + 0.0).to_bits())
    }

    /// Центроид многоугольника как среднее его вершин
    #[must_use]
    pub fn centroid(points: &[Point]) -> Option<Point> {
        if points.is_empty() {
            return None;
        }
        let n = points.len() as f64;
        let sx: f64 = points.iter().map(|p| p.x).sum();
        let sy: f64 = points.iter().map(|p| p.y).sum();
        Some(Point::new(sx / n, sy / n))
    }
}

/// Прямоугольная область карты с центром в начале координат
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub width: f64,
    pub height: f64,
}

impl Default for Extent {
    fn default() -> Self {
        Self {
            width: 1.0,
            height: 1.0,
        }
    }
}

impl Extent {
    pub fn new(width: f64, height: f64) -> Result<Self> {
        let extent = Self { width, height };
        extent.validate()?;
        Ok(extent)
    }

    /// Проверяет, что область имеет ненулевую конечную площадь
    pub fn validate(&self) -> Result<()> {
        if !(self.width.is_finite() && self.height.is_finite())
            || self.width <= 0.0
            || self.height <= 0.0
        {
            return Err(MapgenError::InvalidMeshConfig(format!(
                "degenerate extent {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn min_x(&self) -> f64 {
        -self.width / 2.0
    }

    #[must_use]
    pub fn max_x(&self) -> f64 {
        self.width / 2.0
    }

    #[must_use]
    pub fn min_y(&self) -> f64 {
        -self.height / 2.0
    }

    #[must_use]
    pub fn max_y(&self) -> f64 {
        self.height / 2.0
    }

    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min_x() && p.x <= self.max_x() && p.y >= self.min_y() && p.y <= self.max_y()
    }

    /// Точка лежит в пределах `margin` (доля ширины/высоты) от любой стороны
    #[must_use]
    pub fn is_near_side(&self, p: Point, margin: f64) -> bool {
        let dx = margin * self.width;
        let dy = margin * self.height;
        p.x < self.min_x() + dx
            || p.x > self.max_x() - dx
            || p.y < self.min_y() + dy
            || p.y > self.max_y() - dy
    }

    /// Равномерно случайная точка внутри области
    pub fn random_point<R: Rng + ?Sized>(&self, rng: &mut R) -> Point {
        Point::new(
            self.width * rng.gen_range(-0.5_f64..0.5),
            self.height * rng.gen_range(-0.5_f64..0.5),
        )
    }
}
