//! Гидрология на сетке: сток, заполнение впадин, накопление потока, уклон, эрозия.

pub mod erosion;
pub mod sinks;

use std::collections::HashMap;

use serde::Serialize;

use crate::geometry::Point;
use crate::heightmap::{FieldId, Heightmap};

pub use erosion::{do_erosion, erode, erosion_rate};
pub use sinks::{FillSinksOptions, fill_sinks};

/// Куда стекает вода из вершины
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Downhill {
    /// Самый низкий строго более низкий сосед
    To(usize),
    /// Локальный минимум: ниже соседей нет
    Minimum,
    /// Граничная вершина, вода уходит за карту
    Boundary,
}

impl Downhill {
    #[must_use]
    pub fn target(self) -> Option<usize> {
        match self {
            Downhill::To(v) => Some(v),
            Downhill::Minimum | Downhill::Boundary => None,
        }
    }
}

/// Направление стока для каждой вершины.
/// При равенстве высот побеждает сосед, стоящий раньше в списке.
#[must_use]
pub fn downhill(field: &Heightmap) -> Vec<Downhill> {
    let mesh = field.mesh();
    (0..mesh.len())
        .map(|v| {
            if mesh.is_boundary(v) {
                return Downhill::Boundary;
            }
            let mut best = Downhill::Minimum;
            let mut best_h = field[v];
            for &n in mesh.neighbors(v) {
                if field[n] < best_h {
                    best_h = field[n];
                    best = Downhill::To(n);
                }
            }
            best
        })
        .collect()
}

/// Кеш карт стока по идентификатору карты высот.
/// Управляется вызывающим; пересчёт без кеша всегда даёт тот же результат.
#[derive(Debug, Default)]
pub struct DownhillCache {
    entries: HashMap<FieldId, Vec<Downhill>>,
}

impl DownhillCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_compute(&mut self, field: &Heightmap) -> &[Downhill] {
        self.entries
            .entry(field.id())
            .or_insert_with(|| downhill(field))
    }

    /// Выбрасывает записи для карт, которые больше не нужны
    pub fn forget(&mut self, id: FieldId) {
        self.entries.remove(&id);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Накопленный сток как доля общего равномерного дождя
#[must_use]
pub fn flux(field: &Heightmap) -> Vec<f64> {
    flux_with(field, &downhill(field))
}

/// То же, что [`flux`], но с готовой картой стока
#[must_use]
pub fn flux_with(field: &Heightmap, routes: &[Downhill]) -> Vec<f64> {
    let n = field.len();
    if n == 0 {
        return Vec::new();
    }
    let mut flux = vec![1.0 / n as f64; n];

    // от вершин к низинам
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| field[b].total_cmp(&field[a]));

    for v in order {
        if let Downhill::To(target) = routes[v] {
            flux[target] += flux[v];
        }
    }
    flux
}

/// Градиент в вершине по трём соседям (правило Крамера).
/// Если соседей не ровно три или система вырождена — нулевой вектор.
#[must_use]
pub fn trislope(field: &Heightmap, v: usize) -> Point {
    let mesh = field.mesh();
    let &[n0, n1, n2] = mesh.neighbors(v) else {
        return Point::default();
    };
    let p0 = mesh.position(n0);
    let p1 = mesh.position(n1);
    let p2 = mesh.position(n2);

    let (x1, y1) = (p1.x - p0.x, p1.y - p0.y);
    let (x2, y2) = (p2.x - p0.x, p2.y - p0.y);
    let det = x1 * y2 - x2 * y1;
    let scale = (x1.abs() + x2.abs()) * (y1.abs() + y2.abs());
    if det.abs() <= f64::EPSILON * scale {
        return Point::default();
    }

    let h1 = field[n1] - field[n0];
    let h2 = field[n2] - field[n0];
    let gradient = Point::new((y2 * h1 - y1 * h2) / det, (-x2 * h1 + x1 * h2) / det);
    if gradient.x.is_finite() && gradient.y.is_finite() {
        gradient
    } else {
        Point::default()
    }
}

/// Крутизна: модуль градиента в каждой вершине
#[must_use]
pub fn slope_magnitudes(field: &Heightmap) -> Vec<f64> {
    (0..field.len()).map(|v| trislope(field, v).length()).collect()
}
