//! Карта высот на вершинах сетки и её алгебра.
//!
//! Все операции чистые: возвращают новую карту на той же сетке.
//! У каждой карты свой [`FieldId`], по нему кешируются производные
//! данные (см. `hydrology::DownhillCache`).

use std::ops::Index;
use std::sync::atomic::{AtomicU64, Ordering};

use fastnoise_lite::{FastNoiseLite, FractalType, NoiseType};
use rand::Rng;
use rand_distr::Normal;

use crate::error::{MapgenError, Result};
use crate::geometry::Point;
use crate::mesh::Mesh;

static NEXT_FIELD_ID: AtomicU64 = AtomicU64::new(1);

/// Идентификатор конкретного набора значений карты высот
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(u64);

impl FieldId {
    fn fresh() -> Self {
        Self(NEXT_FIELD_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Высота в каждой вершине сетки. Ноль — уровень моря.
#[derive(Debug, Clone)]
pub struct Heightmap<'m> {
    mesh: &'m Mesh,
    data: Vec<f64>,
    id: FieldId,
}

impl<'m> Heightmap<'m> {
    pub fn from_values(mesh: &'m Mesh, data: Vec<f64>) -> Result<Self> {
        if data.len() != mesh.len() {
            return Err(MapgenError::FieldMismatch(format!(
                "mesh has {} vertices, got {} values",
                mesh.len(),
                data.len()
            )));
        }
        Ok(Self::wrap(mesh, data))
    }

    fn wrap(mesh: &'m Mesh, data: Vec<f64>) -> Self {
        Self {
            mesh,
            data,
            id: FieldId::fresh(),
        }
    }

    fn from_fn(mesh: &'m Mesh, f: impl FnMut(usize) -> f64) -> Self {
        Self::wrap(mesh, (0..mesh.len()).map(f).collect())
    }

    /// Новая карта на той же сетке; длина `data` совпадает по построению
    pub(crate) fn with_values(&self, data: Vec<f64>) -> Self {
        debug_assert_eq!(data.len(), self.data.len());
        Self::wrap(self.mesh, data)
    }

    #[must_use]
    pub fn zero(mesh: &'m Mesh) -> Self {
        Self::wrap(mesh, vec![0.0; mesh.len()])
    }

    /// Линейный наклон: скалярное произведение позиции на `direction`
    #[must_use]
    pub fn slope(mesh: &'m Mesh, direction: Point) -> Self {
        Self::from_fn(mesh, |v| mesh.position(v).dot(direction))
    }

    /// Конус от начала координат: `s * |p|`
    #[must_use]
    pub fn cone(mesh: &'m Mesh, s: f64) -> Self {
        Self::from_fn(mesh, |v| s * mesh.position(v).length())
    }

    /// `n` гор в случайных точках области. Каждая гора — квадрат гауссианы
    /// радиуса `r`, вклады складываются.
    pub fn mountains<R: Rng + ?Sized>(mesh: &'m Mesh, n: usize, r: f64, rng: &mut R) -> Self {
        let peaks: Vec<Point> = (0..n).map(|_| mesh.extent().random_point(rng)).collect();
        let spread = 2.0 * r * r;
        Self::from_fn(mesh, |v| {
            let p = mesh.position(v);
            peaks
                .iter()
                .map(|m| {
                    let d2 = (p.x - m.x).powi(2) + (p.y - m.y).powi(2);
                    (-d2 / spread).exp().powi(2)
                })
                .sum()
        })
    }

    /// Фрактальный шум OpenSimplex2 в диапазоне примерно `[-1, 1]`
    #[must_use]
    pub fn noise(mesh: &'m Mesh, seed: u64, frequency: f64, octaves: i32) -> Self {
        let mut noise = FastNoiseLite::new();
        noise.set_seed(Some(seed as i32));
        noise.set_noise_type(Some(NoiseType::OpenSimplex2));
        noise.set_fractal_type(Some(FractalType::FBm));
        noise.set_fractal_octaves(Some(octaves.max(1)));
        noise.set_frequency(Some(frequency as f32));

        Self::from_fn(mesh, |v| {
            let p = mesh.position(v);
            f64::from(noise.get_noise_2d(p.x as f32, p.y as f32))
        })
    }

    /// Поэлементная сумма. Все слагаемые обязаны лежать на одной сетке.
    pub fn add(fields: &[&Heightmap<'m>]) -> Result<Self> {
        let Some((first, rest)) = fields.split_first() else {
            return Err(MapgenError::InvalidParameter(
                "add needs at least one field".into(),
            ));
        };
        let mut data = first.data.clone();
        for field in rest {
            if !std::ptr::eq(first.mesh, field.mesh) {
                return Err(MapgenError::FieldMismatch(
                    "fields are bound to different meshes".into(),
                ));
            }
            if field.data.len() != data.len() {
                return Err(MapgenError::FieldMismatch(format!(
                    "expected {} values, got {}",
                    data.len(),
                    field.data.len()
                )));
            }
            for (acc, value) in data.iter_mut().zip(&field.data) {
                *acc += value;
            }
        }
        Ok(Self::wrap(first.mesh, data))
    }

    #[must_use]
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self::wrap(self.mesh, self.data.iter().map(|&h| f(h)).collect())
    }

    #[must_use]
    pub fn scale(&self, factor: f64) -> Self {
        self.map(|h| h * factor)
    }

    /// Линейно в `[0, 1]`. Плоская карта превращается в нули.
    #[must_use]
    pub fn normalize(&self) -> Self {
        let lo = self.min();
        let hi = self.max();
        let range = hi - lo;
        if !(range > 0.0 && range.is_finite()) {
            return Self::zero(self.mesh);
        }
        self.map(|h| (h - lo) / range)
    }

    /// `sqrt(normalize(h))`: равнины проседают, рельеф становится резче
    #[must_use]
    pub fn peaky(&self) -> Self {
        self.normalize().map(f64::sqrt)
    }

    /// Среднее по соседям; граничные вершины обнуляются
    #[must_use]
    pub fn relax(&self) -> Self {
        Self::from_fn(self.mesh, |v| {
            if self.mesh.is_boundary(v) {
                return 0.0;
            }
            let nbs = self.mesh.neighbors(v);
            nbs.iter().map(|&n| self.data[n]).sum::<f64>() / nbs.len() as f64
        })
    }

    /// Квантиль с линейной интерполяцией между порядковыми статистиками
    #[must_use]
    pub fn quantile(&self, q: f64) -> f64 {
        let mut sorted = self.data.clone();
        sorted.sort_by(f64::total_cmp);
        let n = sorted.len();
        if n == 0 {
            return 0.0;
        }
        if q <= 0.0 || n < 2 {
            return sorted[0];
        }
        if q >= 1.0 {
            return sorted[n - 1];
        }
        let i = (n - 1) as f64 * q;
        let i0 = i.floor() as usize;
        let v0 = sorted[i0];
        v0 + (sorted[i0 + 1] - v0) * (i - i0 as f64)
    }

    /// Сдвигает карту так, что доля `q` вершин оказывается под водой
    #[must_use]
    pub fn set_sea_level(&self, q: f64) -> Self {
        let delta = self.quantile(q);
        self.map(|h| h - delta)
    }

    #[must_use]
    pub fn min(&self) -> f64 {
        self.data.iter().copied().fold(f64::INFINITY, f64::min)
    }

    #[must_use]
    pub fn max(&self) -> f64 {
        self.data.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Доля вершин выше уровня моря
    #[must_use]
    pub fn land_fraction(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().filter(|&&h| h > 0.0).count() as f64 / self.data.len() as f64
    }

    #[must_use]
    pub fn mesh(&self) -> &'m Mesh {
        self.mesh
    }

    #[must_use]
    pub fn id(&self) -> FieldId {
        self.id
    }

    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.data
    }

    #[must_use]
    pub fn into_values(self) -> Vec<f64> {
        self.data
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Index<usize> for Heightmap<'_> {
    type Output = f64;

    fn index(&self, v: usize) -> &f64 {
        &self.data[v]
    }
}

/// Случайный вектор с нормально распределёнными компонентами
pub fn random_vector<R: Rng + ?Sized>(scale: f64, rng: &mut R) -> Result<Point> {
    let normal = Normal::new(0.0, scale).map_err(|e| {
        MapgenError::InvalidParameter(format!("random vector scale {scale}: {e}"))
    })?;
    Ok(Point::new(rng.sample(normal), rng.sample(normal)))
}
