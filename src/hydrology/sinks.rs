use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{MapgenError, Result};
use crate::heightmap::Heightmap;

/// Стартовая высота вершин, ещё не нашедших сток
pub const SINK_CEILING: f64 = f64::INFINITY;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FillSinksOptions {
    /// Минимальный перепад, гарантирующий строгий спуск к стоку
    pub epsilon: f64,
    /// Предел числа проходов. `None` — число вершин + 2: каждый проход
    /// фиксирует как минимум ещё один шаг кратчайшего пути к краю карты.
    pub max_passes: Option<usize>,
}

impl Default for FillSinksOptions {
    fn default() -> Self {
        Self {
            epsilon: 1e-5,
            max_passes: None,
        }
    }
}

impl FillSinksOptions {
    #[must_use]
    pub fn pass_limit(&self, vertex_count: usize) -> usize {
        self.max_passes.unwrap_or(vertex_count + 2)
    }
}

/// Заполняет впадины, пока вода из каждой внутренней вершины не сможет
/// стечь к краю карты.
///
/// Прикраевые вершины сохраняют высоту, остальные стартуют с
/// [`SINK_CEILING`]. Проходы повторяются, пока что-то меняется:
/// - если собственная высота вершины не ниже `сосед + epsilon`, вершина
///   возвращается к собственной высоте (сток найден);
/// - иначе, если `сосед + epsilon` лежит между собственной высотой и
///   текущим значением, вершина опускается до него.
///
/// Обновления видны в том же проходе. Если за `pass_limit` проходов
/// равновесие не достигнуто — `SinkFillDidNotConverge`.
pub fn fill_sinks<'m>(field: &Heightmap<'m>, options: &FillSinksOptions) -> Result<Heightmap<'m>> {
    let mesh = field.mesh();
    let h = field.values();
    let eps = options.epsilon;
    let limit = options.pass_limit(mesh.len());

    let mut filled: Vec<f64> = (0..mesh.len())
        .map(|v| {
            if mesh.is_near_edge(v) {
                h[v]
            } else {
                SINK_CEILING
            }
        })
        .collect();

    for pass in 1..=limit {
        let mut changed = false;
        for v in 0..h.len() {
            if filled[v] == h[v] {
                continue;
            }
            for &n in mesh.neighbors(v) {
                let outlet = filled[n] + eps;
                if h[v] >= outlet {
                    filled[v] = h[v];
                    changed = true;
                    break;
                }
                if filled[v] > outlet && outlet > h[v] {
                    filled[v] = outlet;
                    changed = true;
                }
            }
        }
        if !changed {
            debug!("Впадины заполнены за {} проходов", pass);
            return Heightmap::from_values(mesh, filled);
        }
    }

    warn!("Заполнение впадин не сошлось за {} проходов", limit);
    Err(MapgenError::SinkFillDidNotConverge { passes: limit })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Extent, Point};
    use crate::hydrology::{Downhill, downhill};
    use crate::mesh::Mesh;
    use crate::mesh::voronoi::ClippingTessellator;
    use rand::SeedableRng;

    fn voronoi_mesh(points: usize, seed: u64) -> Mesh {
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(seed);
        Mesh::generate(points, Extent::default(), 1, &ClippingTessellator, &mut rng).unwrap()
    }

    #[test]
    fn filled_surface_has_no_interior_minima() {
        let mesh = voronoi_mesh(400, 17);
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(99);
        let bumps = Heightmap::mountains(&mesh, 20, 0.05, &mut rng);
        let bowl = Heightmap::cone(&mesh, 1.0);
        let h = Heightmap::add(&[&bumps, &bowl]).unwrap();

        let filled = fill_sinks(&h, &FillSinksOptions::default()).unwrap();
        for (v, route) in downhill(&filled).into_iter().enumerate() {
            if mesh.is_near_edge(v) {
                continue;
            }
            assert_ne!(route, Downhill::Minimum, "vertex {v} is still a sink");
        }
    }

    #[test]
    fn filling_never_lowers_terrain() {
        let mesh = voronoi_mesh(300, 5);
        let h = Heightmap::cone(&mesh, 1.0);
        let filled = fill_sinks(&h, &FillSinksOptions::default()).unwrap();
        for v in 0..mesh.len() {
            assert!(filled[v] >= h[v]);
            if mesh.is_near_edge(v) {
                assert_eq!(filled[v], h[v]);
            }
        }
        // дно конуса в центре поднялось
        let center = mesh.nearest_vertex(Point::new(0.0, 0.0)).unwrap();
        assert!(filled[center] > h[center]);
    }

    #[test]
    fn drained_surface_is_unchanged() {
        // крутой перевёрнутый конус уже стекает к краям
        let mesh = voronoi_mesh(300, 6);
        let h = Heightmap::cone(&mesh, -100.0);
        let filled = fill_sinks(&h, &FillSinksOptions::default()).unwrap();
        assert_eq!(filled.values(), h.values());
    }

    #[test]
    fn huge_relief_is_filled() {
        let mesh = voronoi_mesh(300, 8);
        let h = Heightmap::cone(&mesh, 1.0).scale(1e7);
        let filled = fill_sinks(&h, &FillSinksOptions::default()).unwrap();
        assert!(filled.values().iter().all(|x| x.is_finite()));
        for (v, route) in downhill(&filled).into_iter().enumerate() {
            if !mesh.is_near_edge(v) {
                assert_ne!(route, Downhill::Minimum, "vertex {v} is still a sink");
            }
        }
    }

    #[test]
    fn pass_limit_is_reported() {
        let mesh = voronoi_mesh(300, 7);
        let h = Heightmap::cone(&mesh, 1.0);
        let options = FillSinksOptions {
            max_passes: Some(1),
            ..FillSinksOptions::default()
        };
        assert!(matches!(
            fill_sinks(&h, &options),
            Err(MapgenError::SinkFillDidNotConverge { passes: 1 })
        ));
        assert_eq!(FillSinksOptions::default().pass_limit(10), 12);
    }
}
