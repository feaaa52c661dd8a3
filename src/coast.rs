//! Береговая линия: чистка одиночных выступов и контур уровня моря.

use crate::heightmap::Heightmap;
use crate::paths::{Polyline, Segment, merge_segments};

/// Убирает одновершинные полуострова и заливы.
///
/// Рассматриваются только вершины ровно с тремя соседями. За итерацию два
/// полупрохода: сначала суша, у которой не больше одного соседа-суши,
/// уходит под воду на половину высоты самого высокого водного соседа;
/// затем вода, у которой не больше одного водного соседа, поднимается до
/// половины самого низкого соседа-суши.
#[must_use]
pub fn clean_coast<'m>(field: &Heightmap<'m>, iterations: usize) -> Heightmap<'m> {
    let mesh = field.mesh();
    let mut h = field.values().to_vec();

    for _ in 0..iterations {
        let mut next = h.clone();
        for v in 0..h.len() {
            let nbs = mesh.neighbors(v);
            if h[v] <= 0.0 || nbs.len() != 3 {
                continue;
            }
            let land = nbs.iter().filter(|&&n| h[n] > 0.0).count();
            if land > 1 {
                continue;
            }
            let best = nbs
                .iter()
                .map(|&n| h[n])
                .filter(|&x| x <= 0.0)
                .fold(f64::NEG_INFINITY, f64::max);
            next[v] = best / 2.0;
        }
        h = next;

        let mut next = h.clone();
        for v in 0..h.len() {
            let nbs = mesh.neighbors(v);
            if h[v] > 0.0 || nbs.len() != 3 {
                continue;
            }
            let water = nbs.iter().filter(|&&n| h[n] <= 0.0).count();
            if water > 1 {
                continue;
            }
            let best = nbs
                .iter()
                .map(|&n| h[n])
                .filter(|&x| x > 0.0)
                .fold(f64::INFINITY, f64::min);
            next[v] = best / 2.0;
        }
        h = next;
    }

    field.with_values(h)
}

/// Отрезки контура `level`: для каждого ребра, концы которого лежат по разные
/// стороны уровня, отрезок между сайтами двух его ячеек.
/// Рёбра у края карты и рёбра с одной ячейкой пропускаются.
#[must_use]
pub fn contour_segments(field: &Heightmap, level: f64) -> Vec<Segment> {
    let mesh = field.mesh();
    mesh.edges()
        .iter()
        .filter_map(|edge| {
            let right = edge.right?;
            if mesh.is_near_edge(edge.a) || mesh.is_near_edge(edge.b) {
                return None;
            }
            let (ha, hb) = (field[edge.a], field[edge.b]);
            let crosses = (ha > level && hb <= level) || (hb > level && ha <= level);
            crosses.then_some((edge.left, right))
        })
        .collect()
}

/// Береговая линия (или любая изолиния) в виде ломаных
#[must_use]
pub fn coastline(field: &Heightmap, level: f64) -> Vec<Polyline> {
    merge_segments(&contour_segments(field, level))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Extent, Point};
    use crate::mesh::Mesh;
    use crate::mesh::voronoi::ClippingTessellator;
    use rand::SeedableRng;

    fn voronoi_mesh(seed: u64) -> Mesh {
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(seed);
        Mesh::generate(400, Extent::default(), 1, &ClippingTessellator, &mut rng).unwrap()
    }

    fn interior_vertex(mesh: &Mesh) -> usize {
        mesh.nearest_vertex_where(Point::new(0.0, 0.0), |v| mesh.neighbors(v).len() == 3)
            .unwrap()
    }

    #[test]
    fn lonely_island_sinks() {
        let mesh = voronoi_mesh(2);
        let v = interior_vertex(&mesh);
        let values = (0..mesh.len()).map(|u| if u == v { 1.0 } else { -1.0 }).collect();
        let h = Heightmap::from_values(&mesh, values).unwrap();
        let cleaned = clean_coast(&h, 1);
        assert_eq!(cleaned[v], -0.5);
        assert!(cleaned.values().iter().all(|&x| x <= 0.0));
    }

    #[test]
    fn lonely_lake_is_filled() {
        let mesh = voronoi_mesh(3);
        let v = interior_vertex(&mesh);
        let values = (0..mesh.len()).map(|u| if u == v { -1.0 } else { 1.0 }).collect();
        let h = Heightmap::from_values(&mesh, values).unwrap();
        let cleaned = clean_coast(&h, 1);
        assert_eq!(cleaned[v], 0.5);
        assert!(cleaned.values().iter().all(|&x| x > 0.0));
    }

    #[test]
    fn zero_iterations_keep_values() {
        let mesh = voronoi_mesh(4);
        let h = Heightmap::cone(&mesh, -1.0).map(|x| x + 0.2);
        assert_eq!(clean_coast(&h, 0).values(), h.values());
    }

    #[test]
    fn round_island_has_closed_coast() {
        let mesh = voronoi_mesh(5);
        let h = Heightmap::cone(&mesh, -1.0).map(|x| x + 0.2);
        let coast = coastline(&h, 0.0);
        assert!(!coast.is_empty());

        let longest = coast.iter().max_by_key(|p| p.len()).unwrap();
        assert_eq!(longest.first(), longest.last());
        for p in coast.iter().flatten() {
            assert!(mesh.sites().contains(p));
            assert!((p.length() - 0.2).abs() < 0.1);
        }
    }
}
