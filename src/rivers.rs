//! Реки: цепочки стока с достаточным накопленным потоком.

use crate::heightmap::Heightmap;
use crate::hydrology::{Downhill, downhill, flux_with};
use crate::paths::{Polyline, Segment, merge_segments, relax_path};

/// Отрезки рек до склейки.
///
/// Порог `threshold_fraction` умножается на долю суши: на маленьком острове
/// реке хватает меньшего потока. Отрезок идёт из вершины к её стоку, если
/// вершина над водой, не у края карты и поток через неё выше порога. Устье
/// (сток под водой) обрезается на середине ребра.
#[must_use]
pub fn river_segments(field: &Heightmap, threshold_fraction: f64) -> Vec<Segment> {
    let mesh = field.mesh();
    let routes = downhill(field);
    let flux = flux_with(field, &routes);
    let limit = threshold_fraction * field.land_fraction();

    let mut segments = Vec::new();
    for v in 0..mesh.len() {
        if mesh.is_near_edge(v) || field[v] <= 0.0 || flux[v] <= limit {
            continue;
        }
        let Downhill::To(target) = routes[v] else {
            continue;
        };
        let up = mesh.position(v);
        let mut down = mesh.position(target);
        if field[target] <= 0.0 {
            down = up.midpoint(down);
        }
        segments.push((up, down));
    }
    segments
}

/// Реки в виде сглаженных ломаных
#[must_use]
pub fn generate_rivers(field: &Heightmap, threshold_fraction: f64) -> Vec<Polyline> {
    merge_segments(&river_segments(field, threshold_fraction))
        .iter()
        .map(|path| relax_path(path))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Extent, Point};
    use crate::hydrology::{FillSinksOptions, fill_sinks};
    use crate::mesh::Mesh;
    use crate::mesh::tests::cross_mesh;
    use crate::mesh::voronoi::ClippingTessellator;
    use rand::SeedableRng;

    fn path_length(path: &[Point]) -> f64 {
        path.windows(2).map(|w| w[0].distance(w[1])).sum()
    }

    #[test]
    fn cross_mesh_has_no_rivers_at_the_edge() {
        // лучи креста граничные, сток есть только у центра
        let mesh = cross_mesh();
        let h = Heightmap::from_values(&mesh, vec![0.5, 0.2, 0.8, -0.1, 0.9]).unwrap();
        let segments = river_segments(&h, 0.0);
        assert_eq!(segments.len(), 1);
        let (from, to) = segments[0];
        assert_eq!(from, mesh.position(0));
        // сток под водой: устье на середине ребра
        assert_eq!(to, mesh.position(0).midpoint(mesh.position(3)));
    }

    #[test]
    fn rivers_start_above_water() {
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(31);
        let mesh = Mesh::generate(600, Extent::default(), 1, &ClippingTessellator, &mut rng).unwrap();
        let island = Heightmap::add(&[
            &Heightmap::cone(&mesh, -1.5),
            &Heightmap::mountains(&mesh, 10, 0.1, &mut rng),
        ])
        .unwrap()
        .map(|h| h + 0.4);
        let h = fill_sinks(&island, &FillSinksOptions::default()).unwrap();

        let segments = river_segments(&h, 0.01);
        assert!(!segments.is_empty());
        for (from, _) in &segments {
            let v = mesh.nearest_vertex(*from).unwrap();
            assert!(h[v] > 0.0);
            assert!(!mesh.is_near_edge(v));
        }

        let rivers = generate_rivers(&h, 0.01);
        assert!(rivers.iter().all(|r| r.len() >= 2));
        let total: f64 = rivers.iter().map(|r| path_length(r)).sum();
        assert!(total > 0.0);
    }

    #[test]
    fn dry_map_has_no_rivers() {
        let mesh = cross_mesh();
        let h = Heightmap::from_values(&mesh, vec![-0.5, -0.2, -0.8, -0.1, -0.9]).unwrap();
        assert!(generate_rivers(&h, 0.0).is_empty());
    }
}
