use rand::Rng;

use crate::geometry::{Extent, Point};
use crate::mesh::voronoi::Tessellator;

/// Равномерно случайные точки в области
pub fn generate_points<R: Rng + ?Sized>(count: usize, extent: &Extent, rng: &mut R) -> Vec<Point> {
    (0..count).map(|_| extent.random_point(rng)).collect()
}

/// Релаксация Ллойда: каждая точка заменяется центроидом своей ячейки.
///
/// Пара итераций убирает скопления, но сохраняет нерегулярность сетки.
/// Точка с вырожденной (пустой) ячейкой остаётся на месте.
#[must_use]
pub fn relax_points<T: Tessellator + ?Sized>(
    points: Vec<Point>,
    extent: &Extent,
    iterations: usize,
    tessellator: &T,
) -> Vec<Point> {
    let mut points = points;
    for _ in 0..iterations {
        let tessellation = tessellator.tessellate(&points, extent);
        points = points
            .iter()
            .zip(&tessellation.cells)
            .map(|(&p, cell)| Point::centroid(cell).unwrap_or(p))
            .collect();
    }
    points
}
