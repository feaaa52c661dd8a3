//! Нерегулярная планарная сетка — двойственный граф диаграммы Вороного.
//!
//! Вершины сетки — вершины ячеек Вороного, рёбра — рёбра ячеек.
//! Каждая вершина помнит сайты ячеек, которые к ней примыкают.
//! После построения сетка не меняется.

pub mod points;
pub mod voronoi;

use std::collections::HashMap;

use petgraph::unionfind::UnionFind;
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{MapgenError, Result};
use crate::geometry::{Extent, Point};
use points::{generate_points, relax_points};

pub use voronoi::{ClippingTessellator, Tessellation, TessellationEdge, Tessellator};

/// Доля ширины/высоты области, в пределах которой вершина считается прикраевой
pub const NEAR_EDGE_MARGIN: f64 = 0.05;

/// Ребро сетки: две вершины и сайты ячеек по обе стороны.
/// Для рёбер на границе области `right` отсутствует.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MeshEdge {
    pub a: usize,
    pub b: usize,
    pub left: Point,
    pub right: Option<Point>,
}

#[derive(Debug, Clone)]
pub struct Mesh {
    extent: Extent,
    sites: Vec<Point>,
    vertices: Vec<Point>,
    adjacency: Vec<Vec<usize>>,
    cell_sites: Vec<Vec<Point>>,
    edges: Vec<MeshEdge>,
}

impl Mesh {
    /// Полный цикл: случайные точки, релаксация Ллойда, двойственный граф
    pub fn generate<R, T>(
        point_count: usize,
        extent: Extent,
        relax_iterations: usize,
        tessellator: &T,
        rng: &mut R,
    ) -> Result<Self>
    where
        R: Rng + ?Sized,
        T: Tessellator + ?Sized,
    {
        extent.validate()?;
        if point_count < 4 {
            return Err(MapgenError::InvalidMeshConfig(format!(
                "need at least 4 points, got {point_count}"
            )));
        }

        let points = generate_points(point_count, &extent, rng);
        debug!("Релаксация {} точек, итераций: {}", point_count, relax_iterations);
        let points = relax_points(points, &extent, relax_iterations, tessellator);
        Self::from_sites(points, extent, tessellator)
    }

    /// Строит сетку по готовым сайтам
    pub fn from_sites<T: Tessellator + ?Sized>(
        sites: Vec<Point>,
        extent: Extent,
        tessellator: &T,
    ) -> Result<Self> {
        extent.validate()?;
        let mut distinct: Vec<(u64, u64)> = sites.iter().map(|p| p.key()).collect();
        distinct.sort_unstable();
        distinct.dedup();
        if distinct.len() < 4 {
            return Err(MapgenError::InvalidMeshConfig(format!(
                "need at least 4 distinct points, got {}",
                distinct.len()
            )));
        }
        if sites.iter().any(|p| !(p.x.is_finite() && p.y.is_finite())) {
            return Err(MapgenError::InvalidMeshConfig(
                "sites must have finite coordinates".into(),
            ));
        }

        let tessellation = tessellator.tessellate(&sites, &extent);
        Self::build(extent, sites, &tessellation.edges)
    }

    /// Строит сетку напрямую из рёбер тесселяции
    pub fn from_edges(extent: Extent, edges: &[TessellationEdge]) -> Result<Self> {
        extent.validate()?;
        Self::build(extent, Vec::new(), edges)
    }

    fn build(extent: Extent, sites: Vec<Point>, tess_edges: &[TessellationEdge]) -> Result<Self> {
        let mut mesh = Mesh {
            extent,
            sites,
            vertices: Vec::new(),
            adjacency: Vec::new(),
            cell_sites: Vec::new(),
            edges: Vec::with_capacity(tess_edges.len()),
        };
        let mut ids: HashMap<(u64, u64), usize> = HashMap::new();

        for edge in tess_edges {
            let a = mesh.intern(&mut ids, edge.start);
            let b = mesh.intern(&mut ids, edge.end);
            if a == b {
                continue;
            }

            for v in [a, b] {
                mesh.touch(v, edge.left);
                if let Some(right) = edge.right {
                    mesh.touch(v, right);
                }
            }

            if mesh.adjacency[a].contains(&b) {
                continue;
            }
            mesh.adjacency[a].push(b);
            mesh.adjacency[b].push(a);
            mesh.edges.push(MeshEdge {
                a,
                b,
                left: edge.left,
                right: edge.right,
            });
        }

        if mesh.vertices.len() < 4 {
            return Err(MapgenError::InvalidMeshConfig(format!(
                "tessellation produced only {} vertices",
                mesh.vertices.len()
            )));
        }

        info!(
            "Сетка: {} вершин, {} рёбер, компонент связности: {}",
            mesh.vertices.len(),
            mesh.edges.len(),
            mesh.component_count()
        );
        Ok(mesh)
    }

    fn intern(&mut self, ids: &mut HashMap<(u64, u64), usize>, p: Point) -> usize {
        *ids.entry(p.key()).or_insert_with(|| {
            self.vertices.push(p);
            self.adjacency.push(Vec::new());
            self.cell_sites.push(Vec::new());
            self.vertices.len() - 1
        })
    }

    fn touch(&mut self, v: usize, site: Point) {
        let touching = &mut self.cell_sites[v];
        if !touching.iter().any(|s| s.key() == site.key()) {
            touching.push(site);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    #[must_use]
    pub fn extent(&self) -> &Extent {
        &self.extent
    }

    /// Сайты после релаксации (пусто, если сетка собрана из рёбер)
    #[must_use]
    pub fn sites(&self) -> &[Point] {
        &self.sites
    }

    #[must_use]
    pub fn position(&self, v: usize) -> Point {
        self.vertices[v]
    }

    #[must_use]
    pub fn positions(&self) -> &[Point] {
        &self.vertices
    }

    #[must_use]
    pub fn neighbors(&self, v: usize) -> &[usize] {
        &self.adjacency[v]
    }

    /// Сайты ячеек, примыкающих к вершине
    #[must_use]
    pub fn cell_sites(&self, v: usize) -> &[Point] {
        &self.cell_sites[v]
    }

    #[must_use]
    pub fn edges(&self) -> &[MeshEdge] {
        &self.edges
    }

    /// Граничная вершина: меньше трёх соседей
    #[must_use]
    pub fn is_boundary(&self, v: usize) -> bool {
        self.adjacency[v].len() < 3
    }

    #[must_use]
    pub fn is_near_edge(&self, v: usize) -> bool {
        self.extent.is_near_side(self.vertices[v], NEAR_EDGE_MARGIN)
    }

    #[must_use]
    pub fn distance(&self, a: usize, b: usize) -> f64 {
        self.vertices[a].distance(self.vertices[b])
    }

    /// Ближайшая к точке вершина, удовлетворяющая фильтру
    pub fn nearest_vertex_where<F>(&self, p: Point, mut accept: F) -> Option<usize>
    where
        F: FnMut(usize) -> bool,
    {
        (0..self.vertices.len())
            .filter(|&v| accept(v))
            .min_by(|&a, &b| {
                p.distance(self.vertices[a])
                    .total_cmp(&p.distance(self.vertices[b]))
            })
    }

    #[must_use]
    pub fn nearest_vertex(&self, p: Point) -> Option<usize> {
        self.nearest_vertex_where(p, |_| true)
    }

    /// Метка компоненты связности для каждой вершины
    #[must_use]
    pub fn components(&self) -> Vec<usize> {
        let mut sets = UnionFind::<usize>::new(self.vertices.len());
        for edge in &self.edges {
            sets.union(edge.a, edge.b);
        }
        sets.into_labeling()
    }

    #[must_use]
    pub fn component_count(&self) -> usize {
        let mut labels = self.components();
        labels.sort_unstable();
        labels.dedup();
        labels.len()
    }
}
