//! Тесселяция Вороного как внешний примитив.
//!
//! Построитель сетки знает только трейт [`Tessellator`]. Здесь же лежит
//! [`ClippingTessellator`]: каждая ячейка строится отсечением прямоугольника
//! области полуплоскостями серединных перпендикуляров к ближайшим сайтам.
//! Соседей ищем по равномерной сетке корзин, кольцами от ячейки сайта.

use crate::geometry::{Extent, Point};

/// Ребро тесселяции: два конца и сайты по обе стороны.
/// У рёбер на границе области правого сайта нет.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TessellationEdge {
    pub start: Point,
    pub end: Point,
    pub left: Point,
    pub right: Option<Point>,
}

#[derive(Debug, Clone, Default)]
pub struct Tessellation {
    /// Многоугольник ячейки для каждого входного сайта (в том же порядке)
    pub cells: Vec<Vec<Point>>,
    pub edges: Vec<TessellationEdge>,
}

pub trait Tessellator {
    fn tessellate(&self, sites: &[Point], extent: &Extent) -> Tessellation;
}

/// Что ограничивает ребро ячейки: сторона области или соседний сайт
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Constraint {
    Side(u8),
    Site(usize),
}

// Стороны прямоугольника против часовой стрелки: низ, право, верх, лево.
const BOTTOM: u8 = 0;
const RIGHT: u8 = 1;
const TOP: u8 = 2;
const LEFT: u8 = 3;

#[derive(Debug, Clone, Copy, Default)]
pub struct ClippingTessellator;

impl Tessellator for ClippingTessellator {
    fn tessellate(&self, sites: &[Point], extent: &Extent) -> Tessellation {
        let grid = BucketGrid::new(sites, extent);
        let mut tessellation = Tessellation {
            cells: Vec::with_capacity(sites.len()),
            edges: Vec::with_capacity(sites.len() * 3),
        };

        for (i, &site) in sites.iter().enumerate() {
            let polygon = clip_cell(i, sites, extent, &grid);
            let n = polygon.len();

            let corners: Vec<Point> = (0..n)
                .map(|k| {
                    let (raw, outgoing) = polygon[k];
                    let (_, incoming) = polygon[(k + n - 1) % n];
                    canonical_vertex(i, incoming, outgoing, sites, extent).unwrap_or(raw)
                })
                .collect();

            for k in 0..n {
                let start = corners[k];
                let end = corners[(k + 1) % n];
                if start.key() == end.key() {
                    continue;
                }
                match polygon[k].1 {
                    Constraint::Site(j) if i < j => tessellation.edges.push(TessellationEdge {
                        start,
                        end,
                        left: site,
                        right: Some(sites[j]),
                    }),
                    Constraint::Site(_) => {}
                    Constraint::Side(_) => tessellation.edges.push(TessellationEdge {
                        start,
                        end,
                        left: site,
                        right: None,
                    }),
                }
            }

            tessellation.cells.push(corners);
        }

        tessellation
    }
}

/// Равномерная сетка корзин примерно по одному сайту на корзину
struct BucketGrid {
    origin: Point,
    cell_size: f64,
    cols: usize,
    rows: usize,
    buckets: Vec<Vec<usize>>,
}

impl BucketGrid {
    fn new(sites: &[Point], extent: &Extent) -> Self {
        let area = extent.width * extent.height;
        let cell_size = (area / sites.len().max(1) as f64).sqrt();
        let cols = ((extent.width / cell_size).ceil() as usize).max(1);
        let rows = ((extent.height / cell_size).ceil() as usize).max(1);
        let mut grid = Self {
            origin: Point::new(extent.min_x(), extent.min_y()),
            cell_size,
            cols,
            rows,
            buckets: vec![Vec::new(); cols * rows],
        };
        for (i, &p) in sites.iter().enumerate() {
            let (cx, cy) = grid.bucket_of(p);
            grid.buckets[cy * cols + cx].push(i);
        }
        grid
    }

    fn bucket_of(&self, p: Point) -> (usize, usize) {
        let cx = ((p.x - self.origin.x) / self.cell_size).floor().max(0.0) as usize;
        let cy = ((p.y - self.origin.y) / self.cell_size).floor().max(0.0) as usize;
        (cx.min(self.cols - 1), cy.min(self.rows - 1))
    }

    /// Сайты в корзинах на чебышёвском расстоянии ровно `ring` от `(cx, cy)`
    fn ring(&self, cx: usize, cy: usize, ring: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let (cx, cy, r) = (cx as i64, cy as i64, ring as i64);
        for y in (cy - r)..=(cy + r) {
            if y < 0 || y >= self.rows as i64 {
                continue;
            }
            for x in (cx - r)..=(cx + r) {
                if x < 0 || x >= self.cols as i64 {
                    continue;
                }
                if (x - cx).abs() != r && (y - cy).abs() != r {
                    continue;
                }
                out.extend_from_slice(&self.buckets[y as usize * self.cols + x as usize]);
            }
        }
        out
    }
}

fn clip_cell(
    i: usize,
    sites: &[Point],
    extent: &Extent,
    grid: &BucketGrid,
) -> Vec<(Point, Constraint)> {
    let site = sites[i];
    let mut polygon = vec![
        (Point::new(extent.min_x(), extent.min_y()), Constraint::Side(BOTTOM)),
        (Point::new(extent.max_x(), extent.min_y()), Constraint::Side(RIGHT)),
        (Point::new(extent.max_x(), extent.max_y()), Constraint::Side(TOP)),
        (Point::new(extent.min_x(), extent.max_y()), Constraint::Side(LEFT)),
    ];

    let (cx, cy) = grid.bucket_of(site);
    let max_ring = grid.cols.max(grid.rows);

    for ring in 0..=max_ring {
        let mut candidates = grid.ring(cx, cy, ring);
        candidates.retain(|&j| j != i && sites[j].key() != site.key());
        candidates.sort_by(|&a, &b| {
            site.distance(sites[a])
                .total_cmp(&site.distance(sites[b]))
                .then(a.cmp(&b))
        });

        for j in candidates {
            polygon = clip_polygon(&polygon, site, sites[j], Constraint::Site(j));
            if polygon.is_empty() {
                return polygon;
            }
        }

        let radius = polygon
            .iter()
            .map(|(p, _)| site.distance(*p))
            .fold(0.0, f64::max);
        if ring as f64 * grid.cell_size >= 2.0 * radius {
            break;
        }
    }

    polygon
}

/// Sutherland–Hodgman для одной полуплоскости «ближе к `site`, чем к `other`».
/// Метка при вершине описывает ребро, выходящее из неё.
fn clip_polygon(
    polygon: &[(Point, Constraint)],
    site: Point,
    other: Point,
    label: Constraint,
) -> Vec<(Point, Constraint)> {
    let mid = site.midpoint(other);
    let normal = Point::new(other.x - site.x, other.y - site.y);
    let side = |p: Point| Point::new(p.x - mid.x, p.y - mid.y).dot(normal);

    if polygon.iter().all(|(p, _)| side(*p) <= 0.0) {
        return polygon.to_vec();
    }

    let n = polygon.len();
    let mut out = Vec::with_capacity(n + 1);
    for k in 0..n {
        let (cur, cur_label) = polygon[k];
        let (next, _) = polygon[(k + 1) % n];
        let dc = side(cur);
        let dn = side(next);
        if dc <= 0.0 {
            out.push((cur, cur_label));
            if dn > 0.0 {
                out.push((intersect(cur, next, dc, dn), label));
            }
        } else if dn <= 0.0 {
            out.push((intersect(cur, next, dc, dn), cur_label));
        }
    }

    // Совпадающие соседние вершины: оставляем вторую, её метка описывает
    // реальное выходящее ребро.
    let mut k = 0;
    while out.len() > 1 && k < out.len() {
        let next = (k + 1) % out.len();
        if out[k].0.key() == out[next].0.key() {
            out.remove(k);
        } else {
            k += 1;
        }
    }
    if out.len() < 3 {
        out.clear();
    }
    out
}

fn intersect(a: Point, b: Point, da: f64, db: f64) -> Point {
    if da == 0.0 {
        return a;
    }
    if db == 0.0 {
        return b;
    }
    let t = da / (da - db);
    Point::new(a.x + t * (b.x - a.x), a.y + t * (b.y - a.y))
}

/// Позиция вершины, вычисленная только из её ограничений.
/// Соседние ячейки получают побитово одинаковую точку, что нужно
/// для склейки вершин по совпадению позиций.
fn canonical_vertex(
    site: usize,
    incoming: Constraint,
    outgoing: Constraint,
    sites: &[Point],
    extent: &Extent,
) -> Option<Point> {
    if incoming == outgoing {
        return None;
    }
    let mut key = [Constraint::Site(site), incoming, outgoing];
    key.sort_unstable();

    let point = match key {
        [Constraint::Side(a), Constraint::Side(b), Constraint::Site(_)] => corner(a, b, extent)?,
        [Constraint::Side(s), Constraint::Site(a), Constraint::Site(b)] => {
            bisector_on_side(sites[a], sites[b], s, extent)?
        }
        [Constraint::Site(a), Constraint::Site(b), Constraint::Site(c)] => {
            circumcenter(sites[a], sites[b], sites[c])?
        }
        _ => return None,
    };
    (point.x.is_finite() && point.y.is_finite()).then_some(point)
}

fn corner(a: u8, b: u8, extent: &Extent) -> Option<Point> {
    let (x, y) = match (a, b) {
        (BOTTOM, RIGHT) => (extent.max_x(), extent.min_y()),
        (RIGHT, TOP) => (extent.max_x(), extent.max_y()),
        (TOP, LEFT) => (extent.min_x(), extent.max_y()),
        (BOTTOM, LEFT) => (extent.min_x(), extent.min_y()),
        _ => return None,
    };
    Some(Point::new(x, y))
}

fn bisector_on_side(a: Point, b: Point, side: u8, extent: &Extent) -> Option<Point> {
    let mid = a.midpoint(b);
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    match side {
        BOTTOM | TOP => {
            if dx == 0.0 {
                return None;
            }
            let y = if side == BOTTOM {
                extent.min_y()
            } else {
                extent.max_y()
            };
            Some(Point::new(mid.x - (y - mid.y) * dy / dx, y))
        }
        _ => {
            if dy == 0.0 {
                return None;
            }
            let x = if side == LEFT {
                extent.min_x()
            } else {
                extent.max_x()
            };
            Some(Point::new(x, mid.y - (x - mid.x) * dx / dy))
        }
    }
}

fn circumcenter(a: Point, b: Point, c: Point) -> Option<Point> {
    let d = 2.0 * (a.x * (b.y - c.y) + b.x * (c.y - a.y) + c.x * (a.y - b.y));
    if d == 0.0 {
        return None;
    }
    let a2 = a.dot(a);
    let b2 = b.dot(b);
    let c2 = c.dot(c);
    Some(Point::new(
        (a2 * (b.y - c.y) + b2 * (c.y - a.y) + c2 * (a.y - b.y)) / d,
        (a2 * (c.x - b.x) + b2 * (a.x - c.x) + c2 * (b.x - a.x)) / d,
    ))
}
