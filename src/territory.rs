//! Территории: многоисточниковое расширение от столиц по взвешенному графу.
//!
//! Дешевле всего идти по суше поперёк склона, дорого пересекать реки и
//! очень дорого береговую линию. Очередь с приоритетом подключается через
//! трейт [`PriorityQueue`]; устаревшие записи отбрасываются при извлечении,
//! а первое назначение вершины окончательно.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::heightmap::Heightmap;
use crate::paths::{Polyline, Segment, merge_segments, relax_path};

/// Цена перехода между сушей и морем
pub const COAST_CROSSING_COST: f64 = 1000.0;
/// Множитель пути из-под воды
pub const SEA_TRAVEL_FACTOR: f64 = 100.0;
/// Множитель штрафа за пересечение реки: `RIVER_PENALTY * sqrt(flux)`
pub const RIVER_PENALTY: f64 = 100.0;

/// Очередь с приоритетом по минимальной оценке.
/// Должна допускать несколько записей для одного и того же элемента.
pub trait PriorityQueue<T> {
    fn push(&mut self, score: f64, item: T);
    fn pop_min(&mut self) -> Option<(f64, T)>;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Двоичная куча; при равных оценках первым выходит вставленный раньше
#[derive(Debug)]
pub struct MinQueue<T> {
    heap: BinaryHeap<QueueEntry<T>>,
    next_seq: u64,
}

impl<T> Default for MinQueue<T> {
    fn default() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }
}

impl<T> MinQueue<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T> PriorityQueue<T> for MinQueue<T> {
    fn push(&mut self, score: f64, item: T) {
        self.heap.push(QueueEntry {
            score,
            seq: self.next_seq,
            item,
        });
        self.next_seq += 1;
    }

    fn pop_min(&mut self) -> Option<(f64, T)> {
        self.heap.pop().map(|entry| (entry.score, entry.item))
    }

    fn len(&self) -> usize {
        self.heap.len()
    }
}

#[derive(Debug)]
struct QueueEntry<T> {
    score: f64,
    seq: u64,
    item: T,
}

impl<T> PartialEq for QueueEntry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for QueueEntry<T> {}

impl<T> PartialOrd for QueueEntry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for QueueEntry<T> {
    // BinaryHeap — max-куча, поэтому порядок обратный
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Ожидающее назначение: вершина `target` от столицы `city`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Claim {
    pub target: usize,
    pub city: usize,
}

/// Стоимость шага из `u` в соседа `v`.
///
/// `flux` — накопленный сток той же карты высот; `u` и `v` должны быть
/// вершинами её сетки.
#[must_use]
pub fn weight(field: &Heightmap, flux: &[f64], u: usize, v: usize) -> f64 {
    let mesh = field.mesh();
    if (field[u] > 0.0) != (field[v] > 0.0) {
        return COAST_CROSSING_COST;
    }

    let horiz = mesh.distance(u, v);
    let mut vert = field[v] - field[u];
    if vert > 0.0 {
        vert /= 10.0;
    }

    let mut diff = 1.0 + RIVER_PENALTY * flux[u].sqrt();
    // совпадающие вершины: уклон не определён, считаем ровным
    if horiz > f64::EPSILON {
        diff += 0.25 * (vert / horiz).powi(2);
    }
    if field[u] <= 0.0 {
        diff = SEA_TRAVEL_FACTOR;
    }
    horiz * diff
}

/// Результат раздела карты
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Territories {
    /// Столица-владелец каждой вершины
    pub owner: Vec<Option<usize>>,
    /// Накопленная стоимость пути от столицы
    pub cost: Vec<Option<f64>>,
    /// Столицы, от которых шло расширение
    pub capitals: Vec<usize>,
}

impl Territories {
    #[must_use]
    pub fn owner(&self, v: usize) -> Option<usize> {
        self.owner[v]
    }

    #[must_use]
    pub fn assigned_count(&self) -> usize {
        self.owner.iter().filter(|o| o.is_some()).count()
    }

    /// Вершины территории столицы `city`
    pub fn members(&self, city: usize) -> impl Iterator<Item = usize> + '_ {
        self.owner
            .iter()
            .enumerate()
            .filter_map(move |(v, &o)| (o == Some(city)).then_some(v))
    }
}

/// Делит вершины между первыми `k` городами списка.
///
/// `k` обрезается до длины списка. Столицы вне сетки пропускаются; если
/// `flux` не совпадает с сеткой по длине, никто ничего не получает.
/// Вершины, недостижимые ни из одной столицы, остаются без владельца.
pub fn assign_territories<Q>(
    field: &Heightmap,
    flux: &[f64],
    cities: &[usize],
    k: usize,
    queue: &mut Q,
) -> Territories
where
    Q: PriorityQueue<Claim> + ?Sized,
{
    let mesh = field.mesh();
    let n = mesh.len();
    let mut owner = vec![None; n];
    let mut cost = vec![None; n];

    if k > cities.len() {
        warn!(
            "Запрошено {} территорий, но городов только {}",
            k,
            cities.len()
        );
    }
    let mut capitals = Vec::with_capacity(k.min(cities.len()));
    for &city in cities.iter().take(k) {
        if city < n {
            capitals.push(city);
        } else {
            warn!("Столица {} вне сетки из {} вершин, пропущена", city, n);
        }
    }
    if flux.len() != n {
        warn!(
            "Поток задан для {} вершин, а в сетке {}: территории не строятся",
            flux.len(),
            n
        );
        capitals.clear();
    }

    for &city in &capitals {
        if owner[city].is_some() {
            continue;
        }
        owner[city] = Some(city);
        cost[city] = Some(0.0);
        for &nb in mesh.neighbors(city) {
            queue.push(weight(field, flux, city, nb), Claim { target: nb, city });
        }
    }

    let mut stale = 0usize;
    while let Some((score, claim)) = queue.pop_min() {
        if owner[claim.target].is_some() {
            stale += 1;
            continue;
        }
        owner[claim.target] = Some(claim.city);
        cost[claim.target] = Some(score);
        for &nb in mesh.neighbors(claim.target) {
            if owner[nb].is_none() {
                queue.push(
                    score + weight(field, flux, claim.target, nb),
                    Claim {
                        target: nb,
                        city: claim.city,
                    },
                );
            }
        }
    }

    let territories = Territories {
        owner,
        cost,
        capitals,
    };
    debug!(
        "Территории: назначено {} из {} вершин, отброшено {} устаревших записей",
        territories.assigned_count(),
        n,
        stale
    );
    territories
}

/// Отрезки границ: рёбра с двумя ячейками на суше, не у края карты,
/// концы которых принадлежат разным территориям
#[must_use]
pub fn border_segments(field: &Heightmap, territories: &Territories) -> Vec<Segment> {
    let mesh = field.mesh();
    mesh.edges()
        .iter()
        .filter_map(|edge| {
            let right = edge.right?;
            if mesh.is_near_edge(edge.a) || mesh.is_near_edge(edge.b) {
                return None;
            }
            if field[edge.a] <= 0.0 || field[edge.b] <= 0.0 {
                return None;
            }
            (territories.owner[edge.a] != territories.owner[edge.b])
                .then_some((edge.left, right))
        })
        .collect()
}

/// Сглаженные границы территорий
#[must_use]
pub fn borders(field: &Heightmap, territories: &Territories) -> Vec<Polyline> {
    merge_segments(&border_segments(field, territories))
        .iter()
        .map(|path| relax_path(path))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Extent, Point};
    use crate::hydrology::flux;
    use crate::mesh::Mesh;
    use crate::mesh::tests::{cross_mesh, k4_mesh};
    use crate::mesh::voronoi::{ClippingTessellator, TessellationEdge};
    use rand::SeedableRng;

    fn voronoi_mesh(seed: u64) -> Mesh {
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(seed);
        Mesh::generate(300, Extent::default(), 1, &ClippingTessellator, &mut rng).unwrap()
    }

    #[test]
    fn queue_pops_in_score_order_and_fifo_on_ties() {
        let mut q = MinQueue::new();
        q.push(2.0, "c");
        q.push(1.0, "a");
        q.push(1.0, "b");
        q.push(0.5, "first");
        assert_eq!(q.len(), 4);
        assert_eq!(q.pop_min(), Some((0.5, "first")));
        assert_eq!(q.pop_min(), Some((1.0, "a")));
        assert_eq!(q.pop_min(), Some((1.0, "b")));
        assert_eq!(q.pop_min(), Some((2.0, "c")));
        assert!(q.is_empty());
        assert_eq!(q.pop_min(), None);
    }

    #[test]
    fn weight_rules() {
        let mesh = cross_mesh();
        let h = Heightmap::from_values(&mesh, vec![0.5, 0.7, 0.3, -0.1, 0.5]).unwrap();
        let no_flux = vec![0.0; mesh.len()];

        // суша -> море
        assert_eq!(weight(&h, &no_flux, 0, 3), COAST_CROSSING_COST);
        // подъём 0.2 на 0.2 ослаблен вдесятеро: 1 + 0.25 * 0.1^2
        assert!((weight(&h, &no_flux, 0, 1) - 0.2 * 1.0025).abs() < 1e-12);
        // спуск 0.2 на 0.2 полный: 1 + 0.25 * 1^2
        assert!((weight(&h, &no_flux, 0, 2) - 0.2 * 1.25).abs() < 1e-12);
        // ровно
        assert!((weight(&h, &no_flux, 0, 4) - 0.2).abs() < 1e-12);

        let sea = h.map(|x| x - 1.0);
        assert!((weight(&sea, &no_flux, 0, 1) - 0.2 * SEA_TRAVEL_FACTOR).abs() < 1e-12);

        let mut river = no_flux.clone();
        river[0] = 0.04;
        assert!((weight(&h, &river, 0, 4) - 0.2 * 21.0).abs() < 1e-12);
    }

    #[test]
    fn nearly_coincident_vertices_have_finite_weight() {
        let edge = |a: Point, b: Point| TessellationEdge {
            start: a,
            end: b,
            left: a.midpoint(b),
            right: None,
        };
        let a = Point::new(0.0, 0.0);
        let b = Point::new(1e-20, 0.0);
        let c = Point::new(0.1, 0.0);
        let d = Point::new(0.0, 0.1);
        let mesh = Mesh::from_edges(
            Extent::default(),
            &[edge(a, b), edge(b, c), edge(c, d), edge(d, a)],
        )
        .unwrap();
        let h = Heightmap::from_values(&mesh, vec![0.5, 0.9, 0.5, 0.5]).unwrap();
        let no_flux = vec![0.0; mesh.len()];

        // уклон не определён и отбрасывается
        let w = weight(&h, &no_flux, 0, 1);
        assert!(w.is_finite());
        assert_eq!(w, mesh.distance(0, 1));
    }

    #[test]
    fn flat_k4_belongs_to_single_capital() {
        let mesh = k4_mesh();
        let h = Heightmap::from_values(&mesh, vec![0.5; 4]).unwrap();
        let f = flux(&h);
        let t = assign_territories(&h, &f, &[0], 1, &mut MinQueue::new());

        assert!(t.owner.iter().all(|&o| o == Some(0)));
        assert_eq!(t.cost[0], Some(0.0));
        // на ровной карте каждая вершина — сток: поток 1/4, штраф 100 * 0.5
        let diff = 51.0;
        for v in 1..4 {
            let expected = mesh.distance(0, v) * diff;
            let got = t.cost[v].unwrap();
            assert!((got - expected).abs() < 1e-9, "vertex {v}: {got} vs {expected}");
        }
    }

    #[test]
    fn territory_count_is_clamped() {
        let mesh = k4_mesh();
        let h = Heightmap::from_values(&mesh, vec![0.5; 4]).unwrap();
        let f = flux(&h);
        let t = assign_territories(&h, &f, &[0, 2], 10, &mut MinQueue::new());
        assert_eq!(t.capitals, vec![0, 2]);
        assert_eq!(t.owner[0], Some(0));
        assert_eq!(t.owner[2], Some(2));
        assert_eq!(t.assigned_count(), 4);

        let none = assign_territories(&h, &f, &[0, 2], 0, &mut MinQueue::new());
        assert_eq!(none.assigned_count(), 0);
    }

    #[test]
    fn foreign_inputs_do_not_panic() {
        let mesh = k4_mesh();
        let h = Heightmap::from_values(&mesh, vec![0.5; 4]).unwrap();
        let f = flux(&h);

        let t = assign_territories(&h, &f, &[17, 1], 2, &mut MinQueue::new());
        assert_eq!(t.capitals, vec![1]);
        assert_eq!(t.assigned_count(), 4);

        let short = assign_territories(&h, &f[..2], &[0], 1, &mut MinQueue::new());
        assert!(short.capitals.is_empty());
        assert_eq!(short.assigned_count(), 0);
    }

    #[test]
    fn disconnected_component_stays_unassigned() {
        let edge = |a: Point, b: Point| TessellationEdge {
            start: a,
            end: b,
            left: a.midpoint(b),
            right: None,
        };
        let p = [
            Point::new(-0.3, 0.0),
            Point::new(-0.2, 0.0),
            Point::new(0.2, 0.0),
            Point::new(0.3, 0.0),
        ];
        let mesh = Mesh::from_edges(Extent::default(), &[edge(p[0], p[1]), edge(p[2], p[3])])
            .unwrap();
        assert_eq!(mesh.component_count(), 2);

        let h = Heightmap::from_values(&mesh, vec![0.5; 4]).unwrap();
        let f = flux(&h);
        let capital = mesh.nearest_vertex(p[0]).unwrap();
        let t = assign_territories(&h, &f, &[capital], 1, &mut MinQueue::new());
        assert_eq!(t.assigned_count(), 2);
        let far = mesh.nearest_vertex(p[3]).unwrap();
        assert_eq!(t.owner(far), None);
        assert_eq!(t.cost[far], None);
    }

    #[test]
    fn costs_follow_the_expansion_tree() {
        let mesh = voronoi_mesh(12);
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(12);
        let h = Heightmap::add(&[
            &Heightmap::cone(&mesh, -1.0),
            &Heightmap::mountains(&mesh, 8, 0.1, &mut rng),
        ])
        .unwrap()
        .map(|x| x + 0.3);
        let f = flux(&h);
        let cities: Vec<usize> = [Point::new(-0.1, 0.0), Point::new(0.1, 0.05)]
            .iter()
            .filter_map(|&p| mesh.nearest_vertex_where(p, |v| h[v] > 0.0))
            .collect();
        let t = assign_territories(&h, &f, &cities, 2, &mut MinQueue::new());

        for v in 0..mesh.len() {
            let Some(city) = t.owner[v] else {
                continue;
            };
            let c = t.cost[v].unwrap();
            if cities.contains(&v) {
                assert_eq!(c, 0.0);
                continue;
            }
            // стоимость достигается через соседа той же территории
            let parent = mesh.neighbors(v).iter().any(|&u| {
                t.owner[u] == Some(city)
                    && t.cost[u].is_some_and(|cu| (cu + weight(&h, &f, u, v) - c).abs() < 1e-9)
            });
            assert!(parent, "vertex {v} has no parent");
            // и не дороже пути через любого уже назначенного соседа
            for &u in mesh.neighbors(v) {
                if let Some(cu) = t.cost[u] {
                    assert!(c <= cu + weight(&h, &f, u, v) + 1e-9);
                }
            }
        }

        assert!(t.members(cities[0]).count() > 1);
        assert!(!borders(&h, &t).is_empty());
    }
}
