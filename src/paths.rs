//! Склейка отрезков в ломаные и их сглаживание.
//! Общая часть для рек, береговой линии и границ территорий.

use std::collections::{HashMap, VecDeque};

use crate::geometry::Point;

pub type Polyline = Vec<Point>;
pub type Segment = (Point, Point);

/// Склеивает отрезки с общими концами в максимальные ломаные.
/// Ломаная продолжается только через точки, где сходятся ровно два отрезка;
/// развилки и концы разрывают её.
#[must_use]
pub fn merge_segments(segments: &[Segment]) -> Vec<Polyline> {
    let mut touching: HashMap<(u64, u64), Vec<usize>> = HashMap::new();
    for (i, (a, b)) in segments.iter().enumerate() {
        touching.entry(a.key()).or_default().push(i);
        touching.entry(b.key()).or_default().push(i);
    }

    let mut done = vec![false; segments.len()];
    let mut paths = Vec::new();

    for start in 0..segments.len() {
        if done[start] {
            continue;
        }
        done[start] = true;
        let (a, b) = segments[start];
        let mut path = VecDeque::from([a, b]);

        loop {
            if let Some(next) = continuation(&touching, segments, &done, path[0]) {
                done[next.0] = true;
                path.push_front(next.1);
            } else if let Some(next) = continuation(&touching, segments, &done, path[path.len() - 1]) {
                done[next.0] = true;
                path.push_back(next.1);
            } else {
                break;
            }
        }

        paths.push(path.into_iter().collect());
    }

    paths
}

/// Свободный отрезок, продолжающий ломаную через точку степени 2,
/// и его дальний конец
fn continuation(
    touching: &HashMap<(u64, u64), Vec<usize>>,
    segments: &[Segment],
    done: &[bool],
    end: Point,
) -> Option<(usize, Point)> {
    let incident = touching.get(&end.key())?;
    if incident.len() != 2 {
        return None;
    }
    let &next = incident.iter().find(|&&i| !done[i])?;
    let (a, b) = segments[next];
    Some((next, if a.key() == end.key() { b } else { a }))
}

/// Сглаживание `0.25 / 0.5 / 0.25`, концы остаются на месте
#[must_use]
pub fn relax_path(path: &[Point]) -> Polyline {
    if path.len() < 3 {
        return path.to_vec();
    }
    let mut relaxed = Vec::with_capacity(path.len());
    relaxed.push(path[0]);
    for w in path.windows(3) {
        relaxed.push(Point::new(
            0.25 * w[0].x + 0.5 * w[1].x + 0.25 * w[2].x,
            0.25 * w[0].y + 0.5 * w[1].y + 0.25 * w[2].y,
        ));
    }
    relaxed.push(path[path.len() - 1]);
    relaxed
}
