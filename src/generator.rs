//! Полный конвейер генерации: сетка, рельеф, гидрология, территории.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{info, warn};

use crate::coast::{clean_coast, coastline};
use crate::config::{TerrainSettings, WorldGenerationParams};
use crate::error::Result;
use crate::geometry::{Extent, Point};
use crate::heightmap::{Heightmap, random_vector};
use crate::hydrology::{DownhillCache, FillSinksOptions, do_erosion, fill_sinks, flux_with};
use crate::mesh::{Mesh, MeshEdge, Tessellator};
use crate::paths::Polyline;
use crate::rivers::generate_rivers;
use crate::territory::{MinQueue, Territories, assign_territories, borders};

/// Сгенерированный мир. Только для чтения.
#[derive(Debug, Clone)]
pub struct World {
    seed: u64,
    mesh: Mesh,
    heights: Vec<f64>,
    flux: Vec<f64>,
    rivers: Vec<Polyline>,
    coastline: Vec<Polyline>,
    cities: Vec<usize>,
    territories: Territories,
    borders: Vec<Polyline>,
}

impl World {
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    #[must_use]
    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    #[must_use]
    pub fn heights(&self) -> &[f64] {
        &self.heights
    }

    /// Итоговая карта высот, привязанная к сетке мира
    pub fn heightmap(&self) -> Result<Heightmap<'_>> {
        Heightmap::from_values(&self.mesh, self.heights.clone())
    }

    #[must_use]
    pub fn flux(&self) -> &[f64] {
        &self.flux
    }

    #[must_use]
    pub fn rivers(&self) -> &[Polyline] {
        &self.rivers
    }

    #[must_use]
    pub fn coastline(&self) -> &[Polyline] {
        &self.coastline
    }

    /// Вершины городов; первые из них столицы
    #[must_use]
    pub fn cities(&self) -> &[usize] {
        &self.cities
    }

    #[must_use]
    pub fn territories(&self) -> &Territories {
        &self.territories
    }

    #[must_use]
    pub fn borders(&self) -> &[Polyline] {
        &self.borders
    }

    /// Снимок мира в JSON для внешней визуализации
    pub fn to_json(&self) -> Result<String> {
        let dump = WorldDump {
            seed: self.seed,
            extent: self.mesh.extent(),
            vertices: self.mesh.positions(),
            edges: self.mesh.edges(),
            heights: &self.heights,
            flux: &self.flux,
            rivers: &self.rivers,
            coastline: &self.coastline,
            cities: &self.cities,
            territories: &self.territories,
            borders: &self.borders,
        };
        Ok(serde_json::to_string(&dump)?)
    }
}

#[derive(Serialize)]
struct WorldDump<'a> {
    seed: u64,
    extent: &'a Extent,
    vertices: &'a [Point],
    edges: &'a [MeshEdge],
    heights: &'a [f64],
    flux: &'a [f64],
    rivers: &'a [Polyline],
    coastline: &'a [Polyline],
    cities: &'a [usize],
    territories: &'a Territories,
    borders: &'a [Polyline],
}

/// Генерирует мир по параметрам
///
/// Детерминирована при одинаковых параметрах и тесселяторе.
pub fn generate_world<T>(params: &WorldGenerationParams, tessellator: &T) -> Result<World>
where
    T: Tessellator + ?Sized,
{
    params.validate()?;
    let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
    let options = params.hydrology.fill_sinks_options();

    info!("Построение сетки из {} точек", params.num_points);
    let mesh = Mesh::generate(
        params.num_points,
        params.extent,
        params.relax_iterations,
        tessellator,
        &mut rng,
    )?;

    let h = generate_terrain(&mesh, params.seed, &params.terrain, &options, &mut rng)?;

    info!("Гидрология");
    let mut cache = DownhillCache::new();
    let flux = flux_with(&h, cache.get_or_compute(&h));
    let rivers = generate_rivers(&h, params.hydrology.river_threshold);
    let coastline = coastline(&h, 0.0);
    info!(
        "Рек: {}, участков берега: {}, суша: {:.1}%",
        rivers.len(),
        coastline.len(),
        h.land_fraction() * 100.0
    );

    let cities = place_cities(&h, &params.territories.cities);
    info!("Территории: {} столиц", cities.len().min(params.territories.count));
    let territories = assign_territories(
        &h,
        &flux,
        &cities,
        params.territories.count,
        &mut MinQueue::new(),
    );
    let borders = borders(&h, &territories);

    let heights = h.into_values();
    Ok(World {
        seed: params.seed,
        mesh,
        heights,
        flux,
        rivers,
        coastline,
        cities,
        territories,
        borders,
    })
}

/// Рельеф: наклон + конус + горы (+ шум), сглаживание, заострение, эрозия,
/// уровень моря, заполнение впадин и чистка берега
pub fn generate_terrain<'m, R: Rng + ?Sized>(
    mesh: &'m Mesh,
    seed: u64,
    settings: &TerrainSettings,
    options: &FillSinksOptions,
    rng: &mut R,
) -> Result<Heightmap<'m>> {
    info!("Генерация рельефа");
    let slope = Heightmap::slope(mesh, random_vector(settings.slope_scale, rng)?);
    let cone = Heightmap::cone(mesh, settings.cone_slope);
    let mountains =
        Heightmap::mountains(mesh, settings.mountains, settings.mountain_radius, rng);
    let noise = (settings.noise_amplitude != 0.0).then(|| {
        Heightmap::noise(mesh, seed, settings.noise_frequency, settings.noise_octaves)
            .scale(settings.noise_amplitude)
    });

    let mut layers = vec![&slope, &cone, &mountains];
    if let Some(noise) = &noise {
        layers.push(noise);
    }
    let mut h = Heightmap::add(&layers)?;

    for _ in 0..settings.relax_passes {
        h = h.relax();
    }
    h = h.peaky();

    info!("Эрозия: {} циклов", settings.erosion_cycles);
    h = do_erosion(&h, settings.erosion_amount, settings.erosion_cycles, options)?;
    h = h.set_sea_level(settings.sea_level);
    h = fill_sinks(&h, options)?;
    Ok(clean_coast(&h, settings.clean_coast))
}

/// Прижимает желаемые положения городов к ближайшим вершинам суши.
/// Повторы и города на карте без суши отбрасываются с предупреждением.
#[must_use]
pub fn place_cities(field: &Heightmap, positions: &[Point]) -> Vec<usize> {
    let mesh = field.mesh();
    let mut cities = Vec::with_capacity(positions.len());
    for &p in positions {
        match mesh.nearest_vertex_where(p, |v| field[v] > 0.0) {
            Some(v) if cities.contains(&v) => {
                warn!("Город ({:.3}, {:.3}) совпал с уже размещённым", p.x, p.y);
            }
            Some(v) => cities.push(v),
            None => warn!("Для города ({:.3}, {:.3}) нет суши", p.x, p.y),
        }
    }
    cities
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::tests::cross_mesh;
    use crate::mesh::voronoi::ClippingTessellator;

    fn small_params(seed: u64) -> WorldGenerationParams {
        let mut params = WorldGenerationParams {
            seed,
            num_points: 400,
            ..WorldGenerationParams::default()
        };
        params.terrain.mountains = 15;
        params.terrain.erosion_cycles = 2;
        params.territories.cities = vec![Point::new(-0.1, 0.0), Point::new(0.1, 0.0)];
        params.territories.count = 2;
        params
    }

    #[test]
    fn cities_snap_to_land_without_duplicates() {
        let mesh = cross_mesh();
        let h = Heightmap::from_values(&mesh, vec![0.5, 0.2, -0.8, 0.1, 0.9]).unwrap();
        let cities = place_cities(
            &h,
            &[
                Point::new(0.19, 0.0),
                Point::new(0.2, 0.0),
                Point::new(0.0, 0.19),
            ],
        );
        // вторая точка — повтор, третья ближе к морской вершине 2 и уходит в центр
        assert_eq!(cities, vec![1, 0]);

        let sea = h.map(|x| x - 10.0);
        assert!(place_cities(&sea, &[Point::new(0.0, 0.0)]).is_empty());
    }

    #[test]
    fn world_respects_sea_level_and_capitals() {
        let params = small_params(3);
        let world = generate_world(&params, &ClippingTessellator).unwrap();
        let h = world.heightmap().unwrap();
        assert_eq!(h.len(), world.mesh().len());

        for &c in world.cities() {
            assert!(h[c] > 0.0);
            assert_eq!(world.territories().owner(c), Some(c));
        }
        assert!(world.territories().capitals.len() <= 2);

        let json = world.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["seed"], 3);
        assert_eq!(
            value["heights"].as_array().map(Vec::len),
            Some(world.mesh().len())
        );
    }

    #[test]
    fn invalid_params_fail_before_generation() {
        let mut params = small_params(1);
        params.num_points = 2;
        assert!(generate_world(&params, &ClippingTessellator).is_err());
    }
}
