// src/config.rs
//! Конфигурация генерации мира
//!
//! Этот модуль определяет все параметры, управляющие генерацией:
//! - размер сетки и область карты
//! - рецепт рельефа и эрозии
//! - параметры гидрологии и рек
//! - столицы и количество территорий
//!
//! Все структуры поддерживают сериализацию в TOML/JSON для удобной настройки через конфигурационные файлы.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{MapgenError, Result};
use crate::geometry::{Extent, Point};
use crate::hydrology::FillSinksOptions;

/// Рецепт рельефа
///
/// Наклон + конус + горы + шум, затем сглаживание, заострение и эрозия.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TerrainSettings {
    /// Масштаб случайного вектора наклона
    #[serde(default = "default_slope_scale")]
    pub slope_scale: f64,

    /// Наклон конуса: `<0` — остров в центре, `>0` — котловина
    #[serde(default = "default_cone_slope")]
    pub cone_slope: f64,

    /// Количество гор
    #[serde(default = "default_mountains")]
    pub mountains: usize,

    /// Радиус горы в долях области
    #[serde(default = "default_mountain_radius")]
    pub mountain_radius: f64,

    /// Амплитуда фрактального шума (0 = без шума)
    #[serde(default)]
    pub noise_amplitude: f64,

    /// Частота шума
    #[serde(default = "default_noise_frequency")]
    pub noise_frequency: f64,

    /// Октавы шума
    #[serde(default = "default_noise_octaves")]
    pub noise_octaves: i32,

    /// Проходы сглаживания по соседям
    #[serde(default = "default_relax_passes")]
    pub relax_passes: usize,

    /// Сколько снимает эрозия за цикл в самой размываемой вершине
    #[serde(default = "default_erosion_amount")]
    pub erosion_amount: f64,

    /// Циклы эрозии
    #[serde(default = "default_erosion_cycles")]
    pub erosion_cycles: usize,

    /// Доля вершин под водой (квантиль уровня моря)
    #[serde(default = "default_sea_level")]
    pub sea_level: f64,

    /// Итерации чистки береговой линии
    #[serde(default = "default_clean_coast")]
    pub clean_coast: usize,
}

fn default_slope_scale() -> f64 {
    4.0
}
fn default_cone_slope() -> f64 {
    -1.0
}
fn default_mountains() -> usize {
    50
}
fn default_mountain_radius() -> f64 {
    0.05
}
fn default_noise_frequency() -> f64 {
    2.0
}
fn default_noise_octaves() -> i32 {
    4
}
fn default_relax_passes() -> usize {
    10
}
fn default_erosion_amount() -> f64 {
    0.1
}
fn default_erosion_cycles() -> usize {
    5
}
fn default_sea_level() -> f64 {
    0.5
}
fn default_clean_coast() -> usize {
    3
}

impl Default for TerrainSettings {
    fn default() -> Self {
        Self {
            slope_scale: 4.0,
            cone_slope: -1.0,
            mountains: 50,
            mountain_radius: 0.05,
            noise_amplitude: 0.0,
            noise_frequency: 2.0,
            noise_octaves: 4,
            relax_passes: 10,
            erosion_amount: 0.1,
            erosion_cycles: 5,
            sea_level: 0.5,
            clean_coast: 3,
        }
    }
}

/// Настройки гидрологии
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HydrologySettings {
    /// Минимальный перепад при заполнении впадин
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,

    /// Предел проходов заполнения впадин (по умолчанию число вершин + 2)
    #[serde(default)]
    pub max_passes: Option<usize>,

    /// Порог потока для рек в долях от доли суши
    #[serde(default = "default_river_threshold")]
    pub river_threshold: f64,
}

fn default_epsilon() -> f64 {
    1e-5
}
fn default_river_threshold() -> f64 {
    0.01
}

impl Default for HydrologySettings {
    fn default() -> Self {
        Self {
            epsilon: 1e-5,
            max_passes: None,
            river_threshold: 0.01,
        }
    }
}

impl HydrologySettings {
    #[must_use]
    pub fn fill_sinks_options(&self) -> FillSinksOptions {
        FillSinksOptions {
            epsilon: self.epsilon,
            max_passes: self.max_passes,
        }
    }
}

/// Столицы и территории
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TerritorySettings {
    /// Желаемые положения городов; каждый прижимается к ближайшей вершине суши.
    /// Первые `count` из них становятся столицами.
    #[serde(default)]
    pub cities: Vec<Point>,

    /// Количество территорий (обрезается до числа городов)
    #[serde(default)]
    pub count: usize,
}

/// Основные параметры генерации мира
///
/// Полная конфигурация для генерации одного мира. Поддерживает загрузку из TOML-файлов.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorldGenerationParams {
    /// Сид генератора случайных чисел (детерминированная генерация)
    pub seed: u64,

    /// Область карты, центрированная в начале координат (по умолчанию 1×1)
    #[serde(default)]
    pub extent: Extent,

    /// Количество точек сетки (по умолчанию 4096)
    #[serde(default = "default_num_points")]
    pub num_points: usize,

    /// Итерации релаксации Ллойда
    #[serde(default = "default_relax_iterations")]
    pub relax_iterations: usize,

    /// Рецепт рельефа
    #[serde(default)]
    pub terrain: TerrainSettings,

    /// Гидрология
    #[serde(default)]
    pub hydrology: HydrologySettings,

    /// Территории
    #[serde(default)]
    pub territories: TerritorySettings,
}

impl WorldGenerationParams {
    /// Загружает параметры из TOML-файла
    ///
    /// # Аргументы
    /// * `path` - путь к файлу конфигурации в формате TOML
    ///
    /// # Ошибки
    /// Возвращает ошибку, если файл не найден, содержит недопустимый формат
    /// или недопустимые значения.
    ///
    /// # Пример
    /// ```toml
    /// # world.toml
    /// seed = 42
    /// num_points = 2048
    ///
    /// [terrain]
    /// sea_level = 0.6
    /// ```
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let params: Self = toml::from_str(contents)?;
        params.validate()?;
        Ok(params)
    }

    /// Проверяет значения до начала генерации
    pub fn validate(&self) -> Result<()> {
        self.extent.validate()?;
        if self.num_points < 4 {
            return Err(MapgenError::InvalidMeshConfig(format!(
                "at least 4 points required, got {}",
                self.num_points
            )));
        }

        let t = &self.terrain;
        if !(0.0..=1.0).contains(&t.sea_level) {
            return Err(invalid("terrain.sea_level", t.sea_level));
        }
        if !(t.mountain_radius > 0.0 && t.mountain_radius.is_finite()) {
            return Err(invalid("terrain.mountain_radius", t.mountain_radius));
        }
        if !(t.erosion_amount >= 0.0 && t.erosion_amount.is_finite()) {
            return Err(invalid("terrain.erosion_amount", t.erosion_amount));
        }
        if !(t.slope_scale >= 0.0 && t.slope_scale.is_finite()) {
            return Err(invalid("terrain.slope_scale", t.slope_scale));
        }
        for (name, value) in [
            ("terrain.cone_slope", t.cone_slope),
            ("terrain.noise_amplitude", t.noise_amplitude),
            ("terrain.noise_frequency", t.noise_frequency),
        ] {
            if !value.is_finite() {
                return Err(invalid(name, value));
            }
        }

        let h = &self.hydrology;
        if !(h.epsilon > 0.0 && h.epsilon.is_finite()) {
            return Err(invalid("hydrology.epsilon", h.epsilon));
        }
        if h.max_passes == Some(0) {
            return Err(MapgenError::InvalidParameter(
                "hydrology.max_passes must be positive".into(),
            ));
        }
        if !(h.river_threshold >= 0.0 && h.river_threshold.is_finite()) {
            return Err(invalid("hydrology.river_threshold", h.river_threshold));
        }

        if let Some(p) = self
            .territories
            .cities
            .iter()
            .find(|p| !self.extent.contains(**p))
        {
            return Err(MapgenError::InvalidParameter(format!(
                "city at ({}, {}) lies outside the map",
                p.x, p.y
            )));
        }
        Ok(())
    }
}

fn invalid(name: &str, value: f64) -> MapgenError {
    MapgenError::InvalidParameter(format!("{name} has invalid value {value}"))
}

fn default_num_points() -> usize {
    4096
}
fn default_relax_iterations() -> usize {
    1
}

impl Default for WorldGenerationParams {
    fn default() -> Self {
        Self {
            seed: 0,
            extent: Extent::default(),
            num_points: 4096,
            relax_iterations: 1,
            terrain: TerrainSettings::default(),
            hydrology: HydrologySettings::default(),
            territories: TerritorySettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_toml_uses_defaults() {
        let params = WorldGenerationParams::from_toml_str("seed = 7").unwrap();
        assert_eq!(params.seed, 7);
        assert_eq!(params.num_points, 4096);
        assert_eq!(params.terrain, TerrainSettings::default());
        assert_eq!(params.hydrology, HydrologySettings::default());
        assert!(params.territories.cities.is_empty());
    }

    #[test]
    fn nested_sections_are_parsed() {
        let params = WorldGenerationParams::from_toml_str(
            r#"
            seed = 1
            num_points = 512

            [extent]
            width = 2.0
            height = 1.0

            [terrain]
            sea_level = 0.6
            mountains = 10

            [hydrology]
            max_passes = 100

            [territories]
            count = 2
            cities = [{ x = 0.1, y = 0.0 }, { x = -0.5, y = 0.2 }]
            "#,
        )
        .unwrap();
        assert_eq!(params.extent.width, 2.0);
        assert_eq!(params.terrain.sea_level, 0.6);
        assert_eq!(params.terrain.mountains, 10);
        assert_eq!(params.terrain.relax_passes, 10);
        assert_eq!(params.hydrology.fill_sinks_options().max_passes, Some(100));
        assert_eq!(params.territories.cities.len(), 2);
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(matches!(
            WorldGenerationParams::from_toml_str("seed = 1\nnum_points = 3"),
            Err(MapgenError::InvalidMeshConfig(_))
        ));
        assert!(matches!(
            WorldGenerationParams::from_toml_str("seed = 1\n[terrain]\nsea_level = 1.5"),
            Err(MapgenError::InvalidParameter(_))
        ));
        assert!(matches!(
            WorldGenerationParams::from_toml_str("seed = 1\n[terrain]\nslope_scale = -2.0"),
            Err(MapgenError::InvalidParameter(_))
        ));
        assert!(matches!(
            WorldGenerationParams::from_toml_str(
                "seed = 1\n[territories]\ncities = [{ x = 3.0, y = 0.0 }]"
            ),
            Err(MapgenError::InvalidParameter(_))
        ));
        assert!(matches!(
            WorldGenerationParams::from_toml_str("seed = \"abc\""),
            Err(MapgenError::Toml(_))
        ));
    }
}
