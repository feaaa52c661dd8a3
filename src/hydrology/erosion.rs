use tracing::debug;

use crate::error::Result;
use crate::heightmap::Heightmap;
use crate::hydrology::{FillSinksOptions, fill_sinks, flux, slope_magnitudes};

/// Вклад речного переноса: расход растёт как корень из потока
const RIVER_TRANSPORT: f64 = 1000.0;
/// Верхний предел скорости эрозии
const MAX_EROSION_RATE: f64 = 200.0;

/// Скорость эрозии: `1000 * sqrt(flux) * slope + slope²`, не больше 200
#[must_use]
pub fn erosion_rate(field: &Heightmap) -> Vec<f64> {
    let flux = flux(field);
    let slope = slope_magnitudes(field);
    flux.iter()
        .zip(&slope)
        .map(|(&f, &s)| {
            let river = f.sqrt() * s;
            let creep = s * s;
            (RIVER_TRANSPORT * river + creep).min(MAX_EROSION_RATE)
        })
        .collect()
}

/// Снимает `amount * rate / max_rate`: самая размываемая вершина теряет ровно `amount`.
/// Если эрозии нет нигде (всюду нулевой уклон), карта возвращается как есть.
#[must_use]
pub fn erode<'m>(field: &Heightmap<'m>, amount: f64) -> Heightmap<'m> {
    let rates = erosion_rate(field);
    let max_rate = rates.iter().copied().fold(0.0, f64::max);
    if max_rate <= 0.0 {
        return field.clone();
    }

    let mut eroded = field.values().to_vec();
    for (h, rate) in eroded.iter_mut().zip(&rates) {
        *h -= amount * (rate / max_rate);
    }
    field.with_values(eroded)
}

/// Заполнение впадин, затем `cycles` раз эрозия с повторным заполнением
pub fn do_erosion<'m>(
    field: &Heightmap<'m>,
    amount: f64,
    cycles: usize,
    options: &FillSinksOptions,
) -> Result<Heightmap<'m>> {
    let mut h = fill_sinks(field, options)?;
    for cycle in 0..cycles {
        h = erode(&h, amount);
        h = fill_sinks(&h, options)?;
        debug!("Цикл эрозии {}/{} завершён", cycle + 1, cycles);
    }
    Ok(h)
}
