use clap::Parser;
use meshgen::{ClippingTessellator, WorldGenerationParams, generate_world};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Генератор рельефа, рек и территорий на сетке Вороного
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Путь к конфигурационному файлу в формате TOML
    #[arg(short, long)]
    config: PathBuf,

    /// Путь для сохранения снимка мира (по умолчанию: ./world.json)
    #[arg(short, long, default_value = "world.json")]
    output: PathBuf,

    /// Переопределить сид из конфигурации
    #[arg(short, long)]
    seed: Option<u64>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    println!("🔍 Загрузка конфигурации...");
    let mut params = WorldGenerationParams::from_toml_file(&cli.config)?;
    if let Some(seed) = cli.seed {
        params.seed = seed;
    }

    println!(
        "Генерация мира (точек: {}, сид: {})...",
        params.num_points, params.seed
    );
    let world = generate_world(&params, &ClippingTessellator)?;

    println!("Сохранение в {:?}", cli.output);
    std::fs::write(&cli.output, world.to_json()?)?;

    println!(
        "\nГотово! Вершин: {}, рек: {}, территорий: {}.",
        world.mesh().len(),
        world.rivers().len(),
        world.territories().capitals.len()
    );
    Ok(())
}
