pub mod coast;
pub mod config;
pub mod error;
pub mod generator;
pub mod geometry;
pub mod heightmap;
pub mod hydrology;
pub mod mesh;
pub mod paths;
pub mod rivers;
pub mod territory;

pub use config::{HydrologySettings, TerrainSettings, TerritorySettings, WorldGenerationParams};
pub use error::{MapgenError, Result};
pub use generator::{World, generate_world};
pub use geometry::{Extent, Point};
pub use heightmap::{FieldId, Heightmap};
pub use mesh::{ClippingTessellator, Mesh, Tessellator};
pub use territory::{MinQueue, PriorityQueue, Territories};
