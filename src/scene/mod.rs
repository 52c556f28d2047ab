//! Scene graph the visualizers attach their primitives to.

pub mod camera;
pub mod color;
pub mod graph;
pub mod primitive;

pub use camera::Camera;
pub use color::Color;
pub use graph::{PrimitiveId, Scene, SceneHost};
pub use primitive::{Blending, Geometry, Material, Primitive, Transform, VertexBuffer};
