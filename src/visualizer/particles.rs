use glam::Vec3;
use rand::rngs::StdRng;
use rand::Rng;
use std::f32::consts::TAU;

use super::{Visualizer, VisualizerKind};
use crate::audio::AudioFrameSource;
use crate::scene::{
    Blending, Color, Material, Primitive, PrimitiveId, SceneHost, Transform, VertexBuffer,
};

pub const PARTICLE_COUNT: usize = 256;
const RADIUS_SCALE: f32 = 10.0;
const POINT_SIZE: f32 = 0.2;
/// Distance from the origin past which a particle glows white and sprays.
pub const HOT_DISTANCE: f32 = 4.0;
/// Cloud rotation per tick (radians) about x and y.
const SPIN: Vec3 = Vec3::new(0.005, 0.01, 0.0);

const SPRAY_COOLDOWN: f32 = 0.5;
const SPRAY_LIFETIME: f32 = 1.0;
const SPRAY_SPEED_MIN: f32 = 2.0;
const SPRAY_SPEED_MAX: f32 = 4.0;
const SPRAY_RADIUS: f32 = 0.1;
const SPRAY_SEGMENTS: u32 = 8;
const SPRAY_COLOR: u32 = 0xffff00;
const GRAVITY: f32 = 2.0;
/// Fraction of the remaining distance to white covered each tick. Applied
/// per tick, not per second, so the glow speed follows the frame rate.
const GLOW_RATE: f32 = 0.05;

/// Short-lived sphere thrown off a hot particle.
#[derive(Clone, Debug)]
pub struct SprayParticle {
    primitive: PrimitiveId,
    position: Vec3,
    velocity: Vec3,
    lifetime: f32,
    initial_lifetime: f32,
}

#[cfg(test)]
impl SprayParticle {
    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    pub fn lifetime(&self) -> f32 {
        self.lifetime
    }

    pub fn initial_lifetime(&self) -> f32 {
        self.initial_lifetime
    }
}

/// A sphere of points pushed outward by overall loudness, spraying
/// gravity-bound sparks from whichever points cross the hot threshold.
pub struct ParticleExplosion {
    points: PrimitiveId,
    directions: Vec<Vec3>,
    base_colors: Vec<Color>,
    last_spray: Vec<Option<f32>>,
    sprays: Vec<SprayParticle>,
    last_update: Option<f32>,
    bins: Vec<u8>,
    rng: StdRng,
}

impl ParticleExplosion {
    pub fn new(scene: &mut dyn SceneHost, audio: &dyn AudioFrameSource, mut rng: StdRng) -> Self {
        let directions: Vec<Vec3> = (0..PARTICLE_COUNT)
            .map(|_| random_direction(&mut rng))
            .collect();
        let base_colors: Vec<Color> = (0..PARTICLE_COUNT)
            .map(|_| Color::from_hsl(rng.gen::<f32>(), 1.0, 0.5))
            .collect();

        let buffer = VertexBuffer::new(vec![Vec3::ZERO; PARTICLE_COUNT], base_colors.clone());
        let points = scene.add(Primitive::points(buffer, POINT_SIZE), None);

        Self {
            points,
            directions,
            base_colors,
            last_spray: vec![None; PARTICLE_COUNT],
            sprays: Vec::new(),
            last_update: None,
            bins: vec![0; audio.frame_size()],
            rng,
        }
    }

    #[cfg(test)]
    pub fn sprays(&self) -> &[SprayParticle] {
        &self.sprays
    }

    #[cfg(test)]
    pub fn directions(&self) -> &[Vec3] {
        &self.directions
    }

    fn cooled_down(&self, index: usize, time: f32) -> bool {
        self.last_spray[index].map_or(true, |last| time - last > SPRAY_COOLDOWN)
    }

    fn spawn_spray(&mut self, scene: &mut dyn SceneHost, index: usize, position: Vec3) {
        let speed = self.rng.gen_range(SPRAY_SPEED_MIN..SPRAY_SPEED_MAX);
        let material = Material {
            blending: Blending::Additive,
            ..Material::basic(Color::from_hex(SPRAY_COLOR))
        };
        let primitive = scene.add(
            Primitive::sphere(SPRAY_RADIUS, SPRAY_SEGMENTS, material)
                .with_transform(Transform::at(position)),
            None,
        );

        self.sprays.push(SprayParticle {
            primitive,
            position,
            velocity: self.directions[index] * speed,
            lifetime: SPRAY_LIFETIME,
            initial_lifetime: SPRAY_LIFETIME,
        });
    }

    fn integrate_sprays(&mut self, scene: &mut dyn SceneHost, dt: f32) {
        // Reverse walk so swap_remove never skips an unvisited particle.
        let mut i = self.sprays.len();
        while i > 0 {
            i -= 1;
            let spray = &mut self.sprays[i];
            spray.velocity.y -= GRAVITY * dt;
            spray.position += spray.velocity * dt;
            spray.lifetime -= dt;

            if spray.lifetime <= 0.0 {
                let spray = self.sprays.swap_remove(i);
                scene.remove(spray.primitive);
                continue;
            }

            if let Some(primitive) = scene.get_mut(spray.primitive) {
                primitive.transform.position = spray.position;
                primitive.transform.scale = Vec3::splat(spray.lifetime / spray.initial_lifetime);
                primitive.material.color = primitive.material.color.lerp(Color::WHITE, GLOW_RATE);
            }
        }
    }
}

/// Uniform direction on the unit sphere via inverse-CDF polar sampling.
fn random_direction(rng: &mut StdRng) -> Vec3 {
    let theta = rng.gen::<f32>() * TAU;
    let phi = (2.0 * rng.gen::<f32>() - 1.0).acos();
    Vec3::new(phi.sin() * theta.cos(), phi.sin() * theta.sin(), phi.cos())
}

fn mean_level(bins: &[u8]) -> f32 {
    if bins.is_empty() {
        return 0.0;
    }
    let sum: u32 = bins.iter().map(|&b| b as u32).sum();
    sum as f32 / bins.len() as f32 / 255.0
}

impl Visualizer for ParticleExplosion {
    fn kind(&self) -> VisualizerKind {
        VisualizerKind::ParticleExplosion
    }

    fn update(&mut self, time: f32, audio: &mut dyn AudioFrameSource, scene: &mut dyn SceneHost) {
        let dt = time - self.last_update.unwrap_or(time);
        self.last_update = Some(time);

        audio.frequency_frame(&mut self.bins);
        let radius = mean_level(&self.bins) * RADIUS_SCALE;

        if let Some(points) = scene.get_mut(self.points) {
            points.transform.rotation += SPIN;
            if let Some(buffer) = points.vertex_buffer_mut() {
                for (i, direction) in self.directions.iter().enumerate() {
                    let position = *direction * radius;
                    buffer.set_position(i, position);
                    let color = if position.length() > HOT_DISTANCE {
                        Color::WHITE
                    } else {
                        self.base_colors[i]
                    };
                    buffer.set_color(i, color);
                }
            }
        }

        // Evaluated against this tick's positions, after the cloud has moved.
        for i in 0..PARTICLE_COUNT {
            let position = self.directions[i] * radius;
            if position.length() > HOT_DISTANCE && self.cooled_down(i, time) {
                self.spawn_spray(scene, i, position);
                self.last_spray[i] = Some(time);
            }
        }

        self.integrate_sprays(scene, dt);
    }

    fn dispose(self: Box<Self>, scene: &mut dyn SceneHost) {
        scene.remove(self.points);
        for spray in &self.sprays {
            scene.remove(spray.primitive);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Geometry, Scene};
    use crate::visualizer::testing::ScriptedSource;
    use rand::SeedableRng;

    fn explosion(scene: &mut Scene, audio: &ScriptedSource) -> ParticleExplosion {
        ParticleExplosion::new(scene, audio, StdRng::seed_from_u64(7))
    }

    fn point_positions(scene: &Scene, viz: &ParticleExplosion) -> Vec<Vec3> {
        scene
            .get(viz.points)
            .and_then(|p| p.vertex_buffer())
            .map(|b| b.positions().to_vec())
            .unwrap()
    }

    #[test]
    fn directions_are_unit_vectors() {
        let mut scene = Scene::new();
        let viz = explosion(&mut scene, &ScriptedSource::silent(128));
        assert_eq!(viz.directions().len(), PARTICLE_COUNT);
        assert!(viz
            .directions()
            .iter()
            .all(|d| (d.length() - 1.0).abs() < 1e-4));
    }

    #[test]
    fn silence_keeps_particles_at_origin_without_spray() {
        let mut scene = Scene::new();
        let mut audio = ScriptedSource::silent(128);
        let mut viz = explosion(&mut scene, &audio);

        for tick in 0..30 {
            viz.update(tick as f32 * 0.1, &mut audio, &mut scene);
        }
        assert!(point_positions(&scene, &viz).iter().all(|p| *p == Vec3::ZERO));
        assert!(viz.sprays().is_empty());
        assert_eq!(scene.len(), 1);
    }

    #[test]
    fn radius_follows_mean_level_and_quiet_points_keep_base_color() {
        let mut scene = Scene::new();
        // Mean 51/255 = 0.2, radius 2: inside the hot threshold.
        let mut audio = ScriptedSource::constant(128, 51, 128);
        let mut viz = explosion(&mut scene, &audio);
        viz.update(0.0, &mut audio, &mut scene);

        for (position, direction) in point_positions(&scene, &viz).iter().zip(viz.directions()) {
            assert!((*position - *direction * 2.0).length() < 1e-5);
        }
        let buffer = scene.get(viz.points).unwrap().vertex_buffer().unwrap();
        assert_eq!(buffer.colors(), viz.base_colors.as_slice());
        assert!(viz.sprays().is_empty());
    }

    #[test]
    fn loud_frame_whitens_points_and_sprays_once_per_cooldown() {
        let mut scene = Scene::new();
        let mut audio = ScriptedSource::constant(128, 255, 128);
        let mut viz = explosion(&mut scene, &audio);

        viz.update(10.0, &mut audio, &mut scene);
        let buffer = scene.get(viz.points).unwrap().vertex_buffer().unwrap();
        assert!(buffer.colors().iter().all(|c| *c == Color::WHITE));
        assert_eq!(viz.sprays().len(), PARTICLE_COUNT);

        viz.update(10.3, &mut audio, &mut scene);
        assert_eq!(viz.sprays().len(), PARTICLE_COUNT);

        viz.update(10.6, &mut audio, &mut scene);
        assert_eq!(viz.sprays().len(), 2 * PARTICLE_COUNT);
        assert_eq!(scene.len(), 1 + 2 * PARTICLE_COUNT);
    }

    #[test]
    fn hot_colour_reverts_when_audio_quietens() {
        let mut scene = Scene::new();
        let mut audio = ScriptedSource::constant(128, 255, 128);
        let mut viz = explosion(&mut scene, &audio);

        viz.update(0.0, &mut audio, &mut scene);
        let buffer = scene.get(viz.points).unwrap().vertex_buffer().unwrap();
        assert!(buffer.colors().iter().all(|c| *c == Color::WHITE));

        // Radius 2 is back inside the threshold: colour depends only on it.
        audio.frequency = vec![51; 128];
        viz.update(0.1, &mut audio, &mut scene);
        let buffer = scene.get(viz.points).unwrap().vertex_buffer().unwrap();
        assert_eq!(buffer.colors(), viz.base_colors.as_slice());
        for (position, direction) in buffer.positions().iter().zip(viz.directions()) {
            assert!((*position - *direction * 2.0).length() < 1e-5);
        }
    }

    #[test]
    fn long_pause_expires_every_spray_in_one_step() {
        let mut scene = Scene::new();
        let mut audio = ScriptedSource::constant(128, 255, 128);
        let mut viz = explosion(&mut scene, &audio);
        viz.update(0.0, &mut audio, &mut scene);
        viz.update(0.6, &mut audio, &mut scene);
        assert_eq!(viz.sprays().len(), 2 * PARTICLE_COUNT);

        audio.frequency = vec![0; 128];
        viz.update(100.0, &mut audio, &mut scene);
        assert!(viz.sprays().is_empty());
        assert_eq!(scene.len(), 1);
    }

    #[test]
    fn spray_lifetime_drains_by_dt_and_expires_on_time() {
        let mut scene = Scene::new();
        let mut audio = ScriptedSource::constant(128, 255, 128);
        let mut viz = explosion(&mut scene, &audio);

        viz.update(0.0, &mut audio, &mut scene);
        audio.frequency = vec![0; 128];
        assert!(viz.sprays().iter().all(|s| s.lifetime() == 1.0));

        let mut previous = 1.0;
        for time in [0.25, 0.5, 0.75] {
            viz.update(time, &mut audio, &mut scene);
            let lifetime = viz.sprays()[0].lifetime();
            assert!((previous - lifetime - 0.25).abs() < 1e-6);
            assert!(lifetime > 0.0 && lifetime <= viz.sprays()[0].initial_lifetime());
            previous = lifetime;
        }
        assert_eq!(viz.sprays().len(), PARTICLE_COUNT);

        viz.update(1.0, &mut audio, &mut scene);
        assert!(viz.sprays().is_empty());
        assert_eq!(scene.len(), 1);
    }

    #[test]
    fn sprays_fall_shrink_and_glow() {
        let mut scene = Scene::new();
        let mut audio = ScriptedSource::constant(128, 255, 128);
        let mut viz = explosion(&mut scene, &audio);
        viz.update(0.0, &mut audio, &mut scene);
        audio.frequency = vec![0; 128];

        let spawned = viz.sprays()[0].clone();
        let speed = spawned.velocity().length();
        assert!(speed > SPRAY_SPEED_MIN - 1e-4 && speed < SPRAY_SPEED_MAX + 1e-4);

        viz.update(0.5, &mut audio, &mut scene);
        let spray = &viz.sprays()[0];
        assert!(spray.velocity().y < spawned.velocity().y);

        let primitive = scene.get(spray.primitive).unwrap();
        assert!(matches!(primitive.geometry, Geometry::Sphere { .. }));
        assert_eq!(primitive.material.blending, Blending::Additive);
        assert!((primitive.transform.scale.x - 0.5).abs() < 1e-6);
        // Two glow steps from pure yellow.
        let blue = 1.0 - 0.95f32 * 0.95;
        assert!((primitive.material.color.b - blue).abs() < 1e-5);
    }

    #[test]
    fn cloud_rotation_accumulates() {
        let mut scene = Scene::new();
        let mut audio = ScriptedSource::silent(128);
        let mut viz = explosion(&mut scene, &audio);
        for tick in 0..10 {
            viz.update(tick as f32, &mut audio, &mut scene);
        }
        let rotation = scene.get(viz.points).unwrap().transform.rotation;
        assert!((rotation.y - 0.1).abs() < 1e-5);
        assert!((rotation.x - 0.05).abs() < 1e-5);
    }

    #[test]
    fn dispose_releases_cloud_and_sprays() {
        let mut scene = Scene::new();
        let mut audio = ScriptedSource::constant(128, 255, 128);
        let mut viz = Box::new(explosion(&mut scene, &audio));
        viz.update(0.0, &mut audio, &mut scene);
        assert!(scene.len() > 1);

        viz.dispose(&mut scene);
        assert_eq!(scene.len(), 0);
    }
}
