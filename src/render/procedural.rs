//! Noise-displaced rotating icosphere with a glow pass.
//!
//! The mesh is projected and flat-shaded on the CPU, then handed to the canvas
//! as back-to-front triangles, so any [`Canvas`] can present it.

use std::collections::HashMap;

use glam::{Mat4, Vec2, Vec3};
use noise::{NoiseFn, Perlin};
use serde::Deserialize;

use super::canvas::{BloomSettings, Canvas, Rgba};
use super::{Frame, RenderStrategy};

const MAX_SUBDIVISIONS: u32 = 5;
const AMBIENT: f32 = 0.15;

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Perlin seed; the same seed always yields the same surface.
    pub noise_seed: u32,
    /// Icosphere subdivision levels (each level quadruples the faces).
    pub subdivisions: u32,
    pub radius: f32,
    /// Peak displacement along the normal at full intensity.
    pub displacement: f32,
    /// Spatial frequency of the noise field.
    pub noise_frequency: f32,
    /// How fast the noise field drifts, per second.
    pub noise_speed: f32,
    /// Mesh rotation in radians per second.
    pub rotation_speed: f32,
    pub camera_distance: f32,
    pub fov_degrees: f32,
    /// World units the camera shifts at full pointer deflection.
    pub parallax: f32,
    /// Extra bloom strength at full intensity, as a fraction of the base strength.
    pub bloom_gain: f32,
    /// Extra mesh scale at full bass pulse.
    pub pulse_scale: f32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            noise_seed: 42,
            subdivisions: 3,
            radius: 1.0,
            displacement: 0.5,
            noise_frequency: 1.5,
            noise_speed: 0.4,
            rotation_speed: 0.3,
            camera_distance: 3.2,
            fov_degrees: 60.0,
            parallax: 0.6,
            bloom_gain: 1.5,
            pulse_scale: 0.15,
        }
    }
}

/// Unit icosphere: vertices on the sphere and triangle indices.
pub fn icosphere(subdivisions: u32) -> (Vec<Vec3>, Vec<[u32; 3]>) {
    let t = (1.0 + 5f32.sqrt()) / 2.0;
    let mut vertices: Vec<Vec3> = [
        (-1.0, t, 0.0),
        (1.0, t, 0.0),
        (-1.0, -t, 0.0),
        (1.0, -t, 0.0),
        (0.0, -1.0, t),
        (0.0, 1.0, t),
        (0.0, -1.0, -t),
        (0.0, 1.0, -t),
        (t, 0.0, -1.0),
        (t, 0.0, 1.0),
        (-t, 0.0, -1.0),
        (-t, 0.0, 1.0),
    ]
    .iter()
    .map(|&(x, y, z)| Vec3::new(x, y, z).normalize())
    .collect();

    let mut faces: Vec<[u32; 3]> = vec![
        [0, 11, 5], [0, 5, 1], [0, 1, 7], [0, 7, 10], [0, 10, 11],
        [1, 5, 9], [5, 11, 4], [11, 10, 2], [10, 7, 6], [7, 1, 8],
        [3, 9, 4], [3, 4, 2], [3, 2, 6], [3, 6, 8], [3, 8, 9],
        [4, 9, 5], [2, 4, 11], [6, 2, 10], [8, 6, 7], [9, 8, 1],
    ];

    for _ in 0..subdivisions.min(MAX_SUBDIVISIONS) {
        let mut cache: HashMap<(u32, u32), u32> = HashMap::new();
        let mut midpoint = |a: u32, b: u32, vertices: &mut Vec<Vec3>| -> u32 {
            let key = (a.min(b), a.max(b));
            *cache.entry(key).or_insert_with(|| {
                let mid = (vertices[a as usize] + vertices[b as usize]).normalize();
                vertices.push(mid);
                (vertices.len() - 1) as u32
            })
        };
        let mut next = Vec::with_capacity(faces.len() * 4);
        for &[a, b, c] in &faces {
            let ab = midpoint(a, b, &mut vertices);
            let bc = midpoint(b, c, &mut vertices);
            let ca = midpoint(c, a, &mut vertices);
            next.extend_from_slice(&[[a, ab, ca], [b, bc, ab], [c, ca, bc], [ab, bc, ca]]);
        }
        faces = next;
    }
    (vertices, faces)
}

pub struct ProceduralStrategy {
    scene: SceneConfig,
    bloom: BloomSettings,
    base: Vec<Vec3>,
    faces: Vec<[u32; 3]>,
    perlin: Perlin,
    light: Vec3,
}

impl ProceduralStrategy {
    pub fn new(scene: SceneConfig, bloom: BloomSettings) -> Self {
        let (base, faces) = icosphere(scene.subdivisions);
        log::debug!(
            "Procedural mesh: {} vertices, {} faces (seed {})",
            base.len(),
            faces.len(),
            scene.noise_seed
        );
        Self {
            scene,
            bloom,
            base,
            faces,
            perlin: Perlin::new(scene.noise_seed),
            light: Vec3::new(0.5, 0.8, 0.6).normalize(),
        }
    }

    /// Mesh vertices for this instant, in model space.
    fn displaced(&self, time: f32, intensity: f32) -> Vec<Vec3> {
        let s = &self.scene;
        let drift = (time * s.noise_speed) as f64;
        let freq = s.noise_frequency as f64;
        self.base
            .iter()
            .map(|&v| {
                let n = self.perlin.get([v.x as f64 * freq, v.y as f64 * freq, v.z as f64 * freq + drift]) as f32;
                v * (s.radius + s.displacement * intensity * n)
            })
            .collect()
    }

    fn base_color(intensity: f32, hue: f32) -> Rgba {
        Rgba::rgb(0.25 + 0.75 * intensity, 0.35 + 0.25 * hue, 1.0 - 0.6 * intensity)
    }
}

impl RenderStrategy for ProceduralStrategy {
    fn name(&self) -> &'static str {
        "procedural3d"
    }

    fn render(&self, canvas: &mut dyn Canvas, frame: &Frame<'_>) {
        let (w, h) = canvas.size();
        canvas.clear(Rgba::BLACK);

        let s = &self.scene;
        let params = frame.params;
        let intensity = params.intensity.clamp(0.0, 1.0);
        let (width, height) = (w.max(1) as f32, h.max(1) as f32);

        let pulse = 1.0 + s.pulse_scale * params.bass_pulse.clamp(0.0, 1.0);
        let model = Mat4::from_rotation_y(frame.time * s.rotation_speed)
            * Mat4::from_rotation_x(frame.time * s.rotation_speed * 0.5)
            * Mat4::from_scale(Vec3::splat(pulse));
        let eye = Vec3::new(
            params.camera_offset.x * s.parallax,
            params.camera_offset.y * s.parallax,
            s.camera_distance,
        );
        let view = Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y);
        let proj = Mat4::perspective_rh(s.fov_degrees.to_radians(), width / height, 0.1, 100.0);
        let view_proj = proj * view;

        let world: Vec<Vec3> = self
            .displaced(frame.time, intensity)
            .into_iter()
            .map(|v| model.transform_point3(v))
            .collect();
        let base_color = Self::base_color(intensity, params.hue);

        let mut triangles: Vec<(f32, [Vec2; 3], Rgba)> = Vec::with_capacity(self.faces.len() / 2);
        'faces: for face in &self.faces {
            let [a, b, c] = face.map(|i| world[i as usize]);
            let centroid = (a + b + c) / 3.0;
            let mut normal = (b - a).cross(c - a).normalize_or_zero();
            if normal.dot(centroid) < 0.0 {
                normal = -normal;
            }
            if normal.dot(eye - centroid) <= 0.0 {
                continue;
            }

            let mut screen = [Vec2::ZERO; 3];
            let mut depth = 0.0;
            for (out, p) in screen.iter_mut().zip([a, b, c]) {
                let clip = view_proj * p.extend(1.0);
                if clip.w <= 1e-4 {
                    continue 'faces;
                }
                let ndc = clip.truncate() / clip.w;
                *out = Vec2::new((ndc.x + 1.0) * 0.5 * width, (1.0 - ndc.y) * 0.5 * height);
                depth += clip.w;
            }

            let lambert = normal.dot(self.light).max(0.0);
            let shade = AMBIENT + (1.0 - AMBIENT) * lambert;
            triangles.push((depth, screen, base_color.scale(shade)));
        }

        triangles.sort_by(|x, y| y.0.total_cmp(&x.0));
        for (_, points, color) in &triangles {
            canvas.fill_triangle(*points, *color);
        }

        let glow = BloomSettings {
            strength: self.bloom.strength * (1.0 + s.bloom_gain * intensity),
            ..self.bloom
        };
        canvas.bloom(&glow);
    }
}
