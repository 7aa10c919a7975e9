use glam::Vec3;
use rand::Rng;

use crate::config::WaveConfig;

/// Fixed-size point cloud with a slow, per-particle vertical drift.
///
/// Positions are stored contiguously so the flat `f32` view (`x, y, z` of
/// particle `i` at `i * 3`) can be uploaded as-is. Only Y ever changes after
/// construction.
pub struct ParticleField {
    positions: Vec<Vec3>,
    dirty: bool,
}

impl ParticleField {
    /// Scatters `count` particles uniformly in a cube of side `spread` centered on the origin.
    pub fn random(count: usize, spread: f32, rng: &mut impl Rng) -> Self {
        let mut coordinate = || (rng.gen::<f32>() - 0.5) * spread;

        let positions = (0..count)
            .map(|_| Vec3::new(coordinate(), coordinate(), coordinate()))
            .collect();

        Self::from_positions(positions)
    }

    pub fn from_positions(positions: Vec<Vec3>) -> Self {
        Self {
            positions,
            dirty: true,
        }
    }

    /// Moves every particle along Y by `sin(t * tf + (x + z) * sf) * amplitude`.
    ///
    /// `now_ms` is wall-clock time in milliseconds. The offset is added to the
    /// current Y, so drift accumulates across frames.
    pub fn advance(&mut self, now_ms: f64, wave: &WaveConfig) {
        let time_phase = now_ms * wave.time_frequency;

        for position in &mut self.positions {
            let phase = time_phase
                + f64::from(position.x) * wave.spatial_frequency
                + f64::from(position.z) * wave.spatial_frequency;

            position.y += phase.sin() as f32 * wave.amplitude;
        }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    #[cfg(test)]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns whether the positions changed since the last call and clears the flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    #[cfg(test)]
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn as_flat(&self) -> &[f32] {
        bytemuck::cast_slice(&self.positions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, SeedableRng};

    fn seeded_field(count: usize) -> ParticleField {
        ParticleField::random(count, 6.0, &mut StdRng::seed_from_u64(42))
    }

    #[test]
    fn random_field_stays_inside_the_cube() {
        let field = seeded_field(1500);

        assert_eq!(field.len(), 1500);
        assert_eq!(field.as_flat().len(), 1500 * 3);
        for position in field.positions() {
            assert!(position.abs().max_element() <= 3.0);
        }
    }

    #[test]
    fn flat_view_uses_stride_of_three() {
        let field = ParticleField::from_positions(vec![
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(4.0, 5.0, 6.0),
        ]);

        assert_eq!(field.as_flat()[3..6], [4.0, 5.0, 6.0]);
    }

    #[test]
    fn only_y_changes_over_many_frames() {
        let mut field = seeded_field(200);
        let initial = field.positions().to_vec();

        for frame in 0..500 {
            field.advance(frame as f64 * 16.7, &WaveConfig::default());
        }

        for (before, after) in initial.iter().zip(field.positions()) {
            assert_eq!(before.x, after.x);
            assert_eq!(before.z, after.z);
        }
        assert!(initial
            .iter()
            .zip(field.positions())
            .any(|(before, after)| before.y != after.y));
    }

    #[test]
    fn update_is_deterministic() {
        let mut first = seeded_field(50);
        let mut second = seeded_field(50);

        first.advance(12_345.0, &WaveConfig::default());
        second.advance(12_345.0, &WaveConfig::default());

        assert_eq!(first.positions(), second.positions());
    }

    #[test]
    fn four_particles_at_time_zero() {
        let initial = vec![
            Vec3::new(0.5, 0.0, -0.25),
            Vec3::new(-1.0, 1.0, 2.0),
            Vec3::new(2.5, -2.5, 0.0),
            Vec3::new(0.0, 0.0, 0.0),
        ];
        let mut field = ParticleField::from_positions(initial.clone());

        field.advance(0.0, &WaveConfig::default());

        for (before, after) in initial.iter().zip(field.positions()) {
            let expected = before.y + (3.0 * before.x + 3.0 * before.z).sin() * 0.001;
            assert_relative_eq!(after.y, expected, epsilon = 1e-6);
            assert_eq!(after.x, before.x);
            assert_eq!(after.z, before.z);
        }
    }

    #[test]
    fn drift_accumulates_instead_of_resetting() {
        let start = Vec3::new(0.1, 0.0, 0.1);
        let mut field = ParticleField::from_positions(vec![start]);

        field.advance(0.0, &WaveConfig::default());
        field.advance(0.0, &WaveConfig::default());

        let step = (0.6f32).sin() * 0.001;
        assert_relative_eq!(field.positions()[0].y, 2.0 * step, epsilon = 1e-7);
    }

    #[test]
    fn dirty_flag_is_consumed_once() {
        let mut field = seeded_field(3);
        assert!(field.take_dirty());
        assert!(!field.take_dirty());

        field.mark_dirty();
        assert!(field.is_dirty());
        assert!(field.take_dirty());
    }
}
