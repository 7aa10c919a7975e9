use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Instant,
};

use crate::{demo::DemoState, viewport::ViewportSize};

/// Where frames end up. Implemented by the wgpu renderer.
pub trait RenderSurface {
    fn set_size(&mut self, size: ViewportSize);
    fn set_pixel_ratio(&mut self, pixel_ratio: f32);
    fn render(&mut self, demo: &mut DemoState) -> Result<(), wgpu::SurfaceError>;
}

/// Host primitive that calls back into the loop at the next display refresh.
pub trait FrameScheduler {
    fn request_next_frame(&mut self);
}

/// Milliseconds since an arbitrary, fixed epoch.
pub trait FrameClock {
    fn now_ms(&mut self) -> f64;
}

pub struct WallClock {
    start: Instant,
}

impl WallClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl FrameClock for WallClock {
    fn now_ms(&mut self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped,
}

pub struct AnimationLoop {
    token: CancellationToken,
    state: LoopState,
    frames: u64,
}

impl AnimationLoop {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            state: LoopState::Running,
            frames: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Runs one frame at `now_ms`.
    ///
    /// The next frame is always requested, even when rendering fails; the render
    /// error is handed back afterwards. Once the token is cancelled the loop stops
    /// and further calls do nothing.
    pub fn tick<S, F>(
        &mut self,
        demo: &mut DemoState,
        surface: &mut S,
        scheduler: &mut F,
        now_ms: f64,
    ) -> Result<(), wgpu::SurfaceError>
    where
        S: RenderSurface + ?Sized,
        F: FrameScheduler + ?Sized,
    {
        if self.token.is_cancelled() {
            if self.state == LoopState::Running {
                log::info!("Animation loop stopped after {} frames", self.frames);
            }
            self.state = LoopState::Stopped;
            return Ok(());
        }

        demo.scene.early_update();

        demo.controls.update(&mut demo.camera);

        for animated in &demo.animated {
            animated.apply(&mut demo.scene, now_ms);
        }

        let wave = demo.config.particles.wave;
        demo.particles.advance(now_ms, &wave);
        demo.particles.mark_dirty();

        demo.scene.late_update();

        let rendered = surface.render(demo);
        self.frames += 1;

        scheduler.request_next_frame();

        rendered
    }

    /// Runs frames back to back until the token is cancelled and returns how many ran.
    #[cfg(test)]
    pub fn run_until_cancelled<S, C>(
        &mut self,
        demo: &mut DemoState,
        surface: &mut S,
        clock: &mut C,
    ) -> anyhow::Result<u64>
    where
        S: RenderSurface + ?Sized,
        C: FrameClock + ?Sized,
    {
        let start = self.frames;
        let mut next_frame = NextFrame(true);

        while next_frame.0 && !self.token.is_cancelled() {
            next_frame.0 = false;
            let now_ms = clock.now_ms();
            self.tick(demo, surface, &mut next_frame, now_ms)?;
        }

        self.state = LoopState::Stopped;
        Ok(self.frames - start)
    }
}

#[cfg(test)]
struct NextFrame(bool);

#[cfg(test)]
impl FrameScheduler for NextFrame {
    fn request_next_frame(&mut self) {
        self.0 = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assets::LoadState,
        config::SceneConfig,
        demo::tests::{demo, CountingScheduler, RecordingSurface},
    };
    use approx::assert_relative_eq;
    use glam::{Vec2, Vec3};

    struct SteppingClock {
        now: f64,
        step: f64,
    }

    impl FrameClock for SteppingClock {
        fn now_ms(&mut self) -> f64 {
            let now = self.now;
            self.now += self.step;
            now
        }
    }

    struct FailingSurface;

    impl RenderSurface for FailingSurface {
        fn set_size(&mut self, _size: ViewportSize) {}

        fn set_pixel_ratio(&mut self, _pixel_ratio: f32) {}

        fn render(&mut self, _demo: &mut DemoState) -> Result<(), wgpu::SurfaceError> {
            Err(wgpu::SurfaceError::Timeout)
        }
    }

    fn stop_after(frames: usize, token: &CancellationToken) -> RecordingSurface {
        RecordingSurface {
            cancel_after: Some((frames, token.clone())),
            ..RecordingSurface::default()
        }
    }

    #[test]
    fn runs_a_bounded_number_of_frames() {
        let token = CancellationToken::new();
        let mut demo = demo(SceneConfig::default());
        let mut surface = stop_after(5, &token);
        let mut engine = AnimationLoop::new(token);

        let frames = engine
            .run_until_cancelled(&mut demo, &mut surface, &mut SteppingClock { now: 0.0, step: 16.0 })
            .unwrap();

        assert_eq!(frames, 5);
        assert_eq!(surface.frames.len(), 5);
        assert_eq!(engine.state(), LoopState::Stopped);
    }

    #[test]
    fn particles_are_dirty_when_rendered() {
        let token = CancellationToken::new();
        let mut demo = demo(SceneConfig::default());
        let mut surface = stop_after(3, &token);

        AnimationLoop::new(token)
            .run_until_cancelled(&mut demo, &mut surface, &mut SteppingClock { now: 0.0, step: 16.0 })
            .unwrap();

        assert!(surface.frames.iter().all(|frame| frame.particles_dirty));
    }

    #[test]
    fn camera_is_advanced_before_render() {
        let mut demo = demo(SceneConfig::default());
        demo.controls.rotate_by_pixels(Vec2::new(100.0, 0.0), 600.0);
        let before = demo.camera.position;
        let mut surface = RecordingSurface::default();

        AnimationLoop::new(CancellationToken::new())
            .tick(&mut demo, &mut surface, &mut CountingScheduler::default(), 0.0)
            .unwrap();

        assert_ne!(surface.frames[0].camera_position, before);
    }

    #[test]
    fn next_frame_is_requested_even_when_render_fails() {
        let mut demo = demo(SceneConfig::default());
        let mut scheduler = CountingScheduler::default();
        let mut engine = AnimationLoop::new(CancellationToken::new());

        let result = engine.tick(&mut demo, &mut FailingSurface, &mut scheduler, 0.0);

        assert!(matches!(result, Err(wgpu::SurfaceError::Timeout)));
        assert_eq!(scheduler.0, 1);
    }

    #[test]
    fn render_errors_end_a_headless_run() {
        let mut demo = demo(SceneConfig::default());
        let mut engine = AnimationLoop::new(CancellationToken::new());

        let result = engine.run_until_cancelled(
            &mut demo,
            &mut FailingSurface,
            &mut SteppingClock { now: 0.0, step: 16.0 },
        );

        assert!(result.is_err());
        assert_eq!(engine.frames(), 1);
    }

    #[test]
    fn cancelled_loop_does_no_work() {
        let token = CancellationToken::new();
        token.cancel();
        let mut demo = demo(SceneConfig::default());
        let particles = demo.particles.positions().to_vec();
        let mut scheduler = CountingScheduler::default();
        let mut engine = AnimationLoop::new(token);

        engine
            .tick(&mut demo, &mut RecordingSurface::default(), &mut scheduler, 100.0)
            .unwrap();

        assert_eq!(engine.state(), LoopState::Stopped);
        assert_eq!(scheduler.0, 0);
        assert_eq!(demo.particles.positions(), particles.as_slice());
    }

    #[test]
    fn four_seeded_particles_after_one_frame() {
        let mut config = SceneConfig::default();
        config.particles.count = 4;
        let mut demo = demo(config);
        let initial: Vec<Vec3> = demo.particles.positions().to_vec();

        AnimationLoop::new(CancellationToken::new())
            .tick(
                &mut demo,
                &mut RecordingSurface::default(),
                &mut CountingScheduler::default(),
                0.0,
            )
            .unwrap();

        for (before, after) in initial.iter().zip(demo.particles.positions()) {
            assert_relative_eq!(
                after.y,
                before.y + (3.0 * before.x + 3.0 * before.z).sin() * 0.001,
                epsilon = 1e-6
            );
            assert_eq!((after.x, after.z), (before.x, before.z));
        }
    }

    #[test]
    fn planet_spins_one_radian_in_a_thousand_frames() {
        let token = CancellationToken::new();
        let mut demo = demo(SceneConfig::default());
        let planet = *demo.animated_object("planet").unwrap().handle.get().unwrap();
        let mut surface = stop_after(1000, &token);

        AnimationLoop::new(token)
            .run_until_cancelled(&mut demo, &mut surface, &mut SteppingClock { now: 0.0, step: 7.0 })
            .unwrap();

        let rotation = demo.scene.get_object_transform(planet).unwrap().rotation();
        assert_relative_eq!(rotation.y, 1.0, epsilon = 1e-4);
        assert!(demo
            .animated_object("astronaut")
            .is_some_and(|astronaut| astronaut.handle == LoadState::Pending));
    }
}
