/// Size of the drawable area in logical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportSize {
    pub width: u32,
    pub height: u32,
}

impl ViewportSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

#[derive(Debug, Clone)]
pub struct Viewport {
    size: ViewportSize,
    device_pixel_ratio: f64,
    max_pixel_ratio: f32,
}

impl Viewport {
    pub fn new(size: ViewportSize, device_pixel_ratio: f64, max_pixel_ratio: f32) -> Self {
        Self {
            size,
            device_pixel_ratio,
            max_pixel_ratio,
        }
    }

    pub fn resize(&mut self, size: ViewportSize, device_pixel_ratio: f64) {
        self.size = size;
        self.device_pixel_ratio = device_pixel_ratio;
    }

    pub fn size(&self) -> ViewportSize {
        self.size
    }

    pub fn aspect(&self) -> f32 {
        self.size.aspect()
    }

    /// Device pixel ratio capped at the configured maximum.
    pub fn pixel_ratio(&self) -> f32 {
        (self.device_pixel_ratio as f32).min(self.max_pixel_ratio)
    }
}
