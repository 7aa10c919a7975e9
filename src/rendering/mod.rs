pub mod frame_uniform;
pub mod mesh_pass;
pub mod points_pass;
pub mod render_model;
pub mod renderer;
pub mod shadow_pass;
pub mod texture;
