pub mod render_bridge;
pub mod tagger;
