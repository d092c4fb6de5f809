pub mod colormap;
pub mod frame;
pub mod text;

pub use colormap::Colormap;
pub use frame::{Frame, FrameRenderer, RenderStyle};
pub use text::FrameOverlay;
