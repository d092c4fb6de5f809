pub mod decode;

pub use decode::{read_audio, AudioBuffer};
