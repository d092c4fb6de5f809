pub mod generate;
pub mod jobs;
pub mod mscx;
pub mod musescore;
pub mod note;
pub mod plan;
pub mod visibility;

pub use generate::Amusing;
pub use jobs::Job;
pub use mscx::Score;
pub use musescore::MuseScore;
