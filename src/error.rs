use std::path::{Path, PathBuf};

pub type AmusingResult<T> = Result<T, AmusingError>;

#[derive(thiserror::Error, Debug)]
pub enum AmusingError {
    #[error("failed to decode audio '{}': {reason}", path.display())]
    Decode { path: PathBuf, reason: String },

    #[error("score error in '{}': {reason}", path.display())]
    ScoreParse { path: PathBuf, reason: String },

    #[error("transform error: {0}")]
    Transform(String),

    #[error("frame index {index} out of range (frame count {frame_count})")]
    FrameIndex { index: i64, frame_count: usize },

    #[error("encode error: {0}")]
    Encode(String),

    #[error("external tool '{tool}' failed: {reason}")]
    ExternalTool { tool: String, reason: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl AmusingError {
    pub fn decode(path: &Path, reason: impl ToString) -> Self {
        Self::Decode {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub fn score(path: &Path, reason: impl ToString) -> Self {
        Self::ScoreParse {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub fn transform(msg: impl Into<String>) -> Self {
        Self::Transform(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    pub fn external(tool: impl Into<String>, reason: impl ToString) -> Self {
        Self::ExternalTool {
            tool: tool.into(),
            reason: reason.to_string(),
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_context() {
        let err = AmusingError::decode(Path::new("song.wav"), "no audio tracks");
        assert!(err.to_string().contains("song.wav"));
        assert!(err.to_string().contains("no audio tracks"));

        let err = AmusingError::FrameIndex {
            index: -1,
            frame_count: 30,
        };
        assert!(err.to_string().contains("-1"));
        assert!(err.to_string().contains("30"));

        let err = AmusingError::external("mscore", "exit status 1");
        assert!(err.to_string().starts_with("external tool 'mscore'"));
    }

    #[test]
    fn io_keeps_source() {
        let err = AmusingError::io("create outdir", std::io::Error::other("denied"));
        assert!(err.to_string().contains("create outdir: denied"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
