use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Mutex;

use super::mscx::Score;
use super::note::Note;
use super::plan::ExportStep;
use super::visibility::apply_reveal;
use crate::error::{AmusingError, AmusingResult};

/// Produces one raster image of the score for an export step.
pub trait NotationRenderer: Send + Sync {
    fn export(&self, score: &Score, step: &ExportStep, out: &Path) -> AmusingResult<()>;
}

/// Drives the MuseScore command line.
pub struct MuseScore {
    executable: PathBuf,
    dpi: f64,
    temp_dir: PathBuf,
    keep_temp: bool,
    serial: Option<Mutex<()>>,
    max_tremolo: Note,
}

impl MuseScore {
    /// `width` is the target image width in pixels; the export resolution
    /// follows from the score's page width.
    pub fn new(executable: impl Into<PathBuf>, width: u32, score: &Score, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            dpi: width as f64 / score.page_width,
            temp_dir: temp_dir.into(),
            keep_temp: false,
            serial: None,
            max_tremolo: Note::new(32),
        }
    }

    pub fn keep_temp(mut self, keep: bool) -> Self {
        self.keep_temp = keep;
        self
    }

    /// Runs one MuseScore process at a time.
    pub fn serial(mut self, serial: bool) -> Self {
        self.serial = serial.then(|| Mutex::new(()));
        self
    }

    /// Two-chord tremolos at least this fast are drawn one chord at a time
    /// while the reveal point is inside them.
    pub fn max_tremolo(mut self, max_tremolo: Note) -> Self {
        self.max_tremolo = max_tremolo;
        self
    }

    pub fn dpi(&self) -> f64 {
        self.dpi
    }

    fn tool(&self) -> String {
        self.executable.display().to_string()
    }

    fn temp_path(&self) -> PathBuf {
        let worker = rayon::current_thread_index().unwrap_or(0);
        self.temp_dir.join(format!(".amusing_worker-{:02}.mscx", worker))
    }

    pub fn args(&self, input: &Path, output: &Path) -> Vec<String> {
        vec![
            input.display().to_string(),
            "-o".to_string(),
            output.display().to_string(),
            "-r".to_string(),
            format!("{:.3}", self.dpi),
        ]
    }

    fn run(&self, input: &Path, output: &Path) -> AmusingResult<()> {
        let _turn = self
            .serial
            .as_ref()
            .map(|m| m.lock().unwrap_or_else(|poisoned| poisoned.into_inner()));

        log::debug!("{} {}", self.tool(), self.args(input, output).join(" "));
        let result = Command::new(&self.executable)
            .args(self.args(input, output))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| AmusingError::external(self.tool(), format!("failed to launch: {}", e)))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
            return Err(AmusingError::external(
                self.tool(),
                format!(
                    "exited with {} exporting '{}': {}",
                    result.status,
                    output.display(),
                    tail.into_iter().rev().collect::<Vec<_>>().join(" | ")
                ),
            ));
        }
        Ok(())
    }

    /// Removes the temp directory when nothing is left in it.
    pub fn cleanup(&self) {
        if self.keep_temp {
            return;
        }
        if std::fs::remove_dir(&self.temp_dir).is_ok() {
            log::debug!("Removed {}", self.temp_dir.display());
        }
    }
}

/// MuseScore writes one `<stem>-<page>.png` per page.
fn page_path(out: &Path, page: u32) -> PathBuf {
    let stem = out
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    out.with_file_name(format!("{}-{}.png", stem, page))
}

fn remove_if_exists(path: &Path) -> AmusingResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(AmusingError::io(format!("failed to remove '{}'", path.display()), e)),
    }
}

impl NotationRenderer for MuseScore {
    fn export(&self, score: &Score, step: &ExportStep, out: &Path) -> AmusingResult<()> {
        let xml = apply_reveal(score, &step.reveal, self.max_tremolo)?;

        std::fs::create_dir_all(&self.temp_dir).map_err(|e| {
            AmusingError::io(format!("failed to create '{}'", self.temp_dir.display()), e)
        })?;
        let temp = self.temp_path();
        std::fs::write(&temp, xml)
            .map_err(|e| AmusingError::io(format!("failed to write '{}'", temp.display()), e))?;

        self.run(&temp, out)?;

        let wanted = page_path(out, step.page);
        if wanted.exists() {
            std::fs::rename(&wanted, out).map_err(|e| {
                AmusingError::io(format!("failed to move '{}'", wanted.display()), e)
            })?;
        } else if !(score.page_count == 1 && out.exists()) {
            return Err(AmusingError::external(
                self.tool(),
                format!("page {} of frame {} was not produced", step.page, step.frame),
            ));
        }
        for page in (1..=score.page_count).filter(|&p| p != step.page) {
            remove_if_exists(&page_path(out, page))?;
        }

        if !self.keep_temp {
            remove_if_exists(&temp)?;
        }
        log::debug!("Exported frame {} (page {})", step.frame, step.page);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::mscx::tests::triplet_score;
    use crate::score::plan::Reveal;

    fn step(page: u32) -> ExportStep {
        ExportStep {
            frame: 7,
            page,
            reveal: Reveal::Full,
            timestamp: None,
        }
    }

    #[test]
    fn dpi_from_page_width() {
        let score = triplet_score();
        let ms = MuseScore::new("mscore", 1700, &score, "tmp");
        assert!((ms.dpi() - 200.0).abs() < 1e-9);
        let args = ms.args(Path::new("in.mscx"), Path::new("out.png"));
        assert_eq!(args, vec!["in.mscx", "-o", "out.png", "-r", "200.000"]);
    }

    #[test]
    fn page_paths() {
        assert_eq!(
            page_path(Path::new("frames/frm0003.png"), 2),
            PathBuf::from("frames/frm0003-2.png")
        );
    }

    #[test]
    fn missing_executable_is_external_tool_error() {
        let dir = tempfile::tempdir().unwrap();
        let score = triplet_score();
        let ms = MuseScore::new(dir.path().join("no-such-musescore"), 800, &score, dir.path().join("tmp"));
        let err = ms
            .export(&score, &step(1), &dir.path().join("frm0007.png"))
            .unwrap_err();
        assert!(matches!(err, AmusingError::ExternalTool { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn keeps_requested_page_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("fake-mscore");
        std::fs::write(
            &exe,
            "#!/bin/sh\nbase=\"${3%.png}\"\nprintf one > \"$base-1.png\"\nprintf two > \"$base-2.png\"\n",
        )
        .unwrap();
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();

        let score = triplet_score();
        let temp = dir.path().join("tmp");
        let ms = MuseScore::new(&exe, 850, &score, &temp).serial(true);
        let out = dir.path().join("frm0007.png");
        ms.export(&score, &step(2), &out).unwrap();

        assert_eq!(std::fs::read_to_string(&out).unwrap(), "two");
        assert!(!dir.path().join("frm0007-1.png").exists());
        assert!(!dir.path().join("frm0007-2.png").exists());
        ms.cleanup();
        assert!(!temp.exists());
    }

    #[cfg(unix)]
    #[test]
    fn failing_tool_reports_stderr() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("broken-mscore");
        std::fs::write(&exe, "#!/bin/sh\necho 'cannot read score' >&2\nexit 3\n").unwrap();
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();

        let score = triplet_score();
        let ms = MuseScore::new(&exe, 850, &score, dir.path().join("tmp")).keep_temp(true);
        let err = ms
            .export(&score, &step(1), &dir.path().join("frm0007.png"))
            .unwrap_err();
        assert!(err.to_string().contains("cannot read score"));
        assert!(dir.path().join("tmp").exists());
    }
}
