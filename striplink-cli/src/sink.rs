//! Destinations for received frames.

use log::{debug, error};
use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Render a frame the way it is stored: lines joined by `\n`, trimmed.
pub(crate) fn render_frame(frame: &[String]) -> String {
    frame
        .join("\n")
        .trim()
        .to_string()
}

/// Overwrites one file with every frame.
#[derive(Debug)]
pub(crate) struct FileSink {
    path: PathBuf,
    // Listeners on several ports share one file.
    lock: Mutex<()>,
}

impl FileSink {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the file content with the frame.
    pub(crate) fn write_frame(&self, frame: &[String]) -> io::Result<()> {
        let _guard = self
            .lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        fs::write(&self.path, render_frame(frame))
    }
}

/// Where `listen` puts frames.
#[derive(Debug)]
pub(crate) enum FrameSink {
    /// Overwrite a file.
    File(FileSink),
    /// Print to stdout, one frame per block.
    Stdout,
}

impl FrameSink {
    pub(crate) fn from_path(path: Option<&Path>) -> Self {
        path.map_or(Self::Stdout, |path| Self::File(FileSink::new(path)))
    }

    /// Store one frame. Failures are logged, never returned.
    pub(crate) fn deliver(&self, port: &str, frame: &[String]) {
        match self {
            Self::File(sink) => match sink.write_frame(frame) {
                Ok(()) => debug!("[{port}] Frame written to {}", sink.path().display()),
                Err(e) => error!("[{port}] Cannot write {}: {e}", sink.path().display()),
            },
            Self::Stdout => {
                let mut stdout = io::stdout().lock();
                let result = writeln!(stdout, "{}", render_frame(frame)).and_then(|()| stdout.flush());
                if let Err(e) = result {
                    error!("[{port}] Cannot write frame to stdout: {e}");
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn test_render_frame_joins_and_trims() {
        assert_eq!(render_frame(&lines(&["  FF0000", "00FF00  "])), "FF0000\n00FF00");
        assert_eq!(render_frame(&[]), "");
    }

    #[test]
    fn test_file_sink_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.txt");
        let sink = FileSink::new(&path);

        sink.write_frame(&lines(&["first", "frame", "longer"]))
            .unwrap();
        sink.write_frame(&lines(&["second"]))
            .unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
    }

    #[test]
    fn test_deliver_swallows_write_errors() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FrameSink::from_path(Some(&dir.path().join("missing").join("frame.txt")));
        sink.deliver("test", &lines(&["x"]));
    }

    #[test]
    fn test_from_path() {
        assert!(matches!(FrameSink::from_path(None), FrameSink::Stdout));
        assert!(matches!(
            FrameSink::from_path(Some(Path::new("out.txt"))),
            FrameSink::File(_)
        ));
    }
}
