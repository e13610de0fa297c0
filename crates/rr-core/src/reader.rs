//! Line-oriented access to the three race sources.

use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Cursor};
use std::path::{Path, PathBuf};

/// File name of the driver abbreviations source.
pub const ABBREVIATIONS_FILE: &str = "abbreviations.txt";
/// File name of the start log source.
pub const START_LOG_FILE: &str = "start.log";
/// File name of the end log source.
pub const END_LOG_FILE: &str = "end.log";

/// Identifies one of the three race sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Abbreviations,
    StartLog,
    EndLog,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Abbreviations => "abbreviations",
            Self::StartLog => "start log",
            Self::EndLog => "end log",
        };
        write!(f, "{s}")
    }
}

/// A readable text source.
///
/// Every call to [`open`](TextSource::open) starts from the beginning, which
/// is what makes [`read_lines`] restartable.
pub trait TextSource: Send + Sync {
    /// Human-readable location, used in errors and logs.
    fn location(&self) -> String;

    /// Opens the source for reading from the start.
    fn open(&self) -> io::Result<Box<dyn BufRead + '_>>;
}

/// A source backed by a file on disk.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TextSource for FileSource {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn open(&self) -> io::Result<Box<dyn BufRead + '_>> {
        let file = File::open(&self.path)?;
        Ok(Box::new(BufReader::new(file)))
    }
}

/// A source held in memory. Useful for tests and embedding.
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    text: String,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }
}

impl TextSource for MemorySource {
    fn location(&self) -> String {
        format!("<{}>", self.name)
    }

    fn open(&self) -> io::Result<Box<dyn BufRead + '_>> {
        Ok(Box::new(Cursor::new(self.text.as_bytes())))
    }
}

/// A trimmed, non-empty line and its 1-based position in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub number: usize,
    pub text: String,
}

/// Lazy iterator over the non-blank lines of a source.
pub struct Lines<'a> {
    inner: io::Lines<Box<dyn BufRead + 'a>>,
    number: usize,
}

impl Iterator for Lines<'_> {
    type Item = io::Result<Line>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let raw = match self.inner.next()? {
                Ok(raw) => raw,
                Err(err) => return Some(Err(err)),
            };
            self.number += 1;
            let mut text = raw.as_str();
            if self.number == 1 {
                text = text.trim_start_matches('\u{feff}');
            }
            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            return Some(Ok(Line {
                number: self.number,
                text: text.to_string(),
            }));
        }
    }
}

/// Opens a source and returns its non-blank lines, trimmed, in order.
pub fn read_lines(source: &dyn TextSource) -> io::Result<Lines<'_>> {
    let reader = source.open()?;
    Ok(Lines {
        inner: reader.lines(),
        number: 0,
    })
}

/// The three named sources that make up one race.
pub struct RaceSources {
    abbreviations: Box<dyn TextSource>,
    start_log: Box<dyn TextSource>,
    end_log: Box<dyn TextSource>,
}

impl RaceSources {
    pub fn new(
        abbreviations: impl TextSource + 'static,
        start_log: impl TextSource + 'static,
        end_log: impl TextSource + 'static,
    ) -> Self {
        Self {
            abbreviations: Box::new(abbreviations),
            start_log: Box::new(start_log),
            end_log: Box::new(end_log),
        }
    }

    /// Sources laid out as `abbreviations.txt`, `start.log` and `end.log` in `dir`.
    pub fn from_dir(dir: &Path) -> Self {
        Self::new(
            FileSource::new(dir.join(ABBREVIATIONS_FILE)),
            FileSource::new(dir.join(START_LOG_FILE)),
            FileSource::new(dir.join(END_LOG_FILE)),
        )
    }

    pub fn get(&self, kind: SourceKind) -> &dyn TextSource {
        match kind {
            SourceKind::Abbreviations => self.abbreviations.as_ref(),
            SourceKind::StartLog => self.start_log.as_ref(),
            SourceKind::EndLog => self.end_log.as_ref(),
        }
    }
}

impl fmt::Debug for RaceSources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RaceSources")
            .field("abbreviations", &self.abbreviations.location())
            .field("start_log", &self.start_log.location())
            .field("end_log", &self.end_log.location())
            .finish()
    }
}
