//! Output multiplexing for concurrent rollout monitors.
//!
//! A [`LogAggregator`] hands out one [`PrefixedWriter`] per monitored
//! resource. Writers get colors from a fixed palette in creation order, and
//! every write goes to the shared sink as one `[prefix] content` chunk.

use std::io::{self, Write};
use std::sync::Arc;

use console::Style;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Colors assigned to prefixed writers, in assignment order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixColor {
    LightRed,
    LightGreen,
    LightYellow,
    LightBlue,
    LightPurple,
    Red,
    Green,
    Yellow,
    Blue,
    Purple,
    Cyan,
}

pub const PALETTE: [PrefixColor; 11] = [
    PrefixColor::LightRed,
    PrefixColor::LightGreen,
    PrefixColor::LightYellow,
    PrefixColor::LightBlue,
    PrefixColor::LightPurple,
    PrefixColor::Red,
    PrefixColor::Green,
    PrefixColor::Yellow,
    PrefixColor::Blue,
    PrefixColor::Purple,
    PrefixColor::Cyan,
];

impl PrefixColor {
    pub fn style(self) -> Style {
        let style = Style::new();
        match self {
            Self::LightRed => style.red().bright(),
            Self::LightGreen => style.green().bright(),
            Self::LightYellow => style.yellow().bright(),
            Self::LightBlue => style.blue().bright(),
            Self::LightPurple => style.magenta().bright(),
            Self::Red => style.red(),
            Self::Green => style.green(),
            Self::Yellow => style.yellow(),
            Self::Blue => style.blue(),
            Self::Purple => style.magenta(),
            Self::Cyan => style.cyan(),
        }
    }
}

/// When to emit color escapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// Follow terminal detection
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn apply(self, style: Style) -> Style {
        match self {
            Self::Auto => style,
            Self::Always => style.force_styling(true),
            Self::Never => style.force_styling(false),
        }
    }
}

/// Output sink shared between writers. Each write holds the lock.
#[derive(Clone)]
pub struct SharedSink {
    inner: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl SharedSink {
    pub fn new(output: impl Write + Send + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(output))),
        }
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Write `buf` in full and flush, as one uninterrupted chunk.
    pub fn write_chunk(&self, buf: &[u8]) -> io::Result<()> {
        let mut output = self.inner.lock();
        output.write_all(buf)?;
        output.flush()
    }

    /// Write an unprefixed line.
    pub fn write_line(&self, line: &str) -> io::Result<()> {
        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
        self.write_chunk(&buf)
    }
}

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_chunk(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().flush()
    }
}

/// Prefix and color handed to one writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterEntry {
    pub prefix: String,
    pub color: PrefixColor,
}

/// Hands out prefixed, colored writers over a shared sink.
pub struct LogAggregator {
    output: SharedSink,
    color_mode: ColorMode,
    writers: Mutex<Vec<WriterEntry>>,
}

impl LogAggregator {
    pub fn new(output: SharedSink) -> Self {
        Self {
            output,
            color_mode: ColorMode::default(),
            writers: Mutex::new(Vec::new()),
        }
    }

    pub fn with_color_mode(mut self, mode: ColorMode) -> Self {
        self.color_mode = mode;
        self
    }

    /// Create a writer that prefixes and colors everything written to it.
    pub fn get_output(&self, prefix: &str) -> PrefixedWriter {
        let mut writers = self.writers.lock();
        let color = PALETTE[writers.len() % PALETTE.len()];
        writers.push(WriterEntry {
            prefix: prefix.to_string(),
            color,
        });

        PrefixedWriter {
            output: self.output.clone(),
            prefix: prefix.to_string(),
            color,
            style: self.color_mode.apply(color.style()),
        }
    }

    /// Writers handed out so far, in creation order.
    pub fn writers(&self) -> Vec<WriterEntry> {
        self.writers.lock().clone()
    }
}

/// Writer emitting `[prefix] ` in its color before every chunk.
pub struct PrefixedWriter {
    output: SharedSink,
    prefix: String,
    color: PrefixColor,
    style: Style,
}

impl PrefixedWriter {
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn color(&self) -> PrefixColor {
        self.color
    }
}

impl Write for PrefixedWriter {
    fn write(&mut self, content: &[u8]) -> io::Result<usize> {
        let prefix = self
            .style
            .apply_to(format!("[{}] ", self.prefix))
            .to_string();

        let mut chunk = Vec::with_capacity(prefix.len() + content.len());
        chunk.extend_from_slice(prefix.as_bytes());
        chunk.extend_from_slice(content);
        self.output
            .write_chunk(&chunk)
            .map_err(|e| io::Error::new(e.kind(), format!("error writing prefix to output: {e}")))?;

        Ok(content.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.output.flush()
    }
}
