/// Line-oriented text buffer for generated C.
#[derive(Debug, Default)]
pub struct Emitter {
    buf: String,
    indent: usize,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(&mut self, text: impl AsRef<str>) {
        for _ in 0..self.indent {
            self.buf.push_str("  ");
        }
        self.buf.push_str(text.as_ref());
        self.buf.push('\n');
    }

    /// Labels are written flush left and followed by an empty statement so
    /// a declaration or closing brace may come next.
    pub fn label(&mut self, label: impl AsRef<str>) {
        self.buf.push_str(label.as_ref());
        self.buf.push_str(": ;\n");
    }

    pub fn indent(&mut self) {
        self.indent += 1;
    }

    pub fn dedent(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    /// Hand back everything written so far and start over.
    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.buf)
    }
}

/// `emit!(out, "fmt", args...)` writes one formatted line.
macro_rules! emit {
    ($out:expr, $($arg:tt)*) => {
        $out.line(format!($($arg)*))
    };
}

pub(crate) use emit;
