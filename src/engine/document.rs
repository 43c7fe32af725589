/// A styled text fragment. The engine only reads and rewrites its text; the container that
/// produced it keeps whatever formatting belongs to the fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Run {
    pub text: String,
}

impl Run {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Ordered runs of one paragraph. Passes mutate run text in place and never add or remove runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Paragraph {
    pub runs: Vec<Run>,
}

impl Paragraph {
    pub fn new(runs: Vec<Run>) -> Self {
        Self { runs }
    }

    pub fn from_texts<S: AsRef<str>>(texts: &[S]) -> Self {
        Self::new(texts.iter().map(|text| Run::new(text.as_ref())).collect())
    }

    pub fn text(&self) -> String {
        self.runs.iter().map(|run| run.text.as_str()).collect()
    }

    pub fn run_texts(&self) -> Vec<&str> {
        self.runs.iter().map(|run| run.text.as_str()).collect()
    }
}
