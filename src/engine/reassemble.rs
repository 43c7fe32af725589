use tracing::warn;

use super::document::Run;

/// Runs absorbed after the starting run before an unterminated marker is abandoned.
pub const DEFAULT_MAX_ABSORB: usize = 5;

pub const DECLARATION_SENTINEL: char = '^';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerSyntax {
    /// `^label{identifier}^`
    Declaration,
    /// `<prefix>tag{identifier}`, closed by the first `}`.
    Reference { prefix: String },
}

impl MarkerSyntax {
    pub fn reference(prefix: impl Into<String>) -> Self {
        Self::Reference {
            prefix: prefix.into(),
        }
    }

    pub fn opener(&self) -> &str {
        match self {
            Self::Declaration => "^",
            Self::Reference { prefix } => prefix,
        }
    }

    fn terminator(&self) -> char {
        match self {
            Self::Declaration => DECLARATION_SENTINEL,
            Self::Reference { .. } => '}',
        }
    }

    fn trailer_len(&self) -> usize {
        match self {
            Self::Declaration => DECLARATION_SENTINEL.len_utf8(),
            Self::Reference { .. } => 0,
        }
    }
}

/// Location of a complete marker inside a run sequence. Offsets are byte offsets into the run
/// text as it was when the span was located; `end_offset` is exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerSpan {
    start_run: usize,
    start_offset: usize,
    end_run: usize,
    end_offset: usize,
    text: String,
    body_start: usize,
    body_end: usize,
}

impl MarkerSpan {
    pub fn start_run(&self) -> usize {
        self.start_run
    }

    pub fn start_offset(&self) -> usize {
        self.start_offset
    }

    pub fn end_run(&self) -> usize {
        self.end_run
    }

    pub fn end_offset(&self) -> usize {
        self.end_offset
    }

    pub fn runs_spanned(&self) -> usize {
        self.end_run - self.start_run + 1
    }

    /// Case-folded marker text, opener and terminator included.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Marker text without the opener and without a closing sentinel, e.g. `sec1{intro}`.
    pub fn body(&self) -> &str {
        &self.text[self.body_start..self.body_end]
    }

    pub fn into_text(self) -> String {
        self.text
    }

    /// Removes the marker from the runs it was located in. Runs that lie entirely inside the
    /// marker are emptied, never removed.
    pub fn erase(&self, runs: &mut [Run]) {
        if self.start_run == self.end_run {
            runs[self.start_run]
                .text
                .replace_range(self.start_offset..self.end_offset, "");
            return;
        }

        runs[self.start_run].text.truncate(self.start_offset);
        for run in &mut runs[self.start_run + 1..self.end_run] {
            run.text.clear();
        }
        runs[self.end_run].text.replace_range(..self.end_offset, "");
    }

    /// Erases the marker and writes `replacement` where it began. Returns the offset just past
    /// the replacement in the starting run.
    pub fn splice(&self, runs: &mut [Run], replacement: &str) -> usize {
        self.erase(runs);
        runs[self.start_run]
            .text
            .insert_str(self.start_offset, replacement);
        self.start_offset + replacement.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncompleteMarker {
    pub run: usize,
    pub offset: usize,
    pub absorbed: usize,
    pub partial: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Located {
    NotFound,
    Complete(MarkerSpan),
    Incomplete(IncompleteMarker),
}

/// Finds the first marker that opens in `runs[start_run]` at or after byte offset `from`.
///
/// When the terminator is not in the starting run, following runs are absorbed one at a time;
/// after `max_absorb` of them, or at the end of the paragraph, the marker is reported as
/// incomplete. Nothing is modified here.
pub fn locate(
    runs: &[Run],
    start_run: usize,
    from: usize,
    syntax: &MarkerSyntax,
    max_absorb: usize,
) -> Located {
    let Some(first) = runs.get(start_run) else {
        return Located::NotFound;
    };
    let opener = syntax.opener();
    let Some(start_offset) = find_ignore_ascii_case(&first.text, opener, from) else {
        return Located::NotFound;
    };

    let terminator = syntax.terminator();
    let after_opener = start_offset + opener.len();
    if let Some(position) = first.text[after_opener..].find(terminator) {
        let end_offset = after_opener + position + terminator.len_utf8();
        return Located::Complete(build_span(
            syntax,
            first.text[start_offset..end_offset].to_lowercase(),
            (start_run, start_offset),
            (start_run, end_offset),
        ));
    }

    let mut buffer = first.text[start_offset..].to_string();
    let mut absorbed = 0;
    let mut index = start_run + 1;
    loop {
        if absorbed >= max_absorb || index >= runs.len() {
            return Located::Incomplete(IncompleteMarker {
                run: start_run,
                offset: start_offset,
                absorbed,
                partial: buffer.to_lowercase(),
            });
        }

        let text = &runs[index].text;
        absorbed += 1;
        if let Some(position) = text.find(terminator) {
            let end_offset = position + terminator.len_utf8();
            buffer.push_str(&text[..end_offset]);
            return Located::Complete(build_span(
                syntax,
                buffer.to_lowercase(),
                (start_run, start_offset),
                (index, end_offset),
            ));
        }

        buffer.push_str(text);
        index += 1;
    }
}

fn build_span(
    syntax: &MarkerSyntax,
    text: String,
    (start_run, start_offset): (usize, usize),
    (end_run, end_offset): (usize, usize),
) -> MarkerSpan {
    let body_start = syntax.opener().len();
    let body_end = text.len().saturating_sub(syntax.trailer_len()).max(body_start);
    MarkerSpan {
        start_run,
        start_offset,
        end_run,
        end_offset,
        text,
        body_start,
        body_end,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reassembly {
    pub text: String,
    pub found: bool,
}

/// Recovers the marker opening in `runs[start_index]` and blanks every span that contributed
/// to it. On failure the runs are left untouched and an incomplete-marker diagnostic is logged.
pub fn reassemble(
    runs: &mut [Run],
    start_index: usize,
    syntax: &MarkerSyntax,
    max_absorb: usize,
) -> Reassembly {
    match locate(runs, start_index, 0, syntax, max_absorb) {
        Located::Complete(span) => {
            span.erase(runs);
            Reassembly {
                text: span.into_text(),
                found: true,
            }
        }
        Located::Incomplete(marker) => {
            warn!(
                run = marker.run,
                absorbed = marker.absorbed,
                marker = %marker.partial,
                "incomplete marker"
            );
            Reassembly {
                text: marker.partial,
                found: false,
            }
        }
        Located::NotFound => Reassembly {
            text: String::new(),
            found: false,
        },
    }
}

/// Walks a paragraph marker by marker. After a `Complete` marker the caller decides where
/// scanning resumes: past the marker with `skip_past`, or at a rewritten position with
/// `resume_at`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanCursor {
    run: usize,
    offset: usize,
}

impl ScanCursor {
    pub fn next_marker(
        &mut self,
        runs: &[Run],
        syntax: &MarkerSyntax,
        max_absorb: usize,
    ) -> Option<Located> {
        while self.run < runs.len() {
            match locate(runs, self.run, self.offset, syntax, max_absorb) {
                Located::NotFound => {
                    self.run += 1;
                    self.offset = 0;
                }
                Located::Incomplete(marker) => {
                    self.run = marker.run;
                    self.offset = marker.offset + syntax.opener().len();
                    return Some(Located::Incomplete(marker));
                }
                complete => return Some(complete),
            }
        }
        None
    }

    pub fn skip_past(&mut self, span: &MarkerSpan) {
        self.run = span.end_run;
        self.offset = span.end_offset;
    }

    pub fn resume_at(&mut self, run: usize, offset: usize) {
        self.run = run;
        self.offset = offset;
    }
}

// `needle` is ASCII, so every match starts on a char boundary.
fn find_ignore_ascii_case(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let hay = haystack.as_bytes();
    let pattern = needle.as_bytes();
    if pattern.is_empty() || from > hay.len() || hay.len() - from < pattern.len() {
        return None;
    }

    (from..=hay.len() - pattern.len())
        .find(|&index| hay[index..index + pattern.len()].eq_ignore_ascii_case(pattern))
}
