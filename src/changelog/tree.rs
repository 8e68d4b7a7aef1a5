//! Markdown changelog as a tree of titled sections.
//!
//! Each node holds free-standing entries (list items or paragraphs) followed by ordered,
//! titled subsections. Merging two trees is a set union: entries already present are not
//! repeated, so folding the same fragments in twice yields the same text.

use regex::Regex;
use std::sync::LazyLock;

static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?ms)^[ \t]*<!--.*?-->[ \t]*$").expect("comment regex is valid")
});

/// A section tree parsed from markdown
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangelogTree {
    entries: Vec<String>,
    sections: Vec<(String, ChangelogTree)>,
}

impl ChangelogTree {
    /// Empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Tree with the given empty top level sections, in order
    pub fn with_sections<I, S>(titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut tree = Self::new();
        for title in titles {
            tree.section(title);
        }
        tree
    }

    /// Parse markdown. HTML comments on their own lines are dropped.
    pub fn parse(text: &str) -> Self {
        let cleaned = COMMENT_RE.replace_all(text, "");
        let lines: Vec<&str> = cleaned.lines().collect();
        Self::parse_lines(&lines)
    }

    fn parse_lines(lines: &[&str]) -> Self {
        let mut tree = Self::new();
        let first_heading = lines.iter().position(|l| heading(l).is_some()).unwrap_or(lines.len());
        tree.entries = split_entries(&lines[..first_heading]);

        let mut pos = first_heading;
        while pos < lines.len() {
            let Some((level, title)) = heading(lines[pos]) else {
                pos += 1;
                continue;
            };
            let body_start = pos + 1;
            let body_end = lines[body_start..]
                .iter()
                .position(|l| heading(l).is_some_and(|(lvl, _)| lvl <= level))
                .map_or(lines.len(), |offset| body_start + offset);

            let body = Self::parse_lines(&lines[body_start..body_end]);
            tree.section(title).union_with(&body);
            pos = body_end;
        }
        tree
    }

    /// Render as markdown, top level sections as `#` headings
    pub fn render(&self) -> String {
        self.render_at(1)
    }

    fn render_at(&self, level: usize) -> String {
        let mut out: String = self.entries.iter().map(|e| format!("{e}\n\n")).collect();
        if !out.is_empty() {
            out.push('\n');
        }
        for (title, body) in &self.sections {
            out.push_str(&"#".repeat(level));
            out.push(' ');
            out.push_str(title);
            out.push_str("\n\n");
            out.push_str(&body.render_at(level + 1));
        }
        out
    }

    /// Entries directly under this node
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Titles of the direct subsections, in order
    pub fn titles(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|(t, _)| t.as_str())
    }

    /// Subsection `title`, if present
    pub fn get(&self, title: &str) -> Option<&ChangelogTree> {
        self.sections.iter().find(|(t, _)| t == title).map(|(_, s)| s)
    }

    /// Subsection `title`, created empty at the end if missing
    pub fn section(&mut self, title: impl Into<String>) -> &mut ChangelogTree {
        let title = title.into();
        let idx = match self.sections.iter().position(|(t, _)| *t == title) {
            Some(idx) => idx,
            None => {
                self.sections.push((title, Self::new()));
                self.sections.len() - 1
            }
        };
        &mut self.sections[idx].1
    }

    /// Append an entry unless an identical one exists
    pub fn push_entry(&mut self, entry: impl Into<String>) {
        let entry = entry.into();
        if !self.entries.contains(&entry) {
            self.entries.push(entry);
        }
    }

    /// Replace all entries of this node
    pub fn set_entries(&mut self, entries: Vec<String>) {
        self.entries = entries;
    }

    /// Whether the node has neither entries nor sections
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.sections.is_empty()
    }

    /// Fold `other` into `self` with set semantics
    pub fn union_with(&mut self, other: &ChangelogTree) {
        for entry in &other.entries {
            self.push_entry(entry.clone());
        }
        for (title, body) in &other.sections {
            self.section(title.clone()).union_with(body);
        }
    }

    /// Union of two trees, keeping the section order of `self`
    pub fn union(&self, other: &ChangelogTree) -> ChangelogTree {
        let mut merged = self.clone();
        merged.union_with(other);
        merged
    }

    /// Remove sections that are empty after recursively stripping them
    pub fn strip(&mut self) {
        for (_, body) in &mut self.sections {
            body.strip();
        }
        self.sections.retain(|(_, body)| !body.is_empty());
    }

    /// Rename section `old` in place
    pub fn rename(&mut self, old: &str, new: &str) {
        if self.get(new).is_some() {
            if let Some(idx) = self.sections.iter().position(|(t, _)| t == old) {
                let (_, body) = self.sections.remove(idx);
                self.section(new).union_with(&body);
            }
            return;
        }
        if let Some((title, _)) = self.sections.iter_mut().find(|(t, _)| t == old) {
            *title = new.to_string();
        }
    }

    /// Nest the whole tree under a single section `header`
    pub fn add_header(&mut self, header: impl Into<String>) {
        let inner = std::mem::take(self);
        self.sections.push((header.into(), inner));
    }

    /// Move section `title` behind all others
    pub fn move_to_end(&mut self, title: &str) {
        if let Some(idx) = self.sections.iter().position(|(t, _)| t == title) {
            let section = self.sections.remove(idx);
            self.sections.push(section);
        }
    }

    /// Insert an entry in front of all others
    pub fn prepend_entry(&mut self, entry: impl Into<String>) {
        self.entries.insert(0, entry.into());
    }
}

fn heading(line: &str) -> Option<(usize, &str)> {
    let level = line.chars().take_while(|c| *c == '#').count();
    if level == 0 {
        return None;
    }
    let title = line[level..].strip_prefix(' ')?.trim();
    (!title.is_empty()).then_some((level, title))
}

/// Split body lines into entries at blank lines and at top level list items
fn split_entries(lines: &[&str]) -> Vec<String> {
    let mut entries = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    let mut flush = |current: &mut Vec<&str>| {
        let entry = current.join("\n");
        let entry = entry.trim();
        if !entry.is_empty() {
            entries.push(entry.to_string());
        }
        current.clear();
    };

    for line in lines {
        if line.trim().is_empty() {
            flush(&mut current);
        } else if line.starts_with("- ") && !current.is_empty() {
            flush(&mut current);
            current.push(line);
        } else {
            current.push(line);
        }
    }
    flush(&mut current);
    entries
}
