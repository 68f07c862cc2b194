//! ABOUTME: Positional XPath tracker producing index-qualified element paths
//! ABOUTME: Sibling counters are keyed on the parent's indexed path so repeats never collide

use std::collections::HashMap;
use std::fmt;

/// Stack of element frames plus a counter per parent-qualified path
///
/// Counters survive `pop`, so pushing the same element under the same parent
/// again continues the numbering (`item[1]`, `item[2]`, then `item[3]`).
#[derive(Debug, Clone, Default)]
pub struct XPath {
    frames: Vec<Frame>,
    counters: HashMap<String, usize>,
}

#[derive(Debug, Clone)]
struct Frame {
    name: String,
    index: usize,
}

impl XPath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter `name` as a child of the current element and return its 1-based index
    pub fn push(&mut self, name: &str) -> usize {
        let key = format!("{}/{}", self, name);
        let counter = self.counters.entry(key).or_insert(0);
        *counter += 1;
        let index = *counter;
        self.frames.push(Frame {
            name: name.to_string(),
            index,
        });
        index
    }

    /// Leave the current element
    pub fn pop(&mut self) -> Option<String> {
        self.frames.pop().map(|frame| frame.name)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Name of the element currently open, if any
    pub fn current(&self) -> Option<&str> {
        self.frames.last().map(|frame| frame.name.as_str())
    }

    /// Rendered path, `/` when nothing is open
    pub fn path(&self) -> String {
        if self.frames.is_empty() {
            "/".to_string()
        } else {
            self.to_string()
        }
    }

    /// Path of a singular child of the current element, e.g. `/alert[1]/note[1]`
    pub fn child(&self, name: &str) -> String {
        format!("{}/{}[1]", self, name)
    }
}

impl fmt::Display for XPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.frames.is_empty() {
            // Root key prefix is empty so the first push yields "/alert"
            return Ok(());
        }
        for frame in &self.frames {
            write!(f, "/{}[{}]", frame.name, frame.index)?;
        }
        Ok(())
    }
}
