// Copyright 2026 the dagflow-rs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! [`Labels`]: the free-form annotation bag attached to every node and (optionally) output.
//!
//! Pure data, as spec §3 requires: nothing here reads or mutates graph/flags state.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use hashbrown::HashMap;

/// Free-form annotation bag (spec §3 `Labels`, §6 "Label files").
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Labels {
    pub text: Option<Box<str>>,
    pub graph: Option<Box<str>>,
    pub latex: Option<Box<str>>,
    pub axis: Option<Box<str>>,
    pub xaxis: Option<Box<str>>,
    pub plottitle: Option<Box<str>>,
    pub roottitle: Option<Box<str>>,
    pub rootaxis: Option<Box<str>>,
    /// Short glyph, e.g. for compact plot legends.
    pub mark: Option<Box<str>>,
    pub plotmethod: Option<Box<str>>,
    pub node_hidden: bool,

    /// Dotted origin paths within a [`crate::storage::NodeStorage`] that this label bag is
    /// reachable from; populated by [`crate::storage::NodeStorage::read_paths`].
    pub paths: Vec<Box<str>>,
    /// Combinatorial index values/labels for storage entries that expand into a family
    /// (`"index_values"`/`"index_dict"` in spec §3).
    pub index_values: Vec<Box<str>>,
    pub index_dict: HashMap<Box<str>, Box<str>>,
}

impl Labels {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor mirroring the Python `Labels(label or name)` shorthand: a bare
    /// string sets `text`.
    #[must_use]
    pub fn from_text(text: impl Into<Box<str>>) -> Self {
        let mut l = Self::new();
        l.text = Some(text.into());
        l
    }

    /// `plottitle ← latex ← text` fallback chain (spec §3).
    #[must_use]
    pub fn plottitle(&self) -> Option<&str> {
        self.plottitle
            .as_deref()
            .or(self.latex.as_deref())
            .or(self.text.as_deref())
    }

    /// `rootaxis ← axis` fallback chain, used by root-facing axis titles.
    #[must_use]
    pub fn rootaxis(&self) -> Option<&str> {
        self.rootaxis.as_deref().or(self.axis.as_deref())
    }

    /// `xaxis ← axis` fallback chain.
    #[must_use]
    pub fn xaxis_or_axis(&self) -> Option<&str> {
        self.xaxis.as_deref().or(self.axis.as_deref())
    }

    /// `graph ← text` fallback, used for graphviz node labels.
    #[must_use]
    pub fn graph_or_text(&self) -> Option<&str> {
        self.graph.as_deref().or(self.text.as_deref())
    }

    /// Formats `template`, substituting `{key}`, `{index}`, `{space_key}`, `{key_space}` (spec §6)
    /// from `key` and `index`. Unknown placeholders are left untouched.
    #[must_use]
    pub fn format_template(template: &str, key: &str, index: &str) -> String {
        template
            .replace("{space_key}", &alloc::format!(" {key}"))
            .replace("{key_space}", &alloc::format!("{key} "))
            .replace("{key}", key)
            .replace("{index}", index)
    }

    /// Merges another label bag's `Some` fields into `self`, leaving already-set fields alone.
    /// Used by `NodeStorage::read_labels`'s longest-prefix group merge (spec §4.10).
    pub fn merge_missing(&mut self, other: &Self) {
        macro_rules! fill {
            ($field:ident) => {
                if self.$field.is_none() {
                    self.$field = other.$field.clone();
                }
            };
        }
        fill!(text);
        fill!(graph);
        fill!(latex);
        fill!(axis);
        fill!(xaxis);
        fill!(plottitle);
        fill!(roottitle);
        fill!(rootaxis);
        fill!(mark);
        fill!(plotmethod);
        if !other.node_hidden {
            // node_hidden is only ever escalated, never silently inherited as "visible".
        } else {
            self.node_hidden = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plottitle_falls_back_through_latex_to_text() {
        let mut l = Labels::new();
        l.text = Some("x".into());
        assert_eq!(l.plottitle(), Some("x"));
        l.latex = Some("$x$".into());
        assert_eq!(l.plottitle(), Some("$x$"));
        l.plottitle = Some("X title".into());
        assert_eq!(l.plottitle(), Some("X title"));
    }

    #[test]
    fn format_template_substitutes_known_placeholders() {
        let out = Labels::format_template("{key}: bin {index}{space_key}", "weight", "3");
        assert_eq!(out, "weight: bin 3 weight");
    }

    #[test]
    fn merge_missing_does_not_override_present_fields() {
        let mut a = Labels::new();
        a.text = Some("mine".into());
        let mut b = Labels::new();
        b.text = Some("theirs".into());
        b.axis = Some("x".into());
        a.merge_missing(&b);
        assert_eq!(a.text.as_deref(), Some("mine"));
        assert_eq!(a.axis.as_deref(), Some("x"));
    }
}
