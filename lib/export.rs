//! Graph exports handed to an external visualization sink.
//!
//! A `GraphExport` is a plain list of labelled nodes and annotated edges.
//! Rendering is the sink's business; `to_dot` is provided for sinks which
//! consume graphviz.

use serde::Serialize;

use crate::Error;

/// A node in a `GraphExport`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ExportNode {
    pub id: String,
    pub label: String,
    pub fill_color: Option<String>,
}

/// An edge in a `GraphExport`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ExportEdge {
    pub from: String,
    pub to: String,
    pub annotation: Option<String>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct GraphExport {
    nodes: Vec<ExportNode>,
    edges: Vec<ExportEdge>,
}

impl GraphExport {
    pub fn new() -> GraphExport {
        GraphExport::default()
    }

    pub fn add_node<S: Into<String>, L: Into<String>>(
        &mut self,
        id: S,
        label: L,
        fill_color: Option<String>,
    ) {
        self.nodes.push(ExportNode {
            id: id.into(),
            label: label.into(),
            fill_color,
        });
    }

    pub fn add_edge<S: Into<String>, T: Into<String>>(
        &mut self,
        from: S,
        to: T,
        annotation: Option<String>,
    ) {
        self.edges.push(ExportEdge {
            from: from.into(),
            to: to.into(),
            annotation,
        });
    }

    pub fn nodes(&self) -> &[ExportNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[ExportEdge] {
        &self.edges
    }

    /// Find an exported node by id.
    pub fn node(&self, id: &str) -> Option<&ExportNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    /// Serialize this export as JSON.
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Returns a string in the graphviz format
    pub fn to_dot(&self) -> String {
        let nodes = self
            .nodes
            .iter()
            .map(|node| {
                format!(
                    "\"{}\" [shape=\"box\", label=\"{}\", style=\"filled\", fillcolor=\"{}\"];",
                    escape(&node.id),
                    escape(&node.label).replace('\n', "\\l"),
                    node.fill_color.as_deref().unwrap_or("white"),
                )
            })
            .collect::<Vec<String>>();

        let edges = self
            .edges
            .iter()
            .map(|edge| match edge.annotation {
                Some(ref annotation) => format!(
                    "\"{}\" -> \"{}\" [label=\"{}\"];",
                    escape(&edge.from),
                    escape(&edge.to),
                    escape(annotation)
                ),
                None => format!("\"{}\" -> \"{}\";", escape(&edge.from), escape(&edge.to)),
            })
            .collect::<Vec<String>>();

        let options = [
            "graph [fontname = \"Courier New\", splines=\"polyline\"]",
            "node [fontname = \"Courier New\"]",
            "edge [fontname = \"Courier New\"]",
        ];

        format!(
            "digraph G {{\n{}\n\n{}\n{}\n}}",
            options.join("\n"),
            nodes.join("\n"),
            edges.join("\n")
        )
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
