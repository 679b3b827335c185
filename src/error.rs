// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::fmt;

/// List of all compile/render errors, grouped by kind.
///
/// Every error carries a stable machine-readable code (see [`Error::code`]);
/// consumers dispatch on the kind, never on a message.
#[derive(Debug)]
pub enum Error {
    /// Malformed XML input, with the parser position when available.
    Xml {
        /// Parser message.
        message: String,
        /// 1-based line.
        line: Option<u32>,
        /// 1-based column.
        column: Option<u32>,
    },

    /// Semantic failure in templates, anchors or arrows.
    Semantic(String),

    /// A shared template source could not be used.
    Template(String),

    /// Failure while expanding a `diag:include`.
    Include(IncludeError),

    /// Failure while expanding a `diag:graph`.
    Graph(GraphError),

    /// The requested focus id does not exist in the rendered SVG.
    FocusNotFound(String),

    /// Any unexpected failure.
    Internal(String),
}

/// Include failures, one variant per error code.
#[derive(Debug)]
pub enum IncludeError {
    /// Missing `src`, nonpositive scale.
    Args(String),
    /// The referenced file could not be read.
    NotFound(String),
    /// The referenced file is not well-formed XML.
    Parse(String),
    /// The referenced file's root is not `diag:diagram`.
    Root(String),
    /// The include chain re-entered a file.
    Cycle(String),
    /// The include chain exceeded the depth limit.
    Depth(String),
    /// An `id` appears more than once after expansion.
    IdCollision(String),
}

/// Graph failures, one variant per error code.
#[derive(Debug)]
pub enum GraphError {
    /// Invalid graph attribute.
    Args(String),
    /// A `diag:node` without an `id`.
    NodeMissingId(String),
    /// The same node id declared twice.
    DuplicateNode(String),
    /// A node id colliding with an id outside the graph.
    IdCollision(String),
    /// An edge endpoint referencing an undeclared node.
    UnknownNode(String),
    /// An edge from a node to itself.
    SelfEdge(String),
    /// A graph child other than `diag:node`/`diag:edge`.
    ChildUnsupported(String),
    /// A graph nested inside a graph.
    NestedUnsupported(String),
    /// Node or edge count over the limit.
    TooLarge(String),
    /// `dot` is required for this layout but not installed.
    GraphvizUnavailable(String),
    /// `dot` failed, timed out or could not be spawned.
    LayoutFailed(String),
    /// `dot` produced output we could not understand.
    LayoutParse(String),
}

impl Error {
    /// The stable error code for this kind.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Xml { .. } => "E_PARSE_XML",
            Error::Semantic(_) => "E_SVGPP_SEMANTIC",
            Error::Template(_) => "E_TEMPLATE",
            Error::Include(e) => e.code(),
            Error::Graph(e) => e.code(),
            Error::FocusNotFound(_) => "E_FOCUS_NOT_FOUND",
            Error::Internal(_) => "E_INTERNAL",
        }
    }

    /// Parser position, when the error kind has one.
    pub fn position(&self) -> (Option<u32>, Option<u32>) {
        match self {
            Error::Xml { line, column, .. } => (*line, *column),
            _ => (None, None),
        }
    }
}

impl IncludeError {
    /// The stable error code for this kind.
    pub fn code(&self) -> &'static str {
        match self {
            IncludeError::Args(_) => "E_INCLUDE_ARGS",
            IncludeError::NotFound(_) => "E_INCLUDE_NOT_FOUND",
            IncludeError::Parse(_) => "E_INCLUDE_PARSE",
            IncludeError::Root(_) => "E_INCLUDE_ROOT",
            IncludeError::Cycle(_) => "E_INCLUDE_CYCLE",
            IncludeError::Depth(_) => "E_INCLUDE_DEPTH",
            IncludeError::IdCollision(_) => "E_INCLUDE_ID_COLLISION",
        }
    }

    fn message(&self) -> &str {
        match self {
            IncludeError::Args(m)
            | IncludeError::NotFound(m)
            | IncludeError::Parse(m)
            | IncludeError::Root(m)
            | IncludeError::Cycle(m)
            | IncludeError::Depth(m)
            | IncludeError::IdCollision(m) => m,
        }
    }
}

impl GraphError {
    /// The stable error code for this kind.
    pub fn code(&self) -> &'static str {
        match self {
            GraphError::Args(_) => "E_GRAPH_ARGS",
            GraphError::NodeMissingId(_) => "E_GRAPH_NODE_MISSING_ID",
            GraphError::DuplicateNode(_) => "E_GRAPH_DUPLICATE_NODE",
            GraphError::IdCollision(_) => "E_GRAPH_ID_COLLISION",
            GraphError::UnknownNode(_) => "E_GRAPH_UNKNOWN_NODE",
            GraphError::SelfEdge(_) => "E_GRAPH_SELF_EDGE",
            GraphError::ChildUnsupported(_) => "E_GRAPH_CHILD_UNSUPPORTED",
            GraphError::NestedUnsupported(_) => "E_GRAPH_NESTED_UNSUPPORTED",
            GraphError::TooLarge(_) => "E_GRAPH_TOO_LARGE",
            GraphError::GraphvizUnavailable(_) => "E_GRAPHVIZ_UNAVAILABLE",
            GraphError::LayoutFailed(_) => "E_GRAPH_LAYOUT_FAILED",
            GraphError::LayoutParse(_) => "E_GRAPH_LAYOUT_PARSE",
        }
    }

    fn message(&self) -> &str {
        match self {
            GraphError::Args(m)
            | GraphError::NodeMissingId(m)
            | GraphError::DuplicateNode(m)
            | GraphError::IdCollision(m)
            | GraphError::UnknownNode(m)
            | GraphError::SelfEdge(m)
            | GraphError::ChildUnsupported(m)
            | GraphError::NestedUnsupported(m)
            | GraphError::TooLarge(m)
            | GraphError::GraphvizUnavailable(m)
            | GraphError::LayoutFailed(m)
            | GraphError::LayoutParse(m) => m,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Xml {
                message,
                line: Some(line),
                column: Some(column),
            } => {
                write!(
                    f,
                    "failed to parse XML at line {}, column {}: {}",
                    line, column, message
                )
            }
            Error::Xml { message, .. } => write!(f, "failed to parse XML: {}", message),
            Error::Semantic(m) => write!(f, "{}", m),
            Error::Template(m) => write!(f, "{}", m),
            Error::Include(e) => write!(f, "{}", e.message()),
            Error::Graph(e) => write!(f, "{}", e.message()),
            Error::FocusNotFound(id) => write!(f, "focus id \"{}\" not found", id),
            Error::Internal(m) => write!(f, "{}", m),
        }
    }
}

impl std::error::Error for Error {}

impl From<IncludeError> for Error {
    fn from(e: IncludeError) -> Self {
        Error::Include(e)
    }
}

impl From<GraphError> for Error {
    fn from(e: GraphError) -> Self {
        Error::Graph(e)
    }
}
