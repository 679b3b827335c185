// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
svgpp compiles the svg++ diagram markup to standards-conforming SVG and
rasterizes either flavor to PNG.

svg++ is SVG extended with a private namespace of composite constructs:
flex containers that measure and arrange their children, a layered/
circular/radial graph primitive, automatically routed arrows with optional
anchors, and a template/instance/include mechanism for reuse. The compiler
rewrites those constructs into plain SVG, asking a resvg-backed geometry
oracle for real bounding boxes wherever layout depends on rendered
geometry.

```no_run
let source = r#"<diag:diagram xmlns:diag="https://svgpp.dev/ns">
  <diag:flex padding="8"><text>Ping</text></diag:flex>
</diag:diagram>"#;
let svg = svgpp::compile(source, &svgpp::Options::default()).unwrap();
let png = svgpp::render_png(&svg, 2.0, None, 20.0, &[]).unwrap();
# let _ = png;
```
*/

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod arrow;
mod bounds;
mod compile;
mod error;
mod flex;
mod fonts;
mod geom;
mod graph;
mod include;
pub mod oracle;
mod raster;
mod render;
pub mod resources;
mod style;
mod template;
mod text;
mod tree;
mod units;

pub use compile::{compile, Options};
pub use error::{Error, GraphError, IncludeError};
pub use raster::render_png;
