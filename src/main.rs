// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::io::{IsTerminal, Read, Write};
use std::path::{Path, PathBuf};

use pico_args::Arguments;

const HELP: &str = "\
svgpp compiles svg++ diagram markup to SVG and renders SVG/svg++ to PNG.

USAGE:
  svgpp [OPTIONS] compile [FILE] [COMPILE-OPTIONS]
  svgpp [OPTIONS] render  [FILE] [RENDER-OPTIONS]
  svgpp cheatsheet | patterns | prompt | skill

OPTIONS:
  -h, --help                Prints this help
  -V, --version             Prints version
      --error-format FMT    Error output format [default: text]
                            [possible values: text, json]
      --debug               Prints error details for bug reports
      --quiet               Disables warnings

COMPILE-OPTIONS:
      --text SOURCE         Raw svg++ source instead of FILE
      --stdout              Writes the SVG to stdout
  -o, --output PATH         Output path [default: FILE with .svg]
      --templates GLOB      Shared template file glob, loaded left-to-right
                            (repeat the flag for multiple globs)

RENDER-OPTIONS:
      --text SOURCE         Raw SVG/svg++ source instead of FILE
      --stdout              Writes the PNG bytes to stdout
  -o, --output PATH         Output path [default: FILE with .png]
      --focus ID            Crops the viewport to this element
      --padding PAD         Focus padding [default: 20]
      --scale FACTOR        Raster scale, must be > 0 [default: 1]
      --templates GLOB      Shared template file glob (svg++ input only)

ARGS:
  <FILE>                    Input file; stdin is read when FILE and --text
                            are both absent
";

struct CliError {
    code: &'static str,
    message: String,
    hint: Option<String>,
    exit_code: i32,
    file: Option<String>,
    line: Option<u32>,
    column: Option<u32>,
    retryable: bool,
}

impl CliError {
    fn new(code: &'static str, message: impl Into<String>, exit_code: i32) -> Self {
        CliError {
            code,
            message: message.into(),
            hint: None,
            exit_code,
            file: None,
            line: None,
            column: None,
            retryable: true,
        }
    }

    fn args(message: impl Into<String>) -> Self {
        CliError::new("E_ARGS", message, 2)
            .hint("Use one of: compile, render, cheatsheet, patterns, prompt, skill.")
    }

    fn hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    fn file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }
}

impl From<svgpp::Error> for CliError {
    fn from(e: svgpp::Error) -> Self {
        let code = e.code();
        let (line, column) = e.position();
        let (exit_code, hint) = match &e {
            svgpp::Error::Xml { .. } => (
                2,
                "Ensure input is well-formed XML and escape &, <, > in text.",
            ),
            svgpp::Error::Semantic(_) => (3, "Check svg++ semantics and template usage."),
            svgpp::Error::Template(_) => (3, "Check --templates sources and their namespaces."),
            svgpp::Error::Include(_) => (3, "Check diag:include src paths and nesting."),
            svgpp::Error::Graph(svgpp::GraphError::GraphvizUnavailable(_)) => {
                (3, "Install Graphviz or use layout=\"layered\".")
            }
            svgpp::Error::Graph(_) => (3, "Check diag:graph nodes, edges and attributes."),
            svgpp::Error::FocusNotFound(_) => (
                4,
                "Check id attributes in your SVG/svg++ and retry --focus.",
            ),
            svgpp::Error::Internal(_) => (1, "Re-run with --debug for details."),
        };

        let mut err = CliError::new(code, e.to_string(), exit_code).hint(hint);
        err.line = line;
        err.column = column;
        err.retryable = !matches!(e, svgpp::Error::Internal(_));
        err
    }
}

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    let mut args = Arguments::from_env();

    if args.contains(["-h", "--help"]) {
        print!("{}", HELP);
        return 0;
    }
    if args.contains(["-V", "--version"]) {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return 0;
    }

    let debug = args.contains("--debug") || std::env::var_os("SVGPP_DEBUG").is_some();
    let quiet = args.contains("--quiet");

    let error_format = match args.opt_value_from_str::<_, String>("--error-format") {
        Ok(value) => value.unwrap_or_else(|| "text".to_string()),
        Err(e) => {
            emit_error(&CliError::args(e.to_string()), "text");
            return 2;
        }
    };
    if error_format != "text" && error_format != "json" {
        let err = CliError::args(format!(
            "--error-format must be \"text\" or \"json\", got \"{}\"",
            error_format
        ));
        emit_error(&err, "text");
        return 2;
    }

    if !quiet {
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(log::LevelFilter::Warn);
        }
    }

    match dispatch(args) {
        Ok(()) => 0,
        Err(err) => {
            emit_error(&err, &error_format);
            if debug {
                eprintln!("debug: code={} exit={}", err.code, err.exit_code);
            }
            err.exit_code
        }
    }
}

fn dispatch(mut args: Arguments) -> Result<(), CliError> {
    let subcommand = args
        .subcommand()
        .map_err(|e| CliError::args(e.to_string()))?;

    match subcommand.as_deref() {
        Some("compile") => handle_compile(args),
        Some("render") => handle_render(args),
        Some("cheatsheet") => {
            println!("{}", svgpp::resources::cheatsheet());
            Ok(())
        }
        Some("patterns") => {
            println!("{}", svgpp::resources::patterns());
            Ok(())
        }
        Some("prompt") => {
            println!("{}", svgpp::resources::prompt());
            Ok(())
        }
        Some("skill") => {
            println!("{}", svgpp::resources::skill());
            Ok(())
        }
        Some(other) => Err(CliError::args(format!("unknown subcommand \"{}\"", other))),
        None => Err(CliError::args("missing subcommand")),
    }
}

fn handle_compile(mut args: Arguments) -> Result<(), CliError> {
    let text: Option<String> = opt_value(&mut args, "--text")?;
    let to_stdout = args.contains("--stdout");
    let output: Option<PathBuf> = opt_value(&mut args, ["-o", "--output"])?;
    let template_globs: Vec<String> = values(&mut args, "--templates")?;
    let input: Option<String> = free_arg(args)?;

    if to_stdout && output.is_some() {
        return Err(CliError::args("--stdout and --output are mutually exclusive")
            .hint("Choose either --stdout or --output."));
    }

    let (source, source_path) = read_input(input.as_deref(), text.as_deref())?;
    let template_sources = resolve_template_sources(&template_globs)?;

    let options = compile_options(template_sources, source_path.as_deref());
    let svg_text = svgpp::compile(&source, &options)?;

    match source_path {
        Some(ref path) if !to_stdout => {
            let out_path = output.unwrap_or_else(|| path.with_extension("svg"));
            write_text(&out_path, &svg_text)?;
            println!("Wrote {}", out_path.display());
        }
        _ => {
            print!("{}", svg_text);
            if !svg_text.ends_with('\n') {
                println!();
            }
        }
    }
    Ok(())
}

fn handle_render(mut args: Arguments) -> Result<(), CliError> {
    let text: Option<String> = opt_value(&mut args, "--text")?;
    let to_stdout = args.contains("--stdout");
    let output: Option<PathBuf> = opt_value(&mut args, ["-o", "--output"])?;
    let focus: Option<String> = opt_value(&mut args, "--focus")?;
    let padding: f64 = opt_value(&mut args, "--padding")?.unwrap_or(20.0);
    let scale: f64 = opt_value(&mut args, "--scale")?.unwrap_or(1.0);
    let template_globs: Vec<String> = values(&mut args, "--templates")?;
    let input: Option<String> = free_arg(args)?;

    if to_stdout && output.is_some() {
        return Err(CliError::args("--stdout and --output are mutually exclusive")
            .hint("Choose either --stdout or --output."));
    }
    if scale <= 0.0 {
        return Err(CliError::new("E_ARGS", "--scale must be > 0", 2)
            .hint("Use a positive scale factor like 1 or 2."));
    }

    let (source, source_path) = read_input(input.as_deref(), text.as_deref())?;
    let template_sources = resolve_template_sources(&template_globs)?;

    let svg_text = if is_svgpp(&source) {
        let options = compile_options(template_sources, source_path.as_deref());
        svgpp::compile(&source, &options)?
    } else {
        if !template_sources.is_empty() {
            return Err(CliError::new(
                "E_TEMPLATE",
                "--templates can only be used with svg++ input",
                3,
            )
            .hint("Remove --templates or provide <diag:diagram> input."));
        }
        source
    };

    let png = svgpp::render_png(&svg_text, scale, focus.as_deref(), padding, &[])?;

    match source_path {
        Some(ref path) if !to_stdout => {
            let out_path = output.unwrap_or_else(|| path.with_extension("png"));
            write_bytes(&out_path, &png)?;
            println!("Wrote {}", out_path.display());
        }
        _ => {
            std::io::stdout().write_all(&png).map_err(|e| {
                CliError::new("E_IO_WRITE", format!("failed to write to stdout: {}", e), 4)
            })?;
        }
    }
    Ok(())
}

fn compile_options(
    shared_template_sources: Vec<String>,
    source_path: Option<&Path>,
) -> svgpp::Options {
    svgpp::Options {
        shared_template_sources,
        base_dir: source_path.and_then(|p| p.parent()).map(|p| p.to_path_buf()),
        source_path: source_path.map(|p| p.to_path_buf()),
        ..svgpp::Options::default()
    }
}

fn is_svgpp(source: &str) -> bool {
    match roxmltree::Document::parse(source) {
        Ok(doc) => doc.root_element().tag_name().name() == "diagram",
        Err(_) => false,
    }
}

fn opt_value<T>(args: &mut Arguments, keys: impl Into<pico_args::Keys>) -> Result<Option<T>, CliError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    args.opt_value_from_str(keys)
        .map_err(|e| CliError::args(e.to_string()))
}

fn values(args: &mut Arguments, key: &'static str) -> Result<Vec<String>, CliError> {
    args.values_from_str(key)
        .map_err(|e| CliError::args(e.to_string()))
}

fn free_arg(mut args: Arguments) -> Result<Option<String>, CliError> {
    let input: Option<String> = args
        .opt_free_from_str()
        .map_err(|e| CliError::args(e.to_string()))?;
    let rest = args.finish();
    if !rest.is_empty() {
        return Err(CliError::args(format!(
            "unexpected argument {:?}",
            rest[0]
        )));
    }
    Ok(input)
}

fn read_input(
    path: Option<&str>,
    text: Option<&str>,
) -> Result<(String, Option<PathBuf>), CliError> {
    if path.is_some() && text.is_some() {
        return Err(
            CliError::new("E_ARGS", "--text cannot be combined with file input", 2)
                .hint("Use either FILE or --text."),
        );
    }

    if let Some(text) = text {
        return Ok((text.to_string(), None));
    }

    if let Some(path) = path {
        let path = PathBuf::from(path);
        if !path.exists() {
            return Err(CliError::new(
                "E_IO_READ",
                format!("input file not found: {}", path.display()),
                2,
            )
            .file(path.display().to_string()));
        }
        let source = std::fs::read_to_string(&path).map_err(|e| {
            CliError::new(
                "E_IO_READ",
                format!("failed to read input file: {}", path.display()),
                2,
            )
            .hint(e.to_string())
            .file(path.display().to_string())
        })?;
        return Ok((source, Some(path)));
    }

    if std::io::stdin().is_terminal() {
        return Err(CliError::new("E_ARGS", "no input provided", 2)
            .hint("Use a subcommand with FILE, --text, or pipe stdin."));
    }

    let mut data = String::new();
    std::io::stdin()
        .read_to_string(&mut data)
        .map_err(|e| CliError::new("E_IO_READ", format!("failed to read stdin: {}", e), 2))?;
    if data.trim().is_empty() {
        return Err(CliError::new("E_ARGS", "stdin was empty", 2)
            .hint("Pipe SVG/svg++ content into stdin."));
    }
    Ok((data, None))
}

fn resolve_template_sources(patterns: &[String]) -> Result<Vec<String>, CliError> {
    let mut paths: Vec<PathBuf> = Vec::new();
    for pattern in patterns {
        let walker = globwalk::glob(pattern).map_err(|e| {
            CliError::new(
                "E_TEMPLATE",
                format!("invalid template glob \"{}\": {}", pattern, e),
                3,
            )
        })?;
        let mut matches: Vec<PathBuf> = walker
            .filter_map(|entry| entry.ok().map(|e| e.into_path()))
            .collect();
        if matches.is_empty() {
            return Err(CliError::new(
                "E_TEMPLATE",
                format!("template glob matched no files: {}", pattern),
                3,
            )
            .hint("Provide at least one existing .svg++ template file."));
        }
        matches.sort();
        paths.extend(matches);
    }

    let mut sources = Vec::with_capacity(paths.len());
    for path in paths {
        let source = std::fs::read_to_string(&path).map_err(|e| {
            CliError::new(
                "E_TEMPLATE",
                format!("failed to read template file: {}", path.display()),
                3,
            )
            .hint(e.to_string())
            .file(path.display().to_string())
        })?;
        sources.push(source);
    }
    Ok(sources)
}

fn write_text(path: &Path, content: &str) -> Result<(), CliError> {
    std::fs::write(path, content).map_err(|e| {
        CliError::new(
            "E_IO_WRITE",
            format!("failed to write output file: {}", path.display()),
            4,
        )
        .hint(e.to_string())
        .file(path.display().to_string())
    })
}

fn write_bytes(path: &Path, content: &[u8]) -> Result<(), CliError> {
    std::fs::write(path, content).map_err(|e| {
        CliError::new(
            "E_IO_WRITE",
            format!("failed to write output file: {}", path.display()),
            4,
        )
        .hint(e.to_string())
        .file(path.display().to_string())
    })
}

fn emit_error(err: &CliError, error_format: &str) {
    if error_format == "json" {
        let payload = serde_json::json!({
            "ok": false,
            "code": err.code,
            "message": err.message.as_str(),
            "file": &err.file,
            "line": err.line,
            "column": err.column,
            "hint": &err.hint,
            "retryable": err.retryable,
        });
        eprintln!("{}", payload);
        return;
    }

    eprintln!("error[{}]: {}", err.code, err.message);
    if let Some(ref hint) = err.hint {
        eprintln!("hint: {}", hint);
    }
}

/// A simple stderr logger.
static LOGGER: SimpleLogger = SimpleLogger;
struct SimpleLogger;
impl log::Log for SimpleLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::LevelFilter::Warn
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            let target = if !record.target().is_empty() {
                record.target()
            } else {
                record.module_path().unwrap_or_default()
            };
            eprintln!("{} (in {}): {}", record.level(), target, record.args());
        }
    }

    fn flush(&self) {}
}
