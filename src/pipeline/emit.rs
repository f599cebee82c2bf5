//! Format emission: wrap composed code in the requested artifact shape.

use crate::config::OutputFormat;

/// Wrap `code` for `format`.
///
/// HTML that is already a full document passes through; any other HTML is
/// shown inside `<pre>` in a minimal page. TSX and JSX get a React component
/// and Dart a Flutter widget, each showing the code in a `<pre>` / `Text`.
/// Unknown formats pass through unchanged.
pub fn emit(code: &str, format: &OutputFormat) -> String {
    match format {
        OutputFormat::Html => {
            let lower = code.to_ascii_lowercase();
            if lower.contains("<html") && lower.contains("<body") {
                code.to_string()
            } else {
                html_page(code)
            }
        }
        OutputFormat::Tsx => react_component(code, ": React.FC"),
        OutputFormat::Jsx => react_component(code, ""),
        OutputFormat::Dart => flutter_widget(code),
        OutputFormat::Other(_) => code.to_string(),
    }
}

fn html_page(code: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Generated Code</title>
</head>
<body>
    <pre>{code}</pre>
</body>
</html>"#
    )
}

fn react_component(code: &str, annotation: &str) -> String {
    format!(
        r#"import React from 'react';

const GeneratedComponent{annotation} = () => {{
  return (
    <div>
      <pre>{code}</pre>
    </div>
  );
}};

export default GeneratedComponent;
"#
    )
}

fn flutter_widget(code: &str) -> String {
    format!(
        r#"import 'package:flutter/material.dart';

class GeneratedWidget extends StatelessWidget {{
  @override
  Widget build(BuildContext context) {{
    return Scaffold(
      body: SingleChildScrollView(
        child: Text(
          '{}',
        ),
      ),
    );
  }}
}}
"#,
        dart_string_escape(code)
    )
}

/// Escape for a single-quoted Dart literal.
fn dart_string_escape(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('$', "\\$")
        .replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_html_document_passes_through() {
        let doc = "<!DOCTYPE html><HTML><Body><p>x</p></Body></HTML>";
        assert_eq!(emit(doc, &OutputFormat::Html), doc);
    }

    #[test]
    fn html_fragment_is_wrapped() {
        let out = emit("<p>x</p>", &OutputFormat::Html);
        assert!(out.starts_with("<!DOCTYPE html>"));
        assert!(out.contains("<pre><p>x</p></pre>"));
        assert!(out.contains("<title>Generated Code</title>"));
    }

    #[test]
    fn tsx_and_jsx_components() {
        let tsx = emit("<b>hi</b>", &OutputFormat::Tsx);
        assert!(tsx.contains("const GeneratedComponent: React.FC = () => {"));
        assert!(tsx.contains("<pre><b>hi</b></pre>"));
        assert!(tsx.contains("export default GeneratedComponent;"));

        let jsx = emit("<b>hi</b>", &OutputFormat::Jsx);
        assert!(jsx.contains("const GeneratedComponent = () => {"));
        assert!(!jsx.contains("React.FC"));
    }

    #[test]
    fn dart_widget_escapes_literal() {
        let out = emit("it's $5\nok", &OutputFormat::Dart);
        assert!(out.contains("class GeneratedWidget extends StatelessWidget {"));
        assert!(out.contains(r"'it\'s \$5\nok',"));
    }

    #[test]
    fn other_format_is_untouched() {
        let code = "<template><p/></template>";
        assert_eq!(emit(code, &OutputFormat::Other("vue".into())), code);
    }
}
