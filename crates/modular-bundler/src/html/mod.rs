//! `index.html` assembly.
//!
//! Apps get a document loading their hashed entry script. Views get a
//! document that loads the trampoline instead, which resolves the shared
//! dependencies before importing the view and rendering it.
//!
//! A target may provide its own template (`public/index.html`). It is
//! interpolated CRA-style (`%PUBLIC_URL%`, `%REACT_APP_*%`) and the tags are
//! injected before `</head>` and `</body>`.

mod minify;

pub use minify::minify_html;

use minijinja::{AutoEscape, Environment, context};

use modular_config::{ClientEnvironment, Paths};

use crate::manifest::BuildManifest;
use crate::relocate::is_style_output;
use crate::trampoline::TRAMPOLINE_FILE;
use crate::{Error, Result};

const APP_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>{{ name }}</title>
    {%- for href in styles %}
    <link rel="stylesheet" href="{{ href }}" />
    {%- endfor %}
    <script>window.process = { env: {{ env_json }} };</script>
  </head>
  <body>
    <noscript>You need to enable JavaScript to run this app.</noscript>
    <div id="root"></div>
    <script type="module" src="{{ script }}"></script>
  </body>
</html>
"#;

const VIEW_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>{{ name }}</title>
    {%- for href in styles %}
    <link rel="stylesheet" href="{{ href }}" />
    {%- endfor %}
    <script>window.process = { env: {{ env_json }} };</script>
  </head>
  <body>
    <noscript>You need to enable JavaScript to run this app.</noscript>
    <div id="root"></div>
    <script type="module">
      import view, { dependencies } from "{{ trampoline }}";
      Promise.resolve(view).then(function (View) {
        var React = dependencies["react"];
        var ReactDOM = dependencies["react-dom"];
        if (!React || !ReactDOM) {
          throw new Error({{ name_json }} + " must share react and react-dom to render standalone");
        }
        ReactDOM.render(React.createElement(View), document.getElementById("root"));
      });
    </script>
  </body>
</html>
"#;

/// Inputs of [`assemble_html`].
#[derive(Debug, Clone, Copy)]
pub struct HtmlInput<'a> {
    /// Target name, used as the document title.
    pub name: &'a str,
    /// Sanitized and relocated manifest.
    pub manifest: &'a BuildManifest,
    pub paths: &'a Paths,
    pub env: &'a ClientEnvironment,
    pub is_view: bool,
    /// Replaces the built-in document.
    pub template: Option<&'a str>,
}

#[derive(Debug)]
struct Tags {
    script: String,
    styles: Vec<String>,
    env_json: String,
}

/// Produce the minified `index.html` for a target.
///
/// Fails with [`Error::AssemblyInvariant`] when the manifest has no script
/// entry point.
pub fn assemble_html(input: &HtmlInput<'_>) -> Result<String> {
    let tags = collect_tags(input)?;

    let document = match input.template {
        Some(template) => inject(template, input.env, &tags),
        None => render_builtin(input, &tags)?,
    };

    Ok(minify_html(&document))
}

fn collect_tags(input: &HtmlInput<'_>) -> Result<Tags> {
    let (entry_path, entry) = input.manifest.script_entry().ok_or_else(|| {
        Error::AssemblyInvariant("the bundler produced no script entry point".to_string())
    })?;

    let script = if input.is_view {
        format!(
            "{}static/js/{}",
            input.paths.public_url_or_path(),
            TRAMPOLINE_FILE
        )
    } else {
        public_url(input.paths, entry_path)?
    };

    let mut style_paths: Vec<&str> = entry.css_bundle.iter().map(String::as_str).collect();
    for (path, output) in input.manifest.iter() {
        let same_entry = output.entry_point.is_some() && output.entry_point == entry.entry_point;
        if same_entry && path.ends_with(".css") && !style_paths.contains(&path) {
            style_paths.push(path);
        }
    }
    let styles = style_paths
        .into_iter()
        .filter(|path| is_style_output(path))
        .map(|path| public_url(input.paths, path))
        .collect::<Result<Vec<_>>>()?;

    let env_json = serde_json::to_string(input.env.raw())
        .map_err(|e| Error::AssemblyInvariant(format!("cannot serialize environment: {e}")))?
        // Keep `</script>` inside values from closing the tag.
        .replace("</", "<\\/");

    Ok(Tags {
        script,
        styles,
        env_json,
    })
}

/// Public URL of a root-relative manifest path inside the build directory.
fn public_url(paths: &Paths, manifest_path: &str) -> Result<String> {
    let relative = paths
        .build_dir_from_root()
        .and_then(|dir| {
            manifest_path
                .strip_prefix(dir.as_str())
                .and_then(|rest| rest.strip_prefix('/'))
                .map(str::to_string)
        })
        .ok_or_else(|| Error::PathResolution {
            path: manifest_path.to_string(),
            root: paths.app_build().display().to_string(),
        })?;
    Ok(format!("{}{}", paths.public_url_or_path(), relative))
}

fn render_builtin(input: &HtmlInput<'_>, tags: &Tags) -> Result<String> {
    let mut env = Environment::new();
    // Every value is a URL or serialized JSON built here.
    env.set_auto_escape_callback(|_| AutoEscape::None);
    env.add_template("app.html", APP_TEMPLATE)?;
    env.add_template("view.html", VIEW_TEMPLATE)?;

    let template = if input.is_view {
        "view.html"
    } else {
        "app.html"
    };
    let name_json = serde_json::to_string(input.name)
        .map_err(|e| Error::AssemblyInvariant(format!("cannot serialize target name: {e}")))?;
    let html = env.get_template(template)?.render(context! {
        name => input.name,
        name_json => name_json,
        script => &tags.script,
        trampoline => &tags.script,
        styles => &tags.styles,
        env_json => &tags.env_json,
    })?;
    Ok(html)
}

/// Interpolate `%KEY%` and inject the tags into a user template.
fn inject(template: &str, env: &ClientEnvironment, tags: &Tags) -> String {
    let mut html = template.to_string();
    for (key, value) in env.raw() {
        html = html.replace(&format!("%{key}%"), value);
    }

    let mut head = String::new();
    for href in &tags.styles {
        head.push_str(&format!("<link rel=\"stylesheet\" href=\"{href}\" />"));
    }
    head.push_str(&format!(
        "<script>window.process = {{ env: {} }};</script>",
        tags.env_json
    ));
    html = insert_before(&html, "</head>", &head);

    // Views render from the template's own markup once the trampoline loaded.
    let script = format!("<script type=\"module\" src=\"{}\"></script>", tags.script);
    insert_before(&html, "</body>", &script)
}

fn insert_before(html: &str, marker: &str, content: &str) -> String {
    match html.rfind(marker) {
        Some(pos) => {
            let mut result = String::with_capacity(html.len() + content.len());
            result.push_str(&html[..pos]);
            result.push_str(content);
            result.push_str(&html[pos..]);
            result
        }
        None => format!("{html}{content}"),
    }
}
