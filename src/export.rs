//! Write a [`CodeArtifact`] to disk as a three-file static site.

use std::path::{Path, PathBuf};

use crate::errors::ExportError;
use crate::extract::CodeArtifact;

pub const INDEX_FILE: &str = "index.html";
pub const STYLE_FILE: &str = "style.css";
pub const SCRIPT_FILE: &str = "script.js";

const STYLE_LINK: &str = r#"<link rel="stylesheet" href="style.css">"#;
const SCRIPT_TAG: &str = r#"<script src="script.js"></script>"#;

/// Wrap body markup in a document that links the stylesheet and script.
/// Markup that is already a full document gets the missing references
/// inserted before `</head>` and `</body>`.
pub fn linked_document(markup: &str) -> String {
    let lowered = markup.trim_start().to_lowercase();
    if lowered.starts_with("<!doctype") || lowered.starts_with("<html") {
        return link_full_document(markup);
    }
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Frontend Project</title>
    {STYLE_LINK}
</head>
<body>
{markup}
    {SCRIPT_TAG}
</body>
</html>
"#
    )
}

fn link_full_document(document: &str) -> String {
    let mut out = document.to_string();
    if !out.contains(STYLE_FILE) {
        out = insert_before_tag(&out, "</head>", STYLE_LINK)
            .or_else(|| insert_before_tag(&out, "<body", &format!("<head>{STYLE_LINK}</head>")))
            .unwrap_or_else(|| format!("{STYLE_LINK}\n{out}"));
    }
    if !out.contains(SCRIPT_FILE) {
        out = insert_before_tag(&out, "</body>", SCRIPT_TAG)
            .or_else(|| insert_before_tag(&out, "</html>", SCRIPT_TAG))
            .unwrap_or_else(|| format!("{out}\n{SCRIPT_TAG}"));
    }
    out
}

/// Insert `snippet` on its own line before the last case-insensitive match of `tag`.
fn insert_before_tag(document: &str, tag: &str, snippet: &str) -> Option<String> {
    let at = document.to_ascii_lowercase().rfind(tag)?;
    Some(format!("{}{}\n{}", &document[..at], snippet, &document[at..]))
}

/// Create `dir` and write `index.html`, `style.css` and `script.js`.
///
/// Returns the written paths. Fails with [`ExportError::NoCodeBlocks`]
/// before touching the filesystem if the artifact has no code at all.
pub fn write_project(artifact: &CodeArtifact, dir: &Path) -> Result<Vec<PathBuf>, ExportError> {
    if artifact.is_empty() {
        return Err(ExportError::NoCodeBlocks);
    }

    std::fs::create_dir_all(dir).map_err(|source| ExportError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let files = [
        (INDEX_FILE, linked_document(&artifact.html)),
        (STYLE_FILE, artifact.css.clone()),
        (SCRIPT_FILE, artifact.javascript.clone()),
    ];

    let mut written = Vec::with_capacity(files.len());
    for (name, content) in files {
        let path = dir.join(name);
        std::fs::write(&path, content).map_err(|source| ExportError::WriteFile {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "wrote export file");
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn artifact(html: &str, css: &str, js: &str) -> CodeArtifact {
        CodeArtifact {
            html: html.to_string(),
            css: css.to_string(),
            javascript: js.to_string(),
        }
    }

    #[test]
    fn test_writes_three_files() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("site");
        let written = write_project(
            &artifact("<button>Hi</button>", "button { color: red; }", "console.log(1);"),
            &out,
        )
        .unwrap();

        assert_eq!(written.len(), 3);
        let index = std::fs::read_to_string(out.join(INDEX_FILE)).unwrap();
        assert!(index.starts_with("<!DOCTYPE html>"));
        assert!(index.contains("<button>Hi</button>"));
        assert!(index.contains(r#"<link rel="stylesheet" href="style.css">"#));
        assert!(index.contains(r#"<script src="script.js"></script>"#));
        assert_eq!(
            std::fs::read_to_string(out.join(STYLE_FILE)).unwrap(),
            "button { color: red; }"
        );
        assert_eq!(
            std::fs::read_to_string(out.join(SCRIPT_FILE)).unwrap(),
            "console.log(1);"
        );
    }

    #[test]
    fn test_partial_artifact_still_exports() {
        let dir = tempdir().unwrap();
        write_project(&artifact("", "body {}", ""), dir.path()).unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join(SCRIPT_FILE)).unwrap(), "");
    }

    #[test]
    fn test_empty_artifact_creates_nothing() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("site");
        let err = write_project(&CodeArtifact::default(), &out).unwrap_err();
        assert!(matches!(err, ExportError::NoCodeBlocks));
        assert!(!out.exists());
    }

    #[test]
    fn test_full_document_gets_links_inserted() {
        let dir = tempdir().unwrap();
        let doc = "<!DOCTYPE html>\n<html>\n<head><title>Hi</title></head>\n<body><button>Hi</button></body>\n</html>";
        write_project(&artifact(doc, "button { color: red; }", "alert(1);"), dir.path()).unwrap();

        let index = std::fs::read_to_string(dir.path().join(INDEX_FILE)).unwrap();
        assert_eq!(index.matches("<html").count(), 1);
        let link = index.find(STYLE_LINK).expect("stylesheet link");
        let script = index.find(SCRIPT_TAG).expect("script tag");
        assert!(link < index.find("</head>").unwrap());
        assert!(index.find("<button>").unwrap() < script);
        assert!(script < index.find("</body>").unwrap());
    }

    #[test]
    fn test_full_document_with_links_is_unchanged() {
        let doc = "<!DOCTYPE html><html><head><link rel=\"stylesheet\" href=\"style.css\"></head><body><script src=\"script.js\"></script></body></html>";
        assert_eq!(linked_document(doc), doc);
    }

    #[test]
    fn test_full_document_without_head() {
        let out = linked_document("<html><BODY>x</BODY></html>");
        assert!(out.contains("<head><link rel=\"stylesheet\" href=\"style.css\"></head>\n<BODY>"));
        assert!(out.contains("<script src=\"script.js\"></script>\n</BODY>"));
    }
}
