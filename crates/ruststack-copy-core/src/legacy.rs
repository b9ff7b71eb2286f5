//! Legacy `object_post_as_copy` bridge.
//!
//! Post-as-copy used to be an option of the proxy application rather than of the
//! copy pipeline. Operators upgrading from that layout may still carry the option
//! in the proxy app section of a paste-deploy configuration:
//!
//! ```text
//! [pipeline:main]
//! pipeline = catch_errors copy proxy-server
//!
//! [app:proxy-server]
//! object_post_as_copy = false
//! ```
//!
//! The last entry of the main pipeline names the proxy app; its section is read
//! for the option. A directory path is read as a `conf.d` style directory: every
//! `*.conf` file in sorted order, later files overriding earlier ones.

use std::collections::HashMap;
use std::path::Path;

/// Option name looked up in the proxy app section.
const POST_AS_COPY_OPTION: &str = "object_post_as_copy";

/// Errors raised while reading a legacy configuration.
#[derive(Debug, thiserror::Error)]
pub enum LegacyConfigError {
    /// The configuration file or directory could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path that failed.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Parsed INI sections: section name to (option name to value).
type Sections = HashMap<String, HashMap<String, String>>;

/// Read the raw `object_post_as_copy` value from a legacy proxy configuration.
///
/// Returns `Ok(None)` when the pipeline, the proxy app section or the option is
/// missing.
///
/// # Errors
///
/// Returns [`LegacyConfigError::Io`] if the file or directory cannot be read.
pub fn load_object_post_as_copy(
    path: impl AsRef<Path>,
) -> Result<Option<String>, LegacyConfigError> {
    let sections = read_config(path.as_ref())?;
    Ok(post_as_copy_from_sections(&sections))
}

/// Extract the option from already parsed sections.
fn post_as_copy_from_sections(sections: &Sections) -> Option<String> {
    let pipeline = sections.get("pipeline:main")?.get("pipeline")?;
    let proxy_name = pipeline.split_whitespace().last()?;
    sections
        .get(&format!("app:{proxy_name}"))?
        .get(POST_AS_COPY_OPTION)
        .cloned()
}

/// Read a configuration file, or every `*.conf` file of a directory.
fn read_config(path: &Path) -> Result<Sections, LegacyConfigError> {
    let io_err = |source| LegacyConfigError::Io {
        path: path.display().to_string(),
        source,
    };

    let mut sections = Sections::new();
    if path.is_dir() {
        let mut files = std::fs::read_dir(path)
            .map_err(io_err)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "conf"))
            .collect::<Vec<_>>();
        files.sort();
        for file in files {
            let text = std::fs::read_to_string(&file).map_err(|source| LegacyConfigError::Io {
                path: file.display().to_string(),
                source,
            })?;
            parse_ini_into(&text, &mut sections);
        }
    } else {
        let text = std::fs::read_to_string(path).map_err(io_err)?;
        parse_ini_into(&text, &mut sections);
    }
    Ok(sections)
}

/// Parse INI text, merging into `sections`.
///
/// Option names are lowercased, values are trimmed. Lines before the first
/// section header and malformed lines are ignored. Indented lines continue the
/// previous option's value.
fn parse_ini_into(text: &str, sections: &mut Sections) {
    let mut current: Option<String> = None;
    let mut last_key: Option<String> = None;

    for raw in text.lines() {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }

        if raw.starts_with([' ', '\t']) {
            if let (Some(section), Some(key)) = (&current, &last_key) {
                if let Some(value) = sections
                    .get_mut(section)
                    .and_then(|options| options.get_mut(key))
                {
                    value.push('\n');
                    value.push_str(trimmed);
                }
            }
            continue;
        }

        if let Some(name) = trimmed
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
        {
            let name = name.trim().to_owned();
            sections.entry(name.clone()).or_default();
            current = Some(name);
            last_key = None;
            continue;
        }

        let Some(section) = &current else {
            continue;
        };
        let Some(split_at) = trimmed.find(['=', ':']) else {
            continue;
        };
        let key = trimmed[..split_at].trim().to_ascii_lowercase();
        let value = trimmed[split_at + 1..].trim().to_owned();
        sections
            .entry(section.clone())
            .or_default()
            .insert(key.clone(), value);
        last_key = Some(key);
    }
}
