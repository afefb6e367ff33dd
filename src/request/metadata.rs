use std::collections::BTreeSet;

use serde::Serialize;
use tinytemplate::{format_unescaped, TinyTemplate};

use crate::request::message::Dataset;

#[derive(Serialize)]
struct AnnotationContext {
    header: String,
    rows: Vec<String>,
}

/// Render a dataset's experiment metadata as a tab separated annotation table
///
/// The first column is `FileName`, followed by the sorted union of metadata keys across all
/// files. Files without a value for a key get an empty cell.
///
/// | FileName | Condition | Donor |
/// | -------- | --------- | ----- |
/// | s1.fcs   | stim      | D01   |
/// | s2.fcs   | unstim    |       |
pub fn render_annotation(dataset: &Dataset) -> Result<String, tinytemplate::error::Error> {
    static ANNOTATION: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/annotation.txt"));
    let mut tt = TinyTemplate::new();
    tt.set_default_formatter(&format_unescaped);
    tt.add_template("annotation", ANNOTATION)?;

    let keys: BTreeSet<&str> = dataset
        .files
        .iter()
        .flat_map(|file| file.metadata.keys().map(String::as_str))
        .collect();

    let header = std::iter::once("FileName")
        .chain(keys.iter().copied())
        .collect::<Vec<_>>()
        .join("\t");

    let rows = dataset
        .files
        .iter()
        .map(|file| {
            std::iter::once(cell(&file.file_name))
                .chain(keys.iter().map(|key| {
                    file.metadata.get(*key).map(|v| cell(v)).unwrap_or_default()
                }))
                .collect::<Vec<_>>()
                .join("\t")
        })
        .collect();

    tt.render("annotation", &AnnotationContext { header, rows })
}

// tabs and newlines would break the table
fn cell(value: &str) -> String {
    value.replace(['\t', '\n', '\r'], " ")
}
