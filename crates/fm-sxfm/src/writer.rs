//! SXFM writer.
//!
//! The header is written without a name attribute; callers that need a
//! display name patch the first line after writing.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use fm_core::{ConstraintKind, FeatureId, FeatureModel, RelationshipKind};

use crate::{
    SxfmError, CONSTRAINTS_CLOSE, CONSTRAINTS_OPEN, HEADER_CLOSE, HEADER_OPEN, META_CLOSE,
    META_OPEN, TREE_CLOSE, TREE_OPEN,
};

/// Serialize a model to an SXFM string.
pub fn to_sxfm_string(model: &FeatureModel) -> Result<String, SxfmError> {
    let mut buffer = Vec::new();
    write_to(model, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| SxfmError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

/// Serialize a model to a file, creating or truncating it.
pub fn write_file(model: &FeatureModel, path: &Path) -> Result<(), SxfmError> {
    // Validate before truncating an existing file.
    validate(model)?;
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_to(model, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Serialize a model to any writer.
pub fn write_to<W: Write>(model: &FeatureModel, out: &mut W) -> Result<(), SxfmError> {
    validate(model)?;

    writeln!(out, "{}>", HEADER_OPEN)?;
    writeln!(out, "{}", META_OPEN)?;
    writeln!(out, "{}", META_CLOSE)?;
    writeln!(out, "{}", TREE_OPEN)?;

    let root = &model.features()[FeatureId::ROOT.index()];
    writeln!(out, ":r {} ({})", root.name, root.name)?;
    let mut groups_count = 0;
    write_subtree(model, FeatureId::ROOT, 1, &mut groups_count, out)?;

    writeln!(out, "{}", TREE_CLOSE)?;
    writeln!(out, "{}", CONSTRAINTS_OPEN)?;

    for (i, constraint) in model.constraints().iter().enumerate() {
        let left = &model.features()[constraint.left.index()].name;
        let right = &model.features()[constraint.right.index()].name;
        match constraint.kind {
            ConstraintKind::Requires => writeln!(out, "C{}: ~{} or {}", i + 1, left, right)?,
            ConstraintKind::Excludes => writeln!(out, "C{}: ~{} or ~{}", i + 1, left, right)?,
        }
    }

    writeln!(out, "{}", CONSTRAINTS_CLOSE)?;
    writeln!(out, "{}", HEADER_CLOSE)?;
    Ok(())
}

fn validate(model: &FeatureModel) -> Result<(), SxfmError> {
    model.check_structure()?;
    for feature in model.features() {
        if !is_writable_name(&feature.name) {
            return Err(SxfmError::InvalidName(feature.name.clone()));
        }
    }
    Ok(())
}

fn write_subtree<W: Write>(
    model: &FeatureModel,
    parent: FeatureId,
    depth: usize,
    groups_count: &mut usize,
    out: &mut W,
) -> Result<(), SxfmError> {
    let indent = "\t".repeat(depth);

    for relationship in model.relationships().iter().filter(|r| r.parent == parent) {
        match relationship.kind {
            RelationshipKind::Mandatory | RelationshipKind::Optional => {
                let tag = if relationship.kind == RelationshipKind::Mandatory {
                    "m"
                } else {
                    "o"
                };
                let child = relationship.children[0];
                let name = &model.features()[child.index()].name;
                writeln!(out, "{}:{} {} ({})", indent, tag, name, name)?;
                write_subtree(model, child, depth + 1, groups_count, out)?;
            }
            RelationshipKind::Alternative | RelationshipKind::Or => {
                let cardinality = if relationship.kind == RelationshipKind::Alternative {
                    "[1,1]"
                } else {
                    "[1,*]"
                };
                writeln!(out, "{}:g (G{}) {}", indent, groups_count, cardinality)?;
                *groups_count += 1;

                for &child in &relationship.children {
                    let name = &model.features()[child.index()].name;
                    writeln!(out, "{}\t: {} ({})", indent, name, name)?;
                    write_subtree(model, child, depth + 2, groups_count, out)?;
                }
            }
        }
    }

    Ok(())
}

/// Names double as SXFM ids: no whitespace, parentheses, brackets, `~` or `:`.
fn is_writable_name(name: &str) -> bool {
    !name.is_empty()
        && !name
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '(' | ')' | '[' | ']' | '~' | ':' | '<' | '>'))
}
