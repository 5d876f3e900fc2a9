//! SXFM parser.

use std::collections::HashMap;
use std::path::Path;

use fm_core::{CrossTreeConstraint, FeatureId, FeatureModel, Relationship, RelationshipKind};

use crate::{
    SxfmError, CONSTRAINTS_CLOSE, CONSTRAINTS_OPEN, HEADER_CLOSE, HEADER_OPEN, META_CLOSE,
    META_OPEN, TREE_CLOSE, TREE_OPEN,
};

/// Parse an SXFM file.
pub fn parse_file(path: &Path) -> Result<FeatureModel, SxfmError> {
    let text = std::fs::read_to_string(path)?;
    parse_str(&text)
}

/// Parse SXFM text.
pub fn parse_str(text: &str) -> Result<FeatureModel, SxfmError> {
    let mut parser = Parser::default();

    for (i, raw) in text.lines().enumerate() {
        parser.line(i + 1, raw)?;
    }

    parser.finish()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Start,
    Body,
    Meta,
    Tree,
    Constraints,
    Done,
}

/// Node on the indentation stack of the feature tree.
#[derive(Debug, Clone, Copy)]
enum Node {
    Feature(FeatureId),
    /// Index of the group's relationship in the model.
    Group(usize),
}

/// A group whose kind depends on its final number of members.
struct OpenGroup {
    relationship: usize,
    upper: Option<usize>,
    line: usize,
    text: String,
}

struct Parser {
    model: FeatureModel,
    section: Section,
    ids: HashMap<String, FeatureId>,
    stack: Vec<Node>,
    groups: Vec<OpenGroup>,
    seen_tree: bool,
}

impl Default for Parser {
    fn default() -> Self {
        Self {
            model: FeatureModel::empty(),
            section: Section::Start,
            ids: HashMap::new(),
            stack: Vec::new(),
            groups: Vec::new(),
            seen_tree: false,
        }
    }
}

impl Parser {
    fn line(&mut self, line: usize, raw: &str) -> Result<(), SxfmError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(());
        }

        match self.section {
            Section::Start => {
                if trimmed.starts_with("<?xml") {
                    return Ok(());
                }
                if !trimmed.starts_with(HEADER_OPEN) {
                    return Err(SxfmError::syntax(line, "expected <feature_model> header"));
                }
                if let Some(name) = header_name(trimmed) {
                    self.model.set_name(name);
                }
                self.section = Section::Body;
            }
            Section::Body => match trimmed {
                META_OPEN => self.section = Section::Meta,
                TREE_OPEN => {
                    self.seen_tree = true;
                    self.section = Section::Tree;
                }
                CONSTRAINTS_OPEN => self.section = Section::Constraints,
                HEADER_CLOSE => self.section = Section::Done,
                other => {
                    return Err(SxfmError::syntax(line, format!("unexpected '{}'", other)));
                }
            },
            Section::Meta => {
                if trimmed == META_CLOSE {
                    self.section = Section::Body;
                }
            }
            Section::Tree => {
                if trimmed == TREE_CLOSE {
                    self.section = Section::Body;
                } else {
                    self.tree_line(line, raw)?;
                }
            }
            Section::Constraints => {
                if trimmed == CONSTRAINTS_CLOSE {
                    self.section = Section::Body;
                } else {
                    self.constraint_line(line, trimmed)?;
                }
            }
            Section::Done => {
                return Err(SxfmError::syntax(line, "content after </feature_model>"));
            }
        }

        Ok(())
    }

    fn tree_line(&mut self, line: usize, raw: &str) -> Result<(), SxfmError> {
        let raw = raw.trim_end();
        let body = raw.trim_start_matches('\t');
        let depth = raw.len() - body.len();

        if !body.starts_with(':') {
            return Err(SxfmError::syntax(line, "tree entries start with ':'"));
        }
        if depth > self.stack.len() {
            return Err(SxfmError::syntax(line, "indentation skips a level"));
        }
        self.stack.truncate(depth);

        let (tag, rest) = match body[1..].split_once(' ') {
            Some((tag, rest)) => (tag, rest.trim()),
            None => (&body[1..], ""),
        };

        match tag {
            "r" => {
                if depth != 0 || self.model.features_count() != 0 {
                    return Err(SxfmError::syntax(line, "root must be the first, unindented entry"));
                }
                let id = self.add_feature(line, rest)?;
                self.stack.push(Node::Feature(id));
            }
            "m" | "o" => {
                let parent = self.parent_feature(line, depth)?;
                let child = self.add_feature(line, rest)?;
                let relationship = if tag == "m" {
                    Relationship::mandatory(parent, child)
                } else {
                    Relationship::optional(parent, child)
                };
                self.model.add_relationship(relationship);
                self.stack.push(Node::Feature(child));
            }
            "g" => {
                let parent = self.parent_feature(line, depth)?;
                let upper = parse_cardinality(line, rest)?;
                let kind = if upper == Some(1) {
                    RelationshipKind::Alternative
                } else {
                    RelationshipKind::Or
                };
                let index = self.model.relationships().len();
                self.model.relationships_mut().push(Relationship {
                    kind,
                    parent,
                    children: Vec::new(),
                });
                self.groups.push(OpenGroup {
                    relationship: index,
                    upper,
                    line,
                    text: rest.to_string(),
                });
                self.stack.push(Node::Group(index));
            }
            "" => {
                let group = match depth.checked_sub(1).map(|d| self.stack[d]) {
                    Some(Node::Group(index)) => index,
                    _ => return Err(SxfmError::syntax(line, "group member outside a group")),
                };
                let child = self.add_feature(line, rest)?;
                self.model.relationships_mut()[group].children.push(child);
                self.stack.push(Node::Feature(child));
            }
            other => {
                return Err(SxfmError::syntax(line, format!("unknown tree tag ':{}'", other)));
            }
        }

        Ok(())
    }

    fn parent_feature(&self, line: usize, depth: usize) -> Result<FeatureId, SxfmError> {
        match depth.checked_sub(1).map(|d| self.stack[d]) {
            Some(Node::Feature(id)) => Ok(id),
            Some(Node::Group(_)) => Err(SxfmError::syntax(line, "group members use ':'")),
            None => Err(SxfmError::syntax(line, "only the root may be unindented")),
        }
    }

    /// Register `name (id)` and return the new feature.
    fn add_feature(&mut self, line: usize, entry: &str) -> Result<FeatureId, SxfmError> {
        let (name, id) = match entry.rfind('(') {
            Some(open) if entry.ends_with(')') => {
                let name = entry[..open].trim();
                let id = entry[open + 1..entry.len() - 1].trim();
                (if name.is_empty() { id } else { name }, id)
            }
            _ => (entry, entry),
        };
        if id.is_empty() {
            return Err(SxfmError::syntax(line, "feature without a name"));
        }
        if self.ids.contains_key(id) {
            return Err(SxfmError::DuplicateFeature {
                line,
                id: id.to_string(),
            });
        }

        let feature = self.model.add_feature(name);
        self.ids.insert(id.to_string(), feature);
        Ok(feature)
    }

    fn constraint_line(&mut self, line: usize, text: &str) -> Result<(), SxfmError> {
        let clause = match text.split_once(':') {
            Some((_, clause)) => clause.trim(),
            None => return Err(SxfmError::syntax(line, "constraints are labelled 'Cn: ...'")),
        };

        let literals: Vec<(bool, &str)> = clause
            .split(" or ")
            .map(|lit| {
                let lit = lit.trim();
                match lit.strip_prefix('~') {
                    Some(id) => (false, id.trim()),
                    None => (true, lit),
                }
            })
            .collect();

        let unsupported = || SxfmError::UnsupportedConstraint {
            line,
            text: clause.to_string(),
        };

        let constraint = match literals.as_slice() {
            [(false, a), (true, b)] => {
                CrossTreeConstraint::requires(self.lookup(line, a)?, self.lookup(line, b)?)
            }
            [(true, a), (false, b)] => {
                CrossTreeConstraint::requires(self.lookup(line, b)?, self.lookup(line, a)?)
            }
            [(false, a), (false, b)] => {
                CrossTreeConstraint::excludes(self.lookup(line, a)?, self.lookup(line, b)?)
            }
            _ => return Err(unsupported()),
        };

        self.model.add_constraint(constraint);
        Ok(())
    }

    fn lookup(&self, line: usize, id: &str) -> Result<FeatureId, SxfmError> {
        self.ids
            .get(id)
            .copied()
            .ok_or_else(|| SxfmError::UnknownFeature {
                line,
                id: id.to_string(),
            })
    }

    fn finish(self) -> Result<FeatureModel, SxfmError> {
        match self.section {
            Section::Done => {}
            Section::Start => return Err(SxfmError::MissingSection(HEADER_OPEN)),
            _ => return Err(SxfmError::MissingSection(HEADER_CLOSE)),
        }
        if !self.seen_tree || self.model.features_count() == 0 {
            return Err(SxfmError::MissingSection(TREE_OPEN));
        }

        for group in &self.groups {
            let members = self.model.relationships()[group.relationship].children.len();
            let kind_ok = match group.upper {
                Some(1) => members >= 2,
                Some(upper) => members >= 2 && upper == members,
                None => members >= 2,
            };
            if !kind_ok {
                return Err(SxfmError::UnsupportedCardinality {
                    line: group.line,
                    text: format!("{} with {} members", group.text, members),
                });
            }
        }

        self.model.check_structure()?;
        Ok(self.model)
    }
}

/// Extract `name="..."` from a header line.
fn header_name(header: &str) -> Option<&str> {
    let start = header.find("name=\"")? + "name=\"".len();
    let len = header[start..].find('"')?;
    Some(&header[start..start + len])
}

/// Parse `(id) [1,u]` into the upper bound (`None` for `*`).
fn parse_cardinality(line: usize, entry: &str) -> Result<Option<usize>, SxfmError> {
    let unsupported = || SxfmError::UnsupportedCardinality {
        line,
        text: entry.to_string(),
    };

    let open = entry.rfind('[').ok_or_else(unsupported)?;
    let bounds = entry[open..]
        .strip_prefix('[')
        .and_then(|b| b.strip_suffix(']'))
        .ok_or_else(unsupported)?;
    let (lower, upper) = bounds.split_once(',').ok_or_else(unsupported)?;

    if lower.trim() != "1" {
        return Err(unsupported());
    }
    match upper.trim() {
        "*" => Ok(None),
        n => match n.parse::<usize>() {
            Ok(upper) if upper >= 1 => Ok(Some(upper)),
            _ => Err(unsupported()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::to_sxfm_string;
    use fm_core::ConstraintKind;

    const SAMPLE: &str = "\
<feature_model name=\"FM_6_0\">
<meta>
<description>sample</description>
</meta>
<feature_tree>
:r F0 (F0)
\t:m F1 (F1)
\t:o F2 (F2)
\t\t:g (G0) [1,*]
\t\t\t: F3 (F3)
\t\t\t: F4 (F4)
\t:g [1,1]
\t\t: F5 (F5)
\t\t: F6 (F6)
</feature_tree>
<constraints>
C1: ~F1 or F3
C2: F4 or ~F2
C3: ~F5 or ~F3
</constraints>
</feature_model>
";

    #[test]
    fn test_parse_sample() {
        let model = parse_str(SAMPLE).unwrap();
        assert_eq!(model.name(), "FM_6_0");
        assert_eq!(model.features_count(), 7);

        let stats = model.statistics();
        assert_eq!(stats.mandatory_count, 1);
        assert_eq!(stats.optional_count, 1);
        assert_eq!(stats.or_count, 1);
        assert_eq!(stats.alternative_count, 1);
        assert_eq!(stats.requires_count, 2);
        assert_eq!(stats.excludes_count, 1);
        assert_eq!(model.constraints_count(), 7);
    }

    #[test]
    fn test_parse_normalizes_reversed_requires() {
        let model = parse_str(SAMPLE).unwrap();
        let c2 = model.constraints()[1];
        assert_eq!(c2.kind, ConstraintKind::Requires);
        assert_eq!(model.feature(c2.left).unwrap().name, "F2");
        assert_eq!(model.feature(c2.right).unwrap().name, "F4");
    }

    #[test]
    fn test_group_parent_is_enclosing_feature() {
        let model = parse_str(SAMPLE).unwrap();
        let f2 = model.feature_by_name("F2").unwrap();
        let f3 = model.feature_by_name("F3").unwrap();
        assert_eq!(model.parent_of(f3), Some(f2));
    }

    #[test]
    fn test_round_trip_preserves_counts() {
        let model = parse_str(SAMPLE).unwrap();
        let text = to_sxfm_string(&model).unwrap();
        let reparsed = parse_str(&text).unwrap();
        assert_eq!(reparsed.statistics(), model.statistics());
        assert_eq!(reparsed.features_count(), model.features_count());
    }

    #[test]
    fn test_rejects_unknown_feature_in_constraint() {
        let text = SAMPLE.replace("C1: ~F1 or F3", "C1: ~F1 or F9");
        assert!(matches!(
            parse_str(&text),
            Err(SxfmError::UnknownFeature { ref id, .. }) if id == "F9"
        ));
    }

    #[test]
    fn test_rejects_positive_clause() {
        let text = SAMPLE.replace("C1: ~F1 or F3", "C1: F1 or F3");
        assert!(matches!(
            parse_str(&text),
            Err(SxfmError::UnsupportedConstraint { .. })
        ));
    }

    #[test]
    fn test_rejects_skipped_indentation() {
        let text = SAMPLE.replace("\t:m F1 (F1)", "\t\t\t:m F1 (F1)");
        assert!(matches!(parse_str(&text), Err(SxfmError::Syntax { .. })));
    }

    #[test]
    fn test_rejects_duplicate_feature() {
        let text = SAMPLE.replace(": F6 (F6)", ": F5 (F5)");
        assert!(matches!(
            parse_str(&text),
            Err(SxfmError::DuplicateFeature { .. })
        ));
    }

    #[test]
    fn test_rejects_single_member_group() {
        let text = SAMPLE.replace("\t\t: F6 (F6)\n", "");
        assert!(matches!(
            parse_str(&text),
            Err(SxfmError::UnsupportedCardinality { .. })
        ));
    }

    #[test]
    fn test_rejects_truncated_file() {
        let truncated: String = SAMPLE.lines().take(8).map(|l| format!("{}\n", l)).collect();
        assert!(matches!(
            parse_str(&truncated),
            Err(SxfmError::MissingSection(_))
        ));
        assert!(matches!(parse_str(""), Err(SxfmError::MissingSection(_))));
    }

    #[test]
    fn test_unnamed_header() {
        let text = SAMPLE.replace("<feature_model name=\"FM_6_0\">", "<feature_model>");
        assert_eq!(parse_str(&text).unwrap().name(), "");
    }
}
