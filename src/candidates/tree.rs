use crate::gazetteer::{GazetteerRow, RowId};
use crate::models::LocationMention;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    State,
    District,
    /// Leaf for exactly one matched gazetteer row.
    Office(RowId),
}

/// State → District → Office hierarchy of gazetteer rows matching one
/// mention. Children keep insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateNode {
    pub label: String,
    pub kind: NodeKind,
    pub children: Vec<CandidateNode>,
}

/// Root-to-leaf view of one Office leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidatePath<'a> {
    pub state: &'a str,
    pub district: &'a str,
    pub office: &'a str,
    pub row: RowId,
}

impl CandidateNode {
    fn new(label: &str, kind: NodeKind) -> Self {
        Self {
            label: label.to_string(),
            kind,
            children: Vec::new(),
        }
    }

    /// Every Office leaf with its State and District labels, in insertion order.
    pub fn paths(&self) -> Vec<CandidatePath<'_>> {
        let mut paths = Vec::new();
        for state in &self.children {
            for district in &state.children {
                for office in &district.children {
                    if let NodeKind::Office(row) = office.kind {
                        paths.push(CandidatePath {
                            state: &state.label,
                            district: &district.label,
                            office: &office.label,
                            row,
                        });
                    }
                }
            }
        }
        paths
    }

    pub fn leaf_count(&self) -> usize {
        match self.kind {
            NodeKind::Office(_) => 1,
            _ => self.children.iter().map(CandidateNode::leaf_count).sum(),
        }
    }
}

/// Build the candidate hierarchy for `mention` from the rows that matched its
/// settlement name.
///
/// A State node is shared between rows with the same state label. District
/// and Office nodes are created fresh for every row, so sibling districts may
/// repeat a label.
pub fn build_tree<'a, I>(mention: &LocationMention, matching_rows: I) -> CandidateNode
where
    I: IntoIterator<Item = (RowId, &'a GazetteerRow)>,
{
    let mut root = CandidateNode::new(&mention.settlement_name, NodeKind::Root);

    for (id, row) in matching_rows {
        let state_idx = match root.children.iter().position(|s| s.label == row.state) {
            Some(idx) => idx,
            None => {
                root.children.push(CandidateNode::new(&row.state, NodeKind::State));
                root.children.len() - 1
            }
        };

        let mut district = CandidateNode::new(&row.district, NodeKind::District);
        district
            .children
            .push(CandidateNode::new(&row.office_name, NodeKind::Office(id)));
        root.children[state_idx].children.push(district);
    }

    root
}
