//! Input path inference.
//!
//! Decides which paths a query iterates over: the longest common prefixes
//! shared between its direct references and everything else it mentions.
//! Shared prefixes are bound once per row, so `User.name = User.name` ranges
//! over one `User` rather than the cross product of two.

use std::collections::BTreeSet;

use crate::path::Path;

/// Longest non-empty common prefixes between each direct reference and every
/// later direct reference or subquery reference.
///
/// Pairs whose references sit under the same optional argument group are
/// skipped, so `A ?= A.x` does not bind `A` outside the optional operand.
pub fn common_prefixes(
    direct: &[(Path, Option<u32>)],
    subquery: &[(Path, Option<u32>)],
) -> BTreeSet<Path> {
    let mut prefixes = BTreeSet::new();
    for (i, (x, ox)) in direct.iter().enumerate() {
        for (y, oy) in direct[i..].iter().chain(subquery) {
            if ox.is_some() && ox == oy {
                continue;
            }
            let prefix = x.common_prefix(y);
            if !prefix.is_empty() {
                prefixes.insert(prefix);
            }
        }
    }
    prefixes
}

/// New input paths for a query, in canonical order.
///
/// Only direct references anchored at an object ref take part; paths already
/// bound by an enclosing query are left out.
pub fn infer_inputs(
    direct: &[(Path, Option<u32>)],
    subquery: &[(Path, Option<u32>)],
    bound: &[Path],
) -> Vec<Path> {
    let anchored: Vec<(Path, Option<u32>)> = direct
        .iter()
        .filter(|(path, _)| path.is_anchored())
        .cloned()
        .collect();
    common_prefixes(&anchored, subquery)
        .into_iter()
        .filter(|path| !bound.contains(path))
        .collect()
}
