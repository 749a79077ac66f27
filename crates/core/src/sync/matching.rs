// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Pairing items across the two trackers.

use std::collections::HashMap;

use crate::item::Item;
use crate::store::Side;

/// How the fetched items relate to each other.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchPlan {
    /// `(source, target)` pairs, in source fetch order.
    pub pairs: Vec<(Item, Item)>,
    /// Unlinked source items with no counterpart among the target items.
    pub source_only: Vec<Item>,
    /// Unlinked target items with no counterpart among the source items.
    pub target_only: Vec<Item>,
    /// Linked items whose counterpart was not among the fetched items.
    pub dangling: Vec<(Side, Item)>,
}

impl MatchPlan {
    /// Unlinked items of `side` that found no partner.
    pub fn unlinked(&self, side: Side) -> &[Item] {
        match side {
            Side::Source => &self.source_only,
            Side::Target => &self.target_only,
        }
    }

    pub fn unlinked_mut(&mut self, side: Side) -> &mut Vec<Item> {
        match side {
            Side::Source => &mut self.source_only,
            Side::Target => &mut self.target_only,
        }
    }
}

/// Pair `source` and `target` items.
///
/// Counterpart links are honored from either side, so the result does not
/// depend on which side recorded the link. Items without a link are then
/// paired when their normalized title is unique among the unlinked items of
/// both sides.
pub fn match_items(source: Vec<Item>, target: Vec<Item>) -> MatchPlan {
    let mut source_pair: Vec<Option<usize>> = vec![None; source.len()];
    let mut target_pair: Vec<Option<usize>> = vec![None; target.len()];

    let source_index: HashMap<&str, usize> = source
        .iter()
        .enumerate()
        .map(|(i, item)| (item.id.as_str(), i))
        .collect();
    let target_index: HashMap<&str, usize> = target
        .iter()
        .enumerate()
        .map(|(i, item)| (item.id.as_str(), i))
        .collect();

    for (s, item) in source.iter().enumerate() {
        if let Some(&t) = item.counterpart().and_then(|c| target_index.get(c)) {
            if target_pair[t].is_none() {
                source_pair[s] = Some(t);
                target_pair[t] = Some(s);
            }
        }
    }
    for (t, item) in target.iter().enumerate() {
        if target_pair[t].is_some() {
            continue;
        }
        if let Some(&s) = item.counterpart().and_then(|c| source_index.get(c)) {
            if source_pair[s].is_none() {
                source_pair[s] = Some(t);
                target_pair[t] = Some(s);
            }
        }
    }

    // Heuristic pass over items that were never linked
    let unlinked_titles = |items: &[Item], paired: &[Option<usize>]| {
        let mut titles: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, item) in items.iter().enumerate() {
            if paired[i].is_none() && item.counterpart().is_none() {
                titles.entry(item.normalized_title()).or_default().push(i);
            }
        }
        titles
    };
    let source_titles = unlinked_titles(&source, &source_pair);
    let target_titles = unlinked_titles(&target, &target_pair);
    for (title, s) in &source_titles {
        if let (&[s], Some(&[t])) = (s.as_slice(), target_titles.get(title).map(Vec::as_slice)) {
            source_pair[s] = Some(t);
            target_pair[t] = Some(s);
        }
    }

    let mut plan = MatchPlan::default();
    let mut target_slots: Vec<Option<Item>> = target.into_iter().map(Some).collect();
    let mut unpaired_source = Vec::new();
    for (s, item) in source.into_iter().enumerate() {
        match source_pair[s].and_then(|t| target_slots[t].take()) {
            Some(counterpart) => plan.pairs.push((item, counterpart)),
            None => unpaired_source.push(item),
        }
    }

    for item in unpaired_source {
        if item.counterpart().is_some() {
            plan.dangling.push((Side::Source, item));
        } else {
            plan.source_only.push(item);
        }
    }
    for item in target_slots.into_iter().flatten() {
        if item.counterpart().is_some() {
            plan.dangling.push((Side::Target, item));
        } else {
            plan.target_only.push(item);
        }
    }
    plan
}

#[cfg(test)]
#[path = "matching_tests.rs"]
mod tests;
