//! Contact link discovery and bounded traversal.
//!
//! Discovery is a pure scan over collected anchors; the traversal that
//! follows misses is an explicit three-tier state machine with a visited
//! set and a hop cap, so it terminates on arbitrary link graphs.

use std::collections::{HashSet, VecDeque};
use toiawase_browser::AnchorMeta;
use toiawase_core::keywords::{contains_any, KeywordTable};
use url::Url;

/// How an anchor qualified as a contact link candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkProvenance {
    /// The href contained an inquiry keyword
    HrefKeyword,
    /// The visible text contained an inquiry keyword
    TextKeyword,
}

/// One candidate contact link, normalized and deduplicated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactLinkCandidate {
    /// Normalized absolute URL
    pub url: String,
    pub provenance: LinkProvenance,
    /// Document-order index of the source anchor
    pub position: usize,
}

/// Normalize an absolute URL for identity comparison: http(s) only,
/// trailing slashes stripped. Non-web schemes (`mailto:`, `javascript:`,
/// `tel:`) normalize to `None`.
#[must_use]
pub fn normalize_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if !trimmed.starts_with("http") {
        return None;
    }
    Some(trimmed.trim_end_matches('/').to_string())
}

/// Scan collected anchors for contact link candidates.
///
/// An anchor qualifies when its href contains a discovery href keyword or
/// its visible text contains a discovery text keyword. Anchors are taken
/// in reverse document order, deduplicated by normalized URL, and the
/// current page's own URL is never a candidate.
#[must_use]
pub fn find_contact_links(
    anchors: &[AnchorMeta],
    current_url: &str,
    table: &KeywordTable,
) -> Vec<ContactLinkCandidate> {
    let current = normalize_url(current_url);
    let mut seen: HashSet<String> = HashSet::new();
    let mut candidates = Vec::new();

    for anchor in anchors.iter().rev() {
        let href_lower = anchor.href.to_lowercase();
        let text_lower = anchor.text.to_lowercase();
        let provenance = if contains_any(&href_lower, &table.discovery.href) {
            LinkProvenance::HrefKeyword
        } else if contains_any(&text_lower, &table.discovery.text) {
            LinkProvenance::TextKeyword
        } else {
            continue;
        };
        let Some(normalized) = normalize_url(&anchor.href) else {
            continue;
        };
        if current.as_deref() == Some(normalized.as_str()) {
            continue;
        }
        if !seen.insert(normalized.clone()) {
            continue;
        }
        candidates.push(ContactLinkCandidate {
            url: normalized,
            provenance,
            position: anchor.index,
        });
    }

    candidates
}

fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
}

fn path_depth(url: &str) -> usize {
    Url::parse(url)
        .ok()
        .map(|u| u.path().split('/').filter(|s| !s.is_empty()).count())
        .unwrap_or(usize::MAX)
}

/// Rank candidates in place: same-origin before off-site, then fewer path
/// segments first. The sort is stable, so candidates that tie keep their
/// discovery order.
pub fn rank_candidates(candidates: &mut [ContactLinkCandidate], origin_url: &str) {
    let origin_host = host_of(origin_url);
    candidates.sort_by_key(|candidate| {
        let same_origin = origin_host.is_some() && host_of(&candidate.url) == origin_host;
        (u8::from(!same_origin), path_depth(&candidate.url))
    });
}

/// One traversal step for the runner to navigate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hop {
    pub url: String,
    /// Tier-2 hops return to the origin page before following the link
    pub via_origin: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    Primary,
    OnPage,
    Origin,
    Exhausted,
}

/// Bounded three-tier traversal over contact link candidates.
///
/// Tier 0 follows the primary candidate (first in reverse document
/// order). Tier 1 consumes links discovered on pages the traversal has
/// already landed on. Tier 2 returns to the origin page and retries the
/// remaining original candidates, ranked. The visited set and the hop cap
/// guarantee termination.
pub struct TraversalState {
    origin_url: String,
    visited: HashSet<String>,
    original: Vec<ContactLinkCandidate>,
    on_page: VecDeque<ContactLinkCandidate>,
    tier: Tier,
    hops: usize,
    cap: usize,
}

impl TraversalState {
    #[must_use]
    pub fn new(origin_url: &str, candidates: Vec<ContactLinkCandidate>, cap: usize) -> Self {
        let mut visited = HashSet::new();
        if let Some(normalized) = normalize_url(origin_url) {
            visited.insert(normalized);
        }
        Self {
            origin_url: origin_url.to_string(),
            visited,
            original: renormalize(candidates),
            on_page: VecDeque::new(),
            tier: Tier::Primary,
            hops: 0,
            cap,
        }
    }

    /// Whether any candidate existed at all. Distinguishes "no contact
    /// link anywhere" from "contact pages reached but none had a form".
    #[must_use]
    pub fn had_candidates(&self) -> bool {
        !self.original.is_empty() || self.hops > 0
    }

    /// Record a URL the runner landed on, including post-redirect URLs.
    pub fn record_visit(&mut self, url: &str) {
        if let Some(normalized) = normalize_url(url) {
            self.visited.insert(normalized);
        }
    }

    fn is_visited(&self, url: &str) -> bool {
        self.visited.contains(url)
    }

    /// Offer links discovered on the page just probed. Only tier 1
    /// consumes them; they are ranked against the origin and deduplicated
    /// against everything visited or already queued.
    pub fn offer_page_links(&mut self, candidates: Vec<ContactLinkCandidate>) {
        if self.tier != Tier::OnPage {
            return;
        }
        let mut candidates = renormalize(candidates);
        rank_candidates(&mut candidates, &self.origin_url);
        for candidate in candidates {
            if self.is_visited(&candidate.url) {
                continue;
            }
            if self.on_page.iter().any(|c| c.url == candidate.url) {
                continue;
            }
            self.on_page.push_back(candidate);
        }
    }

    /// The next hop to try, or `None` when the machine is exhausted.
    pub fn next_hop(&mut self) -> Option<Hop> {
        if self.hops >= self.cap {
            self.tier = Tier::Exhausted;
            return None;
        }
        loop {
            match self.tier {
                Tier::Primary => {
                    self.tier = Tier::OnPage;
                    match self.take_original() {
                        Some(primary) => return self.take_hop(primary, false),
                        None => {
                            self.tier = Tier::Exhausted;
                            return None;
                        }
                    }
                }
                Tier::OnPage => {
                    while let Some(candidate) = self.on_page.pop_front() {
                        if self.is_visited(&candidate.url) {
                            continue;
                        }
                        return self.take_hop(candidate, false);
                    }
                    self.tier = Tier::Origin;
                }
                Tier::Origin => match self.take_original_ranked() {
                    Some(candidate) => return self.take_hop(candidate, true),
                    None => {
                        self.tier = Tier::Exhausted;
                    }
                },
                Tier::Exhausted => return None,
            }
        }
    }

    /// The origin page URL for tier-2 return navigation.
    #[must_use]
    pub fn origin_url(&self) -> &str {
        &self.origin_url
    }

    fn take_original(&mut self) -> Option<ContactLinkCandidate> {
        let pos = self
            .original
            .iter()
            .position(|c| !self.is_visited(&c.url))?;
        Some(self.original.remove(pos))
    }

    fn take_original_ranked(&mut self) -> Option<ContactLinkCandidate> {
        if self.original.is_empty() {
            return None;
        }
        let origin = self.origin_url.clone();
        rank_candidates(&mut self.original, &origin);
        self.take_original()
    }

    fn take_hop(&mut self, candidate: ContactLinkCandidate, via_origin: bool) -> Option<Hop> {
        self.hops += 1;
        self.visited.insert(candidate.url.clone());
        Some(Hop {
            url: candidate.url,
            via_origin,
        })
    }
}

/// Re-normalize candidate URLs so identity comparison holds even for
/// candidates built outside [`find_contact_links`].
fn renormalize(candidates: Vec<ContactLinkCandidate>) -> Vec<ContactLinkCandidate> {
    candidates
        .into_iter()
        .filter_map(|mut candidate| {
            candidate.url = normalize_url(&candidate.url)?;
            Some(candidate)
        })
        .collect()
}
