use std::collections::HashSet;

use tracing::trace;

pub const MAX_TAG_SUGGESTIONS: usize =
  5;

/// Previously used tags, in first-seen
/// order with duplicates dropped.
#[derive(
  Debug, Clone, Default, PartialEq, Eq,
)]
pub struct TagCorpus {
  tags: Vec<String>
}

impl TagCorpus {
  pub fn new<I, S>(tags: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>
  {
    let mut seen = HashSet::new();
    let tags = tags
      .into_iter()
      .map(|tag| {
        tag.as_ref().trim().to_string()
      })
      .filter(|tag| !tag.is_empty())
      .filter(|tag| {
        seen.insert(tag.clone())
      })
      .collect();
    Self {
      tags
    }
  }

  /// Flattens the tag lists of every
  /// task and time block into one
  /// corpus.
  pub fn from_tag_lists<I, L, S>(
    lists: I
  ) -> Self
  where
    I: IntoIterator<Item = L>,
    L: IntoIterator<Item = S>,
    S: AsRef<str>
  {
    Self::new(
      lists.into_iter().flatten()
    )
  }

  pub fn iter(
    &self
  ) -> impl Iterator<Item = &str> {
    self.tags.iter().map(String::as_str)
  }

  #[must_use]
  pub fn len(&self) -> usize {
    self.tags.len()
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.tags.is_empty()
  }
}

/// The tag field split into the tags
/// already entered (trimmed, blanks
/// dropped) and the trailing segment
/// still being typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagQuery<'t> {
  pub chosen: Vec<&'t str>,
  pub active: String
}

impl<'t> TagQuery<'t> {
  #[must_use]
  pub fn parse(text: &'t str) -> Self {
    let mut segments: Vec<&str> =
      text.split(',').collect();
    let active = segments
      .pop()
      .unwrap_or_default()
      .trim()
      .to_lowercase();
    let chosen = segments
      .into_iter()
      .map(str::trim)
      .filter(|tag| !tag.is_empty())
      .collect();
    Self {
      chosen,
      active
    }
  }

  fn is_chosen(
    &self,
    tag: &str
  ) -> bool {
    self.chosen.iter().any(|chosen| {
      chosen.to_lowercase()
        == tag.to_lowercase()
    })
  }
}

#[derive(Debug, Clone, Copy)]
pub struct TagSuggestionMatcher<'c> {
  corpus: &'c TagCorpus
}

impl<'c> TagSuggestionMatcher<'c> {
  #[must_use]
  pub fn new(
    corpus: &'c TagCorpus
  ) -> Self {
    Self {
      corpus
    }
  }

  /// Corpus tags matching the segment
  /// being typed, skipping tags already
  /// in the field. A tag matches when
  /// the query's characters appear in
  /// it in order, so `"pro"` offers
  /// `"personal"` and `"wk"` offers
  /// `"work"`.
  pub fn suggest(
    &self,
    text: &str
  ) -> Vec<&'c str> {
    let query = TagQuery::parse(text);
    if query.active.is_empty() {
      return vec![];
    }

    let found: Vec<&'c str> = self
      .corpus
      .iter()
      .filter(|tag| {
        matches_query(tag, &query.active)
      })
      .filter(|tag| !query.is_chosen(tag))
      .take(MAX_TAG_SUGGESTIONS)
      .collect();
    trace!(
      query = %query.active,
      found = found.len(),
      "tag suggestions"
    );
    found
  }

  /// Replaces the segment being typed
  /// with `chosen_tag` and primes the
  /// field for the next tag. Earlier
  /// segments are re-joined trimmed;
  /// blank ones are dropped, so
  /// `"a,, b"` never commits an empty
  /// tag.
  #[must_use]
  pub fn commit(
    text: &str,
    chosen_tag: &str
  ) -> String {
    let query = TagQuery::parse(text);
    let mut tags = query.chosen;
    tags.push(chosen_tag.trim());
    format!("{}, ", tags.join(", "))
  }
}

/// Tag list submitted with the form:
/// trimmed, blanks dropped, order kept.
#[must_use]
pub fn parse_tags(
  text: &str
) -> Vec<String> {
  text
    .split(',')
    .map(str::trim)
    .filter(|tag| !tag.is_empty())
    .map(ToString::to_string)
    .collect()
}

// Query characters must appear in the
// tag in order; contiguous substrings
// are the common case.
fn matches_query(
  tag: &str,
  query: &str
) -> bool {
  let tag = tag.to_lowercase();
  let mut rest = tag.chars();
  query
    .chars()
    .all(|wanted| rest.any(|c| c == wanted))
}

#[cfg(test)]
mod tests {
  use super::{
    MAX_TAG_SUGGESTIONS,
    TagCorpus,
    TagQuery,
    TagSuggestionMatcher,
    parse_tags
  };

  fn corpus() -> TagCorpus {
    TagCorpus::new([
      "work", "project", "personal"
    ])
  }

  #[test]
  fn suggests_and_commits() {
    let corpus = corpus();
    let matcher =
      TagSuggestionMatcher::new(&corpus);
    assert_eq!(
      matcher.suggest("work, pro"),
      vec!["project", "personal"]
    );
    assert_eq!(
      TagSuggestionMatcher::commit(
        "work, pro", "project"
      ),
      "work, project, "
    );
  }

  #[test]
  fn matches_scattered_characters_in_order()
   {
    let corpus = corpus();
    let matcher =
      TagSuggestionMatcher::new(&corpus);
    assert_eq!(
      matcher.suggest("wk"),
      vec!["work"]
    );
    assert_eq!(
      matcher.suggest("prl"),
      vec!["personal"]
    );
    assert!(matcher.suggest("kw").is_empty());
  }

  #[test]
  fn empty_query_has_no_suggestions() {
    let corpus = corpus();
    let matcher =
      TagSuggestionMatcher::new(&corpus);
    assert!(matcher.suggest("").is_empty());
    assert!(
      matcher.suggest("work, ").is_empty()
    );
  }

  #[test]
  fn skips_chosen_tags() {
    let corpus = corpus();
    let matcher =
      TagSuggestionMatcher::new(&corpus);
    assert_eq!(
      matcher.suggest("Work, wor"),
      Vec::<&str>::new()
    );
    assert_eq!(
      matcher.suggest("WOR"),
      vec!["work"]
    );
  }

  #[test]
  fn caps_suggestions() {
    let corpus = TagCorpus::new(
      (0..12).map(|n| format!("tag{n}"))
    );
    let matcher =
      TagSuggestionMatcher::new(&corpus);
    let found = matcher.suggest("tag");
    assert_eq!(
      found.len(),
      MAX_TAG_SUGGESTIONS
    );
    assert_eq!(found[0], "tag0");
  }

  #[test]
  fn commit_from_empty_field() {
    assert_eq!(
      TagSuggestionMatcher::commit(
        "pro", "project"
      ),
      "project, "
    );
    assert_eq!(
      TagSuggestionMatcher::commit(
        " a ,, b , c", "chores"
      ),
      "a, b, chores, "
    );
  }

  #[test]
  fn corpus_dedupes_in_first_seen_order()
   {
    let corpus =
      TagCorpus::from_tag_lists(vec![
        vec!["home", "errand"],
        vec![" errand ", "", "gym"],
      ]);
    assert_eq!(
      corpus.iter().collect::<Vec<_>>(),
      vec!["home", "errand", "gym"]
    );
  }

  #[test]
  fn query_splits_segments() {
    let query =
      TagQuery::parse("a, b , C d");
    assert_eq!(query.chosen, vec!["a", "b"]);
    assert_eq!(query.active, "c d");
  }

  #[test]
  fn parses_submitted_tags() {
    assert_eq!(
      parse_tags("work, , project, work, "),
      vec!["work", "project", "work"]
    );
  }
}
