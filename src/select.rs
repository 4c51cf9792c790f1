use crate::error::{Result, SubseekError};
use crate::provider::SubtitleCandidate;

/// Pick the candidate with the highest download count.
///
/// Ties go to the candidate seen first, and an unknown count ranks below any
/// reported one, so with no counts at all the first candidate wins.
pub fn select_best(candidates: Vec<SubtitleCandidate>) -> Result<SubtitleCandidate> {
    best_index(&candidates)
        .and_then(|index| candidates.into_iter().nth(index))
        .ok_or(SubseekError::NoCandidates)
}

/// Index of the candidate [`select_best`] would pick
pub fn best_index(candidates: &[SubtitleCandidate]) -> Option<usize> {
    let mut best: Option<(usize, Option<u64>)> = None;
    for (index, candidate) in candidates.iter().enumerate() {
        let count = candidate.download_count();
        match best {
            Some((_, best_count)) if count <= best_count => {}
            _ => best = Some((index, count)),
        }
    }
    best.map(|(index, _)| index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{MockSubtitleProvider, SubtitleRef};
    use std::sync::Arc;

    fn candidates(counts: &[Option<u64>]) -> Vec<SubtitleCandidate> {
        let mut provider = MockSubtitleProvider::new();
        provider.expect_name().return_const("mock".to_string());
        let provider = Arc::new(provider);

        counts
            .iter()
            .enumerate()
            .map(|(i, count)| {
                SubtitleCandidate::new(
                    SubtitleRef {
                        url: format!("url-{}", i),
                        format: "srt".to_string(),
                        download_count: *count,
                        ..Default::default()
                    },
                    provider.clone(),
                )
            })
            .collect()
    }

    #[test]
    fn test_highest_download_count_wins() {
        let best = select_best(candidates(&[Some(3), Some(9), Some(1)])).unwrap();
        assert_eq!(best.subtitle.url, "url-1");
        assert_eq!(best.download_count(), Some(9));
    }

    #[test]
    fn test_all_unknown_picks_first() {
        let best = select_best(candidates(&[None, None, None])).unwrap();
        assert_eq!(best.subtitle.url, "url-0");
    }

    #[test]
    fn test_ties_go_to_first_seen() {
        let best = select_best(candidates(&[Some(1), Some(5), Some(5)])).unwrap();
        assert_eq!(best.subtitle.url, "url-1");
    }

    #[test]
    fn test_known_count_beats_unknown() {
        let best = select_best(candidates(&[None, Some(0), None])).unwrap();
        assert_eq!(best.subtitle.url, "url-1");
    }

    #[test]
    fn test_empty_input_is_no_candidates() {
        assert!(matches!(select_best(Vec::new()), Err(SubseekError::NoCandidates)));
        assert_eq!(best_index(&[]), None);
    }
}
