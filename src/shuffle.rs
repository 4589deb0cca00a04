//! Shuffle engine for the active queue.
//!
//! Shuffling follows the current track purely by index while the swaps
//! happen. Restoring goes the other way: the ordered list may have changed
//! while shuffled, so the current track is found again by its path.

use rand::Rng;

use crate::catalog::TrackRef;

/// Fisher-Yates shuffle of `tracks` in place.
///
/// Walks from the last index down to 1, swapping each slot with a uniformly
/// chosen index in `0..=i`. Returns where the track that was at `current`
/// ended up.
pub fn shuffle_tracking<R: Rng + ?Sized>(
    tracks: &mut [TrackRef],
    current: Option<usize>,
    rng: &mut R,
) -> Option<usize> {
    let mut current = current;
    for i in (1..tracks.len()).rev() {
        let j = rng.gen_range(0..=i);
        tracks.swap(i, j);
        current = match current {
            Some(c) if c == i => Some(j),
            Some(c) if c == j => Some(i),
            other => other,
        };
    }
    current
}

/// Copy of `ordered` plus the index of `loaded_path` inside it.
///
/// Falls back to index 0 when the path is gone, `None` when `ordered` is empty.
#[must_use]
pub fn restore_order(ordered: &[TrackRef], loaded_path: Option<&str>) -> (Vec<TrackRef>, Option<usize>) {
    let restored = ordered.to_vec();
    if restored.is_empty() {
        return (restored, None);
    }
    let index = loaded_path
        .and_then(|path| restored.iter().position(|t| t.has_path(path)))
        .unwrap_or(0);
    (restored, Some(index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn tracks(n: usize) -> Vec<TrackRef> {
        (0..n).map(|i| TrackRef::new("A", format!("{i}.mp3"))).collect()
    }

    #[test]
    fn test_shuffle_is_permutation() {
        let mut rng = StdRng::seed_from_u64(7);
        let original = tracks(20);
        let mut shuffled = original.clone();
        shuffle_tracking(&mut shuffled, None, &mut rng);

        let mut a: Vec<String> = original.iter().map(TrackRef::path).collect();
        let mut b: Vec<String> = shuffled.iter().map(TrackRef::path).collect();
        a.sort();
        b.sort();
        assert_eq!(a, b);
    }

    #[test]
    fn test_shuffle_tracks_current() {
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut list = tracks(9);
            let before = list[4].clone();
            let after = shuffle_tracking(&mut list, Some(4), &mut rng);
            assert_eq!(list[after.unwrap()], before, "seed {seed}");
        }
    }

    #[test]
    fn test_shuffle_small_inputs() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut empty: Vec<TrackRef> = Vec::new();
        assert_eq!(shuffle_tracking(&mut empty, None, &mut rng), None);

        let mut one = tracks(1);
        assert_eq!(shuffle_tracking(&mut one, Some(0), &mut rng), Some(0));
    }

    #[test]
    fn test_restore_locates_path() {
        let ordered = tracks(5);
        let (restored, index) = restore_order(&ordered, Some("A/3.mp3"));
        assert_eq!(restored, ordered);
        assert_eq!(index, Some(3));
    }

    #[test]
    fn test_restore_falls_back_to_zero() {
        let ordered = tracks(3);
        assert_eq!(restore_order(&ordered, Some("B/gone.mp3")).1, Some(0));
        assert_eq!(restore_order(&ordered, None).1, Some(0));
        assert_eq!(restore_order(&[], Some("A/1.mp3")).1, None);
    }
}
