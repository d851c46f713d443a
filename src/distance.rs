//! Levenshtein edit distance over Unicode scalar values.

/// Minimum number of single-character insertions, deletions or substitutions
/// that turn `a` into `b`.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b_chars.len()).collect();

    for (i, ac) in a.chars().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, bc) in b_chars.iter().enumerate() {
            let above = row[j + 1];
            let cost = usize::from(ac != *bc);
            row[j + 1] = (above + 1).min(row[j] + 1).min(diagonal + cost);
            diagonal = above;
        }
    }

    row[b_chars.len()]
}

/// Same answer as `levenshtein(a, b) <= max`, but bails out as soon as the
/// distance is known to exceed `max`.
pub fn within_distance(a: &str, b: &str, max: usize) -> bool {
    let b_chars: Vec<char> = b.chars().collect();
    let a_len = a.chars().count();

    // length difference is a lower bound on the distance
    if a_len.abs_diff(b_chars.len()) > max {
        return false;
    }

    let mut row: Vec<usize> = (0..=b_chars.len()).collect();
    for (i, ac) in a.chars().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        let mut row_min = row[0];
        for (j, bc) in b_chars.iter().enumerate() {
            let above = row[j + 1];
            let cost = usize::from(ac != *bc);
            row[j + 1] = (above + 1).min(row[j] + 1).min(diagonal + cost);
            diagonal = above;
            row_min = row_min.min(row[j + 1]);
        }
        if row_min > max {
            return false;
        }
    }

    row[b_chars.len()] <= max
}
