use strsim::levenshtein;

/// Score of a field the recognizer left empty while the reference has a value.
pub const EMPTY_RECOGNITION: i64 = -1;

/// Upper-cased with every whitespace character removed.
pub fn normalize_field(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Mismatch score of a recognized value: 0 on a normalized exact match,
/// [`EMPTY_RECOGNITION`] when nothing was recognized, otherwise the edit distance.
pub fn accuracy(reference: &str, recognized: &str) -> i64 {
    let reference = normalize_field(reference);
    let recognized = normalize_field(recognized);

    if reference == recognized {
        0
    } else if recognized.is_empty() {
        EMPTY_RECOGNITION
    } else {
        levenshtein(&reference, &recognized) as i64
    }
}

pub fn is_mismatch(score: i64) -> bool {
    score != 0
}
