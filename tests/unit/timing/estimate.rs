use super::*;

#[test]
fn splits_on_word_cap() {
    let chunks = split_into_chunks("a b c d e f g h", 4);
    assert_eq!(chunks, vec![vec!["a", "b", "c", "d"], vec!["e", "f", "g", "h"]]);

    let chunks = split_into_chunks("a  b c d e", 4);
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[1], vec!["e"]);

    assert!(split_into_chunks("   ", 4).is_empty());
}

#[test]
fn script_text_drops_blank_lines() {
    let lines = script_lines_from_text("First line\n\n   \n Second line \r\nThird");
    assert_eq!(lines, vec!["First line", "Second line", "Third"]);
}

#[test]
fn two_line_scenario_is_proportional() {
    let chunks = estimate(
        &["Bu ajoyib kun edi", "Hammaga yoqdi"],
        6.0,
        &TimingOpts::default(),
    )
    .unwrap();
    assert_eq!(chunks.len(), 2);
    let x = 6.0 * 17.0 / 30.0;
    assert_eq!(chunks[0].text, "Bu ajoyib kun edi");
    assert_eq!(chunks[0].start, 0.0);
    assert!((chunks[0].end - x).abs() < 1e-9);
    assert_eq!(chunks[1].start, chunks[0].end);
    assert_eq!(chunks[1].end, 6.0);

    let words = &chunks[0].words;
    assert_eq!(words.len(), 4);
    // "Bu " is 3 of 30 characters.
    assert!((words[0].end - 0.6).abs() < 1e-9);
    assert_eq!(words[3].end, chunks[0].end);
}

#[test]
fn empty_script_yields_no_chunks() {
    let lines: [&str; 0] = [];
    assert!(estimate(&lines, 3.0, &TimingOpts::default()).unwrap().is_empty());
    assert!(estimate(&["", "  "], 3.0, &TimingOpts::default()).unwrap().is_empty());
}

#[test]
fn zero_duration_collapses_spans() {
    let chunks = estimate(&["one two"], 0.0, &TimingOpts::default()).unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].end, 0.0);
    assert!(chunks[0].words.iter().all(|w| w.start == 0.0 && w.end == 0.0));
}

#[test]
fn rejects_invalid_inputs() {
    assert!(estimate(&["a"], -1.0, &TimingOpts::default()).is_err());
    assert!(estimate(&["a"], f64::NAN, &TimingOpts::default()).is_err());
    assert!(
        estimate(
            &["a"],
            1.0,
            &TimingOpts {
                max_words_per_chunk: 0
            }
        )
        .is_err()
    );
}

#[test]
fn counts_unicode_scalars_not_bytes() {
    let chunks = estimate(&["ўзбек тили", "ab"], 13.0, &TimingOpts::default()).unwrap();
    // 10 + 2 characters.
    assert!((chunks[0].end - 13.0 * 10.0 / 12.0).abs() < 1e-9);
}
