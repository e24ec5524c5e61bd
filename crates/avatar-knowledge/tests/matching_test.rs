use avatar_knowledge::{load, normalize, KnowledgeBase, KnowledgeError, KnowledgeHandle, Matcher};
use avatar_types::QaEntry;
use std::collections::BTreeSet;
use std::io::Write;

fn entry(id: u64, question: &str, answer: &str) -> QaEntry {
    QaEntry {
        id,
        question: question.to_string(),
        answer: answer.to_string(),
        keywords: Vec::new(),
        tags: BTreeSet::new(),
    }
}

fn sample_kb() -> KnowledgeBase {
    KnowledgeBase::from_entries(vec![
        entry(1, "What is your name?", "I am Aria."),
        entry(2, "Where is the store located?", "We are on Orchard Road."),
        entry(3, "What are your opening hours?", "We open from 10am to 10pm."),
        entry(4, "Do you offer eye tests?", "Yes, eye tests are free."),
    ])
    .unwrap()
}

#[test]
fn exact_questions_always_match_their_entry() {
    let kb = sample_kb();
    let matcher = Matcher::default();

    for expected in kb.entries() {
        let utterance = normalize(&expected.question);
        let result = matcher.match_utterance(&utterance, &kb);
        assert!(result.matched, "{:?} did not match", utterance);
        assert_eq!(result.entry.map(|e| e.id), Some(expected.id));
        assert!(result.score >= matcher.threshold());
    }
}

#[test]
fn exact_question_beats_lower_id_superset() {
    let kb = KnowledgeBase::from_entries(vec![
        entry(1, "What are your opening hours on holidays?", "Closed on holidays."),
        entry(2, "Opening hours", "10am to 10pm."),
    ])
    .unwrap();

    let result = Matcher::default().match_utterance("Opening hours?", &kb);

    assert!(result.matched);
    assert_eq!(result.entry.map(|e| e.id), Some(2));
    assert_eq!(result.score, 100.0);
    assert_eq!(result.answer(), Some("10am to 10pm."));

    // Words that are only a subset of entry 1 still fall to the fuzzy pass.
    let fuzzy = Matcher::default().match_utterance("holidays opening hours", &kb);
    assert_eq!(fuzzy.entry.map(|e| e.id), Some(1));
}

#[test]
fn exact_keyword_beats_lower_id_superset() {
    let mut gift_cards = entry(7, "Do you sell gift cards?", "Yes, at the front desk.");
    gift_cards.keywords = vec!["gift cards".to_string()];
    let kb = KnowledgeBase::from_entries(vec![
        entry(3, "Can I pay with gift cards online?", "Not yet."),
        gift_cards,
    ])
    .unwrap();

    let result = Matcher::default().match_utterance("gift cards", &kb);

    assert_eq!(result.entry.map(|e| e.id), Some(7));
    assert!(result.matched);
}

#[test]
fn contraction_resolves_to_scripted_answer() {
    let kb = sample_kb();
    let result = Matcher::default().match_utterance("what's your name", &kb);

    assert!(result.matched);
    assert_eq!(result.answer(), Some("I am Aria."));
}

#[test]
fn utterance_without_lexical_overlap_never_matches() {
    let kb = sample_kb();
    let matcher = Matcher::new(1.0);

    for utterance in ["Rainy weather tomorrow", "bonjour", "12345", "   ", "?!"] {
        let result = matcher.match_utterance(utterance, &kb);
        assert!(!result.matched, "{:?} unexpectedly matched", utterance);
        assert_eq!(result.answer(), None);
    }
}

#[test]
fn weather_question_falls_below_threshold() {
    let kb = sample_kb();
    let result = Matcher::default().match_utterance("What's the weather today?", &kb);
    assert!(!result.matched);
    assert!(result.score < 70.0, "score {}", result.score);
}

#[test]
fn equal_scores_pick_lowest_id_regardless_of_order() {
    let kb = KnowledgeBase::from_entries(vec![
        entry(9, "Can I book an appointment?", "Nine."),
        entry(2, "Can I book an appointment?", "Two."),
        entry(5, "Can I book an appointment?", "Five."),
    ])
    .unwrap();

    for _ in 0..10 {
        let result = Matcher::default().match_utterance("can i book an appointment", &kb);
        assert_eq!(result.entry.map(|e| e.id), Some(2));
        assert_eq!(result.answer(), Some("Two."));
    }
}

#[test]
fn keywords_extend_the_matchable_phrasings() {
    let kb = KnowledgeBase::from_json_str(
        r#"[
            {"id": 1, "question": "What are your opening hours?", "answer": "10am to 10pm.",
             "keywords": ["when do you close", "business hours"]}
        ]"#,
    )
    .unwrap();

    let result = Matcher::default().match_utterance("When do you close?", &kb);
    assert!(result.matched);
    assert_eq!(result.score, 100.0);
}

#[test]
fn unmatched_result_still_reports_best_candidate() {
    let kb = sample_kb();
    let result = Matcher::new(99.0).match_utterance("what is the name of the store", &kb);
    assert!(!result.matched);
    assert!(result.entry.is_some());
    assert!(result.score > 0.0 && result.score < 99.0);
}

#[test]
fn empty_index_never_matches() {
    let kb = KnowledgeBase::empty();
    let result = Matcher::new(0.0).match_utterance("anything", &kb);
    assert!(!result.matched);
    assert!(result.entry.is_none());
    assert_eq!(result.score, 0.0);
}

#[test]
fn load_reads_file_and_reload_keeps_old_index_on_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("qa.json");
    std::fs::write(
        &path,
        r#"[{"question": "What is your name?", "answer": "I am Aria."}]"#,
    )
    .unwrap();

    let handle = KnowledgeHandle::new(load(&path).unwrap());
    assert_eq!(handle.snapshot().len(), 1);

    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(b"[{\"question\": ").unwrap();
    drop(file);

    let err = handle.reload(&path).unwrap_err();
    assert!(matches!(err, KnowledgeError::Parse(_)));
    assert_eq!(handle.snapshot().len(), 1);

    std::fs::write(
        &path,
        r#"[{"question": "a b", "answer": "x"}, {"question": "c d", "answer": "y"}]"#,
    )
    .unwrap();
    assert_eq!(handle.reload(&path).unwrap(), 2);
    assert_eq!(handle.snapshot().len(), 2);
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = load(dir.path().join("absent.json"));
    assert!(matches!(result, Err(KnowledgeError::Io { .. })));
}
