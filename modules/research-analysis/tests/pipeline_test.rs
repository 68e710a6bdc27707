use research_analysis::{AnalysisError, AnalysisPipeline, NOISE};
use research_common::{AnalysisConfig, Corpus, Record};

fn seeded(seed: u64) -> AnalysisPipeline {
    AnalysisPipeline::from_config(&AnalysisConfig::default().with_seed(seed)).unwrap()
}

fn topical_corpus() -> Vec<String> {
    let mut docs = Vec::new();
    for i in 0..8 {
        docs.push(format!(
            "quantum qubit entanglement superposition gate circuit {i}"
        ));
    }
    for i in 0..8 {
        docs.push(format!(
            "protein folding enzyme amino acid molecule structure {i}"
        ));
    }
    docs
}

#[test]
fn small_corpus_yields_one_row_and_label_per_document() {
    let result = seeded(42).analyze_corpus(&["a b c", "a b c", "x y z"]).unwrap();

    assert_eq!(result.embeddings.len(), 3);
    assert_eq!(result.clusters.len(), 3);
    assert!(result.embeddings.iter().all(|row| row.len() == 50));
    for term in ["a", "b", "c", "x", "y", "z"] {
        assert!(result.vocabulary.iter().any(|t| t == term), "missing {term}");
    }
    // Three documents cannot fill a cluster of the default minimum size.
    assert_eq!(result.clusters, vec![NOISE; 3]);
}

#[test]
fn output_lengths_match_corpus_for_any_size() {
    let pipeline = seeded(7);
    let docs = topical_corpus();
    for n in [1, 2, 5, docs.len()] {
        let result = pipeline.analyze_corpus(&docs[..n]).unwrap();
        assert_eq!(result.embeddings.len(), n);
        assert_eq!(result.clusters.len(), n);
    }
}

/// Fifteen documents per topic; topics share no terms.
fn disjoint_topics() -> Vec<Vec<String>> {
    let topics = [
        ["qubit", "entanglement", "superposition", "decoherence", "photon", "lattice"],
        ["enzyme", "protein", "folding", "amino", "catalysis", "ribosome"],
        ["glacier", "sediment", "erosion", "basalt", "tectonic", "magma"],
    ];
    topics
        .iter()
        .map(|words| {
            (0..15)
                .map(|i| {
                    let mut doc: Vec<&str> = (0..4).map(|k| words[(i + k) % 6]).collect();
                    doc.push(words[i % 6]);
                    doc.join(" ")
                })
                .collect()
        })
        .collect()
}

#[test]
fn separated_topics_land_in_distinct_clusters() {
    let topics = disjoint_topics();
    let docs: Vec<String> = topics.concat();
    let result = seeded(42).analyze_corpus(&docs).unwrap();

    let per_topic: Vec<Vec<i32>> = result
        .clusters
        .chunks(15)
        .map(|labels| labels.to_vec())
        .collect();

    let mut seen: Vec<(usize, i32)> = Vec::new();
    for (topic, labels) in per_topic.iter().enumerate() {
        let clustered = labels.iter().filter(|&&l| l != NOISE).count();
        assert!(clustered * 2 >= labels.len(), "topic {topic} mostly noise: {labels:?}");
        for &label in labels.iter().filter(|&&l| l != NOISE) {
            if let Some(&(other, _)) = seen.iter().find(|&&(t, l)| l == label && t != topic) {
                panic!("label {label} shared by topics {other} and {topic}: {per_topic:?}");
            }
            seen.push((topic, label));
        }
    }
    assert!(result.cluster_count() >= 3);
}

#[test]
fn labels_are_noise_or_non_negative() {
    let result = seeded(3).analyze_corpus(&topical_corpus()).unwrap();
    assert!(result.clusters.iter().all(|&l| l == NOISE || l >= 0));
    let clustered: usize = (0..result.cluster_count() as i32)
        .map(|l| result.members(l).len())
        .sum();
    assert_eq!(clustered + result.noise_count(), result.len());
}

#[test]
fn fixed_seed_is_reproducible() {
    let docs = topical_corpus();
    let first = seeded(1234).analyze_corpus(&docs).unwrap();
    let second = seeded(1234).analyze_corpus(&docs).unwrap();
    assert_eq!(first.clusters, second.clusters);
    assert_eq!(first.embeddings, second.embeddings);
}

#[test]
fn empty_corpus_is_rejected() {
    let empty: [&str; 0] = [];
    let err = seeded(1).analyze_corpus(&empty).unwrap_err();
    assert_eq!(err, AnalysisError::EmptyCorpus);
}

#[test]
fn corpus_of_punctuation_has_no_vocabulary() {
    let err = seeded(1).analyze_corpus(&["...", "!!"]).unwrap_err();
    assert_eq!(err, AnalysisError::EmptyVocabulary);
}

#[test]
fn collected_records_feed_the_pipeline() {
    let records = vec![
        Record::new("arxiv").with_title("Qubits").with_snippet("error correction"),
        Record::new("google").with_title("Enzymes").with_snippet("catalysis kinetics"),
    ];
    let corpus = Corpus::from_records(&records);
    let result = seeded(5).analyze(&corpus).unwrap();
    assert_eq!(result.len(), 2);
    assert!(result.vocabulary.iter().any(|t| t == "correction"));
}

#[test]
fn result_serializes_for_renderers() {
    let result = seeded(9).analyze_corpus(&["alpha beta", "gamma"]).unwrap();
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["clusters"].as_array().unwrap().len(), 2);
    assert_eq!(json["vocabulary"][0], "alpha");
}
