use chaincrf::lattice::NodeKind;
use chaincrf::train::Trainer;
use chaincrf::{Config, Model, Templates};

const TRAIN: &str = "\
Confidence NN
in IN
the DT
pound NN
is VBZ
widely RB
expected VBN
EOS
He PRP
reckons VBZ
the DT
current JJ
account NN
deficit NN
will MD
narrow VB

the DT
pound NN
is VBZ
expected VBN
to TO
narrow VB
";

fn train(templates: Templates) -> Model {
    let config = Config::builder()
        .templates(templates)
        .epsilon(0.1)
        .max_iterations(30)
        .build()
        .unwrap();
    let mut trainer = Trainer::new(config);
    assert_eq!(trainer.load_text(TRAIN.as_bytes()).unwrap(), 3);
    trainer.train().unwrap()
}

#[test]
fn test_train_and_tag_text() {
    let model = train(Templates::all());
    assert_eq!(model.num_labels(), 11);
    assert_eq!(model.weight_table().count(), model.num_features());
    assert_eq!(model.feature_names().len(), model.weights().len());

    let mut tagger = model.tagger();
    let tagged = tagger
        .tag_text(b"the\npound\nis\nexpected\n\nHe\nreckons\nEOS\n")
        .unwrap();
    assert_eq!(tagged.len(), 2);
    assert_eq!(tagged[0].len(), 4);
    assert_eq!(tagged[1].len(), 2);
    for label in tagged.iter().flatten() {
        assert!(model.to_label_id(label).is_some());
    }

    let lattice = tagger.last_lattice().unwrap();
    assert_eq!(lattice.len(), 2);
    for column in &lattice.columns()[1..=lattice.len()] {
        assert_eq!(column.len(), model.num_labels());
        for &id in column {
            assert_eq!(lattice.node(id).kind, NodeKind::Candidate);
            assert!(lattice.node(id).best_predecessor.is_some());
        }
    }
}

#[test]
fn test_tagging_is_deterministic() {
    let model = train(Templates::unigrams() | Templates::T);
    let mut tagger = model.tagger();
    let xseq = [["the"], ["current"], ["pound"], ["will"], ["narrow"]];
    let first = tagger.tag(&xseq).unwrap();
    let scores: Vec<f64> = tagger
        .last_lattice()
        .unwrap()
        .nodes()
        .iter()
        .map(|n| n.score)
        .collect();
    let second = tagger.tag(&xseq).unwrap();
    let again: Vec<f64> = tagger
        .last_lattice()
        .unwrap()
        .nodes()
        .iter()
        .map(|n| n.score)
        .collect();
    assert_eq!(first, second);
    assert_eq!(scores, again);
}

#[test]
fn test_unseen_tokens() {
    let model = train(Templates::U00 | Templates::T);
    let mut tagger = model.tagger();
    let labels = tagger.tag(&[["zebras"], ["gallop"]]).unwrap();
    assert_eq!(labels.len(), 2);

    // only transition features fire
    let lattice = tagger.last_lattice().unwrap();
    for column in &lattice.columns()[1..=lattice.len()] {
        for &id in column {
            assert!(lattice.node(id).feature_ids.is_empty());
        }
    }
}

#[test]
fn test_empty_input() {
    let model = train(Templates::U00);
    let mut tagger = model.tagger();
    tagger.tag(&[["the"]]).unwrap();
    assert!(tagger.last_lattice().is_some());
    let empty: [[&str; 1]; 0] = [];
    assert!(tagger.tag(&empty).unwrap().is_empty());
    assert!(tagger.last_lattice().is_none());
    assert!(tagger.tag_text(b"").unwrap().is_empty());
}

#[test]
fn test_multi_field_observations() {
    let config = Config::builder()
        .templates(Templates::U00)
        .max_iterations(5)
        .build()
        .unwrap();
    let mut trainer = Trainer::new(config);
    trainer.load_text(b"dog n NN\nbarks v VB\n").unwrap();
    let model = trainer.train().unwrap();
    assert!(model.weight("U00:NN:dog/n").is_some());
    let mut tagger = model.tagger();
    assert_eq!(tagger.tag(&[["dog", "n"], ["barks", "v"]]).unwrap().len(), 2);
}
