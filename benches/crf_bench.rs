use chaincrf::lattice::{Computed, Lattice};
use chaincrf::train::{ForwardBackward, LogLinear, Trainer};
use chaincrf::{Config, Templates};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

const CORPUS: &str = "\
Confidence NN
in IN
the DT
pound NN
is VBZ
widely RB
expected VBN
to TO
take VB
another DT
sharp JJ
dive NN

He PRP
reckons VBZ
the DT
current JJ
account NN
deficit NN
will MD
narrow VB
to TO
only RB
a DT
pound NN
";

fn trainer(max_iterations: usize) -> Trainer {
    let config = Config::builder()
        .templates(Templates::all())
        .max_iterations(max_iterations)
        .build()
        .unwrap();
    let mut trainer = Trainer::new(config);
    trainer.load_text(CORPUS.as_bytes()).unwrap();
    trainer
}

fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("train");
    group.bench_function("iteration", |b| {
        let mut trainer = trainer(1);
        trainer.prepare().unwrap();
        b.iter(|| black_box(trainer.train().unwrap()))
    });
    group.bench_function("forward_backward", |b| {
        let mut trainer = trainer(1);
        trainer.prepare().unwrap();
        trainer.reset_training();
        let weights = trainer.weights().to_vec();
        let mut lattices: Vec<Lattice> = trainer.lattices().to_vec();
        let potential = LogLinear::new(&weights);
        let fb = ForwardBackward::new(&potential);
        b.iter(|| {
            for lattice in &mut lattices {
                lattice.reset(Computed::ALL);
                fb.backward(lattice);
                fb.forward(lattice);
                black_box(fb.partition(lattice));
            }
        })
    });
    group.finish();

    let model = trainer(10).train().unwrap();
    let xseq = [
        ["He"],
        ["reckons"],
        ["the"],
        ["pound"],
        ["will"],
        ["take"],
        ["a"],
        ["sharp"],
        ["dive"],
    ];
    let mut group = c.benchmark_group("tag");
    group.bench_function("viterbi", |b| {
        let mut tagger = model.tagger();
        b.iter(|| {
            let _res = tagger.tag(black_box(&xseq)).unwrap();
        })
    });
    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
