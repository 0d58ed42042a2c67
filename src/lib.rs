//! Lattice-based linear-chain Conditional Random Fields
//!
//! Observation sequences are expanded into lattices holding one node per
//! (position, label). Template features are extracted per node, weights are
//! estimated with forward-backward and a renormalised gradient step, and
//! label sequences are predicted with Viterbi decoding.
//!
//! # Examples
//!
//! ## Training
//!
//! ```no_run
//! use chaincrf::{Config, Templates, Trainer};
//!
//! let config = Config::builder()
//!     .templates(Templates::U00 | Templates::U01)
//!     .max_iterations(50)
//!     .build()?;
//! let mut trainer = Trainer::new(config);
//! trainer.append(&[vec!["the"], vec!["dog"]], &["DT", "NN"])?;
//! trainer.append(&[vec!["a"], vec!["cat"]], &["DT", "NN"])?;
//! let model = trainer.train()?;
//! # Ok::<(), chaincrf::Error>(())
//! ```
//!
//! ## Prediction
//!
//! ```no_run
//! # use chaincrf::{Config, Trainer};
//! # let mut trainer = Trainer::new(Config::default());
//! # trainer.load_text(b"the DT\ndog NN\n")?;
//! # let model = trainer.train()?;
//! let mut tagger = model.tagger();
//! let labels = tagger.tag(&[vec!["the"], vec!["dog"]])?;
//! assert_eq!(labels.len(), 2);
//! # Ok::<(), chaincrf::Error>(())
//! ```

mod config;
mod dictionary;
mod error;
mod feature;
mod model;
mod tagger;
mod viterbi;

pub mod dataset;
pub mod lattice;
/// Training module containing the forward-backward engine and the trainer
pub mod train;

pub use self::config::{Config, ConfigBuilder, Templates};
pub use self::dictionary::Dictionary;
pub use self::error::{Error, Result};
pub use self::feature::{FeatureExtractor, FeatureTable, Vocabulary, BOS_MARKER, EOS_MARKER};
pub use self::model::{Model, TrainingReport};
pub use self::tagger::Tagger;
pub use self::viterbi::viterbi;

pub use self::train::Trainer;
