use bitflags::bitflags;

use crate::error::{Error, Result};

bitflags! {
    /// Feature templates applied to every lattice node
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Templates: u16 {
        /// Transition: (previous label, current label)
        const T = 1 << 0;
        /// Current token
        const U00 = 1 << 1;
        /// Left token
        const U01 = 1 << 2;
        /// Left and current tokens
        const U02 = 1 << 3;
        /// Left-left token
        const U03 = 1 << 4;
        /// Left-left, left and current tokens
        const U04 = 1 << 5;
        /// Right token
        const U05 = 1 << 6;
        /// Current and right tokens
        const U06 = 1 << 7;
        /// Right-right token
        const U07 = 1 << 8;
        /// Current, right and right-right tokens
        const U08 = 1 << 9;
        /// Left, current and right tokens
        const U09 = 1 << 10;
    }
}

impl Templates {
    /// Template tags in application order
    pub const TAGS: [(&'static str, Templates); 11] = [
        ("T", Templates::T),
        ("U00", Templates::U00),
        ("U01", Templates::U01),
        ("U02", Templates::U02),
        ("U03", Templates::U03),
        ("U04", Templates::U04),
        ("U05", Templates::U05),
        ("U06", Templates::U06),
        ("U07", Templates::U07),
        ("U08", Templates::U08),
        ("U09", Templates::U09),
    ];

    /// All unigram/context templates
    pub fn unigrams() -> Self {
        Self::all().difference(Self::T)
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::TAGS
            .iter()
            .find(|(name, _)| *name == tag)
            .map(|&(_, flag)| flag)
    }

    /// Tags of the enabled templates
    pub fn tags(&self) -> impl Iterator<Item = &'static str> + '_ {
        Self::TAGS
            .iter()
            .filter(move |(_, flag)| self.contains(*flag))
            .map(|&(name, _)| name)
    }
}

impl Default for Templates {
    fn default() -> Self {
        Self::unigrams()
    }
}

/// Validated training configuration.
///
/// Built once through [`ConfigBuilder`] and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    epsilon: f64,
    max_iterations: usize,
    threshold: f64,
    templates: Templates,
    verbose: bool,
    divergence_bound: f64,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Learning rate of the gradient step
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Convergence bound on the change of the corpus score
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn templates(&self) -> Templates {
        self.templates
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Largest per-sequence score magnitude tolerated before training aborts
    pub fn divergence_bound(&self) -> f64 {
        self.divergence_bound
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            epsilon: 0.01,
            max_iterations: 10,
            threshold: 0.0001,
            templates: Templates::default(),
            verbose: false,
            divergence_bound: 10000.0,
        }
    }
}

/// Collects option values and validates them in [`build`](ConfigBuilder::build).
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    inner: Config,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self {
            inner: Config::default(),
        }
    }
}

impl ConfigBuilder {
    pub fn epsilon(mut self, epsilon: f64) -> Self {
        self.inner.epsilon = epsilon;
        self
    }

    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.inner.max_iterations = max_iterations;
        self
    }

    pub fn threshold(mut self, threshold: f64) -> Self {
        self.inner.threshold = threshold;
        self
    }

    pub fn templates(mut self, templates: Templates) -> Self {
        self.inner.templates = templates;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.inner.verbose = verbose;
        self
    }

    pub fn divergence_bound(mut self, bound: f64) -> Self {
        self.inner.divergence_bound = bound;
        self
    }

    /// Enable or disable a single template by tag
    pub fn use_feature(mut self, tag: &str, enabled: bool) -> Result<Self> {
        let flag =
            Templates::from_tag(tag).ok_or_else(|| Error::UnknownTemplate(tag.to_string()))?;
        self.inner.templates.set(flag, enabled);
        Ok(self)
    }

    /// Apply a `usefeature` mapping of template tag to enabled flag
    pub fn use_features<'a, I>(self, usage: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, bool)>,
    {
        usage
            .into_iter()
            .try_fold(self, |builder, (tag, enabled)| builder.use_feature(tag, enabled))
    }

    /// Set an option from its textual form
    pub fn set(&mut self, name: &str, value: &str) -> Result<()> {
        match name {
            "epsilon" => self.inner.epsilon = parse(name, value)?,
            "max_iterations" | "maxIteration" => self.inner.max_iterations = parse(name, value)?,
            "threshold" => self.inner.threshold = parse(name, value)?,
            "verbose" => self.inner.verbose = parse(name, value)?,
            "divergence_bound" => self.inner.divergence_bound = parse(name, value)?,
            _ => match name.strip_prefix("usefeature.") {
                Some(tag) => {
                    let flag = Templates::from_tag(tag)
                        .ok_or_else(|| Error::UnknownTemplate(tag.to_string()))?;
                    let enabled: bool = parse(name, value)?;
                    self.inner.templates.set(flag, enabled);
                }
                None => return Err(Error::UnknownParameter(name.to_string())),
            },
        }
        Ok(())
    }

    /// Get the textual form of an option
    pub fn get(&self, name: &str) -> Result<String> {
        let value = match name {
            "epsilon" => self.inner.epsilon.to_string(),
            "max_iterations" | "maxIteration" => self.inner.max_iterations.to_string(),
            "threshold" => self.inner.threshold.to_string(),
            "verbose" => self.inner.verbose.to_string(),
            "divergence_bound" => self.inner.divergence_bound.to_string(),
            _ => match name.strip_prefix("usefeature.").and_then(Templates::from_tag) {
                Some(flag) => self.inner.templates.contains(flag).to_string(),
                None => return Err(Error::UnknownParameter(name.to_string())),
            },
        };
        Ok(value)
    }

    /// Validate every option and freeze the configuration
    pub fn build(self) -> Result<Config> {
        let c = self.inner;
        if !(c.epsilon.is_finite() && c.epsilon > 0.0) {
            return Err(Error::config("epsilon must be positive"));
        }
        if c.max_iterations < 1 {
            return Err(Error::config("max_iterations must be at least 1"));
        }
        if !(c.threshold.is_finite() && c.threshold > 0.0) {
            return Err(Error::config("threshold must be positive"));
        }
        if c.templates.is_empty() {
            return Err(Error::config("usefeature must enable at least one template"));
        }
        if c.divergence_bound.is_nan() || c.divergence_bound <= 0.0 {
            return Err(Error::config("divergence_bound must be positive"));
        }
        Ok(c)
    }
}

fn parse<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::config(format!("invalid value for {}: {:?}", name, value)))
}
