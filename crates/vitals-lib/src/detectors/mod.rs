pub mod threshold;

pub use threshold::{classify, ChannelRule, ThresholdClassifier, DEFAULT_RULES};
