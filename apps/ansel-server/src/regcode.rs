//! Diceware registration codes.
//!
//! Codes are rolled from the configured EFF word list and joined with
//! hyphens, e.g. `correct-horse-battery-staple-vampire-violin`. They gate a
//! single redemption and are stored in the clear.

use ansel_config::WordlistKind;
use chbs::{config::BasicConfig, prelude::*, probability::Probability, word::WordList};

/// Number of words used when the configured count is out of range.
pub const DEFAULT_WORD_COUNT: u8 = 6;

/// Generate a registration code from the configured word list.
///
/// The word count is clamped to 1..=12, falling back to six words. The
/// classic 1995 list is not bundled, so `original` rolls from the EFF long
/// list instead.
pub fn generate_regcode(wordlist: WordlistKind, words: u8) -> String {
    let words = if (1..=12).contains(&words) {
        words
    } else {
        DEFAULT_WORD_COUNT
    };

    let list = match wordlist {
        WordlistKind::EffShort => WordList::builtin_eff_short(),
        WordlistKind::EffShortPrefix => WordList::builtin_eff_general_short(),
        WordlistKind::EffLong | WordlistKind::Original => WordList::builtin_eff_large(),
    };

    let mut config = BasicConfig::default();
    config.words = words as usize;
    config.separator = "-".into();
    config.word_provider = list.sampler();
    config.capitalize_first = Probability::from(0.0);
    config.capitalize_words = Probability::from(0.0);
    config.to_scheme().generate()
}
